// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::{self, Write};

use indicatif::MultiProgress;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// How much the user asked to hear about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Warnings and errors only
    #[default]
    Normal,
    /// Per-feed and per-episode messages
    Verbose,
    Debug,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, debug: bool) -> Self {
        if debug {
            Verbosity::Debug
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    /// Filter directive used when `RUST_LOG` is not set
    pub fn default_directive(self) -> &'static str {
        match self {
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "warn,podget=info",
            Verbosity::Debug => "info,podget=debug",
        }
    }
}

/// Initialize logging to stderr.
///
/// `RUST_LOG` takes precedence over the verbosity flags. Log lines are
/// printed with the progress bars of `multi` hidden so the two never
/// interleave on the terminal.
pub fn init_logging(verbosity: Verbosity, multi: MultiProgress) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(SuspendingMakeWriter { multi })
        .with_target(verbosity == Verbosity::Debug)
        .init();
}

/// Hands out writers that print through [`MultiProgress::suspend`]
struct SuspendingMakeWriter {
    multi: MultiProgress,
}

impl<'a> MakeWriter<'a> for SuspendingMakeWriter {
    type Writer = SuspendingWriter<io::Stderr>;

    fn make_writer(&'a self) -> Self::Writer {
        SuspendingWriter::new(self.multi.clone(), io::stderr())
    }
}

/// Buffers one formatted event and writes it in a single piece on drop
struct SuspendingWriter<W: Write> {
    multi: MultiProgress,
    inner: W,
    buf: Vec<u8>,
}

impl<W: Write> SuspendingWriter<W> {
    fn new(multi: MultiProgress, inner: W) -> Self {
        Self {
            multi,
            inner,
            buf: Vec::new(),
        }
    }

    fn write_buffered(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let buf = std::mem::take(&mut self.buf);
        let inner = &mut self.inner;
        self.multi.suspend(|| {
            inner.write_all(&buf)?;
            inner.flush()
        })
    }
}

impl<W: Write> Write for SuspendingWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.write_buffered()
    }
}

impl<W: Write> Drop for SuspendingWriter<W> {
    fn drop(&mut self) {
        let _ = self.write_buffered();
    }
}
