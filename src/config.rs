// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::time::Duration;

use crate::download::{DEFAULT_PACING, DEFAULT_QUEUE_CAPACITY, RetryPolicy, WorkerOptions};
use crate::episode::{ExtractionRule, FilenameStrategy};
use crate::error::ConfigError;
use crate::http::HttpOptions;
use crate::staleness::StalenessPolicy;

/// Everything a run needs to know, fixed before the first feed is fetched
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the archive; each feed gets a subdirectory
    pub dest_dir: PathBuf,
    pub staleness: StalenessPolicy,
    pub filenames: FilenameStrategy,
    /// Number of jobs that may wait for the worker before feed processing blocks
    pub queue_capacity: usize,
    pub worker: WorkerOptions,
    pub http: HttpOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dest_dir: PathBuf::from("."),
            staleness: StalenessPolicy::default(),
            filenames: FilenameStrategy::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            worker: WorkerOptions::default(),
            http: HttpOptions::default(),
        }
    }
}

/// Raw settings as they come from the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigInput {
    pub dest_dir: PathBuf,
    pub rerun_days: i64,
    pub extraction: Option<String>,
    pub retries: u32,
    /// Read timeout in seconds, 0 for none
    pub timeout_secs: u64,
    pub tagging: bool,
}

impl Config {
    /// Validate raw settings. Fails on a malformed extraction instruction.
    pub fn from_input(input: ConfigInput) -> Result<Self, ConfigError> {
        let filenames = match input.extraction.as_deref().map(str::trim) {
            Some(instruction) if !instruction.is_empty() => {
                FilenameStrategy::Extract(ExtractionRule::parse(instruction)?)
            }
            _ => FilenameStrategy::Dated,
        };

        let read_timeout = (input.timeout_secs > 0).then(|| Duration::from_secs(input.timeout_secs));

        Ok(Self {
            dest_dir: input.dest_dir,
            staleness: StalenessPolicy::new(input.rerun_days),
            filenames,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            worker: WorkerOptions {
                pacing: DEFAULT_PACING,
                retry: RetryPolicy::with_retries(input.retries),
                tagging: input.tagging,
            },
            http: HttpOptions {
                read_timeout,
                ..HttpOptions::default()
            },
        })
    }
}
