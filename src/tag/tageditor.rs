// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::command::{assignment, run_tool};
use super::{TagMetadata, Tagger};
use crate::error::TagError;

/// Tags MP4/AAC/Ogg/WAV/WMV/FLAC files with `tageditor`
pub struct TagEditorTagger {
    binary: PathBuf,
}

impl TagEditorTagger {
    /// Containers `tageditor` is used for
    pub const CONTAINERS: &'static [&'static str] = &["m4a", "aac", "ogg", "wav", "wmv", "flac"];

    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    pub fn from_path() -> Option<Self> {
        which::which("tageditor").ok().map(Self::new)
    }

    fn set_args(media: &Path, metadata: &TagMetadata) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "set".into(),
            assignment("title", &metadata.title),
            assignment("album", &metadata.album),
            assignment("albumartist", &metadata.album),
            assignment("disk", "1"),
            assignment("genre", &metadata.genre),
        ];
        if let Some(year) = &metadata.year {
            args.push(assignment("year", year));
        }
        if let Some(comment) = &metadata.comment {
            args.push(assignment("comment", comment));
        }
        if let Some(cover) = &metadata.cover {
            args.push(assignment("cover", cover));
        }
        args.push("-f".into());
        args.push(media.into());
        args
    }
}

/// `tageditor` keeps the untagged original next to the file
fn backup_path(media: &Path) -> PathBuf {
    let mut name = media.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

#[async_trait]
impl Tagger for TagEditorTagger {
    fn name(&self) -> &'static str {
        "tageditor"
    }

    async fn tag(&self, media: &Path, metadata: &TagMetadata) -> Result<(), TagError> {
        run_tool(&self.binary, &Self::set_args(media, metadata)).await?;

        let backup = backup_path(media);
        match tokio::fs::remove_file(&backup).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %backup.display(), error = %e, "can't remove tageditor backup")
            }
        }
        Ok(())
    }
}
