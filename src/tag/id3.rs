// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::command::run_tool;
use super::{TagMetadata, Tagger};
use crate::error::TagError;

/// Tags MP3 files with ID3v2 frames.
///
/// `mid3v2` writes the text frames. `eyeD3` then adds the comment and the
/// front cover, which `mid3v2` mangles when they contain special characters.
pub struct Id3Tagger {
    mid3v2: PathBuf,
    eyed3: PathBuf,
}

impl Id3Tagger {
    pub fn new(mid3v2: PathBuf, eyed3: PathBuf) -> Self {
        Self { mid3v2, eyed3 }
    }

    /// Locate both tools in `PATH`
    pub fn from_path() -> Option<Self> {
        let mid3v2 = which::which("mid3v2").ok()?;
        let eyed3 = which::which("eyeD3").ok()?;
        Some(Self::new(mid3v2, eyed3))
    }

    fn frame_args(media: &Path, metadata: &TagMetadata) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--album".into(),
            metadata.album.clone().into(),
            "--TPOS".into(),
            "1".into(),
            "--TPE2".into(),
            metadata.album.clone().into(),
            "--genre".into(),
            metadata.genre.clone().into(),
            "--artist".into(),
            metadata.album.clone().into(),
            "--song".into(),
            metadata.title.clone().into(),
        ];
        if let Some(year) = &metadata.year {
            args.push("--year".into());
            args.push(year.into());
        }
        args.push(media.into());
        args
    }

    /// `None` when there is neither a comment nor a cover to add
    fn extras_args(media: &Path, metadata: &TagMetadata) -> Option<Vec<OsString>> {
        let mut args: Vec<OsString> = Vec::new();
        if let Some(comment) = &metadata.comment {
            args.push("--comment".into());
            args.push(escape_colons(comment).into());
        }
        if let Some(cover) = &metadata.cover {
            args.push("--add-image".into());
            args.push(format!("{}:FRONT_COVER", escape_colons(&cover.to_string_lossy())).into());
        }
        if args.is_empty() {
            return None;
        }
        args.push(media.into());
        Some(args)
    }
}

/// eyeD3 splits `--comment` and `--add-image` values at `:`; a literal colon is `\:`
fn escape_colons(value: &str) -> String {
    value.replace(':', "\\:")
}

#[async_trait]
impl Tagger for Id3Tagger {
    fn name(&self) -> &'static str {
        "id3"
    }

    async fn tag(&self, media: &Path, metadata: &TagMetadata) -> Result<(), TagError> {
        run_tool(&self.mid3v2, &Self::frame_args(media, metadata)).await?;

        if let Some(args) = Self::extras_args(media, metadata) {
            run_tool(&self.eyed3, &args).await?;
        }

        Ok(())
    }
}
