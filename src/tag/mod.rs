// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Media tagging through external tools.
//!
//! Each container format is handled by a [`Tagger`]. The
//! [`TaggerRegistry`] maps file extensions to taggers; a file whose
//! extension has no tagger is reported as unsupported and left alone.

mod command;
mod id3;
mod tageditor;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TagError;
use crate::feed::Episode;

pub use id3::Id3Tagger;
pub use tageditor::TagEditorTagger;

/// Genre written to every tagged file
pub const PODCAST_GENRE: &str = "Podcast";

/// Metadata written into a downloaded media file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMetadata {
    pub title: String,
    /// Feed title, used for album, album artist and artist
    pub album: String,
    pub genre: String,
    /// Publication date as `YYYY-MM-DD`
    pub year: Option<String>,
    pub comment: Option<String>,
    pub cover: Option<PathBuf>,
}

impl TagMetadata {
    pub fn from_episode(episode: &Episode, cover: Option<PathBuf>) -> Self {
        Self {
            title: episode.title.clone(),
            album: episode.feed_title.clone(),
            genre: PODCAST_GENRE.to_string(),
            year: episode.pub_date.map(|d| d.format("%Y-%m-%d").to_string()),
            comment: episode
                .description
                .as_deref()
                .map(|d| html_escape::decode_html_entities(d.trim()).into_owned())
                .filter(|d| !d.is_empty()),
            cover,
        }
    }
}

/// Writes metadata into one kind of media container
#[async_trait]
pub trait Tagger: Send + Sync {
    /// Short name used in log output
    fn name(&self) -> &'static str;

    /// Tag `media` in place
    async fn tag(&self, media: &Path, metadata: &TagMetadata) -> Result<(), TagError>;
}

/// Taggers keyed by lower-case file extension (without the dot)
#[derive(Clone, Default)]
pub struct TaggerRegistry {
    taggers: HashMap<String, Arc<dyn Tagger>>,
}

impl TaggerRegistry {
    /// Registry with no taggers; every file is unsupported
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with every tagger whose tools are on `PATH`
    pub fn discover() -> Self {
        let mut registry = Self::new();

        match Id3Tagger::from_path() {
            Some(tagger) => registry.register_all(&["mp3"], Arc::new(tagger)),
            None => tracing::debug!("mid3v2/eyeD3 not found in PATH, mp3 files will not be tagged"),
        }

        match TagEditorTagger::from_path() {
            Some(tagger) => registry.register_all(TagEditorTagger::CONTAINERS, Arc::new(tagger)),
            None => tracing::debug!("tageditor not found in PATH, only mp3 files can be tagged"),
        }

        registry
    }

    pub fn register(&mut self, container: &str, tagger: Arc<dyn Tagger>) {
        self.taggers.insert(container.to_lowercase(), tagger);
    }

    fn register_all(&mut self, containers: &[&str], tagger: Arc<dyn Tagger>) {
        for container in containers {
            self.register(container, tagger.clone());
        }
    }

    pub fn get(&self, container: &str) -> Option<&Arc<dyn Tagger>> {
        self.taggers.get(&container.to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.taggers.is_empty()
    }

    /// The tagger registered for the extension of `media`, if any
    pub fn tagger_for(&self, media: &Path) -> Option<&Arc<dyn Tagger>> {
        self.get(&container_of(media))
    }
}

/// Lower-case extension of a media file, without the dot
pub fn container_of(media: &Path) -> String {
    media
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
