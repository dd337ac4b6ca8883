// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Errors in the startup configuration. These abort the run before any
/// feed is fetched.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Extraction instruction '{0}' has no pattern, expected \"<field> /<regex>/\"")]
    MissingPattern(String),

    #[error("Invalid extraction pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Extraction pattern '{pattern}' must have exactly one capture group, found {found}")]
    CaptureGroups { pattern: String, found: usize },
}

/// Errors that can occur when fetching or parsing RSS feeds
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for feed {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to parse RSS feed: {0}")]
    ParseFailed(#[from] rss::Error),

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Unsupported feed location {0}, only http and https are fetched")]
    UnsupportedScheme(String),
}

/// Errors that cause a single episode to be skipped
#[derive(Error, Debug)]
pub enum EpisodeError {
    #[error("Can't parse enclosure URL {url}: {source}")]
    InvalidEnclosureUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to extract filename for {url}")]
    ExtractionFailed { url: String },

    #[error("Can't stat destination {path}: {source}")]
    StatFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur during episode downloads
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Can't create destination directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move download into place at {path}: {source}")]
    FinalizeFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl DownloadError {
    /// Whether another attempt at the same fetch might succeed.
    ///
    /// Filesystem failures are never transient; a 404 won't fix itself either.
    pub fn is_transient(&self) -> bool {
        match self {
            DownloadError::HttpFailed { .. } | DownloadError::StreamFailed { .. } => true,
            DownloadError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Errors reported by media taggers
#[derive(Error, Debug)]
pub enum TagError {
    #[error("Failed to run {tool}: {source}")]
    ToolSpawnFailed {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },
}

/// Top-level errors for a run. Everything below feed level is recovered
/// from and counted instead.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Download worker terminated abnormally: {0}")]
    WorkerPanicked(#[source] tokio::task::JoinError),

    #[error("Feed processor terminated abnormally: {0}")]
    ProducerPanicked(#[source] tokio::task::JoinError),
}
