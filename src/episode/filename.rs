// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::{ConfigError, EpisodeError};
use crate::feed::Episode;

/// Characters stripped from titles in the default naming scheme
static INVALID_TITLE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_. ]+").expect("valid title regex"));

/// Directory name used when a feed title has no usable characters
const UNTITLED_FEED_DIR: &str = "untitled";

/// Fields an [`ExtractionRule`] can search
pub const EXTRACTION_FIELDS: [&str; 9] = [
    "item.author",
    "item.category",
    "item.description",
    "item.duration",
    "item.guid",
    "item.pubDate",
    "item.title",
    "enclosure.url",
    "url",
];

/// Pulls a stable episode identifier out of one metadata field.
///
/// Needed for feeds served through tracking redirectors, where every
/// enclosure ends in the same `default.mp3`.
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    field: String,
    pattern: Regex,
}

impl ExtractionRule {
    /// Parse an instruction of the form `<field> /<regex>/`.
    ///
    /// The first whitespace-separated token names the field; the rest,
    /// trimmed of spaces and slashes, must compile to a pattern with
    /// exactly one capture group.
    pub fn parse(instruction: &str) -> Result<Self, ConfigError> {
        let instruction = instruction.trim();
        let (field, rest) = instruction
            .split_once(char::is_whitespace)
            .ok_or_else(|| ConfigError::MissingPattern(instruction.to_string()))?;

        if !EXTRACTION_FIELDS.contains(&field) {
            tracing::warn!(field, known = ?EXTRACTION_FIELDS, "unknown extraction field, no episode will match");
        }

        let source = rest.trim_matches(|c: char| c == '/' || c.is_whitespace());
        if source.is_empty() {
            return Err(ConfigError::MissingPattern(instruction.to_string()));
        }

        let pattern = Regex::new(source).map_err(|e| ConfigError::InvalidPattern {
            pattern: source.to_string(),
            source: e,
        })?;

        // captures_len counts the implicit whole-match group
        let groups = pattern.captures_len() - 1;
        if groups != 1 {
            return Err(ConfigError::CaptureGroups {
                pattern: source.to_string(),
                found: groups,
            });
        }

        Ok(Self {
            field: field.to_string(),
            pattern,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Apply the rule to a field lookup. Unknown fields search the empty string.
    pub fn extract(&self, fields: &HashMap<&'static str, String>) -> Option<String> {
        let haystack = fields.get(self.field.as_str()).map(String::as_str).unwrap_or("");

        let captured = self
            .pattern
            .captures(haystack)
            .and_then(|caps| caps.get(1))
            .map(|m| sanitize_filename::sanitize(m.as_str()))
            .filter(|value| !value.is_empty());

        if captured.is_none() {
            tracing::debug!(field = %self.field, search_data = haystack, regex = %self.pattern, "no match");
        }

        captured
    }
}

/// How destination filenames are derived
#[derive(Debug, Clone, Default)]
pub enum FilenameStrategy {
    /// `<YYYY-MM-DD> - <sanitized title><ext>`
    #[default]
    Dated,
    /// `<captured id><ext>`
    Extract(ExtractionRule),
}

impl FilenameStrategy {
    /// Compute where an episode will be written.
    ///
    /// The same path is used for the staleness check and the eventual write.
    pub fn destination(
        &self,
        episode: &Episode,
        feed_dir: &str,
        base_dir: &Path,
    ) -> Result<PathBuf, EpisodeError> {
        let url = Url::parse(&episode.enclosure.url).map_err(|e| {
            EpisodeError::InvalidEnclosureUrl {
                url: episode.enclosure.url.clone(),
                source: e,
            }
        })?;
        let ext = media_extension(&url, episode.enclosure.mime_type.as_deref());

        let filename = match self {
            FilenameStrategy::Dated => dated_filename(episode, &ext),
            FilenameStrategy::Extract(rule) => {
                let fields = extraction_fields(episode, &url);
                let id = rule
                    .extract(&fields)
                    .ok_or_else(|| EpisodeError::ExtractionFailed {
                        url: url.to_string(),
                    })?;
                format!("{id}{ext}")
            }
        };

        Ok(base_dir.join(feed_dir).join(filename))
    }
}

/// Derive a directory name from a feed title.
///
/// Non-ASCII characters are dropped and spaces become underscores; other
/// ASCII is kept except path separators.
pub fn feed_directory_name(title: &str) -> String {
    let name: String = title
        .chars()
        .filter(char::is_ascii)
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            c => c,
        })
        .collect();

    if name.is_empty() || name.chars().all(|c| c == '.') {
        UNTITLED_FEED_DIR.to_string()
    } else {
        name
    }
}

/// Strip everything outside `[A-Za-z0-9_. ]` from a title
pub fn sanitize_title(title: &str) -> String {
    INVALID_TITLE_CHARS.replace_all(title, "").into_owned()
}

fn dated_filename(episode: &Episode, ext: &str) -> String {
    let date = episode
        .pub_date
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "undated".to_string());

    format!("{} - {}{}", date, sanitize_title(&episode.title), ext)
}

/// Build the searchable field map for extraction mode
pub fn extraction_fields(episode: &Episode, resolved: &Url) -> HashMap<&'static str, String> {
    let text = |value: &Option<String>| value.clone().unwrap_or_default();

    HashMap::from([
        ("item.author", text(&episode.author)),
        ("item.category", text(&episode.category)),
        ("item.description", text(&episode.description)),
        ("item.duration", text(&episode.duration)),
        ("item.guid", text(&episode.guid)),
        (
            "item.pubDate",
            episode.pub_date.map(|d| d.to_string()).unwrap_or_default(),
        ),
        ("item.title", episode.title.clone()),
        ("enclosure.url", episode.enclosure.url.clone()),
        ("url", resolved.to_string()),
    ])
}

/// Extension of the enclosure, with leading dot.
///
/// Taken from the last URL path segment; falls back to the MIME type,
/// then to no extension at all.
pub fn media_extension(url: &Url, mime_type: Option<&str>) -> String {
    let from_path = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    if let Some(ext) = from_path {
        return format!(".{ext}");
    }

    mime_type
        .and_then(mime_to_extension)
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

/// Map MIME types to file extensions
fn mime_to_extension(mime: &str) -> Option<&'static str> {
    match mime.to_lowercase().as_str() {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => Some("m4a"),
        "audio/aac" => Some("aac"),
        "audio/ogg" => Some("ogg"),
        "audio/opus" => Some("opus"),
        "audio/wav" | "audio/x-wav" => Some("wav"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "video/mp4" => Some("mp4"),
        _ => None,
    }
}
