// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset};

use crate::error::FeedError;

/// A parsed podcast feed. Lives for one fetch; nothing is persisted.
#[derive(Debug, Clone)]
pub struct Feed {
    pub title: String,
    pub episodes: Vec<Episode>,
}

/// A single podcast episode as published in the feed
#[derive(Debug, Clone)]
pub struct Episode {
    pub title: String,
    pub description: Option<String>,
    pub pub_date: Option<DateTime<FixedOffset>>,
    pub guid: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    /// Raw `itunes:duration` value
    pub duration: Option<String>,
    pub enclosure: Enclosure,
    /// Episode artwork, falling back to the channel artwork
    pub image_url: Option<String>,
    pub feed_title: String,
}

/// The media file attached to an episode.
///
/// The URL is kept as published; it is validated when the episode is
/// processed so a single bad item cannot fail the whole feed.
#[derive(Debug, Clone)]
pub struct Enclosure {
    pub url: String,
    pub mime_type: Option<String>,
}

/// Parse RSS feed XML bytes into a Feed
pub fn parse_feed(xml_bytes: &[u8]) -> Result<Feed, FeedError> {
    let channel = rss::Channel::read_from(xml_bytes)?;
    let title = channel.title().to_string();

    let channel_image = channel
        .itunes_ext()
        .and_then(|ext| ext.image().map(String::from))
        .or_else(|| channel.image().map(|img| img.url().to_string()));

    let episodes = channel
        .items()
        .iter()
        .filter_map(|item| parse_episode(item, &title, channel_image.as_deref()))
        .collect();

    Ok(Feed { title, episodes })
}

fn parse_episode(item: &rss::Item, feed_title: &str, channel_image: Option<&str>) -> Option<Episode> {
    let enclosure = item.enclosure()?;
    let itunes = item.itunes_ext();

    let pub_date = item.pub_date().and_then(|date_str| {
        DateTime::parse_from_rfc2822(date_str)
            .ok()
            .or_else(|| parse_relaxed_date(date_str))
    });

    let author = item
        .author()
        .map(String::from)
        .or_else(|| itunes.and_then(|ext| ext.author().map(String::from)));

    let image_url = itunes
        .and_then(|ext| ext.image().map(String::from))
        .or_else(|| channel_image.map(String::from));

    Some(Episode {
        title: item.title().unwrap_or_default().to_string(),
        description: item.description().map(String::from),
        pub_date,
        guid: item.guid().map(|g| g.value().to_string()),
        author,
        category: item.categories().first().map(|c| c.name().to_string()),
        duration: itunes.and_then(|ext| ext.duration().map(String::from)),
        enclosure: Enclosure {
            url: enclosure.url().trim().to_string(),
            mime_type: Some(enclosure.mime_type().to_string()).filter(|s| !s.is_empty()),
        },
        image_url,
        feed_title: feed_title.to_string(),
    })
}

/// Try to parse dates that don't strictly conform to RFC 2822
fn parse_relaxed_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    let formats = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];

    formats
        .iter()
        .find_map(|format| DateTime::parse_from_str(date_str.trim(), format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(date_str.trim()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>This American Life</title>
    <description>Weekly stories</description>
    <link>https://example.com</link>
    <itunes:image href="https://example.com/show.jpg"/>
    <item>
      <title>Episode 42: Foo</title>
      <description>First &amp; best</description>
      <pubDate>Mon, 01 Jan 2024 12:00:00 +0000</pubDate>
      <guid>ep42-guid</guid>
      <author>host@example.com</author>
      <category>Society</category>
      <enclosure url="https://example.com/ep42.mp3" length="1234567" type="audio/mpeg"/>
      <itunes:duration>59:30</itunes:duration>
      <itunes:image href="https://example.com/ep42.jpg"/>
    </item>
    <item>
      <title>Episode 43</title>
      <enclosure url="https://example.com/ep43.m4a" type="audio/mp4"/>
    </item>
    <item>
      <title>Trailer without audio</title>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parse_feed_extracts_title() {
        let feed = parse_feed(SAMPLE_FEED.as_bytes()).unwrap();
        assert_eq!(feed.title, "This American Life");
    }

    #[test]
    fn parse_feed_extracts_episode_fields() {
        let feed = parse_feed(SAMPLE_FEED.as_bytes()).unwrap();
        let ep = &feed.episodes[0];

        assert_eq!(ep.title, "Episode 42: Foo");
        assert_eq!(ep.description.as_deref(), Some("First & best"));
        assert_eq!(ep.guid.as_deref(), Some("ep42-guid"));
        assert_eq!(ep.author.as_deref(), Some("host@example.com"));
        assert_eq!(ep.category.as_deref(), Some("Society"));
        assert_eq!(ep.duration.as_deref(), Some("59:30"));
        assert_eq!(ep.enclosure.url, "https://example.com/ep42.mp3");
        assert_eq!(ep.enclosure.mime_type.as_deref(), Some("audio/mpeg"));
        assert_eq!(ep.image_url.as_deref(), Some("https://example.com/ep42.jpg"));
        assert_eq!(ep.feed_title, "This American Life");
        assert_eq!(
            ep.pub_date.map(|d| d.format("%Y-%m-%d").to_string()),
            Some("2024-01-01".to_string())
        );
    }

    #[test]
    fn parse_feed_falls_back_to_channel_artwork() {
        let feed = parse_feed(SAMPLE_FEED.as_bytes()).unwrap();
        let ep = &feed.episodes[1];

        assert_eq!(ep.image_url.as_deref(), Some("https://example.com/show.jpg"));
        assert!(ep.pub_date.is_none());
        assert!(ep.guid.is_none());
    }

    #[test]
    fn parse_feed_skips_items_without_enclosure() {
        let feed = parse_feed(SAMPLE_FEED.as_bytes()).unwrap();
        assert_eq!(feed.episodes.len(), 2);
        assert!(feed.episodes.iter().all(|e| e.title != "Trailer without audio"));
    }

    #[test]
    fn parse_feed_rejects_garbage() {
        assert!(matches!(
            parse_feed(b"<html>not a feed</html>"),
            Err(FeedError::ParseFailed(_))
        ));
    }

    #[test]
    fn relaxed_dates_are_accepted() {
        assert!(parse_relaxed_date("2024-01-15T08:00:00+02:00").is_some());
        assert!(parse_relaxed_date("15 Jan 2024 08:00:00 +0000").is_some());
        assert!(parse_relaxed_date("sometime last week").is_none());
    }
}
