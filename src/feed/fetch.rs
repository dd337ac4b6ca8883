// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bytes::Bytes;
use url::Url;

use crate::error::FeedError;
use crate::http::HttpClient;

use super::parse::{Feed, parse_feed};

/// Fetch raw feed bytes from a URL (without parsing)
pub async fn fetch_feed_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<Bytes, FeedError> {
    let response = client
        .get_bytes(url)
        .await
        .map_err(|e| FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        })?;

    if response.status >= 400 {
        return Err(FeedError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    Ok(response.body)
}

/// Fetch and parse a podcast feed from a URL
pub async fn fetch_feed<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Feed, FeedError> {
    if !is_http(&Url::parse(url)?) {
        return Err(FeedError::UnsupportedScheme(url.to_string()));
    }
    let bytes = fetch_feed_bytes(client, url).await?;
    parse_feed(&bytes)
}

/// Determine if a string is an http(s) URL
pub fn is_url(source: &str) -> bool {
    Url::parse(source).is_ok_and(|url| is_http(&url))
}

fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::http::{BytesResponse, HttpResponse};

    struct StaticClient {
        status: u16,
        body: &'static str,
    }

    #[async_trait]
    impl HttpClient for StaticClient {
        async fn get_bytes(&self, _url: &str) -> Result<BytesResponse, reqwest::Error> {
            Ok(BytesResponse {
                status: self.status,
                body: Bytes::from_static(self.body.as_bytes()),
            })
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            unreachable!("feeds are fetched in one piece")
        }
    }

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Show</title><description>d</description>
<item><title>One</title><enclosure url="https://example.com/1.mp3" type="audio/mpeg"/></item>
</channel></rss>"#;

    #[test]
    fn is_url_detects_http() {
        assert!(is_url("http://example.com/feed.xml"));
        assert!(is_url("https://example.com/feed.xml"));
    }

    #[test]
    fn is_url_ignores_scheme_case() {
        assert!(is_url("HTTPS://example.com/feed.xml"));
        assert!(is_url("Http://example.com/feed.xml"));
    }

    #[test]
    fn is_url_rejects_file_paths() {
        assert!(!is_url("/path/to/feed.xml"));
        assert!(!is_url("ftp://example.com/feed.xml"));
    }

    #[tokio::test]
    async fn fetch_feed_parses_body() {
        let client = StaticClient {
            status: 200,
            body: FEED,
        };
        let feed = fetch_feed(&client, "https://example.com/feed.xml")
            .await
            .unwrap();
        assert_eq!(feed.title, "Show");
        assert_eq!(feed.episodes.len(), 1);
    }

    #[tokio::test]
    async fn fetch_feed_reports_http_errors() {
        let client = StaticClient {
            status: 404,
            body: "Not Found",
        };
        let result = fetch_feed(&client, "https://example.com/feed.xml").await;
        assert!(matches!(
            result,
            Err(FeedError::HttpStatus { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn fetch_feed_rejects_invalid_url() {
        let client = StaticClient {
            status: 200,
            body: FEED,
        };
        let result = fetch_feed(&client, "not a url").await;
        assert!(matches!(result, Err(FeedError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn fetch_feed_accepts_upper_case_scheme() {
        let client = StaticClient {
            status: 200,
            body: FEED,
        };
        let feed = fetch_feed(&client, "HTTPS://example.com/feed.xml")
            .await
            .unwrap();
        assert_eq!(feed.title, "Show");
    }

    #[tokio::test]
    async fn fetch_feed_rejects_non_http_sources() {
        let client = StaticClient {
            status: 200,
            body: FEED,
        };
        let result = fetch_feed(&client, "file:///srv/feeds/show.xml").await;
        assert!(matches!(result, Err(FeedError::UnsupportedScheme(_))));
    }
}
