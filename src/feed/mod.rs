mod fetch;
mod parse;

pub use fetch::{fetch_feed, fetch_feed_bytes, is_url};
pub use parse::{Enclosure, Episode, Feed, parse_feed};
