pub mod config;
pub mod download;
pub mod episode;
pub mod error;
pub mod feed;
pub mod http;
pub mod logging;
pub mod process;
pub mod progress;
pub mod run;
pub mod staleness;
pub mod tag;

// Re-export main types for convenience
pub use config::{Config, ConfigInput};
pub use download::{DownloadJob, DownloadWorker, RetryPolicy, WorkerOptions, WorkerSummary};
pub use episode::{ExtractionRule, FilenameStrategy, feed_directory_name};
pub use error::{ConfigError, DownloadError, EpisodeError, FeedError, RunError, TagError};
pub use feed::{Enclosure, Episode, Feed, fetch_feed, parse_feed};
pub use http::{HttpClient, HttpOptions, HttpResponse, ReqwestClient};
pub use process::{FeedProcessor, ProducerSummary};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use run::{RunSummary, run};
pub use staleness::{StalenessDecision, StalenessPolicy};
pub use tag::{TagMetadata, Tagger, TaggerRegistry};
