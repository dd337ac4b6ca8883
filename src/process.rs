// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::config::Config;
use crate::download::{DownloadJob, JobSender, QueueClosed};
use crate::episode::feed_directory_name;
use crate::error::EpisodeError;
use crate::feed::{Episode, fetch_feed};
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::staleness::{StalenessDecision, evaluate, probe_destination};

/// Counts kept by the feed processor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducerSummary {
    pub feeds_ok: usize,
    pub feeds_failed: usize,
    pub queued: usize,
    /// Episodes already present and not stale, or already queued this run
    pub skipped: usize,
    /// Episodes whose destination could not be determined
    pub episode_errors: usize,
}

/// What happened to a single episode
#[derive(Debug)]
pub enum EpisodeOutcome {
    Queued(StalenessDecision),
    AlreadyDownloaded,
    /// An earlier episode of this run was queued for the same destination
    AlreadyQueued,
    Skipped(EpisodeError),
}

/// The producer side of a run: walks the feeds in order and queues every
/// episode that is missing or stale.
pub struct FeedProcessor<C: HttpClient + ?Sized> {
    client: Arc<C>,
    config: Arc<Config>,
    queue: JobSender,
    reporter: SharedProgressReporter,
    /// Destinations handed to the worker during this run
    queued: HashSet<PathBuf>,
}

impl<C: HttpClient + ?Sized> FeedProcessor<C> {
    pub fn new(
        client: Arc<C>,
        config: Arc<Config>,
        queue: JobSender,
        reporter: SharedProgressReporter,
    ) -> Self {
        Self {
            client,
            config,
            queue,
            reporter,
            queued: HashSet::new(),
        }
    }

    /// Process every feed, one at a time, then close the queue
    pub async fn process_feeds(mut self, feeds: Vec<String>) -> ProducerSummary {
        let mut summary = ProducerSummary::default();

        for url in &feeds {
            if let Err(e) = self.process_feed(url, &mut summary).await {
                tracing::error!(error = %e, "download worker is gone, abandoning remaining feeds");
                break;
            }
        }

        self.queue.close();
        summary
    }

    /// Fetch one feed and queue its episodes.
    ///
    /// Fetch and parse errors are logged and the feed is skipped. The only
    /// error returned is a closed queue.
    pub async fn process_feed(
        &mut self,
        url: &str,
        summary: &mut ProducerSummary,
    ) -> Result<(), QueueClosed> {
        tracing::info!(url, "fetching feed");
        self.reporter
            .report(ProgressEvent::FetchingFeed { url: url.to_string() });

        let feed = match fetch_feed(self.client.as_ref(), url).await {
            Ok(feed) => feed,
            Err(e) => {
                tracing::error!(url, error = %e, "can't process feed");
                summary.feeds_failed += 1;
                return Ok(());
            }
        };

        let feed_dir = feed_directory_name(&feed.title);
        tracing::info!("{} {}/", feed.title, feed_dir);
        self.reporter.report(ProgressEvent::FeedParsed {
            feed_title: feed.title.clone(),
            directory: feed_dir.clone(),
            total_episodes: feed.episodes.len(),
        });

        for episode in feed.episodes {
            match self.process_episode(episode, &feed_dir).await? {
                EpisodeOutcome::Queued(_) => summary.queued += 1,
                EpisodeOutcome::AlreadyDownloaded | EpisodeOutcome::AlreadyQueued => {
                    summary.skipped += 1
                }
                EpisodeOutcome::Skipped(_) => summary.episode_errors += 1,
            }
        }

        summary.feeds_ok += 1;
        Ok(())
    }

    /// Decide whether an episode needs downloading and queue it if so.
    ///
    /// The destination is computed once and used for both the staleness
    /// check and the job. A destination is queued at most once per run, so
    /// the file on disk cannot change between the check and the write.
    /// Submitting waits while the queue is full.
    pub async fn process_episode(
        &mut self,
        episode: Episode,
        feed_dir: &str,
    ) -> Result<EpisodeOutcome, QueueClosed> {
        tracing::info!(
            "  {} {} {}",
            episode
                .pub_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "undated".to_string()),
            episode.title,
            episode.duration.as_deref().unwrap_or("")
        );

        let destination =
            match self
                .config
                .filenames
                .destination(&episode, feed_dir, &self.config.dest_dir)
            {
                Ok(path) => path,
                Err(e) => return Ok(self.skip_with_error(&episode, e)),
            };

        if self.queued.contains(&destination) {
            tracing::info!(path = %destination.display(), "skipping, already queued");
            self.reporter.report(ProgressEvent::EpisodeSkipped {
                episode_title: episode.title.clone(),
                reason: "already queued".to_string(),
            });
            return Ok(EpisodeOutcome::AlreadyQueued);
        }

        let modified = match probe_destination(&destination).await {
            Ok(modified) => modified,
            Err(e) => return Ok(self.skip_with_error(&episode, e)),
        };

        let decision = evaluate(modified, Utc::now(), self.config.staleness);
        match decision {
            StalenessDecision::Download => {}
            StalenessDecision::Overwrite { age } => {
                tracing::info!(
                    path = %destination.display(),
                    age_days = age.num_days(),
                    "allowing overwrite, file is older than the rerun window"
                );
            }
            StalenessDecision::Skip { age } => {
                if let Some(age) = age {
                    tracing::info!(
                        path = %destination.display(),
                        age_days = age.num_days(),
                        "not allowing overwrite, file is within the rerun window"
                    );
                }
                tracing::info!(path = %destination.display(), "skipping, already downloaded");
                self.reporter.report(ProgressEvent::EpisodeSkipped {
                    episode_title: episode.title.clone(),
                    reason: "already downloaded".to_string(),
                });
                return Ok(EpisodeOutcome::AlreadyDownloaded);
            }
        }

        self.reporter.report(ProgressEvent::EpisodeQueued {
            episode_title: episode.title.clone(),
            destination: destination.clone(),
        });
        if self.queue.available() == 0 {
            tracing::debug!("download queue full, waiting for the worker");
        }
        self.queued.insert(destination.clone());
        self.queue
            .submit(DownloadJob {
                url: episode.enclosure.url.clone(),
                destination,
                episode,
            })
            .await?;

        Ok(EpisodeOutcome::Queued(decision))
    }

    fn skip_with_error(&self, episode: &Episode, error: EpisodeError) -> EpisodeOutcome {
        tracing::error!(episode = %episode.title, error = %error, "skipping episode");
        self.reporter.report(ProgressEvent::EpisodeSkipped {
            episode_title: episode.title.clone(),
            reason: error.to_string(),
        });
        EpisodeOutcome::Skipped(error)
    }
}
