// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use crate::config::Config;
use crate::download::{DownloadWorker, job_queue};
use crate::error::RunError;
use crate::http::HttpClient;
use crate::process::FeedProcessor;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::tag::TaggerRegistry;

/// Result of a complete run over all feeds
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub feeds_ok: usize,
    pub feeds_failed: usize,
    /// Episodes handed to the download worker
    pub queued: usize,
    /// Episodes already present and not stale
    pub skipped: usize,
    /// Episodes whose destination could not be determined
    pub episode_errors: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub tagged: usize,
    /// Details of failed downloads (title, error message)
    pub failed_jobs: Vec<(String, String)>,
}

impl RunSummary {
    /// True when downloads were attempted and every one of them failed
    pub fn all_downloads_failed(&self) -> bool {
        self.failed > 0 && self.downloaded == 0
    }
}

/// Process every feed and download what is missing.
///
/// Feeds are walked in order by one task while a single worker drains the
/// download queue concurrently. The call returns once the last feed has been
/// processed and the queue is empty. Individual feed, episode and download
/// failures are counted in the summary; only an abnormally terminated task
/// is returned as an error.
pub async fn run<C: HttpClient + ?Sized + 'static>(
    config: Arc<Config>,
    client: Arc<C>,
    taggers: Arc<TaggerRegistry>,
    feeds: Vec<String>,
    reporter: SharedProgressReporter,
) -> Result<RunSummary, RunError> {
    let (sender, receiver) = job_queue(config.queue_capacity);

    let worker = DownloadWorker::new(
        client.clone(),
        taggers,
        config.worker,
        reporter.clone(),
    );
    let worker_handle = tokio::spawn(worker.run(receiver));

    let processor = FeedProcessor::new(client, config, sender, reporter.clone());
    let producer_handle = tokio::spawn(processor.process_feeds(feeds));

    let (produced, worked) = tokio::join!(producer_handle, worker_handle);
    let produced = produced.map_err(RunError::ProducerPanicked)?;
    let worked = worked.map_err(RunError::WorkerPanicked)?;

    let summary = RunSummary {
        feeds_ok: produced.feeds_ok,
        feeds_failed: produced.feeds_failed,
        queued: produced.queued,
        skipped: produced.skipped,
        episode_errors: produced.episode_errors,
        downloaded: worked.downloaded,
        failed: worked.failed,
        tagged: worked.tagged,
        failed_jobs: worked.failed_jobs,
    };

    tracing::info!(
        feeds = summary.feeds_ok + summary.feeds_failed,
        downloaded = summary.downloaded,
        skipped = summary.skipped,
        failed = summary.failed,
        "run complete"
    );

    reporter.report(ProgressEvent::RunCompleted {
        downloaded_count: summary.downloaded,
        skipped_count: summary.skipped,
        failed_count: summary.failed,
    });

    Ok(summary)
}
