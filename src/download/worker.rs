// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::queue::{DownloadJob, JobReceiver};
use super::retry::RetryPolicy;
use crate::episode::{DownloadContext, download_episode, download_file};
use crate::error::DownloadError;
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::tag::{TagMetadata, TaggerRegistry, container_of};

/// Delay between two downloads, successful or not
pub const DEFAULT_PACING: Duration = Duration::from_secs(2);

/// Settings for the download worker
#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    pub pacing: Duration,
    pub retry: RetryPolicy,
    /// Fetch artwork and tag files after download
    pub tagging: bool,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            pacing: DEFAULT_PACING,
            retry: RetryPolicy::default(),
            tagging: true,
        }
    }
}

/// What the worker did with the jobs it received
#[derive(Debug, Clone, Default)]
pub struct WorkerSummary {
    pub downloaded: usize,
    pub failed: usize,
    pub tagged: usize,
    /// Episode title and error of every failed job
    pub failed_jobs: Vec<(String, String)>,
}

/// The single consumer of the download queue.
///
/// Jobs are processed one at a time in arrival order. Every failure is
/// confined to its job: it is logged and the worker moves on.
pub struct DownloadWorker<C: HttpClient + ?Sized> {
    client: Arc<C>,
    taggers: Arc<TaggerRegistry>,
    options: WorkerOptions,
    reporter: SharedProgressReporter,
}

impl<C: HttpClient + ?Sized> DownloadWorker<C> {
    pub fn new(
        client: Arc<C>,
        taggers: Arc<TaggerRegistry>,
        options: WorkerOptions,
        reporter: SharedProgressReporter,
    ) -> Self {
        Self {
            client,
            taggers,
            options,
            reporter,
        }
    }

    /// Drain the queue until it is closed and empty
    pub async fn run(self, mut jobs: JobReceiver) -> WorkerSummary {
        tracing::debug!("download task starting");
        let mut summary = WorkerSummary::default();
        let mut job_index = 0;

        while let Some(job) = jobs.next().await {
            match self.process(job_index, &job).await {
                Ok(tagged) => {
                    summary.downloaded += 1;
                    if tagged {
                        summary.tagged += 1;
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    summary
                        .failed_jobs
                        .push((job.episode.title.clone(), e.to_string()));
                }
            }
            job_index += 1;

            tokio::time::sleep(self.options.pacing).await;
        }

        tracing::debug!("all downloads complete, download task finishing");
        summary
    }

    /// Download one job and tag it. Returns whether the file was tagged.
    async fn process(&self, job_index: usize, job: &DownloadJob) -> Result<bool, DownloadError> {
        tracing::debug!(url = %job.url, path = %job.destination.display(), "beginning download");

        let bytes = self.fetch_with_retry(job_index, job).await.inspect_err(|e| {
            tracing::error!(url = %job.url, path = %job.destination.display(), error = %e, "download failed");
            self.reporter.report(ProgressEvent::DownloadFailed {
                job_index,
                episode_title: job.episode.title.clone(),
                error: e.to_string(),
            });
        })?;

        tracing::info!(bytes, path = %job.destination.display(), "downloaded");

        if !self.options.tagging {
            return Ok(false);
        }
        Ok(self.tag(job).await)
    }

    async fn fetch_with_retry(&self, job_index: usize, job: &DownloadJob) -> Result<u64, DownloadError> {
        let context = DownloadContext {
            job_index,
            episode_title: job.episode.title.clone(),
        };
        let mut attempt = 1;

        loop {
            let result = download_episode(
                self.client.as_ref(),
                &job.url,
                &job.destination,
                &context,
                &self.reporter,
            )
            .await;

            match result {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    let Some(delay) = self.options.retry.next_delay(attempt, &e) else {
                        return Err(e);
                    };
                    tracing::warn!(
                        url = %job.url,
                        error = %e,
                        attempt,
                        delay_secs = delay.as_secs_f64(),
                        "download attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Fetch artwork, tag the media file and clean up. Never fails the job.
    async fn tag(&self, job: &DownloadJob) -> bool {
        let media = &job.destination;
        let Some(tagger) = self.taggers.tagger_for(media) else {
            tracing::info!(container = %container_of(media), path = %media.display(), "unsupported audio container, not tagging");
            return false;
        };

        let cover_file = job.episode.image_url.as_ref().map(|_| cover_path(media));
        let cover = match (&job.episode.image_url, &cover_file) {
            (Some(image_url), Some(path)) => self.fetch_cover(image_url, path).await,
            _ => None,
        };

        let metadata = TagMetadata::from_episode(&job.episode, cover);
        let tagged = match tagger.tag(media, &metadata).await {
            Ok(()) => {
                tracing::info!(tagger = tagger.name(), path = %media.display(), "tagged");
                true
            }
            Err(e) => {
                tracing::error!(path = %media.display(), error = %e, "tagging failed");
                false
            }
        };

        if let Some(path) = cover_file {
            remove_cover(&path).await;
        }

        tagged
    }

    async fn fetch_cover(&self, url: &str, path: &Path) -> Option<PathBuf> {
        match download_file(self.client.as_ref(), url, path).await {
            Ok(_) => Some(path.to_path_buf()),
            Err(e) => {
                tracing::warn!(url, error = %e, "can't download artwork, tagging without cover");
                None
            }
        }
    }
}

/// Artwork is stored next to the media as `<file>.jpg` while tagging
pub fn cover_path(media: &Path) -> PathBuf {
    let mut name = OsString::from(media.as_os_str());
    name.push(".jpg");
    PathBuf::from(name)
}

async fn remove_cover(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "can't remove artwork"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::queue::job_queue;
    use crate::error::TagError;
    use crate::feed::{Enclosure, Episode};
    use crate::http::{ByteStream, BytesResponse, HttpResponse};
    use crate::progress::NoopReporter;
    use crate::progress::testing::RecordingReporter;
    use crate::tag::Tagger;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Serves fixed bodies by URL; unknown URLs get a 404. Statuses listed in
    /// `failures` are returned (once each) before the body is served.
    #[derive(Default)]
    struct MockHttpClient {
        bodies: HashMap<String, Vec<u8>>,
        failures: Mutex<HashMap<String, Vec<u16>>>,
        requests: AtomicUsize,
    }

    impl MockHttpClient {
        fn with(mut self, url: &str, body: &[u8]) -> Self {
            self.bodies.insert(url.to_string(), body.to_vec());
            self
        }

        fn failing_first(self, url: &str, statuses: &[u16]) -> Self {
            self.failures
                .lock()
                .unwrap()
                .insert(url.to_string(), statuses.to_vec());
            self
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_bytes(&self, _url: &str) -> Result<BytesResponse, reqwest::Error> {
            unreachable!("the worker only streams")
        }

        async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
            self.requests.fetch_add(1, Ordering::SeqCst);

            let injected = self
                .failures
                .lock()
                .unwrap()
                .get_mut(url)
                .and_then(|statuses| (!statuses.is_empty()).then(|| statuses.remove(0)));

            let (status, data) = match (injected, self.bodies.get(url)) {
                (Some(status), _) => (status, Vec::new()),
                (None, Some(body)) => (200, body.clone()),
                (None, None) => (404, Vec::new()),
            };
            let len = data.len() as u64;
            let stream: ByteStream =
                Box::pin(futures::stream::once(async move { Ok(Bytes::from(data)) }));

            Ok(HttpResponse {
                status,
                content_length: Some(len),
                body: stream,
            })
        }
    }

    /// Records tagging calls and whether the cover existed at that moment
    #[derive(Default)]
    struct RecordingTagger {
        calls: Mutex<Vec<(PathBuf, Option<PathBuf>, bool)>>,
        fail: bool,
    }

    #[async_trait]
    impl Tagger for RecordingTagger {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn tag(&self, media: &Path, metadata: &TagMetadata) -> Result<(), TagError> {
            let cover_present = metadata.cover.as_ref().is_some_and(|c| c.exists());
            self.calls
                .lock()
                .unwrap()
                .push((media.to_path_buf(), metadata.cover.clone(), cover_present));
            if self.fail {
                return Err(TagError::ToolFailed {
                    tool: "recording".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "nope".to_string(),
                });
            }
            Ok(())
        }
    }

    fn job(dir: &Path, name: &str, image_url: Option<&str>) -> DownloadJob {
        let url = format!("https://example.com/{name}");
        DownloadJob {
            url: url.clone(),
            destination: dir.join("Feed").join(name),
            episode: Episode {
                title: name.to_string(),
                description: Some("desc".to_string()),
                pub_date: None,
                guid: None,
                author: None,
                category: None,
                duration: None,
                enclosure: Enclosure {
                    url,
                    mime_type: None,
                },
                image_url: image_url.map(String::from),
                feed_title: "Feed".to_string(),
            },
        }
    }

    fn options(pacing_ms: u64) -> WorkerOptions {
        WorkerOptions {
            pacing: Duration::from_millis(pacing_ms),
            retry: RetryPolicy::default(),
            tagging: true,
        }
    }

    fn registry_with(tagger: Arc<RecordingTagger>) -> Arc<TaggerRegistry> {
        let mut registry = TaggerRegistry::new();
        registry.register("mp3", tagger);
        Arc::new(registry)
    }

    async fn run_jobs(
        worker: DownloadWorker<MockHttpClient>,
        jobs: Vec<DownloadJob>,
    ) -> WorkerSummary {
        let (tx, rx) = job_queue(jobs.len().max(1));
        for job in jobs {
            tx.submit(job).await.unwrap();
        }
        tx.close();
        worker.run(rx).await
    }

    #[test]
    fn default_pacing_is_two_seconds() {
        assert_eq!(WorkerOptions::default().pacing, Duration::from_secs(2));
    }

    #[test]
    fn cover_path_appends_jpg() {
        assert_eq!(
            cover_path(Path::new("/a/42.mp3")),
            PathBuf::from("/a/42.mp3.jpg")
        );
    }

    #[tokio::test]
    async fn failed_job_does_not_stop_the_queue() {
        let dir = tempdir().unwrap();
        let client = MockHttpClient::default().with("https://example.com/b.mp3", b"bbb");

        let worker = DownloadWorker::new(
            Arc::new(client),
            Arc::new(TaggerRegistry::new()),
            options(1),
            NoopReporter::shared(),
        );

        let summary = run_jobs(
            worker,
            vec![job(dir.path(), "a.mp3", None), job(dir.path(), "b.mp3", None)],
        )
        .await;

        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failed_jobs[0].0, "a.mp3");
        assert!(!dir.path().join("Feed/a.mp3").exists());
        assert_eq!(std::fs::read(dir.path().join("Feed/b.mp3")).unwrap(), b"bbb");
    }

    #[tokio::test]
    async fn jobs_are_paced_and_processed_in_order() {
        let dir = tempdir().unwrap();
        let client = MockHttpClient::default()
            .with("https://example.com/1.mp3", b"1")
            .with("https://example.com/2.mp3", b"2")
            .with("https://example.com/3.mp3", b"3");
        let recorder = Arc::new(RecordingReporter::default());

        let worker = DownloadWorker::new(
            Arc::new(client),
            Arc::new(TaggerRegistry::new()),
            options(150),
            recorder.clone(),
        );

        run_jobs(
            worker,
            vec![
                job(dir.path(), "1.mp3", None),
                job(dir.path(), "2.mp3", None),
                job(dir.path(), "3.mp3", None),
            ],
        )
        .await;

        let titles: Vec<String> = recorder
            .events()
            .into_iter()
            .filter_map(|(_, e)| match e {
                ProgressEvent::DownloadStarting { episode_title, .. } => Some(episode_title),
                _ => None,
            })
            .collect();
        assert_eq!(titles, vec!["1.mp3", "2.mp3", "3.mp3"]);

        let starts = recorder.download_starts();
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(150));
        }
    }

    #[tokio::test]
    async fn failed_job_is_followed_by_pacing() {
        let dir = tempdir().unwrap();
        let client = MockHttpClient::default().with("https://example.com/ok.mp3", b"ok");
        let recorder = Arc::new(RecordingReporter::default());

        let worker = DownloadWorker::new(
            Arc::new(client),
            Arc::new(TaggerRegistry::new()),
            options(150),
            recorder.clone(),
        );

        run_jobs(
            worker,
            vec![job(dir.path(), "gone.mp3", None), job(dir.path(), "ok.mp3", None)],
        )
        .await;

        let events = recorder.events();
        let failed_at = events
            .iter()
            .find(|(_, e)| matches!(e, ProgressEvent::DownloadFailed { .. }))
            .map(|(at, _)| *at)
            .unwrap();
        let starts = recorder.download_starts();

        assert_eq!(starts.len(), 1, "the 404 fails before starting");
        assert!(starts[0] - failed_at >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let dir = tempdir().unwrap();
        let client = Arc::new(
            MockHttpClient::default()
                .with("https://example.com/r.mp3", b"ok")
                .failing_first("https://example.com/r.mp3", &[503, 502]),
        );
        let mut opts = options(1);
        opts.retry = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(10),
        };

        let worker = DownloadWorker::new(
            client.clone(),
            Arc::new(TaggerRegistry::new()),
            opts,
            NoopReporter::shared(),
        );
        let summary = run_jobs(worker, vec![job(dir.path(), "r.mp3", None)]).await;

        assert_eq!(summary.downloaded, 1);
        assert_eq!(client.requests.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let dir = tempdir().unwrap();
        let client = Arc::new(MockHttpClient::default());
        let mut opts = options(1);
        opts.retry = RetryPolicy::with_retries(4);

        let worker = DownloadWorker::new(
            client.clone(),
            Arc::new(TaggerRegistry::new()),
            opts,
            NoopReporter::shared(),
        );
        let summary = run_jobs(worker, vec![job(dir.path(), "gone.mp3", None)]).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(client.requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn artwork_is_passed_to_tagger_and_removed() {
        let dir = tempdir().unwrap();
        let client = MockHttpClient::default()
            .with("https://example.com/42.mp3", b"audio")
            .with("https://example.com/42.jpg", b"jpeg");
        let tagger = Arc::new(RecordingTagger::default());

        let worker = DownloadWorker::new(
            Arc::new(client),
            registry_with(tagger.clone()),
            options(1),
            NoopReporter::shared(),
        );
        let summary = run_jobs(
            worker,
            vec![job(dir.path(), "42.mp3", Some("https://example.com/42.jpg"))],
        )
        .await;

        assert_eq!(summary.tagged, 1);
        let calls = tagger.calls.lock().unwrap();
        let media = dir.path().join("Feed/42.mp3");
        assert_eq!(calls[0].0, media);
        assert_eq!(calls[0].1, Some(cover_path(&media)));
        assert!(calls[0].2, "cover should exist while tagging");
        assert!(!cover_path(&media).exists(), "cover should be removed afterwards");
    }

    #[tokio::test]
    async fn missing_artwork_still_tags() {
        let dir = tempdir().unwrap();
        let client = MockHttpClient::default().with("https://example.com/42.mp3", b"audio");
        let tagger = Arc::new(RecordingTagger::default());

        let worker = DownloadWorker::new(
            Arc::new(client),
            registry_with(tagger.clone()),
            options(1),
            NoopReporter::shared(),
        );
        let summary = run_jobs(
            worker,
            vec![job(dir.path(), "42.mp3", Some("https://example.com/missing.jpg"))],
        )
        .await;

        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.tagged, 1);
        assert_eq!(tagger.calls.lock().unwrap()[0].1, None);
    }

    #[tokio::test]
    async fn tagging_failure_keeps_download() {
        let dir = tempdir().unwrap();
        let client = MockHttpClient::default().with("https://example.com/42.mp3", b"audio");
        let tagger = Arc::new(RecordingTagger {
            fail: true,
            ..Default::default()
        });

        let worker = DownloadWorker::new(
            Arc::new(client),
            registry_with(tagger),
            options(1),
            NoopReporter::shared(),
        );
        let summary = run_jobs(worker, vec![job(dir.path(), "42.mp3", None)]).await;

        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.tagged, 0);
        assert_eq!(summary.failed, 0);
        assert!(dir.path().join("Feed/42.mp3").exists());
    }

    #[tokio::test]
    async fn unsupported_container_skips_artwork() {
        let dir = tempdir().unwrap();
        let client = Arc::new(
            MockHttpClient::default()
                .with("https://example.com/42.opus", b"audio")
                .with("https://example.com/42.jpg", b"jpeg"),
        );
        let tagger = Arc::new(RecordingTagger::default());

        let worker = DownloadWorker::new(
            client.clone(),
            registry_with(tagger.clone()),
            options(1),
            NoopReporter::shared(),
        );
        let summary = run_jobs(
            worker,
            vec![job(dir.path(), "42.opus", Some("https://example.com/42.jpg"))],
        )
        .await;

        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.tagged, 0);
        assert!(tagger.calls.lock().unwrap().is_empty());
        assert_eq!(client.requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tagging_can_be_disabled() {
        let dir = tempdir().unwrap();
        let client = MockHttpClient::default().with("https://example.com/42.mp3", b"audio");
        let tagger = Arc::new(RecordingTagger::default());
        let mut opts = options(1);
        opts.tagging = false;

        let worker = DownloadWorker::new(
            Arc::new(client),
            registry_with(tagger.clone()),
            opts,
            NoopReporter::shared(),
        );
        run_jobs(worker, vec![job(dir.path(), "42.mp3", None)]).await;

        assert!(tagger.calls.lock().unwrap().is_empty());
    }
}
