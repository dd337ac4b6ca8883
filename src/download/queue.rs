// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::feed::Episode;

/// Maximum number of downloads waiting in the queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 15;

/// One episode to fetch. Created by the feed processor and handed to the
/// worker through the queue; never modified afterwards.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub url: String,
    pub destination: PathBuf,
    pub episode: Episode,
}

/// The queue was closed by the consumer side
#[derive(Debug, thiserror::Error)]
#[error("download queue is closed")]
pub struct QueueClosed(pub Box<DownloadJob>);

/// Producer half of the download queue
#[derive(Debug, Clone)]
pub struct JobSender {
    tx: mpsc::Sender<DownloadJob>,
}

/// Consumer half of the download queue
#[derive(Debug)]
pub struct JobReceiver {
    rx: mpsc::Receiver<DownloadJob>,
}

/// Create a bounded FIFO download queue
pub fn job_queue(capacity: usize) -> (JobSender, JobReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (JobSender { tx }, JobReceiver { rx })
}

impl JobSender {
    /// Add a job, waiting for a free slot while the queue is full
    pub async fn submit(&self, job: DownloadJob) -> Result<(), QueueClosed> {
        self.tx
            .send(job)
            .await
            .map_err(|mpsc::error::SendError(job)| QueueClosed(Box::new(job)))
    }

    /// Signal that no more jobs will follow.
    ///
    /// The queue closes once every clone of the sender is gone.
    pub fn close(self) {
        drop(self);
    }

    /// Number of free slots
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

impl JobReceiver {
    /// Take the oldest job. Returns `None` once the queue is closed and drained.
    pub async fn next(&mut self) -> Option<DownloadJob> {
        self.rx.recv().await
    }
}
