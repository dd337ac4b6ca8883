// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod queue;
mod retry;
mod worker;

pub use queue::{DEFAULT_QUEUE_CAPACITY, DownloadJob, JobReceiver, JobSender, QueueClosed, job_queue};
pub use retry::RetryPolicy;
pub use worker::{DEFAULT_PACING, DownloadWorker, WorkerOptions, WorkerSummary, cover_path};
