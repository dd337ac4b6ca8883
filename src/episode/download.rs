// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::DownloadError;
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Identifies a download for progress reporting
#[derive(Debug, Clone)]
pub struct DownloadContext {
    /// Position of the job in the worker's processing order
    pub job_index: usize,
    pub episode_title: String,
}

/// Download an episode's media to `output_path`.
///
/// The body is streamed into `<output_path>.partial` and renamed into place
/// once complete, so an existing file is only replaced by a full download.
/// Returns the number of bytes downloaded on success.
pub async fn download_episode<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    output_path: &Path,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<u64, DownloadError> {
    if let Some(dir) = output_path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| DownloadError::CreateDirectoryFailed {
                path: dir.to_path_buf(),
                source: e,
            })?;
    }

    let partial_path = partial_path(output_path);

    let result = stream_to_file(client, url, &partial_path, |event| {
        reporter.report(match event {
            StreamEvent::Started { content_length } => ProgressEvent::DownloadStarting {
                job_index: context.job_index,
                episode_title: context.episode_title.clone(),
                content_length,
            },
            StreamEvent::Progress {
                bytes_downloaded,
                total_bytes,
            } => ProgressEvent::DownloadProgress {
                job_index: context.job_index,
                bytes_downloaded,
                total_bytes,
            },
        })
    })
    .await;

    let bytes_downloaded = match result {
        Ok(bytes) => bytes,
        Err(e) => {
            remove_partial(&partial_path).await;
            return Err(e);
        }
    };

    if let Err(e) = tokio::fs::rename(&partial_path, output_path).await {
        remove_partial(&partial_path).await;
        return Err(DownloadError::FinalizeFailed {
            path: output_path.to_path_buf(),
            source: e,
        });
    }

    reporter.report(ProgressEvent::DownloadCompleted {
        job_index: context.job_index,
        episode_title: context.episode_title.clone(),
        bytes_downloaded,
    });

    Ok(bytes_downloaded)
}

/// Download a small auxiliary file, such as cover art, straight to `output_path`
pub async fn download_file<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    output_path: &Path,
) -> Result<u64, DownloadError> {
    stream_to_file(client, url, output_path, |_| {}).await
}

/// Path used while a download is in flight
pub fn partial_path(output_path: &Path) -> PathBuf {
    let mut name = output_path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".partial");
    output_path.with_file_name(name)
}

enum StreamEvent {
    Started { content_length: Option<u64> },
    Progress { bytes_downloaded: u64, total_bytes: Option<u64> },
}

async fn stream_to_file<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    output_path: &Path,
    mut on_event: impl FnMut(StreamEvent),
) -> Result<u64, DownloadError> {
    let response = client
        .get_stream(url)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    if response.status >= 400 {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    on_event(StreamEvent::Started {
        content_length: response.content_length,
    });

    let mut file = File::create(output_path)
        .await
        .map_err(|e| DownloadError::FileCreateFailed {
            path: output_path.to_path_buf(),
            source: e,
        })?;

    let write_failed = |e| DownloadError::FileWriteFailed {
        path: output_path.to_path_buf(),
        source: e,
    };

    let mut bytes_downloaded: u64 = 0;
    let mut stream = response.body;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        file.write_all(&chunk).await.map_err(write_failed)?;
        bytes_downloaded += chunk.len() as u64;

        on_event(StreamEvent::Progress {
            bytes_downloaded,
            total_bytes: response.content_length,
        });
    }

    file.flush().await.map_err(write_failed)?;
    file.sync_all().await.map_err(write_failed)?;

    Ok(bytes_downloaded)
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "can't remove partial download");
    }
}
