// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::EpisodeError;

/// How long an existing download is trusted before it is assumed to be a
/// rerun and fetched again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StalenessPolicy {
    /// Grace period in days. Zero or less disables overwriting.
    pub max_age_days: i64,
}

impl StalenessPolicy {
    pub fn new(max_age_days: i64) -> Self {
        Self { max_age_days }
    }

    pub fn enabled(&self) -> bool {
        self.max_age_days > 0
    }

    pub fn max_age(&self) -> TimeDelta {
        TimeDelta::try_days(self.max_age_days).unwrap_or(TimeDelta::MAX)
    }
}

/// What to do with an episode's destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalenessDecision {
    /// Nothing is there yet
    Download,
    /// The existing file is older than the grace period
    Overwrite { age: TimeDelta },
    /// The existing file is kept. `age` is only computed when overwriting is enabled.
    Skip { age: Option<TimeDelta> },
}

impl StalenessDecision {
    pub fn should_download(&self) -> bool {
        !matches!(self, StalenessDecision::Skip { .. })
    }
}

/// Decide whether an episode's destination needs (re)downloading.
///
/// `existing_modified` is `None` when the destination does not exist.
pub fn evaluate(
    existing_modified: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    policy: StalenessPolicy,
) -> StalenessDecision {
    let Some(modified) = existing_modified else {
        return StalenessDecision::Download;
    };

    if !policy.enabled() {
        return StalenessDecision::Skip { age: None };
    }

    let age = round_to_seconds((now - modified).max(TimeDelta::zero()));
    if age > policy.max_age() {
        StalenessDecision::Overwrite { age }
    } else {
        StalenessDecision::Skip { age: Some(age) }
    }
}

/// Look up the modification time of a destination.
///
/// A missing file is `Ok(None)`. Any other stat failure is an error rather
/// than a reason to download.
pub async fn probe_destination(path: &Path) -> Result<Option<DateTime<Utc>>, EpisodeError> {
    let stat_failed = |source| EpisodeError::StatFailed {
        path: path.to_path_buf(),
        source,
    };

    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            let modified = metadata.modified().map_err(stat_failed)?;
            Ok(Some(DateTime::<Utc>::from(modified)))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(stat_failed(e)),
    }
}

fn round_to_seconds(delta: TimeDelta) -> TimeDelta {
    let millis = delta.num_milliseconds();
    TimeDelta::seconds((millis + 500) / 1000)
}
