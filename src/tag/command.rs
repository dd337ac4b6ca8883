// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ffi::OsString;
use std::path::Path;

use tokio::process::Command;

use crate::error::TagError;

/// Run an external tool to completion, returning its stdout.
///
/// A non-zero exit status is an error carrying the tool's stderr.
pub(super) async fn run_tool(program: &Path, args: &[OsString]) -> Result<String, TagError> {
    let tool = program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string());

    tracing::debug!(tool = %tool, ?args, "running tagger");

    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| TagError::ToolSpawnFailed {
            tool: tool.clone(),
            source: e,
        })?;

    if !output.status.success() {
        return Err(TagError::ToolFailed {
            tool,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    tracing::debug!(tool = %tool, output = %stdout.trim(), "tagger finished");
    Ok(stdout)
}

/// Build a `key=value` argument
pub(super) fn assignment(key: &str, value: impl AsRef<std::ffi::OsStr>) -> OsString {
    let mut arg = OsString::from(key);
    arg.push("=");
    arg.push(value);
    arg
}
