use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::classify;
use crate::diff_watch::{DiffHandle, WaitError};
use crate::git_ops::WorkTreeOps;

/// One repository queued for processing: its working-tree root and the
/// handle that resolves once its index diff has been computed.
pub struct PendingRepo {
    pub workdir: PathBuf,
    pub handle: DiffHandle,
}

/// Totals for the terminal status line. Counts only; which files were
/// touched is in the log.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub repos_processed: usize,
    pub files_reverted: usize,
    pub files_deleted: usize,
}

/// Why a run aborted. The first failure wins; repositories earlier in the
/// sequence keep whatever was already applied (no rollback), repositories
/// after the failing one are never looked at.
#[derive(Debug)]
pub enum ResetError {
    /// The run was cancelled while waiting on this repository's diff.
    Cancelled { workdir: PathBuf },
    /// This repository's diff never arrived within the bounded wait.
    TimedOut { workdir: PathBuf, waited: Duration },
    /// The diff could not be obtained for another reason (computation
    /// failed, or the notifying side vanished).
    DiffUnavailable { workdir: PathBuf, source: WaitError },
    /// The revert or delete operation itself failed.
    Operation {
        workdir: PathBuf,
        source: anyhow::Error,
    },
}

impl fmt::Display for ResetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetError::Cancelled { workdir } => {
                write!(f, "cancelled while waiting on {}", workdir.display())
            }
            ResetError::TimedOut { workdir, waited } => write!(
                f,
                "no diff for {} within {}s",
                workdir.display(),
                waited.as_secs()
            ),
            ResetError::DiffUnavailable { workdir, source } => {
                write!(f, "diff unavailable for {}: {source}", workdir.display())
            }
            ResetError::Operation { workdir, source } => {
                write!(f, "reset failed in {}: {source:#}", workdir.display())
            }
        }
    }
}

impl std::error::Error for ResetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResetError::DiffUnavailable { source, .. } => Some(source),
            ResetError::Operation { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Process the queued repositories strictly in order. For each one: wait for
/// its diff, pick out the config files, revert the modified ones and delete
/// the untracked ones. Fail-fast across the sequence.
pub async fn run(
    pending: Vec<PendingRepo>,
    ops: Arc<dyn WorkTreeOps>,
    timeout: Duration,
    mut cancel: watch::Receiver<bool>,
) -> Result<RunReport, ResetError> {
    let mut report = RunReport::default();

    for repo in pending {
        let PendingRepo { workdir, handle } = repo;

        let snapshot = match handle.wait(timeout, &mut cancel).await {
            Ok(snapshot) => snapshot,
            Err(WaitError::Cancelled) => return Err(ResetError::Cancelled { workdir }),
            Err(WaitError::TimedOut(waited)) => {
                return Err(ResetError::TimedOut { workdir, waited })
            }
            Err(source) => return Err(ResetError::DiffUnavailable { workdir, source }),
        };

        let part = classify::partition(&snapshot);
        report.repos_processed += 1;
        if part.is_empty() {
            debug!(workdir = %workdir.display(), "no config files to reset");
            continue;
        }

        let revert_paths: Vec<PathBuf> =
            part.revert.iter().map(|rel| workdir.join(rel)).collect();
        let delete_paths: Vec<PathBuf> =
            part.delete.iter().map(|rel| workdir.join(rel)).collect();

        if !revert_paths.is_empty() {
            info!(
                workdir = %workdir.display(),
                files = ?part.revert,
                "reverting modified config files"
            );
            ops.discard(&workdir, &revert_paths)
                .map_err(|source| ResetError::Operation {
                    workdir: workdir.clone(),
                    source,
                })?;
            report.files_reverted += revert_paths.len();
        }

        if !delete_paths.is_empty() {
            info!(
                workdir = %workdir.display(),
                files = ?part.delete,
                "deleting untracked config files"
            );
            ops.delete(&workdir, &delete_paths)
                .map_err(|source| ResetError::Operation {
                    workdir: workdir.clone(),
                    source,
                })?;
            report.files_deleted += delete_paths.len();
        }
    }

    Ok(report)
}
