use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use git2::{Repository, StatusOptions};
use tokio::sync::{oneshot, watch};
use tracing::debug;

/// One computed index/working-tree comparison. Paths are relative to the
/// repository workdir. `deleted` is carried for completeness; only
/// `modified` and `untracked` feed the reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSnapshot {
    pub modified: BTreeSet<String>,
    pub untracked: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
}

impl DiffSnapshot {
    pub fn new<M, U, D>(modified: M, untracked: U, deleted: D) -> Self
    where
        M: IntoIterator,
        M::Item: Into<String>,
        U: IntoIterator,
        U::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            modified: modified.into_iter().map(Into::into).collect(),
            untracked: untracked.into_iter().map(Into::into).collect(),
            deleted: deleted.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.untracked.is_empty() && self.deleted.is_empty()
    }
}

/// Why a wait for a diff snapshot ended without a value.
#[derive(Debug)]
pub enum WaitError {
    /// The cancellation signal fired while waiting.
    Cancelled,
    /// No notification arrived within the bounded wait.
    TimedOut(Duration),
    /// The notifying side went away without ever delivering.
    Dropped,
    /// The diff computation itself failed.
    Diff(git2::Error),
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitError::Cancelled => write!(f, "wait for diff was cancelled"),
            WaitError::TimedOut(t) => {
                write!(f, "no diff notification within {}s", t.as_secs())
            }
            WaitError::Dropped => write!(f, "diff notifier dropped without a result"),
            WaitError::Diff(e) => write!(f, "diff computation failed: {e}"),
        }
    }
}

impl std::error::Error for WaitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WaitError::Diff(e) => Some(e),
            _ => None,
        }
    }
}

/// Sending half of a registration. `notify` consumes the notifier, so a
/// snapshot can be delivered at most once per registered repository.
pub struct DiffNotifier {
    tx: oneshot::Sender<Result<DiffSnapshot, git2::Error>>,
}

impl DiffNotifier {
    pub fn notify(self, snapshot: DiffSnapshot) {
        // The receiver may already be gone (run aborted); nothing to do then.
        let _ = self.tx.send(Ok(snapshot));
    }

    pub fn fail(self, err: git2::Error) {
        let _ = self.tx.send(Err(err));
    }
}

/// Receiving half of a registration, owned by the executor. The slot holds
/// the value even if it was written before `wait` is called.
pub struct DiffHandle {
    rx: oneshot::Receiver<Result<DiffSnapshot, git2::Error>>,
}

impl DiffHandle {
    /// Suspend until the snapshot arrives, the cancellation signal flips to
    /// true, or `timeout` elapses — whichever comes first.
    pub async fn wait(
        self,
        timeout: Duration,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<DiffSnapshot, WaitError> {
        let mut rx = self.rx;
        tokio::select! {
            res = &mut rx => match res {
                Ok(Ok(snapshot)) => Ok(snapshot),
                Ok(Err(e)) => Err(WaitError::Diff(e)),
                Err(_) => Err(WaitError::Dropped),
            },
            _ = cancel_fired(cancel) => Err(WaitError::Cancelled),
            _ = tokio::time::sleep(timeout) => Err(WaitError::TimedOut(timeout)),
        }
    }
}

/// Resolves when the cancel flag becomes true. If the sending side is gone
/// the run can never be cancelled, so pend forever instead of resolving.
async fn cancel_fired(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// A fresh notifier/handle pair. Registration with a tracking service hands
/// the notifier to the service and the handle to the caller.
pub fn slot() -> (DiffNotifier, DiffHandle) {
    let (tx, rx) = oneshot::channel();
    (DiffNotifier { tx }, DiffHandle { rx })
}

/// Register interest in the next index/working-tree diff of the repository
/// at `workdir`. The comparison runs on the blocking pool and fires the
/// returned handle exactly once, with either the snapshot or the failure.
pub fn register(workdir: &Path) -> DiffHandle {
    let (notifier, handle) = slot();
    let workdir: PathBuf = workdir.to_path_buf();
    tokio::task::spawn_blocking(move || match compute_snapshot(&workdir) {
        Ok(snapshot) => {
            debug!(
                workdir = %workdir.display(),
                modified = snapshot.modified.len(),
                untracked = snapshot.untracked.len(),
                "index diff ready"
            );
            notifier.notify(snapshot);
        }
        Err(e) => notifier.fail(e),
    });
    handle
}

fn compute_snapshot(workdir: &Path) -> Result<DiffSnapshot, git2::Error> {
    let repo = Repository::open(workdir)?;
    let statuses = repo.statuses(Some(
        StatusOptions::new()
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false)
            .include_unmodified(false),
    ))?;

    let mut modified = BTreeSet::new();
    let mut untracked = BTreeSet::new();
    let mut deleted = BTreeSet::new();
    for entry in statuses.iter() {
        let Some(path) = entry.path() else { continue };
        let status = entry.status();
        if status.is_wt_new() {
            untracked.insert(path.to_string());
        } else if status.is_wt_deleted() || status.is_index_deleted() {
            deleted.insert(path.to_string());
        } else if status.is_wt_modified() || status.is_index_modified() {
            modified.insert(path.to_string());
        }
    }

    Ok(DiffSnapshot {
        modified,
        untracked,
        deleted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: [&str; 0] = [];

    fn never_cancel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    #[tokio::test]
    async fn notification_before_wait_is_not_lost() {
        let (notifier, handle) = slot();
        notifier.notify(DiffSnapshot::new(["a/.project"], NONE, NONE));

        let (_tx, mut cancel) = never_cancel();
        let snapshot = handle
            .wait(Duration::from_secs(5), &mut cancel)
            .await
            .unwrap();
        assert!(snapshot.modified.contains("a/.project"));
    }

    #[tokio::test]
    async fn notification_after_wait_started_is_delivered() {
        let (notifier, handle) = slot();
        let (_tx, mut cancel) = never_cancel();

        let waiter = tokio::spawn(async move {
            handle.wait(Duration::from_secs(5), &mut cancel).await
        });
        tokio::task::yield_now().await;
        notifier.notify(DiffSnapshot::new(NONE, ["b/notes.txt"], NONE));

        let snapshot = waiter.await.unwrap().unwrap();
        assert!(snapshot.untracked.contains("b/notes.txt"));
    }

    #[tokio::test]
    async fn cancel_wins_over_pending_notification() {
        let (_notifier, handle) = slot();
        let (tx, mut cancel) = never_cancel();
        tx.send(true).unwrap();

        let err = handle
            .wait(Duration::from_secs(5), &mut cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_when_nothing_fires() {
        let (_notifier, handle) = slot();
        let (_tx, mut cancel) = never_cancel();

        let err = handle
            .wait(Duration::from_secs(30), &mut cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::TimedOut(_)));
    }

    #[tokio::test]
    async fn dropped_notifier_surfaces_as_error() {
        let (notifier, handle) = slot();
        drop(notifier);

        let (_tx, mut cancel) = never_cancel();
        let err = handle
            .wait(Duration::from_secs(5), &mut cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::Dropped));
    }

    #[tokio::test]
    async fn dropped_cancel_sender_does_not_cancel() {
        let (notifier, handle) = slot();
        let (tx, mut cancel) = never_cancel();
        drop(tx);
        notifier.notify(DiffSnapshot::new(["x/.classpath"], NONE, NONE));

        let snapshot = handle
            .wait(Duration::from_secs(5), &mut cancel)
            .await
            .unwrap();
        assert!(snapshot.modified.contains("x/.classpath"));
    }
}
