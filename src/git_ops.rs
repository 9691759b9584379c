use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use git2::build::CheckoutBuilder;
use git2::Repository;
use tracing::info;

/// The two working-tree operations the executor invokes. Both take absolute
/// paths that live under `workdir`; implementations derive the
/// workdir-relative pathspecs themselves.
pub trait WorkTreeOps: Send + Sync {
    /// Restore the listed files to their committed (HEAD) content,
    /// discarding local edits.
    fn discard(&self, workdir: &Path, paths: &[PathBuf]) -> Result<()>;

    /// Remove the listed files from the working tree and, where tracked,
    /// from the index.
    fn delete(&self, workdir: &Path, paths: &[PathBuf]) -> Result<()>;
}

/// git2-backed implementation used by the binary.
pub struct GitWorkTree;

impl WorkTreeOps for GitWorkTree {
    fn discard(&self, workdir: &Path, paths: &[PathBuf]) -> Result<()> {
        let repo = Repository::open(workdir)
            .with_context(|| format!("failed to open repository at {}", workdir.display()))?;

        let mut checkout = CheckoutBuilder::new();
        checkout.force().update_index(true);
        for path in paths {
            checkout.path(relative_to(workdir, path)?);
        }
        repo.checkout_head(Some(&mut checkout))
            .with_context(|| format!("failed to discard changes in {}", workdir.display()))?;

        info!(
            workdir = %workdir.display(),
            count = paths.len(),
            "reverted config files to committed state"
        );
        Ok(())
    }

    fn delete(&self, workdir: &Path, paths: &[PathBuf]) -> Result<()> {
        let repo = Repository::open(workdir)
            .with_context(|| format!("failed to open repository at {}", workdir.display()))?;
        let mut index = repo
            .index()
            .with_context(|| format!("failed to open index of {}", workdir.display()))?;

        let mut index_changed = false;
        for path in paths {
            let rel = relative_to(workdir, path)?;
            fs::remove_file(path)
                .with_context(|| format!("failed to delete {}", path.display()))?;
            // Untracked files have no index entry; only drop the ones that do.
            if index.get_path(rel, 0).is_some() {
                index
                    .remove_path(rel)
                    .with_context(|| format!("failed to unstage {}", rel.display()))?;
                index_changed = true;
            }
        }
        if index_changed {
            index.write().context("failed to write index")?;
        }

        info!(
            workdir = %workdir.display(),
            count = paths.len(),
            "deleted untracked config files"
        );
        Ok(())
    }
}

fn relative_to<'a>(workdir: &Path, path: &'a Path) -> Result<&'a Path> {
    path.strip_prefix(workdir).with_context(|| {
        format!(
            "path {} is outside the working tree {}",
            path.display(),
            workdir.display()
        )
    })
}
