use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use git2::Repository;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::Config;

/// Turn the ambient selection into concrete working-tree roots: explicit
/// command-line paths win, otherwise the config's default list. A path that
/// is itself a repository is taken as-is; a plain directory is scanned for
/// repositories underneath it, bounded by `scan_max_depth`.
pub fn resolve(args: &[String], config: &Config) -> Result<Vec<PathBuf>> {
    let requested: Vec<String> = if args.is_empty() {
        config.repos.clone()
    } else {
        args.to_vec()
    };
    if requested.is_empty() {
        bail!(
            "no repositories selected; pass paths on the command line or add some with \
             `ide-reset watch <path>`"
        );
    }

    let mut selected = Vec::new();
    for raw in &requested {
        let path = fs::canonicalize(raw)
            .with_context(|| format!("cannot resolve selected path {raw}"))?;

        if is_working_tree(&path) {
            selected.push(path);
            continue;
        }
        if !path.is_dir() {
            bail!("{} is not a git repository", path.display());
        }

        let found = scan(&path, config.scan_max_depth);
        if found.is_empty() {
            bail!("no git repositories found under {}", path.display());
        }
        debug!(root = %path.display(), count = found.len(), "expanded directory selection");
        selected.extend(found);
    }

    // The same repository may arrive via several arguments; process it once.
    let mut seen = std::collections::BTreeSet::new();
    selected.retain(|path| seen.insert(path.clone()));
    Ok(selected)
}

/// A non-bare repository rooted exactly at `path`. No upward discovery:
/// selecting a subdirectory of a repository is a user error, not a match.
fn is_working_tree(path: &Path) -> bool {
    Repository::open(path).map(|r| !r.is_bare()).unwrap_or(false)
}

fn scan(root: &Path, max_depth: u8) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut walker = WalkDir::new(root)
        .max_depth(max_depth as usize)
        .into_iter();
    loop {
        let entry = match walker.next() {
            Some(Ok(entry)) => entry,
            Some(Err(_)) => continue,
            None => break,
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        if entry.path().join(".git").exists() {
            found.push(entry.path().to_path_buf());
            // Nested repositories below this one belong to it, not to us.
            walker.skip_current_dir();
        }
    }
    found.sort();
    found
}
