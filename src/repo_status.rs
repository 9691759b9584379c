// src/repo_status.rs
use std::path::PathBuf;

use git2::Repository;

/// What the `list` command reports about one configured repository.
#[derive(Debug)]
pub struct RepoStatus {
    pub path: PathBuf,
    pub exists: bool,
    pub is_git_repo: bool,
}

impl RepoStatus {
    pub fn of(path: &str) -> Self {
        let path = PathBuf::from(path);
        let exists = path.exists();
        let is_git_repo = exists && Repository::open(&path).map(|r| !r.is_bare()).unwrap_or(false);
        Self {
            path,
            exists,
            is_git_repo,
        }
    }
}
