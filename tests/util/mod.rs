use std::fs;
use std::path::{Path, PathBuf};

use git2::{IndexAddOption, Repository, Signature};
use tempfile::TempDir;

/// A throwaway git repository for end-to-end tests. The TempDir cleans up
/// on drop.
pub struct TestRepo {
    _dir: TempDir,
    root: PathBuf,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        // Canonicalize up front: on macOS the temp root is a symlink and the
        // executor joins paths against whatever root it was given.
        let root = fs::canonicalize(dir.path()).expect("failed to canonicalize temp dir");
        Repository::init(&root).expect("failed to init repository");
        Self { _dir: dir, root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        fs::write(path, content).expect("failed to write file");
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.root.join(relative)).expect("failed to read file")
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.root.join(relative).exists()
    }

    pub fn commit_all(&self, message: &str) {
        let repo = Repository::open(&self.root).expect("failed to open repository");
        let mut index = repo.index().expect("failed to open index");
        index
            .add_all(["*"], IndexAddOption::DEFAULT, None)
            .expect("failed to stage files");
        index.write().expect("failed to write index");
        let tree_id = index.write_tree().expect("failed to write tree");
        let tree = repo.find_tree(tree_id).expect("failed to find tree");

        let sig = Signature::now("Test", "test@example.com").expect("failed to build signature");
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        match parent {
            Some(parent) => repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent]),
            None => repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[]),
        }
        .expect("failed to commit");
    }
}
