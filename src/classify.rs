use crate::diff_watch::DiffSnapshot;

/// Files that are reverted to their committed content when they show up as
/// modified. These are the descriptor files Eclipse-style IDEs rewrite on
/// import/refresh.
pub const REVERT_SUFFIXES: [&str; 6] = [
    ".classpath",
    ".project",
    "org.eclipse.wst.common.component",
    "org.eclipse.jdt.core.prefs",
    "org.eclipse.core.resources.prefs",
    "org.eclipse.wst.common.project.facet.core.xml",
];

/// Files that are deleted outright when they show up as untracked. These are
/// generated on validation/facet refresh and never belong in the repository.
pub const DELETE_SUFFIXES: [&str; 2] = [
    "org.eclipse.wst.validation.prefs",
    "org.eclipse.wst.common.project.facet.core.prefs.xml",
];

/// Literal, case-sensitive trailing match. No glob or regex semantics.
pub fn is_revert_candidate(relative_path: &str) -> bool {
    REVERT_SUFFIXES.iter().any(|s| relative_path.ends_with(s))
}

pub fn is_delete_candidate(relative_path: &str) -> bool {
    DELETE_SUFFIXES.iter().any(|s| relative_path.ends_with(s))
}

/// The subsets of a diff snapshot this tool acts on: modified paths to
/// revert and untracked paths to delete. Paths stay workdir-relative and
/// sorted; resolution to absolute paths happens in the executor.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Partition {
    pub revert: Vec<String>,
    pub delete: Vec<String>,
}

impl Partition {
    pub fn is_empty(&self) -> bool {
        self.revert.is_empty() && self.delete.is_empty()
    }
}

pub fn partition(snapshot: &DiffSnapshot) -> Partition {
    Partition {
        revert: snapshot
            .modified
            .iter()
            .filter(|p| is_revert_candidate(p))
            .cloned()
            .collect(),
        delete: snapshot
            .untracked
            .iter()
            .filter(|p| is_delete_candidate(p))
            .cloned()
            .collect(),
    }
}
