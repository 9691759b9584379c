pub mod classify;
pub mod config;
pub mod diff_watch;
pub mod executor;
pub mod git_ops;
pub mod repo_select;
pub mod repo_status;
