use std::path::PathBuf;

use thiserror::Error;

use crate::parser::blocks::MarkerIssue;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unbalanced markers in {}: {}", path.display(), join_issues(issues))]
    Malformed { path: PathBuf, issues: Vec<MarkerIssue> },

    #[error("failed to write {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn join_issues(issues: &[MarkerIssue]) -> String {
    issues.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("; ")
}

pub type Result<T> = std::result::Result<T, Error>;
