//! Fatal error kinds shared across maku.

use thiserror::Error;

/// Result type for maku operations.
pub type MakuResult<T> = Result<T, MakuError>;

/// Fatal build errors.
///
/// Every kind aborts the build; nothing is retried. The CLI prints a single
/// diagnostic line and exits with a non-zero status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MakuError {
    #[error("rule file not found: {0}")]
    MissingRuleFile(String),
    #[error("duplicate rule name: {0}")]
    DuplicateRule(String),
    #[error("unknown dependency: {dep} (required by {rule})")]
    UnknownDependency { rule: String, dep: String },
    #[error("phony name does not match any rule: {0}")]
    UnknownPhony(String),
    #[error("target not found: {0}")]
    UnknownTarget(String),
    #[error("graph cache not found")]
    CacheMissing,
    #[error("graph cache is empty")]
    CacheEmpty,
    #[error("graph cache corrupted: {0}")]
    CacheCorrupt(String),
    #[error("graph cache version mismatch: found {found}, expected {expected}")]
    CacheVersionMismatch { found: u32, expected: u32 },
    #[error("graph cache corrupted: size mismatch")]
    SizeMismatch,
    #[error("{0} too large for u32 length prefix")]
    EncodeOverflow(&'static str),
    #[error("command failed for target {target} (exit code {code})")]
    CommandFailed { target: String, code: i32 },
    #[error("cycle detected in dependency graph")]
    CycleDetected,
    #[error("dependency output missing: {0}")]
    DependencyOutputMissing(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for MakuError {
    fn from(err: std::io::Error) -> Self {
        MakuError::Io(err.to_string())
    }
}
