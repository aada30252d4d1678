//! Engine-wide error taxonomy.
//!
//! Authorization failures short-circuit before any business logic runs.
//! Domain failures carry enough structure for the caller to act on them;
//! store failures are surfaced generically at the HTTP boundary.

use thiserror::Error;

use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("missing or invalid bearer credential")]
    Unauthenticated,

    /// Credential verified but no local account profile exists.
    #[error("no account profile for verified identity")]
    ProfileMissing,

    #[error("insufficient privileges")]
    Forbidden,

    #[error("course does not exist")]
    InvalidCourse,

    #[error("target is neither a known account id nor a usable email")]
    InvalidTarget,

    #[error("course progress incomplete: {completed}/{total}")]
    IncompleteProgress { completed: u64, total: u64 },

    #[error("enrollment access window has closed")]
    AccessExpired,

    #[error("could not generate a unique validation code")]
    CodeGenerationFailed,

    #[error("not found")]
    NotFound,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type EngineResult<T> = Result<T, EngineError>;
