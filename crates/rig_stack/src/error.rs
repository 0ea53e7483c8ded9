//! Error types for the blend stack
//!
//! Only contract breaches surface as errors. The degraded conditions a
//! frame can recover from (unresolvable contexts, invalid upstream
//! results, state-count mismatches on load) are warnings plus local
//! recovery, not `Err`.

use thiserror::Error;

use crate::entry::EntryId;

/// Errors that can occur operating a blend stack
#[derive(Debug, Error)]
pub enum StackError {
    #[error("no entry with id {0}")]
    EntryNotFound(EntryId),

    #[error("failed to decode stack state: {0}")]
    StateDecode(String),

    #[error("failed to encode stack state: {0}")]
    StateEncode(String),
}

/// Result type for stack operations
pub type StackResult<T> = Result<T, StackError>;
