//! Error handling for the statement import pipeline
//!
//! Defines the structural parse failures and establishes a unified Result
//! type using anyhow for context chaining and error propagation.

use thiserror::Error;

/// Failures that abort an entire statement parse. Row-level anomalies (bad
/// dates, unusable amounts) are skipped instead and never reach this enum.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ImportError {
    #[error("no matching statement format: expected columns for conta, extrato or cartão")]
    NoMatchingProfile,

    #[error("row {row}: missing description")]
    MissingDescription { row: usize },
}

/// Result type alias for import operations
pub type Result<T> = anyhow::Result<T>;
