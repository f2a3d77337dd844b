//! Errors raised by search routines.

use super::Operation;
use crate::shim::ShimError;

#[derive(Debug, thiserror::Error)]
pub enum RoutineError {
    #[error("Operation {0} is not supported")]
    NotSupported(Operation),
    #[error(transparent)]
    Network(#[from] ShimError),
    #[error("Blocked by upstream anti-automation page")]
    Blocked,
    #[error("Failed to parse upstream response: {0}")]
    Parse(String),
    #[error("Continuation token expired or unknown")]
    ContinuationLost,
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
