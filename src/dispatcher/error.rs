//! Dispatch failure taxonomy.

use std::fmt;

/// Where in the request lifecycle a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Resolve,
    Execute,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Resolve => "resolve",
            Stage::Execute => "execute",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[error("Engine {0} not found")]
    EngineNotFound(String),
    #[error("Failed to load engine {engine}: {reason}")]
    ModuleLoadFailure { engine: String, reason: String },
    #[error("Engine {engine} does not support {operation}")]
    OperationNotSupported { engine: String, operation: String },
    #[error("No continuation available for this position")]
    NoContinuationAvailable,
    #[error("{0}")]
    InternalFault(String),
}

/// Message shown to callers when internal detail is withheld.
pub const GENERIC_FAULT_MESSAGE: &str = "Search failed";

impl DispatchError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::MalformedInput(_) => Stage::Validate,
            Self::EngineNotFound(_) | Self::ModuleLoadFailure { .. } => Stage::Resolve,
            Self::OperationNotSupported { .. }
            | Self::NoContinuationAvailable
            | Self::InternalFault(_) => Stage::Execute,
        }
    }

    /// Message for the response body. With `expose` off, internal faults
    /// and load failures are reduced to a generic message.
    pub fn client_message(&self, expose: bool) -> String {
        match self {
            Self::InternalFault(_) if !expose => GENERIC_FAULT_MESSAGE.to_string(),
            Self::ModuleLoadFailure { engine, .. } if !expose => {
                format!("Failed to load engine {}", engine)
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardened_messages() {
        let fault = DispatchError::InternalFault("panicked at src/x.rs:10".to_string());
        assert_eq!(fault.client_message(false), GENERIC_FAULT_MESSAGE);
        assert!(fault.client_message(true).contains("src/x.rs"));

        let load = DispatchError::ModuleLoadFailure {
            engine: "e".to_string(),
            reason: "Routine module not found: routines/e".to_string(),
        };
        assert_eq!(load.client_message(false), "Failed to load engine e");
        assert!(load.client_message(true).contains("routines/e"));

        let missing = DispatchError::EngineNotFound("nope".to_string());
        assert_eq!(missing.client_message(false), "Engine nope not found");
    }

    #[test]
    fn test_stages() {
        assert_eq!(DispatchError::MalformedInput(String::new()).stage(), Stage::Validate);
        assert_eq!(DispatchError::EngineNotFound(String::new()).stage(), Stage::Resolve);
        assert_eq!(DispatchError::NoContinuationAvailable.stage(), Stage::Execute);
    }
}
