//! Error types for REVET operations

use crate::{EscalationLayer, ModificationId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// CONFIGURATION ERRORS
// ============================================================================

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Column {column} is assigned to more than one tier")]
    DuplicateTierAssignment { column: String },
}

// ============================================================================
// JUDGMENT-SERVICE ERRORS
// ============================================================================

/// Judgment-service provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JudgeError {
    #[error("No judgment provider configured")]
    ProviderNotConfigured,

    #[error("Request to {provider} failed: {message}")]
    RequestFailed { provider: String, message: String },

    #[error("Rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("Invalid API key for {provider}")]
    InvalidApiKey { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Call to {provider} timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("Scripted judge has no responses left")]
    ScriptExhausted,
}

// ============================================================================
// ESCALATION ERRORS
// ============================================================================

/// Context for one failed escalation batch: enough for the caller to retry
/// exactly that batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub layer: EscalationLayer,
    pub batch_index: usize,
    pub modification_ids: Vec<ModificationId>,
    pub reason: String,
}

impl std::fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} batch {} failed ({} items): {}",
            self.layer,
            self.batch_index,
            self.modification_ids.len(),
            self.reason
        )
    }
}

/// Escalation pipeline errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EscalationError {
    #[error("{0}")]
    BatchFailed(BatchFailure),

    #[error("Escalation run left {failed} of {total} batches unjudged; first failure: {first}")]
    RunIncomplete {
        failed: usize,
        total: usize,
        first: BatchFailure,
    },
}

// ============================================================================
// MASTER ERROR
// ============================================================================

/// Master error type for all REVET errors.
#[derive(Debug, Clone, Error)]
pub enum RevetError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Judge error: {0}")]
    Judge(#[from] JudgeError),

    #[error("Escalation error: {0}")]
    Escalation(#[from] EscalationError),
}

/// Result type alias for REVET operations.
pub type RevetResult<T> = Result<T, RevetError>;

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "layer1_batch_size".to_string(),
            value: "0".to_string(),
            reason: "must be greater than 0".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("layer1_batch_size"));
        assert!(msg.contains("0"));
        assert!(msg.contains("must be greater than 0"));
    }

    #[test]
    fn test_judge_error_display_timeout() {
        let err = JudgeError::Timeout {
            provider: "scripted".to_string(),
            timeout_ms: 60_000,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("timed out"));
        assert!(msg.contains("60000"));
    }

    #[test]
    fn test_batch_failure_display_carries_retry_context() {
        let failure = BatchFailure {
            layer: EscalationLayer::Layer2,
            batch_index: 3,
            modification_ids: vec![Uuid::nil(), Uuid::nil()],
            reason: "connection reset".to_string(),
        };
        let msg = format!("{}", EscalationError::BatchFailed(failure));
        assert!(msg.contains("Layer2"));
        assert!(msg.contains("batch 3"));
        assert!(msg.contains("2 items"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_revet_error_from_variants() {
        let config = RevetError::from(ConfigError::MissingRequired {
            field: "canonical_columns".to_string(),
        });
        assert!(matches!(config, RevetError::Config(_)));

        let judge = RevetError::from(JudgeError::ProviderNotConfigured);
        assert!(matches!(judge, RevetError::Judge(_)));

        let escalation = RevetError::from(EscalationError::BatchFailed(BatchFailure {
            layer: EscalationLayer::Layer1,
            batch_index: 0,
            modification_ids: vec![],
            reason: "timeout".to_string(),
        }));
        assert!(matches!(escalation, RevetError::Escalation(_)));
    }
}
