//! Engine configuration
//!
//! One immutable configuration object, constructed at startup and passed by
//! reference into every component. The column-tier table lives here rather
//! than in module-level state so unit tests stay deterministic.

use crate::{ConfigError, RevetResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Master engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    // Column-tier table. Columns not listed anywhere fall back to L3.
    pub l1_columns: Vec<String>,
    pub l2_columns: Vec<String>,
    pub l3_columns: Vec<String>,

    /// Canonical column order; the first two columns are positionally
    /// sensitive (lead columns).
    pub canonical_columns: Vec<String>,

    // Scorer knobs
    /// Rows at or below this index are treated as structurally sensitive.
    pub lead_row_limit: u32,
    /// Subtracted from the unit importance weight for sensitive positions,
    /// floored at 0.
    pub positional_penalty: f64,
    /// Relative numeric change below this is a minor change.
    pub minor_change_threshold: f64,
    /// Relative numeric change below this (and at/above minor) is moderate.
    pub moderate_change_threshold: f64,

    // Escalation knobs
    pub layer1_batch_size: usize,
    pub layer2_batch_size: usize,
    /// SAFE judgments below this confidence still go to layer 2.
    pub layer1_confidence_floor: u8,
    /// Timeout for one judgment-service call (one batch).
    pub judge_timeout: Duration,
    /// Bounded parallelism for batch dispatch within a layer.
    pub max_concurrent_batches: usize,
    pub layer1_max_tokens: u32,
    pub layer2_max_tokens: u32,

    // Aggregation knobs
    /// Column average at or above this counts toward the multi-column
    /// high-risk pattern.
    pub high_risk_column_threshold: f64,
    /// Minimum high-risk columns in one table to flag the pattern.
    pub multi_column_pattern_min: usize,
    /// Minimum tables a column must span to flag a systemic change.
    pub systemic_change_min_tables: usize,
    /// Column average below this is too trivial to count as systemic.
    pub systemic_change_floor: f64,

    // Orchestration
    /// 1 = strictly sequential (safe default); >1 enables a bounded pool.
    pub document_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            l1_columns: vec![
                "目标".to_string(),
                "截止时间".to_string(),
                "完成标准".to_string(),
                "优先级".to_string(),
            ],
            l2_columns: vec![
                "负责人".to_string(),
                "进展说明".to_string(),
                "当前状态".to_string(),
                "风险描述".to_string(),
            ],
            l3_columns: vec![
                "序号".to_string(),
                "备注".to_string(),
                "更新记录".to_string(),
            ],
            canonical_columns: vec![
                "序号".to_string(),
                "目标".to_string(),
                "负责人".to_string(),
                "截止时间".to_string(),
                "进展说明".to_string(),
                "当前状态".to_string(),
                "风险描述".to_string(),
                "备注".to_string(),
            ],
            lead_row_limit: 3,
            positional_penalty: 0.2,
            minor_change_threshold: 0.1,
            moderate_change_threshold: 0.5,
            layer1_batch_size: 20,
            layer2_batch_size: 50,
            layer1_confidence_floor: 70,
            judge_timeout: Duration::from_secs(60),
            max_concurrent_batches: 4,
            layer1_max_tokens: 1000,
            layer2_max_tokens: 2000,
            high_risk_column_threshold: 0.8,
            multi_column_pattern_min: 3,
            systemic_change_min_tables: 2,
            systemic_change_floor: 0.3,
            document_concurrency: 1,
        }
    }
}

impl EngineConfig {
    /// The two lead columns of the canonical order.
    pub fn lead_columns(&self) -> &[String] {
        let n = self.canonical_columns.len().min(2);
        &self.canonical_columns[..n]
    }

    /// Validate the configuration.
    /// Returns Ok(()) if valid, Err(RevetError::Config) if invalid.
    pub fn validate(&self) -> RevetResult<()> {
        if self.layer1_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "layer1_batch_size".to_string(),
                value: self.layer1_batch_size.to_string(),
                reason: "batch size must be greater than 0".to_string(),
            }
            .into());
        }

        if self.layer2_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "layer2_batch_size".to_string(),
                value: self.layer2_batch_size.to_string(),
                reason: "batch size must be greater than 0".to_string(),
            }
            .into());
        }

        if self.layer1_confidence_floor > 100 {
            return Err(ConfigError::InvalidValue {
                field: "layer1_confidence_floor".to_string(),
                value: self.layer1_confidence_floor.to_string(),
                reason: "confidence floor must be within 0-100".to_string(),
            }
            .into());
        }

        if self.judge_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "judge_timeout".to_string(),
                value: format!("{:?}", self.judge_timeout),
                reason: "judge_timeout must be positive".to_string(),
            }
            .into());
        }

        if self.max_concurrent_batches == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent_batches".to_string(),
                value: self.max_concurrent_batches.to_string(),
                reason: "concurrency must be greater than 0".to_string(),
            }
            .into());
        }

        if self.document_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "document_concurrency".to_string(),
                value: self.document_concurrency.to_string(),
                reason: "concurrency must be greater than 0".to_string(),
            }
            .into());
        }

        for (field, value) in [
            ("positional_penalty", self.positional_penalty),
            ("minor_change_threshold", self.minor_change_threshold),
            ("moderate_change_threshold", self.moderate_change_threshold),
            ("high_risk_column_threshold", self.high_risk_column_threshold),
            ("systemic_change_floor", self.systemic_change_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                    reason: "must be within [0.0, 1.0]".to_string(),
                }
                .into());
            }
        }

        if self.minor_change_threshold > self.moderate_change_threshold {
            return Err(ConfigError::InvalidValue {
                field: "minor_change_threshold".to_string(),
                value: self.minor_change_threshold.to_string(),
                reason: "must not exceed moderate_change_threshold".to_string(),
            }
            .into());
        }

        // Every column must resolve to exactly one tier.
        let mut seen: HashSet<&str> = HashSet::new();
        for column in self
            .l1_columns
            .iter()
            .chain(self.l2_columns.iter())
            .chain(self.l3_columns.iter())
        {
            if !seen.insert(column.as_str()) {
                return Err(ConfigError::DuplicateTierAssignment {
                    column: column.clone(),
                }
                .into());
            }
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RevetError;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = EngineConfig {
            layer1_batch_size: 0,
            ..EngineConfig::default()
        };
        let result = config.validate();
        assert!(matches!(
            result,
            Err(RevetError::Config(ConfigError::InvalidValue { field, .. })) if field == "layer1_batch_size"
        ));
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let config = EngineConfig {
            high_risk_column_threshold: 1.5,
            ..EngineConfig::default()
        };
        let result = config.validate();
        assert!(matches!(
            result,
            Err(RevetError::Config(ConfigError::InvalidValue { field, .. }))
                if field == "high_risk_column_threshold"
        ));
    }

    #[test]
    fn test_inverted_change_thresholds_rejected() {
        let config = EngineConfig {
            minor_change_threshold: 0.6,
            moderate_change_threshold: 0.5,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_tier_assignment_rejected() {
        let config = EngineConfig {
            l1_columns: vec!["负责人".to_string()],
            ..EngineConfig::default()
        };
        let result = config.validate();
        assert!(matches!(
            result,
            Err(RevetError::Config(ConfigError::DuplicateTierAssignment { column })) if column == "负责人"
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = EngineConfig {
            judge_timeout: Duration::ZERO,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lead_columns_are_first_two_canonical() {
        let config = EngineConfig::default();
        assert_eq!(config.lead_columns(), &["序号".to_string(), "目标".to_string()]);
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
