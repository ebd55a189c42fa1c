//! Column risk classifier
//!
//! Maps a column name to its risk tier via an immutable lookup table built
//! once from the engine configuration. Unknown columns fall back to L3 so
//! the pipeline never blocks on an unrecognized column.

use revet_core::{ColumnTier, EngineConfig};
use std::collections::HashMap;

/// Immutable column-tier lookup table.
///
/// Safe to share across concurrent workers; classification is a pure
/// lookup with no failure mode beyond the L3 default.
#[derive(Debug, Clone)]
pub struct TierTable {
    map: HashMap<String, ColumnTier>,
}

impl TierTable {
    /// Build the table from the configured tier lists.
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut map = HashMap::new();
        for column in &config.l1_columns {
            map.insert(column.clone(), ColumnTier::L1);
        }
        for column in &config.l2_columns {
            map.insert(column.clone(), ColumnTier::L2);
        }
        for column in &config.l3_columns {
            map.insert(column.clone(), ColumnTier::L3);
        }
        Self { map }
    }

    /// Classify a column name. Unmapped columns default to L3; the fallback
    /// is logged as a configuration warning, not an error.
    pub fn classify(&self, column_name: &str) -> ColumnTier {
        match self.map.get(column_name) {
            Some(tier) => *tier,
            None => {
                tracing::warn!(column = column_name, "column not in tier table, defaulting to L3");
                ColumnTier::L3
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
