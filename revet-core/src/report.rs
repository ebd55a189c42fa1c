//! Output file schemas: per-document score files, workflow files, and the
//! cross-document aggregation report.
//!
//! These are the JSON shapes consumed by downstream collaborators (cell
//! coloring, human review, dashboards). On-disk paths and directory layout
//! are the orchestration layer's concern, not this crate's.

use crate::{EscalationRecord, RiskLevel, RiskTrend, ScoringResult, Timestamp};
use serde::{Deserialize, Serialize};

// ============================================================================
// PER-DOCUMENT SCORE FILE
// ============================================================================

/// One scored modification, with its escalation sub-record for L2 items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredModification {
    pub score: ScoringResult,
    pub escalation: Option<EscalationRecord>,
}

/// Counts per risk level for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreStatistics {
    pub total: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
    /// Number of modifications that went through the escalation pipeline.
    pub escalated: usize,
}

impl ScoreStatistics {
    /// Tally statistics over a document's scored modifications.
    pub fn tally(scores: &[ScoredModification]) -> Self {
        let mut stats = ScoreStatistics {
            total: scores.len(),
            ..ScoreStatistics::default()
        };
        for scored in scores {
            match scored.score.risk_level {
                RiskLevel::Low => stats.low += 1,
                RiskLevel::Medium => stats.medium += 1,
                RiskLevel::High => stats.high += 1,
                RiskLevel::Critical => stats.critical += 1,
            }
            if scored.escalation.is_some() {
                stats.escalated += 1;
            }
        }
        stats
    }
}

/// Metadata header of a per-document score file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub document_name: String,
    /// Distinct source table names, in first-seen order.
    pub source_tables: Vec<String>,
    pub generated_at: Timestamp,
}

/// Detailed per-document score file, consumed by the coloring/rendering
/// collaborator and by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentScoreFile {
    pub metadata: DocumentMetadata,
    pub statistics: ScoreStatistics,
    pub scores: Vec<ScoredModification>,
}

// ============================================================================
// AGGREGATION REPORT
// ============================================================================

/// Risk statistics for one table across the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableScore {
    pub table_name: String,
    pub modification_count: usize,
    pub avg_score: f64,
    pub max_score: f64,
    pub min_score: f64,
    pub risk_trend: RiskTrend,
}

/// One entry of the system-wide column risk ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRisk {
    pub column_name: String,
    pub modification_count: usize,
    pub avg_score: f64,
}

/// System-wide summary built from one-or-many per-document score sets.
/// Built fresh on every aggregation call; never incrementally updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationReport {
    pub week_label: String,
    pub generated_at: Timestamp,
    pub table_scores: Vec<TableScore>,
    /// Sorted by avg_score descending, ties broken by count descending.
    pub column_risk_ranking: Vec<ColumnRisk>,
    /// Mean final score over every modification in the batch.
    pub system_risk_score: f64,
    pub risk_level: RiskLevel,
    /// L2-modification count / total modification count; 0.0 when empty.
    pub ai_intervention_rate: f64,
    pub detected_patterns: Vec<String>,
}

// ============================================================================
// TESTS
// ============================================================================
