//! Per-document score file assembly.

use chrono::Utc;
use revet_core::{DocumentMetadata, DocumentScoreFile, ScoreStatistics, ScoredModification};

/// Assemble the detailed score file for one reviewed document.
///
/// Source tables are listed distinct, in first-seen order over the scored
/// modifications.
pub fn build_document_score_file(
    document_name: &str,
    scores: Vec<ScoredModification>,
) -> DocumentScoreFile {
    let mut source_tables: Vec<String> = Vec::new();
    for scored in &scores {
        if !source_tables.contains(&scored.score.table_name) {
            source_tables.push(scored.score.table_name.clone());
        }
    }

    let statistics = ScoreStatistics::tally(&scores);
    tracing::debug!(
        document = document_name,
        total = statistics.total,
        escalated = statistics.escalated,
        "assembled document score file"
    );

    DocumentScoreFile {
        metadata: DocumentMetadata {
            document_name: document_name.to_string(),
            source_tables,
            generated_at: Utc::now(),
        },
        statistics,
        scores,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{classify::TierTable, score::score_modification};
    use revet_core::{EngineConfig, Modification};

    fn scored(column: &str, table: &str) -> ScoredModification {
        let config = EngineConfig::default();
        let tiers = TierTable::from_config(&config);
        let m = Modification::new("A1", column, 9, "a", "b", table);
        let tier = tiers.classify(&m.column_name);
        ScoredModification {
            score: score_modification(&config, &m, tier),
            escalation: None,
        }
    }

    #[test]
    fn test_source_tables_distinct_first_seen_order() {
        let scores = vec![
            scored("目标", "乙表"),
            scored("备注", "甲表"),
            scored("目标", "乙表"),
        ];
        let file = build_document_score_file("周报.xlsx", scores);
        assert_eq!(file.metadata.source_tables, vec!["乙表", "甲表"]);
        assert_eq!(file.metadata.document_name, "周报.xlsx");
        assert_eq!(file.statistics.total, 3);
    }

    #[test]
    fn test_empty_document_score_file() {
        let file = build_document_score_file("空.xlsx", vec![]);
        assert!(file.metadata.source_tables.is_empty());
        assert_eq!(file.statistics, ScoreStatistics::default());
        assert!(file.scores.is_empty());
    }
}
