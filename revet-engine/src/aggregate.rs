//! Cross-document aggregation
//!
//! Folds one-or-many per-document score sets into a single system-wide
//! report: per-table statistics, a column risk ranking, a mean system risk
//! score, the AI intervention rate, and coarse pattern detection. Reports
//! are built fresh on every call; nothing is incrementally updated.

use chrono::Utc;
use revet_core::{
    AggregationReport, ColumnRisk, DocumentScoreFile, EngineConfig, RiskLevel, RiskTrend,
    TableScore,
};
use std::collections::HashMap;

#[derive(Default)]
struct Accumulator {
    count: usize,
    sum: f64,
    max: f64,
    min: f64,
}

impl Accumulator {
    fn observe(&mut self, score: f64) {
        if self.count == 0 {
            self.max = score;
            self.min = score;
        } else {
            self.max = self.max.max(score);
            self.min = self.min.min(score);
        }
        self.count += 1;
        self.sum += score;
    }

    fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Build the system-wide aggregation report over a batch of per-document
/// score files.
///
/// Table and column groupings preserve first-seen order before ranking.
/// Empty input yields a zeroed LOW-risk report rather than an error.
pub fn aggregate(
    documents: &[DocumentScoreFile],
    week_label: &str,
    config: &EngineConfig,
) -> AggregationReport {
    let mut table_order: Vec<String> = Vec::new();
    let mut tables: HashMap<String, Accumulator> = HashMap::new();
    let mut column_order: Vec<String> = Vec::new();
    let mut columns: HashMap<String, Accumulator> = HashMap::new();
    // Per-(table, column) grouping feeds the pattern heuristics.
    let mut table_columns: HashMap<(String, String), Accumulator> = HashMap::new();
    let mut total = Accumulator::default();
    let mut escalated = 0usize;

    for document in documents {
        for scored in &document.scores {
            let score = scored.score.final_score;
            total.observe(score);
            if scored.escalation.is_some() {
                escalated += 1;
            }

            let table = tables.entry(scored.score.table_name.clone()).or_default();
            if table.count == 0 {
                table_order.push(scored.score.table_name.clone());
            }
            table.observe(score);

            let column = columns.entry(scored.score.column_name.clone()).or_default();
            if column.count == 0 {
                column_order.push(scored.score.column_name.clone());
            }
            column.observe(score);

            table_columns
                .entry((
                    scored.score.table_name.clone(),
                    scored.score.column_name.clone(),
                ))
                .or_default()
                .observe(score);
        }
    }

    let table_scores: Vec<TableScore> = table_order
        .iter()
        .map(|name| {
            let acc = &tables[name];
            TableScore {
                table_name: name.clone(),
                modification_count: acc.count,
                avg_score: acc.avg(),
                max_score: acc.max,
                min_score: acc.min,
                risk_trend: RiskTrend::from_average(acc.avg()),
            }
        })
        .collect();

    let mut column_risk_ranking: Vec<ColumnRisk> = column_order
        .iter()
        .map(|name| {
            let acc = &columns[name];
            ColumnRisk {
                column_name: name.clone(),
                modification_count: acc.count,
                avg_score: acc.avg(),
            }
        })
        .collect();
    // Rank by average descending, ties broken by count descending. Scores
    // are clamped finite so total_cmp gives a proper ordering.
    column_risk_ranking.sort_by(|a, b| {
        b.avg_score
            .total_cmp(&a.avg_score)
            .then(b.modification_count.cmp(&a.modification_count))
    });

    let system_risk_score = total.avg();
    let ai_intervention_rate = if total.count == 0 {
        0.0
    } else {
        escalated as f64 / total.count as f64
    };

    let detected_patterns =
        detect_patterns(&table_order, &column_order, &table_columns, config);

    tracing::info!(
        documents = documents.len(),
        modifications = total.count,
        system_risk_score,
        ai_intervention_rate,
        patterns = detected_patterns.len(),
        "aggregated batch"
    );

    AggregationReport {
        week_label: week_label.to_string(),
        generated_at: Utc::now(),
        table_scores,
        column_risk_ranking,
        system_risk_score,
        risk_level: RiskLevel::from_system_score(system_risk_score),
        ai_intervention_rate,
        detected_patterns,
    }
}

/// Coarse pattern heuristics, best-effort and never fatal.
///
/// "Multi-column high risk": one table with at least
/// `multi_column_pattern_min` columns averaging at or above
/// `high_risk_column_threshold`. "Systemic change": one column averaging at
/// or above `systemic_change_floor` in at least `systemic_change_min_tables`
/// tables. Output order follows first-seen table/column order.
fn detect_patterns(
    table_order: &[String],
    column_order: &[String],
    table_columns: &HashMap<(String, String), Accumulator>,
    config: &EngineConfig,
) -> Vec<String> {
    let mut patterns = Vec::new();

    for table in table_order {
        let hot_columns: Vec<&str> = column_order
            .iter()
            .filter(|column| {
                table_columns
                    .get(&(table.clone(), (*column).clone()))
                    .is_some_and(|acc| acc.avg() >= config.high_risk_column_threshold)
            })
            .map(String::as_str)
            .collect();
        if hot_columns.len() >= config.multi_column_pattern_min {
            patterns.push(format!(
                "multi-column high risk in {}: {}",
                table,
                hot_columns.join(", ")
            ));
        }
    }

    for column in column_order {
        let spanning_tables: Vec<&str> = table_order
            .iter()
            .filter(|table| {
                table_columns
                    .get(&((*table).clone(), column.clone()))
                    .is_some_and(|acc| acc.avg() >= config.systemic_change_floor)
            })
            .map(String::as_str)
            .collect();
        if spanning_tables.len() >= config.systemic_change_min_tables {
            patterns.push(format!(
                "systemic change in {}: {}",
                column,
                spanning_tables.join(", ")
            ));
        }
    }

    patterns
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::report::build_document_score_file;
    use proptest::prelude::*;
    use revet_core::{ChangeKind, ColumnTier, Modification, ScoredModification, ScoringResult};

    fn arb_scored() -> impl Strategy<Value = ScoredModification> {
        (
            prop::sample::select(vec!["目标", "负责人", "备注", "优先级"]),
            prop::sample::select(vec!["甲表", "乙表", "丙表"]),
            0.0f64..=1.0,
        )
            .prop_map(|(column, table, final_score)| {
                let m = Modification::new("A1", column, 9, "a", "b", table);
                ScoredModification {
                    score: ScoringResult {
                        modification_id: m.modification_id,
                        cell_ref: m.cell_ref,
                        column_name: m.column_name,
                        table_name: m.table_name,
                        column_tier: ColumnTier::L2,
                        base_score: 0.5,
                        change_kind: ChangeKind::TextEdit,
                        change_factor: 0.4,
                        importance_weight: 1.0,
                        ai_adjustment: 1.0,
                        confidence_weight: 1.0,
                        final_score,
                        risk_level: RiskLevel::from_modification_score(final_score),
                    },
                    escalation: None,
                }
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        /// System risk score SHALL stay within [0, 1] and the ranking SHALL
        /// be non-increasing by average score.
        #[test]
        fn prop_report_bounded_and_ranking_sorted(
            scores in prop::collection::vec(arb_scored(), 0..40),
        ) {
            let docs = vec![build_document_score_file("doc.xlsx", scores)];
            let report = aggregate(&docs, "2026-W35", &EngineConfig::default());

            prop_assert!((0.0..=1.0).contains(&report.system_risk_score));
            prop_assert!((0.0..=1.0).contains(&report.ai_intervention_rate));
            for pair in report.column_risk_ranking.windows(2) {
                prop_assert!(pair[0].avg_score >= pair[1].avg_score);
            }
            let counted: usize = report
                .table_scores
                .iter()
                .map(|t| t.modification_count)
                .sum();
            prop_assert_eq!(counted, docs[0].scores.len());
        }
    }
}
