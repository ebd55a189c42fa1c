//! Batch orchestration
//!
//! Drives the full per-document flow (classify, score, escalate, patch,
//! assemble) and the run-level artifacts (one approval workflow and one
//! aggregation report per run). Documents are processed sequentially by
//! default; `document_concurrency > 1` enables a bounded pool, and results
//! are reassembled in input order either way.

use crate::aggregate::aggregate;
use crate::classify::TierTable;
use crate::escalate::EscalationPipeline;
use crate::report::build_document_score_file;
use crate::score::{apply_escalation, score_modification};
use crate::workflow::build_workflow;
use futures_util::stream::{self, StreamExt};
use revet_core::{
    AggregationReport, ApprovalWorkflow, DocumentScoreFile, EngineConfig, EscalationError,
    EscalationRecord, Modification, RevetResult, ScoredModification,
};
use revet_judge::JudgmentProvider;
use std::sync::Arc;

// ============================================================================
// INPUTS AND OUTPUTS
// ============================================================================

/// One document's detected modifications, as handed over by the upstream
/// diff collaborator.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DocumentDiff {
    pub document_name: String,
    pub modifications: Vec<Modification>,
}

/// Result of reviewing one document: its score file plus the escalation
/// records feeding the run-level workflow.
#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    pub score_file: DocumentScoreFile,
    pub records: Vec<EscalationRecord>,
}

/// Result of one batch run.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Per-document score files, in input order.
    pub documents: Vec<DocumentScoreFile>,
    pub workflow: ApprovalWorkflow,
    pub report: AggregationReport,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Top-level engine entry point.
pub struct BatchOrchestrator {
    config: Arc<EngineConfig>,
    tiers: TierTable,
    pipeline: EscalationPipeline,
}

impl BatchOrchestrator {
    /// Build an orchestrator over a validated configuration.
    pub fn new(config: EngineConfig, judge: Arc<dyn JudgmentProvider>) -> RevetResult<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let tiers = TierTable::from_config(&config);
        let pipeline = EscalationPipeline::new(Arc::clone(&config), judge);
        Ok(Self {
            config,
            tiers,
            pipeline,
        })
    }

    /// Review one document end to end: classify, score, escalate L2 items,
    /// patch escalated scores, and assemble the score file.
    ///
    /// Errors with `RunIncomplete` when any escalation batch could not be
    /// judged. The affected records are already fail-safed to REVIEW; the
    /// caller decides whether to retry the document or ship the partial
    /// result by inspecting the error.
    pub async fn review_document(&self, diff: &DocumentDiff) -> RevetResult<DocumentOutcome> {
        tracing::info!(
            document = %diff.document_name,
            modifications = diff.modifications.len(),
            "reviewing document"
        );

        // Deterministic pass: classify and score every modification.
        let mut scores: Vec<ScoredModification> = Vec::with_capacity(diff.modifications.len());
        let mut escalation_indices: Vec<usize> = Vec::new();
        for (i, m) in diff.modifications.iter().enumerate() {
            let tier = self.tiers.classify(&m.column_name);
            if tier.is_escalated() {
                escalation_indices.push(i);
            }
            scores.push(ScoredModification {
                score: score_modification(&self.config, m, tier),
                escalation: None,
            });
        }

        // Escalation pass over the L2 subset only.
        let escalated: Vec<Modification> = escalation_indices
            .iter()
            .map(|&i| diff.modifications[i].clone())
            .collect();
        let outcome = self.pipeline.run(&escalated).await;

        for (&i, record) in escalation_indices.iter().zip(&outcome.records) {
            scores[i].score = apply_escalation(&scores[i].score, record);
            scores[i].escalation = Some(record.clone());
        }

        if let Some(first) = outcome.failures.first() {
            return Err(EscalationError::RunIncomplete {
                failed: outcome.failures.len(),
                total: outcome.batches_dispatched,
                first: first.clone(),
            }
            .into());
        }

        Ok(DocumentOutcome {
            score_file: build_document_score_file(&diff.document_name, scores),
            records: outcome.records,
        })
    }

    /// Run a full batch: every document, one approval workflow, one
    /// aggregation report.
    pub async fn run_batch(
        &self,
        diffs: &[DocumentDiff],
        week_label: &str,
    ) -> RevetResult<BatchOutcome> {
        let outcomes = if self.config.document_concurrency <= 1 {
            let mut outcomes = Vec::with_capacity(diffs.len());
            for diff in diffs {
                outcomes.push(self.review_document(diff).await?);
            }
            outcomes
        } else {
            let mut indexed: Vec<(usize, RevetResult<DocumentOutcome>)> =
                stream::iter(diffs.iter().enumerate().map(|(i, diff)| async move {
                    (i, self.review_document(diff).await)
                }))
                .buffer_unordered(self.config.document_concurrency)
                .collect()
                .await;
            // First failure in document order wins, matching sequential mode.
            indexed.sort_by_key(|(i, _)| *i);
            indexed
                .into_iter()
                .map(|(_, outcome)| outcome)
                .collect::<RevetResult<Vec<_>>>()?
        };

        let all_records: Vec<EscalationRecord> = outcomes
            .iter()
            .flat_map(|o| o.records.iter().cloned())
            .collect();
        let documents: Vec<DocumentScoreFile> =
            outcomes.into_iter().map(|o| o.score_file).collect();

        let workflow = build_workflow(&all_records);
        let report = aggregate(&documents, week_label, &self.config);

        tracing::info!(
            documents = documents.len(),
            workflow = %workflow.workflow_id,
            system_risk_score = report.system_risk_score,
            "batch run complete"
        );

        Ok(BatchOutcome {
            documents,
            workflow,
            report,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use revet_core::{FinalDecision, Resolution, RevetError, RiskLevel};
    use revet_judge::{FailingJudge, ScriptedJudge};

    fn diff(name: &str, modifications: Vec<Modification>) -> DocumentDiff {
        DocumentDiff {
            document_name: name.to_string(),
            modifications,
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = EngineConfig {
            layer1_batch_size: 0,
            ..EngineConfig::default()
        };
        let judge = Arc::new(ScriptedJudge::new(Vec::<String>::new()));
        assert!(matches!(
            BatchOrchestrator::new(config, judge),
            Err(RevetError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_rule_only_document_never_calls_judge() {
        let judge = Arc::new(ScriptedJudge::new(Vec::<String>::new()));
        let orchestrator =
            BatchOrchestrator::new(EngineConfig::default(), judge.clone()).unwrap();
        // L1 and L3 columns only: the deterministic path suffices.
        let doc = diff(
            "周报.xlsx",
            vec![
                Modification::new("B4", "目标", 4, "旧目标", "新目标", "任务表"),
                Modification::new("A9", "序号", 9, "1", "2", "任务表"),
            ],
        );

        let outcome = orchestrator.review_document(&doc).await.unwrap();
        assert_eq!(judge.received_prompts().len(), 0);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.score_file.statistics.total, 2);
        assert_eq!(outcome.score_file.statistics.escalated, 0);
        assert!(outcome
            .score_file
            .scores
            .iter()
            .all(|s| s.escalation.is_none()));
    }

    #[tokio::test]
    async fn test_l2_scores_are_patched_with_escalation_outcome() {
        let judge = Arc::new(ScriptedJudge::new([
            "RISKY, 90, ownership churn".to_string(),
            "[{\"index\":1,\"risk_level\":\"HIGH\",\"decision\":\"REJECT\",\"confidence\":95,\"reason\":\"no\"}]".to_string(),
        ]));
        let orchestrator = BatchOrchestrator::new(EngineConfig::default(), judge).unwrap();
        let doc = diff(
            "周报.xlsx",
            vec![Modification::new("C9", "负责人", 9, "张三", "李四", "任务表")],
        );

        let outcome = orchestrator.review_document(&doc).await.unwrap();
        let scored = &outcome.score_file.scores[0];
        let escalation = scored.escalation.as_ref().unwrap();
        assert_eq!(escalation.final_decision, FinalDecision::Reject);
        // REJECT at confidence 95: 0.5 * 0.4 * 1.0 * 1.5 * 1.0 = 0.3.
        assert_eq!(scored.score.ai_adjustment, 1.5);
        assert_eq!(scored.score.confidence_weight, 1.0);
        assert!((scored.score.final_score - 0.3).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_transport_failure_yields_run_incomplete() {
        let judge = Arc::new(FailingJudge::new("connection refused"));
        let orchestrator = BatchOrchestrator::new(EngineConfig::default(), judge).unwrap();
        let doc = diff(
            "周报.xlsx",
            vec![Modification::new("C9", "负责人", 9, "张三", "李四", "任务表")],
        );

        let result = orchestrator.review_document(&doc).await;
        match result {
            Err(RevetError::Escalation(EscalationError::RunIncomplete {
                failed,
                total,
                first,
            })) => {
                assert_eq!(failed, 1);
                assert_eq!(total, 1);
                assert!(first.reason.contains("connection refused"));
            }
            other => panic!("expected RunIncomplete, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_run_batch_builds_workflow_and_report() {
        // Two documents; one L2 item each, both screened SAFE at high
        // confidence so each document costs exactly one judge call.
        let judge = Arc::new(ScriptedJudge::new([
            "SAFE, 95, consistent",
            "SAFE, 92, consistent",
        ]));
        let orchestrator = BatchOrchestrator::new(EngineConfig::default(), judge).unwrap();
        let diffs = vec![
            diff(
                "一组.xlsx",
                vec![
                    Modification::new("C9", "负责人", 9, "张三", "李四", "甲表"),
                    Modification::new("A9", "序号", 9, "1", "2", "甲表"),
                ],
            ),
            diff(
                "二组.xlsx",
                vec![Modification::new("C5", "当前状态", 5, "进行中", "已完成", "乙表")],
            ),
        ];

        let outcome = orchestrator.run_batch(&diffs, "2026-W35").await.unwrap();

        assert_eq!(outcome.documents.len(), 2);
        assert_eq!(outcome.documents[0].metadata.document_name, "一组.xlsx");
        assert_eq!(outcome.documents[1].metadata.document_name, "二组.xlsx");
        // Both L2 records fast-passed: auto-approved, nothing pending.
        assert_eq!(outcome.workflow.auto_approved.len(), 2);
        assert!(outcome.workflow.pending_approvals.is_empty());
        assert!(outcome
            .workflow
            .auto_approved
            .iter()
            .all(|r| r.resolved_by == Resolution::Layer1Screen));
        // 2 escalated of 3 total modifications.
        assert!((outcome.report.ai_intervention_rate - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(outcome.report.table_scores.len(), 2);
        assert_eq!(outcome.report.week_label, "2026-W35");
    }

    #[tokio::test]
    async fn test_run_batch_empty_is_a_clean_no_op() {
        let judge = Arc::new(ScriptedJudge::new(Vec::<String>::new()));
        let orchestrator = BatchOrchestrator::new(EngineConfig::default(), judge).unwrap();
        let outcome = orchestrator.run_batch(&[], "2026-W35").await.unwrap();

        assert!(outcome.documents.is_empty());
        assert!(outcome.workflow.auto_approved.is_empty());
        assert!(outcome.workflow.pending_approvals.is_empty());
        assert_eq!(outcome.report.system_risk_score, 0.0);
        assert_eq!(outcome.report.risk_level, RiskLevel::Low);
    }

    #[tokio::test]
    async fn test_concurrent_documents_preserve_input_order() {
        let config = EngineConfig {
            document_concurrency: 4,
            ..EngineConfig::default()
        };
        // Rule-only documents: no judge traffic, so concurrency cannot
        // scramble scripted responses.
        let judge = Arc::new(ScriptedJudge::new(Vec::<String>::new()));
        let orchestrator = BatchOrchestrator::new(config, judge).unwrap();
        let diffs: Vec<DocumentDiff> = (0..6)
            .map(|i| {
                diff(
                    &format!("doc-{}.xlsx", i),
                    vec![Modification::new("A9", "序号", 9, "1", "2", "表")],
                )
            })
            .collect();

        let outcome = orchestrator.run_batch(&diffs, "2026-W35").await.unwrap();
        let names: Vec<&str> = outcome
            .documents
            .iter()
            .map(|d| d.metadata.document_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "doc-0.xlsx",
                "doc-1.xlsx",
                "doc-2.xlsx",
                "doc-3.xlsx",
                "doc-4.xlsx",
                "doc-5.xlsx"
            ]
        );
    }
}
