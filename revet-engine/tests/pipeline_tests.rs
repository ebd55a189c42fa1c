//! End-to-end pipeline tests: full document review through the orchestrator
//! with scripted judgment providers.

use revet_engine::{BatchOrchestrator, DocumentDiff};
use revet_test_utils::{
    assert_record_finalized, assert_score_valid, fixtures, ChangeKind, ColumnTier, EngineConfig,
    FailingJudge, FinalDecision, Modification, Resolution, RiskLevel, ScriptedJudge,
};
use std::sync::Arc;

fn diff(name: &str, modifications: Vec<Modification>) -> DocumentDiff {
    DocumentDiff {
        document_name: name.to_string(),
        modifications,
    }
}

#[tokio::test]
async fn test_mixed_document_review_end_to_end() {
    // 负责人 (L2) screens SAFE@95 and fast-passes; 目标 and 序号 stay on the
    // deterministic path.
    let judge = Arc::new(ScriptedJudge::new(["SAFE, 95, consistent rename"]));
    let orchestrator = BatchOrchestrator::new(EngineConfig::default(), judge.clone()).unwrap();

    let outcome = orchestrator
        .review_document(&diff("周报.xlsx", fixtures::mixed_tier_diff()))
        .await
        .unwrap();

    assert_eq!(judge.received_prompts().len(), 1);
    let file = &outcome.score_file;
    assert_eq!(file.statistics.total, 3);
    assert_eq!(file.statistics.escalated, 1);
    for scored in &file.scores {
        assert_score_valid(&scored.score);
    }
    for record in &outcome.records {
        assert_record_finalized(record);
    }

    // 目标 is a lead column: 0.8 * 0.4 * 0.8 = 0.256, Low.
    let goal = file
        .scores
        .iter()
        .find(|s| s.score.column_name == "目标")
        .unwrap();
    assert_eq!(goal.score.column_tier, ColumnTier::L1);
    assert_eq!(goal.score.change_kind, ChangeKind::TextEdit);
    assert!((goal.score.final_score - 0.256).abs() < 1e-12);

    // 序号 "1" -> "2": numeric major on an L3 lead column, rule-only.
    let seq = file
        .scores
        .iter()
        .find(|s| s.score.column_name == "序号")
        .unwrap();
    assert_eq!(seq.score.column_tier, ColumnTier::L3);
    assert_eq!(seq.score.change_kind, ChangeKind::NumericMajor);
    assert!(seq.escalation.is_none());
    // 0.2 * 0.2 * 0.8 = 0.032, Low.
    assert!((seq.score.final_score - 0.032).abs() < 1e-12);
    assert_eq!(seq.score.risk_level, RiskLevel::Low);

    // 负责人 fast-passed: AI terms stay neutral.
    let owner = file
        .scores
        .iter()
        .find(|s| s.score.column_name == "负责人")
        .unwrap();
    assert_eq!(owner.score.ai_adjustment, 1.0);
    assert_eq!(owner.score.confidence_weight, 1.0);
    assert_eq!(
        owner.escalation.as_ref().unwrap().resolved_by,
        Resolution::Layer1Screen
    );
}

#[tokio::test]
async fn test_single_document_intervention_rate() {
    // One L2 item fast-passed by the screen, one L3 item scored by rule:
    // exactly half the modifications needed AI judgment.
    let judge = Arc::new(ScriptedJudge::new(["SAFE, 95, same person, new spelling"]));
    let orchestrator = BatchOrchestrator::new(EngineConfig::default(), judge).unwrap();
    let diffs = vec![diff(
        "周报.xlsx",
        vec![
            Modification::new("C9", "负责人", 9, "张三", "李四", "任务表"),
            Modification::new("A9", "序号", 9, "1", "2", "任务表"),
        ],
    )];

    let outcome = orchestrator.run_batch(&diffs, "2026-W35").await.unwrap();
    assert!((outcome.report.ai_intervention_rate - 0.5).abs() < 1e-12);

    let file = &outcome.documents[0];
    let owner = file
        .scores
        .iter()
        .find(|s| s.score.column_name == "负责人")
        .unwrap();
    assert_eq!(
        owner.escalation.as_ref().unwrap().final_decision,
        FinalDecision::Approve
    );
    let seq = file
        .scores
        .iter()
        .find(|s| s.score.column_name == "序号")
        .unwrap();
    assert!(seq.escalation.is_none());
    assert_eq!(seq.score.change_kind, ChangeKind::NumericMajor);
}

#[tokio::test]
async fn test_layer2_approval_discounts_score() {
    // RISKY screen then APPROVE@91 from layer 2:
    // 0.5 * 0.4 * 1.0 * 0.6 * 1.0 = 0.12.
    let judge = Arc::new(ScriptedJudge::new([
        "RISKY, 80, needs a closer look".to_string(),
        "[{\"index\":1,\"risk_level\":\"LOW\",\"decision\":\"APPROVE\",\"confidence\":91,\"reason\":\"verified with owner\"}]".to_string(),
    ]));
    let orchestrator = BatchOrchestrator::new(EngineConfig::default(), judge).unwrap();
    let doc = diff(
        "周报.xlsx",
        vec![Modification::new("C9", "负责人", 9, "张三", "李四", "任务表")],
    );

    let outcome = orchestrator.review_document(&doc).await.unwrap();
    let scored = &outcome.score_file.scores[0];
    assert_eq!(scored.score.ai_adjustment, 0.6);
    assert_eq!(scored.score.confidence_weight, 1.0);
    assert!((scored.score.final_score - 0.12).abs() < 1e-12);
    assert_eq!(scored.score.risk_level, RiskLevel::Low);
}

#[tokio::test]
async fn test_unparsable_layer2_fails_closed_to_review() {
    let judge = Arc::new(ScriptedJudge::new([
        fixtures::layer1_response(2, "RISKY, 85, status jumped"),
        "I cannot produce JSON today.".to_string(),
    ]));
    let orchestrator = BatchOrchestrator::new(EngineConfig::default(), judge).unwrap();
    let doc = diff("周报.xlsx", fixtures::escalated_only_diff(2));

    // Parse failure is recovered locally: the document still completes.
    let outcome = orchestrator.review_document(&doc).await.unwrap();
    for scored in &outcome.score_file.scores {
        let record = scored.escalation.as_ref().unwrap();
        assert_eq!(record.final_decision, FinalDecision::Review);
        assert_eq!(record.resolved_by, Resolution::FailSafe);
        // REVIEW at confidence 0: 0.5 * 0.4 * 1.0 * 1.2 * 0.7 = 0.168.
        assert!((scored.score.final_score - 0.168).abs() < 1e-12);
    }
}

#[tokio::test]
async fn test_transport_failure_is_fatal_for_the_document() {
    let judge = Arc::new(FailingJudge::new("dns lookup failed"));
    let orchestrator = BatchOrchestrator::new(EngineConfig::default(), judge).unwrap();
    let doc = diff("周报.xlsx", fixtures::escalated_only_diff(1));

    assert!(orchestrator.review_document(&doc).await.is_err());
}

#[tokio::test]
async fn test_batch_report_intervention_rate_and_patterns() {
    // Document 1: one escalated item (fast-pass), one rule-only item.
    // Document 2: one rule-only item in a second table.
    let judge = Arc::new(ScriptedJudge::new(["SAFE, 95, fine"]));
    let orchestrator = BatchOrchestrator::new(EngineConfig::default(), judge).unwrap();
    let diffs = vec![
        diff(
            "一组.xlsx",
            vec![
                Modification::new("C9", "负责人", 9, "张三", "李四", "甲表"),
                Modification::new("B9", "目标", 9, "", "新增目标", "甲表"),
            ],
        ),
        diff(
            "二组.xlsx",
            vec![Modification::new("B9", "目标", 9, "", "新增目标", "乙表")],
        ),
    ];

    let outcome = orchestrator.run_batch(&diffs, "2026-W35").await.unwrap();

    assert_eq!(outcome.documents.len(), 2);
    // 1 escalated of 3 modifications.
    assert!((outcome.report.ai_intervention_rate - 1.0 / 3.0).abs() < 1e-12);
    assert_eq!(outcome.report.table_scores.len(), 2);
    assert_eq!(outcome.report.week_label, "2026-W35");
    // 目标 addition in both tables: 0.8 * 0.6 * 0.8 = 0.384, above the
    // systemic floor in each, so the column spans two tables.
    assert!(outcome
        .report
        .detected_patterns
        .iter()
        .any(|p| p.contains("systemic change in 目标")));
    assert_eq!(outcome.workflow.auto_approved.len(), 1);
}

#[tokio::test]
async fn test_large_document_batches_split_correctly() {
    // 45 L2 items with layer1_batch_size 20 -> 3 layer-1 batches. All
    // respond RISKY, so one layer-2 batch of 45 (size cap 50) follows.
    let config = EngineConfig::default();
    let layer2_entries: Vec<String> = (1..=45)
        .map(|i| {
            format!(
                "{{\"index\":{},\"risk_level\":\"MEDIUM\",\"decision\":\"REVIEW\",\"confidence\":75,\"reason\":\"r\"}}",
                i
            )
        })
        .collect();
    let layer2_response = format!("[{}]", layer2_entries.join(","));
    let judge = Arc::new(ScriptedJudge::new([
        fixtures::layer1_response(20, "RISKY, 85, drift"),
        fixtures::layer1_response(20, "RISKY, 85, drift"),
        fixtures::layer1_response(20, "RISKY, 85, drift"),
        layer2_response,
    ]));
    let orchestrator = BatchOrchestrator::new(config, judge.clone()).unwrap();
    let doc = diff("周报.xlsx", fixtures::escalated_only_diff(45));

    let outcome = orchestrator.review_document(&doc).await.unwrap();
    assert_eq!(judge.received_prompts().len(), 4);
    assert_eq!(outcome.records.len(), 45);
    assert!(outcome
        .records
        .iter()
        .all(|r| r.final_decision == FinalDecision::Review
            && r.resolved_by == Resolution::Layer2Analysis));
}
