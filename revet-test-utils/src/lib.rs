//! REVET Test Utilities
//!
//! Centralized test infrastructure for the REVET workspace:
//! - Proptest generators for modifications and judgment-service responses
//! - Scripted/failing judgment providers (re-exported from revet-judge)
//! - Fixtures for common document scenarios
//! - Custom assertions for score and record validation

// Re-export the in-memory providers from their source crate
pub use revet_judge::{FailingJudge, ScriptedJudge};

// Re-export core types for convenience
pub use revet_core::{
    ChangeKind, ColumnTier, EngineConfig, EscalationRecord, EscalationState, FinalDecision,
    Layer1Judgment, Modification, ModificationId, Resolution, RevetError, RevetResult, RiskLevel,
    ScoringResult, new_modification_id,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use proptest::prelude::*;
    use revet_core::{FinalDecision, Layer1Judgment, Modification};

    /// Column names spanning all three tiers plus an unknown one.
    pub fn arb_column_name() -> impl Strategy<Value = String> {
        prop::sample::select(vec![
            "目标".to_string(),
            "截止时间".to_string(),
            "优先级".to_string(),
            "负责人".to_string(),
            "进展说明".to_string(),
            "当前状态".to_string(),
            "序号".to_string(),
            "备注".to_string(),
            "自定义列".to_string(),
        ])
    }

    pub fn arb_cell_value() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            "[0-9]{1,6}",
            "[0-9]{1,4}\\.[0-9]{1,2}",
            "[a-z\\u4e00-\\u4eff]{1,20}",
        ]
    }

    pub fn arb_confidence() -> impl Strategy<Value = u8> {
        0u8..=100
    }

    pub fn arb_modification() -> impl Strategy<Value = Modification> {
        (
            arb_column_name(),
            1u32..=60,
            arb_cell_value(),
            arb_cell_value(),
            prop::sample::select(vec!["甲表".to_string(), "乙表".to_string(), "丙表".to_string()]),
        )
            .prop_map(|(column_name, row_index, old_value, new_value, table_name)| {
                Modification::new(
                    format!("B{}", row_index),
                    column_name,
                    row_index,
                    old_value,
                    new_value,
                    table_name,
                )
            })
    }

    /// A well-formed layer-1 response line for the given judgment.
    pub fn arb_layer1_line() -> impl Strategy<Value = String> {
        (
            prop::sample::select(vec![
                Layer1Judgment::Safe,
                Layer1Judgment::Risky,
                Layer1Judgment::Unsure,
            ]),
            arb_confidence(),
            "[a-z ]{0,30}",
        )
            .prop_map(|(judgment, confidence, reason)| {
                let token = match judgment {
                    Layer1Judgment::Safe => "SAFE",
                    Layer1Judgment::Risky => "RISKY",
                    Layer1Judgment::Unsure => "UNSURE",
                };
                format!("{}, {}, {}", token, confidence, reason)
            })
    }

    /// A well-formed layer-2 JSON entry for the given 1-based index.
    pub fn arb_layer2_entry(index: usize) -> impl Strategy<Value = String> {
        (
            prop::sample::select(vec![
                FinalDecision::Approve,
                FinalDecision::Conditional,
                FinalDecision::Review,
                FinalDecision::Reject,
            ]),
            arb_confidence(),
        )
            .prop_map(move |(decision, confidence)| {
                let token = match decision {
                    FinalDecision::Approve => "APPROVE",
                    FinalDecision::Conditional => "CONDITIONAL",
                    FinalDecision::Review => "REVIEW",
                    FinalDecision::Reject => "REJECT",
                };
                format!(
                    "{{\"index\": {}, \"risk_level\": \"MEDIUM\", \"decision\": \"{}\", \"confidence\": {}, \"reason\": \"r\"}}",
                    index, token, confidence
                )
            })
    }

    /// Text the judgment service might return when it ignores the response
    /// format entirely.
    pub fn arb_malformed_response() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            "[a-zA-Z ,.]{1,80}",
            Just("```json\nnot actually json\n```".to_string()),
            Just("][".to_string()),
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    use revet_core::Modification;

    /// A small weekly-report diff touching all three column tiers.
    pub fn mixed_tier_diff() -> Vec<Modification> {
        vec![
            Modification::new("B4", "目标", 4, "上线灰度", "全量上线", "任务表"),
            Modification::new("C9", "负责人", 9, "张三", "李四", "任务表"),
            Modification::new("A9", "序号", 9, "1", "2", "任务表"),
        ]
    }

    /// A diff consisting entirely of L2 (escalated) modifications.
    pub fn escalated_only_diff(count: usize) -> Vec<Modification> {
        (0..count)
            .map(|i| {
                Modification::new(
                    format!("C{}", i + 4),
                    "进展说明",
                    (i + 4) as u32,
                    "进行中",
                    "已完成",
                    "任务表",
                )
            })
            .collect()
    }

    /// One layer-1 response covering `count` items with the same line.
    pub fn layer1_response(count: usize, line: &str) -> String {
        vec![line; count].join("\n")
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

/// Assert the structural invariants every scoring result must uphold.
pub fn assert_score_valid(score: &revet_core::ScoringResult) {
    assert!(
        (0.0..=1.0).contains(&score.final_score),
        "final_score {} out of [0, 1] for {}",
        score.final_score,
        score.cell_ref
    );
    assert_eq!(
        score.risk_level,
        revet_core::RiskLevel::from_modification_score(score.final_score),
        "risk_level does not match final_score bucket for {}",
        score.cell_ref
    );
}

/// Assert a finalized escalation record is internally consistent.
pub fn assert_record_finalized(record: &revet_core::EscalationRecord) {
    assert_eq!(record.state, revet_core::EscalationState::Finalized);
    if record.resolved_by == revet_core::Resolution::Layer1Screen {
        assert_eq!(record.final_decision, revet_core::FinalDecision::Approve);
        assert!(record.layer2_decision.is_none());
    } else {
        assert!(record.layer2_decision.is_some());
    }
    // CONDITIONAL never survives normalization.
    assert_ne!(record.final_decision, revet_core::FinalDecision::Conditional);
}

// ============================================================================
// TESTS
// ============================================================================
