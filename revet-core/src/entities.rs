//! Core entity structs: modifications, scoring results, escalation records,
//! and approval workflows.

use crate::{
    ColumnTier, ChangeKind, EscalationState, FinalDecision, Layer1Judgment, ModificationId,
    Resolution, RiskLevel, Timestamp,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// MODIFICATION
// ============================================================================

/// One detected cell change between two revisions of a tabular document.
///
/// Produced by an external diff collaborator; consumed read-only by the
/// scoring core. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
    pub modification_id: ModificationId,
    /// Spreadsheet cell reference, e.g. "B5".
    pub cell_ref: String,
    pub column_name: String,
    /// 1-based row index.
    pub row_index: u32,
    /// May be empty (addition).
    pub old_value: String,
    /// May be empty (deletion).
    pub new_value: String,
    pub table_name: String,
}

impl Modification {
    /// Create a modification with a fresh UUIDv7 identity.
    pub fn new(
        cell_ref: impl Into<String>,
        column_name: impl Into<String>,
        row_index: u32,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            modification_id: crate::new_modification_id(),
            cell_ref: cell_ref.into(),
            column_name: column_name.into(),
            row_index,
            old_value: old_value.into(),
            new_value: new_value.into(),
            table_name: table_name.into(),
        }
    }
}

// ============================================================================
// SCORING RESULT
// ============================================================================

/// Scoring output for one modification.
///
/// `final_score` is the product of the five factors, clamped to [0, 1].
/// For L1/L3 modifications the result is final at creation; for L2
/// modifications the escalation pipeline may patch `ai_adjustment`,
/// `confidence_weight`, and `final_score` exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub modification_id: ModificationId,
    pub cell_ref: String,
    pub column_name: String,
    pub table_name: String,
    pub column_tier: ColumnTier,
    pub base_score: f64,
    pub change_kind: ChangeKind,
    pub change_factor: f64,
    pub importance_weight: f64,
    pub ai_adjustment: f64,
    pub confidence_weight: f64,
    pub final_score: f64,
    pub risk_level: RiskLevel,
}

// ============================================================================
// ESCALATION RECORD
// ============================================================================

/// Two-layer decision tracking for one L2 modification.
///
/// Created empty, filled by layer 1, conditionally filled by layer 2, then
/// frozen. The `state` field follows the lifecycle in [`EscalationState`];
/// the transition methods below are the only sanctioned mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub modification_id: ModificationId,
    pub cell_ref: String,
    pub layer1_judgment: Layer1Judgment,
    /// 0-100.
    pub layer1_confidence: u8,
    pub layer1_reason: String,
    pub needs_layer2: bool,
    pub layer2_decision: Option<FinalDecision>,
    /// 0-100, present only when layer 2 ran (or fail-safed).
    pub layer2_confidence: Option<u8>,
    pub layer2_reason: Option<String>,
    pub final_decision: FinalDecision,
    pub resolved_by: Resolution,
    pub state: EscalationState,
}

impl EscalationRecord {
    /// Create an empty record in `Pending` state.
    ///
    /// The placeholder final decision is `Review` so that an unprocessed
    /// record can never read as approved.
    pub fn new(modification_id: ModificationId, cell_ref: impl Into<String>) -> Self {
        Self {
            modification_id,
            cell_ref: cell_ref.into(),
            layer1_judgment: Layer1Judgment::Unsure,
            layer1_confidence: 0,
            layer1_reason: String::new(),
            needs_layer2: false,
            layer2_decision: None,
            layer2_confidence: None,
            layer2_reason: None,
            final_decision: FinalDecision::Review,
            resolved_by: Resolution::FailSafe,
            state: EscalationState::Pending,
        }
    }

    /// Record the layer-1 screen outcome.
    ///
    /// Routing rule: layer 2 is needed for RISKY and UNSURE judgments, and
    /// for SAFE judgments below the confidence floor. Items that do not
    /// need layer 2 are immediately finalized APPROVE.
    pub fn record_layer1(
        &mut self,
        judgment: Layer1Judgment,
        confidence: u8,
        reason: impl Into<String>,
        confidence_floor: u8,
    ) {
        debug_assert_eq!(self.state, EscalationState::Pending);
        self.layer1_judgment = judgment;
        self.layer1_confidence = confidence.min(100);
        self.layer1_reason = reason.into();
        self.needs_layer2 = match judgment {
            Layer1Judgment::Risky | Layer1Judgment::Unsure => true,
            Layer1Judgment::Safe => confidence < confidence_floor,
        };
        if self.needs_layer2 {
            self.state = EscalationState::Layer2Pending;
        } else {
            self.final_decision = FinalDecision::Approve;
            self.resolved_by = Resolution::Layer1Screen;
            self.state = EscalationState::Finalized;
        }
    }

    /// Record the layer-2 deep-analysis outcome.
    pub fn record_layer2(
        &mut self,
        decision: FinalDecision,
        confidence: u8,
        reason: impl Into<String>,
    ) {
        debug_assert_eq!(self.state, EscalationState::Layer2Pending);
        let decision = decision.normalized();
        self.layer2_decision = Some(decision);
        self.layer2_confidence = Some(confidence.min(100));
        self.layer2_reason = Some(reason.into());
        self.final_decision = decision;
        self.resolved_by = Resolution::Layer2Analysis;
        self.state = EscalationState::Layer2Done;
    }

    /// Default this record to REVIEW because its batch could not be judged
    /// (parse failure, transport failure, or timeout). Fail-closed: never
    /// toward approval.
    pub fn fail_safe(&mut self, reason: impl Into<String>) {
        self.layer2_decision = Some(FinalDecision::Review);
        self.layer2_confidence = Some(0);
        self.layer2_reason = Some(reason.into());
        self.final_decision = FinalDecision::Review;
        self.resolved_by = Resolution::FailSafe;
        self.state = EscalationState::Layer2Done;
    }

    /// Freeze the record once its score has been patched.
    pub fn finalize(&mut self) {
        self.state = EscalationState::Finalized;
    }

    /// Confidence reported by whichever layer resolved the record.
    pub fn resolving_confidence(&self) -> u8 {
        self.layer2_confidence.unwrap_or(self.layer1_confidence)
    }

    /// Whether this record belongs in the pending-approvals set.
    pub fn approval_required(&self) -> bool {
        self.final_decision.requires_approval()
    }
}

// ============================================================================
// APPROVAL WORKFLOW
// ============================================================================

/// Batch artifact partitioning finalized escalation records into the
/// auto-approved and pending-human-review sets. Write-once: new runs create
/// new workflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalWorkflow {
    /// Timestamp-derived, collision-free within and across processes.
    pub workflow_id: String,
    pub created_at: Timestamp,
    pub auto_approved: Vec<EscalationRecord>,
    pub pending_approvals: Vec<EscalationRecord>,
}

impl ApprovalWorkflow {
    /// Mint a new workflow id: `wf-<UTC yyyymmddHHMMSS>-<uuidv7>`.
    pub fn new_workflow_id() -> String {
        format!("wf-{}-{}", Utc::now().format("%Y%m%d%H%M%S"), Uuid::now_v7())
    }
}

// ============================================================================
// TESTS
// ============================================================================
