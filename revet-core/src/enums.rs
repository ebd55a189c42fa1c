//! Closed enumerations for tiers, change kinds, judgments, and decisions.
//!
//! Judgment and decision values arrive from the judgment service as free-form
//! strings; the parse helpers here always resolve unknown tokens to the
//! safest variant (`Unsure` for layer-1 judgments, `Review` for decisions)
//! so no item ever slides toward silent approval.

use serde::{Deserialize, Serialize};

// ============================================================================
// COLUMN TIER
// ============================================================================

/// A column's a-priori risk classification. L1 highest, L3 lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnTier {
    /// High risk: target, deadline, acceptance-criteria fields.
    L1,
    /// Medium risk: fields whose changes need semantic judgment.
    L2,
    /// Low risk: free-form and log fields. Unmapped columns land here.
    L3,
}

impl ColumnTier {
    /// Base score constant for the tier.
    pub fn base_score(self) -> f64 {
        match self {
            ColumnTier::L1 => 0.8,
            ColumnTier::L2 => 0.5,
            ColumnTier::L3 => 0.2,
        }
    }

    /// Only L2 modifications are routed through the escalation pipeline.
    pub fn is_escalated(self) -> bool {
        matches!(self, ColumnTier::L2)
    }
}

// ============================================================================
// CHANGE KIND
// ============================================================================

/// Classification of a cell change by its value transition.
///
/// The weights are tunable constants on a 0-1 scale; they feed the
/// multiplicative scoring formula as the change factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Empty old value, non-empty new value.
    Addition,
    /// Non-empty old value, empty new value.
    Deletion,
    /// Numeric change with relative magnitude below the minor threshold.
    NumericMinor,
    /// Numeric change with relative magnitude below the moderate threshold.
    NumericModerate,
    /// Numeric change at or above the moderate threshold.
    NumericMajor,
    /// Either value is non-numeric; generic text edit.
    TextEdit,
}

impl ChangeKind {
    /// Change-factor weight for this kind of transition.
    pub fn weight(self) -> f64 {
        match self {
            ChangeKind::Addition => 0.6,
            ChangeKind::Deletion => 0.3,
            ChangeKind::NumericMinor => 0.8,
            ChangeKind::NumericModerate => 0.5,
            ChangeKind::NumericMajor => 0.2,
            ChangeKind::TextEdit => 0.4,
        }
    }
}

// ============================================================================
// RISK LEVEL
// ============================================================================

/// Bucketed risk level, used both per modification and system-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Bucket a per-modification final score.
    ///
    /// [0, 0.3) LOW, [0.3, 0.6) MEDIUM, [0.6, 0.85) HIGH, [0.85, 1.0] CRITICAL.
    pub fn from_modification_score(score: f64) -> Self {
        if score >= 0.85 {
            RiskLevel::Critical
        } else if score >= 0.6 {
            RiskLevel::High
        } else if score >= 0.3 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Bucket the system-wide mean score. The system thresholds are
    /// deliberately tighter than the per-modification ones.
    ///
    /// >= 0.7 CRITICAL, [0.5, 0.7) HIGH, [0.3, 0.5) MEDIUM, < 0.3 LOW.
    pub fn from_system_score(score: f64) -> Self {
        if score >= 0.7 {
            RiskLevel::Critical
        } else if score >= 0.5 {
            RiskLevel::High
        } else if score >= 0.3 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

// ============================================================================
// LAYER-1 JUDGMENT
// ============================================================================

/// Cheap-screen verdict from the first escalation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer1Judgment {
    Safe,
    Risky,
    Unsure,
}

impl Layer1Judgment {
    /// Parse a judgment token from a layer-1 response line.
    /// Unknown tokens resolve to `Unsure` - never to `Safe`.
    pub fn parse_token(token: &str) -> Self {
        match token.trim().to_ascii_uppercase().as_str() {
            "SAFE" => Layer1Judgment::Safe,
            "RISKY" => Layer1Judgment::Risky,
            "UNSURE" => Layer1Judgment::Unsure,
            _ => Layer1Judgment::Unsure,
        }
    }
}

// ============================================================================
// FINAL DECISION
// ============================================================================

/// Final decision for an escalated modification.
///
/// `Conditional` is a legacy layer-1 value kept for compatibility with
/// stored artifacts; the layer-2 parser normalizes it away (see
/// [`FinalDecision::normalized`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FinalDecision {
    Approve,
    Conditional,
    Review,
    Reject,
}

impl FinalDecision {
    /// Parse a decision token from a judgment-service response.
    /// Unknown tokens resolve to `Review` - never to `Approve`.
    pub fn parse_token(token: &str) -> Self {
        match token.trim().to_ascii_uppercase().as_str() {
            "APPROVE" => FinalDecision::Approve,
            "CONDITIONAL" => FinalDecision::Conditional,
            "REVIEW" => FinalDecision::Review,
            "REJECT" => FinalDecision::Reject,
            _ => FinalDecision::Review,
        }
    }

    /// Layer 2 only emits the closed three-way set APPROVE/REVIEW/REJECT;
    /// a stray CONDITIONAL is folded into REVIEW.
    pub fn normalized(self) -> Self {
        match self {
            FinalDecision::Conditional => FinalDecision::Review,
            other => other,
        }
    }

    /// AI adjustment factor applied when re-scoring an escalated item.
    pub fn ai_adjustment(self) -> f64 {
        match self {
            FinalDecision::Approve => 0.6,
            FinalDecision::Conditional => 0.8,
            FinalDecision::Review => 1.2,
            FinalDecision::Reject => 1.5,
        }
    }

    /// Whether this decision requires a human in the loop.
    pub fn requires_approval(self) -> bool {
        !matches!(self, FinalDecision::Approve)
    }
}

// ============================================================================
// ESCALATION STATE MACHINE
// ============================================================================

/// Lifecycle state of one escalation record.
///
/// `Pending -> (Finalized | Layer2Pending)`, then `Layer2Pending ->
/// Layer2Done -> Finalized`. A layer-1 fast pass skips straight to
/// `Finalized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscalationState {
    Pending,
    Layer2Pending,
    Layer2Done,
    Finalized,
}

/// Which escalation layer a batch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscalationLayer {
    Layer1,
    Layer2,
}

/// How a record reached its final decision. Recorded for audit so workflow
/// files can distinguish a layer-1 fast pass from a layer-2 approval from a
/// fail-safe default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// Finalized by the layer-1 screen (SAFE at high confidence).
    Layer1Screen,
    /// Finalized by the layer-2 deep analysis.
    Layer2Analysis,
    /// Defaulted to REVIEW because a batch could not be judged.
    FailSafe,
}

// ============================================================================
// RISK TREND
// ============================================================================

/// Per-table trend classification, bucketed from the table's average score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskTrend {
    Stable,
    Drifting,
    Elevated,
    Critical,
}

impl RiskTrend {
    /// Classify a table from its average final score.
    pub fn from_average(avg_score: f64) -> Self {
        if avg_score >= 0.85 {
            RiskTrend::Critical
        } else if avg_score >= 0.6 {
            RiskTrend::Elevated
        } else if avg_score >= 0.3 {
            RiskTrend::Drifting
        } else {
            RiskTrend::Stable
        }
    }
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
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// For any string, the layer-1 parser SHALL return a valid variant
        /// and SHALL only return Safe for the literal SAFE token.
        #[test]
        fn prop_layer1_parse_never_fails_open(token in ".{0,40}") {
            let judgment = Layer1Judgment::parse_token(&token);
            if judgment == Layer1Judgment::Safe {
                prop_assert_eq!(token.trim().to_ascii_uppercase(), "SAFE");
            }
        }

        /// For any string, the decision parser SHALL only return Approve
        /// for the literal APPROVE token.
        #[test]
        fn prop_decision_parse_never_fails_open(token in ".{0,40}") {
            let decision = FinalDecision::parse_token(&token);
            if decision == FinalDecision::Approve {
                prop_assert_eq!(token.trim().to_ascii_uppercase(), "APPROVE");
            }
        }

        /// Any score in [0,1] SHALL land in exactly one bucket, and the
        /// bucket ordering SHALL be monotone in the score.
        #[test]
        fn prop_risk_buckets_are_monotone(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                RiskLevel::from_modification_score(lo) <= RiskLevel::from_modification_score(hi)
            );
            prop_assert!(
                RiskLevel::from_system_score(lo) <= RiskLevel::from_system_score(hi)
            );
        }
    }
}
