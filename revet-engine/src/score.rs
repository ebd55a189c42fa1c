//! Deterministic scorer
//!
//! Computes the five-factor risk score for one modification:
//! `final_score = clamp(base x change_factor x importance x ai x confidence, 0, 1)`.
//!
//! Pure and idempotent: the same modification and tier always produce the
//! same result, and this module never invokes the escalation pipeline. The
//! orchestrator decides whether an L2 result later gets its AI terms patched
//! via [`apply_escalation`].

use revet_core::{
    ChangeKind, ColumnTier, EngineConfig, EscalationRecord, Modification, Resolution, RiskLevel,
    ScoringResult,
};

/// Classify the value transition and return its change-factor weight.
pub fn change_factor(old_value: &str, new_value: &str, config: &EngineConfig) -> (ChangeKind, f64) {
    let old = old_value.trim();
    let new = new_value.trim();

    let kind = if old.is_empty() && !new.is_empty() {
        ChangeKind::Addition
    } else if !old.is_empty() && new.is_empty() {
        ChangeKind::Deletion
    } else {
        match (old.parse::<f64>(), new.parse::<f64>()) {
            (Ok(o), Ok(n)) => {
                // Relative change; 1.0 when the old value is zero.
                let relative = if o == 0.0 { 1.0 } else { (n - o).abs() / o.abs() };
                if relative < config.minor_change_threshold {
                    ChangeKind::NumericMinor
                } else if relative < config.moderate_change_threshold {
                    ChangeKind::NumericModerate
                } else {
                    ChangeKind::NumericMajor
                }
            }
            _ => ChangeKind::TextEdit,
        }
    };

    (kind, kind.weight())
}

/// Positional importance weight.
///
/// Header/lead rows and the two lead columns of the canonical order are
/// structurally more sensitive; their weight is the unit weight minus the
/// configured penalty, floored at zero.
pub fn importance_weight(modification: &Modification, config: &EngineConfig) -> f64 {
    let positionally_sensitive = modification.row_index <= config.lead_row_limit
        || config
            .lead_columns()
            .iter()
            .any(|c| c == &modification.column_name);

    if positionally_sensitive {
        (1.0 - config.positional_penalty).max(0.0)
    } else {
        1.0
    }
}

/// Step function mapping a reported confidence (0-100) to its weight.
pub fn confidence_weight(confidence: u8) -> f64 {
    match confidence {
        90..=u8::MAX => 1.0,
        70..=89 => 0.9,
        50..=69 => 0.8,
        _ => 0.7,
    }
}

fn clamp_unit(score: f64) -> f64 {
    score.clamp(0.0, 1.0)
}

/// Score one modification for the given tier.
///
/// `ai_adjustment` and `confidence_weight` start at 1.0; they are overridden
/// only for L2 modifications, by the escalation pipeline, through
/// [`apply_escalation`].
pub fn score_modification(
    config: &EngineConfig,
    modification: &Modification,
    tier: ColumnTier,
) -> ScoringResult {
    let base_score = tier.base_score();
    let (change_kind, change_factor) =
        change_factor(&modification.old_value, &modification.new_value, config);
    let importance_weight = importance_weight(modification, config);
    let ai_adjustment = 1.0;
    let confidence_weight = 1.0;

    let final_score = clamp_unit(
        base_score * change_factor * importance_weight * ai_adjustment * confidence_weight,
    );

    ScoringResult {
        modification_id: modification.modification_id,
        cell_ref: modification.cell_ref.clone(),
        column_name: modification.column_name.clone(),
        table_name: modification.table_name.clone(),
        column_tier: tier,
        base_score,
        change_kind,
        change_factor,
        importance_weight,
        ai_adjustment,
        confidence_weight,
        final_score,
        risk_level: RiskLevel::from_modification_score(final_score),
    }
}

/// Recompute a scoring result with the escalation record's AI terms.
///
/// Only records that went through layer 2 (or were fail-safed there) carry
/// an override; records fast-passed by the layer-1 screen keep the default
/// AI terms, so the original result is returned unchanged.
pub fn apply_escalation(result: &ScoringResult, record: &EscalationRecord) -> ScoringResult {
    if record.resolved_by == Resolution::Layer1Screen {
        return result.clone();
    }

    let ai_adjustment = record.final_decision.ai_adjustment();
    let confidence = confidence_weight(record.resolving_confidence());

    let final_score = clamp_unit(
        result.base_score
            * result.change_factor
            * result.importance_weight
            * ai_adjustment
            * confidence,
    );

    ScoringResult {
        ai_adjustment,
        confidence_weight: confidence,
        final_score,
        risk_level: RiskLevel::from_modification_score(final_score),
        ..result.clone()
    }
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
