//! Approval workflow construction
//!
//! Partitions finalized escalation records into the auto-approved set and
//! the pending-human-review set. Workflows are write-once batch artifacts;
//! re-running a batch mints a new workflow id rather than mutating an old
//! one.

use chrono::Utc;
use revet_core::{ApprovalWorkflow, EscalationRecord};

/// Build an approval workflow from finalized escalation records.
///
/// Records whose final decision is APPROVE are auto-approved; everything
/// else (REVIEW, REJECT) requires a human. Within each set the input order
/// is preserved.
pub fn build_workflow(records: &[EscalationRecord]) -> ApprovalWorkflow {
    let (pending, approved): (Vec<_>, Vec<_>) = records
        .iter()
        .cloned()
        .partition(EscalationRecord::approval_required);

    tracing::info!(
        auto_approved = approved.len(),
        pending = pending.len(),
        "built approval workflow"
    );

    ApprovalWorkflow {
        workflow_id: ApprovalWorkflow::new_workflow_id(),
        created_at: Utc::now(),
        auto_approved: approved,
        pending_approvals: pending,
    }
}

// ============================================================================
// TESTS
// ============================================================================
