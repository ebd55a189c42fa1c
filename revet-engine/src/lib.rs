//! REVET Engine - Change-Risk Scoring and Two-Layer AI Escalation
//!
//! Turns a list of detected cell-level differences into per-modification
//! risk scores, escalation decisions, approval workflows, and a
//! cross-document aggregation report.
//!
//! Control flow: the classifier tags each modification with a column tier;
//! the scorer computes base/final scores for L1 and L3 directly; L2
//! modifications pass through the two-layer escalation pipeline, which
//! overrides the AI-adjustment term before the final score is recomputed;
//! the workflow builder and aggregator consume the finalized decisions.

mod aggregate;
mod classify;
mod escalate;
mod orchestrate;
mod report;
mod score;
mod workflow;

pub use aggregate::*;
pub use classify::*;
pub use escalate::*;
pub use orchestrate::*;
pub use report::*;
pub use score::*;
pub use workflow::*;
