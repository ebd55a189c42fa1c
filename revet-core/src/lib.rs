//! REVET Core - Entity Types
//!
//! Pure data structures for change-risk scoring: modifications, scoring
//! results, escalation records, workflows, and aggregation reports.
//! This crate contains ONLY data types, bucketing helpers, and the
//! immutable engine configuration - no pipeline logic.

use chrono::{DateTime, Utc};
use uuid::Uuid;

mod config;
mod entities;
mod enums;
mod error;
mod report;

pub use config::*;
pub use entities::*;
pub use enums::*;
pub use error::*;
pub use report::*;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Modification identifier using UUIDv7 for timestamp-sortable IDs.
pub type ModificationId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 ModificationId (timestamp-sortable).
pub fn new_modification_id() -> ModificationId {
    Uuid::now_v7()
}

// ============================================================================
// TESTS
// ============================================================================
