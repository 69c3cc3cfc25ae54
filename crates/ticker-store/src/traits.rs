//! Store trait definitions

use crate::{AuditEvent, PersistedSnapshot, StoreResult};

/// Main store trait
pub trait Store: Send + Sync {
    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Meeting state snapshot

    /// Load the last saved snapshot.
    ///
    /// Returns an error only when the stored value is not a JSON object at all.
    fn load_snapshot(&self) -> StoreResult<Option<PersistedSnapshot>>;

    /// Save (replace) the snapshot
    fn save_snapshot(&self, snapshot: &PersistedSnapshot) -> StoreResult<()>;

    /// Remove the snapshot
    fn clear_snapshot(&self) -> StoreResult<()>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
