//! Persistence adapter
//!
//! The only path from the engine to durable storage. Failures are logged
//! and swallowed; in-memory operation always continues.

use std::sync::Arc;
use ticker_store::{AuditEvent, AuditEventType, PersistedSnapshot, Store};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn Store>,
}

impl Persistence {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Write the snapshot, logging on failure
    pub fn save(&self, snapshot: &PersistedSnapshot) {
        if let Err(e) = self.store.save_snapshot(snapshot) {
            warn!(error = %e, "Failed to save snapshot");
        }
    }

    /// Read the snapshot. Missing or unreadable state reads as `None`.
    pub fn load(&self) -> Option<PersistedSnapshot> {
        match self.store.load_snapshot() {
            Ok(Some(snapshot)) => {
                debug!("Loaded persisted snapshot");
                Some(snapshot)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to load snapshot, starting fresh");
                None
            }
        }
    }

    pub fn audit(&self, event: AuditEventType) {
        if let Err(e) = self.store.append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to append audit event");
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.store.is_healthy()
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}
