//! Append-only audit trail for privileged actions.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::storage::Store;
use crate::types::{AuditAction, AuditEntry};

pub struct AuditLog {
    store: Arc<dyn Store>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Record a privileged action. Entries are never mutated afterwards.
    pub async fn record(
        &self,
        actor_id: Uuid,
        action: AuditAction,
        entity_kind: &str,
        entity_id: Uuid,
        detail: serde_json::Value,
    ) -> EngineResult<()> {
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            actor_id,
            action,
            entity_kind: entity_kind.to_string(),
            entity_id,
            detail,
            recorded_at: Utc::now(),
        };
        log::info!(
            "audit: actor={} action={:?} entity={}/{}",
            actor_id,
            action,
            entity_kind,
            entity_id
        );
        self.store.append_audit(entry).await?;
        Ok(())
    }
}
