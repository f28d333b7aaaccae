use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use atelier_db::Database;
use atelier_db::models::MessageRow;
use atelier_types::events::ServerEvent;
use atelier_types::models::{Message, MessageType};

use crate::error::GatewayError;
use crate::registry::Registry;

/// Coordinates inbound send events: resolves the sender against the
/// registry, persists through the store, then fans the message out to the
/// recipient's live connections. Persistence failure aborts the send before
/// any delivery; fan-out failure never rolls persistence back.
#[derive(Clone)]
pub struct Relay {
    db: Arc<Database>,
    registry: Registry,
}

impl Relay {
    pub fn new(db: Arc<Database>, registry: Registry) -> Self {
        Self { db, registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn db(&self) -> &Arc<Database> {
        &self.db
    }

    /// Handle a validated-shape send event from `sender_handle`.
    ///
    /// An unregistered handle fails `Unauthorized` without touching the
    /// store. A recipient with no open connections is not an error — the
    /// message is persisted for later retrieval.
    pub async fn send(
        &self,
        sender_handle: Uuid,
        recipient_id: Uuid,
        kind: MessageType,
        content: String,
        order_id: Option<Uuid>,
        metadata: Option<serde_json::Value>,
    ) -> Result<Message, GatewayError> {
        let sender_id = self
            .registry
            .lookup(sender_handle)
            .await
            .ok_or(GatewayError::Unauthorized)?;

        let message = Message {
            id: Uuid::new_v4(),
            sender_id,
            recipient_id,
            kind,
            content,
            is_read: false,
            read_at: None,
            order_id,
            metadata,
            created_at: Utc::now(),
        };

        // Blocking insert off the async runtime; failure aborts the send.
        let row = MessageRow::from_message(&message);
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.insert_message(&row))
            .await
            .map_err(|e| GatewayError::Persistence(e.into()))?
            .map_err(GatewayError::Persistence)?;

        let delivered = self
            .registry
            .fan_out(recipient_id, ServerEvent::NewMessage(message.clone()))
            .await;

        debug!(
            "message {} from {} -> {} queued on {} connection(s)",
            message.id, sender_id, recipient_id, delivered
        );

        Ok(message)
    }
}
