//! Read-receipt tracking. Independent of connection presence: a user can
//! mark messages read over any authenticated connection, whether or not
//! the sender is online. No read event is pushed to the sender.

use chrono::Utc;
use uuid::Uuid;

use atelier_types::models::Message;

use crate::error::GatewayError;
use crate::relay::Relay;

impl Relay {
    /// Mark a message read on behalf of `requester_id`.
    ///
    /// Only the recipient may mark their own inbound message; the sender
    /// gets `Forbidden`. Idempotent: once read, the original timestamp is
    /// returned unchanged forever.
    pub async fn mark_as_read(
        &self,
        message_id: Uuid,
        requester_id: Uuid,
    ) -> Result<Message, GatewayError> {
        let message = self.load_message(message_id).await?;

        if message.recipient_id != requester_id {
            return Err(GatewayError::Forbidden);
        }

        if message.is_read {
            return Ok(message);
        }

        let read_at = Utc::now();
        let db = self.db().clone();
        let id = message_id.to_string();
        let stamp = read_at.to_rfc3339();
        let updated = tokio::task::spawn_blocking(move || db.mark_message_read(&id, &stamp))
            .await
            .map_err(|e| GatewayError::Persistence(e.into()))?
            .map_err(GatewayError::Persistence)?;

        if updated {
            Ok(Message {
                is_read: true,
                read_at: Some(read_at),
                ..message
            })
        } else {
            // Lost a concurrent race; reload to return the winning timestamp.
            self.load_message(message_id).await
        }
    }

    async fn load_message(&self, message_id: Uuid) -> Result<Message, GatewayError> {
        let db = self.db().clone();
        let id = message_id.to_string();
        let row = tokio::task::spawn_blocking(move || db.get_message(&id))
            .await
            .map_err(|e| GatewayError::Persistence(e.into()))?
            .map_err(GatewayError::Persistence)?
            .ok_or(GatewayError::NotFound)?;

        row.into_message().map_err(GatewayError::Persistence)
    }
}
