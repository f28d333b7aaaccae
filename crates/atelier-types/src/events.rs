use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, MessageType};

/// Events sent FROM client TO server over the messaging gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Send a direct message to another user.
    #[serde(rename_all = "camelCase")]
    SendMessage {
        recipient_id: Uuid,
        #[serde(rename = "type", default)]
        kind: MessageType,
        content: String,
        #[serde(default)]
        order_id: Option<Uuid>,
        #[serde(default)]
        metadata: Option<serde_json::Value>,
    },

    /// Mark an inbound message as read.
    #[serde(rename_all = "camelCase")]
    MarkAsRead { message_id: Uuid },
}

/// Events pushed FROM server TO client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Server confirms the connection is authenticated and registered.
    #[serde(rename_all = "camelCase")]
    Ready { user_id: Uuid },

    /// A new message addressed to this user.
    NewMessage(Message),
}

/// Per-event reply frame. Every inbound client event gets exactly one of
/// these back on the same connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventReply {
    Ok { success: bool, message: Message },
    Err { error: String },
}

impl EventReply {
    pub fn ok(message: Message) -> Self {
        EventReply::Ok {
            success: true,
            message,
        }
    }

    pub fn err(error: impl std::fmt::Display) -> Self {
        EventReply::Err {
            error: error.to_string(),
        }
    }
}
