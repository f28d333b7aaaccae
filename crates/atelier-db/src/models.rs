//! Database row types — these map directly to SQLite rows.
//! Distinct from the atelier-types API models to keep the DB layer
//! independent; conversions live here and fail loudly on corrupt rows.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};

use atelier_types::models::{
    Measurements, Message, MessageType, Order, OrderStatus, Product, Role, User,
};

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub phone: Option<String>,
    pub measurements: Option<String>,
    pub is_active: bool,
    pub last_login: Option<String>,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub kind: String,
    pub content: String,
    pub is_read: bool,
    pub read_at: Option<String>,
    pub order_id: Option<String>,
    pub metadata: Option<String>,
    pub created_at: String,
}

pub struct ProductRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub base_price: f64,
    pub category: String,
    pub available: bool,
    pub customizable: bool,
    pub created_at: String,
}

pub struct OrderRow {
    pub id: String,
    pub customer_id: String,
    pub product_id: String,
    pub status: String,
    pub quantity: u32,
    pub total_price: f64,
    pub customizations: Option<String>,
    pub created_at: String,
}

/// SQLite stores timestamps either as RFC 3339 (rows we write) or as
/// "YYYY-MM-DD HH:MM:SS" (column defaults). Accept both.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("corrupt timestamp '{}'", s))
}

impl UserRow {
    pub fn into_user(self) -> Result<User> {
        let measurements: Option<Measurements> = self
            .measurements
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .with_context(|| format!("corrupt measurements on user '{}'", self.id))?;

        Ok(User {
            id: self.id.parse()?,
            role: Role::parse(&self.role).ok_or_else(|| anyhow!("unknown role '{}'", self.role))?,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            measurements,
            is_active: self.is_active,
            last_login: self.last_login.as_deref().map(parse_timestamp).transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl MessageRow {
    pub fn from_message(m: &Message) -> MessageRow {
        MessageRow {
            id: m.id.to_string(),
            sender_id: m.sender_id.to_string(),
            recipient_id: m.recipient_id.to_string(),
            kind: m.kind.as_str().to_string(),
            content: m.content.clone(),
            is_read: m.is_read,
            read_at: m.read_at.map(|t| t.to_rfc3339()),
            order_id: m.order_id.map(|id| id.to_string()),
            metadata: m.metadata.as_ref().map(|v| v.to_string()),
            created_at: m.created_at.to_rfc3339(),
        }
    }

    pub fn into_message(self) -> Result<Message> {
        let metadata = self
            .metadata
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .with_context(|| format!("corrupt metadata on message '{}'", self.id))?;

        Ok(Message {
            id: self.id.parse()?,
            sender_id: self.sender_id.parse()?,
            recipient_id: self.recipient_id.parse()?,
            kind: MessageType::parse(&self.kind)
                .ok_or_else(|| anyhow!("unknown message type '{}'", self.kind))?,
            content: self.content,
            is_read: self.is_read,
            read_at: self.read_at.as_deref().map(parse_timestamp).transpose()?,
            order_id: self.order_id.map(|s| s.parse()).transpose()?,
            metadata,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl ProductRow {
    pub fn into_product(self) -> Result<Product> {
        Ok(Product {
            id: self.id.parse()?,
            name: self.name,
            description: self.description,
            base_price: self.base_price,
            category: self.category,
            available: self.available,
            customizable: self.customizable,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl OrderRow {
    pub fn into_order(self) -> Result<Order> {
        Ok(Order {
            id: self.id.parse()?,
            customer_id: self.customer_id.parse()?,
            product_id: self.product_id.parse()?,
            status: OrderStatus::parse(&self.status)
                .ok_or_else(|| anyhow!("unknown order status '{}'", self.status))?,
            quantity: self.quantity,
            total_price: self.total_price,
            customizations: self
                .customizations
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}
