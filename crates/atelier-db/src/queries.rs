use crate::Database;
use crate::models::{MessageRow, OrderRow, ProductRow, UserRow};
use anyhow::Result;
use rusqlite::{Row, params};

impl Database {
    // -- Users --

    pub fn create_user(&self, row: &UserRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password, first_name, last_name, role, phone,
                        measurements, is_active, last_login, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    row.id,
                    row.email,
                    row.password,
                    row.first_name,
                    row.last_name,
                    row.role,
                    row.phone,
                    row.measurements,
                    row.is_active,
                    row.last_login,
                    row.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("{} ORDER BY created_at DESC", SELECT_USER))?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Overwrite the mutable profile fields. Password and created_at are
    /// untouchable through this path.
    pub fn update_user(&self, row: &UserRow) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET first_name = ?2, last_name = ?3, role = ?4,
                        phone = ?5, is_active = ?6
                 WHERE id = ?1",
                params![
                    row.id,
                    row.first_name,
                    row.last_name,
                    row.role,
                    row.phone,
                    row.is_active,
                ],
            )?;
            Ok(n > 0)
        })
    }

    /// Removal deactivates instead of deleting: message and order rows
    /// keep referencing the user.
    pub fn deactivate_user(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("UPDATE users SET is_active = 0 WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.prepare(&format!("{} WHERE email = ?1", SELECT_USER))?
                .query_row([email], user_from_row)
                .optional()
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.prepare(&format!("{} WHERE id = ?1", SELECT_USER))?
                .query_row([id], user_from_row)
                .optional()
        })
    }

    pub fn update_last_login(&self, id: &str, at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE users SET last_login = ?2 WHERE id = ?1", [id, at])?;
            Ok(())
        })
    }

    pub fn update_measurements(&self, id: &str, measurements_json: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET measurements = ?2 WHERE id = ?1",
                [id, measurements_json],
            )?;
            Ok(n > 0)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, row: &MessageRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, recipient_id, type, content, is_read, read_at, order_id, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    row.id,
                    row.sender_id,
                    row.recipient_id,
                    row.kind,
                    row.content,
                    row.is_read,
                    row.read_at,
                    row.order_id,
                    row.metadata,
                    row.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            conn.prepare(&format!("{} WHERE id = ?1", SELECT_MESSAGE))?
                .query_row([id], message_from_row)
                .optional()
        })
    }

    /// Flip the read flag, first writer wins. The `is_read = 0` guard keeps
    /// the original read timestamp under concurrent markAsRead calls.
    /// Returns false if the message was already read (or absent).
    pub fn mark_message_read(&self, id: &str, read_at: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE messages SET is_read = 1, read_at = ?2 WHERE id = ?1 AND is_read = 0",
                [id, read_at],
            )?;
            Ok(n > 0)
        })
    }

    /// Messages exchanged between two users, newest first.
    pub fn get_conversation(&self, a: &str, b: &str, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE (sender_id = ?1 AND recipient_id = ?2)
                     OR (sender_id = ?2 AND recipient_id = ?1)
                 ORDER BY created_at DESC
                 LIMIT ?3",
                SELECT_MESSAGE
            ))?;

            let rows = stmt
                .query_map(params![a, b, limit], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_unread(&self, recipient_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let n: u64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE recipient_id = ?1 AND is_read = 0",
                [recipient_id],
                |row| row.get(0),
            )?;
            Ok(n)
        })
    }

    // -- Products --

    pub fn insert_product(&self, row: &ProductRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO products (id, name, description, base_price, category, available, customizable, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    row.id,
                    row.name,
                    row.description,
                    row.base_price,
                    row.category,
                    row.available,
                    row.customizable,
                    row.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_product(&self, id: &str) -> Result<Option<ProductRow>> {
        self.with_conn(|conn| {
            conn.prepare(&format!("{} WHERE id = ?1", SELECT_PRODUCT))?
                .query_row([id], product_from_row)
                .optional()
        })
    }

    pub fn list_products(&self, include_unavailable: bool) -> Result<Vec<ProductRow>> {
        self.with_conn(|conn| {
            let sql = if include_unavailable {
                format!("{} ORDER BY created_at DESC", SELECT_PRODUCT)
            } else {
                format!("{} WHERE available = 1 ORDER BY created_at DESC", SELECT_PRODUCT)
            };
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], product_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_product(&self, row: &ProductRow) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE products SET name = ?2, description = ?3, base_price = ?4,
                        category = ?5, available = ?6, customizable = ?7
                 WHERE id = ?1",
                params![
                    row.id,
                    row.name,
                    row.description,
                    row.base_price,
                    row.category,
                    row.available,
                    row.customizable,
                ],
            )?;
            Ok(n > 0)
        })
    }

    // -- Orders --

    pub fn insert_order(&self, row: &OrderRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO orders (id, customer_id, product_id, status, quantity, total_price, customizations, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    row.id,
                    row.customer_id,
                    row.product_id,
                    row.status,
                    row.quantity,
                    row.total_price,
                    row.customizations,
                    row.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_order(&self, id: &str) -> Result<Option<OrderRow>> {
        self.with_conn(|conn| {
            conn.prepare(&format!("{} WHERE id = ?1", SELECT_ORDER))?
                .query_row([id], order_from_row)
                .optional()
        })
    }

    pub fn list_orders_for_customer(&self, customer_id: &str) -> Result<Vec<OrderRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE customer_id = ?1 ORDER BY created_at DESC",
                SELECT_ORDER
            ))?;
            let rows = stmt
                .query_map([customer_id], order_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_orders(&self) -> Result<Vec<OrderRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("{} ORDER BY created_at DESC", SELECT_ORDER))?;
            let rows = stmt
                .query_map([], order_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_order_status(&self, id: &str, status: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("UPDATE orders SET status = ?2 WHERE id = ?1", [id, status])?;
            Ok(n > 0)
        })
    }
}

const SELECT_USER: &str = "SELECT id, email, password, first_name, last_name, role, phone,
       measurements, is_active, last_login, created_at FROM users";

const SELECT_MESSAGE: &str = "SELECT id, sender_id, recipient_id, type, content, is_read,
       read_at, order_id, metadata, created_at FROM messages";

const SELECT_PRODUCT: &str = "SELECT id, name, description, base_price, category, available,
       customizable, created_at FROM products";

const SELECT_ORDER: &str = "SELECT id, customer_id, product_id, status, quantity, total_price,
       customizations, created_at FROM orders";

fn user_from_row(row: &Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        role: row.get(5)?,
        phone: row.get(6)?,
        measurements: row.get(7)?,
        is_active: row.get(8)?,
        last_login: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn message_from_row(row: &Row) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        recipient_id: row.get(2)?,
        kind: row.get(3)?,
        content: row.get(4)?,
        is_read: row.get(5)?,
        read_at: row.get(6)?,
        order_id: row.get(7)?,
        metadata: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn product_from_row(row: &Row) -> rusqlite::Result<ProductRow> {
    Ok(ProductRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        base_price: row.get(3)?,
        category: row.get(4)?,
        available: row.get(5)?,
        customizable: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn order_from_row(row: &Row) -> rusqlite::Result<OrderRow> {
    Ok(OrderRow {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        product_id: row.get(2)?,
        status: row.get(3)?,
        quantity: row.get(4)?,
        total_price: row.get(5)?,
        customizations: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn seed_user(db: &Database, email: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_user(&UserRow {
            id: id.clone(),
            email: email.to_string(),
            password: "argon2-hash".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            role: "consumer".to_string(),
            phone: None,
            measurements: None,
            is_active: true,
            last_login: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        })
        .unwrap();
        id
    }

    fn seed_message(db: &Database, sender: &str, recipient: &str, content: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.insert_message(&MessageRow {
            id: id.clone(),
            sender_id: sender.to_string(),
            recipient_id: recipient.to_string(),
            kind: "text".to_string(),
            content: content.to_string(),
            is_read: false,
            read_at: None,
            order_id: None,
            metadata: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        })
        .unwrap();
        id
    }

    #[test]
    fn user_roundtrip_by_email_and_id() {
        let db = Database::open_in_memory().unwrap();
        let id = seed_user(&db, "ana@example.com");

        let by_email = db.get_user_by_email("ana@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, id);

        let by_id = db.get_user_by_id(&id).unwrap().unwrap();
        assert_eq!(by_id.email, "ana@example.com");

        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn create_user_persists_measurements_and_last_login() {
        let db = Database::open_in_memory().unwrap();
        let now = chrono::Utc::now().to_rfc3339();

        db.create_user(&UserRow {
            id: Uuid::new_v4().to_string(),
            email: "fitted@example.com".to_string(),
            password: "argon2-hash".to_string(),
            first_name: "Fit".to_string(),
            last_name: "Ted".to_string(),
            role: "consumer".to_string(),
            phone: Some("+15550100".to_string()),
            measurements: Some(r#"{"chest":98.0,"waist":82.5}"#.to_string()),
            is_active: true,
            last_login: Some(now.clone()),
            created_at: now,
        })
        .unwrap();

        let row = db.get_user_by_email("fitted@example.com").unwrap().unwrap();
        assert_eq!(
            row.measurements.as_deref(),
            Some(r#"{"chest":98.0,"waist":82.5}"#)
        );
        assert!(row.last_login.is_some());
    }

    #[test]
    fn list_update_and_deactivate_users() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a@example.com");
        seed_user(&db, "b@example.com");

        assert_eq!(db.list_users().unwrap().len(), 2);

        let mut row = db.get_user_by_id(&a).unwrap().unwrap();
        row.role = "store".to_string();
        row.phone = Some("+15550101".to_string());
        assert!(db.update_user(&row).unwrap());

        let reread = db.get_user_by_id(&a).unwrap().unwrap();
        assert_eq!(reread.role, "store");
        assert_eq!(reread.phone.as_deref(), Some("+15550101"));

        assert!(db.deactivate_user(&a).unwrap());
        assert!(!db.get_user_by_id(&a).unwrap().unwrap().is_active);
        // Row survives deactivation; only the flag flips.
        assert_eq!(db.list_users().unwrap().len(), 2);

        assert!(!db.deactivate_user(&Uuid::new_v4().to_string()).unwrap());
    }

    #[test]
    fn duplicate_email_rejected() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, "dup@example.com");

        let again = db.create_user(&UserRow {
            id: Uuid::new_v4().to_string(),
            email: "dup@example.com".to_string(),
            password: "x".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            role: "consumer".to_string(),
            phone: None,
            measurements: None,
            is_active: true,
            last_login: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        });
        assert!(again.is_err());
    }

    #[test]
    fn conversation_returns_both_directions_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a@example.com");
        let b = seed_user(&db, "b@example.com");
        let c = seed_user(&db, "c@example.com");

        seed_message(&db, &a, &b, "a to b");
        seed_message(&db, &b, &a, "b to a");
        seed_message(&db, &a, &c, "a to c");

        let convo = db.get_conversation(&a, &b, 50).unwrap();
        assert_eq!(convo.len(), 2);
        let contents: Vec<&str> = convo.iter().map(|m| m.content.as_str()).collect();
        assert!(contents.contains(&"a to b"));
        assert!(contents.contains(&"b to a"));
    }

    #[test]
    fn mark_read_first_writer_wins() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a@example.com");
        let b = seed_user(&db, "b@example.com");
        let mid = seed_message(&db, &a, &b, "hi");

        let first = "2026-01-01T00:00:00Z";
        assert!(db.mark_message_read(&mid, first).unwrap());
        // Second write is a no-op; the stored timestamp stays put.
        assert!(!db.mark_message_read(&mid, "2026-01-02T00:00:00Z").unwrap());

        let row = db.get_message(&mid).unwrap().unwrap();
        assert!(row.is_read);
        assert_eq!(row.read_at.as_deref(), Some(first));
    }

    #[test]
    fn unread_count_skips_read_and_outbound() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a@example.com");
        let b = seed_user(&db, "b@example.com");

        seed_message(&db, &a, &b, "one");
        let read_id = seed_message(&db, &a, &b, "two");
        seed_message(&db, &b, &a, "outbound from b's view");

        db.mark_message_read(&read_id, &chrono::Utc::now().to_rfc3339())
            .unwrap();

        assert_eq!(db.count_unread(&b).unwrap(), 1);
        assert_eq!(db.count_unread(&a).unwrap(), 1);
    }

    #[test]
    fn message_insert_enforces_user_fks() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a@example.com");

        let res = db.insert_message(&MessageRow {
            id: Uuid::new_v4().to_string(),
            sender_id: a,
            recipient_id: Uuid::new_v4().to_string(), // no such user
            kind: "text".to_string(),
            content: "hello?".to_string(),
            is_read: false,
            read_at: None,
            order_id: None,
            metadata: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        });
        assert!(res.is_err());
    }

    #[test]
    fn product_listing_filters_unavailable() {
        let db = Database::open_in_memory().unwrap();

        for (name, available) in [("jacket", true), ("retired coat", false)] {
            db.insert_product(&ProductRow {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                description: "made to measure".to_string(),
                base_price: 249.0,
                category: "outerwear".to_string(),
                available,
                customizable: true,
                created_at: chrono::Utc::now().to_rfc3339(),
            })
            .unwrap();
        }

        assert_eq!(db.list_products(false).unwrap().len(), 1);
        assert_eq!(db.list_products(true).unwrap().len(), 2);
    }

    #[test]
    fn order_status_update() {
        let db = Database::open_in_memory().unwrap();
        let customer = seed_user(&db, "buyer@example.com");

        let product_id = Uuid::new_v4().to_string();
        db.insert_product(&ProductRow {
            id: product_id.clone(),
            name: "shirt".to_string(),
            description: "custom".to_string(),
            base_price: 59.0,
            category: "shirts".to_string(),
            available: true,
            customizable: true,
            created_at: chrono::Utc::now().to_rfc3339(),
        })
        .unwrap();

        let order_id = Uuid::new_v4().to_string();
        db.insert_order(&OrderRow {
            id: order_id.clone(),
            customer_id: customer,
            product_id,
            status: "pending".to_string(),
            quantity: 2,
            total_price: 118.0,
            customizations: Some(r#"{"monogram":"AB"}"#.to_string()),
            created_at: chrono::Utc::now().to_rfc3339(),
        })
        .unwrap();

        assert!(db.update_order_status(&order_id, "confirmed").unwrap());
        let row = db.get_order(&order_id).unwrap().unwrap();
        assert_eq!(row.status, "confirmed");

        assert!(!db.update_order_status(&Uuid::new_v4().to_string(), "shipped").unwrap());
    }
}
