use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            email           TEXT NOT NULL UNIQUE,
            password        TEXT NOT NULL,
            first_name      TEXT NOT NULL,
            last_name       TEXT NOT NULL,
            role            TEXT NOT NULL DEFAULT 'consumer',
            phone           TEXT,
            measurements    TEXT,
            is_active       INTEGER NOT NULL DEFAULT 1,
            last_login      TEXT,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS products (
            id              TEXT PRIMARY KEY,
            name            TEXT NOT NULL,
            description     TEXT NOT NULL,
            base_price      REAL NOT NULL,
            category        TEXT NOT NULL,
            available       INTEGER NOT NULL DEFAULT 1,
            customizable    INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS orders (
            id              TEXT PRIMARY KEY,
            customer_id     TEXT NOT NULL REFERENCES users(id),
            product_id      TEXT NOT NULL REFERENCES products(id),
            status          TEXT NOT NULL DEFAULT 'pending',
            quantity        INTEGER NOT NULL,
            total_price     REAL NOT NULL,
            customizations  TEXT,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_orders_customer
            ON orders(customer_id, created_at);

        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            sender_id       TEXT NOT NULL REFERENCES users(id),
            recipient_id    TEXT NOT NULL REFERENCES users(id),
            type            TEXT NOT NULL DEFAULT 'text',
            content         TEXT NOT NULL,
            is_read         INTEGER NOT NULL DEFAULT 0,
            read_at         TEXT,
            order_id        TEXT REFERENCES orders(id),
            metadata        TEXT,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_pair
            ON messages(sender_id, recipient_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_messages_unread
            ON messages(recipient_id, is_read);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
