use rusqlite::Connection;

/// Create all tables if absent. Safe to run on every startup.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Catalog. price is in major currency units; NULL = free / not for sale
        CREATE TABLE IF NOT EXISTS materials (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT,
            price REAL,
            cover_ref TEXT,
            file_ref TEXT,
            is_draft INTEGER NOT NULL DEFAULT 0,
            publish_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_materials_published ON materials(publish_at) WHERE is_draft = 0;

        -- Webhook fulfillment claims. processing_key is the uniqueness constraint
        -- that makes the claim a single conditional write.
        CREATE TABLE IF NOT EXISTS processed_payments (
            processing_key TEXT PRIMARY KEY,
            status TEXT NOT NULL CHECK (status IN ('processing', 'completed', 'failed')),
            attempts INTEGER NOT NULL DEFAULT 1,
            last_error TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_processed_payments_status ON processed_payments(status, updated_at);

        CREATE TABLE IF NOT EXISTS newsletter_subscribers (
            email TEXT PRIMARY KEY,
            consent INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        "#,
    )
}
