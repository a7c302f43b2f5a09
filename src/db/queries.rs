use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior, params, types::Value};

use crate::error::Result;
use crate::models::*;

use super::from_row::{
    MATERIAL_COLS, PROCESSED_PAYMENT_COLS, SUBSCRIBER_COLS, query_all, query_one,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

/// Builder for dynamic UPDATE statements with optional fields.
struct UpdateBuilder {
    table: &'static str,
    id: i64,
    fields: Vec<(&'static str, Value)>,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: i64) -> Self {
        Self {
            table,
            id,
            fields: Vec::new(),
        }
    }

    fn set_opt<V: Into<Value>>(mut self, column: &'static str, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.fields.push((column, v.into()));
        }
        self
    }

    fn execute(mut self, conn: &Connection) -> Result<bool> {
        if self.fields.is_empty() {
            return Ok(false);
        }
        self.fields.push(("updated_at", now().into()));
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!("UPDATE {} SET {} WHERE id = ?", self.table, sets.join(", "));
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }
}

// ============ Materials ============

pub fn create_material(conn: &Connection, input: &CreateMaterial) -> Result<Material> {
    let now = now();
    conn.execute(
        "INSERT INTO materials (title, description, price, cover_ref, file_ref, is_draft, publish_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            input.title.trim(),
            input.description,
            input.price,
            input.cover_ref,
            input.file_ref,
            input.is_draft as i32,
            input.publish_at,
            now,
        ],
    )?;

    Ok(Material {
        id: conn.last_insert_rowid(),
        title: input.title.trim().to_string(),
        description: input.description.clone(),
        price: input.price,
        cover_ref: input.cover_ref.clone(),
        file_ref: input.file_ref.clone(),
        is_draft: input.is_draft,
        publish_at: input.publish_at,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_material_by_id(conn: &Connection, id: i64) -> Result<Option<Material>> {
    query_one(
        conn,
        &format!("SELECT {} FROM materials WHERE id = ?1", MATERIAL_COLS),
        &[&id],
    )
}

/// Every material including drafts, newest first (admin view).
pub fn list_materials(conn: &Connection) -> Result<Vec<Material>> {
    query_all(
        conn,
        &format!("SELECT {} FROM materials ORDER BY id DESC", MATERIAL_COLS),
        &[],
    )
}

/// Published materials with a positive price.
pub fn list_paid_materials(conn: &Connection) -> Result<Vec<Material>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM materials
             WHERE is_draft = 0 AND (publish_at IS NULL OR publish_at <= ?1) AND price > 0
             ORDER BY id",
            MATERIAL_COLS
        ),
        &[&now()],
    )
}

/// Published materials without a price.
pub fn list_free_materials(conn: &Connection) -> Result<Vec<Material>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM materials
             WHERE is_draft = 0 AND (publish_at IS NULL OR publish_at <= ?1) AND (price IS NULL OR price = 0)
             ORDER BY id",
            MATERIAL_COLS
        ),
        &[&now()],
    )
}

pub fn update_material(conn: &Connection, id: i64, input: &UpdateMaterial) -> Result<Option<Material>> {
    UpdateBuilder::new("materials", id)
        .set_opt("title", input.title.as_ref().map(|t| t.trim().to_string()))
        .set_opt("description", input.description.clone())
        .set_opt("price", input.price)
        .set_opt("cover_ref", input.cover_ref.clone())
        .set_opt("file_ref", input.file_ref.clone())
        .set_opt("is_draft", input.is_draft.map(|d| d as i32))
        .set_opt("publish_at", input.publish_at)
        .execute(conn)?;
    get_material_by_id(conn, id)
}

pub fn delete_material(conn: &Connection, id: i64) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM materials WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

pub fn count_materials(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM materials", [], |row| row.get(0))
        .map_err(Into::into)
}

// ============ Processed Payments (webhook idempotency) ============

/// Atomically claim a processing key for fulfillment.
///
/// One conditional upsert decides the outcome:
/// - no row: insert as `processing` -> `Claimed`
/// - `failed` row, or `processing` row last touched before `stale_before`:
///   flip back to `processing` and bump attempts -> `Reclaimed`
/// - anything else: untouched -> `AlreadyHandled`
///
/// Concurrent deliveries of the same key serialize on the primary key, so
/// exactly one of them observes a changed row. Pass `stale_before = None`
/// to treat `processing` rows as absorbing forever.
pub fn try_claim_processed_payment(
    conn: &mut Connection,
    key: &ProcessingKey,
    stale_before: Option<i64>,
) -> Result<ClaimOutcome> {
    let now = now();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let changed = tx.execute(
        "INSERT INTO processed_payments (processing_key, status, attempts, last_error, created_at, updated_at)
         VALUES (?1, 'processing', 1, NULL, ?2, ?2)
         ON CONFLICT(processing_key) DO UPDATE SET
             status = 'processing',
             attempts = processed_payments.attempts + 1,
             updated_at = excluded.updated_at
         WHERE processed_payments.status = 'failed'
            OR (processed_payments.status = 'processing' AND ?3 IS NOT NULL AND processed_payments.updated_at < ?3)",
        params![key.as_str(), now, stale_before],
    )?;

    if changed == 0 {
        tx.commit()?;
        return Ok(ClaimOutcome::AlreadyHandled);
    }

    let attempts: i64 = tx.query_row(
        "SELECT attempts FROM processed_payments WHERE processing_key = ?1",
        params![key.as_str()],
        |row| row.get(0),
    )?;
    tx.commit()?;

    if attempts == 1 {
        Ok(ClaimOutcome::Claimed)
    } else {
        Ok(ClaimOutcome::Reclaimed { attempts })
    }
}

/// Record the end state of a claimed fulfillment.
///
/// Only the owner of `attempt` may write, and only while the row is still
/// `processing`. Returns false when the claim was taken over by a later
/// delivery (or the row is gone); the row is left untouched in that case.
pub fn mark_processed_payment(
    conn: &Connection,
    key: &ProcessingKey,
    attempt: i64,
    status: ProcessingStatus,
    last_error: Option<&str>,
) -> Result<bool> {
    let status: &str = status.as_ref();
    let affected = conn.execute(
        "UPDATE processed_payments SET status = ?1, last_error = ?2, updated_at = ?3
         WHERE processing_key = ?4 AND status = 'processing' AND attempts = ?5",
        params![status, last_error, now(), key.as_str(), attempt],
    )?;
    Ok(affected > 0)
}

pub fn get_processed_payment(conn: &Connection, key: &ProcessingKey) -> Result<Option<ProcessedPayment>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM processed_payments WHERE processing_key = ?1",
            PROCESSED_PAYMENT_COLS
        ),
        &[&key.as_str()],
    )
}

pub fn list_processed_payments_by_status(
    conn: &Connection,
    status: ProcessingStatus,
) -> Result<Vec<ProcessedPayment>> {
    let status: &str = status.as_ref();
    query_all(
        conn,
        &format!(
            "SELECT {} FROM processed_payments WHERE status = ?1 ORDER BY updated_at",
            PROCESSED_PAYMENT_COLS
        ),
        &[&status],
    )
}

/// Purge completed claims beyond the retention period.
/// Failed and processing rows are kept so redeliveries still see them.
/// Returns the number of deleted records.
pub fn purge_old_processed_payments(conn: &Connection, retention_days: i64) -> Result<usize> {
    let cutoff = now().saturating_sub(retention_days.saturating_mul(86400));
    let deleted = conn.execute(
        "DELETE FROM processed_payments WHERE status = 'completed' AND updated_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}

// ============ Newsletter ============

/// Insert or refresh a subscriber. Re-subscribing updates consent and timestamp.
pub fn upsert_subscriber(conn: &Connection, email: &str, consent: bool) -> Result<()> {
    let now = now();
    conn.execute(
        "INSERT INTO newsletter_subscribers (email, consent, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT(email) DO UPDATE SET consent = excluded.consent, updated_at = excluded.updated_at",
        params![email, consent as i32, now],
    )?;
    Ok(())
}

pub fn get_subscriber(conn: &Connection, email: &str) -> Result<Option<Subscriber>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM newsletter_subscribers WHERE email = ?1",
            SUBSCRIBER_COLS
        ),
        &[&email],
    )
}
