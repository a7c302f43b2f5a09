//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors
/// instead of panicking on unexpected values.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const MATERIAL_COLS: &str =
    "id, title, description, price, cover_ref, file_ref, is_draft, publish_at, created_at, updated_at";

pub const PROCESSED_PAYMENT_COLS: &str =
    "processing_key, status, attempts, last_error, created_at, updated_at";

pub const SUBSCRIBER_COLS: &str = "email, consent, created_at, updated_at";

// ============ FromRow Implementations ============

impl FromRow for Material {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Material {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            price: row.get(3)?,
            cover_ref: row.get(4)?,
            file_ref: row.get(5)?,
            is_draft: row.get::<_, i32>(6)? != 0,
            publish_at: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl FromRow for ProcessedPayment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ProcessedPayment {
            processing_key: row.get(0)?,
            status: parse_enum(row, 1, "status")?,
            attempts: row.get(2)?,
            last_error: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl FromRow for Subscriber {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Subscriber {
            email: row.get(0)?,
            consent: row.get::<_, i32>(1)? != 0,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }
}
