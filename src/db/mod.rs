mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::catalog::MaterialLookup;
use crate::email::MailDispatch;
use crate::payments::PaymentProcessor;
use crate::storage::FileStore;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by every handler.
///
/// External collaborators are injected as trait objects so tests can swap
/// in fakes.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Authoritative material data (prices, titles, file references)
    pub catalog: Arc<dyn MaterialLookup>,
    /// Payment processor API client
    pub payments: Arc<dyn PaymentProcessor>,
    /// Outbound purchase emails
    pub mailer: Arc<dyn MailDispatch>,
    /// Resolves material file references to attachment bytes
    pub files: FileStore,
    /// Shared secret for webhook signature verification
    pub webhook_secret: String,
    /// Fixed currency for payment intents (lowercase ISO code)
    pub currency: String,
    /// Bearer key for admin endpoints (None = admin API disabled)
    pub admin_api_key: Option<String>,
    /// Seconds before a `processing` claim is considered abandoned (0 = never)
    pub processing_timeout_secs: i64,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", "ON")
    });
    Pool::builder().max_size(10).build(manager)
}
