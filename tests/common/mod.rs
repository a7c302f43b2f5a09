//! Test utilities and fixtures for storefront integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response};
use axum::Router;
use rusqlite::{Connection, params};
use tempfile::TempDir;

pub use storefront::catalog::{MaterialLookup, SqliteCatalog};
pub use storefront::db::{AppState, DbPool, create_pool, init_db, queries};
pub use storefront::email::{ContactMessage, MailDispatch, PurchaseEmail};
pub use storefront::error::{AppError, Result};
pub use storefront::handlers;
pub use storefront::models::*;
pub use storefront::payments::{
    CreatedPaymentIntent, PaymentIntentRequest, PaymentProcessor, StripePaymentIntent,
};
pub use storefront::storage::FileStore;

pub const WEBHOOK_SECRET: &str = "whsec_test123secret456";
pub const ADMIN_KEY: &str = "admin-test-key";

// ============ Mock collaborators ============

/// Records every dispatch attempt; reports success unless told otherwise.
#[derive(Default)]
pub struct MockMailer {
    pub sent: Mutex<Vec<PurchaseEmail>>,
    pub messages: Mutex<Vec<ContactMessage>>,
    pub fail: AtomicBool,
    /// Delay before answering, to widen race windows
    pub delay_ms: AtomicUsize,
}

impl MockMailer {
    pub fn calls(&self) -> Vec<PurchaseEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn messages(&self) -> Vec<ContactMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MailDispatch for MockMailer {
    async fn send_purchase(&self, email: &PurchaseEmail) -> bool {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        self.sent.lock().unwrap().push(email.clone());
        !self.fail.load(Ordering::SeqCst)
    }

    async fn send_message(&self, message: &ContactMessage) -> bool {
        self.messages.lock().unwrap().push(message.clone());
        !self.fail.load(Ordering::SeqCst)
    }
}

/// In-memory payment processor.
#[derive(Default)]
pub struct MockProcessor {
    pub intents: Mutex<HashMap<String, StripePaymentIntent>>,
    pub created: Mutex<Vec<PaymentIntentRequest>>,
    /// Ids passed to `retrieve_payment_intent`
    pub retrieved: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl MockProcessor {
    pub fn insert_intent(&self, intent: StripePaymentIntent) {
        self.intents.lock().unwrap().insert(intent.id.clone(), intent);
    }

    pub fn created_requests(&self) -> Vec<PaymentIntentRequest> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentProcessor for MockProcessor {
    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<CreatedPaymentIntent> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Processor("processor unavailable".into()));
        }
        let mut created = self.created.lock().unwrap();
        created.push(request.clone());
        let id = format!("pi_test_{}", created.len());
        Ok(CreatedPaymentIntent {
            client_secret: format!("{}_secret_abc", id),
            id,
        })
    }

    async fn retrieve_payment_intent(&self, id: &str) -> Result<Option<StripePaymentIntent>> {
        self.retrieved.lock().unwrap().push(id.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Processor("processor unavailable".into()));
        }
        Ok(self.intents.lock().unwrap().get(id).cloned())
    }
}

// ============ Test context ============

/// App state backed by a temporary SQLite file and file store.
/// Holds the temp dir so it outlives the test.
pub struct TestContext {
    pub state: AppState,
    pub mailer: Arc<MockMailer>,
    pub payments: Arc<MockProcessor>,
    pub dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_path = dir.path().join("storefront-test.db");
        let pool = create_pool(db_path.to_str().unwrap()).expect("Failed to create pool");
        {
            let conn = pool.get().unwrap();
            init_db(&conn).unwrap();
        }

        let files_dir = dir.path().join("files");
        std::fs::create_dir_all(&files_dir).unwrap();

        let mailer = Arc::new(MockMailer::default());
        let payments = Arc::new(MockProcessor::default());

        let state = AppState {
            db: pool.clone(),
            catalog: Arc::new(SqliteCatalog::new(pool)),
            payments: payments.clone(),
            mailer: mailer.clone(),
            files: FileStore::new(files_dir),
            webhook_secret: WEBHOOK_SECRET.to_string(),
            currency: "eur".to_string(),
            admin_api_key: Some(ADMIN_KEY.to_string()),
            processing_timeout_secs: 900,
        };

        Self {
            state,
            mailer,
            payments,
            dir,
        }
    }

    pub fn conn(&self) -> r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager> {
        self.state.db.get().unwrap()
    }

    /// Write a deliverable file under the store root.
    pub fn write_file(&self, file_ref: &str, content: &[u8]) {
        let path = self.state.files.root().join(file_ref);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    /// Insert a published material with a fixed id and a readable PDF.
    pub fn material_with_file(&self, id: i64, title: &str, price: f64) {
        let file_ref = format!("pdfs/material-{}.pdf", id);
        insert_material(&self.conn(), id, title, Some(price), Some(&file_ref));
        self.write_file(&file_ref, format!("%PDF-{}", id).as_bytes());
    }

    pub fn processed(&self, key: &ProcessingKey) -> Option<ProcessedPayment> {
        queries::get_processed_payment(&self.conn(), key).unwrap()
    }
}

/// Fresh in-memory database with the schema applied.
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to open in-memory db");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Insert a published material with an explicit id.
pub fn insert_material(
    conn: &Connection,
    id: i64,
    title: &str,
    price: Option<f64>,
    file_ref: Option<&str>,
) {
    let now = now();
    conn.execute(
        "INSERT INTO materials (id, title, price, file_ref, is_draft, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
        params![id, title, price, file_ref, now],
    )
    .expect("Failed to insert material");
}

pub fn metadata(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn payment_intent(id: &str, metadata: HashMap<String, String>) -> StripePaymentIntent {
    StripePaymentIntent {
        id: id.to_string(),
        amount: Some(3998),
        currency: Some("eur".to_string()),
        status: Some("succeeded".to_string()),
        receipt_email: None,
        metadata,
        client_secret: None,
    }
}

// ============ Webhook helpers ============

pub fn compute_stripe_signature(payload: &[u8], secret: &str, timestamp: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(signed_payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// `stripe-signature` header value for `payload`, signed now.
pub fn stripe_signature_header(payload: &[u8]) -> String {
    let timestamp = now().to_string();
    let signature = compute_stripe_signature(payload, WEBHOOK_SECRET, &timestamp);
    format!("t={},v1={}", timestamp, signature)
}

pub fn signed_webhook_request(payload: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook/stripe")
        .header("content-type", "application/json")
        .header("stripe-signature", stripe_signature_header(payload.as_bytes()))
        .body(Body::from(payload.to_string()))
        .unwrap()
}

pub fn payment_intent_succeeded_payload(pi_id: &str, email: &str, items: &str) -> String {
    serde_json::json!({
        "id": format!("evt_{}", pi_id),
        "type": "payment_intent.succeeded",
        "data": {
            "object": {
                "id": pi_id,
                "amount": 3998,
                "currency": "eur",
                "status": "succeeded",
                "metadata": { "email": email, "items": items }
            }
        }
    })
    .to_string()
}

// ============ Routers ============

/// Public endpoints without rate limiting.
pub fn public_app(state: AppState) -> Router {
    Router::new()
        .merge(handlers::public::checkout_routes())
        .merge(handlers::public::catalog_routes())
        .merge(handlers::public::contact_routes())
        .with_state(state)
}

pub fn webhook_app(state: AppState) -> Router {
    handlers::webhooks::router().with_state(state)
}

pub fn admin_app(state: AppState) -> Router {
    handlers::admin::router(state.clone()).with_state(state)
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
