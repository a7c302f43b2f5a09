use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::catalog::SqliteCatalog;
use storefront::config::Config;
use storefront::db::{AppState, create_pool, init_db, queries};
use storefront::email::ResendMailer;
use storefront::handlers;
use storefront::models::{CreateMaterial, ProcessingStatus};
use storefront::payments::StripeClient;
use storefront::storage::FileStore;

#[derive(Parser, Debug)]
#[command(name = "storefront")]
#[command(about = "Digital-materials storefront backend")]
struct Cli {
    /// Seed the catalog with sample materials (dev mode only)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds a few sample materials. Only runs when the catalog is empty.
fn seed_dev_data(state: &AppState) -> storefront::error::Result<()> {
    let conn = state.db.get()?;

    if queries::count_materials(&conn)? > 0 {
        tracing::info!("Catalog already has materials, skipping seed");
        return Ok(());
    }

    let samples = [
        ("Spanish Verbs A1", Some(19.99), Some("pdfs/spanish-verbs-a1.pdf")),
        ("French Pronunciation Guide", Some(9.5), Some("pdfs/french-pronunciation.pdf")),
        ("Travel Phrasebook", None, Some("pdfs/travel-phrasebook.pdf")),
    ];

    for (title, price, file_ref) in samples {
        let material = queries::create_material(
            &conn,
            &CreateMaterial {
                title: title.to_string(),
                description: None,
                price,
                cover_ref: None,
                file_ref: file_ref.map(String::from),
                is_draft: false,
                publish_at: None,
            },
        )?;
        tracing::info!("Seeded material {} (id: {}, price: {:?})", material.title, material.id, material.price);
    }

    tracing::info!(
        "Place the sample PDFs under {} to test deliveries",
        state.files.root().display()
    );
    Ok(())
}

/// Logs fulfillments left unfinished by a previous run. They are retried
/// when the processor redelivers the event.
fn report_pending_fulfillments(state: &AppState) -> storefront::error::Result<()> {
    let conn = state.db.get()?;
    for status in [ProcessingStatus::Failed, ProcessingStatus::Processing] {
        let rows = queries::list_processed_payments_by_status(&conn, status)?;
        if rows.is_empty() {
            continue;
        }
        tracing::warn!(
            status = ?status,
            count = rows.len(),
            "Fulfillments awaiting redelivery"
        );
        for row in rows {
            tracing::debug!(
                processing_key = %row.processing_key,
                attempts = row.attempts,
                last_error = row.last_error.as_deref().unwrap_or(""),
                "Pending fulfillment"
            );
        }
    }
    Ok(())
}

/// Spawns a background task that periodically purges old completed
/// fulfillment claims. Runs every 5 minutes when a retention is configured.
fn spawn_cleanup_task(state: AppState, retention_days: i64) {
    if retention_days <= 0 {
        return;
    }

    tokio::spawn(async move {
        let interval = Duration::from_secs(5 * 60);

        loop {
            tokio::time::sleep(interval).await;

            match state.db.get() {
                Ok(conn) => match queries::purge_old_processed_payments(&conn, retention_days) {
                    Ok(count) if count > 0 => {
                        tracing::debug!("Purged {} completed processed payments", count);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Failed to purge processed payments: {}", e),
                },
                Err(e) => tracing::warn!("Failed to get db connection for cleanup: {}", e),
            }
        }
    });

    tracing::info!(
        "Background cleanup task started (runs every 5 minutes, retention {} days)",
        retention_days
    );
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if config.stripe_webhook_secret.is_empty() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET is not set: every webhook delivery will be rejected");
    }
    if config.resend_api_key.is_none() {
        tracing::warn!("RESEND_API_KEY is not set: purchase emails cannot be sent");
    }
    if config.admin_api_key.is_none() {
        tracing::info!("ADMIN_API_KEY is not set: admin endpoints are disabled");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool.clone(),
        catalog: Arc::new(SqliteCatalog::new(db_pool)),
        payments: Arc::new(
            StripeClient::new(config.stripe_secret_key.clone(), &config.stripe_api_base)
                .expect("Failed to create Stripe client"),
        ),
        mailer: Arc::new(
            ResendMailer::new(
                config.resend_api_key.clone(),
                config.email_from.clone(),
                config.contact_email.clone(),
                config.store_name.clone(),
            )
            .expect("Failed to create mailer"),
        ),
        files: FileStore::new(config.files_dir.clone()),
        webhook_secret: config.stripe_webhook_secret.clone(),
        currency: config.currency.clone(),
        admin_api_key: config.admin_api_key.clone(),
        processing_timeout_secs: config.processing_timeout_secs,
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set STOREFRONT_ENV=dev)");
        } else if let Err(e) = seed_dev_data(&state) {
            tracing::error!("Failed to seed dev data: {}", e);
        }
    }

    if let Err(e) = report_pending_fulfillments(&state) {
        tracing::warn!("Failed to list pending fulfillments: {}", e);
    }
    spawn_cleanup_task(state.clone(), config.processed_payment_retention_days);

    let app = Router::new()
        .merge(handlers::public::router(config.rate_limit))
        .merge(handlers::webhooks::router())
        .merge(handlers::admin::router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Storefront server listening on {}", addr);

    // connect_info supplies the peer IP for rate limiting
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
