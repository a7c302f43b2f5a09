use std::env;
use std::path::PathBuf;

/// Stripe retries webhook deliveries for up to three days. A completed claim
/// purged before that could let a late retry fulfill the order again.
pub const MIN_PROCESSED_PAYMENT_RETENTION_DAYS: i64 = 3;

/// Per-IP rate limits (requests per minute) for the public API.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Endpoints that call the payment processor or send mail
    pub strict_rpm: u32,
    /// Catalog and newsletter endpoints
    pub standard_rpm: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            strict_rpm: 10,
            standard_rpm: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub dev_mode: bool,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_api_base: String,
    pub currency: String,
    pub resend_api_key: Option<String>,
    pub email_from: String,
    /// Inbox for contact messages and suggestions
    pub contact_email: String,
    pub store_name: String,
    pub files_dir: PathBuf,
    pub admin_api_key: Option<String>,
    /// Seconds after which a row stuck in `processing` may be claimed again (0 = never)
    pub processing_timeout_secs: i64,
    /// Days to keep `completed` processed-payment rows (0 = forever, otherwise
    /// at least [`MIN_PROCESSED_PAYMENT_RETENTION_DAYS`])
    pub processed_payment_retention_days: i64,
    pub rate_limit: RateLimitConfig,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Clamp a configured retention to the webhook retry window. Zero and
/// negative values keep rows forever.
fn retention_days(configured: i64) -> i64 {
    if configured <= 0 {
        0
    } else {
        configured.max(MIN_PROCESSED_PAYMENT_RETENTION_DAYS)
    }
}

/// Empty strings count as unset.
fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("STOREFRONT_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let defaults = RateLimitConfig::default();
        let email_from = env_or("EMAIL_FROM", "noreply@storefront.local");
        let configured_retention = env_parse("PROCESSED_PAYMENT_RETENTION_DAYS", 0);
        let processed_payment_retention_days = retention_days(configured_retention);
        if processed_payment_retention_days != configured_retention.max(0) {
            tracing::warn!(
                configured = configured_retention,
                using = processed_payment_retention_days,
                "PROCESSED_PAYMENT_RETENTION_DAYS is shorter than the webhook retry window"
            );
        }

        Self {
            host: env_or("HOST", "127.0.0.1"),
            port: env_parse("PORT", 3000),
            database_path: env_or("DATABASE_PATH", "storefront.db"),
            dev_mode,
            stripe_secret_key: env_or("STRIPE_SECRET_KEY", ""),
            stripe_webhook_secret: env_or("STRIPE_WEBHOOK_SECRET", ""),
            stripe_api_base: env_or("STRIPE_API_BASE", "https://api.stripe.com"),
            currency: env_or("CURRENCY", "eur").to_lowercase(),
            resend_api_key: env_opt("RESEND_API_KEY"),
            contact_email: env_opt("CONTACT_EMAIL").unwrap_or_else(|| email_from.clone()),
            email_from,
            store_name: env_or("STORE_NAME", "Storefront"),
            files_dir: PathBuf::from(env_or("FILES_DIR", "files")),
            admin_api_key: env_opt("ADMIN_API_KEY"),
            processing_timeout_secs: env_parse("PROCESSING_TIMEOUT_SECS", 900),
            processed_payment_retention_days,
            rate_limit: RateLimitConfig {
                strict_rpm: env_parse("RATE_LIMIT_STRICT_RPM", defaults.strict_rpm),
                standard_rpm: env_parse("RATE_LIMIT_STANDARD_RPM", defaults.standard_rpm),
            },
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
