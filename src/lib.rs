//! Storefront - backend for a digital-materials shop
//!
//! Catalog, card checkout through Stripe payment intents, and webhook-driven
//! delivery of purchased PDFs by email with exactly-once fulfillment per
//! payment.

pub mod catalog;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod rate_limit;
pub mod storage;
pub mod util;
