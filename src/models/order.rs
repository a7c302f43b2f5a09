use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::MaterialInfo;

/// Processor metadata key holding the serialized item list.
pub const METADATA_ITEMS_KEY: &str = "items";
/// Processor metadata key holding the purchaser email.
pub const METADATA_EMAIL_KEY: &str = "email";

/// One cart line as sent by the client. Untrusted.
#[derive(Debug, Clone, Deserialize)]
pub struct CartItem {
    pub id: i64,
    /// Missing or non-positive quantities are rejected by the intent builder
    #[serde(default)]
    pub quantity: Option<i64>,
}

/// Minimal item record stored in processor metadata (ids and quantities only,
/// metadata values have a strict size ceiling).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    pub quantity: i64,
}

/// Item joined against the catalog. `amount` is the unit price in cents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedItem {
    pub id: i64,
    pub title: String,
    pub quantity: i64,
    pub amount: i64,
    pub cover: Option<String>,
    #[serde(skip)]
    pub file_ref: Option<String>,
}

impl EnrichedItem {
    pub fn from_material(item: LineItem, material: MaterialInfo) -> Self {
        Self {
            id: item.id,
            title: material.title,
            quantity: item.quantity,
            amount: material.price.map(to_cents).unwrap_or(0),
            cover: material.cover_ref,
            file_ref: material.file_ref,
        }
    }
}

/// Round a major-unit amount to integer cents.
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Metadata attached to a payment intent at creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderMetadata {
    pub items: Vec<LineItem>,
    pub email: String,
}

impl OrderMetadata {
    /// Key/value pairs for the processor's metadata map.
    pub fn to_pairs(&self) -> serde_json::Result<Vec<(&'static str, String)>> {
        Ok(vec![
            (METADATA_ITEMS_KEY, serde_json::to_string(&self.items)?),
            (METADATA_EMAIL_KEY, self.email.clone()),
        ])
    }
}

/// Why a metadata map could not be turned into an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    MissingEmail,
    MissingItems,
    InvalidItems(String),
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::MissingEmail => write!(f, "purchaser email missing from metadata"),
            MetadataError::MissingItems => write!(f, "item list missing from metadata"),
            MetadataError::InvalidItems(e) => write!(f, "item list is not valid: {}", e),
        }
    }
}

/// Parse the serialized item list written by the intent builder.
pub fn parse_line_items(raw: &str) -> Result<Vec<LineItem>, MetadataError> {
    serde_json::from_str(raw).map_err(|e| MetadataError::InvalidItems(e.to_string()))
}

/// Extract a non-empty email and non-empty item list from processor metadata.
pub fn order_from_metadata(metadata: &HashMap<String, String>) -> Result<OrderMetadata, MetadataError> {
    let email = metadata
        .get(METADATA_EMAIL_KEY)
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .ok_or(MetadataError::MissingEmail)?;

    let raw_items = metadata
        .get(METADATA_ITEMS_KEY)
        .filter(|raw| !raw.trim().is_empty())
        .ok_or(MetadataError::MissingItems)?;

    let items = parse_line_items(raw_items)?;
    if items.is_empty() {
        return Err(MetadataError::MissingItems);
    }

    Ok(OrderMetadata {
        items,
        email: email.to_string(),
    })
}

/// Receipt returned by the session query endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub id: String,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub items: Vec<EnrichedItem>,
    pub customer_email: Option<String>,
}
