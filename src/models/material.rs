use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result, msg};

/// A purchasable (or free) digital material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    /// Unit price in major currency units. None = not for sale.
    pub price: Option<f64>,
    /// Cover image reference (public URL or storage key)
    pub cover_ref: Option<String>,
    /// Reference to the deliverable file, resolved by the file store.
    /// Never exposed publicly.
    #[serde(skip_serializing)]
    pub file_ref: Option<String>,
    pub is_draft: bool,
    /// Unix timestamp before which the material is hidden (None = published now)
    pub publish_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Material {
    /// Visible in the public catalog at `now`.
    pub fn is_published(&self, now: i64) -> bool {
        !self.is_draft && self.publish_at.is_none_or(|at| at <= now)
    }
}

/// What the checkout and fulfillment paths need to know about a material.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialInfo {
    pub id: i64,
    pub title: String,
    pub price: Option<f64>,
    pub cover_ref: Option<String>,
    pub file_ref: Option<String>,
}

impl From<Material> for MaterialInfo {
    fn from(m: Material) -> Self {
        Self {
            id: m.id,
            title: m.title,
            price: m.price,
            cover_ref: m.cover_ref,
            file_ref: m.file_ref,
        }
    }
}

fn validate_price(price: Option<f64>) -> Result<()> {
    match price {
        Some(p) if !p.is_finite() || p < 0.0 => Err(AppError::BadRequest(msg::INVALID_PRICE.into())),
        _ => Ok(()),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateMaterial {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub cover_ref: Option<String>,
    #[serde(default)]
    pub file_ref: Option<String>,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub publish_at: Option<i64>,
}

impl CreateMaterial {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::BadRequest(msg::TITLE_EMPTY.into()));
        }
        validate_price(self.price)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMaterial {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub cover_ref: Option<String>,
    pub file_ref: Option<String>,
    pub is_draft: Option<bool>,
    pub publish_at: Option<i64>,
}

impl UpdateMaterial {
    pub fn validate(&self) -> Result<()> {
        if self.title.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.cover_ref.is_none()
            && self.file_ref.is_none()
            && self.is_draft.is_none()
            && self.publish_at.is_none()
        {
            return Err(AppError::BadRequest(msg::NO_UPDATE_FIELDS.into()));
        }
        if let Some(ref title) = self.title
            && title.trim().is_empty()
        {
            return Err(AppError::BadRequest(msg::TITLE_EMPTY.into()));
        }
        validate_price(self.price)
    }
}
