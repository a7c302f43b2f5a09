//! Material lookup: the authoritative source of prices, titles and file
//! references for checkout and fulfillment.

use async_trait::async_trait;
use chrono::Utc;

use crate::db::{DbPool, queries};
use crate::error::Result;
use crate::models::{EnrichedItem, LineItem, MaterialInfo};

#[async_trait]
pub trait MaterialLookup: Send + Sync {
    /// Any existing material, published or not. Paid orders resolve through
    /// this so a later unpublish cannot block delivery.
    async fn find_material(&self, id: i64) -> Result<Option<MaterialInfo>>;

    /// Only materials currently on sale: drafts and materials scheduled for
    /// later publication return `None`.
    async fn find_purchasable(&self, id: i64) -> Result<Option<MaterialInfo>>;
}

/// Catalog backed by the `materials` table.
#[derive(Clone)]
pub struct SqliteCatalog {
    db: DbPool,
}

impl SqliteCatalog {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MaterialLookup for SqliteCatalog {
    async fn find_material(&self, id: i64) -> Result<Option<MaterialInfo>> {
        let conn = self.db.get()?;
        Ok(queries::get_material_by_id(&conn, id)?.map(MaterialInfo::from))
    }

    async fn find_purchasable(&self, id: i64) -> Result<Option<MaterialInfo>> {
        let conn = self.db.get()?;
        let material = queries::get_material_by_id(&conn, id)?;
        let now = Utc::now().timestamp();
        Ok(material
            .filter(|m| m.is_published(now))
            .map(MaterialInfo::from))
    }
}

/// Join line items against the catalog with current prices and titles.
/// Items whose material was deleted are skipped.
pub async fn enrich_line_items(
    catalog: &dyn MaterialLookup,
    items: &[LineItem],
) -> Result<Vec<EnrichedItem>> {
    let mut enriched = Vec::with_capacity(items.len());
    for item in items {
        match catalog.find_material(item.id).await? {
            Some(material) => enriched.push(EnrichedItem::from_material(*item, material)),
            None => tracing::warn!(material_id = item.id, "Material no longer exists, skipping item"),
        }
    }
    Ok(enriched)
}
