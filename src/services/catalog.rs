use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::EntityTrait;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{booking_item::AddOnSnapshot, service_offering},
    errors::ServiceError,
};

/// The view of a catalog entry the booking path needs. Frozen into
/// booking lines at creation time.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceSnapshot {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    pub base_price: Decimal,
    pub add_ons: Vec<AddOnSnapshot>,
}

/// Seam to the service catalog. The catalog itself (CRUD, media,
/// reviews) is owned elsewhere; bookings only resolve and snapshot.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn get_service(&self, id: Uuid) -> Result<Option<ServiceSnapshot>, ServiceError>;
}

/// Catalog lookup backed by the `service_offerings` table.
#[derive(Clone)]
pub struct DbCatalog {
    db: Arc<DbPool>,
}

impl DbCatalog {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CatalogLookup for DbCatalog {
    async fn get_service(&self, id: Uuid) -> Result<Option<ServiceSnapshot>, ServiceError> {
        let offering = service_offering::Entity::find_by_id(id)
            .one(&*self.db)
            .await?;

        Ok(offering.map(|model| {
            let add_ons: Vec<AddOnSnapshot> =
                serde_json::from_value(model.add_ons.clone()).unwrap_or_default();
            ServiceSnapshot {
                id: model.id,
                name: model.name,
                active: model.active,
                base_price: model.base_price,
                add_ons,
            }
        }))
    }
}

/// Normalizes a display name into a URL slug. Invoked explicitly by the
/// catalog write path; never a persistence hook.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_and_trims() {
        assert_eq!(slugify("Deep Home Cleaning"), "deep-home-cleaning");
        assert_eq!(slugify("  Sofa & Carpet!! "), "sofa-carpet");
        assert_eq!(slugify("2BHK Full Clean"), "2bhk-full-clean");
    }
}
