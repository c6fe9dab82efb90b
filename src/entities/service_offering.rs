use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Catalog entry for a bookable cleaning service. Consumed by the
/// pricing path through [`crate::services::catalog::CatalogLookup`];
/// catalog CRUD itself lives outside this service.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "service_offerings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
    pub category: Option<String>,
    pub active: bool,
    pub base_price: Decimal,
    /// JSON array of [`crate::entities::booking_item::AddOnSnapshot`].
    pub add_ons: Json,
    pub duration_minutes: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
