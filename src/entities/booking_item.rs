use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Add-on selected for a line item, frozen at booking time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AddOnSnapshot {
    pub name: String,
    pub price: Decimal,
}

/// One service entry within a booking. Name, base price, and add-ons are
/// snapshots: later catalog edits never alter an existing booking.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "booking_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub booking_id: Uuid,
    pub service_id: Uuid,
    pub service_name: String,
    pub quantity: i32,
    pub base_price: Decimal,
    /// JSON array of [`AddOnSnapshot`].
    pub add_ons: Json,
    pub subtotal: Decimal,
    /// Preserves the order the customer picked the services in.
    pub position: i32,
}

impl Model {
    pub fn add_on_snapshots(&self) -> Vec<AddOnSnapshot> {
        serde_json::from_value(self.add_ons.clone()).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::booking::Entity",
        from = "Column::BookingId",
        to = "super::booking::Column::Id"
    )]
    Booking,
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Booking.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
