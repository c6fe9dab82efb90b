use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-day sequence row backing booking-number assignment. The unique
/// index on `bookings.booking_number` remains the authority; this row
/// just keeps the common path collision-free.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "booking_counters")]
pub struct Model {
    /// Calendar day as YYYYMMDD.
    #[sea_orm(primary_key, auto_increment = false)]
    pub day: String,
    pub seq: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
