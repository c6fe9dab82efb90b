use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiscountType {
    #[sea_orm(string_value = "percentage")]
    Percentage,
    #[sea_orm(string_value = "fixed")]
    Fixed,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    /// Ceiling applied after the percentage/fixed computation.
    pub max_discount: Option<Decimal>,
    pub min_order_value: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub usage_limit: Option<i32>,
    pub usage_count: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Computed on read, never stored: active, inside the validity
    /// window, and under the usage cap.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.active
            && now >= self.valid_from
            && now <= self.valid_until
            && self
                .usage_limit
                .map_or(true, |limit| self.usage_count < limit)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn coupon(active: bool, usage_limit: Option<i32>, usage_count: i32) -> Model {
        let now = Utc::now();
        Model {
            id: Uuid::new_v4(),
            code: "WELCOME10".into(),
            discount_type: DiscountType::Percentage,
            discount_value: dec!(10),
            max_discount: Some(dec!(200)),
            min_order_value: dec!(500),
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(1),
            usage_limit,
            usage_count,
            active,
            created_at: now,
            updated_at: None,
        }
    }

    #[test]
    fn valid_inside_window_and_under_limit() {
        assert!(coupon(true, Some(100), 99).is_valid(Utc::now()));
    }

    #[test]
    fn invalid_when_inactive_or_exhausted() {
        assert!(!coupon(false, None, 0).is_valid(Utc::now()));
        assert!(!coupon(true, Some(100), 100).is_valid(Utc::now()));
    }

    #[test]
    fn invalid_outside_window() {
        let c = coupon(true, None, 0);
        assert!(!c.is_valid(c.valid_until + Duration::seconds(1)));
        assert!(!c.is_valid(c.valid_from - Duration::seconds(1)));
    }
}
