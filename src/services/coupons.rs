use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::{
    entities::coupon::{self, DiscountType},
    errors::ServiceError,
    services::pricing::round2,
};

/// Result of applying a coupon to an order total. Pure: usage counting
/// happens separately in [`redeem`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CouponOutcome {
    pub valid: bool,
    pub discount: Decimal,
}

/// Computes the discount a coupon yields for `total` at `now` without
/// touching any state.
pub fn apply_coupon(c: &coupon::Model, total: Decimal, now: DateTime<Utc>) -> CouponOutcome {
    if !c.is_valid(now) || total < c.min_order_value {
        return CouponOutcome {
            valid: false,
            discount: Decimal::ZERO,
        };
    }

    let raw = match c.discount_type {
        DiscountType::Percentage => total * c.discount_value / Decimal::from(100),
        DiscountType::Fixed => c.discount_value,
    };

    let capped = match c.max_discount {
        Some(ceiling) => raw.min(ceiling),
        None => raw,
    };

    // A discount never exceeds the total it applies to.
    let discount = round2(capped.min(total).max(Decimal::ZERO));

    CouponOutcome {
        valid: true,
        discount,
    }
}

const REDEEM_ATTEMPTS: usize = 3;

/// Validates and redeems a coupon in one atomic step: the usage count
/// is incremented with a guarded UPDATE so two concurrent redemptions
/// cannot both consume the last use. Returns the discount to apply.
pub async fn redeem<C: ConnectionTrait>(
    conn: &C,
    code: &str,
    order_total: Decimal,
    now: DateTime<Utc>,
) -> Result<Decimal, ServiceError> {
    for _ in 0..REDEEM_ATTEMPTS {
        let c = coupon::Entity::find()
            .filter(coupon::Column::Code.eq(code))
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("coupon '{}' does not exist", code))
            })?;

        let outcome = apply_coupon(&c, order_total, now);
        if !outcome.valid {
            return Err(ServiceError::ValidationError(format!(
                "coupon '{}' is not applicable to this order",
                code
            )));
        }

        // Reserve the use: only succeeds if the row is unchanged since
        // the validity check read it.
        let result = coupon::Entity::update_many()
            .col_expr(
                coupon::Column::UsageCount,
                Expr::col(coupon::Column::UsageCount).add(1),
            )
            .col_expr(coupon::Column::UpdatedAt, Expr::value(now))
            .filter(coupon::Column::Id.eq(c.id))
            .filter(coupon::Column::UsageCount.eq(c.usage_count))
            .exec(conn)
            .await?;

        if result.rows_affected == 1 {
            return Ok(outcome.discount);
        }

        debug!(code, "coupon usage count moved concurrently, retrying");
    }

    Err(ServiceError::StateConflict(format!(
        "coupon '{}' could not be reserved",
        code
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn coupon(discount_type: DiscountType, value: Decimal, ceiling: Option<Decimal>) -> coupon::Model {
        let now = Utc::now();
        coupon::Model {
            id: Uuid::new_v4(),
            code: "FESTIVE20".into(),
            discount_type,
            discount_value: value,
            max_discount: ceiling,
            min_order_value: dec!(500),
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(7),
            usage_limit: Some(1000),
            usage_count: 10,
            active: true,
            created_at: now,
            updated_at: None,
        }
    }

    #[test]
    fn percentage_discount_with_ceiling() {
        let c = coupon(DiscountType::Percentage, dec!(20), Some(dec!(150)));
        let outcome = apply_coupon(&c, dec!(1000), Utc::now());
        assert!(outcome.valid);
        // 20% of 1000 = 200, capped at 150
        assert_eq!(outcome.discount, dec!(150));
    }

    #[test]
    fn percentage_discount_under_ceiling() {
        let c = coupon(DiscountType::Percentage, dec!(10), Some(dec!(500)));
        let outcome = apply_coupon(&c, dec!(1178.82), Utc::now());
        assert!(outcome.valid);
        assert_eq!(outcome.discount, round2(dec!(117.882)));
    }

    #[test]
    fn fixed_discount_never_exceeds_total() {
        let c = coupon(DiscountType::Fixed, dec!(800), None);
        let outcome = apply_coupon(&c, dec!(600), Utc::now());
        assert!(outcome.valid);
        assert_eq!(outcome.discount, dec!(600));
    }

    #[test]
    fn below_minimum_order_is_invalid() {
        let c = coupon(DiscountType::Fixed, dec!(100), None);
        let outcome = apply_coupon(&c, dec!(499), Utc::now());
        assert!(!outcome.valid);
        assert_eq!(outcome.discount, Decimal::ZERO);
    }

    #[test]
    fn expired_coupon_yields_no_discount() {
        let mut c = coupon(DiscountType::Percentage, dec!(20), None);
        c.valid_until = Utc::now() - Duration::hours(1);
        let outcome = apply_coupon(&c, dec!(1000), Utc::now());
        assert!(!outcome.valid);
    }

    #[test]
    fn exhausted_coupon_yields_no_discount() {
        let mut c = coupon(DiscountType::Percentage, dec!(20), None);
        c.usage_limit = Some(10);
        c.usage_count = 10;
        let outcome = apply_coupon(&c, dec!(1000), Utc::now());
        assert!(!outcome.valid);
    }
}
