use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::booking_item::AddOnSnapshot,
    errors::ServiceError,
    services::catalog::CatalogLookup,
};

/// One requested service line: quantity plus the add-ons picked by name
/// from the offering's available set.
#[derive(Clone, Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct LineItemRequest {
    pub service_id: Uuid,
    pub quantity: i32,
    #[serde(default)]
    pub add_ons: Vec<String>,
}

/// A line with all catalog values frozen at pricing time.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PricedLine {
    pub service_id: Uuid,
    pub service_name: String,
    pub quantity: i32,
    pub base_price: Decimal,
    pub add_ons: Vec<AddOnSnapshot>,
    pub subtotal: Decimal,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PricingBreakdown {
    pub lines: Vec<PricedLine>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Half-up rounding on the currency's minor unit. Discounts applied
/// downstream must use the same rule.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Computes booking pricing from catalog snapshots. Pure apart from the
/// injected catalog lookup; performs no writes.
#[derive(Clone)]
pub struct PricingEngine {
    catalog: Arc<dyn CatalogLookup>,
    tax_rate: Decimal,
}

impl PricingEngine {
    pub fn new(catalog: Arc<dyn CatalogLookup>, tax_rate: Decimal) -> Self {
        Self { catalog, tax_rate }
    }

    /// Per line: (base price + selected add-ons) × quantity, snapshot
    /// from the catalog. `tax = round2(subtotal × rate)`,
    /// `total = subtotal + tax`.
    #[instrument(skip(self, items), fields(line_count = items.len()))]
    pub async fn compute_pricing(
        &self,
        items: &[LineItemRequest],
    ) -> Result<PricingBreakdown, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::ValidationError(
                "booking requires at least one service".into(),
            ));
        }

        let mut lines = Vec::with_capacity(items.len());
        let mut subtotal = Decimal::ZERO;

        for item in items {
            if item.quantity < 1 {
                return Err(ServiceError::InvalidQuantity(format!(
                    "quantity must be at least 1, got {}",
                    item.quantity
                )));
            }

            let snapshot = self
                .catalog
                .get_service(item.service_id)
                .await?
                .ok_or_else(|| {
                    ServiceError::InvalidServiceReference(format!(
                        "service {} does not exist",
                        item.service_id
                    ))
                })?;

            if !snapshot.active {
                return Err(ServiceError::InvalidServiceReference(format!(
                    "service {} is not active",
                    item.service_id
                )));
            }

            let mut selected = Vec::with_capacity(item.add_ons.len());
            for name in &item.add_ons {
                let add_on = snapshot
                    .add_ons
                    .iter()
                    .find(|a| a.name == *name)
                    .ok_or_else(|| {
                        ServiceError::ValidationError(format!(
                            "add-on '{}' is not offered for service {}",
                            name, snapshot.name
                        ))
                    })?;
                selected.push(add_on.clone());
            }

            let add_on_total: Decimal = selected.iter().map(|a| a.price).sum();
            let line_subtotal =
                (snapshot.base_price + add_on_total) * Decimal::from(item.quantity);

            subtotal += line_subtotal;
            lines.push(PricedLine {
                service_id: snapshot.id,
                service_name: snapshot.name,
                quantity: item.quantity,
                base_price: snapshot.base_price,
                add_ons: selected,
                subtotal: line_subtotal,
            });
        }

        let tax = round2(subtotal * self.tax_rate);
        let total = subtotal + tax;

        Ok(PricingBreakdown {
            lines,
            subtotal,
            tax,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::{MockCatalogLookup, ServiceSnapshot};
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn snapshot(id: Uuid, active: bool, base_price: Decimal) -> ServiceSnapshot {
        ServiceSnapshot {
            id,
            name: "Deep Home Cleaning".into(),
            active,
            base_price,
            add_ons: vec![
                AddOnSnapshot {
                    name: "Fridge Interior".into(),
                    price: dec!(199),
                },
                AddOnSnapshot {
                    name: "Balcony Wash".into(),
                    price: dec!(149),
                },
            ],
        }
    }

    fn engine_with(snapshots: Vec<ServiceSnapshot>) -> PricingEngine {
        let mut catalog = MockCatalogLookup::new();
        catalog.expect_get_service().returning(move |id| {
            Ok(snapshots.iter().find(|s| s.id == id).cloned())
        });
        PricingEngine::new(Arc::new(catalog), dec!(0.18))
    }

    #[tokio::test]
    async fn single_service_at_999_totals_1178_82() {
        let id = Uuid::new_v4();
        let engine = engine_with(vec![snapshot(id, true, dec!(999))]);

        let pricing = engine
            .compute_pricing(&[LineItemRequest {
                service_id: id,
                quantity: 1,
                add_ons: vec![],
            }])
            .await
            .unwrap();

        assert_eq!(pricing.subtotal, dec!(999));
        assert_eq!(pricing.tax, dec!(179.82));
        assert_eq!(pricing.total, dec!(1178.82));
    }

    #[tokio::test]
    async fn round_subtotal_1000_gives_exact_tax() {
        let id = Uuid::new_v4();
        let engine = engine_with(vec![snapshot(id, true, dec!(1000))]);

        let pricing = engine
            .compute_pricing(&[LineItemRequest {
                service_id: id,
                quantity: 1,
                add_ons: vec![],
            }])
            .await
            .unwrap();

        assert_eq!(pricing.tax, dec!(180.00));
        assert_eq!(pricing.total, dec!(1180.00));
    }

    #[tokio::test]
    async fn add_ons_and_quantity_multiply() {
        let id = Uuid::new_v4();
        let engine = engine_with(vec![snapshot(id, true, dec!(999))]);

        let pricing = engine
            .compute_pricing(&[LineItemRequest {
                service_id: id,
                quantity: 2,
                add_ons: vec!["Fridge Interior".into()],
            }])
            .await
            .unwrap();

        // (999 + 199) * 2
        assert_eq!(pricing.subtotal, dec!(2396));
        assert_eq!(pricing.tax, round2(dec!(2396) * dec!(0.18)));
        assert_eq!(pricing.total, pricing.subtotal + pricing.tax);
    }

    #[tokio::test]
    async fn unknown_service_is_rejected() {
        let engine = engine_with(vec![]);
        let err = engine
            .compute_pricing(&[LineItemRequest {
                service_id: Uuid::new_v4(),
                quantity: 1,
                add_ons: vec![],
            }])
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InvalidServiceReference(_));
    }

    #[tokio::test]
    async fn inactive_service_is_rejected() {
        let id = Uuid::new_v4();
        let engine = engine_with(vec![snapshot(id, false, dec!(999))]);
        let err = engine
            .compute_pricing(&[LineItemRequest {
                service_id: id,
                quantity: 1,
                add_ons: vec![],
            }])
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InvalidServiceReference(_));
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected() {
        let id = Uuid::new_v4();
        let engine = engine_with(vec![snapshot(id, true, dec!(999))]);
        let err = engine
            .compute_pricing(&[LineItemRequest {
                service_id: id,
                quantity: 0,
                add_ons: vec![],
            }])
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InvalidQuantity(_));
    }

    #[tokio::test]
    async fn unknown_add_on_is_rejected() {
        let id = Uuid::new_v4();
        let engine = engine_with(vec![snapshot(id, true, dec!(999))]);
        let err = engine
            .compute_pricing(&[LineItemRequest {
                service_id: id,
                quantity: 1,
                add_ons: vec!["Gold Plating".into()],
            }])
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[tokio::test]
    async fn empty_line_items_are_rejected() {
        let engine = engine_with(vec![]);
        let err = engine.compute_pricing(&[]).await.unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[test]
    fn round2_is_half_up() {
        assert_eq!(round2(dec!(1.005)), dec!(1.01));
        assert_eq!(round2(dec!(1.004)), dec!(1.00));
        assert_eq!(round2(dec!(179.8200)), dec!(179.82));
    }

    proptest::proptest! {
        #[test]
        fn total_is_always_subtotal_plus_tax(cents in 1i64..10_000_000) {
            let subtotal = Decimal::new(cents, 2);
            let tax = round2(subtotal * dec!(0.18));
            let total = subtotal + tax;
            proptest::prop_assert_eq!(total - subtotal, tax);
            proptest::prop_assert!(tax >= Decimal::ZERO);
            // Tax never has more than two decimal places.
            proptest::prop_assert_eq!(tax, round2(tax));
        }
    }
}
