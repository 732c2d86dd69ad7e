use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderdesk_core::{DomainError, DomainResult, OrderId, ProductId};

use crate::status::{self, OrderStatus, StockEffect};

/// Requested line of a new order: product and quantity.
///
/// Quantity is signed so that zero/negative input can be represented and rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Request: place a new order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaceOrder {
    #[serde(default)]
    pub items: Vec<OrderLine>,
}

impl PlaceOrder {
    pub fn new(items: Vec<OrderLine>) -> Self {
        Self { items }
    }

    /// Validate the lines and merge duplicates, summing quantities per product.
    ///
    /// The result is keyed (and therefore iterated) in ascending product id,
    /// the order in which stock rows must be locked.
    pub fn merged_quantities(&self) -> DomainResult<BTreeMap<ProductId, u64>> {
        if self.items.is_empty() {
            return Err(DomainError::invalid_request("order must contain at least one item"));
        }

        let mut merged = BTreeMap::new();
        for line in &self.items {
            if line.quantity <= 0 {
                return Err(DomainError::invalid_request(format!(
                    "quantity must be at least 1 (product {})",
                    line.product_id
                )));
            }
            let total: &mut u64 = merged.entry(line.product_id).or_insert(0);
            *total = total
                .checked_add(line.quantity as u64)
                .ok_or_else(|| DomainError::invalid_request("quantity too large"))?;
        }
        Ok(merged)
    }

    /// Merged lines in the order each product first appears in the request.
    pub fn merged_lines(&self) -> DomainResult<Vec<(ProductId, u64)>> {
        let mut totals = self.merged_quantities()?;
        Ok(self
            .items
            .iter()
            .filter_map(|line| totals.remove_entry(&line.product_id))
            .collect())
    }
}

/// Request: move an order to another status.
///
/// `status` is optional because callers may omit it; a missing target is
/// rejected as `InvalidRequest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: Option<OrderStatus>,
}

impl StatusChange {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
        }
    }

    pub fn target(&self) -> DomainResult<OrderStatus> {
        self.status
            .ok_or_else(|| DomainError::invalid_request("target status is required"))
    }
}

/// Order line as persisted: the unit price is a snapshot taken at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u64,
    /// Price in smallest currency unit, captured when the order was placed.
    pub unit_price: u64,
}

impl OrderItem {
    pub fn line_total(&self) -> u64 {
        self.unit_price.saturating_mul(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    items: Vec<OrderItem>,
}

impl Order {
    /// Build a new order in `PENDING`.
    pub fn place(id: OrderId, items: Vec<OrderItem>, now: DateTime<Utc>) -> DomainResult<Self> {
        if items.is_empty() {
            return Err(DomainError::invalid_request("order must contain at least one item"));
        }
        if let Some(item) = items.iter().find(|item| item.quantity == 0) {
            return Err(DomainError::invalid_request(format!(
                "quantity must be at least 1 (product {})",
                item.product_id
            )));
        }

        Ok(Self {
            id,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            items,
        })
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total_amount(&self) -> u64 {
        self.items
            .iter()
            .fold(0u64, |sum, item| sum.saturating_add(item.line_total()))
    }

    /// Decide whether moving to `to` is allowed and which stock effect it needs.
    ///
    /// Pure: the order is not changed. Call [`Order::apply_status`] once the
    /// effect has been carried out.
    pub fn plan_transition(&self, to: OrderStatus) -> DomainResult<StockEffect> {
        status::side_effect(self.status, to)
    }

    /// Record the new status. The transition must have been planned first.
    pub fn apply_status(&mut self, to: OrderStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(DomainError::invalid_status_change(format!(
                "{} -> {} is not allowed",
                self.status, to
            )));
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(quantity: u64) -> OrderItem {
        OrderItem {
            product_id: ProductId::new(),
            quantity,
            unit_price: 1500,
        }
    }

    fn line(product_id: ProductId, quantity: i64) -> OrderLine {
        OrderLine {
            product_id,
            quantity,
        }
    }

    #[test]
    fn merged_lines_keep_first_occurrence_order() {
        let (a, b) = (ProductId::new(), ProductId::new());
        let request = PlaceOrder::new(vec![line(b, 1), line(a, 2), line(b, 3)]);
        assert_eq!(request.merged_lines().unwrap(), vec![(b, 4), (a, 2)]);
        assert!(PlaceOrder::default().merged_lines().is_err());
    }

    #[test]
    fn empty_request_is_invalid() {
        let err = PlaceOrder::default().merged_quantities().unwrap_err();
        assert!(matches!(err, DomainError::InvalidRequest(_)));
    }

    #[test]
    fn non_positive_quantity_is_invalid() {
        let p = ProductId::new();
        for qty in [0, -1] {
            let req = PlaceOrder::new(vec![line(p, 1), line(ProductId::new(), qty)]);
            assert!(matches!(req.merged_quantities(), Err(DomainError::InvalidRequest(_))));
        }
    }

    #[test]
    fn duplicate_lines_are_summed_per_product() {
        let a = ProductId::new();
        let b = ProductId::new();
        let req = PlaceOrder::new(vec![line(b, 1), line(a, 2), line(b, 1)]);

        let merged = req.merged_quantities().unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[&a], 2);
        assert_eq!(merged[&b], 2);

        let keys: Vec<_> = merged.keys().copied().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn new_order_starts_pending_with_equal_timestamps() {
        let now = Utc::now();
        let order = Order::place(OrderId::new(), vec![item(2)], now).unwrap();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.created_at(), now);
        assert_eq!(order.updated_at(), now);
        assert_eq!(order.total_amount(), 3000);
    }

    #[test]
    fn place_rejects_empty_and_zero_quantity_items() {
        let now = Utc::now();
        assert!(Order::place(OrderId::new(), vec![], now).is_err());
        assert!(Order::place(OrderId::new(), vec![item(1), item(0)], now).is_err());
    }

    #[test]
    fn plan_transition_does_not_mutate() {
        let order = Order::place(OrderId::new(), vec![item(1)], Utc::now()).unwrap();
        let before = order.clone();
        assert_eq!(order.plan_transition(OrderStatus::Received).unwrap(), StockEffect::None);
        assert!(order.plan_transition(OrderStatus::Completed).is_err());
        assert_eq!(order, before);
    }

    #[test]
    fn apply_status_refreshes_updated_at() {
        let created = Utc::now();
        let mut order = Order::place(OrderId::new(), vec![item(1)], created).unwrap();
        let later = created + Duration::seconds(5);

        order.apply_status(OrderStatus::Received, later).unwrap();
        assert_eq!(order.status(), OrderStatus::Received);
        assert_eq!(order.created_at(), created);
        assert_eq!(order.updated_at(), later);

        let err = order.apply_status(OrderStatus::Pending, later).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStatusChange(_)));
        assert_eq!(order.status(), OrderStatus::Received);
    }

    #[test]
    fn missing_target_status_is_invalid_request() {
        let err = StatusChange::default().target().unwrap_err();
        assert_eq!(err.code(), "INVALID_REQUEST");
        let parsed: StatusChange = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.status, None);
        assert_eq!(StatusChange::to(OrderStatus::Canceled).target().unwrap(), OrderStatus::Canceled);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: merging preserves the per-product total and yields one entry per product.
            #[test]
            fn merge_preserves_totals(
                picks in proptest::collection::vec((0usize..5, 1i64..50), 1..30)
            ) {
                let products: Vec<ProductId> = (0..5).map(|_| ProductId::new()).collect();
                let lines: Vec<OrderLine> = picks
                    .iter()
                    .map(|(idx, qty)| line(products[*idx], *qty))
                    .collect();

                let merged = PlaceOrder::new(lines.clone()).merged_quantities().unwrap();

                for (product_id, total) in &merged {
                    let expected: i64 = lines
                        .iter()
                        .filter(|l| l.product_id == *product_id)
                        .map(|l| l.quantity)
                        .sum();
                    prop_assert_eq!(*total, expected as u64);
                }
                let distinct: std::collections::BTreeSet<_> =
                    lines.iter().map(|l| l.product_id).collect();
                prop_assert_eq!(merged.len(), distinct.len());
            }

            /// Property: a status sequence only succeeds along table edges.
            #[test]
            fn status_walk_follows_table(targets in proptest::collection::vec(0usize..4, 0..10)) {
                let mut order = Order::place(OrderId::new(), vec![item(1)], Utc::now()).unwrap();
                for idx in targets {
                    let to = OrderStatus::ALL[idx];
                    let from = order.status();
                    let planned = order.plan_transition(to);
                    prop_assert_eq!(planned.is_ok(), status::can_transition(from, to));
                    if planned.is_ok() {
                        order.apply_status(to, Utc::now()).unwrap();
                    } else {
                        prop_assert_eq!(order.status(), from);
                    }
                }
            }
        }
    }
}
