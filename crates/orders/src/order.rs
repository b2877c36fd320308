use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercato_core::{DomainError, DomainResult, OrderId, ProductId, UserId};

/// Per-seller fulfillment state. Transitions are forward-only; a seller can
/// skip stages (Pending straight to Dispatched) but never go back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FulfillmentStatus {
    Pending,
    Confirmed,
    Dispatched,
    Delivered,
}

impl FulfillmentStatus {
    fn rank(self) -> u8 {
        match self {
            FulfillmentStatus::Pending => 0,
            FulfillmentStatus::Confirmed => 1,
            FulfillmentStatus::Dispatched => 2,
            FulfillmentStatus::Delivered => 3,
        }
    }

    /// Validate a transition from `self` to `next`. Re-asserting the current
    /// status is an accepted no-op (retried requests); moving backwards is an
    /// invariant violation.
    pub fn advance_to(self, next: FulfillmentStatus) -> DomainResult<FulfillmentStatus> {
        if next.rank() < self.rank() {
            return Err(DomainError::invariant(format!(
                "fulfillment status cannot move back from {self} to {next}"
            )));
        }
        Ok(next)
    }
}

impl fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FulfillmentStatus::Pending => "pending",
            FulfillmentStatus::Confirmed => "confirmed",
            FulfillmentStatus::Dispatched => "dispatched",
            FulfillmentStatus::Delivered => "delivered",
        };
        f.write_str(s)
    }
}

/// Proof of a captured payment, issued by the payment gateway. Orders cannot
/// be constructed without one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentRef(String);

impl PaymentRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One purchased line, frozen at checkout time. Name and unit price are
/// snapshots; later catalog edits do not reach into placed orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub seller_id: UserId,
    pub name: String,
    /// Unit price in the smallest currency unit, as paid.
    pub unit_price: u64,
    pub quantity: u32,
}

impl OrderItem {
    pub fn subtotal(&self) -> u64 {
        u64::from(self.quantity) * self.unit_price
    }
}

/// Whether every seller on the order has delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderProgress {
    Active,
    Completed,
}

/// A placed, paid order spanning one or more sellers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer_id: UserId,
    pub placed_at: DateTime<Utc>,
    /// Sum of item subtotals, fixed at placement.
    pub total_price: u64,
    pub payment_ref: PaymentRef,
    pub items: Vec<OrderItem>,
    /// One status per distinct seller appearing in `items`.
    pub seller_statuses: BTreeMap<UserId, FulfillmentStatus>,
}

impl Order {
    /// Place an order over already-reserved items.
    pub fn new(
        buyer_id: UserId,
        payment_ref: PaymentRef,
        items: Vec<OrderItem>,
        placed_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if items.is_empty() {
            return Err(DomainError::validation("an order must contain at least one item"));
        }
        if let Some(bad) = items.iter().find(|i| i.quantity == 0) {
            return Err(DomainError::validation(format!(
                "zero-quantity item for product {}",
                bad.product_id
            )));
        }

        let total_price = items.iter().map(OrderItem::subtotal).sum();
        let seller_statuses = items
            .iter()
            .map(|i| (i.seller_id, FulfillmentStatus::Pending))
            .collect();

        Ok(Self {
            id: OrderId::new(),
            buyer_id,
            placed_at,
            total_price,
            payment_ref,
            items,
            seller_statuses,
        })
    }

    /// Items belonging to one seller's slice of the order.
    pub fn items_of_seller(&self, seller_id: UserId) -> impl Iterator<Item = &OrderItem> {
        self.items.iter().filter(move |i| i.seller_id == seller_id)
    }

    /// That seller's share of the order total.
    pub fn seller_subtotal(&self, seller_id: UserId) -> u64 {
        self.items_of_seller(seller_id).map(OrderItem::subtotal).sum()
    }

    pub fn progress(&self) -> OrderProgress {
        if self
            .seller_statuses
            .values()
            .all(|s| *s == FulfillmentStatus::Delivered)
        {
            OrderProgress::Completed
        } else {
            OrderProgress::Active
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn item(seller_id: UserId, unit_price: u64, quantity: u32) -> OrderItem {
        OrderItem {
            product_id: ProductId::new(),
            seller_id,
            name: "Test Item".to_owned(),
            unit_price,
            quantity,
        }
    }

    #[test]
    fn new_order_totals_items_and_tracks_each_seller() {
        let seller_a = UserId::new();
        let seller_b = UserId::new();
        let order = Order::new(
            UserId::new(),
            PaymentRef::new("pay_123"),
            vec![item(seller_a, 10_000, 3), item(seller_a, 2_000, 5), item(seller_b, 7_000, 2)],
            Utc::now(),
        )
        .unwrap();

        assert_eq!(order.total_price, 30_000 + 10_000 + 14_000);
        assert_eq!(order.seller_statuses.len(), 2);
        assert_eq!(order.seller_statuses[&seller_a], FulfillmentStatus::Pending);
        assert_eq!(order.seller_subtotal(seller_a), 40_000);
        assert_eq!(order.progress(), OrderProgress::Active);
    }

    #[test]
    fn empty_and_zero_quantity_orders_are_rejected() {
        let err = Order::new(UserId::new(), PaymentRef::new("pay_1"), vec![], Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = Order::new(
            UserId::new(),
            PaymentRef::new("pay_2"),
            vec![item(UserId::new(), 5_000, 0)],
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn statuses_move_forward_only() {
        use FulfillmentStatus::*;

        assert_eq!(Pending.advance_to(Confirmed).unwrap(), Confirmed);
        // Skipping stages is allowed.
        assert_eq!(Pending.advance_to(Dispatched).unwrap(), Dispatched);
        // Re-asserting the same status is an idempotent no-op.
        assert_eq!(Dispatched.advance_to(Dispatched).unwrap(), Dispatched);

        let err = Delivered.advance_to(Confirmed).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn progress_completes_when_all_sellers_deliver() {
        let seller_a = UserId::new();
        let seller_b = UserId::new();
        let mut order = Order::new(
            UserId::new(),
            PaymentRef::new("pay_9"),
            vec![item(seller_a, 1_000, 1), item(seller_b, 1_000, 1)],
            Utc::now(),
        )
        .unwrap();

        order
            .seller_statuses
            .insert(seller_a, FulfillmentStatus::Delivered);
        assert_eq!(order.progress(), OrderProgress::Active);

        order
            .seller_statuses
            .insert(seller_b, FulfillmentStatus::Delivered);
        assert_eq!(order.progress(), OrderProgress::Completed);
    }

    proptest! {
        // The total always equals the item subtotals, and the per-seller
        // subtotals partition it exactly.
        #[test]
        fn total_is_the_sum_of_seller_subtotals(
            lines in prop::collection::vec((0usize..3, 1u64..100_000, 1u32..500), 1..12)
        ) {
            let sellers = [UserId::new(), UserId::new(), UserId::new()];
            let items: Vec<OrderItem> = lines
                .into_iter()
                .map(|(s, price, qty)| item(sellers[s], price, qty))
                .collect();
            let order = Order::new(UserId::new(), PaymentRef::new("pay_prop"), items, Utc::now())
                .unwrap();

            let by_items: u64 = order.items.iter().map(OrderItem::subtotal).sum();
            prop_assert_eq!(order.total_price, by_items);

            let by_sellers: u64 = sellers.iter().map(|s| order.seller_subtotal(*s)).sum();
            prop_assert_eq!(order.total_price, by_sellers);
            prop_assert_eq!(
                order.seller_statuses.len(),
                order.items.iter().map(|i| i.seller_id).collect::<std::collections::BTreeSet<_>>().len()
            );
        }
    }
}
