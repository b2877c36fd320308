use chrono::{DateTime, Utc};

use mercato_core::{DomainError, DomainResult, OrderId, Principal, UserId};
use mercato_store::{KeyedStore, Subscription, TxDecision, TxOutcome};

use crate::order::{FulfillmentStatus, Order, OrderItem, OrderProgress};

/// A seller's slice of one order: only their items, their status, their
/// subtotal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerOrderView {
    pub order_id: OrderId,
    pub buyer_id: UserId,
    pub placed_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
    pub status: FulfillmentStatus,
    pub subtotal: u64,
}

/// Order persistence plus per-seller fulfillment tracking.
pub struct OrderStatusTracker<S> {
    orders: S,
}

impl<S> OrderStatusTracker<S>
where
    S: KeyedStore<OrderId, Order>,
{
    pub fn new(orders: S) -> Self {
        Self { orders }
    }

    /// Persist a freshly placed order.
    pub fn record(&self, order: Order) -> DomainResult<()> {
        tracing::info!(
            "recording order {} for buyer {} across {} seller(s), total {}",
            order.id,
            order.buyer_id,
            order.seller_statuses.len(),
            order.total_price
        );
        Ok(self.orders.put(order.id, order)?)
    }

    pub fn get(&self, order_id: OrderId) -> DomainResult<Option<Order>> {
        Ok(self.orders.get(&order_id)?)
    }

    /// Advance one seller's status on one order.
    ///
    /// Only a seller with items on the order may move their own status, and
    /// only forward. Returns the updated order.
    pub fn set_status(
        &self,
        seller: &Principal,
        order_id: OrderId,
        status: FulfillmentStatus,
    ) -> DomainResult<Order> {
        let mut fail: Option<DomainError> = None;

        let outcome = self.orders.transact(&order_id, &mut |current| {
            fail = None;
            let Some(order) = current else {
                fail = Some(DomainError::not_found());
                return TxDecision::Abort;
            };
            let Some(current_status) = order.seller_statuses.get(&seller.id).copied() else {
                fail = Some(DomainError::forbidden(
                    "only a seller with items on the order may update its status",
                ));
                return TxDecision::Abort;
            };
            let next = match current_status.advance_to(status) {
                Ok(next) => next,
                Err(e) => {
                    fail = Some(e);
                    return TxDecision::Abort;
                }
            };
            let mut updated = order.clone();
            updated.seller_statuses.insert(seller.id, next);
            TxDecision::Put(updated)
        })?;

        match outcome {
            TxOutcome::Committed(Some(order)) => {
                tracing::info!(
                    "order {}: seller {} set status {}",
                    order_id,
                    seller.id,
                    status
                );
                Ok(order)
            }
            TxOutcome::Committed(None) => Err(DomainError::not_found()),
            TxOutcome::Aborted => {
                Err(fail.unwrap_or_else(|| DomainError::invariant("status update aborted")))
            }
        }
    }

    /// A buyer's order history, newest first, each with its progress.
    pub fn buyer_orders(&self, buyer_id: UserId) -> DomainResult<Vec<(Order, OrderProgress)>> {
        let mut orders: Vec<Order> = self
            .orders
            .entries()?
            .into_iter()
            .filter_map(|(_, o)| (o.buyer_id == buyer_id).then_some(o))
            .collect();
        orders.sort_by_key(|o| std::cmp::Reverse((o.placed_at, o.id)));
        Ok(orders
            .into_iter()
            .map(|o| {
                let progress = o.progress();
                (o, progress)
            })
            .collect())
    }

    /// Every order slice a seller has to fulfill, newest first.
    pub fn seller_view(&self, seller_id: UserId) -> DomainResult<Vec<SellerOrderView>> {
        let mut views: Vec<SellerOrderView> = self
            .orders
            .entries()?
            .into_iter()
            .filter_map(|(_, order)| {
                let status = order.seller_statuses.get(&seller_id).copied()?;
                Some(SellerOrderView {
                    order_id: order.id,
                    buyer_id: order.buyer_id,
                    placed_at: order.placed_at,
                    items: order.items_of_seller(seller_id).cloned().collect(),
                    status,
                    subtotal: order.seller_subtotal(seller_id),
                })
            })
            .collect();
        views.sort_by_key(|v| std::cmp::Reverse((v.placed_at, v.order_id)));
        Ok(views)
    }

    /// Recognized revenue for a seller: the sum of their subtotals over
    /// orders where their status is Delivered. Nothing earlier counts.
    pub fn seller_revenue(&self, seller_id: UserId) -> DomainResult<u64> {
        let mut revenue = 0u64;
        for (_, order) in self.orders.entries()? {
            if order.seller_statuses.get(&seller_id) == Some(&FulfillmentStatus::Delivered) {
                revenue += order.seller_subtotal(seller_id);
            }
        }
        Ok(revenue)
    }

    /// Live view of one order (current value now, then on every change).
    pub fn watch(&self, order_id: OrderId) -> DomainResult<Subscription<Option<Order>>> {
        Ok(self.orders.watch(&order_id)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use mercato_core::{ProductId, Role};
    use mercato_store::InMemoryStore;

    use crate::order::PaymentRef;

    use super::*;

    fn tracker() -> OrderStatusTracker<Arc<InMemoryStore<OrderId, Order>>> {
        OrderStatusTracker::new(Arc::new(InMemoryStore::new()))
    }

    fn item(seller_id: UserId, unit_price: u64, quantity: u32) -> OrderItem {
        OrderItem {
            product_id: ProductId::new(),
            seller_id,
            name: "Crate of Mangoes".to_owned(),
            unit_price,
            quantity,
        }
    }

    fn place(
        tracker: &OrderStatusTracker<Arc<InMemoryStore<OrderId, Order>>>,
        buyer_id: UserId,
        items: Vec<OrderItem>,
    ) -> Order {
        let order = Order::new(buyer_id, PaymentRef::new("pay_test"), items, Utc::now()).unwrap();
        tracker.record(order.clone()).unwrap();
        order
    }

    #[test]
    fn seller_advances_only_their_own_status() {
        let tracker = tracker();
        let seller_a = Principal::new(UserId::new(), "Seller A", Role::Wholesaler);
        let seller_b = Principal::new(UserId::new(), "Seller B", Role::Wholesaler);
        let order = place(
            &tracker,
            UserId::new(),
            vec![item(seller_a.id, 5_000, 2), item(seller_b.id, 8_000, 1)],
        );

        let updated = tracker
            .set_status(&seller_a, order.id, FulfillmentStatus::Dispatched)
            .unwrap();
        assert_eq!(
            updated.seller_statuses[&seller_a.id],
            FulfillmentStatus::Dispatched
        );
        assert_eq!(
            updated.seller_statuses[&seller_b.id],
            FulfillmentStatus::Pending
        );
    }

    #[test]
    fn outsiders_cannot_touch_an_order() {
        let tracker = tracker();
        let seller = Principal::new(UserId::new(), "Seller", Role::Retailer);
        let outsider = Principal::new(UserId::new(), "Outsider", Role::Retailer);
        let order = place(&tracker, UserId::new(), vec![item(seller.id, 5_000, 2)]);

        let err = tracker
            .set_status(&outsider, order.id, FulfillmentStatus::Confirmed)
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn status_regression_is_rejected_and_nothing_is_written() {
        let tracker = tracker();
        let seller = Principal::new(UserId::new(), "Seller", Role::Wholesaler);
        let order = place(&tracker, UserId::new(), vec![item(seller.id, 5_000, 2)]);

        tracker
            .set_status(&seller, order.id, FulfillmentStatus::Delivered)
            .unwrap();
        let err = tracker
            .set_status(&seller, order.id, FulfillmentStatus::Pending)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        let stored = tracker.get(order.id).unwrap().unwrap();
        assert_eq!(
            stored.seller_statuses[&seller.id],
            FulfillmentStatus::Delivered
        );
    }

    #[test]
    fn revenue_counts_delivered_slices_only() {
        let tracker = tracker();
        let seller_a = Principal::new(UserId::new(), "Seller A", Role::Wholesaler);
        let seller_b = Principal::new(UserId::new(), "Seller B", Role::Wholesaler);
        let buyer = UserId::new();

        let first = place(
            &tracker,
            buyer,
            vec![item(seller_a.id, 10_000, 3), item(seller_b.id, 4_000, 2)],
        );
        let second = place(&tracker, buyer, vec![item(seller_a.id, 6_000, 1)]);

        // Nothing delivered yet.
        assert_eq!(tracker.seller_revenue(seller_a.id).unwrap(), 0);

        tracker
            .set_status(&seller_a, first.id, FulfillmentStatus::Delivered)
            .unwrap();
        assert_eq!(tracker.seller_revenue(seller_a.id).unwrap(), 30_000);
        // Seller B's undelivered slice contributes nothing to anyone.
        assert_eq!(tracker.seller_revenue(seller_b.id).unwrap(), 0);

        tracker
            .set_status(&seller_a, second.id, FulfillmentStatus::Delivered)
            .unwrap();
        assert_eq!(tracker.seller_revenue(seller_a.id).unwrap(), 36_000);
    }

    #[test]
    fn buyer_history_reports_progress() {
        let tracker = tracker();
        let seller = Principal::new(UserId::new(), "Seller", Role::Wholesaler);
        let buyer = UserId::new();
        let order = place(&tracker, buyer, vec![item(seller.id, 2_000, 4)]);

        let history = tracker.buyer_orders(buyer).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].1, OrderProgress::Active);

        tracker
            .set_status(&seller, order.id, FulfillmentStatus::Delivered)
            .unwrap();
        let history = tracker.buyer_orders(buyer).unwrap();
        assert_eq!(history[0].1, OrderProgress::Completed);
    }

    #[test]
    fn seller_view_slices_out_their_items() {
        let tracker = tracker();
        let seller_a = Principal::new(UserId::new(), "Seller A", Role::Wholesaler);
        let seller_b = Principal::new(UserId::new(), "Seller B", Role::Wholesaler);
        let order = place(
            &tracker,
            UserId::new(),
            vec![item(seller_a.id, 10_000, 3), item(seller_b.id, 4_000, 2)],
        );

        let views = tracker.seller_view(seller_a.id).unwrap();
        assert_eq!(views.len(), 1);
        let view = &views[0];
        assert_eq!(view.order_id, order.id);
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.subtotal, 30_000);
        assert_eq!(view.status, FulfillmentStatus::Pending);
    }

    #[test]
    fn watch_streams_status_changes() {
        let tracker = tracker();
        let seller = Principal::new(UserId::new(), "Seller", Role::Wholesaler);
        let order = place(&tracker, UserId::new(), vec![item(seller.id, 3_000, 2)]);

        let sub = tracker.watch(order.id).unwrap();
        let initial = sub.recv_timeout(Duration::from_secs(1)).unwrap().unwrap();
        assert_eq!(
            initial.seller_statuses[&seller.id],
            FulfillmentStatus::Pending
        );

        tracker
            .set_status(&seller, order.id, FulfillmentStatus::Confirmed)
            .unwrap();
        let next = sub.recv_timeout(Duration::from_secs(1)).unwrap().unwrap();
        assert_eq!(
            next.seller_statuses[&seller.id],
            FulfillmentStatus::Confirmed
        );
    }
}
