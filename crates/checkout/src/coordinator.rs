use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use mercato_carts::{CartEntry, CartKey, authoritative_quantity};
use mercato_catalog::Product;
use mercato_core::{DomainError, OrderId, ProductId, UserId};
use mercato_orders::{Order, OrderItem};
use mercato_store::{KeyedStore, StoreError, TxDecision, TxOutcome};

use crate::payment::{PaymentError, PaymentGateway};

/// Why a cart line failed checkout validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueReason {
    /// The product no longer exists.
    Deleted,
    /// Held quantity exceeds current stock (`available` may be zero).
    Overstocked { available: u32 },
    /// Held quantity fell below a raised minimum order quantity.
    BelowMoq { moq: u32 },
}

/// One stale cart line, with the quantity the cart would be corrected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartIssue {
    pub product_id: ProductId,
    pub seller_id: UserId,
    pub requested: u32,
    /// What the quantity would become after correction; zero means removal.
    pub corrected: u32,
    pub reason: IssueReason,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CheckoutError {
    /// The cart no longer matches the catalog. Nothing was charged or
    /// reserved; the buyer reviews the corrections and retries.
    #[error("cart is stale on {} line(s)", .0.len())]
    StaleCart(Vec<CartIssue>),

    /// The gateway refused the charge. Nothing was reserved.
    #[error("payment declined")]
    PaymentDeclined,

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Runs the checkout pipeline: validate, pay, reserve, place.
///
/// Holds its collaborators as trait objects so one coordinator can sit over
/// whatever store backs each concern.
pub struct CheckoutCoordinator<G> {
    products: Arc<dyn KeyedStore<ProductId, Product>>,
    carts: Arc<dyn KeyedStore<CartKey, CartEntry>>,
    orders: Arc<dyn KeyedStore<OrderId, Order>>,
    gateway: G,
}

impl<G> CheckoutCoordinator<G>
where
    G: PaymentGateway,
{
    pub fn new(
        products: Arc<dyn KeyedStore<ProductId, Product>>,
        carts: Arc<dyn KeyedStore<CartKey, CartEntry>>,
        orders: Arc<dyn KeyedStore<OrderId, Order>>,
        gateway: G,
    ) -> Self {
        Self {
            products,
            carts,
            orders,
            gateway,
        }
    }

    /// Convert the buyer's whole cart into a placed order.
    ///
    /// All-or-nothing: on any failure after stock has started moving, every
    /// already-reserved quantity is released before the error is returned.
    /// The order is only written once payment is captured and every line is
    /// reserved.
    pub fn checkout(&self, buyer_id: UserId) -> Result<Order, CheckoutError> {
        let lines = self.cart_lines(buyer_id)?;
        if lines.is_empty() {
            return Err(DomainError::validation("cart is empty").into());
        }

        // Phase 1: validate every line against the live catalog. Read-only;
        // a single stale line fails the whole attempt.
        let mut issues = Vec::new();
        let mut total = 0u64;
        for (_, entry) in &lines {
            match self.products.get(&entry.product_id).map_err(DomainError::from)? {
                None => issues.push(issue(entry, 0, IssueReason::Deleted)),
                Some(p) if entry.quantity > p.stock => {
                    let corrected =
                        authoritative_quantity(i64::from(entry.quantity), p.stock, p.moq).0;
                    issues.push(issue(entry, corrected, IssueReason::Overstocked {
                        available: p.stock,
                    }));
                }
                Some(p) if entry.quantity < p.moq => {
                    let corrected =
                        authoritative_quantity(i64::from(entry.quantity), p.stock, p.moq).0;
                    issues.push(issue(entry, corrected, IssueReason::BelowMoq { moq: p.moq }));
                }
                Some(p) => total += u64::from(entry.quantity) * p.price,
            }
        }
        if !issues.is_empty() {
            return Err(CheckoutError::StaleCart(issues));
        }

        // Phase 2: payment. No stock has moved yet, so a decline costs
        // nothing to undo.
        let payment_ref = match self.gateway.collect(buyer_id, total) {
            Ok(r) => r,
            Err(PaymentError::Declined) => return Err(CheckoutError::PaymentDeclined),
            Err(PaymentError::Unavailable(msg)) => {
                return Err(DomainError::unavailable(msg).into());
            }
        };

        // Phase 3: reserve stock per product, in key order so concurrent
        // checkouts contend in the same sequence. Each decrement re-checks
        // stock inside the conditional write.
        let mut reserved: Vec<(ProductId, u32)> = Vec::new();
        let mut items: Vec<OrderItem> = Vec::new();
        for (_, entry) in &lines {
            let mut snapshot: Option<Product> = None;
            let result = self.products.transact(&entry.product_id, &mut |current| {
                snapshot = None;
                match current {
                    Some(p) if p.stock >= entry.quantity => {
                        snapshot = Some(p.clone());
                        let mut next = p.clone();
                        next.stock -= entry.quantity;
                        TxDecision::Put(next)
                    }
                    _ => TxDecision::Abort,
                }
            });

            match result {
                Ok(TxOutcome::Committed(_)) => {
                    let p = snapshot
                        .ok_or_else(|| DomainError::invariant("missing reservation pre-image"))?;
                    reserved.push((entry.product_id, entry.quantity));
                    items.push(OrderItem {
                        product_id: entry.product_id,
                        seller_id: entry.seller_id,
                        name: p.name,
                        unit_price: p.price,
                        quantity: entry.quantity,
                    });
                }
                Ok(TxOutcome::Aborted) => {
                    self.release(&reserved)?;
                    return Err(DomainError::stock_conflict(entry.product_id).into());
                }
                Err(e) => {
                    self.release(&reserved)?;
                    // Retry exhaustion on the decrement is a lost reservation
                    // race, not an infrastructure outage.
                    return Err(match e {
                        StoreError::Conflict { .. } => {
                            DomainError::stock_conflict(entry.product_id)
                        }
                        other => DomainError::from(other),
                    }
                    .into());
                }
            }
        }

        // Phase 4: place the order and empty the cart. Reserved stock is
        // owned by the order from here on. Until the order is durably
        // written the reservations are still ours to undo, so a failed
        // write releases them before surfacing.
        let order = match Order::new(buyer_id, payment_ref, items, Utc::now()) {
            Ok(order) => order,
            Err(e) => {
                self.release(&reserved)?;
                return Err(e.into());
            }
        };
        if let Err(e) = self.orders.put(order.id, order.clone()) {
            self.release(&reserved)?;
            return Err(DomainError::from(e).into());
        }
        for (key, _) in &lines {
            self.carts.remove(key).map_err(DomainError::from)?;
        }
        tracing::info!(
            "checkout complete: order {} for buyer {}, {} line(s), total {}",
            order.id,
            buyer_id,
            order.items.len(),
            order.total_price
        );
        Ok(order)
    }

    /// Return every reserved quantity to stock, newest reservation first.
    ///
    /// A product deleted mid-release is logged and skipped (there is no
    /// stock row to restore). Store failures here are fatal: stock stays
    /// under-counted until someone intervenes, so they surface as
    /// `CompensationFailure` rather than being swallowed.
    fn release(&self, reserved: &[(ProductId, u32)]) -> Result<(), CheckoutError> {
        for (product_id, quantity) in reserved.iter().rev() {
            let result = self.products.transact(product_id, &mut |current| match current {
                Some(p) => {
                    let mut next = p.clone();
                    next.stock += quantity;
                    TxDecision::Put(next)
                }
                None => TxDecision::Abort,
            });
            match result {
                Ok(TxOutcome::Committed(_)) => {}
                Ok(TxOutcome::Aborted) => {
                    tracing::warn!(
                        "product {} deleted while releasing {} unit(s); nothing to restore",
                        product_id,
                        quantity
                    );
                }
                Err(e) => {
                    tracing::error!(
                        "failed to release {} unit(s) of product {}: {e}",
                        quantity,
                        product_id
                    );
                    return Err(DomainError::CompensationFailure(format!(
                        "could not restore {quantity} unit(s) of product {product_id}: {e}"
                    ))
                    .into());
                }
            }
        }
        Ok(())
    }

    /// The buyer's cart lines in (seller, product) key order.
    fn cart_lines(&self, buyer_id: UserId) -> Result<Vec<(CartKey, CartEntry)>, CheckoutError> {
        let mut lines: Vec<(CartKey, CartEntry)> = self
            .carts
            .entries()
            .map_err(DomainError::from)?
            .into_iter()
            .filter(|(key, _)| key.buyer_id == buyer_id)
            .collect();
        lines.sort_by_key(|(key, _)| *key);
        Ok(lines)
    }
}

fn issue(entry: &CartEntry, corrected: u32, reason: IssueReason) -> CartIssue {
    CartIssue {
        product_id: entry.product_id,
        seller_id: entry.seller_id,
        requested: entry.quantity,
        corrected,
        reason,
    }
}
