//! Cart reconciliation after catalog changes.
//!
//! Seller edits commit to the catalog first; carts are corrected afterwards.
//! The reconciler re-reads the product at correction time rather than
//! trusting the change payload, so a burst of edits converges on the final
//! catalog state no matter how the notifications interleave.

use mercato_catalog::{CatalogChange, CatalogObserver, Product};
use mercato_core::{DomainResult, ProductId};
use mercato_store::KeyedStore;

use crate::cart::{CartEntry, CartKey, CartService, authoritative_quantity};

/// One correction the reconciler applied to a persisted cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartAdjustment {
    /// The line was removed (product gone, out of stock, or MOQ unmeetable).
    Removed { key: CartKey, from: u32 },
    /// The quantity was rewritten to the nearest valid one.
    Corrected { key: CartKey, from: u32, to: u32 },
}

/// Replays catalog shrinkage onto every affected cart.
pub struct CartReconciler<C, P> {
    carts: CartService<C, P>,
    products: P,
}

impl<C, P> CartReconciler<C, P>
where
    C: KeyedStore<CartKey, CartEntry>,
    P: KeyedStore<ProductId, Product> + Clone,
{
    pub fn new(carts: C, products: P) -> Self {
        Self {
            carts: CartService::new(carts, products.clone()),
            products,
        }
    }

    /// Correct every cart line holding `product_id` against the product's
    /// current stock and MOQ. Lines buyers changed concurrently are left to
    /// the next notification rather than overwritten.
    pub fn reconcile(&self, product_id: ProductId) -> DomainResult<Vec<CartAdjustment>> {
        let product = self.products.get(&product_id)?;
        let mut adjustments = Vec::new();

        for (key, entry) in self.carts.all_lines()? {
            if key.product_id != product_id {
                continue;
            }
            let corrected = match &product {
                None => 0,
                Some(p) => authoritative_quantity(i64::from(entry.quantity), p.stock, p.moq).0,
            };
            if corrected == entry.quantity {
                continue;
            }

            self.carts.correct_line(key, corrected)?;
            let adjustment = if corrected == 0 {
                CartAdjustment::Removed {
                    key,
                    from: entry.quantity,
                }
            } else {
                CartAdjustment::Corrected {
                    key,
                    from: entry.quantity,
                    to: corrected,
                }
            };
            tracing::info!(
                "reconciled cart line for buyer {} on product {}: {} -> {}",
                key.buyer_id,
                product_id,
                entry.quantity,
                corrected
            );
            adjustments.push(adjustment);
        }

        Ok(adjustments)
    }
}

impl<C, P> CatalogObserver for CartReconciler<C, P>
where
    C: KeyedStore<CartKey, CartEntry>,
    P: KeyedStore<ProductId, Product> + Clone + Send + Sync,
{
    fn on_change(&self, change: &CatalogChange) -> DomainResult<()> {
        let product_id = match change {
            CatalogChange::StockDecreased { product_id, .. }
            | CatalogChange::MoqRaised { product_id, .. }
            | CatalogChange::Deleted { product_id } => *product_id,
        };
        self.reconcile(product_id)?;
        Ok(())
    }
}
