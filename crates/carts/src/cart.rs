use serde::{Deserialize, Serialize};

use mercato_catalog::Product;
use mercato_core::{DomainError, DomainResult, ProductId, UserId};
use mercato_store::{KeyedStore, TxDecision};

/// Cart line key: one line per buyer, seller and product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CartKey {
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub product_id: ProductId,
}

/// A persisted cart line. `seller_id` is denormalized from the product so a
/// line stays attributable after the product is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    pub product_id: ProductId,
    pub seller_id: UserId,
    pub quantity: u32,
}

/// Why a requested quantity was corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartNotice {
    /// The product has no stock left; the line was dropped.
    OutOfStock,
    /// The request exceeded stock and was capped to it.
    CappedAtStock { stock: u32 },
    /// The request fell below the minimum order quantity and was lifted.
    RaisedToMoq { moq: u32 },
    /// The minimum order quantity exceeds the remaining stock, so no
    /// purchasable quantity exists; the line was dropped.
    MoqUnmeetable { moq: u32 },
}

/// Collapse any requested quantity onto the one the catalog permits.
///
/// The request is signed so that decrement-below-zero arithmetic stays out of
/// the callers. The result is always `0` or within `[moq, stock]`, and a
/// correction is reported as a notice, never as an error.
pub fn authoritative_quantity(requested: i64, stock: u32, moq: u32) -> (u32, Option<CartNotice>) {
    let moq = moq.max(1);
    if requested <= 0 {
        return (0, None);
    }
    if stock == 0 {
        return (0, Some(CartNotice::OutOfStock));
    }
    if moq > stock {
        return (0, Some(CartNotice::MoqUnmeetable { moq }));
    }
    if requested > i64::from(stock) {
        return (stock, Some(CartNotice::CappedAtStock { stock }));
    }
    let requested = requested as u32;
    if requested < moq {
        return (moq, Some(CartNotice::RaisedToMoq { moq }));
    }
    (requested, None)
}

/// Display status of a cart line relative to the current catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    /// The line would survive checkout validation as-is.
    Ready,
    /// The product has been deleted from the catalog.
    Deleted,
    /// The held quantity exceeds what is currently in stock.
    Overstocked { available: u32 },
    /// The held quantity fell below a raised minimum order quantity.
    BelowMoq { moq: u32 },
}

/// One rendered cart line: the persisted entry joined with the live product.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub entry: CartEntry,
    /// `None` when the product has been deleted.
    pub product: Option<Product>,
    pub status: LineStatus,
    /// `quantity * unit price`; zero for deleted lines.
    pub line_total: u64,
}

/// A buyer's full cart, joined against the catalog at read time.
#[derive(Debug, Clone, PartialEq)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    /// Sum over lines whose status is [`LineStatus::Ready`].
    pub payable_total: u64,
}

impl CartView {
    /// Whether checkout validation would accept this cart right now.
    pub fn is_ready(&self) -> bool {
        !self.lines.is_empty() && self.lines.iter().all(|l| l.status == LineStatus::Ready)
    }
}

/// Cart operations for buyers.
///
/// Reads the catalog to clamp every write; never mutates the catalog.
pub struct CartService<C, P> {
    carts: C,
    products: P,
}

impl<C, P> CartService<C, P>
where
    C: KeyedStore<CartKey, CartEntry>,
    P: KeyedStore<ProductId, Product>,
{
    pub fn new(carts: C, products: P) -> Self {
        Self { carts, products }
    }

    /// Set a line to (the authoritative correction of) `requested`.
    ///
    /// A corrected-to-zero or non-positive request removes the line. Returns
    /// the quantity actually persisted plus the correction notice, if any.
    pub fn set_quantity(
        &self,
        buyer_id: UserId,
        product_id: ProductId,
        requested: i64,
    ) -> DomainResult<(u32, Option<CartNotice>)> {
        let Some(product) = self.products.get(&product_id)? else {
            // The line, if any, points at nothing sellable; drop it.
            if let Some((key, _)) = self.line(buyer_id, product_id)? {
                self.carts.remove(&key)?;
            }
            return Err(DomainError::not_found());
        };

        let (quantity, notice) = authoritative_quantity(requested, product.stock, product.moq);
        let key = CartKey {
            buyer_id,
            seller_id: product.seller_id,
            product_id,
        };
        if quantity == 0 {
            self.carts.remove(&key)?;
        } else {
            self.carts.put(
                key,
                CartEntry {
                    product_id,
                    seller_id: product.seller_id,
                    quantity,
                },
            )?;
        }
        Ok((quantity, notice))
    }

    /// Stepper "+": an absent line jumps straight to the MOQ, a present one
    /// grows by one (clamped to stock).
    pub fn increment(
        &self,
        buyer_id: UserId,
        product_id: ProductId,
    ) -> DomainResult<(u32, Option<CartNotice>)> {
        let current = self.quantity(buyer_id, product_id)?;
        let target = if current == 0 {
            let product = self.products.get(&product_id)?.ok_or(DomainError::NotFound)?;
            i64::from(product.moq.max(1))
        } else {
            i64::from(current) + 1
        };
        self.set_quantity(buyer_id, product_id, target)
    }

    /// Stepper "-": a line at or below the MOQ drops to zero (minimums do
    /// not allow a quantity between 0 and the MOQ), otherwise shrink by one.
    pub fn decrement(
        &self,
        buyer_id: UserId,
        product_id: ProductId,
    ) -> DomainResult<(u32, Option<CartNotice>)> {
        let current = self.quantity(buyer_id, product_id)?;
        if current == 0 {
            return Ok((0, None));
        }
        let product = self.products.get(&product_id)?.ok_or(DomainError::NotFound)?;
        let target = if current <= product.moq.max(1) {
            0
        } else {
            i64::from(current) - 1
        };
        self.set_quantity(buyer_id, product_id, target)
    }

    /// Quantity currently held for a product, zero when no line exists.
    pub fn quantity(&self, buyer_id: UserId, product_id: ProductId) -> DomainResult<u32> {
        Ok(self
            .line(buyer_id, product_id)?
            .map(|(_, entry)| entry.quantity)
            .unwrap_or(0))
    }

    /// Every line of the buyer's cart, in stable (seller, product) order.
    pub fn cart_of(&self, buyer_id: UserId) -> DomainResult<Vec<CartEntry>> {
        let mut entries: Vec<CartEntry> = self
            .carts
            .entries()?
            .into_iter()
            .filter_map(|(key, entry)| (key.buyer_id == buyer_id).then_some(entry))
            .collect();
        entries.sort_by_key(|e| (e.seller_id, e.product_id));
        Ok(entries)
    }

    /// Drop every line of the buyer's cart.
    pub fn clear(&self, buyer_id: UserId) -> DomainResult<()> {
        for (key, _) in self.carts.entries()? {
            if key.buyer_id == buyer_id {
                self.carts.remove(&key)?;
            }
        }
        Ok(())
    }

    /// Join the cart against the live catalog for display.
    ///
    /// Lines are flagged, not silently fixed: the view reports what the
    /// buyer holds versus what the catalog now allows, and the buyer (or
    /// the reconciler) resolves the difference.
    pub fn view(&self, buyer_id: UserId) -> DomainResult<CartView> {
        let mut lines = Vec::new();
        let mut payable_total = 0u64;

        for entry in self.cart_of(buyer_id)? {
            let product = self.products.get(&entry.product_id)?;
            let status = match &product {
                None => LineStatus::Deleted,
                Some(p) if entry.quantity > p.stock => LineStatus::Overstocked { available: p.stock },
                Some(p) if entry.quantity < p.moq => LineStatus::BelowMoq { moq: p.moq },
                Some(_) => LineStatus::Ready,
            };
            let line_total = product
                .as_ref()
                .map(|p| u64::from(entry.quantity) * p.price)
                .unwrap_or(0);
            if status == LineStatus::Ready {
                payable_total += line_total;
            }
            lines.push(CartLine {
                entry,
                product,
                status,
                line_total,
            });
        }

        Ok(CartView {
            lines,
            payable_total,
        })
    }

    /// Conditionally rewrite one line; used by the reconciler so a
    /// correction cannot resurrect a line the buyer removed in between.
    pub(crate) fn correct_line(
        &self,
        key: CartKey,
        corrected: u32,
    ) -> DomainResult<()> {
        self.carts.transact(&key, &mut |current| match current {
            None => TxDecision::Abort,
            Some(_) if corrected == 0 => TxDecision::Remove,
            Some(entry) => {
                let mut next = entry.clone();
                next.quantity = corrected;
                TxDecision::Put(next)
            }
        })?;
        Ok(())
    }

    fn line(
        &self,
        buyer_id: UserId,
        product_id: ProductId,
    ) -> DomainResult<Option<(CartKey, CartEntry)>> {
        Ok(self
            .carts
            .entries()?
            .into_iter()
            .find(|(key, _)| key.buyer_id == buyer_id && key.product_id == product_id))
    }

    pub(crate) fn all_lines(&self) -> DomainResult<Vec<(CartKey, CartEntry)>> {
        Ok(self.carts.entries()?)
    }
}
