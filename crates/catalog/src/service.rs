use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;

use mercato_core::{DomainError, DomainResult, GeoPoint, Principal, ProductId, Role, UserId, distance_km};
use mercato_store::{KeyedStore, Subscription, TxDecision, TxOutcome};

use crate::product::{Product, ProductDraft, ProductPatch};

/// A catalog mutation that dependent state (carts) must react to.
///
/// Stock increases and MOQ decreases never invalidate existing cart entries,
/// so only the shrinking direction is reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogChange {
    /// Stock was cut below its previous value; `stock` is the new value.
    StockDecreased {
        product_id: ProductId,
        seller_id: UserId,
        stock: u32,
    },
    /// MOQ was raised above its previous value; `stock` is the stock at the
    /// time of the raise (an entry that cannot reach `moq` must go).
    MoqRaised {
        product_id: ProductId,
        seller_id: UserId,
        moq: u32,
        stock: u32,
    },
    /// The product was removed from the catalog entirely.
    Deleted { product_id: ProductId },
}

/// Synchronous hook invoked after a catalog mutation commits.
///
/// Observer failures are logged and swallowed: the product edit has already
/// committed, and checkout re-validates carts authoritatively regardless.
pub trait CatalogObserver: Send + Sync {
    fn on_change(&self, change: &CatalogChange) -> DomainResult<()>;
}

/// The authoritative product catalog.
pub struct ProductCatalog<S>
where
    S: KeyedStore<ProductId, Product>,
{
    products: S,
    observers: RwLock<Vec<Arc<dyn CatalogObserver>>>,
}

impl<S> ProductCatalog<S>
where
    S: KeyedStore<ProductId, Product>,
{
    pub fn new(products: S) -> Self {
        Self {
            products,
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Attach an observer to be notified synchronously after every
    /// cart-relevant mutation.
    pub fn attach(&self, observer: Arc<dyn CatalogObserver>) {
        if let Ok(mut observers) = self.observers.write() {
            observers.push(observer);
        }
    }

    /// List a new product for the given seller.
    pub fn create(&self, seller: &Principal, draft: ProductDraft) -> DomainResult<Product> {
        if !seller.role.can_sell() {
            return Err(DomainError::forbidden("consumers cannot list products"));
        }
        draft.validate()?;

        let now = Utc::now();
        let product = Product {
            id: ProductId::new(),
            seller_id: seller.id,
            seller_name: seller.display_name.clone(),
            seller_role: seller.role,
            name: draft.name,
            price: draft.price,
            stock: draft.stock,
            moq: draft.moq.max(1),
            image_ref: draft.image_ref,
            location: draft.location,
            created_at: now,
            updated_at: now,
            reviews: BTreeMap::new(),
            average_rating: 0.0,
            review_count: 0,
        };

        self.products.put(product.id, product.clone())?;
        Ok(product)
    }

    /// Apply a partial edit. Only the owning seller may edit; the write goes
    /// through the conditional-write primitive so it cannot clobber a
    /// concurrent checkout reservation on the same product.
    ///
    /// Returns the updated product plus the changes carts must react to;
    /// attached observers have already been notified on return.
    pub fn update(
        &self,
        seller: &Principal,
        product_id: ProductId,
        patch: ProductPatch,
    ) -> DomainResult<(Product, Vec<CatalogChange>)> {
        patch.validate()?;

        let now = Utc::now();
        let mut fail: Option<DomainError> = None;
        let mut before: Option<Product> = None;

        let outcome = self.products.transact(&product_id, &mut |current| {
            fail = None;
            let Some(product) = current else {
                fail = Some(DomainError::not_found());
                return TxDecision::Abort;
            };
            if product.seller_id != seller.id {
                fail = Some(DomainError::forbidden("only the owning seller may edit a product"));
                return TxDecision::Abort;
            }
            before = Some(product.clone());
            let mut next = product.clone();
            patch.apply_to(&mut next, now);
            TxDecision::Put(next)
        })?;

        let updated = match outcome {
            TxOutcome::Aborted => {
                return Err(fail.unwrap_or_else(|| DomainError::invariant("product update aborted")));
            }
            TxOutcome::Committed(Some(updated)) => updated,
            TxOutcome::Committed(None) => return Err(DomainError::not_found()),
        };
        let before = before.ok_or_else(|| DomainError::invariant("missing update pre-image"))?;

        let mut changes = Vec::new();
        if updated.stock < before.stock {
            changes.push(CatalogChange::StockDecreased {
                product_id,
                seller_id: updated.seller_id,
                stock: updated.stock,
            });
        }
        if updated.moq > before.moq {
            changes.push(CatalogChange::MoqRaised {
                product_id,
                seller_id: updated.seller_id,
                moq: updated.moq,
                stock: updated.stock,
            });
        }
        self.notify(&changes);

        Ok((updated, changes))
    }

    /// Remove a product from the catalog and tell observers to purge it from
    /// every cart. Returns the applied change, like [`Self::update`].
    pub fn delete(&self, seller: &Principal, product_id: ProductId) -> DomainResult<CatalogChange> {
        let mut fail: Option<DomainError> = None;

        let outcome = self.products.transact(&product_id, &mut |current| {
            fail = None;
            let Some(product) = current else {
                fail = Some(DomainError::not_found());
                return TxDecision::Abort;
            };
            if product.seller_id != seller.id {
                fail = Some(DomainError::forbidden("only the owning seller may delete a product"));
                return TxDecision::Abort;
            }
            TxDecision::Remove
        })?;

        if !outcome.is_committed() {
            return Err(fail.unwrap_or_else(|| DomainError::invariant("product delete aborted")));
        }

        let change = CatalogChange::Deleted { product_id };
        self.notify(std::slice::from_ref(&change));
        Ok(change)
    }

    pub fn get(&self, product_id: ProductId) -> DomainResult<Option<Product>> {
        Ok(self.products.get(&product_id)?)
    }

    /// Every listed product, in stable id order.
    pub fn list(&self) -> DomainResult<Vec<Product>> {
        let mut products: Vec<Product> = self.products.entries()?.into_iter().map(|(_, p)| p).collect();
        products.sort_by_key(|p| p.id);
        Ok(products)
    }

    pub fn list_by_seller(&self, seller_id: UserId) -> DomainResult<Vec<Product>> {
        let mut products: Vec<Product> = self
            .products
            .entries()?
            .into_iter()
            .filter_map(|(_, p)| (p.seller_id == seller_id).then_some(p))
            .collect();
        products.sort_by_key(|p| p.id);
        Ok(products)
    }

    /// Marketplace listing for a viewer: products listed by sellers of the
    /// given role, excluding the viewer's own listings.
    pub fn marketplace(&self, viewer: UserId, seller_role: Role) -> DomainResult<Vec<Product>> {
        let mut products: Vec<Product> = self
            .products
            .entries()?
            .into_iter()
            .filter_map(|(_, p)| {
                (p.seller_role == seller_role && p.seller_id != viewer).then_some(p)
            })
            .collect();
        products.sort_by_key(|p| p.id);
        Ok(products)
    }

    /// Live view of one product (current value now, then on every change).
    pub fn watch(&self, product_id: ProductId) -> DomainResult<Subscription<Option<Product>>> {
        Ok(self.products.watch(&product_id)?)
    }

    fn notify(&self, changes: &[CatalogChange]) {
        if changes.is_empty() {
            return;
        }
        let Ok(observers) = self.observers.read() else {
            return;
        };
        for change in changes {
            for observer in observers.iter() {
                if let Err(e) = observer.on_change(change) {
                    tracing::warn!("catalog observer failed for {change:?}: {e}");
                }
            }
        }
    }
}

/// Distance sort: listings closest to `origin` first; products without a
/// location sort last. Pure function, no side effects.
pub fn nearest_first(origin: GeoPoint, mut products: Vec<Product>) -> Vec<Product> {
    products.sort_by(|a, b| {
        let da = a.location.map(|l| distance_km(origin, l));
        let db = b.location.map(|l| distance_km(origin, l));
        match (da, db) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(core::cmp::Ordering::Equal),
            (Some(_), None) => core::cmp::Ordering::Less,
            (None, Some(_)) => core::cmp::Ordering::Greater,
            (None, None) => core::cmp::Ordering::Equal,
        }
    });
    products
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mercato_store::InMemoryStore;

    use super::*;

    fn seller() -> Principal {
        Principal::new(UserId::new(), "Asha Traders", Role::Wholesaler)
    }

    fn catalog() -> ProductCatalog<Arc<InMemoryStore<ProductId, Product>>> {
        ProductCatalog::new(Arc::new(InMemoryStore::new()))
    }

    #[test]
    fn create_lists_a_product_with_snapshots() {
        let catalog = catalog();
        let seller = seller();

        let product = catalog
            .create(&seller, ProductDraft::new("Basmati Rice 25kg", 210_000, 40).with_moq(5))
            .unwrap();

        assert_eq!(product.seller_id, seller.id);
        assert_eq!(product.seller_name, "Asha Traders");
        assert_eq!(product.moq, 5);
        assert_eq!(catalog.get(product.id).unwrap(), Some(product));
    }

    #[test]
    fn create_rejects_consumer_sellers() {
        let catalog = catalog();
        let consumer = Principal::new(UserId::new(), "Walk-in", Role::Consumer);

        let err = catalog
            .create(&consumer, ProductDraft::new("Soap", 4_000, 10))
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn create_rejects_zero_price_and_blank_name() {
        let catalog = catalog();
        let seller = seller();

        assert!(matches!(
            catalog.create(&seller, ProductDraft::new("  ", 1_000, 1)),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            catalog.create(&seller, ProductDraft::new("Salt", 0, 1)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn moq_below_one_is_lifted_to_one() {
        let catalog = catalog();
        let product = catalog
            .create(&seller(), ProductDraft::new("Sugar 1kg", 4_500, 10).with_moq(0))
            .unwrap();
        assert_eq!(product.moq, 1);
    }

    #[test]
    fn update_is_owner_only() {
        let catalog = catalog();
        let owner = seller();
        let intruder = Principal::new(UserId::new(), "Someone Else", Role::Retailer);
        let product = catalog
            .create(&owner, ProductDraft::new("Tea 500g", 32_000, 20))
            .unwrap();

        let err = catalog
            .update(&intruder, product.id, ProductPatch::stock(1))
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));

        let err = catalog.delete(&intruder, product.id).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn stock_cut_reports_a_change_and_stock_raise_does_not() {
        let catalog = catalog();
        let owner = seller();
        let product = catalog
            .create(&owner, ProductDraft::new("Atta 10kg", 52_000, 50))
            .unwrap();

        let (_, changes) = catalog
            .update(&owner, product.id, ProductPatch::stock(5))
            .unwrap();
        assert_eq!(
            changes,
            vec![CatalogChange::StockDecreased {
                product_id: product.id,
                seller_id: owner.id,
                stock: 5,
            }]
        );

        let (_, changes) = catalog
            .update(&owner, product.id, ProductPatch::stock(500))
            .unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn moq_raise_reports_a_change_with_current_stock() {
        let catalog = catalog();
        let owner = seller();
        let product = catalog
            .create(&owner, ProductDraft::new("Oil 5L", 78_000, 12).with_moq(2))
            .unwrap();

        let (_, changes) = catalog
            .update(&owner, product.id, ProductPatch::moq(6))
            .unwrap();
        assert_eq!(
            changes,
            vec![CatalogChange::MoqRaised {
                product_id: product.id,
                seller_id: owner.id,
                moq: 6,
                stock: 12,
            }]
        );
    }

    #[test]
    fn delete_notifies_observers() {
        struct Recorder(std::sync::Mutex<Vec<CatalogChange>>);
        impl CatalogObserver for Recorder {
            fn on_change(&self, change: &CatalogChange) -> DomainResult<()> {
                self.0.lock().unwrap().push(change.clone());
                Ok(())
            }
        }

        let catalog = catalog();
        let owner = seller();
        let recorder = Arc::new(Recorder(std::sync::Mutex::new(Vec::new())));
        catalog.attach(Arc::clone(&recorder) as Arc<dyn CatalogObserver>);

        let product = catalog
            .create(&owner, ProductDraft::new("Dal 5kg", 61_000, 30))
            .unwrap();
        catalog.delete(&owner, product.id).unwrap();

        let seen = recorder.0.lock().unwrap();
        assert_eq!(
            *seen,
            vec![CatalogChange::Deleted {
                product_id: product.id
            }]
        );
        assert_eq!(catalog.get(product.id).unwrap(), None);
    }

    #[test]
    fn marketplace_excludes_own_listings_and_filters_by_role() {
        let catalog = catalog();
        let wholesaler = seller();
        let retailer = Principal::new(UserId::new(), "Corner Shop", Role::Retailer);

        let wholesale = catalog
            .create(&wholesaler, ProductDraft::new("Bulk Rice", 200_000, 100))
            .unwrap();
        let resale = catalog
            .create(&retailer, ProductDraft::new("Rice 1kg", 9_000, 25))
            .unwrap();

        let viewer = retailer.id;
        let wholesale_market = catalog.marketplace(viewer, Role::Wholesaler).unwrap();
        assert_eq!(wholesale_market.len(), 1);
        assert_eq!(wholesale_market[0].id, wholesale.id);

        // A retailer browsing the resale market never sees their own listing.
        let resale_market = catalog.marketplace(viewer, Role::Retailer).unwrap();
        assert!(resale_market.is_empty());

        let consumer = UserId::new();
        let resale_market = catalog.marketplace(consumer, Role::Retailer).unwrap();
        assert_eq!(resale_market[0].id, resale.id);
    }

    #[test]
    fn nearest_first_sorts_by_distance_with_unlocated_last() {
        let catalog = catalog();
        let owner = seller();
        let delhi = GeoPoint::new(28.6139, 77.2090);
        let jaipur = GeoPoint::new(26.9124, 75.7873);
        let mumbai = GeoPoint::new(19.0760, 72.8777);

        let far = catalog
            .create(
                &owner,
                ProductDraft::new("Far", 1_000, 1).with_location(mumbai),
            )
            .unwrap();
        let near = catalog
            .create(
                &owner,
                ProductDraft::new("Near", 1_000, 1).with_location(jaipur),
            )
            .unwrap();
        let unlocated = catalog
            .create(&owner, ProductDraft::new("Nowhere", 1_000, 1))
            .unwrap();

        let sorted = nearest_first(delhi, catalog.list().unwrap());
        let ids: Vec<ProductId> = sorted.into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![near.id, far.id, unlocated.id]);
    }

    #[test]
    fn watch_sees_seller_edits() {
        let catalog = catalog();
        let owner = seller();
        let product = catalog
            .create(&owner, ProductDraft::new("Ghee 1L", 64_000, 9))
            .unwrap();

        let sub = catalog.watch(product.id).unwrap();
        assert_eq!(sub.try_recv().unwrap().unwrap().stock, 9);

        catalog
            .update(&owner, product.id, ProductPatch::stock(3))
            .unwrap();
        assert_eq!(sub.try_recv().unwrap().unwrap().stock, 3);
    }
}
