//! `mercato-reviews`: buyer reviews with always-consistent aggregates.
//!
//! Reviews live inside the product record, so the review map, the average
//! rating and the review count change in one conditional write. Readers never
//! observe a review without its recomputed aggregate.

use chrono::Utc;

use mercato_catalog::{Product, Review};
use mercato_core::{DomainError, DomainResult, ProductId, UserId};
use mercato_store::{KeyedStore, StoreError, TxDecision, TxOutcome};

/// Review submission over the product store.
pub struct ReviewLedger<S> {
    products: S,
}

impl<S> ReviewLedger<S>
where
    S: KeyedStore<ProductId, Product>,
{
    pub fn new(products: S) -> Self {
        Self { products }
    }

    /// Submit (or overwrite) a buyer's review of a product.
    ///
    /// One review per buyer per product; resubmission replaces the earlier
    /// one and never double-counts. Returns the product as stored after the
    /// write, aggregates included.
    pub fn submit_review(
        &self,
        reviewer: UserId,
        product_id: ProductId,
        rating: u8,
        comment: impl Into<String>,
    ) -> DomainResult<Product> {
        if !(1..=5).contains(&rating) {
            return Err(DomainError::validation("rating must be between 1 and 5"));
        }
        let comment = comment.into();
        let submitted_at = Utc::now();

        let outcome = self
            .products
            .transact(&product_id, &mut |current| {
                let Some(product) = current else {
                    return TxDecision::Abort;
                };
                let mut updated = product.clone();
                updated.reviews.insert(
                    reviewer,
                    Review {
                        reviewer,
                        rating,
                        comment: comment.clone(),
                        submitted_at,
                    },
                );
                recompute_aggregates(&mut updated);
                TxDecision::Put(updated)
            })
            .map_err(|e| match e {
                StoreError::Conflict { attempts } => DomainError::ReviewConflict(format!(
                    "review write on product {product_id} lost {attempts} races"
                )),
                other => other.into(),
            })?;

        match outcome {
            TxOutcome::Committed(Some(product)) => {
                tracing::info!(
                    "review stored for product {} by {} ({} star(s), {} total)",
                    product_id,
                    reviewer,
                    rating,
                    product.review_count
                );
                Ok(product)
            }
            TxOutcome::Committed(None) | TxOutcome::Aborted => Err(DomainError::not_found()),
        }
    }

    /// All reviews of a product, newest first.
    pub fn reviews_of(&self, product_id: ProductId) -> DomainResult<Vec<Review>> {
        let product = self.products.get(&product_id)?.ok_or(DomainError::NotFound)?;
        let mut reviews: Vec<Review> = product.reviews.into_values().collect();
        reviews.sort_by_key(|r| std::cmp::Reverse(r.submitted_at));
        Ok(reviews)
    }
}

fn recompute_aggregates(product: &mut Product) {
    let count = product.reviews.len() as u32;
    let sum: u32 = product.reviews.values().map(|r| u32::from(r.rating)).sum();
    product.review_count = count;
    product.average_rating = if count == 0 {
        0.0
    } else {
        f64::from(sum) / f64::from(count)
    };
}
