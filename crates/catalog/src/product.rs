use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercato_core::{DomainError, GeoPoint, ProductId, Role, UserId};

/// A buyer's review of a product. At most one per (product, buyer);
/// resubmission overwrites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub reviewer: UserId,
    /// Star rating, 1..=5.
    pub rating: u8,
    pub comment: String,
    pub submitted_at: DateTime<Utc>,
}

/// A listed product record.
///
/// Owned by its seller; `stock` is additionally decremented by checkout
/// reservations and the review fields are rewritten by the review ledger,
/// both through the store's conditional-write primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub seller_id: UserId,
    /// Seller display name, snapshotted at listing time.
    pub seller_name: String,
    /// Seller role, snapshotted at listing time; drives marketplace
    /// segmentation (wholesale vs. resale listings).
    pub seller_role: Role,
    pub name: String,
    /// Price in the smallest currency unit (e.g. paise/cents). Always > 0.
    pub price: u64,
    /// Units available for sale.
    pub stock: u32,
    /// Minimum order quantity. Always >= 1.
    pub moq: u32,
    /// Opaque reference into external asset storage.
    pub image_ref: Option<String>,
    pub location: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reviews: BTreeMap<UserId, Review>,
    /// Mean of all stored ratings; 0.0 when unreviewed. Recomputed by the
    /// review ledger inside the same conditional write that stores a review.
    pub average_rating: f64,
    pub review_count: u32,
}

impl Product {
    pub fn is_out_of_stock(&self) -> bool {
        self.stock == 0
    }

    /// Whether any purchase is possible at all: a MOQ above the remaining
    /// stock makes the product unaddable.
    pub fn can_meet_moq(&self) -> bool {
        self.moq <= self.stock
    }
}

/// Input for listing a new product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub price: u64,
    pub stock: u32,
    /// Defaults to 1; values below 1 are lifted to 1 (reference behavior).
    pub moq: u32,
    pub image_ref: Option<String>,
    pub location: Option<GeoPoint>,
}

impl ProductDraft {
    pub fn new(name: impl Into<String>, price: u64, stock: u32) -> Self {
        Self {
            name: name.into(),
            price,
            stock,
            moq: 1,
            image_ref: None,
            location: None,
        }
    }

    pub fn with_moq(mut self, moq: u32) -> Self {
        self.moq = moq;
        self
    }

    pub fn with_image_ref(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        if self.price == 0 {
            return Err(DomainError::validation("price must be positive"));
        }
        Ok(())
    }
}

/// Partial update applied by the owning seller; `None` fields are untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub price: Option<u64>,
    pub stock: Option<u32>,
    pub moq: Option<u32>,
    pub image_ref: Option<String>,
    pub location: Option<GeoPoint>,
}

impl ProductPatch {
    pub fn stock(stock: u32) -> Self {
        Self {
            stock: Some(stock),
            ..Self::default()
        }
    }

    pub fn moq(moq: u32) -> Self {
        Self {
            moq: Some(moq),
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), DomainError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("product name cannot be empty"));
            }
        }
        if self.price == Some(0) {
            return Err(DomainError::validation("price must be positive"));
        }
        Ok(())
    }

    pub(crate) fn apply_to(&self, product: &mut Product, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(moq) = self.moq {
            product.moq = moq.max(1);
        }
        if let Some(image_ref) = &self.image_ref {
            product.image_ref = Some(image_ref.clone());
        }
        if let Some(location) = self.location {
            product.location = Some(location);
        }
        product.updated_at = now;
    }
}
