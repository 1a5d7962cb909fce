//! Product and project models.
//!
//! Their `status` fields are projections of task progress. The status
//! strings come from the configured hierarchies.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A product (piece of furniture) within a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier for the product.
    pub id: String,
    /// The tenant the product belongs to.
    pub tenant_id: String,
    /// The owning project.
    pub project_id: String,
    /// Display name.
    pub name: String,
    /// Current status from the product hierarchy.
    pub status: String,
}

/// A customer project grouping products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier for the project.
    pub id: String,
    /// The tenant the project belongs to.
    pub tenant_id: String,
    /// Display name.
    pub name: String,
    /// Current status from the project hierarchy.
    pub status: String,
}

/// An accepted pricing offer for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedOffer {
    /// Offer identifier.
    pub offer_id: String,
    /// The product the offer prices.
    pub product_id: String,
    /// Contracted selling price of the product.
    pub price: Decimal,
    /// When the customer accepted the offer.
    pub accepted_at: DateTime<Utc>,
}
