// src/models/product.rs

//! Product, Offer, and Shop data structures.

use serde::{Deserialize, Serialize};

/// A product resolved from the backend detail endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    /// Backend product identifier
    pub id: u64,

    /// Display name
    pub name: String,

    /// Purchasable variants, in backend order
    #[serde(default)]
    pub offers: Vec<Offer>,
}

/// A purchasable variant of a product.
///
/// The backend omits price and size fields freely; they stay unset rather
/// than failing extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Offer {
    /// Vendor article code
    #[serde(default)]
    pub code: Option<String>,

    /// Package size label
    #[serde(default)]
    pub size: Option<String>,

    /// Retail price
    #[serde(default)]
    pub price: Option<f64>,

    /// Discounted price, if a discount is active
    #[serde(default)]
    pub discount_price: Option<f64>,

    /// Per-shop availability, in backend order
    #[serde(default)]
    pub shops: Vec<Shop>,
}

/// Availability of an offer in one physical shop.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Shop {
    /// Shop street address
    #[serde(default)]
    pub address: Option<String>,

    /// Availability label (e.g. "в наличии")
    #[serde(default)]
    pub availability: Option<String>,
}
