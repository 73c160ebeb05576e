//! Structured product data extracted from one product page
//!
//! A `ProductRecord` is built once by the extractor and then only moved
//! between stages; nothing mutates it afterwards. Its JSON form is what ends
//! up in each product's `data.json`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything extracted from a single product page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    /// The page the record was extracted from
    pub url: String,

    /// Product title as shown on the page
    pub product_name: String,

    /// Aggregate rating, absent when the page shows none
    pub rating: Option<f64>,

    /// Customer reviews in page order
    pub reviews: Vec<Review>,

    /// Absolute gallery image URLs in page order
    pub gallery: Vec<String>,

    pub description: String,

    /// Specification table, name to value
    pub specifications: BTreeMap<String, String>,

    pub price: Price,

    pub availability: String,

    /// Colour variants offered for the product
    pub variants: Vec<String>,
}

/// One customer review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// Review body
    #[serde(rename = "review")]
    pub text: String,

    /// Star rating on a 0-5 scale, absent when the review has no stars
    pub rating: Option<f64>,
}

/// Price as displayed; kept as markup text because the site formats it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub cash: Option<String>,
    pub card: Option<String>,
}

impl ProductRecord {
    /// Serializes the record the way it is stored in the archive
    pub fn to_pretty_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}
