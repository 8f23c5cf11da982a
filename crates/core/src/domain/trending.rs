use serde::{Deserialize, Serialize};

use crate::domain::product::{ProductId, ProductView};

/// Per-product running view count, keyed by product id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingCounter {
    pub product_id: ProductId,
    /// Product name as of the most recent view.
    pub display_title: String,
    pub view_count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingEntry {
    pub product: ProductView,
    /// Title from the counter; falls back to the product name for never-viewed products.
    pub display_title: String,
    pub view_count: u64,
}
