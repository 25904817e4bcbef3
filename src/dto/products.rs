use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Discount, Product};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub price: i64,
    pub original_price: Option<i64>,
    pub stock: i32,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub original_price: Option<i64>,
    pub stock: Option<i32>,
}

/// A catalog entry as shoppers see it: list price plus what they pay today.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub effective_price: i64,
    pub active_discount: Option<Discount>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<ProductView>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InventoryAdjustRequest {
    /// Signed change applied to the current stock.
    pub delta: i32,
}

/// Raw catalog rows for inventory screens; no discount resolution.
#[derive(Debug, Serialize, ToSchema)]
pub struct StockList {
    pub items: Vec<Product>,
}
