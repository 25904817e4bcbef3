use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    models::Product,
    pricing::{suggestion::PriceSuggestion, trend::PriceTrend},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SuggestionRequest {
    pub product_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductSuggestion {
    pub product_id: Uuid,
    pub name: String,
    pub category: String,
    pub stock: i32,
    /// Units sold in the demand window, when known.
    pub units_sold: Option<i64>,
    #[serde(flatten)]
    pub suggestion: PriceSuggestion,
}

/// Sparse: products that do not exist, are out of stock or would barely
/// move are left out.
#[derive(Debug, Serialize, ToSchema)]
pub struct SuggestionList {
    pub suggestions: Vec<ProductSuggestion>,
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PriceUpdate {
    pub id: Uuid,
    pub price: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApplyPricesRequest {
    pub updates: Vec<PriceUpdate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApplyPricesResult {
    pub updated: usize,
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrendReport {
    pub product_id: Uuid,
    pub days: i64,
    #[serde(flatten)]
    pub trend: PriceTrend,
}
