use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod coupons;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/products", products::router())
        .nest("/coupons", coupons::router())
        .nest("/orders", orders::route())
        .nest("/admin", admin::router())
}
