pub mod admin_service;
pub mod auth_service;
pub mod coupon_service;
pub mod discount_service;
pub mod order_service;
pub mod pricing_service;
pub mod product_service;
