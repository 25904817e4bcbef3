pub mod auth;
pub mod coupons;
pub mod discounts;
pub mod orders;
pub mod pricing;
pub mod products;
