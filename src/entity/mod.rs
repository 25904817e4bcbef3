pub mod audit_logs;
pub mod coupons;
pub mod discounts;
pub mod order_items;
pub mod orders;
pub mod price_history;
pub mod products;
pub mod users;
