//! Pure pricing rules. Nothing in here touches the database or the clock;
//! services load the rows and pass `now` in.

pub mod coupon;
pub mod discount;
pub mod suggestion;
pub mod totals;
pub mod trend;
