//! Per-product discount resolution.
//!
//! Discounts never stack: when several are active for the same product the
//! most recently created one applies (ties broken by id, descending).

use chrono::{DateTime, Utc};

use crate::{
    models::{Discount, DiscountKind},
    pricing::coupon::percent_of,
};

/// Whether `discount` is switched on and `now` falls inside its window.
/// A missing start or end bound is always satisfied.
pub fn is_active_at(discount: &Discount, now: DateTime<Utc>) -> bool {
    discount.is_active
        && discount.start_date.is_none_or(|start| start <= now)
        && discount.end_date.is_none_or(|end| now <= end)
}

/// Active discounts, newest first.
pub fn active_discounts(discounts: &[Discount], now: DateTime<Utc>) -> Vec<&Discount> {
    let mut active: Vec<&Discount> = discounts
        .iter()
        .filter(|d| is_active_at(d, now))
        .collect();
    active.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    active
}

/// The single discount that applies at `now`, if any.
pub fn applicable_discount(discounts: &[Discount], now: DateTime<Utc>) -> Option<&Discount> {
    active_discounts(discounts, now).into_iter().next()
}

/// Price after one discount. Never negative.
pub fn apply_discount(price: i64, kind: &DiscountKind) -> i64 {
    let price = price.max(0);
    match *kind {
        DiscountKind::Percentage(percent) => price - percent_of(price, percent),
        DiscountKind::Fixed(amount) => (price - amount.max(0)).max(0),
    }
}

/// List price after the applicable discount, plus the discount used.
pub fn effective_price(
    price: i64,
    discounts: &[Discount],
    now: DateTime<Utc>,
) -> (i64, Option<&Discount>) {
    match applicable_discount(discounts, now) {
        Some(discount) => (apply_discount(price, &discount.kind), Some(discount)),
        None => (price.max(0), None),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use uuid::Uuid;

    use super::*;

    fn discount(kind: DiscountKind, created_at: DateTime<Utc>) -> Discount {
        Discount {
            id: Uuid::new_v4(),
            product_id: Uuid::nil(),
            kind,
            is_active: true,
            start_date: None,
            end_date: None,
            created_at,
        }
    }

    #[test]
    fn percentage_and_fixed_discounts() {
        assert_eq!(apply_discount(100_000, &DiscountKind::Percentage(20)), 80_000);
        assert_eq!(apply_discount(100_000, &DiscountKind::Percentage(100)), 0);
        assert_eq!(apply_discount(25_000, &DiscountKind::Fixed(5_000)), 20_000);
        assert_eq!(apply_discount(3_000, &DiscountKind::Fixed(5_000)), 0);
    }

    #[test]
    fn percentage_of_a_very_large_price_stays_exact() {
        assert_eq!(apply_discount(i64::MAX, &DiscountKind::Percentage(0)), i64::MAX);
        assert_eq!(
            apply_discount(200_000_000_000_000_000, &DiscountKind::Percentage(25)),
            150_000_000_000_000_000
        );
    }

    #[test]
    fn discounted_price_is_never_negative_and_never_increases() {
        for price in [0_i64, 1, 999, 15_000, 1_250_000] {
            let mut last = price;
            for percent in 0..=100 {
                let p = apply_discount(price, &DiscountKind::Percentage(percent));
                assert!(p >= 0);
                assert!(p <= last, "price rose at {percent}% for {price}");
                last = p;
            }
            let mut last = price;
            for amount in (0..=2_000_000).step_by(50_000) {
                let p = apply_discount(price, &DiscountKind::Fixed(amount));
                assert!(p >= 0);
                assert!(p <= last);
                last = p;
            }
        }
    }

    #[test]
    fn window_bounds_are_inclusive_and_open_ended() {
        let now = Utc::now();
        let mut d = discount(DiscountKind::Percentage(10), now);
        assert!(is_active_at(&d, now));

        d.start_date = Some(now);
        d.end_date = Some(now);
        assert!(is_active_at(&d, now));

        d.start_date = Some(now + Duration::hours(1));
        assert!(!is_active_at(&d, now));

        d.start_date = None;
        d.end_date = Some(now - Duration::seconds(1));
        assert!(!is_active_at(&d, now));

        d.end_date = None;
        d.is_active = false;
        assert!(!is_active_at(&d, now));
    }

    #[test]
    fn newest_active_discount_wins() {
        let now = Utc::now();
        let older = discount(DiscountKind::Percentage(50), now - Duration::days(3));
        let newer = discount(DiscountKind::Fixed(1_000), now - Duration::days(1));
        let mut newest_inactive = discount(DiscountKind::Percentage(90), now);
        newest_inactive.is_active = false;

        let all = vec![older, newer.clone(), newest_inactive];
        let (price, applied) = effective_price(10_000, &all, now);
        assert_eq!(price, 9_000);
        assert_eq!(applied.map(|d| d.id), Some(newer.id));
        assert_eq!(active_discounts(&all, now).len(), 2);
    }

    #[test]
    fn no_discount_keeps_list_price() {
        let (price, applied) = effective_price(42_000, &[], Utc::now());
        assert_eq!(price, 42_000);
        assert!(applied.is_none());
    }
}
