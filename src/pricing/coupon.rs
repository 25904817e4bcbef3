//! Coupon validation and discount math.
//!
//! Validation is a pure function of the coupon row, the order subtotal and
//! the clock. Checks run in a fixed order and the first failure is reported,
//! so the same inputs always produce the same rejection.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::models::{Coupon, CouponKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CouponRejection {
    #[error("كود الخصم غير صالح")]
    NotFound,
    #[error("كود الخصم غير مفعل")]
    Inactive,
    #[error("كود الخصم لم يبدأ بعد")]
    NotStarted,
    #[error("انتهت صلاحية كود الخصم")]
    Expired,
    #[error("قيمة الطلب أقل من الحد الأدنى لاستخدام كود الخصم")]
    BelowMinimum,
    #[error("تم استنفاد عدد مرات استخدام كود الخصم")]
    Exhausted,
}

impl CouponRejection {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "coupon_not_found",
            Self::Inactive => "coupon_inactive",
            Self::NotStarted => "coupon_not_started",
            Self::Expired => "coupon_expired",
            Self::BelowMinimum => "coupon_below_minimum",
            Self::Exhausted => "coupon_exhausted",
        }
    }
}

/// Codes are stored uppercased and looked up the same way.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn validate_coupon<'a>(
    coupon: Option<&'a Coupon>,
    subtotal: i64,
    now: DateTime<Utc>,
) -> Result<&'a Coupon, CouponRejection> {
    let coupon = coupon.ok_or(CouponRejection::NotFound)?;

    if !coupon.is_active {
        return Err(CouponRejection::Inactive);
    }
    if coupon.start_date.is_some_and(|start| start > now) {
        return Err(CouponRejection::NotStarted);
    }
    if coupon.end_date.is_some_and(|end| end < now) {
        return Err(CouponRejection::Expired);
    }
    if coupon.min_order_amount.is_some_and(|min| subtotal < min) {
        return Err(CouponRejection::BelowMinimum);
    }
    if coupon
        .max_uses
        .is_some_and(|max| coupon.used_count >= max)
    {
        return Err(CouponRejection::Exhausted);
    }

    Ok(coupon)
}

/// Amount taken off the subtotal. Free shipping takes nothing off the
/// subtotal; it zeroes the shipping fee instead.
pub fn coupon_discount(kind: &CouponKind, subtotal: i64) -> i64 {
    let subtotal = subtotal.max(0);
    match *kind {
        CouponKind::Percentage(percent) => percent_of(subtotal, percent),
        CouponKind::Fixed(amount) => amount.clamp(0, subtotal),
        CouponKind::FreeShipping => 0,
    }
}

/// `floor(amount * percent / 100)` for a non-negative amount, computed
/// wide so it cannot overflow. The result never exceeds `amount`.
pub(crate) fn percent_of(amount: i64, percent: i64) -> i64 {
    let wide = i128::from(amount.max(0)) * i128::from(percent.clamp(0, 100)) / 100;
    i64::try_from(wide).unwrap_or(amount)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use uuid::Uuid;

    use super::*;

    fn save20(now: DateTime<Utc>) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            code: "SAVE20".into(),
            kind: CouponKind::Percentage(20),
            min_order_amount: Some(50_000),
            max_uses: Some(100),
            used_count: 10,
            start_date: Some(now - Duration::days(1)),
            end_date: Some(now + Duration::days(30)),
            is_active: true,
            created_at: now - Duration::days(2),
        }
    }

    #[test]
    fn valid_coupon_is_returned() {
        let now = Utc::now();
        let coupon = save20(now);
        let valid = validate_coupon(Some(&coupon), 100_000, now).unwrap();
        assert_eq!(valid.code, "SAVE20");
        assert_eq!(coupon_discount(&valid.kind, 100_000), 20_000);
    }

    #[test]
    fn missing_coupon_is_not_found() {
        assert_eq!(
            validate_coupon(None, 100_000, Utc::now()).unwrap_err(),
            CouponRejection::NotFound
        );
    }

    #[test]
    fn expired_wins_over_later_checks() {
        let now = Utc::now();
        let mut coupon = save20(now);
        coupon.code = "EXPIRED".into();
        coupon.end_date = Some(now - Duration::days(1));
        coupon.used_count = 100;
        assert_eq!(
            validate_coupon(Some(&coupon), 1_000, now).unwrap_err(),
            CouponRejection::Expired
        );
    }

    #[test]
    fn checks_run_in_declared_order() {
        let now = Utc::now();
        let mut coupon = save20(now);
        coupon.is_active = false;
        coupon.start_date = Some(now + Duration::days(1));
        assert_eq!(
            validate_coupon(Some(&coupon), 100_000, now).unwrap_err(),
            CouponRejection::Inactive
        );

        coupon.is_active = true;
        coupon.end_date = Some(now - Duration::days(1));
        assert_eq!(
            validate_coupon(Some(&coupon), 100_000, now).unwrap_err(),
            CouponRejection::NotStarted
        );

        coupon.start_date = None;
        coupon.end_date = None;
        coupon.used_count = 100;
        assert_eq!(
            validate_coupon(Some(&coupon), 10_000, now).unwrap_err(),
            CouponRejection::BelowMinimum
        );
        assert_eq!(
            validate_coupon(Some(&coupon), 60_000, now).unwrap_err(),
            CouponRejection::Exhausted
        );
    }

    #[test]
    fn below_minimum() {
        let now = Utc::now();
        let mut coupon = save20(now);
        coupon.code = "MIN50K".into();
        assert_eq!(
            validate_coupon(Some(&coupon), 30_000, now).unwrap_err(),
            CouponRejection::BelowMinimum
        );
        assert!(validate_coupon(Some(&coupon), 50_000, now).is_ok());
    }

    #[test]
    fn unlimited_coupon_is_never_exhausted() {
        let now = Utc::now();
        let mut coupon = save20(now);
        coupon.max_uses = None;
        coupon.used_count = 1_000_000;
        assert!(validate_coupon(Some(&coupon), 100_000, now).is_ok());
    }

    #[test]
    fn validation_is_repeatable() {
        let now = Utc::now();
        let coupon = save20(now);
        let first = validate_coupon(Some(&coupon), 40_000, now).map(|c| c.id);
        let second = validate_coupon(Some(&coupon), 40_000, now).map(|c| c.id);
        assert_eq!(first, second);
        assert_eq!(coupon.used_count, 10);
    }

    #[test]
    fn discount_amounts_by_kind() {
        assert_eq!(coupon_discount(&CouponKind::Fixed(5_000), 30_000), 5_000);
        assert_eq!(coupon_discount(&CouponKind::Fixed(50_000), 30_000), 30_000);
        assert_eq!(coupon_discount(&CouponKind::Percentage(15), 10_000), 1_500);
        assert_eq!(coupon_discount(&CouponKind::FreeShipping, 30_000), 0);
    }

    #[test]
    fn codes_are_case_insensitive() {
        assert_eq!(normalize_code("  save20 "), "SAVE20");
    }
}
