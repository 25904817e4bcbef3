use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{models::CouponKind, pricing::coupon::coupon_discount};

/// One cart line with its effective unit price already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
}

impl PricedLine {
    pub fn line_total(&self) -> Option<i64> {
        self.unit_price.checked_mul(i64::from(self.quantity))
    }
}

/// An order amount that does not fit in an `i64` of dinars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("order amount is too large")]
pub struct AmountOverflow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrderTotals {
    pub subtotal: i64,
    pub discount_amount: i64,
    pub shipping_fee: i64,
    pub total: i64,
}

pub fn subtotal(lines: &[PricedLine]) -> Result<i64, AmountOverflow> {
    lines.iter().try_fold(0_i64, |acc, line| {
        line.line_total()
            .and_then(|total| acc.checked_add(total))
            .ok_or(AmountOverflow)
    })
}

/// `total = subtotal - coupon discount + shipping fee`, where a free
/// shipping coupon zeroes the fee and leaves the subtotal alone.
pub fn assemble(
    lines: &[PricedLine],
    coupon: Option<&CouponKind>,
    shipping_fee: i64,
) -> Result<OrderTotals, AmountOverflow> {
    let subtotal = subtotal(lines)?;
    let discount_amount = coupon.map_or(0, |kind| coupon_discount(kind, subtotal));
    let shipping_fee = match coupon {
        Some(CouponKind::FreeShipping) => 0,
        _ => shipping_fee.max(0),
    };

    let total = (subtotal - discount_amount)
        .checked_add(shipping_fee)
        .ok_or(AmountOverflow)?;

    Ok(OrderTotals {
        subtotal,
        discount_amount,
        shipping_fee,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i32, unit_price: i64) -> PricedLine {
        PricedLine {
            product_id: Uuid::new_v4(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn percentage_coupon_on_subtotal() {
        let lines = [line(2, 35_000), line(1, 30_000)];
        let totals = assemble(&lines, Some(&CouponKind::Percentage(20)), 0).unwrap();
        assert_eq!(
            totals,
            OrderTotals {
                subtotal: 100_000,
                discount_amount: 20_000,
                shipping_fee: 0,
                total: 80_000,
            }
        );
    }

    #[test]
    fn shipping_is_added_unless_coupon_is_free_shipping() {
        let lines = [line(1, 40_000)];
        assert_eq!(assemble(&lines, None, 5_000).unwrap().total, 45_000);
        assert_eq!(
            assemble(&lines, Some(&CouponKind::Fixed(10_000)), 5_000)
                .unwrap()
                .total,
            35_000
        );

        let free = assemble(&lines, Some(&CouponKind::FreeShipping), 5_000).unwrap();
        assert_eq!(free.shipping_fee, 0);
        assert_eq!(free.discount_amount, 0);
        assert_eq!(free.total, 40_000);
    }

    #[test]
    fn fixed_coupon_larger_than_subtotal_floors_at_shipping() {
        let totals =
            assemble(&[line(1, 3_000)], Some(&CouponKind::Fixed(10_000)), 2_000).unwrap();
        assert_eq!(totals.discount_amount, 3_000);
        assert_eq!(totals.total, 2_000);
    }

    #[test]
    fn oversized_amounts_are_reported_not_wrapped() {
        assert_eq!(
            assemble(&[line(3, 4_000_000_000_000_000_000)], None, 0),
            Err(AmountOverflow)
        );
        assert_eq!(
            assemble(&[line(1, i64::MAX), line(1, 1)], None, 0),
            Err(AmountOverflow)
        );
        assert_eq!(assemble(&[line(1, i64::MAX)], None, 1), Err(AmountOverflow));
    }

    #[test]
    fn percentage_coupon_on_a_huge_subtotal_does_not_overflow() {
        let totals = assemble(
            &[line(1, 200_000_000_000_000_000)],
            Some(&CouponKind::Percentage(50)),
            0,
        )
        .unwrap();
        assert_eq!(totals.discount_amount, 100_000_000_000_000_000);
        assert_eq!(totals.total, 100_000_000_000_000_000);
    }
}
