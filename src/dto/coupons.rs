use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::models::{Coupon, CouponKind};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateCouponRequest {
    pub code: String,
    #[serde(flatten)]
    pub kind: CouponKind,
    pub min_order_amount: Option<i64>,
    pub max_uses: Option<i32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

/// Partial update. Omitted fields keep their value; the usage counter is
/// never editable. For the nullable limits `Some(Some(v))` sets, an
/// explicit `null` (`Some(None)`) clears, and `None` leaves them alone.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateCouponRequest {
    pub code: Option<String>,
    pub kind: Option<CouponKind>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<i64>)]
    pub min_order_amount: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<i32>)]
    pub max_uses: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<DateTime<Utc>>)]
    pub start_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<DateTime<Utc>>)]
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub is_active: Option<bool>,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidateCouponRequest {
    pub code: String,
    pub subtotal: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CouponValidation {
    pub coupon: Coupon,
    pub discount_amount: i64,
    pub free_shipping: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CouponList {
    pub items: Vec<Coupon>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_tells_null_apart_from_missing() {
        let req: UpdateCouponRequest = serde_json::from_value(serde_json::json!({
            "max_uses": null,
            "end_date": null,
            "min_order_amount": 25000
        }))
        .unwrap();
        assert_eq!(req.max_uses, Some(None));
        assert_eq!(req.end_date, Some(None));
        assert_eq!(req.min_order_amount, Some(Some(25_000)));
        assert_eq!(req.start_date, None);

        let empty: UpdateCouponRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(empty.max_uses, None);
        assert_eq!(empty.min_order_amount, None);
    }
}
