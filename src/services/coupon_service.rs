use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set, SqlErr,
};
use uuid::Uuid;

use crate::{
    audit::{AuditEntry, log_audit_or_warn},
    context::Actor,
    dto::coupons::{
        CouponList, CouponValidation, CreateCouponRequest, UpdateCouponRequest,
        ValidateCouponRequest,
    },
    entity::coupons::{ActiveModel, Column, Entity as Coupons, Model as CouponModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Coupon, CouponKind},
    pricing::coupon::{coupon_discount, normalize_code, validate_coupon},
    response::{ApiResponse, Deleted, Meta},
    state::AppState,
};

/// Preview what a code would take off a cart of `subtotal`. Nothing is
/// redeemed here; checkout re-validates under its own transaction.
pub async fn validate(
    state: &AppState,
    payload: ValidateCouponRequest,
) -> AppResult<ApiResponse<CouponValidation>> {
    if payload.subtotal < 0 {
        return Err(AppError::BadRequest("subtotal must not be negative".into()));
    }

    let code = normalize_code(&payload.code);
    let found = find_by_code(&state.orm, &code).await?;
    let coupon = validate_coupon(found.as_ref(), payload.subtotal, Utc::now())?;

    let data = CouponValidation {
        discount_amount: coupon_discount(&coupon.kind, payload.subtotal),
        free_shipping: coupon.kind == CouponKind::FreeShipping,
        coupon: coupon.clone(),
    };
    Ok(ApiResponse::success("Coupon is valid", data, None))
}

pub async fn list_coupons(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CouponList>> {
    ensure_admin(user)?;
    let items = Coupons::find()
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(coupon_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::count(items.len());
    Ok(ApiResponse::success("Coupons", CouponList { items }, Some(meta)))
}

pub async fn create_coupon(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;
    let code = normalize_code(&payload.code);
    validate_fields(
        &code,
        &payload.kind,
        payload.min_order_amount,
        payload.max_uses,
        payload.start_date.zip(payload.end_date),
    )?;

    if find_by_code(&state.orm, &code).await?.is_some() {
        return Err(AppError::Conflict(format!("coupon {code} already exists")));
    }

    let model = ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code.clone()),
        kind: Set(payload.kind.kind_str().to_string()),
        value: Set(payload.kind.value()),
        min_order_amount: Set(payload.min_order_amount),
        max_uses: Set(payload.max_uses),
        used_count: Set(0),
        start_date: Set(payload.start_date.map(Into::into)),
        end_date: Set(payload.end_date.map(Into::into)),
        is_active: Set(payload.is_active.unwrap_or(true)),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|err| duplicate_as_conflict(err, &code))?;

    log_audit_or_warn(
        &state.pool,
        AuditEntry {
            actor: Actor::from(user),
            action: "create",
            entity_type: "coupon",
            entity_id: Some(model.id.to_string()),
            changes: Some(serde_json::json!({ "code": model.code, "kind": model.kind, "value": model.value })),
        },
    )
    .await;

    Ok(ApiResponse::success(
        "Coupon created",
        coupon_from_entity(model)?,
        Some(Meta::empty()),
    ))
}

pub async fn update_coupon(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;
    let existing = Coupons::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Coupon"))?;
    let current = coupon_from_entity(existing.clone())?;

    let code = payload
        .code
        .as_deref()
        .map(normalize_code)
        .unwrap_or_else(|| current.code.clone());
    let kind = payload.kind.unwrap_or(current.kind);
    let min_order_amount = payload.min_order_amount.unwrap_or(current.min_order_amount);
    let max_uses = payload.max_uses.unwrap_or(current.max_uses);
    let start_date = payload.start_date.unwrap_or(current.start_date);
    let end_date = payload.end_date.unwrap_or(current.end_date);

    validate_fields(
        &code,
        &kind,
        min_order_amount,
        max_uses,
        start_date.zip(end_date),
    )?;
    if max_uses.is_some_and(|max| max < current.used_count) {
        return Err(AppError::BadRequest(
            "max_uses must not be below the current usage count".into(),
        ));
    }
    if code != current.code && find_by_code(&state.orm, &code).await?.is_some() {
        return Err(AppError::Conflict(format!("coupon {code} already exists")));
    }

    let mut active: ActiveModel = existing.into();
    active.code = Set(code.clone());
    active.kind = Set(kind.kind_str().to_string());
    active.value = Set(kind.value());
    active.min_order_amount = Set(min_order_amount);
    active.max_uses = Set(max_uses);
    active.start_date = Set(start_date.map(Into::into));
    active.end_date = Set(end_date.map(Into::into));
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    let model = active
        .update(&state.orm)
        .await
        .map_err(|err| duplicate_as_conflict(err, &code))?;

    log_audit_or_warn(
        &state.pool,
        AuditEntry {
            actor: Actor::from(user),
            action: "update",
            entity_type: "coupon",
            entity_id: Some(model.id.to_string()),
            changes: Some(serde_json::json!({
                "code": model.code,
                "kind": model.kind,
                "value": model.value,
                "is_active": model.is_active,
            })),
        },
    )
    .await;

    Ok(ApiResponse::success(
        "Coupon updated",
        coupon_from_entity(model)?,
        Some(Meta::empty()),
    ))
}

pub async fn delete_coupon(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Deleted>> {
    ensure_admin(user)?;
    let result = Coupons::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Coupon"));
    }

    log_audit_or_warn(
        &state.pool,
        AuditEntry {
            actor: Actor::from(user),
            action: "delete",
            entity_type: "coupon",
            entity_id: Some(id.to_string()),
            changes: None,
        },
    )
    .await;

    Ok(ApiResponse::deleted(id))
}

/// Look up a coupon by its normalized code.
pub(crate) async fn find_by_code<C: ConnectionTrait>(
    conn: &C,
    code: &str,
) -> AppResult<Option<Coupon>> {
    Coupons::find()
        .filter(Column::Code.eq(code))
        .one(conn)
        .await?
        .map(coupon_from_entity)
        .transpose()
}

fn validate_fields(
    code: &str,
    kind: &CouponKind,
    min_order_amount: Option<i64>,
    max_uses: Option<i32>,
    window: Option<(chrono::DateTime<Utc>, chrono::DateTime<Utc>)>,
) -> AppResult<()> {
    if code.is_empty() {
        return Err(AppError::BadRequest("code must not be empty".into()));
    }
    match *kind {
        CouponKind::Percentage(p) if !(0..=100).contains(&p) => {
            return Err(AppError::BadRequest(
                "percentage coupon must be between 0 and 100".into(),
            ));
        }
        CouponKind::Fixed(amount) if amount < 0 => {
            return Err(AppError::BadRequest("fixed coupon must not be negative".into()));
        }
        _ => {}
    }
    if min_order_amount.is_some_and(|min| min < 0) {
        return Err(AppError::BadRequest(
            "min_order_amount must not be negative".into(),
        ));
    }
    if max_uses.is_some_and(|max| max < 1) {
        return Err(AppError::BadRequest("max_uses must be at least 1".into()));
    }
    if window.is_some_and(|(start, end)| start > end) {
        return Err(AppError::BadRequest(
            "start_date must not be after end_date".into(),
        ));
    }
    Ok(())
}

fn duplicate_as_conflict(err: DbErr, code: &str) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict(format!("coupon {code} already exists"))
        }
        _ => AppError::OrmError(err),
    }
}

pub(crate) fn coupon_from_entity(model: CouponModel) -> AppResult<Coupon> {
    let kind = CouponKind::from_parts(&model.kind, model.value).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "coupon {} has unknown kind '{}'",
            model.id,
            model.kind
        ))
    })?;

    Ok(Coupon {
        id: model.id,
        code: model.code,
        kind,
        min_order_amount: model.min_order_amount,
        max_uses: model.max_uses,
        used_count: model.used_count,
        start_date: model.start_date.map(|dt| dt.with_timezone(&Utc)),
        end_date: model.end_date.map(|dt| dt.with_timezone(&Utc)),
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn field_validation() {
        let pct = CouponKind::Percentage(20);
        assert!(validate_fields("SAVE20", &pct, Some(50_000), Some(100), None).is_ok());
        assert!(validate_fields("", &pct, None, None, None).is_err());
        assert!(validate_fields("X", &CouponKind::Percentage(150), None, None, None).is_err());
        assert!(validate_fields("X", &CouponKind::Fixed(-1), None, None, None).is_err());
        assert!(validate_fields("X", &pct, Some(-5), None, None).is_err());
        assert!(validate_fields("X", &pct, None, Some(0), None).is_err());

        let now = Utc::now();
        assert!(
            validate_fields("X", &pct, None, None, Some((now, now - Duration::hours(1)))).is_err()
        );
    }

    #[test]
    fn free_shipping_row_maps_to_kind() {
        let now = Utc::now();
        let model = CouponModel {
            id: Uuid::new_v4(),
            code: "SHIPFREE".into(),
            kind: "free_shipping".into(),
            value: 0,
            min_order_amount: None,
            max_uses: None,
            used_count: 0,
            start_date: None,
            end_date: None,
            is_active: true,
            created_at: now.into(),
        };
        let coupon = coupon_from_entity(model).unwrap();
        assert_eq!(coupon.kind, CouponKind::FreeShipping);
    }
}
