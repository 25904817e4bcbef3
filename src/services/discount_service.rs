use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::{
    audit::{AuditEntry, log_audit_or_warn},
    context::Actor,
    dto::discounts::{CreateDiscountRequest, DiscountList, SetDiscountActiveRequest},
    entity::discounts::{ActiveModel, Column, Entity as Discounts, Model as DiscountModel},
    entity::products::Entity as Products,
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Discount, DiscountKind},
    pricing::discount::active_discounts,
    response::{ApiResponse, Deleted, Meta},
    state::AppState,
};

pub async fn list_discounts(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<DiscountList>> {
    ensure_admin(user)?;
    let items = Discounts::find()
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(discount_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::count(items.len());
    Ok(ApiResponse::success("Discounts", DiscountList { items }, Some(meta)))
}

/// Discounts in effect for one product right now, newest first.
pub async fn product_discounts(
    state: &AppState,
    product_id: Uuid,
) -> AppResult<ApiResponse<DiscountList>> {
    if Products::find_by_id(product_id).one(&state.orm).await?.is_none() {
        return Err(AppError::not_found("Product"));
    }

    let rows = Discounts::find()
        .filter(Column::ProductId.eq(product_id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(discount_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let items: Vec<Discount> = active_discounts(&rows, Utc::now())
        .into_iter()
        .cloned()
        .collect();
    let meta = Meta::count(items.len());
    Ok(ApiResponse::success("Discounts", DiscountList { items }, Some(meta)))
}

pub async fn create_discount(
    state: &AppState,
    user: &AuthUser,
    payload: CreateDiscountRequest,
) -> AppResult<ApiResponse<Discount>> {
    ensure_admin(user)?;
    validate_discount(&payload)?;

    if Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?
        .is_none()
    {
        return Err(AppError::not_found("Product"));
    }

    let model = ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(payload.product_id),
        kind: Set(payload.kind.kind_str().to_string()),
        value: Set(payload.kind.value()),
        is_active: Set(payload.is_active.unwrap_or(true)),
        start_date: Set(payload.start_date.map(Into::into)),
        end_date: Set(payload.end_date.map(Into::into)),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    log_audit_or_warn(
        &state.pool,
        AuditEntry {
            actor: Actor::from(user),
            action: "create",
            entity_type: "discount",
            entity_id: Some(model.id.to_string()),
            changes: Some(serde_json::json!({
                "product_id": model.product_id,
                "kind": model.kind,
                "value": model.value,
            })),
        },
    )
    .await;

    Ok(ApiResponse::success(
        "Discount created",
        discount_from_entity(model)?,
        Some(Meta::empty()),
    ))
}

pub async fn set_discount_active(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: SetDiscountActiveRequest,
) -> AppResult<ApiResponse<Discount>> {
    ensure_admin(user)?;
    let existing = Discounts::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Discount"))?;

    let mut active: ActiveModel = existing.into();
    active.is_active = Set(payload.is_active);
    let model = active.update(&state.orm).await?;

    log_audit_or_warn(
        &state.pool,
        AuditEntry {
            actor: Actor::from(user),
            action: "update",
            entity_type: "discount",
            entity_id: Some(model.id.to_string()),
            changes: Some(serde_json::json!({ "is_active": model.is_active })),
        },
    )
    .await;

    Ok(ApiResponse::success(
        "Discount updated",
        discount_from_entity(model)?,
        Some(Meta::empty()),
    ))
}

pub async fn delete_discount(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Deleted>> {
    ensure_admin(user)?;
    let result = Discounts::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Discount"));
    }

    log_audit_or_warn(
        &state.pool,
        AuditEntry {
            actor: Actor::from(user),
            action: "delete",
            entity_type: "discount",
            entity_id: Some(id.to_string()),
            changes: None,
        },
    )
    .await;

    Ok(ApiResponse::deleted(id))
}

fn validate_discount(payload: &CreateDiscountRequest) -> AppResult<()> {
    match payload.kind {
        DiscountKind::Percentage(p) if !(0..=100).contains(&p) => {
            return Err(AppError::BadRequest(
                "percentage discount must be between 0 and 100".into(),
            ));
        }
        DiscountKind::Fixed(amount) if amount < 0 => {
            return Err(AppError::BadRequest(
                "fixed discount must not be negative".into(),
            ));
        }
        _ => {}
    }

    if let (Some(start), Some(end)) = (payload.start_date, payload.end_date) {
        if start > end {
            return Err(AppError::BadRequest(
                "start_date must not be after end_date".into(),
            ));
        }
    }
    Ok(())
}

pub(crate) fn discount_from_entity(model: DiscountModel) -> AppResult<Discount> {
    let kind = DiscountKind::from_parts(&model.kind, model.value).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "discount {} has unknown kind '{}'",
            model.id,
            model.kind
        ))
    })?;

    Ok(Discount {
        id: model.id,
        product_id: model.product_id,
        kind,
        is_active: model.is_active,
        start_date: model.start_date.map(|dt| dt.with_timezone(&Utc)),
        end_date: model.end_date.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn request(kind: DiscountKind) -> CreateDiscountRequest {
        CreateDiscountRequest {
            product_id: Uuid::new_v4(),
            kind,
            start_date: None,
            end_date: None,
            is_active: None,
        }
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(validate_discount(&request(DiscountKind::Percentage(101))).is_err());
        assert!(validate_discount(&request(DiscountKind::Percentage(-1))).is_err());
        assert!(validate_discount(&request(DiscountKind::Fixed(-500))).is_err());
        assert!(validate_discount(&request(DiscountKind::Percentage(100))).is_ok());
        assert!(validate_discount(&request(DiscountKind::Fixed(0))).is_ok());
    }

    #[test]
    fn rejects_inverted_window() {
        let now = Utc::now();
        let mut req = request(DiscountKind::Fixed(1_000));
        req.start_date = Some(now);
        req.end_date = Some(now - Duration::days(1));
        assert!(matches!(validate_discount(&req), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn unknown_kind_is_an_internal_error() {
        let now = Utc::now();
        let model = DiscountModel {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            kind: "bogo".into(),
            value: 1,
            is_active: true,
            start_date: None,
            end_date: None,
            created_at: now.into(),
        };
        assert!(matches!(discount_from_entity(model), Err(AppError::Internal(_))));
    }
}
