use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::dto::products::{CreateProductRequest, ProductList, ProductView, UpdateProductRequest};
use crate::{
    audit::{AuditEntry, log_audit_or_warn},
    context::Actor,
    entity::discounts::{Column as DiscountCol, Entity as Discounts},
    entity::products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Discount, Product},
    pricing::discount::effective_price,
    response::{ApiResponse, Deleted, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    services::{discount_service::discount_from_entity, pricing_service::record_price_history},
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(category) = query.category.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Column::Category.eq(category.clone()));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
        ProductSortBy::Stock => Column::Stock,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let products: Vec<Product> = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let now = Utc::now();
    let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
    let mut discounts = discounts_by_product(&state.orm, &ids).await?;
    let items = products
        .into_iter()
        .map(|product| {
            let product_discounts = discounts.remove(&product.id).unwrap_or_default();
            product_view(product, &product_discounts, now)
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductView>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(product_from_entity)
        .ok_or_else(|| AppError::not_found("Product"))?;

    let discounts = discounts_by_product(&state.orm, &[id])
        .await?
        .remove(&id)
        .unwrap_or_default();
    Ok(ApiResponse::success(
        "Product",
        product_view(product, &discounts, Utc::now()),
        None,
    ))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    validate_product_fields(
        Some(&payload.name),
        Some(&payload.category),
        Some(payload.price),
        payload.original_price,
        Some(payload.stock),
    )?;

    let txn = state.orm.begin().await?;
    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_string()),
        category: Set(payload.category.trim().to_string()),
        description: Set(payload.description),
        price: Set(payload.price),
        original_price: Set(payload.original_price),
        stock: Set(payload.stock),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;
    record_price_history(&txn, product.id, product.price, product.stock).await?;
    txn.commit().await?;

    log_audit_or_warn(
        &state.pool,
        AuditEntry {
            actor: Actor::from(user),
            action: "create",
            entity_type: "product",
            entity_id: Some(product.id.to_string()),
            changes: Some(serde_json::json!({ "price": product.price, "stock": product.stock })),
        },
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    validate_product_fields(
        payload.name.as_ref(),
        payload.category.as_ref(),
        payload.price,
        payload.original_price,
        payload.stock,
    )?;

    let txn = state.orm.begin().await?;
    let existing = Products::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    let old_price = existing.price;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(category) = payload.category {
        active.category = Set(category.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(original_price) = payload.original_price {
        active.original_price = Set(Some(original_price));
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&txn).await?;
    if product.price != old_price {
        record_price_history(&txn, product.id, product.price, product.stock).await?;
    }
    txn.commit().await?;

    log_audit_or_warn(
        &state.pool,
        AuditEntry {
            actor: Actor::from(user),
            action: "update",
            entity_type: "product",
            entity_id: Some(product.id.to_string()),
            changes: Some(serde_json::json!({
                "old_price": old_price,
                "price": product.price,
                "stock": product.stock,
            })),
        },
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Deleted>> {
    ensure_admin(user)?;
    let result = Products::delete_by_id(id)
        .exec(&state.orm)
        .await
        .map_err(|err| match err.sql_err() {
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                AppError::Conflict("product has orders and cannot be deleted".into())
            }
            _ => AppError::OrmError(err),
        })?;

    if result.rows_affected == 0 {
        return Err(AppError::not_found("Product"));
    }

    log_audit_or_warn(
        &state.pool,
        AuditEntry {
            actor: Actor::from(user),
            action: "delete",
            entity_type: "product",
            entity_id: Some(id.to_string()),
            changes: None,
        },
    )
    .await;

    Ok(ApiResponse::deleted(id))
}

/// All discount rows for `product_ids`, grouped per product. Activity is
/// decided later against the caller's clock.
pub(crate) async fn discounts_by_product<C: ConnectionTrait>(
    conn: &C,
    product_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Vec<Discount>>> {
    if product_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = Discounts::find()
        .filter(DiscountCol::ProductId.is_in(product_ids.iter().copied()))
        .filter(DiscountCol::IsActive.eq(true))
        .order_by_desc(DiscountCol::CreatedAt)
        .all(conn)
        .await?;

    let mut grouped: HashMap<Uuid, Vec<Discount>> = HashMap::new();
    for row in rows {
        let discount = discount_from_entity(row)?;
        grouped.entry(discount.product_id).or_default().push(discount);
    }
    Ok(grouped)
}

pub(crate) fn product_view(product: Product, discounts: &[Discount], now: DateTime<Utc>) -> ProductView {
    let (effective_price, applied) = effective_price(product.price, discounts, now);
    ProductView {
        effective_price,
        active_discount: applied.cloned(),
        product,
    }
}

fn validate_product_fields(
    name: Option<&String>,
    category: Option<&String>,
    price: Option<i64>,
    original_price: Option<i64>,
    stock: Option<i32>,
) -> AppResult<()> {
    if name.is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("name must not be empty".into()));
    }
    if category.is_some_and(|c| c.trim().is_empty()) {
        return Err(AppError::BadRequest("category must not be empty".into()));
    }
    if price.is_some_and(|p| p < 0) || original_price.is_some_and(|p| p < 0) {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }
    if stock.is_some_and(|s| s < 0) {
        return Err(AppError::BadRequest("stock must not be negative".into()));
    }
    Ok(())
}

pub(crate) fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        name: model.name,
        category: model.category,
        description: model.description,
        price: model.price,
        original_price: model.original_price,
        stock: model.stock,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::DiscountKind;

    fn product(price: i64) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            name: "Neon Tetra".into(),
            category: "أسماك".into(),
            description: None,
            price,
            original_price: None,
            stock: 12,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn view_applies_current_discount() {
        let now = Utc::now();
        let p = product(2_000);
        let discount = Discount {
            id: Uuid::new_v4(),
            product_id: p.id,
            kind: DiscountKind::Percentage(25),
            is_active: true,
            start_date: Some(now - Duration::days(1)),
            end_date: Some(now + Duration::days(1)),
            created_at: now - Duration::days(1),
        };
        let view = product_view(p, &[discount], now);
        assert_eq!(view.effective_price, 1_500);
        assert!(view.active_discount.is_some());
    }

    #[test]
    fn negative_fields_are_rejected() {
        assert!(validate_product_fields(None, None, Some(-1), None, None).is_err());
        assert!(validate_product_fields(None, None, None, None, Some(-3)).is_err());
        assert!(validate_product_fields(Some(&" ".to_string()), None, None, None, None).is_err());
        assert!(validate_product_fields(None, None, Some(0), Some(10), Some(0)).is_ok());
    }
}
