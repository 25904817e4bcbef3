use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{AuditEntry, record_audit},
    context::CheckoutContext,
    dto::orders::{CheckoutItem, CheckoutRequest, CustomerInfo, OrderList, OrderWithItems},
    entity::{
        coupons::{Column as CouponCol, Entity as Coupons},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
        },
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Coupon, Order, OrderItem, OrderStatus},
    pricing::{
        coupon::{CouponRejection, normalize_code, validate_coupon},
        discount::effective_price,
        totals::{PricedLine, assemble, subtotal},
    },
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{coupon_service::find_by_code, product_service::discounts_by_product},
    state::AppState,
};

/// Price a cart and persist it as an order.
///
/// Everything from loading products to redeeming the coupon runs in one
/// transaction. Stock and coupon usage are claimed with conditional updates,
/// so a concurrent checkout that got there first turns into `OutOfStock` or
/// an exhausted coupon here and the whole order is rolled back.
#[tracing::instrument(skip_all, fields(actor = %ctx.actor.audit_id()))]
pub async fn checkout(
    state: &AppState,
    ctx: &CheckoutContext,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    validate_customer(&payload.customer)?;
    let quantities = merge_items(&payload.items)?;
    let coupon_code = payload
        .coupon_code
        .as_deref()
        .map(normalize_code)
        .filter(|code| !code.is_empty());

    let txn = state.orm.begin().await?;

    let ids: Vec<Uuid> = quantities.keys().copied().collect();
    let products = Products::find()
        .filter(ProdCol::Id.is_in(ids.iter().copied()))
        .all(&txn)
        .await?;
    let mut discounts = discounts_by_product(&txn, &ids).await?;

    let mut lines = Vec::with_capacity(quantities.len());
    for (&product_id, &quantity) in &quantities {
        let product = products
            .iter()
            .find(|p| p.id == product_id)
            .ok_or_else(|| AppError::not_found(format!("Product {product_id}")))?;
        if product.stock < quantity {
            return Err(AppError::OutOfStock {
                product_id,
                requested: quantity,
            });
        }

        let product_discounts = discounts.remove(&product_id).unwrap_or_default();
        let (unit_price, _) = effective_price(product.price, &product_discounts, ctx.now);
        lines.push(PricedLine {
            product_id,
            quantity,
            unit_price,
        });
    }

    let line_subtotal = subtotal(&lines)?;
    let coupon: Option<Coupon> = match &coupon_code {
        Some(code) => {
            let found = find_by_code(&txn, code).await?;
            match validate_coupon(found.as_ref(), line_subtotal, ctx.now) {
                Ok(coupon) => Some(coupon.clone()),
                Err(rejection) => {
                    tracing::info!(code = %code, reason = rejection.code(), "coupon rejected");
                    return Err(rejection.into());
                }
            }
        }
        None => None,
    };

    let totals = assemble(&lines, coupon.as_ref().map(|c| &c.kind), ctx.shipping_fee)?;

    let order_id = Uuid::new_v4();
    let order_number = payload
        .order_number
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| build_order_number(order_id, ctx.now));

    let order = OrderActive {
        id: Set(order_id),
        order_number: Set(order_number.clone()),
        user_id: Set(ctx.actor.user_id()),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        subtotal: Set(totals.subtotal),
        discount_amount: Set(totals.discount_amount),
        shipping_fee: Set(totals.shipping_fee),
        total: Set(totals.total),
        coupon_code: Set(coupon.as_ref().map(|c| c.code.clone())),
        customer_name: Set(payload.customer.name.trim().to_string()),
        customer_phone: Set(payload.customer.phone.trim().to_string()),
        shipping_address: Set(payload.customer.address.trim().to_string()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await
    .map_err(|err| duplicate_order_number(err, &order_number))?;

    let mut items = Vec::with_capacity(lines.len());
    for line in &lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            price_at_purchase: Set(line.unit_price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(order_item_from_entity(item));

        try_decrement_stock(&txn, line.product_id, line.quantity, ctx.now).await?;
    }

    if let Some(coupon) = &coupon {
        try_redeem_coupon(&txn, coupon.id).await?;
    }

    record_audit(
        &txn,
        AuditEntry {
            actor: ctx.actor,
            action: "create",
            entity_type: "order",
            entity_id: Some(order.id.to_string()),
            changes: Some(serde_json::json!({
                "total": totals.total,
                "items": lines.len(),
                "coupon": coupon.as_ref().map(|c| c.code.as_str()),
            })),
        },
    )
    .await?;

    txn.commit().await?;

    tracing::info!(
        order_number = %order.order_number,
        subtotal = totals.subtotal,
        discount = totals.discount_amount,
        total = totals.total,
        "order placed"
    );

    Ok(ApiResponse::success(
        "Order placed",
        OrderWithItems {
            order: order_from_entity(order)?,
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Claim `quantity` units. Fails without touching the row when another
/// checkout already took the stock.
async fn try_decrement_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let result = Products::update_many()
        .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(quantity))
        .col_expr(ProdCol::UpdatedAt, Expr::value(now))
        .filter(ProdCol::Id.eq(product_id))
        .filter(ProdCol::Stock.gte(quantity))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::OutOfStock {
            product_id,
            requested: quantity,
        });
    }
    Ok(())
}

async fn try_redeem_coupon<C: ConnectionTrait>(conn: &C, coupon_id: Uuid) -> AppResult<()> {
    let result = Coupons::update_many()
        .col_expr(
            CouponCol::UsedCount,
            Expr::col(CouponCol::UsedCount).add(1),
        )
        .filter(CouponCol::Id.eq(coupon_id))
        .filter(
            Condition::any()
                .add(CouponCol::MaxUses.is_null())
                .add(Expr::col(CouponCol::UsedCount).lt(Expr::col(CouponCol::MaxUses))),
        )
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(CouponRejection::Exhausted.into());
    }
    Ok(())
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;

    let data = with_items(&state.orm, order).await?;
    Ok(ApiResponse::success("OK", data, Some(Meta::empty())))
}

/// Public lookup by the number printed on the receipt.
pub async fn track_order(
    state: &AppState,
    order_number: &str,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(OrderCol::OrderNumber.eq(order_number.trim()))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;

    let data = with_items(&state.orm, order).await?;
    Ok(ApiResponse::success("OK", data, Some(Meta::empty())))
}

pub(crate) async fn with_items<C: ConnectionTrait>(
    conn: &C,
    order: OrderModel,
) -> AppResult<OrderWithItems> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(conn)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(OrderWithItems {
        order: order_from_entity(order)?,
        items,
    })
}

fn validate_customer(customer: &CustomerInfo) -> AppResult<()> {
    if customer.name.trim().is_empty()
        || customer.phone.trim().is_empty()
        || customer.address.trim().is_empty()
    {
        return Err(AppError::BadRequest(
            "customer name, phone and address are required".into(),
        ));
    }
    Ok(())
}

/// Collapse repeated product ids into one line each.
fn merge_items(items: &[CheckoutItem]) -> AppResult<BTreeMap<Uuid, i32>> {
    if items.is_empty() {
        return Err(AppError::BadRequest("order has no items".into()));
    }

    let mut merged = BTreeMap::new();
    for item in items {
        if item.quantity <= 0 {
            return Err(AppError::BadRequest(format!(
                "quantity for product {} must be positive",
                item.product_id
            )));
        }
        let entry: &mut i32 = merged.entry(item.product_id).or_insert(0);
        *entry = entry
            .checked_add(item.quantity)
            .ok_or_else(|| AppError::BadRequest("quantity is too large".into()))?;
    }
    Ok(merged)
}

fn duplicate_order_number(err: DbErr, order_number: &str) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict(format!("order number {order_number} already exists"))
        }
        _ => AppError::OrmError(err),
    }
}

pub(crate) fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    let status = model
        .status
        .parse::<OrderStatus>()
        .map_err(|err| AppError::Internal(anyhow::anyhow!(err)))?;

    Ok(Order {
        id: model.id,
        order_number: model.order_number,
        user_id: model.user_id,
        status,
        subtotal: model.subtotal,
        discount_amount: model.discount_amount,
        shipping_fee: model.shipping_fee,
        total: model.total,
        coupon_code: model.coupon_code,
        customer_name: model.customer_name,
        customer_phone: model.customer_phone,
        shipping_address: model.shipping_address,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

pub(crate) fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        price_at_purchase: model.price_at_purchase,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn build_order_number(order_id: Uuid, now: DateTime<Utc>) -> String {
    let date = now.format("%Y%m%d");
    let suffix = order_id.simple().to_string().to_uppercase();
    format!("AQ-{}-{}", date, &suffix[..8])
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn item(product_id: Uuid, quantity: i32) -> CheckoutItem {
        CheckoutItem {
            product_id,
            quantity,
        }
    }

    #[test]
    fn duplicate_lines_are_merged() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let merged = merge_items(&[item(a, 1), item(b, 2), item(a, 3)]).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[&a], 4);
        assert_eq!(merged[&b], 2);
    }

    #[test]
    fn empty_or_non_positive_lines_are_rejected() {
        assert!(matches!(merge_items(&[]), Err(AppError::BadRequest(_))));
        assert!(merge_items(&[item(Uuid::new_v4(), 0)]).is_err());
        assert!(merge_items(&[item(Uuid::new_v4(), -2)]).is_err());
    }

    #[test]
    fn customer_fields_are_required() {
        let customer = CustomerInfo {
            name: "علي".into(),
            phone: " ".into(),
            address: "بغداد".into(),
        };
        assert!(validate_customer(&customer).is_err());
    }

    #[test]
    fn order_number_format() {
        let id = Uuid::parse_str("6f1c2a3b-0000-4000-8000-000000000000").unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap();
        assert_eq!(build_order_number(id, now), "AQ-20250309-6F1C2A3B");
    }
}
