use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{AuditEntry, record_audit},
    context::Actor,
    db::DbPool,
    dto::pricing::{
        ApplyPricesRequest, ApplyPricesResult, ProductSuggestion, SuggestionList,
        SuggestionRequest, TrendReport,
    },
    entity::{
        price_history::{ActiveModel as HistoryActive, Column as HistoryCol, Entity as PriceHistory},
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    pricing::{
        suggestion::{PricingRules, SuggestionInput, suggest_price},
        trend::{MIN_TREND_SAMPLES, analyze_trend},
    },
    response::{ApiResponse, Meta},
    routes::params::TrendQuery,
    services::product_service::product_from_entity,
    state::AppState,
};

const DEFAULT_TREND_DAYS: i64 = 30;
const MAX_BATCH: usize = 200;

/// Suggestion for a single product. `data` is `null` when the product is
/// out of stock.
pub async fn suggest_for_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Option<ProductSuggestion>>> {
    ensure_admin(user)?;
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    let now = Utc::now();
    let rules = &state.config.pricing;
    let demand = units_sold(&state.pool, &[id], rules, now).await?;
    let suggestion = build_suggestion(&product, demand.as_ref(), rules, now);

    let message = if suggestion.is_some() {
        "Suggestion"
    } else {
        "No suggestion for out of stock product"
    };
    Ok(ApiResponse::success(message, suggestion, None))
}

/// Suggestions for many products at once. Unknown ids, out of stock products
/// and suggestions below the configured minimum change are left out.
#[tracing::instrument(skip_all, fields(requested = payload.product_ids.len()))]
pub async fn suggest_batch(
    state: &AppState,
    user: &AuthUser,
    payload: SuggestionRequest,
) -> AppResult<ApiResponse<SuggestionList>> {
    ensure_admin(user)?;
    if payload.product_ids.len() > MAX_BATCH {
        return Err(AppError::BadRequest(format!(
            "at most {MAX_BATCH} products per request"
        )));
    }

    let mut ids = payload.product_ids;
    ids.sort_unstable();
    ids.dedup();

    let products = Products::find()
        .filter(ProdCol::Id.is_in(ids.iter().copied()))
        .order_by_asc(ProdCol::Name)
        .all(&state.orm)
        .await?;

    let now = Utc::now();
    let rules = &state.config.pricing;
    let demand = units_sold(&state.pool, &ids, rules, now).await?;

    let suggestions: Vec<ProductSuggestion> = products
        .iter()
        .filter_map(|product| build_suggestion(product, demand.as_ref(), rules, now))
        .filter(|s| rules.is_significant(&s.suggestion))
        .collect();

    tracing::debug!(
        found = products.len(),
        suggested = suggestions.len(),
        "price suggestions computed"
    );

    let count = suggestions.len();
    Ok(ApiResponse::success(
        "Suggestions",
        SuggestionList { suggestions, count },
        Some(Meta::count(count)),
    ))
}

/// Set new list prices in one transaction, each with a history row.
pub async fn apply_prices(
    state: &AppState,
    user: &AuthUser,
    payload: ApplyPricesRequest,
) -> AppResult<ApiResponse<ApplyPricesResult>> {
    ensure_admin(user)?;
    if payload.updates.is_empty() {
        return Err(AppError::BadRequest("no price updates given".into()));
    }
    if let Some(bad) = payload.updates.iter().find(|u| u.price < 0) {
        return Err(AppError::BadRequest(format!(
            "price for product {} must not be negative",
            bad.id
        )));
    }

    let txn = state.orm.begin().await?;
    let mut products = Vec::with_capacity(payload.updates.len());
    let mut changes = Vec::with_capacity(payload.updates.len());

    for update in &payload.updates {
        let existing = Products::find_by_id(update.id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Product {}", update.id)))?;
        let old_price = existing.price;

        let mut active: ProductActive = existing.into();
        active.price = Set(update.price);
        active.updated_at = Set(Utc::now().into());
        let product = active.update(&txn).await?;

        record_price_history(&txn, product.id, product.price, product.stock).await?;
        changes.push(serde_json::json!({
            "product_id": product.id,
            "old_price": old_price,
            "new_price": product.price,
        }));
        products.push(product_from_entity(product));
    }

    record_audit(
        &txn,
        AuditEntry {
            actor: Actor::from(user),
            action: "apply_prices",
            entity_type: "product",
            entity_id: None,
            changes: Some(serde_json::Value::Array(changes)),
        },
    )
    .await?;

    txn.commit().await?;
    tracing::info!(updated = products.len(), "prices applied");

    Ok(ApiResponse::success(
        "Prices updated",
        ApplyPricesResult {
            updated: products.len(),
            products,
        },
        Some(Meta::empty()),
    ))
}

pub async fn price_trend(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    query: TrendQuery,
) -> AppResult<ApiResponse<TrendReport>> {
    ensure_admin(user)?;
    if Products::find_by_id(id).one(&state.orm).await?.is_none() {
        return Err(AppError::not_found("Product"));
    }

    let days = query.days.unwrap_or(DEFAULT_TREND_DAYS).clamp(1, 365);
    let since = Utc::now() - Duration::days(days);

    let prices: Vec<i64> = PriceHistory::find()
        .filter(HistoryCol::ProductId.eq(id))
        .filter(HistoryCol::CreatedAt.gte(since))
        .order_by_asc(HistoryCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|row| row.price)
        .collect();

    let trend = analyze_trend(&prices).ok_or_else(|| {
        AppError::not_found(format!(
            "Price history with at least {MIN_TREND_SAMPLES} points"
        ))
    })?;

    Ok(ApiResponse::success(
        "Trend",
        TrendReport {
            product_id: id,
            days,
            trend,
        },
        None,
    ))
}

pub(crate) async fn record_price_history<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    price: i64,
    stock: i32,
) -> AppResult<()> {
    HistoryActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        price: Set(price),
        stock: Set(stock),
        created_at: NotSet,
    }
    .insert(conn)
    .await?;
    Ok(())
}

/// Units sold per product over the demand window, counting every order that
/// was not cancelled. `None` when the store has no such orders at all, so the
/// heuristic does not read an empty store as low demand.
async fn units_sold(
    pool: &DbPool,
    product_ids: &[Uuid],
    rules: &PricingRules,
    now: DateTime<Utc>,
) -> AppResult<Option<HashMap<Uuid, i64>>> {
    let since = now - Duration::days(rules.demand_window_days);

    let (has_orders,): (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM orders WHERE status <> 'cancelled' AND created_at >= $1)",
    )
    .bind(since)
    .fetch_one(pool)
    .await?;

    if !has_orders {
        return Ok(None);
    }

    let rows: Vec<(Uuid, i64)> = sqlx::query_as(
        r#"
        SELECT oi.product_id, COALESCE(SUM(oi.quantity), 0)::BIGINT
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        WHERE o.status <> 'cancelled'
          AND o.created_at >= $1
          AND oi.product_id = ANY($2)
        GROUP BY oi.product_id
        "#,
    )
    .bind(since)
    .bind(product_ids)
    .fetch_all(pool)
    .await?;

    Ok(Some(rows.into_iter().collect()))
}

fn build_suggestion(
    product: &ProductModel,
    demand: Option<&HashMap<Uuid, i64>>,
    rules: &PricingRules,
    now: DateTime<Utc>,
) -> Option<ProductSuggestion> {
    let units_sold = demand.map(|d| d.get(&product.id).copied().unwrap_or(0));
    let input = SuggestionInput {
        price: product.price,
        stock: product.stock,
        category: &product.category,
        units_sold,
        now,
    };

    suggest_price(&input, rules).map(|suggestion| ProductSuggestion {
        product_id: product.id,
        name: product.name.clone(),
        category: product.category.clone(),
        stock: product.stock,
        units_sold,
        suggestion,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::pricing::suggestion::SuggestionReason;

    fn product(stock: i32) -> ProductModel {
        let now = Utc::now();
        ProductModel {
            id: Uuid::new_v4(),
            name: "Fluval 407".into(),
            category: "فلاتر".into(),
            description: None,
            price: 200_000,
            original_price: None,
            stock,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn missing_demand_entry_counts_as_zero_units() {
        let p = product(30);
        let demand = HashMap::new();
        let april = Utc.with_ymd_and_hms(2025, 4, 10, 0, 0, 0).unwrap();
        let s = build_suggestion(&p, Some(&demand), &PricingRules::default(), april).unwrap();
        assert_eq!(s.units_sold, Some(0));
        assert_eq!(s.suggestion.reason_code, SuggestionReason::LowDemand);
    }

    #[test]
    fn no_sales_data_skips_demand_rules() {
        let p = product(30);
        let july = Utc.with_ymd_and_hms(2025, 7, 10, 0, 0, 0).unwrap();
        let s = build_suggestion(&p, None, &PricingRules::default(), july).unwrap();
        assert_eq!(s.units_sold, None);
        assert_eq!(s.suggestion.reason_code, SuggestionReason::Seasonal);
        assert_eq!(s.suggestion.suggested_price, 240_000);
    }

    #[test]
    fn out_of_stock_is_skipped() {
        let now = Utc::now();
        assert!(build_suggestion(&product(0), None, &PricingRules::default(), now).is_none());
    }
}
