use aquavo_api::{
    config::AppConfig,
    db::{create_pool, orm_from_pool, run_migrations},
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    middleware::auth::{ROLE_ADMIN, ROLE_CUSTOMER},
    services::auth_service::issue_token,
};
use chrono::{Duration, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;
    let orm = orm_from_pool(&pool);

    let admin_id = ensure_user(&orm, "admin@aquavo.iq", ROLE_ADMIN).await?;
    let customer_id = ensure_user(&orm, "customer@aquavo.iq", ROLE_CUSTOMER).await?;
    seed_products(&pool).await?;
    seed_coupons(&pool).await?;

    let ttl = Duration::days(30);
    let admin_token = issue_token(&config.jwt_secret, admin_id, ROLE_ADMIN, ttl)?;
    let customer_token = issue_token(&config.jwt_secret, customer_id, ROLE_CUSTOMER, ttl)?;

    println!("Seed completed.");
    println!("Admin    {admin_id}\n  Bearer {admin_token}");
    println!("Customer {customer_id}\n  Bearer {customer_token}");
    Ok(())
}

async fn ensure_user(orm: &DatabaseConnection, email: &str, role: &str) -> anyhow::Result<Uuid> {
    if let Some(existing) = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(orm)
        .await?
    {
        let mut active: UserActive = existing.into();
        active.role = Set(role.to_string());
        let user = active.update(orm).await?;
        return Ok(user.id);
    }

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        role: Set(role.to_string()),
        created_at: NotSet,
    }
    .insert(orm)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user.id)
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = vec![
        ("حوض زجاجي 60 لتر", "أحواض", "حوض بانورامي مع غطاء وإضاءة LED", 35_000, Some(40_000), 12),
        ("فلتر خارجي 1000 لتر/ساعة", "فلاتر", "فلتر كانستر بثلاث مراحل", 30_000, None, 25),
        ("سخان 100 واط", "سخانات", "سخان قابل للضبط مع ترموستات", 15_000, None, 40),
        ("طعام أسماك استوائية 250 غ", "طعام", "رقائق متوازنة للأسماك الاستوائية", 5_000, None, 120),
        ("نيون تترا (10 قطع)", "أسماك", "سمك نيون تترا صغير الحجم", 12_000, None, 4),
    ];

    for (name, category, desc, price, original_price, stock) in products {
        let id = Uuid::new_v4();
        let inserted = sqlx::query(
            r#"
            INSERT INTO products (id, name, category, description, price, original_price, stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(category)
        .bind(desc)
        .bind(price as i64)
        .bind(original_price.map(|p: i32| p as i64))
        .bind(stock)
        .execute(pool)
        .await?;

        if inserted.rows_affected() == 1 {
            sqlx::query(
                "INSERT INTO price_history (id, product_id, price, stock) VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(price as i64)
            .bind(stock)
            .execute(pool)
            .await?;
        }
    }

    println!("Seeded products");
    Ok(())
}

async fn seed_coupons(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let now = Utc::now();
    let coupons = vec![
        ("SAVE20", "percentage", 20_i64, Some(50_000_i64), Some(100_i32), now + Duration::days(90)),
        ("WELCOME5000", "fixed", 5_000, None, None, now + Duration::days(365)),
        ("FREESHIP", "free_shipping", 0, Some(25_000), Some(500), now + Duration::days(30)),
    ];

    for (code, kind, value, min_order_amount, max_uses, end_date) in coupons {
        sqlx::query(
            r#"
            INSERT INTO coupons (id, code, kind, value, min_order_amount, max_uses, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(code)
        .bind(kind)
        .bind(value)
        .bind(min_order_amount)
        .bind(max_uses)
        .bind(now)
        .bind(end_date)
        .execute(pool)
        .await?;
    }

    println!("Seeded coupons");
    Ok(())
}
