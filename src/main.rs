use std::net::{IpAddr, SocketAddr};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aquavo_api::{app::build_app, config::AppConfig, db::run_migrations, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,aquavo_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let addr = SocketAddr::from((config.host.parse::<IpAddr>()?, config.port));
    tracing::info!(
        shipping_fee = config.shipping_fee,
        pricing = ?config.pricing,
        "configuration loaded"
    );

    let state = AppState::connect(config).await?;
    run_migrations(&state.pool).await?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, docs = "/docs", "aquavo api listening");
    axum::serve(listener, build_app(state)).await?;

    Ok(())
}
