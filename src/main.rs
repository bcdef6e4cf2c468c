use std::{net::SocketAddr, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inkwell_blog::{
    config::Config,
    routes,
    services::{Database, DynStore, MemoryStore},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 初始化日志
    let filter = tracing_subscriber::EnvFilter::new(&config.log_level);
    if config.log_format == "json" || config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting Inkwell blog service...");

    // 初始化存储
    let store: DynStore = if config.uses_memory_store() {
        info!("Using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        let db = match Database::connect(&config).await {
            Ok(db) => db,
            Err(e) => {
                error!("Failed to create database connection: {}", e);
                return Err(anyhow::anyhow!("Database initialization failed"));
            }
        };
        Arc::new(db)
    };

    if let Err(e) = store.ping().await {
        error!("Store is not reachable: {}", e);
        return Err(anyhow::anyhow!("Store connection failed"));
    }

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let app_state = Arc::new(AppState::new(config, store));
    let app = routes::app(app_state);

    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr.parse()?)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    Ok(())
}
