//! Formcraft API server binary.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use formcraft_core::TenantFeatures;
use formcraft_server::rate_limit::prune_task;
use formcraft_server::{create_router, AppState, Args, Command, ServerConfig};
use formcraft_store::{seed_system_templates, PgConfig, PgStore, TenantRepository};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from(&args);
    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => {
            let store = connect(&config).await?;
            store.migrate().await?;
            info!("Migrations applied");
            Ok(())
        }
        Command::Seed => {
            let store = connect(&config).await?;
            store.migrate().await?;
            let report = seed_system_templates(&store).await?;
            info!(inserted = report.inserted, skipped = report.skipped, "System templates seeded");
            Ok(())
        }
        Command::SetPlan {
            tenant,
            plan,
            clear_overrides,
        } => {
            let store = connect(&config).await?;
            let mut record = store
                .find_tenant_by_slug(&tenant)
                .await?
                .ok_or_else(|| anyhow::anyhow!("no tenant with slug {tenant}"))?;
            let from = record.plan;
            record.plan = plan;
            if clear_overrides {
                record.features = TenantFeatures::default();
            }
            record.updated_at = Utc::now();
            store.update_tenant(&record).await?;
            info!(tenant_id = %record.id, %from, to = %plan, clear_overrides, "Plan changed");
            Ok(())
        }
    }
}

async fn connect(config: &ServerConfig) -> anyhow::Result<PgStore> {
    let pg = PgConfig::new(config.database_url()?)
        .with_max_connections(config.db_max_connections)
        .with_acquire_timeout(config.db_acquire_timeout);
    Ok(PgStore::connect(&pg).await?)
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    config.validate_for_serve()?;
    info!(listen = %config.listen_addr, export_dir = %config.export_dir.display(), "Starting Formcraft API");

    let store = connect(&config).await?;
    store.migrate().await?;

    tokio::fs::create_dir_all(&config.export_dir).await?;

    let state = AppState::new(Arc::new(store), config.clone());

    let limiter = state.limiter.clone();
    tokio::spawn(async move {
        prune_task(limiter, Duration::from_secs(60)).await;
    });

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Formcraft API listening on {}", config.listen_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
