//! Shelf application library
//!
//! Wires the document database, the application modules, and the HTTP server together.

pub mod modules;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use shelf_db::DocumentDatabase;
use shelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

/// Open the configured document database.
pub async fn connect(settings: &Settings) -> anyhow::Result<Arc<dyn DocumentDatabase>> {
    shelf_db::connect(
        settings.database.backend,
        &settings.database.connect_config(),
    )
    .await
    .context("failed to create document database client")
}

/// Registry holding every application module bound to `db`.
pub fn build_registry(settings: &Settings, db: &dyn DocumentDatabase) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, db, settings);
    registry
}

/// Complete HTTP application over an already opened database.
pub fn app(settings: &Settings, db: Arc<dyn DocumentDatabase>) -> Router {
    let registry = build_registry(settings, db.as_ref());
    shelf_http::build_router(&registry, db)
}

/// Verify the database answers a ping.
pub async fn check(settings: &Settings) -> anyhow::Result<()> {
    let db = connect(settings).await?;
    db.ping()
        .await
        .with_context(|| format!("{} database is unreachable", db.backend()))?;
    tracing::info!(backend = db.backend(), "database reachable");
    Ok(())
}

/// Apply every module migration, returning how many ran.
pub async fn migrate(settings: &Settings) -> anyhow::Result<usize> {
    let db = connect(settings).await?;
    let registry = build_registry(settings, db.as_ref());
    let applied = registry.apply_migrations(db.as_ref()).await?;
    tracing::info!(applied, "migrations applied");
    Ok(applied)
}

/// Run the service until a shutdown signal arrives.
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let db = connect(&settings).await?;
    db.ping()
        .await
        .with_context(|| format!("{} database is unreachable", db.backend()))?;
    tracing::info!(backend = db.backend(), "database connected");

    let registry = build_registry(&settings, db.as_ref());
    let ctx = InitCtx {
        settings: &settings,
        db: db.as_ref(),
    };

    registry.init_modules(&ctx).await?;
    if settings.database.apply_migrations_on_start {
        let applied = registry.apply_migrations(db.as_ref()).await?;
        tracing::info!(applied, "migrations applied");
    }
    registry.start_modules(&ctx).await?;

    let served = shelf_http::start_server(&registry, &settings, db.clone()).await;

    registry.stop_modules().await?;
    served
}
