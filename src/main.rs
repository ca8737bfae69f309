use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use warden::model::NewPermission;
use warden::store::{MemoryStore, PermissionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let http_port: u16 = std::env::var("WARDEN_HTTP_PORT")
        .unwrap_or_else(|_| "7878".to_string())
        .parse()
        .unwrap_or(7878);
    info!(
        target: "warden",
        "warden starting: RUST_LOG='{}', http_port={}",
        rust_log, http_port
    );

    let store = Arc::new(MemoryStore::new());
    seed_bootstrap_admin(store.as_ref()).await?;

    warden::server::run_with_port(http_port, store).await
}

/// First-run convenience: a `warden` admin user holding the full wildcard,
/// so the management endpoints are reachable before any real grants exist.
async fn seed_bootstrap_admin(store: &MemoryStore) -> anyhow::Result<()> {
    let admin = store.add_user("warden", "Warden Admin");
    let wildcard = store
        .create_permission(NewPermission {
            identifier: "*".into(),
            name: "Super admin".into(),
            description: Some("matches every permission".into()),
            category: "system".into(),
            active: true,
        })
        .await?;
    store
        .upsert_user_permission(&admin.id, &wildcard.id, &admin.id, None)
        .await?;
    info!(target: "warden", "seeded bootstrap admin user_id={}", admin.id);
    Ok(())
}
