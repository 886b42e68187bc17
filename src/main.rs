use anyhow::{Context, Result};
use axum::Router;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use wedding_store::{
    config::{AppConfig, Mode},
    handlers::GatewayState,
    routes,
    services::{AppContext, diagnostics, notifier::Notifier},
    storage::remote::RemoteClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + run mode ---
    let (cfg, mode) = AppConfig::from_env_and_args()?;

    tracing::info!(
        addr = %cfg.addr(),
        local_dir = %cfg.local_dir,
        remote_path = %cfg.remote_path(),
        remote_configured = cfg.database_url.is_some(),
        gateway_configured = cfg.gateway_url.is_some(),
        "Starting wedding-store"
    );

    // --- Ensure local cache directory exists ---
    if !Path::new(&cfg.local_dir).exists() {
        fs::create_dir_all(&cfg.local_dir)?;
        tracing::info!("Created local cache directory at {}", cfg.local_dir);
    }
    if let Some(url) = cfg.database_url.as_deref() {
        ensure_sqlite_parent(url)?;
    }

    match mode {
        Mode::Migrate => run_migrations(&cfg).await,
        Mode::Diagnose => run_diagnostics(&cfg).await,
        Mode::Serve => serve(&cfg).await,
    }
}

/// Apply the schema to the configured datastore and exit.
async fn run_migrations(cfg: &AppConfig) -> Result<()> {
    let url = cfg
        .database_url
        .as_deref()
        .context("--migrate needs WEDDING_DATABASE_URL or --database-url")?;
    let remote = RemoteClient::connect_url(url)
        .await
        .with_context(|| format!("connecting to {}", url))?;
    let applied = remote.migrate().await?;
    remote.close().await;
    tracing::info!(statements = applied, "Database migration complete.");
    Ok(())
}

/// Probe every backend, print the report as JSON and exit non-zero when
/// something configured is failing.
async fn run_diagnostics(cfg: &AppConfig) -> Result<()> {
    let ctx = AppContext::from_config(cfg).await?;
    let report = diagnostics::run(&ctx).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.healthy() {
        anyhow::bail!("one or more storage backends failed");
    }
    Ok(())
}

async fn serve(cfg: &AppConfig) -> Result<()> {
    let ctx = Arc::new(AppContext::from_config(cfg).await?);
    if let Some(remote) = &ctx.remote {
        // Fresh datastores become usable without a separate --migrate run.
        remote.migrate().await?;
    }
    let webhook = cfg
        .notify_webhook
        .as_deref()
        .map(|url| Notifier::new(url, cfg.remote_timeout))
        .transpose()?;

    // --- Build router ---
    let app: Router = routes::routes::routes(GatewayState::new(ctx, webhook));

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Gateway listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the parent directory of a file-backed SQLite URL.
fn ensure_sqlite_parent(url: &str) -> Result<()> {
    if !url.starts_with("sqlite:") || url.contains(":memory:") {
        return Ok(());
    }
    let db_path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }
    Ok(())
}
