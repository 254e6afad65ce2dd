mod config;

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use wander_api::auth::hash_password;
use wander_api::validate::{check_password, normalize_email};
use wander_api::{AppState, AppStateInner};
use wander_db::Database;
use wander_types::models::Role;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "wander_server=debug,wander_api=debug,wander_db=debug,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    let db = Database::open(&config.db_path)?;
    if let Some((email, password)) = &config.admin {
        bootstrap_admin(&db, email, password)?;
    }

    let state: AppState = Arc::new(AppStateInner {
        token_ttl: config.token_ttl,
        cookie_secure: config.cookie_secure,
        ..AppStateInner::new(db, config.jwt_secret)
    });

    let app = wander_api::router(state);

    info!("Wander server listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Creates the configured admin account unless that email is already taken.
fn bootstrap_admin(db: &Database, email: &str, password: &str) -> anyhow::Result<()> {
    let email = normalize_email(email)?;
    if let Some(existing) = db.get_user_by_email(&email)? {
        if existing.role != Role::Admin.as_str() {
            warn!("Bootstrap admin {} exists without the ADMIN role", existing.id);
        }
        return Ok(());
    }

    check_password(password)?;
    let id = Uuid::new_v4().to_string();
    db.create_user(
        &id,
        &email,
        "Administrator",
        &hash_password(password)?,
        Role::Admin.as_str(),
        None,
    )?;

    info!("Created bootstrap admin {}", id);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
