use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod config;
mod db;
mod error;
mod messaging;
mod notify;
mod routes;
mod state;
mod uploads;

#[cfg(test)]
mod test_support;

use messaging::{MessageTransport, TwilioTransport};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wedding_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::load()?;
    tracing::info!("Starting wedding server on {}:{}", config.server.host, config.server.port);

    let db = db::Database::new(&config.database.url).await?;
    db.run_migrations().await?;
    bootstrap_admin(&db, &config).await?;
    let purged = db.purge_expired_sessions(&chrono::Utc::now().to_rfc3339()).await?;
    if purged > 0 {
        tracing::info!("Removed {} expired admin sessions", purged);
    }

    let store = uploads::build_store(&config).await?;
    let transport: Option<Arc<dyn MessageTransport>> = match config.messaging.credentials() {
        Ok(credentials) => Some(Arc::new(TwilioTransport::new(credentials))),
        Err(e) => {
            tracing::warn!("WhatsApp messaging disabled: {}", e);
            None
        }
    };
    if !config.smtp.enabled {
        tracing::info!("RSVP email notifications disabled");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(db, config, Arc::from(store), transport)?;
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Makes sure the configured admin can log in on a fresh database
async fn bootstrap_admin(db: &db::Database, config: &config::Config) -> Result<()> {
    let Some(email) = config.auth.bootstrap_email.as_deref() else {
        return Ok(());
    };
    let email = shared::normalize_email(email);
    let name = config.auth.bootstrap_name.as_deref().unwrap_or("Admin");
    if db.ensure_admin(&email, name).await? {
        tracing::info!("Created admin account {}", email);
    }
    Ok(())
}
