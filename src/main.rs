//! BroBot - wellness tips chat API
//!
//! Each session is one conversation with BroBot about fitness, nutrition, or
//! mental health. Replies come from a local tip table or from a remote
//! chat-completion API using a key the user supplies for that session.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod conversation;
mod core;
mod providers;
mod routes;

use crate::config::Config;
use crate::core::SessionRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: Arc<SessionRegistry>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "brobot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let tips = config.load_tips()?;
    if let Some(path) = &config.tips_file {
        tracing::info!("📒 Loaded tip book from {}", path.display());
    }

    let provider = providers::from_config(&config, tips)?;
    tracing::info!("🧠 Response strategy: {}", provider.name());

    let sessions = Arc::new(SessionRegistry::new(provider, config.welcome_delay()));
    if let Some(idle) = config.session_idle() {
        sessions.spawn_sweeper(idle);
        tracing::info!("🧹 Idle sessions expire after {}s", idle.as_secs());
    }

    let state = AppState { config, sessions };

    let app = Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("💪 BroBot API running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
