//! Voice assistant API server

use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voice_assistant::api::{create_router, AppState};
use voice_assistant::assistant::AssistantService;
use voice_assistant::bootstrap::ConnectionBootstrapper;
use voice_assistant::config::Config;
use voice_assistant::db::SqliteConnector;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_assistant=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Config::from_env();
    config.log_summary();

    let assistant = match AssistantService::from_config(&config) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(error = %e.message, "Failed to build Gemini client, AI disabled");
            AssistantService::offline(&config)
        }
    };

    // The server accepts requests while the datastore connects in the background
    let state = AppState::new(
        assistant,
        ConnectionBootstrapper::new(config.db_url.clone(), SqliteConnector),
    );
    let datastore = Arc::clone(&state.datastore);
    let max_retries = config.db_max_retries;
    let connect_task = tokio::spawn(async move {
        datastore.connect(max_retries).await;
    });

    let cors = CorsLayer::new()
        .allow_origin(cors_origin(&config.client_url))
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state.clone())
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Voice assistant server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // A connect still retrying holds the lifecycle lock; stop it first
    connect_task.abort();
    let _ = connect_task.await;
    state.datastore.teardown().await;
    tracing::info!("Server stopped");

    Ok(())
}

fn cors_origin(client_url: &str) -> AllowOrigin {
    match HeaderValue::from_str(client_url) {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => {
            tracing::warn!(client_url, "CLIENT_URL is not a valid origin, allowing any");
            AllowOrigin::any()
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
