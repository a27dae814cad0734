use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod constants;
mod error;
mod integrations;
mod models;
mod services;
mod utils;

use config::Config;
use constants::API_VERSION;
use integrations::{MessageSender, TelegramClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zapbase_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting ZapBase Backend Server");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("API Version: {}", API_VERSION);

    // Conversation state + chat pipeline
    let store = services::build_conversation_store(&config).await?;
    let store_backend = store.backend_name();
    let chat = services::build_chat_service(&config, store)?;

    // Telegram bot (optional)
    let (telegram, bot_user_id) = match config.telegram_bot_token.as_deref() {
        Some(token) => {
            let client = TelegramClient::new(&config.telegram_api_url, token)?;
            let me = client.get_me().await?;
            tracing::info!(
                "Authorized on account {}",
                me.username.as_deref().unwrap_or(&me.first_name)
            );
            if let Some(webhook_url) = config.webhook_url()? {
                client
                    .set_webhook(
                        webhook_url.as_str(),
                        config.telegram_webhook_secret.as_deref(),
                    )
                    .await?;
                tracing::info!("Telegram webhook set to {}", webhook_url);
            }
            let sender: Arc<dyn MessageSender> = Arc::new(client);
            (Some(sender), Some(me.id))
        }
        None => (None, None),
    };

    let app_state = api::AppState {
        chat,
        config: config.clone(),
        telegram,
        bot_user_id,
        seen_updates: Arc::new(api::SeenUpdates::default()),
        store_backend,
    };

    // Build router
    let app = build_router(app_state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: api::AppState) -> Router {
    // CORS configuration
    let cors = cors_from_config(&state.config);
    let webhook_path = state.config.telegram_webhook_path.clone();

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/home", get(api::health::home))
        // Detect-only chat endpoint
        .route("/send-response", post(api::send_response::send_response))
        // Telegram webhook
        .route(&webhook_path, post(api::webhook::telegram_webhook))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::test_app;
    use crate::config::test_config;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn home_route_answers() {
        let app = test_app(test_config(), "unused");
        let response = build_router(app.state)
            .oneshot(Request::get("/home").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"Server is running.\n");
    }

    #[tokio::test]
    async fn webhook_mounted_at_configured_path() {
        let mut config = test_config();
        config.telegram_webhook_path = "/telegram".to_string();
        let app = test_app(config, "pong");
        let body = serde_json::json!({
            "update_id": 1,
            "message": {"message_id": 1, "chat": {"id": 3}, "text": "ping"}
        })
        .to_string();
        let response = build_router(app.state.clone())
            .oneshot(
                Request::post("/telegram")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            app.sender.sent.lock().unwrap().clone(),
            vec![(3, "pong".to_string())]
        );
    }
}
