use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use super::AppState;
use crate::{
    error::{AppError, Result},
    models::{ConversationId, Message, Update},
};

pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

fn verify_secret(headers: &HeaderMap, expected: Option<&str>) -> Result<()> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let provided = headers
        .get(SECRET_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    if provided == Some(expected) {
        Ok(())
    } else {
        Err(AppError::Unauthorized(
            "Invalid webhook secret token".to_string(),
        ))
    }
}

fn sender_label(message: &Message) -> String {
    match &message.from {
        Some(user) => user
            .username
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| {
                if user.first_name.is_empty() {
                    user.id.to_string()
                } else {
                    user.first_name.clone()
                }
            }),
        None => "unknown".to_string(),
    }
}

/// POST <TELEGRAM_WEBHOOK_PATH> - Telegram update delivery
///
/// Answers 200 for everything it accepted, including updates it chose to
/// ignore, so Telegram does not redeliver them.
pub async fn telegram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<Update>, JsonRejection>,
) -> Result<StatusCode> {
    verify_secret(&headers, state.config.telegram_webhook_secret.as_deref())?;

    let Json(update) = match payload {
        Ok(update) => update,
        Err(rejection) => {
            tracing::warn!("Ignoring undecodable Telegram update: {}", rejection);
            return Ok(StatusCode::OK);
        }
    };

    if !state.seen_updates.first_delivery(update.update_id).await {
        tracing::debug!("Skipping redelivered update {}", update.update_id);
        return Ok(StatusCode::OK);
    }

    let Some(message) = update.message else {
        return Ok(StatusCode::OK);
    };
    if let (Some(from), Some(bot_id)) = (&message.from, state.bot_user_id) {
        if from.id == bot_id {
            return Ok(StatusCode::OK);
        }
    }
    let Some(text) = message.text.as_deref() else {
        tracing::debug!(
            "Ignoring non-text message {} in chat {}",
            message.message_id,
            message.chat.id
        );
        return Ok(StatusCode::OK);
    };

    let conversation = ConversationId::from(message.chat.id);
    let reply = state
        .chat
        .handle_message(&conversation, &sender_label(&message), text)
        .await;

    match &state.telegram {
        Some(telegram) => {
            if let Err(err) = telegram.send_message(message.chat.id, &reply).await {
                tracing::error!("Failed to send reply to chat {}: {}", message.chat.id, err);
            }
        }
        None => tracing::warn!("Telegram client not configured; reply for chat {} dropped", message.chat.id),
    }

    Ok(StatusCode::OK)
}
