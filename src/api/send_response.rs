use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::{
    error::{AppError, Result},
    models::ExtractedTransfer,
};

#[derive(Debug, Deserialize)]
pub struct SendResponseRequest {
    #[serde(rename = "chatID", default)]
    pub chat_id: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SendResponseReply {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer: Option<ExtractedTransfer>,
}

/// POST /send-response - detect a transfer or answer the text, without
/// touching conversation state
pub async fn send_response(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SendResponseRequest>, JsonRejection>,
) -> Result<Json<SendResponseReply>> {
    let Json(req) = payload.map_err(|rejection| {
        tracing::debug!("Rejected /send-response body: {}", rejection);
        AppError::BadRequest("Failed to parse request body".to_string())
    })?;
    tracing::info!("send-response request for chat {}: {}", req.chat_id, req.text);

    if let Some(transfer) = state.chat.detect(&req.text) {
        return Ok(Json(SendResponseReply {
            success: true,
            message: format!(
                "Transfer of {} {} to {} detected",
                transfer.amount, transfer.token, transfer.recipient
            ),
            transfer: Some(transfer),
        }));
    }

    let reply = match state.chat.answer_query(&req.text).await {
        Ok(message) => SendResponseReply {
            success: true,
            message,
            transfer: None,
        },
        Err(err) => {
            tracing::error!("Error getting AI response: {}", err);
            SendResponseReply {
                success: false,
                message: "Error getting AI response".to_string(),
                transfer: None,
            }
        }
    };
    Ok(Json(reply))
}
