use crate::{
    error::{AppError, Result},
    models::TransferIntent,
    utils::truncate_chars,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("transfer service unreachable: {0}")]
    Transport(String),

    #[error("transfer service timed out")]
    Timeout,

    #[error("transfer service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed transfer response: {0}")]
    MalformedResponse(String),

    /// Success status but no transaction hash; the sender wallet is short.
    #[error("transfer response carried no transaction hash")]
    InsufficientFunds,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub tx_hash: String,
}

/// Moves funds for a confirmed intent. Callers invoke it at most once per
/// intent; implementations must not retry on their own.
#[async_trait::async_trait]
pub trait TransferExecutor: Send + Sync {
    async fn execute(
        &self,
        intent: &TransferIntent,
    ) -> std::result::Result<TransferReceipt, TransferError>;
}

#[derive(Debug, Serialize)]
struct SendAssetRequest<'a> {
    recipient: &'a str,
    amount: Decimal,
    #[serde(rename = "isEth")]
    is_eth: bool,
}

/// HTTP client for the asset-sender service (`POST /send-asset`).
#[derive(Debug, Clone)]
pub struct HttpTransferExecutor {
    client: reqwest::Client,
    api_url: String,
}

impl HttpTransferExecutor {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_url: api_url.trim().to_string(),
        })
    }
}

#[async_trait::async_trait]
impl TransferExecutor for HttpTransferExecutor {
    async fn execute(
        &self,
        intent: &TransferIntent,
    ) -> std::result::Result<TransferReceipt, TransferError> {
        let request = SendAssetRequest {
            recipient: &intent.recipient,
            amount: intent.amount,
            is_eth: intent.is_native(),
        };
        tracing::info!(
            "Sending {} {} to {} (is_eth={})",
            request.amount,
            intent.token,
            request.recipient,
            request.is_eth
        );

        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransferError::Transport(format!("failed to read response: {}", e)))?;

        interpret_send_asset_response(status, &body)
    }
}

fn classify_request_error(err: reqwest::Error) -> TransferError {
    if err.is_timeout() {
        TransferError::Timeout
    } else {
        TransferError::Transport(err.without_url().to_string())
    }
}

// Maps the asset-sender reply onto a receipt or one of the failure kinds.
pub(crate) fn interpret_send_asset_response(
    status: u16,
    body: &str,
) -> std::result::Result<TransferReceipt, TransferError> {
    if !(200..300).contains(&status) {
        tracing::warn!("Non-success transfer response {}: {}", status, body);
        return Err(TransferError::Status {
            status,
            body: truncate_chars(body, MAX_ERROR_BODY_CHARS),
        });
    }

    let payload: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| TransferError::MalformedResponse(e.to_string()))?;

    match payload.get("txHash").and_then(|v| v.as_str()) {
        Some(tx_hash) if !tx_hash.trim().is_empty() => Ok(TransferReceipt {
            tx_hash: tx_hash.trim().to_string(),
        }),
        _ => Err(TransferError::InsufficientFunds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use std::str::FromStr;
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<serde_json::Value>>>;

    async fn spawn_asset_sender(status: StatusCode, body: &'static str) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/send-asset",
                post(
                    move |State(captured): State<Captured>, Json(payload): Json<serde_json::Value>| async move {
                        captured.lock().unwrap().push(payload);
                        (status, body)
                    },
                ),
            )
            .with_state(captured.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/send-asset", addr), captured)
    }

    fn intent(token: &str) -> TransferIntent {
        TransferIntent::new(Decimal::from_str("0.5").unwrap(), token, "alice.base.eth")
    }

    #[test]
    fn success_with_hash_yields_receipt() {
        let receipt = interpret_send_asset_response(200, r#"{"txHash":"0xabc"}"#).unwrap();
        assert_eq!(receipt.tx_hash, "0xabc");
    }

    #[test]
    fn success_without_hash_is_insufficient_funds() {
        let result = interpret_send_asset_response(200, r#"{"error":"insufficient"}"#);
        assert_eq!(result, Err(TransferError::InsufficientFunds));

        let result = interpret_send_asset_response(200, r#"{"txHash":null}"#);
        assert_eq!(result, Err(TransferError::InsufficientFunds));
    }

    #[test]
    fn non_success_status_is_reported() {
        let result = interpret_send_asset_response(500, "boom");
        assert_eq!(
            result,
            Err(TransferError::Status {
                status: 500,
                body: "boom".to_string()
            })
        );
    }

    #[test]
    fn invalid_json_is_malformed() {
        let result = interpret_send_asset_response(200, "<html>");
        assert!(matches!(result, Err(TransferError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn execute_posts_expected_payload() {
        let (url, captured) = spawn_asset_sender(StatusCode::OK, r#"{"txHash":"0x123"}"#).await;
        let executor = HttpTransferExecutor::new(&url, Duration::from_secs(5)).unwrap();

        let receipt = executor.execute(&intent("ETH")).await.unwrap();
        assert_eq!(receipt.tx_hash, "0x123");

        let requests = captured.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["recipient"], "alice.base.eth");
        assert_eq!(requests[0]["amount"].as_f64(), Some(0.5));
        assert_eq!(requests[0]["isEth"], true);
    }

    #[tokio::test]
    async fn execute_flags_named_tokens() {
        let (url, captured) = spawn_asset_sender(StatusCode::OK, r#"{"txHash":"0x1"}"#).await;
        let executor = HttpTransferExecutor::new(&url, Duration::from_secs(5)).unwrap();
        executor.execute(&intent("TOKEN")).await.unwrap();
        assert_eq!(captured.lock().unwrap()[0]["isEth"], false);
    }

    #[tokio::test]
    async fn execute_surfaces_error_status() {
        let (url, _) = spawn_asset_sender(StatusCode::BAD_GATEWAY, "upstream down").await;
        let executor = HttpTransferExecutor::new(&url, Duration::from_secs(5)).unwrap();
        let result = executor.execute(&intent("ETH")).await;
        assert!(matches!(result, Err(TransferError::Status { status: 502, .. })));
    }

    #[tokio::test]
    async fn execute_reports_unreachable_service() {
        let executor =
            HttpTransferExecutor::new("http://127.0.0.1:1/send-asset", Duration::from_secs(2))
                .unwrap();
        let result = executor.execute(&intent("ETH")).await;
        assert!(matches!(
            result,
            Err(TransferError::Transport(_)) | Err(TransferError::Timeout)
        ));
    }
}
