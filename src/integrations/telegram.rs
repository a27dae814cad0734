use crate::{
    constants::TELEGRAM_TIMEOUT_SECS,
    error::{AppError, Result},
    models::{TelegramResponse, TelegramUser},
};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// Outbound reply channel for the webhook handler.
#[async_trait::async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct SetWebhookRequest<'a> {
    url: &'a str,
    allowed_updates: [&'a str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_token: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Clone)]
pub struct TelegramClient {
    base_url: String,
    token: String,
    client: Client,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// Constructs a new instance via `new`.
    ///
    /// # Arguments
    /// * `base_url` - Bot API root, e.g. `https://api.telegram.org`.
    /// * `token` - bot token issued by BotFather.
    ///
    /// # Returns
    /// * `Ok(TelegramClient)` when the HTTP client can be built.
    /// * `Err(AppError)` otherwise.
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TELEGRAM_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
            client,
        })
    }

    // The URL embeds the bot token, so errors are stripped of it before logging.
    async fn call<P, T>(&self, method: &str, payload: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalAPI(format!("Telegram {} failed: {}", method, e.without_url()))
            })?;

        let body: TelegramResponse<T> = response.json().await.map_err(|e| {
            AppError::ExternalAPI(format!(
                "Telegram {} returned invalid JSON: {}",
                method,
                e.without_url()
            ))
        })?;

        if !body.ok {
            return Err(AppError::ExternalAPI(format!(
                "Telegram {} rejected: {}",
                method,
                body.description.unwrap_or_else(|| "no description".to_string())
            )));
        }
        body.result
            .ok_or_else(|| AppError::ExternalAPI(format!("Telegram {} returned no result", method)))
    }

    /// Fetches the bot's own account.
    ///
    /// # Returns
    /// * `Ok(TelegramUser)` for a valid token.
    /// * `Err(AppError::ExternalAPI)` when Telegram rejects the token or is unreachable.
    pub async fn get_me(&self) -> Result<TelegramUser> {
        self.call("getMe", &serde_json::json!({})).await
    }

    /// Points Telegram at our webhook; only `message` updates are requested.
    pub async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<()> {
        let request = SetWebhookRequest {
            url,
            allowed_updates: ["message"],
            secret_token,
        };
        let _: bool = self.call("setWebhook", &request).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl MessageSender for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let request = SendMessageRequest { chat_id, text };
        let _: serde_json::Value = self.call("sendMessage", &request).await?;
        Ok(())
    }
}
