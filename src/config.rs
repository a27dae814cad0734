use crate::constants::{
    DEFAULT_AI_TIMEOUT_MS, DEFAULT_EXPLORER_URL, DEFAULT_GEMINI_API_URL, DEFAULT_GEMINI_MODEL,
    DEFAULT_TELEGRAM_API_URL, DEFAULT_TOPUP_URL, DEFAULT_TRANSFER_API_URL,
    DEFAULT_TRANSFER_TIMEOUT_MS,
};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Telegram
    pub telegram_bot_token: Option<String>,
    pub telegram_api_url: String,
    pub telegram_webhook_path: String,
    pub telegram_webhook_secret: Option<String>,
    pub public_url: Option<String>,

    // AI
    pub gemini_api_key: Option<String>,
    pub gemini_api_url: String,
    pub gemini_model: String,
    pub ai_timeout_ms: u64,

    // Transfers
    pub transfer_api_url: String,
    pub transfer_timeout_ms: u64,
    pub explorer_url: String,
    pub topup_url: String,

    // Conversation state
    pub redis_url: Option<String>,
    pub conversation_ttl_secs: Option<u64>,

    // CORS
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            telegram_bot_token: non_empty_var("TELEGRAM_BOT_TOKEN"),
            telegram_api_url: env::var("TELEGRAM_API_URL")
                .unwrap_or_else(|_| DEFAULT_TELEGRAM_API_URL.to_string()),
            telegram_webhook_path: env::var("TELEGRAM_WEBHOOK_PATH")
                .unwrap_or_else(|_| "/".to_string()),
            telegram_webhook_secret: non_empty_var("TELEGRAM_WEBHOOK_SECRET"),
            public_url: non_empty_var("PUBLIC_URL"),

            gemini_api_key: non_empty_var("GEMINI_API_KEY"),
            gemini_api_url: env::var("GEMINI_API_URL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_API_URL.to_string()),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
            ai_timeout_ms: env::var("AI_TIMEOUT_MS")
                .unwrap_or_else(|_| DEFAULT_AI_TIMEOUT_MS.to_string())
                .parse()?,

            transfer_api_url: env::var("TRANSFER_API_URL")
                .unwrap_or_else(|_| DEFAULT_TRANSFER_API_URL.to_string()),
            transfer_timeout_ms: env::var("TRANSFER_TIMEOUT_MS")
                .unwrap_or_else(|_| DEFAULT_TRANSFER_TIMEOUT_MS.to_string())
                .parse()?,
            explorer_url: env::var("EXPLORER_URL")
                .unwrap_or_else(|_| DEFAULT_EXPLORER_URL.to_string()),
            topup_url: env::var("TOPUP_URL").unwrap_or_else(|_| DEFAULT_TOPUP_URL.to_string()),

            redis_url: non_empty_var("REDIS_URL"),
            conversation_ttl_secs: env::var("CONVERSATION_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0),

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.telegram_bot_token.is_some() {
            let Some(public_url) = self.public_url.as_deref() else {
                anyhow::bail!("PUBLIC_URL is required when TELEGRAM_BOT_TOKEN is set");
            };
            self.webhook_url_for(public_url)?;
        } else {
            tracing::warn!("TELEGRAM_BOT_TOKEN not set; Telegram webhook disabled");
        }

        if !self.telegram_webhook_path.starts_with('/') {
            anyhow::bail!("TELEGRAM_WEBHOOK_PATH must start with '/'");
        }
        if self.transfer_api_url.trim().is_empty() {
            anyhow::bail!("TRANSFER_API_URL is empty");
        }
        if self.ai_timeout_ms == 0 || self.transfer_timeout_ms == 0 {
            anyhow::bail!("AI_TIMEOUT_MS and TRANSFER_TIMEOUT_MS must be > 0");
        }

        if self.gemini_api_key.is_none() {
            tracing::warn!("GEMINI_API_KEY not set; general queries will fail");
        }
        if self.telegram_bot_token.is_some() && self.telegram_webhook_secret.is_none() {
            tracing::warn!("TELEGRAM_WEBHOOK_SECRET not set; webhook accepts unsigned updates");
        }
        if self.redis_url.is_none() && !self.is_development() {
            tracing::warn!("REDIS_URL not set; conversation state is held in memory only");
        }
        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Public webhook URL Telegram should deliver updates to.
    pub fn webhook_url(&self) -> anyhow::Result<Option<url::Url>> {
        match self.public_url.as_deref() {
            Some(public_url) => self.webhook_url_for(public_url).map(Some),
            None => Ok(None),
        }
    }

    fn webhook_url_for(&self, public_url: &str) -> anyhow::Result<url::Url> {
        let base = url::Url::parse(public_url.trim())
            .map_err(|e| anyhow::anyhow!("Invalid webhook URL {}: {}", public_url, e))?;
        let joined = base
            .join(&self.telegram_webhook_path)
            .map_err(|e| anyhow::anyhow!("Invalid webhook path: {}", e))?;
        Ok(joined)
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_millis(self.ai_timeout_ms)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 10000,
        environment: "development".to_string(),
        telegram_bot_token: None,
        telegram_api_url: DEFAULT_TELEGRAM_API_URL.to_string(),
        telegram_webhook_path: "/".to_string(),
        telegram_webhook_secret: None,
        public_url: None,
        gemini_api_key: None,
        gemini_api_url: DEFAULT_GEMINI_API_URL.to_string(),
        gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
        ai_timeout_ms: 1_000,
        transfer_api_url: DEFAULT_TRANSFER_API_URL.to_string(),
        transfer_timeout_ms: 1_000,
        explorer_url: DEFAULT_EXPLORER_URL.to_string(),
        topup_url: DEFAULT_TOPUP_URL.to_string(),
        redis_url: None,
        conversation_ttl_secs: None,
        cors_allowed_origins: "*".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_public_url_with_bot_token() {
        let mut config = test_config();
        config.telegram_bot_token = Some("123:abc".to_string());
        assert!(config.validate().is_err());

        config.public_url = Some("https://bot.example.com".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn webhook_url_joins_path() {
        let mut config = test_config();
        config.public_url = Some("https://bot.example.com".to_string());
        config.telegram_webhook_path = "/telegram".to_string();
        let url = config.webhook_url().unwrap().unwrap();
        assert_eq!(url.as_str(), "https://bot.example.com/telegram");
    }

    #[test]
    fn validate_rejects_relative_webhook_path() {
        let mut config = test_config();
        config.telegram_webhook_path = "hook".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeouts() {
        let mut config = test_config();
        config.transfer_timeout_ms = 0;
        assert!(config.validate().is_err());
    }
}
