// All service modules
pub mod chat_service;
pub mod confirmation_gate;
pub mod conversation_store;
pub mod intent_extractor;
pub mod query_responder;
pub mod transfer_executor;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export for convenience
pub use chat_service::{ChatService, ChatSettings};
pub use conversation_store::{ConversationStore, InMemoryConversationStore};

use crate::{config::Config, error::Result};
use conversation_store::RedisConversationStore;
use query_responder::GeminiResponder;
use transfer_executor::HttpTransferExecutor;
use std::sync::Arc;

/// Picks the conversation store backend: Redis when `REDIS_URL` is set,
/// otherwise process memory.
pub async fn build_conversation_store(config: &Config) -> Result<Arc<dyn ConversationStore>> {
    let store: Arc<dyn ConversationStore> = match config.redis_url.as_deref() {
        Some(redis_url) => Arc::new(
            RedisConversationStore::connect(redis_url, config.conversation_ttl_secs).await?,
        ),
        None => match config.conversation_ttl_secs {
            Some(ttl) => Arc::new(InMemoryConversationStore::with_ttl(
                std::time::Duration::from_secs(ttl),
            )),
            None => Arc::new(InMemoryConversationStore::new()),
        },
    };
    tracing::info!("Conversation store backend: {}", store.backend_name());
    Ok(store)
}

/// Wires the chat service with its HTTP-backed collaborators.
pub fn build_chat_service(
    config: &Config,
    store: Arc<dyn ConversationStore>,
) -> Result<Arc<ChatService>> {
    let executor = Arc::new(HttpTransferExecutor::new(
        &config.transfer_api_url,
        config.transfer_timeout(),
    )?);
    let responder = Arc::new(GeminiResponder::from_config(config)?);
    Ok(Arc::new(ChatService::new(
        store,
        executor,
        responder,
        ChatSettings::from_config(config),
    )))
}
