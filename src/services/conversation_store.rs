use crate::{
    constants::REDIS_KEY_PREFIX,
    error::Result,
    models::{ConversationId, ConversationState, PartialTransfer, TransferIntent},
};
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// Per-conversation transfer state. Every call touches exactly one identity.
#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    /// Snapshot of both slots, for inspection.
    #[cfg(test)]
    async fn get(&self, id: &ConversationId) -> Result<ConversationState>;

    async fn set_extracted(&self, id: &ConversationId, partial: PartialTransfer) -> Result<()>;

    async fn set_pending(&self, id: &ConversationId, intent: TransferIntent) -> Result<()>;

    #[cfg(test)]
    async fn clear_pending(&self, id: &ConversationId) -> Result<()>;

    /// Removes and returns the pending intent in one step.
    async fn take_pending(&self, id: &ConversationId) -> Result<Option<TransferIntent>>;

    fn backend_name(&self) -> &'static str;
}

// ==================== IN-MEMORY ====================

struct StoredConversation {
    state: ConversationState,
    touched_at: DateTime<Utc>,
}

pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<ConversationId, StoredConversation>>,
    ttl: Option<Duration>,
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            ttl: None,
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            ttl: Some(ttl),
        }
    }

    fn is_expired(&self, entry: &StoredConversation) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        let age = Utc::now()
            .signed_duration_since(entry.touched_at)
            .to_std()
            .unwrap_or_default();
        age >= ttl
    }

    async fn update<F>(&self, id: &ConversationId, apply: F)
    where
        F: FnOnce(&mut ConversationState),
    {
        let mut conversations = self.conversations.write().await;
        let expired = conversations
            .get(id)
            .map(|entry| self.is_expired(entry))
            .unwrap_or(false);
        let entry = conversations
            .entry(id.clone())
            .or_insert_with(|| StoredConversation {
                state: ConversationState::default(),
                touched_at: Utc::now(),
            });
        if expired {
            entry.state = ConversationState::default();
        }
        apply(&mut entry.state);
        entry.touched_at = Utc::now();

        if entry.state == ConversationState::default() {
            conversations.remove(id);
        }
    }
}

#[async_trait::async_trait]
impl ConversationStore for InMemoryConversationStore {
    #[cfg(test)]
    async fn get(&self, id: &ConversationId) -> Result<ConversationState> {
        let conversations = self.conversations.read().await;
        Ok(conversations
            .get(id)
            .filter(|entry| !self.is_expired(entry))
            .map(|entry| entry.state.clone())
            .unwrap_or_default())
    }

    async fn set_extracted(&self, id: &ConversationId, partial: PartialTransfer) -> Result<()> {
        self.update(id, |state| state.last_extracted = Some(partial))
            .await;
        Ok(())
    }

    async fn set_pending(&self, id: &ConversationId, intent: TransferIntent) -> Result<()> {
        self.update(id, |state| state.pending = Some(intent)).await;
        Ok(())
    }

    #[cfg(test)]
    async fn clear_pending(&self, id: &ConversationId) -> Result<()> {
        self.update(id, |state| state.pending = None).await;
        Ok(())
    }

    async fn take_pending(&self, id: &ConversationId) -> Result<Option<TransferIntent>> {
        let mut taken = None;
        self.update(id, |state| taken = state.pending.take()).await;
        Ok(taken)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

// ==================== REDIS ====================

fn conversation_key(id: &ConversationId, slot: &str) -> String {
    format!("{}:{}:{}", REDIS_KEY_PREFIX, id, slot)
}

/// Redis-backed store so several bot instances share conversation state.
#[derive(Clone)]
pub struct RedisConversationStore {
    redis: redis::aio::ConnectionManager,
    ttl_secs: Option<u64>,
}

impl RedisConversationStore {
    pub async fn connect(redis_url: &str, ttl_secs: Option<u64>) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let redis = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self { redis, ttl_secs })
    }

    async fn write_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        let mut conn = self.redis.clone();
        match self.ttl_secs {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, payload, ttl).await?,
            None => conn.set::<_, _, ()>(key, payload).await?,
        }
        Ok(())
    }

    #[cfg(test)]
    async fn read_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.redis.clone();
        let raw: Option<String> = conn.get(key).await?;
        raw.map(|payload| serde_json::from_str(&payload))
            .transpose()
            .map_err(Into::into)
    }
}

#[async_trait::async_trait]
impl ConversationStore for RedisConversationStore {
    #[cfg(test)]
    async fn get(&self, id: &ConversationId) -> Result<ConversationState> {
        let last_extracted = self.read_json(&conversation_key(id, "extracted")).await?;
        let pending = self.read_json(&conversation_key(id, "pending")).await?;
        Ok(ConversationState {
            last_extracted,
            pending,
        })
    }

    async fn set_extracted(&self, id: &ConversationId, partial: PartialTransfer) -> Result<()> {
        self.write_json(&conversation_key(id, "extracted"), &partial)
            .await
    }

    async fn set_pending(&self, id: &ConversationId, intent: TransferIntent) -> Result<()> {
        self.write_json(&conversation_key(id, "pending"), &intent)
            .await
    }

    #[cfg(test)]
    async fn clear_pending(&self, id: &ConversationId) -> Result<()> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(conversation_key(id, "pending")).await?;
        Ok(())
    }

    async fn take_pending(&self, id: &ConversationId) -> Result<Option<TransferIntent>> {
        let mut conn = self.redis.clone();
        // GETDEL keeps concurrent confirmations from both reading the intent.
        let raw: Option<String> = conn.get_del(conversation_key(id, "pending")).await?;
        raw.map(|payload| serde_json::from_str(&payload))
            .transpose()
            .map_err(Into::into)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
