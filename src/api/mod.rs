// src/api/mod.rs

pub mod health;
pub mod send_response;
pub mod webhook;

use crate::config::Config;
use crate::constants::SEEN_UPDATES_CAPACITY;
use crate::integrations::MessageSender;
use crate::services::ChatService;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

// AppState definition
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub config: Config,
    pub telegram: Option<Arc<dyn MessageSender>>,
    pub bot_user_id: Option<i64>,
    pub seen_updates: Arc<SeenUpdates>,
    pub store_backend: &'static str,
}

/// Bounded window of recently processed Telegram `update_id`s.
#[derive(Debug)]
pub struct SeenUpdates {
    capacity: usize,
    inner: Mutex<SeenUpdatesInner>,
}

#[derive(Debug, Default)]
struct SeenUpdatesInner {
    ids: HashSet<i64>,
    order: VecDeque<i64>,
}

impl SeenUpdates {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(SeenUpdatesInner::default()),
        }
    }

    /// True the first time an id is seen; false for redeliveries still in the window.
    pub async fn first_delivery(&self, update_id: i64) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner.ids.insert(update_id) {
            return false;
        }
        inner.order.push_back(update_id);
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.ids.remove(&oldest);
            }
        }
        true
    }
}

impl Default for SeenUpdates {
    fn default() -> Self {
        Self::new(SEEN_UPDATES_CAPACITY)
    }
}
