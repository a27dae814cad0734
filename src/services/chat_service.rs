use crate::{
    config::Config,
    models::{ConversationId, ExtractedTransfer, TransferField, TransferIntent},
    services::{
        confirmation_gate::{ConfirmationGate, GateAction},
        conversation_store::ConversationStore,
        query_responder::{is_degenerate_reply, QueryError, QueryResponder},
        transfer_executor::{TransferError, TransferExecutor},
    },
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

const CONVERSATION_LOCKS_MAX_ENTRIES: usize = 4096;

const FORMAT_HINT: &str = "Please specify it in the format 'send <amount> eth to <recipient>'";
const INVALID_AMOUNT_MESSAGE: &str = "I couldn't parse the amount you provided. Please specify it in the format 'send <amount> <eth> to <recipient>'";
const AMOUNT_OUT_OF_RANGE_MESSAGE: &str = "That amount is too large to send. Please specify a smaller amount in the format 'send <amount> eth to <recipient>'";
const QUERY_FAILURE_MESSAGE: &str = "Oops! Something went wrong.";
const CLARIFICATION_MESSAGE: &str = "Hmm... I didn't quite get that. Could you rephrase?";

/// Links and time budgets used when talking to the user.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub explorer_url: String,
    pub topup_url: String,
    pub ai_timeout: Duration,
    pub transfer_timeout: Duration,
}

impl ChatSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            explorer_url: config.explorer_url.trim_end_matches('/').to_string(),
            topup_url: config.topup_url.clone(),
            ai_timeout: config.ai_timeout(),
            transfer_timeout: config.transfer_timeout(),
        }
    }
}

/// Chat Service - turns one inbound message into one outbound reply
pub struct ChatService {
    gate: ConfirmationGate,
    executor: Arc<dyn TransferExecutor>,
    responder: Arc<dyn QueryResponder>,
    settings: ChatSettings,
    conversation_locks: RwLock<HashMap<ConversationId, Arc<Mutex<()>>>>,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        executor: Arc<dyn TransferExecutor>,
        responder: Arc<dyn QueryResponder>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            gate: ConfirmationGate::new(store),
            executor,
            responder,
            settings,
            conversation_locks: RwLock::new(HashMap::new()),
        }
    }

    pub async fn handle_message(&self, id: &ConversationId, sender: &str, text: &str) -> String {
        tracing::info!("User ({}) in chat {}: {}", sender, id, text);

        let lock = self.conversation_lock(id).await;
        let guard = lock.lock().await;

        let action = match self.gate.handle(id, text).await {
            Ok(action) => action,
            Err(err) => {
                tracing::error!("Conversation state unavailable for chat {}: {}", id, err);
                return QUERY_FAILURE_MESSAGE.to_string();
            }
        };

        match action {
            GateAction::Execute(intent) => self.execute_transfer(&intent).await,
            GateAction::AskConfirm(intent) => confirmation_prompt(&intent),
            GateAction::AskMissingField(field) => missing_field_prompt(field),
            GateAction::InvalidAmount(_) => INVALID_AMOUNT_MESSAGE.to_string(),
            GateAction::AmountOutOfRange(_) => AMOUNT_OUT_OF_RANGE_MESSAGE.to_string(),
            GateAction::Fallthrough => {
                drop(guard);
                let prompt = self.shape_query_prompt(text);
                match self.answer_query(&prompt).await {
                    Ok(reply) => reply,
                    Err(err) => {
                        tracing::error!("Error getting AI response for chat {}: {}", id, err);
                        QUERY_FAILURE_MESSAGE.to_string()
                    }
                }
            }
        }
    }

    /// Strict grammar match only; never touches conversation state.
    pub fn detect(&self, text: &str) -> Option<ExtractedTransfer> {
        self.gate.extractor().extract(text)
    }

    /// Asks the general-query backend, replacing degenerate replies with a
    /// clarification request.
    pub async fn answer_query(&self, prompt: &str) -> Result<String, QueryError> {
        let reply = match tokio::time::timeout(self.settings.ai_timeout, self.responder.ask(prompt))
            .await
        {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    "AI query timed out after {}ms",
                    self.settings.ai_timeout.as_millis()
                );
                return Err(QueryError::Timeout);
            }
        };

        if is_degenerate_reply(&reply) {
            tracing::debug!("Replacing repetitive AI reply with clarification prompt");
            return Ok(CLARIFICATION_MESSAGE.to_string());
        }
        Ok(reply)
    }

    async fn execute_transfer(&self, intent: &TransferIntent) -> String {
        let outcome = match tokio::time::timeout(
            self.settings.transfer_timeout,
            self.executor.execute(intent),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(TransferError::Timeout),
        };

        match outcome {
            Ok(receipt) => {
                tracing::info!(
                    "Transfer of {} {} to {} succeeded: {}",
                    intent.amount,
                    intent.token,
                    intent.recipient,
                    receipt.tx_hash
                );
                format!(
                    "Transfer succeeded! Check the Transaction hash {}/tx/{}",
                    self.settings.explorer_url, receipt.tx_hash
                )
            }
            Err(TransferError::InsufficientFunds) => {
                tracing::warn!("Transfer to {} rejected: insufficient funds", intent.recipient);
                format!(
                    "Transfer failed due to insufficient funds. Top up your wallet here: {}",
                    self.settings.topup_url
                )
            }
            Err(err) => {
                tracing::error!("Transfer to {} failed: {}", intent.recipient, err);
                transfer_failure_message(&err).to_string()
            }
        }
    }

    fn shape_query_prompt(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        if lowered.contains("send") && lowered.contains("eth") {
            return match self.detect(text) {
                Some(transfer) => format!(
                    "I want to send {} {} to {}.",
                    transfer.amount, transfer.token, transfer.recipient
                ),
                None => "What details do you need for the transfer?".to_string(),
            };
        }
        if lowered.contains("balance") {
            return "Check my balance.".to_string();
        }
        if lowered.contains("help") {
            return "I want to know about Zapbase.".to_string();
        }
        text.to_string()
    }

    async fn conversation_lock(&self, id: &ConversationId) -> Arc<Mutex<()>> {
        {
            let guard = self.conversation_locks.read().await;
            if let Some(lock) = guard.get(id) {
                return lock.clone();
            }
        }

        let mut guard = self.conversation_locks.write().await;
        if let Some(lock) = guard.get(id) {
            return lock.clone();
        }
        let lock = Arc::new(Mutex::new(()));
        guard.insert(id.clone(), lock.clone());

        if guard.len() > CONVERSATION_LOCKS_MAX_ENTRIES {
            guard.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        lock
    }
}

fn confirmation_prompt(intent: &TransferIntent) -> String {
    format!(
        "Kindly confirm you want to send {} {} to {}. Reply with 'yes' to confirm.",
        display_amount(intent.amount),
        intent.token,
        intent.recipient
    )
}

// Six decimals, unless that would hide digits of the amount actually sent.
fn display_amount(amount: Decimal) -> String {
    let normalized = amount.normalize();
    if normalized.scale() <= 6 {
        format!("{:.6}", normalized)
    } else {
        normalized.to_string()
    }
}

fn missing_field_prompt(field: TransferField) -> String {
    match field {
        TransferField::Amount => {
            format!("I couldn't find the amount you want to send. {}", FORMAT_HINT)
        }
        TransferField::Token => {
            format!("I couldn't find the token you want to send. {}", FORMAT_HINT)
        }
        TransferField::Recipient => format!(
            "I couldn't find the recipient you want to send to. {}",
            FORMAT_HINT
        ),
    }
}

fn transfer_failure_message(err: &TransferError) -> &'static str {
    match err {
        TransferError::Transport(_) => "Failed to reach the transaction server. Please try again later.",
        TransferError::Timeout => "The transaction server took too long to respond. Please try again later.",
        TransferError::Status { .. } => "The transaction server rejected the transfer. Please try again later.",
        TransferError::MalformedResponse(_) => "Invalid response from the transaction server.",
        TransferError::InsufficientFunds => "Transfer failed due to insufficient funds.",
    }
}
