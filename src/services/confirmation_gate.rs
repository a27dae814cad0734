use crate::{
    constants::AFFIRMATIVE_REPLY,
    error::Result,
    models::{ConversationId, PartialTransfer, TransferField, TransferIntent},
    services::{conversation_store::ConversationStore, intent_extractor::IntentExtractor},
};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

/// What the chat layer should do with one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum GateAction {
    /// Confirmed intent, already removed from the store. Run it once.
    Execute(TransferIntent),
    /// Intent promoted to pending; ask the user to reply "yes".
    AskConfirm(TransferIntent),
    AskMissingField(TransferField),
    /// Amount text that is not a number.
    InvalidAmount(String),
    /// Well-formed number too large for a decimal amount.
    AmountOutOfRange(String),
    /// Not a transfer; answer as a general query.
    Fallthrough,
}

fn is_affirmative(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case(AFFIRMATIVE_REPLY)
}

fn is_transfer_command(text: &str) -> bool {
    let lowered = text.trim_start().to_lowercase();
    lowered.starts_with("send") && lowered.contains("eth")
}

/// Confirmation Gate - owns every mutation of per-conversation transfer state
pub struct ConfirmationGate {
    extractor: IntentExtractor,
    store: Arc<dyn ConversationStore>,
}

impl ConfirmationGate {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self {
            extractor: IntentExtractor::new(),
            store,
        }
    }

    pub fn extractor(&self) -> &IntentExtractor {
        &self.extractor
    }

    pub async fn handle(&self, id: &ConversationId, text: &str) -> Result<GateAction> {
        if is_affirmative(text) {
            // Pending slot is cleared before execution so a retried "yes"
            // can never run the same transfer twice.
            if let Some(intent) = self.store.take_pending(id).await? {
                tracing::info!(
                    "Transfer confirmed in chat {}: {} {} to {}",
                    id,
                    intent.amount,
                    intent.token,
                    intent.recipient
                );
                return Ok(GateAction::Execute(intent));
            }
            tracing::debug!("Affirmative reply in chat {} with nothing pending", id);
        }

        if !is_transfer_command(text) {
            return Ok(GateAction::Fallthrough);
        }

        // Only a full grammar match may ever become a pending intent.
        let Some(extracted) = self.extractor.extract(text) else {
            return Ok(self.explain_miss(id, text));
        };
        self.store
            .set_extracted(id, PartialTransfer::from(extracted.clone()))
            .await?;

        let amount = match Decimal::from_str(&extracted.amount) {
            Ok(amount) => amount,
            Err(err) => {
                tracing::debug!(
                    "Unusable amount {:?} in chat {}: {}",
                    extracted.amount,
                    id,
                    err
                );
                return Ok(rejected_amount(extracted.amount));
            }
        };
        if amount > Decimal::ZERO && !extracted.recipient.is_empty() {
            let intent = TransferIntent::new(amount, extracted.token, extracted.recipient);
            self.store.set_pending(id, intent.clone()).await?;
            return Ok(GateAction::AskConfirm(intent));
        }

        Ok(GateAction::Fallthrough)
    }

    // Grammar miss: name what the user got wrong. State is left untouched.
    fn explain_miss(&self, id: &ConversationId, text: &str) -> GateAction {
        let fields = match self.extractor.scan_fields(text).into_complete() {
            Ok(fields) => fields,
            Err(field) => {
                tracing::debug!("Transfer command in chat {} missing {}", id, field);
                return GateAction::AskMissingField(field);
            }
        };

        if !is_numeric_literal(&fields.amount) || Decimal::from_str(&fields.amount).is_err() {
            return rejected_amount(fields.amount);
        }

        // Amount and recipient read fine, so the words between them are what
        // the grammar rejected.
        tracing::debug!(
            "Transfer command in chat {} has unreadable token: {:?}",
            id,
            text
        );
        GateAction::AskMissingField(TransferField::Token)
    }
}

fn is_numeric_literal(raw: &str) -> bool {
    raw.chars().any(|ch| ch.is_ascii_digit())
        && raw.chars().all(|ch| ch.is_ascii_digit() || ch == '.')
        && raw.matches('.').count() <= 1
}

fn rejected_amount(raw: String) -> GateAction {
    if is_numeric_literal(&raw) && Decimal::from_str(&raw).is_err() {
        GateAction::AmountOutOfRange(raw)
    } else {
        GateAction::InvalidAmount(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::conversation_store::InMemoryConversationStore;

    fn gate() -> (ConfirmationGate, Arc<InMemoryConversationStore>) {
        let store = Arc::new(InMemoryConversationStore::new());
        (ConfirmationGate::new(store.clone()), store)
    }

    #[tokio::test]
    async fn transfer_then_yes_executes_once() {
        let (gate, store) = gate();
        let id = ConversationId::from(1_i64);

        let action = gate
            .handle(&id, "Send 0.5 eth to alice.base.eth")
            .await
            .unwrap();
        let GateAction::AskConfirm(intent) = action else {
            panic!("expected confirmation prompt, got {:?}", action);
        };
        assert_eq!(intent.amount, Decimal::from_str("0.5").unwrap());
        assert_eq!(intent.token, "ETH");
        assert_eq!(intent.recipient, "alice.base.eth");
        assert!(store.get(&id).await.unwrap().pending.is_some());

        let action = gate.handle(&id, "yes").await.unwrap();
        assert!(matches!(action, GateAction::Execute(ref i) if i.recipient == "alice.base.eth"));
        assert!(store.get(&id).await.unwrap().pending.is_none());

        let action = gate.handle(&id, "yes").await.unwrap();
        assert_eq!(action, GateAction::Fallthrough);
    }

    #[tokio::test]
    async fn yes_without_pending_falls_through() {
        let (gate, _) = gate();
        let action = gate
            .handle(&ConversationId::from(2_i64), "YES")
            .await
            .unwrap();
        assert_eq!(action, GateAction::Fallthrough);
    }

    #[tokio::test]
    async fn yes_is_case_insensitive_and_trimmed() {
        let (gate, _) = gate();
        let id = ConversationId::from(3_i64);
        gate.handle(&id, "send 1 eth to bob.base.eth").await.unwrap();
        let action = gate.handle(&id, "  Yes \n").await.unwrap();
        assert!(matches!(action, GateAction::Execute(_)));
    }

    #[tokio::test]
    async fn non_numeric_amount_is_reported_without_promotion() {
        let (gate, store) = gate();
        let id = ConversationId::from(4_i64);
        let action = gate
            .handle(&id, "send abc eth to bob.base.eth")
            .await
            .unwrap();
        assert_eq!(action, GateAction::InvalidAmount("abc".to_string()));
        assert_eq!(store.get(&id).await.unwrap(), Default::default());
    }

    #[tokio::test]
    async fn malformed_numeric_amount_is_reported() {
        let (gate, store) = gate();
        let id = ConversationId::from(5_i64);
        let action = gate
            .handle(&id, "send 1.2.3 eth to bob.base.eth")
            .await
            .unwrap();
        assert_eq!(action, GateAction::InvalidAmount("1.2.3".to_string()));
        assert!(store.get(&id).await.unwrap().pending.is_none());
    }

    #[tokio::test]
    async fn missing_fields_are_named() {
        let (gate, store) = gate();
        let id = ConversationId::from(6_i64);

        let action = gate.handle(&id, "send eth to bob.base.eth").await.unwrap();
        assert_eq!(action, GateAction::AskMissingField(TransferField::Amount));

        let action = gate.handle(&id, "send 2 eth to bob").await.unwrap();
        assert_eq!(action, GateAction::AskMissingField(TransferField::Recipient));

        assert_eq!(store.get(&id).await.unwrap(), Default::default());
    }

    #[tokio::test]
    async fn stale_extraction_is_not_reused() {
        let (gate, _) = gate();
        let id = ConversationId::from(7_i64);
        gate.handle(&id, "send 1 eth to bob.base.eth").await.unwrap();
        gate.handle(&id, "yes").await.unwrap();

        let action = gate.handle(&id, "send eth please").await.unwrap();
        assert_eq!(action, GateAction::AskMissingField(TransferField::Amount));
    }

    #[tokio::test]
    async fn zero_amount_falls_through() {
        let (gate, store) = gate();
        let id = ConversationId::from(8_i64);
        let action = gate.handle(&id, "send 0 eth to bob.base.eth").await.unwrap();
        assert_eq!(action, GateAction::Fallthrough);
        assert!(store.get(&id).await.unwrap().pending.is_none());
    }

    #[tokio::test]
    async fn newer_command_replaces_pending_intent() {
        let (gate, _) = gate();
        let id = ConversationId::from(9_i64);
        gate.handle(&id, "send 1 eth to old.base.eth").await.unwrap();
        gate.handle(&id, "send 2 eth to new.base.eth").await.unwrap();

        let action = gate.handle(&id, "yes").await.unwrap();
        let GateAction::Execute(intent) = action else {
            panic!("expected execution, got {:?}", action);
        };
        assert_eq!(intent.recipient, "new.base.eth");
        assert_eq!(intent.amount, Decimal::from(2));
    }

    #[tokio::test]
    async fn general_queries_leave_state_alone() {
        let (gate, store) = gate();
        let id = ConversationId::from(10_i64);
        gate.handle(&id, "send 1 eth to bob.base.eth").await.unwrap();
        let before = store.get(&id).await.unwrap();

        let action = gate.handle(&id, "What's my balance?").await.unwrap();
        assert_eq!(action, GateAction::Fallthrough);
        assert_eq!(store.get(&id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn pending_intent_is_per_conversation() {
        let (gate, _) = gate();
        gate.handle(&ConversationId::from(11_i64), "send 1 eth to bob.base.eth")
            .await
            .unwrap();
        let action = gate.handle(&ConversationId::from(12_i64), "yes").await.unwrap();
        assert_eq!(action, GateAction::Fallthrough);
    }

    #[tokio::test]
    async fn grammar_miss_is_never_promoted() {
        let (gate, store) = gate();
        let id = ConversationId::from(13_i64);
        for text in [
            "send 50 usd of eth to bob.base.eth",
            "send 100 usdc eth to bob.base.eth",
            "send 5 btc, eth to bob.base.eth",
        ] {
            assert!(gate.extractor().extract(text).is_none());
            let action = gate.handle(&id, text).await.unwrap();
            assert_eq!(action, GateAction::AskMissingField(TransferField::Token));
            assert_eq!(store.get(&id).await.unwrap(), Default::default());
        }

        let action = gate.handle(&id, "yes").await.unwrap();
        assert_eq!(action, GateAction::Fallthrough);
    }

    #[tokio::test]
    async fn signed_amount_outside_grammar_is_invalid() {
        let (gate, store) = gate();
        let id = ConversationId::from(14_i64);
        let action = gate.handle(&id, "send -5 eth to bob.base.eth").await.unwrap();
        assert_eq!(action, GateAction::InvalidAmount("-5".to_string()));
        assert_eq!(store.get(&id).await.unwrap(), Default::default());
    }

    #[tokio::test]
    async fn oversized_amount_is_out_of_range() {
        let (gate, store) = gate();
        let id = ConversationId::from(15_i64);
        let action = gate
            .handle(&id, "send 123456789012345678901234567890 eth to bob.base.eth")
            .await
            .unwrap();
        assert_eq!(
            action,
            GateAction::AmountOutOfRange("123456789012345678901234567890".to_string())
        );
        assert!(store.get(&id).await.unwrap().pending.is_none());
    }
}
