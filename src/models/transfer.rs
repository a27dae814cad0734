use crate::constants::DEFAULT_TOKEN;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==================== CONVERSATION ====================

/// Stable identity of one chat session (Telegram chat id or `chatID` from HTTP).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl From<i64> for ConversationId {
    fn from(chat_id: i64) -> Self {
        Self(chat_id.to_string())
    }
}

impl From<&str> for ConversationId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub last_extracted: Option<PartialTransfer>,
    pub pending: Option<TransferIntent>,
}

// ==================== TRANSFER ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferField {
    Amount,
    Token,
    Recipient,
}

impl TransferField {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferField::Amount => "amount",
            TransferField::Token => "token",
            TransferField::Recipient => "recipient",
        }
    }
}

impl fmt::Display for TransferField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transfer fields as typed by the user; any of them may be absent and the
/// amount has not been checked for being numeric yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialTransfer {
    pub amount: Option<String>,
    pub token: Option<String>,
    pub recipient: Option<String>,
}

impl PartialTransfer {
    /// All three fields, or the first missing one in amount, token, recipient order.
    pub fn into_complete(self) -> Result<ExtractedTransfer, TransferField> {
        match (self.amount, self.token, self.recipient) {
            (Some(amount), Some(token), Some(recipient)) => Ok(ExtractedTransfer {
                amount,
                token,
                recipient,
            }),
            (None, _, _) => Err(TransferField::Amount),
            (_, None, _) => Err(TransferField::Token),
            (_, _, None) => Err(TransferField::Recipient),
        }
    }
}

/// A full match of the transfer grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTransfer {
    pub amount: String,
    pub token: String,
    pub recipient: String,
}

impl From<ExtractedTransfer> for PartialTransfer {
    fn from(extracted: ExtractedTransfer) -> Self {
        Self {
            amount: Some(extracted.amount),
            token: Some(extracted.token),
            recipient: Some(extracted.recipient),
        }
    }
}

/// Validated transfer awaiting the user's "yes".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferIntent {
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub token: String,
    pub recipient: String,
    pub created_at: DateTime<Utc>,
}

impl TransferIntent {
    pub fn new(amount: Decimal, token: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            amount,
            token: token.into(),
            recipient: recipient.into(),
            created_at: Utc::now(),
        }
    }

    /// Native-currency transfer as opposed to a named token.
    pub fn is_native(&self) -> bool {
        self.token.eq_ignore_ascii_case(DEFAULT_TOKEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn into_complete_reports_first_missing_field() {
        let mut partial = PartialTransfer::default();
        assert_eq!(partial.clone().into_complete(), Err(TransferField::Amount));

        partial.amount = Some("1".into());
        assert_eq!(partial.clone().into_complete(), Err(TransferField::Token));

        partial.token = Some("ETH".into());
        assert_eq!(partial.clone().into_complete(), Err(TransferField::Recipient));

        partial.recipient = Some("bob.base.eth".into());
        let complete = partial.into_complete().unwrap();
        assert_eq!(complete.recipient, "bob.base.eth");
    }

    #[test]
    fn is_native_ignores_case() {
        let amount = Decimal::from_str("1").unwrap();
        assert!(TransferIntent::new(amount, "eth", "a.base.eth").is_native());
        assert!(!TransferIntent::new(amount, "TOKEN", "a.base.eth").is_native());
    }

    #[test]
    fn intent_amount_survives_storage_encoding() {
        let intent = TransferIntent::new(Decimal::from_str("0.1").unwrap(), "ETH", "a.base.eth");
        let encoded = serde_json::to_string(&intent).unwrap();
        assert!(encoded.contains("\"amount\":\"0.1\""));
        let decoded: TransferIntent = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, intent);
    }

    #[test]
    fn conversation_id_from_chat_id() {
        assert_eq!(ConversationId::from(-1001234_i64).to_string(), "-1001234");
    }
}
