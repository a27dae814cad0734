use crate::{
    constants::{DEFAULT_TOKEN, RECIPIENT_SUFFIX, TOKEN_KEYWORDS},
    models::{ExtractedTransfer, PartialTransfer},
};
use regex::Regex;
use std::sync::LazyLock;

// Example: "Send 0.5 ETH to john.doe.base.eth"
static TRANSFER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)send\s+([0-9.]+)\s*(eth|token)?\s+to\s+([a-zA-Z0-9.-]+\.base\.eth)")
        .expect("transfer pattern must compile")
});

fn is_token_keyword(word: &str) -> bool {
    TOKEN_KEYWORDS
        .iter()
        .any(|keyword| word.eq_ignore_ascii_case(keyword))
}

fn looks_like_recipient(word: &str) -> bool {
    word.len() > RECIPIENT_SUFFIX.len()
        && word
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '.' || ch == '-')
        && word.to_ascii_lowercase().ends_with(RECIPIENT_SUFFIX)
}

/// Intent Extractor - turns free-form chat text into transfer fields
#[derive(Debug, Clone, Default)]
pub struct IntentExtractor;

impl IntentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Matches the transfer grammar. `None` means the message is not a
    /// complete transfer command. The amount is returned exactly as typed.
    pub fn extract(&self, text: &str) -> Option<ExtractedTransfer> {
        let captures = TRANSFER_PATTERN.captures(text)?;
        let amount = captures.get(1)?.as_str().to_string();
        let token = captures
            .get(2)
            .map(|m| m.as_str().to_ascii_uppercase())
            .unwrap_or_else(|| DEFAULT_TOKEN.to_string());
        let recipient = captures.get(3)?.as_str().to_string();

        Some(ExtractedTransfer {
            amount,
            token,
            recipient,
        })
    }

    /// Field-by-field scan for messages that start like a transfer but do not
    /// match the grammar, so the user can be told which part is missing.
    pub fn scan_fields(&self, text: &str) -> PartialTransfer {
        let words: Vec<&str> = text.split_whitespace().collect();
        let Some(start) = words
            .iter()
            .position(|word| word.eq_ignore_ascii_case("send"))
        else {
            return PartialTransfer::default();
        };
        let rest = &words[start + 1..];

        let amount = rest
            .first()
            .filter(|word| !is_token_keyword(word) && !word.eq_ignore_ascii_case("to"))
            .map(|word| word.to_string());

        let token = rest
            .iter()
            .find(|word| is_token_keyword(word))
            .map(|word| word.to_ascii_uppercase())
            .or_else(|| amount.as_ref().map(|_| DEFAULT_TOKEN.to_string()));

        let recipient = rest
            .iter()
            .position(|word| word.eq_ignore_ascii_case("to"))
            .and_then(|idx| rest.get(idx + 1))
            .map(|word| word.trim_end_matches(['!', '?', ',']))
            .filter(|word| looks_like_recipient(word))
            .map(|word| word.to_string());

        PartialTransfer {
            amount,
            token,
            recipient,
        }
    }
}
