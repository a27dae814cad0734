// src/models/mod.rs
pub mod telegram;
pub mod transfer;

pub use telegram::{Message, TelegramResponse, TelegramUser, Update};
pub use transfer::{
    ConversationId, ConversationState, ExtractedTransfer, PartialTransfer, TransferField,
    TransferIntent,
};
