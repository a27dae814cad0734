pub mod telegram;

pub use telegram::{MessageSender, TelegramClient};
