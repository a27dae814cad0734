/// Application constants

// API version
pub const API_VERSION: &str = "v1";

// Transfer grammar
pub const DEFAULT_TOKEN: &str = "ETH";
pub const RECIPIENT_SUFFIX: &str = ".base.eth";
pub const TOKEN_KEYWORDS: [&str; 2] = ["eth", "token"];
pub const AFFIRMATIVE_REPLY: &str = "yes";

// External endpoints (overridable via env)
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TRANSFER_API_URL: &str = "https://ens-asset-sender.onrender.com/send-asset";
pub const DEFAULT_EXPLORER_URL: &str = "https://sepolia.basescan.org";
pub const DEFAULT_TOPUP_URL: &str = "https://zapbase-imara1.vercel.app/";

// Timeouts
pub const DEFAULT_AI_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_TRANSFER_TIMEOUT_MS: u64 = 30_000;
pub const TELEGRAM_TIMEOUT_SECS: u64 = 10;

// Reply quality guard
pub const APOLOGY_PHRASES: [&str; 2] = ["I'm sorry", "I\u{2019}m sorry"];
pub const APOLOGY_REPEAT_THRESHOLD: usize = 3;

// Telegram redelivery window
pub const SEEN_UPDATES_CAPACITY: usize = 1024;

// Redis key namespace
pub const REDIS_KEY_PREFIX: &str = "zapbase:conversation";

pub const ASSISTANT_CONTEXT: &str = "You are a helpful assistant called Frechi for a crypto application called ZapBase. The user can ask for their balance, transfer ETH using a wallet address or basename i.e username.base.eth, check token prices, or tip the app Zapbase'. Be empathetic and please respond to the following message:";
