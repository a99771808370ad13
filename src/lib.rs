//! AI Bot
//!
//! Telegram front-end for a remote AI service: chat, step-by-step reasoning,
//! code, translation, image and video generation.
//!
//! # Features
//!
//! - **Intent Routing**: Ordered keyword table, English, Hinglish and Devanagari
//! - **Tiered Rate Limits**: Sliding windows per user for standard, thinking and generation calls
//! - **Conversation Memory**: Bounded per-user history injected as prompt context
//! - **Menu Modes**: Reply keyboards and inline choices for style and language
//! - **Status**: `/status` command and optional HTTP health endpoints
//!
//! # Architecture
//!
//! ```text
//! Telegram ──► telegram.rs ──► Dispatcher ──► RemoteAiClient ──► AI API
//!  (teloxide)   InboundEvent       │            (reqwest)
//!                                  ├── RateLimiter (DashMap)
//!                                  ├── IntentClassifier
//!                                  ├── ConversationMemory (DashMap)
//!                                  └── SessionStore (menu modes)
//! ```

pub mod ai_client;
pub mod channel;
pub mod config;
pub mod dispatch;
pub mod intent;
pub mod memory;
pub mod rate_limit;
pub mod replies;
pub mod session;
pub mod status;
pub mod telegram;
pub mod telegram_ui;

/// Telegram user id
pub type UserId = i64;

pub use ai_client::{AiBackend, AiError, AiTimeouts, RemoteAiClient};
pub use channel::{
    deliver, ChannelError, ChannelSender, DispatchResult, InboundEvent, InboundKind, Keyboard,
    Outbound,
};
pub use config::{Config, ConfigError};
pub use dispatch::{guarded, DispatchSettings, Dispatcher, Handler, RemoteOp};
pub use intent::{IntentCategory, IntentClassifier, IntentDefinition, IntentResult};
pub use memory::{ConversationMemory, MemoryEntry, MemoryStats, Role};
pub use rate_limit::{RateLimitStats, RateLimiter, Tier, TierBudget, TierBudgets};
pub use session::{CodeLanguage, ImageStyle, Mode, SessionStore};
pub use status::StatusReport;
