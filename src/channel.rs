//! Channel Types
//!
//! Transport-neutral inbound events and outbound sends. The dispatcher only
//! sees these types; a transport (Telegram) turns updates into
//! [`InboundEvent`]s and renders [`Outbound`]s through a [`ChannelSender`].

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use crate::UserId;

/// Error types for channel operations
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Media upload failed: {0}")]
    MediaUploadFailed(String),
}

/// What the user did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    /// A text message (commands and menu buttons included)
    Text(String),
    /// Inline button press carrying its callback data
    Callback(String),
}

/// One inbound action from one user
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub user_id: UserId,
    pub kind: InboundKind,
    /// Display name, used for the welcome message
    pub sender_name: Option<String>,
}

impl InboundEvent {
    pub fn text(user_id: UserId, text: &str) -> Self {
        Self {
            user_id,
            kind: InboundKind::Text(text.to_string()),
            sender_name: None,
        }
    }

    pub fn callback(user_id: UserId, data: &str) -> Self {
        Self {
            user_id,
            kind: InboundKind::Callback(data.to_string()),
            sender_name: None,
        }
    }

    pub fn with_sender_name(mut self, name: &str) -> Self {
        self.sender_name = Some(name.to_string());
        self
    }
}

/// Keyboard to attach to a text reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Keyboard {
    MainMenu,
    ChatOptions,
    ImageStyles,
    CodeLanguages,
}

/// Parse mode for message formatting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    Markdown,
    #[default]
    Plain,
}

/// A single send to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Text {
        text: String,
        parse_mode: ParseMode,
        keyboard: Option<Keyboard>,
    },
    Photo {
        url: String,
        caption: String,
    },
    Video {
        url: String,
        caption: String,
    },
}

impl Outbound {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            parse_mode: ParseMode::Plain,
            keyboard: None,
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            parse_mode: ParseMode::Markdown,
            keyboard: None,
        }
    }

    /// Attach a keyboard. Media sends are left unchanged.
    pub fn with_keyboard(mut self, kb: Keyboard) -> Self {
        if let Self::Text { keyboard, .. } = &mut self {
            *keyboard = Some(kb);
        }
        self
    }

    /// Text content or caption
    pub fn body(&self) -> &str {
        match self {
            Self::Text { text, .. } => text,
            Self::Photo { caption, .. } | Self::Video { caption, .. } => caption,
        }
    }
}

/// Outcome of the guarded dispatch entry point
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResult {
    /// Handler ran; send these in order (may be empty)
    Replied(Vec<Outbound>),
    /// Handler errored or panicked; send the notice only
    Failed { notice: String },
}

impl DispatchResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Everything the user will see, in send order
    pub fn into_outbound(self) -> Vec<Outbound> {
        match self {
            Self::Replied(replies) => replies,
            Self::Failed { notice } => {
                vec![Outbound::text(notice).with_keyboard(Keyboard::MainMenu)]
            }
        }
    }
}

/// Sender trait implemented by each transport
#[async_trait]
pub trait ChannelSender: Send + Sync {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: ParseMode,
        keyboard: Option<Keyboard>,
    ) -> Result<(), ChannelError>;

    async fn send_photo(&self, chat_id: i64, url: &str, caption: &str) -> Result<(), ChannelError>;

    async fn send_video(&self, chat_id: i64, url: &str, caption: &str) -> Result<(), ChannelError>;
}

/// Render a dispatch result into a chat (the user's private chat for
/// direct messages).
///
/// A media send that fails falls back to a text message with the link.
/// Returns the number of messages delivered.
pub async fn deliver<S>(
    sender: &S,
    chat_id: i64,
    result: DispatchResult,
) -> Result<usize, ChannelError>
where
    S: ChannelSender + ?Sized,
{
    let mut sent = 0;
    for outbound in result.into_outbound() {
        match outbound {
            Outbound::Text {
                text,
                parse_mode,
                keyboard,
            } => {
                sender.send_text(chat_id, &text, parse_mode, keyboard).await?;
            }
            Outbound::Photo { url, caption } => {
                if let Err(e) = sender.send_photo(chat_id, &url, &caption).await {
                    warn!("Photo send failed for chat {}: {}", chat_id, e);
                    let fallback = format!("{}\n\n🖼 {}", caption, url);
                    sender.send_text(chat_id, &fallback, ParseMode::Plain, None).await?;
                }
            }
            Outbound::Video { url, caption } => {
                if let Err(e) = sender.send_video(chat_id, &url, &caption).await {
                    warn!("Video send failed for chat {}: {}", chat_id, e);
                    let fallback = format!("{}\n\n🎬 {}", caption, url);
                    sender.send_text(chat_id, &fallback, ParseMode::Plain, None).await?;
                }
            }
        }
        sent += 1;
    }
    Ok(sent)
}
