//! Telegram Bot integration
//!
//! Turns Telegram updates into [`InboundEvent`]s for the [`Dispatcher`] and
//! renders the replies back with teloxide. Uses the explicit Dispatcher
//! pattern for reliable long polling.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::{
    dispatching::{Dispatcher as UpdateDispatcher, UpdateFilterExt},
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::*,
    types::{ChatAction, InputFile, ParseMode as TgParseMode, Update},
};

use crate::channel::{deliver, ChannelError, ChannelSender, InboundEvent, Keyboard, ParseMode};
use crate::dispatch::Dispatcher;
use crate::replies::{split_chunks, MAX_MESSAGE_CHARS};
use crate::telegram_ui::{markdown_to_telegram_html, reply_markup};

/// [`ChannelSender`] backed by the Bot API
#[derive(Clone)]
pub struct TelegramSender {
    bot: Bot,
}

impl TelegramSender {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Send one chunk, HTML first when requested, plain text on rejection
    async fn send_chunk(
        &self,
        chat: ChatId,
        text: &str,
        parse_mode: ParseMode,
        keyboard: Option<Keyboard>,
    ) -> Result<(), teloxide::RequestError> {
        if parse_mode == ParseMode::Markdown {
            let mut request = self
                .bot
                .send_message(chat, markdown_to_telegram_html(text))
                .parse_mode(TgParseMode::Html);
            if let Some(kb) = keyboard {
                request = request.reply_markup(reply_markup(kb));
            }
            match request.await {
                Ok(_) => return Ok(()),
                Err(e) => tracing::debug!("HTML send rejected ({}), retrying as plain text", e),
            }
        }

        let mut request = self.bot.send_message(chat, text);
        if let Some(kb) = keyboard {
            request = request.reply_markup(reply_markup(kb));
        }
        request.await?;
        Ok(())
    }
}

fn media_url(url: &str) -> Result<reqwest::Url, ChannelError> {
    reqwest::Url::parse(url).map_err(|e| ChannelError::MediaUploadFailed(format!("{}: {}", url, e)))
}

#[async_trait]
impl ChannelSender for TelegramSender {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: ParseMode,
        keyboard: Option<Keyboard>,
    ) -> Result<(), ChannelError> {
        let chat = ChatId(chat_id);
        if text.is_empty() {
            self.bot
                .send_message(chat, "(no response)")
                .await
                .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
            return Ok(());
        }

        let chunks = split_chunks(text, MAX_MESSAGE_CHARS);
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.into_iter().enumerate() {
            // keyboard goes with the final chunk
            let kb = if i == last { keyboard } else { None };
            self.send_chunk(chat, chunk, parse_mode, kb)
                .await
                .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        }
        Ok(())
    }

    async fn send_photo(&self, chat_id: i64, url: &str, caption: &str) -> Result<(), ChannelError> {
        self.bot
            .send_photo(ChatId(chat_id), InputFile::url(media_url(url)?))
            .caption(caption)
            .await
            .map_err(|e| ChannelError::MediaUploadFailed(e.to_string()))?;
        Ok(())
    }

    async fn send_video(&self, chat_id: i64, url: &str, caption: &str) -> Result<(), ChannelError> {
        self.bot
            .send_video(ChatId(chat_id), InputFile::url(media_url(url)?))
            .caption(caption)
            .await
            .map_err(|e| ChannelError::MediaUploadFailed(e.to_string()))?;
        Ok(())
    }
}

/// Shared handler state
struct BotData {
    dispatcher: Arc<Dispatcher>,
    sender: TelegramSender,
}

/// Run Telegram bot with explicit Dispatcher for reliable polling
pub async fn run_telegram_bot(token: &str, dispatcher: Arc<Dispatcher>) -> Result<()> {
    tracing::info!("===========================================");
    tracing::info!("  AI Bot Telegram - Starting...");
    tracing::info!("===========================================");

    let bot = Bot::new(token);

    // Verify bot token by calling getMe
    tracing::info!("Verifying bot token...");
    match bot.get_me().await {
        Ok(me) => {
            tracing::info!(
                "Bot authenticated: @{} (ID: {})",
                me.username.as_deref().unwrap_or("unknown"),
                me.id
            );
        }
        Err(e) => {
            tracing::error!("Failed to authenticate bot: {}", e);
            anyhow::bail!("Bot authentication failed: {}", e);
        }
    }

    // Delete any existing webhook to ensure polling works
    tracing::info!("Clearing webhook (if any)...");
    if let Err(e) = bot.delete_webhook().await {
        tracing::warn!("Failed to delete webhook: {} (continuing anyway)", e);
    }

    let handler_data = Arc::new(BotData {
        dispatcher,
        sender: TelegramSender::new(bot.clone()),
    });

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(message_handler))
        .branch(Update::filter_callback_query().endpoint(callback_handler));

    tracing::info!("Starting dispatcher with long polling...");
    tracing::info!("  Bot is now LIVE - send a message!");

    UpdateDispatcher::builder(bot, handler)
        .dependencies(dptree::deps![handler_data])
        .default_handler(|upd| async move {
            tracing::debug!("Unhandled update: {:?}", upd);
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "Error in message handler",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::warn!("Dispatcher stopped");
    Ok(())
}

/// Message handler endpoint for the dispatcher
async fn message_handler(bot: Bot, msg: Message, data: Arc<BotData>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, "Please send text messages. मुझे text में लिखें।")
            .await?;
        return Ok(());
    };

    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    let chat_id = msg.chat.id;

    tracing::info!(
        ">>> Message received: user={}, chat={}, text={:?}",
        user_id,
        chat_id,
        text.chars().take(50).collect::<String>()
    );

    // best effort; the reply itself is what matters
    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

    let event = InboundEvent::text(user_id, text).with_sender_name(&user.first_name);
    let result = data.dispatcher.dispatch(event).await;

    if let Err(e) = deliver(&data.sender, chat_id.0, result).await {
        tracing::error!("Failed to deliver reply to chat {}: {}", chat_id, e);
    }

    Ok(())
}

/// Callback query handler for inline keyboard buttons
async fn callback_handler(
    bot: Bot,
    query: CallbackQuery,
    data: Arc<BotData>,
) -> ResponseResult<()> {
    let user_id = query.from.id.0 as i64;

    // stop the client-side spinner first
    bot.answer_callback_query(&query.id).await?;

    let Some(callback_data) = query.data.as_deref() else {
        return Ok(());
    };

    let chat_id = query
        .message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or(ChatId(user_id));

    tracing::info!("Callback query: user={}, data={}", user_id, callback_data);

    let result = data
        .dispatcher
        .dispatch(InboundEvent::callback(user_id, callback_data))
        .await;

    if let Err(e) = deliver(&data.sender, chat_id.0, result).await {
        tracing::error!("Failed to deliver callback reply to chat {}: {}", chat_id, e);
    }

    Ok(())
}
