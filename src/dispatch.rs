//! Message Dispatch
//!
//! Single entry point from a transport into the bot. For each inbound event:
//!
//! 1. Standard-tier rate check (every action, commands and buttons included)
//! 2. Commands, menu buttons and inline callbacks
//! 3. Pending menu mode, otherwise intent classification
//! 4. Stricter tier check for thinking and generation handlers
//! 5. Remote call with conversation context; the reply is remembered only
//!    when the call succeeds
//!
//! [`Dispatcher::dispatch`] never fails: handler errors and panics come back
//! as [`DispatchResult::Failed`] carrying a user-facing apology.

use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::ai_client::{AiBackend, AiError};
use crate::channel::{DispatchResult, InboundEvent, InboundKind, Keyboard, Outbound};
use crate::config::Config;
use crate::intent::{IntentCategory, IntentClassifier, IntentTableError};
use crate::memory::{ConversationMemory, Role};
use crate::rate_limit::{RateLimiter, Tier};
use crate::replies;
use crate::session::{CallbackAction, CodeLanguage, MenuChoice, Mode, SessionStore};
use crate::status::StatusReport;
use crate::UserId;

pub const DEFAULT_VIDEO_SECS: u32 = 5;

/// What handles a message once it is routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Canned reply, never stored in memory
    Greeting,
    Help,
    /// Call to the AI backend
    Remote(RemoteOp),
}

/// Backend operation behind a remote handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    Chat,
    DeepThinking,
    Code,
    Translate,
    Image,
    Video,
}

impl Handler {
    pub fn for_intent(category: IntentCategory) -> Self {
        match category {
            IntentCategory::Greeting => Self::Greeting,
            IntentCategory::Help => Self::Help,
            IntentCategory::DeepThinking | IntentCategory::Analyze => {
                Self::Remote(RemoteOp::DeepThinking)
            }
            IntentCategory::Chat | IntentCategory::GeneralChat => Self::Remote(RemoteOp::Chat),
            IntentCategory::Image => Self::Remote(RemoteOp::Image),
            IntentCategory::Video => Self::Remote(RemoteOp::Video),
            IntentCategory::Code => Self::Remote(RemoteOp::Code),
            IntentCategory::Translate => Self::Remote(RemoteOp::Translate),
        }
    }

    pub fn for_mode(mode: Mode) -> Self {
        Self::Remote(match mode {
            Mode::Chat => RemoteOp::Chat,
            Mode::Image => RemoteOp::Image,
            Mode::Code => RemoteOp::Code,
            Mode::Translate => RemoteOp::Translate,
            Mode::Analyze => RemoteOp::DeepThinking,
        })
    }

    /// Rate-limit tier charged for this handler
    pub fn tier(&self) -> Tier {
        match self {
            Self::Remote(RemoteOp::DeepThinking) => Tier::Thinking,
            Self::Remote(RemoteOp::Image | RemoteOp::Video) => Tier::Generation,
            _ => Tier::Standard,
        }
    }
}

impl RemoteOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::DeepThinking => "deep_thinking",
            Self::Code => "code",
            Self::Translate => "translate",
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    fn action(&self) -> &'static str {
        match self {
            Self::Chat => "Chat",
            Self::DeepThinking => "Deep thinking",
            Self::Code => "Code generation",
            Self::Translate => "Translation",
            Self::Image => "Image generation",
            Self::Video => "Video generation",
        }
    }
}

/// Dispatcher knobs not owned by the components
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Memory entries rendered into the prompt context
    pub context_messages: usize,
    pub admin_id: Option<UserId>,
    pub video_duration_secs: u32,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            context_messages: 6,
            admin_id: None,
            video_duration_secs: DEFAULT_VIDEO_SECS,
        }
    }
}

impl DispatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            context_messages: config.context_messages,
            admin_id: config.admin_id,
            ..Self::default()
        }
    }

    pub fn is_admin(&self, user: UserId) -> bool {
        self.admin_id == Some(user)
    }
}

/// Remote reply ready to send, plus what to remember of it
struct Produced {
    replies: Vec<Outbound>,
    remembered: String,
}

/// Routes inbound events to handlers
pub struct Dispatcher {
    limiter: Arc<RateLimiter>,
    memory: Arc<ConversationMemory>,
    classifier: IntentClassifier,
    ai: Arc<dyn AiBackend>,
    sessions: SessionStore,
    settings: DispatchSettings,
    started_at: Instant,
}

impl Dispatcher {
    pub fn new(
        limiter: Arc<RateLimiter>,
        memory: Arc<ConversationMemory>,
        classifier: IntentClassifier,
        ai: Arc<dyn AiBackend>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            limiter,
            memory,
            classifier,
            ai,
            sessions: SessionStore::new(),
            settings,
            started_at: Instant::now(),
        }
    }

    /// Build every component from configuration
    pub fn from_config(config: &Config, ai: Arc<dyn AiBackend>) -> Result<Self, IntentTableError> {
        let classifier = match &config.intents_path {
            Some(path) => {
                let classifier = IntentClassifier::from_toml_file(path)?;
                info!("Loaded {} intents from {:?}", classifier.intents().len(), path);
                classifier
            }
            None => IntentClassifier::new(),
        };

        Ok(Self::new(
            Arc::new(RateLimiter::new(config.tier_budgets)),
            Arc::new(ConversationMemory::new(config.memory_capacity)),
            classifier,
            ai,
            DispatchSettings::from_config(config),
        ))
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub async fn status_report(&self) -> StatusReport {
        StatusReport::collect(
            &self.limiter,
            &self.memory,
            self.ai.as_ref(),
            self.started_at.elapsed().as_secs(),
        )
        .await
    }

    /// Handle one inbound event. Never fails and never panics.
    pub async fn dispatch(&self, event: InboundEvent) -> DispatchResult {
        let span = info_span!(
            "dispatch",
            user_id = event.user_id,
            request_id = %Uuid::new_v4()
        );
        guarded(self.route(event)).instrument(span).await
    }

    async fn route(&self, event: InboundEvent) -> anyhow::Result<Vec<Outbound>> {
        let user = event.user_id;

        if !self.limiter.is_allowed(user, Tier::Standard) {
            return Ok(vec![self.rate_limited(user, Tier::Standard)]);
        }

        match event.kind {
            InboundKind::Callback(data) => Ok(self.on_callback(user, &data)),
            InboundKind::Text(text) => {
                self.on_text(user, &text, event.sender_name.as_deref()).await
            }
        }
    }

    async fn on_text(
        &self,
        user: UserId,
        text: &str,
        sender_name: Option<&str>,
    ) -> anyhow::Result<Vec<Outbound>> {
        if text.starts_with('/') {
            return Ok(self.on_command(user, text, sender_name).await);
        }

        if let Some(choice) = MenuChoice::from_text(text) {
            return Ok(vec![self.on_menu(user, choice)]);
        }

        // a pending mode is only used up once the stricter tier admits the call
        let pending = self.sessions.mode(user);
        let handler = match pending {
            Some(mode) => {
                debug!("Routing by {:?} mode", mode);
                Handler::for_mode(mode)
            }
            None => {
                let intent = self.classifier.recognize_intent(text);
                info!(
                    "Intent: {} ({}, confidence {:.2})",
                    intent.intent,
                    intent.category.as_str(),
                    intent.confidence
                );
                Handler::for_intent(intent.category)
            }
        };

        let tier = handler.tier();
        if tier != Tier::Standard && !self.limiter.is_allowed(user, tier) {
            return Ok(vec![self.rate_limited(user, tier)]);
        }
        if pending.is_some() {
            self.sessions.take_mode(user);
        }

        Ok(match handler {
            Handler::Greeting => {
                vec![Outbound::text(replies::GREETING).with_keyboard(Keyboard::MainMenu)]
            }
            Handler::Help => vec![Outbound::text(replies::HELP).with_keyboard(Keyboard::MainMenu)],
            Handler::Remote(op) => self.run_remote(user, op, text).await,
        })
    }

    async fn run_remote(&self, user: UserId, op: RemoteOp, text: &str) -> Vec<Outbound> {
        self.memory.add_message(user, Role::User, text);
        let context = self
            .memory
            .get_context_string(user, self.settings.context_messages);

        let started = Instant::now();
        let outcome = self.call_backend(user, op, text, &context).await;

        match outcome {
            Ok(produced) => {
                info!("{} handled in {:?}", op.name(), started.elapsed());
                self.memory.add_message(user, Role::Bot, &produced.remembered);
                produced.replies
            }
            Err(e) => {
                warn!("{} failed after {:?}: {}", op.name(), started.elapsed(), e);
                let notice = replies::remote_failure(op.action(), &e.to_string());
                vec![Outbound::text(notice).with_keyboard(Keyboard::MainMenu)]
            }
        }
    }

    async fn call_backend(
        &self,
        user: UserId,
        op: RemoteOp,
        text: &str,
        context: &str,
    ) -> Result<Produced, AiError> {
        match op {
            RemoteOp::Chat => {
                let reply = self.ai.chat(text, context).await?;
                Ok(Produced {
                    replies: vec![Outbound::text(reply.clone())],
                    remembered: reply,
                })
            }
            RemoteOp::DeepThinking => {
                let reply = self.ai.think(text, context).await?;
                Ok(Produced {
                    replies: vec![Outbound::text(format!("🤔 {}", reply))],
                    remembered: reply,
                })
            }
            RemoteOp::Code => {
                let language = CodeLanguage::detect(text)
                    .or_else(|| self.sessions.code_language(user))
                    .unwrap_or_default();
                let code = self.ai.generate_code(text, language.as_str()).await?;
                let mut blocks: Vec<Outbound> = replies::code_blocks(&code, language)
                    .into_iter()
                    .map(Outbound::markdown)
                    .collect();
                blocks.push(
                    Outbound::text(replies::ANYTHING_ELSE).with_keyboard(Keyboard::MainMenu),
                );
                Ok(Produced {
                    replies: blocks,
                    remembered: code,
                })
            }
            RemoteOp::Translate => {
                let target = replies::detect_target_language(text);
                let translated = self.ai.translate(text, target).await?;
                let body = format!("🌐 Translation ({}):\n\n{}", target, translated);
                Ok(Produced {
                    replies: vec![Outbound::text(body).with_keyboard(Keyboard::MainMenu)],
                    remembered: translated,
                })
            }
            RemoteOp::Image => {
                let style = self.sessions.image_style(user);
                let url = self.ai.generate_image(text, style.as_str()).await?;
                Ok(Produced {
                    replies: vec![
                        Outbound::Photo {
                            url: url.clone(),
                            caption: format!("🎨 {} ({})", text, style.as_str()),
                        },
                        Outbound::text(replies::ANYTHING_ELSE).with_keyboard(Keyboard::MainMenu),
                    ],
                    remembered: format!("[image] {}", url),
                })
            }
            RemoteOp::Video => {
                let url = self
                    .ai
                    .generate_video(text, self.settings.video_duration_secs)
                    .await?;
                Ok(Produced {
                    replies: vec![
                        Outbound::Video {
                            url: url.clone(),
                            caption: format!("🎬 {}", text),
                        },
                        Outbound::text(replies::ANYTHING_ELSE).with_keyboard(Keyboard::MainMenu),
                    ],
                    remembered: format!("[video] {}", url),
                })
            }
        }
    }

    async fn on_command(
        &self,
        user: UserId,
        text: &str,
        sender_name: Option<&str>,
    ) -> Vec<Outbound> {
        let mut parts = text.splitn(2, char::is_whitespace);
        // "/start@my_bot" addresses this bot in group chats
        let cmd = parts
            .next()
            .unwrap_or_default()
            .split('@')
            .next()
            .unwrap_or_default();
        let args = parts.next().unwrap_or("").trim();

        info!("Command {}", cmd);
        match cmd {
            "/start" => {
                self.sessions.reset(user);
                self.memory.clear_history(user);
                let welcome = replies::welcome(sender_name);
                vec![Outbound::text(welcome).with_keyboard(Keyboard::MainMenu)]
            }
            "/help" => vec![Outbound::text(replies::HELP).with_keyboard(Keyboard::MainMenu)],
            "/status" => vec![Outbound::text(self.status_report().await.to_text())],
            "/clear" => {
                self.sessions.exit(user);
                let text = if self.memory.clear_history(user) {
                    "🧹 Conversation history cleared."
                } else {
                    "Nothing to clear."
                };
                vec![Outbound::text(text)]
            }
            "/reset" => vec![Outbound::text(self.reset_limits(user, args))],
            _ => vec![Outbound::text("Unknown command. Try /help")],
        }
    }

    fn reset_limits(&self, user: UserId, args: &str) -> String {
        if !self.settings.is_admin(user) {
            warn!("Non-admin {} tried /reset", user);
            return "⛔ Admin only.".to_string();
        }
        let target = if args.is_empty() {
            user
        } else {
            match args.parse::<UserId>() {
                Ok(id) => id,
                Err(_) => return "Usage: /reset <user_id>".to_string(),
            }
        };
        if self.limiter.reset_user(target) {
            info!("Admin reset rate limits for {}", target);
            format!("✅ Rate limits reset for {}", target)
        } else {
            format!("No rate-limit history for {}", target)
        }
    }

    fn on_menu(&self, user: UserId, choice: MenuChoice) -> Outbound {
        match choice {
            MenuChoice::BackToMenu => {
                self.sessions.exit(user);
                Outbound::text(replies::MAIN_MENU).with_keyboard(Keyboard::MainMenu)
            }
            MenuChoice::Enter(mode) => {
                self.sessions.enter(user, mode);
                debug!("Entered {:?} mode", mode);
                match mode {
                    Mode::Chat => {
                        Outbound::text(replies::CHAT_MODE).with_keyboard(Keyboard::ChatOptions)
                    }
                    Mode::Image => {
                        Outbound::text(replies::IMAGE_MODE).with_keyboard(Keyboard::ImageStyles)
                    }
                    Mode::Code => {
                        Outbound::text(replies::CODE_MODE).with_keyboard(Keyboard::CodeLanguages)
                    }
                    Mode::Translate => Outbound::text(replies::TRANSLATE_MODE),
                    Mode::Analyze => Outbound::text(replies::ANALYZE_MODE),
                }
            }
        }
    }

    fn on_callback(&self, user: UserId, data: &str) -> Vec<Outbound> {
        match CallbackAction::decode(data) {
            Some(CallbackAction::ImageStyle(style)) => {
                self.sessions.set_image_style(user, style);
                vec![Outbound::text(format!(
                    "{} selected. Now describe your image.",
                    style.label()
                ))]
            }
            Some(CallbackAction::CodeLanguage(language)) => {
                self.sessions.set_code_language(user, language);
                vec![Outbound::text(format!(
                    "{} selected. Now describe the code you need.",
                    language.label()
                ))]
            }
            None => {
                debug!("Ignoring unknown callback {:?}", data);
                Vec::new()
            }
        }
    }

    fn rate_limited(&self, user: UserId, tier: Tier) -> Outbound {
        Outbound::text(replies::rate_limited(tier, self.limiter.retry_after(user, tier)))
    }
}

/// Run a handler future, turning errors and panics into a failure notice
pub async fn guarded<F>(handler: F) -> DispatchResult
where
    F: Future<Output = anyhow::Result<Vec<Outbound>>>,
{
    match AssertUnwindSafe(handler).catch_unwind().await {
        Ok(Ok(replies)) => DispatchResult::Replied(replies),
        Ok(Err(e)) => {
            error!("Handler failed: {:#}", e);
            DispatchResult::Failed {
                notice: replies::apology("handler error"),
            }
        }
        Err(payload) => {
            error!("Handler panicked: {}", panic_message(payload.as_ref()));
            DispatchResult::Failed {
                notice: replies::apology("panic"),
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
