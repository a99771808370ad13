//! Per-user Menu Sessions
//!
//! Tracks which menu mode a user picked (so the next message goes straight
//! to that handler) and the inline choices made for image style and code
//! language. Transport-agnostic: menu labels and callback data are plain
//! strings here, keyboards are rendered by the transport.

use dashmap::DashMap;
use serde::Serialize;
use std::fmt;

use crate::UserId;

/// Menu mode routing the next message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Persists until "Back to Menu"
    Chat,
    Image,
    Code,
    Translate,
    Analyze,
}

impl Mode {
    /// Whether the mode survives the message it routes
    pub fn is_sticky(&self) -> bool {
        matches!(self, Mode::Chat)
    }
}

/// Reply-keyboard button presses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Enter(Mode),
    BackToMenu,
}

pub const MAIN_MENU: [&str; 6] = [
    "💬 Chat with AI",
    "🎨 Generate Image",
    "💻 Generate Code",
    "🌐 Translate",
    "📊 Analyze Data",
    "❓ Help",
];

pub const CHAT_OPTIONS: [&str; 4] = [
    "📝 Quick Chat",
    "🤔 Focused Question",
    "💡 Brainstorm",
    "⬅️ Back to Menu",
];

impl MenuChoice {
    /// Detect a menu button in message text.
    ///
    /// Case-sensitive containment of the button label, so typed text that
    /// contains a label (e.g. "Translate this") also selects the mode.
    pub fn from_text(text: &str) -> Option<Self> {
        if text.contains("Back to Menu") {
            Some(Self::BackToMenu)
        } else if text.contains("Chat with AI") {
            Some(Self::Enter(Mode::Chat))
        } else if text.contains("Generate Image") {
            Some(Self::Enter(Mode::Image))
        } else if text.contains("Generate Code") {
            Some(Self::Enter(Mode::Code))
        } else if text.contains("Translate") {
            Some(Self::Enter(Mode::Translate))
        } else if text.contains("Analyze Data") {
            Some(Self::Enter(Mode::Analyze))
        } else {
            None
        }
    }
}

/// Image styles offered as inline buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStyle {
    #[default]
    Realistic,
    Artistic,
    Render3d,
    Fantasy,
}

impl ImageStyle {
    pub const ALL: [ImageStyle; 4] = [
        Self::Realistic,
        Self::Artistic,
        Self::Render3d,
        Self::Fantasy,
    ];

    /// Value sent to the image API
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Realistic => "realistic",
            Self::Artistic => "artistic",
            Self::Render3d => "3d",
            Self::Fantasy => "fantasy",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Realistic => "🎨 Realistic",
            Self::Artistic => "🌈 Artistic",
            Self::Render3d => "🎮 3D Render",
            Self::Fantasy => "✨ Fantasy",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|style| style.as_str() == s)
    }
}

/// Languages offered for code generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeLanguage {
    #[default]
    Python,
    JavaScript,
    Java,
    Rust,
}

impl CodeLanguage {
    pub const ALL: [CodeLanguage; 4] = [Self::Python, Self::JavaScript, Self::Java, Self::Rust];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::Java => "java",
            Self::Rust => "rust",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Python => "🐍 Python",
            Self::JavaScript => "📚 JavaScript",
            Self::Java => "☕ Java",
            Self::Rust => "🦀 Rust",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|lang| lang.as_str() == s)
    }

    /// Language named in free text. "javascript" is checked before "java".
    pub fn detect(text: &str) -> Option<Self> {
        let folded = text.to_lowercase();
        [Self::JavaScript, Self::Python, Self::Rust, Self::Java]
            .into_iter()
            .find(|lang| folded.contains(lang.as_str()))
    }
}

impl fmt::Display for CodeLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inline button callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    ImageStyle(ImageStyle),
    CodeLanguage(CodeLanguage),
}

impl CallbackAction {
    /// Encode action as callback data string
    pub fn encode(&self) -> String {
        match self {
            Self::ImageStyle(style) => format!("img_{}", style.as_str()),
            Self::CodeLanguage(lang) => format!("code_{}", lang.as_str()),
        }
    }

    /// Decode callback data string to action
    pub fn decode(data: &str) -> Option<Self> {
        if let Some(style) = data.strip_prefix("img_") {
            return ImageStyle::from_str(style).map(Self::ImageStyle);
        }
        if let Some(lang) = data.strip_prefix("code_") {
            return CodeLanguage::from_str(lang).map(Self::CodeLanguage);
        }
        None
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Session {
    mode: Option<Mode>,
    image_style: Option<ImageStyle>,
    code_language: Option<CodeLanguage>,
}

/// Per-user session table
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<UserId, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self, user: UserId, mode: Mode) {
        self.sessions.entry(user).or_default().mode = Some(mode);
    }

    /// Leave any mode and forget inline choices
    pub fn reset(&self, user: UserId) {
        self.sessions.remove(&user);
    }

    pub fn exit(&self, user: UserId) {
        if let Some(mut session) = self.sessions.get_mut(&user) {
            session.mode = None;
        }
    }

    /// Pending mode, left in place
    pub fn mode(&self, user: UserId) -> Option<Mode> {
        self.sessions.get(&user).and_then(|s| s.mode)
    }

    /// Mode that should route the current message. One-shot modes are consumed.
    pub fn take_mode(&self, user: UserId) -> Option<Mode> {
        let mut session = self.sessions.get_mut(&user)?;
        let mode = session.mode?;
        if !mode.is_sticky() {
            session.mode = None;
        }
        Some(mode)
    }

    pub fn set_image_style(&self, user: UserId, style: ImageStyle) {
        self.sessions.entry(user).or_default().image_style = Some(style);
    }

    pub fn set_code_language(&self, user: UserId, lang: CodeLanguage) {
        self.sessions.entry(user).or_default().code_language = Some(lang);
    }

    pub fn image_style(&self, user: UserId) -> ImageStyle {
        self.sessions
            .get(&user)
            .and_then(|s| s.image_style)
            .unwrap_or_default()
    }

    /// Chosen language, if the user picked one
    pub fn code_language(&self, user: UserId) -> Option<CodeLanguage> {
        self.sessions.get(&user).and_then(|s| s.code_language)
    }
}
