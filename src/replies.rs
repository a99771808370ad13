//! Canned reply texts and reply formatting helpers.

use crate::rate_limit::Tier;
use crate::session::CodeLanguage;

/// Longest text sent as one message. Telegram caps messages at 4096 chars;
/// transports split at this size, so a fenced block must fit it whole.
pub const MAX_MESSAGE_CHARS: usize = 4000;

pub const DEFAULT_TARGET_LANGUAGE: &str = "hindi";

/// Languages recognised as translation targets: (keyword, API value)
const TARGET_LANGUAGES: &[(&str, &str)] = &[
    ("hindi", "hindi"),
    ("हिंदी", "hindi"),
    ("english", "english"),
    ("अंग्रेजी", "english"),
    ("spanish", "spanish"),
    ("french", "french"),
    ("german", "german"),
    ("japanese", "japanese"),
    ("chinese", "chinese"),
    ("arabic", "arabic"),
];

pub fn welcome(name: Option<&str>) -> String {
    format!(
        "🤖 नमस्ते {}!\n\n\
        I'm your AI assistant. I can:\n\
        💬 Chat and answer questions\n\
        🤔 Think through hard problems step by step\n\
        🎨 Generate images and short videos\n\
        💻 Write code\n\
        🌐 Translate text\n\n\
        Pick an option below or just type your message.",
        name.unwrap_or("there")
    )
}

pub const GREETING: &str = "नमस्ते! 👋 Hello!\n\n\
    How can I help you today? Choose from the menu or just ask.";

pub const HELP: &str = "❓ Help\n\n\
    Just type naturally, I'll figure out what you need:\n\
    • \"why is the sky blue?\" → deep thinking\n\
    • \"draw a sunset over mountains\" → image\n\
    • \"make a video of waves\" → video\n\
    • \"python code to reverse a list\" → code\n\
    • \"translate good morning to hindi\" → translation\n\n\
    Commands:\n\
    /start - Main menu\n\
    /help - This message\n\
    /status - Service status\n\
    /clear - Forget our conversation";

pub const CHAT_MODE: &str = "💬 Chat mode on! Ask me anything.\n\
    मुझसे कुछ भी पूछें। Press \"Back to Menu\" when you're done.";

pub const IMAGE_MODE: &str = "🎨 Describe the image you want.\n\
    Pick a style first if you like (default: realistic).";

pub const CODE_MODE: &str = "💻 What should I write?\n\
    Pick a language or name it in your description (default: python).";

pub const TRANSLATE_MODE: &str = "🌐 Send the text to translate.\n\
    Mention the target language, e.g. \"to english\" (default: hindi).";

pub const ANALYZE_MODE: &str = "📊 Send the data or question you want analysed.";

pub const MAIN_MENU: &str = "🏠 Main menu. What next?";

pub const ANYTHING_ELSE: &str = "✨ Anything else?";

pub fn rate_limited(tier: Tier, retry_after_secs: u64) -> String {
    format!(
        "⚠️ Rate limit exceeded ({} requests).\n\
        Please try again in {}s. कृपया थोड़ी देर बाद कोशिश करें।",
        tier, retry_after_secs
    )
}

/// Reply for a remote call that failed
pub fn remote_failure(action: &str, error: &str) -> String {
    format!("❌ {} failed: {}\nकृपया दोबारा कोशिश करें।", action, error)
}

/// Generic apology for unexpected handler failures
pub fn apology(kind: &str) -> String {
    format!(
        "❌ कुछ गलत हुआ। Something went wrong, please try again.\n\nError: {}",
        kind
    )
}

/// Split text into chunks of at most `max_chars` characters, on char boundaries
pub fn split_chunks(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        let split_at = remaining
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let (chunk, rest) = remaining.split_at(split_at);
        chunks.push(chunk);
        remaining = rest;
    }
    chunks
}

/// Code wrapped in fenced blocks, each message within the Telegram limit
pub fn code_blocks(code: &str, language: CodeLanguage) -> Vec<String> {
    let open = format!("```{}\n", language.as_str());
    let close = "\n```";
    let budget = MAX_MESSAGE_CHARS - open.chars().count() - close.chars().count();

    let code = code.trim_matches('\n');
    if code.is_empty() {
        return vec![format!("{}(empty){}", open, close)];
    }
    split_chunks(code, budget)
        .into_iter()
        .map(|chunk| format!("{}{}{}", open, chunk, close))
        .collect()
}

/// Translation target named in the text. The last mentioned language wins,
/// so "translate this hindi text to english" targets english.
pub fn detect_target_language(text: &str) -> &'static str {
    let folded = text.to_lowercase();
    TARGET_LANGUAGES
        .iter()
        .filter_map(|(keyword, value)| folded.rfind(keyword).map(|pos| (pos, *value)))
        .max_by_key(|(pos, _)| *pos)
        .map(|(_, value)| value)
        .unwrap_or(DEFAULT_TARGET_LANGUAGE)
}
