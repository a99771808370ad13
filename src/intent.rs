//! Keyword Intent Classifier
//!
//! Maps free text to an intent category with ordered substring lookup.
//!
//! Two passes over an ordered table:
//! 1. High-priority intents (deep thinking) - confidence 0.95
//! 2. Everything else in declaration order - confidence 0.85
//!
//! No match falls back to general chat at 0.5. Matching is plain substring
//! containment on the lowercased text, so a short keyword inside a longer
//! word ("hi" in "this") still matches. Table order decides ties.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

pub const HIGH_PRIORITY_CONFIDENCE: f32 = 0.95;
pub const KEYWORD_CONFIDENCE: f32 = 0.85;
pub const FALLBACK_CONFIDENCE: f32 = 0.5;

/// Intent categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    DeepThinking,
    Greeting,
    Help,
    Chat,
    Image,
    Video,
    Code,
    Translate,
    Analyze,
    /// Fallback when nothing matches
    GeneralChat,
}

impl IntentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeepThinking => "deep_thinking",
            Self::Greeting => "greeting",
            Self::Help => "help",
            Self::Chat => "chat",
            Self::Image => "image",
            Self::Video => "video",
            Self::Code => "code",
            Self::Translate => "translate",
            Self::Analyze => "analyze",
            Self::GeneralChat => "general_chat",
        }
    }
}

impl fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which pass an intent is evaluated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Normal,
}

/// One row of the intent table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDefinition {
    pub name: String,
    pub category: IntentCategory,
    #[serde(default)]
    pub priority: Priority,
    pub keywords: Vec<String>,
}

impl IntentDefinition {
    fn new(name: &str, category: IntentCategory, priority: Priority, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            category,
            priority,
            // stored pre-folded so matching is a plain `contains`
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// First keyword of this intent contained in `folded`
    fn matching_keyword(&self, folded: &str) -> Option<&str> {
        self.keywords
            .iter()
            .map(String::as_str)
            .find(|kw| !kw.is_empty() && folded.contains(kw))
    }
}

/// Classification outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentResult {
    pub category: IntentCategory,
    /// Name of the matched table row, `general_query` for the fallback
    pub intent: String,
    pub confidence: f32,
    /// The text that was classified
    pub matched_text: String,
    /// Keyword that triggered the match
    pub keyword: Option<String>,
}

/// Errors loading a custom intent table
#[derive(Debug, thiserror::Error)]
pub enum IntentTableError {
    #[error("Failed to read intent table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid intent table: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Intent table is empty")]
    Empty,

    #[error("Intent '{0}' has no keywords")]
    NoKeywords(String),
}

#[derive(Deserialize)]
struct IntentTableFile {
    intents: Vec<IntentDefinition>,
}

static DEFAULT_TABLE: Lazy<Vec<IntentDefinition>> = Lazy::new(|| {
    use IntentCategory::*;
    use Priority::*;
    vec![
        IntentDefinition::new("deep_thinking", DeepThinking, High, &[
            "why", "think deeply", "deep analysis", "reason", "in detail", "step by step",
            "kyun", "kyon", "soch kar", "क्यों", "सोचो", "विस्तार से",
        ]),
        IntentDefinition::new("greeting", Greeting, Normal, &[
            "hello", "hi", "hey", "namaste", "salaam", "haan", "assalamu",
            "नमस्ते", "हाय", "हेलो",
        ]),
        IntentDefinition::new("help", Help, Normal, &[
            "help", "sahayata", "madad", "kya kar sakte ho", "features",
            "कैसे काम करता है", "मदद", "सहायता",
        ]),
        IntentDefinition::new("chat", Chat, Normal, &[
            "baat karo", "chat", "conversation", "gup shup", "baatein",
            "बातें", "गुप्शप", "बात",
        ]),
        IntentDefinition::new("image", Image, Normal, &[
            "image", "photo", "picture", "tasveer", "draw", "banao",
            "generate", "तस्वीर", "फोटो",
        ]),
        IntentDefinition::new("video", Video, Normal, &[
            "video", "clip", "animation", "movie", "वीडियो",
        ]),
        IntentDefinition::new("code", Code, Normal, &[
            "code", "program", "python", "javascript", "likh do", "likho",
            "कोड", "प्रोग्राम",
        ]),
        IntentDefinition::new("translate", Translate, Normal, &[
            "translate", "hindi", "english", "spanish", "french", "anuvaad",
            "अनुवाद", "अनुवाद करो",
        ]),
        IntentDefinition::new("analyze", Analyze, Normal, &[
            "analyze", "analysis", "data", "samajh", "analyse karo",
            "विश्लेषण", "डेटा",
        ]),
    ]
});

/// Ordered keyword classifier. Immutable after construction.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    intents: Vec<IntentDefinition>,
}

impl IntentClassifier {
    /// Classifier over the built-in table
    pub fn new() -> Self {
        Self {
            intents: DEFAULT_TABLE.clone(),
        }
    }

    /// Classifier over a custom table, preserving its order
    pub fn with_intents(intents: Vec<IntentDefinition>) -> Result<Self, IntentTableError> {
        if intents.is_empty() {
            return Err(IntentTableError::Empty);
        }
        let intents = intents
            .into_iter()
            .map(|mut def| {
                def.keywords = def
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect();
                if def.keywords.is_empty() {
                    Err(IntentTableError::NoKeywords(def.name))
                } else {
                    Ok(def)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { intents })
    }

    /// Parse a TOML table of `[[intents]]` rows
    pub fn from_toml_str(s: &str) -> Result<Self, IntentTableError> {
        let file: IntentTableFile = toml::from_str(s)?;
        Self::with_intents(file.intents)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, IntentTableError> {
        let raw = std::fs::read_to_string(path).map_err(|source| IntentTableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn intents(&self) -> &[IntentDefinition] {
        &self.intents
    }

    /// Classify `text`
    pub fn recognize_intent(&self, text: &str) -> IntentResult {
        let folded = text.to_lowercase();

        let high = self.intents.iter().filter(|d| d.priority == Priority::High);
        if let Some(result) = Self::first_match(high, &folded, text, HIGH_PRIORITY_CONFIDENCE) {
            return result;
        }

        let normal = self.intents.iter().filter(|d| d.priority != Priority::High);
        if let Some(result) = Self::first_match(normal, &folded, text, KEYWORD_CONFIDENCE) {
            return result;
        }

        debug!("No intent matched, defaulting to general chat");
        IntentResult {
            category: IntentCategory::GeneralChat,
            intent: "general_query".to_string(),
            confidence: FALLBACK_CONFIDENCE,
            matched_text: text.to_string(),
            keyword: None,
        }
    }

    fn first_match<'a>(
        defs: impl Iterator<Item = &'a IntentDefinition>,
        folded: &str,
        text: &str,
        confidence: f32,
    ) -> Option<IntentResult> {
        for def in defs {
            if let Some(keyword) = def.matching_keyword(folded) {
                debug!("Intent {} matched keyword {:?}", def.name, keyword);
                return Some(IntentResult {
                    category: def.category,
                    intent: def.name.clone(),
                    confidence,
                    matched_text: text.to_string(),
                    keyword: Some(keyword.to_string()),
                });
            }
        }
        None
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> IntentResult {
        IntentClassifier::new().recognize_intent(text)
    }

    #[test]
    fn test_high_priority_wins_over_earlier_keyword() {
        let result = classify("hi, why does this happen");
        assert_eq!(result.category, IntentCategory::DeepThinking);
        assert_eq!(result.confidence, HIGH_PRIORITY_CONFIDENCE);
        assert_eq!(result.keyword.as_deref(), Some("why"));
        assert_eq!(result.matched_text, "hi, why does this happen");
    }

    #[test]
    fn test_keyword_routing() {
        assert_eq!(classify("Hello there").category, IntentCategory::Greeting);
        assert_eq!(classify("draw a mountain at sunset").category, IntentCategory::Image);
        assert_eq!(classify("make a short video of the sea").category, IntentCategory::Video);
        assert_eq!(classify("translate good morning").category, IntentCategory::Translate);
        assert_eq!(classify("analyze my sales").category, IntentCategory::Analyze);
        assert_eq!(classify("कोड लिखो").category, IntentCategory::Code);

        let result = classify("Write a PYTHON script");
        assert_eq!(result.category, IntentCategory::Code);
        assert_eq!(result.confidence, KEYWORD_CONFIDENCE);
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        // "image" precedes "code" in the table
        assert_eq!(classify("code that renders an image").category, IntentCategory::Image);
        // "help" precedes "translate"
        assert_eq!(classify("help me translate").category, IntentCategory::Help);
    }

    #[test]
    fn test_substring_misfire_is_preserved() {
        // "hi" inside "this"
        assert_eq!(classify("is this ok").category, IntentCategory::Greeting);
        // "data" inside "update"
        assert_eq!(classify("update").category, IntentCategory::Analyze);
    }

    #[test]
    fn test_fallback() {
        for text in ["", "   ", "qwerty uiop"] {
            let result = classify(text);
            assert_eq!(result.category, IntentCategory::GeneralChat);
            assert_eq!(result.confidence, FALLBACK_CONFIDENCE);
            assert!(result.keyword.is_none());
        }
    }

    #[test]
    fn test_deterministic() {
        let classifier = IntentClassifier::new();
        let text = "generate code for a video player, why not";
        let first = classifier.recognize_intent(text);
        for _ in 0..10 {
            assert_eq!(classifier.recognize_intent(text), first);
        }
    }

    #[test]
    fn test_custom_table_from_toml() {
        let classifier = IntentClassifier::from_toml_str(
            r#"
            [[intents]]
            name = "chat"
            category = "chat"
            keywords = ["HI"]

            [[intents]]
            name = "deep_thinking"
            category = "deep_thinking"
            priority = "high"
            keywords = ["why"]
            "#,
        )
        .unwrap();

        assert_eq!(classifier.intents().len(), 2);
        assert_eq!(classifier.recognize_intent("hi, why?").category, IntentCategory::DeepThinking);
        assert_eq!(classifier.recognize_intent("hi").category, IntentCategory::Chat);
    }

    #[test]
    fn test_invalid_tables() {
        assert!(matches!(
            IntentClassifier::from_toml_str("intents = []"),
            Err(IntentTableError::Empty)
        ));
        assert!(matches!(
            IntentClassifier::from_toml_str(
                "[[intents]]\nname = \"x\"\ncategory = \"chat\"\nkeywords = [\"  \"]"
            ),
            Err(IntentTableError::NoKeywords(name)) if name == "x"
        ));
        assert!(matches!(
            IntentClassifier::from_toml_str("[[intents]]\nname = 1"),
            Err(IntentTableError::Parse(_))
        ));
    }
}
