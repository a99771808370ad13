//! Telegram UI Components
//!
//! Renders transport-neutral keyboard hints into Telegram markup and
//! converts markdown code fences into Telegram HTML.

use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ReplyMarkup,
};

use crate::channel::Keyboard;
use crate::session::{CallbackAction, CodeLanguage, ImageStyle, CHAT_OPTIONS, MAIN_MENU};

// ============ Keyboards ============

/// Telegram markup for a keyboard hint
pub fn reply_markup(keyboard: Keyboard) -> ReplyMarkup {
    match keyboard {
        Keyboard::MainMenu => ReplyMarkup::Keyboard(main_menu_keyboard()),
        Keyboard::ChatOptions => ReplyMarkup::Keyboard(chat_options_keyboard()),
        Keyboard::ImageStyles => ReplyMarkup::InlineKeyboard(image_style_keyboard()),
        Keyboard::CodeLanguages => ReplyMarkup::InlineKeyboard(code_language_keyboard()),
    }
}

/// Main menu, two buttons per row
pub fn main_menu_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(button_rows(&MAIN_MENU))
}

pub fn chat_options_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(button_rows(&CHAT_OPTIONS))
}

fn button_rows(labels: &[&str]) -> Vec<Vec<KeyboardButton>> {
    labels
        .chunks(2)
        .map(|row| row.iter().map(|label| KeyboardButton::new(*label)).collect())
        .collect()
}

pub fn image_style_keyboard() -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = ImageStyle::ALL
        .iter()
        .map(|style| {
            InlineKeyboardButton::callback(
                style.label(),
                CallbackAction::ImageStyle(*style).encode(),
            )
        })
        .collect();
    InlineKeyboardMarkup::new(buttons.chunks(2).map(|row| row.to_vec()))
}

pub fn code_language_keyboard() -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = CodeLanguage::ALL
        .iter()
        .map(|lang| {
            InlineKeyboardButton::callback(
                lang.label(),
                CallbackAction::CodeLanguage(*lang).encode(),
            )
        })
        .collect();
    InlineKeyboardMarkup::new(buttons.chunks(2).map(|row| row.to_vec()))
}

// ============ Formatting ============

/// HTML escape for Telegram
pub fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Convert markdown code fences and inline code to Telegram HTML.
///
/// Everything else is escaped; the language tag after an opening fence is dropped.
pub fn markdown_to_telegram_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len() + 32);
    let mut chars = text.chars().peekable();
    let mut in_code_block = false;
    let mut in_inline_code = false;

    while let Some(c) = chars.next() {
        if c == '`' {
            if chars.peek() == Some(&'`') {
                chars.next();
                if chars.peek() == Some(&'`') {
                    chars.next();
                    if in_code_block {
                        result.push_str("</code></pre>");
                        in_code_block = false;
                    } else {
                        // skip the language tag
                        while let Some(&ch) = chars.peek() {
                            if ch == '\n' {
                                chars.next();
                                break;
                            } else if ch.is_alphanumeric() || ch == '_' || ch == '-' || ch == '+' {
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        result.push_str("<pre><code>");
                        in_code_block = true;
                    }
                    continue;
                }
                // a lone "``" is literal
                result.push_str("``");
                continue;
            }

            if !in_code_block {
                result.push_str(if in_inline_code { "</code>" } else { "<code>" });
                in_inline_code = !in_inline_code;
                continue;
            }
        }

        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            _ => result.push(c),
        }
    }

    // close anything left open
    if in_inline_code {
        result.push_str("</code>");
    }
    if in_code_block {
        result.push_str("</code></pre>");
    }

    result
}
