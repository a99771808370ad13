//! Dispatcher Integration Tests
//!
//! End-to-end routing through rate limits, intents, menu modes and memory
//! against an in-process backend.

mod common;

use aibot::channel::{deliver, DispatchResult, InboundEvent, Keyboard, Outbound};
use aibot::{DispatchSettings, Role, TierBudget, TierBudgets};
use common::{dispatcher, dispatcher_with, RecordingSender};
use std::sync::atomic::Ordering;

const USER: i64 = 4242;

fn replies(result: DispatchResult) -> Vec<Outbound> {
    match result {
        DispatchResult::Replied(replies) => replies,
        DispatchResult::Failed { notice } => panic!("unexpected failure: {}", notice),
    }
}

fn first_text(result: DispatchResult) -> String {
    replies(result)
        .first()
        .map(|o| o.body().to_string())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_chat_reply_is_remembered_with_context() {
    let (bot, mock) = dispatcher();

    let reply = first_text(bot.dispatch(InboundEvent::text(USER, "my name is Max")).await);
    assert_eq!(reply, "reply to my name is Max");

    bot.dispatch(InboundEvent::text(USER, "what is my name")).await;

    let calls = mock.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].0, "chat");
    // context carries the earlier turn and the current message
    let context = &calls[1].2;
    assert!(context.starts_with("[Previous conversation:]"));
    assert!(context.contains("User: my name is Max"));
    assert!(context.contains("Assistant: reply to my name is Max"));
    assert!(context.contains("User: what is my name"));

    let history = bot.memory().get_history(USER, 10);
    assert_eq!(history.len(), 4);
    assert_eq!(history[3].role, Role::Bot);
}

#[tokio::test]
async fn test_failed_chat_sends_one_message_and_keeps_only_user_entry() {
    let (bot, mock) = dispatcher();
    mock.fail.store(true, Ordering::SeqCst);

    let result = bot.dispatch(InboundEvent::text(USER, "tell me a joke")).await;
    let sender = RecordingSender::default();
    deliver(&sender, USER, result).await.unwrap();

    let messages = sender.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("failed"));
    assert!(messages[0].contains("model overloaded"));

    let history = bot.memory().get_history(USER, 10);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].text, "tell me a joke");
}

#[tokio::test]
async fn test_why_question_goes_to_thinking() {
    let (bot, mock) = dispatcher();

    let event = InboundEvent::text(USER, "hi, why does this happen");
    let reply = first_text(bot.dispatch(event).await);
    assert!(reply.contains("deep reply"));
    assert_eq!(mock.ops(), vec!["think"]);
    assert_eq!(bot.limiter().remaining(USER, aibot::Tier::Thinking), 4);
}

#[tokio::test]
async fn test_standard_tier_gates_every_message() {
    let budgets = TierBudgets {
        standard: TierBudget::new(3, 60),
        ..TierBudgets::default()
    };
    let (bot, mock) = dispatcher_with(budgets, DispatchSettings::default());

    for i in 0..3 {
        let event = InboundEvent::text(USER, &format!("question {}", i));
        let reply = first_text(bot.dispatch(event).await);
        assert!(reply.starts_with("reply to"));
    }

    let reply = first_text(bot.dispatch(InboundEvent::text(USER, "one more")).await);
    assert!(reply.contains("Rate limit exceeded"));
    // commands are gated too
    let reply = first_text(bot.dispatch(InboundEvent::text(USER, "/help")).await);
    assert!(reply.contains("Rate limit exceeded"));

    assert_eq!(mock.calls().len(), 3);
    // rejected messages leave memory alone
    assert_eq!(bot.memory().get_history(USER, 10).len(), 6);

    // other users are unaffected
    let reply = first_text(bot.dispatch(InboundEvent::text(USER + 1, "hello there")).await);
    assert!(!reply.contains("Rate limit"));
}

#[tokio::test]
async fn test_generation_tier_exhaustion() {
    let budgets = TierBudgets {
        generation: TierBudget::new(1, 300),
        ..TierBudgets::default()
    };
    let (bot, mock) = dispatcher_with(budgets, DispatchSettings::default());

    let first = replies(bot.dispatch(InboundEvent::text(USER, "draw a castle")).await);
    assert!(matches!(&first[0], Outbound::Photo { url, .. } if url.ends_with("image.png")));

    let second = first_text(bot.dispatch(InboundEvent::text(USER, "draw a dragon")).await);
    assert!(second.contains("Rate limit exceeded"));
    assert!(second.contains("generation"));

    assert_eq!(mock.ops(), vec!["image"]);
    // the rejected prompt never reached memory
    assert!(bot
        .memory()
        .get_history(USER, 10)
        .iter()
        .all(|e| e.text != "draw a dragon"));

    // chat still works
    let reply = first_text(bot.dispatch(InboundEvent::text(USER, "tell me a joke")).await);
    assert!(reply.starts_with("reply to"));
}

#[tokio::test]
async fn test_rate_limited_image_mode_stays_pending() {
    let budgets = TierBudgets {
        generation: TierBudget::new(1, 300),
        ..TierBudgets::default()
    };
    let settings = DispatchSettings {
        admin_id: Some(USER),
        ..DispatchSettings::default()
    };
    let (bot, mock) = dispatcher_with(budgets, settings);

    bot.dispatch(InboundEvent::text(USER, "draw a castle")).await;
    bot.dispatch(InboundEvent::text(USER, "🎨 Generate Image")).await;

    let rejected = first_text(bot.dispatch(InboundEvent::text(USER, "a quiet lake")).await);
    assert!(rejected.contains("Rate limit exceeded"));

    // once the budget is back, the next message still goes to the image handler
    let reset = first_text(bot.dispatch(InboundEvent::text(USER, "/reset")).await);
    assert!(reset.contains("reset"));
    let result = replies(bot.dispatch(InboundEvent::text(USER, "a quiet lake")).await);
    assert!(matches!(&result[0], Outbound::Photo { .. }));
    assert_eq!(mock.ops(), vec!["image", "image"]);
}

#[tokio::test]
async fn test_image_mode_with_style_callback() {
    let (bot, mock) = dispatcher();

    let prompt = replies(bot.dispatch(InboundEvent::text(USER, "🎨 Generate Image")).await);
    assert!(matches!(
        &prompt[0],
        Outbound::Text { keyboard: Some(Keyboard::ImageStyles), .. }
    ));

    let ack = first_text(bot.dispatch(InboundEvent::callback(USER, "img_fantasy")).await);
    assert!(ack.contains("Fantasy"));

    // mode routes the description straight to the image handler
    let result = replies(bot.dispatch(InboundEvent::text(USER, "a tower in the clouds")).await);
    assert!(matches!(&result[0], Outbound::Photo { .. }));
    assert_eq!(
        mock.calls()[0],
        ("image", "a tower in the clouds".to_string(), "fantasy".to_string())
    );

    // one-shot: next message is classified again
    bot.dispatch(InboundEvent::text(USER, "a quiet lake")).await;
    assert_eq!(mock.ops(), vec!["image", "chat"]);
}

#[tokio::test]
async fn test_chat_mode_persists_until_back_to_menu() {
    let (bot, mock) = dispatcher();

    let entered = replies(bot.dispatch(InboundEvent::text(USER, "💬 Chat with AI")).await);
    assert!(matches!(
        &entered[0],
        Outbound::Text { keyboard: Some(Keyboard::ChatOptions), .. }
    ));

    // "draw" would classify as image, chat mode keeps it in chat
    bot.dispatch(InboundEvent::text(USER, "draw me into the story")).await;
    bot.dispatch(InboundEvent::text(USER, "📝 Quick Chat")).await;
    assert_eq!(mock.ops(), vec!["chat", "chat"]);

    let back = replies(bot.dispatch(InboundEvent::text(USER, "⬅️ Back to Menu")).await);
    assert!(matches!(
        &back[0],
        Outbound::Text { keyboard: Some(Keyboard::MainMenu), .. }
    ));

    bot.dispatch(InboundEvent::text(USER, "draw a castle")).await;
    assert_eq!(mock.ops(), vec!["chat", "chat", "image"]);
}

#[tokio::test]
async fn test_code_is_fenced_in_detected_language() {
    let (bot, mock) = dispatcher();

    let result = replies(
        bot.dispatch(InboundEvent::text(USER, "write python code for fizzbuzz"))
            .await,
    );
    assert_eq!(result.len(), 2);
    assert!(matches!(
        &result[0],
        Outbound::Text { text, parse_mode: aibot::channel::ParseMode::Markdown, .. }
            if text == "```python\nprint('fizzbuzz')\n```"
    ));
    assert_eq!(mock.calls()[0].2, "python");

    // language picked from the inline keyboard applies when the text names none
    bot.dispatch(InboundEvent::text(USER, "💻 Generate Code")).await;
    bot.dispatch(InboundEvent::callback(USER, "code_rust")).await;
    bot.dispatch(InboundEvent::text(USER, "fizzbuzz please")).await;
    assert_eq!(mock.calls()[1], ("code", "fizzbuzz please".to_string(), "rust".to_string()));
}

#[tokio::test]
async fn test_translation_target_and_video() {
    let (bot, mock) = dispatcher();

    let reply = first_text(
        bot.dispatch(InboundEvent::text(USER, "translate good morning to english"))
            .await,
    );
    assert!(reply.contains("सुप्रभात"));
    assert_eq!(mock.calls()[0].2, "english");

    let result = replies(bot.dispatch(InboundEvent::text(USER, "make a video of waves")).await);
    assert!(matches!(&result[0], Outbound::Video { .. }));
    assert_eq!(mock.calls()[1].2, "5");
}

#[tokio::test]
async fn test_greeting_and_help_are_local() {
    let (bot, mock) = dispatcher();

    let greeting = first_text(bot.dispatch(InboundEvent::text(USER, "hello")).await);
    assert!(greeting.contains("Hello"));
    let help = first_text(bot.dispatch(InboundEvent::text(USER, "❓ Help")).await);
    assert!(help.contains("/status"));

    assert!(mock.calls().is_empty());
    assert!(bot.memory().get_history(USER, 10).is_empty());
}

#[tokio::test]
async fn test_backend_panic_becomes_failure_notice() {
    let (bot, mock) = dispatcher();
    mock.panic.store(true, Ordering::SeqCst);

    let result = bot.dispatch(InboundEvent::text(USER, "tell me a joke")).await;
    assert!(result.is_failed());
    let outbound = result.into_outbound();
    assert_eq!(outbound.len(), 1);
    assert!(outbound[0].body().contains("Error: panic"));

    // shared state is still usable afterwards
    mock.panic.store(false, Ordering::SeqCst);
    let reply = first_text(bot.dispatch(InboundEvent::text(USER, "tell me a joke")).await);
    assert!(reply.starts_with("reply to"));
}

#[tokio::test]
async fn test_commands() {
    let settings = DispatchSettings {
        admin_id: Some(1),
        ..DispatchSettings::default()
    };
    let (bot, mock) = dispatcher_with(TierBudgets::default(), settings);

    bot.dispatch(InboundEvent::text(USER, "tell me a joke")).await;
    assert!(first_text(bot.dispatch(InboundEvent::text(USER, "/clear")).await).contains("cleared"));
    assert!(bot.memory().get_history(USER, 10).is_empty());
    assert!(first_text(bot.dispatch(InboundEvent::text(USER, "/clear")).await).contains("Nothing"));

    let event = InboundEvent::text(USER, &format!("/reset {}", USER));
    let denied = first_text(bot.dispatch(event).await);
    assert!(denied.contains("Admin only"));

    let reset = first_text(bot.dispatch(InboundEvent::text(1, &format!("/reset {}", USER))).await);
    assert!(reset.contains("reset"));
    assert_eq!(bot.limiter().remaining(USER, aibot::Tier::Standard), 20);

    let welcome = replies(
        bot.dispatch(InboundEvent::text(USER, "/start").with_sender_name("Asha"))
            .await,
    );
    assert!(welcome[0].body().contains("Asha"));

    mock.healthy.store(false, Ordering::SeqCst);
    let status = first_text(bot.dispatch(InboundEvent::text(USER, "/status")).await);
    assert!(status.contains("Offline"));

    let unknown = first_text(bot.dispatch(InboundEvent::text(USER, "/frobnicate")).await);
    assert!(unknown.contains("/help"));
}

#[tokio::test]
async fn test_unknown_callback_is_ignored() {
    let (bot, _mock) = dispatcher();
    let result = bot.dispatch(InboundEvent::callback(USER, "logs:123")).await;
    assert_eq!(result, DispatchResult::Replied(Vec::new()));
}

#[tokio::test]
async fn test_concurrent_users_do_not_interfere() {
    let (bot, mock) = dispatcher();

    let handles: Vec<_> = (0..8)
        .map(|user| {
            let bot = bot.clone();
            tokio::spawn(async move {
                for i in 0..5 {
                    bot.dispatch(InboundEvent::text(user, &format!("message {}", i)))
                        .await;
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(mock.calls().len(), 40);
    for user in 0..8 {
        let history = bot.memory().get_history(user, 10);
        assert_eq!(history.len(), 10);
        assert_eq!(history[0].text, "message 0");
    }
    assert_eq!(bot.memory().get_stats().users, 8);
}
