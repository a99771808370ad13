//! Shared test doubles

#![allow(dead_code)]

use aibot::channel::{ChannelError, ChannelSender, Keyboard, ParseMode};
use aibot::{
    AiBackend, AiError, ConversationMemory, DispatchSettings, Dispatcher, IntentClassifier,
    RateLimiter, TierBudgets,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// One recorded backend call: (operation, first argument, second argument)
pub type Call = (&'static str, String, String);

/// Scriptable in-process AI backend
pub struct MockBackend {
    pub calls: Mutex<Vec<Call>>,
    pub fail: AtomicBool,
    pub panic: AtomicBool,
    pub healthy: AtomicBool,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            panic: AtomicBool::new(false),
            healthy: AtomicBool::new(true),
        }
    }
}

impl MockBackend {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn ops(&self) -> Vec<&'static str> {
        self.calls().into_iter().map(|(op, _, _)| op).collect()
    }

    fn record(&self, op: &'static str, a: &str, b: &str) -> Result<(), AiError> {
        self.calls.lock().unwrap().push((op, a.to_string(), b.to_string()));
        if self.panic.load(Ordering::SeqCst) {
            panic!("backend exploded");
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AiError::Upstream("model overloaded".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AiBackend for MockBackend {
    async fn chat(&self, message: &str, context: &str) -> Result<String, AiError> {
        self.record("chat", message, context)?;
        Ok(format!("reply to {}", message))
    }

    async fn think(&self, message: &str, context: &str) -> Result<String, AiError> {
        self.record("think", message, context)?;
        Ok(format!("deep reply to {}", message))
    }

    async fn generate_code(&self, description: &str, language: &str) -> Result<String, AiError> {
        self.record("code", description, language)?;
        Ok("print('fizzbuzz')".to_string())
    }

    async fn translate(&self, text: &str, target_language: &str) -> Result<String, AiError> {
        self.record("translate", text, target_language)?;
        Ok("सुप्रभात".to_string())
    }

    async fn generate_image(&self, prompt: &str, style: &str) -> Result<String, AiError> {
        self.record("image", prompt, style)?;
        Ok("https://cdn.example.com/image.png".to_string())
    }

    async fn generate_video(
        &self,
        description: &str,
        duration_secs: u32,
    ) -> Result<String, AiError> {
        self.record("video", description, &duration_secs.to_string())?;
        Ok("https://cdn.example.com/video.mp4".to_string())
    }

    async fn health(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

/// Sender that records every message
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(i64, String)>>,
}

impl RecordingSender {
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
    }
}

#[async_trait]
impl ChannelSender for RecordingSender {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        _parse_mode: ParseMode,
        _keyboard: Option<Keyboard>,
    ) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        url: &str,
        _caption: &str,
    ) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push((chat_id, format!("photo {}", url)));
        Ok(())
    }

    async fn send_video(
        &self,
        chat_id: i64,
        url: &str,
        _caption: &str,
    ) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push((chat_id, format!("video {}", url)));
        Ok(())
    }
}

pub fn dispatcher_with(
    budgets: TierBudgets,
    settings: DispatchSettings,
) -> (Arc<Dispatcher>, Arc<MockBackend>) {
    let mock = Arc::new(MockBackend::default());
    let dispatcher = Dispatcher::new(
        Arc::new(RateLimiter::new(budgets)),
        Arc::new(ConversationMemory::new(10)),
        IntentClassifier::new(),
        mock.clone(),
        settings,
    );
    (Arc::new(dispatcher), mock)
}

pub fn dispatcher() -> (Arc<Dispatcher>, Arc<MockBackend>) {
    dispatcher_with(TierBudgets::default(), DispatchSettings::default())
}
