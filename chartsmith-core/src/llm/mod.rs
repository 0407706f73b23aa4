//! Chat-completion providers.
//!
//! `ChatProvider` is the seam both agents call through. The production
//! implementation is `OpenAiChatClient`; `MockChatProvider` returns queued
//! replies and records every request, for tests in this and other crates.

mod openai;

pub use openai::OpenAiChatClient;

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::types::ChatMessage;

/// A hosted language model that turns role-tagged messages into text.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send one completion request and return the first choice's text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;

    /// Return the model name.
    fn model_name(&self) -> &str;
}

/// A scripted provider for tests.
pub struct MockChatProvider {
    model: String,
    queued: Mutex<VecDeque<Result<String, LlmError>>>,
    repeat: Option<String>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl Default for MockChatProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChatProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            queued: Mutex::new(VecDeque::new()),
            repeat: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A provider that answers every request with `text`.
    pub fn with_response(text: &str) -> Self {
        Self {
            repeat: Some(text.to_string()),
            ..Self::new()
        }
    }

    /// Queue a reply for the next unanswered call.
    pub fn queue_response(&self, text: &str) {
        if let Ok(mut q) = self.queued.lock() {
            q.push_back(Ok(text.to_string()));
        }
    }

    /// Queue a failure for the next unanswered call.
    pub fn queue_error(&self, error: LlmError) {
        if let Ok(mut q) = self.queued.lock() {
            q.push_back(Err(error));
        }
    }

    /// Every message list received so far, oldest first.
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        let queued = self.queued.lock().ok().and_then(|mut q| q.pop_front());
        match (queued, &self.repeat) {
            (Some(reply), _) => reply,
            (None, Some(text)) => Ok(text.clone()),
            (None, None) => Err(LlmError::ResponseParse {
                message: "mock provider has no queued response".to_string(),
            }),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
