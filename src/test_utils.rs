//! Test doubles shared by unit tests

use crate::error::AppError;
use crate::llm::{ChatMessage, ChatModel, ToolSpec};
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

enum Step {
    Reply(ChatMessage),
    Fail(String),
}

/// Model that replays queued replies and records every request.
///
/// Once the queue is empty it echoes the last user message.
#[derive(Default)]
pub struct ScriptedModel {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&self, message: ChatMessage) {
        self.steps.lock().unwrap().push_back(Step::Reply(message));
    }

    pub fn push_failure(&self, message: &str) {
        self.steps
            .lock()
            .unwrap()
            .push_back(Step::Fail(message.to_string()));
    }

    pub fn request(&self, index: usize) -> Vec<ChatMessage> {
        self.requests.lock().unwrap()[index].clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage], _tools: &[ToolSpec]) -> Result<ChatMessage> {
        self.requests.lock().unwrap().push(messages.to_vec());

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(message)) => Ok(message),
            Some(Step::Fail(message)) => Err(AppError::LlmError(message)),
            None => {
                let last_user = messages
                    .iter()
                    .rev()
                    .find(|m| m.role == "user")
                    .and_then(|m| m.content.clone())
                    .unwrap_or_default();
                Ok(ChatMessage::assistant(format!("echo: {}", last_user)))
            }
        }
    }
}
