//! Shared test helpers for agent and conversation tests.

use relaychat_core::error::ProviderError;
use relaychat_core::message::{Message, MessageToolCall};
use relaychat_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and
/// records the request it was given. Running out of responses is an
/// `ApiError`, so an over-long conversation fails the test instead of hanging.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider that returns the given texts in order.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| make_text_response(t)).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 500,
                message: "ScriptedProvider: no more responses".into(),
            })
    }
}

/// A provider whose every call fails.
pub struct FailingProvider;

#[async_trait::async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    make_response(Message::assistant(text))
}

/// Create a response that asks for one tool call.
pub fn make_tool_call_response(name: &str, args: serde_json::Value) -> ProviderResponse {
    let mut msg = Message::assistant("");
    msg.tool_calls = vec![make_tool_call(name, args)];
    make_response(msg)
}

fn make_response(message: Message) -> ProviderResponse {
    ProviderResponse {
        message,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{}", name),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}
