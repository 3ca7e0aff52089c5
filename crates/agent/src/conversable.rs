//! The general-purpose conversational agent.
//!
//! A [`ConversableAgent`] keeps a separate history and consecutive
//! auto-reply counter for every peer it talks to. When asked for a reply it
//! decides, in order:
//!
//! 1. stop if the last message carries the termination sentinel
//! 2. stop if the auto-reply budget for this peer is used up
//! 3. execute pending tool calls if it holds a function map
//! 4. ask its model, if it is LLM-backed
//! 5. otherwise send the default auto-reply

use async_trait::async_trait;
use relaychat_core::agent::{Agent, Reply, StopReason};
use relaychat_core::error::{Result, ToolError};
use relaychat_core::event::{DomainEvent, EventBus};
use relaychat_core::message::{Message, MessageToolCall};
use relaychat_core::provider::{Provider, ProviderRequest, ToolDefinition};
use relaychat_core::session::Session;
use relaychat_core::tool::{ToolCall, ToolRegistry};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::termination::TerminationSentinel;

/// Auto-reply budget for agents that don't set one.
pub const DEFAULT_MAX_AUTO_REPLIES: u32 = 100;

/// How an LLM-backed agent talks to its model.
pub struct LlmSettings {
    provider: Arc<dyn Provider>,
    model: String,
    system_message: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    seed: Option<u64>,
    stop: Vec<String>,
    tools: Vec<ToolDefinition>,
}

impl LlmSettings {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        system_message: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            system_message: system_message.into(),
            temperature: None,
            max_tokens: None,
            seed: None,
            stop: Vec::new(),
            tools: Vec::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    /// Tools offered to the model. The agent does not execute these itself.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

#[derive(Debug, Default)]
struct PeerState {
    history: Vec<Message>,
    auto_replies: u32,
}

/// A conversational agent with optional model backing and function map.
pub struct ConversableAgent {
    name: String,
    llm: Option<LlmSettings>,
    functions: Option<ToolRegistry>,
    termination: Option<TerminationSentinel>,
    max_auto_replies: u32,
    event_bus: Option<Arc<EventBus>>,
    peers: Mutex<HashMap<String, PeerState>>,
}

impl ConversableAgent {
    /// An agent with no model, no functions, and no sentinel.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            llm: None,
            functions: None,
            termination: None,
            max_auto_replies: DEFAULT_MAX_AUTO_REPLIES,
            event_bus: None,
            peers: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_llm(mut self, llm: LlmSettings) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Tools this agent executes when a peer asks for them.
    pub fn with_functions(mut self, functions: ToolRegistry) -> Self {
        self.functions = Some(functions);
        self
    }

    pub fn with_termination(mut self, sentinel: TerminationSentinel) -> Self {
        self.termination = Some(sentinel);
        self
    }

    /// Consecutive automatic replies allowed per peer per conversation.
    pub fn with_max_auto_replies(mut self, max: u32) -> Self {
        self.max_auto_replies = max;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// The conversation held with `peer`, oldest first.
    pub fn history(&self, peer: &str) -> Vec<Message> {
        self.peers()
            .get(peer)
            .map(|s| s.history.clone())
            .unwrap_or_default()
    }

    /// Automatic replies sent to `peer` since the last reset.
    pub fn auto_reply_count(&self, peer: &str) -> u32 {
        self.peers().get(peer).map(|s| s.auto_replies).unwrap_or(0)
    }

    fn peers(&self) -> MutexGuard<'_, HashMap<String, PeerState>> {
        self.peers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    async fn execute_tool_calls(
        &self,
        functions: &ToolRegistry,
        calls: &[MessageToolCall],
        session: &mut Session,
    ) -> Vec<Message> {
        let mut results = Vec::with_capacity(calls.len());

        for tc in calls {
            debug!(agent = %self.name, tool = %tc.name, "Executing tool call");

            let start = std::time::Instant::now();
            let outcome = match serde_json::from_str::<serde_json::Value>(&tc.arguments) {
                Ok(arguments) => {
                    let call = ToolCall {
                        id: tc.id.clone(),
                        name: tc.name.clone(),
                        arguments,
                    };
                    functions.execute(&call, session).await
                }
                Err(e) => Err(ToolError::InvalidArguments(format!("{}: {e}", tc.name))),
            };
            let duration_ms = start.elapsed().as_millis() as u64;

            let (success, content) = match outcome {
                Ok(result) => (result.success, result.output),
                Err(e) => {
                    warn!(agent = %self.name, tool = %tc.name, error = %e, "Tool execution failed");
                    // Report the error to the model so it can recover
                    (false, format!("Error: {e}"))
                }
            };

            self.publish(DomainEvent::ToolExecuted {
                tool_name: tc.name.clone(),
                success,
                duration_ms,
                timestamp: chrono::Utc::now(),
            });

            results.push(Message::tool_result(&tc.id, &tc.name, content));
        }

        results
    }

    async fn complete(&self, llm: &LlmSettings, history: Vec<Message>) -> Result<Message> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if !llm.system_message.is_empty() {
            messages.push(Message::system(&llm.system_message));
        }
        messages.extend(history);

        let mut request = ProviderRequest::new(&llm.model, messages);
        request.temperature = llm.temperature;
        request.max_tokens = llm.max_tokens;
        request.seed = llm.seed;
        request.stop = llm.stop.clone();
        request.tools = llm.tools.clone();

        debug!(
            agent = %self.name,
            provider = llm.provider.name(),
            messages = request.messages.len(),
            "Requesting model reply"
        );

        let response = llm.provider.complete(request).await?;

        self.publish(DomainEvent::ResponseGenerated {
            agent: self.name.clone(),
            model: response.model.clone(),
            tokens_used: response.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0),
            timestamp: chrono::Utc::now(),
        });

        Ok(response.message)
    }
}

#[async_trait]
impl Agent for ConversableAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn receive(
        &self,
        message: &Message,
        sender: &str,
        _silent: bool,
        _session: &mut Session,
    ) -> Result<()> {
        debug!(agent = %self.name, sender, role = ?message.role, "Received message");
        self.peers()
            .entry(sender.to_string())
            .or_default()
            .history
            .push(message.as_received());
        Ok(())
    }

    fn record_sent(&self, message: &Message, recipient: &str) {
        self.peers()
            .entry(recipient.to_string())
            .or_default()
            .history
            .push(message.as_sent());
    }

    async fn generate_reply(&self, peer: &str, session: &mut Session) -> Result<Reply> {
        let (history, auto_replies) = {
            let peers = self.peers();
            match peers.get(peer) {
                Some(state) => (state.history.clone(), state.auto_replies),
                None => (Vec::new(), 0),
            }
        };

        let Some(last) = history.last() else {
            return Ok(Reply::Stop(StopReason::NothingToReply));
        };

        if self
            .termination
            .as_ref()
            .is_some_and(|s| s.matches(&last.content))
        {
            debug!(agent = %self.name, peer, "Termination sentinel received");
            return Ok(Reply::Stop(StopReason::Terminated));
        }

        if auto_replies >= self.max_auto_replies {
            debug!(
                agent = %self.name,
                peer,
                max = self.max_auto_replies,
                "Auto-reply budget exhausted"
            );
            return Ok(Reply::Stop(StopReason::BudgetExhausted));
        }

        let tool_calls = last.tool_calls.clone();
        let replies = match (&self.functions, &self.llm) {
            (Some(functions), _) if !tool_calls.is_empty() => {
                self.execute_tool_calls(functions, &tool_calls, session).await
            }
            (_, Some(llm)) => vec![self.complete(llm, history).await?],
            // No model: the framework's empty default auto-reply
            _ => vec![Message::assistant("")],
        };

        self.peers().entry(peer.to_string()).or_default().auto_replies += 1;
        Ok(Reply::Messages(replies))
    }

    fn reset(&self, peer: &str) {
        self.peers().remove(peer);
    }

    fn last_message(&self, peer: &str) -> Option<Message> {
        self.peers().get(peer).and_then(|s| s.history.last().cloned())
    }
}
