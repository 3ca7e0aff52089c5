//! Message interception and the domain event bus.
//!
//! Two mechanisms live here:
//! - [`MessageListener`]: synchronous observers attached to an agent wrapper,
//!   called with the session each time the agent receives a message.
//! - [`EventBus`]: broadcast of [`DomainEvent`]s for logs and monitoring.
//!
//! The bus is process-wide, so domain events carry sizes and names but never
//! message text; the text belongs to the session's transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::message::Message;
use crate::session::Session;

/// A message an agent has just received.
#[derive(Debug, Clone, Copy)]
pub struct ReceivedMessage<'a> {
    /// The agent that received it
    pub recipient: &'a str,
    /// The agent that sent it
    pub sender: &'a str,
    pub message: &'a Message,
    /// Already visible to the user; listeners should not show it again
    pub silent: bool,
}

/// Observer of messages received by a wrapped agent.
pub trait MessageListener: Send + Sync {
    fn on_message(&self, event: &ReceivedMessage<'_>, session: &mut Session) -> Result<()>;
}

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A user turn started running
    TurnStarted {
        session_id: String,
        input_len: usize,
        timestamp: DateTime<Utc>,
    },

    /// A user turn was halted before reaching the agents
    TurnHalted {
        session_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A user turn finished
    TurnCompleted {
        session_id: String,
        rounds: usize,
        stop_reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A message passed from one agent to another
    MessageRelayed {
        session_id: String,
        sender: String,
        recipient: String,
        content_len: usize,
        timestamp: DateTime<Utc>,
    },

    /// An agent got a reply from its model
    ResponseGenerated {
        agent: String,
        model: String,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TurnStarted { .. } => "turn_started",
            Self::TurnHalted { .. } => "turn_halted",
            Self::TurnCompleted { .. } => "turn_completed",
            Self::MessageRelayed { .. } => "message_relayed",
            Self::ResponseGenerated { .. } => "response_generated",
            Self::ToolExecuted { .. } => "tool_executed",
            Self::ErrorOccurred { .. } => "error_occurred",
        }
    }
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
