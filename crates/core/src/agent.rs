//! The agent capability interface.
//!
//! The conversation loop only ever talks to `dyn Agent`. Concrete agents
//! (LLM-backed assistants, tool-executing proxies) and wrappers that observe
//! them all implement this one trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;
use crate::session::Session;

/// Why an agent declined to reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The last received message ended with the termination sentinel.
    Terminated,
    /// The consecutive auto-reply budget for this peer is used up.
    BudgetExhausted,
    /// There was nothing to reply to.
    NothingToReply,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Terminated => write!(f, "terminated"),
            Self::BudgetExhausted => write!(f, "budget_exhausted"),
            Self::NothingToReply => write!(f, "nothing_to_reply"),
        }
    }
}

/// The outcome of asking an agent for its next move.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Messages to send back to the peer, in order.
    ///
    /// Usually one message; one tool result per call when the peer requested
    /// several tool calls at once.
    Messages(Vec<Message>),
    /// The agent ends the conversation.
    Stop(StopReason),
}

/// A participant in a two-party conversation.
#[async_trait]
pub trait Agent: Send + Sync {
    /// The agent's identity, shown as the role of its messages.
    fn name(&self) -> &str;

    /// Handle an incoming message from `sender`.
    ///
    /// `silent` marks deliveries that are already visible to the user.
    async fn receive(
        &self,
        message: &Message,
        sender: &str,
        silent: bool,
        session: &mut Session,
    ) -> Result<()>;

    /// Record a message this agent sent to `recipient`.
    fn record_sent(&self, message: &Message, recipient: &str);

    /// Produce the reply to the latest message from `peer`.
    async fn generate_reply(&self, peer: &str, session: &mut Session) -> Result<Reply>;

    /// Forget history and reply counters for `peer`.
    fn reset(&self, peer: &str);

    /// The last message exchanged with `peer`, in this agent's history.
    fn last_message(&self, peer: &str) -> Option<Message>;
}
