//! Agents, conversations and turns for RelayChat.
//!
//! A user turn flows through the pieces in this crate:
//!
//! 1. The [`ConversationDriver`] checks the credentials and records the
//!    user's text in the session transcript
//! 2. It starts a chat between the `user_proxy` and the `assistant`
//! 3. The assistant asks its model; when the model calls `ask_planner`, the
//!    user proxy runs a nested chat with the `planner`
//! 4. Every message any agent receives passes through a [`TrackedAgent`],
//!    whose listeners append it to the transcript and redraw the UI
//! 5. The chat ends on the termination sentinel or the auto-reply budget

pub mod chat;
pub mod conversable;
pub mod driver;
pub mod planner;
pub mod roles;
pub mod termination;
pub mod tracked;

#[cfg(test)]
mod test_helpers;

pub use chat::{initiate_chat, ChatOptions, ChatSummary};
pub use conversable::{ConversableAgent, LlmSettings};
pub use driver::{ConversationDriver, TurnOutcome, CREDENTIALS_WARNING};
pub use planner::AskPlannerTool;
pub use roles::AgentRoster;
pub use termination::TerminationSentinel;
pub use tracked::{EventBusListener, TrackedAgent, TranscriptListener};
