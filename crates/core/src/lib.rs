//! # RelayChat Core
//!
//! Domain types, traits, and error definitions for the RelayChat relay.
//! This crate has **no web or HTTP dependencies**: it defines the domain
//! model that the provider, agent, and gateway crates implement against.
//!
//! ## Layout
//!
//! - [`message`]: framework messages exchanged between agents
//! - [`provider`]: the LLM backend abstraction
//! - [`tool`]: model-invocable functions and their registry
//! - [`agent`]: the agent capability interface used by the conversation loop
//! - [`transcript`]: the visible, append-only chat transcript
//! - [`session`]: per-browser-session context and the UI renderer seam
//! - [`event`]: interception listeners and the domain event bus

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod agent;
pub mod transcript;
pub mod session;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
pub use agent::{Agent, Reply, StopReason};
pub use transcript::{ChatMessage, Transcript};
pub use session::{NullRenderer, Renderer, Session, SessionId, TurnState, UiEvent};
pub use event::{DomainEvent, EventBus, MessageListener, ReceivedMessage};
