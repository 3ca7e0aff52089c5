//! Per-session context and the UI rendering seam.
//!
//! A [`Session`] belongs to one browser session. It owns the transcript and
//! the turn state, and holds the renderer of whichever UI is currently
//! watching. It is passed by `&mut` reference through the driver, the
//! conversation loop, the agents, and their listeners; nothing reaches it
//! through globals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::agent::StopReason;
use crate::transcript::{ChatMessage, Transcript};

/// Unique identifier for a browser session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the conversation driver is within a user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// Waiting for user input.
    #[default]
    Idle,
    /// Checking credentials.
    Validating,
    /// The agents are exchanging messages.
    Running,
    /// Validation failed; the turn was halted.
    Error,
}

/// A UI that can display the transcript.
///
/// Rendering is best-effort: a renderer whose UI has gone away simply drops
/// what it is given.
pub trait Renderer: Send {
    /// Redraw the full transcript, in order.
    fn render(&mut self, messages: &[ChatMessage]);

    /// Ask the UI to scroll to the newest message.
    fn scroll_to_bottom(&mut self) {}

    /// Show a warning to the user.
    fn warning(&mut self, message: &str);

    /// The turn state changed.
    fn state_changed(&mut self, _state: TurnState) {}
}

/// A renderer with no UI attached.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&mut self, _messages: &[ChatMessage]) {}

    fn warning(&mut self, _message: &str) {}
}

/// Events pushed to a browser UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    /// Which session the stream belongs to.
    Session { session_id: String },

    /// The turn state changed.
    State { state: TurnState },

    /// Redraw the transcript with exactly these messages.
    Render { messages: Vec<ChatMessage> },

    /// Scroll the transcript view to the bottom.
    Scroll,

    /// A user-visible warning.
    Warning { message: String },

    /// The turn finished.
    Done {
        halted: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_reason: Option<StopReason>,
    },

    /// The turn failed.
    Error { message: String },
}

impl UiEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Session { .. } => "session",
            Self::State { .. } => "state",
            Self::Render { .. } => "render",
            Self::Scroll => "scroll",
            Self::Warning { .. } => "warning",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

/// A renderer that forwards UI events over a channel.
pub struct ChannelRenderer {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelRenderer {
    pub fn new(tx: mpsc::UnboundedSender<UiEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: UiEvent) {
        // A closed channel means the UI went away; keep running the turn.
        let _ = self.tx.send(event);
    }
}

impl Renderer for ChannelRenderer {
    fn render(&mut self, messages: &[ChatMessage]) {
        self.send(UiEvent::Render {
            messages: messages.to_vec(),
        });
    }

    fn scroll_to_bottom(&mut self) {
        self.send(UiEvent::Scroll);
    }

    fn warning(&mut self, message: &str) {
        self.send(UiEvent::Warning {
            message: message.to_string(),
        });
    }

    fn state_changed(&mut self, state: TurnState) {
        self.send(UiEvent::State { state });
    }
}

/// Session-scoped context: transcript, turn state, and the attached UI.
pub struct Session {
    id: SessionId,
    created_at: DateTime<Utc>,
    transcript: Transcript,
    state: TurnState,
    ui: Box<dyn Renderer>,
}

impl Session {
    /// Create a new session with no UI attached.
    pub fn new() -> Self {
        Self::with_id(SessionId::new())
    }

    pub fn with_id(id: SessionId) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            transcript: Transcript::new(),
            state: TurnState::Idle,
            ui: Box::new(NullRenderer),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Attach a renderer, returning the one it replaces.
    pub fn attach_renderer(&mut self, renderer: Box<dyn Renderer>) -> Box<dyn Renderer> {
        std::mem::replace(&mut self.ui, renderer)
    }

    pub fn set_state(&mut self, state: TurnState) {
        debug!(session_id = %self.id, from = ?self.state, to = ?state, "Turn state change");
        self.state = state;
        self.ui.state_changed(state);
    }

    /// Append a message to the transcript.
    pub fn append(&mut self, message: ChatMessage) {
        self.transcript.push(message);
    }

    /// Redraw the full transcript in the attached UI.
    pub fn render(&mut self) {
        self.ui.render(self.transcript.messages());
    }

    pub fn scroll_to_bottom(&mut self) {
        self.ui.scroll_to_bottom();
    }

    /// Append, redraw, and scroll in one step.
    pub fn show(&mut self, message: ChatMessage) {
        self.append(message);
        self.render();
        self.scroll_to_bottom();
    }

    pub fn warn(&mut self, message: &str) {
        self.ui.warning(message);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("messages", &self.transcript.len())
            .field("state", &self.state)
            .finish()
    }
}
