//! The conversation driver.
//!
//! One user submission is one turn:
//!
//! ```text
//! Idle → Validating → Running → Idle
//!            └──────→ Error ──→ Idle      (credentials missing)
//! ```
//!
//! A valid turn records the user's text in the transcript, then runs the
//! top-level chat `user_proxy → assistant` until the sentinel or the
//! auto-reply budget ends it.

use chrono::Utc;
use relaychat_config::{AppConfig, LlmConfig};
use relaychat_core::agent::Agent;
use relaychat_core::error::Result;
use relaychat_core::event::{DomainEvent, EventBus};
use relaychat_core::message::Message;
use relaychat_core::provider::Provider;
use relaychat_core::session::{Renderer, Session, TurnState};
use relaychat_core::transcript::ChatMessage;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::chat::{initiate_chat, ChatOptions, ChatSummary};
use crate::roles::AgentRoster;

/// Shown when the Azure OpenAI credentials are incomplete.
pub const CREDENTIALS_WARNING: &str =
    "You must provide valid Azure OpenAI credentials (API base, key, and deployment name)";

/// Transcript role of the human's own messages.
pub const USER_ROLE: &str = "user";

/// How a turn ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The agents ran and the chat stopped normally.
    Completed(ChatSummary),
    /// The turn never reached the agents.
    Halted { warning: String },
}

/// Runs user turns against the process-wide agents.
pub struct ConversationDriver {
    user_proxy: Arc<dyn Agent>,
    assistant: Arc<dyn Agent>,
    llm: LlmConfig,
    event_bus: Arc<EventBus>,
    // The agents hold per-peer state, so only one turn may run at a time.
    turn_lock: Mutex<()>,
}

impl ConversationDriver {
    pub fn new(roster: &AgentRoster, llm: LlmConfig, event_bus: Arc<EventBus>) -> Self {
        Self {
            user_proxy: roster.user_proxy.clone(),
            assistant: roster.assistant.clone(),
            llm,
            event_bus,
            turn_lock: Mutex::new(()),
        }
    }

    /// Build the agent roster on `provider` and a driver over it.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let roster = AgentRoster::build(provider, config, event_bus.clone());
        Self::new(&roster, config.llm.clone(), event_bus)
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Run one turn in a freshly spawned task.
    ///
    /// `renderer` is attached to the session for the duration of the turn
    /// and the previous one is restored afterwards.
    pub fn spawn_turn(
        self: &Arc<Self>,
        session: Arc<Mutex<Session>>,
        input: String,
        renderer: Box<dyn Renderer>,
    ) -> JoinHandle<Result<TurnOutcome>> {
        let driver = Arc::clone(self);
        tokio::spawn(async move {
            let mut session = session.lock().await;
            let previous = session.attach_renderer(renderer);
            let outcome = driver.run_turn(&input, &mut session).await;
            session.attach_renderer(previous);
            outcome
        })
    }

    /// Run one turn on the current task.
    pub async fn run_turn(&self, input: &str, session: &mut Session) -> Result<TurnOutcome> {
        let _turn = self.turn_lock.lock().await;
        let session_id = session.id().to_string();

        session.set_state(TurnState::Validating);
        let missing = self.llm.missing_credentials();
        if !missing.is_empty() {
            warn!(session_id = %session_id, missing = ?missing, "Turn halted: credentials missing");
            session.warn(CREDENTIALS_WARNING);
            session.set_state(TurnState::Error);
            self.event_bus.publish(DomainEvent::TurnHalted {
                session_id,
                reason: format!("missing {}", missing.join(", ")),
                timestamp: Utc::now(),
            });
            session.set_state(TurnState::Idle);
            return Ok(TurnOutcome::Halted {
                warning: CREDENTIALS_WARNING.to_string(),
            });
        }

        session.set_state(TurnState::Running);
        info!(session_id = %session_id, input_len = input.len(), "Turn started");
        self.event_bus.publish(DomainEvent::TurnStarted {
            session_id: session_id.clone(),
            input_len: input.len(),
            timestamp: Utc::now(),
        });

        session.show(ChatMessage::new(USER_ROLE, input));

        let result = initiate_chat(
            self.user_proxy.as_ref(),
            self.assistant.as_ref(),
            Message::user(input),
            ChatOptions {
                silent_opening: true,
            },
            session,
        )
        .await;

        session.set_state(TurnState::Idle);

        match result {
            Ok(summary) => {
                info!(
                    session_id = %session_id,
                    rounds = summary.rounds,
                    stop_reason = %summary.stop_reason,
                    "Turn completed"
                );
                self.event_bus.publish(DomainEvent::TurnCompleted {
                    session_id,
                    rounds: summary.rounds,
                    stop_reason: summary.stop_reason.to_string(),
                    timestamp: Utc::now(),
                });
                Ok(TurnOutcome::Completed(summary))
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Turn failed");
                self.event_bus.publish(DomainEvent::ErrorOccurred {
                    context: format!("turn in session {session_id}"),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }
}
