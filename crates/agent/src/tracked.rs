//! Message-intercepting agent wrapper.
//!
//! [`TrackedAgent`] wraps any [`Agent`] and tells its listeners about every
//! message the agent receives. [`TranscriptListener`] is the one that makes
//! the conversation visible: it appends each message to the session
//! transcript and redraws the UI.

use async_trait::async_trait;
use relaychat_core::agent::{Agent, Reply};
use relaychat_core::error::Result;
use relaychat_core::event::{DomainEvent, EventBus, MessageListener, ReceivedMessage};
use relaychat_core::message::Message;
use relaychat_core::session::Session;
use relaychat_core::transcript::ChatMessage;
use std::sync::Arc;

/// An agent whose received messages are reported to listeners.
pub struct TrackedAgent<A> {
    inner: A,
    listeners: Vec<Arc<dyn MessageListener>>,
}

impl<A: Agent> TrackedAgent<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            listeners: Vec::new(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn MessageListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

#[async_trait]
impl<A: Agent> Agent for TrackedAgent<A> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn receive(
        &self,
        message: &Message,
        sender: &str,
        silent: bool,
        session: &mut Session,
    ) -> Result<()> {
        self.inner.receive(message, sender, silent, session).await?;

        let event = ReceivedMessage {
            recipient: self.inner.name(),
            sender,
            message,
            silent,
        };
        for listener in &self.listeners {
            listener.on_message(&event, session)?;
        }
        Ok(())
    }

    fn record_sent(&self, message: &Message, recipient: &str) {
        self.inner.record_sent(message, recipient);
    }

    async fn generate_reply(&self, peer: &str, session: &mut Session) -> Result<Reply> {
        self.inner.generate_reply(peer, session).await
    }

    fn reset(&self, peer: &str) {
        self.inner.reset(peer);
    }

    fn last_message(&self, peer: &str) -> Option<Message> {
        self.inner.last_message(peer)
    }
}

/// Shows every received message in the session transcript.
///
/// Appends `{sender, message}`, redraws the full transcript and scrolls to
/// the bottom. Silent deliveries are already on screen and are skipped.
#[derive(Debug, Default)]
pub struct TranscriptListener;

impl MessageListener for TranscriptListener {
    fn on_message(&self, event: &ReceivedMessage<'_>, session: &mut Session) -> Result<()> {
        if event.silent {
            return Ok(());
        }
        session.show(ChatMessage::new(event.sender, event.message.display_text()));
        Ok(())
    }
}

/// Publishes a [`DomainEvent::MessageRelayed`] for every received message.
pub struct EventBusListener {
    bus: Arc<EventBus>,
}

impl EventBusListener {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

impl MessageListener for EventBusListener {
    fn on_message(&self, event: &ReceivedMessage<'_>, session: &mut Session) -> Result<()> {
        self.bus.publish(DomainEvent::MessageRelayed {
            session_id: session.id().to_string(),
            sender: event.sender.to_string(),
            recipient: event.recipient.to_string(),
            content_len: event.message.content.len(),
            timestamp: chrono::Utc::now(),
        });
        Ok(())
    }
}
