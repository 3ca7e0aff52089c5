//! Two-party conversations between agents.

use relaychat_core::agent::{Agent, Reply, StopReason};
use relaychat_core::error::{Error, Result};
use relaychat_core::message::Message;
use relaychat_core::session::Session;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Options for [`initiate_chat`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatOptions {
    /// Deliver the opening message silently (it is already on screen).
    pub silent_opening: bool,
}

/// How a conversation went.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSummary {
    /// Number of deliveries, counting the opening message
    pub rounds: usize,
    pub stop_reason: StopReason,
    /// The last message delivered before the conversation stopped
    pub last_message: Option<Message>,
}

/// Run a conversation from `initiator` to `recipient` until one side stops.
///
/// Both agents forget any previous exchange with each other first. The
/// agents then take turns: the sender records what it sent, the receiver
/// receives it and produces the next reply, and the roles swap.
///
/// Per-peer state is keyed by name, so both sides must have distinct names.
pub async fn initiate_chat<'a>(
    initiator: &'a dyn Agent,
    recipient: &'a dyn Agent,
    opening: Message,
    options: ChatOptions,
    session: &mut Session,
) -> Result<ChatSummary> {
    if initiator.name() == recipient.name() {
        return Err(Error::Conversation(format!(
            "agent '{}' cannot chat with itself",
            initiator.name()
        )));
    }

    initiator.reset(recipient.name());
    recipient.reset(initiator.name());

    info!(
        session_id = %session.id(),
        initiator = initiator.name(),
        recipient = recipient.name(),
        "Starting chat"
    );

    let mut sender = initiator;
    let mut receiver = recipient;
    let mut pending = vec![opening];
    let mut silent = options.silent_opening;
    let mut rounds = 0;

    loop {
        for message in &pending {
            sender.record_sent(message, receiver.name());
            receiver.receive(message, sender.name(), silent, session).await?;
        }
        silent = false;
        rounds += 1;

        let reply = receiver.generate_reply(sender.name(), session).await?;
        let stop_reason = match reply {
            Reply::Messages(messages) if !messages.is_empty() => {
                debug!(from = receiver.name(), count = messages.len(), "Agent replied");
                pending = messages;
                std::mem::swap(&mut sender, &mut receiver);
                continue;
            }
            Reply::Messages(_) => StopReason::NothingToReply,
            Reply::Stop(reason) => reason,
        };

        info!(
            session_id = %session.id(),
            initiator = initiator.name(),
            recipient = recipient.name(),
            rounds,
            stop_reason = %stop_reason,
            "Chat finished"
        );

        return Ok(ChatSummary {
            rounds,
            stop_reason,
            last_message: pending.pop(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversable::{ConversableAgent, LlmSettings};
    use crate::termination::TerminationSentinel;
    use crate::test_helpers::*;
    use crate::tracked::{TrackedAgent, TranscriptListener};
    use std::sync::Arc;

    fn proxy(max: u32) -> TrackedAgent<ConversableAgent> {
        TrackedAgent::new(
            ConversableAgent::new("user_proxy")
                .with_termination(TerminationSentinel::default())
                .with_max_auto_replies(max),
        )
        .with_listener(Arc::new(TranscriptListener))
    }

    fn assistant(provider: Arc<ScriptedProvider>) -> TrackedAgent<ConversableAgent> {
        TrackedAgent::new(
            ConversableAgent::new("assistant").with_llm(LlmSettings::new(provider, "gpt-4o", "sys")),
        )
        .with_listener(Arc::new(TranscriptListener))
    }

    #[tokio::test]
    async fn sentinel_ends_chat() {
        let provider = Arc::new(ScriptedProvider::texts(&["2, 3, 5. TERMINATE"]));
        let user_proxy = proxy(10);
        let assistant = assistant(provider.clone());
        let mut session = Session::new();

        let summary = initiate_chat(
            &user_proxy,
            &assistant,
            Message::user("List 3 prime numbers"),
            ChatOptions::default(),
            &mut session,
        )
        .await
        .unwrap();

        assert_eq!(summary.stop_reason, StopReason::Terminated);
        assert_eq!(summary.rounds, 2);
        assert_eq!(summary.last_message.unwrap().content, "2, 3, 5. TERMINATE");
        assert_eq!(provider.call_count(), 1);
        // Opening not silent here, so both deliveries are shown
        assert_eq!(session.transcript().len(), 2);
    }

    #[tokio::test]
    async fn chat_with_itself_is_rejected() {
        let provider = Arc::new(ScriptedProvider::texts(&["unused"]));
        let assistant = assistant(provider.clone());
        let mut session = Session::new();

        let err = initiate_chat(
            &assistant,
            &assistant,
            Message::user("hi"),
            ChatOptions::default(),
            &mut session,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Conversation(_)));
        assert_eq!(provider.call_count(), 0);
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn budget_ends_chat_without_exceeding_it() {
        let provider = Arc::new(ScriptedProvider::texts(&["one", "two", "three", "four"]));
        let user_proxy = proxy(2);
        let assistant = assistant(provider.clone());
        let mut session = Session::new();

        let summary = initiate_chat(
            &user_proxy,
            &assistant,
            Message::user("count"),
            ChatOptions { silent_opening: true },
            &mut session,
        )
        .await
        .unwrap();

        assert_eq!(summary.stop_reason, StopReason::BudgetExhausted);
        assert_eq!(user_proxy.inner().auto_reply_count("assistant"), 2);
        // Opening + 2 proxy auto-replies = 3 assistant replies
        assert_eq!(provider.call_count(), 3);
        assert_eq!(summary.last_message.unwrap().content, "three");

        let roles: Vec<&str> = session
            .transcript()
            .messages()
            .iter()
            .map(|m| m.role.as_str())
            .collect();
        assert_eq!(
            roles,
            vec!["assistant", "user_proxy", "assistant", "user_proxy", "assistant"]
        );
    }

    #[tokio::test]
    async fn restarting_resets_previous_exchange() {
        let provider = Arc::new(ScriptedProvider::texts(&["a TERMINATE", "b TERMINATE"]));
        let user_proxy = proxy(10);
        let assistant = assistant(provider.clone());
        let mut session = Session::new();

        for text in ["first", "second"] {
            initiate_chat(
                &user_proxy,
                &assistant,
                Message::user(text),
                ChatOptions::default(),
                &mut session,
            )
            .await
            .unwrap();
        }

        // The second request only carries the second exchange
        let requests = provider.requests();
        assert_eq!(requests[1].messages.len(), 2);
        assert_eq!(requests[1].messages[1].content, "second");
    }

    #[tokio::test]
    async fn reply_errors_propagate() {
        let user_proxy = proxy(10);
        let assistant = TrackedAgent::new(
            ConversableAgent::new("assistant")
                .with_llm(LlmSettings::new(Arc::new(FailingProvider), "gpt-4o", "sys")),
        );
        let mut session = Session::new();

        let result = initiate_chat(
            &user_proxy,
            &assistant,
            Message::user("hi"),
            ChatOptions::default(),
            &mut session,
        )
        .await;
        assert!(result.is_err());
    }
}
