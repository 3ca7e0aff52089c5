//! `relaychat chat`: Run one turn and print the conversation as it grows.

use relaychat_agent::{ConversationDriver, TurnOutcome};
use relaychat_config::AppConfig;
use relaychat_core::event::EventBus;
use relaychat_core::session::{Renderer, Session};
use relaychat_core::transcript::ChatMessage;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::Mutex;

pub async fn run(message: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let provider = relaychat_providers::build_from_config(&config.llm);
    let driver = Arc::new(ConversationDriver::from_config(
        &config,
        provider,
        Arc::new(EventBus::default()),
    ));

    let session = Arc::new(Mutex::new(Session::new()));
    let renderer = TerminalRenderer::new(std::io::stdout());

    match driver.spawn_turn(session, message, Box::new(renderer)).await?? {
        TurnOutcome::Completed(summary) => {
            eprintln!("\n  [{} rounds, {}]", summary.rounds, summary.stop_reason);
        }
        TurnOutcome::Halted { warning } => {
            return Err(warning.into());
        }
    }

    Ok(())
}

/// Prints transcript messages to a terminal as they are appended.
///
/// Every render carries the full transcript; only the messages not yet
/// printed are written.
pub struct TerminalRenderer<W> {
    out: W,
    printed: usize,
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out, printed: 0 }
    }
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn render(&mut self, messages: &[ChatMessage]) {
        for message in messages.iter().skip(self.printed) {
            let _ = writeln!(self.out, "\n{} >\n{}", message.role, message.content);
        }
        self.printed = self.printed.max(messages.len());
        let _ = self.out.flush();
    }

    fn warning(&mut self, message: &str) {
        let _ = writeln!(self.out, "\n  ⚠️  {message}");
    }
}
