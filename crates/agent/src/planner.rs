//! The planner consultation tool.
//!
//! `ask_planner` lets the assistant consult a planner agent. Each call starts
//! a fresh chat between the planner and its disposable proxy; the proxy has
//! no auto-reply budget, so the chat ends after the planner's first answer.

use async_trait::async_trait;
use relaychat_core::agent::Agent;
use relaychat_core::error::ToolError;
use relaychat_core::message::Message;
use relaychat_core::session::Session;
use relaychat_core::tool::{Tool, ToolResult};
use std::sync::Arc;
use tracing::info;

use crate::chat::{initiate_chat, ChatOptions};

pub const ASK_PLANNER: &str = "ask_planner";

const ASK_PLANNER_DESCRIPTION: &str = "ask planner to: 1. get a plan for finishing a task, 2. verify the execution result of the plan and potentially suggest new plan.";

const MESSAGE_DESCRIPTION: &str = "question to ask planner. Make sure the question include enough context, such as the code and the execution result. The planner does not know the conversation between you and the user, unless you share the conversation with the planner.";

/// Asks the planner a question and returns its answer.
pub struct AskPlannerTool {
    planner: Arc<dyn Agent>,
    proxy: Arc<dyn Agent>,
}

impl AskPlannerTool {
    pub fn new(planner: Arc<dyn Agent>, proxy: Arc<dyn Agent>) -> Self {
        Self { planner, proxy }
    }

    /// Run one consultation and return the planner's last reply.
    pub async fn ask(&self, question: &str, session: &mut Session) -> Result<String, ToolError> {
        let summary = initiate_chat(
            self.proxy.as_ref(),
            self.planner.as_ref(),
            Message::user(question),
            ChatOptions::default(),
            session,
        )
        .await
        .map_err(|e| ToolError::ExecutionFailed {
            tool_name: ASK_PLANNER.into(),
            reason: e.to_string(),
        })?;

        info!(
            session_id = %session.id(),
            rounds = summary.rounds,
            stop_reason = %summary.stop_reason,
            "Planner consulted"
        );

        Ok(self
            .proxy
            .last_message(self.planner.name())
            .map(|m| m.content)
            .unwrap_or_default())
    }
}

/// The JSON schema advertised to the model for `ask_planner`.
pub fn ask_planner_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "message": {
                "type": "string",
                "description": MESSAGE_DESCRIPTION
            }
        },
        "required": ["message"]
    })
}

#[async_trait]
impl Tool for AskPlannerTool {
    fn name(&self) -> &str {
        ASK_PLANNER
    }

    fn description(&self) -> &str {
        ASK_PLANNER_DESCRIPTION
    }

    fn parameters_schema(&self) -> serde_json::Value {
        ask_planner_schema()
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        session: &mut Session,
    ) -> Result<ToolResult, ToolError> {
        let question = arguments["message"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'message' parameter".into()))?;

        let answer = self.ask(question, session).await?;
        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: answer,
        })
    }
}
