//! Message domain types.
//!
//! These are the value objects agents hand to each other and to the model:
//! a user types text → the user proxy sends it to the assistant → the assistant
//! asks the provider for a reply → the reply is sent back to the proxy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message from the point of view of the agent holding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Incoming text from the peer agent (or the human)
    User,
    /// Text this agent produced
    Assistant,
    /// System instructions
    System,
    /// Tool execution result
    Tool,
}

/// A single message exchanged between agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message, relative to the holder
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Optional metadata (tool name, provider info, etc.)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a tool result message.
    ///
    /// The tool name is kept in metadata so the transcript can label the result.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: &str,
        content: impl Into<String>,
    ) -> Self {
        let mut msg = Self::with_role(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg.metadata
            .insert("tool_name".into(), serde_json::Value::String(tool_name.into()));
        msg
    }

    /// The tool name recorded on a tool result, if any.
    pub fn tool_name(&self) -> Option<&str> {
        self.metadata.get("tool_name").and_then(|v| v.as_str())
    }

    /// Re-label a message for the agent that receives it.
    ///
    /// Tool results stay tool results; everything else becomes `User`.
    pub fn as_received(&self) -> Self {
        let mut msg = self.clone();
        if msg.role != Role::Tool {
            msg.role = Role::User;
        }
        msg
    }

    /// Re-label a message for the agent that sent it.
    pub fn as_sent(&self) -> Self {
        let mut msg = self.clone();
        if msg.role != Role::Tool {
            msg.role = Role::Assistant;
        }
        msg
    }

    /// Text shown in the transcript for this message.
    ///
    /// Plain messages show their content. Tool call requests and tool results
    /// are rendered with a short header so the exchange stays readable.
    pub fn display_text(&self) -> String {
        if self.role == Role::Tool {
            let name = self.tool_name().unwrap_or("tool");
            return format!("***** Response from calling tool: {name} *****\n{}", self.content);
        }

        if self.tool_calls.is_empty() {
            return self.content.clone();
        }

        let mut text = self.content.clone();
        for tc in &self.tool_calls {
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(&format!(
                "***** Suggested tool call: {} *****\nArguments:\n{}",
                tc.name, tc.arguments
            ));
        }
        text
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as JSON string
    pub arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello, agent!");
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn received_and_sent_relabel_roles() {
        let msg = Message::assistant("2, 3, 5");
        assert_eq!(msg.as_received().role, Role::User);
        assert_eq!(msg.as_received().as_sent().role, Role::Assistant);

        let result = Message::tool_result("call_1", "ask_planner", "step 1");
        assert_eq!(result.as_received().role, Role::Tool);
        assert_eq!(result.as_sent().role, Role::Tool);
    }

    #[test]
    fn display_text_for_plain_message() {
        assert_eq!(Message::user("List 3 prime numbers").display_text(), "List 3 prime numbers");
    }

    #[test]
    fn display_text_for_tool_call() {
        let mut msg = Message::assistant("");
        msg.tool_calls.push(MessageToolCall {
            id: "call_1".into(),
            name: "ask_planner".into(),
            arguments: r#"{"message":"plan?"}"#.into(),
        });
        let text = msg.display_text();
        assert!(text.starts_with("***** Suggested tool call: ask_planner"));
        assert!(text.contains(r#"{"message":"plan?"}"#));
    }

    #[test]
    fn display_text_for_tool_result() {
        let msg = Message::tool_result("call_1", "ask_planner", "1. Write code");
        let text = msg.display_text();
        assert!(text.contains("ask_planner"));
        assert!(text.ends_with("1. Write code"));
        assert_eq!(msg.tool_name(), Some("ask_planner"));
    }
}
