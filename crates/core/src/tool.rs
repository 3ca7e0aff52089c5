//! Tool trait: functions an agent can call mid-conversation.
//!
//! A tool is advertised to the model as a JSON-schema function definition.
//! When the model asks for it, the agent holding the function map executes
//! it and sends the output back as a tool result message.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::error::ToolError;
use crate::provider::ToolDefinition;
use crate::session::Session;

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content
    pub output: String,
}

/// The core Tool trait.
///
/// Tools receive the session of the running turn so that anything they do
/// through agents (such as a nested conversation) reaches the same transcript.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "ask_planner").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
        session: &mut Session,
    ) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of callable tools, keyed by name.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Execute a tool call.
    pub async fn execute(
        &self,
        call: &ToolCall,
        session: &mut Session,
    ) -> std::result::Result<ToolResult, ToolError> {
        let tool = self.tools.get(&call.name).ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let mut result = tool.execute(call.arguments.clone(), session).await?;
        result.call_id = call.id.clone();
        Ok(result)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
