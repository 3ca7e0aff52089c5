//! Azure OpenAI provider implementation.
//!
//! Talks to a chat model deployment through
//! `{endpoint}/openai/deployments/{deployment}/chat/completions`.
//!
//! Supports:
//! - Chat completions (non-streaming)
//! - Tool use / function calling, one call per reply
//! - Sampling seed and stop sequences

use async_trait::async_trait;
use relaychat_config::AgentConfig;
use relaychat_core::error::ProviderError;
use relaychat_core::message::{Message, MessageToolCall, Role};
use relaychat_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Seconds to wait after a 429 when the service sends no `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// An Azure OpenAI chat completion provider.
pub struct AzureOpenAiProvider {
    endpoint: String,
    deployment: String,
    api_key: String,
    api_version: String,
    client: reqwest::Client,
}

impl AzureOpenAiProvider {
    /// Create a provider for the deployment described by `config`.
    pub fn new(config: &AgentConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            deployment: config.model_name.clone(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            client,
        })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }

    /// Convert our Message types to the chat completions format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| {
                let tool_calls: Vec<ApiToolCall> = m
                    .tool_calls
                    .iter()
                    .map(|tc| ApiToolCall {
                        id: tc.id.clone(),
                        r#type: "function".into(),
                        function: ApiFunction {
                            name: tc.name.clone(),
                            arguments: tc.arguments.clone(),
                        },
                    })
                    .collect();

                // A tool-call request with no text is sent with null content.
                let content = if m.content.is_empty() && !tool_calls.is_empty() {
                    None
                } else {
                    Some(m.content.clone())
                };

                ApiMessage {
                    role: match m.role {
                        Role::User => "user".into(),
                        Role::Assistant => "assistant".into(),
                        Role::System => "system".into(),
                        Role::Tool => "tool".into(),
                    },
                    content,
                    tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
                    tool_call_id: m.tool_call_id.clone(),
                }
            })
            .collect()
    }

    /// Convert tool definitions to the chat completions format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "messages": Self::to_api_messages(&request.messages),
            "stream": false,
        });

        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if let Some(seed) = request.seed {
            body["seed"] = serde_json::json!(seed);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
            body["tool_choice"] = serde_json::json!("auto");
            body["parallel_tool_calls"] = serde_json::json!(false);
        }

        if !request.stop.is_empty() {
            body["stop"] = serde_json::json!(request.stop);
        }

        body
    }
}

fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> u64 {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

#[async_trait]
impl relaychat_core::Provider for AzureOpenAiProvider {
    fn name(&self) -> &str {
        "azure-openai"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let body = Self::request_body(&request);

        debug!(
            deployment = %self.deployment,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(self.completions_url())
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: retry_after_secs(response.headers()),
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status == 404 {
            return Err(ProviderError::DeploymentNotFound(self.deployment.clone()));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice =
            api_response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::ApiError {
                    status_code: 200,
                    message: "No choices in response".into(),
                })?;

        let tool_calls: Vec<MessageToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| MessageToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let mut message = Message::assistant(choice.message.content.unwrap_or_default());
        message.tool_calls = tool_calls;

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            message,
            usage,
            model: api_response.model.unwrap_or(request.model),
        })
    }
}

// --- Chat completions API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaychat_core::Provider;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn agent_config(endpoint: &str) -> AgentConfig {
        AgentConfig {
            model_name: "gpt-4o".into(),
            endpoint: endpoint.into(),
            api_key: "test-key".into(),
            api_version: "2024-06-01".into(),
        }
    }

    fn provider(endpoint: &str) -> AzureOpenAiProvider {
        AzureOpenAiProvider::new(&agent_config(endpoint), Duration::from_secs(5)).unwrap()
    }

    fn completion(content: serde_json::Value, tool_calls: Option<serde_json::Value>) -> serde_json::Value {
        let mut message = json!({ "role": "assistant", "content": content });
        if let Some(tc) = tool_calls {
            message["tool_calls"] = tc;
        }
        json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-2024-05-13",
            "choices": [{ "index": 0, "message": message, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15 }
        })
    }

    #[test]
    fn url_uses_deployment_and_api_version() {
        let p = provider("https://myresource.openai.azure.com/");
        assert_eq!(
            p.completions_url(),
            "https://myresource.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-06-01"
        );
        assert_eq!(p.name(), "azure-openai");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are helpful"), Message::user("Hello")];
        let api_messages = AzureOpenAiProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn message_conversion_with_tool_calls() {
        let mut msg = Message::assistant("");
        msg.tool_calls = vec![MessageToolCall {
            id: "call_1".into(),
            name: "ask_planner".into(),
            arguments: r#"{"message":"plan?"}"#.into(),
        }];
        let api_msgs = AzureOpenAiProvider::to_api_messages(&[msg]);
        assert!(api_msgs[0].content.is_none());
        let tc = api_msgs[0].tool_calls.as_ref().unwrap();
        assert_eq!(tc[0].function.name, "ask_planner");
    }

    #[test]
    fn message_conversion_tool_response() {
        let msg = Message::tool_result("call_1", "ask_planner", "1. Do it");
        let api_msgs = AzureOpenAiProvider::to_api_messages(&[msg]);
        assert_eq!(api_msgs[0].role, "tool");
        assert_eq!(api_msgs[0].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(api_msgs[0].content.as_deref(), Some("1. Do it"));
    }

    #[test]
    fn body_with_tools_disables_parallel_calls() {
        let mut request = ProviderRequest::new("gpt-4o", vec![Message::user("hi")]);
        request.tools = vec![ToolDefinition {
            name: "ask_planner".into(),
            description: "ask planner".into(),
            parameters: json!({"type": "object"}),
        }];
        request.temperature = Some(0.0);
        request.seed = Some(42);

        let body = AzureOpenAiProvider::request_body(&request);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["parallel_tool_calls"], false);
        assert_eq!(body["seed"], 42);
        assert_eq!(body["tools"][0]["function"]["name"], "ask_planner");
    }

    #[test]
    fn body_without_overrides_omits_them() {
        let request = ProviderRequest::new("gpt-4o", vec![Message::user("hi")]);
        let body = AzureOpenAiProvider::request_body(&request);
        assert!(body.get("temperature").is_none());
        assert!(body.get("tools").is_none());
        assert!(body.get("seed").is_none());
        assert!(body.get("stop").is_none());
    }

    #[test]
    fn body_carries_stop_sequences() {
        let mut request = ProviderRequest::new("gpt-4o", vec![Message::user("hi")]);
        request.stop = vec!["<|end|>".into()];
        let body = AzureOpenAiProvider::request_body(&request);
        assert_eq!(body["stop"], json!(["<|end|>"]));
    }

    #[tokio::test]
    async fn complete_returns_text_reply() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/openai/deployments/gpt-4o/chat/completions"))
            .and(query_param("api-version", "2024-06-01"))
            .and(header("api-key", "test-key"))
            .and(body_partial_json(json!({ "messages": [{ "role": "user", "content": "List 3 prime numbers" }] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!("2, 3, 5"), None)))
            .expect(1)
            .mount(&server)
            .await;

        let response = provider(&server.uri())
            .complete(ProviderRequest::new("gpt-4o", vec![Message::user("List 3 prime numbers")]))
            .await
            .unwrap();

        assert_eq!(response.message.role, Role::Assistant);
        assert_eq!(response.message.content, "2, 3, 5");
        assert_eq!(response.model, "gpt-4o-2024-05-13");
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[tokio::test]
    async fn complete_parses_tool_calls() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/openai/deployments/gpt-4o/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                serde_json::Value::Null,
                Some(json!([{
                    "id": "call_abc",
                    "type": "function",
                    "function": { "name": "ask_planner", "arguments": "{\"message\":\"plan?\"}" }
                }])),
            )))
            .mount(&server)
            .await;

        let response = provider(&server.uri())
            .complete(ProviderRequest::new("gpt-4o", vec![Message::user("plan it")]))
            .await
            .unwrap();

        assert!(response.message.content.is_empty());
        assert_eq!(response.message.tool_calls.len(), 1);
        assert_eq!(response.message.tool_calls[0].id, "call_abc");
        assert_eq!(response.message.tool_calls[0].name, "ask_planner");
    }

    #[tokio::test]
    async fn unauthorized_maps_to_authentication_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .complete(ProviderRequest::new("gpt-4o", vec![Message::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn missing_deployment_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("DeploymentNotFound"))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .complete(ProviderRequest::new("gpt-4o", vec![Message::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::DeploymentNotFound(ref d) if d == "gpt-4o"));
    }

    #[tokio::test]
    async fn rate_limit_reads_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "17"))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .complete(ProviderRequest::new("gpt-4o", vec![Message::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { retry_after_secs: 17 }));
    }

    #[tokio::test]
    async fn server_error_keeps_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .complete(ProviderRequest::new("gpt-4o", vec![Message::user("hi")]))
            .await
            .unwrap_err();
        match err {
            ProviderError::ApiError { status_code, message } => {
                assert_eq!(status_code, 500);
                assert_eq!(message, "oops");
            }
            other => panic!("Expected ApiError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .complete(ProviderRequest::new("gpt-4o", vec![Message::user("hi")]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No choices"));
    }
}
