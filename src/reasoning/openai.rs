/// OpenAI-compatible chat-completions backend
///
/// Translates the message log into the chat-completions wire format and the
/// reply back into a typed assistant `Message`. Tool arguments arrive as JSON
/// strings and are validated into `ToolInvocation`s here, so downstream steps
/// only ever see well-formed calls.

use crate::{
    config::ReasoningConfig,
    error::{ReasoningProtocolError, ToolCallError},
    reasoning::{ReasoningClient, ReasoningRequest},
    tools::{Capability, ToolInvocation},
    workflow::{Message, Role, ToolCall},
};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

/// Chat completion request body
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<&'static str>, // "auto" | "required"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct WireMessage {
    pub role: &'static str,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: &'static str,
    pub function: WireFunctionCall,
}

#[derive(Debug, Serialize)]
pub struct WireFunctionCall {
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

#[derive(Debug, Serialize)]
pub struct WireTool {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub function: WireFunction,
}

#[derive(Debug, Serialize)]
pub struct WireFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Non-streaming chat response
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ResponseChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseChoice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseToolCall {
    pub id: String,
    pub function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
pub struct ResponseFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// HTTP client for an OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiClient {
    pub fn new(config: &ReasoningConfig, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build reasoning HTTP client: {}", e))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout,
        })
    }

    /// Request body for one reasoning call
    pub fn build_request(&self, request: &ReasoningRequest) -> ChatRequest {
        let tools: Vec<WireTool> = request.capabilities.iter().map(wire_tool).collect();
        let has_tools = !tools.is_empty();

        ChatRequest {
            model: self.model.clone(),
            messages: request.messages.iter().map(wire_message).collect(),
            tools: has_tools.then_some(tools),
            tool_choice: has_tools.then(|| request.tool_choice.as_str()),
            parallel_tool_calls: has_tools.then_some(false),
            temperature: Some(self.temperature),
        }
    }
}

#[async_trait]
impl ReasoningClient for OpenAiClient {
    async fn complete(&self, request: &ReasoningRequest) -> Result<Message, ReasoningProtocolError> {
        let body = self.build_request(request);
        let started = Instant::now();

        tracing::debug!("🧠 Calling {} for step '{}' ({} messages)", self.model, request.step, body.messages.len());

        let mut builder = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ReasoningProtocolError::Timeout(self.timeout)
            } else {
                ReasoningProtocolError::Unreachable(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ReasoningProtocolError::Timeout(self.timeout)
            } else {
                ReasoningProtocolError::Unreachable(e.to_string())
            }
        })?;

        if !status.is_success() {
            tracing::warn!("⚠️ Reasoning service returned {} for step '{}'", status, request.step);
            tracing::debug!("Reasoning error body: {}", text);
            return Err(ReasoningProtocolError::Status { status: status.as_u16() });
        }

        tracing::debug!(
            "🧠 Reasoning reply for '{}' in {}ms: {}",
            request.step,
            started.elapsed().as_millis(),
            text
        );

        parse_chat_response(&text)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn wire_tool(capability: &Capability) -> WireTool {
    let definition = capability.definition();
    WireTool {
        tool_type: "function",
        function: WireFunction {
            name: definition.name,
            description: definition.description,
            parameters: definition.parameters,
        },
    }
}

fn wire_message(message: &Message) -> WireMessage {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    let tool_calls = message.has_tool_calls().then(|| {
        message
            .tool_calls
            .iter()
            .map(|call| WireToolCall {
                id: call.call_id.clone(),
                call_type: "function",
                function: WireFunctionCall {
                    name: call.name().to_string(),
                    arguments: call.invocation.arguments().to_string(),
                },
            })
            .collect()
    });

    // Assistant messages that only carry calls send null content
    let content = if message.content.is_empty() && tool_calls.is_some() {
        None
    } else {
        Some(message.content.clone())
    };

    WireMessage {
        role,
        content,
        tool_calls,
        tool_call_id: message.call_id.clone(),
    }
}

/// Parse a chat-completions body into an assistant message
pub fn parse_chat_response(body: &str) -> Result<Message, ReasoningProtocolError> {
    let data: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ReasoningProtocolError::Malformed(format!("invalid chat response: {}", e)))?;

    let choice = data
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ReasoningProtocolError::Malformed("response has no choices".to_string()))?;
    let message = choice.message;

    let role = match message.role.as_deref() {
        None | Some("assistant") => Role::Assistant,
        Some("user") => Role::User,
        Some("system") => Role::System,
        Some("tool") => Role::Tool,
        Some(other) => {
            return Err(ReasoningProtocolError::Malformed(format!("unknown role '{}'", other)))
        }
    };

    let mut tool_calls = Vec::new();
    for call in message.tool_calls.unwrap_or_default() {
        let arguments: Value = if call.function.arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&call.function.arguments).map_err(|e| {
                ReasoningProtocolError::Malformed(format!(
                    "arguments of '{}' are not valid JSON: {}",
                    call.function.name, e
                ))
            })?
        };

        let invocation = ToolInvocation::from_wire(&call.function.name, &arguments).map_err(|e| match e {
            ToolCallError::UnknownCapability(name) => ReasoningProtocolError::UnexpectedCapability { name },
            other => ReasoningProtocolError::Malformed(other.to_string()),
        })?;

        tool_calls.push(ToolCall::with_id(call.id, invocation));
    }

    Ok(Message {
        role,
        content: message.content.unwrap_or_default(),
        tool_calls,
        call_id: None,
        is_error: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{reasoning::ToolChoice, workflow::Step};
    use serde_json::json;

    fn client() -> OpenAiClient {
        let config = ReasoningConfig {
            base_url: "http://localhost:9999/v1/".to_string(),
            model: "test-model".to_string(),
            api_key: None,
            temperature: 0.0,
        };
        OpenAiClient::new(&config, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn request_carries_tools_and_choice() {
        let call = ToolCall::with_id("call_1", ToolInvocation::run_query("SELECT 1").unwrap());
        let request = ReasoningRequest::new(
            Step::CheckQuery,
            vec![
                Message::system("check"),
                Message::assistant_with_calls("", vec![call]),
                Message::tool_result("call_1", "[[1]]"),
            ],
        )
        .offering(&[Capability::RunQuery], ToolChoice::Required);

        let client = client();
        assert_eq!(client.endpoint, "http://localhost:9999/v1/chat/completions");

        let body = serde_json::to_value(client.build_request(&request)).unwrap();
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["tool_choice"], "required");
        assert_eq!(body["parallel_tool_calls"], false);
        assert_eq!(body["tools"][0]["function"]["name"], "run_query");
        assert_eq!(body["messages"][1]["content"], Value::Null);
        assert_eq!(body["messages"][1]["tool_calls"][0]["id"], "call_1");
        assert_eq!(
            body["messages"][1]["tool_calls"][0]["function"]["arguments"],
            json!({ "query": "SELECT 1" }).to_string()
        );
        assert_eq!(body["messages"][2]["role"], "tool");
        assert_eq!(body["messages"][2]["tool_call_id"], "call_1");
    }

    #[test]
    fn request_without_capabilities_omits_tools() {
        let request = ReasoningRequest::new(Step::GenerateQuery, vec![Message::user("q")]);
        let body = serde_json::to_value(client().build_request(&request)).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn parses_text_answer() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Total spend in 2024 was 5097.10."}}]}"#;
        let message = parse_chat_response(body).unwrap();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "Total spend in 2024 was 5097.10.");
        assert!(!message.has_tool_calls());
    }

    #[test]
    fn parses_tool_calls() {
        let body = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "call_a", "type": "function",
                         "function": {"name": "get_schema", "arguments": "{\"tables\": \"invoices\"}"}},
                        {"id": "call_b", "type": "function",
                         "function": {"name": "list_tables", "arguments": ""}}
                    ]
                }
            }]
        }"#;

        let message = parse_chat_response(body).unwrap();
        assert_eq!(message.content, "");
        assert_eq!(message.tool_calls.len(), 2);
        assert_eq!(message.tool_calls[0].call_id, "call_a");
        assert_eq!(message.tool_calls[0].invocation, ToolInvocation::get_schema(["invoices"]).unwrap());
        assert_eq!(message.tool_calls[1].invocation, ToolInvocation::ListTables);
    }

    #[test]
    fn rejects_bad_replies() {
        let unknown = r#"{"choices":[{"message":{"tool_calls":[{"id":"x","type":"function","function":{"name":"shell","arguments":"{}"}}]}}]}"#;
        assert_eq!(
            parse_chat_response(unknown).unwrap_err(),
            ReasoningProtocolError::UnexpectedCapability { name: "shell".to_string() }
        );

        let bad_args = r#"{"choices":[{"message":{"tool_calls":[{"id":"x","type":"function","function":{"name":"run_query","arguments":"{not json"}}]}}]}"#;
        assert!(matches!(parse_chat_response(bad_args), Err(ReasoningProtocolError::Malformed(_))));

        assert!(matches!(parse_chat_response(r#"{"choices":[]}"#), Err(ReasoningProtocolError::Malformed(_))));
        assert!(matches!(parse_chat_response("<html>"), Err(ReasoningProtocolError::Malformed(_))));
    }
}
