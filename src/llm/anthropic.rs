//! Anthropic Messages API 客户端
//!
//! system 消息抽出放到顶层 `system` 字段；tool 消息转为 user 角色的 `tool_result` 块，
//! assistant 的工具调用转为 `tool_use` 块。连续的 tool 结果合并到同一条 user 消息中。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::openai::TokenUsage;
use crate::llm::{LlmClient, LlmError, ToolSpec};
use crate::memory::{Message, Role, ToolCall};

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;
/// 既无文本也无工具调用的 assistant 消息用此文本占位
const EMPTY_ASSISTANT_PLACEHOLDER: &str = "(no answer)";

pub struct AnthropicClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: Option<f32>,
    max_tokens: u32,
    pub usage: TokenUsage,
}

impl AnthropicClient {
    pub fn new(
        base_url: Option<&str>,
        model: &str,
        api_key: &str,
        timeout_secs: u64,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LlmError::Http(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url
                .unwrap_or(ANTHROPIC_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            temperature: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            usage: TokenUsage::new(),
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn to_wire(messages: &[Message]) -> (Option<String>, Vec<WireMessage>) {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        let system = if system.is_empty() {
            None
        } else {
            Some(system.join("\n\n"))
        };

        let mut out: Vec<WireMessage> = Vec::new();
        for m in messages.iter().filter(|m| m.role != Role::System) {
            match m.role {
                Role::Tool => {
                    let block = Block::ToolResult {
                        tool_use_id: m.tool_call_id.clone().unwrap_or_default(),
                        content: m.content.clone(),
                    };
                    // 同一批工具结果合并进一条 user 消息
                    match out.last_mut() {
                        Some(last) if last.role == "user" && last.is_tool_results() => {
                            last.content.push(block)
                        }
                        _ => out.push(WireMessage {
                            role: "user".to_string(),
                            content: vec![block],
                        }),
                    }
                }
                Role::Assistant => {
                    let mut blocks = Vec::new();
                    if !m.content.is_empty() {
                        blocks.push(Block::Text {
                            text: m.content.clone(),
                        });
                    }
                    for tc in &m.tool_calls {
                        blocks.push(Block::ToolUse {
                            id: tc.id.clone(),
                            name: tc.name.clone(),
                            input: tc.arguments.clone(),
                        });
                    }
                    // 空 content 数组会被接口拒绝
                    if blocks.is_empty() {
                        blocks.push(Block::Text {
                            text: EMPTY_ASSISTANT_PLACEHOLDER.to_string(),
                        });
                    }
                    out.push(WireMessage {
                        role: "assistant".to_string(),
                        content: blocks,
                    });
                }
                _ => out.push(WireMessage {
                    role: "user".to_string(),
                    content: vec![Block::Text {
                        text: m.content.clone(),
                    }],
                }),
            }
        }
        (system, out)
    }
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: Vec<Block>,
}

impl WireMessage {
    fn is_tool_results(&self) -> bool {
        self.content
            .iter()
            .all(|b| matches!(b, Block::ToolResult { .. }))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Serialize)]
struct WireTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    r#type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<Value>,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> &str {
        "anthropic"
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn invoke(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message, LlmError> {
        let (system, wire_messages) = Self::to_wire(messages);
        let tools = if tools.is_empty() {
            None
        } else {
            Some(
                tools
                    .iter()
                    .map(|t| WireTool {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        input_schema: t.parameters.clone(),
                    })
                    .collect(),
            )
        };
        let body = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system,
            messages: wire_messages,
            tools,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let data: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        if let Some(u) = &data.usage {
            self.usage.add(u.input_tokens, u.output_tokens);
        }

        let mut text = Vec::new();
        let mut tool_calls = Vec::new();
        for block in data.content {
            match block.r#type.as_str() {
                "text" => text.extend(block.text),
                "tool_use" => {
                    if let (Some(id), Some(name)) = (block.id, block.name) {
                        let input = block.input.unwrap_or_else(|| Value::Object(Default::default()));
                        tool_calls.push(ToolCall::new(id, name, input));
                    }
                }
                _ => {}
            }
        }

        Ok(Message::assistant_with_tools(text.join("\n"), tool_calls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_extracted_and_tool_results_grouped() {
        let msgs = vec![
            Message::system("rules"),
            Message::user("check two hosts"),
            Message::assistant_with_tools(
                "",
                vec![
                    ToolCall::new("t1", "check_host", serde_json::json!({"host": "a"})),
                    ToolCall::new("t2", "check_host", serde_json::json!({"host": "b"})),
                ],
            ),
            Message::tool_result("t1", "r1"),
            Message::tool_result("t2", "r2"),
        ];
        let (system, wire) = AnthropicClient::to_wire(&msgs);
        assert_eq!(system.as_deref(), Some("rules"));
        assert_eq!(wire.len(), 3);

        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json[1]["content"][0]["type"], "tool_use");
        assert_eq!(json[2]["role"], "user");
        assert_eq!(json[2]["content"][0]["tool_use_id"], "t1");
        assert_eq!(json[2]["content"][1]["tool_use_id"], "t2");
    }

    #[test]
    fn test_empty_assistant_gets_placeholder_text() {
        let msgs = vec![
            Message::user("hi"),
            Message::assistant(""),
            Message::user("still there?"),
        ];
        let (system, wire) = AnthropicClient::to_wire(&msgs);
        assert!(system.is_none());
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json[1]["role"], "assistant");
        assert_eq!(json[1]["content"].as_array().unwrap().len(), 1);
        assert_eq!(json[1]["content"][0]["type"], "text");
        assert_eq!(json[1]["content"][0]["text"], EMPTY_ASSISTANT_PLACEHOLDER);
    }

    #[test]
    fn test_tool_use_without_text_has_no_empty_text_block() {
        let msgs = vec![Message::assistant_with_tools(
            "",
            vec![ToolCall::new("t1", "check_host", serde_json::json!({"host": "a"}))],
        )];
        let (_, wire) = AnthropicClient::to_wire(&msgs);
        let json = serde_json::to_value(&wire).unwrap();
        let blocks = json[0]["content"].as_array().unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0]["type"], "tool_use");
    }
}
