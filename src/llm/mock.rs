//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! - MockLlmClient：回显最后一条 User 消息，永不请求工具
//! - ScriptedLlmClient：按脚本依次返回预设回复，并记录每次收到的消息，便于断言

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, ToolSpec};
use crate::memory::{Message, Role, ToolCall};

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, messages: &[Message], _tools: &[ToolSpec]) -> Result<Message, LlmError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(Message::assistant(format!("Echo from Mock: {last_user}")))
    }
}

/// 脚本中的一步
#[derive(Debug, Clone)]
pub enum MockStep {
    Reply(Message),
    Error(String),
}

impl MockStep {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Reply(Message::assistant(content))
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self::Reply(Message::assistant_with_tools("", calls))
    }

    pub fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> Self {
        Self::tool_calls(vec![ToolCall::new(id, name, arguments)])
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }
}

/// 脚本客户端：脚本耗尽后若设置了 fallback 则一直返回它，否则报错
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    steps: Mutex<VecDeque<MockStep>>,
    fallback: Option<MockStep>,
    calls: Mutex<Vec<Vec<Message>>>,
    tool_lists: Mutex<Vec<Vec<String>>>,
}

impl ScriptedLlmClient {
    pub fn new(steps: Vec<MockStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            ..Default::default()
        }
    }

    /// 每次都返回同一步（用于测试轮数上限）
    pub fn repeating(step: MockStep) -> Self {
        Self {
            fallback: Some(step),
            ..Default::default()
        }
    }

    /// 已收到的请求（每次 invoke 的完整消息序列）
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// 每次 invoke 时可用的工具名
    pub fn tool_lists(&self) -> Vec<Vec<String>> {
        self.tool_lists.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn provider(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        if let Ok(mut lists) = self.tool_lists.lock() {
            lists.push(tools.iter().map(|t| t.name.clone()).collect());
        }
        let next = self
            .steps
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .or_else(|| self.fallback.clone());
        match next {
            Some(MockStep::Reply(msg)) => Ok(msg),
            Some(MockStep::Error(e)) => Err(LlmError::InvalidResponse(e)),
            None => Err(LlmError::InvalidResponse("mock script exhausted".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_echo() {
        let reply = MockLlmClient
            .invoke(&[Message::user("hello")], &[])
            .await
            .unwrap();
        assert_eq!(reply.content, "Echo from Mock: hello");
        assert!(!reply.has_tool_calls());
    }

    #[tokio::test]
    async fn test_scripted_in_order_then_exhausted() {
        let llm = ScriptedLlmClient::new(vec![MockStep::text("one"), MockStep::text("two")]);
        assert_eq!(llm.invoke(&[], &[]).await.unwrap().content, "one");
        assert_eq!(llm.invoke(&[], &[]).await.unwrap().content, "two");
        assert!(llm.invoke(&[], &[]).await.is_err());
        assert_eq!(llm.call_count(), 3);
    }
}
