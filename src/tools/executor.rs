//! 工具执行器
//!
//! 持有只读 ToolRegistry 与单次调用超时。execute 在超时内调用工具，超时或失败时转为 AgentError；
//! run_batch 执行一批工具调用并生成 tool 消息：未知工具、参数错误、执行失败、超时都变成结果文本，
//! 每条结果都带回请求 id，顺序与请求一致。每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::time::timeout;

use crate::core::AgentError;
use crate::memory::{Message, ToolCall};
use crate::tools::{ToolOutput, ToolRegistry};

/// 单个工具调用的结果
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    pub call_id: String,
    pub tool: String,
    pub ok: bool,
    /// 已标注 tool_call_id 的 tool 消息
    pub message: Message,
    /// 结果所依据的知识库来源
    pub sources: Vec<String>,
    /// 调用的是检索类工具（失败也算）
    pub grounded: bool,
}

/// 工具执行器：对每次调用施加超时，并将结果映射为 AgentError / 工具结果消息
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
    parallel: bool,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
            parallel: true,
        }
    }

    /// 同一批调用是否并发执行
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    /// 执行指定工具；超时返回 ToolTimeout，工具返回 Err 则转为 ToolExecutionFailed；输出 JSON 审计日志
    pub async fn execute(
        &self,
        tool_name: &str,
        args: serde_json::Value,
    ) -> Result<ToolOutput, AgentError> {
        let tool = self
            .registry
            .resolve(tool_name)
            .ok_or_else(|| AgentError::ToolExecutionFailed(format!("Unknown tool: {tool_name}")))?;

        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = timeout(self.timeout, tool.execute(args)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(AgentError::ToolExecutionFailed(e.to_string())),
            Err(_) => Err(AgentError::ToolTimeout(tool_name.to_string())),
        }
    }

    /// 执行单个调用并生成 tool 消息；永不失败
    pub async fn run_call(&self, call: &ToolCall) -> ToolCallResult {
        let Some(tool) = self.registry.resolve(&call.name) else {
            tracing::warn!(tool = %call.name, "requested tool not found");
            return ToolCallResult {
                call_id: call.id.clone(),
                tool: call.name.clone(),
                ok: false,
                message: Message::tool_result(&call.id, format!("Tool '{}' not found", call.name)),
                sources: Vec::new(),
                grounded: false,
            };
        };
        let grounded = tool.grounds_answer();

        match self.execute(&call.name, call.arguments.clone()).await {
            Ok(output) => ToolCallResult {
                call_id: call.id.clone(),
                tool: call.name.clone(),
                ok: true,
                message: Message::tool_result(&call.id, output.to_content()),
                sources: output.sources,
                grounded,
            },
            Err(e) => ToolCallResult {
                call_id: call.id.clone(),
                tool: call.name.clone(),
                ok: false,
                message: Message::tool_result(&call.id, format!("Error: {e}")),
                sources: Vec::new(),
                grounded,
            },
        }
    }

    /// 执行一批调用；并发模式下用 join_all，结果顺序与请求顺序一致
    pub async fn run_batch(&self, calls: &[ToolCall]) -> Vec<ToolCallResult> {
        if self.parallel && calls.len() > 1 {
            join_all(calls.iter().map(|c| self.run_call(c))).await
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.run_call(call).await);
            }
            results
        }
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Tool, ToolError, ToolOutput};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    /// 按参数 ms 休眠后返回 label，用于验证并发下的结果顺序
    struct Sleepy;

    #[async_trait]
    impl Tool for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn description(&self) -> &str {
            "sleep then echo"
        }

        async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
            let ms = args.get("ms").and_then(Value::as_u64).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            let label = args.get("label").and_then(Value::as_str).unwrap_or("");
            Ok(ToolOutput::new(Value::String(label.to_string())))
        }
    }

    struct Failing;

    #[async_trait]
    impl Tool for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "always fails"
        }

        async fn execute(&self, _args: Value) -> Result<ToolOutput, ToolError> {
            Err(ToolError::Failed("disk on fire".to_string()))
        }
    }

    fn executor() -> ToolExecutor {
        let mut reg = ToolRegistry::new();
        reg.register(Sleepy).unwrap();
        reg.register(Failing).unwrap();
        ToolExecutor::new(Arc::new(reg), 5)
    }

    #[tokio::test]
    async fn test_batch_preserves_request_order() {
        let calls = vec![
            ToolCall::new("c1", "sleepy", json!({"ms": 60, "label": "first"})),
            ToolCall::new("c2", "sleepy", json!({"ms": 0, "label": "second"})),
            ToolCall::new("c3", "sleepy", json!({"ms": 20, "label": "third"})),
        ];
        let results = executor().run_batch(&calls).await;
        let ids: Vec<&str> = results.iter().map(|r| r.call_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        let contents: Vec<&str> = results.iter().map(|r| r.message.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert!(results
            .iter()
            .all(|r| r.message.tool_call_id.as_deref() == Some(r.call_id.as_str())));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_content_not_error() {
        let result = executor()
            .run_call(&ToolCall::new("c9", "reboot_server", json!({})))
            .await;
        assert!(!result.ok);
        assert!(!result.grounded);
        assert_eq!(result.message.content, "Tool 'reboot_server' not found");
        assert_eq!(result.message.tool_call_id.as_deref(), Some("c9"));
    }

    #[tokio::test]
    async fn test_failure_becomes_error_text() {
        let result = executor().run_call(&ToolCall::new("c1", "failing", json!({}))).await;
        assert!(!result.ok);
        assert!(result.message.content.starts_with("Error: "));
        assert!(result.message.content.contains("disk on fire"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_error_text() {
        let exec = executor().with_timeout(Duration::from_millis(10));
        let result = exec
            .run_call(&ToolCall::new("c1", "sleepy", json!({"ms": 500})))
            .await;
        assert!(!result.ok);
        assert_eq!(result.message.content, "Error: Tool timeout: sleepy");
    }
}
