//! 会话驱动：持有当前对话，按轮次调用编排器
//!
//! 每轮：快照 → 追加用户消息 → 编排器推进到 Terminated → 成功后整体替换持有的对话。
//! 任何失败（包括取消、轮数超限）都不改动持有的对话。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::AgentError;
use crate::memory::{Conversation, Message};
use crate::react::{Orchestrator, TurnOutcome};

pub struct Session {
    id: String,
    orchestrator: Arc<Orchestrator>,
    conversation: Conversation,
}

impl Session {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            orchestrator,
            conversation: Conversation::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 当前持有的对话（只读）
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// 发送一条用户输入，返回最终 assistant 回复
    pub async fn send(&mut self, input: &str) -> Result<String, AgentError> {
        self.send_with_cancel(input, CancellationToken::new()).await
    }

    pub async fn send_with_cancel(
        &mut self,
        input: &str,
        cancel: CancellationToken,
    ) -> Result<String, AgentError> {
        self.turn(input, cancel).await.map(|outcome| outcome.answer)
    }

    /// 同 send_with_cancel，返回完整的轮次结果（来源、轮数）
    pub async fn turn(&mut self, input: &str, cancel: CancellationToken) -> Result<TurnOutcome, AgentError> {
        let mut snapshot = self.conversation.clone();
        snapshot.push(Message::user(input));

        let outcome = self.orchestrator.advance_with_cancel(snapshot, cancel).await?;
        self.conversation = outcome.conversation.clone();
        tracing::debug!(session = %self.id, messages = self.conversation.len(), "turn committed");
        Ok(outcome)
    }

    /// 清空历史（下一轮会重新插入系统前言）
    pub fn reset(&mut self) {
        self.conversation = Conversation::new();
        tracing::debug!(session = %self.id, "conversation reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockStep, ScriptedLlmClient};
    use crate::memory::Role;
    use crate::tools::{ExtractEmailsTool, Tool, ToolError, ToolExecutor, ToolOutput, ToolRegistry};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// 开始执行时发出通知，然后长时间不返回
    struct Stuck {
        started: Arc<Notify>,
    }

    #[async_trait]
    impl Tool for Stuck {
        fn name(&self) -> &str {
            "stuck"
        }

        fn description(&self) -> &str {
            "never finishes in time"
        }

        async fn execute(&self, _args: Value) -> Result<ToolOutput, ToolError> {
            self.started.notify_one();
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(ToolOutput::new(Value::String("late".to_string())))
        }
    }

    fn session_with(reg: ToolRegistry, steps: Vec<MockStep>, limit: usize) -> Session {
        let executor = Arc::new(ToolExecutor::new(Arc::new(reg), 60));
        let llm = Arc::new(ScriptedLlmClient::new(steps));
        Session::new(Arc::new(
            Orchestrator::new(llm, executor).with_max_tool_rounds(limit),
        ))
    }

    fn session(steps: Vec<MockStep>, limit: usize) -> Session {
        let mut reg = ToolRegistry::new();
        reg.register(ExtractEmailsTool).unwrap();
        session_with(reg, steps, limit)
    }

    #[tokio::test]
    async fn test_failed_turn_keeps_history() {
        let mut s = session(
            vec![
                MockStep::text("first answer"),
                MockStep::tool_call("c1", "extract_emails", json!({"text": "a@b.io"})),
                MockStep::tool_call("c2", "extract_emails", json!({"text": "a@b.io"})),
            ],
            1,
        );
        assert_eq!(s.send("hello").await.unwrap(), "first answer");
        let before = s.conversation().clone();

        let err = s.send("loop forever").await.unwrap_err();
        assert!(matches!(err, AgentError::TooManyToolRounds { limit: 1 }));
        assert_eq!(s.conversation().messages(), before.messages());
    }

    #[tokio::test]
    async fn test_llm_error_keeps_history() {
        let mut s = session(vec![MockStep::error("backend down")], 6);
        assert!(matches!(s.send("hi").await, Err(AgentError::Llm(_))));
        assert!(s.conversation().is_empty());
    }

    #[tokio::test]
    async fn test_reset_clears() {
        let mut s = session(vec![MockStep::text("a"), MockStep::text("b")], 6);
        s.send("one").await.unwrap();
        assert_eq!(s.conversation().len(), 3);
        s.reset();
        assert!(s.conversation().is_empty());
        s.send("two").await.unwrap();
        let roles: Vec<Role> = s.conversation().messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_cancel_during_tool_keeps_history() {
        let started = Arc::new(Notify::new());
        let mut reg = ToolRegistry::new();
        reg.register(Stuck {
            started: started.clone(),
        })
        .unwrap();
        let mut s = session_with(
            reg,
            vec![
                MockStep::text("ready"),
                MockStep::tool_call("s1", "stuck", json!({})),
                MockStep::text("never reached"),
            ],
            6,
        );
        s.send("hello").await.unwrap();
        let before = s.conversation().clone();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let canceller = tokio::spawn(async move {
            started.notified().await;
            trigger.cancel();
        });

        let err = s.send_with_cancel("run the slow thing", cancel).await.unwrap_err();
        canceller.await.unwrap();
        assert!(matches!(err, AgentError::Cancelled));
        assert_eq!(s.conversation().messages(), before.messages());
        assert_eq!(s.conversation().len(), 3);
    }
}
