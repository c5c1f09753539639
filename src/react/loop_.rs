//! 编排主循环
//!
//! ReasoningPending -> (无工具调用) Terminated
//!                  -> (有工具调用) CapabilitiesPending -> 执行整批工具 -> ReasoningPending -> ...
//!
//! 对话按值传入、按值返回：失败或取消时调用方手里的快照不受影响。
//! 工具往返轮数受 max_tool_rounds 限制；本轮调用过知识库检索时（即使无结果或失败），
//! 最终回答的 `Sources:` 行只保留检索实际返回的来源，一个都不剩则整行去掉。

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::{Conversation, Message, NoopProfile, ProfileStore, ToolCall};
use crate::rag::enforce;
use crate::react::{build_system_preamble, ReactEvent};
use crate::tools::ToolExecutor;

/// 默认单轮工具往返上限
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 6;
/// Observation 预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// 一轮对话内的状态
#[derive(Debug, Clone, PartialEq)]
pub enum TurnState {
    ReasoningPending,
    CapabilitiesPending(Vec<ToolCall>),
    Terminated,
}

/// 一轮对话的结果
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// 扩展后的完整对话
    pub conversation: Conversation,
    /// 最终 assistant 回复
    pub answer: String,
    /// 工具往返轮数
    pub rounds: usize,
    /// 本轮工具结果提供的知识库来源（首次出现顺序）
    pub sources: Vec<String>,
    /// 本轮是否调用过知识库检索
    pub grounded: bool,
}

pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    executor: Arc<ToolExecutor>,
    profile: Arc<dyn ProfileStore>,
    max_tool_rounds: usize,
    event_tx: Option<UnboundedSender<ReactEvent>>,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, executor: Arc<ToolExecutor>) -> Self {
        Self {
            llm,
            executor,
            profile: Arc::new(NoopProfile),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            event_tx: None,
        }
    }

    pub fn with_profile(mut self, profile: Arc<dyn ProfileStore>) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_max_tool_rounds(mut self, limit: usize) -> Self {
        self.max_tool_rounds = limit;
        self
    }

    /// 设置事件推送通道
    pub fn with_event_tx(mut self, tx: UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn max_tool_rounds(&self) -> usize {
        self.max_tool_rounds
    }

    fn emit(&self, ev: ReactEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }

    /// 没有 system 消息时在最前面插入一条；已有则不动
    pub fn ensure_system_preamble(&self, conversation: &mut Conversation) {
        if conversation.has_system() {
            return;
        }
        let preamble = build_system_preamble(&self.profile.preamble(), &self.executor.tool_names());
        conversation.prepend_system(preamble);
    }

    /// 推进一轮对话直到 Terminated
    pub async fn advance(&self, conversation: Conversation) -> Result<TurnOutcome, AgentError> {
        self.advance_with_cancel(conversation, CancellationToken::new()).await
    }

    /// 同 advance，可在任一 await 点被取消
    pub async fn advance_with_cancel(
        &self,
        conversation: Conversation,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, AgentError> {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            r = self.run(conversation) => r,
        };
        if let Err(e) = &result {
            tracing::warn!(error = %e, "turn failed");
            self.emit(ReactEvent::Error { text: e.to_string() });
        }
        result
    }

    async fn run(&self, mut conversation: Conversation) -> Result<TurnOutcome, AgentError> {
        self.ensure_system_preamble(&mut conversation);
        let specs = self.executor.registry().specs();

        let mut state = TurnState::ReasoningPending;
        let mut rounds = 0;
        let mut steps = 0;
        let mut sources: Vec<String> = Vec::new();
        let mut grounded = false;

        loop {
            state = match state {
                TurnState::ReasoningPending => {
                    steps += 1;
                    self.emit(ReactEvent::Thinking { round: steps });
                    tracing::debug!(step = steps, messages = conversation.len(), "reasoning");

                    let reply = self.llm.invoke(conversation.messages(), &specs).await?;
                    let next = if reply.has_tool_calls() {
                        TurnState::CapabilitiesPending(reply.tool_calls.clone())
                    } else {
                        TurnState::Terminated
                    };
                    conversation.push(reply);
                    next
                }
                TurnState::CapabilitiesPending(calls) => {
                    if rounds >= self.max_tool_rounds {
                        return Err(AgentError::TooManyToolRounds {
                            limit: self.max_tool_rounds,
                        });
                    }
                    rounds += 1;
                    tracing::info!(round = rounds, calls = calls.len(), "executing tool calls");
                    for call in &calls {
                        self.emit(ReactEvent::ToolCall {
                            id: call.id.clone(),
                            tool: call.name.clone(),
                            args: call.arguments.clone(),
                        });
                    }

                    for result in self.executor.run_batch(&calls).await {
                        if result.ok {
                            self.emit(ReactEvent::Observation {
                                tool: result.tool.clone(),
                                preview: preview(&result.message.content),
                            });
                        } else {
                            self.emit(ReactEvent::ToolFailure {
                                tool: result.tool.clone(),
                                reason: result.message.content.clone(),
                            });
                        }
                        grounded |= result.grounded;
                        for s in result.sources {
                            if !sources.contains(&s) {
                                sources.push(s);
                            }
                        }
                        conversation.push(result.message);
                    }
                    TurnState::ReasoningPending
                }
                TurnState::Terminated => break,
            };
        }

        if grounded {
            if let Some(last) = conversation.last_mut() {
                last.content = enforce(&last.content, &sources);
            }
        }

        let answer = conversation
            .last_assistant()
            .map(|m: &Message| m.content.clone())
            .unwrap_or_default();
        self.emit(ReactEvent::Answer { text: answer.clone() });
        tracing::info!(rounds, grounded, sources = sources.len(), "turn completed");

        Ok(TurnOutcome {
            conversation,
            answer,
            rounds,
            sources,
            grounded,
        })
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > OBSERVATION_PREVIEW_CHARS {
        format!("{}...", text.chars().take(OBSERVATION_PREVIEW_CHARS).collect::<String>())
    } else {
        text.to_string()
    }
}
