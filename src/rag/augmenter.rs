//! 检索增强
//!
//! retrieve_and_format：向 KnowledgeStore 取 top-k，渲染为确定性的上下文块
//! `[i] (sourceId)\n内容`（1 起编号，按相关度顺序，空行分隔）。
//! answer：`rag` 子命令的单次问答（不带工具），回答后做引用过滤。

use std::sync::Arc;

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::rag::{enforce, KnowledgeStore, RetrievalError, RetrievedChunk};

const RAG_SYSTEM_PROMPT: &str = "You are an IT helpdesk assistant. \
Answer STRICTLY from the provided extracts. \
If the extracts do not contain the information, say calmly that you do not have it. \
End your answer with a line of the form: Sources: (file1.md, file2.md) listing only the extracts you used.";

/// 检索结果渲染
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedContext {
    /// 渲染后的上下文块；无结果时为空串
    pub block: String,
    /// 去重后的来源 ID，首次出现顺序
    pub sources: Vec<String>,
    pub chunks: Vec<RetrievedChunk>,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// `rag` 子命令的回答
#[derive(Debug, Clone, PartialEq)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<String>,
}

pub struct RetrievalAugmenter {
    store: Arc<dyn KnowledgeStore>,
    top_k: usize,
}

impl RetrievalAugmenter {
    pub fn new(store: Arc<dyn KnowledgeStore>, top_k: usize) -> Self {
        Self {
            store,
            top_k: top_k.max(1),
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// 检索并渲染；检索失败原样返回
    pub async fn retrieve_and_format(&self, query: &str) -> Result<RetrievedContext, RetrievalError> {
        let chunks = self.store.query(query, self.top_k).await?;
        tracing::debug!(query = %query, hits = chunks.len(), "retrieved knowledge chunks");
        Ok(Self::format_context(chunks))
    }

    /// 渲染为上下文块，只包含传入的块
    pub fn format_context(chunks: Vec<RetrievedChunk>) -> RetrievedContext {
        let block = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| format!("[{}] ({})\n{}", i + 1, c.source_id, c.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut sources: Vec<String> = Vec::new();
        for c in &chunks {
            if !sources.contains(&c.source_id) {
                sources.push(c.source_id.clone());
            }
        }

        RetrievedContext {
            block,
            sources,
            chunks,
        }
    }

    /// 检索 → 两条消息（system + user）→ 后端（不带工具）→ 引用过滤
    pub async fn answer(&self, llm: &dyn LlmClient, question: &str) -> Result<RagAnswer, AgentError> {
        let context = self.retrieve_and_format(question).await?;
        let extracts = if context.is_empty() {
            "(no extracts)"
        } else {
            context.block.as_str()
        };

        let messages = vec![
            Message::system(RAG_SYSTEM_PROMPT),
            Message::user(format!(
                "Question: {}\n\nExtracts:\n{}\n\nAnswer (clear, numbered steps when relevant):",
                question.trim(),
                extracts
            )),
        ];
        let reply = llm.invoke(&messages, &[]).await?;
        let answer = enforce(&reply.content, &context.sources);

        Ok(RagAnswer {
            answer,
            sources: context.sources,
        })
    }
}
