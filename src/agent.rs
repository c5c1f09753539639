//! Agent 组装
//!
//! 从 AppConfig 构建推理后端、嵌入与知识库、工具注册表、编排器与会话，供 CLI 各子命令复用。
//! 凭据只从环境变量读取；所选后端缺少凭据时在启动阶段返回 Config 错误。

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::config::AppConfig;
use crate::core::{AgentError, Session};
use crate::llm::{
    create_embedder_from_config, AnthropicClient, LlmClient, MockLlmClient, OpenAiClient,
};
use crate::memory::{FileProfile, NoopProfile, ProfileStore};
use crate::rag::{RetrievalAugmenter, VectorStore};
use crate::react::{Orchestrator, ReactEvent};
use crate::tools::{
    CheckHostTool, ExtractEmailsTool, KnowledgeLookupTool, ToolExecutor, ToolRegistry,
};

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-7-sonnet-20250219";

/// 预构建的 Agent 组件，多个会话可共享
pub struct AgentComponents {
    pub llm: Arc<dyn LlmClient>,
    pub executor: Arc<ToolExecutor>,
    pub augmenter: Arc<RetrievalAugmenter>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AgentComponents {
    pub fn new_session(&self) -> Session {
        Session::new(self.orchestrator.clone())
    }
}

fn require_env(name: &str) -> Result<String, AgentError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AgentError::Config(format!("{name} is not set")))
}

/// 按 [llm].provider 创建推理后端：openai / anthropic / mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Result<Arc<dyn LlmClient>, AgentError> {
    let llm = &cfg.llm;
    match llm.provider.to_lowercase().as_str() {
        "openai" => {
            let key = require_env("OPENAI_API_KEY")?;
            let model = llm.model.clone().unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
            tracing::info!("Using OpenAI LLM ({})", model);
            let client = OpenAiClient::new(llm.base_url.as_deref(), &model, &key, llm.timeouts.request)?
                .with_temperature(llm.temperature)
                .with_max_tokens(llm.max_tokens);
            Ok(Arc::new(client))
        }
        "anthropic" => {
            let key = require_env("ANTHROPIC_API_KEY")?;
            let model = llm
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string());
            tracing::info!("Using Anthropic LLM ({})", model);
            let client =
                AnthropicClient::new(llm.base_url.as_deref(), &model, &key, llm.timeouts.request)?
                    .with_temperature(llm.temperature)
                    .with_max_tokens(llm.max_tokens);
            Ok(Arc::new(client))
        }
        "mock" => {
            tracing::warn!("Using Mock LLM");
            Ok(Arc::new(MockLlmClient))
        }
        other => Err(AgentError::Config(format!("unknown LLM provider: {other}"))),
    }
}

/// 加载（或构建）知识库并包装为检索增强
pub async fn create_augmenter(cfg: &AppConfig) -> Result<Arc<RetrievalAugmenter>, AgentError> {
    let embedder = create_embedder_from_config(&cfg.rag).map_err(AgentError::Config)?;
    let store = VectorStore::load_or_build(&cfg.rag, embedder).await?;
    Ok(Arc::new(RetrievalAugmenter::new(Arc::new(store), cfg.rag.top_k)))
}

/// 用户画像：配置了 profile_path 则读文件，否则无画像
pub fn create_profile(cfg: &AppConfig) -> Arc<dyn ProfileStore> {
    match &cfg.agent.profile_path {
        Some(path) => Arc::new(FileProfile::new(path)),
        None => Arc::new(NoopProfile),
    }
}

/// 注册内置工具：extract_emails、check_host、knowledge_lookup
pub fn build_registry(augmenter: Arc<RetrievalAugmenter>) -> Result<ToolRegistry, AgentError> {
    let mut tools = ToolRegistry::new();
    let to_config = |e: crate::tools::RegistryError| AgentError::Config(e.to_string());
    tools.register(ExtractEmailsTool).map_err(to_config)?;
    tools.register(CheckHostTool).map_err(to_config)?;
    tools
        .register(KnowledgeLookupTool::new(augmenter))
        .map_err(to_config)?;
    Ok(tools)
}

/// 组装全部组件。知识库不可用时降级为空库：knowledge_lookup 会回报信息不足而不是中止启动
pub async fn create_agent_components(
    cfg: &AppConfig,
    event_tx: Option<UnboundedSender<ReactEvent>>,
) -> Result<AgentComponents, AgentError> {
    let llm = create_llm_from_config(cfg)?;

    let augmenter = match create_augmenter(cfg).await {
        Ok(a) => a,
        Err(AgentError::Retrieval(e)) => {
            tracing::warn!(error = %e, "knowledge base unavailable, knowledge_lookup will report insufficient information");
            let embedder = create_embedder_from_config(&cfg.rag).map_err(AgentError::Config)?;
            Arc::new(RetrievalAugmenter::new(
                Arc::new(VectorStore::new(embedder)),
                cfg.rag.top_k,
            ))
        }
        Err(e) => return Err(e),
    };

    let registry = build_registry(augmenter.clone())?;
    let executor = Arc::new(
        ToolExecutor::new(Arc::new(registry), cfg.tools.tool_timeout_secs)
            .with_parallel(cfg.agent.parallel_tools),
    );

    let mut orchestrator = Orchestrator::new(llm.clone(), executor.clone())
        .with_profile(create_profile(cfg))
        .with_max_tool_rounds(cfg.agent.max_tool_rounds);
    if let Some(tx) = event_tx {
        orchestrator = orchestrator.with_event_tx(tx);
    }

    Ok(AgentComponents {
        llm,
        executor,
        augmenter,
        orchestrator: Arc::new(orchestrator),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_is_config_error() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "watson".to_string();
        assert!(matches!(
            create_llm_from_config(&cfg),
            Err(AgentError::Config(_))
        ));
    }

    #[test]
    fn test_mock_provider() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".to_string();
        let llm = create_llm_from_config(&cfg).unwrap();
        assert_eq!(llm.provider(), "mock");
    }

    #[tokio::test]
    async fn test_components_without_knowledge_base() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".to_string();
        cfg.rag.faq_dir = dir.path().join("missing");
        cfg.rag.persist_dir = dir.path().join("index");

        let components = create_agent_components(&cfg, None).await.unwrap();
        assert_eq!(
            components.executor.tool_names(),
            vec!["check_host", "extract_emails", "knowledge_lookup"]
        );
        let out = components
            .executor
            .execute("knowledge_lookup", serde_json::json!({"query": "vpn"}))
            .await;
        assert!(matches!(out, Err(AgentError::ToolExecutionFailed(m)) if m.contains("Insufficient information")));
    }
}
