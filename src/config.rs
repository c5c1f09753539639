//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HELPDESK__*` 覆盖（双下划线表示嵌套，如 `HELPDESK__LLM__PROVIDER=anthropic`）。
//! 凭据不进配置文件：只从 OPENAI_API_KEY / ANTHROPIC_API_KEY 读取。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub tools: ToolsSection,
    pub rag: RagSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "Helpdesk IT".to_string(),
        }
    }
}

/// [llm] 段：后端选择、采样参数与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / anthropic / mock
    pub provider: String,
    /// 未设置时按后端取默认模型
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: None,
            base_url: None,
            temperature: 0.2,
            max_tokens: 1024,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [agent] 段：编排循环
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// 单轮对话内「推理 ↔ 工具」往返上限
    pub max_tool_rounds: usize,
    /// 同一批工具调用是否并发执行（结果顺序仍与请求一致）
    pub parallel_tools: bool,
    /// 用户画像文件（TOML），未设置则无画像前言
    pub profile_path: Option<PathBuf>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_tool_rounds: 6,
            parallel_tools: true,
            profile_path: None,
        }
    }
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
        }
    }
}

/// [rag] 段：知识库来源、索引快照、检索与分块参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagSection {
    /// FAQ 文档目录（*.md）
    pub faq_dir: PathBuf,
    /// 向量索引快照目录
    pub persist_dir: PathBuf,
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// 嵌入：hashing（本地）/ openai
    pub embedder: String,
    pub embedding_model: String,
    pub embedding_base_url: Option<String>,
    pub embedding_dimensions: usize,
}

impl Default for RagSection {
    fn default() -> Self {
        Self {
            faq_dir: PathBuf::from("data/faq"),
            persist_dir: PathBuf::from("data/vectorstore"),
            top_k: 4,
            chunk_size: 1200,
            chunk_overlap: 100,
            embedder: "hashing".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_base_url: None,
            embedding_dimensions: 256,
        }
    }
}

/// 从 config 目录加载配置，环境变量 HELPDESK__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path，则追加该文件（必须存在，可覆盖前面的键）
/// 3. 最后叠加环境变量 HELPDESK__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HELPDESK")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.agent.max_tool_rounds, 6);
        assert_eq!(cfg.rag.top_k, 4);
        assert_eq!(cfg.tools.tool_timeout_secs, 30);
        assert_eq!(cfg.rag.embedder, "hashing");
    }

    #[test]
    fn test_load_explicit_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[llm]\nprovider = \"mock\"\n\n[agent]\nmax_tool_rounds = 3\n\n[rag]\ntop_k = 2\n",
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.agent.max_tool_rounds, 3);
        assert_eq!(cfg.rag.top_k, 2);
        // 未出现的键保持默认
        assert!(cfg.agent.parallel_tools);
        assert_eq!(cfg.rag.chunk_overlap, 100);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        assert!(load_config(Some(PathBuf::from("/nonexistent/helpdesk.toml"))).is_err());
    }
}
