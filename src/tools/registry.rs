//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册与查找。
//! 注册表在启动时构建一次，之后放进 Arc 只读共享；ToolExecutor 负责超时与错误转文本。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::llm::ToolSpec;

/// 工具执行错误：都会被转成工具结果文本，不会中止本轮对话
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),
}

/// 注册错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Tool already registered: {0}")]
    Duplicate(String),
}

/// 工具输出：value 为结构化结果；sources 为结果所依据的知识库来源（仅检索类工具填写）
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub value: Value,
    pub sources: Vec<String>,
}

impl ToolOutput {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            sources: Vec::new(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }

    /// 转为工具结果消息内容：字符串原样输出，其余 JSON 紧凑序列化
    pub fn to_content(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（注册表键，也是后端看到的 function name）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema（供 LLM 生成正确的参数格式）
    /// 默认返回空对象，表示无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 是否为知识库检索类工具。本轮只要调用过（无论命中、无结果还是失败），
    /// 回答的 Sources 行就只能引用检索实际返回的来源
    fn grounds_answer(&self) -> bool {
        false
    }

    /// 执行工具
    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具；同名已存在时失败
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// 按名排序的工具名（提示词与日志用，保证确定性）
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// 发给推理后端的工具描述，按名排序
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .tools
            .iter()
            .map(|(name, tool)| ToolSpec {
                name: name.clone(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl Tool for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "test tool"
        }

        async fn execute(&self, _args: Value) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::new(Value::String(self.0.to_string())))
        }
    }

    #[test]
    fn test_register_duplicate_fails() {
        let mut reg = ToolRegistry::new();
        reg.register(Named("a")).unwrap();
        assert_eq!(
            reg.register(Named("a")),
            Err(RegistryError::Duplicate("a".to_string()))
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_resolve_and_sorted_specs() {
        let mut reg = ToolRegistry::new();
        reg.register(Named("zeta")).unwrap();
        reg.register(Named("alpha")).unwrap();
        assert!(reg.resolve("alpha").is_some());
        assert!(reg.resolve("missing").is_none());
        let names: Vec<String> = reg.specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_output_to_content() {
        assert_eq!(ToolOutput::new(Value::String("plain".into())).to_content(), "plain");
        assert_eq!(
            ToolOutput::new(serde_json::json!(["a@b.co"])).to_content(),
            "[\"a@b.co\"]"
        );
    }
}
