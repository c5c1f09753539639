//! Agent 错误类型
//!
//! 按处理方式分层：配置错误在启动时致命；工具错误转为对话内容（见 tools::executor）；
//! 轮次级错误（LLM、轮数超限、取消）上抛给调用方，会话保持在上一次成功的状态。

use thiserror::Error;

use crate::llm::LlmError;
use crate::rag::RetrievalError;

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    /// 单轮内工具往返次数超过上限
    #[error("Too many tool rounds in one turn (limit {limit})")]
    TooManyToolRounds { limit: usize },

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    #[error("Cancelled by user")]
    Cancelled,
}

impl AgentError {
    /// 是否为轮次级可恢复错误（会话仍可继续）
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AgentError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_limit_message() {
        let err = AgentError::TooManyToolRounds { limit: 6 };
        assert!(err.to_string().contains("limit 6"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_config_error_is_fatal() {
        assert!(!AgentError::Config("missing key".into()).is_recoverable());
    }
}
