//! Helpdesk - IT 服务台智能助手
//!
//! 模块划分：
//! - **agent**: 组件组装（后端、知识库、工具、编排器、会话）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型与会话驱动
//! - **llm**: 推理后端抽象与实现（OpenAI 兼容 / Anthropic / Mock）与嵌入
//! - **memory**: 对话模型与用户画像
//! - **rag**: 知识库分块、向量检索、上下文渲染与引用约束
//! - **react**: 系统前言与「推理 ↔ 工具」编排循环
//! - **routing**: 工单分类
//! - **tools**: 工具注册表、执行器与内置工具（extract_emails / check_host / knowledge_lookup）

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod rag;
pub mod react;
pub mod routing;
pub mod tools;

pub use core::{AgentError, Session};
pub use react::{Orchestrator, TurnOutcome};
