//! 编排过程事件：供 CLI 等前端展示思考、工具调用与观察

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactEvent {
    /// 第几轮推理（从 1 开始）
    Thinking { round: usize },
    /// 调用工具
    ToolCall {
        id: String,
        tool: String,
        args: serde_json::Value,
    },
    /// 工具返回（预览，避免过长）
    Observation { tool: String, preview: String },
    /// 工具执行失败或未找到
    ToolFailure { tool: String, reason: String },
    /// 最终回复
    Answer { text: String },
    /// 轮次失败
    Error { text: String },
}
