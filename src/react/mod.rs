//! 编排层：系统前言、过程事件、推理 ↔ 工具主循环

pub mod events;
pub mod loop_;
pub mod prompt;

pub use events::ReactEvent;
pub use loop_::{Orchestrator, TurnOutcome, TurnState, DEFAULT_MAX_TOOL_ROUNDS};
pub use prompt::build_system_preamble;
