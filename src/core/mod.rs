//! 核心层：错误类型与会话驱动

pub mod error;
pub mod session;

pub use error::AgentError;
pub use session::Session;
