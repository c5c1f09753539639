//! 记忆层：会话历史（进程内）与可选用户画像

pub mod conversation;
pub mod profile;

pub use conversation::{Conversation, Message, Role, ToolCall};
pub use profile::{FileProfile, NoopProfile, ProfileStore, UserProfile};
