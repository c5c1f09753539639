//! LLM 层：推理后端抽象与实现（OpenAI 兼容 / Anthropic / Mock）与嵌入

pub mod anthropic;
pub mod embedding;
pub mod mock;
pub mod openai;
pub mod traits;

pub use anthropic::AnthropicClient;
pub use embedding::{create_embedder_from_config, EmbeddingProvider, HashingEmbedder, OpenAiEmbedder};
pub use mock::{MockLlmClient, MockStep, ScriptedLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{LlmClient, LlmError, ToolSpec};
