//! 嵌入 API：供知识库向量检索使用
//!
//! - OpenAiEmbedder：调用 OpenAI 兼容的 /embeddings 端点
//! - HashingEmbedder：本地特征哈希词袋向量，离线、确定性，适合小型 FAQ 知识库与测试

use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::types::embeddings::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_openai::Client;
use async_trait::async_trait;

use crate::config::RagSection;

/// 嵌入提供方
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 将文本编码为向量；失败时返回错误字符串
    async fn embed(&self, text: &str) -> Result<Vec<f32>, String>;

    /// 模型标识，写入索引快照，加载时用于校验
    fn model_id(&self) -> String;
}

/// 使用 async-openai 调用 OpenAI 兼容的 embeddings API
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(base_url: Option<&str>, model: &str, api_key: &str) -> Self {
        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(vec![]);
        }
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::String(text.to_string()))
            .build()
            .map_err(|e| e.to_string())?;
        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| e.to_string())?;
        let vec = response
            .data
            .first()
            .map(|e| e.embedding.clone())
            .unwrap_or_default();
        Ok(vec)
    }

    fn model_id(&self) -> String {
        format!("openai:{}", self.model)
    }
}

/// 特征哈希嵌入：小写词（含 bigram）经 FNV-1a 映射到固定维度，带符号累加后 L2 归一化
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(8),
        }
    }

    fn embed_now(&self, text: &str) -> Vec<f32> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return vec![];
        }
        let mut v = vec![0.0f32; self.dimensions];
        let bigrams = tokens.windows(2).map(|w| format!("{} {}", w[0], w[1]));
        for feature in tokens.iter().cloned().chain(bigrams) {
            let h = fnv1a(feature.as_bytes());
            let idx = (h % self.dimensions as u64) as usize;
            let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
        Ok(self.embed_now(text))
    }

    fn model_id(&self) -> String {
        format!("hashing:{}", self.dimensions)
    }
}

/// 小写字母数字词，长度 > 1
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 1)
        .map(|w| w.to_lowercase())
        .collect()
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// 从 [rag] 配置创建嵌入提供方；openai 需要 OPENAI_API_KEY
pub fn create_embedder_from_config(rag: &RagSection) -> Result<Arc<dyn EmbeddingProvider>, String> {
    match rag.embedder.to_lowercase().as_str() {
        "openai" => {
            let key = std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| "OPENAI_API_KEY is required for the openai embedder".to_string())?;
            tracing::info!("Using OpenAI embeddings ({})", rag.embedding_model);
            Ok(Arc::new(OpenAiEmbedder::new(
                rag.embedding_base_url.as_deref(),
                &rag.embedding_model,
                &key,
            )))
        }
        "hashing" => {
            tracing::debug!("Using local hashing embeddings ({} dims)", rag.embedding_dimensions);
            Ok(Arc::new(HashingEmbedder::new(rag.embedding_dimensions)))
        }
        other => Err(format!("unknown embedder: {other}")),
    }
}
