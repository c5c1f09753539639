//! 知识库存储
//!
//! KnowledgeStore 是检索增强看到的唯一接口。VectorStore 为内存实现：条目为 (chunk, embedding)，
//! 余弦相似度排序，同分按插入顺序（稳定排序）。索引可快照到 `persist_dir/index.json`，
//! 快照记录嵌入模型标识，模型不一致时重建。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::RagSection;
use crate::llm::EmbeddingProvider;
use crate::rag::{Chunk, Chunker, ChunkingConfig, RetrievalError};

const SNAPSHOT_FILE: &str = "index.json";

/// 检索到的块，按相关度从高到低排列
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub content: String,
    pub source_id: String,
    pub score: f32,
}

/// 待索引的源文档
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// 来源 ID（文件名，如 vpn-setup.md）
    pub source_id: String,
    pub text: String,
}

impl Document {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
        }
    }
}

/// 知识库查询接口
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// 返回最多 top_k 个块，相关度从高到低
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<RetrievedChunk>, RetrievalError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    chunk: Chunk,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    model: String,
    entries: Vec<Entry>,
}

/// 内存向量库
pub struct VectorStore {
    entries: Vec<Entry>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl VectorStore {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            entries: Vec::new(),
            embedder,
        }
    }

    /// 分块并嵌入全部文档；任一嵌入失败则整体失败
    pub async fn build(
        documents: &[Document],
        embedder: Arc<dyn EmbeddingProvider>,
        chunking: ChunkingConfig,
    ) -> Result<Self, RetrievalError> {
        let chunker = Chunker::new(chunking);
        let mut store = Self::new(embedder);
        for doc in documents {
            for chunk in chunker.chunk(&doc.source_id, &doc.text) {
                store.add(chunk).await?;
            }
        }
        tracing::info!(
            documents = documents.len(),
            chunks = store.len(),
            model = %store.embedder.model_id(),
            "knowledge index built"
        );
        Ok(store)
    }

    /// 添加单个块；空向量（无可嵌入内容）的块被跳过
    pub async fn add(&mut self, chunk: Chunk) -> Result<(), RetrievalError> {
        let embedding = self
            .embedder
            .embed(&chunk.text)
            .await
            .map_err(RetrievalError::Embedding)?;
        if embedding.is_empty() {
            tracing::debug!(chunk = %chunk.id, "skipping chunk with empty embedding");
            return Ok(());
        }
        self.entries.push(Entry { chunk, embedding });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 所有条目涉及的来源 ID（首次出现顺序）
    pub fn source_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for e in &self.entries {
            if !ids.contains(&e.chunk.source_id) {
                ids.push(e.chunk.source_id.clone());
            }
        }
        ids
    }

    /// 写入 `dir/index.json`
    pub fn save(&self, dir: &Path) -> Result<PathBuf, RetrievalError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(SNAPSHOT_FILE);
        let snapshot = Snapshot {
            model: self.embedder.model_id(),
            entries: self.entries.clone(),
        };
        let json = serde_json::to_string(&snapshot).map_err(|e| RetrievalError::Snapshot(e.to_string()))?;
        std::fs::write(&path, json)?;
        tracing::debug!(path = %path.display(), entries = self.entries.len(), "knowledge index saved");
        Ok(path)
    }

    /// 读取 `dir/index.json`；文件不存在返回 None，嵌入模型不一致返回 Snapshot 错误
    pub fn load(dir: &Path, embedder: Arc<dyn EmbeddingProvider>) -> Result<Option<Self>, RetrievalError> {
        let path = dir.join(SNAPSHOT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)?;
        let snapshot: Snapshot =
            serde_json::from_str(&json).map_err(|e| RetrievalError::Snapshot(e.to_string()))?;
        let expected = embedder.model_id();
        if snapshot.model != expected {
            return Err(RetrievalError::Snapshot(format!(
                "index built with '{}', configured embedder is '{}'",
                snapshot.model, expected
            )));
        }
        Ok(Some(Self {
            entries: snapshot.entries,
            embedder,
        }))
    }

    /// 有可用快照则直接加载（不重建）；否则读取 faq_dir/*.md 构建并保存快照
    pub async fn load_or_build(
        rag: &RagSection,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, RetrievalError> {
        match Self::load(&rag.persist_dir, embedder.clone()) {
            Ok(Some(store)) if !store.is_empty() => {
                tracing::info!(
                    path = %rag.persist_dir.display(),
                    chunks = store.len(),
                    "knowledge index loaded from snapshot"
                );
                return Ok(store);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "discarding knowledge index snapshot, rebuilding"),
        }

        let documents = load_documents(&rag.faq_dir)?;
        if documents.is_empty() {
            return Err(RetrievalError::NoDocuments(rag.faq_dir.clone()));
        }
        let store = Self::build(
            &documents,
            embedder,
            ChunkingConfig::new(rag.chunk_size, rag.chunk_overlap),
        )
        .await?;
        store.save(&rag.persist_dir)?;
        Ok(store)
    }

    fn rank(&self, query_embedding: &[f32], top_k: usize) -> Vec<RetrievedChunk> {
        let mut scored: Vec<(f32, &Chunk)> = self
            .entries
            .iter()
            .map(|e| (cosine_similarity(query_embedding, &e.embedding), &e.chunk))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        // sort_by 为稳定排序：同分保持插入顺序
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(top_k)
            .map(|(score, chunk)| RetrievedChunk {
                content: chunk.text.clone(),
                source_id: chunk.source_id.clone(),
                score,
            })
            .collect()
    }
}

#[async_trait]
impl KnowledgeStore for VectorStore {
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        if self.entries.is_empty() {
            return Err(RetrievalError::EmptyStore);
        }
        let query_embedding = self.embedder.embed(text).await.map_err(RetrievalError::Embedding)?;
        if query_embedding.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.rank(&query_embedding, top_k))
    }
}

/// 读取目录下所有 *.md，按文件名排序；sourceId 为文件名
pub fn load_documents(dir: &Path) -> Result<Vec<Document>, RetrievalError> {
    let pattern = dir.join("*.md");
    let pattern = pattern.to_string_lossy();
    let paths = glob::glob(&pattern).map_err(|e| RetrievalError::Snapshot(e.to_string()))?;

    let mut files: Vec<PathBuf> = paths.filter_map(Result::ok).filter(|p| p.is_file()).collect();
    files.sort();

    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let text = std::fs::read_to_string(&path)?;
        documents.push(Document::new(name, text));
    }
    Ok(documents)
}

/// 余弦相似度
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
