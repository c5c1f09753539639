//! 知识库检索增强（RAG）
//!
//! - **chunker**: 文档分块
//! - **store**: KnowledgeStore trait 与内存向量库（含 index.json 快照）
//! - **augmenter**: top-k 检索、上下文块渲染、`rag` 子命令问答
//! - **citation**: `Sources:` 引用行解析与过滤

pub mod augmenter;
pub mod chunker;
pub mod citation;
pub mod store;

use std::path::PathBuf;

use thiserror::Error;

pub use augmenter::{RagAnswer, RetrievalAugmenter, RetrievedContext};
pub use chunker::{Chunk, Chunker, ChunkingConfig};
pub use citation::{enforce, parse_sources};
pub use store::{load_documents, Document, KnowledgeStore, RetrievedChunk, VectorStore};

/// 检索错误：在检索增强边界返回，由调用方决定如何呈现
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Knowledge store is empty")]
    EmptyStore,

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("No documents found in {0}")]
    NoDocuments(PathBuf),

    #[error("Invalid index snapshot: {0}")]
    Snapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
