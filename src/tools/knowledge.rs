//! 知识库检索工具：把检索增强暴露为能力，结果附带来源 ID 供引用过滤

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::rag::RetrievalAugmenter;
use crate::tools::schema::{parse_args, schema_for_args};
use crate::tools::{Tool, ToolError, ToolOutput};

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct KnowledgeLookupArgs {
    /// What to look up in the helpdesk knowledge base
    query: String,
}

pub struct KnowledgeLookupTool {
    augmenter: Arc<RetrievalAugmenter>,
}

impl KnowledgeLookupTool {
    pub fn new(augmenter: Arc<RetrievalAugmenter>) -> Self {
        Self { augmenter }
    }
}

#[async_trait]
impl Tool for KnowledgeLookupTool {
    fn name(&self) -> &str {
        "knowledge_lookup"
    }

    fn description(&self) -> &str {
        "Search the internal IT helpdesk knowledge base (FAQ). Returns numbered snippets with their source file; cite those sources in the answer."
    }

    fn parameters_schema(&self) -> Value {
        schema_for_args::<KnowledgeLookupArgs>()
    }

    fn grounds_answer(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let args: KnowledgeLookupArgs = parse_args(args)?;
        let ctx = self.augmenter.retrieve_and_format(&args.query).await.map_err(|e| {
            ToolError::Failed(format!(
                "Insufficient information: the knowledge base could not be searched ({e})"
            ))
        })?;

        let snippets: Vec<Value> = ctx
            .chunks
            .iter()
            .enumerate()
            .map(|(i, c)| json!({"index": i + 1, "source": c.source_id, "content": c.content}))
            .collect();

        Ok(ToolOutput::new(json!({"snippets": snippets, "context": ctx.block})).with_sources(ctx.sources))
    }
}
