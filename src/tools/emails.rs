//! 邮件地址提取工具：从文本中提取去重、排序后的 e-mail 地址

use std::collections::BTreeSet;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::schema::{parse_args, schema_for_args};
use crate::tools::{Tool, ToolError, ToolOutput};

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct ExtractEmailsArgs {
    /// Free text that may contain e-mail addresses
    text: String,
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // 域名部分必须有 TLD，foo@bar 不匹配
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid e-mail regex")
    })
}

/// 提取文本中的 e-mail 地址（排序、去重）
pub fn extract_emails(text: &str) -> Vec<String> {
    email_regex()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub struct ExtractEmailsTool;

#[async_trait]
impl Tool for ExtractEmailsTool {
    fn name(&self) -> &str {
        "extract_emails"
    }

    fn description(&self) -> &str {
        "Extract the e-mail addresses found in a text. Returns a sorted, de-duplicated list."
    }

    fn parameters_schema(&self) -> Value {
        schema_for_args::<ExtractEmailsArgs>()
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let args: ExtractEmailsArgs = parse_args(args)?;
        Ok(ToolOutput::new(serde_json::json!(extract_emails(&args.text))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_emails_basic() {
        let txt = "Contact alice@test.com and bob.smith+it@company.org; otherwise see foo@bar";
        let emails = extract_emails(txt);
        assert!(emails.contains(&"alice@test.com".to_string()));
        assert!(emails.contains(&"bob.smith+it@company.org".to_string()));
        // foo@bar 没有 TLD，不应出现
        assert!(emails
            .iter()
            .all(|e| e.matches('@').count() == 1 && e.split('@').nth(1).is_some_and(|d| d.contains('.'))));
        assert_eq!(emails.len(), 2);
    }

    #[test]
    fn test_extract_emails_sorted_dedup() {
        let emails = extract_emails("z@x.io a@x.io z@x.io");
        assert_eq!(emails, vec!["a@x.io", "z@x.io"]);
    }

    #[tokio::test]
    async fn test_tool_rejects_missing_text() {
        let err = ExtractEmailsTool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_tool_returns_json_list() {
        let out = ExtractEmailsTool
            .execute(serde_json::json!({"text": "mail it@corp.com"}))
            .await
            .unwrap();
        assert_eq!(out.to_content(), "[\"it@corp.com\"]");
    }
}
