//! 工单路由：让后端把用户消息分类为结构化 JSON（类别、紧急度、涉及产品、理由）

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::Message;

/// 工单类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Something is broken
    Incident,
    /// Access, equipment or software to be provided
    #[serde(alias = "demande")]
    Request,
    /// Information only
    Question,
}

/// 紧急度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[serde(alias = "basse")]
    Low,
    #[serde(alias = "normale")]
    Normal,
    #[serde(alias = "haute")]
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TicketClassification {
    /// Type of IT ticket
    pub category: Category,
    /// Estimated urgency from impact and blocking
    pub urgency: Urgency,
    /// Products or components mentioned (e.g. "VPN", "Mac", "Wi-Fi")
    #[serde(default)]
    pub products: Vec<String>,
    /// Short reasoning behind the classification
    pub rationale: String,
}

fn classifier_prompt() -> String {
    let schema = serde_json::to_string_pretty(&schemars::schema_for!(TicketClassification))
        .unwrap_or_else(|_| "{}".to_string());
    format!(
        "You are an IT helpdesk ticket router. \
Classify the user message into one category: incident, request, question. \
Infer the urgency (low, normal, high) from impact and blocking. \
List the products or technologies mentioned (e.g. Mac, VPN, Outlook). \
Reply ONLY with a JSON object matching this schema:\n{schema}"
    )
}

/// 从回复中取出 JSON 对象：优先 ``` 代码块内，否则取第一个 `{` 到最后一个 `}`
pub fn extract_json(text: &str) -> Option<&str> {
    let body = match text.find("```") {
        Some(start) => {
            let after = &text[start + 3..];
            let after = after.strip_prefix("json").unwrap_or(after);
            match after.find("```") {
                Some(end) => &after[..end],
                None => after,
            }
        }
        None => text,
    };
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (start < end).then(|| body[start..=end].trim())
}

/// 对一条工单做分类
pub async fn classify_ticket(llm: &dyn LlmClient, ticket: &str) -> Result<TicketClassification, AgentError> {
    let messages = vec![
        Message::system(classifier_prompt()),
        Message::user(format!(
            "User message:\n{}\n\nReply in the requested format.",
            ticket.trim()
        )),
    ];
    let reply = llm.invoke(&messages, &[]).await?;
    let json = extract_json(&reply.content)
        .ok_or_else(|| AgentError::JsonParse(format!("no JSON object in reply: {}", reply.content)))?;
    let classification: TicketClassification =
        serde_json::from_str(json).map_err(|e| AgentError::JsonParse(e.to_string()))?;
    tracing::info!(
        category = ?classification.category,
        urgency = ?classification.urgency,
        "ticket classified"
    );
    Ok(classification)
}

/// 按类别给出下一步建议
pub fn next_step(classification: &TicketClassification) -> &'static str {
    match classification.category {
        Category::Incident => "Route to quick diagnosis (network check, service status, logs).",
        Category::Request => "Open a standard request (approval process, response templates).",
        Category::Question => "Informational answer (FAQ / user guide).",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockStep, ScriptedLlmClient};

    #[test]
    fn test_extract_json_variants() {
        assert_eq!(extract_json("{\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(
            extract_json("Here you go:\n```json\n{\"a\": 1}\n```\nThanks"),
            Some("{\"a\": 1}")
        );
        assert_eq!(extract_json("no json"), None);
    }

    #[tokio::test]
    async fn test_classify_fenced_reply() {
        let llm = ScriptedLlmClient::new(vec![MockStep::text(
            "```json\n{\"category\":\"incident\",\"urgency\":\"high\",\"products\":[\"VPN\"],\"rationale\":\"VPN down for the whole team\"}\n```",
        )]);
        let c = classify_ticket(&llm, "The VPN is down, nobody can work").await.unwrap();
        assert_eq!(c.category, Category::Incident);
        assert_eq!(c.urgency, Urgency::High);
        assert_eq!(c.products, vec!["VPN"]);
        assert!(next_step(&c).starts_with("Route to quick diagnosis"));

        let calls = llm.calls();
        assert!(calls[0][0].content.contains("\"rationale\""));
        assert!(llm.tool_lists()[0].is_empty());
    }

    #[tokio::test]
    async fn test_classify_accepts_french_labels() {
        let llm = ScriptedLlmClient::new(vec![MockStep::text(
            "{\"category\":\"demande\",\"urgency\":\"normale\",\"rationale\":\"new laptop\"}",
        )]);
        let c = classify_ticket(&llm, "I need a new laptop").await.unwrap();
        assert_eq!(c.category, Category::Request);
        assert_eq!(c.urgency, Urgency::Normal);
        assert!(c.products.is_empty());
    }

    #[tokio::test]
    async fn test_classify_invalid_reply() {
        let llm = ScriptedLlmClient::new(vec![MockStep::text("I think it's an incident.")]);
        let err = classify_ticket(&llm, "printer broken").await.unwrap_err();
        assert!(matches!(err, AgentError::JsonParse(_)));

        let llm = ScriptedLlmClient::new(vec![MockStep::text("{\"category\":\"other\"}")]);
        let err = classify_ticket(&llm, "printer broken").await.unwrap_err();
        assert!(matches!(err, AgentError::JsonParse(_)));
    }
}
