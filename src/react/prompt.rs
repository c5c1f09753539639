//! 系统前言：画像前言（可选）+ 固定的操作指引

/// 拼接系统前言；profile_preamble 为空时只含操作指引
pub fn build_system_preamble(profile_preamble: &str, tool_names: &[String]) -> String {
    let tools = if tool_names.is_empty() {
        "none".to_string()
    } else {
        tool_names.join(", ")
    };

    let instructions = format!(
        "You are an IT helpdesk assistant. You may call tools when needed ({tools}). \
If you use knowledge_lookup, build your answer STRICTLY from the returned snippets and \
end it with a line of the form: Sources: (file1.md, file2.md), listing only the sources you actually used. \
After any tool call, briefly explain the result before concluding. \
If you do not have enough information, say so and ask at most three clarifying questions."
    );

    let profile = profile_preamble.trim();
    if profile.is_empty() {
        instructions
    } else {
        format!("{profile}\n\n{instructions}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_tools_and_citation_rule() {
        let p = build_system_preamble("", &["check_host".to_string(), "knowledge_lookup".to_string()]);
        assert!(p.contains("(check_host, knowledge_lookup)"));
        assert!(p.contains("Sources: (file1.md, file2.md)"));
        assert!(p.contains("at most three clarifying questions"));
    }

    #[test]
    fn test_profile_comes_first() {
        let p = build_system_preamble("User: Alice (Finance)\n", &[]);
        assert!(p.starts_with("User: Alice (Finance)\n\nYou are an IT helpdesk assistant."));
    }
}
