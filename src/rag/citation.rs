//! 引用行：`Sources: (id1, id2)` 的解析与过滤
//!
//! 只处理回答中最后一条以 `Sources:` 开头的行；没有该行的回答原样返回。

fn is_sources_line(line: &str) -> bool {
    let t = line.trim_start();
    t.get(..8).is_some_and(|p| p.eq_ignore_ascii_case("sources:"))
}

fn last_sources_line(lines: &[&str]) -> Option<usize> {
    lines.iter().rposition(|l| is_sources_line(l))
}

fn split_ids(line: &str) -> Vec<String> {
    let rest = line.trim_start()[8..].trim();
    let inner = match (rest.find('('), rest.rfind(')')) {
        (Some(start), Some(end)) if start < end => &rest[start + 1..end],
        _ => rest.trim_start_matches('(').trim_end_matches(')'),
    };
    inner
        .split(',')
        .map(|id| id.trim().trim_matches(|c| c == '`' || c == '"' || c == '\'').trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// 最后一条 `Sources:` 行中的来源 ID；没有该行返回 None
pub fn parse_sources(answer: &str) -> Option<Vec<String>> {
    let lines: Vec<&str> = answer.lines().collect();
    last_sources_line(&lines).map(|i| split_ids(lines[i]))
}

/// 把引用行限制为 allowed 中的 ID（保持原顺序、去重）；全部被过滤时删除该行
pub fn enforce(answer: &str, allowed: &[String]) -> String {
    let lines: Vec<&str> = answer.lines().collect();
    let Some(idx) = last_sources_line(&lines) else {
        return answer.to_string();
    };

    let mut kept: Vec<String> = Vec::new();
    for id in split_ids(lines[idx]) {
        if allowed.contains(&id) && !kept.contains(&id) {
            kept.push(id);
        }
    }

    let dropped = split_ids(lines[idx]).len() - kept.len();
    if dropped > 0 {
        tracing::debug!(dropped, "removed uncited sources from answer");
    }

    let mut out: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    if kept.is_empty() {
        out.remove(idx);
    } else {
        out[idx] = format!("Sources: ({})", kept.join(", "));
    }
    out.join("\n").trim_end().to_string()
}
