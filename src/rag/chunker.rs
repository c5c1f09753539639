//! FAQ 文档分块
//!
//! 按 Markdown 标题切成小节：`# ` 为文档标题，`## ` 及更深的标题各起一个小节，标题前的引言单独成节。
//! 每个块都以「文档标题 + 小节标题」开头，正文按空行分段后装箱到 chunk_size 以内；
//! 超长段落依次按换行、空格、字符切开。按字符计数，UTF-8 安全。

use serde::{Deserialize, Serialize};

/// 文档块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// 块 ID：`{source_id}#{序号}`
    pub id: String,
    pub text: String,
    /// 来源文档 ID（文件名）
    pub source_id: String,
    /// 所在小节在原文档中的字节偏移
    pub offset: usize,
}

/// 分块策略
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// 目标块大小（字符数，含标题）
    pub chunk_size: usize,
    /// 同一小节相邻块之间最多重复的字符数（只重复整段）
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1200,
            chunk_overlap: 100,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
        }
    }
}

/// 一个标题下的内容
struct Section<'a> {
    header: String,
    offset: usize,
    lines: Vec<&'a str>,
}

/// 文档分块器
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// 将文档分割为块；没有正文的小节不产生块
    pub fn chunk(&self, source_id: &str, text: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for section in sections(text) {
            let size = self.config.chunk_size;
            // 标题太长时至少给正文留一半预算
            let budget = if section.header.is_empty() {
                size
            } else {
                size.saturating_sub(char_len(&section.header) + 2)
                    .max(size / 2)
                    .max(1)
            };

            for body in self.pack_body(&section.lines, budget) {
                let text = if section.header.is_empty() {
                    body
                } else {
                    format!("{}\n\n{}", section.header, body)
                };
                chunks.push(Chunk {
                    id: format!("{}#{}", source_id, chunks.len()),
                    text,
                    source_id: source_id.to_string(),
                    offset: section.offset,
                });
            }
        }
        chunks
    }

    /// 段落装箱；换块时若上一块最后一段不超过 chunk_overlap 且放得下，则带入下一块
    fn pack_body(&self, lines: &[&str], budget: usize) -> Vec<String> {
        let mut bodies = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_len = 0;

        for piece in paragraphs(lines)
            .iter()
            .flat_map(|p| split_to_fit(p, budget))
        {
            let piece_len = char_len(&piece);
            if !current.is_empty() && current_len + 2 + piece_len > budget {
                let carry = current
                    .last()
                    .filter(|last| {
                        let n = char_len(last);
                        n <= self.config.chunk_overlap && n + 2 + piece_len <= budget
                    })
                    .cloned();
                bodies.push(current.join("\n\n"));
                current = carry.into_iter().collect();
                current_len = current.first().map(|c| char_len(c)).unwrap_or(0);
            }
            if !current.is_empty() {
                current_len += 2;
            }
            current_len += piece_len;
            current.push(piece);
        }
        if !current.is_empty() {
            bodies.push(current.join("\n\n"));
        }
        bodies
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// `#`..`######` 加空格视为标题，返回 (级别, 标题行)
fn heading(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&level) && trimmed[level..].starts_with(' ') {
        Some((level, trimmed))
    } else {
        None
    }
}

fn sections(text: &str) -> Vec<Section<'_>> {
    let mut out = Vec::new();
    let mut title = String::new();
    let mut current = Section {
        header: String::new(),
        offset: 0,
        lines: Vec::new(),
    };
    let mut offset = 0;

    for raw in text.split_inclusive('\n') {
        let line = raw.trim_end_matches(['\n', '\r']);
        if let Some((level, head)) = heading(line) {
            out.push(std::mem::replace(
                &mut current,
                Section {
                    header: String::new(),
                    offset,
                    lines: Vec::new(),
                },
            ));
            if level == 1 {
                title = head.to_string();
                current.header = title.clone();
            } else if title.is_empty() {
                current.header = head.to_string();
            } else {
                current.header = format!("{title}\n{head}");
            }
        } else {
            current.lines.push(line);
        }
        offset += raw.len();
    }
    out.push(current);
    out
}

/// 按空行分段，段内保留换行
fn paragraphs(lines: &[&str]) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        out.push(current.join("\n"));
    }
    out
}

/// 把超出预算的文本依次按换行、空格切开并装箱；单个词仍超长时按字符硬切
fn split_to_fit(text: &str, budget: usize) -> Vec<String> {
    if char_len(text) <= budget {
        return vec![text.to_string()];
    }
    for sep in ["\n", " "] {
        if text.contains(sep) {
            return pack_parts(text.split(sep), sep, budget);
        }
    }
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(budget).map(|w| w.iter().collect()).collect()
}

fn pack_parts<'a>(parts: impl Iterator<Item = &'a str>, sep: &str, budget: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for part in parts.map(str::trim).filter(|p| !p.is_empty()) {
        if char_len(part) > budget {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            out.extend(split_to_fit(part, budget));
            continue;
        }
        if !current.is_empty() && char_len(&current) + char_len(sep) + char_len(part) > budget {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str(sep);
        }
        current.push_str(part);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const VPN: &str = "# VPN setup\n\nReach internal services from home.\n\n## Install the client\n\n1. Install GlobalProtect.\n2. Portal: vpn.corp.example\n\n## Troubleshooting\n\n- Portal not reachable: check DNS.\n";

    #[test]
    fn test_short_document_without_headings_single_chunk() {
        let chunks = Chunker::default().chunk("notes.md", "Server: vpn.corp.example\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "notes.md#0");
        assert_eq!(chunks[0].source_id, "notes.md");
        assert_eq!(chunks[0].text, "Server: vpn.corp.example");
        assert_eq!(chunks[0].offset, 0);
    }

    #[test]
    fn test_one_chunk_per_section_with_headings() {
        let chunks = Chunker::default().chunk("vpn-setup.md", VPN);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "# VPN setup\n\nReach internal services from home.",
                "# VPN setup\n## Install the client\n\n1. Install GlobalProtect.\n2. Portal: vpn.corp.example",
                "# VPN setup\n## Troubleshooting\n\n- Portal not reachable: check DNS.",
            ]
        );
        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["vpn-setup.md#0", "vpn-setup.md#1", "vpn-setup.md#2"]);
        assert_eq!(&VPN[chunks[1].offset..chunks[1].offset + 2], "##");
    }

    #[test]
    fn test_heading_only_section_is_skipped() {
        let chunks = Chunker::default().chunk("wifi.md", "# Office Wi-Fi\n## Networks\n\nCORP and CORP-GUEST.\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "# Office Wi-Fi\n## Networks\n\nCORP and CORP-GUEST.");
    }

    #[test]
    fn test_long_section_keeps_heading_on_every_chunk() {
        let chunker = Chunker::new(ChunkingConfig::new(60, 0));
        let text = "# Printers\n## Problems\n\nPaper jam: open tray 2.\n\nJob missing: check the VPN.\n\nPrinter missing: install Follow-Me.\n";
        let chunks = chunker.chunk("printer.md", text);
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(c.text.starts_with("# Printers\n## Problems\n\n"));
            assert!(c.text.chars().count() <= 60);
        }
        assert!(chunks[0].text.contains("Paper jam"));
        assert!(chunks.last().unwrap().text.contains("Follow-Me"));
    }

    #[test]
    fn test_short_paragraph_repeated_as_overlap() {
        let chunker = Chunker::new(ChunkingConfig::new(30, 10));
        let chunks = chunker.chunk("doc.md", "Step one long text.\n\nStep two.\n\nStep three.");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "Step one long text.\n\nStep two.");
        assert_eq!(chunks[1].text, "Step two.\n\nStep three.");
    }

    #[test]
    fn test_oversized_paragraph_utf8_safe() {
        let chunker = Chunker::new(ChunkingConfig::new(10, 2));
        let text = "Réinitialiser le mot de passe, étapes détaillées. 这是第二句话这是第二句话。";
        let chunks = chunker.chunk("fr.md", text);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 10);
            assert!(text.is_char_boundary(c.offset));
        }
        assert!(chunks.iter().any(|c| c.text.contains("这是")));
    }

    #[test]
    fn test_empty_document() {
        assert!(Chunker::default().chunk("empty.md", "").is_empty());
        assert!(Chunker::default().chunk("blank.md", "   \n\n ").is_empty());
    }
}
