//! Lightweight markdown rendering for report display
//!
//! Reports come back as markdown-flavored text. This module parses the
//! subset the prompts actually ask for (headings, lists, bold, italic)
//! into structured blocks the terminal layer can paint. Anything it does
//! not recognize falls through as a plain paragraph, so a surprising
//! response still displays.

use std::sync::OnceLock;

use regex::Regex;

/// An inline run of styled text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Text(String),
    Emphasis(String),
    Strong(String),
}

/// One block-level element of a rendered report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, spans: Vec<Span> },
    Paragraph(Vec<Span>),
    UnorderedList(Vec<Vec<Span>>),
    OrderedList(Vec<Vec<Span>>),
}

fn inline_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__|\*(.+?)\*|_(.+?)_").unwrap())
}

/// Split a line into styled spans
pub fn parse_inline(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut last = 0;

    for caps in inline_re().captures_iter(text) {
        let m = caps.get(0).unwrap();
        if m.start() > last {
            spans.push(Span::Text(text[last..m.start()].to_string()));
        }
        if let Some(strong) = caps.get(1).or_else(|| caps.get(2)) {
            spans.push(Span::Strong(strong.as_str().to_string()));
        } else if let Some(em) = caps.get(3).or_else(|| caps.get(4)) {
            spans.push(Span::Emphasis(em.as_str().to_string()));
        }
        last = m.end();
    }

    if last < text.len() {
        spans.push(Span::Text(text[last..].to_string()));
    }
    spans
}

#[derive(Debug, PartialEq, Eq)]
enum LineKind {
    Blank,
    Heading(u8),
    Bullet,
    Numbered,
    Text,
}

fn classify(line: &str) -> LineKind {
    static NUMBERED: OnceLock<Regex> = OnceLock::new();
    let numbered = NUMBERED.get_or_init(|| Regex::new(r"^\d+\.\s+").unwrap());

    let trimmed = line.trim();
    if trimmed.is_empty() {
        LineKind::Blank
    } else if trimmed.starts_with("### ") {
        LineKind::Heading(3)
    } else if trimmed.starts_with("## ") {
        LineKind::Heading(2)
    } else if trimmed.starts_with("# ") {
        LineKind::Heading(1)
    } else if trimmed.starts_with("- ") || trimmed.starts_with("* ") {
        LineKind::Bullet
    } else if numbered.is_match(trimmed) {
        LineKind::Numbered
    } else {
        LineKind::Text
    }
}

/// Parse report text into display blocks
pub fn parse(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut list_items: Vec<Vec<Span>> = Vec::new();
    let mut list_kind: Option<LineKind> = None;
    let mut paragraph: Vec<String> = Vec::new();

    fn flush_list(blocks: &mut Vec<Block>, items: &mut Vec<Vec<Span>>, kind: &mut Option<LineKind>) {
        if !items.is_empty() {
            let items = std::mem::take(items);
            blocks.push(match kind {
                Some(LineKind::Numbered) => Block::OrderedList(items),
                _ => Block::UnorderedList(items),
            });
        }
        *kind = None;
    }

    fn flush_paragraph(blocks: &mut Vec<Block>, lines: &mut Vec<String>) {
        if !lines.is_empty() {
            let joined = std::mem::take(lines).join(" ");
            blocks.push(Block::Paragraph(parse_inline(&joined)));
        }
    }

    for line in text.lines() {
        let kind = classify(line);
        let trimmed = line.trim();

        match kind {
            LineKind::Blank => {
                flush_paragraph(&mut blocks, &mut paragraph);
                flush_list(&mut blocks, &mut list_items, &mut list_kind);
            }
            LineKind::Heading(level) => {
                flush_paragraph(&mut blocks, &mut paragraph);
                flush_list(&mut blocks, &mut list_items, &mut list_kind);
                let content = trimmed[level as usize..].trim_start();
                blocks.push(Block::Heading {
                    level,
                    spans: parse_inline(content),
                });
            }
            LineKind::Bullet | LineKind::Numbered => {
                flush_paragraph(&mut blocks, &mut paragraph);
                if list_kind.as_ref().is_some_and(|k| *k != kind) {
                    flush_list(&mut blocks, &mut list_items, &mut list_kind);
                }
                let content = match kind {
                    LineKind::Bullet => &trimmed[2..],
                    _ => trimmed.split_once(". ").map(|(_, rest)| rest).unwrap_or(""),
                };
                list_items.push(parse_inline(content.trim_start()));
                list_kind = Some(kind);
            }
            LineKind::Text => {
                flush_list(&mut blocks, &mut list_items, &mut list_kind);
                paragraph.push(trimmed.to_string());
            }
        }
    }

    flush_paragraph(&mut blocks, &mut paragraph);
    flush_list(&mut blocks, &mut list_items, &mut list_kind);
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inline_mixed() {
        let spans = parse_inline("Some *em* and **strong** text");
        assert_eq!(
            spans,
            vec![
                Span::Text("Some ".to_string()),
                Span::Emphasis("em".to_string()),
                Span::Text(" and ".to_string()),
                Span::Strong("strong".to_string()),
                Span::Text(" text".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_inline_underscore_variants() {
        let spans = parse_inline("__bold__ and _italic_");
        assert_eq!(spans[0], Span::Strong("bold".to_string()));
        assert_eq!(spans[2], Span::Emphasis("italic".to_string()));
    }

    #[test]
    fn test_parse_document() {
        let blocks = parse("# Title\n\nSome *em* and **strong** text\n- item1\n- item2\n");
        assert_eq!(blocks.len(), 3);
        assert!(matches!(&blocks[0], Block::Heading { level: 1, .. }));
        assert!(matches!(&blocks[1], Block::Paragraph(_)));
        match &blocks[2] {
            Block::UnorderedList(items) => assert_eq!(items.len(), 2),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_ordered_list() {
        let blocks = parse("1. First step\n2. Second step\n");
        match &blocks[0] {
            Block::OrderedList(items) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0], vec![Span::Text("First step".to_string())]);
            }
            other => panic!("expected ordered list, got {other:?}"),
        }
    }

    #[test]
    fn test_adjacent_paragraph_lines_join() {
        let blocks = parse("line one\nline two\n\nline three\n");
        assert_eq!(blocks.len(), 2);
        match &blocks[0] {
            Block::Paragraph(spans) => assert_eq!(spans, &vec![Span::Text("line one line two".to_string())]),
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn test_list_kind_change_splits_lists() {
        let blocks = parse("- a\n1. b\n");
        assert_eq!(blocks.len(), 2);
        assert!(matches!(&blocks[0], Block::UnorderedList(_)));
        assert!(matches!(&blocks[1], Block::OrderedList(_)));
    }

    #[test]
    fn test_heading_levels() {
        let blocks = parse("## Two\n### Three\n");
        assert!(matches!(&blocks[0], Block::Heading { level: 2, .. }));
        assert!(matches!(&blocks[1], Block::Heading { level: 3, .. }));
    }
}
