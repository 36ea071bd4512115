//! Rendering of Notion block trees as Markdown.
//!
//! A feature's content is its page body. Blocks arrive flat per level; nested
//! children are fetched separately and attached via [`Block::children`] before
//! rendering.

use serde_json::Value;

use crate::properties::rich_text_plain;

const INDENT: &str = "  ";

/// One block with its already-fetched children.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub raw: Value,
    pub children: Vec<Block>,
}

impl Block {
    pub fn leaf(raw: Value) -> Self {
        Self {
            raw,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.raw.get("id").and_then(Value::as_str)
    }

    pub fn kind(&self) -> &str {
        self.raw.get("type").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn has_children(&self) -> bool {
        self.raw
            .get("has_children")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn payload(&self) -> Option<&Value> {
        self.raw.get(self.kind())
    }

    fn text(&self) -> String {
        self.payload()
            .and_then(|p| p.get("rich_text"))
            .map(rich_text_plain)
            .unwrap_or_default()
    }
}

/// Renders a sequence of sibling blocks, one line (or fence) per block.
pub fn to_markdown(blocks: &[Block]) -> String {
    let mut lines = Vec::new();
    render(blocks, 0, &mut lines);
    lines.join("\n")
}

fn render(blocks: &[Block], depth: usize, out: &mut Vec<String>) {
    let indent = INDENT.repeat(depth);
    let mut ordinal = 0usize;
    for block in blocks {
        if block.kind() == "numbered_list_item" {
            ordinal += 1;
        } else {
            ordinal = 0;
        }
        if let Some(text) = render_block(block, ordinal) {
            for line in text.lines() {
                out.push(format!("{indent}{line}"));
            }
            if text.is_empty() {
                out.push(String::new());
            }
        }
        render(&block.children, depth + 1, out);
    }
}

fn render_block(block: &Block, ordinal: usize) -> Option<String> {
    let text = block.text();
    let rendered = match block.kind() {
        "paragraph" => text,
        "heading_1" => format!("# {text}"),
        "heading_2" => format!("## {text}"),
        "heading_3" => format!("### {text}"),
        "bulleted_list_item" => format!("- {text}"),
        "numbered_list_item" => format!("{ordinal}. {text}"),
        "to_do" => {
            let checked = block
                .payload()
                .and_then(|p| p.get("checked"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            format!("- [{}] {text}", if checked { "x" } else { " " })
        }
        "quote" | "callout" => format!("> {text}"),
        "toggle" => format!("- {text}"),
        "code" => {
            let language = block
                .payload()
                .and_then(|p| p.get("language"))
                .and_then(Value::as_str)
                .filter(|l| *l != "plain text")
                .unwrap_or_default();
            format!("```{language}\n{text}\n```")
        }
        "divider" => "---".to_owned(),
        _ => return None,
    };
    Some(rendered)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn block(kind: &str, text: &str) -> Block {
        Block::leaf(json!({
            "type": kind,
            kind: {"rich_text": [{"plain_text": text}]}
        }))
    }

    #[test]
    fn renders_common_blocks() {
        let blocks = vec![
            block("heading_2", "Goal"),
            block("paragraph", "Users can sign in."),
            block("bulleted_list_item", "email"),
            block("bulleted_list_item", "oauth"),
            Block::leaf(json!({"type": "divider", "divider": {}})),
        ];
        assert_eq!(
            to_markdown(&blocks),
            "## Goal\nUsers can sign in.\n- email\n- oauth\n---"
        );
    }

    #[test]
    fn numbered_items_count_per_run() {
        let blocks = vec![
            block("numbered_list_item", "one"),
            block("numbered_list_item", "two"),
            block("paragraph", "break"),
            block("numbered_list_item", "again"),
        ];
        assert_eq!(to_markdown(&blocks), "1. one\n2. two\nbreak\n1. again");
    }

    #[test]
    fn to_do_and_code() {
        let blocks = vec![
            Block::leaf(json!({
                "type": "to_do",
                "to_do": {"rich_text": [{"plain_text": "ship"}], "checked": true}
            })),
            Block::leaf(json!({
                "type": "code",
                "code": {"rich_text": [{"plain_text": "cargo test"}], "language": "shell"}
            })),
        ];
        assert_eq!(to_markdown(&blocks), "- [x] ship\n```shell\ncargo test\n```");
    }

    #[test]
    fn nested_children_are_indented() {
        let mut parent = block("bulleted_list_item", "parent");
        parent.children = vec![block("bulleted_list_item", "child")];
        assert_eq!(to_markdown(&[parent]), "- parent\n  - child");
    }

    #[test]
    fn unsupported_blocks_are_dropped_and_empty_paragraphs_kept() {
        let blocks = vec![
            block("paragraph", "a"),
            Block::leaf(json!({"type": "image", "image": {}})),
            block("paragraph", ""),
            block("paragraph", "b"),
        ];
        assert_eq!(to_markdown(&blocks), "a\n\nb");
    }
}
