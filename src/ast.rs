/// AST node types produced by the parsing engine
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parsed HTML attributes, keyed by attribute name as written in the source.
pub type Attributes = BTreeMap<String, AttrValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Node {
    // Block-level nodes
    Paragraph {
        children: Vec<Node>,
    },
    Heading {
        level: u8,
        children: Vec<Node>,
        id: String,
    },
    BlockQuote {
        children: Vec<Node>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alert: Option<String>,
    },
    BreakLine,
    BreakThematic,
    CodeBlock {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attrs: Option<Attributes>,
    },
    CodeInline {
        text: String,
    },
    // List nodes: every item is its own sequence of nodes
    OrderedList {
        items: Vec<Vec<Node>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<u32>,
    },
    UnorderedList {
        items: Vec<Vec<Node>>,
    },
    // GFM extension nodes
    Table {
        header: Vec<Vec<Node>>,
        cells: Vec<Vec<Vec<Node>>>,
        align: Vec<Alignment>,
    },
    GfmTask {
        completed: bool,
    },
    // Inline nodes
    Link {
        children: Vec<Node>,
        target: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Image {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
        target: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Text {
        text: String,
    },
    TextFormatted {
        tag: FormatTag,
        children: Vec<Node>,
    },
    // Raw HTML nodes
    HtmlBlock {
        tag: String,
        attrs: Attributes,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        children: Option<Vec<Node>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        verbatim: bool,
    },
    HtmlSelfClosing {
        tag: String,
        attrs: Attributes,
        #[serde(default)]
        is_closing_tag: bool,
    },
    HtmlComment {
        text: String,
    },
    /// Processing instructions, declarations and CDATA sections, kept as written
    RawHtml {
        text: String,
    },
    Frontmatter {
        text: String,
    },
    // Footnotes and references
    Footnote {
        label: String,
    },
    FootnoteReference {
        target: String,
        text: String,
    },
    /// Marker left where a link reference definition was consumed
    Ref {
        label: String,
    },
    RefCollection {
        refs: BTreeMap<String, LinkReference>,
        footnotes: Vec<FootnoteNote>,
    },
}

impl Node {
    /// Shorthand for a text node
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text { text: text.into() }
    }

    /// Reference markers and collections carry no visible content; renderers skip them.
    pub fn is_administrative(&self) -> bool {
        matches!(
            self,
            Node::Ref { .. } | Node::RefCollection { .. } | Node::Footnote { .. }
        )
    }

    /// Inline or block children of this node, if it has any.
    pub fn children(&self) -> Option<&[Node]> {
        match self {
            Node::Paragraph { children }
            | Node::Heading { children, .. }
            | Node::BlockQuote { children, .. }
            | Node::Link { children, .. }
            | Node::TextFormatted { children, .. } => Some(children),
            Node::HtmlBlock {
                children: Some(children),
                ..
            } => Some(children),
            _ => None,
        }
    }
}

/// Flatten nodes into their visible text, dropping all markup.
pub fn plain_text(nodes: &[Node]) -> String {
    let mut out = String::new();
    collect_text(nodes, &mut out);
    out
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text { text } | Node::CodeInline { text } => out.push_str(text),
            Node::Image { alt: Some(alt), .. } => out.push_str(alt),
            Node::BreakLine => out.push('\n'),
            Node::OrderedList { items, .. } | Node::UnorderedList { items } => {
                for item in items {
                    collect_text(item, out);
                }
            }
            other => {
                if let Some(children) = other.children() {
                    collect_text(children, out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    None,
    Left,
    Right,
    Center,
}

/// Element produced by an inline formatting span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatTag {
    Em,
    Strong,
    Del,
    Mark,
}

impl FormatTag {
    pub fn as_str(self) -> &'static str {
        match self {
            FormatTag::Em => "em",
            FormatTag::Strong => "strong",
            FormatTag::Del => "del",
            FormatTag::Mark => "mark",
        }
    }
}

/// Value of a single HTML attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Attribute written without a value, e.g. `<input disabled>`
    Flag(bool),
    Text(String),
    /// `style` declarations in source order
    Style(Vec<(String, String)>),
    /// A `{...}` expression evaluated as a JSON literal
    Json(serde_json::Value),
}

/// A link reference definition: `[label]: target "title"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReference {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A parsed footnote body, as carried by the reference collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootnoteNote {
    pub label: String,
    pub identifier: String,
    pub children: Vec<Node>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let node = Node::Heading {
            level: 2,
            children: vec![Node::text("Hi")],
            id: "hi".to_string(),
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "heading");
        assert_eq!(json["level"], 2);
        assert_eq!(json["children"][0]["type"], "text");
    }

    #[test]
    fn closing_tag_flag_uses_camel_case() {
        let node = Node::HtmlSelfClosing {
            tag: "br".to_string(),
            attrs: Attributes::new(),
            is_closing_tag: false,
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "htmlSelfClosing");
        assert_eq!(json["isClosingTag"], false);
    }

    #[test]
    fn plain_text_flattens_formatting() {
        let nodes = vec![
            Node::text("a "),
            Node::TextFormatted {
                tag: FormatTag::Strong,
                children: vec![Node::text("b")],
            },
            Node::CodeInline {
                text: "c".to_string(),
            },
        ];
        assert_eq!(plain_text(&nodes), "a bc");
    }

    #[test]
    fn administrative_nodes() {
        assert!(Node::Ref { label: "x".into() }.is_administrative());
        assert!(!Node::BreakLine.is_administrative());
    }
}
