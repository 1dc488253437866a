/// A markdown parser producing a typed, serializable AST
pub mod ast;
pub mod block;
pub mod chars;
pub mod entities;
pub mod formatting;
pub mod html;
pub mod inline;
pub mod links;
pub mod list;
pub mod normalize;
pub mod options;
pub mod refs;
pub mod table;

pub use ast::{AttrValue, Alignment, Attributes, FootnoteNote, FormatTag, LinkReference, Node};
pub use block::{parse_code_fenced, parse_markdown};
pub use chars::{Indent, calculate_indent};
pub use entities::decode_entity_references;
pub use html::{TagInfo, parse_html_tag, parse_style_attribute};
pub use inline::parse_inline;
pub use normalize::normalize_input;
pub use options::{OptionsError, ParseOptions, ParseState};
pub use refs::{Definition, RefTable, collect_reference_definitions, parse_definition};

/// Parse a markdown document into AST nodes.
///
/// The input is normalized, every reference and footnote definition is collected,
/// and the text is parsed as blocks or, for short single-line input, as inline
/// content. When any definitions exist a `refCollection` node leads the output.
pub fn parser(markdown: &str, options: &ParseOptions) -> Vec<Node> {
    let source = normalize_input(markdown);

    let mut refs = RefTable::new();
    collect_reference_definitions(&source, &mut refs, options);

    let state = ParseState::new(&refs);
    let inline = options.force_inline || (!options.force_block && looks_inline(&source));
    tracing::trace!(inline, len = source.len(), "parsing document");

    let mut nodes = if inline {
        parse_inline(&source, state.with_inline(true), options)
    } else {
        parse_markdown(&source, state, options)
    };

    if !refs.is_empty() {
        nodes.insert(0, ref_collection(&refs, state, options));
    }
    nodes
}

/// Input with no line break that the block dispatcher would only turn into a paragraph
fn looks_inline(source: &str) -> bool {
    if source.contains('\n') {
        return false;
    }
    let block_start = source.starts_with(['#', '>'])
        || source.starts_with("--")
        || source.starts_with("  ")
        || block::is_thematic_break(source)
        || block::is_fenced_code_start(source).is_some()
        || list::ListMarker::parse(source).is_some()
        || parse_definition(source, 0).is_some();
    !block_start
}

/// All definitions, with footnote bodies parsed. A body with a blank line holds
/// blocks; a single paragraph stays inline.
fn ref_collection(refs: &RefTable, state: ParseState<'_>, options: &ParseOptions) -> Node {
    let body_state = state.nested();
    let footnotes = refs
        .footnotes
        .iter()
        .map(|footnote| {
            let children = if footnote.source.contains("\n\n") {
                parse_markdown(&footnote.source, body_state, options)
            } else {
                parse_inline(footnote.source.trim(), body_state.with_inline(true), options)
            };
            FootnoteNote {
                label: footnote.label.clone(),
                identifier: (options.slugify)(&footnote.label),
                children,
            }
        })
        .collect();

    Node::RefCollection {
        refs: refs.links.clone(),
        footnotes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(markdown: &str) -> Vec<Node> {
        parser(markdown, &ParseOptions::default())
    }

    #[test]
    fn empty_input() {
        assert_eq!(parse(""), vec![]);
    }

    #[test]
    fn single_line_is_inline() {
        assert_eq!(parse("hello *world*")[0], Node::text("hello "));
        assert!(matches!(parse("# title")[0], Node::Heading { level: 1, .. }));
    }

    #[test]
    fn single_line_block_constructs() {
        assert_eq!(parse("---"), vec![Node::BreakThematic]);
        assert!(matches!(parse("1. item")[0], Node::OrderedList { .. }));
        assert!(matches!(parse("```js")[0], Node::CodeBlock { .. }));

        let nodes = parse("[x]: /u");
        assert!(matches!(nodes[0], Node::RefCollection { .. }));
        assert!(nodes[1..].iter().all(Node::is_administrative));
    }

    #[test]
    fn multi_line_is_block() {
        assert_eq!(
            parse("a\nb"),
            vec![Node::Paragraph {
                children: vec![Node::text("a\nb")],
            }]
        );
    }

    #[test]
    fn force_flags() {
        let options = ParseOptions {
            force_block: true,
            ..ParseOptions::default()
        };
        assert_eq!(
            parser("text", &options),
            vec![Node::Paragraph {
                children: vec![Node::text("text")],
            }]
        );

        let options = ParseOptions {
            force_inline: true,
            ..ParseOptions::default()
        };
        assert_eq!(parser("# text", &options), vec![Node::text("# text")]);
    }

    #[test]
    fn ref_collection_leads_output() {
        let nodes = parse("[a]\n\n[a]: /url \"T\"");
        let Node::RefCollection { refs, footnotes } = &nodes[0] else {
            panic!("expected ref collection, got {nodes:?}");
        };
        assert_eq!(refs["a"].target, "/url");
        assert_eq!(refs["a"].title.as_deref(), Some("T"));
        assert!(footnotes.is_empty());
        assert_eq!(
            nodes[1],
            Node::Paragraph {
                children: vec![Node::Link {
                    children: vec![Node::text("a")],
                    target: Some("/url".to_string()),
                    title: Some("T".to_string()),
                }],
            }
        );
        assert_eq!(nodes[2], Node::Ref { label: "a".to_string() });
    }

    #[test]
    fn footnotes_are_collected() {
        let nodes = parse("Text[^1].\n\n[^1]: The *note*.");
        let Node::RefCollection { footnotes, .. } = &nodes[0] else {
            panic!("expected ref collection, got {nodes:?}");
        };
        assert_eq!(footnotes[0].label, "1");
        assert_eq!(footnotes[0].identifier, "1");
        assert_eq!(footnotes[0].children[0], Node::text("The "));
        assert_eq!(
            nodes[1],
            Node::Paragraph {
                children: vec![
                    Node::text("Text"),
                    Node::FootnoteReference {
                        target: "#1".to_string(),
                        text: "1".to_string(),
                    },
                    Node::text("."),
                ],
            }
        );
    }

    #[test]
    fn crlf_matches_lf() {
        assert_eq!(parse("# a\r\n\r\nb\r\n"), parse("# a\n\nb\n"));
    }
}
