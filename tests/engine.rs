use pretty_assertions::assert_eq;
use treemark::formatting::match_inline_formatting;
use treemark::{
    FormatTag, Node, ParseOptions, ParseState, RefTable, decode_entity_references,
    normalize_input, parse_code_fenced, parser,
};

fn parse(markdown: &str) -> Vec<Node> {
    parser(markdown, &ParseOptions::default())
}

#[test]
fn normalization_is_idempotent() {
    let once = normalize_input("\u{FEFF}a\r\nb\rc\0d").into_owned();
    assert_eq!(once, "a\nb\nc\u{FFFD}d");
    assert_eq!(normalize_input(&once), once);
}

#[test]
fn line_ending_variants_parse_identically() {
    let lf = "# Title\n\n- a\n- b\n\n> quote\nlazy\n";
    let crlf = lf.replace('\n', "\r\n");
    let cr = lf.replace('\n', "\r");
    assert_eq!(parse(&crlf), parse(lf));
    assert_eq!(parse(&cr), parse(lf));
}

#[test]
fn parser_is_total_on_odd_input() {
    for input in ["", " ", "\n\n\n", "\t \t", "\0", "\u{FEFF}", "\u{D7FF}\u{E000}", "&#xd800;", "<", "[", "`", "\\"] {
        let _ = parse(input);
    }
}

#[test]
fn entity_decoding() {
    assert_eq!(decode_entity_references("&amp;"), "&");
    assert_eq!(decode_entity_references("&#65;"), "A");
    assert_eq!(decode_entity_references("&#x1F600;"), "\u{1F600}");
    assert_eq!(decode_entity_references("&#xd800;"), "\u{FFFD}");
    assert_eq!(decode_entity_references("&foo;"), "&foo;");
}

#[test]
fn fenced_code_symmetry() {
    let options = ParseOptions::default();
    let (node, _) = parse_code_fenced("```\ncode\n```", 0, &options).unwrap();
    assert_eq!(
        node,
        Node::CodeBlock {
            text: "code".to_string(),
            lang: None,
            attrs: None,
        }
    );
    assert!(parse_code_fenced("``\nx\n``", 0, &options).is_none());
}

#[test]
fn emphasis_matching() {
    let refs = RefTable::new();
    let state = ParseState::new(&refs).with_inline(true);

    let m = match_inline_formatting("*italic*", &state).unwrap();
    assert_eq!((m.full, m.tag, m.content), ("*italic*", FormatTag::Em, "italic"));

    let m = match_inline_formatting("***text***", &state).unwrap();
    assert_eq!(m.tag, FormatTag::Strong);
    assert_eq!(m.content, "*text*");

    assert!(match_inline_formatting("*foo_", &state).is_none());
    assert!(match_inline_formatting("*foo\n\nbar*", &state).is_none());
    assert!(match_inline_formatting("*foo `code\n\nblock` bar*", &state).is_some());
}

#[test]
fn punctuation_flanked_emphasis() {
    assert_eq!(
        parse("a*\"foo\"*"),
        vec![
            Node::text("a"),
            Node::TextFormatted {
                tag: FormatTag::Em,
                children: vec![Node::text("\"foo\"")],
            },
        ]
    );
}

#[test]
fn definitions_after_single_line_blocks_resolve() {
    for source in [
        "# Title\n[x]: /u\n\n[x]",
        "---\n[x]: /u\n\n[x]",
        "Foo\n===\n[x]: /u\n\n[x]",
        "| a |\n| - |\n| 1 |\n[x]: /u\n\n[x]",
    ] {
        let nodes = parse(source);
        assert!(matches!(nodes[0], Node::RefCollection { .. }), "source: {source:?}");
        let Some(Node::Paragraph { children }) = nodes.last() else {
            panic!("expected trailing paragraph, got {nodes:?}");
        };
        assert!(
            matches!(&children[0], Node::Link { target: Some(t), .. } if t == "/u"),
            "source: {source:?}"
        );
    }
}

#[test]
fn list_is_closed_by_following_html() {
    let nodes = parse("- foo\n\n\n\n<small>Hi</small>");
    assert_eq!(nodes.len(), 2);
    assert_eq!(
        nodes[0],
        Node::UnorderedList {
            items: vec![vec![Node::text("foo")]],
        }
    );
    assert!(!matches!(
        nodes[1],
        Node::UnorderedList { .. } | Node::OrderedList { .. }
    ));
}

#[test]
fn references_resolve_forward() {
    let nodes = parse("[Link][ref]\n\n[ref]: http://example.com");
    assert!(matches!(nodes[0], Node::RefCollection { .. }));
    assert_eq!(
        nodes[1],
        Node::Paragraph {
            children: vec![Node::Link {
                children: vec![Node::text("Link")],
                target: Some("http://example.com".to_string()),
                title: None,
            }],
        }
    );
}

#[test]
fn reference_labels_are_case_insensitive() {
    let nodes = parse("[ΑΓΩ]\n\n[αγω]: /greek");
    let Node::Paragraph { children } = &nodes[1] else {
        panic!("expected paragraph, got {nodes:?}");
    };
    assert!(matches!(&children[0], Node::Link { target: Some(t), .. } if t == "/greek"));
}

#[test]
fn first_definition_wins() {
    let nodes = parse("[a]\n\n[a]: /one\n[a]: /two");
    let Node::Paragraph { children } = &nodes[1] else {
        panic!("expected paragraph, got {nodes:?}");
    };
    assert!(matches!(&children[0], Node::Link { target: Some(t), .. } if t == "/one"));
}

#[test]
fn autolink_domain_rule() {
    assert_eq!(parse("https://example_.com"), vec![Node::text("https://example_.com")]);
    assert_eq!(
        parse("https://a_b.c_d.example.com/path"),
        vec![Node::Link {
            children: vec![Node::text("https://a_b.c_d.example.com/path")],
            target: Some("https://a_b.c_d.example.com/path".to_string()),
            title: None,
        }]
    );
}

#[test]
fn disable_auto_link_keeps_text() {
    let options = ParseOptions {
        disable_auto_link: true,
        ..ParseOptions::default()
    };
    assert_eq!(
        parser("see www.example.com", &options),
        vec![Node::text("see www.example.com")]
    );
}

#[test]
fn tagfilter_escapes_disallowed_tags() {
    let nodes = parse("a <script>alert(1)</script> b");
    assert!(nodes.iter().all(|n| matches!(n, Node::Text { .. })));
}

#[test]
fn raw_html_can_be_disabled() {
    let options = ParseOptions {
        disable_parsing_raw_html: true,
        ..ParseOptions::default()
    };
    assert_eq!(parser("a <b>c</b>", &options), vec![Node::text("a <b>c</b>")]);
}

#[test]
fn enforce_atx_headings() {
    assert!(matches!(parse("#Heading")[0], Node::Heading { .. }));

    let options = ParseOptions {
        enforce_atx_headings: true,
        ..ParseOptions::default()
    };
    assert_eq!(
        parser("#Heading", &options),
        vec![Node::Paragraph {
            children: vec![Node::text("#Heading")],
        }]
    );
}

#[test]
fn custom_slugify_and_sanitizer() {
    fn upper(text: &str) -> String {
        text.to_uppercase()
    }
    fn deny_all(_url: &str, _tag: &str, _attr: &str) -> Option<String> {
        None
    }
    let options = ParseOptions {
        slugify: upper,
        sanitizer: deny_all,
        ..ParseOptions::default()
    };
    assert!(matches!(&parser("# a b", &options)[0], Node::Heading { id, .. } if id == "A B"));
    assert_eq!(
        parser("[x](/y)", &options),
        vec![Node::Link {
            children: vec![Node::text("x")],
            target: None,
            title: None,
        }]
    );
}

#[test]
fn script_urls_are_dropped() {
    assert_eq!(
        parse("[x](javascript:alert(1))"),
        vec![Node::Link {
            children: vec![Node::text("x")],
            target: None,
            title: None,
        }]
    );
}

#[test]
fn deep_blockquote_nesting_degrades_to_text() {
    let input = ">".repeat(500) + " deep";
    let nodes = parse(&input);
    let mut depth = 0;
    let mut current = &nodes;
    while let Some(Node::BlockQuote { children, .. }) = current.first() {
        depth += 1;
        current = children;
    }
    assert!(depth < 500);
    assert!(!current.is_empty());
}
