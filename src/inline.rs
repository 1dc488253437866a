/// Inline content parsing: escapes, code spans, entities, raw HTML, links and formatting
use crate::ast::Node;
use crate::chars::{char_at, char_before, is_alphanumeric, is_ascii_punctuation};
use crate::entities::decode_entity_at;
use crate::formatting::match_inline_formatting;
use crate::html::{is_filtered_tag, parse_attributes, parse_html_element, parse_html_tag};
use crate::links::{
    parse_angle_autolink, parse_bare_autolink, parse_footnote_reference, parse_link_or_image,
};
use crate::options::{ParseOptions, ParseState};

/// Collects inline nodes, merging adjacent text
struct InlineBuilder {
    nodes: Vec<Node>,
    text: String,
}

impl InlineBuilder {
    fn new() -> Self {
        InlineBuilder {
            nodes: Vec::new(),
            text: String::new(),
        }
    }

    fn push_str(&mut self, s: &str) {
        self.text.push_str(s);
    }

    fn push_char(&mut self, c: char) {
        self.text.push(c);
    }

    fn flush(&mut self) {
        if !self.text.is_empty() {
            self.nodes.push(Node::Text {
                text: std::mem::take(&mut self.text),
            });
        }
    }

    fn push_node(&mut self, node: Node) {
        match node {
            Node::Text { text } => self.text.push_str(&text),
            node => {
                self.flush();
                self.nodes.push(node);
            }
        }
    }

    /// Hard line break: trailing spaces before it are dropped
    fn push_break(&mut self) {
        let trimmed = self.text.trim_end_matches(' ').len();
        self.text.truncate(trimmed);
        self.flush();
        self.nodes.push(Node::BreakLine);
    }

    fn finish(mut self) -> Vec<Node> {
        self.flush();
        self.nodes
    }
}

fn backtick_run(text: &str, pos: usize) -> usize {
    text.as_bytes()[pos..]
        .iter()
        .take_while(|&&b| b == b'`')
        .count()
}

/// Find the backtick run closing a code span opened at `pos`.
/// Returns (content start, content end, offset after the closing run).
fn scan_code_span(text: &str, pos: usize) -> Option<(usize, usize, usize)> {
    let run = backtick_run(text, pos);
    let content_start = pos + run;
    let mut i = content_start;

    while let Some(offset) = text[i..].find('`') {
        let close = i + offset;
        let close_run = backtick_run(text, close);
        if close_run == run {
            return Some((content_start, close, close + close_run));
        }
        i = close + close_run;
    }
    None
}

/// Offset just past the code span opened at `pos`, if it closes.
pub(crate) fn code_span_end(text: &str, pos: usize) -> Option<usize> {
    scan_code_span(text, pos).map(|(_, _, end)| end)
}

/// Parse a code span at `pos`. Line endings become spaces and one surrounding
/// space is stripped from each side when both are present.
pub fn parse_code_span(text: &str, pos: usize) -> Option<(Node, usize)> {
    let (start, end, after) = scan_code_span(text, pos)?;
    let content = text[start..end].replace('\n', " ");
    let content = if content.len() >= 2
        && content.starts_with(' ')
        && content.ends_with(' ')
        && !content.bytes().all(|b| b == b' ')
    {
        content[1..content.len() - 1].to_string()
    } else {
        content
    };
    Some((Node::CodeInline { text: content }, after))
}

/// Parse inline markdown into a list of nodes.
pub fn parse_inline(text: &str, state: ParseState<'_>, options: &ParseOptions) -> Vec<Node> {
    if state.too_deep() {
        tracing::debug!(depth = state.depth, "inline nesting ceiling reached");
        return if text.is_empty() {
            Vec::new()
        } else {
            vec![Node::text(text)]
        };
    }

    let bytes = text.as_bytes();
    let mut out = InlineBuilder::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => match char_at(text, i + 1) {
                Some('\n') => {
                    out.push_break();
                    i = skip_line_indent(text, i + 2);
                }
                Some(next) if is_ascii_punctuation(next) => {
                    out.push_char(next);
                    i += 2;
                }
                _ => {
                    out.push_char('\\');
                    i += 1;
                }
            },
            b'\n' => {
                if out.text.ends_with("  ") {
                    out.push_break();
                } else {
                    let trimmed = out.text.trim_end_matches(' ').len();
                    out.text.truncate(trimmed);
                    out.push_char('\n');
                }
                i = skip_line_indent(text, i + 1);
            }
            b'`' => match parse_code_span(text, i) {
                Some((Node::CodeInline { text: code }, end)) if state.in_table => {
                    // `\|` inside a cell's code span is a literal pipe
                    out.push_node(Node::CodeInline {
                        text: code.replace("\\|", "|"),
                    });
                    i = end;
                }
                Some((node, end)) => {
                    out.push_node(node);
                    i = end;
                }
                None => {
                    let run = backtick_run(text, i);
                    out.push_str(&text[i..i + run]);
                    i += run;
                }
            },
            b'&' => match decode_entity_at(text, i) {
                Some((decoded, end)) => {
                    out.push_str(&decoded);
                    i = end;
                }
                None => {
                    out.push_char('&');
                    i += 1;
                }
            },
            b'<' => match parse_angle_bracket(text, i, state, options) {
                Some((node, end)) => {
                    out.push_node(node);
                    i = end;
                }
                None => {
                    out.push_char('<');
                    i += 1;
                }
            },
            b'!' if bytes.get(i + 1) == Some(&b'[') => {
                match parse_link_or_image(text, i, state, options) {
                    Some((node, end)) => {
                        out.push_node(node);
                        i = end;
                    }
                    None => {
                        out.push_char('!');
                        i += 1;
                    }
                }
            }
            b'[' => {
                let parsed = if bytes.get(i + 1) == Some(&b'^') {
                    parse_footnote_reference(text, i, state, options)
                        .or_else(|| parse_link_or_image(text, i, state, options))
                } else {
                    parse_link_or_image(text, i, state, options)
                };
                match parsed {
                    Some((node, end)) => {
                        out.push_node(node);
                        i = end;
                    }
                    None => {
                        out.push_char('[');
                        i += 1;
                    }
                }
            }
            b'*' | b'_' | b'~' | b'=' => {
                // Intraword underscores never open
                let intraword = bytes[i] == b'_' && char_before(text, i).is_some_and(is_alphanumeric);
                let matched = if intraword {
                    None
                } else {
                    match_inline_formatting(&text[i..], &state)
                };
                match matched {
                    Some(m) => {
                        let children = parse_inline(m.content, state.nested(), options);
                        out.push_node(Node::TextFormatted {
                            tag: m.tag,
                            children,
                        });
                        i += m.full.len();
                    }
                    None => {
                        out.push_char(bytes[i] as char);
                        i += 1;
                    }
                }
            }
            b'h' | b'H' | b'w' | b'W' | b'f' | b'F' | b'm' | b'M'
                if !options.disable_auto_link && !state.in_anchor =>
            {
                match parse_bare_autolink(text, i, options) {
                    Some((node, end)) => {
                        out.push_node(node);
                        i = end;
                    }
                    None => {
                        out.push_char(bytes[i] as char);
                        i += 1;
                    }
                }
            }
            _ => {
                let c = char_at(text, i).unwrap_or('\u{FFFD}');
                out.push_char(c);
                i += c.len_utf8();
            }
        }
    }

    out.finish()
}

fn skip_line_indent(text: &str, pos: usize) -> usize {
    pos + text.as_bytes()[pos.min(text.len())..]
        .iter()
        .take_while(|&&b| b == b' ' || b == b'\t')
        .count()
}

/// Autolinks, comments and raw HTML tags
fn parse_angle_bracket(
    text: &str,
    pos: usize,
    state: ParseState<'_>,
    options: &ParseOptions,
) -> Option<(Node, usize)> {
    if let Some(parsed) = parse_angle_autolink(text, pos, options) {
        return Some(parsed);
    }
    if options.disable_parsing_raw_html {
        return None;
    }

    if let Some(body) = text[pos..].strip_prefix("<!--") {
        let close = body.find("-->")?;
        return Some((
            Node::HtmlComment {
                text: body[..close].to_string(),
            },
            pos + 4 + close + 3,
        ));
    }

    if let Some(parsed) = parse_html_element(text, pos, state, options) {
        return Some(parsed);
    }

    // Opening tag with no matching close
    let tag = parse_html_tag(text, pos)?;
    if options.tagfilter && is_filtered_tag(&tag.tag_lower) {
        return Some((Node::text(&text[pos..tag.end_pos]), tag.end_pos));
    }
    Some((
        Node::HtmlSelfClosing {
            attrs: parse_attributes(&tag.attrs, &tag.tag_lower, options),
            tag: tag.tag_name,
            is_closing_tag: false,
        },
        tag.end_pos,
    ))
}
