/// Block-level dispatcher and the leaf / container block parsers
use crate::ast::{Node, plain_text};
use crate::chars::{
    count_indent_columns, count_leading_spaces, expand_tabs, is_blank, remove_indent_columns,
};
use crate::html::{
    HtmlBlockKind, html_block_ends, html_block_kind, parse_attributes, parse_html_children,
    parse_html_element, parse_html_tag,
};
use crate::inline::parse_inline;
use crate::links::unescape_string;
use crate::list::ListMarker;
use crate::options::{ParseOptions, ParseState};
use crate::refs::{Definition, parse_definition};
use crate::table::is_table_start;

/// Line-oriented block parser over one source string
pub(crate) struct BlockParser<'a> {
    src: &'a str,
    lines: Vec<&'a str>,
    /// Byte offset of each line in `src`
    offsets: Vec<usize>,
    pub(crate) state: ParseState<'a>,
    pub(crate) options: &'a ParseOptions,
}

/// Parse markdown source into block nodes.
pub fn parse_markdown(source: &str, state: ParseState<'_>, options: &ParseOptions) -> Vec<Node> {
    if state.too_deep() {
        tracing::debug!(depth = state.depth, "block nesting ceiling reached");
        return if source.is_empty() {
            Vec::new()
        } else {
            vec![Node::text(source)]
        };
    }
    BlockParser::new(source, state, options).parse()
}

/// Parse a fenced code block starting at byte offset `pos` (the start of a line).
/// Returns the code block and the offset just past its closing fence line.
pub fn parse_code_fenced(text: &str, pos: usize, options: &ParseOptions) -> Option<(Node, usize)> {
    let lines: Vec<&str> = text[pos..].split('\n').collect();
    let (node, consumed) = parse_fenced_lines(&lines, options)?;
    let end = lines[..consumed]
        .iter()
        .map(|line| line.len() + 1)
        .sum::<usize>();
    Some((node, (pos + end).min(text.len())))
}

/// Check if a line starts a fenced code block.
/// Returns Some((fence_char, fence_length, indent)) if it does
pub(crate) fn is_fenced_code_start(line: &str) -> Option<(char, usize, usize)> {
    let indent = count_leading_spaces(line);
    if indent >= 4 {
        return None;
    }
    let after_indent = &line[indent..];
    let fence_char = after_indent.chars().next()?;
    if fence_char != '`' && fence_char != '~' {
        return None;
    }

    let fence_len = after_indent
        .chars()
        .take_while(|&c| c == fence_char)
        .count();
    if fence_len < 3 {
        return None;
    }

    // A backtick fence's info string cannot contain backticks (that would be a code span)
    if fence_char == '`' && after_indent[fence_len..].contains('`') {
        return None;
    }

    Some((fence_char, fence_len, indent))
}

/// Check if a line closes a fence opened with `fence_char` x `min_fence_len`
pub(crate) fn is_closing_fence(line: &str, fence_char: char, min_fence_len: usize) -> bool {
    let indent = count_leading_spaces(line);
    if indent >= 4 {
        return false;
    }
    let after_indent = &line[indent..];
    let fence_len = after_indent
        .chars()
        .take_while(|&c| c == fence_char)
        .count();
    fence_len >= min_fence_len && is_blank(&after_indent[fence_len..])
}

/// Fenced code over pre-split lines; returns the node and lines consumed
fn parse_fenced_lines(lines: &[&str], options: &ParseOptions) -> Option<(Node, usize)> {
    let first_line = *lines.first()?;
    let (fence_char, fence_len, fence_indent) = is_fenced_code_start(first_line)?;
    let info = first_line[fence_indent + fence_len..].trim();

    let (lang, attrs) = match info.split_once([' ', '\t']) {
        Some((word, rest)) => (word, rest.trim()),
        None => (info, ""),
    };
    let lang = (!lang.is_empty()).then(|| unescape_string(lang));
    let attrs = (!attrs.is_empty()).then(|| parse_attributes(attrs, "code", options));

    let mut end = lines.len();
    let mut closed = false;
    for (idx, line) in lines.iter().enumerate().skip(1) {
        if is_closing_fence(line, fence_char, fence_len) {
            end = idx;
            closed = true;
            break;
        }
    }

    // An unclosed fence stops at the next opening fence that carries an info string
    if !closed
        && let Some(idx) = lines.iter().skip(1).position(|line| {
            is_fenced_code_start(line).is_some_and(|(c, len, indent)| {
                c == fence_char && !line[indent + len..].trim().is_empty()
            })
        })
    {
        end = idx + 1;
    }

    let text = lines[1..end]
        .iter()
        .map(|line| remove_indent_columns(line, fence_indent))
        .collect::<Vec<_>>()
        .join("\n");
    let consumed = if closed { end + 1 } else { end };

    Some((Node::CodeBlock { text, lang, attrs }, consumed))
}

/// Parse an ATX heading line into its level and raw content
pub(crate) fn atx_heading(line: &str, enforce_space: bool) -> Option<(u8, &str)> {
    let indent = count_leading_spaces(line);
    if indent >= 4 {
        return None;
    }
    let trimmed = &line[indent..];
    let level = trimmed.bytes().take_while(|&b| b == b'#').count();
    if !(1..=6).contains(&level) {
        return None;
    }

    let after_hashes = &trimmed[level..];
    if !after_hashes.is_empty() && !after_hashes.starts_with([' ', '\t']) && enforce_space {
        return None;
    }

    let mut text = after_hashes.trim();

    // Optional closing sequence, which must be preceded by whitespace
    if text.bytes().all(|b| b == b'#') {
        text = "";
    } else {
        let without_hashes = text.trim_end_matches('#');
        if without_hashes.len() < text.len() && without_hashes.ends_with([' ', '\t']) {
            text = without_hashes.trim_end();
        }
    }

    Some((level as u8, text))
}

pub(crate) fn is_thematic_break(line: &str) -> bool {
    if count_leading_spaces(line) >= 4 {
        return false;
    }
    let mut marks = line.chars().filter(|c| !matches!(c, ' ' | '\t'));
    let Some(first) = marks.next() else {
        return false;
    };
    if !matches!(first, '-' | '_' | '*') {
        return false;
    }
    let mut count = 1;
    for c in marks {
        if c != first {
            return false;
        }
        count += 1;
    }
    count >= 3
}

pub(crate) fn is_blockquote_start(line: &str) -> bool {
    let indent = count_leading_spaces(line);
    indent < 4 && line[indent..].starts_with('>')
}

/// Strip the blockquote marker (>) and optional following space from a line
pub(crate) fn strip_blockquote_marker(line: &str) -> String {
    let indent = count_leading_spaces(line);
    let Some(after_marker) = line[indent..].strip_prefix('>') else {
        return line.to_string();
    };

    if let Some(rest) = after_marker.strip_prefix(' ') {
        return rest.to_string();
    }
    if after_marker.starts_with('\t') {
        // The optional space may be part of a tab; expand from the marker's column
        let expanded = expand_tabs(after_marker, indent + 1);
        return expanded
            .strip_prefix(' ')
            .map_or(expanded.clone(), str::to_string);
    }
    after_marker.to_string()
}

/// Setext underline: returns level 1 for `=`, 2 for `-`
pub(crate) fn is_setext_underline(line: &str) -> Option<u8> {
    let indent = count_leading_spaces(line);
    if indent >= 4 {
        return None;
    }
    let underline = line[indent..].trim_end();
    let level = match underline.bytes().next()? {
        b'=' => 1,
        b'-' => 2,
        _ => return None,
    };
    underline
        .bytes()
        .all(|b| b == underline.as_bytes()[0])
        .then_some(level)
}

/// `[!KIND]` on the first line of a block quote
fn parse_alert_marker(line: &str) -> Option<&str> {
    let kind = line.trim().strip_prefix("[!")?.strip_suffix(']')?;
    (!kind.is_empty() && kind.chars().all(|c| c.is_ascii_alphabetic())).then_some(kind)
}

/// Escape a lazy line that would otherwise read as a setext underline
fn escape_setext_underline(line: &str) -> String {
    if is_setext_underline(line).is_none() {
        return line.to_string();
    }
    let indent = count_leading_spaces(line);
    format!("{}\\{}", &line[..indent], &line[indent..])
}

impl<'a> BlockParser<'a> {
    fn new(src: &'a str, state: ParseState<'a>, options: &'a ParseOptions) -> Self {
        let lines: Vec<&str> = src.split('\n').collect();
        let mut offsets = Vec::with_capacity(lines.len());
        let mut offset = 0;
        for line in &lines {
            offsets.push(offset);
            offset += line.len() + 1;
        }
        BlockParser {
            src,
            lines,
            offsets,
            state,
            options,
        }
    }

    /// Index of the line containing byte offset `pos`
    fn line_index(&self, pos: usize) -> usize {
        self.offsets
            .partition_point(|&start| start <= pos)
            .saturating_sub(1)
    }

    pub(crate) fn inline_state(&self) -> ParseState<'a> {
        self.state.with_inline(true)
    }

    pub(crate) fn parse_inline_text(&self, text: &str) -> Vec<Node> {
        parse_inline(text, self.inline_state(), self.options)
    }

    fn parse(&self) -> Vec<Node> {
        let mut blocks = Vec::new();
        let mut i = 0;

        if self.state.depth == 0
            && let Some((frontmatter, consumed)) = self.parse_frontmatter()
        {
            blocks.push(frontmatter);
            i = consumed;
        }

        while i < self.lines.len() {
            if is_blank(self.lines[i]) {
                i += 1;
                continue;
            }
            let (mut nodes, consumed) = self.parse_block(i);
            blocks.append(&mut nodes);
            i += consumed.max(1);
        }
        blocks
    }

    /// Dispatch one block starting at line `i`
    fn parse_block(&self, i: usize) -> (Vec<Node>, usize) {
        let line = self.lines[i];
        let lines = &self.lines[i..];

        if let Some(parsed) = self.parse_definition_block(i) {
            return parsed;
        }

        if let Some((level, text)) = atx_heading(line, self.options.enforce_atx_headings) {
            return (vec![self.heading(level, text)], 1);
        }

        if is_thematic_break(line) {
            return (vec![Node::BreakThematic], 1);
        }

        if let Some((code, consumed)) = parse_fenced_lines(lines, self.options) {
            return (vec![code], consumed);
        }

        if count_indent_columns(line) >= 4 {
            let (code, consumed) = self.parse_indented_code_block(lines);
            return (vec![code], consumed);
        }

        if is_blockquote_start(line) {
            let (quote, consumed) = self.parse_blockquote(lines);
            return (vec![quote], consumed);
        }

        if let Some(kind) = html_block_kind(line, self.options) {
            return self.parse_html_block(i, kind);
        }

        if let Some(marker) = ListMarker::parse(line) {
            let (list, consumed) = self.parse_list(lines, marker);
            return (vec![list], consumed);
        }

        if let Some((table, consumed)) = self.parse_table(lines) {
            return (vec![table], consumed);
        }

        let (paragraph, consumed) = self.parse_paragraph(lines);
        (vec![paragraph], consumed)
    }

    /// YAML frontmatter: `---` fences at the very start with at least one `key:` line
    fn parse_frontmatter(&self) -> Option<(Node, usize)> {
        if self.lines.first()?.trim_end() != "---" {
            return None;
        }
        let close = self
            .lines
            .iter()
            .skip(1)
            .position(|line| line.trim_end() == "---")?
            + 1;
        let inner = &self.lines[1..close];

        let has_key = inner.iter().any(|line| {
            line.split_once(':').is_some_and(|(key, _)| {
                !key.is_empty()
                    && key
                        .chars()
                        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-'))
            })
        });
        if !has_key {
            return None;
        }

        Some((
            Node::Frontmatter {
                text: inner.join("\n"),
            },
            close + 1,
        ))
    }

    /// Reference and footnote definitions. Already collected by the pre-pass, so they
    /// only leave a marker at the top level.
    fn parse_definition_block(&self, i: usize) -> Option<(Vec<Node>, usize)> {
        let line = self.lines[i];
        let indent = count_leading_spaces(line);
        if indent > 3 || !line[indent..].starts_with('[') {
            return None;
        }
        let (definition, end) = parse_definition(self.src, self.offsets[i])?;
        let next_line = self.offsets.partition_point(|&start| start < end);
        let consumed = next_line.max(i + 1) - i;

        if self.state.depth > 0 {
            return Some((Vec::new(), consumed));
        }
        let marker = match definition {
            Definition::Link { label, .. } => Node::Ref { label },
            Definition::Footnote { label, .. } => Node::Footnote { label },
        };
        Some((vec![marker], consumed))
    }

    fn heading(&self, level: u8, text: &str) -> Node {
        let children = self.parse_inline_text(text);
        let id = (self.options.slugify)(&plain_text(&children));
        Node::Heading {
            level,
            children,
            id,
        }
    }

    fn parse_indented_code_block(&self, lines: &[&str]) -> (Node, usize) {
        let mut code_lines = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];
            if !is_blank(line) && count_indent_columns(line) >= 4 {
                code_lines.push(remove_indent_columns(line, 4));
                i += 1;
            } else if is_blank(line) {
                // Blank lines belong to the block only if more indented code follows
                let mut j = i + 1;
                while j < lines.len() && is_blank(lines[j]) {
                    j += 1;
                }
                if j < lines.len() && count_indent_columns(lines[j]) >= 4 {
                    for blank in &lines[i..j] {
                        code_lines.push(remove_indent_columns(blank, 4));
                    }
                    i = j;
                } else {
                    break;
                }
            } else {
                break;
            }
        }

        (
            Node::CodeBlock {
                text: code_lines.join("\n"),
                lang: None,
                attrs: None,
            },
            i,
        )
    }

    /// Check if a line would end an open paragraph
    pub(crate) fn interrupts_paragraph(&self, line: &str, next: Option<&str>) -> bool {
        if is_blank(line) {
            return true;
        }
        atx_heading(line, self.options.enforce_atx_headings).is_some()
            || is_thematic_break(line)
            || is_fenced_code_start(line).is_some()
            || is_blockquote_start(line)
            || html_block_kind(line, self.options).is_some_and(HtmlBlockKind::can_interrupt_paragraph)
            || ListMarker::parse(line).is_some_and(|marker| marker.can_interrupt_paragraph())
            || next.is_some_and(|next| is_table_start(line, next))
    }

    /// Whether a container line leaves an open paragraph for lazy continuation
    pub(crate) fn allows_lazy_continuation(&self, line: &str) -> bool {
        !is_blank(line)
            && count_indent_columns(line) < 4
            && !self.interrupts_paragraph(line, None)
    }

    fn parse_blockquote(&self, lines: &[&str]) -> (Node, usize) {
        let mut quote_lines: Vec<String> = Vec::new();
        let mut open_fence: Option<(char, usize)> = None;
        let mut last_line_allows_lazy = false;
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];

            if is_blockquote_start(line) {
                let stripped = strip_blockquote_marker(line);
                open_fence = match open_fence {
                    Some((c, len)) if is_closing_fence(&stripped, c, len) => None,
                    Some(fence) => Some(fence),
                    None => is_fenced_code_start(&stripped).map(|(c, len, _)| (c, len)),
                };
                last_line_allows_lazy =
                    open_fence.is_none() && self.allows_lazy_continuation(&stripped);
                quote_lines.push(stripped);
                i += 1;
            } else if !is_blank(line)
                && last_line_allows_lazy
                && !self.interrupts_paragraph(line, None)
            {
                // Lazy continuation of the quoted paragraph; it can never become a setext underline
                quote_lines.push(escape_setext_underline(line));
                i += 1;
            } else {
                // A blank line always separates block quotes
                break;
            }
        }

        let mut alert = None;
        if let Some(kind) = quote_lines.first().and_then(|first| parse_alert_marker(first)) {
            alert = Some(kind.to_string());
            quote_lines.remove(0);
        }

        let child_state = ParseState {
            in_block_quote: true,
            ..self.state.nested()
        };
        let children = parse_markdown(&quote_lines.join("\n"), child_state.with_inline(false), self.options);

        (Node::BlockQuote { children, alert }, i)
    }

    /// HTML blocks. Tag-based blocks are parsed as elements whose content is re-parsed;
    /// comments and other markup keep their raw text.
    fn parse_html_block(&self, i: usize, kind: HtmlBlockKind) -> (Vec<Node>, usize) {
        let line = self.lines[i];
        let start = self.offsets[i] + count_leading_spaces(line);

        match kind {
            HtmlBlockKind::Comment => {
                let body_start = start + 4;
                let (text, end) = match self.src[body_start..].find("-->") {
                    Some(close) => (
                        &self.src[body_start..body_start + close],
                        body_start + close + 3,
                    ),
                    None => (&self.src[body_start..], self.src.len()),
                };
                let node = Node::HtmlComment {
                    text: text.to_string(),
                };
                self.with_trailing_text(i, node, end)
            }
            HtmlBlockKind::ProcessingInstruction | HtmlBlockKind::Declaration | HtmlBlockKind::Cdata => {
                let mut end = i;
                while end < self.lines.len() && !html_block_ends(self.lines[end], kind) {
                    end += 1;
                }
                let last = end.min(self.lines.len() - 1);
                let text = self.lines[i..=last].join("\n");
                (vec![Node::RawHtml { text }], last + 1 - i)
            }
            HtmlBlockKind::Verbatim | HtmlBlockKind::BlockTag | HtmlBlockKind::Standalone => {
                let state = self.state.with_inline(false);
                match parse_html_element(self.src, start, state, self.options) {
                    Some((node @ Node::Text { .. }, end)) => {
                        // Filtered raw HTML stays literal text in a paragraph
                        let node = Node::Paragraph {
                            children: vec![node],
                        };
                        self.with_trailing_text(i, node, end)
                    }
                    Some((node, end)) => self.with_trailing_text(i, node, end),
                    None => self.parse_unclosed_html_block(i, start, kind),
                }
            }
        }
    }

    /// Emit `node`, plus a paragraph for any text following `end` on the same line
    fn with_trailing_text(&self, i: usize, node: Node, end: usize) -> (Vec<Node>, usize) {
        let end_line = self.line_index(end.saturating_sub(1).max(self.offsets[i]));
        let line_end = self.offsets[end_line] + self.lines[end_line].len();
        let mut nodes = vec![node];

        let trailing = self.src.get(end..line_end).unwrap_or("");
        if !is_blank(trailing) {
            nodes.push(Node::Paragraph {
                children: self.parse_inline_text(trailing.trim()),
            });
        }
        (nodes, end_line + 1 - i)
    }

    /// An opening tag with no matching close: a block tag runs to the next blank line,
    /// anything else is a lone tag.
    fn parse_unclosed_html_block(&self, i: usize, start: usize, kind: HtmlBlockKind) -> (Vec<Node>, usize) {
        let Some(tag) = parse_html_tag(self.src, start) else {
            let (paragraph, consumed) = self.parse_paragraph(&self.lines[i..]);
            return (vec![paragraph], consumed);
        };
        let attrs = parse_attributes(&tag.attrs, &tag.tag_lower, self.options);

        if kind != HtmlBlockKind::BlockTag {
            let node = Node::HtmlSelfClosing {
                tag: tag.tag_name,
                attrs,
                is_closing_tag: false,
            };
            return self.with_trailing_text(i, node, tag.end_pos);
        }

        let mut end = i;
        while end < self.lines.len() && !is_blank(self.lines[end]) {
            end += 1;
        }
        let block_end = self.offsets[end - 1] + self.lines[end - 1].len();
        let inner = self.src.get(tag.end_pos..block_end).unwrap_or("");
        let children = parse_html_children(inner, self.state.with_inline(false), self.options);

        (
            vec![Node::HtmlBlock {
                tag: tag.tag_name,
                attrs,
                children: Some(children),
                text: None,
                verbatim: false,
            }],
            end - i,
        )
    }

    /// Paragraph, or a setext heading when an underline ends it
    pub(crate) fn parse_paragraph(&self, lines: &[&str]) -> (Node, usize) {
        let mut paragraph_lines: Vec<&str> = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];

            if i > 0 {
                if let Some(level) = is_setext_underline(line) {
                    let text = self.paragraph_text(&paragraph_lines);
                    return (self.heading(level, &text), i + 1);
                }
                if self.interrupts_paragraph(line, lines.get(i + 1).copied()) {
                    break;
                }
            } else if is_blank(line) {
                break;
            }

            paragraph_lines.push(line);
            i += 1;
        }

        let text = self.paragraph_text(&paragraph_lines);
        (
            Node::Paragraph {
                children: self.parse_inline_text(&text),
            },
            i.max(1),
        )
    }

    /// Strip leading whitespace from every line and trailing whitespace from the last;
    /// trailing spaces on inner lines stay for hard breaks.
    fn paragraph_text(&self, lines: &[&str]) -> String {
        let mut text = lines
            .iter()
            .map(|line| line.trim_start_matches([' ', '\t']))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = text.trim_end_matches([' ', '\t']).len();
        text.truncate(trimmed);
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FormatTag;
    use crate::refs::RefTable;
    use pretty_assertions::assert_eq;

    fn blocks(source: &str) -> Vec<Node> {
        let refs = RefTable::new();
        parse_markdown(source, ParseState::new(&refs), &ParseOptions::default())
    }

    fn text(s: &str) -> Node {
        Node::text(s)
    }

    #[test]
    fn fenced_code_basic() {
        let (node, end) = parse_code_fenced("```\ncode\n```", 0, &ParseOptions::default()).unwrap();
        assert_eq!(
            node,
            Node::CodeBlock {
                text: "code".to_string(),
                lang: None,
                attrs: None,
            }
        );
        assert_eq!(end, 12);
    }

    #[test]
    fn fenced_code_needs_three() {
        assert!(parse_code_fenced("``\nx\n``", 0, &ParseOptions::default()).is_none());
    }

    #[test]
    fn fenced_code_lang_and_attrs() {
        let (node, _) =
            parse_code_fenced("~~~ rust title=\"main.rs\"\nfn main() {}\n~~~\n", 0, &ParseOptions::default())
                .unwrap();
        let Node::CodeBlock { lang, attrs, .. } = node else {
            panic!("expected code block");
        };
        assert_eq!(lang.as_deref(), Some("rust"));
        assert!(attrs.unwrap().contains_key("title"));
    }

    #[test]
    fn fenced_code_closer_rules() {
        let (node, _) =
            parse_code_fenced("````\na\n```\n````", 0, &ParseOptions::default()).unwrap();
        assert_eq!(
            node,
            Node::CodeBlock {
                text: "a\n```".to_string(),
                lang: None,
                attrs: None,
            }
        );
    }

    #[test]
    fn fenced_code_strips_fence_indent() {
        let (node, _) =
            parse_code_fenced("  ```\n    a\n   b\n  ```", 0, &ParseOptions::default()).unwrap();
        let Node::CodeBlock { text, .. } = node else {
            panic!("expected code block");
        };
        assert_eq!(text, "  a\n b");
    }

    #[test]
    fn unclosed_fence_stops_at_new_opener() {
        assert_eq!(
            blocks("```\na\n```js\nb"),
            vec![
                Node::CodeBlock {
                    text: "a".to_string(),
                    lang: None,
                    attrs: None,
                },
                Node::CodeBlock {
                    text: "b".to_string(),
                    lang: Some("js".to_string()),
                    attrs: None,
                },
            ]
        );
    }

    #[test]
    fn atx_headings() {
        assert_eq!(atx_heading("# Title #", false), Some((1, "Title")));
        assert_eq!(atx_heading("### a#", false), Some((3, "a#")));
        assert_eq!(atx_heading("#NoSpace", false), Some((1, "NoSpace")));
        assert_eq!(atx_heading("#NoSpace", true), None);
        assert_eq!(atx_heading("####### x", false), None);
        assert_eq!(atx_heading("## ##", false), Some((2, "")));
    }

    #[test]
    fn heading_node_has_slug() {
        assert_eq!(
            blocks("## Hello *World*"),
            vec![Node::Heading {
                level: 2,
                children: vec![
                    text("Hello "),
                    Node::TextFormatted {
                        tag: FormatTag::Em,
                        children: vec![text("World")],
                    },
                ],
                id: "hello-world".to_string(),
            }]
        );
    }

    #[test]
    fn setext_heading() {
        assert_eq!(
            blocks("Foo\nbar\n==="),
            vec![Node::Heading {
                level: 1,
                children: vec![text("Foo\nbar")],
                id: "foobar".to_string(),
            }]
        );
    }

    #[test]
    fn thematic_breaks() {
        assert!(is_thematic_break("***"));
        assert!(is_thematic_break(" - - -"));
        assert!(!is_thematic_break("--"));
        assert!(!is_thematic_break("    ---"));
        assert!(!is_thematic_break("-*-"));
    }

    #[test]
    fn indented_code() {
        assert_eq!(
            blocks("    a\n\n    b\n\nc"),
            vec![
                Node::CodeBlock {
                    text: "a\n\nb".to_string(),
                    lang: None,
                    attrs: None,
                },
                Node::Paragraph {
                    children: vec![text("c")],
                },
            ]
        );
    }

    #[test]
    fn blockquote_with_lazy_line() {
        assert_eq!(
            blocks("> a\nb\n\nc"),
            vec![
                Node::BlockQuote {
                    children: vec![Node::Paragraph {
                        children: vec![text("a\nb")],
                    }],
                    alert: None,
                },
                Node::Paragraph {
                    children: vec![text("c")],
                },
            ]
        );
    }

    #[test]
    fn lazy_setext_underline_stays_text() {
        assert_eq!(
            blocks("> foo\n==="),
            vec![Node::BlockQuote {
                children: vec![Node::Paragraph {
                    children: vec![text("foo\n===")],
                }],
                alert: None,
            }]
        );
    }

    #[test]
    fn blockquote_alert() {
        assert_eq!(
            blocks("> [!NOTE]\n> Read this"),
            vec![Node::BlockQuote {
                children: vec![Node::Paragraph {
                    children: vec![text("Read this")],
                }],
                alert: Some("NOTE".to_string()),
            }]
        );
    }

    #[test]
    fn html_block_with_markdown_content() {
        let nodes = blocks("<div>\n\n*a*\n\n</div>");
        assert_eq!(nodes.len(), 1);
        let Node::HtmlBlock { tag, children, .. } = &nodes[0] else {
            panic!("expected html block");
        };
        assert_eq!(tag, "div");
        assert_eq!(
            children.as_deref(),
            Some(
                &[Node::Paragraph {
                    children: vec![Node::TextFormatted {
                        tag: FormatTag::Em,
                        children: vec![text("a")],
                    }],
                }][..]
            )
        );
    }

    #[test]
    fn verbatim_html_block() {
        let nodes = blocks("<pre>\n*a*\n</pre>");
        assert_eq!(
            nodes,
            vec![Node::HtmlBlock {
                tag: "pre".to_string(),
                attrs: Default::default(),
                children: None,
                text: Some("\n*a*\n".to_string()),
                verbatim: true,
            }]
        );
    }

    #[test]
    fn html_comment_and_declaration() {
        assert_eq!(
            blocks("<!-- a\nb -->\n<!DOCTYPE html>"),
            vec![
                Node::HtmlComment {
                    text: " a\nb ".to_string()
                },
                Node::RawHtml {
                    text: "<!DOCTYPE html>".to_string()
                },
            ]
        );
    }

    #[test]
    fn filtered_block_is_text() {
        assert_eq!(
            blocks("<script>x</script>"),
            vec![Node::Paragraph {
                children: vec![text("<script>x</script>")],
            }]
        );
    }

    #[test]
    fn frontmatter_only_at_start() {
        assert_eq!(
            blocks("---\ntitle: x\n---\n# h"),
            vec![
                Node::Frontmatter {
                    text: "title: x".to_string()
                },
                Node::Heading {
                    level: 1,
                    children: vec![text("h")],
                    id: "h".to_string(),
                },
            ]
        );
        // Without a key line the fences are thematic breaks / setext underlines
        assert!(!matches!(blocks("---\nnot yaml\n---")[0], Node::Frontmatter { .. }));
    }

    #[test]
    fn paragraph_interrupted_by_list_starting_at_one() {
        assert_eq!(blocks("a\n2. b").len(), 1);
        assert_eq!(blocks("a\n1. b").len(), 2);
        assert_eq!(blocks("a\n-").len(), 1);
    }

    #[test]
    fn definition_markers_only_at_top_level() {
        let refs = RefTable::new();
        let nodes = parse_markdown("[a]: /url", ParseState::new(&refs), &ParseOptions::default());
        assert_eq!(
            nodes,
            vec![Node::Ref {
                label: "a".to_string()
            }]
        );
        let nested = parse_markdown(
            "[a]: /url",
            ParseState::new(&refs).nested(),
            &ParseOptions::default(),
        );
        assert!(nested.is_empty());
    }

    #[test]
    fn depth_ceiling_yields_text() {
        let refs = RefTable::new();
        let mut state = ParseState::new(&refs);
        state.depth = crate::options::MAX_DEPTH;
        assert_eq!(
            parse_markdown("> a", state, &ParseOptions::default()),
            vec![text("> a")]
        );
    }
}
