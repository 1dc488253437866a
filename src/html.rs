/// HTML tag grammar, attribute parsing and HTML block classification
use crate::ast::{AttrValue, Attributes, Node};
use crate::block::parse_markdown;
use crate::chars::{count_leading_spaces, is_blank, is_void_element};
use crate::entities::decode_entity_references;
use crate::inline::parse_inline;
use crate::options::{ParseOptions, ParseState};

/// One parsed opening, closing or self-closing tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagInfo {
    /// Tag name as written
    pub tag_name: String,
    pub tag_lower: String,
    /// Whitespace between the tag name and the first attribute, verbatim
    pub whitespace_before_attrs: String,
    /// Raw, unparsed attribute text
    pub attrs: String,
    pub is_self_closing: bool,
    pub has_space_before_slash: bool,
    pub is_closing: bool,
    /// Whether any whitespace inside the tag contained a newline
    pub has_newline: bool,
    /// Offset just past the closing `>`
    pub end_pos: usize,
}

/// CommonMark HTML block start conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlBlockKind {
    /// `pre`, `script`, `style`, `textarea`: content is never re-parsed
    Verbatim,
    Comment,
    ProcessingInstruction,
    Declaration,
    Cdata,
    /// A known block-level tag name
    BlockTag,
    /// Any other complete tag alone on its line
    Standalone,
}

impl HtmlBlockKind {
    pub fn can_interrupt_paragraph(self) -> bool {
        self != HtmlBlockKind::Standalone
    }
}

const VERBATIM_TAGS: [&str; 4] = ["pre", "script", "style", "textarea"];

const BLOCK_TAGS: [&str; 62] = [
    "address",
    "article",
    "aside",
    "base",
    "basefont",
    "blockquote",
    "body",
    "caption",
    "center",
    "col",
    "colgroup",
    "dd",
    "details",
    "dialog",
    "dir",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "frame",
    "frameset",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "head",
    "header",
    "hr",
    "html",
    "iframe",
    "legend",
    "li",
    "link",
    "main",
    "menu",
    "menuitem",
    "nav",
    "noframes",
    "ol",
    "optgroup",
    "option",
    "p",
    "param",
    "search",
    "section",
    "summary",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "title",
    "tr",
    "track",
    "ul",
];

/// GFM tagfilter: raw tags that are escaped instead of passed through
const FILTERED_TAGS: [&str; 9] = [
    "title",
    "textarea",
    "style",
    "xmp",
    "iframe",
    "noembed",
    "noframes",
    "script",
    "plaintext",
];

/// Attributes whose values are URLs and go through the sanitizer
const URL_ATTRIBUTES: [&str; 7] = [
    "href",
    "src",
    "action",
    "formaction",
    "poster",
    "cite",
    "xlink:href",
];

pub fn is_filtered_tag(tag: &str) -> bool {
    FILTERED_TAGS.iter().any(|t| t.eq_ignore_ascii_case(tag))
}

pub fn is_verbatim_tag(tag: &str) -> bool {
    VERBATIM_TAGS.iter().any(|t| t.eq_ignore_ascii_case(tag))
}

pub fn is_block_tag(tag: &str) -> bool {
    BLOCK_TAGS.iter().any(|t| t.eq_ignore_ascii_case(tag))
}

fn is_tag_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b':' | b'.' | b'_')
}

fn is_space_byte(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n')
}

/// Skip spaces, tabs and newlines. Returns `None` if a blank line is crossed.
fn skip_tag_whitespace(bytes: &[u8], mut i: usize, has_newline: &mut bool) -> Option<usize> {
    let mut line_empty = false;
    while i < bytes.len() && is_space_byte(bytes[i]) {
        if bytes[i] == b'\n' {
            if line_empty {
                return None;
            }
            *has_newline = true;
            line_empty = true;
        }
        i += 1;
    }
    Some(i)
}

/// Skip a `{...}` expression starting at `i`, honoring nested braces and quoted strings.
fn skip_brace_expression(bytes: &[u8], mut i: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' | b'`' => quote = Some(b),
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i + 1);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Parse one HTML tag starting at byte offset `pos` (which must be `<`).
pub fn parse_html_tag(text: &str, pos: usize) -> Option<TagInfo> {
    let bytes = text.as_bytes();
    if bytes.get(pos) != Some(&b'<') {
        return None;
    }
    let mut i = pos + 1;
    let is_closing = bytes.get(i) == Some(&b'/');
    if is_closing {
        i += 1;
    }

    // Tag name: ASCII letter, then letters, digits, hyphens, namespace separators
    let name_start = i;
    if !bytes.get(i)?.is_ascii_alphabetic() {
        return None;
    }
    while i < bytes.len() && is_tag_name_byte(bytes[i]) {
        i += 1;
    }
    let tag_name = &text[name_start..i];

    // The name has to end at whitespace, '>' or '/'; `<tag@name>` is not a tag
    if !matches!(bytes.get(i), Some(b' ' | b'\t' | b'\n' | b'>' | b'/')) {
        return None;
    }

    let mut has_newline = false;

    if is_closing {
        i = skip_tag_whitespace(bytes, i, &mut has_newline)?;
        if bytes.get(i) != Some(&b'>') {
            return None;
        }
        return Some(TagInfo {
            tag_name: tag_name.to_string(),
            tag_lower: tag_name.to_ascii_lowercase(),
            whitespace_before_attrs: String::new(),
            attrs: String::new(),
            is_self_closing: false,
            has_space_before_slash: false,
            is_closing: true,
            has_newline,
            end_pos: i + 1,
        });
    }

    let ws_start = i;
    i = skip_tag_whitespace(bytes, i, &mut has_newline)?;
    let whitespace_before_attrs = &text[ws_start..i];
    let attrs_start = i;

    let (attrs_end, end_pos, is_self_closing) = loop {
        match *bytes.get(i)? {
            b'>' => break (i, i + 1, false),
            b'/' => {
                if bytes.get(i + 1) == Some(&b'>') {
                    break (i, i + 2, true);
                }
                return None;
            }
            // '=' with no attribute name, or a quote with no '='
            b'=' | b'"' | b'\'' | b'<' => return None,
            _ => {}
        }

        // Attribute name
        let name_start = i;
        while i < bytes.len()
            && !is_space_byte(bytes[i])
            && !matches!(bytes[i], b'=' | b'>' | b'/' | b'"' | b'\'' | b'<')
        {
            i += 1;
        }
        if i == name_start {
            return None;
        }
        if matches!(bytes.get(i), Some(b'"' | b'\'' | b'<')) {
            return None;
        }

        let after_name = i;
        i = skip_tag_whitespace(bytes, i, &mut has_newline)?;
        if bytes.get(i) == Some(&b'=') {
            i += 1;
            i = skip_tag_whitespace(bytes, i, &mut has_newline)?;
            match *bytes.get(i)? {
                q @ (b'"' | b'\'') => {
                    let close = text[i + 1..].find(q as char)? + i + 1;
                    if text[i + 1..close].contains('\n') {
                        has_newline = true;
                    }
                    i = close + 1;
                }
                b'{' => i = skip_brace_expression(bytes, i)?,
                b'>' => return None,
                _ => {
                    while i < bytes.len() && !is_space_byte(bytes[i]) && bytes[i] != b'>' {
                        i += 1;
                    }
                }
            }
        } else {
            i = after_name;
        }

        // Attributes are separated by whitespace
        let sep_start = i;
        i = skip_tag_whitespace(bytes, i, &mut has_newline)?;
        if i == sep_start && !matches!(bytes.get(i), Some(b'>' | b'/')) {
            return None;
        }
    };

    let raw_attrs = text[attrs_start..attrs_end].trim_end();
    let has_space_before_slash =
        is_self_closing && attrs_end > pos && is_space_byte(bytes[attrs_end - 1]);

    Some(TagInfo {
        tag_name: tag_name.to_string(),
        tag_lower: tag_name.to_ascii_lowercase(),
        whitespace_before_attrs: whitespace_before_attrs.to_string(),
        attrs: raw_attrs.to_string(),
        is_self_closing,
        has_space_before_slash,
        is_closing: false,
        has_newline,
        end_pos,
    })
}

/// Find the closing tag matching an already-opened `tag_lower`, honoring nesting.
/// Returns (offset of the closing `<`, offset just past its `>`).
pub fn find_closing_tag(text: &str, from: usize, tag_lower: &str) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    let mut i = from;

    while let Some(offset) = text[i..].find('<') {
        let pos = i + offset;
        match parse_html_tag(text, pos) {
            Some(tag) if tag.tag_lower == tag_lower => {
                if tag.is_closing {
                    if depth == 0 {
                        return Some((pos, tag.end_pos));
                    }
                    depth -= 1;
                } else if !tag.is_self_closing {
                    depth += 1;
                }
                i = tag.end_pos;
            }
            Some(tag) => i = tag.end_pos,
            None => i = pos + 1,
        }
    }
    None
}

/// Length of the protected HTML span starting at `pos`: a comment, a self-contained
/// tag, or an element through its matching closing tag.
pub(crate) fn skip_html(text: &str, pos: usize) -> Option<usize> {
    if text[pos..].starts_with("<!--") {
        let end = text[pos + 4..].find("-->")?;
        return Some(pos + 4 + end + 3);
    }
    let tag = parse_html_tag(text, pos)?;
    if tag.is_closing || tag.is_self_closing || is_void_element(&tag.tag_lower) {
        return Some(tag.end_pos);
    }
    match find_closing_tag(text, tag.end_pos, &tag.tag_lower) {
        Some((_, end)) => Some(end),
        None => Some(tag.end_pos),
    }
}

/// Parse a raw attribute string into a name/value map.
pub fn parse_attributes(raw: &str, tag: &str, options: &ParseOptions) -> Attributes {
    let bytes = raw.as_bytes();
    let mut attrs = Attributes::new();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && is_space_byte(bytes[i]) {
            i += 1;
        }
        let name_start = i;
        while i < bytes.len() && !is_space_byte(bytes[i]) && bytes[i] != b'=' {
            i += 1;
        }
        if i == name_start {
            i += 1;
            continue;
        }
        let name = &raw[name_start..i];

        let mut j = i;
        while j < bytes.len() && is_space_byte(bytes[j]) {
            j += 1;
        }
        if bytes.get(j) != Some(&b'=') {
            attrs.entry(name.to_string()).or_insert(AttrValue::Flag(true));
            continue;
        }
        j += 1;
        while j < bytes.len() && is_space_byte(bytes[j]) {
            j += 1;
        }

        let value = match bytes.get(j) {
            Some(&q @ (b'"' | b'\'')) => {
                let close = raw[j + 1..]
                    .find(q as char)
                    .map_or(raw.len(), |c| c + j + 1);
                let value = &raw[(j + 1).min(close)..close];
                i = (close + 1).min(raw.len());
                attribute_value(name, value, tag, options)
            }
            Some(b'{') => {
                let close = skip_brace_expression(bytes, j).unwrap_or(raw.len());
                let inner = raw[j + 1..close.saturating_sub(1).max(j + 1)].trim();
                i = close;
                Some(expression_value(inner, options))
            }
            Some(_) => {
                let start = j;
                while j < bytes.len() && !is_space_byte(bytes[j]) {
                    j += 1;
                }
                i = j;
                attribute_value(name, &raw[start..j], tag, options)
            }
            None => {
                i = j;
                Some(AttrValue::Text(String::new()))
            }
        };

        if let Some(value) = value {
            attrs.entry(name.to_string()).or_insert(value);
        }
    }
    attrs
}

/// Decode a literal attribute value; URL attributes the sanitizer rejects are dropped.
fn attribute_value(name: &str, value: &str, tag: &str, options: &ParseOptions) -> Option<AttrValue> {
    let decoded = decode_entity_references(value);
    let lower = name.to_ascii_lowercase();

    if lower == "style" {
        return Some(AttrValue::Style(parse_style_attribute(&decoded)));
    }
    if URL_ATTRIBUTES.contains(&lower.as_str()) {
        return options.sanitize(&decoded, tag, &lower).map(AttrValue::Text);
    }
    Some(AttrValue::Text(decoded.into_owned()))
}

fn expression_value(inner: &str, options: &ParseOptions) -> AttrValue {
    if options.eval_unserializable_expressions
        && let Ok(value) = serde_json::from_str::<serde_json::Value>(inner)
    {
        return AttrValue::Json(value);
    }
    AttrValue::Text(inner.to_string())
}

/// Split a CSS declaration list into (property, value) pairs.
/// Semicolons inside quotes or parentheses (e.g. `url(data:...;base64,...)`) do not split.
pub fn parse_style_attribute(style: &str) -> Vec<(String, String)> {
    let mut declarations = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut paren_depth = 0usize;

    let mut flush = |decl: &mut String| {
        if let Some((property, value)) = decl.split_once(':') {
            let property = property.trim();
            let value = value.trim();
            if !property.is_empty() && !value.is_empty() {
                declarations.push((property.to_string(), value.to_string()));
            }
        }
        decl.clear();
    };

    for c in style.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None => match c {
                '"' | '\'' => {
                    quote = Some(c);
                    current.push(c);
                }
                '(' => {
                    paren_depth += 1;
                    current.push(c);
                }
                ')' => {
                    paren_depth = paren_depth.saturating_sub(1);
                    current.push(c);
                }
                ';' if paren_depth == 0 => flush(&mut current),
                _ => current.push(c),
            },
        }
    }
    flush(&mut current);
    declarations
}

/// Check if a line starts an HTML block; returns which kind.
pub fn html_block_kind(line: &str, options: &ParseOptions) -> Option<HtmlBlockKind> {
    if options.disable_parsing_raw_html {
        return None;
    }
    let indent = count_leading_spaces(line);
    if indent > 3 {
        return None;
    }
    let trimmed = &line[indent..];
    if !trimmed.starts_with('<') {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();

    for tag in VERBATIM_TAGS {
        if let Some(after) = lower.strip_prefix('<').and_then(|s| s.strip_prefix(tag))
            && (after.is_empty() || after.starts_with(['>', ' ', '\t']))
        {
            return Some(HtmlBlockKind::Verbatim);
        }
    }

    if trimmed.starts_with("<!--") {
        return Some(HtmlBlockKind::Comment);
    }
    if trimmed.starts_with("<?") {
        return Some(HtmlBlockKind::ProcessingInstruction);
    }
    if trimmed.starts_with("<![CDATA[") {
        return Some(HtmlBlockKind::Cdata);
    }
    if trimmed
        .strip_prefix("<!")
        .and_then(|s| s.chars().next())
        .is_some_and(|c| c.is_ascii_alphabetic())
    {
        return Some(HtmlBlockKind::Declaration);
    }

    // Block-level tag names, opening or closing
    let name_part = lower
        .strip_prefix("</")
        .or_else(|| lower.strip_prefix('<'))
        .unwrap_or("");
    let name_len = name_part
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    let after_name = &name_part[name_len..];
    if is_block_tag(&name_part[..name_len])
        && (after_name.is_empty()
            || after_name.starts_with(['>', ' ', '\t'])
            || after_name.starts_with("/>"))
    {
        return Some(HtmlBlockKind::BlockTag);
    }

    // Any complete tag followed only by whitespace
    let tag = parse_html_tag(trimmed, 0)?;
    if tag.end_pos <= trimmed.len() && is_blank(&trimmed[tag.end_pos..]) {
        return Some(HtmlBlockKind::Standalone);
    }
    None
}

/// End condition for the line-terminated HTML block kinds
pub(crate) fn html_block_ends(line: &str, kind: HtmlBlockKind) -> bool {
    match kind {
        HtmlBlockKind::Comment => line.contains("-->"),
        HtmlBlockKind::ProcessingInstruction => line.contains("?>"),
        HtmlBlockKind::Declaration => line.contains('>'),
        HtmlBlockKind::Cdata => line.contains("]]>"),
        HtmlBlockKind::Verbatim => {
            let lower = line.to_ascii_lowercase();
            VERBATIM_TAGS
                .iter()
                .any(|tag| lower.contains(&format!("</{}>", tag)))
        }
        HtmlBlockKind::BlockTag | HtmlBlockKind::Standalone => is_blank(line),
    }
}

/// Parse an HTML element starting at `pos`: self-closing and void tags, orphan closing tags,
/// verbatim elements, and paired elements whose content is parsed as markdown.
/// Returns `None` for an opening tag with no matching close; callers decide the fallback.
pub(crate) fn parse_html_element(
    text: &str,
    pos: usize,
    state: ParseState<'_>,
    options: &ParseOptions,
) -> Option<(Node, usize)> {
    let tag = parse_html_tag(text, pos)?;

    if options.tagfilter && is_filtered_tag(&tag.tag_lower) {
        // The whole element stays literal text so its content is never interpreted
        let end = if tag.is_closing || tag.is_self_closing {
            tag.end_pos
        } else {
            find_closing_tag(text, tag.end_pos, &tag.tag_lower).map_or(tag.end_pos, |(_, end)| end)
        };
        tracing::trace!(tag = %tag.tag_lower, "tagfilter escaped raw html");
        return Some((Node::text(&text[pos..end]), end));
    }

    let attrs = parse_attributes(&tag.attrs, &tag.tag_lower, options);

    if tag.is_closing {
        return Some((
            Node::HtmlSelfClosing {
                tag: tag.tag_name,
                attrs,
                is_closing_tag: true,
            },
            tag.end_pos,
        ));
    }

    if tag.is_self_closing || is_void_element(&tag.tag_lower) {
        return Some((
            Node::HtmlSelfClosing {
                tag: tag.tag_name,
                attrs,
                is_closing_tag: false,
            },
            tag.end_pos,
        ));
    }

    if is_verbatim_tag(&tag.tag_lower) {
        // Unclosed verbatim elements run to the end of the input
        let (inner_end, end) = find_closing_tag(text, tag.end_pos, &tag.tag_lower)
            .unwrap_or((text.len(), text.len()));
        return Some((
            Node::HtmlBlock {
                tag: tag.tag_name,
                attrs,
                children: None,
                text: Some(text[tag.end_pos..inner_end].to_string()),
                verbatim: true,
            },
            end,
        ));
    }

    let (inner_end, end) = find_closing_tag(text, tag.end_pos, &tag.tag_lower)?;
    let children = parse_html_children(&text[tag.end_pos..inner_end], state, options);
    Some((
        Node::HtmlBlock {
            tag: tag.tag_name,
            attrs,
            children: Some(children),
            text: None,
            verbatim: false,
        },
        end,
    ))
}

/// Parse the content of an HTML element as markdown: block mode when it contains a
/// blank line, inline otherwise. Content is dedented by its first line's indentation.
pub(crate) fn parse_html_children(
    inner: &str,
    state: ParseState<'_>,
    options: &ParseOptions,
) -> Vec<Node> {
    let content = inner.trim_start_matches('\n');
    let prefix_len = content
        .bytes()
        .take_while(|&b| b == b' ' || b == b'\t')
        .count();
    let prefix = &content[..prefix_len];

    let dedented = content
        .split('\n')
        .map(|line| line.strip_prefix(prefix).unwrap_or(line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n");
    let dedented = dedented.trim_end();
    if dedented.is_empty() {
        return Vec::new();
    }

    let child_state = ParseState {
        in_html: true,
        ..state.nested()
    };
    if child_state.too_deep() {
        tracing::debug!(depth = child_state.depth, "html nesting ceiling reached");
        return vec![Node::text(dedented)];
    }

    // The rest of the opening tag's line and the start of the closing tag's line don't count
    let segments: Vec<&str> = inner.split('\n').collect();
    let has_blank_line =
        segments.len() > 2 && segments[1..segments.len() - 1].iter().any(|s| is_blank(s));
    if has_blank_line && !state.inline {
        parse_markdown(dedented, child_state.with_inline(false), options)
    } else {
        parse_inline(dedented.trim(), child_state.with_inline(true), options)
    }
}
