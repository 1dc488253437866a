/// Links, images, footnote references and autolinks
use crate::ast::{Node, plain_text};
use crate::chars::{char_at, char_before, is_alphanumeric, is_ascii_punctuation};
use crate::entities::decode_entity_at;
use crate::html::skip_html;
use crate::inline::{code_span_end, parse_inline};
use crate::options::{ParseOptions, ParseState};

/// Maximum nesting of unescaped parentheses in a bare destination
const MAX_PAREN_DEPTH: usize = 32;

/// Trailing characters never considered part of a bare URL
const TRAILING_PUNCTUATION: &[char] = &['?', '!', '.', ',', ':', '*', '_', '~'];

/// Process backslash escapes and entity references in a destination or title.
pub fn unescape_string(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut i = 0;

    while let Some(c) = char_at(text, i) {
        match c {
            '\\' => match char_at(text, i + 1) {
                Some(next) if is_ascii_punctuation(next) => {
                    result.push(next);
                    i += 2;
                    continue;
                }
                _ => result.push('\\'),
            },
            '&' => {
                if let Some((decoded, end)) = decode_entity_at(text, i) {
                    result.push_str(&decoded);
                    i = end;
                    continue;
                }
                result.push('&');
            }
            _ => result.push(c),
        }
        i += c.len_utf8();
    }
    result
}

/// Skip spaces and tabs, then at most one newline and the spaces after it.
/// Returns `None` when a blank line is crossed.
pub fn skip_spaces_and_newline(text: &str, pos: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = pos;
    while matches!(bytes.get(i), Some(b' ' | b'\t')) {
        i += 1;
    }
    if bytes.get(i) == Some(&b'\n') {
        i += 1;
        while matches!(bytes.get(i), Some(b' ' | b'\t')) {
            i += 1;
        }
        if bytes.get(i) == Some(&b'\n') {
            return None;
        }
    }
    Some(i)
}

/// Parse a link destination at `pos`, either `<...>` or a bare run with balanced parentheses.
/// Returns the raw (still escaped) destination and the offset after it.
pub fn parse_link_destination(text: &str, pos: usize) -> Option<(String, usize)> {
    let bytes = text.as_bytes();

    if bytes.get(pos) == Some(&b'<') {
        let mut i = pos + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' if i + 1 < bytes.len() => i += 2,
                b'>' => return Some((text[pos + 1..i].to_string(), i + 1)),
                b'\n' | b'<' => return None,
                _ => i += 1,
            }
        }
        return None;
    }

    let mut i = pos;
    let mut depth = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if bytes.get(i + 1).is_some_and(u8::is_ascii_punctuation) => i += 2,
            b'(' => {
                depth += 1;
                if depth > MAX_PAREN_DEPTH {
                    return None;
                }
                i += 1;
            }
            b')' => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
                i += 1;
            }
            b if b <= b' ' || b == 0x7f => break,
            _ => i += 1,
        }
    }

    if i == pos || depth != 0 {
        return None;
    }
    Some((text[pos..i].to_string(), i))
}

/// Parse a link title delimited by `"..."`, `'...'` or `(...)`.
/// Returns the raw (still escaped) title and the offset after the closing delimiter.
pub fn parse_link_title(text: &str, pos: usize) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    let close = match bytes.get(pos)? {
        b'"' => b'"',
        b'\'' => b'\'',
        b'(' => b')',
        _ => return None,
    };

    let mut i = pos + 1;
    let mut line_blank = false;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => {
                i += 2;
                line_blank = false;
            }
            b if b == close => return Some((text[pos + 1..i].to_string(), i + 1)),
            b'(' if close == b')' => return None,
            b'\n' => {
                // No blank lines inside a title
                if line_blank {
                    return None;
                }
                line_blank = true;
                i += 1;
            }
            b' ' | b'\t' => i += 1,
            _ => {
                line_blank = false;
                i += 1;
            }
        }
    }
    None
}

/// Find the `]` matching the `[` at `open`. Code spans, raw HTML and autolinks bind
/// tighter than brackets and are skipped whole.
pub(crate) fn find_link_text_end(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 1usize;
    let mut i = open + 1;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 1;
                i += char_at(text, i).map_or(0, char::len_utf8);
            }
            b'`' => {
                i = code_span_end(text, i)
                    .unwrap_or_else(|| i + bytes[i..].iter().take_while(|&&b| b == b'`').count());
            }
            b'<' => {
                i = angle_autolink_end(text, i)
                    .or_else(|| skip_html(text, i))
                    .unwrap_or(i + 1);
            }
            b'[' => {
                depth += 1;
                i += 1;
            }
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
                i += 1;
            }
            b'\n' => {
                let rest = &text[i + 1..];
                let next_line = rest.split('\n').next().unwrap_or("");
                if rest.contains('\n') && next_line.trim().is_empty() {
                    return None;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    None
}

/// Skip the `(...)` or `[...]` that may follow link text; returns `pos` when neither does.
pub(crate) fn skip_link_suffix(text: &str, pos: usize) -> usize {
    let bytes = text.as_bytes();
    match bytes.get(pos) {
        Some(b'(') => {
            let mut depth = 0usize;
            let mut i = pos;
            while i < bytes.len() {
                match bytes[i] {
                    b'\\' => i += 1,
                    b'(' => depth += 1,
                    b')' => {
                        depth -= 1;
                        if depth == 0 {
                            return i + 1;
                        }
                    }
                    _ => {}
                }
                i += 1;
            }
            pos
        }
        Some(b'[') => text[pos..]
            .find(']')
            .map_or(pos, |close| pos + close + 1),
        _ => pos,
    }
}

/// An inline link target: `(destination "title")`
struct InlineTarget {
    target: String,
    title: Option<String>,
    end: usize,
}

fn parse_inline_target(text: &str, pos: usize) -> Option<InlineTarget> {
    let bytes = text.as_bytes();
    if bytes.get(pos) != Some(&b'(') {
        return None;
    }

    let mut i = skip_spaces_and_newline(text, pos + 1)?;

    // Empty destination: `[text]()`
    if bytes.get(i) == Some(&b')') {
        return Some(InlineTarget {
            target: String::new(),
            title: None,
            end: i + 1,
        });
    }

    let (raw_dest, dest_end) = parse_link_destination(text, i)?;
    i = skip_spaces_and_newline(text, dest_end)?;

    // A title needs whitespace between it and the destination
    let mut title = None;
    if i > dest_end && matches!(bytes.get(i), Some(b'"' | b'\'' | b'(')) {
        let (raw_title, title_end) = parse_link_title(text, i)?;
        title = Some(unescape_string(&raw_title));
        i = skip_spaces_and_newline(text, title_end)?;
    }

    if bytes.get(i) != Some(&b')') {
        return None;
    }

    Some(InlineTarget {
        target: unescape_string(&raw_dest),
        title,
        end: i + 1,
    })
}

/// Parse a link or image starting at `pos` (`[` or `![`).
/// Returns the node and the offset after the whole construct.
pub(crate) fn parse_link_or_image(
    text: &str,
    pos: usize,
    state: ParseState<'_>,
    options: &ParseOptions,
) -> Option<(Node, usize)> {
    let is_image = text[pos..].starts_with("![");
    let open = if is_image { pos + 1 } else { pos };

    // Links never nest
    if !is_image && state.in_anchor {
        return None;
    }

    let close = find_link_text_end(text, open)?;
    let label_text = &text[open + 1..close];
    let after = close + 1;

    let mut resolved: Option<(String, Option<String>, usize)> = None;

    // Inline form: [text](dest "title")
    if let Some(target) = parse_inline_target(text, after) {
        resolved = Some((target.target, target.title, target.end));
    }

    // Full and collapsed reference forms: [text][label], [text][]
    if resolved.is_none() && text.as_bytes().get(after) == Some(&b'[') {
        let ref_close = text[after + 1..].find(['[', ']']).map(|n| n + after + 1)?;
        if text.as_bytes()[ref_close] != b']' {
            return None;
        }
        let ref_label = &text[after + 1..ref_close];
        let key = if ref_label.trim().is_empty() {
            label_text
        } else {
            ref_label
        };
        let reference = state.refs.link(key)?;
        resolved = Some((reference.target.clone(), reference.title.clone(), ref_close + 1));
    }

    // Shortcut form: [text]
    if resolved.is_none()
        && let Some(reference) = state.refs.link(label_text)
    {
        resolved = Some((reference.target.clone(), reference.title.clone(), after));
    }

    let (target, title, end) = resolved?;
    let child_state = ParseState {
        in_anchor: !is_image || state.in_anchor,
        ..state.nested()
    };
    let children = if child_state.too_deep() {
        vec![Node::text(label_text)]
    } else {
        parse_inline(label_text, child_state.with_inline(true), options)
    };

    if is_image {
        let alt = plain_text(&children);
        let Some(target) = options.sanitize(&target, "img", "src") else {
            // A rejected image degrades to its alt text
            return Some((Node::text(alt), end));
        };
        return Some((
            Node::Image {
                alt: (!alt.is_empty()).then_some(alt),
                target,
                title,
            },
            end,
        ));
    }

    Some((
        Node::Link {
            children,
            target: options.sanitize(&target, "a", "href"),
            title,
        },
        end,
    ))
}

/// Parse a footnote reference `[^label]`; the label must have a definition.
pub(crate) fn parse_footnote_reference(
    text: &str,
    pos: usize,
    state: ParseState<'_>,
    options: &ParseOptions,
) -> Option<(Node, usize)> {
    let rest = text[pos..].strip_prefix("[^")?;
    let close = rest.find(']')?;
    let label = &rest[..close];
    if label.is_empty() || label.contains(['\n', '[']) {
        return None;
    }
    let definition = state.refs.footnote(label)?;
    Some((
        Node::FootnoteReference {
            target: format!("#{}", (options.slugify)(&definition.label)),
            text: label.to_string(),
        },
        pos + 2 + close + 1,
    ))
}

/// Check if the text is an absolute URI: scheme of 2-32 chars, then ':'
fn is_absolute_uri(text: &str) -> bool {
    let Some(colon) = text.find(':') else {
        return false;
    };
    let scheme = &text[..colon];
    (2..=32).contains(&scheme.len())
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

fn is_email_address(text: &str) -> bool {
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    if local.is_empty()
        || !local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".!#$%&'*+/=?^_`{|}~-".contains(c))
    {
        return false;
    }
    !domain.is_empty()
        && domain.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && label.starts_with(|c: char| c.is_ascii_alphanumeric())
                && label.ends_with(|c: char| c.is_ascii_alphanumeric())
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Content of an angle autolink at `pos`, and whether it is an email address
fn scan_angle_autolink(text: &str, pos: usize) -> Option<(&str, bool, usize)> {
    let rest = text[pos..].strip_prefix('<')?;
    let close = rest.find(|c: char| c == '>' || c == '<' || c.is_whitespace() || c.is_control())?;
    if rest.as_bytes()[close] != b'>' {
        return None;
    }
    let content = &rest[..close];
    let end = pos + 1 + close + 1;
    if is_absolute_uri(content) {
        return Some((content, false, end));
    }
    if is_email_address(content) {
        return Some((content, true, end));
    }
    None
}

pub(crate) fn angle_autolink_end(text: &str, pos: usize) -> Option<usize> {
    scan_angle_autolink(text, pos).map(|(_, _, end)| end)
}

/// Parse `<scheme:...>` or `<user@host>`.
pub(crate) fn parse_angle_autolink(
    text: &str,
    pos: usize,
    options: &ParseOptions,
) -> Option<(Node, usize)> {
    let (content, is_email, end) = scan_angle_autolink(text, pos)?;
    let target = if is_email {
        format!("mailto:{}", content)
    } else {
        content.to_string()
    };
    Some((
        Node::Link {
            children: vec![Node::text(content)],
            target: options.sanitize(&target, "a", "href"),
            title: None,
        },
        end,
    ))
}

/// A domain is period-separated segments of alphanumerics, hyphens and underscores,
/// with no underscore in the last two segments.
fn is_valid_domain(domain: &str) -> bool {
    let segments: Vec<&str> = domain.split('.').collect();
    if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
        return false;
    }
    if !segments
        .iter()
        .all(|s| s.chars().all(|c| is_alphanumeric(c) || c == '-' || c == '_'))
    {
        return false;
    }
    !segments[segments.len() - 2..]
        .iter()
        .any(|s| s.contains('_'))
}

/// Drop trailing punctuation, unbalanced `)` and a trailing entity-like `&name;`.
fn trim_url_end(url: &str) -> &str {
    let mut url = url;
    loop {
        if let Some(stripped) = url.strip_suffix(TRAILING_PUNCTUATION) {
            url = stripped;
            continue;
        }
        if url.ends_with(')') && url.matches(')').count() > url.matches('(').count() {
            url = &url[..url.len() - 1];
            continue;
        }
        if url.ends_with(';')
            && let Some(amp) = url.rfind('&')
            && url[amp + 1..url.len() - 1]
                .chars()
                .all(|c| c.is_ascii_alphanumeric())
            && amp + 2 < url.len()
        {
            url = &url[..amp];
            continue;
        }
        return url;
    }
}

/// Parse a bare URL (`http://`, `https://`, `ftp://`, `www.`, `mailto:`) at `pos`.
/// A URL with an invalid domain, or one the sanitizer rejects, is returned as plain text.
pub(crate) fn parse_bare_autolink(
    text: &str,
    pos: usize,
    options: &ParseOptions,
) -> Option<(Node, usize)> {
    if char_before(text, pos).is_some_and(is_alphanumeric) {
        return None;
    }

    let rest = &text[pos..];
    let lower_prefix = rest.chars().take(8).collect::<String>().to_ascii_lowercase();
    let prefix_len = ["https://", "http://", "ftp://", "www.", "mailto:"]
        .iter()
        .find(|p| lower_prefix.starts_with(*p))
        .map(|p| p.len())?;

    let span_len = rest
        .find(|c: char| c.is_whitespace() || c == '<')
        .unwrap_or(rest.len());
    let url = trim_url_end(&rest[..span_len]);
    if url.len() <= prefix_len {
        return None;
    }
    let end = pos + url.len();
    let scheme = lower_prefix[..prefix_len].to_string();

    if scheme == "mailto:" {
        if !url[prefix_len..].contains('@') {
            return None;
        }
        return Some(autolink_node(url, url.to_string(), options, end));
    }

    let domain_end = url[prefix_len..]
        .find(['/', '?', '#', ':'])
        .map_or(url.len(), |n| n + prefix_len);
    let domain = if scheme == "www." {
        &url[..domain_end]
    } else {
        &url[prefix_len..domain_end]
    };
    if !is_valid_domain(domain) {
        tracing::trace!(url, "bare url with invalid domain left as text");
        return Some((Node::text(url), end));
    }

    let target = if scheme == "www." {
        format!("http://{}", url)
    } else {
        url.to_string()
    };
    Some(autolink_node(url, target, options, end))
}

fn autolink_node(label: &str, target: String, options: &ParseOptions, end: usize) -> (Node, usize) {
    match options.sanitize(&target, "a", "href") {
        Some(target) => (
            Node::Link {
                children: vec![Node::text(label)],
                target: Some(target),
                title: None,
            },
            end,
        ),
        None => (Node::text(label), end),
    }
}
