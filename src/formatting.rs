/// Delimited inline formatting: emphasis, strong, strikethrough and highlight
use crate::ast::FormatTag;
use crate::chars::{char_at, char_before, is_alphanumeric, is_blank, is_unicode_whitespace};
use crate::html::skip_html;
use crate::inline::code_span_end;
use crate::links::{angle_autolink_end, find_link_text_end, skip_link_suffix};
use crate::options::ParseState;

/// A formatted span found at the start of the text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormattingMatch<'a> {
    /// Opening delimiters, content and closing delimiters
    pub full: &'a str,
    pub tag: FormatTag,
    /// Text between the delimiters, still unparsed
    pub content: &'a str,
}

/// Match a formatting span beginning at the first byte of `text`.
/// Only active in inline or simple contexts.
pub fn match_inline_formatting<'a>(
    text: &'a str,
    state: &ParseState<'_>,
) -> Option<FormattingMatch<'a>> {
    if !(state.inline || state.simple) {
        return None;
    }

    let bytes = text.as_bytes();
    let delim = *bytes.first()?;
    let run = run_length(bytes, 0, delim);

    let (len, tag) = match delim {
        b'*' | b'_' if run <= 3 => (
            run,
            if run == 1 {
                FormatTag::Em
            } else {
                FormatTag::Strong
            },
        ),
        b'~' if run == 2 => (2, FormatTag::Del),
        b'=' if run == 2 => (2, FormatTag::Mark),
        _ => return None,
    };

    // Opener must not be followed by whitespace
    match char_at(text, len) {
        Some(c) if !is_unicode_whitespace(c) => {}
        _ => return None,
    }

    let close = find_closer(text, delim, len)?;
    let (full, content) = if len == 3 {
        // `***x***` is strong wrapping emphasis; the inner `*` pair stays in the content
        (&text[..close + 3], &text[2..close + 1])
    } else {
        (&text[..close + len], &text[len..close])
    };

    if content.is_empty() {
        return None;
    }

    Some(FormattingMatch { full, tag, content })
}

fn run_length(bytes: &[u8], start: usize, delim: u8) -> usize {
    bytes[start..].iter().take_while(|&&b| b == delim).count()
}

/// Scan for the closing delimiter run; returns the offset where the closing `len`
/// delimiters begin.
fn find_closer(text: &str, delim: u8, len: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut stack: Vec<usize> = Vec::new();
    let mut i = len;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 1;
                i += char_at(text, i).map_or(0, char::len_utf8);
            }
            b'`' => match code_span_end(text, i) {
                Some(end) => i = end,
                None => i += run_length(bytes, i, b'`'),
            },
            b'<' => {
                i = skip_html(text, i)
                    .or_else(|| angle_autolink_end(text, i))
                    .unwrap_or(i + 1);
            }
            b'[' => match find_link_text_end(text, i) {
                Some(close) => i = skip_link_suffix(text, close + 1),
                None => i += 1,
            },
            b'\n' => {
                // A blank line ends the paragraph, and with it any chance to close
                let line_end = text[i + 1..].find('\n').map(|n| n + i + 1);
                if let Some(line_end) = line_end
                    && is_blank(&text[i + 1..line_end])
                {
                    return None;
                }
                i += 1;
            }
            b if b == delim => {
                let r = run_length(bytes, i, delim);
                let prev = char_before(text, i);
                let next = char_at(text, i + r);

                let can_close = prev.is_some_and(|c| !is_unicode_whitespace(c))
                    && !(delim == b'_' && next.is_some_and(is_alphanumeric));
                let can_open = next.is_some_and(|c| !is_unicode_whitespace(c))
                    && !(delim == b'_' && prev.is_some_and(is_alphanumeric));

                if matches!(delim, b'~' | b'=') {
                    if r == len && can_close {
                        return Some(i);
                    }
                    i += r;
                    continue;
                }

                if can_close {
                    match stack.last().copied() {
                        Some(top) if r == top => {
                            stack.pop();
                        }
                        _ if r == len => return Some(i),
                        Some(top) if r > top && r - top == len => return Some(i + top),
                        None if r > len => return Some(i),
                        _ if can_open => stack.push(r),
                        _ => {}
                    }
                } else if can_open {
                    stack.push(r);
                }
                i += r;
            }
            _ => i += char_at(text, i).map_or(1, char::len_utf8),
        }
    }
    None
}
