/// Link reference and footnote definitions, and the pre-pass that collects them
use std::collections::BTreeMap;

use unicode_casefold::UnicodeCaseFold;

use crate::ast::LinkReference;
use crate::block::{
    atx_heading, is_blockquote_start, is_closing_fence, is_fenced_code_start, is_setext_underline,
    is_thematic_break, strip_blockquote_marker,
};
use crate::chars::{count_indent_columns, count_leading_spaces, is_blank, remove_indent_columns};
use crate::html::{HtmlBlockKind, html_block_ends, html_block_kind};
use crate::links::{parse_link_destination, parse_link_title, skip_spaces_and_newline, unescape_string};
use crate::list::ListMarker;
use crate::options::{MAX_DEPTH, ParseOptions};
use crate::table::is_table_start;

/// Longest accepted link label, in characters
const MAX_LABEL_LEN: usize = 999;

/// A footnote body, kept as source until the document is assembled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FootnoteDefinition {
    pub label: String,
    pub source: String,
}

/// Every definition found in the document, keyed by normalized label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefTable {
    pub links: BTreeMap<String, LinkReference>,
    pub footnotes: Vec<FootnoteDefinition>,
}

impl RefTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.footnotes.is_empty()
    }

    /// Insert a link definition. The first definition of a label wins.
    pub fn insert_link(&mut self, label: &str, reference: LinkReference) -> bool {
        let key = normalize_label(label);
        if key.is_empty() || self.links.contains_key(&key) {
            return false;
        }
        self.links.insert(key, reference);
        true
    }

    /// Insert a footnote definition. The first definition of a label wins.
    pub fn insert_footnote(&mut self, label: &str, source: String) -> bool {
        if label.trim().is_empty() || self.footnote(label).is_some() {
            return false;
        }
        self.footnotes.push(FootnoteDefinition {
            label: label.to_string(),
            source,
        });
        true
    }

    pub fn link(&self, label: &str) -> Option<&LinkReference> {
        self.links.get(&normalize_label(label))
    }

    pub fn footnote(&self, label: &str) -> Option<&FootnoteDefinition> {
        let key = normalize_label(label);
        self.footnotes
            .iter()
            .find(|f| normalize_label(&f.label) == key)
    }
}

/// Normalize a label for matching: Unicode case fold, collapse internal whitespace, trim.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .case_fold()
        .collect()
}

/// A single parsed definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    Link {
        label: String,
        reference: LinkReference,
    },
    Footnote {
        label: String,
        source: String,
    },
}

/// End of the line containing `pos`, and the start of the next line
fn line_bounds(text: &str, pos: usize) -> (usize, usize) {
    match text[pos..].find('\n') {
        Some(n) => (pos + n, pos + n + 1),
        None => (text.len(), text.len()),
    }
}

/// Parse a link reference or footnote definition at the start of a line.
/// Returns the definition and the offset of the first line after it.
pub fn parse_definition(text: &str, pos: usize) -> Option<(Definition, usize)> {
    let indent = count_leading_spaces(&text[pos..]);
    if indent > 3 {
        return None;
    }
    let start = pos + indent;
    if text.as_bytes().get(start) != Some(&b'[') {
        return None;
    }

    let label_end = scan_label(text, start)?;
    let label = &text[start + 1..label_end];
    if text.as_bytes().get(label_end + 1) != Some(&b':') {
        return None;
    }

    if let Some(footnote_label) = label.strip_prefix('^') {
        return parse_footnote_body(text, label_end + 2)
            .map(|(source, end)| {
                (
                    Definition::Footnote {
                        label: footnote_label.trim().to_string(),
                        source,
                    },
                    end,
                )
            })
            .filter(|_| !footnote_label.trim().is_empty());
    }

    let mut i = skip_spaces_and_newline(text, label_end + 2)?;
    let (raw_dest, dest_end) = parse_link_destination(text, i)?;
    let target = unescape_string(&raw_dest);

    let (dest_line_end, after_dest_line) = line_bounds(text, dest_end);
    i = dest_end;
    while matches!(text.as_bytes().get(i), Some(b' ' | b'\t')) {
        i += 1;
    }

    let definition = |title: Option<String>| Definition::Link {
        label: label.to_string(),
        reference: LinkReference {
            target: target.clone(),
            title,
        },
    };

    if i < dest_line_end {
        // Something follows the destination on its own line: it must be a title
        if i == dest_end || !matches!(text.as_bytes()[i], b'"' | b'\'' | b'(') {
            return None;
        }
        let (raw_title, title_end) = parse_link_title(text, i)?;
        let (title_line_end, after_title_line) = line_bounds(text, title_end);
        if !is_blank(&text[title_end..title_line_end]) {
            return None;
        }
        return Some((definition(Some(unescape_string(&raw_title))), after_title_line));
    }

    // Title may sit on the next line; trailing garbage there leaves the definition titleless
    let next = after_dest_line + count_leading_spaces(text.get(after_dest_line..).unwrap_or(""));
    if next < text.len() && matches!(text.as_bytes()[next], b'"' | b'\'' | b'(')
        && let Some((raw_title, title_end)) = parse_link_title(text, next)
    {
        let (title_line_end, after_title_line) = line_bounds(text, title_end);
        if is_blank(&text[title_end..title_line_end]) {
            return Some((definition(Some(unescape_string(&raw_title))), after_title_line));
        }
    }
    Some((definition(None), after_dest_line))
}

/// Find the `]` closing a definition label opened at `start`.
fn scan_label(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = start + 1;
    let mut line_blank = true;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() && bytes[i + 1].is_ascii_punctuation() => i += 2,
            b'[' => return None,
            b']' => {
                let label = &text[start + 1..i];
                if is_blank(&label.replace('\n', "")) || label.chars().count() > MAX_LABEL_LEN {
                    return None;
                }
                return Some(i);
            }
            b'\n' => {
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

/// Collect a footnote body starting right after `]:`.
/// Continues over non-blank lines that don't open another footnote, and over blank lines
/// followed by a line indented at least four columns.
fn parse_footnote_body(text: &str, body_start: usize) -> Option<(String, usize)> {
    let (first_end, mut next) = line_bounds(text, body_start);
    let mut body = vec![text[body_start..first_end].trim().to_string()];
    let mut end = next;

    while next < text.len() {
        let (line_end, after) = line_bounds(text, next);
        let line = &text[next..line_end];

        if is_blank(line) {
            // Look past the blank run for an indented continuation
            let mut ahead = after;
            let mut blanks = 1;
            while ahead < text.len() {
                let (ahead_end, ahead_after) = line_bounds(text, ahead);
                if !is_blank(&text[ahead..ahead_end]) {
                    break;
                }
                blanks += 1;
                ahead = ahead_after;
            }
            if ahead >= text.len() {
                break;
            }
            let (ahead_end, ahead_after) = line_bounds(text, ahead);
            let ahead_line = &text[ahead..ahead_end];
            if count_indent_columns(ahead_line) < 4 {
                break;
            }
            body.extend(std::iter::repeat_n(String::new(), blanks));
            body.push(remove_indent_columns(ahead_line, 4));
            next = ahead_after;
            end = next;
            continue;
        }

        if line.trim_start().starts_with("[^") {
            break;
        }
        body.push(remove_indent_columns(line, 4));
        next = after;
        end = next;
    }

    Some((body.join("\n").trim_end().to_string(), end))
}

/// Walk the whole document once and record every definition before any inline parsing.
pub fn collect_reference_definitions(source: &str, refs: &mut RefTable, options: &ParseOptions) {
    collect_in(source, refs, options, 0);
    tracing::trace!(
        links = refs.links.len(),
        footnotes = refs.footnotes.len(),
        "collected reference definitions"
    );
}

fn line_starts(source: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(source.match_indices('\n').map(|(i, _)| i + 1))
        .filter(|&start| start < source.len())
        .collect()
}

/// Block starts that end a table body, mirroring paragraph interruption
fn closes_table(line: &str, options: &ParseOptions) -> bool {
    atx_heading(line, options.enforce_atx_headings).is_some()
        || is_thematic_break(line)
        || is_fenced_code_start(line).is_some()
        || is_blockquote_start(line)
        || html_block_kind(line, options).is_some_and(HtmlBlockKind::can_interrupt_paragraph)
        || ListMarker::parse(line).is_some_and(|marker| marker.can_interrupt_paragraph())
}

fn collect_in(source: &str, refs: &mut RefTable, options: &ParseOptions, depth: usize) {
    if depth >= MAX_DEPTH {
        tracing::debug!(depth, "reference pre-pass nesting ceiling reached");
        return;
    }

    let starts = line_starts(source);
    let line_at = |idx: usize| {
        let start = starts[idx];
        let end = starts.get(idx + 1).map_or(source.len(), |next| next - 1);
        let line = &source[start..end.max(start)];
        line.strip_suffix('\n').unwrap_or(line)
    };
    let index_of = |offset: usize| starts.partition_point(|&s| s < offset);

    let mut idx = 0;
    let mut in_paragraph = false;

    while idx < starts.len() {
        let line = line_at(idx);

        if is_blank(line) {
            in_paragraph = false;
            idx += 1;
            continue;
        }

        if let Some((fence_char, fence_len, _)) = is_fenced_code_start(line) {
            idx += 1;
            while idx < starts.len() && !is_closing_fence(line_at(idx), fence_char, fence_len) {
                idx += 1;
            }
            idx += 1;
            in_paragraph = false;
            continue;
        }

        if !in_paragraph && count_indent_columns(line) >= 4 {
            idx += 1;
            continue;
        }

        // Single-line blocks close any open paragraph
        if atx_heading(line, options.enforce_atx_headings).is_some()
            || is_thematic_break(line)
            || (in_paragraph && is_setext_underline(line).is_some())
        {
            in_paragraph = false;
            idx += 1;
            continue;
        }

        if idx + 1 < starts.len() && is_table_start(line, line_at(idx + 1)) {
            idx += 2;
            while idx < starts.len() {
                let row = line_at(idx);
                if is_blank(row) || !row.contains('|') || closes_table(row, options) {
                    break;
                }
                idx += 1;
            }
            in_paragraph = false;
            continue;
        }

        if is_blockquote_start(line) {
            let mut inner = Vec::new();
            while idx < starts.len() {
                let quoted = line_at(idx);
                if is_blockquote_start(quoted) {
                    inner.push(strip_blockquote_marker(quoted));
                } else if !is_blank(quoted) {
                    inner.push(quoted.to_string());
                } else {
                    break;
                }
                idx += 1;
            }
            collect_in(&inner.join("\n"), refs, options, depth + 1);
            in_paragraph = false;
            continue;
        }

        if let Some(marker) = ListMarker::parse(line) {
            let mut inner = vec![marker.first_line_content(line)];
            idx += 1;
            while idx < starts.len() {
                let item_line = line_at(idx);
                if is_blank(item_line) {
                    inner.push(String::new());
                } else if count_indent_columns(item_line) >= marker.content_indent {
                    inner.push(remove_indent_columns(item_line, marker.content_indent));
                } else {
                    break;
                }
                idx += 1;
            }
            collect_in(&inner.join("\n"), refs, options, depth + 1);
            in_paragraph = false;
            continue;
        }

        if let Some(kind) = html_block_kind(line, options)
            && !matches!(kind, HtmlBlockKind::BlockTag | HtmlBlockKind::Standalone)
        {
            while idx < starts.len() && !html_block_ends(line_at(idx), kind) {
                idx += 1;
            }
            idx += 1;
            in_paragraph = false;
            continue;
        }

        if !in_paragraph && let Some((definition, end)) = parse_definition(source, starts[idx]) {
            match definition {
                Definition::Link { label, reference } => {
                    if !refs.insert_link(&label, reference) {
                        tracing::trace!(%label, "duplicate link definition ignored");
                    }
                }
                Definition::Footnote { label, source } => {
                    refs.insert_footnote(&label, source);
                }
            }
            idx = index_of(end);
            continue;
        }

        in_paragraph = true;
        idx += 1;
    }
}
