/// Character classifiers and tab-aware indentation helpers
use unicode_categories::UnicodeCategories;

/// Tab stops are every four columns.
pub const TAB_STOP: usize = 4;

/// Result of scanning leading whitespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Indent {
    /// Columns consumed, with tabs expanded
    pub space_equivalent: usize,
    /// Source bytes consumed (spaces and tabs are single bytes)
    pub char_count: usize,
}

/// Scan spaces and tabs from `start` up to `end`, stopping at the first other character.
pub fn calculate_indent(text: &str, start: usize, end: usize) -> Indent {
    calculate_indent_from_column(text, start, end, 0)
}

/// Like [`calculate_indent`], but tab stops are measured from `column`.
pub fn calculate_indent_from_column(text: &str, start: usize, end: usize, column: usize) -> Indent {
    let bytes = text.as_bytes();
    let end = end.min(bytes.len());
    let mut indent = Indent::default();
    let mut i = start;

    while i < end {
        match bytes[i] {
            b' ' => indent.space_equivalent += 1,
            b'\t' => {
                let col = column + indent.space_equivalent;
                indent.space_equivalent += TAB_STOP - col % TAB_STOP;
            }
            _ => break,
        }
        indent.char_count += 1;
        i += 1;
    }
    indent
}

/// Columns of leading indentation in a line
pub fn count_indent_columns(line: &str) -> usize {
    calculate_indent(line, 0, line.len()).space_equivalent
}

/// Number of leading space characters (tabs not included)
pub fn count_leading_spaces(line: &str) -> usize {
    line.bytes().take_while(|&b| b == b' ').count()
}

pub fn is_blank(line: &str) -> bool {
    line.bytes().all(|b| b == b' ' || b == b'\t')
}

/// Remove up to `columns` of indentation from a line.
/// A tab that straddles the boundary leaves its remaining columns as spaces.
pub fn remove_indent_columns(line: &str, columns: usize) -> String {
    remove_indent_columns_from(line, columns, 0)
}

/// Remove up to `columns` of indentation from text that begins at `start_col`.
pub fn remove_indent_columns_from(line: &str, columns: usize, start_col: usize) -> String {
    let bytes = line.as_bytes();
    let mut col = 0;
    let mut i = 0;
    let mut result = String::new();

    while col < columns && i < bytes.len() {
        match bytes[i] {
            b' ' => {
                col += 1;
                i += 1;
            }
            b'\t' => {
                let width = TAB_STOP - (start_col + col) % TAB_STOP;
                i += 1;
                if col + width <= columns {
                    col += width;
                } else {
                    // Partial tab: keep the columns beyond the cut as spaces
                    let keep = col + width - columns;
                    result.extend(std::iter::repeat_n(' ', keep));
                    col = columns;
                }
            }
            _ => break,
        }
    }

    result.push_str(&line[i..]);
    result
}

/// Expand tabs to spaces based on column position
pub fn expand_tabs(text: &str, start_col: usize) -> String {
    let mut result = String::with_capacity(text.len());
    let mut col = start_col;

    for ch in text.chars() {
        match ch {
            '\t' => {
                let spaces = TAB_STOP - col % TAB_STOP;
                result.extend(std::iter::repeat_n(' ', spaces));
                col += spaces;
            }
            '\n' => {
                result.push(ch);
                col = 0;
            }
            _ => {
                result.push(ch);
                col += 1;
            }
        }
    }
    result
}

/// ASCII punctuation: the characters that may be backslash-escaped
pub fn is_ascii_punctuation(ch: char) -> bool {
    ch.is_ascii_punctuation()
}

/// Unicode punctuation for flanking rules: general categories P and S
pub fn is_unicode_punctuation(ch: char) -> bool {
    if ch.is_ascii() {
        return ch.is_ascii_punctuation();
    }
    ch.is_punctuation() || ch.is_symbol()
}

/// Unicode whitespace: category Zs plus tab, line feed, form feed and carriage return
pub fn is_unicode_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\u{0C}' | '\r') || ch.is_separator_space()
}

pub fn is_alphanumeric(ch: char) -> bool {
    ch.is_alphanumeric()
}

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// HTML elements that never have content or a closing tag
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS
        .iter()
        .any(|void| void.eq_ignore_ascii_case(tag))
}

/// Character immediately before byte offset `pos`, if any
pub(crate) fn char_before(text: &str, pos: usize) -> Option<char> {
    text[..pos].chars().next_back()
}

/// Character starting at byte offset `pos`, if any
pub(crate) fn char_at(text: &str, pos: usize) -> Option<char> {
    text.get(pos..).and_then(|rest| rest.chars().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indent_counts_spaces() {
        let indent = calculate_indent("   x", 0, 4);
        assert_eq!(indent.space_equivalent, 3);
        assert_eq!(indent.char_count, 3);
    }

    #[test]
    fn indent_expands_tabs_to_next_stop() {
        let indent = calculate_indent(" \tx", 0, 3);
        assert_eq!(indent.space_equivalent, 4);
        assert_eq!(indent.char_count, 2);

        let indent = calculate_indent("\t\tx", 0, 3);
        assert_eq!(indent.space_equivalent, 8);
        assert_eq!(indent.char_count, 2);
    }

    #[test]
    fn indent_stops_at_end() {
        let indent = calculate_indent("      x", 0, 2);
        assert_eq!(indent.space_equivalent, 2);
        assert_eq!(indent.char_count, 2);
    }

    #[test]
    fn indent_from_column_offsets_tab_stops() {
        let indent = calculate_indent_from_column("\tx", 0, 2, 2);
        assert_eq!(indent.space_equivalent, 2);
    }

    #[test]
    fn remove_partial_tab() {
        assert_eq!(remove_indent_columns("\tfoo", 2), "  foo");
        assert_eq!(remove_indent_columns("    foo", 2), "  foo");
        assert_eq!(remove_indent_columns("  foo", 4), "foo");
    }

    #[test]
    fn expand_tabs_respects_start_column() {
        assert_eq!(expand_tabs("\ta", 1), "   a");
        assert_eq!(expand_tabs("a\tb", 0), "a   b");
    }

    #[test]
    fn punctuation_classes() {
        assert!(is_unicode_punctuation('!'));
        assert!(is_unicode_punctuation('€'));
        assert!(is_unicode_punctuation('“'));
        assert!(!is_unicode_punctuation('a'));
        assert!(is_unicode_whitespace('\u{00A0}'));
        assert!(!is_unicode_whitespace('x'));
    }

    #[test]
    fn void_elements() {
        assert!(is_void_element("br"));
        assert!(is_void_element("IMG"));
        assert!(!is_void_element("div"));
    }
}
