/// GFM pipe tables
use crate::ast::{Alignment, Node};
use crate::block::BlockParser;
use crate::chars::{count_indent_columns, is_blank};
use crate::inline::{code_span_end, parse_inline};
use crate::options::ParseState;

/// A header line followed by a delimiter row with the same number of cells
pub(crate) fn is_table_start(line: &str, next: &str) -> bool {
    if count_indent_columns(line) >= 4 || !line.contains('|') {
        return false;
    }
    parse_delimiter_row(next)
        .is_some_and(|align| align.len() == split_table_row(line).len())
}

/// Split a row into raw cell texts. Outer pipes are optional; escaped pipes and
/// pipes inside code spans don't separate cells.
pub fn split_table_row(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let row = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let bytes = row.as_bytes();

    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' if bytes.get(i + 1) == Some(&b'|') => {
                cell.push('|');
                i += 2;
            }
            b'`' => {
                let end = code_span_end(row, i).unwrap_or_else(|| {
                    i + row[i..].bytes().take_while(|&b| b == b'`').count()
                });
                cell.push_str(&row[i..end]);
                i = end;
            }
            b'|' => {
                cells.push(cell.trim().to_string());
                cell.clear();
                i += 1;
            }
            _ => {
                let ch_len = row[i..].chars().next().map_or(1, char::len_utf8);
                cell.push_str(&row[i..i + ch_len]);
                i += ch_len;
            }
        }
    }

    // A trailing pipe closes the last cell rather than opening an empty one
    if !cell.trim().is_empty() || !row.ends_with('|') || row.ends_with("\\|") {
        cells.push(cell.trim().to_string());
    }
    cells
}

/// Parse `| :--- | ---: | :-: |` into column alignments
pub fn parse_delimiter_row(line: &str) -> Option<Vec<Alignment>> {
    if count_indent_columns(line) >= 4 {
        return None;
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let cells = split_table_row(trimmed);
    // A lone `---` is a thematic break or setext underline, not a table
    if cells.len() == 1 && !trimmed.contains('|') {
        return None;
    }

    cells
        .iter()
        .map(|cell| {
            let left = cell.starts_with(':');
            let right = cell.ends_with(':') && cell.len() > 1;
            let dashes = cell.trim_start_matches(':').trim_end_matches(':');
            if dashes.is_empty() || !dashes.bytes().all(|b| b == b'-') {
                return None;
            }
            Some(match (left, right) {
                (true, true) => Alignment::Center,
                (true, false) => Alignment::Left,
                (false, true) => Alignment::Right,
                (false, false) => Alignment::None,
            })
        })
        .collect()
}

impl BlockParser<'_> {
    /// Table starting at the first of `lines`; None when the delimiter row is missing
    pub(crate) fn parse_table(&self, lines: &[&str]) -> Option<(Node, usize)> {
        let header_line = *lines.first()?;
        let delimiter_line = *lines.get(1)?;
        if !is_table_start(header_line, delimiter_line) {
            return None;
        }
        let align = parse_delimiter_row(delimiter_line)?;
        let columns = align.len();

        let cell_state = ParseState {
            simple: true,
            in_table: true,
            ..self.state.nested()
        }
        .with_inline(true);
        let parse_row = |line: &str| -> Vec<Vec<Node>> {
            let mut cells = split_table_row(line);
            cells.resize(columns, String::new());
            cells
                .iter()
                .map(|cell| parse_inline(cell, cell_state, self.options))
                .collect()
        };

        let header = parse_row(header_line);
        let mut cells = Vec::new();
        let mut i = 2;
        while i < lines.len() {
            let line = lines[i];
            if is_blank(line) || !line.contains('|') || self.interrupts_paragraph(line, None) {
                break;
            }
            cells.push(parse_row(line));
            i += 1;
        }

        tracing::trace!(columns, rows = cells.len(), "parsed table");
        Some((
            Node::Table {
                header,
                cells,
                align,
            },
            i,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FormatTag;
    use crate::block::parse_markdown;
    use crate::options::ParseOptions;
    use crate::refs::RefTable;
    use pretty_assertions::assert_eq;

    fn blocks(source: &str) -> Vec<Node> {
        let refs = RefTable::new();
        parse_markdown(source, ParseState::new(&refs), &ParseOptions::default())
    }

    fn cell(s: &str) -> Vec<Node> {
        vec![Node::text(s)]
    }

    #[test]
    fn splits_rows() {
        assert_eq!(split_table_row("| a | b |"), vec!["a", "b"]);
        assert_eq!(split_table_row("a | b"), vec!["a", "b"]);
        assert_eq!(split_table_row("| a | |"), vec!["a", ""]);
        assert_eq!(split_table_row(r"| a \| b | c |"), vec!["a | b", "c"]);
        assert_eq!(split_table_row("| `a|b` | c |"), vec!["`a|b`", "c"]);
    }

    #[test]
    fn delimiter_alignments() {
        assert_eq!(
            parse_delimiter_row("| :--- | ---: | :-: | --- |"),
            Some(vec![
                Alignment::Left,
                Alignment::Right,
                Alignment::Center,
                Alignment::None,
            ])
        );
        assert_eq!(parse_delimiter_row("| a | --- |"), None);
        assert_eq!(parse_delimiter_row("---"), None);
        assert_eq!(parse_delimiter_row("|:|"), None);
    }

    #[test]
    fn table_start_needs_matching_columns() {
        assert!(is_table_start("| a | b |", "|---|---|"));
        assert!(!is_table_start("| a | b |", "|---|"));
        assert!(!is_table_start("a b", "---"));
    }

    #[test]
    fn escaped_pipe_in_code_cell() {
        assert_eq!(
            blocks("| `a\\|b` |\n| --- |"),
            vec![Node::Table {
                header: vec![vec![Node::CodeInline {
                    text: "a|b".to_string(),
                }]],
                cells: vec![],
                align: vec![Alignment::None],
            }]
        );
    }

    #[test]
    fn simple_table() {
        assert_eq!(
            blocks("| a | b |\n|:--|--:|\n| 1 | *2* |"),
            vec![Node::Table {
                header: vec![cell("a"), cell("b")],
                cells: vec![vec![
                    cell("1"),
                    vec![Node::TextFormatted {
                        tag: FormatTag::Em,
                        children: vec![Node::text("2")],
                    }],
                ]],
                align: vec![Alignment::Left, Alignment::Right],
            }]
        );
    }

    #[test]
    fn rows_are_padded_and_truncated() {
        let nodes = blocks("a | b\n--|--\n1\n1 | 2 | 3");
        let Node::Table { cells, .. } = &nodes[0] else {
            panic!("expected table, got {nodes:?}");
        };
        // `1` has no pipe and ends the table
        assert!(cells.is_empty());

        let nodes = blocks("a | b\n--|--\n| 1 |\n1 | 2 | 3");
        let Node::Table { cells, .. } = &nodes[0] else {
            panic!("expected table, got {nodes:?}");
        };
        assert_eq!(cells[0], vec![cell("1"), vec![]]);
        assert_eq!(cells[1], vec![cell("1"), cell("2")]);
    }

    #[test]
    fn blank_line_ends_table() {
        let nodes = blocks("| a |\n| - |\n| 1 |\n\n| 2 |");
        assert_eq!(nodes.len(), 2);
        assert!(matches!(nodes[1], Node::Paragraph { .. }));
    }

    #[test]
    fn table_interrupts_paragraph() {
        let nodes = blocks("intro\n| a |\n| - |");
        assert_eq!(nodes.len(), 2);
        assert!(matches!(nodes[1], Node::Table { .. }));
    }

    #[test]
    fn table_inside_list_item() {
        let nodes = blocks("- | a |\n  | - |\n  | 1 |");
        let Node::UnorderedList { items } = &nodes[0] else {
            panic!("expected list, got {nodes:?}");
        };
        assert!(matches!(items[0][0], Node::Table { .. }));
    }
}
