/// List markers, list items and tight/loose list assembly
use crate::ast::Node;
use crate::block::{BlockParser, is_closing_fence, is_fenced_code_start, is_thematic_break, parse_markdown};
use crate::chars::{
    calculate_indent, calculate_indent_from_column, count_indent_columns, expand_tabs, is_blank,
    remove_indent_columns, remove_indent_columns_from,
};
use crate::options::ParseState;

/// A list item marker at the start of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListMarker {
    pub ordered: bool,
    /// Bullet character (`-`, `+`, `*`) or the delimiter after the number (`.`, `)`)
    pub delimiter: char,
    /// Number of an ordered marker
    pub start: u32,
    /// Columns of indentation before the marker
    pub indent: usize,
    pub width: usize,
    /// Column where item content starts; continuation lines need at least this much
    pub content_indent: usize,
    /// Nothing but whitespace after the marker
    pub is_empty: bool,
    marker_end: usize,
}

impl ListMarker {
    /// Recognize a bullet or ordered marker (up to nine digits) with 0-3 columns of indent.
    pub fn parse(line: &str) -> Option<Self> {
        let lead = calculate_indent(line, 0, line.len());
        if lead.space_equivalent > 3 {
            return None;
        }
        let rest = &line[lead.char_count..];
        let bytes = rest.as_bytes();

        let (ordered, delimiter, start, width) = match *bytes.first()? {
            b @ (b'-' | b'+' | b'*') => (false, b as char, 0, 1),
            b'0'..=b'9' => {
                let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
                if digits > 9 {
                    return None;
                }
                let delimiter = match bytes.get(digits)? {
                    b'.' => '.',
                    b')' => ')',
                    _ => return None,
                };
                (true, delimiter, rest[..digits].parse().ok()?, digits + 1)
            }
            _ => return None,
        };

        // The marker must be followed by whitespace or end the line
        let marker_end = lead.char_count + width;
        let after = &line[marker_end..];
        if !after.is_empty() && !after.starts_with([' ', '\t']) {
            return None;
        }

        let marker_col = lead.space_equivalent + width;
        let spacing = calculate_indent_from_column(line, marker_end, line.len(), marker_col);
        let is_empty = is_blank(after);

        // More than four columns of spacing means the content is indented code:
        // only one column counts as spacing
        let spacing_cols = if is_empty || spacing.space_equivalent > 4 {
            1
        } else {
            spacing.space_equivalent
        };

        Some(ListMarker {
            ordered,
            delimiter,
            start,
            indent: lead.space_equivalent,
            width,
            content_indent: marker_col + spacing_cols,
            is_empty,
            marker_end,
        })
    }

    /// Content of the marker line with the marker and its spacing removed
    pub fn first_line_content(&self, line: &str) -> String {
        if self.is_empty {
            return String::new();
        }
        let marker_col = self.indent + self.width;
        let content = remove_indent_columns_from(
            &line[self.marker_end..],
            self.content_indent - marker_col,
            marker_col,
        );
        expand_leading_tabs(&content, self.content_indent)
    }

    /// Items of one list share the bullet character or the ordered delimiter
    pub fn same_family(&self, other: &ListMarker) -> bool {
        self.ordered == other.ordered && self.delimiter == other.delimiter
    }

    /// Empty items and ordered lists not starting at 1 cannot interrupt a paragraph
    pub fn can_interrupt_paragraph(&self) -> bool {
        !self.is_empty && (!self.ordered || self.start == 1)
    }
}

/// Expand tabs in the leading whitespace only, relative to `column`
fn expand_leading_tabs(text: &str, column: usize) -> String {
    let ws = text.len() - text.trim_start_matches([' ', '\t']).len();
    if !text[..ws].contains('\t') {
        return text.to_string();
    }
    expand_tabs(&text[..ws], column) + &text[ws..]
}

/// Task list marker `[ ]` / `[x]` at the start of item content
fn parse_task_marker(content: &str) -> Option<(bool, &str)> {
    let completed = match content.get(..3)? {
        "[ ]" => false,
        "[x]" | "[X]" => true,
        _ => return None,
    };
    let rest = &content[3..];
    if !rest.is_empty() && !rest.starts_with([' ', '\t', '\n']) {
        return None;
    }
    Some((completed, rest.strip_prefix([' ', '\t']).unwrap_or(rest)))
}

/// One list item before assembly
struct ListItem {
    children: Vec<Node>,
    task: Option<bool>,
    /// Blank line between two of the item's direct children
    loose: bool,
}

impl BlockParser<'_> {
    /// Parse consecutive items of the same marker family
    pub(crate) fn parse_list(&self, lines: &[&str], first: ListMarker) -> (Node, usize) {
        let mut items = Vec::new();
        let mut loose = false;
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];
            if i > 0 && is_thematic_break(line) {
                break;
            }
            let Some(marker) = ListMarker::parse(line).filter(|m| m.same_family(&first)) else {
                break;
            };

            let (item, consumed) = self.parse_list_item(&lines[i..], &marker);
            loose |= item.loose;
            items.push(item);
            i += consumed;

            // Blank lines between items make the list loose, if another item follows
            let mut j = i;
            while j < lines.len() && is_blank(lines[j]) {
                j += 1;
            }
            if j > i {
                let continues = j < lines.len()
                    && !is_thematic_break(lines[j])
                    && ListMarker::parse(lines[j]).is_some_and(|m| m.same_family(&first));
                if !continues {
                    break;
                }
                loose = true;
                i = j;
            }
        }

        let items = items
            .into_iter()
            .map(|item| assemble_item(item, loose))
            .collect();

        let list = if first.ordered {
            Node::OrderedList {
                items,
                start: Some(first.start),
            }
        } else {
            Node::UnorderedList { items }
        };
        (list, i)
    }

    /// Collect the lines of one item, dedent them and parse them as blocks.
    fn parse_list_item(&self, lines: &[&str], marker: &ListMarker) -> (ListItem, usize) {
        let mut item_lines = vec![marker.first_line_content(lines[0])];
        let mut open_fence = is_fenced_code_start(&item_lines[0]).map(|(c, len, _)| (c, len));
        let mut last_blank = false;
        let mut first_blank: Option<usize> = None;
        let mut i = 1;

        while i < lines.len() {
            let line = lines[i];

            if is_blank(line) {
                // An item can begin with at most one blank line
                if marker.is_empty && i == 1 {
                    break;
                }
                let mut j = i;
                while j < lines.len() && is_blank(lines[j]) {
                    j += 1;
                }
                if j == lines.len() || count_indent_columns(lines[j]) < marker.content_indent {
                    break;
                }
                if open_fence.is_none() {
                    first_blank.get_or_insert(item_lines.len());
                }
                item_lines.extend(std::iter::repeat_n(String::new(), j - i));
                last_blank = true;
                i = j;
                continue;
            }

            let content = if count_indent_columns(line) >= marker.content_indent {
                let dedented = remove_indent_columns(line, marker.content_indent);
                expand_leading_tabs(&dedented, marker.content_indent)
            } else if !last_blank
                && open_fence.is_none()
                && item_lines.last().is_some_and(|l| self.allows_lazy_continuation(l))
                && !self.interrupts_paragraph(line, None)
                && ListMarker::parse(line).is_none()
            {
                // Lazy continuation of the item's paragraph
                line.to_string()
            } else {
                break;
            };

            open_fence = match open_fence {
                Some((c, len)) if is_closing_fence(&content, c, len) => None,
                Some(fence) => Some(fence),
                None => is_fenced_code_start(&content).map(|(c, len, _)| (c, len)),
            };
            item_lines.push(content);
            last_blank = false;
            i += 1;
        }

        let mut task = None;
        if let Some((completed, rest)) = parse_task_marker(&item_lines[0]) {
            task = Some(completed);
            item_lines[0] = rest.to_string();
        }

        let child_state = ParseState {
            in_list: true,
            ..self.state.nested()
        };
        let children = parse_markdown(&item_lines.join("\n"), child_state.with_inline(false), self.options);

        // A blank line only separates direct children if it comes before the last child
        // started; blanks inside a trailing nested list belong to that list
        let loose = match first_blank {
            Some(blank_at) if children.len() > 1 => {
                let trailing_list_starts = matches!(
                    children.last(),
                    Some(Node::OrderedList { .. } | Node::UnorderedList { .. })
                )
                .then(|| {
                    item_lines
                        .iter()
                        .position(|l| ListMarker::parse(l).is_some_and(|m| m.indent == 0))
                })
                .flatten();
                trailing_list_starts.is_none_or(|start| blank_at < start)
            }
            _ => false,
        };

        (
            ListItem {
                children,
                task,
                loose,
            },
            i,
        )
    }
}

/// Tight items have their paragraphs unwrapped; a task marker leads the item content.
fn assemble_item(item: ListItem, loose: bool) -> Vec<Node> {
    let mut children = if loose {
        item.children
    } else {
        item.children
            .into_iter()
            .flat_map(|child| match child {
                Node::Paragraph { children } => children,
                other => vec![other],
            })
            .collect()
    };

    if let Some(completed) = item.task {
        let task = Node::GfmTask { completed };
        match children.first_mut() {
            Some(Node::Paragraph { children: inline }) => inline.insert(0, task),
            _ => children.insert(0, task),
        }
    }
    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ParseOptions;
    use crate::refs::RefTable;
    use pretty_assertions::assert_eq;

    fn blocks(source: &str) -> Vec<Node> {
        let refs = RefTable::new();
        parse_markdown(source, ParseState::new(&refs), &ParseOptions::default())
    }

    fn text(s: &str) -> Node {
        Node::text(s)
    }

    fn para(s: &str) -> Node {
        Node::Paragraph {
            children: vec![text(s)],
        }
    }

    #[test]
    fn marker_recognition() {
        let marker = ListMarker::parse("-   foo").unwrap();
        assert!(!marker.ordered);
        assert_eq!(marker.content_indent, 4);
        assert_eq!(marker.first_line_content("-   foo"), "foo");

        let marker = ListMarker::parse(" 10) bar").unwrap();
        assert!(marker.ordered);
        assert_eq!(marker.start, 10);
        assert_eq!(marker.delimiter, ')');
        assert_eq!(marker.content_indent, 5);

        assert!(ListMarker::parse("-foo").is_none());
        assert!(ListMarker::parse("1234567890. x").is_none());
        assert!(ListMarker::parse("    - x").is_none());
    }

    #[test]
    fn wide_spacing_is_indented_code() {
        let marker = ListMarker::parse("-     code").unwrap();
        assert_eq!(marker.content_indent, 2);
        assert_eq!(marker.first_line_content("-     code"), "    code");
    }

    #[test]
    fn tab_after_marker() {
        let marker = ListMarker::parse("-\tfoo").unwrap();
        assert_eq!(marker.content_indent, 4);
        assert_eq!(marker.first_line_content("-\tfoo"), "foo");
    }

    #[test]
    fn interruption_rules() {
        assert!(!ListMarker::parse("2. x").unwrap().can_interrupt_paragraph());
        assert!(ListMarker::parse("1. x").unwrap().can_interrupt_paragraph());
        assert!(!ListMarker::parse("-").unwrap().can_interrupt_paragraph());
    }

    #[test]
    fn tight_list_unwraps_paragraphs() {
        assert_eq!(
            blocks("- a\n- b"),
            vec![Node::UnorderedList {
                items: vec![vec![text("a")], vec![text("b")]],
            }]
        );
    }

    #[test]
    fn loose_list_keeps_paragraphs() {
        assert_eq!(
            blocks("1. a\n\n2. b"),
            vec![Node::OrderedList {
                items: vec![vec![para("a")], vec![para("b")]],
                start: Some(1),
            }]
        );
    }

    #[test]
    fn ordered_start_number() {
        let nodes = blocks("3. x");
        assert!(matches!(nodes[0], Node::OrderedList { start: Some(3), .. }));
    }

    #[test]
    fn marker_change_starts_new_list() {
        assert_eq!(blocks("- a\n+ b").len(), 2);
        assert_eq!(blocks("1. a\n2) b").len(), 2);
    }

    #[test]
    fn nested_list_stays_tight() {
        assert_eq!(
            blocks("- a\n  - b\n\n  - c"),
            vec![Node::UnorderedList {
                items: vec![vec![
                    text("a"),
                    Node::UnorderedList {
                        items: vec![vec![para("b")], vec![para("c")]],
                    },
                ]],
            }]
        );
    }

    #[test]
    fn lazy_continuation() {
        assert_eq!(
            blocks("- a\nb"),
            vec![Node::UnorderedList {
                items: vec![vec![text("a\nb")]],
            }]
        );
    }

    #[test]
    fn less_indented_line_after_blank_ends_list() {
        assert_eq!(
            blocks("- foo\n\n\n\n<small>Hi</small>").len(),
            2
        );
    }

    #[test]
    fn task_items() {
        assert_eq!(
            blocks("- [ ] todo\n- [x] done"),
            vec![Node::UnorderedList {
                items: vec![
                    vec![Node::GfmTask { completed: false }, text("todo")],
                    vec![Node::GfmTask { completed: true }, text("done")],
                ],
            }]
        );
    }

    #[test]
    fn thematic_break_ends_list() {
        let nodes = blocks("- a\n* * *");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1], Node::BreakThematic);
    }
}
