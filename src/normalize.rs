/// Input normalization applied before any parsing
use std::borrow::Cow;

const BOM: char = '\u{FEFF}';

/// Strip a leading byte-order mark, replace NUL with U+FFFD and unify line endings to LF.
/// Returns the input unchanged (borrowed) when none of these apply.
pub fn normalize_input(input: &str) -> Cow<'_, str> {
    let body = input.strip_prefix(BOM).unwrap_or(input);

    if !body.contains(['\0', '\r']) {
        return Cow::Borrowed(body);
    }

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\0' => out.push('\u{FFFD}'),
            '\r' => {
                // CRLF collapses to a single LF
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}
