/// Parse configuration and the per-call parse state
use crate::refs::RefTable;
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use thiserror::Error;

/// Nesting ceiling for block and inline recursion.
pub const MAX_DEPTH: usize = 64;

/// Decides whether a URL may be emitted for `attr` on `tag`; `None` drops it.
pub type Sanitizer = fn(url: &str, tag: &str, attr: &str) -> Option<String>;

/// Turns heading text into an anchor id.
pub type Slugify = fn(text: &str) -> String;

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("invalid parse options: {0}")]
    Json(#[from] serde_json::Error),
    #[error("forceBlock and forceInline cannot both be set")]
    ConflictingForce,
}

/// Immutable configuration for one parse invocation
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParseOptions {
    /// Don't turn bare URLs into links
    pub disable_auto_link: bool,
    /// Treat all raw HTML as literal text
    pub disable_parsing_raw_html: bool,
    /// Escape the GFM disallowed raw HTML tags
    pub tagfilter: bool,
    /// Require a space between `#` and the heading text
    pub enforce_atx_headings: bool,
    pub force_block: bool,
    pub force_inline: bool,
    /// Evaluate `attr={...}` expressions that are JSON literals instead of keeping the source text
    pub eval_unserializable_expressions: bool,
    #[serde(skip, default = "default_sanitizer")]
    pub sanitizer: Sanitizer,
    #[serde(skip, default = "default_slugify")]
    pub slugify: Slugify,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            disable_auto_link: false,
            disable_parsing_raw_html: false,
            tagfilter: true,
            enforce_atx_headings: false,
            force_block: false,
            force_inline: false,
            eval_unserializable_expressions: false,
            sanitizer: sanitize_url,
            slugify,
        }
    }
}

fn default_sanitizer() -> Sanitizer {
    sanitize_url
}

fn default_slugify() -> Slugify {
    slugify
}

impl ParseOptions {
    /// Load options from a camelCase JSON object; missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, OptionsError> {
        let options: ParseOptions = serde_json::from_str(json)?;
        if options.force_block && options.force_inline {
            return Err(OptionsError::ConflictingForce);
        }
        Ok(options)
    }

    pub(crate) fn sanitize(&self, url: &str, tag: &str, attr: &str) -> Option<String> {
        let result = (self.sanitizer)(url, tag, attr);
        if result.is_none() {
            tracing::debug!(url, tag, attr, "sanitizer rejected url");
        }
        result
    }
}

/// Transient state threaded by value through the recursive parsers
#[derive(Debug, Clone, Copy)]
pub struct ParseState<'a> {
    pub inline: bool,
    /// Inline parsing where block-only syntax never applies (table cells)
    pub simple: bool,
    pub in_anchor: bool,
    /// Enclosing container kinds. The parser itself only reads `in_table`; the
    /// others are carried for callers that parse fragments with `parse_inline`.
    pub in_block_quote: bool,
    pub in_list: bool,
    pub in_html: bool,
    /// Inside a table cell, where `\|` in a code span is a literal pipe
    pub in_table: bool,
    pub refs: &'a RefTable,
    pub depth: usize,
}

impl<'a> ParseState<'a> {
    pub fn new(refs: &'a RefTable) -> Self {
        ParseState {
            inline: false,
            simple: false,
            in_anchor: false,
            in_block_quote: false,
            in_list: false,
            in_html: false,
            in_table: false,
            refs,
            depth: 0,
        }
    }

    /// Same state, one nesting level deeper.
    pub fn nested(self) -> Self {
        ParseState {
            depth: self.depth + 1,
            ..self
        }
    }

    pub fn with_inline(self, inline: bool) -> Self {
        ParseState { inline, ..self }
    }

    pub fn too_deep(&self) -> bool {
        self.depth >= MAX_DEPTH
    }
}

/// Default URL sanitizer: blocks script-capable schemes.
pub fn sanitize_url(url: &str, _tag: &str, _attr: &str) -> Option<String> {
    let decoded = percent_decode_str(url).decode_utf8().ok()?;
    let compact: String = decoded
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '/' || *c == ':')
        .collect::<String>()
        .to_ascii_lowercase();

    if compact.starts_with("javascript:") || compact.starts_with("vbscript:") {
        return None;
    }
    if compact.starts_with("data:") && !compact.starts_with("data:image") {
        return None;
    }
    Some(url.to_string())
}

/// Default heading slug: ASCII-folded, lower-case, dash separated.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        let folded = match c {
            'À'..='Å' | 'à'..='å' | 'æ' | 'Æ' => 'a',
            'ç' | 'Ç' => 'c',
            'ð' | 'Ð' => 'd',
            'È'..='Ë' | 'è'..='ë' => 'e',
            'Ì'..='Ï' | 'ì'..='ï' => 'i',
            'ñ' | 'Ñ' => 'n',
            'Ò'..='Ö' | 'ò'..='ö' | 'ø' | 'Ø' | 'œ' | 'Œ' => 'o',
            'Ù'..='Ü' | 'ù'..='ü' => 'u',
            'ý' | 'ÿ' | 'Ý' | 'Ÿ' => 'y',
            other => other,
        };
        match folded {
            ' ' => slug.push('-'),
            c if c.is_ascii_alphanumeric() || c == '-' => slug.push(c.to_ascii_lowercase()),
            _ => {}
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = ParseOptions::default();
        assert!(options.tagfilter);
        assert!(!options.disable_auto_link);
        assert!(!options.eval_unserializable_expressions);
    }

    #[test]
    fn options_from_json_keep_defaults() {
        let options = ParseOptions::from_json(r#"{"disableAutoLink": true}"#).unwrap();
        assert!(options.disable_auto_link);
        assert!(options.tagfilter);
        assert_eq!((options.slugify)("A B"), "a-b");
    }

    #[test]
    fn options_reject_conflicting_force() {
        let err = ParseOptions::from_json(r#"{"forceBlock": true, "forceInline": true}"#)
            .unwrap_err();
        assert!(matches!(err, OptionsError::ConflictingForce));
    }

    #[test]
    fn options_reject_bad_json() {
        assert!(matches!(
            ParseOptions::from_json("{"),
            Err(OptionsError::Json(_))
        ));
    }

    #[test]
    fn sanitizer_blocks_scripts() {
        assert_eq!(sanitize_url("javascript:alert(1)", "a", "href"), None);
        assert_eq!(sanitize_url("JaVa\tScRiPt:alert(1)", "a", "href"), None);
        assert_eq!(sanitize_url("java%73cript:alert(1)", "a", "href"), None);
        assert_eq!(sanitize_url("vbscript:x", "a", "href"), None);
        assert_eq!(sanitize_url("data:text/html,x", "a", "href"), None);
        assert_eq!(
            sanitize_url("data:image/png;base64,AAA", "img", "src").as_deref(),
            Some("data:image/png;base64,AAA")
        );
        assert_eq!(
            sanitize_url("https://example.com", "a", "href").as_deref(),
            Some("https://example.com")
        );
    }

    #[test]
    fn slugify_folds_accents() {
        assert_eq!(slugify("Héllo Wörld!"), "hello-world");
        assert_eq!(slugify("foo-bar baz"), "foo-bar-baz");
    }

    #[test]
    fn nested_state_increments_depth() {
        let refs = RefTable::new();
        let state = ParseState::new(&refs).nested().nested();
        assert_eq!(state.depth, 2);
        assert!(!state.too_deep());
    }
}
