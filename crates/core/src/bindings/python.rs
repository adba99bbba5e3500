//! Built-in binding for Python source

use super::{Introducer, LanguageBinding, StringDelimiter};
use crate::models::{BlockKind, Bracket};

/// The Python binding: `#` comments, single and triple quoted strings,
/// backslash continuation, `@` decorators, `class` / `def` introducers.
pub fn python() -> LanguageBinding {
    LanguageBinding {
        id: "python".to_string(),
        extensions: vec!["py".to_string(), "pyw".to_string(), "pyi".to_string()],
        single_line_comment: Some("#".to_string()),
        block_comment: None,
        string_delimiters: vec![
            // Order matters: triple quotes first.
            StringDelimiter::triple("\"\"\""),
            StringDelimiter::triple("'''"),
            StringDelimiter::single("\""),
            StringDelimiter::single("'"),
        ],
        block_introducers: vec![
            Introducer::new("async def", BlockKind::Callable),
            Introducer::new("def", BlockKind::Callable),
            Introducer::new("class", BlockKind::Type),
        ],
        brackets: vec![Bracket::Curly, Bracket::Paren, Bracket::Square],
        indent_width: 4,
        escape: Some('\\'),
        line_continuation: Some('\\'),
        decorator_prefix: Some("@".to_string()),
        opaque_inside_brackets: true,
    }
}
