//! Line context scanner
//!
//! Classifies the lexical context of each line (strings, comments, bracket
//! nesting, backslash continuation) without looking at block structure. The
//! scanner is a pure function of the line and the previous line's state.

use crate::bindings::{CompiledBinding, Transition};
use crate::models::{LineContext, ScanState};

/// Pure per-line scanner parameterized by a language binding
#[derive(Debug, Clone, Copy)]
pub struct LineScanner<'a> {
    binding: &'a CompiledBinding,
    tab_width: usize,
}

impl<'a> LineScanner<'a> {
    pub fn new(binding: &'a CompiledBinding) -> Self {
        Self {
            binding,
            tab_width: binding.binding().indent_width,
        }
    }

    /// Override the binding's tab width
    pub fn with_tab_width(mut self, tab_width: usize) -> Self {
        self.tab_width = tab_width.max(1);
        self
    }

    pub fn binding(&self) -> &'a CompiledBinding {
        self.binding
    }

    /// Compute the state after `line`, given the state after the previous line
    pub fn scan(&self, line: &str, prev: &ScanState) -> ScanState {
        let binding = self.binding;
        let escape = binding.binding().escape;
        let continuation_char = binding.binding().line_continuation;
        let content = strip_terminator(line);

        let indent = if prev.continuation {
            prev.indent
        } else {
            measure_indent(content, self.tab_width)
        };

        let mut context = match prev.context {
            LineContext::LineComment => LineContext::None,
            other => other,
        };
        let mut brackets = prev.brackets;
        let mut continuation = false;
        let mut escaped_newline = false;

        let mut i = 0;
        while i < content.len() {
            let rest = &content[i..];
            let Some(c) = rest.chars().next() else {
                break;
            };

            match context {
                LineContext::None => {
                    if Some(c) == continuation_char && i + c.len_utf8() == content.len() {
                        continuation = true;
                        i += c.len_utf8();
                        continue;
                    }
                    if Some(c) == escape {
                        i += c.len_utf8();
                        if let Some(next) = content[i..].chars().next() {
                            i += next.len_utf8();
                        }
                        continue;
                    }

                    let entry = binding
                        .transitions(c)
                        .iter()
                        .find(|entry| rest.starts_with(entry.marker.as_str()));
                    let Some(entry) = entry else {
                        i += c.len_utf8();
                        continue;
                    };

                    i += entry.marker.len();
                    match entry.transition {
                        Transition::LineComment => {
                            context = LineContext::LineComment;
                            break;
                        }
                        Transition::BlockComment => context = LineContext::BlockComment,
                        Transition::String { index, triple: true } => {
                            context = LineContext::TripleQuoteString(index)
                        }
                        Transition::String { index, triple: false } => {
                            context = LineContext::SingleQuoteString(index)
                        }
                        Transition::Bracket { bracket, opening } => brackets.apply(bracket, opening),
                    }
                }
                LineContext::LineComment => break,
                LineContext::BlockComment => match binding.block_comment_close() {
                    Some(close) if rest.starts_with(close) => {
                        context = LineContext::None;
                        i += close.len();
                    }
                    _ => i += c.len_utf8(),
                },
                LineContext::SingleQuoteString(index) | LineContext::TripleQuoteString(index) => {
                    if Some(c) == escape {
                        i += c.len_utf8();
                        match content[i..].chars().next() {
                            Some(next) => i += next.len_utf8(),
                            None => escaped_newline = true,
                        }
                        continue;
                    }
                    match binding.string_delimiter(index) {
                        Some(delim) if rest.starts_with(delim) => {
                            context = LineContext::None;
                            i += delim.len();
                        }
                        _ => i += c.len_utf8(),
                    }
                }
            }
        }

        // Line comments end with the line, and so do single-quoted strings
        // unless the newline itself was escaped.
        let context = match context {
            LineContext::LineComment => LineContext::None,
            LineContext::SingleQuoteString(_) if !escaped_newline => LineContext::None,
            other => other,
        };

        ScanState {
            indent,
            context,
            brackets,
            continuation,
        }
    }

    /// Scan every line of `text`, returning one state per line
    pub fn scan_all(&self, text: &str) -> Vec<ScanState> {
        let mut prev = ScanState::default();
        split_lines(text)
            .into_iter()
            .map(|line| {
                prev = self.scan(line, &prev);
                prev
            })
            .collect()
    }
}

/// Split text into lines, keeping each line's terminator
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

/// Remove a trailing `\n` or `\r\n`
pub fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Leading whitespace of a line as a string slice
pub fn leading_whitespace(line: &str) -> &str {
    let end = line
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(line.len());
    &line[..end]
}

/// Column of the first non-blank character, tabs advancing to the next tab stop
pub fn measure_indent(line: &str, tab_width: usize) -> usize {
    let tab_width = tab_width.max(1);
    leading_whitespace(line).chars().fold(0, |col, c| match c {
        '\t' => (col / tab_width + 1) * tab_width,
        _ => col + 1,
    })
}

/// True for a line holding only whitespace
pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::{python, CompiledBinding, LanguageBinding};
    use crate::models::BracketDepth;
    use rstest::rstest;

    fn compiled() -> CompiledBinding {
        CompiledBinding::compile(python()).unwrap()
    }

    fn scan_one(line: &str) -> ScanState {
        let binding = compiled();
        LineScanner::new(&binding).scan(line, &ScanState::default())
    }

    #[rstest]
    #[case("x = 1\n", 0)]
    #[case("    x = 1\n", 4)]
    #[case("\tx = 1\n", 4)]
    #[case("  \tx = 1\n", 4)]
    #[case("\t\t  x\n", 10)]
    #[case("\n", 0)]
    fn test_indent(#[case] line: &str, #[case] expected: usize) {
        assert_eq!(scan_one(line).indent, expected);
    }

    #[rstest]
    #[case("x = 'a'\n", LineContext::None)]
    #[case("x = \"\"\"doc\n", LineContext::TripleQuoteString(0))]
    #[case("x = '''doc\n", LineContext::TripleQuoteString(1))]
    #[case("x = \"\"\"doc\"\"\"\n", LineContext::None)]
    #[case("x = 1  # comment\n", LineContext::None)]
    #[case("x = 'unterminated\n", LineContext::None)]
    #[case("x = 'esc\\\n", LineContext::SingleQuoteString(3))]
    #[case("s = \"# not a comment (\"\n", LineContext::None)]
    fn test_context(#[case] line: &str, #[case] expected: LineContext) {
        assert_eq!(scan_one(line).context, expected);
    }

    #[test]
    fn test_brackets_ignore_strings_and_comments() {
        let state = scan_one("call(a, '(', [1, 2  # ) ]\n");
        assert_eq!(
            state.brackets,
            BracketDepth {
                curly: 0,
                paren: 1,
                square: 1
            }
        );
    }

    #[test]
    fn test_stray_closing_bracket_clamps() {
        let state = scan_one(")))]}\n");
        assert_eq!(state.brackets, BracketDepth::default());
    }

    #[test]
    fn test_continuation_carries_indent() {
        let binding = compiled();
        let scanner = LineScanner::new(&binding);
        let first = scanner.scan("    x = 1 + \\\n", &ScanState::default());
        assert!(first.continuation);
        assert_eq!(first.indent, 4);

        let second = scanner.scan("2\n", &first);
        assert_eq!(second.indent, 4);
        assert!(!second.continuation);

        let third = scanner.scan("y = 2\n", &second);
        assert_eq!(third.indent, 0);
    }

    #[test]
    fn test_backslash_inside_string_is_not_continuation() {
        let state = scan_one("x = \"\"\"a \\\n");
        assert!(!state.continuation);
        assert_eq!(state.context, LineContext::TripleQuoteString(0));
    }

    #[test]
    fn test_triple_string_spans_lines() {
        let binding = compiled();
        let scanner = LineScanner::new(&binding);
        let states = scanner.scan_all("x = '''\n  (inside\n'''\ny = (\n");
        assert_eq!(states[0].context, LineContext::TripleQuoteString(1));
        assert_eq!(states[1].context, LineContext::TripleQuoteString(1));
        assert_eq!(states[1].brackets, BracketDepth::default());
        assert_eq!(states[2].context, LineContext::None);
        assert_eq!(states[3].brackets.paren, 1);
    }

    #[test]
    fn test_escaped_quote_stays_in_string() {
        let state = scan_one("x = 'it\\'s' + (\n");
        assert_eq!(state.context, LineContext::None);
        assert_eq!(state.brackets.paren, 1);
    }

    #[test]
    fn test_block_comment_binding() {
        let binding = CompiledBinding::compile(LanguageBinding {
            id: "coffee".to_string(),
            extensions: vec!["coffee".to_string()],
            single_line_comment: None,
            block_comment: Some(("###".to_string(), "###".to_string())),
            string_delimiters: vec![],
            block_introducers: vec![],
            brackets: vec![],
            indent_width: 2,
            escape: None,
            line_continuation: None,
            decorator_prefix: None,
            opaque_inside_brackets: false,
        })
        .unwrap();
        let scanner = LineScanner::new(&binding);
        let states = scanner.scan_all("a = 1 ###\n(still comment\n### b = (\n");
        assert_eq!(states[0].context, LineContext::BlockComment);
        assert_eq!(states[1].context, LineContext::BlockComment);
        assert_eq!(states[2].context, LineContext::None);
        // Brackets are not counted by this binding.
        assert_eq!(states[2].brackets, BracketDepth::default());
    }

    #[test]
    fn test_split_lines_keeps_terminators() {
        assert_eq!(split_lines("a\r\nb\nc"), vec!["a\r\n", "b\n", "c"]);
        assert_eq!(split_lines(""), Vec::<&str>::new());
        assert_eq!(strip_terminator("a\r\n"), "a");
        assert_eq!(leading_whitespace(" \t x"), " \t ");
    }
}
