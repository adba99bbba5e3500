//! Language bindings for the line scanner
//!
//! A binding is pure data: comment markers, string delimiters, bracket
//! characters and block-introducer keywords. Registering a binding validates
//! it and compiles it into a per-character transition table plus the regexes
//! used by the block policy and the headline synthesizer.

mod python;
mod registry;

pub use python::python;
pub use registry::LanguageRegistry;

use crate::models::{Bracket, BlockKind};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Bindings every registry starts with
pub fn builtins() -> Vec<LanguageBinding> {
    vec![python()]
}

/// Binding misconfiguration, reported at registration time
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("Binding has an empty id")]
    EmptyId,

    #[error("Binding '{0}' has an indent width of zero")]
    ZeroIndentWidth(String),

    #[error("Binding '{language}' has an empty {what}")]
    EmptyMarker { language: String, what: &'static str },

    #[error("Binding '{language}' uses marker '{marker}' more than once")]
    DuplicateMarker { language: String, marker: String },

    #[error("Binding '{language}': marker '{marker}' can never match, '{by}' is checked first")]
    ShadowedMarker {
        language: String,
        marker: String,
        by: String,
    },

    #[error("Binding '{language}': invalid block introducer '{keyword}': {reason}")]
    InvalidIntroducer {
        language: String,
        keyword: String,
        reason: String,
    },

    #[error("Binding '{language}': invalid decorator prefix '{prefix}'")]
    InvalidDecoratorPrefix { language: String, prefix: String },
}

/// A string delimiter and whether it opens a triple-quoted (multi-line) string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringDelimiter {
    pub marker: String,
    #[serde(default)]
    pub triple: bool,
}

impl StringDelimiter {
    pub fn single(marker: &str) -> Self {
        Self {
            marker: marker.to_string(),
            triple: false,
        }
    }

    pub fn triple(marker: &str) -> Self {
        Self {
            marker: marker.to_string(),
            triple: true,
        }
    }
}

/// A keyword that introduces a named, indented block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Introducer {
    /// Keyword, possibly several words (`async def`)
    pub keyword: String,
    pub kind: BlockKind,
}

impl Introducer {
    pub fn new(keyword: &str, kind: BlockKind) -> Self {
        Self {
            keyword: keyword.to_string(),
            kind,
        }
    }
}

/// Data record describing one source grammar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageBinding {
    /// Language id used by the registry (`python`)
    pub id: String,

    /// File extensions handled by this binding, without the dot
    #[serde(default)]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub single_line_comment: Option<String>,

    /// Opening and closing block comment delimiters
    #[serde(default)]
    pub block_comment: Option<(String, String)>,

    /// String delimiters in precedence order; longer markers must come first
    #[serde(default)]
    pub string_delimiters: Vec<StringDelimiter>,

    /// Block introducers in precedence order
    #[serde(default)]
    pub block_introducers: Vec<Introducer>,

    /// Bracket families that count toward bracket depth
    #[serde(default = "default_brackets")]
    pub brackets: Vec<Bracket>,

    /// Columns per tab stop
    #[serde(default = "default_indent_width")]
    pub indent_width: usize,

    /// Escape character inside strings
    #[serde(default)]
    pub escape: Option<char>,

    /// Line continuation character (must be the last character of the line)
    #[serde(default)]
    pub line_continuation: Option<char>,

    /// Prefix of decorator/annotation lines
    #[serde(default)]
    pub decorator_prefix: Option<String>,

    /// Treat lines inside open brackets as opaque
    #[serde(default = "default_true")]
    pub opaque_inside_brackets: bool,
}

fn default_brackets() -> Vec<Bracket> {
    vec![Bracket::Curly, Bracket::Paren, Bracket::Square]
}

fn default_indent_width() -> usize {
    4
}

fn default_true() -> bool {
    true
}

/// What happens when the scanner meets a marker outside any context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    LineComment,
    BlockComment,
    /// Opens the string delimiter at this index
    String { index: usize, triple: bool },
    Bracket { bracket: Bracket, opening: bool },
}

#[derive(Debug, Clone)]
pub struct TransitionEntry {
    pub marker: String,
    pub transition: Transition,
}

#[derive(Debug, Clone)]
struct CompiledIntroducer {
    kind: BlockKind,
    matcher: Regex,
    headline: Regex,
}

/// A validated binding with its transition table and regexes
#[derive(Debug, Clone)]
pub struct CompiledBinding {
    binding: LanguageBinding,
    table: HashMap<char, Vec<TransitionEntry>>,
    introducers: Vec<CompiledIntroducer>,
    decorator: Option<Regex>,
}

impl CompiledBinding {
    /// Validate and compile a binding
    pub fn compile(binding: LanguageBinding) -> Result<Self, BindingError> {
        let language = binding.id.clone();
        if language.trim().is_empty() {
            return Err(BindingError::EmptyId);
        }
        if binding.indent_width == 0 {
            return Err(BindingError::ZeroIndentWidth(language));
        }

        let entries = opener_entries(&binding)?;
        check_precedence(&language, &entries)?;

        let mut table: HashMap<char, Vec<TransitionEntry>> = HashMap::new();
        for entry in entries {
            if let Some(first) = entry.marker.chars().next() {
                table.entry(first).or_default().push(entry);
            }
        }

        let introducers = binding
            .block_introducers
            .iter()
            .map(|intro| compile_introducer(&language, intro))
            .collect::<Result<Vec<_>, _>>()?;

        let decorator = match &binding.decorator_prefix {
            Some(prefix) if prefix.trim().is_empty() || prefix.chars().any(char::is_whitespace) => {
                return Err(BindingError::InvalidDecoratorPrefix {
                    language,
                    prefix: prefix.clone(),
                })
            }
            Some(prefix) => {
                let pattern = format!(r"^[ \t]*{}\s*(?P<name>[\w.]*)", regex::escape(prefix));
                Some(Regex::new(&pattern).map_err(|_| BindingError::InvalidDecoratorPrefix {
                    language: language.clone(),
                    prefix: prefix.clone(),
                })?)
            }
            None => None,
        };

        Ok(Self {
            binding,
            table,
            introducers,
            decorator,
        })
    }

    pub fn id(&self) -> &str {
        &self.binding.id
    }

    pub fn binding(&self) -> &LanguageBinding {
        &self.binding
    }

    /// Transitions whose marker starts with `c`, in precedence order
    pub fn transitions(&self, c: char) -> &[TransitionEntry] {
        self.table.get(&c).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn string_delimiter(&self, index: usize) -> Option<&str> {
        self.binding
            .string_delimiters
            .get(index)
            .map(|d| d.marker.as_str())
    }

    pub fn block_comment_close(&self) -> Option<&str> {
        self.binding.block_comment.as_ref().map(|(_, close)| close.as_str())
    }

    /// Kind of the first introducer matching the line
    pub fn match_introducer(&self, line: &str) -> Option<BlockKind> {
        self.introducers
            .iter()
            .find(|intro| intro.matcher.is_match(line))
            .map(|intro| intro.kind)
    }

    /// Headline captures for an introducer line: `name`, and `bases` at the
    /// opening parenthesis of a base list
    pub fn introducer_captures<'t>(&self, line: &'t str) -> Option<(BlockKind, Captures<'t>)> {
        self.introducers
            .iter()
            .find_map(|intro| intro.headline.captures(line).map(|caps| (intro.kind, caps)))
    }

    pub fn is_decorator(&self, line: &str) -> bool {
        self.decorator
            .as_ref()
            .is_some_and(|re| re.is_match(line))
    }

    /// Prefix plus dotted name of a decorator line (`@functools.wraps`)
    pub fn decorator_name(&self, line: &str) -> Option<String> {
        let re = self.decorator.as_ref()?;
        let caps = re.captures(line)?;
        let prefix = self.binding.decorator_prefix.as_deref().unwrap_or_default();
        let name = caps.name("name").map(|m| m.as_str()).unwrap_or_default();
        Some(format!("{}{}", prefix, name))
    }

    /// True for a line holding nothing but a comment
    pub fn is_comment_line(&self, line: &str) -> bool {
        let stripped = line.trim_start();
        if let Some(marker) = &self.binding.single_line_comment {
            if stripped.starts_with(marker.as_str()) {
                return true;
            }
        }
        if let Some((open, _)) = &self.binding.block_comment {
            if stripped.starts_with(open.as_str()) {
                return true;
            }
        }
        false
    }
}

/// Every marker recognized outside a context, in the order the scanner tries them
fn opener_entries(binding: &LanguageBinding) -> Result<Vec<TransitionEntry>, BindingError> {
    let language = &binding.id;
    let empty = |what| BindingError::EmptyMarker {
        language: language.clone(),
        what,
    };

    let mut entries = Vec::new();
    if let Some((open, close)) = &binding.block_comment {
        if open.is_empty() {
            return Err(empty("block comment opener"));
        }
        if close.is_empty() {
            return Err(empty("block comment closer"));
        }
        entries.push(TransitionEntry {
            marker: open.clone(),
            transition: Transition::BlockComment,
        });
    }
    if let Some(marker) = &binding.single_line_comment {
        if marker.is_empty() {
            return Err(empty("line comment marker"));
        }
        entries.push(TransitionEntry {
            marker: marker.clone(),
            transition: Transition::LineComment,
        });
    }
    for (index, delim) in binding.string_delimiters.iter().enumerate() {
        if delim.marker.is_empty() {
            return Err(empty("string delimiter"));
        }
        entries.push(TransitionEntry {
            marker: delim.marker.clone(),
            transition: Transition::String {
                index,
                triple: delim.triple,
            },
        });
    }
    for bracket in &binding.brackets {
        let (open, close) = match bracket {
            Bracket::Curly => ("{", "}"),
            Bracket::Paren => ("(", ")"),
            Bracket::Square => ("[", "]"),
        };
        entries.push(TransitionEntry {
            marker: open.to_string(),
            transition: Transition::Bracket {
                bracket: *bracket,
                opening: true,
            },
        });
        entries.push(TransitionEntry {
            marker: close.to_string(),
            transition: Transition::Bracket {
                bracket: *bracket,
                opening: false,
            },
        });
    }
    Ok(entries)
}

/// Reject markers that repeat or that an earlier marker always pre-empts.
///
/// Repeats are reported before shadowing, whatever their position.
fn check_precedence(language: &str, entries: &[TransitionEntry]) -> Result<(), BindingError> {
    for (j, later) in entries.iter().enumerate() {
        if entries[..j].iter().any(|earlier| earlier.marker == later.marker) {
            return Err(BindingError::DuplicateMarker {
                language: language.to_string(),
                marker: later.marker.clone(),
            });
        }
    }
    for (j, later) in entries.iter().enumerate() {
        if let Some(earlier) = entries[..j]
            .iter()
            .find(|earlier| later.marker.starts_with(earlier.marker.as_str()))
        {
            return Err(BindingError::ShadowedMarker {
                language: language.to_string(),
                marker: later.marker.clone(),
                by: earlier.marker.clone(),
            });
        }
    }
    Ok(())
}

fn compile_introducer(language: &str, intro: &Introducer) -> Result<CompiledIntroducer, BindingError> {
    let invalid = |reason: &str| BindingError::InvalidIntroducer {
        language: language.to_string(),
        keyword: intro.keyword.clone(),
        reason: reason.to_string(),
    };

    if intro.kind == BlockKind::Decorator {
        return Err(invalid("decorator is not an introducer kind"));
    }
    let words: Vec<String> = intro
        .keyword
        .split_whitespace()
        .map(regex::escape)
        .collect();
    if words.is_empty() {
        return Err(invalid("keyword is empty"));
    }
    let keyword = words.join(r"\s+");

    let matcher = Regex::new(&format!(r"^[ \t]*{}\s+", keyword)).map_err(|e| invalid(&e.to_string()))?;
    let headline = Regex::new(&format!(
        r"^[ \t]*{}\s+(?P<name>\w+)\s*(?P<bases>\()?",
        keyword
    ))
    .map_err(|e| invalid(&e.to_string()))?;

    Ok(CompiledIntroducer {
        kind: intro.kind,
        matcher,
        headline,
    })
}
