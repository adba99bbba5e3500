//! Data models for outline import
//!
//! This module defines the per-line scan state, the output tree produced by
//! the builder, and the per-file / per-scan reports produced by the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Kind of named block recognized by a block-introducer pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Function-like constructs (`def`, `async def`)
    Callable,
    /// Type-like constructs (`class`)
    Type,
    /// A run of decorator lines still waiting for its introducer
    Decorator,
}

impl BlockKind {
    /// Get human-readable label for the block kind
    pub fn label(&self) -> &'static str {
        match self {
            BlockKind::Callable => "callable",
            BlockKind::Type => "type",
            BlockKind::Decorator => "decorator",
        }
    }
}

/// Kind of a node in the output tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Root,
    Organizer,
    Callable,
    Type,
    Decorator,
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Organizer => "organizer",
            NodeKind::Callable => "callable",
            NodeKind::Type => "type",
            NodeKind::Decorator => "decorator",
        }
    }
}

impl From<BlockKind> for NodeKind {
    fn from(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Callable => NodeKind::Callable,
            BlockKind::Type => NodeKind::Type,
            BlockKind::Decorator => NodeKind::Decorator,
        }
    }
}

/// Lexical context active at a point in the scan.
///
/// At most one context is active at a time; strings and comments never nest.
/// String contexts carry the index of their opening delimiter in the
/// binding's delimiter list so the scanner knows which terminator to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "delimiter")]
pub enum LineContext {
    #[default]
    None,
    LineComment,
    BlockComment,
    SingleQuoteString(usize),
    TripleQuoteString(usize),
}

impl LineContext {
    pub fn is_none(&self) -> bool {
        matches!(self, LineContext::None)
    }
}

/// Which bracket counter a character adjusts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bracket {
    Curly,
    Paren,
    Square,
}

/// Cumulative bracket nesting, one counter per bracket family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BracketDepth {
    pub curly: usize,
    pub paren: usize,
    pub square: usize,
}

impl BracketDepth {
    /// Apply an opening or closing bracket.
    ///
    /// Closing an unopened bracket clamps the counter at zero.
    pub fn apply(&mut self, bracket: Bracket, opening: bool) {
        let counter = match bracket {
            Bracket::Curly => &mut self.curly,
            Bracket::Paren => &mut self.paren,
            Bracket::Square => &mut self.square,
        };
        if opening {
            *counter += 1;
        } else {
            *counter = counter.saturating_sub(1);
        }
    }

    pub fn any_open(&self) -> bool {
        self.curly > 0 || self.paren > 0 || self.square > 0
    }
}

/// Snapshot of the scanner after one line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanState {
    /// Column of the first non-blank character, or the previous line's
    /// indent when the previous line ended with a continuation marker
    pub indent: usize,

    /// Context still open at the end of the line
    pub context: LineContext,

    /// Bracket nesting at the end of the line
    pub brackets: BracketDepth,

    /// True if the line ends with an unescaped continuation marker
    pub continuation: bool,
}

impl ScanState {
    /// True if the next line starts inside a string, comment, bracket or continuation
    pub fn in_context(&self) -> bool {
        !self.context.is_none() || self.brackets.any_open() || self.continuation
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_none() {
            write!(f, "{:?} ", self.context)?;
        }
        write!(f, "indent:{}", self.indent)?;
        if self.brackets.curly > 0 {
            write!(f, "{{{}}}", self.brackets.curly)?;
        }
        if self.brackets.paren > 0 {
            write!(f, "({})", self.brackets.paren)?;
        }
        if self.brackets.square > 0 {
            write!(f, "[{}]", self.brackets.square)?;
        }
        if self.continuation {
            write!(f, " bs-nl")?;
        }
        Ok(())
    }
}

/// A node of the imported outline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputNode {
    /// Short label derived from the node's first line
    pub headline: String,

    /// Kind of construct this node holds
    pub kind: NodeKind,

    /// Source lines owned by this node, terminators included
    pub body: Vec<String>,

    /// Index into `body` of the child-reference marker line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_marker: Option<usize>,

    /// Leading whitespace removed from the body by the post-pass
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub indent: String,

    /// Body lines whose removed prefix differs from `indent`, keyed by body
    /// index (under-indented lines inside the block)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub short_indents: BTreeMap<usize, String>,

    /// First source line owned by this node (1-indexed)
    pub start_line: usize,

    /// Last source line owned by this node or its descendants (1-indexed)
    pub end_line: usize,

    /// Child nodes, in source order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<OutputNode>,
}

impl OutputNode {
    /// Create an empty node starting at `start_line`
    pub fn new(kind: NodeKind, headline: impl Into<String>, start_line: usize) -> Self {
        Self {
            headline: headline.into(),
            kind,
            body: Vec::new(),
            child_marker: None,
            indent: String::new(),
            short_indents: BTreeMap::new(),
            start_line,
            end_line: start_line,
            children: Vec::new(),
        }
    }

    /// Body text as a single string
    pub fn text(&self) -> String {
        self.body.concat()
    }

    /// Count total nodes in this subtree
    pub fn total_nodes(&self) -> usize {
        1 + self.children.iter().map(|c| c.total_nodes()).sum::<usize>()
    }

    /// Flatten the subtree into a pre-order list
    pub fn flatten(&self) -> Vec<&OutputNode> {
        let mut result = vec![self];
        for child in &self.children {
            result.extend(child.flatten());
        }
        result
    }

    /// Find the first node in this subtree with the given headline
    pub fn find(&self, headline: &str) -> Option<&OutputNode> {
        self.flatten().into_iter().find(|n| n.headline == headline)
    }
}

/// Entry of the flat pre-order index kept alongside the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub depth: usize,
    pub headline: String,
    pub kind: NodeKind,
    pub start_line: usize,
    pub end_line: usize,
    pub body_lines: usize,
}

/// The completed outline for one source text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTree {
    /// Id of the language binding used for the import
    pub language: String,

    /// Number of lines in the imported text
    pub line_count: usize,

    /// Root node owning the whole file
    pub root: OutputNode,

    /// Pre-order index of every node, root first
    pub index: Vec<IndexEntry>,
}

impl OutputTree {
    /// Freeze a finished root node into a tree and build its index
    pub fn new(language: impl Into<String>, line_count: usize, root: OutputNode) -> Self {
        let mut index = Vec::new();
        build_index(&root, 0, &mut index);
        Self {
            language: language.into(),
            line_count,
            root,
            index,
        }
    }

    /// Total nodes, root included
    pub fn total_nodes(&self) -> usize {
        self.index.len()
    }

    /// Find the first node with the given headline
    pub fn find(&self, headline: &str) -> Option<&OutputNode> {
        self.root.find(headline)
    }
}

fn build_index(node: &OutputNode, depth: usize, index: &mut Vec<IndexEntry>) {
    index.push(IndexEntry {
        depth,
        headline: node.headline.clone(),
        kind: node.kind,
        start_line: node.start_line,
        end_line: node.end_line,
        body_lines: node.body.len(),
    });
    for child in &node.children {
        build_index(child, depth + 1, index);
    }
}

/// First difference found by the round-trip validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchDetail {
    /// Index of the first differing normalized line (0-indexed)
    pub line: usize,

    /// Normalized line from the original text (None past its end)
    pub expected: Option<String>,

    /// Normalized line from the flattened tree (None past its end)
    pub actual: Option<String>,

    /// Headline of the node that produced the flattened line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

/// Import result for a single file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileImport {
    /// Path relative to the scan root
    pub path: PathBuf,

    /// Absolute path to the source file
    pub absolute_path: PathBuf,

    /// Language binding id
    pub language: String,

    /// Total number of lines in the file
    pub total_lines: usize,

    /// True if the tree flattens back to the file
    pub perfect: bool,

    /// First round-trip difference, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mismatch: Option<MismatchDetail>,

    /// Imported outline
    pub tree: OutputTree,
}

impl FileImport {
    /// Total nodes below the root
    pub fn total_nodes(&self) -> usize {
        self.tree.total_nodes().saturating_sub(1)
    }
}

/// Summary statistics for a scan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportStats {
    pub total_files: usize,
    pub total_lines: usize,
    pub total_nodes: usize,
    pub perfect_imports: usize,
    pub failed_imports: usize,

    /// Files per language id
    pub files_per_language: BTreeMap<String, usize>,
}

impl ImportStats {
    /// Accumulate one file into the statistics
    pub fn add_file(&mut self, file: &FileImport) {
        self.total_files += 1;
        self.total_lines += file.total_lines;
        self.total_nodes += file.total_nodes();
        if file.perfect {
            self.perfect_imports += 1;
        } else {
            self.failed_imports += 1;
        }
        *self
            .files_per_language
            .entry(file.language.clone())
            .or_insert(0) += 1;
    }
}

/// Metadata about the scan operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanMetadata {
    /// Duration of scan in milliseconds
    pub scan_duration_ms: u64,

    /// Files processed per second
    pub files_per_second: f64,

    /// ISO timestamp of scan
    pub timestamp: String,

    /// Tool version
    pub tool_version: String,
}

impl Default for ScanMetadata {
    fn default() -> Self {
        Self {
            scan_duration_ms: 0,
            files_per_second: 0.0,
            timestamp: chrono::Utc::now().to_rfc3339(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Files of one language, with totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageSection {
    pub language: String,
    pub files: Vec<FileImport>,
    pub file_count: usize,
    pub total_nodes: usize,
    pub total_lines: usize,
    pub failed_imports: usize,
}

impl LanguageSection {
    pub fn new(language: &str, files: Vec<FileImport>) -> Self {
        let file_count = files.len();
        let total_nodes = files.iter().map(|f| f.total_nodes()).sum();
        let total_lines = files.iter().map(|f| f.total_lines).sum();
        let failed_imports = files.iter().filter(|f| !f.perfect).count();

        Self {
            language: language.to_string(),
            files,
            file_count,
            total_nodes,
            total_lines,
            failed_imports,
        }
    }
}

/// Scan result grouped by language id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupedImportMap {
    pub root: PathBuf,
    pub languages: Vec<LanguageSection>,
    pub metadata: ScanMetadata,
}

/// Flat scan result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportMap {
    /// Scan root directory
    pub root: PathBuf,

    /// Every imported file
    pub files: Vec<FileImport>,

    /// Summary statistics
    pub stats: ImportStats,

    /// Scan metadata
    pub metadata: ScanMetadata,
}

impl ImportMap {
    /// Convert to grouped format, one section per language id
    pub fn to_grouped(&self) -> GroupedImportMap {
        let mut by_language: BTreeMap<&str, Vec<FileImport>> = BTreeMap::new();
        for file in &self.files {
            by_language
                .entry(file.language.as_str())
                .or_default()
                .push(file.clone());
        }

        GroupedImportMap {
            root: self.root.clone(),
            languages: by_language
                .into_iter()
                .map(|(language, files)| LanguageSection::new(language, files))
                .collect(),
            metadata: self.metadata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracket_depth_clamps_at_zero() {
        let mut depth = BracketDepth::default();
        depth.apply(Bracket::Paren, false);
        assert_eq!(depth.paren, 0);
        depth.apply(Bracket::Paren, true);
        depth.apply(Bracket::Square, true);
        assert!(depth.any_open());
        depth.apply(Bracket::Paren, false);
        depth.apply(Bracket::Square, false);
        depth.apply(Bracket::Square, false);
        assert_eq!(depth, BracketDepth::default());
    }

    #[test]
    fn test_scan_state_display() {
        let state = ScanState {
            indent: 4,
            context: LineContext::None,
            brackets: BracketDepth {
                curly: 0,
                paren: 2,
                square: 0,
            },
            continuation: true,
        };
        assert_eq!(state.to_string(), "indent:4(2) bs-nl");
        assert!(state.in_context());
        assert!(!ScanState::default().in_context());
    }

    #[test]
    fn test_tree_index_is_preorder() {
        let mut root = OutputNode::new(NodeKind::Root, "root", 1);
        let mut class = OutputNode::new(NodeKind::Type, "A", 1);
        class.children.push(OutputNode::new(NodeKind::Callable, "m", 2));
        root.children.push(class);
        root.children.push(OutputNode::new(NodeKind::Organizer, "Organizer: x = 1", 4));

        let tree = OutputTree::new("python", 4, root);
        let headlines: Vec<_> = tree.index.iter().map(|e| (e.depth, e.headline.as_str())).collect();
        assert_eq!(
            headlines,
            vec![(0, "root"), (1, "A"), (2, "m"), (1, "Organizer: x = 1")]
        );
        assert_eq!(tree.total_nodes(), 4);
        assert!(tree.find("m").is_some());
    }
}
