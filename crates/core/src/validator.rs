//! Round-trip validator
//!
//! Flattens an outline tree back into text and compares it with the source
//! under a light normalization: trailing blank lines collapse to a single
//! newline, whitespace-only lines become bare newlines, and comment-only lines lose
//! their indentation.

use crate::bindings::CompiledBinding;
use crate::models::{MismatchDetail, OutputNode, OutputTree};
use crate::scanner::{is_blank, split_lines};
use log::warn;
use thiserror::Error;

/// Round-trip failure with the first differing line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("round-trip mismatch at line {}: expected {:?}, got {:?}", .0.line + 1, .0.expected, .0.actual)]
pub struct ImportMismatch(pub MismatchDetail);

impl ImportMismatch {
    pub fn detail(&self) -> &MismatchDetail {
        &self.0
    }
}

/// One flattened line and the pre-order index of the node that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatLine {
    pub text: String,
    pub node: usize,
}

/// Flatten the tree into lines, substituting each child marker with the
/// flattened children.
pub fn flatten_lines(tree: &OutputTree) -> Vec<FlatLine> {
    let mut out = Vec::new();
    let mut next_id = 0;
    flatten_node(&tree.root, &mut next_id, &mut out);
    out
}

/// Flatten the tree into text
pub fn flatten(tree: &OutputTree) -> String {
    flatten_lines(tree).into_iter().map(|line| line.text).collect()
}

fn flatten_node(node: &OutputNode, next_id: &mut usize, out: &mut Vec<FlatLine>) {
    let id = *next_id;
    *next_id += 1;

    for (index, line) in node.body.iter().enumerate() {
        if node.child_marker == Some(index) {
            for child in &node.children {
                flatten_node(child, next_id, out);
            }
            continue;
        }
        let text = match node.short_indents.get(&index) {
            Some(prefix) => format!("{}{}", prefix, line),
            None if node.indent.is_empty() || is_blank(line) => line.clone(),
            None => format!("{}{}", node.indent, line),
        };
        out.push(FlatLine { text, node: id });
    }

    // Children of a node without a marker still belong to the text.
    if node.child_marker.is_none() {
        for child in &node.children {
            flatten_node(child, next_id, out);
        }
    }
}

/// Normalize text into comparable lines
pub fn normalize(text: &str, binding: &CompiledBinding) -> Vec<String> {
    let trimmed = text.trim_end();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let text = format!("{}\n", trimmed);
    split_lines(&text)
        .into_iter()
        .map(|line| {
            if is_blank(line) {
                "\n".to_string()
            } else if binding.is_comment_line(line) {
                line.trim_start().to_string()
            } else {
                line.to_string()
            }
        })
        .collect()
}

/// Checks that an outline tree reproduces its source text
#[derive(Debug, Clone, Copy)]
pub struct RoundTripValidator<'a> {
    binding: &'a CompiledBinding,
}

impl<'a> RoundTripValidator<'a> {
    pub fn new(binding: &'a CompiledBinding) -> Self {
        Self { binding }
    }

    /// True iff the tree flattens back to `original`
    pub fn check(&self, original: &str, tree: &OutputTree) -> bool {
        self.verify(original, tree).is_ok()
    }

    /// Compare `original` with the flattened tree, reporting the first difference
    pub fn verify(&self, original: &str, tree: &OutputTree) -> Result<(), ImportMismatch> {
        let flat = flatten_lines(tree);
        let reconstructed: String = flat.iter().map(|line| line.text.as_str()).collect();

        let expected = normalize(original, self.binding);
        let actual = normalize(&reconstructed, self.binding);

        let Some(line) = (0..expected.len().max(actual.len()))
            .find(|&i| expected.get(i) != actual.get(i))
        else {
            return Ok(());
        };

        let node = flat
            .get(line)
            .and_then(|flat_line| tree.index.get(flat_line.node))
            .map(|entry| entry.headline.clone());
        let mismatch = ImportMismatch(MismatchDetail {
            line,
            expected: expected.get(line).cloned(),
            actual: actual.get(line).cloned(),
            node,
        });
        warn!("{}: {}", tree.root.headline, mismatch);
        Err(mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::python;
    use crate::builder::{import_source, ImportOptions};
    use crate::models::NodeKind;

    fn binding() -> CompiledBinding {
        CompiledBinding::compile(python()).unwrap()
    }

    #[test]
    fn test_flatten_restores_indentation() {
        let b = binding();
        let text = "class A:\n    def m(self):\n        s = '''\ntext\n'''\n        return s\n\n\nx = 1\n";
        let tree = import_source(text, &b, &ImportOptions::default());
        assert_eq!(flatten(&tree), text);
        assert!(RoundTripValidator::new(&b).check(text, &tree));
    }

    #[test]
    fn test_marker_lookalike_is_kept() {
        let b = binding();
        let text = "def f():\n    s = '''\n@others\n'''\n";
        let tree = import_source(text, &b, &ImportOptions::default());
        assert_eq!(flatten(&tree), text);
    }

    #[test]
    fn test_normalize() {
        let b = binding();
        assert_eq!(
            normalize("x = 1\n   \n    # note\n\n\n\n", &b),
            vec!["x = 1\n", "\n", "# note\n"]
        );
        assert_eq!(normalize("x = 1", &b), vec!["x = 1\n"]);
        assert!(normalize("\n\n", &b).is_empty());
    }

    #[test]
    fn test_mismatch_reports_first_difference() {
        let b = binding();
        let mut tree = import_source("def f():\n    return 1\n", &b, &ImportOptions::default());
        tree.root.children[0].body[1] = "    return 2\n".to_string();

        let err = RoundTripValidator::new(&b)
            .verify("def f():\n    return 1\n", &tree)
            .unwrap_err();
        assert_eq!(err.detail().line, 1);
        assert_eq!(err.detail().expected.as_deref(), Some("    return 1\n"));
        assert_eq!(err.detail().actual.as_deref(), Some("    return 2\n"));
        assert_eq!(err.detail().node.as_deref(), Some("f"));
    }

    #[test]
    fn test_missing_lines_are_reported() {
        let b = binding();
        let tree = OutputTree::new("python", 0, OutputNode::new(NodeKind::Root, "<root>", 1));
        let err = RoundTripValidator::new(&b).verify("x = 1\n", &tree).unwrap_err();
        assert_eq!(err.detail().line, 0);
        assert_eq!(err.detail().actual, None);
        assert!(err.to_string().contains("line 1"));
    }
}
