//! Locate the first named block in a text

use crate::bindings::CompiledBinding;
use crate::models::{BlockKind, ScanState};
use crate::policy::is_opaque;
use crate::scanner::{split_lines, LineScanner};
use serde::Serialize;

/// Byte and line span of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockSpan {
    pub kind: BlockKind,
    /// Byte offset of the introducer line (or its first decorator)
    pub start: usize,
    /// Byte offset just past the block
    pub end: usize,
    /// First line of the block (1-indexed)
    pub start_line: usize,
    /// Last line of the block (1-indexed)
    pub end_line: usize,
}

impl BlockSpan {
    /// Slice the block out of the text it was found in
    pub fn slice<'t>(&self, text: &'t str) -> &'t str {
        &text[self.start..self.end]
    }
}

/// Find the first introducer line outside any string or comment, and the
/// extent of its block.
///
/// Decorator lines directly above the introducer are part of the block. The
/// block ends before the first later line that is not opaque and whose
/// indent is not greater than the introducer's.
pub fn find_block(text: &str, binding: &CompiledBinding) -> Option<BlockSpan> {
    let scanner = LineScanner::new(binding);
    let lines = split_lines(text);

    let mut prev = ScanState::default();
    let mut offset = 0;
    let mut decorators: Option<(usize, usize)> = None;
    let mut found: Option<(BlockKind, usize, usize, ScanState)> = None;

    for (i, line) in lines.iter().enumerate() {
        let state = scanner.scan(line, &prev);
        let opaque = is_opaque(line, &prev, binding);

        let current = found;
        match current {
            None if !opaque => {
                if let Some(kind) = binding.match_introducer(line) {
                    let (start, start_line) = decorators.unwrap_or((offset, i + 1));
                    found = Some((kind, start, start_line, state));
                } else if binding.is_decorator(line) {
                    decorators.get_or_insert((offset, i + 1));
                } else {
                    decorators = None;
                }
            }
            Some((kind, start, start_line, intro)) if !opaque && state.indent <= intro.indent => {
                return Some(BlockSpan {
                    kind,
                    start,
                    end: offset,
                    start_line,
                    end_line: i,
                });
            }
            _ => {}
        }

        offset += line.len();
        prev = state;
    }

    found.map(|(kind, start, start_line, _)| BlockSpan {
        kind,
        start,
        end: text.len(),
        start_line,
        end_line: lines.len(),
    })
}
