//! Block boundary policy
//!
//! Decides, for each line, whether it continues the frame on top of the
//! builder's stack, opens a new frame, or closes frames first. The cases are
//! evaluated in a fixed precedence order:
//!
//! 1. opaque lines (inside a string, comment, continuation or open bracket,
//!    blank lines and comment-only lines) are appended to the top frame;
//! 2. block introducers open a named block, unless they are nested inside a
//!    block of the same kind or complete a pending decorator frame;
//! 3. lines indented past the top frame's baseline stay in that frame, or
//!    open an organizer when the top frame is the root;
//! 4. lines level with an organizer's baseline join the organizer;
//! 5. anything else closes frames and opens a fresh organizer.

use crate::bindings::CompiledBinding;
use crate::models::{BlockKind, NodeKind, ScanState};
use crate::scanner::is_blank;
use std::fmt;

/// Kind of an open builder frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Root,
    Organizer,
    NamedBlock(BlockKind),
}

impl TargetKind {
    pub fn node_kind(&self) -> NodeKind {
        match self {
            TargetKind::Root => NodeKind::Root,
            TargetKind::Organizer => NodeKind::Organizer,
            TargetKind::NamedBlock(kind) => (*kind).into(),
        }
    }
}

/// What the policy sees of the frame on top of the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub kind: TargetKind,
    /// Indent of the line that opened the frame
    pub indent: usize,
}

/// Why a line was appended to the top frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendReason {
    Opaque,
    NestedIntroducer,
    NestedDecorator,
    PendingDecorator,
    Indented,
    Organizer,
}

/// Decision for one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAction {
    /// Append to the frame on top of the stack
    Append(AppendReason),
    /// The top frame is a pending decorator run; this introducer completes it
    JoinIntroducer(BlockKind),
    /// Close frames, then open a named block (a decorator run for `Decorator`)
    OpenBlock(BlockKind),
    /// Open an organizer directly under the root, closing nothing
    OpenRootOrganizer,
    /// Close frames, then open an organizer
    OpenOrganizer,
}

impl fmt::Display for LineAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineAction::Append(reason) => write!(f, "append ({:?})", reason),
            LineAction::JoinIntroducer(kind) => write!(f, "join {}", kind.label()),
            LineAction::OpenBlock(kind) => write!(f, "open {}", kind.label()),
            LineAction::OpenRootOrganizer => write!(f, "open organizer under root"),
            LineAction::OpenOrganizer => write!(f, "open organizer"),
        }
    }
}

/// True if the line cannot start or end a block
pub fn is_opaque(line: &str, prev: &ScanState, binding: &CompiledBinding) -> bool {
    !prev.context.is_none()
        || prev.continuation
        || (binding.binding().opaque_inside_brackets && prev.brackets.any_open())
        || is_blank(line)
        || binding.is_comment_line(line)
}

/// Classify `line` given the previous line's state, the line's own state and
/// the top frame.
pub fn classify(
    line: &str,
    prev: &ScanState,
    state: &ScanState,
    top: Frame,
    binding: &CompiledBinding,
) -> LineAction {
    if is_opaque(line, prev, binding) {
        return LineAction::Append(AppendReason::Opaque);
    }

    if let Some(kind) = binding.match_introducer(line) {
        return match top.kind {
            TargetKind::NamedBlock(open) if open == kind && state.indent > top.indent => {
                LineAction::Append(AppendReason::NestedIntroducer)
            }
            TargetKind::NamedBlock(BlockKind::Decorator) if state.indent == top.indent => {
                LineAction::JoinIntroducer(kind)
            }
            _ => LineAction::OpenBlock(kind),
        };
    }

    if binding.is_decorator(line) {
        return match top.kind {
            TargetKind::NamedBlock(BlockKind::Decorator) if state.indent == top.indent => {
                LineAction::Append(AppendReason::PendingDecorator)
            }
            TargetKind::NamedBlock(BlockKind::Callable) if state.indent > top.indent => {
                LineAction::Append(AppendReason::NestedDecorator)
            }
            _ => LineAction::OpenBlock(BlockKind::Decorator),
        };
    }

    if state.indent > top.indent {
        return match top.kind {
            TargetKind::Root => LineAction::OpenRootOrganizer,
            _ => LineAction::Append(AppendReason::Indented),
        };
    }

    if state.indent == top.indent && top.kind == TargetKind::Organizer {
        return LineAction::Append(AppendReason::Organizer);
    }

    LineAction::OpenOrganizer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::python;
    use crate::models::LineContext;

    fn binding() -> CompiledBinding {
        CompiledBinding::compile(python()).unwrap()
    }

    fn at(indent: usize) -> ScanState {
        ScanState {
            indent,
            ..ScanState::default()
        }
    }

    fn frame(kind: TargetKind, indent: usize) -> Frame {
        Frame { kind, indent }
    }

    const ROOT: Frame = Frame {
        kind: TargetKind::Root,
        indent: 0,
    };

    #[test]
    fn test_opaque_lines() {
        let b = binding();
        let in_string = ScanState {
            context: LineContext::TripleQuoteString(0),
            ..ScanState::default()
        };
        assert_eq!(
            classify("def f():\n", &in_string, &at(0), ROOT, &b),
            LineAction::Append(AppendReason::Opaque)
        );
        assert_eq!(
            classify("\n", &at(0), &at(0), ROOT, &b),
            LineAction::Append(AppendReason::Opaque)
        );
        assert_eq!(
            classify("    # note\n", &at(0), &at(4), ROOT, &b),
            LineAction::Append(AppendReason::Opaque)
        );

        let mut open_paren = at(0);
        open_paren.brackets.paren = 1;
        assert_eq!(
            classify("def = 1)\n", &open_paren, &at(0), ROOT, &b),
            LineAction::Append(AppendReason::Opaque)
        );
    }

    #[test]
    fn test_open_brackets_not_opaque_when_disabled() {
        let mut raw = python();
        raw.opaque_inside_brackets = false;
        let b = CompiledBinding::compile(raw).unwrap();
        let mut open_paren = at(0);
        open_paren.brackets.paren = 1;
        assert_eq!(
            classify("x = 1\n", &open_paren, &at(0), ROOT, &b),
            LineAction::OpenOrganizer
        );
    }

    #[test]
    fn test_introducers() {
        let b = binding();
        assert_eq!(
            classify("def f():\n", &at(0), &at(0), ROOT, &b),
            LineAction::OpenBlock(BlockKind::Callable)
        );

        let callable = frame(TargetKind::NamedBlock(BlockKind::Callable), 0);
        assert_eq!(
            classify("    def g():\n", &at(4), &at(4), callable, &b),
            LineAction::Append(AppendReason::NestedIntroducer)
        );
        assert_eq!(
            classify("def h():\n", &at(4), &at(0), callable, &b),
            LineAction::OpenBlock(BlockKind::Callable)
        );

        let class = frame(TargetKind::NamedBlock(BlockKind::Type), 0);
        assert_eq!(
            classify("    def m(self):\n", &at(4), &at(4), class, &b),
            LineAction::OpenBlock(BlockKind::Callable)
        );

        let pending = frame(TargetKind::NamedBlock(BlockKind::Decorator), 4);
        assert_eq!(
            classify("    def p(self):\n", &at(4), &at(4), pending, &b),
            LineAction::JoinIntroducer(BlockKind::Callable)
        );
    }

    #[test]
    fn test_decorators() {
        let b = binding();
        assert_eq!(
            classify("@cached\n", &at(0), &at(0), ROOT, &b),
            LineAction::OpenBlock(BlockKind::Decorator)
        );

        let pending = frame(TargetKind::NamedBlock(BlockKind::Decorator), 0);
        assert_eq!(
            classify("@other\n", &at(0), &at(0), pending, &b),
            LineAction::Append(AppendReason::PendingDecorator)
        );

        let callable = frame(TargetKind::NamedBlock(BlockKind::Callable), 0);
        assert_eq!(
            classify("    @wraps(f)\n", &at(4), &at(4), callable, &b),
            LineAction::Append(AppendReason::NestedDecorator)
        );
    }

    #[test]
    fn test_indent_and_organizer_cases() {
        let b = binding();
        assert_eq!(
            classify("    x = 1\n", &at(0), &at(4), ROOT, &b),
            LineAction::OpenRootOrganizer
        );

        let callable = frame(TargetKind::NamedBlock(BlockKind::Callable), 0);
        assert_eq!(
            classify("    return 1\n", &at(0), &at(4), callable, &b),
            LineAction::Append(AppendReason::Indented)
        );

        let organizer = frame(TargetKind::Organizer, 0);
        assert_eq!(
            classify("y = 2\n", &at(0), &at(0), organizer, &b),
            LineAction::Append(AppendReason::Organizer)
        );

        assert_eq!(
            classify("y = 2\n", &at(0), &at(0), ROOT, &b),
            LineAction::OpenOrganizer
        );
        assert_eq!(
            classify("x = 1\n", &at(4), &at(0), callable, &b),
            LineAction::OpenOrganizer
        );
    }
}
