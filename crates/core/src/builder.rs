//! Stack-based tree builder
//!
//! Folds the lines of a source text into an [`OutputTree`]. The builder keeps
//! a stack of open frames (never empty, root at the bottom); each line is
//! scanned, classified by the policy, and then appended to the top frame or
//! used to open a new frame after closing the frames it ends.

use crate::bindings::CompiledBinding;
use crate::headline;
use crate::models::{BlockKind, NodeKind, OutputNode, OutputTree, ScanState};
use crate::policy::{self, AppendReason, Frame, LineAction, TargetKind};
use crate::scanner::{is_blank, leading_whitespace, split_lines, strip_terminator, LineScanner};
use log::{debug, trace};

/// Text of the child-reference marker line, after its indentation
pub const CHILD_MARKER: &str = "@others";

/// Headline given to the root node unless the caller supplies one
pub const DEFAULT_ROOT_HEADLINE: &str = "<root>";

/// Options for a single import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Prefix named-block headlines with their decorator names
    pub include_decorators_in_headline: bool,

    /// Tab width override; the binding's indent width when unset
    pub tab_width: Option<usize>,

    /// Root headline override, usually the file name
    pub root_headline: Option<String>,
}

impl ImportOptions {
    pub fn with_decorators(mut self, include: bool) -> Self {
        self.include_decorators_in_headline = include;
        self
    }

    pub fn with_tab_width(mut self, tab_width: usize) -> Self {
        self.tab_width = Some(tab_width);
        self
    }

    pub fn with_root_headline(mut self, headline: impl Into<String>) -> Self {
        self.root_headline = Some(headline.into());
        self
    }
}

/// One open frame of the builder's stack
#[derive(Debug, Clone)]
pub struct Target {
    pub node: OutputNode,
    /// State of the line that opened the frame
    pub state: ScanState,
    pub kind: TargetKind,
    pub child_marker_emitted: bool,
    /// Decorators appended inside a callable that may still belong to a
    /// nested definition of another kind
    pub decorator_run: Option<DecoratorRun>,
}

/// Decorator lines at the tail of a frame's body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoratorRun {
    /// Body index of the first decorator line
    pub body_start: usize,
    /// Source line number of the first decorator line
    pub line: usize,
    pub indent: usize,
}

impl Target {
    fn frame(&self) -> Frame {
        Frame {
            kind: self.kind,
            indent: self.state.indent,
        }
    }
}

/// Line-by-line fold from source text to outline tree
pub struct TreeBuilder<'a> {
    binding: &'a CompiledBinding,
    scanner: LineScanner<'a>,
    options: ImportOptions,
    stack: Vec<Target>,
    prev: ScanState,
    line_no: usize,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(binding: &'a CompiledBinding, options: ImportOptions) -> Self {
        let mut scanner = LineScanner::new(binding);
        if let Some(tab_width) = options.tab_width {
            scanner = scanner.with_tab_width(tab_width);
        }
        let headline = options
            .root_headline
            .clone()
            .unwrap_or_else(|| DEFAULT_ROOT_HEADLINE.to_string());

        Self {
            binding,
            scanner,
            options,
            stack: vec![Target {
                node: OutputNode::new(NodeKind::Root, headline, 1),
                state: ScanState::default(),
                kind: TargetKind::Root,
                child_marker_emitted: false,
                decorator_run: None,
            }],
            prev: ScanState::default(),
            line_no: 0,
        }
    }

    /// Import a whole text
    pub fn build(mut self, text: &str) -> OutputTree {
        for line in split_lines(text) {
            self.feed(line);
        }
        self.finish()
    }

    /// Process the next line of the text
    pub fn feed(&mut self, line: &str) {
        self.line_no += 1;
        let state = self.scanner.scan(line, &self.prev);
        let action = policy::classify(line, &self.prev, &state, self.top().frame(), self.binding);
        trace!(
            "{:>5} [{}] {}: {}",
            self.line_no,
            state,
            action,
            strip_terminator(line)
        );

        match action {
            LineAction::Append(reason) => {
                self.track_decorators(reason, state.indent);
                self.append(line);
            }
            LineAction::JoinIntroducer(kind) => {
                let headline = headline::synthesize(line, self.binding);
                let top = self.top_mut();
                debug!("decorators join {} '{}'", kind.label(), headline);
                top.kind = TargetKind::NamedBlock(kind);
                top.node.kind = kind.into();
                top.node.headline = headline;
                self.append(line);
            }
            LineAction::OpenBlock(kind) => {
                self.close_frames(state.indent);
                let decorators = self.take_decorators(state.indent);
                self.open_block(TargetKind::NamedBlock(kind), line, state);
                if let Some((first_line, mut lines)) = decorators {
                    let node = &mut self.top_mut().node;
                    node.start_line = first_line;
                    lines.append(&mut node.body);
                    node.body = lines;
                }
            }
            LineAction::OpenRootOrganizer => {
                self.top_mut().decorator_run = None;
                self.open_block(TargetKind::Organizer, line, state);
            }
            LineAction::OpenOrganizer => {
                self.close_frames(state.indent);
                self.top_mut().decorator_run = None;
                self.open_block(TargetKind::Organizer, line, state);
            }
        }

        self.prev = state;
    }

    /// Close every frame and run the post-pass
    pub fn finish(mut self) -> OutputTree {
        while self.stack.len() > 1 {
            self.pop();
        }

        let line_count = self.line_no;
        let mut root = match self.stack.pop() {
            Some(target) => target.node,
            None => OutputNode::new(NodeKind::Root, DEFAULT_ROOT_HEADLINE, 1),
        };
        root.end_line = line_count.max(root.end_line);
        post_pass(&mut root, true, self.binding, &self.options);

        OutputTree::new(self.binding.id(), line_count, root)
    }

    fn top(&self) -> &Target {
        // The root frame is only removed by `finish`.
        &self.stack[self.stack.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Target {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    /// Start, extend or end the top frame's run of nested decorators
    fn track_decorators(&mut self, reason: AppendReason, indent: usize) {
        let line_no = self.line_no;
        let top = self.top_mut();
        match reason {
            AppendReason::Opaque => {}
            AppendReason::NestedDecorator => match top.decorator_run {
                Some(run) if run.indent == indent => {}
                _ => {
                    top.decorator_run = Some(DecoratorRun {
                        body_start: top.node.body.len(),
                        line: line_no,
                        indent,
                    })
                }
            },
            _ => top.decorator_run = None,
        }
    }

    /// Detach the top frame's decorator run if it sits at `indent`, so the
    /// block opened there can take it
    fn take_decorators(&mut self, indent: usize) -> Option<(usize, Vec<String>)> {
        let top = self.top_mut();
        let run = top.decorator_run.take().filter(|run| run.indent == indent)?;
        let lines = top.node.body.split_off(run.body_start);
        debug!("moving {} decorator lines from line {} into the nested block", lines.len(), run.line);
        Some((run.line, lines))
    }

    fn append(&mut self, line: &str) {
        let line_no = self.line_no;
        let top = self.top_mut();
        top.node.body.push(line.to_string());
        top.node.end_line = line_no;
    }

    /// Pop frames the line at `indent` ends
    fn close_frames(&mut self, indent: usize) {
        while self.stack.len() > 1 && indent < self.top().state.indent {
            self.pop();
        }
        if self.stack.len() > 1
            && indent == self.top().state.indent
            && matches!(self.top().kind, TargetKind::NamedBlock(_) | TargetKind::Organizer)
        {
            self.pop();
        }
    }

    fn pop(&mut self) {
        let Some(target) = self.stack.pop() else {
            return;
        };
        debug!(
            "close {} '{}' (lines {}-{})",
            target.node.kind.label(),
            target.node.headline,
            target.node.start_line,
            target.node.end_line
        );
        let parent = self.top_mut();
        parent.node.end_line = parent.node.end_line.max(target.node.end_line);
        parent.node.children.push(target.node);
    }

    fn open_block(&mut self, kind: TargetKind, line: &str, state: ScanState) {
        let line_no = self.line_no;
        let parent = self.top_mut();
        if !parent.child_marker_emitted {
            let marker = format!("{}{}{}", leading_whitespace(line), CHILD_MARKER, terminator(line));
            parent.node.child_marker = Some(parent.node.body.len());
            parent.node.body.push(marker);
            parent.child_marker_emitted = true;
        }

        let headline = match kind {
            TargetKind::Organizer => headline::organizer(line),
            TargetKind::NamedBlock(BlockKind::Decorator) => line.trim().to_string(),
            _ => headline::synthesize(line, self.binding),
        };
        debug!("open {} '{}' at line {}", kind.node_kind().label(), headline, line_no);

        let mut node = OutputNode::new(kind.node_kind(), headline, line_no);
        node.body.push(line.to_string());
        self.stack.push(Target {
            node,
            state,
            kind,
            child_marker_emitted: false,
            decorator_run: None,
        });
    }
}

/// Import `text` with `binding` into an outline tree
pub fn import_source(text: &str, binding: &CompiledBinding, options: &ImportOptions) -> OutputTree {
    TreeBuilder::new(binding, options.clone()).build(text)
}

/// Line terminator of `line`, `\n` for a final line without one
fn terminator(line: &str) -> &str {
    match &line[strip_terminator(line).len()..] {
        "" => "\n",
        term => term,
    }
}

/// Strip unused markers, dedent non-root nodes and finish headlines
fn post_pass(node: &mut OutputNode, is_root: bool, binding: &CompiledBinding, options: &ImportOptions) {
    for child in &mut node.children {
        post_pass(child, false, binding, options);
    }

    if node.children.is_empty() {
        if let Some(index) = node.child_marker.take() {
            node.body.remove(index);
        }
    }
    if !is_root {
        dedent(node);
    }
    if options.include_decorators_in_headline && matches!(node.kind, NodeKind::Callable | NodeKind::Type) {
        node.headline = headline::with_decorators(&node.headline, &node.body, binding);
    }
}

/// Remove the first body line's indentation from every body line.
///
/// Lines with less (or different) leading whitespace lose only what they
/// have; the removed text is kept in `short_indents` so flattening can put
/// it back. Whitespace-only lines keep just their terminator.
fn dedent(node: &mut OutputNode) {
    let Some(first) = node.body.first() else {
        return;
    };
    let prefix = leading_whitespace(first).to_string();
    if prefix.is_empty() {
        return;
    }

    for (index, line) in node.body.iter_mut().enumerate() {
        if is_blank(line) {
            *line = line[strip_terminator(line).len()..].to_string();
            continue;
        }
        if let Some(rest) = line.strip_prefix(prefix.as_str()) {
            *line = rest.to_string();
            continue;
        }
        let own = leading_whitespace(line);
        let removed = &own[..own.len().min(prefix.len())];
        node.short_indents.insert(index, removed.to_string());
        *line = line[removed.len()..].to_string();
    }
    node.indent = prefix;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::python;

    fn import(text: &str) -> OutputTree {
        let binding = CompiledBinding::compile(python()).unwrap();
        import_source(text, &binding, &ImportOptions::default())
    }

    fn headlines(tree: &OutputTree) -> Vec<(usize, &str)> {
        tree.index.iter().map(|e| (e.depth, e.headline.as_str())).collect()
    }

    #[test]
    fn test_single_function() {
        let tree = import("def f():\n    return 1\n");
        assert_eq!(headlines(&tree), vec![(0, "<root>"), (1, "f")]);
        assert_eq!(tree.root.body, vec!["@others\n"]);
        assert_eq!(tree.root.child_marker, Some(0));

        let f = &tree.root.children[0];
        assert_eq!(f.kind, NodeKind::Callable);
        assert_eq!(f.text(), "def f():\n    return 1\n");
        assert_eq!((f.start_line, f.end_line), (1, 2));
    }

    #[test]
    fn test_class_methods_are_children() {
        let text = "class A(Base):\n    x = 1\n\n    def m(self):\n        pass\n\n    def n(self):\n        return 2\n";
        let tree = import(text);
        assert_eq!(
            headlines(&tree),
            vec![(0, "<root>"), (1, "A(Base)"), (2, "m"), (2, "n")]
        );

        let class = &tree.root.children[0];
        assert_eq!(class.body, vec!["class A(Base):\n", "    x = 1\n", "\n", "    @others\n"]);
        assert_eq!(class.child_marker, Some(3));

        let m = &class.children[0];
        assert_eq!(m.indent, "    ");
        assert_eq!(m.body, vec!["def m(self):\n", "    pass\n", "\n"]);
        assert_eq!(m.child_marker, None);
    }

    #[test]
    fn test_organizer_groups_loose_statements() {
        let tree = import("import os\nimport sys\n\nX = 1\n");
        assert_eq!(headlines(&tree), vec![(0, "<root>"), (1, "Organizer: import os")]);
        assert_eq!(tree.root.children[0].body.len(), 4);
    }

    #[test]
    fn test_decorators_stay_with_their_definition() {
        let text = "@app.route('/')\n@login_required\ndef index():\n    return 'ok'\n";
        let tree = import(text);
        assert_eq!(headlines(&tree), vec![(0, "<root>"), (1, "index")]);
        let index = &tree.root.children[0];
        assert_eq!(index.kind, NodeKind::Callable);
        assert_eq!(index.start_line, 1);
        assert_eq!(index.body.len(), 4);
    }

    #[test]
    fn test_decorator_headlines() {
        let binding = CompiledBinding::compile(python()).unwrap();
        let options = ImportOptions::default().with_decorators(true);
        let text = "class A:\n    @property\n    def p(self):\n        return 1\n";
        let tree = import_source(text, &binding, &options);
        assert_eq!(headlines(&tree), vec![(0, "<root>"), (1, "A"), (2, "@property p")]);
    }

    #[test]
    fn test_nested_decorators_follow_a_nested_class() {
        let text = "def make():\n    @dataclass\n    # fields\n    class Point:\n        x: int\n    return Point\n";
        let tree = import(text);
        assert_eq!(
            headlines(&tree),
            vec![(0, "<root>"), (1, "make"), (2, "Point"), (2, "Organizer: return Point")]
        );

        let make = &tree.root.children[0];
        assert_eq!(make.body, vec!["def make():\n", "    @others\n"]);
        let point = &make.children[0];
        assert_eq!(point.body, vec!["@dataclass\n", "# fields\n", "class Point:\n", "    x: int\n"]);
        assert_eq!((point.start_line, point.end_line), (2, 5));
        assert_eq!(crate::validator::flatten(&tree), text);
    }

    #[test]
    fn test_nested_decorated_function_stays_in_parent() {
        let text = "def outer(fn):\n    @wraps(fn)\n    def inner():\n        return fn()\n    return inner\n";
        let tree = import(text);
        assert_eq!(headlines(&tree), vec![(0, "<root>"), (1, "outer")]);
        assert_eq!(tree.root.children[0].text(), text);
    }

    #[test]
    fn test_dangling_decorator_stays_a_decorator_node() {
        let tree = import("@register\nx = 1\n");
        assert_eq!(
            headlines(&tree),
            vec![(0, "<root>"), (1, "@register"), (1, "Organizer: x = 1")]
        );
        assert_eq!(tree.root.children[0].kind, NodeKind::Decorator);
    }

    #[test]
    fn test_under_indented_lines_are_recorded() {
        let text = "class A:\n    def m(self):\n        s = '''\ntext\n'''\n        return s\n";
        let tree = import(text);
        let m = &tree.root.children[0].children[0];
        assert_eq!(m.body[2], "text\n");
        assert_eq!(m.short_indents.get(&2).map(String::as_str), Some(""));
        assert_eq!(m.short_indents.get(&3).map(String::as_str), Some(""));
        assert_eq!(m.body[4], "    return s\n");
    }

    #[test]
    fn test_marker_ends_with_crlf_when_source_does() {
        let tree = import("x = 1\r\ndef f():\r\n    pass\r\n");
        assert_eq!(tree.root.body, vec!["@others\r\n"]);
    }

    #[test]
    fn test_empty_text() {
        let tree = import("");
        assert_eq!(tree.line_count, 0);
        assert_eq!(tree.total_nodes(), 1);
        assert!(tree.root.body.is_empty());
    }

    #[test]
    fn test_custom_root_headline() {
        let binding = CompiledBinding::compile(python()).unwrap();
        let options = ImportOptions::default().with_root_headline("app.py");
        let tree = import_source("x = 1\n", &binding, &options);
        assert_eq!(tree.root.headline, "app.py");
    }
}
