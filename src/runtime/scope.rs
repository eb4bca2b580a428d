use crate::language::ast::{Ast, NodeId, NodeKind};
use crate::language::binder::Slot;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::frame::Frame;
use crate::runtime::value::Value;
use indexmap::IndexMap;
use std::cell::OnceCell;
use std::rc::Rc;

/// One level of lexical nesting, reconstructed on demand from the AST.
///
/// The interpreter keeps no scope chain at run time; storage is a flat
/// activation record per call. A scope descriptor recovers the block
/// structure for inspection tooling by walking the tree from an arbitrary
/// node. Descriptors are cheap, private to one query, and memoize their
/// parent link and binding set for that query only.
pub struct LexicalScope<'a> {
    ast: &'a Ast,
    /// Node the inspection is anchored at; writes at or after it are not
    /// yet in scope. Absent for parent descriptors and whole-function
    /// queries.
    cursor: Option<NodeId>,
    /// Nearest block enclosing the cursor.
    block: Option<NodeId>,
    /// Nearest block enclosing `block`; `None` for the outermost block.
    parent_block: Option<NodeId>,
    /// Function-body marker when this is the outermost (function) scope.
    function: Option<NodeId>,
    /// The query came from above every block, so the visible bindings are
    /// the parameter prefix, backed positionally by the argument list.
    above_block: bool,
    parent: OnceCell<Option<Box<LexicalScope<'a>>>>,
    bindings: OnceCell<IndexMap<Rc<str>, Slot>>,
}

impl<'a> LexicalScope<'a> {
    /// Builds the innermost scope descriptor for `node`.
    ///
    /// Two distinct searches, kept separate on purpose: a node inside a
    /// block walks ancestors to its nearest enclosing block, while a node
    /// sitting above every block (inspecting the whole function) searches
    /// descendants in pre-order for the first block.
    pub fn locate(ast: &'a Ast, node: NodeId) -> LexicalScope<'a> {
        let mut cursor = Some(node);
        let mut above_block = false;
        let mut block = enclosing_block(ast, node);
        if block.is_none() {
            block = first_block_below(ast, node);
            cursor = None;
            above_block = true;
        }
        let Some(block) = block else {
            debug_assert!(false, "AST holds no block reachable from the queried node");
            return Self::detached(ast);
        };
        log::debug!(
            "located scope: block {:?}, cursor {:?}, above-block {}",
            block,
            cursor,
            above_block
        );
        Self::for_block(ast, cursor, above_block, block)
    }

    fn for_block(
        ast: &'a Ast,
        cursor: Option<NodeId>,
        above_block: bool,
        block: NodeId,
    ) -> Self {
        let parent_block = enclosing_block(ast, block);
        let function = if parent_block.is_none() {
            function_root(ast, block)
        } else {
            None
        };
        Self {
            ast,
            cursor,
            block: Some(block),
            parent_block,
            function,
            above_block,
            parent: OnceCell::new(),
            bindings: OnceCell::new(),
        }
    }

    fn detached(ast: &'a Ast) -> Self {
        Self {
            ast,
            cursor: None,
            block: None,
            parent_block: None,
            function: None,
            above_block: false,
            parent: OnceCell::new(),
            bindings: OnceCell::new(),
        }
    }

    /// The enclosing function's name for the outermost scope, a fixed
    /// label for block scopes.
    pub fn name(&self) -> &str {
        match self.function.map(|id| self.ast.kind(id)) {
            Some(NodeKind::FunctionBody { name, .. }) => name,
            _ => "block",
        }
    }

    /// The node this scope represents: the function body for the
    /// outermost scope, the block node otherwise.
    pub fn node(&self) -> Option<NodeId> {
        self.function.or(self.block)
    }

    pub fn is_function_scope(&self) -> bool {
        self.function.is_some()
    }

    /// Next scope out, built lazily once per descriptor. The parent
    /// carries no cursor: relative to any point inside this scope, the
    /// whole enclosing block has already executed.
    pub fn parent(&self) -> Option<&LexicalScope<'a>> {
        self.parent
            .get_or_init(|| {
                self.parent_block
                    .map(|block| Box::new(Self::for_block(self.ast, None, false, block)))
            })
            .as_deref()
    }

    /// Variables visible at this scope's cursor, wrapped for reading and
    /// writing against `frame` (pass `None` while nothing is executing).
    pub fn variables<'f>(&self, frame: Option<&'f mut Frame>) -> VariablesView<'f> {
        VariablesView::build(self.bindings(), self.above_block, frame)
    }

    /// The function's declared parameters, positionally backed by the raw
    /// argument list. Empty for block scopes.
    pub fn arguments<'f>(&self, frame: Option<&'f mut Frame>) -> VariablesView<'f> {
        let args = match (self.function, self.block) {
            (Some(_), Some(block)) => collect_arguments(self.ast, block),
            _ => IndexMap::new(),
        };
        VariablesView::build(&args, true, frame)
    }

    fn bindings(&self) -> &IndexMap<Rc<str>, Slot> {
        self.bindings.get_or_init(|| match self.block {
            None => IndexMap::new(),
            // Above every block only the parameter prefix is meaningful.
            Some(block) if self.above_block => collect_arguments(self.ast, block),
            Some(block) => self.collect_variables(block),
        })
    }

    /// Pre-order walk over the block's statements with an explicit stack:
    /// nested blocks are skipped whole (their bindings belong to their own
    /// descriptor), the walk halts at the cursor, and writes already bound
    /// by an ancestor scope are filtered out so shadowing reads as a
    /// single name per level.
    fn collect_variables(&self, block: NodeId) -> IndexMap<Rc<str>, Slot> {
        let mut out = IndexMap::new();
        let mut stack = self.ast.children(block);
        stack.reverse();
        while let Some(node) = stack.pop() {
            if Some(node) == self.cursor {
                break;
            }
            if self.ast.is_block(node) {
                continue;
            }
            if let NodeKind::WriteLocal { slot, .. } = self.ast.kind(node) {
                if !self.bound_in_ancestor(slot.name()) {
                    out.entry(slot.shared_name()).or_insert_with(|| slot.clone());
                }
            }
            let mut children = self.ast.children(node);
            children.reverse();
            stack.append(&mut children);
        }
        out
    }

    fn bound_in_ancestor(&self, name: &str) -> bool {
        let mut scope = self.parent();
        while let Some(current) = scope {
            if current.bindings().contains_key(name) {
                return true;
            }
            scope = current.parent();
        }
        false
    }
}

/// The prefix of the function body that copies arguments into slots, in
/// declaration order. Ends at the first statement of any other shape.
fn collect_arguments(ast: &Ast, block: NodeId) -> IndexMap<Rc<str>, Slot> {
    let mut out = IndexMap::new();
    for statement in ast.children(block) {
        let NodeKind::WriteLocal { slot, value } = ast.kind(statement) else {
            break;
        };
        let NodeKind::ReadArgument { .. } = ast.kind(*value) else {
            break;
        };
        out.insert(slot.shared_name(), slot.clone());
    }
    out
}

fn enclosing_block(ast: &Ast, node: NodeId) -> Option<NodeId> {
    let mut current = ast.parent(node);
    while let Some(id) = current {
        if ast.is_block(id) {
            return Some(id);
        }
        current = ast.parent(id);
    }
    None
}

fn first_block_below(ast: &Ast, node: NodeId) -> Option<NodeId> {
    let mut stack = vec![node];
    while let Some(id) = stack.pop() {
        if ast.is_block(id) {
            return Some(id);
        }
        let mut children = ast.children(id);
        children.reverse();
        stack.append(&mut children);
    }
    None
}

fn function_root(ast: &Ast, block: NodeId) -> Option<NodeId> {
    let mut current = Some(block);
    while let Some(id) = current {
        if matches!(ast.kind(id), NodeKind::FunctionBody { .. }) {
            return Some(id);
        }
        current = ast.parent(id);
    }
    None
}

/// Where one bound name is stored: a slot of the activation record, or a
/// position in the raw argument list. Resolved once when the view is
/// built, so `read`/`write` dispatch on an explicit tag.
#[derive(Clone, Debug)]
enum Storage {
    Slot(Slot),
    Argument(usize),
}

/// Name-indexed read/write/enumerate facade over one binding set,
/// optionally backed by a live activation record.
pub struct VariablesView<'f> {
    entries: IndexMap<Rc<str>, Storage>,
    frame: Option<&'f mut Frame>,
}

impl<'f> VariablesView<'f> {
    fn build(
        bindings: &IndexMap<Rc<str>, Slot>,
        positional: bool,
        frame: Option<&'f mut Frame>,
    ) -> Self {
        let entries = bindings
            .iter()
            .map(|(name, slot)| {
                let storage = match slot.argument() {
                    Some(index) if positional => Storage::Argument(index),
                    _ => Storage::Slot(slot.clone()),
                };
                (name.clone(), storage)
            })
            .collect();
        Self { entries, frame }
    }

    /// Bound names in first-write order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|name| &**name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Without a frame every read yields the null sentinel, so tooling can
    /// enumerate and probe scopes that are not currently executing.
    pub fn read(&self, name: &str) -> RuntimeResult<Value> {
        let Some(frame) = self.frame.as_ref() else {
            return Ok(Value::Null);
        };
        match self.storage(name)? {
            Storage::Argument(index) => Ok(frame.argument(*index)),
            Storage::Slot(slot) => Ok(frame.get(slot)),
        }
    }

    pub fn write(&mut self, name: &str, value: Value) -> RuntimeResult<()> {
        if self.frame.is_none() {
            return Err(RuntimeError::UnsupportedMutation);
        }
        let storage = self.storage(name)?.clone();
        if let Some(frame) = self.frame.as_mut() {
            match storage {
                Storage::Argument(index) => frame.set_argument(index, value),
                Storage::Slot(slot) => frame.set(&slot, value),
            }
        }
        Ok(())
    }

    /// Every bound name is always readable; without a frame, probing any
    /// name succeeds (and reads yield the sentinel).
    pub fn readable(&self, name: &str) -> bool {
        self.frame.is_none() || self.entries.contains_key(name)
    }

    /// Writable only while backed by a live activation record.
    pub fn writable(&self, name: &str) -> bool {
        self.frame.is_some() && self.entries.contains_key(name)
    }

    fn storage(&self, name: &str) -> RuntimeResult<&Storage> {
        self.entries
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownBinding {
                name: name.to_string(),
            })
    }
}
