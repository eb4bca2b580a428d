use crate::language::{
    binder::{Slot, SlotTable},
    span::Span,
};

/// Handle into the [`Ast`] arena. Node identity for cursor comparisons is
/// handle equality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

#[derive(Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Option<Span>,
    parent: Option<NodeId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
        }
    }
}

#[derive(Debug)]
pub enum NodeKind {
    /// Statement grouping; the only construct that introduces a nested
    /// lexical scope.
    Block { statements: Vec<NodeId> },
    /// Per-function root above the outermost block. Terminal marker for
    /// the scope-descriptor chain.
    FunctionBody { name: String, block: NodeId },

    Long(i64),
    Str(String),

    /// Positional fetch from the invocation's raw argument list.
    ReadArgument { index: usize },
    ReadLocal { slot: Slot },
    WriteLocal { slot: Slot, value: NodeId },
    /// Unresolved global name; looked up in the function registry when the
    /// value is needed.
    FunctionRef { name: String },

    Binary { op: BinaryOp, lhs: NodeId, rhs: NodeId },
    LogicalAnd { lhs: NodeId, rhs: NodeId },
    LogicalOr { lhs: NodeId, rhs: NodeId },
    Call { callee: NodeId, arguments: Vec<NodeId> },
    ReadProperty { receiver: NodeId, name: NodeId },
    WriteProperty { receiver: NodeId, name: NodeId, value: NodeId },
    Paren { inner: NodeId },

    If { condition: NodeId, then_block: NodeId, else_block: Option<NodeId> },
    While { condition: NodeId, body: NodeId },
    Break,
    Continue,
    Return { value: Option<NodeId> },
    Debugger,
}

impl NodeKind {
    /// Children in source order.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            NodeKind::Block { statements } => statements.clone(),
            NodeKind::FunctionBody { block, .. } => vec![*block],
            NodeKind::Long(_)
            | NodeKind::Str(_)
            | NodeKind::ReadArgument { .. }
            | NodeKind::ReadLocal { .. }
            | NodeKind::FunctionRef { .. }
            | NodeKind::Break
            | NodeKind::Continue
            | NodeKind::Debugger => Vec::new(),
            NodeKind::WriteLocal { value, .. } => vec![*value],
            NodeKind::Binary { lhs, rhs, .. }
            | NodeKind::LogicalAnd { lhs, rhs }
            | NodeKind::LogicalOr { lhs, rhs } => vec![*lhs, *rhs],
            NodeKind::Call { callee, arguments } => {
                let mut children = vec![*callee];
                children.extend(arguments.iter().copied());
                children
            }
            NodeKind::ReadProperty { receiver, name } => vec![*receiver, *name],
            NodeKind::WriteProperty {
                receiver,
                name,
                value,
            } => vec![*receiver, *name, *value],
            NodeKind::Paren { inner } => vec![*inner],
            NodeKind::If {
                condition,
                then_block,
                else_block,
            } => {
                let mut children = vec![*condition, *then_block];
                children.extend(else_block.iter().copied());
                children
            }
            NodeKind::While { condition, body } => vec![*condition, *body],
            NodeKind::Return { value } => value.iter().copied().collect(),
        }
    }
}

/// Arena holding every node of a parse. Parent links are fixed up when a
/// node is pushed with its children already allocated, so the tree can be
/// walked in both directions.
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: NodeKind, span: Option<Span>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        for child in kind.children() {
            self.nodes[child.0 as usize].parent = Some(id);
        }
        self.nodes.push(Node {
            kind,
            span,
            parent: None,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0 as usize].kind
    }

    pub fn span(&self, id: NodeId) -> Option<Span> {
        self.nodes[id.0 as usize].span
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0 as usize].parent
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.kind(id).children()
    }

    pub fn is_block(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Block { .. })
    }

    /// Innermost node whose span covers the byte offset. Ties are broken
    /// toward the smaller (more deeply nested) span.
    pub fn node_at(&self, offset: usize) -> Option<NodeId> {
        let mut best: Option<(usize, NodeId)> = None;
        for (index, node) in self.nodes.iter().enumerate() {
            let Some(span) = node.span else { continue };
            if !span.contains(offset) {
                continue;
            }
            let id = NodeId(index as u32);
            match best {
                Some((len, _)) if span.len() >= len => {}
                _ => best = Some((span.len(), id)),
            }
        }
        best.map(|(_, id)| id)
    }
}

/// A parsed, bound function: its body in the arena plus the frozen slot
/// layout of its activation record.
#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub parameter_count: usize,
    pub body: NodeId,
    pub slots: SlotTable,
    pub span: Span,
}
