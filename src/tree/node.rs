//! Node identities, node kinds and entity classes of the program tree.

use std::{collections::BTreeSet, fmt};

use bitflags::bitflags;

use crate::contract::Marker;

/// Generational handle to a node stored in a [`ProgramTree`](crate::tree::ProgramTree).
///
/// The index addresses an arena slot; the generation is bumped whenever the slot is freed,
/// so a handle that outlives its node is detected as stale instead of silently aliasing a
/// newer node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        NodeId { index, generation }
    }

    /// Returns the arena slot index
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the slot generation this handle was issued for
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}@{})", self.index, self.generation)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.index, self.generation)
    }
}

bitflags! {
    /// Coarse classification of node kinds.
    ///
    /// Used to declare on which nodes a [`Marker`] may be placed and to map
    /// [`Granularity`](crate::contract::Granularity) levels onto node kinds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EntityClass: u16 {
        /// The program root owned by the session
        const PROGRAM = 0x0001;
        /// Java packages
        const PACKAGE = 0x0002;
        /// Classes and interfaces
        const TYPE = 0x0004;
        /// Methods and constructors
        const METHOD = 0x0008;
        /// Fields
        const FIELD = 0x0010;
        /// Statements inside method bodies
        const STATEMENT = 0x0020;
        /// Expressions inside statements
        const EXPRESSION = 0x0040;
        /// Declarations that passes usually iterate over
        const DECLARATION = Self::PACKAGE.bits() | Self::TYPE.bits() | Self::METHOD.bits() | Self::FIELD.bits();
        /// Statements and expressions
        const CODE = Self::STATEMENT.bits() | Self::EXPRESSION.bits();
    }
}

/// Binary operators of the expression language.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    /// Returns the Java source spelling of the operator.
    #[must_use]
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::And => "&&",
            Self::Or => "||",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Unary operators of the expression language.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    /// Returns the Java source spelling of the operator.
    #[must_use]
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "!",
        }
    }
}

/// The closed set of node kinds making up a program tree.
///
/// Traversals pattern-match on this enum instead of dispatching through a class
/// hierarchy; see [`Visitor`](crate::tree::Visitor).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Root of the whole program, owned by the session
    Program,
    /// A Java package
    Package {
        /// Fully qualified package name
        name: String,
    },
    /// A class or interface declaration
    Type {
        /// Simple type name
        name: String,
    },
    /// A method declaration, its body is the single `Block` child
    Method {
        /// Method name
        name: String,
    },
    /// A field declaration, an optional initializer expression is its child
    Field {
        /// Field name
        name: String,
    },
    /// A sequence of statements
    Block,
    /// `return` with an optional value child
    Return,
    /// An expression evaluated for its side effects
    ExprStmt,
    /// `if (cond) then [else]`: children are condition, then-block and optional else-block
    If,
    /// Assignment: children are target and value
    Assign,
    /// Read of a local variable or parameter
    Local {
        /// Variable name
        name: String,
    },
    /// Integer literal
    Literal(i64),
    /// Binary expression, children are the left and right operand
    Binary(BinaryOp),
    /// Unary expression, the operand is the single child
    Unary(UnaryOp),
    /// Method invocation, arguments are the children
    Call {
        /// Invoked method name
        target: String,
    },
}

impl NodeKind {
    /// Returns the entity class of this kind.
    #[must_use]
    pub fn class(&self) -> EntityClass {
        match self {
            Self::Program => EntityClass::PROGRAM,
            Self::Package { .. } => EntityClass::PACKAGE,
            Self::Type { .. } => EntityClass::TYPE,
            Self::Method { .. } => EntityClass::METHOD,
            Self::Field { .. } => EntityClass::FIELD,
            Self::Block | Self::Return | Self::ExprStmt | Self::If | Self::Assign => {
                EntityClass::STATEMENT
            }
            Self::Local { .. }
            | Self::Literal(_)
            | Self::Binary(_)
            | Self::Unary(_)
            | Self::Call { .. } => EntityClass::EXPRESSION,
        }
    }

    /// Returns the declared name for declarations, `None` for code nodes.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Package { name }
            | Self::Type { name }
            | Self::Method { name }
            | Self::Field { name } => Some(name),
            _ => None,
        }
    }

    /// Short lowercase label used in diagnostics and tree renderings.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Program => "program".to_string(),
            Self::Package { name } => format!("package {name}"),
            Self::Type { name } => format!("type {name}"),
            Self::Method { name } => format!("method {name}"),
            Self::Field { name } => format!("field {name}"),
            Self::Block => "block".to_string(),
            Self::Return => "return".to_string(),
            Self::ExprStmt => "expr".to_string(),
            Self::If => "if".to_string(),
            Self::Assign => "=".to_string(),
            Self::Local { name } => name.clone(),
            Self::Literal(value) => value.to_string(),
            Self::Binary(op) => op.symbol().to_string(),
            Self::Unary(op) => format!("unary{}", op.symbol()),
            Self::Call { target } => format!("call {target}"),
        }
    }
}

/// A node stored in the arena.
///
/// Children are owned by position; the parent link is a non-owning back reference used
/// for navigation and in-place replacement.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) markers: BTreeSet<Marker>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            parent: None,
            children: Vec::new(),
            markers: BTreeSet::new(),
        }
    }

    /// The node's kind
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Parent of the node, `None` for the root and detached nodes
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in declaration order
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Markers currently attached to this node
    #[must_use]
    pub fn markers(&self) -> &BTreeSet<Marker> {
        &self.markers
    }

    /// Returns `true` if `marker` is attached to this node
    #[must_use]
    pub fn has_marker(&self, marker: &Marker) -> bool {
        self.markers.contains(marker)
    }
}

/// An owned description of a subtree that does not exist in the arena yet.
///
/// Passes only hold shared access to the tree while they run, so new nodes are described
/// as templates and materialized when their transformation request is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTemplate {
    /// Kind of the root of the template
    pub kind: NodeKind,
    /// Child templates in order
    pub children: Vec<NodeTemplate>,
    /// Markers to attach once materialized
    pub markers: Vec<Marker>,
}

impl NodeTemplate {
    /// Creates a leaf template.
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        NodeTemplate {
            kind,
            children: Vec::new(),
            markers: Vec::new(),
        }
    }

    /// Adds a child template.
    #[must_use]
    pub fn child(mut self, child: impl Into<NodeTemplate>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Attaches a marker to the materialized root node.
    #[must_use]
    pub fn marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    /// Number of nodes described by this template.
    #[must_use]
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(NodeTemplate::size).sum::<usize>()
    }
}

impl From<NodeKind> for NodeTemplate {
    fn from(kind: NodeKind) -> Self {
        NodeTemplate::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_class() {
        assert_eq!(NodeKind::Program.class(), EntityClass::PROGRAM);
        assert_eq!(
            NodeKind::Method {
                name: "run".to_string()
            }
            .class(),
            EntityClass::METHOD
        );
        assert_eq!(NodeKind::If.class(), EntityClass::STATEMENT);
        assert_eq!(NodeKind::Literal(3).class(), EntityClass::EXPRESSION);
        assert!(EntityClass::DECLARATION.contains(EntityClass::FIELD));
        assert!(!EntityClass::DECLARATION.intersects(EntityClass::CODE));
    }

    #[test]
    fn test_template_size() {
        let template = NodeTemplate::new(NodeKind::Binary(BinaryOp::Add))
            .child(NodeKind::Literal(1))
            .child(NodeTemplate::new(NodeKind::Unary(UnaryOp::Neg)).child(NodeKind::Literal(2)));
        assert_eq!(template.size(), 4);
    }

    #[test]
    fn test_node_id_display() {
        let id = NodeId::new(7, 2);
        assert_eq!(id.to_string(), "#7@2");
        assert_eq!(format!("{id:?}"), "NodeId(7@2)");
    }
}
