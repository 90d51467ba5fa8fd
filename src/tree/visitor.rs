//! Pattern-matched traversal over the program tree.

use crate::tree::{
    arena::ProgramTree,
    node::{Node, NodeId, NodeKind},
};

/// Callbacks driven by [`ProgramTree::walk`].
///
/// Implementors usually `match` on [`Node::kind`] inside `visit`. A visitor only gets
/// shared access to the tree; edits it wants to make are collected into a
/// [`TransformationRequest`](crate::transform::TransformationRequest) and committed after
/// the walk returns.
///
/// # Example
///
/// ```rust
/// use jack_scheduler::tree::{Node, NodeId, NodeKind, ProgramTree, Visitor};
///
/// struct CountLiterals(usize);
///
/// impl Visitor for CountLiterals {
///     fn visit(&mut self, _tree: &ProgramTree, _id: NodeId, node: &Node) -> bool {
///         if let NodeKind::Literal(_) = node.kind() {
///             self.0 += 1;
///         }
///         true
///     }
/// }
///
/// let mut tree = ProgramTree::new();
/// let root = tree.root();
/// tree.add_child(root, NodeKind::Literal(1))?;
/// let mut counter = CountLiterals(0);
/// tree.walk(root, &mut counter);
/// assert_eq!(counter.0, 1);
/// # Ok::<(), jack_scheduler::Error>(())
/// ```
pub trait Visitor {
    /// Called before the children of `node`. Return `false` to skip them.
    fn visit(&mut self, tree: &ProgramTree, id: NodeId, node: &Node) -> bool;

    /// Called after the children of `node` were visited.
    fn end_visit(&mut self, _tree: &ProgramTree, _id: NodeId, _node: &Node) {}
}

/// Collects the ids of every node whose kind satisfies a predicate.
pub struct CollectKind<F> {
    predicate: F,
    /// Matching nodes in pre-order
    pub found: Vec<NodeId>,
}

impl<F> CollectKind<F>
where
    F: FnMut(&NodeKind) -> bool,
{
    /// Creates a collector for `predicate`.
    pub fn new(predicate: F) -> Self {
        CollectKind {
            predicate,
            found: Vec::new(),
        }
    }
}

impl<F> Visitor for CollectKind<F>
where
    F: FnMut(&NodeKind) -> bool,
{
    fn visit(&mut self, _tree: &ProgramTree, id: NodeId, node: &Node) -> bool {
        if (self.predicate)(node.kind()) {
            self.found.push(id);
        }
        true
    }
}
