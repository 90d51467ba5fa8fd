use std::fmt;

use crate::{
    tree::{NodeId, NodeKind, NodeTemplate, ProgramTree},
    Error, Result,
};

/// The node a step inserts: either an existing node or a subtree to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insertion {
    /// A node already in the arena; it is moved if currently attached
    Node(NodeId),
    /// A subtree that is materialized when the step is applied
    Template(NodeTemplate),
}

impl Insertion {
    fn resolve(self, tree: &mut ProgramTree) -> Result<NodeId> {
        match self {
            Self::Node(id) => {
                tree.get(id)?;
                Ok(id)
            }
            Self::Template(template) => tree.materialize(&template),
        }
    }
}

impl From<NodeId> for Insertion {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

impl From<NodeTemplate> for Insertion {
    fn from(template: NodeTemplate) -> Self {
        Self::Template(template)
    }
}

impl From<NodeKind> for Insertion {
    fn from(kind: NodeKind) -> Self {
        Self::Template(NodeTemplate::new(kind))
    }
}

impl fmt::Display for Insertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(id) => write!(f, "{id}"),
            Self::Template(template) => write!(f, "new {}", template.kind.label()),
        }
    }
}

/// One structural edit of a [`TransformationRequest`](super::TransformationRequest).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformationStep {
    /// `new` takes the position of `old`, which is detached and kept alive until the
    /// request is committed
    Replace {
        /// Node being replaced, must be attached
        old: NodeId,
        /// Replacement
        new: Insertion,
    },
    /// Detaches `node` and deletes its subtree
    Remove {
        /// Node being removed, must be attached
        node: NodeId,
    },
    /// Inserts `node` as the previous sibling of `anchor`
    InsertBefore {
        /// Sibling to insert before, must be attached
        anchor: NodeId,
        /// Inserted node
        node: Insertion,
    },
    /// Inserts `node` as the next sibling of `anchor`
    InsertAfter {
        /// Sibling to insert after, must be attached
        anchor: NodeId,
        /// Inserted node
        node: Insertion,
    },
    /// Inserts `node` as the last child of `parent`
    AppendChild {
        /// New parent, must be attached
        parent: NodeId,
        /// Inserted node
        node: Insertion,
    },
    /// Inserts `node` as the first child of `parent`
    PrependChild {
        /// New parent, must be attached
        parent: NodeId,
        /// Inserted node
        node: Insertion,
    },
}

impl TransformationStep {
    /// Applies the step to `tree`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleNode`] if the target or the parent receiving the node is not
    /// reachable from the root, for instance because an earlier step of the same request
    /// detached or deleted it or one of its ancestors, and [`Error::InvalidEdit`] if the edit
    /// would break the tree shape.
    pub fn apply(self, tree: &mut ProgramTree) -> Result<()> {
        match self {
            Self::Replace { old, new } => {
                require_attached(tree, old)?;
                let new = new.resolve(tree)?;
                tree.replace(old, new)
            }
            Self::Remove { node } => {
                require_attached(tree, node)?;
                tree.delete(node)
            }
            Self::InsertBefore { anchor, node } => {
                require_attached(tree, anchor)?;
                let node = node.resolve(tree)?;
                tree.insert_before(anchor, node)
            }
            Self::InsertAfter { anchor, node } => {
                require_attached(tree, anchor)?;
                let node = node.resolve(tree)?;
                tree.insert_after(anchor, node)
            }
            Self::AppendChild { parent, node } => {
                require_attached(tree, parent)?;
                let node = node.resolve(tree)?;
                tree.append_child(parent, node)
            }
            Self::PrependChild { parent, node } => {
                require_attached(tree, parent)?;
                let node = node.resolve(tree)?;
                tree.prepend_child(parent, node)
            }
        }
    }
}

/// Targets must be reachable from the root, not merely live: a node inside a subtree
/// detached by an earlier step is stale as well.
fn require_attached(tree: &ProgramTree, id: NodeId) -> Result<()> {
    if tree.is_attached(id) {
        Ok(())
    } else {
        Err(Error::StaleNode(id))
    }
}

impl fmt::Display for TransformationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace { old, new } => write!(f, "replace {old} with {new}"),
            Self::Remove { node } => write!(f, "remove {node}"),
            Self::InsertBefore { anchor, node } => write!(f, "insert {node} before {anchor}"),
            Self::InsertAfter { anchor, node } => write!(f, "insert {node} after {anchor}"),
            Self::AppendChild { parent, node } => write!(f, "append {node} to {parent}"),
            Self::PrependChild { parent, node } => write!(f, "prepend {node} to {parent}"),
        }
    }
}
