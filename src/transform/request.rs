use crate::{
    transform::{Insertion, TransformationStep},
    tree::{NodeId, ProgramTree},
    Result,
};

/// An ordered batch of tree edits, committed once after a read-only traversal.
///
/// Passes never edit the tree while walking it. They describe each edit as a step and
/// the batch is applied in append order by [`TransformationRequest::commit`], which
/// consumes the request.
///
/// # Example
///
/// ```rust
/// use jack_scheduler::{
///     transform::TransformationRequest,
///     tree::{BinaryOp, NodeKind, ProgramTree},
/// };
///
/// let mut tree = ProgramTree::new();
/// let root = tree.root();
/// let ret = tree.add_child(root, NodeKind::Return)?;
/// let add = tree.add_child(ret, NodeKind::Binary(BinaryOp::Add))?;
/// let lhs = tree.add_child(add, NodeKind::Local { name: "x".into() })?;
/// tree.add_child(add, NodeKind::Literal(0))?;
///
/// // x + 0 => x
/// let mut request = TransformationRequest::new();
/// request.replace(add, lhs);
/// request.commit(&mut tree)?;
///
/// assert_eq!(tree.render(ret), "(return x)");
/// # Ok::<(), jack_scheduler::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use = "a transformation request does nothing until it is committed"]
pub struct TransformationRequest {
    steps: Vec<TransformationStep>,
}

impl TransformationRequest {
    /// Creates an empty request.
    pub fn new() -> Self {
        TransformationRequest { steps: Vec::new() }
    }

    /// Appends a step.
    pub fn append(&mut self, step: TransformationStep) -> &mut Self {
        self.steps.push(step);
        self
    }

    /// Queues `new` to take the position of `old`.
    pub fn replace(&mut self, old: NodeId, new: impl Into<Insertion>) -> &mut Self {
        self.append(TransformationStep::Replace {
            old,
            new: new.into(),
        })
    }

    /// Queues the removal of `node` and its subtree.
    pub fn remove(&mut self, node: NodeId) -> &mut Self {
        self.append(TransformationStep::Remove { node })
    }

    /// Queues the insertion of `node` before `anchor`.
    pub fn insert_before(&mut self, anchor: NodeId, node: impl Into<Insertion>) -> &mut Self {
        self.append(TransformationStep::InsertBefore {
            anchor,
            node: node.into(),
        })
    }

    /// Queues the insertion of `node` after `anchor`.
    pub fn insert_after(&mut self, anchor: NodeId, node: impl Into<Insertion>) -> &mut Self {
        self.append(TransformationStep::InsertAfter {
            anchor,
            node: node.into(),
        })
    }

    /// Queues `node` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, node: impl Into<Insertion>) -> &mut Self {
        self.append(TransformationStep::AppendChild {
            parent,
            node: node.into(),
        })
    }

    /// Queues `node` as the first child of `parent`.
    pub fn prepend_child(&mut self, parent: NodeId, node: impl Into<Insertion>) -> &mut Self {
        self.append(TransformationStep::PrependChild {
            parent,
            node: node.into(),
        })
    }

    /// Number of queued steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if no step was queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The queued steps in append order.
    #[must_use]
    pub fn steps(&self) -> &[TransformationStep] {
        &self.steps
    }

    /// Applies every step in append order and returns the number of steps applied.
    ///
    /// Each step sees the tree as left by the previous one. Steps applied before a
    /// failing step are not rolled back: a failure means the edit sequence was
    /// miscomputed and the enclosing pass invocation must be aborted.
    ///
    /// A node displaced by a `Replace` may be reused by later steps of the same request.
    /// Once every step succeeded, displaced nodes that are still detached are deleted
    /// with their subtrees, so handles to them become stale.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleNode`](crate::Error::StaleNode) if a step targets a node
    /// detached or deleted by an earlier step, and
    /// [`Error::InvalidEdit`](crate::Error::InvalidEdit) for edits that would break the
    /// tree shape.
    pub fn commit(self, tree: &mut ProgramTree) -> Result<usize> {
        let count = self.steps.len();
        let mut displaced = Vec::new();
        for step in self.steps {
            log::trace!("applying {step}");
            if let TransformationStep::Replace { old, .. } = &step {
                displaced.push(*old);
            }
            step.apply(tree)?;
        }

        for old in displaced {
            if tree.contains(old) && tree.parent(old).is_none() {
                tree.delete(old)?;
            }
        }
        Ok(count)
    }
}

impl Extend<TransformationStep> for TransformationRequest {
    fn extend<T: IntoIterator<Item = TransformationStep>>(&mut self, iter: T) {
        self.steps.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        tree::{BinaryOp, NodeKind, NodeTemplate},
        Error,
    };

    /// `(return (+ a b))`
    fn return_sum() -> (ProgramTree, NodeId, NodeId, NodeId, NodeId) {
        let mut tree = ProgramTree::new();
        let root = tree.root();
        let ret = tree.add_child(root, NodeKind::Return).unwrap();
        let add = tree.add_child(ret, NodeKind::Binary(BinaryOp::Add)).unwrap();
        let a = tree.add_child(add, NodeKind::Local { name: "a".into() }).unwrap();
        let b = tree.add_child(add, NodeKind::Local { name: "b".into() }).unwrap();
        (tree, ret, add, a, b)
    }

    #[test]
    fn test_commit_matches_sequential_application() {
        let (mut batched, ret, add, a, b) = return_sum();
        let mut stepwise = batched.clone();

        let mut request = TransformationRequest::new();
        request
            .replace(add, b)
            .insert_before(b, NodeTemplate::new(NodeKind::Literal(2)))
            .append_child(ret, a);
        let steps = request.steps().to_vec();

        assert_eq!(request.commit(&mut batched).unwrap(), 3);
        for step in steps {
            step.apply(&mut stepwise).unwrap();
        }

        assert_eq!(batched.render(ret), "(return 2 b a)");
        assert_eq!(batched.render(ret), stepwise.render(ret));
    }

    #[test]
    fn test_replace_then_remove_new_child() {
        let (mut tree, ret, add, a, b) = return_sum();
        let neg = tree.create(NodeKind::Binary(BinaryOp::Sub));
        tree.append_child(neg, a).unwrap();
        tree.append_child(neg, b).unwrap();

        let mut request = TransformationRequest::new();
        request.replace(add, neg).remove(b);
        assert_eq!(request.commit(&mut tree).unwrap(), 2);

        assert_eq!(tree.render(ret), "(return (- a))");
        assert!(!tree.contains(b));
        assert_eq!(tree.parent(add), None);
    }

    #[test]
    fn test_replace_after_remove_is_stale() {
        let (mut tree, _, add, _, _) = return_sum();

        let mut request = TransformationRequest::new();
        request
            .remove(add)
            .replace(add, NodeTemplate::new(NodeKind::Literal(0)));

        let err = request.commit(&mut tree).unwrap_err();
        assert!(matches!(err, Error::StaleNode(id) if id == add));
    }

    #[test]
    fn test_double_replace_is_stale() {
        let (mut tree, _, add, _, _) = return_sum();

        let mut request = TransformationRequest::new();
        request
            .replace(add, NodeTemplate::new(NodeKind::Literal(1)))
            .replace(add, NodeTemplate::new(NodeKind::Literal(2)));

        assert!(matches!(
            request.commit(&mut tree),
            Err(Error::StaleNode(id)) if id == add
        ));
    }

    #[test]
    fn test_insertions_keep_order() {
        let mut tree = ProgramTree::new();
        let root = tree.root();
        let block = tree.add_child(root, NodeKind::Block).unwrap();
        let middle = tree.add_child(block, NodeKind::Literal(2)).unwrap();

        let mut request = TransformationRequest::new();
        request
            .insert_before(middle, NodeTemplate::new(NodeKind::Literal(1)))
            .insert_after(middle, NodeTemplate::new(NodeKind::Literal(3)))
            .append_child(block, NodeTemplate::new(NodeKind::Literal(4)))
            .prepend_child(block, NodeTemplate::new(NodeKind::Literal(0)));
        assert_eq!(request.len(), 4);
        request.commit(&mut tree).unwrap();

        assert_eq!(tree.render(block), "(block 0 1 2 3 4)");
    }

    #[test]
    fn test_append_into_replaced_node_is_stale() {
        let mut tree = ProgramTree::new();
        let root = tree.root();
        let old = tree.add_child(root, NodeKind::Block).unwrap();

        let mut request = TransformationRequest::new();
        request
            .replace(old, NodeKind::Return)
            .append_child(old, NodeKind::Literal(1));

        let err = request.commit(&mut tree).unwrap_err();
        assert!(matches!(err, Error::StaleNode(id) if id == old));
        assert_eq!(tree.render(root), "(program return)");
        assert!(tree.children(old).is_empty());
    }

    #[test]
    fn test_prepend_into_replaced_node_is_stale() {
        let (mut tree, _, add, _, _) = return_sum();

        let mut request = TransformationRequest::new();
        request
            .replace(add, NodeKind::Literal(0))
            .prepend_child(add, NodeKind::Literal(1));
        assert!(matches!(
            request.commit(&mut tree),
            Err(Error::StaleNode(id)) if id == add
        ));
    }

    #[test]
    fn test_remove_child_of_replaced_node_is_stale() {
        let (mut tree, ret, add, a, _) = return_sum();

        let mut request = TransformationRequest::new();
        request.replace(add, NodeKind::Literal(0)).remove(a);

        let err = request.commit(&mut tree).unwrap_err();
        assert!(matches!(err, Error::StaleNode(id) if id == a));
        assert_eq!(tree.render(ret), "(return 0)");
        assert_eq!(tree.parent(a), Some(add));
    }

    #[test]
    fn test_insert_next_to_child_of_replaced_node_is_stale() {
        let (mut tree, _, add, _, b) = return_sum();

        let mut request = TransformationRequest::new();
        request
            .replace(add, NodeKind::Literal(0))
            .insert_after(b, NodeKind::Literal(1));
        assert!(matches!(
            request.commit(&mut tree),
            Err(Error::StaleNode(id)) if id == b
        ));
    }

    #[test]
    fn test_displaced_nodes_are_freed() {
        let (mut tree, ret, add, a, b) = return_sum();
        let before = tree.len();

        let mut request = TransformationRequest::new();
        request.replace(add, NodeKind::Literal(0));
        request.commit(&mut tree).unwrap();

        assert_eq!(tree.render(ret), "(return 0)");
        assert!(!tree.contains(add));
        assert!(!tree.contains(a));
        assert!(!tree.contains(b));
        assert_eq!(tree.len(), before - 2);
    }

    #[test]
    fn test_reused_displaced_node_survives() {
        let (mut tree, ret, add, a, b) = return_sum();

        // the displaced sum moves behind its replacement
        let mut request = TransformationRequest::new();
        request
            .replace(add, NodeKind::Unary(crate::tree::UnaryOp::Neg))
            .append_child(ret, add);
        request.commit(&mut tree).unwrap();

        assert_eq!(tree.render(ret), "(return unary- (+ a b))");
        assert!(tree.contains(add));
        assert!(tree.is_attached(a));
        assert!(tree.is_attached(b));
    }

    #[test]
    fn test_insert_before_detached_anchor_is_stale() {
        let mut tree = ProgramTree::new();
        let lone = tree.create(NodeKind::Literal(1));

        let mut request = TransformationRequest::new();
        request.insert_before(lone, NodeTemplate::new(NodeKind::Literal(0)));
        assert!(matches!(request.commit(&mut tree), Err(Error::StaleNode(_))));
    }
}
