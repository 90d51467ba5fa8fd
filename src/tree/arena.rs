//! Arena storage for the program tree.
//!
//! The [`ProgramTree`] owns every node in a flat slot vector and hands out generational
//! [`NodeId`]s. Structural edits go through `&mut self` methods only; passes receive a
//! shared reference while they run and describe their edits as
//! [`TransformationRequest`](crate::transform::TransformationRequest)s instead.
//!
//! # Invariants
//!
//! - Every live node has at most one parent, and appears exactly once in that parent's
//!   children.
//! - The root has no parent and is never deleted.
//! - Deleting a node frees its whole subtree and bumps the generation of every freed slot.

use std::fmt::Write;

use crate::{
    contract::Marker,
    tree::{
        node::{Node, NodeId, NodeKind, NodeTemplate},
        visitor::Visitor,
    },
    Error, Result,
};

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Mutable, parent-linked program tree stored in an arena.
///
/// # Example
///
/// ```rust
/// use jack_scheduler::tree::{NodeKind, ProgramTree};
///
/// let mut tree = ProgramTree::new();
/// let root = tree.root();
/// let class = tree.add_child(root, NodeKind::Type { name: "Main".into() })?;
/// let method = tree.add_child(class, NodeKind::Method { name: "main".into() })?;
/// assert_eq!(tree.parent(method), Some(class));
/// assert_eq!(tree.qualified_name(method), "Main.main");
/// # Ok::<(), jack_scheduler::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ProgramTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
}

impl Default for ProgramTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramTree {
    /// Creates a tree holding only the [`NodeKind::Program`] root.
    #[must_use]
    pub fn new() -> Self {
        ProgramTree {
            slots: vec![Slot {
                generation: 0,
                node: Some(Node::new(NodeKind::Program)),
            }],
            free: Vec::new(),
            root: NodeId::new(0, 0),
        }
    }

    /// Returns the program root.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, attached or detached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Returns `true` if the tree only contains its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Returns `true` if `id` refers to a live node.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Returns the node behind `id`, or `None` if the handle is stale.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    /// Returns the node behind `id`, failing with [`Error::StaleNode`] for stale handles.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleNode`] if the node was deleted.
    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.node(id).ok_or(Error::StaleNode(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(Error::StaleNode(id))
    }

    /// Returns the kind of a node.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).map(Node::kind)
    }

    /// Returns the parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(Node::parent)
    }

    /// Returns the children of a node, empty for stale handles.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map_or(&[], Node::children)
    }

    /// Iterates over the ancestors of a node, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |current| self.parent(*current))
    }

    /// Returns `true` if `ancestor` is `node` or one of its ancestors.
    #[must_use]
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor == node || self.ancestors(node).any(|a| a == ancestor)
    }

    /// Returns `true` if the node is reachable from the root.
    #[must_use]
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.contains(id) && self.is_ancestor_or_self(self.root, id)
    }

    /// Returns all nodes of the subtree rooted at `id` in pre-order, `id` included.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.contains(current) {
                continue;
            }
            result.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        result
    }

    /// Returns the dotted name of a declaration, built from its named ancestors.
    ///
    /// Code nodes are described by the name of their enclosing declaration.
    #[must_use]
    pub fn qualified_name(&self, id: NodeId) -> String {
        let mut parts: Vec<&str> = std::iter::once(id)
            .chain(self.ancestors(id))
            .filter_map(|n| self.kind(n).and_then(NodeKind::name))
            .collect();
        parts.reverse();
        parts.join(".")
    }

    /// Human-readable description of an entity, e.g. `method com.example.Foo.bar`.
    #[must_use]
    pub fn describe(&self, id: NodeId) -> String {
        match self.kind(id) {
            None => format!("stale node {id}"),
            Some(NodeKind::Program) => "program".to_string(),
            Some(kind) => {
                let class = match kind {
                    NodeKind::Package { .. } => "package",
                    NodeKind::Type { .. } => "type",
                    NodeKind::Method { .. } => "method",
                    NodeKind::Field { .. } => "field",
                    _ => return format!("{} in {}", kind.label(), self.qualified_name(id)),
                };
                format!("{class} {}", self.qualified_name(id))
            }
        }
    }

    /// Renders a subtree as an s-expression, e.g. `(return (+ a 1))`.
    ///
    /// Two subtrees render identically iff they have the same shape and kinds, which makes
    /// this the canonical way to compare trees in tests and diagnostics.
    #[must_use]
    pub fn render(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.render_into(id, &mut out);
        out
    }

    fn render_into(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            let _ = write!(out, "<stale {id}>");
            return;
        };

        if node.children.is_empty() {
            out.push_str(&node.kind.label());
            return;
        }

        out.push('(');
        out.push_str(&node.kind.label());
        for child in &node.children {
            out.push(' ');
            self.render_into(*child, out);
        }
        out.push(')');
    }

    /// Walks the subtree rooted at `start` with a visitor.
    ///
    /// `visit` is called in pre-order; returning `false` skips the node's children.
    /// `end_visit` is called after the children of a visited node were processed.
    pub fn walk<V: Visitor + ?Sized>(&self, start: NodeId, visitor: &mut V) {
        enum Frame {
            Enter(NodeId),
            Exit(NodeId),
        }

        let mut stack = vec![Frame::Enter(start)];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(id) => {
                    let Some(node) = self.node(id) else {
                        continue;
                    };
                    let descend = visitor.visit(self, id, node);
                    stack.push(Frame::Exit(id));
                    if descend {
                        stack.extend(node.children.iter().rev().map(|c| Frame::Enter(*c)));
                    }
                }
                Frame::Exit(id) => {
                    if let Some(node) = self.node(id) {
                        visitor.end_visit(self, id, node);
                    }
                }
            }
        }
    }

    // ── Construction ────────────────────────────────────────────────────

    /// Allocates a detached node.
    pub fn create(&mut self, kind: NodeKind) -> NodeId {
        let node = Node::new(kind);
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId::new(index, slot.generation)
        } else {
            let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId::new(index, 0)
        }
    }

    /// Allocates a node and appends it to `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleNode`] if `parent` is stale.
    pub fn add_child(&mut self, parent: NodeId, kind: NodeKind) -> Result<NodeId> {
        self.get(parent)?;
        let child = self.create(kind);
        self.append_child(parent, child)?;
        Ok(child)
    }

    /// Allocates the nodes described by `template` as a detached subtree.
    ///
    /// # Errors
    ///
    /// Returns an error if one of the template markers is not valid on its node.
    pub fn materialize(&mut self, template: &NodeTemplate) -> Result<NodeId> {
        let id = self.create(template.kind.clone());
        for marker in &template.markers {
            self.add_marker(id, *marker)?;
        }
        for child in &template.children {
            let child_id = self.materialize(child)?;
            self.append_child(id, child_id)?;
        }
        Ok(id)
    }

    // ── Structural edits ────────────────────────────────────────────────

    /// Prepares `node` for insertion below `destination`.
    ///
    /// Moves are allowed: an attached node is detached from its current parent first.
    fn prepare_insert(&mut self, node: NodeId, destination: NodeId) -> Result<()> {
        self.get(node)?;
        self.get(destination)?;
        if node == self.root {
            return Err(Error::InvalidEdit("the program root cannot be moved".to_string()));
        }
        if self.is_ancestor_or_self(node, destination) {
            return Err(Error::InvalidEdit(format!(
                "inserting {node} below {destination} would create a cycle"
            )));
        }
        self.detach(node)?;
        Ok(())
    }

    fn position_in_parent(&self, id: NodeId) -> Result<(NodeId, usize)> {
        let parent = self.parent(id).ok_or(Error::StaleNode(id))?;
        let index = self
            .children(parent)
            .iter()
            .position(|c| *c == id)
            .ok_or_else(|| {
                Error::InvalidEdit(format!("{id} is not listed as a child of {parent}"))
            })?;
        Ok((parent, index))
    }

    fn insert_at(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        self.get_mut(child)?.parent = Some(parent);
        let parent_node = self.get_mut(parent)?;
        let index = index.min(parent_node.children.len());
        parent_node.children.insert(index, child);
        Ok(())
    }

    /// Appends `child` as the last child of `parent`, moving it if it is attached elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleNode`] for stale handles and [`Error::InvalidEdit`] if the edit
    /// would create a cycle.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.prepare_insert(child, parent)?;
        let len = self.children(parent).len();
        self.insert_at(parent, len, child)
    }

    /// Inserts `child` as the first child of `parent`, moving it if it is attached elsewhere.
    ///
    /// # Errors
    ///
    /// Same as [`ProgramTree::append_child`].
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.prepare_insert(child, parent)?;
        self.insert_at(parent, 0, child)
    }

    /// Inserts `node` as the sibling immediately before `anchor`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleNode`] if `anchor` is detached or deleted.
    pub fn insert_before(&mut self, anchor: NodeId, node: NodeId) -> Result<()> {
        let (parent, _) = self.position_in_parent(anchor)?;
        self.prepare_insert(node, parent)?;
        let (_, index) = self.position_in_parent(anchor)?;
        self.insert_at(parent, index, node)
    }

    /// Inserts `node` as the sibling immediately after `anchor`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleNode`] if `anchor` is detached or deleted.
    pub fn insert_after(&mut self, anchor: NodeId, node: NodeId) -> Result<()> {
        let (parent, _) = self.position_in_parent(anchor)?;
        self.prepare_insert(node, parent)?;
        let (_, index) = self.position_in_parent(anchor)?;
        self.insert_at(parent, index + 1, node)
    }

    /// Puts `new` at the position of `old` and detaches `old`.
    ///
    /// `new` may be a descendant of `old` (e.g. replacing `a + b` by `a`); it is moved out
    /// of its current position first. The detached `old` stays alive and can be reused.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleNode`] if `old` has no parent, and [`Error::InvalidEdit`] if
    /// `new` is an ancestor of `old` or equal to it.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        self.get(old)?;
        if old == new {
            return Err(Error::InvalidEdit(format!("{old} cannot replace itself")));
        }
        let (parent, _) = self.position_in_parent(old)?;
        self.prepare_insert(new, parent)?;
        let (_, index) = self.position_in_parent(old)?;
        self.get_mut(parent)?.children[index] = new;
        self.get_mut(new)?.parent = Some(parent);
        self.get_mut(old)?.parent = None;
        Ok(())
    }

    /// Unlinks a node from its parent. Detaching a detached node is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleNode`] if the node was deleted.
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        let Some(parent) = self.get(id)?.parent else {
            return Ok(());
        };
        self.get_mut(parent)?.children.retain(|c| *c != id);
        self.get_mut(id)?.parent = None;
        Ok(())
    }

    /// Detaches a node and frees its whole subtree.
    ///
    /// Every handle into the subtree becomes stale.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleNode`] if the node was already deleted, and
    /// [`Error::InvalidEdit`] for the root.
    pub fn delete(&mut self, id: NodeId) -> Result<()> {
        if id == self.root {
            return Err(Error::InvalidEdit("the program root cannot be deleted".to_string()));
        }
        self.detach(id)?;
        for node in self.descendants(id) {
            let slot = &mut self.slots[node.index as usize];
            slot.node = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(node.index);
        }
        Ok(())
    }

    // ── Markers ─────────────────────────────────────────────────────────

    /// Attaches a marker to a node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEdit`] if the marker is not valid on the node's class.
    pub fn add_marker(&mut self, id: NodeId, marker: Marker) -> Result<()> {
        let node = self.get_mut(id)?;
        if !marker.is_valid_on(node.kind.class()) {
            return Err(Error::InvalidEdit(format!(
                "marker '{}' is not valid on {}",
                marker.name(),
                node.kind.label()
            )));
        }
        node.markers.insert(marker);
        Ok(())
    }

    /// Removes a marker from a node, returning whether it was present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleNode`] for stale handles.
    pub fn remove_marker(&mut self, id: NodeId, marker: &Marker) -> Result<bool> {
        Ok(self.get_mut(id)?.markers.remove(marker))
    }

    /// Returns `true` if the node carries `marker`.
    #[must_use]
    pub fn has_marker(&self, id: NodeId, marker: &Marker) -> bool {
        self.node(id).is_some_and(|n| n.has_marker(marker))
    }
}
