//! The program tree owned by a compilation session.
//!
//! Nodes live in an arena ([`ProgramTree`]) and are addressed by generational
//! [`NodeId`]s. The closed set of node kinds is the [`NodeKind`] enum; traversals use the
//! [`Visitor`] trait and pattern matching instead of per-kind virtual dispatch.
//!
//! Only the session mutates the tree. Passes read it and queue their edits in a
//! [`TransformationRequest`](crate::transform::TransformationRequest).

mod arena;
mod node;
mod visitor;

pub use arena::ProgramTree;
pub use node::{BinaryOp, EntityClass, Node, NodeId, NodeKind, NodeTemplate, UnaryOp};
pub use visitor::{CollectKind, Visitor};
