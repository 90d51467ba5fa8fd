//! Deferred, ordered tree edits.
//!
//! A pass decides what to change while reading the tree and records the changes in a
//! [`TransformationRequest`]. The request is applied in one go after the read-only walk,
//! so no traversal ever observes a tree that changes beneath it.

mod request;
mod step;

pub use request::TransformationRequest;
pub use step::{Insertion, TransformationStep};
