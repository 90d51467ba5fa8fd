//! Shared fixtures for unit tests.
//!
//! - [`labels`]: the tags, markers and features the fixtures talk in
//! - [`sample_tree`]: a small program tree with one package and two types
//! - [`registry`]: a registry of no-op schedulables spanning every granularity

pub mod labels;
pub mod sample_tree;
