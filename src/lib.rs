// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
#![allow(clippy::too_many_arguments)]

//! # jack-scheduler
//!
//! Pass orchestration for a Java-to-dex compiler toolchain.
//!
//! A compiler pipeline is made of many small passes that rewrite the program tree. Each
//! pass declares a contract: the program properties it needs, forbids, adds and removes.
//! `jack-scheduler` derives an execution order satisfying every contract, runs it over the
//! program at the right granularity (whole program, package, type, method, field) and
//! lets passes rewrite the tree safely through deferred transformation requests.
//!
//! ## Features
//!
//! - **Declarative contracts** - tags, markers, features and productions instead of
//!   hand-maintained pass lists
//! - **Automatic planning** - a backtracking solver finds a minimal order or reports why
//!   none exists
//! - **Manual plans** - a builder that checks contracts while the plan is assembled
//! - **Plugins** - external passes are spliced into existing plans at legal positions
//! - **Transactional rewriting** - edits are queued while traversing and committed in order
//! - **Parallel execution** - sibling entities are processed on a `rayon` pool
//!
//! ## Quick Start
//!
//! ```rust
//! use jack_scheduler::prelude::*;
//!
//! const PARSED: Tag = Tag::new("Parsed");
//! const MARKED: Tag = Tag::new("Marked");
//! const EMITTED: Tag = Tag::new("Emitted");
//! const DEX: Production = Production::new("Dex", &[EMITTED]);
//!
//! let mut registry = SchedulableRegistry::new();
//! registry.register_fn(
//!     SchedulableDescriptor::new("Mark", Granularity::Session).needs(PARSED).adds(MARKED),
//!     |_cx| Ok(()),
//! )?;
//! registry.register_fn(
//!     SchedulableDescriptor::new("Emit", Granularity::Session).needs(MARKED).adds(EMITTED),
//!     |_cx| Ok(()),
//! )?;
//!
//! let mut request = Request::new(&registry);
//! request
//!     .add_production(DEX)
//!     .add_initial_tags_or_markers([PARSED])
//!     .add_all_schedulables();
//! let plan = request.build_plan(Granularity::Session)?;
//!
//! let mut session = Session::new(ProgramTree::new(), &[PARSED].into_iter().collect());
//! plan.process(&mut session, &CompilationContext::default())?;
//! assert!(session.has_tag(EMITTED));
//! # Ok::<(), jack_scheduler::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`contract`] - tags, markers, features, productions, granularities and descriptors
//! - [`schedulable`] - the pass trait and the registry cataloguing passes
//! - [`plan`] - requests, the planner, the plan builder, the amender and printers
//! - [`schedule`] - execution of a plan against a session
//! - [`transform`] - deferred, ordered tree edits
//! - [`tree`] - the arena-backed program tree and its visitor
//! - [`session`] - the session, the compilation context and the event log
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Configuration and planning errors
//! are reported before the program tree is modified:
//!
//! ```rust
//! use jack_scheduler::prelude::*;
//!
//! const EMITTED: Tag = Tag::new("Emitted");
//!
//! let registry = SchedulableRegistry::new();
//! let mut request = Request::new(&registry);
//! request.add_production(Production::new("Dex", &[EMITTED]));
//!
//! match request.build_plan(Granularity::Session) {
//!     Err(e) => assert!(e.is_configuration()),
//!     Ok(_) => unreachable!(),
//! }
//! ```
#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use jack_scheduler::prelude::*;
///
/// let registry = SchedulableRegistry::new();
/// let request = Request::new(&registry);
/// assert!(request.build_plan(Granularity::Session)?.is_empty());
/// # Ok::<(), jack_scheduler::Error>(())
/// ```
pub mod prelude;

pub mod contract;
pub mod plan;
pub mod schedulable;
pub mod schedule;
pub mod session;
pub mod transform;
pub mod tree;

/// `jack-scheduler` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `jack-scheduler` Error type
///
/// The main error type for all operations in this crate.
pub use error::{Error, ProcessError};
