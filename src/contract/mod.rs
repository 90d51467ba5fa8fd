//! The contract model: the typed labels schedulables and drivers talk in.
//!
//! - [`Tag`] and [`Marker`] describe program state, globally and per node.
//! - [`Feature`] gates which schedulables may run.
//! - [`Production`] names what the driver wants to exist when the plan ends.
//! - [`Granularity`] and [`Adapter`] describe on which entities a schedulable runs.
//! - [`SchedulableDescriptor`] bundles all of the above into one contract.

mod descriptor;
mod feature;
mod granularity;
mod label;
mod production;

pub use descriptor::{ContractViolation, EntityFilter, SchedulableDescriptor};
pub use feature::{find_conflict, Feature};
pub use granularity::{Adapter, Granularity};
pub use label::{LabelSet, Marker, Tag, TagOrMarker};
pub use production::Production;

pub(crate) use feature::display_features;
