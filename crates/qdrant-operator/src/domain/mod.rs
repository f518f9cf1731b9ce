//! Value objects exchanged between controllers and use cases.
//!
//! Spec objects are built once per reconcile from the custom resource and
//! never mutated. Status objects are produced fresh by each use case and
//! serialize to the persisted camelCase layout.

mod backup;
mod cluster;
mod condition;
mod phase;
mod restore;
mod schedule;
mod storage;

pub use backup::*;
pub use cluster::*;
pub use condition::Condition;
pub use phase::*;
pub use restore::*;
pub use schedule::*;
pub use storage::*;
