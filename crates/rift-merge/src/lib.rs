//! Merged views for the Rift vault.
//!
//! An owner can share their store with others through a bound sharing
//! object. Each object contributes one edge to the [`DelegationGraph`]:
//! the delegator's view is merged into the root's. Edges are validated at
//! creation so that every view is at most one hop deep.
//!
//! A [`ViewPlan`] lists which ledgers a viewer sees, in visit order, and a
//! [`MergedView`] aggregates those ledgers into per-template totals.

pub mod error;
pub mod graph;
pub mod plan;
pub mod view;

pub use error::{MergeError, MergeResult, RejectReason};
pub use graph::{DelegationEdge, DelegationGraph};
pub use plan::ViewPlan;
pub use view::{MergedView, ViewEntry};
