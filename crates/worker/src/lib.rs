//! Synapse sync orchestration.
//!
//! Sequences calls between the pure planner in [`reconciler`] and the Source
//! and Target adapters: lists projects, reads the Target state for each one,
//! asks the planner what to do, and executes the plan under per-call timeouts.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** No reconciliation rule lives here; every decision
//! comes from [`reconciler::reconcile`]. This crate owns ordering, failure
//! containment, concurrency, cancellation, and run-log emission.

pub mod calls;
pub mod driver;
mod executor;
pub mod journal;

pub use calls::CallPolicy;
pub use driver::{Worker, WorkerConfig};
pub use journal::{Journal, JsonlRunLog};
