//! Repeated-behavior dispatch: plans, handles, and the background runner.

pub mod plan;
pub mod runner;

pub use plan::DispatchPlan;
pub use runner::{DispatchHandle, DispatchId, DispatchState, Dispatcher};
