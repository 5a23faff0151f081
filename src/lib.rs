//! Robot behavior sequencing and dispatch.
//!
//! Two strategies for playing a behavior for an extended stretch of time,
//! both emitting markup through a host-owned device transport:
//!
//! - the **sequence builder** renders N timed repetitions with pauses into
//!   one markup payload sent once ([`sequence`])
//! - the **repeated dispatcher** sends individual commands on a cadence
//!   from a cancellable background task ([`dispatch`])
//!
//! The [`router`] module ties both to the command surface the host
//! application exposes, with catalog lookups, markup validation, and the
//! interrupt path.

pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod markup;
pub mod router;
pub mod sequence;
pub mod transport;
pub mod validator;

pub use config::TimingConfig;
pub use dispatch::{DispatchHandle, DispatchId, DispatchPlan, DispatchState, Dispatcher};
pub use errors::{DispatchError, SequenceError};
pub use router::CommandRouter;
pub use sequence::{SequenceSpec, TimedSequence, build_timed_sequence};
pub use transport::{DeviceTransport, LogTransport, TransportError};
