//! Typed error hierarchy for the behavior dispatch crate.
//!
//! Two top-level enums cover the two subsystems:
//! - `SequenceError` — invalid timing inputs to the sequence builder,
//!   rejected synchronously before any markup is built
//! - `DispatchError` — failures from the repeated dispatcher and the
//!   command router

use thiserror::Error;

use crate::dispatch::DispatchId;
use crate::transport::TransportError;
use crate::validator::MarkupError;

/// Errors from the sequence builder's parameter validation.
#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("behavior duration must be positive, got {seconds}")]
    NonPositiveBehavior { seconds: f64 },

    #[error("gap duration must not be negative, got {seconds}")]
    NegativeGap { seconds: f64 },

    #[error("total duration must be positive, got {seconds}")]
    NonPositiveTotal { seconds: f64 },

    #[error("timing input is not a finite number: {field}")]
    NonFinite { field: &'static str },

    #[error("behavior token must not be empty")]
    EmptyToken,
}

/// Errors from the repeated dispatcher and the command router.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("device {device_id} already has a running dispatch")]
    AlreadyRunning { device_id: String },

    #[error("unknown dispatch handle {id}")]
    UnknownHandle { id: DispatchId },

    #[error("dispatch gap must be positive, got {seconds}")]
    NonPositiveGap { seconds: f64 },

    #[error("total duration {total} is shorter than one behavior ({behavior})")]
    TotalTooShort { total: f64, behavior: f64 },

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    Markup(#[from] MarkupError),

    #[error("transport send failed: {0}")]
    Transport(#[from] TransportError),
}
