//! Parameters for one repeated dispatch.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{DispatchError, SequenceError};
use crate::markup::BehaviorMark;
use crate::sequence::{DEFAULT_BEHAVIOR_SECONDS, DEFAULT_GAP_SECONDS};

/// Transition and blend window for repeated-dispatch marks.
const DISPATCH_BLEND_SECONDS: f64 = 0.1;

/// Parameters for the repeated dispatcher.
///
/// `gap_seconds` is the inter-send cadence: the task sends one behavior
/// command, sleeps the gap, then re-checks cancellation and elapsed time.
/// `total_seconds` of `None` means the dispatch runs until cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchPlan {
    /// Behavior token sent on every tick.
    pub behavior_token: String,
    /// Playback length annotated on each command, in seconds.
    pub behavior_seconds: f64,
    /// Sleep between sends, in seconds.
    pub gap_seconds: f64,
    /// Stop after this much elapsed time; `None` runs until cancelled.
    pub total_seconds: Option<f64>,
}

impl DispatchPlan {
    /// Create a plan for the given behavior token with the standard laugh
    /// cadence and a 60-second run.
    pub fn new(behavior_token: impl Into<String>) -> Self {
        Self {
            behavior_token: behavior_token.into(),
            behavior_seconds: DEFAULT_BEHAVIOR_SECONDS,
            gap_seconds: DEFAULT_GAP_SECONDS,
            total_seconds: Some(60.0),
        }
    }

    /// Set the per-command playback length.
    pub fn with_behavior_seconds(mut self, seconds: f64) -> Self {
        self.behavior_seconds = seconds;
        self
    }

    /// Set the inter-send cadence.
    pub fn with_gap_seconds(mut self, seconds: f64) -> Self {
        self.gap_seconds = seconds;
        self
    }

    /// Stop after the given elapsed time.
    pub fn with_total_seconds(mut self, seconds: f64) -> Self {
        self.total_seconds = Some(seconds);
        self
    }

    /// Run until cancelled.
    pub fn run_until_cancelled(mut self) -> Self {
        self.total_seconds = None;
        self
    }

    /// Validate the plan before a task is spawned.
    ///
    /// # Errors
    ///
    /// Rejects an empty token, non-finite inputs, a non-positive behavior
    /// duration or gap, and a total shorter than one behavior.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.behavior_token.is_empty() {
            return Err(SequenceError::EmptyToken.into());
        }
        if !self.behavior_seconds.is_finite() {
            return Err(SequenceError::NonFinite {
                field: "behavior_seconds",
            }
            .into());
        }
        if !self.gap_seconds.is_finite() {
            return Err(SequenceError::NonFinite {
                field: "gap_seconds",
            }
            .into());
        }
        if self.behavior_seconds <= 0.0 {
            return Err(SequenceError::NonPositiveBehavior {
                seconds: self.behavior_seconds,
            }
            .into());
        }
        if self.gap_seconds <= 0.0 {
            return Err(DispatchError::NonPositiveGap {
                seconds: self.gap_seconds,
            });
        }
        if let Some(total) = self.total_seconds {
            if !total.is_finite() {
                return Err(SequenceError::NonFinite {
                    field: "total_seconds",
                }
                .into());
            }
            if total < self.behavior_seconds {
                return Err(DispatchError::TotalTooShort {
                    total,
                    behavior: self.behavior_seconds,
                });
            }
        }
        Ok(())
    }

    /// Markup sent on every tick.
    pub fn tick_markup(&self) -> String {
        BehaviorMark::new(self.behavior_token.clone())
            .with_duration(self.behavior_seconds)
            .with_transition(DISPATCH_BLEND_SECONDS)
            .with_layer_blend(DISPATCH_BLEND_SECONDS)
            .render()
    }

    /// Inter-send sleep as a [`Duration`]. Call after [`validate`](Self::validate).
    pub fn gap(&self) -> Duration {
        Duration::from_secs_f64(self.gap_seconds)
    }

    /// Run length as a [`Duration`], if bounded. Call after [`validate`](Self::validate).
    pub fn total(&self) -> Option<Duration> {
        self.total_seconds.map(Duration::from_secs_f64)
    }
}
