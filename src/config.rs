//! Timing configuration for the command router.
//!
//! Defaults encode the tuned 60-second laugh: 1.5 s of laugh plus a 0.5 s
//! break per cycle, 30 cycles. Hosts override these from their own
//! settings layer; the CLI loads them from a JSON file.

use serde::{Deserialize, Serialize};

use crate::catalog::FOURCOUNT_LAUGH;
use crate::sequence::SequenceSpec;

/// Timing defaults used by the router's convenience entry points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Behavior token for the prebuilt laugh sequence.
    pub laugh_behavior: String,
    /// Playback length of one repetition in seconds.
    pub behavior_seconds: f64,
    /// Pause between repetitions in seconds.
    pub gap_seconds: f64,
    /// Target total duration in seconds.
    pub total_seconds: f64,
    /// Delay between preset steps in milliseconds.
    pub preset_step_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            laugh_behavior: FOURCOUNT_LAUGH.to_string(),
            behavior_seconds: 1.5,
            gap_seconds: 0.5,
            total_seconds: 60.0,
            preset_step_delay_ms: 500,
        }
    }
}

impl TimingConfig {
    /// Set the behavior token for the prebuilt sequence.
    pub fn with_laugh_behavior(mut self, token: impl Into<String>) -> Self {
        self.laugh_behavior = token.into();
        self
    }

    /// Set the per-repetition playback length.
    pub fn with_behavior_seconds(mut self, seconds: f64) -> Self {
        self.behavior_seconds = seconds;
        self
    }

    /// Set the pause between repetitions.
    pub fn with_gap_seconds(mut self, seconds: f64) -> Self {
        self.gap_seconds = seconds;
        self
    }

    /// Set the target total duration.
    pub fn with_total_seconds(mut self, seconds: f64) -> Self {
        self.total_seconds = seconds;
        self
    }

    /// Sequence spec for the configured laugh, with an optional override
    /// of the target duration.
    pub fn laugh_spec(&self, total_seconds: Option<f64>) -> SequenceSpec {
        SequenceSpec::new(
            total_seconds.unwrap_or(self.total_seconds),
            self.laugh_behavior.clone(),
        )
        .with_behavior_seconds(self.behavior_seconds)
        .with_gap_seconds(self.gap_seconds)
    }
}
