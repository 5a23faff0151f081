//! Timed sequence builder.
//!
//! Builds a single markup string that plays one behavior N times with
//! timed pauses in between, aiming at a target total duration. The build
//! is a pure computation: identical inputs yield byte-identical markup,
//! with no wall-clock or randomness involved.
//!
//! The repeat count is `floor(total / (behavior + gap))`, floored at one,
//! so the realized duration `n*behavior + (n-1)*gap` undershoots the
//! target by less than one cycle. Callers accept the approximation.

use crate::errors::SequenceError;
use crate::markup::{BehaviorMark, break_mark};

/// Behavior playback length used when a spec does not override it.
pub const DEFAULT_BEHAVIOR_SECONDS: f64 = 1.5;

/// Pause length used when a spec does not override it.
pub const DEFAULT_GAP_SECONDS: f64 = 0.5;

/// Transition and blend window for marks inside a sequence. Tighter than
/// the standalone-gesture defaults so back-to-back repetitions stay crisp.
const SEQUENCE_BLEND_SECONDS: f64 = 0.1;

/// One element of a timed sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceElement {
    /// A behavior playback slot.
    Behavior { token: String, seconds: f64 },
    /// A pause between two behavior slots.
    Pause { seconds: f64 },
}

impl SequenceElement {
    fn render(&self) -> String {
        match self {
            SequenceElement::Behavior { token, seconds } => BehaviorMark::new(token.clone())
                .with_duration(*seconds)
                .with_transition(SEQUENCE_BLEND_SECONDS)
                .with_layer_blend(SEQUENCE_BLEND_SECONDS)
                .render(),
            SequenceElement::Pause { seconds } => break_mark(*seconds),
        }
    }

    fn seconds(&self) -> f64 {
        match self {
            SequenceElement::Behavior { seconds, .. } => *seconds,
            SequenceElement::Pause { seconds } => *seconds,
        }
    }
}

/// An immutable, fully built sequence.
///
/// Always starts and ends with a behavior element; pauses only occur
/// between consecutive behaviors, so `pause_count == behavior_count - 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedSequence {
    elements: Vec<SequenceElement>,
}

impl TimedSequence {
    /// The ordered elements of the sequence.
    pub fn elements(&self) -> &[SequenceElement] {
        &self.elements
    }

    /// Number of behavior slots.
    pub fn behavior_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| matches!(e, SequenceElement::Behavior { .. }))
            .count()
    }

    /// Number of pauses.
    pub fn pause_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| matches!(e, SequenceElement::Pause { .. }))
            .count()
    }

    /// Total playback time the sequence encodes.
    pub fn realized_seconds(&self) -> f64 {
        self.elements.iter().map(SequenceElement::seconds).sum()
    }

    /// Serialize the sequence into one markup string.
    pub fn render(&self) -> String {
        self.elements
            .iter()
            .map(SequenceElement::render)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Parameters for building a timed sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceSpec {
    /// Target total duration in seconds.
    pub total_seconds: f64,
    /// Behavior token to repeat.
    pub behavior_token: String,
    /// Playback length of one repetition.
    pub behavior_seconds: f64,
    /// Pause between repetitions.
    pub gap_seconds: f64,
}

impl SequenceSpec {
    /// Create a spec for the given target duration and behavior token.
    pub fn new(total_seconds: f64, behavior_token: impl Into<String>) -> Self {
        Self {
            total_seconds,
            behavior_token: behavior_token.into(),
            behavior_seconds: DEFAULT_BEHAVIOR_SECONDS,
            gap_seconds: DEFAULT_GAP_SECONDS,
        }
    }

    /// Set the playback length of one repetition.
    pub fn with_behavior_seconds(mut self, seconds: f64) -> Self {
        self.behavior_seconds = seconds;
        self
    }

    /// Set the pause between repetitions.
    pub fn with_gap_seconds(mut self, seconds: f64) -> Self {
        self.gap_seconds = seconds;
        self
    }

    /// Build the sequence.
    ///
    /// # Errors
    ///
    /// Rejects non-finite inputs, an empty behavior token, a non-positive
    /// behavior or total duration, and a negative gap, all before any
    /// markup is built.
    pub fn build(&self) -> Result<TimedSequence, SequenceError> {
        if !self.total_seconds.is_finite() {
            return Err(SequenceError::NonFinite {
                field: "total_seconds",
            });
        }
        if !self.behavior_seconds.is_finite() {
            return Err(SequenceError::NonFinite {
                field: "behavior_seconds",
            });
        }
        if !self.gap_seconds.is_finite() {
            return Err(SequenceError::NonFinite {
                field: "gap_seconds",
            });
        }
        if self.behavior_token.is_empty() {
            return Err(SequenceError::EmptyToken);
        }
        if self.behavior_seconds <= 0.0 {
            return Err(SequenceError::NonPositiveBehavior {
                seconds: self.behavior_seconds,
            });
        }
        if self.gap_seconds < 0.0 {
            return Err(SequenceError::NegativeGap {
                seconds: self.gap_seconds,
            });
        }
        if self.total_seconds <= 0.0 {
            return Err(SequenceError::NonPositiveTotal {
                seconds: self.total_seconds,
            });
        }

        let cycle = self.behavior_seconds + self.gap_seconds;
        // A target shorter than one behavior still plays it once.
        let count = ((self.total_seconds / cycle).floor() as usize).max(1);

        let mut elements = Vec::with_capacity(count * 2 - 1);
        for i in 0..count {
            elements.push(SequenceElement::Behavior {
                token: self.behavior_token.clone(),
                seconds: self.behavior_seconds,
            });
            if i + 1 < count {
                elements.push(SequenceElement::Pause {
                    seconds: self.gap_seconds,
                });
            }
        }

        Ok(TimedSequence { elements })
    }
}

/// Build a timed sequence from the four raw parameters.
pub fn build_timed_sequence(
    total_seconds: f64,
    behavior_token: &str,
    behavior_seconds: f64,
    gap_seconds: f64,
) -> Result<TimedSequence, SequenceError> {
    SequenceSpec::new(total_seconds, behavior_token)
        .with_behavior_seconds(behavior_seconds)
        .with_gap_seconds(gap_seconds)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{behavior_occurrences, break_times};

    const LAUGH: &str = "Bht_Vg_Laugh_Big_Fourcount";

    #[test]
    fn sixty_seconds_of_laughs_is_thirty_cycles() {
        let seq = build_timed_sequence(60.0, LAUGH, 1.5, 0.5).unwrap();
        assert_eq!(seq.behavior_count(), 30);
        assert_eq!(seq.pause_count(), 29);
        assert_eq!(seq.realized_seconds(), 30.0 * 1.5 + 29.0 * 0.5);
        assert_eq!(seq.realized_seconds(), 59.5);
    }

    #[test]
    fn uneven_cycle_floors_the_repeat_count() {
        // 60 / 2.3 = 26.08, so the count floors to 26, never rounds up.
        let seq = build_timed_sequence(60.0, LAUGH, 2.0, 0.3).unwrap();
        assert_eq!(seq.behavior_count(), 26);
        assert_eq!(seq.pause_count(), 25);
        // 26*2.0 + 25*0.3 = 59.5, up to float accumulation in the sum.
        assert!((seq.realized_seconds() - 59.5).abs() < 1e-9);
    }

    #[test]
    fn realized_duration_undershoots_by_less_than_one_cycle() {
        for &(total, behavior, gap) in &[
            (60.0, 1.5, 0.5),
            (60.0, 2.0, 0.3),
            (45.0, 3.0, 1.0),
            (10.0, 1.0, 0.0),
            (7.3, 2.1, 0.9),
        ] {
            let cycle = behavior + gap;
            let seq = build_timed_sequence(total, LAUGH, behavior, gap).unwrap();
            let realized = seq.realized_seconds();
            assert!(realized <= total, "realized {realized} > total {total}");
            assert!(
                realized > total - cycle,
                "realized {realized} not within one cycle of {total}"
            );
        }
    }

    #[test]
    fn target_shorter_than_one_behavior_plays_it_once() {
        let seq = build_timed_sequence(1.0, LAUGH, 2.0, 0.5).unwrap();
        assert_eq!(seq.behavior_count(), 1);
        assert_eq!(seq.pause_count(), 0);
        assert_eq!(seq.realized_seconds(), 2.0);
    }

    #[test]
    fn sequence_starts_and_ends_with_a_behavior() {
        let seq = build_timed_sequence(60.0, LAUGH, 1.5, 0.5).unwrap();
        let elements = seq.elements();
        assert!(matches!(elements.first(), Some(SequenceElement::Behavior { .. })));
        assert!(matches!(elements.last(), Some(SequenceElement::Behavior { .. })));
    }

    #[test]
    fn rendered_markup_is_structurally_countable() {
        let markup = build_timed_sequence(60.0, LAUGH, 1.5, 0.5).unwrap().render();
        assert_eq!(behavior_occurrences(&markup, LAUGH), 30);
        let breaks = break_times(&markup);
        assert_eq!(breaks.len(), 29);
        assert!(breaks.iter().all(|t| t == "0.5s"));
        assert!(markup.starts_with("<mark name=\"cmd:behaviour-tree"));
    }

    #[test]
    fn identical_inputs_build_byte_identical_markup() {
        let a = build_timed_sequence(60.0, LAUGH, 1.5, 0.5).unwrap().render();
        let b = build_timed_sequence(60.0, LAUGH, 1.5, 0.5).unwrap().render();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_behavior_duration_is_rejected_before_building() {
        let err = build_timed_sequence(60.0, LAUGH, 0.0, 0.5).unwrap_err();
        assert!(matches!(err, SequenceError::NonPositiveBehavior { .. }));
    }

    #[test]
    fn negative_gap_is_rejected() {
        let err = build_timed_sequence(60.0, LAUGH, 1.5, -0.1).unwrap_err();
        assert!(matches!(err, SequenceError::NegativeGap { .. }));
    }

    #[test]
    fn non_finite_total_is_rejected() {
        let err = build_timed_sequence(f64::NAN, LAUGH, 1.5, 0.5).unwrap_err();
        assert!(matches!(err, SequenceError::NonFinite { field: "total_seconds" }));
    }

    #[test]
    fn empty_token_is_rejected() {
        let err = build_timed_sequence(60.0, "", 1.5, 0.5).unwrap_err();
        assert!(matches!(err, SequenceError::EmptyToken));
    }

    #[test]
    fn zero_gap_is_allowed() {
        let seq = build_timed_sequence(6.0, LAUGH, 2.0, 0.0).unwrap();
        assert_eq!(seq.behavior_count(), 3);
        assert_eq!(seq.pause_count(), 2);
        assert_eq!(seq.realized_seconds(), 6.0);
    }
}
