//! Markup element builders and structural matchers.
//!
//! All instructions sent to a device are serialized as markup: `<mark/>`
//! elements carrying an embedded command payload, `<break/>` elements for
//! timed pauses, and plain text for speech. This module owns the exact
//! rendered form of each element and the matchers used to locate elements
//! in generated markup.
//!
//! Anything that needs to inspect markup must go through the matchers here,
//! which key on the element tag and attribute. Splitting markup on
//! whitespace breaks as soon as an element contains spaces in an attribute
//! value.

use std::sync::LazyLock;

use regex::Regex;

/// Complete `<break/>` element with its `time` attribute captured.
static BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<break\b[^>]*\btime="([^"]*)"[^>]*/>"#).expect("break pattern is valid")
});

/// Complete `<mark/>` element with its `name` attribute captured.
static MARK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<mark\b[^>]*\bname="([^"]*)"[^>]*/>"#).expect("mark pattern is valid")
});

/// Format a duration or level value the way device payloads expect:
/// whole numbers keep one decimal place (`2.0`, not `2`), fractional
/// values print as-is. Rendered values round-trip by exact string match.
pub fn fmt_decimal(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// One behaviour-tree command mark.
///
/// Field defaults match the conventional values the device firmware
/// expects for a standalone gesture; sequence and dispatch callers
/// override `duration` and tighten the blend windows.
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorMark {
    /// Behavior token, passed through verbatim.
    pub behaviour: String,
    /// Blend-in transition in seconds.
    pub transition: f64,
    /// Playback duration in seconds.
    pub duration: f64,
    /// On-device repeat count for this single mark.
    pub repeat: u32,
    /// Animation layer blend-in window in seconds.
    pub layer_blend_in: f64,
    /// Animation layer blend-out window in seconds.
    pub layer_blend_out: f64,
    /// Whether the behavior blocks the speech pipeline.
    pub blocking: bool,
    /// Event name slot in the payload.
    pub event_name: String,
    /// Category slot in the payload.
    pub category: String,
}

impl BehaviorMark {
    /// Create a mark for the given behavior token with standard defaults.
    pub fn new(behaviour: impl Into<String>) -> Self {
        Self {
            behaviour: behaviour.into(),
            transition: 0.3,
            duration: 2.0,
            repeat: 1,
            layer_blend_in: 0.4,
            layer_blend_out: 0.4,
            blocking: false,
            event_name: "Gesture_None".to_string(),
            category: "None".to_string(),
        }
    }

    /// Set the playback duration in seconds.
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = seconds;
        self
    }

    /// Set the blend-in transition in seconds.
    pub fn with_transition(mut self, seconds: f64) -> Self {
        self.transition = seconds;
        self
    }

    /// Set both layer blend windows in seconds.
    pub fn with_layer_blend(mut self, seconds: f64) -> Self {
        self.layer_blend_in = seconds;
        self.layer_blend_out = seconds;
        self
    }

    /// Set the on-device repeat count.
    pub fn with_repeat(mut self, repeat: u32) -> Self {
        self.repeat = repeat;
        self
    }

    /// Set whether the behavior blocks the speech pipeline.
    pub fn with_blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    /// Render the mark element.
    ///
    /// The command payload is a brace-delimited object whose keys and
    /// string values are fenced with `+` instead of quotes, since the
    /// payload lives inside an XML attribute value.
    pub fn render(&self) -> String {
        format!(
            "<mark name=\"cmd:behaviour-tree,data:{{+transition+:{},+duration+:{},+repeat+:{},+layerBlendInTime+:{},+layerBlendOutTime+:{},+blocking+:{},+action+:0,+eventName+:+{}+,+category+:+{}+,+behaviour+:+{}+,+Track+:++}}\"/>",
            fmt_decimal(self.transition),
            fmt_decimal(self.duration),
            self.repeat,
            fmt_decimal(self.layer_blend_in),
            fmt_decimal(self.layer_blend_out),
            self.blocking,
            self.event_name,
            self.category,
            self.behaviour,
        )
    }
}

/// One playaudio command mark.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioMark {
    /// Sound asset name.
    pub sound: String,
    /// Loop the sound until replaced or faded out.
    pub loop_sound: bool,
    /// Playback volume, 0.0 - 1.0.
    pub volume: f64,
    /// Fade-in window in seconds.
    pub fade_in: f64,
    /// Fade-out window in seconds.
    pub fade_out: f64,
    /// Replace whatever is currently playing on the channel.
    pub replace_current: bool,
}

impl AudioMark {
    /// Create a mark for the given sound asset with standard defaults.
    pub fn new(sound: impl Into<String>) -> Self {
        Self {
            sound: sound.into(),
            loop_sound: false,
            volume: 0.75,
            fade_in: 0.0,
            fade_out: 2.0,
            replace_current: false,
        }
    }

    /// Set the playback volume.
    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    /// Loop the sound and fade it out after the given window.
    pub fn with_loop_until(mut self, fade_out_seconds: f64) -> Self {
        self.loop_sound = true;
        self.replace_current = true;
        self.fade_out = fade_out_seconds;
        self
    }

    /// Render the mark element.
    pub fn render(&self) -> String {
        format!(
            "<mark name=\"cmd:playaudio,data:{{+SoundToPlay+:+{}+,+LoopSound+:{},+playInBackground+:false,+channel+:1,+ReplaceCurrentSound+:{},+PlayImmediate+:true,+ForceQueue+:false,+Volume+:{},+FadeInTime+:{},+FadeOutTime+:{},+AudioTimelineField+:+none+}}\"/>",
            self.sound,
            self.loop_sound,
            self.replace_current,
            fmt_decimal(self.volume),
            fmt_decimal(self.fade_in),
            fmt_decimal(self.fade_out),
        )
    }
}

/// Render a pause element of the given length.
pub fn break_mark(seconds: f64) -> String {
    format!("<break time=\"{}s\"/>", fmt_decimal(seconds))
}

/// Extract the `time` attribute of every `<break/>` element, in order.
pub fn break_times(markup: &str) -> Vec<String> {
    BREAK_RE
        .captures_iter(markup)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Extract the `name` attribute of every `<mark/>` element, in order.
pub fn mark_names(markup: &str) -> Vec<String> {
    MARK_RE
        .captures_iter(markup)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Count the mark elements whose payload carries the given behavior token.
pub fn behavior_occurrences(markup: &str, token: &str) -> usize {
    let needle = format!("+behaviour+:+{token}+");
    mark_names(markup)
        .iter()
        .filter(|name| name.contains(&needle))
        .count()
}
