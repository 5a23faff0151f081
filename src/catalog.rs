//! Behavior catalog: quick-action aliases, named behavior commands, and
//! preset routines.
//!
//! The catalog is the single place that knows which behavior tokens exist
//! and how their full command markup looks. Everything else works with
//! opaque tokens.

use serde::{Deserialize, Serialize};

use crate::markup::{AudioMark, BehaviorMark};

/// Behavior token used when an alias is unknown.
pub const NEUTRAL_GESTURE: &str = "Gesture_None";

/// The four-count laugh used by the timed laugh features.
pub const FOURCOUNT_LAUGH: &str = "Bht_Vg_Laugh_Big_Fourcount";

/// Looping laugh audio asset paired with the four-count laugh.
const LAUGH_LOOP_SOUND: &str = "sfx_moxie_laugh_loop";

/// Resolve a quick-action alias to its behavior token.
///
/// Unknown aliases fall back to the neutral gesture so a typo in the host
/// UI never sends an unknown token to the device.
pub fn quick_action_behavior(action: &str) -> &'static str {
    match action {
        "celebrate" => "Bht_Spin_360",
        "dance" => "Bht_Circle_motion",
        "laugh" => FOURCOUNT_LAUGH,
        "wave" => "Bht_Wait_Hug",
        "point" => "Bht_Photo_pose_Curious",
        "think" => "Bht_Vg_Hmm_Confused_Sustained",
        "surprise" => "Bht_Startled",
        "bow" => "Bht_Turn_Away",
        "snore" => "Bht_Vg_Snore_Heavy",
        _ => NEUTRAL_GESTURE,
    }
}

/// Full command markup for a named behavior.
///
/// The four-count laugh is special: it pairs a looping audio bed with a
/// behaviour-tree mark that repeats the animation on-device. Every other
/// name renders the standard single-shot template.
pub fn behavior_markup(name: &str) -> String {
    if name == FOURCOUNT_LAUGH {
        let audio = AudioMark::new(LAUGH_LOOP_SOUND)
            .with_volume(1.0)
            .with_loop_until(60.0)
            .render();
        let behavior = BehaviorMark::new(name)
            .with_duration(4.0)
            .with_repeat(15)
            .with_transition(0.0)
            .with_layer_blend(0.0)
            .render();
        format!("{audio}{behavior}")
    } else {
        BehaviorMark::new(name).render()
    }
}

/// One step of a preset routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PresetStep {
    /// Speak a line (plain text travels through markup verbatim).
    Speak { text: String },
    /// Play a named behavior.
    Behavior { name: String },
    /// Play a sound effect.
    SoundEffect { sound: String, volume: f64 },
}

/// Steps of a named preset routine, or `None` for an unknown name.
pub fn preset_steps(name: &str) -> Option<Vec<PresetStep>> {
    let steps = match name {
        "greeting" => vec![
            PresetStep::Speak {
                text: "Hello there! How are you doing today?".to_string(),
            },
            PresetStep::Behavior {
                name: "Bht_Wait_Hug".to_string(),
            },
        ],
        "party" => vec![
            PresetStep::SoundEffect {
                sound: "sfxmm_incoming02".to_string(),
                volume: 0.8,
            },
            PresetStep::Behavior {
                name: "Bht_Vg_Laugh_Big".to_string(),
            },
            PresetStep::Behavior {
                name: "Bht_Spin_360".to_string(),
            },
            PresetStep::Speak {
                text: "Party time! Let's celebrate!".to_string(),
            },
        ],
        "calm" => vec![
            PresetStep::Behavior {
                name: "Bht_sigh_relief".to_string(),
            },
            PresetStep::Speak {
                text: "Let's take a deep breath and relax.".to_string(),
            },
            PresetStep::Behavior {
                name: "Bht_yawn_big".to_string(),
            },
        ],
        "dj_session" => vec![
            PresetStep::Speak {
                text: "Let's get this party started!".to_string(),
            },
            PresetStep::Behavior {
                name: "Bht_Back_and_forth_arm_wave".to_string(),
            },
            PresetStep::SoundEffect {
                sound: "sfxmm_incoming02".to_string(),
                volume: 0.9,
            },
            PresetStep::Behavior {
                name: "Bht_Spin_360".to_string(),
            },
        ],
        _ => return None,
    };
    Some(steps)
}
