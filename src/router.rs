//! Command router facade.
//!
//! The surface the host application's command layer calls into. Every
//! outbound payload is validated before it reaches the transport. The two
//! laugh strategies live here: the prebuilt timed sequence (one markup
//! payload, sent once) and the repeated dispatch (a background task the
//! interrupt path can cancel).
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use marionette::config::TimingConfig;
//! use marionette::router::CommandRouter;
//! use marionette::transport::LogTransport;
//!
//! # async fn example() -> Result<(), marionette::errors::DispatchError> {
//! let router = CommandRouter::new(Arc::new(LogTransport), TimingConfig::default());
//! router.prebuilt_sequence("device_123", None).await?;
//! router.interrupt("device_123").await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::catalog::{self, PresetStep};
use crate::config::TimingConfig;
use crate::dispatch::{DispatchHandle, DispatchPlan, Dispatcher};
use crate::errors::DispatchError;
use crate::markup::AudioMark;
use crate::transport::DeviceTransport;
use crate::validator::validate_markup;

/// Routes host commands to the sequence builder, the dispatcher, and the
/// device transport.
pub struct CommandRouter {
    transport: Arc<dyn DeviceTransport>,
    dispatcher: Dispatcher,
    config: TimingConfig,
}

impl CommandRouter {
    /// Create a router sending through the given transport.
    pub fn new(transport: Arc<dyn DeviceTransport>, config: TimingConfig) -> Self {
        Self {
            dispatcher: Dispatcher::new(Arc::clone(&transport)),
            transport,
            config,
        }
    }

    /// The dispatcher behind this router.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Build and send the configured timed sequence in one payload.
    ///
    /// `total_seconds` overrides the configured target duration. The
    /// single send has no retry loop, so a transport failure surfaces
    /// immediately.
    pub async fn prebuilt_sequence(
        &self,
        device_id: &str,
        total_seconds: Option<f64>,
    ) -> Result<(), DispatchError> {
        let sequence = self.config.laugh_spec(total_seconds).build()?;
        let markup = sequence.render();
        validate_markup(&markup)?;
        info!(
            device_id,
            behaviors = sequence.behavior_count(),
            realized_seconds = sequence.realized_seconds(),
            "sending prebuilt sequence"
        );
        self.transport.send_markup(device_id, &markup).await?;
        Ok(())
    }

    /// Start a repeated-behavior dispatch, returning its handle.
    pub fn repeated_behavior(
        &self,
        device_id: &str,
        plan: DispatchPlan,
    ) -> Result<DispatchHandle, DispatchError> {
        self.dispatcher.start_repeated(device_id, plan)
    }

    /// Cancel the device's active dispatch, if any, then interrupt
    /// on-device playback.
    pub async fn interrupt(&self, device_id: &str) -> Result<(), DispatchError> {
        if let Some(handle) = self.dispatcher.active_dispatch(device_id) {
            info!(device_id, dispatch = %handle.id(), "interrupt cancels active dispatch");
            self.dispatcher.cancel(handle.id())?;
        }
        self.transport.send_interrupt(device_id).await?;
        Ok(())
    }

    /// Play the behavior a quick-action alias resolves to.
    pub async fn quick_action(&self, device_id: &str, action: &str) -> Result<(), DispatchError> {
        self.behavior(device_id, catalog::quick_action_behavior(action))
            .await
    }

    /// Play a named behavior once.
    pub async fn behavior(&self, device_id: &str, name: &str) -> Result<(), DispatchError> {
        let markup = catalog::behavior_markup(name);
        validate_markup(&markup)?;
        self.transport.send_markup(device_id, &markup).await?;
        Ok(())
    }

    /// Play a sound effect once.
    pub async fn sound_effect(
        &self,
        device_id: &str,
        sound: &str,
        volume: f64,
    ) -> Result<(), DispatchError> {
        let markup = AudioMark::new(sound).with_volume(volume).render();
        validate_markup(&markup)?;
        self.transport.send_markup(device_id, &markup).await?;
        Ok(())
    }

    /// Play a named preset routine, one step at a time with a short delay
    /// between steps. Unknown presets send nothing.
    pub async fn preset(&self, device_id: &str, name: &str) -> Result<(), DispatchError> {
        let Some(steps) = catalog::preset_steps(name) else {
            warn!(device_id, preset = name, "unknown preset, nothing sent");
            return Ok(());
        };
        let delay = Duration::from_millis(self.config.preset_step_delay_ms);
        for (index, step) in steps.iter().enumerate() {
            if index > 0 {
                sleep(delay).await;
            }
            match step {
                PresetStep::Speak { text } => {
                    validate_markup(text)?;
                    self.transport.send_markup(device_id, text).await?;
                }
                PresetStep::Behavior { name } => self.behavior(device_id, name).await?,
                PresetStep::SoundEffect { sound, volume } => {
                    self.sound_effect(device_id, sound, *volume).await?;
                }
            }
        }
        Ok(())
    }
}
