//! Tempo and transpose controls.
//!
//! Tempo maps onto the player's pitch-corrected speed. Transpose resamples:
//! the stream is relabelled at `48000 * 2^(semitones/12)` Hz and resampled
//! back to 48 kHz, which shifts pitch without changing speed.

use crate::error::{Result, ServiceError};
use bridge_traits::PlayerControl;
use core_sequence::{LooperBus, LooperEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

pub const MIN_TEMPO: f64 = 0.25;
pub const MAX_TEMPO: f64 = 2.0;
pub const MIN_SEMITONES: i32 = -12;
pub const MAX_SEMITONES: i32 = 12;
const SAMPLE_RATE: u32 = 48_000;

/// Audio filter string for a transpose of `semitones`; empty when zero.
pub fn pitch_filter(semitones: i32) -> String {
    if semitones == 0 {
        return String::new();
    }
    let ratio = 2f64.powf(f64::from(semitones) / 12.0);
    let rate = (f64::from(SAMPLE_RATE) * ratio) as u32;
    format!("lavfi=[asetrate={},aresample={}]", rate, SAMPLE_RATE)
}

#[derive(Debug, Clone, Copy)]
struct Levels {
    tempo: f64,
    semitones: i32,
}

impl Default for Levels {
    fn default() -> Self {
        Self {
            tempo: 1.0,
            semitones: 0,
        }
    }
}

pub struct AudioEffects {
    bus: Arc<LooperBus>,
    player: Arc<dyn PlayerControl>,
    levels: Mutex<Levels>,
}

impl AudioEffects {
    pub fn new(bus: Arc<LooperBus>, player: Arc<dyn PlayerControl>) -> Self {
        Self {
            bus,
            player,
            levels: Mutex::new(Levels::default()),
        }
    }

    pub fn tempo(&self) -> f64 {
        self.levels.lock().tempo
    }

    pub fn semitones(&self) -> i32 {
        self.levels.lock().semitones
    }

    /// Set the speed multiplier, clamped to `[0.25, 2.0]`. Returns the applied value.
    pub async fn set_tempo(&self, tempo: f64) -> Result<f64> {
        if !tempo.is_finite() {
            return Err(ServiceError::InvalidEffect(format!("tempo {}", tempo)));
        }
        let tempo = tempo.clamp(MIN_TEMPO, MAX_TEMPO);
        self.player.set_speed(tempo).await?;
        self.levels.lock().tempo = tempo;
        debug!(tempo, "Tempo changed");
        self.publish();
        Ok(tempo)
    }

    /// Transpose by whole semitones, clamped to `[-12, 12]`. Returns the applied value.
    pub async fn set_semitones(&self, semitones: i32) -> Result<i32> {
        let semitones = semitones.clamp(MIN_SEMITONES, MAX_SEMITONES);
        let filter = pitch_filter(semitones);
        self.player.set_audio_filter(&filter).await?;
        self.levels.lock().semitones = semitones;
        debug!(semitones, filter = %filter, "Transpose changed");
        self.publish();
        Ok(semitones)
    }

    /// Back to normal speed and pitch.
    pub async fn reset(&self) -> Result<()> {
        self.player.set_speed(1.0).await?;
        self.player.set_audio_filter("").await?;
        *self.levels.lock() = Levels::default();
        self.publish();
        Ok(())
    }

    /// Push the current transpose to the player. Needed after a new stream
    /// loads, since players drop filters on load.
    pub async fn apply_filter(&self) -> Result<()> {
        let filter = pitch_filter(self.semitones());
        self.player.set_audio_filter(&filter).await?;
        Ok(())
    }

    fn publish(&self) {
        let levels = *self.levels.lock();
        self.bus.publish(LooperEvent::EffectsChanged {
            tempo: levels.tempo,
            semitones: levels.semitones,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_filter_rates() {
        assert_eq!(pitch_filter(0), "");
        assert_eq!(pitch_filter(12), "lavfi=[asetrate=96000,aresample=48000]");
        assert_eq!(pitch_filter(-12), "lavfi=[asetrate=24000,aresample=48000]");
        assert_eq!(pitch_filter(1), "lavfi=[asetrate=50854,aresample=48000]");
    }
}
