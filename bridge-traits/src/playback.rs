//! Playback bridge traits.
//!
//! The media engine lives outside the core. It reports position, duration and
//! pause state by publishing events onto the bus, and accepts the commands
//! declared by [`PlayerControl`]. Positions are floating-point seconds; the
//! core never asks for sample-exact cuts.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// How a seek target is interpreted by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekMode {
    /// Jump to an absolute position, decoding up to the exact timestamp.
    AbsoluteExact,
    /// Move by an offset from the current position, decoding exactly.
    RelativeExact,
}

impl SeekMode {
    /// Player command keyword for this mode (e.g. `absolute+exact`).
    pub fn as_command(&self) -> &'static str {
        match self {
            SeekMode::AbsoluteExact => "absolute+exact",
            SeekMode::RelativeExact => "relative+exact",
        }
    }
}

/// Pause state reported by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Playing,
    Paused,
}

impl PlaybackState {
    /// Map the player's `paused` flag onto a state.
    pub fn from_paused(paused: bool) -> Self {
        if paused {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        }
    }
}

/// Commands accepted by the host media engine.
///
/// Implementations must be cheap to call from a tokio task; the core issues
/// seeks from a dedicated dispatch worker and never awaits them on the thread
/// that delivers position updates.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::playback::{PlayerControl, SeekMode};
///
/// async fn rewind(player: &dyn PlayerControl) -> Result<()> {
///     player.seek(-5.0, SeekMode::RelativeExact).await
/// }
/// ```
#[async_trait::async_trait]
pub trait PlayerControl: Send + Sync {
    /// Open a stream URL in the player.
    async fn load(&self, url: &str) -> Result<()>;

    /// Seek to `position` seconds (or by `position` seconds for relative modes).
    async fn seek(&self, position: f64, mode: SeekMode) -> Result<()>;

    /// Resume playback.
    async fn play(&self) -> Result<()>;

    /// Pause playback.
    async fn pause(&self) -> Result<()>;

    /// Whether the player is currently paused.
    async fn is_paused(&self) -> Result<bool>;

    /// Set the playback speed multiplier (pitch-corrected by the player).
    async fn set_speed(&self, speed: f64) -> Result<()>;

    /// Replace the player's audio filter chain. An empty string clears it.
    async fn set_audio_filter(&self, filter: &str) -> Result<()>;

    /// Toggle between playing and paused.
    async fn toggle_pause(&self) -> Result<()> {
        if self.is_paused().await? {
            self.play().await
        } else {
            self.pause().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seek_mode_commands() {
        assert_eq!(SeekMode::AbsoluteExact.as_command(), "absolute+exact");
        assert_eq!(SeekMode::RelativeExact.as_command(), "relative+exact");
    }

    #[test]
    fn playback_state_from_paused_flag() {
        assert_eq!(PlaybackState::from_paused(true), PlaybackState::Paused);
        assert_eq!(PlaybackState::from_paused(false), PlaybackState::Playing);
    }

    mockall::mock! {
        Player {}

        #[async_trait::async_trait]
        impl PlayerControl for Player {
            async fn load(&self, url: &str) -> Result<()>;
            async fn seek(&self, position: f64, mode: SeekMode) -> Result<()>;
            async fn play(&self) -> Result<()>;
            async fn pause(&self) -> Result<()>;
            async fn is_paused(&self) -> Result<bool>;
            async fn set_speed(&self, speed: f64) -> Result<()>;
            async fn set_audio_filter(&self, filter: &str) -> Result<()>;
        }
    }

    #[tokio::test]
    async fn toggle_pause_resumes_when_paused() {
        let mut player = MockPlayer::new();
        player.expect_is_paused().returning(|| Ok(true));
        player.expect_play().times(1).returning(|| Ok(()));
        player.expect_pause().never();

        player.toggle_pause().await.unwrap();
    }

    #[tokio::test]
    async fn toggle_pause_pauses_when_playing() {
        let mut player = MockPlayer::new();
        player.expect_is_paused().returning(|| Ok(false));
        player.expect_pause().times(1).returning(|| Ok(()));
        player.expect_play().never();

        player.toggle_pause().await.unwrap();
    }
}
