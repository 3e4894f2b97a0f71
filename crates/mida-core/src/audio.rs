#![forbid(unsafe_code)]

//! Audio cue collaborator.
//!
//! Two cues exist: a short tick on every token activation and a looping
//! glitch noise under the subliminal sequence. Playback is best effort. A
//! missing audio element or a runtime that refuses playback (autoplay policy)
//! must never interrupt the reveal, so [`play_cue`] swallows both.

use core::fmt;

/// Identifies an audio element on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioCue {
    /// Feedback cue played on every activation.
    Tick,
    /// Ambient loop under the subliminal sequence.
    GlitchNoise,
}

impl AudioCue {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Tick => "tick",
            Self::GlitchNoise => "glitch-noise",
        }
    }
}

/// How to play a cue. Playback always restarts from the beginning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackOptions {
    pub looped: bool,
    /// Volume in `[0.0, 1.0]`.
    pub volume: f32,
}

impl PlaybackOptions {
    #[must_use]
    pub fn once(volume: f32) -> Self {
        Self {
            looped: false,
            volume: volume.clamp(0.0, 1.0),
        }
    }

    #[must_use]
    pub fn looping(volume: f32) -> Self {
        Self {
            looped: true,
            volume: volume.clamp(0.0, 1.0),
        }
    }
}

/// Why a cue did not play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// The page has no element for this cue.
    Missing(AudioCue),
    /// The runtime rejected playback.
    Refused(String),
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(cue) => write!(f, "audio cue {} not present", cue.name()),
            Self::Refused(msg) => write!(f, "playback refused: {msg}"),
        }
    }
}

impl std::error::Error for PlaybackError {}

/// Audio playback primitives.
pub trait AudioSink {
    /// Start `cue` from the beginning with `options`.
    fn play(&mut self, cue: AudioCue, options: PlaybackOptions) -> Result<(), PlaybackError>;

    /// Pause `cue` and rewind it. Stopping a missing or idle cue is a no-op.
    fn stop(&mut self, cue: AudioCue);
}

/// Play a cue, logging and discarding any failure.
pub fn play_cue(audio: &mut dyn AudioSink, cue: AudioCue, options: PlaybackOptions) {
    if let Err(err) = audio.play(cue, options) {
        tracing::debug!(cue = cue.name(), error = %err, "audio cue skipped");
    }
}

/// Sink that plays nothing, for hosts without audio.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAudio;

impl AudioSink for SilentAudio {
    fn play(&mut self, cue: AudioCue, _options: PlaybackOptions) -> Result<(), PlaybackError> {
        Err(PlaybackError::Missing(cue))
    }

    fn stop(&mut self, _cue: AudioCue) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_clamp_volume() {
        assert_eq!(PlaybackOptions::once(1.5).volume, 1.0);
        assert_eq!(PlaybackOptions::looping(-0.2).volume, 0.0);
        assert!(PlaybackOptions::looping(0.55).looped);
    }

    #[test]
    fn play_cue_swallows_missing_element() {
        let mut audio = SilentAudio;
        play_cue(&mut audio, AudioCue::Tick, PlaybackOptions::once(0.9));
        audio.stop(AudioCue::GlitchNoise);
    }
}
