#![forbid(unsafe_code)]

//! Timing and audio tuning for the reveal pipeline.
//!
//! Defaults reproduce the shipped experience. Hosts may override individual
//! fields from JSON (missing fields keep their defaults).

use core::time::Duration;

use serde::Deserialize;

/// Reveal pipeline configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    /// Discovery count at which the distortion mode turns on.
    pub distortion_threshold: usize,
    /// Delay between the reveal panel appearing and the takeover.
    pub reveal_delay_ms: u64,
    /// Delay before the takeover when the sequencer fails.
    pub fallback_delay_ms: u64,
    /// Time from sequence start to teardown.
    pub sequence_total_ms: u64,
    /// Time from teardown to stopping the ambient noise.
    pub ambient_stop_delay_ms: u64,
    /// Opacity of an active subliminal layer.
    pub layer_opacity: f32,
    pub tick_volume: f32,
    pub noise_volume: f32,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            distortion_threshold: 3,
            reveal_delay_ms: 450,
            fallback_delay_ms: 200,
            sequence_total_ms: 900,
            ambient_stop_delay_ms: 900,
            layer_opacity: 0.88,
            tick_volume: 0.9,
            noise_volume: 0.55,
        }
    }
}

impl RevealConfig {
    #[must_use]
    pub fn distortion_threshold(mut self, count: usize) -> Self {
        self.distortion_threshold = count;
        self
    }

    #[must_use]
    pub fn reveal_delay(mut self, delay: Duration) -> Self {
        self.reveal_delay_ms = duration_ms(delay);
        self
    }

    #[must_use]
    pub fn fallback_delay(mut self, delay: Duration) -> Self {
        self.fallback_delay_ms = duration_ms(delay);
        self
    }

    #[must_use]
    pub fn sequence_total(mut self, total: Duration) -> Self {
        self.sequence_total_ms = duration_ms(total);
        self
    }

    #[must_use]
    pub fn ambient_stop_delay(mut self, delay: Duration) -> Self {
        self.ambient_stop_delay_ms = duration_ms(delay);
        self
    }

    /// Clamp values that would break the pipeline's invariants.
    ///
    /// The teardown must not happen before the last step fires, so the total
    /// is raised to at least `last_step_ms`.
    #[must_use]
    pub fn normalized(mut self, last_step_ms: u64) -> Self {
        self.sequence_total_ms = self.sequence_total_ms.max(last_step_ms);
        self.layer_opacity = self.layer_opacity.clamp(0.0, 1.0);
        self.tick_volume = self.tick_volume.clamp(0.0, 1.0);
        self.noise_volume = self.noise_volume.clamp(0.0, 1.0);
        self
    }
}

pub(crate) fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: RevealConfig =
            serde_json::from_str(r#"{ "reveal_delay_ms": 1000 }"#).expect("valid config");
        assert_eq!(config.reveal_delay_ms, 1000);
        assert_eq!(config.fallback_delay_ms, 200);
        assert_eq!(config.distortion_threshold, 3);
    }

    #[test]
    fn normalized_keeps_total_after_last_step() {
        let config = RevealConfig::default()
            .sequence_total(Duration::from_millis(100))
            .normalized(650);
        assert_eq!(config.sequence_total_ms, 650);
    }

    #[test]
    fn builders_set_fields() {
        let config = RevealConfig::default()
            .distortion_threshold(2)
            .reveal_delay(Duration::from_millis(10))
            .fallback_delay(Duration::from_millis(20))
            .ambient_stop_delay(Duration::from_secs(1));
        assert_eq!(config.distortion_threshold, 2);
        assert_eq!(config.reveal_delay_ms, 10);
        assert_eq!(config.fallback_delay_ms, 20);
        assert_eq!(config.ambient_stop_delay_ms, 1000);
    }
}
