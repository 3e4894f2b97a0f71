#![forbid(unsafe_code)]

//! Timed subliminal sequence.
//!
//! A fixed, declarative schedule of [`SequenceStep`]s flashes a small stack of
//! layered images over the page, each step shaking the active layers by a
//! bounded random offset. The [`Sequencer`] interprets the schedule against a
//! host clock: the host calls [`Sequencer::poll`] whenever time has passed and
//! the sequencer applies every step that has come due, in order.
//!
//! # Timeline
//!
//! ```text
//! t=0      container shown, ambient noise loops
//! t=step   layers updated (opacity + jitter)
//! t=total  container hidden, layers reset        -> Completed { at }
//! t=total+ambient_stop_delay  ambient noise stops
//! ```
//!
//! # Invariants
//!
//! 1. Steps are applied in non-decreasing offset order, each exactly once.
//! 2. `Completed` is reported exactly once, and only after teardown.
//! 3. Jitter on an active layer lies in `[-shake, +shake]` on each axis.
//! 4. With no subliminal container, [`Sequencer::start`] returns
//!    [`SequencerStart::Skipped`] and nothing else happens.

use core::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::audio::{AudioCue, AudioSink, PlaybackOptions, play_cue};
use crate::config::{RevealConfig, duration_ms};
use crate::page::{LayerStyle, Page, PageResult};

/// Number of layers an activation vector addresses.
pub const LAYER_SLOTS: usize = 3;

/// One entry of the subliminal schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceStep {
    /// Offset from sequence start.
    pub at: Duration,
    /// Which layers are visible during this step.
    pub active: [bool; LAYER_SLOTS],
    /// Maximum jitter in pixels on each axis.
    pub shake: f32,
}

const fn step(ms: u64, active: [u8; LAYER_SLOTS], shake: f32) -> SequenceStep {
    SequenceStep {
        at: Duration::from_millis(ms),
        active: [active[0] == 1, active[1] == 1, active[2] == 1],
        shake,
    }
}

/// The shipped schedule.
pub const SUBLIMINAL_SEQUENCE: [SequenceStep; 9] = [
    step(0, [1, 0, 0], 2.0),
    step(70, [0, 1, 0], 3.0),
    step(140, [0, 0, 1], 4.0),
    step(220, [1, 0, 1], 6.0),
    step(300, [0, 0, 0], 1.0),
    step(380, [0, 1, 1], 5.0),
    step(470, [1, 0, 0], 7.0),
    step(560, [0, 0, 1], 4.0),
    step(650, [0, 0, 0], 0.0),
];

// ---------------------------------------------------------------------------
// Jitter
// ---------------------------------------------------------------------------

/// Source of per-axis layer jitter.
pub trait JitterSource {
    /// Sample uniformly from `[-magnitude, +magnitude]`.
    fn sample(&mut self, magnitude: f32) -> f32;
}

/// Jitter from a seeded `StdRng`.
#[derive(Debug, Clone)]
pub struct SeededJitter {
    rng: StdRng,
}

impl SeededJitter {
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl JitterSource for SeededJitter {
    fn sample(&mut self, magnitude: f32) -> f32 {
        let m = magnitude.abs();
        if m == 0.0 || !m.is_finite() {
            return 0.0;
        }
        self.rng.random_range(-m..=m)
    }
}

/// Jitter that never moves a layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoJitter;

impl JitterSource for NoJitter {
    fn sample(&mut self, _magnitude: f32) -> f32 {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Sequencer
// ---------------------------------------------------------------------------

/// Outcome of [`Sequencer::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerStart {
    /// No subliminal container; the sequence resolves immediately.
    Skipped,
    /// Container shown and the schedule is running.
    Started,
}

/// Outcome of [`Sequencer::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerPoll {
    /// Still running; `steps_applied` steps fired during this poll.
    Pending { steps_applied: usize },
    /// Teardown finished at scheduled time `at` (epoch ms).
    Completed { at: u64 },
    /// Not running.
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Running {
        started_at: u64,
        next_step: usize,
        layers: usize,
    },
    Finished,
}

/// Interpreter for a subliminal schedule.
#[derive(Debug, Clone)]
pub struct Sequencer {
    steps: Vec<SequenceStep>,
    total_ms: u64,
    ambient_stop_delay_ms: u64,
    layer_opacity: f32,
    noise_volume: f32,
    state: State,
    last_due: Option<u64>,
    ambient_stop_at: Option<u64>,
}

impl Sequencer {
    /// Sequencer over [`SUBLIMINAL_SEQUENCE`].
    #[must_use]
    pub fn new(config: &RevealConfig) -> Self {
        Self::with_steps(SUBLIMINAL_SEQUENCE.to_vec(), config)
    }

    /// Sequencer over a custom schedule. Steps are sorted by offset and the
    /// total duration is raised to cover the last step.
    #[must_use]
    pub fn with_steps(mut steps: Vec<SequenceStep>, config: &RevealConfig) -> Self {
        steps.sort_by_key(|s| s.at);
        let last_ms = steps.last().map_or(0, |s| duration_ms(s.at));
        let config = config.clone().normalized(last_ms);
        Self {
            steps,
            total_ms: config.sequence_total_ms,
            ambient_stop_delay_ms: config.ambient_stop_delay_ms,
            layer_opacity: config.layer_opacity,
            noise_volume: config.noise_volume,
            state: State::Idle,
            last_due: None,
            ambient_stop_at: None,
        }
    }

    #[must_use]
    pub fn steps(&self) -> &[SequenceStep] {
        &self.steps
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running { .. })
    }

    /// Show the container and start the ambient loop.
    pub fn start(
        &mut self,
        page: &mut dyn Page,
        audio: &mut dyn AudioSink,
        now_ms: u64,
    ) -> PageResult<SequencerStart> {
        let Some(layers) = page.subliminal_layers() else {
            tracing::debug!("subliminal container absent, skipping sequence");
            self.state = State::Finished;
            return Ok(SequencerStart::Skipped);
        };

        page.set_subliminal_visible(true)?;
        play_cue(
            audio,
            AudioCue::GlitchNoise,
            PlaybackOptions::looping(self.noise_volume),
        );
        self.state = State::Running {
            started_at: now_ms,
            next_step: 0,
            layers,
        };
        tracing::debug!(layers, steps = self.steps.len(), "subliminal sequence started");
        Ok(SequencerStart::Started)
    }

    /// Earliest pending deadline: next step, teardown, or ambient stop.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        let running = match self.state {
            State::Running {
                started_at,
                next_step,
                ..
            } => {
                let teardown = started_at.saturating_add(self.total_ms);
                let next = self
                    .steps
                    .get(next_step)
                    .map(|s| started_at.saturating_add(duration_ms(s.at)));
                Some(next.map_or(teardown, |n| n.min(teardown)))
            }
            State::Idle | State::Finished => None,
        };
        match (running, self.ambient_stop_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Apply every step due at `now_ms`, tearing down once the total
    /// duration has elapsed.
    pub fn poll(
        &mut self,
        now_ms: u64,
        page: &mut dyn Page,
        jitter: &mut dyn JitterSource,
    ) -> PageResult<SequencerPoll> {
        let State::Running {
            started_at,
            mut next_step,
            layers,
        } = self.state
        else {
            return Ok(SequencerPoll::Idle);
        };

        let mut steps_applied = 0;
        while let Some(step) = self.steps.get(next_step) {
            let due = started_at.saturating_add(duration_ms(step.at));
            if due > now_ms {
                break;
            }
            let step = *step;
            next_step += 1;
            // Record progress before touching the page so a failure never
            // replays a step.
            self.state = State::Running {
                started_at,
                next_step,
                layers,
            };
            self.last_due = Some(due);
            self.apply_step(&step, layers, page, jitter)?;
            steps_applied += 1;
        }

        let teardown_at = started_at.saturating_add(self.total_ms);
        if now_ms < teardown_at {
            return Ok(SequencerPoll::Pending { steps_applied });
        }

        self.state = State::Finished;
        self.last_due = Some(teardown_at);
        self.ambient_stop_at = Some(teardown_at.saturating_add(self.ambient_stop_delay_ms));
        page.set_subliminal_visible(false)?;
        for index in 0..layers {
            page.set_layer(index, LayerStyle::HIDDEN)?;
        }
        tracing::debug!(at = teardown_at, "subliminal sequence torn down");
        Ok(SequencerPoll::Completed { at: teardown_at })
    }

    /// Scheduled time of the most recent step or teardown applied.
    #[must_use]
    pub fn last_due(&self) -> Option<u64> {
        self.last_due
    }

    /// Scheduled time to stop the ambient loop, once torn down.
    #[must_use]
    pub fn ambient_stop_at(&self) -> Option<u64> {
        self.ambient_stop_at
    }

    /// Stop the ambient loop and clear its deadline.
    pub fn stop_ambient(&mut self, audio: &mut dyn AudioSink) {
        self.ambient_stop_at = None;
        audio.stop(AudioCue::GlitchNoise);
    }

    /// Best-effort cleanup after a failure: hide everything, silence the loop.
    pub fn abort(&mut self, page: &mut dyn Page, audio: &mut dyn AudioSink) {
        let layers = match self.state {
            State::Running { layers, .. } => layers,
            _ => page.subliminal_layers().unwrap_or(0),
        };
        self.state = State::Finished;
        if let Err(err) = page.set_subliminal_visible(false) {
            tracing::debug!(error = %err, "could not hide subliminal container");
        }
        for index in 0..layers {
            let _ = page.set_layer(index, LayerStyle::HIDDEN);
        }
        self.stop_ambient(audio);
    }

    fn apply_step(
        &self,
        step: &SequenceStep,
        layers: usize,
        page: &mut dyn Page,
        jitter: &mut dyn JitterSource,
    ) -> PageResult {
        for index in 0..layers {
            let on = step.active.get(index).copied().unwrap_or(false);
            let style = if on {
                LayerStyle {
                    opacity: self.layer_opacity,
                    dx: jitter.sample(step.shake),
                    dy: jitter.sample(step.shake),
                }
            } else {
                LayerStyle::HIDDEN
            };
            page.set_layer(index, style)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SilentAudio;
    use crate::testing::{FakePage, PageCall};

    fn running(page: &mut FakePage) -> Sequencer {
        let mut seq = Sequencer::new(&RevealConfig::default());
        let started = seq.start(page, &mut SilentAudio, 0).expect("start");
        assert_eq!(started, SequencerStart::Started);
        seq
    }

    #[test]
    fn shipped_schedule_is_strictly_increasing() {
        for pair in SUBLIMINAL_SEQUENCE.windows(2) {
            assert!(pair[0].at < pair[1].at);
        }
    }

    #[test]
    fn missing_container_skips() {
        let mut page = FakePage::new(&["m"]).without_subliminal();
        let mut seq = Sequencer::new(&RevealConfig::default());
        let started = seq.start(&mut page, &mut SilentAudio, 0).expect("start");
        assert_eq!(started, SequencerStart::Skipped);
        assert_eq!(seq.next_deadline(), None);
        assert!(page.calls().is_empty());
    }

    #[test]
    fn steps_fire_at_declared_offsets() {
        let mut page = FakePage::new(&[]);
        let mut seq = running(&mut page);
        let mut jitter = NoJitter;

        assert_eq!(
            seq.poll(0, &mut page, &mut jitter).expect("poll"),
            SequencerPoll::Pending { steps_applied: 1 }
        );
        assert_eq!(seq.next_deadline(), Some(70));
        assert_eq!(
            seq.poll(69, &mut page, &mut jitter).expect("poll"),
            SequencerPoll::Pending { steps_applied: 0 }
        );
        assert_eq!(
            seq.poll(300, &mut page, &mut jitter).expect("poll"),
            SequencerPoll::Pending { steps_applied: 4 }
        );
        assert_eq!(page.layer(2).opacity, 0.0);
    }

    #[test]
    fn teardown_completes_at_total_and_schedules_ambient_stop() {
        let mut page = FakePage::new(&[]);
        let mut seq = running(&mut page);
        let result = seq.poll(5_000, &mut page, &mut NoJitter).expect("poll");
        assert_eq!(result, SequencerPoll::Completed { at: 900 });
        assert_eq!(seq.ambient_stop_at(), Some(1_800));
        assert!(!page.subliminal_visible());
        for index in 0..3 {
            assert!(page.layer(index).is_hidden());
        }
        assert_eq!(
            seq.poll(6_000, &mut page, &mut NoJitter).expect("poll"),
            SequencerPoll::Idle
        );
    }

    #[test]
    fn active_layers_use_configured_opacity() {
        let mut page = FakePage::new(&[]);
        let mut seq = running(&mut page);
        seq.poll(0, &mut page, &mut NoJitter).expect("poll");
        assert_eq!(page.layer(0).opacity, 0.88);
        assert!(page.layer(1).is_hidden());
    }

    #[test]
    fn extra_layers_stay_hidden() {
        let mut page = FakePage::new(&[]).with_layers(5);
        let mut seq = running(&mut page);
        seq.poll(220, &mut page, &mut SeededJitter::from_seed(7))
            .expect("poll");
        assert!(page.layer(3).is_hidden());
        assert!(page.layer(4).is_hidden());
    }

    #[test]
    fn jitter_stays_within_shake() {
        let mut jitter = SeededJitter::from_seed(42);
        for _ in 0..1_000 {
            let v = jitter.sample(7.0);
            assert!((-7.0..=7.0).contains(&v));
        }
        assert_eq!(jitter.sample(0.0), 0.0);
    }

    #[test]
    fn failing_page_does_not_replay_steps() {
        let mut page = FakePage::new(&[]);
        let mut seq = running(&mut page);
        page.fail_layers(true);
        assert!(seq.poll(0, &mut page, &mut NoJitter).is_err());
        page.fail_layers(false);
        page.clear_calls();
        seq.poll(0, &mut page, &mut NoJitter).expect("poll");
        assert!(
            !page
                .calls()
                .iter()
                .any(|c| matches!(c, PageCall::SetLayer(..)))
        );
    }

    #[test]
    fn custom_schedule_is_sorted_and_covers_its_last_step() {
        let config = RevealConfig::default();
        let mut seq = Sequencer::with_steps(
            vec![
                step(1_200, [0, 1, 0], 0.0),
                step(0, [1, 0, 0], 0.0),
                step(500, [0, 0, 1], 0.0),
            ],
            &config,
        );
        let offsets: Vec<u64> = seq.steps().iter().map(|s| duration_ms(s.at)).collect();
        assert_eq!(offsets, vec![0, 500, 1_200]);
        assert!(!seq.is_running());

        let mut page = FakePage::new(&[]);
        seq.start(&mut page, &mut SilentAudio, 0).expect("start");
        assert!(seq.is_running());
        assert_eq!(
            seq.poll(1_199, &mut page, &mut NoJitter).expect("poll"),
            SequencerPoll::Pending { steps_applied: 2 }
        );
        assert_eq!(
            seq.poll(1_200, &mut page, &mut NoJitter).expect("poll"),
            SequencerPoll::Completed { at: 1_200 }
        );
        assert!(!seq.is_running());
        assert_eq!(seq.ambient_stop_at(), Some(1_200 + config.ambient_stop_delay_ms));
    }
}
