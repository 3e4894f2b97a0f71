#![forbid(unsafe_code)]

//! Reveal orchestration.
//!
//! [`RevealWidget`] owns the session state (discovery set and the one-way
//! trigger flag) and drives the pipeline once every required letter is found:
//!
//! ```text
//! Idle ──all found──▶ Sequencing ──ok──▶ Revealed ──reveal delay──▶ TakenOver
//!                          │
//!                          └──failure──▶ Fallback ──fallback delay──▶ TakenOver
//! ```
//!
//! Time is host-driven. The widget never sleeps: the host calls
//! [`RevealWidget::tick`] when time has passed (ideally at
//! [`RevealWidget::next_deadline`]) and every due deadline is processed in
//! order. Follow-up deadlines are computed from the scheduled time of the
//! event that produced them, not the tick time, so a host ticking late still
//! sees the same timeline.
//!
//! # Invariants
//!
//! 1. `triggered` goes false→true at most once; the check and the set happen
//!    in one synchronous step.
//! 2. Distortion mode is on iff the discovery count is at least the
//!    configured threshold, re-applied on every evaluation.
//! 3. The takeover runs exactly once, on both the success and failure paths.
//! 4. No error escapes: collaborator failures are logged and degrade to the
//!    terminal state.

use crate::audio::AudioSink;
use crate::clock::Clock;
use crate::config::RevealConfig;
use crate::content::ContentTree;
use crate::letter::{Discovered, Letter};
use crate::page::{Page, PageError, PageMode, TokenId};
use crate::sequencer::{JitterSource, SeededJitter, Sequencer, SequencerPoll, SequencerStart};
use crate::storage::{SessionStorage, SessionTimer};
use crate::takeover::{self, TakeoverReport};

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Borrowed view of every collaborator at once.
pub struct EnvParts<'a, E: Environment + ?Sized> {
    pub page: &'a mut E::Page,
    pub content: &'a mut E::Content,
    pub audio: &'a mut E::Audio,
    pub storage: &'a mut E::Storage,
    pub clock: &'a E::Clock,
}

/// The set of collaborators a widget runs against.
pub trait Environment {
    type Page: Page;
    type Content: ContentTree;
    type Audio: AudioSink;
    type Storage: SessionStorage;
    type Clock: Clock;

    /// Split into disjoint borrows.
    fn parts(&mut self) -> EnvParts<'_, Self>;

    fn clock(&self) -> &Self::Clock;
}

/// Plain struct environment.
#[derive(Debug)]
pub struct Host<P, T, A, S, C> {
    pub page: P,
    pub content: T,
    pub audio: A,
    pub storage: S,
    pub clock: C,
}

impl<P, T, A, S, C> Environment for Host<P, T, A, S, C>
where
    P: Page,
    T: ContentTree,
    A: AudioSink,
    S: SessionStorage,
    C: Clock,
{
    type Page = P;
    type Content = T;
    type Audio = A;
    type Storage = S;
    type Clock = C;

    fn parts(&mut self) -> EnvParts<'_, Self> {
        EnvParts {
            page: &mut self.page,
            content: &mut self.content,
            audio: &mut self.audio,
            storage: &mut self.storage,
            clock: &self.clock,
        }
    }

    fn clock(&self) -> &C {
        &self.clock
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Discovery set plus the one-way trigger flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    discovered: Discovered,
    triggered: bool,
}

impl SessionState {
    #[must_use]
    pub const fn discovered(&self) -> Discovered {
        self.discovered
    }

    #[must_use]
    pub const fn count(&self) -> usize {
        self.discovered.len()
    }

    #[must_use]
    pub const fn triggered(&self) -> bool {
        self.triggered
    }

    pub(crate) fn discovered_mut(&mut self) -> &mut Discovered {
        &mut self.discovered
    }

    /// Set the trigger flag, returning `true` only for the call that set it.
    fn try_trigger(&mut self) -> bool {
        if self.triggered {
            return false;
        }
        self.triggered = true;
        true
    }
}

/// Pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealPhase {
    Idle,
    Sequencing,
    Revealed { takeover_at: u64 },
    Fallback { takeover_at: u64 },
    TakenOver,
}

/// Observable pipeline events, queued until [`RevealWidget::drain_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealEvent {
    DistortionChanged(bool),
    Triggered { duration_ms: u64 },
    SequenceStarted,
    /// No subliminal container; the sequence resolved immediately.
    SequenceSkipped,
    SequenceCompleted { at: u64 },
    SequenceFailed { reason: String },
    PanelShown,
    AmbientStopped,
    TakeoverExecuted(TakeoverReport),
}

/// One interactive token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub id: TokenId,
    /// Raw label from markup.
    pub label: Option<String>,
    pub letter: Option<Letter>,
    pub locked: bool,
}

// ---------------------------------------------------------------------------
// Widget
// ---------------------------------------------------------------------------

/// The reveal state machine bound to an [`Environment`].
pub struct RevealWidget<E: Environment> {
    pub(crate) env: E,
    pub(crate) config: RevealConfig,
    pub(crate) tokens: Vec<Token>,
    pub(crate) session: SessionState,
    phase: RevealPhase,
    sequencer: Sequencer,
    jitter: Box<dyn JitterSource>,
    distortion: bool,
    pub(crate) events: Vec<RevealEvent>,
}

impl<E: Environment> std::fmt::Debug for RevealWidget<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevealWidget")
            .field("tokens", &self.tokens.len())
            .field("session", &self.session)
            .field("phase", &self.phase)
            .field("pending_events", &self.events.len())
            .finish()
    }
}

impl<E: Environment> RevealWidget<E> {
    /// Build a widget, reading the token list from the page.
    #[must_use]
    pub fn new(mut env: E, config: RevealConfig) -> Self {
        let labels = env.parts().page.token_labels();

        let tokens: Vec<Token> = labels
            .into_iter()
            .enumerate()
            .map(|(index, label)| Token {
                id: TokenId(index),
                letter: label.as_deref().and_then(Letter::parse),
                label,
                locked: false,
            })
            .collect();
        if tokens.is_empty() {
            tracing::warn!("no tokens found on page; the reveal can never trigger");
        }

        let seed = env.clock().now_ms();
        let sequencer = Sequencer::new(&config);
        Self {
            env,
            config,
            tokens,
            session: SessionState::default(),
            phase: RevealPhase::Idle,
            sequencer,
            jitter: Box::new(SeededJitter::from_seed(seed)),
            distortion: false,
            events: Vec::new(),
        }
    }

    /// Replace the jitter source.
    #[must_use]
    pub fn with_jitter(mut self, jitter: Box<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replace the sequencer, e.g. with a custom schedule.
    #[must_use]
    pub fn with_sequencer(mut self, sequencer: Sequencer) -> Self {
        self.sequencer = sequencer;
        self
    }

    #[must_use]
    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    #[must_use]
    pub const fn phase(&self) -> RevealPhase {
        self.phase
    }

    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    #[must_use]
    pub fn config(&self) -> &RevealConfig {
        &self.config
    }

    /// Whether the token's letter is currently discovered.
    #[must_use]
    pub fn is_found(&self, id: TokenId) -> bool {
        self.tokens
            .get(id.0)
            .and_then(|t| t.letter)
            .is_some_and(|letter| self.session.discovered.has(letter))
    }

    #[must_use]
    pub const fn distortion(&self) -> bool {
        self.distortion
    }

    /// Take queued events, oldest first.
    pub fn drain_events(&mut self) -> Vec<RevealEvent> {
        std::mem::take(&mut self.events)
    }

    /// Apply level-triggered progress effects for `count` discovered letters
    /// and, at full count, fire the one-way trigger.
    pub fn evaluate_progress(&mut self, count: usize) {
        let distort = count >= self.config.distortion_threshold;
        {
            let parts = self.env.parts();
            if let Err(err) = parts.page.set_mode(PageMode::Distortion, distort) {
                tracing::warn!(error = %err, "could not toggle distortion");
            }
        }
        if distort != self.distortion {
            self.distortion = distort;
            self.events.push(RevealEvent::DistortionChanged(distort));
        }

        if count >= Letter::REQUIRED.len() && self.session.try_trigger() {
            self.trigger();
        }
    }

    /// Process every deadline due at the clock's current time.
    pub fn tick(&mut self) {
        let now = self.env.clock().now_ms();
        self.process_due(now);
    }

    /// Earliest pending deadline (epoch ms), if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        let takeover = match self.phase {
            RevealPhase::Revealed { takeover_at } | RevealPhase::Fallback { takeover_at } => {
                Some(takeover_at)
            }
            _ => None,
        };
        match (takeover, self.sequencer.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn trigger(&mut self) {
        let now = self.env.clock().now_ms();
        let start = {
            let parts = self.env.parts();
            let duration_ms = SessionTimer::record_duration(parts.storage, now);
            tracing::info!(duration_ms, "all letters found, reveal triggered");
            self.events.push(RevealEvent::Triggered { duration_ms });
            self.phase = RevealPhase::Sequencing;
            self.sequencer.start(parts.page, parts.audio, now)
        };

        match start {
            Ok(SequencerStart::Started) => {
                self.events.push(RevealEvent::SequenceStarted);
                self.process_due(now);
            }
            Ok(SequencerStart::Skipped) => {
                self.events.push(RevealEvent::SequenceSkipped);
                self.sequence_completed(now);
                self.process_due(now);
            }
            Err(err) => {
                self.sequence_failed(now, &err);
                self.process_due(now);
            }
        }
    }

    fn process_due(&mut self, now: u64) {
        loop {
            match self.phase {
                RevealPhase::Sequencing => {
                    let polled = {
                        let parts = self.env.parts();
                        self.sequencer.poll(now, parts.page, self.jitter.as_mut())
                    };
                    match polled {
                        Ok(SequencerPoll::Pending { .. }) => break,
                        Ok(SequencerPoll::Completed { at }) => {
                            self.events.push(RevealEvent::SequenceCompleted { at });
                            self.sequence_completed(at);
                        }
                        Ok(SequencerPoll::Idle) => self.sequence_completed(now),
                        Err(err) => {
                            let at = self.sequencer.last_due().unwrap_or(now);
                            self.sequence_failed(at, &err);
                        }
                    }
                }
                RevealPhase::Revealed { takeover_at } | RevealPhase::Fallback { takeover_at }
                    if takeover_at <= now =>
                {
                    self.run_takeover();
                }
                _ => break,
            }
        }

        if self.sequencer.ambient_stop_at().is_some_and(|at| at <= now) {
            let parts = self.env.parts();
            self.sequencer.stop_ambient(parts.audio);
            self.events.push(RevealEvent::AmbientStopped);
        }
    }

    fn sequence_completed(&mut self, at: u64) {
        let parts = self.env.parts();
        match parts.page.set_panel_visible(true) {
            Ok(()) => self.events.push(RevealEvent::PanelShown),
            Err(err) => tracing::warn!(error = %err, "could not show reveal panel"),
        }
        let takeover_at = at.saturating_add(self.config.reveal_delay_ms);
        tracing::info!(takeover_at, "reveal panel shown");
        self.phase = RevealPhase::Revealed { takeover_at };
    }

    fn sequence_failed(&mut self, at: u64, err: &PageError) {
        tracing::warn!(error = %err, "subliminal sequence failed, falling back to takeover");
        {
            let parts = self.env.parts();
            self.sequencer.abort(parts.page, parts.audio);
        }
        self.events.push(RevealEvent::SequenceFailed {
            reason: err.to_string(),
        });
        self.phase = RevealPhase::Fallback {
            takeover_at: at.saturating_add(self.config.fallback_delay_ms),
        };
    }

    fn run_takeover(&mut self) {
        let ids: Vec<TokenId> = self.tokens.iter().map(|t| t.id).collect();
        let report = {
            let parts = self.env.parts();
            takeover::execute(parts.page, parts.content, &ids)
        };
        for token in &mut self.tokens {
            token.locked = true;
        }
        self.phase = RevealPhase::TakenOver;
        self.events.push(RevealEvent::TakeoverExecuted(report));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioCue;
    use crate::clock::ManualClock;
    use crate::content::MemoryTree;
    use crate::sequencer::{NoJitter, SequenceStep};
    use crate::storage::MemoryStorage;
    use core::time::Duration;
    use crate::testing::{FakeAudio, FakePage};

    type TestHost = Host<FakePage, MemoryTree, FakeAudio, MemoryStorage, ManualClock>;

    fn widget(page: FakePage) -> RevealWidget<TestHost> {
        let host = Host {
            page,
            content: MemoryTree::new("main"),
            audio: FakeAudio::new(),
            storage: MemoryStorage::new(),
            clock: ManualClock::starting_at(10_000),
        };
        RevealWidget::new(host, RevealConfig::default()).with_jitter(Box::new(NoJitter))
    }

    #[test]
    fn distortion_follows_count_in_both_directions() {
        let mut w = widget(FakePage::new(&[]));
        w.evaluate_progress(2);
        assert!(!w.env().page.mode(PageMode::Distortion));
        w.evaluate_progress(3);
        assert!(w.env().page.mode(PageMode::Distortion));
        w.evaluate_progress(2);
        assert!(!w.env().page.mode(PageMode::Distortion));
        assert_eq!(
            w.drain_events(),
            vec![
                RevealEvent::DistortionChanged(true),
                RevealEvent::DistortionChanged(false)
            ]
        );
    }

    #[test]
    fn trigger_fires_once() {
        let mut w = widget(FakePage::new(&[]));
        w.evaluate_progress(4);
        w.evaluate_progress(4);
        w.evaluate_progress(4);
        let triggers = w
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, RevealEvent::Triggered { .. }))
            .count();
        assert_eq!(triggers, 1);
        assert!(w.session().triggered());
        assert_eq!(w.phase(), RevealPhase::Sequencing);
    }

    #[test]
    fn next_deadline_walks_the_schedule() {
        let mut w = widget(FakePage::new(&[]));
        w.evaluate_progress(4);
        assert_eq!(w.next_deadline(), Some(10_070));

        w.env_mut().clock.set(10_900);
        w.tick();
        assert_eq!(w.phase(), RevealPhase::Revealed { takeover_at: 11_350 });
        assert_eq!(w.next_deadline(), Some(11_350));

        w.env_mut().clock.set(11_350);
        w.tick();
        assert_eq!(w.phase(), RevealPhase::TakenOver);
        assert_eq!(w.next_deadline(), Some(11_800));

        w.env_mut().clock.set(11_800);
        w.tick();
        assert_eq!(w.next_deadline(), None);
        assert_eq!(w.env().audio.stops(AudioCue::GlitchNoise), 1);
    }

    #[test]
    fn coarse_tick_matches_fine_timeline() {
        let mut w = widget(FakePage::new(&[]));
        w.evaluate_progress(4);
        w.env_mut().clock.set(20_000);
        w.tick();
        assert_eq!(w.phase(), RevealPhase::TakenOver);
        let events = w.drain_events();
        assert!(events.contains(&RevealEvent::SequenceCompleted { at: 10_900 }));
        assert!(events.contains(&RevealEvent::AmbientStopped));
    }

    #[test]
    fn start_failure_takes_fallback_path() {
        let mut page = FakePage::new(&[]);
        page.fail_subliminal(true);
        let mut w = widget(page);
        w.evaluate_progress(4);
        assert_eq!(w.phase(), RevealPhase::Fallback { takeover_at: 10_200 });
        w.env_mut().clock.set(10_200);
        w.tick();
        assert_eq!(w.phase(), RevealPhase::TakenOver);
        assert!(!w.env().page.panel_visible());
    }

    #[test]
    fn custom_sequencer_sets_the_reveal_time() {
        let config = RevealConfig::default().sequence_total(Duration::from_millis(300));
        let flash = SequenceStep {
            at: Duration::from_millis(100),
            active: [true, true, true],
            shake: 1.0,
        };
        let mut w = widget(FakePage::new(&[]))
            .with_sequencer(Sequencer::with_steps(vec![flash], &config));
        w.evaluate_progress(4);
        assert_eq!(w.next_deadline(), Some(10_100));

        w.env_mut().clock.set(10_300);
        w.tick();
        assert_eq!(w.phase(), RevealPhase::Revealed { takeover_at: 10_750 });
    }
}
