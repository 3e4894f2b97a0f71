//! End-to-end reveal scenarios driven by a manual clock.

use mida_core::audio::AudioCue;
use mida_core::clock::ManualClock;
use mida_core::content::{MemNodeId, MemoryTree};
use mida_core::page::PageMode;
use mida_core::sequencer::NoJitter;
use mida_core::storage::{DURATION_KEY, MemoryStorage, START_KEY, SessionStorage};
use mida_core::takeover::{PHRASE, phrase_fill};
use mida_core::testing::{FakeAudio, FakePage};
use mida_core::{ActivationOutcome, Host, RevealConfig, RevealEvent, RevealPhase, RevealWidget, TokenId};
use pretty_assertions::assert_eq;
use std::time::Duration;

type TestHost = Host<FakePage, MemoryTree, FakeAudio, MemoryStorage, ManualClock>;

const T0: u64 = 1_700_000_000_000;

struct Fixture {
    widget: RevealWidget<TestHost>,
    headline: MemNodeId,
    body: MemNodeId,
    guarded: MemNodeId,
    short: MemNodeId,
}

fn fixture(page: FakePage, storage: MemoryStorage) -> Fixture {
    let mut tree = MemoryTree::new("main");
    let root = tree.root_id();
    let h1 = tree.element(root, "h1");
    let headline = tree.text(h1, "MIDA NODE");
    let p = tree.element(root, "p");
    let body = tree.text(p, "Four letters hide in the captions below.");
    let short = tree.text(p, "hi");
    let footer = tree.protected_element(root, "footer");
    let guarded = tree.text(footer, "Do not rewrite this line.");

    let widget = RevealWidget::new(
        Host {
            page,
            content: tree,
            audio: FakeAudio::new(),
            storage,
            clock: ManualClock::starting_at(T0),
        },
        RevealConfig::default(),
    )
    .with_jitter(Box::new(NoJitter));

    Fixture {
        widget,
        headline,
        body,
        guarded,
        short,
    }
}

fn page() -> FakePage {
    FakePage::new(&["m", "x", "i", "d", "a"])
}

fn advance(w: &mut RevealWidget<TestHost>, ms: u64) {
    w.env_mut().clock.advance(Duration::from_millis(ms));
    w.tick();
}

#[test]
fn three_letters_distort_without_triggering() {
    let mut f = fixture(page(), MemoryStorage::new());
    let w = &mut f.widget;
    w.activate(TokenId(0));
    w.activate(TokenId(2));
    w.activate(TokenId(3));

    assert!(w.distortion());
    assert!(w.env().page.mode(PageMode::Distortion));
    assert!(!w.session().triggered());
    assert!(!w.env().page.panel_visible());
    assert_eq!(w.phase(), RevealPhase::Idle);
}

#[test]
fn fourth_letter_runs_full_pipeline() {
    let mut f = fixture(page(), MemoryStorage::new());
    let w = &mut f.widget;
    for id in [0, 2, 3] {
        w.activate(TokenId(id));
    }
    w.drain_events();

    w.env_mut().clock.set(T0 + 4_000);
    assert_eq!(w.activate(TokenId(4)), ActivationOutcome::Found(mida_core::Letter::A));
    assert!(w.session().triggered());
    assert_eq!(w.phase(), RevealPhase::Sequencing);
    assert!(w.env().page.subliminal_visible());
    assert_eq!(w.env().audio.plays(AudioCue::GlitchNoise), 1);
    assert!(!w.env().page.panel_visible());

    // Sequence tears down at +900ms.
    advance(w, 899);
    assert_eq!(w.phase(), RevealPhase::Sequencing);
    advance(w, 1);
    assert!(w.env().page.panel_visible());
    assert!(!w.env().page.subliminal_visible());
    assert_eq!(
        w.phase(),
        RevealPhase::Revealed {
            takeover_at: T0 + 4_000 + 900 + 450
        }
    );

    // Takeover 450ms after the panel appears.
    advance(w, 449);
    assert_eq!(w.env().content.text_of(f.headline), Some("MIDA NODE"));
    advance(w, 1);
    assert_eq!(w.phase(), RevealPhase::TakenOver);
    assert_eq!(w.env().content.text_of(f.headline), Some(phrase_fill(9).as_str()));

    let events = w.drain_events();
    let triggered: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, RevealEvent::Triggered { .. }))
        .collect();
    assert_eq!(triggered, vec![&RevealEvent::Triggered { duration_ms: 4_000 }]);
    assert!(events.contains(&RevealEvent::PanelShown));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, RevealEvent::TakeoverExecuted(r) if r.rewritten == 2))
    );

    // Ambient noise stops 900ms after teardown.
    assert_eq!(w.env().audio.stops(AudioCue::GlitchNoise), 0);
    advance(w, 450);
    assert_eq!(w.env().audio.stops(AudioCue::GlitchNoise), 1);
}

#[test]
fn sequencer_failure_skips_panel_and_still_takes_over() {
    let mut page = page();
    page.fail_layers(true);
    let mut f = fixture(page, MemoryStorage::new());
    let w = &mut f.widget;
    for id in [0, 2, 3, 4] {
        w.activate(TokenId(id));
    }

    assert_eq!(w.phase(), RevealPhase::Fallback { takeover_at: T0 + 200 });
    advance(w, 199);
    assert_ne!(w.phase(), RevealPhase::TakenOver);
    advance(w, 1);
    assert_eq!(w.phase(), RevealPhase::TakenOver);
    assert!(!w.env().page.panel_visible());
    assert!(
        w.drain_events()
            .iter()
            .any(|e| matches!(e, RevealEvent::SequenceFailed { .. }))
    );
    // Fallback silences the loop immediately.
    assert_eq!(w.env().audio.stops(AudioCue::GlitchNoise), 1);
}

#[test]
fn missing_subliminal_container_reveals_immediately() {
    let mut f = fixture(page().without_subliminal(), MemoryStorage::new());
    let w = &mut f.widget;
    for id in [0, 2, 3, 4] {
        w.activate(TokenId(id));
    }
    assert!(w.env().page.panel_visible());
    assert_eq!(w.phase(), RevealPhase::Revealed { takeover_at: T0 + 450 });
    assert_eq!(w.env().audio.plays(AudioCue::GlitchNoise), 0);
}

#[test]
fn takeover_preserves_lengths_and_protected_text() {
    let mut f = fixture(page(), MemoryStorage::new());
    let before_body = "Four letters hide in the captions below.".chars().count();
    let w = &mut f.widget;
    for id in [0, 2, 3, 4] {
        w.activate(TokenId(id));
    }
    advance(w, 10_000);
    assert_eq!(w.phase(), RevealPhase::TakenOver);

    let body = w.env().content.text_of(f.body).expect("text node");
    assert_eq!(body.chars().count(), before_body);
    assert!(
        body.split(' ')
            .all(|word| word.is_empty() || PHRASE.split(' ').any(|p| p.starts_with(word)))
    );
    assert_eq!(
        w.env().content.text_of(f.guarded),
        Some("Do not rewrite this line.")
    );
    assert_eq!(w.env().content.text_of(f.short), Some("hi"));
    for token in w.tokens() {
        assert!(token.locked);
        assert!(w.env().page.is_locked(token.id));
    }
    assert!(w.env().page.mode(PageMode::Takeover));
}

#[test]
fn activation_after_takeover_is_inert() {
    let mut f = fixture(page(), MemoryStorage::new());
    let w = &mut f.widget;
    for id in [0, 2, 3, 4] {
        w.activate(TokenId(id));
    }
    advance(w, 10_000);
    let ticks = w.env().audio.plays(AudioCue::Tick);
    let pulses = w.env().page.pulse_count(TokenId(0));
    let discovered = w.session().discovered();

    for id in 0..5 {
        assert_eq!(w.activate(TokenId(id)), ActivationOutcome::Ignored);
    }
    assert_eq!(w.session().discovered(), discovered);
    assert_eq!(w.env().audio.plays(AudioCue::Tick), ticks);
    assert_eq!(w.env().page.pulse_count(TokenId(0)), pulses);
}

#[test]
fn activation_during_sequence_is_inert() {
    let mut f = fixture(page(), MemoryStorage::new());
    let w = &mut f.widget;
    for id in [0, 2, 3, 4] {
        w.activate(TokenId(id));
    }
    assert_eq!(w.activate(TokenId(0)), ActivationOutcome::Ignored);
    assert_eq!(w.session().count(), 4);
}

#[test]
fn start_survives_reload_and_duration_is_recorded() {
    let storage = MemoryStorage::with_entries([(START_KEY, (T0 - 60_000).to_string())]);
    let mut f = fixture(page(), storage);
    let w = &mut f.widget;
    for id in [0, 2, 3, 4] {
        w.activate(TokenId(id));
    }
    assert_eq!(
        w.env().storage.get_item(START_KEY),
        Some((T0 - 60_000).to_string())
    );
    assert_eq!(w.env().storage.get_item(DURATION_KEY).as_deref(), Some("60000"));
}

#[test]
fn clock_skew_floors_duration_at_zero() {
    let storage = MemoryStorage::with_entries([(START_KEY, (T0 + 5_000).to_string())]);
    let mut f = fixture(page(), storage);
    let w = &mut f.widget;
    for id in [0, 2, 3, 4] {
        w.activate(TokenId(id));
    }
    assert_eq!(w.env().storage.get_item(DURATION_KEY).as_deref(), Some("0"));
}

#[test]
fn untoggling_below_four_hides_panel() {
    let mut f = fixture(page().without_subliminal(), MemoryStorage::new());
    let w = &mut f.widget;
    w.activate(TokenId(0));
    w.activate(TokenId(0));
    assert!(!w.env().page.panel_visible());
    assert!(!w.is_found(TokenId(0)));
    assert_eq!(w.session().count(), 0);
}

#[test]
fn missing_panel_still_takes_over() {
    let mut f = fixture(page().without_panel(), MemoryStorage::new());
    let w = &mut f.widget;
    for id in [0, 2, 3, 4] {
        w.activate(TokenId(id));
    }
    advance(w, 900);
    assert!(!w.env().page.panel_visible());
    assert_eq!(
        w.phase(),
        RevealPhase::Revealed {
            takeover_at: T0 + 900 + 450
        }
    );

    advance(w, 450);
    assert_eq!(w.phase(), RevealPhase::TakenOver);
    assert_eq!(w.env().content.text_of(f.headline), Some(phrase_fill(9).as_str()));
}
