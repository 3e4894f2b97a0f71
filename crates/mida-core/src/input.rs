#![forbid(unsafe_code)]

//! Token activation.
//!
//! Pointer clicks and the two keyboard confirm keys (Enter and Space) are
//! normalized into a single [`RevealWidget::activate`] call. Activation
//! restarts the token's pulse, plays the tick cue, and toggles the token's
//! letter in the discovery set, then hands the new count to
//! [`RevealWidget::evaluate_progress`]. The found marker belongs to the
//! letter, so tokens sharing a letter are marked and cleared together.
//!
//! Once the reveal has triggered, activation is inert: no cue, no pulse, no
//! change to the discovery set.

use crate::audio::{AudioCue, PlaybackOptions, play_cue};
use crate::clock::Clock;
use crate::letter::{Letter, Toggle};
use crate::page::{Page, TokenId};
use crate::reveal::{Environment, RevealWidget};
use crate::storage::SessionTimer;

/// Keyboard key as far as token activation cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Space,
    Other,
}

impl Key {
    /// Map a DOM `KeyboardEvent.key` value.
    #[must_use]
    pub fn from_dom(key: &str) -> Self {
        match key {
            "Enter" => Self::Enter,
            " " => Self::Space,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub const fn is_confirm(self) -> bool {
        matches!(self, Self::Enter | Self::Space)
    }
}

/// Raw input delivered to a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenInput {
    Click,
    Key(Key),
}

/// What an activation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// Reveal already triggered, or unknown token. Nothing happened.
    Ignored,
    /// Cue and pulse only; the token is not a required letter.
    Pulsed,
    /// The letter joined the discovery set.
    Found(Letter),
    /// The letter left the discovery set.
    Cleared(Letter),
}

/// How the host should treat the originating DOM event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputDisposition {
    /// `None` when the input was not an activation.
    pub outcome: Option<ActivationOutcome>,
    /// Suppress the key's default page behavior (scrolling, form submit).
    pub prevent_default: bool,
}

impl<E: Environment> RevealWidget<E> {
    /// Normalize a click or key press into an activation.
    pub fn handle_input(&mut self, id: TokenId, input: TokenInput) -> InputDisposition {
        match input {
            TokenInput::Click => InputDisposition {
                outcome: Some(self.activate(id)),
                prevent_default: false,
            },
            TokenInput::Key(key) if key.is_confirm() => InputDisposition {
                outcome: Some(self.activate(id)),
                prevent_default: true,
            },
            TokenInput::Key(_) => InputDisposition {
                outcome: None,
                prevent_default: false,
            },
        }
    }

    /// Activate a token.
    pub fn activate(&mut self, id: TokenId) -> ActivationOutcome {
        if self.session.triggered() {
            return ActivationOutcome::Ignored;
        }
        let Some(letter) = self.tokens.get(id.0).map(|t| t.letter) else {
            tracing::debug!(token = %id, "activation for unknown token");
            return ActivationOutcome::Ignored;
        };

        let now = self.env.clock().now_ms();
        let tick_volume = self.config.tick_volume;
        let full = Letter::REQUIRED.len();

        let toggled = {
            let parts = self.env.parts();
            SessionTimer::mark_start(parts.storage, now);
            play_cue(parts.audio, AudioCue::Tick, PlaybackOptions::once(tick_volume));
            if let Err(err) = parts.page.pulse_token(id) {
                tracing::warn!(token = %id, error = %err, "could not pulse token");
            }

            let Some(letter) = letter else {
                return ActivationOutcome::Pulsed;
            };

            let toggle = self.session.discovered_mut().flip(letter);
            let found = toggle == Toggle::Added;
            // Every token carrying the letter shares its marker.
            for token in self.tokens.iter().filter(|t| t.letter == Some(letter)) {
                if let Err(err) = parts.page.set_token_found(token.id, found) {
                    tracing::warn!(token = %token.id, error = %err, "could not update found marker");
                }
            }
            if !found && self.session.count() < full {
                if let Err(err) = parts.page.set_panel_visible(false) {
                    tracing::warn!(error = %err, "could not hide reveal panel");
                }
            }
            (letter, toggle)
        };

        let (letter, toggle) = toggled;
        tracing::debug!(%letter, ?toggle, count = self.session.count(), "token toggled");
        self.evaluate_progress(self.session.count());

        match toggle {
            Toggle::Added => ActivationOutcome::Found(letter),
            Toggle::Removed => ActivationOutcome::Cleared(letter),
        }
    }
}
