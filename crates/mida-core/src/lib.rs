#![forbid(unsafe_code)]

//! MIDA Node core: the progressive-reveal state machine.
//!
//! A page carries a handful of letter tokens. Toggling the four required
//! letters (`m`, `i`, `d`, `a`) on arms a short subliminal animation, shows a
//! reveal panel, and finally performs an irreversible takeover of the page's
//! visible text.
//!
//! Design goals:
//! - **Host-agnostic**: markup, audio, storage, and time sit behind narrow
//!   traits ([`page::Page`], [`content::ContentTree`], [`audio::AudioSink`],
//!   [`storage::SessionStorage`], [`clock::Clock`]).
//! - **Deterministic time**: the host advances the clock and calls
//!   [`reveal::RevealWidget::tick`]; nothing blocks or spawns.
//! - **Degrade, never fail**: missing elements and refused playback are
//!   silent; a failed animation still ends in the takeover.

pub mod audio;
pub mod clock;
pub mod config;
pub mod content;
pub mod input;
pub mod letter;
pub mod page;
pub mod reveal;
pub mod sequencer;
pub mod storage;
pub mod takeover;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use config::RevealConfig;
pub use input::{ActivationOutcome, InputDisposition, Key, TokenInput};
pub use letter::{Discovered, Letter};
pub use page::TokenId;
pub use reveal::{Environment, Host, RevealEvent, RevealPhase, RevealWidget};
