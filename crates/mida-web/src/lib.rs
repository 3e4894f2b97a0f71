#![forbid(unsafe_code)]

//! WASM frontend for MIDA Node.
//!
//! Binds [`mida_core::RevealWidget`] to the live document: `.token` elements
//! become page tokens, `<audio>` elements become cues, `localStorage` holds
//! the session timer, and a single `setTimeout` drives the widget's clock.
//!
//! Mount options are plain JSON so the page can tune selectors and timings
//! without a rebuild; see [`MountOptions`].

mod options;

pub use options::{MountOptions, OptionsError};

#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::MidaNode;

/// Native builds compile this crate as a stub so `cargo check --workspace` stays
/// green on non-wasm targets.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default)]
pub struct MidaNode {
    options: MountOptions,
}

#[cfg(not(target_arch = "wasm32"))]
impl MidaNode {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options the stub was configured with. There is no document to mount on.
    pub fn options(&self) -> &MountOptions {
        &self.options
    }
}
