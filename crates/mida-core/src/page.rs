#![forbid(unsafe_code)]

//! Presentation collaborator.
//!
//! [`Page`] is the narrow surface the widget needs from the markup: token
//! state classes, page-wide modes, the reveal panel, and the subliminal
//! layer stack. Text traversal for the takeover lives in
//! [`crate::content`] instead, since it is generic over the tree type.
//!
//! Absent optional elements (the reveal panel) are `Ok(())` no-ops. Errors are
//! reserved for operations the host could not carry out on an element that
//! does exist.

use core::fmt;

/// Position of a token in page order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub usize);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token#{}", self.0)
    }
}

/// Page-wide visual modes toggled on the document body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageMode {
    /// Subtle glitch distortion while three or more letters are found.
    Distortion,
    /// Permanent marker set by the takeover.
    Takeover,
}

impl PageMode {
    /// CSS class the web host applies for this mode.
    #[must_use]
    pub const fn class_name(self) -> &'static str {
        match self {
            Self::Distortion => "glitch",
            Self::Takeover => "deimos",
        }
    }
}

/// Visual state of one subliminal layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerStyle {
    pub opacity: f32,
    /// Horizontal offset in CSS pixels.
    pub dx: f32,
    /// Vertical offset in CSS pixels.
    pub dy: f32,
}

impl LayerStyle {
    /// Fully transparent, no offset.
    pub const HIDDEN: LayerStyle = LayerStyle {
        opacity: 0.0,
        dx: 0.0,
        dy: 0.0,
    };

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.opacity == 0.0 && self.dx == 0.0 && self.dy == 0.0
    }

    /// CSS `transform` value, two decimal places like the original markup
    /// expects.
    #[must_use]
    pub fn transform(&self) -> String {
        if self.dx == 0.0 && self.dy == 0.0 {
            "translate(0,0)".to_owned()
        } else {
            format!("translate({:.2}px, {:.2}px)", self.dx, self.dy)
        }
    }
}

/// Failure to update an element that exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    /// The host could not apply a presentation change.
    Dom(String),
    /// A token or layer index is out of range.
    UnknownElement(String),
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dom(msg) => write!(f, "dom error: {msg}"),
            Self::UnknownElement(what) => write!(f, "unknown element: {what}"),
        }
    }
}

impl std::error::Error for PageError {}

/// Result type for page operations.
pub type PageResult<T = ()> = Result<T, PageError>;

/// Markup and presentation surface.
pub trait Page {
    /// Raw letter attribute of each token in page order (`None` when the
    /// attribute is absent).
    fn token_labels(&self) -> Vec<Option<String>>;

    /// Set or clear a token's "found" marker.
    fn set_token_found(&mut self, id: TokenId, found: bool) -> PageResult;

    /// Restart the token's short pulse animation.
    fn pulse_token(&mut self, id: TokenId) -> PageResult;

    /// Remove the token from keyboard focus order and strip its pulse.
    fn lock_token(&mut self, id: TokenId) -> PageResult;

    /// Enable or disable a page-wide mode.
    fn set_mode(&mut self, mode: PageMode, enabled: bool) -> PageResult;

    /// Show or hide the reveal panel, keeping `aria-hidden` in sync.
    fn set_panel_visible(&mut self, visible: bool) -> PageResult;

    /// Number of subliminal layers, or `None` when the container is absent.
    fn subliminal_layers(&self) -> Option<usize>;

    /// Show or hide the subliminal container, keeping `aria-hidden` in sync.
    fn set_subliminal_visible(&mut self, visible: bool) -> PageResult;

    /// Apply a style to the layer at `index`.
    fn set_layer(&mut self, index: usize, style: LayerStyle) -> PageResult;
}
