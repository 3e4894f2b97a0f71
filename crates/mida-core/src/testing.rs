#![forbid(unsafe_code)]

//! Recording fakes for the collaborator traits.
//!
//! Available in unit tests and, with the `test-helpers` feature, to
//! integration tests and downstream crates.

use std::collections::HashSet;

use crate::audio::{AudioCue, AudioSink, PlaybackError, PlaybackOptions};
use crate::page::{LayerStyle, Page, PageError, PageMode, PageResult, TokenId};

/// A recorded mutating call on [`FakePage`].
#[derive(Debug, Clone, PartialEq)]
pub enum PageCall {
    SetFound(TokenId, bool),
    Pulse(TokenId),
    Lock(TokenId),
    SetMode(PageMode, bool),
    SetPanel(bool),
    SetSubliminal(bool),
    SetLayer(usize, LayerStyle),
}

/// In-memory page with tokens, a reveal panel, and subliminal layers.
#[derive(Debug, Clone)]
pub struct FakePage {
    labels: Vec<Option<String>>,
    found: HashSet<TokenId>,
    locked: HashSet<TokenId>,
    pulses: Vec<TokenId>,
    modes: HashSet<PageMode>,
    has_panel: bool,
    panel_visible: bool,
    layers: Option<Vec<LayerStyle>>,
    subliminal_visible: bool,
    fail_layers: bool,
    fail_subliminal: bool,
    calls: Vec<PageCall>,
}

impl FakePage {
    /// Page with one token per label (empty string means "no attribute"),
    /// a reveal panel, and three subliminal layers.
    #[must_use]
    pub fn new(labels: &[&str]) -> Self {
        Self {
            labels: labels
                .iter()
                .map(|l| (!l.is_empty()).then(|| (*l).to_owned()))
                .collect(),
            found: HashSet::new(),
            locked: HashSet::new(),
            pulses: Vec::new(),
            modes: HashSet::new(),
            has_panel: true,
            panel_visible: false,
            layers: Some(vec![LayerStyle::HIDDEN; 3]),
            subliminal_visible: false,
            fail_layers: false,
            fail_subliminal: false,
            calls: Vec::new(),
        }
    }

    #[must_use]
    pub fn without_subliminal(mut self) -> Self {
        self.layers = None;
        self
    }

    #[must_use]
    pub fn without_panel(mut self) -> Self {
        self.has_panel = false;
        self
    }

    #[must_use]
    pub fn with_layers(mut self, count: usize) -> Self {
        self.layers = Some(vec![LayerStyle::HIDDEN; count]);
        self
    }

    /// Make every `set_layer` call fail.
    pub fn fail_layers(&mut self, fail: bool) {
        self.fail_layers = fail;
    }

    /// Make every `set_subliminal_visible` call fail.
    pub fn fail_subliminal(&mut self, fail: bool) {
        self.fail_subliminal = fail;
    }

    #[must_use]
    pub fn calls(&self) -> &[PageCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    #[must_use]
    pub fn is_found(&self, id: TokenId) -> bool {
        self.found.contains(&id)
    }

    #[must_use]
    pub fn found_count(&self) -> usize {
        self.found.len()
    }

    #[must_use]
    pub fn is_locked(&self, id: TokenId) -> bool {
        self.locked.contains(&id)
    }

    #[must_use]
    pub fn pulse_count(&self, id: TokenId) -> usize {
        self.pulses.iter().filter(|p| **p == id).count()
    }

    #[must_use]
    pub fn mode(&self, mode: PageMode) -> bool {
        self.modes.contains(&mode)
    }

    #[must_use]
    pub fn panel_visible(&self) -> bool {
        self.panel_visible
    }

    #[must_use]
    pub fn subliminal_visible(&self) -> bool {
        self.subliminal_visible
    }

    /// Current style of layer `index`.
    ///
    /// # Panics
    ///
    /// Panics if the page has no such layer.
    #[must_use]
    pub fn layer(&self, index: usize) -> LayerStyle {
        self.layers.as_ref().expect("page has layers")[index]
    }

    fn check_token(&self, id: TokenId) -> PageResult {
        if id.0 < self.labels.len() {
            Ok(())
        } else {
            Err(PageError::UnknownElement(id.to_string()))
        }
    }
}

impl Page for FakePage {
    fn token_labels(&self) -> Vec<Option<String>> {
        self.labels.clone()
    }

    fn set_token_found(&mut self, id: TokenId, found: bool) -> PageResult {
        self.check_token(id)?;
        self.calls.push(PageCall::SetFound(id, found));
        if found {
            self.found.insert(id);
        } else {
            self.found.remove(&id);
        }
        Ok(())
    }

    fn pulse_token(&mut self, id: TokenId) -> PageResult {
        self.check_token(id)?;
        self.calls.push(PageCall::Pulse(id));
        self.pulses.push(id);
        Ok(())
    }

    fn lock_token(&mut self, id: TokenId) -> PageResult {
        self.check_token(id)?;
        self.calls.push(PageCall::Lock(id));
        self.locked.insert(id);
        Ok(())
    }

    fn set_mode(&mut self, mode: PageMode, enabled: bool) -> PageResult {
        self.calls.push(PageCall::SetMode(mode, enabled));
        if enabled {
            self.modes.insert(mode);
        } else {
            self.modes.remove(&mode);
        }
        Ok(())
    }

    fn set_panel_visible(&mut self, visible: bool) -> PageResult {
        if !self.has_panel {
            return Ok(());
        }
        self.calls.push(PageCall::SetPanel(visible));
        self.panel_visible = visible;
        Ok(())
    }

    fn subliminal_layers(&self) -> Option<usize> {
        self.layers.as_ref().map(Vec::len)
    }

    fn set_subliminal_visible(&mut self, visible: bool) -> PageResult {
        if self.fail_subliminal {
            return Err(PageError::Dom("subliminal container detached".into()));
        }
        self.calls.push(PageCall::SetSubliminal(visible));
        self.subliminal_visible = visible;
        Ok(())
    }

    fn set_layer(&mut self, index: usize, style: LayerStyle) -> PageResult {
        if self.fail_layers {
            return Err(PageError::Dom("layer style rejected".into()));
        }
        let layers = self
            .layers
            .as_mut()
            .ok_or_else(|| PageError::UnknownElement("subliminal container".into()))?;
        let slot = layers
            .get_mut(index)
            .ok_or_else(|| PageError::UnknownElement(format!("layer {index}")))?;
        *slot = style;
        self.calls.push(PageCall::SetLayer(index, style));
        Ok(())
    }
}

/// A recorded audio call.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioCall {
    Play(AudioCue, PlaybackOptions),
    Stop(AudioCue),
}

/// Audio sink that records calls and can refuse playback.
#[derive(Debug, Default, Clone)]
pub struct FakeAudio {
    calls: Vec<AudioCall>,
    refuse: bool,
}

impl FakeAudio {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every `play`, like a browser blocking autoplay.
    #[must_use]
    pub fn refusing() -> Self {
        Self {
            calls: Vec::new(),
            refuse: true,
        }
    }

    #[must_use]
    pub fn calls(&self) -> &[AudioCall] {
        &self.calls
    }

    #[must_use]
    pub fn plays(&self, cue: AudioCue) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, AudioCall::Play(played, _) if *played == cue))
            .count()
    }

    #[must_use]
    pub fn stops(&self, cue: AudioCue) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, AudioCall::Stop(stopped) if *stopped == cue))
            .count()
    }
}

impl AudioSink for FakeAudio {
    fn play(&mut self, cue: AudioCue, options: PlaybackOptions) -> Result<(), PlaybackError> {
        self.calls.push(AudioCall::Play(cue, options));
        if self.refuse {
            return Err(PlaybackError::Refused("NotAllowedError".into()));
        }
        Ok(())
    }

    fn stop(&mut self, cue: AudioCue) {
        self.calls.push(AudioCall::Stop(cue));
    }
}
