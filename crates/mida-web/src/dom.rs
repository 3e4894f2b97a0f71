#![forbid(unsafe_code)]

//! `web-sys` implementations of the core collaborator traits.

use mida_core::audio::{AudioCue, AudioSink, PlaybackError, PlaybackOptions};
use mida_core::content::{ContentTree, NodeKind, TextContext};
use mida_core::page::{LayerStyle, Page, PageError, PageMode, PageResult, TokenId};
use mida_core::storage::{SessionStorage, StorageError, StorageResult};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, Element, HtmlElement, HtmlMediaElement, Node, NodeList, Storage};

use crate::options::MountOptions;

const FOUND_CLASS: &str = "is-found";
const PULSE_CLASS: &str = "pulse";
const SHOW_CLASS: &str = "show";

pub(crate) fn dom_error(err: JsValue) -> PageError {
    PageError::Dom(describe(&err))
}

pub(crate) fn describe(err: &JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

fn nodes(list: &NodeList) -> impl Iterator<Item = Node> + '_ {
    (0..list.length()).filter_map(move |i| list.item(i))
}

fn html_elements(list: &NodeList) -> Vec<HtmlElement> {
    nodes(list)
        .filter_map(|n| n.dyn_into::<HtmlElement>().ok())
        .collect()
}

fn set_shown(el: &Element, visible: bool) -> PageResult {
    let classes = el.class_list();
    if visible {
        classes.add_1(SHOW_CLASS).map_err(dom_error)?;
    } else {
        classes.remove_1(SHOW_CLASS).map_err(dom_error)?;
    }
    el.set_attribute("aria-hidden", if visible { "false" } else { "true" })
        .map_err(dom_error)
}

/// Tokens, panel, and subliminal layers of a mounted document.
pub(crate) struct DomPage {
    body: HtmlElement,
    tokens: Vec<HtmlElement>,
    letter_attribute: String,
    panel: Option<Element>,
    subliminal: Option<Element>,
    layers: Vec<HtmlElement>,
}

impl DomPage {
    pub(crate) fn discover(
        document: &Document,
        body: HtmlElement,
        options: &MountOptions,
    ) -> Result<Self, JsValue> {
        let tokens = html_elements(&document.query_selector_all(&options.token_selector)?);
        let subliminal = document.get_element_by_id(&options.subliminal_id);
        let layers = match &subliminal {
            Some(container) => html_elements(&container.query_selector_all(&options.layer_selector)?),
            None => Vec::new(),
        };
        Ok(Self {
            body,
            tokens,
            letter_attribute: options.letter_attribute.clone(),
            panel: document.get_element_by_id(&options.panel_id),
            subliminal,
            layers,
        })
    }

    pub(crate) fn tokens(&self) -> &[HtmlElement] {
        &self.tokens
    }

    fn token(&self, id: TokenId) -> PageResult<&HtmlElement> {
        self.tokens
            .get(id.0)
            .ok_or_else(|| PageError::UnknownElement(id.to_string()))
    }
}

impl Page for DomPage {
    fn token_labels(&self) -> Vec<Option<String>> {
        self.tokens
            .iter()
            .map(|t| t.get_attribute(&self.letter_attribute))
            .collect()
    }

    fn set_token_found(&mut self, id: TokenId, found: bool) -> PageResult {
        let classes = self.token(id)?.class_list();
        let result = if found {
            classes.add_1(FOUND_CLASS)
        } else {
            classes.remove_1(FOUND_CLASS)
        };
        result.map_err(dom_error)
    }

    fn pulse_token(&mut self, id: TokenId) -> PageResult {
        let token = self.token(id)?;
        token.class_list().remove_1(PULSE_CLASS).map_err(dom_error)?;
        // Reading layout forces a reflow so the animation restarts.
        let _ = token.offset_width();
        token.class_list().add_1(PULSE_CLASS).map_err(dom_error)
    }

    fn lock_token(&mut self, id: TokenId) -> PageResult {
        let token = self.token(id)?;
        token.set_tab_index(-1);
        token.class_list().remove_1(PULSE_CLASS).map_err(dom_error)
    }

    fn set_mode(&mut self, mode: PageMode, enabled: bool) -> PageResult {
        let classes = self.body.class_list();
        let result = if enabled {
            classes.add_1(mode.class_name())
        } else {
            classes.remove_1(mode.class_name())
        };
        result.map_err(dom_error)
    }

    fn set_panel_visible(&mut self, visible: bool) -> PageResult {
        match &self.panel {
            Some(panel) => set_shown(panel, visible),
            None => Ok(()),
        }
    }

    fn subliminal_layers(&self) -> Option<usize> {
        self.subliminal.as_ref().map(|_| self.layers.len())
    }

    fn set_subliminal_visible(&mut self, visible: bool) -> PageResult {
        match &self.subliminal {
            Some(container) => set_shown(container, visible),
            None => Err(PageError::UnknownElement("subliminal container".to_owned())),
        }
    }

    fn set_layer(&mut self, index: usize, style: LayerStyle) -> PageResult {
        let layer = self
            .layers
            .get(index)
            .ok_or_else(|| PageError::UnknownElement(format!("layer {index}")))?;
        let css = layer.style();
        css.set_property("opacity", &style.opacity.to_string())
            .map_err(dom_error)?;
        css.set_property("transform", &style.transform())
            .map_err(dom_error)
    }
}

/// Text under the takeover root.
pub(crate) struct DomContent {
    root: Node,
    protect_attribute: String,
}

impl DomContent {
    pub(crate) fn new(root: Node, protect_attribute: String) -> Self {
        Self {
            root,
            protect_attribute,
        }
    }
}

impl ContentTree for DomContent {
    type Node = Node;

    fn root(&self) -> Option<Node> {
        Some(self.root.clone())
    }

    fn children(&self, node: &Node) -> Vec<Node> {
        nodes(&node.child_nodes()).collect()
    }

    fn kind(&self, node: &Node) -> NodeKind {
        match node.node_type() {
            Node::TEXT_NODE => NodeKind::Text(node.node_value().unwrap_or_default()),
            Node::ELEMENT_NODE => match node.dyn_ref::<Element>() {
                Some(el) => NodeKind::Element {
                    tag: el.tag_name().to_ascii_lowercase(),
                    protected: el.get_attribute(&self.protect_attribute).as_deref()
                        == Some("true"),
                },
                None => NodeKind::Other,
            },
            _ => NodeKind::Other,
        }
    }

    fn set_text(&mut self, node: &Node, text: &str) {
        if node.node_type() == Node::TEXT_NODE {
            node.set_node_value(Some(text));
        }
    }

    fn root_context(&self) -> TextContext {
        let selector = format!("[{}='true']", self.protect_attribute);
        let protected = match self.root.dyn_ref::<Element>().map(|el| el.closest(&selector)) {
            Some(Ok(found)) => found.is_some(),
            Some(Err(err)) => {
                tracing::warn!(error = %describe(&err), "could not resolve protected ancestors");
                false
            }
            None => false,
        };
        TextContext {
            protected,
            non_renderable: false,
        }
    }

    /// `nodeValue.length` counts UTF-16 code units.
    fn text_len(&self, text: &str) -> usize {
        text.encode_utf16().count()
    }
}

/// `<audio>` elements for the two cues.
pub(crate) struct DomAudio {
    tick: Option<HtmlMediaElement>,
    noise: Option<HtmlMediaElement>,
}

impl DomAudio {
    pub(crate) fn discover(document: &Document, options: &MountOptions) -> Self {
        let media = |id: &str| {
            document
                .get_element_by_id(id)
                .and_then(|el| el.dyn_into::<HtmlMediaElement>().ok())
        };
        Self {
            tick: media(&options.tick_id),
            noise: media(&options.noise_id),
        }
    }

    fn element(&self, cue: AudioCue) -> Option<&HtmlMediaElement> {
        match cue {
            AudioCue::Tick => self.tick.as_ref(),
            AudioCue::GlitchNoise => self.noise.as_ref(),
        }
    }
}

impl AudioSink for DomAudio {
    fn play(&mut self, cue: AudioCue, options: PlaybackOptions) -> Result<(), PlaybackError> {
        let el = self.element(cue).ok_or(PlaybackError::Missing(cue))?;
        el.set_loop(options.looped);
        el.set_volume(f64::from(options.volume));
        el.set_current_time(0.0);
        let promise = el
            .play()
            .map_err(|err| PlaybackError::Refused(describe(&err)))?;
        // Autoplay policy rejects asynchronously; nothing to recover.
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(err) = JsFuture::from(promise).await {
                tracing::debug!(cue = cue.name(), error = %describe(&err), "play() rejected");
            }
        });
        Ok(())
    }

    fn stop(&mut self, cue: AudioCue) {
        if let Some(el) = self.element(cue) {
            if let Err(err) = el.pause() {
                tracing::debug!(cue = cue.name(), error = %describe(&err), "pause() failed");
            }
            el.set_current_time(0.0);
        }
    }
}

/// `window.localStorage`, or nothing when the browser withholds it.
pub(crate) struct LocalStorage {
    inner: Option<Storage>,
}

impl LocalStorage {
    pub(crate) fn open(window: &web_sys::Window) -> Self {
        let inner = match window.local_storage() {
            Ok(storage) => storage,
            Err(err) => {
                tracing::warn!(error = %describe(&err), "localStorage unavailable");
                None
            }
        };
        Self { inner }
    }
}

impl SessionStorage for LocalStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.inner.as_ref()?.get_item(key).ok().flatten()
    }

    fn set_item(&mut self, key: &str, value: &str) -> StorageResult<()> {
        let storage = self
            .inner
            .as_ref()
            .ok_or_else(|| StorageError::Unavailable("localStorage".to_owned()))?;
        storage
            .set_item(key, value)
            .map_err(|err| StorageError::Rejected(describe(&err)))
    }
}
