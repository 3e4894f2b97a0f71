#![forbid(unsafe_code)]

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use mida_core::clock::{Clock, SystemClock};
use mida_core::storage::SessionTimer;
use mida_core::{Host, Key, RevealPhase, RevealWidget, TokenId, TokenInput};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Event, HtmlElement, KeyboardEvent, Node, Window};

use crate::dom::{DomAudio, DomContent, DomPage, LocalStorage, describe};
use crate::options::MountOptions;

type WebHost = Host<DomPage, DomContent, DomAudio, LocalStorage, SystemClock>;

type Listener = (HtmlElement, &'static str, Closure<dyn FnMut(Event)>);

/// State reachable from DOM callbacks.
struct Shared {
    widget: RevealWidget<WebHost>,
    window: Window,
    /// Pending `setTimeout` handle.
    timer: Option<i32>,
    /// JS function of the wake closure. `None` once destroyed.
    wake: Option<js_sys::Function>,
}

impl Shared {
    /// Flush events and arm one timer for the next deadline.
    fn settle(&mut self) {
        for event in self.widget.drain_events() {
            tracing::debug!(?event, "reveal event");
        }
        if let Some(handle) = self.timer.take() {
            self.window.clear_timeout_with_handle(handle);
        }
        let (Some(deadline), Some(wake)) = (self.widget.next_deadline(), self.wake.as_ref()) else {
            return;
        };
        let now = self.widget.env().clock.now_ms();
        let delay = i32::try_from(deadline.saturating_sub(now)).unwrap_or(i32::MAX);
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(wake, delay)
        {
            Ok(handle) => self.timer = Some(handle),
            Err(err) => tracing::warn!(error = %describe(&err), "could not arm reveal timer"),
        }
    }
}

fn dispatch(shared: &Weak<RefCell<Shared>>, id: TokenId, input: TokenInput) -> bool {
    let Some(shared) = shared.upgrade() else {
        return false;
    };
    let Ok(mut state) = shared.try_borrow_mut() else {
        tracing::debug!(token = %id, "input during reveal update dropped");
        return false;
    };
    let disposition = state.widget.handle_input(id, input);
    state.settle();
    disposition.prevent_default
}

fn parse_options(options: Option<JsValue>) -> Result<MountOptions, JsValue> {
    let Some(value) = options.filter(|v| !v.is_undefined() && !v.is_null()) else {
        return Ok(MountOptions::default());
    };
    let json: String = js_sys::JSON::stringify(&value)?.into();
    MountOptions::from_json(&json).map_err(|err| JsValue::from_str(&err.to_string()))
}

/// The reveal widget mounted on the current document.
#[wasm_bindgen]
pub struct MidaNode {
    shared: Rc<RefCell<Shared>>,
    listeners: Vec<Listener>,
    _wake: Closure<dyn FnMut()>,
}

#[wasm_bindgen]
impl MidaNode {
    /// Discover tokens, cues, panel, and layers, and wire token input.
    ///
    /// `options` is a plain object matching [`MountOptions`]; omitted fields
    /// keep their defaults.
    pub fn mount(options: Option<JsValue>) -> Result<MidaNode, JsValue> {
        let options = parse_options(options)?;
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let body = document
            .body()
            .ok_or_else(|| JsValue::from_str("document has no body"))?;

        let root: Node = match document.get_element_by_id(&options.root_id) {
            Some(el) => el.into(),
            None => body.clone().into(),
        };
        let page = DomPage::discover(&document, body, &options)?;
        let elements = page.tokens().to_vec();
        if elements.is_empty() {
            web_sys::console::warn_1(&JsValue::from_str(&format!(
                "[MIDA NODE] No {} elements found. Check the caption markup.",
                options.token_selector
            )));
        }

        let host = Host {
            page,
            content: DomContent::new(root, options.protect_attribute.clone()),
            audio: DomAudio::discover(&document, &options),
            storage: LocalStorage::open(&window),
            clock: SystemClock,
        };
        let shared = Rc::new(RefCell::new(Shared {
            widget: RevealWidget::new(host, options.reveal),
            window,
            timer: None,
            wake: None,
        }));

        let weak = Rc::downgrade(&shared);
        let wake = Closure::<dyn FnMut()>::new(move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let mut state = shared.borrow_mut();
            state.timer = None;
            state.widget.tick();
            state.settle();
        });
        shared.borrow_mut().wake = Some(wake.as_ref().unchecked_ref::<js_sys::Function>().clone());

        let mut listeners = Vec::with_capacity(elements.len() * 2);
        for (index, el) in elements.into_iter().enumerate() {
            let id = TokenId(index);

            let weak = Rc::downgrade(&shared);
            let click = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
                dispatch(&weak, id, TokenInput::Click);
            });
            el.add_event_listener_with_callback("click", click.as_ref().unchecked_ref())?;
            listeners.push((el.clone(), "click", click));

            let weak = Rc::downgrade(&shared);
            let keydown = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
                let Some(key) = event.dyn_ref::<KeyboardEvent>().map(|k| Key::from_dom(&k.key()))
                else {
                    return;
                };
                if dispatch(&weak, id, TokenInput::Key(key)) {
                    event.prevent_default();
                }
            });
            el.add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref())?;
            listeners.push((el, "keydown", keydown));
        }

        tracing::info!(tokens = listeners.len() / 2, "mida node mounted");
        Ok(Self {
            shared,
            listeners,
            _wake: wake,
        })
    }

    /// Number of required letters currently found.
    #[wasm_bindgen(js_name = foundCount)]
    pub fn found_count(&self) -> usize {
        self.shared.borrow().widget.session().count()
    }

    /// Whether the reveal has fired. Input is inert from then on.
    pub fn triggered(&self) -> bool {
        self.shared.borrow().widget.session().triggered()
    }

    /// Whether the takeover has rewritten the page.
    #[wasm_bindgen(js_name = takenOver)]
    pub fn taken_over(&self) -> bool {
        self.shared.borrow().widget.phase() == RevealPhase::TakenOver
    }

    /// Recorded completion time in milliseconds, if any.
    #[wasm_bindgen(js_name = durationMs)]
    pub fn duration_ms(&self) -> Option<f64> {
        SessionTimer::duration(&self.shared.borrow().widget.env().storage).map(|ms| ms as f64)
    }

    /// Explicit teardown for JS callers. Detaches listeners and cancels the
    /// pending timer; page changes already made stay.
    pub fn destroy(&mut self) {
        self.detach();
    }
}

impl MidaNode {
    fn detach(&mut self) {
        for (el, kind, callback) in self.listeners.drain(..) {
            if let Err(err) =
                el.remove_event_listener_with_callback(kind, callback.as_ref().unchecked_ref())
            {
                tracing::debug!(error = %describe(&err), "could not detach listener");
            }
        }
        let Ok(mut state) = self.shared.try_borrow_mut() else {
            return;
        };
        if let Some(handle) = state.timer.take() {
            state.window.clear_timeout_with_handle(handle);
        }
        state.wake = None;
    }
}

// Listeners never outlive their closures, even on a bare JS `free()`.
impl Drop for MidaNode {
    fn drop(&mut self) {
        self.detach();
    }
}
