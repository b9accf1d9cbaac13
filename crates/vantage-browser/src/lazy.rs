//! `LazyPlatform` on top of `IntersectionObserver` and DOM load events.

use std::cell::RefCell;
use std::rc::Rc;

use gloo_events::EventListener;
use js_sys::{Array, Object, Reflect};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, EventTarget, IntersectionObserver, IntersectionObserverEntry, Window};
use web_time::Duration;

use vantage_core::lazy::is_bot_user_agent;
use vantage_core::platform::IntersectionHandler;
use vantage_core::{ElementObserver, Error, IntersectionEntry, LazyPlatform, LoadOutcome, Result};

use crate::element::{DomElement, selected};

fn has_property(target: &JsValue, name: &str) -> bool {
    Reflect::has(target, &JsValue::from_str(name)).unwrap_or(false)
}

/// A live `IntersectionObserver`. Dropping it disconnects.
pub struct WebObserver {
    observer: IntersectionObserver,
    _callback: Closure<dyn FnMut(Array)>,
}

impl ElementObserver<DomElement> for WebObserver {
    fn observe(&self, element: &DomElement) {
        self.observer.observe(element.as_element());
    }

    fn unobserve(&self, element: &DomElement) {
        self.observer.unobserve(element.as_element());
    }

    fn disconnect(&self) {
        self.observer.disconnect();
    }
}

impl Drop for WebObserver {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

#[derive(Clone, Debug)]
pub struct WebLazyPlatform {
    window: Window,
    document: Document,
}

impl WebLazyPlatform {
    pub fn new() -> Result<Self> {
        let window = web_sys::window().ok_or(Error::NoWindow)?;
        let document = window.document().ok_or(Error::NoDocument)?;
        Ok(Self { window, document })
    }

    /// `querySelectorAll` on `container`, or on the document.
    pub fn try_query_all(
        &self,
        selector: &str,
        container: Option<&DomElement>,
    ) -> Result<Vec<DomElement>> {
        let result = match container {
            Some(container) => container.as_element().query_selector_all(selector),
            None => self.document.query_selector_all(selector),
        };
        selected(selector, result)
    }

    fn observer_init(root: Option<&DomElement>, root_margin: &str) -> Object {
        let init = Object::new();
        let entries = [
            ("rootMargin", JsValue::from_str(root_margin)),
            (
                "root",
                root.map_or(JsValue::NULL, |el| el.as_element().into()),
            ),
        ];
        for (key, value) in entries {
            if let Err(e) = Reflect::set(&init, &JsValue::from_str(key), &value) {
                tracing::warn!("Failed to set observer option {}: {:?}", key, e);
            }
        }
        init
    }
}

/// Call `callback` once with the outcome of whichever event fires first, then
/// detach every listener.
pub(crate) fn on_first_event(
    target: &EventTarget,
    events: &[(&'static str, LoadOutcome)],
    callback: Box<dyn FnOnce(LoadOutcome)>,
) {
    let callback = Rc::new(RefCell::new(Some(callback)));
    let listeners: Rc<RefCell<Vec<EventListener>>> = Rc::new(RefCell::new(Vec::new()));

    for &(event, outcome) in events {
        let callback = callback.clone();
        let held = listeners.clone();
        let listener = EventListener::new(target, event, move |_| {
            // A listener can't be dropped from inside its own handler.
            let detached = std::mem::take(&mut *held.borrow_mut());
            wasm_bindgen_futures::spawn_local(async move { drop(detached) });

            let pending = callback.borrow_mut().take();
            if let Some(callback) = pending {
                callback(outcome);
            }
        });
        listeners.borrow_mut().push(listener);
    }
}

fn convert_entries(entries: Array) -> Vec<IntersectionEntry<DomElement>> {
    entries
        .iter()
        .filter_map(|value| value.dyn_into::<IntersectionObserverEntry>().ok())
        .map(|entry| IntersectionEntry {
            target: DomElement::new(entry.target()),
            is_intersecting: entry.is_intersecting(),
            intersection_ratio: entry.intersection_ratio(),
        })
        .collect()
}

impl LazyPlatform for WebLazyPlatform {
    type Element = DomElement;
    type Observer = WebObserver;
    type Listener = EventListener;

    fn query_all(&self, selector: &str, container: Option<&DomElement>) -> Vec<DomElement> {
        self.try_query_all(selector, container).unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            Vec::new()
        })
    }

    fn is_bot(&self) -> bool {
        if !has_property(&self.window, "onscroll") {
            return true;
        }
        let user_agent = self.window.navigator().user_agent().unwrap_or_default();
        is_bot_user_agent(&user_agent)
    }

    fn supports_native_loading(&self) -> bool {
        Reflect::get(&self.window, &JsValue::from_str("HTMLImageElement"))
            .and_then(|ctor| Reflect::get(&ctor, &JsValue::from_str("prototype")))
            .map(|proto| has_property(&proto, "loading"))
            .unwrap_or(false)
    }

    fn create_observer(
        &self,
        root: Option<&DomElement>,
        root_margin: &str,
        handler: IntersectionHandler<DomElement>,
    ) -> Option<WebObserver> {
        if !has_property(&self.window, "IntersectionObserver") {
            return None;
        }

        let callback = Closure::<dyn FnMut(Array)>::new(move |entries: Array| {
            handler(convert_entries(entries));
        });
        let init = Self::observer_init(root, root_margin);
        match IntersectionObserver::new_with_options(
            callback.as_ref().unchecked_ref(),
            init.unchecked_ref(),
        ) {
            Ok(observer) => Some(WebObserver {
                observer,
                _callback: callback,
            }),
            Err(e) => {
                tracing::warn!("Failed to create IntersectionObserver: {:?}", e);
                None
            }
        }
    }

    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> Result<u32> {
        let closure = Closure::once_into_js(callback);
        let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        self.window
            .set_timeout_with_callback_and_timeout_and_arguments_0(closure.unchecked_ref(), millis)
            .map(|id| id as u32)
            .map_err(|e| Error::Platform(format!("setTimeout failed: {:?}", e)))
    }

    fn clear_timeout(&self, id: u32) {
        self.window.clear_timeout_with_handle(id as i32);
    }

    fn once_loaded(&self, element: &DomElement, callback: Box<dyn FnOnce(LoadOutcome)>) {
        on_first_event(
            element.as_element(),
            &[
                ("load", LoadOutcome::Loaded),
                ("loadeddata", LoadOutcome::Loaded),
                ("error", LoadOutcome::Failed),
            ],
            callback,
        );
    }

    fn on_online(&self, handler: Rc<dyn Fn()>) -> EventListener {
        EventListener::new(&self.window, "online", move |_| handler())
    }
}
