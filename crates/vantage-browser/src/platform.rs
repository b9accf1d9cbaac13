//! `ScrollPlatform` for the browser window or a scrollable element.

use std::rc::Rc;

use gloo_events::EventListener;
use gloo_timers::callback::Timeout;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{Document, EventTarget, HtmlElement, Window};
use web_time::Instant;

use vantage_core::{Error, Frame, LocalTask, Position, Result, ScrollPlatform};

use crate::element::{DomElement, selected};

/// Frame interval used when `requestAnimationFrame` is missing.
const FALLBACK_FRAME_MS: u32 = 1000 / 60;

/// What scrolls.
#[derive(Clone, Debug, PartialEq)]
pub enum ScrollContainer {
    Window,
    Element(HtmlElement),
}

#[derive(Clone, Debug)]
pub struct WebScrollPlatform {
    window: Window,
    document: Document,
    container: ScrollContainer,
    animation_frames: bool,
}

impl WebScrollPlatform {
    /// Watch the window.
    pub fn new() -> Result<Self> {
        Self::with_container(ScrollContainer::Window)
    }

    pub fn with_container(container: ScrollContainer) -> Result<Self> {
        let window = web_sys::window().ok_or(Error::NoWindow)?;
        let document = window.document().ok_or(Error::NoDocument)?;
        let animation_frames =
            js_sys::Reflect::has(&window, &"requestAnimationFrame".into()).unwrap_or(false);
        if !animation_frames {
            tracing::debug!("requestAnimationFrame unavailable, using timers");
        }

        Ok(Self {
            window,
            document,
            container,
            animation_frames,
        })
    }

    pub fn container(&self) -> &ScrollContainer {
        &self.container
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Document-wide `querySelectorAll`.
    pub fn try_query_all(&self, selector: &str) -> Result<Vec<DomElement>> {
        selected(selector, self.document.query_selector_all(selector))
    }

    fn event_target(&self) -> &EventTarget {
        match &self.container {
            ScrollContainer::Window => self.window.as_ref(),
            ScrollContainer::Element(element) => element.as_ref(),
        }
    }
}

fn js_number(value: std::result::Result<wasm_bindgen::JsValue, wasm_bindgen::JsValue>) -> f64 {
    value.ok().and_then(|v| v.as_f64()).unwrap_or(0.0)
}

impl ScrollPlatform for WebScrollPlatform {
    type Element = DomElement;
    type Listener = EventListener;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn scroll_position(&self) -> Position {
        match &self.container {
            ScrollContainer::Window => Position::new(
                self.window.page_x_offset().unwrap_or(0.0),
                self.window.page_y_offset().unwrap_or(0.0),
            ),
            ScrollContainer::Element(element) => {
                Position::new(element.scroll_left() as f64, element.scroll_top() as f64)
            }
        }
    }

    fn container_frame(&self) -> Frame {
        match &self.container {
            ScrollContainer::Window => Frame::new(
                js_number(self.window.inner_width()),
                js_number(self.window.inner_height()),
            ),
            ScrollContainer::Element(element) => Frame::new(
                element.offset_width() as f64,
                element.offset_height() as f64,
            ),
        }
    }

    fn request_frame(&self, callback: Box<dyn FnOnce()>) {
        if !self.animation_frames {
            Timeout::new(FALLBACK_FRAME_MS, callback).forget();
            return;
        }

        let closure = Closure::once_into_js(callback);
        if let Err(e) = self.window.request_animation_frame(closure.unchecked_ref()) {
            tracing::warn!("requestAnimationFrame failed: {:?}", e);
        }
    }

    fn listen_scroll(&self, handler: Rc<dyn Fn()>) -> EventListener {
        EventListener::new(self.event_target(), "scroll", move |_| handler())
    }

    fn query_all(&self, selector: &str) -> Vec<DomElement> {
        self.try_query_all(selector).unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            Vec::new()
        })
    }

    fn spawn_local(&self, task: LocalTask) {
        wasm_bindgen_futures::spawn_local(task);
    }
}
