//! JsScrollContext - scroll reveals for JavaScript.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::HtmlElement;

use vantage_browser::{
    DomElement, Error, OnScrollTarget, RemoveTarget, ScrollContainer, ScrollOptions,
    ScrollTriggerOptions, Target, TriggerId, WebScrollContext, WebScrollPlatform,
    WebScrollTrigger,
};
use web_time::Duration;

use crate::options::{
    elements, get, get_function, js_error, log_call_error, on_scroll_options, trigger_patch,
};
use crate::types::{JsPosition, ScrollSettings};

fn disposed() -> JsError {
    JsError::new("scroll context was disposed")
}

fn scroll_options(options: &JsValue) -> Result<ScrollOptions, Error> {
    let settings: ScrollSettings = if options.is_object() {
        serde_wasm_bindgen::from_value(options.clone())
            .map_err(|e| Error::InvalidOptions(e.to_string()))?
    } else {
        ScrollSettings::default()
    };

    let mut scroll = ScrollOptions::default();
    if let Some(ms) = settings.sustain {
        scroll = scroll.sustain(Duration::from_millis(ms));
    }
    if let Some(f) = get_function(options, "callback") {
        scroll = scroll.on_tick(move |position, direction| {
            let position = serde_wasm_bindgen::to_value(&JsPosition::from(position))
                .unwrap_or(JsValue::UNDEFINED);
            log_call_error(
                "scroll",
                f.call2(&JsValue::NULL, &position, &direction.as_str().into()),
            );
        });
    }
    if let Some(f) = get_function(options, "start") {
        scroll = scroll.on_start(move || log_call_error("start", f.call0(&JsValue::NULL)));
    }
    if let Some(f) = get_function(options, "stop") {
        scroll = scroll.on_stop(move || log_call_error("stop", f.call0(&JsValue::NULL)));
    }
    if let Some(f) = get_function(options, "directionChange") {
        scroll = scroll.on_direction_change(move |direction| {
            log_call_error(
                "directionChange",
                f.call1(&JsValue::NULL, &direction.as_str().into()),
            );
        });
    }
    Ok(scroll)
}

fn container(options: &JsValue) -> Result<ScrollContainer, Error> {
    match get(options, "container") {
        None => Ok(ScrollContainer::Window),
        Some(value) => value
            .dyn_into::<HtmlElement>()
            .map(ScrollContainer::Element)
            .map_err(|_| Error::InvalidOptions("container must be an HTMLElement".into())),
    }
}

fn on_scroll_target(target: &JsValue) -> Result<OnScrollTarget<DomElement>, Error> {
    if let Some(selector) = target.as_string() {
        return Ok(OnScrollTarget::Selector(selector));
    }
    match target.dyn_ref::<web_sys::Element>() {
        Some(element) => Ok(OnScrollTarget::Element(DomElement::new(element.clone()))),
        None => Err(Error::InvalidOptions(
            "target must be a selector or an Element".into(),
        )),
    }
}

fn add_target(target: &JsValue) -> Result<Target<DomElement>, Error> {
    if let Some(selector) = target.as_string() {
        return Ok(Target::Selector(selector));
    }
    elements(target)
        .map(Target::Elements)
        .ok_or_else(|| Error::InvalidOptions("target must be a selector or elements".into()))
}

fn remove_target(target: &JsValue) -> Result<RemoveTarget<DomElement>, Error> {
    if let Some(selector) = target.as_string() {
        return Ok(RemoveTarget::Selector(selector));
    }
    elements(target)
        .map(RemoveTarget::Elements)
        .ok_or_else(|| Error::InvalidOptions("target must be a selector or elements".into()))
}

thread_local! {
    // Contexts stay here until `dispose`; collecting a JS wrapper leaves
    // its triggers running.
    static CONTEXTS: RefCell<HashMap<u32, Rc<WebScrollContext>>> = RefCell::default();
    static NEXT_CONTEXT: Cell<u32> = const { Cell::new(0) };
}

/// Triggers registered by one `add` or `onScroll` call.
///
/// The triggers stay registered until `dispose` is called or the context is
/// disposed. Freeing the handle does not remove them.
#[wasm_bindgen(js_name = ScrollHandle)]
pub struct JsScrollHandle {
    owner: Weak<WebScrollTrigger>,
    ids: Vec<TriggerId>,
}

impl JsScrollHandle {
    fn new(owner: &Rc<WebScrollTrigger>, ids: Vec<TriggerId>) -> Self {
        Self {
            owner: Rc::downgrade(owner),
            ids,
        }
    }
}

#[wasm_bindgen(js_class = ScrollHandle)]
impl JsScrollHandle {
    /// Number of this handle's triggers still registered.
    #[wasm_bindgen(getter)]
    pub fn size(&self) -> usize {
        let Some(owner) = self.owner.upgrade() else {
            return 0;
        };
        let live = owner.ids();
        self.ids.iter().filter(|id| live.contains(id)).count()
    }

    /// Remove the triggers now. Returns how many were removed.
    pub fn dispose(&mut self) -> usize {
        let ids = std::mem::take(&mut self.ids);
        match self.owner.upgrade() {
            Some(owner) if !ids.is_empty() => owner.remove(ids),
            _ => 0,
        }
    }

    /// Forget the triggers. They stay registered and `dispose` becomes a
    /// no-op.
    pub fn detach(&mut self) {
        self.ids.clear();
    }
}

/// The page's scroll context.
///
/// Lives until `dispose`, whether or not the JS object is still reachable.
#[wasm_bindgen(js_name = ScrollContext)]
pub struct JsScrollContext {
    id: u32,
}

impl JsScrollContext {
    fn register(context: WebScrollContext) -> Self {
        let id = NEXT_CONTEXT.with(|next| {
            let id = next.get();
            next.set(id.wrapping_add(1));
            id
        });
        CONTEXTS.with(|contexts| contexts.borrow_mut().insert(id, Rc::new(context)));
        Self { id }
    }

    fn lookup(&self) -> Option<Rc<WebScrollContext>> {
        CONTEXTS.with(|contexts| contexts.borrow().get(&self.id).cloned())
    }

    fn context(&self) -> Result<Rc<WebScrollContext>, JsError> {
        self.lookup().ok_or_else(disposed)
    }
}

#[wasm_bindgen(js_class = ScrollContext)]
impl JsScrollContext {
    /// Start watching the window (or `options.container`). Elements marked
    /// with `data-scroll` are picked up straight away.
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<JsScrollContext, JsError> {
        let container = container(&options).map_err(js_error)?;
        let platform = WebScrollPlatform::with_container(container).map_err(js_error)?;
        let trigger = match get(&options, "trigger") {
            Some(defaults) => trigger_patch(&defaults).map_err(js_error)?,
            None => Default::default(),
        };
        let options = ScrollTriggerOptions {
            trigger: trigger.apply(&Default::default()),
            scroll: scroll_options(&options).map_err(js_error)?,
        };

        let context = WebScrollContext::with_options(Rc::new(platform), options);
        Ok(Self::register(context))
    }

    /// Reveal `target` once it scrolls into view. `options` is a function
    /// (called on entry) or an `OnScrollOptionsJs` object.
    #[wasm_bindgen(js_name = onScroll)]
    pub fn on_scroll(
        &self,
        target: JsValue,
        options: JsValue,
    ) -> Result<JsScrollHandle, JsError> {
        let context = self.context()?;
        let target = on_scroll_target(&target).map_err(js_error)?;
        let options = on_scroll_options(&options).map_err(js_error)?;
        let ids = context.on_scroll(target, options).detach();
        Ok(JsScrollHandle::new(context.trigger(), ids))
    }

    /// Register triggers with `TriggerOptionsJs` over the context defaults.
    pub fn add(&self, target: JsValue, options: JsValue) -> Result<JsScrollHandle, JsError> {
        let context = self.context()?;
        let target = add_target(&target).map_err(js_error)?;
        let patch = trigger_patch(&options).map_err(js_error)?;
        let ids = context.trigger().add(target, patch).detach();
        Ok(JsScrollHandle::new(context.trigger(), ids))
    }

    /// Remove triggers by selector (sibling scoped) or element(s). Returns
    /// how many were removed.
    pub fn remove(&self, target: JsValue) -> Result<usize, JsError> {
        let context = self.context()?;
        let target = remove_target(&target).map_err(js_error)?;
        Ok(context.trigger().remove(target))
    }

    pub fn listen(&self) -> Result<(), JsError> {
        self.context()?.trigger().listen();
        Ok(())
    }

    pub fn kill(&self) -> Result<(), JsError> {
        self.context()?.trigger().kill();
        Ok(())
    }

    #[wasm_bindgen(getter, js_name = isListening)]
    pub fn is_listening(&self) -> bool {
        self.lookup().is_some_and(|c| c.trigger().is_listening())
    }

    #[wasm_bindgen(getter)]
    pub fn direction(&self) -> String {
        self.lookup()
            .map(|c| c.trigger().direction().to_string())
            .unwrap_or_else(|| "none".to_string())
    }

    #[wasm_bindgen(getter)]
    pub fn position(&self) -> Result<JsPosition, JsError> {
        Ok(self.context()?.trigger().position().into())
    }

    /// Number of registered triggers.
    #[wasm_bindgen(getter)]
    pub fn size(&self) -> usize {
        self.lookup().map_or(0, |c| c.trigger().len())
    }

    /// Stop the loop and drop every trigger.
    pub fn dispose(&self) {
        let context = CONTEXTS.with(|contexts| contexts.borrow_mut().remove(&self.id));
        if let Some(context) = context {
            tracing::debug!(id = self.id, "disposing scroll context");
            drop(context);
        }
    }
}
