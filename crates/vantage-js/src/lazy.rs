//! JsLazyLoad and the image preloading exports.

use std::rc::Rc;

use js_sys::{Array, Function, Object, Reflect};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::Element;

use vantage_browser::{
    DomElement, Error, IntersectionEntry, LazyCallbacks, LazyOptions, LazySettings,
    PreloadOptions, PreloadedImage, WebLazyLoader, WebLazyPlatform,
};

use crate::options::{elements, get, get_function, js_error, log_call_error};
use crate::types::JsIntersection;

fn entry_callback(
    name: &'static str,
    f: Function,
) -> impl Fn(&DomElement, &IntersectionEntry<DomElement>) + 'static {
    move |element: &DomElement, entry: &IntersectionEntry<DomElement>| {
        let entry = serde_wasm_bindgen::to_value(&JsIntersection::from(entry))
            .unwrap_or(JsValue::UNDEFINED);
        log_call_error(name, f.call2(&JsValue::NULL, element.as_element(), &entry));
    }
}

fn element_callback(name: &'static str, f: Function) -> impl Fn(&DomElement) + 'static {
    move |element: &DomElement| {
        log_call_error(name, f.call1(&JsValue::NULL, element.as_element()));
    }
}

fn lazy_callbacks(options: &JsValue) -> LazyCallbacks<DomElement> {
    let mut callbacks = LazyCallbacks::default();
    if let Some(f) = get_function(options, "onenter") {
        callbacks = callbacks.onenter(entry_callback("onenter", f));
    }
    if let Some(f) = get_function(options, "onexit") {
        callbacks = callbacks.onexit(entry_callback("onexit", f));
    }
    if let Some(f) = get_function(options, "onreveal") {
        callbacks = callbacks.onreveal(element_callback("onreveal", f));
    }
    if let Some(f) = get_function(options, "onloaded") {
        callbacks = callbacks.onloaded(element_callback("onloaded", f));
    }
    if let Some(f) = get_function(options, "onerror") {
        callbacks = callbacks.onerror(element_callback("onerror", f));
    }
    if let Some(f) = get_function(options, "onfinish") {
        callbacks =
            callbacks.onfinish(move || log_call_error("onfinish", f.call0(&JsValue::NULL)));
    }
    callbacks
}

fn lazy_options(options: &JsValue) -> Result<LazyOptions<DomElement>, Error> {
    let settings: LazySettings = if options.is_object() {
        serde_wasm_bindgen::from_value(options.clone())
            .map_err(|e| Error::InvalidOptions(e.to_string()))?
    } else {
        LazySettings::default()
    };
    let container = match get(options, "container") {
        None => None,
        Some(value) => match value.dyn_into::<Element>() {
            Ok(element) => Some(DomElement::new(element)),
            // `document` is the default scope.
            Err(value) if value.is_instance_of::<web_sys::Document>() => None,
            Err(_) => {
                return Err(Error::InvalidOptions(
                    "container must be an Element".into(),
                ));
            }
        },
    };

    Ok(LazyOptions {
        settings,
        container,
        callbacks: lazy_callbacks(options),
    })
}

fn preload_options(options: &JsValue) -> Result<PreloadOptions, Error> {
    if !options.is_object() {
        return Ok(PreloadOptions::default());
    }
    serde_wasm_bindgen::from_value(options.clone())
        .map_err(|e| Error::InvalidOptions(e.to_string()))
}

fn preloaded_image(image: &PreloadedImage<DomElement>) -> Object {
    let obj = Object::new();
    let size = |n: Option<u32>| n.map_or(JsValue::UNDEFINED, JsValue::from);
    let fields = [
        ("element", JsValue::from(image.element.as_element().clone())),
        ("src", JsValue::from_str(&image.src)),
        ("width", size(image.width)),
        ("height", size(image.height)),
    ];
    for (key, value) in fields {
        if let Err(e) = Reflect::set(&obj, &JsValue::from_str(key), &value) {
            tracing::warn!("Failed to set {}: {:?}", key, e);
        }
    }
    obj
}

/// Lazy loader for images, iframes, videos and backgrounds.
#[wasm_bindgen(js_name = LazyLoad)]
pub struct JsLazyLoad {
    loader: Rc<WebLazyLoader>,
}

#[wasm_bindgen(js_class = LazyLoad)]
impl JsLazyLoad {
    /// `options` follows `LazyLoadOptions`; `elements` is an optional
    /// element list overriding `options.selector`.
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue, elements_arg: JsValue) -> Result<JsLazyLoad, JsError> {
        let platform = WebLazyPlatform::new().map_err(js_error)?;
        let options = lazy_options(&options).map_err(js_error)?;
        let loader = WebLazyLoader::new(Rc::new(platform), options, elements(&elements_arg));
        Ok(Self { loader })
    }

    /// Pick up new elements (or re-query the selector).
    pub fn update(&self, elements_arg: JsValue) {
        self.loader.update(elements(&elements_arg));
    }

    /// Reveal `element` now. Already processed elements need `force`.
    pub fn load(&self, element: Element, force: Option<bool>) {
        self.loader
            .load(&DomElement::new(element), force.unwrap_or(false));
    }

    #[wasm_bindgen(js_name = loadAll)]
    pub fn load_all(&self) {
        self.loader.load_all();
    }

    pub fn destroy(&self) {
        self.loader.destroy();
    }

    #[wasm_bindgen(getter, js_name = loadingCount)]
    pub fn loading_count(&self) -> usize {
        self.loader.loading_count()
    }

    #[wasm_bindgen(getter, js_name = toLoadCount)]
    pub fn to_load_count(&self) -> usize {
        self.loader.pending().len()
    }
}

/// Fetch the lazy images under `root` ahead of time. `done` receives an array
/// of `PreloadedImageJs`.
#[wasm_bindgen(js_name = preloadImages)]
pub fn preload_images(root: Element, done: Function, options: JsValue) -> Result<(), JsError> {
    let options = preload_options(&options).map_err(js_error)?;
    vantage_browser::preload_images(&root, &options, move |images| {
        let array: Array = images.iter().map(preloaded_image).collect();
        log_call_error("preloadImages", done.call1(&JsValue::NULL, &array));
    });
    Ok(())
}

/// Reveal every lazy image under `root` immediately, then call `done`.
#[wasm_bindgen(js_name = loadAllImages)]
pub fn load_all_images(root: Element, done: Function, options: JsValue) -> Result<(), JsError> {
    let options = preload_options(&options).map_err(js_error)?;
    vantage_browser::load_all_images(&root, &options, move || {
        log_call_error("loadAllImages", done.call0(&JsValue::NULL));
    });
    Ok(())
}
