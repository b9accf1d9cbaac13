//! Reading loosely typed JS option objects.
//!
//! Plain data goes through `serde-wasm-bindgen`; function-valued fields are
//! pulled out with `Reflect` and wrapped into Rust callbacks.

use js_sys::{Array, Function, Promise, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

use vantage_browser::{
    CallbackError, CallbackResponse, ClassNames, Direction, DomElement, Error, Offset,
    OffsetBasis, OnScrollOptions, Result, Trigger, TriggerPatch,
};

use crate::types::{JsFrame, JsRect};

type DomOffset = Offset<Trigger<DomElement>>;

/// `obj[key]`, or `None` when missing, `undefined` or `null`.
pub(crate) fn get(obj: &JsValue, key: &str) -> Option<JsValue> {
    if !obj.is_object() && !obj.is_function() {
        return None;
    }
    Reflect::get(obj, &JsValue::from_str(key))
        .ok()
        .filter(|v| !v.is_undefined() && !v.is_null())
}

/// Follow a dotted path such as `toggle.class.in`.
pub(crate) fn get_path(obj: &JsValue, path: &str) -> Option<JsValue> {
    path.split('.')
        .try_fold(obj.clone(), |value, key| get(&value, key))
}

pub(crate) fn get_function(obj: &JsValue, key: &str) -> Option<Function> {
    get(obj, key).and_then(|v| v.dyn_into::<Function>().ok())
}

fn get_function_path(obj: &JsValue, path: &str) -> Option<Function> {
    get_path(obj, path).and_then(|v| v.dyn_into::<Function>().ok())
}

pub(crate) fn get_bool(obj: &JsValue, key: &str) -> Option<bool> {
    get(obj, key).and_then(|v| v.as_bool())
}

pub(crate) fn js_error(e: Error) -> wasm_bindgen::JsError {
    wasm_bindgen::JsError::new(&e.to_string())
}

pub(crate) fn log_call_error(what: &str, result: std::result::Result<JsValue, JsValue>) {
    if let Err(e) = result {
        tracing::warn!("{} callback threw: {:?}", what, e);
    }
}

fn to_js<T: serde::Serialize>(value: &T) -> JsValue {
    serde_wasm_bindgen::to_value(value).unwrap_or(JsValue::UNDEFINED)
}

/// Hand `error` to the page as an uncaught (promise) error.
///
/// Throwing from inside a trigger check would unwind past live borrows of the
/// frame loop.
fn report_error(what: &str, error: JsValue) {
    tracing::error!("{} failed: {:?}", what, error);
    Promise::reject(&error);
}

/// A number (integers are pixels, fractions scale the size) or a function
/// returning a fraction.
///
/// The function is called as `f.call(element, element, basis, direction)`:
/// `basis` is the element rect for element offsets and the `{ w, h }` frame
/// for viewport offsets. A throw or a non-finite result is reported and the
/// trigger counts as not visible.
fn offset(value: JsValue) -> Result<DomOffset> {
    if let Some(n) = value.as_f64() {
        return Ok(Offset::from_number(n));
    }
    let Ok(f) = value.dyn_into::<Function>() else {
        return Err(Error::InvalidOptions(
            "offset must be a number or a function".into(),
        ));
    };
    Ok(Offset::computed(
        move |trigger: &Trigger<DomElement>, basis: OffsetBasis, direction: Direction| {
            let element: &JsValue = trigger.element().as_element();
            let basis = match basis {
                OffsetBasis::Element(rect) => to_js(&JsRect::from(rect)),
                OffsetBasis::Viewport(frame) => to_js(&JsFrame::from(frame)),
            };
            match f.call3(element, element, &basis, &direction.as_str().into()) {
                Ok(value) => match value.as_f64() {
                    Some(n) if n.is_finite() => n,
                    _ => {
                        let message = format!("offset function returned {:?}", value);
                        report_error("offset function", js_sys::Error::new(&message).into());
                        f64::NAN
                    }
                },
                Err(e) => {
                    report_error("offset function", e);
                    f64::NAN
                }
            }
        },
    ))
}

fn class_names(value: JsValue) -> Result<ClassNames> {
    serde_wasm_bindgen::from_value(value)
        .map_err(|e| Error::InvalidOptions(format!("class names: {}", e)))
}

/// A toggle callback; a returned promise defers the class toggle until it
/// settles. A throw skips the toggle like a rejection does.
fn toggle_callback(f: Function) -> impl Fn(&Trigger<DomElement>) -> CallbackResponse + 'static {
    move |trigger: &Trigger<DomElement>| {
        let element: &JsValue = trigger.element().as_element();
        match f.call1(element, element) {
            Ok(value) => match value.dyn_into::<Promise>() {
                Ok(promise) => CallbackResponse::deferred(async move {
                    JsFuture::from(promise)
                        .await
                        .map(|_| ())
                        .map_err(|e| CallbackError(format!("{:?}", e)))
                }),
                Err(_) => CallbackResponse::Done,
            },
            Err(e) => CallbackResponse::Failed(CallbackError(format!("{:?}", e))),
        }
    }
}

/// `TriggerOptionsJs` → `TriggerPatch`. Unset fields keep the defaults.
pub(crate) fn trigger_patch(options: &JsValue) -> Result<TriggerPatch<DomElement>> {
    let mut patch = TriggerPatch::new();
    if options.is_undefined() || options.is_null() {
        return Ok(patch);
    }

    patch.once = get_bool(options, "once");

    let offsets = [
        ("offset.viewport.x", &mut patch.viewport_x),
        ("offset.viewport.y", &mut patch.viewport_y),
        ("offset.element.x", &mut patch.element_x),
        ("offset.element.y", &mut patch.element_y),
    ];
    for (path, slot) in offsets {
        if let Some(value) = get_path(options, path) {
            *slot = Some(offset(value)?);
        }
    }

    if let Some(value) = get_path(options, "toggle.class.in") {
        patch.class_in = Some(class_names(value)?);
    }
    if let Some(value) = get_path(options, "toggle.class.out") {
        patch.class_out = Some(class_names(value)?);
    }

    if let Some(f) = get_function_path(options, "toggle.callback.in") {
        patch = patch.on_in(toggle_callback(f));
    }
    if let Some(f) = get_function_path(options, "toggle.callback.out") {
        patch = patch.on_out(toggle_callback(f));
    }
    if let Some(f) = get_function_path(options, "toggle.callback.visible") {
        patch = patch.on_visible(move |trigger: &Trigger<DomElement>| {
            let element: &JsValue = trigger.element().as_element();
            log_call_error("visible", f.call1(element, element));
        });
    }

    Ok(patch)
}

fn element_callback(name: &'static str, f: Function) -> impl Fn(&DomElement) + 'static {
    move |element: &DomElement| {
        let element: &JsValue = element.as_element();
        log_call_error(name, f.call1(element, element));
    }
}

/// A bare function (the `onin` shorthand) or an `OnScrollOptionsJs` object.
pub(crate) fn on_scroll_options(options: &JsValue) -> Result<OnScrollOptions<DomElement>> {
    if let Some(f) = options.dyn_ref::<Function>() {
        let onin = element_callback("onin", f.clone());
        return Ok(OnScrollOptions::new().onin(onin));
    }

    let mut parsed = OnScrollOptions::new().trigger(trigger_patch(options)?);
    if let Some(f) = get_function(options, "onin") {
        parsed = parsed.onin(element_callback("onin", f));
    }
    if let Some(f) = get_function(options, "onout") {
        parsed = parsed.onout(element_callback("onout", f));
    }
    if let Some(f) = get_function(options, "onchange") {
        parsed = parsed.onchange(element_callback("onchange", f));
    }
    if let Some(once) = get_bool(options, "once") {
        parsed = parsed.once(once);
    }
    Ok(parsed)
}

/// An element, an array of elements or a `NodeList`.
pub(crate) fn elements(value: &JsValue) -> Option<Vec<DomElement>> {
    if value.is_undefined() || value.is_null() {
        return None;
    }
    if let Some(element) = value.dyn_ref::<web_sys::Element>() {
        return Some(vec![DomElement::new(element.clone())]);
    }
    if let Some(list) = value.dyn_ref::<web_sys::NodeList>() {
        return Some(vantage_browser::element::node_list_elements(list));
    }
    if Array::is_array(value) {
        let array: &Array = value.unchecked_ref();
        return Some(
            array
                .iter()
                .filter_map(|v| v.dyn_into::<web_sys::Element>().ok())
                .map(DomElement::new)
                .collect(),
        );
    }
    None
}
