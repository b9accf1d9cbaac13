//! Triggers: an element bound to visibility callbacks and class toggling.
//!
//! # State machine
//!
//! A trigger starts unevaluated (`visible() == None`). Each
//! `check_visibility` call evaluates the element against the frame:
//!
//! - on a flip, the stored state changes, the `in` or `out` callback runs and
//!   the toggle classes are applied (after the callback settles, if it
//!   returned a deferred response)
//! - with no flip while visible, the `visible` callback runs
//!
//! A `once` trigger goes inactive on its first transition *to* visible and
//! from then on returns the frozen state without side effects. A transition
//! to hidden never freezes it.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::element::{ClassList, TriggerElement};
use crate::error::CallbackError;
use crate::geometry::{Direction, Frame, Offset, OffsetConfig, Rect, is_visible};
use crate::platform::LocalTask;

/// Future returned by an asynchronous `in`/`out` callback.
pub type CallbackFuture = Pin<Box<dyn Future<Output = Result<(), CallbackError>>>>;

/// `in`/`out` callback.
pub type TriggerCallback<E> = Rc<dyn Fn(&Trigger<E>) -> CallbackResponse>;

/// `visible` callback, run on every check while the trigger stays visible.
pub type VisibleCallback<E> = Rc<dyn Fn(&Trigger<E>)>;

/// What an `in`/`out` callback hands back.
pub enum CallbackResponse {
    /// Toggle classes right away.
    Done,
    /// Toggle classes once the future resolves; skip them if it fails.
    Deferred(CallbackFuture),
    /// The callback failed before handing anything back. Classes are skipped.
    Failed(CallbackError),
}

impl CallbackResponse {
    pub fn deferred(fut: impl Future<Output = Result<(), CallbackError>> + 'static) -> Self {
        CallbackResponse::Deferred(Box::pin(fut))
    }
}

impl From<()> for CallbackResponse {
    fn from(_: ()) -> Self {
        CallbackResponse::Done
    }
}

impl fmt::Debug for CallbackResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackResponse::Done => f.write_str("Done"),
            CallbackResponse::Deferred(_) => f.write_str("Deferred(..)"),
            CallbackResponse::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClassNamesRepr {
    One(SmolStr),
    Many(Vec<SmolStr>),
}

impl From<ClassNamesRepr> for ClassNames {
    fn from(repr: ClassNamesRepr) -> Self {
        match repr {
            ClassNamesRepr::One(name) => ClassNames(vec![name]),
            ClassNamesRepr::Many(names) => ClassNames(names),
        }
    }
}

/// One class name or an ordered list of them.
///
/// Deserializes from either a string or an array of strings.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "ClassNamesRepr")]
pub struct ClassNames(Vec<SmolStr>);

impl ClassNames {
    pub fn none() -> Self {
        Self(Vec::new())
    }

    pub fn one(name: impl Into<SmolStr>) -> Self {
        Self(vec![name.into()])
    }

    pub fn many<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    /// Non-empty names, in order. The DOM rejects empty class tokens.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(SmolStr::as_str).filter(|name| !name.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    fn add_to<E: ClassList>(&self, element: &E) {
        for name in self.iter() {
            element.add_class(name);
        }
    }

    fn remove_from<E: ClassList>(&self, element: &E) {
        for name in self.iter() {
            element.remove_class(name);
        }
    }
}

impl From<&str> for ClassNames {
    fn from(name: &str) -> Self {
        ClassNames::one(name)
    }
}

impl From<Vec<&str>> for ClassNames {
    fn from(names: Vec<&str>) -> Self {
        ClassNames::many(names)
    }
}

/// Classes applied on the in and out states.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToggleClasses {
    #[serde(rename = "in")]
    pub enter: ClassNames,
    #[serde(rename = "out")]
    pub leave: ClassNames,
}

impl Default for ToggleClasses {
    fn default() -> Self {
        Self {
            enter: ClassNames::one("visible"),
            leave: ClassNames::one("invisible"),
        }
    }
}

impl ToggleClasses {
    /// Visible: add `in`, remove `out`. Hidden: remove `in`, add `out`.
    pub fn apply<E: ClassList>(&self, element: &E, visible: bool) {
        if visible {
            self.enter.add_to(element);
            self.leave.remove_from(element);
        } else {
            self.enter.remove_from(element);
            self.leave.add_to(element);
        }
    }
}

/// Callbacks fired by state changes.
pub struct ToggleCallbacks<E> {
    pub enter: Option<TriggerCallback<E>>,
    pub leave: Option<TriggerCallback<E>>,
    pub visible: Option<VisibleCallback<E>>,
}

impl<E> Default for ToggleCallbacks<E> {
    fn default() -> Self {
        Self {
            enter: None,
            leave: None,
            visible: None,
        }
    }
}

impl<E> Clone for ToggleCallbacks<E> {
    fn clone(&self) -> Self {
        Self {
            enter: self.enter.clone(),
            leave: self.leave.clone(),
            visible: self.visible.clone(),
        }
    }
}

impl<E> fmt::Debug for ToggleCallbacks<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToggleCallbacks")
            .field("enter", &self.enter.is_some())
            .field("leave", &self.leave.is_some())
            .field("visible", &self.visible.is_some())
            .finish()
    }
}

pub struct Toggle<E> {
    pub classes: ToggleClasses,
    pub callbacks: ToggleCallbacks<E>,
}

impl<E> Default for Toggle<E> {
    fn default() -> Self {
        Self {
            classes: ToggleClasses::default(),
            callbacks: ToggleCallbacks::default(),
        }
    }
}

impl<E> Clone for Toggle<E> {
    fn clone(&self) -> Self {
        Self {
            classes: self.classes.clone(),
            callbacks: self.callbacks.clone(),
        }
    }
}

impl<E> fmt::Debug for Toggle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toggle")
            .field("classes", &self.classes)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}

/// Full configuration of a trigger.
pub struct TriggerOptions<E> {
    pub once: bool,
    pub offset: OffsetConfig<Trigger<E>>,
    pub toggle: Toggle<E>,
}

impl<E> Default for TriggerOptions<E> {
    fn default() -> Self {
        Self {
            once: false,
            offset: OffsetConfig::default(),
            toggle: Toggle::default(),
        }
    }
}

impl<E> Clone for TriggerOptions<E> {
    fn clone(&self) -> Self {
        Self {
            once: self.once,
            offset: self.offset.clone(),
            toggle: self.toggle.clone(),
        }
    }
}

impl<E> fmt::Debug for TriggerOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerOptions")
            .field("once", &self.once)
            .field("offset", &self.offset)
            .field("toggle", &self.toggle)
            .finish()
    }
}

/// Partial trigger options, merged field by field over a base.
pub struct TriggerPatch<E> {
    pub once: Option<bool>,
    pub viewport_x: Option<Offset<Trigger<E>>>,
    pub viewport_y: Option<Offset<Trigger<E>>>,
    pub element_x: Option<Offset<Trigger<E>>>,
    pub element_y: Option<Offset<Trigger<E>>>,
    pub class_in: Option<ClassNames>,
    pub class_out: Option<ClassNames>,
    pub on_in: Option<TriggerCallback<E>>,
    pub on_out: Option<TriggerCallback<E>>,
    pub on_visible: Option<VisibleCallback<E>>,
}

impl<E> Default for TriggerPatch<E> {
    fn default() -> Self {
        Self {
            once: None,
            viewport_x: None,
            viewport_y: None,
            element_x: None,
            element_y: None,
            class_in: None,
            class_out: None,
            on_in: None,
            on_out: None,
            on_visible: None,
        }
    }
}

impl<E> TriggerPatch<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn once(mut self, once: bool) -> Self {
        self.once = Some(once);
        self
    }

    pub fn viewport(mut self, x: Offset<Trigger<E>>, y: Offset<Trigger<E>>) -> Self {
        self.viewport_x = Some(x);
        self.viewport_y = Some(y);
        self
    }

    pub fn element(mut self, x: Offset<Trigger<E>>, y: Offset<Trigger<E>>) -> Self {
        self.element_x = Some(x);
        self.element_y = Some(y);
        self
    }

    pub fn class_in(mut self, classes: impl Into<ClassNames>) -> Self {
        self.class_in = Some(classes.into());
        self
    }

    pub fn class_out(mut self, classes: impl Into<ClassNames>) -> Self {
        self.class_out = Some(classes.into());
        self
    }

    pub fn on_in<R: Into<CallbackResponse>>(
        mut self,
        f: impl Fn(&Trigger<E>) -> R + 'static,
    ) -> Self {
        self.on_in = Some(Rc::new(move |t: &Trigger<E>| f(t).into()));
        self
    }

    pub fn on_out<R: Into<CallbackResponse>>(
        mut self,
        f: impl Fn(&Trigger<E>) -> R + 'static,
    ) -> Self {
        self.on_out = Some(Rc::new(move |t: &Trigger<E>| f(t).into()));
        self
    }

    pub fn on_visible(mut self, f: impl Fn(&Trigger<E>) + 'static) -> Self {
        self.on_visible = Some(Rc::new(f));
        self
    }

    /// Overlay the set fields onto `base`.
    pub fn apply(self, base: &TriggerOptions<E>) -> TriggerOptions<E> {
        let mut options = base.clone();
        if let Some(once) = self.once {
            options.once = once;
        }
        if let Some(x) = self.viewport_x {
            options.offset.viewport.x = x;
        }
        if let Some(y) = self.viewport_y {
            options.offset.viewport.y = y;
        }
        if let Some(x) = self.element_x {
            options.offset.element.x = x;
        }
        if let Some(y) = self.element_y {
            options.offset.element.y = y;
        }
        if let Some(classes) = self.class_in {
            options.toggle.classes.enter = classes;
        }
        if let Some(classes) = self.class_out {
            options.toggle.classes.leave = classes;
        }
        if let Some(f) = self.on_in {
            options.toggle.callbacks.enter = Some(f);
        }
        if let Some(f) = self.on_out {
            options.toggle.callbacks.leave = Some(f);
        }
        if let Some(f) = self.on_visible {
            options.toggle.callbacks.visible = Some(f);
        }
        options
    }
}

/// Outcome of one `check_visibility` call.
pub struct VisibilityCheck {
    pub visible: bool,
    /// State flipped on this check.
    pub changed: bool,
    /// Class toggle waiting on an asynchronous callback. Must be spawned on a
    /// local executor.
    pub deferred: Option<LocalTask>,
}

impl fmt::Debug for VisibilityCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisibilityCheck")
            .field("visible", &self.visible)
            .field("changed", &self.changed)
            .field("deferred", &self.deferred.is_some())
            .finish()
    }
}

/// An element watched for visibility.
pub struct Trigger<E> {
    element: E,
    offset: OffsetConfig<Trigger<E>>,
    toggle: Toggle<E>,
    once: bool,
    visible: Option<bool>,
    active: bool,
}

impl<E: TriggerElement> Trigger<E> {
    pub fn new(element: E, options: TriggerOptions<E>) -> Self {
        Self {
            element,
            offset: options.offset,
            toggle: options.toggle,
            once: options.once,
            visible: None,
            active: true,
        }
    }

    pub fn element(&self) -> &E {
        &self.element
    }

    /// Last evaluated state, `None` before the first check.
    pub fn visible(&self) -> Option<bool> {
        self.visible
    }

    /// False once a `once` trigger has fired.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_once(&self) -> bool {
        self.once
    }

    pub fn classes(&self) -> &ToggleClasses {
        &self.toggle.classes
    }

    /// Current bounds of the element.
    pub fn bounds(&self) -> Rect {
        self.element.bounds()
    }

    /// Evaluate against `frame`, fire callbacks and toggle classes.
    pub fn check_visibility(&mut self, frame: Frame, direction: Direction) -> VisibilityCheck {
        if !self.active {
            return VisibilityCheck {
                visible: self.visible.unwrap_or(false),
                changed: false,
                deferred: None,
            };
        }

        let rect = self.element.bounds();
        let visible = self.evaluate(rect, frame, direction);

        if self.visible != Some(visible) {
            self.visible = Some(visible);

            let deferred = match self.toggle_callback() {
                CallbackResponse::Done => {
                    self.toggle.classes.apply(&self.element, visible);
                    None
                }
                CallbackResponse::Deferred(fut) => Some(self.deferred_toggle(fut, visible)),
                CallbackResponse::Failed(e) => {
                    tracing::error!("Trigger callback failed: {}", e);
                    None
                }
            };

            if visible && self.once {
                tracing::trace!("once trigger fired, freezing");
                self.active = false;
            }

            return VisibilityCheck {
                visible,
                changed: true,
                deferred,
            };
        }

        if visible {
            if let Some(callback) = self.toggle.callbacks.visible.clone() {
                callback(self);
            }
        }

        VisibilityCheck {
            visible,
            changed: false,
            deferred: None,
        }
    }

    fn evaluate(&self, rect: Rect, frame: Frame, direction: Direction) -> bool {
        let (element, viewport) = self.offset.resolve(self, rect, frame, direction);
        if !element.is_finite() || !viewport.is_finite() {
            tracing::debug!(?element, ?viewport, "non-finite offset, not visible");
        }
        is_visible(rect, frame, element, viewport)
    }

    fn toggle_callback(&self) -> CallbackResponse {
        let callback = if self.visible == Some(true) {
            self.toggle.callbacks.enter.clone()
        } else {
            self.toggle.callbacks.leave.clone()
        };
        match callback {
            Some(callback) => callback(self),
            None => CallbackResponse::Done,
        }
    }

    // The classes applied are those of the transition that spawned the task.
    fn deferred_toggle(&self, fut: CallbackFuture, visible: bool) -> LocalTask {
        let element = self.element.clone();
        let classes = self.toggle.classes.clone();
        Box::pin(async move {
            match fut.await {
                Ok(()) => classes.apply(&element, visible),
                Err(e) => tracing::error!("Trigger promise failed: {}", e),
            }
        })
    }
}

impl<E> fmt::Debug for Trigger<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("once", &self.once)
            .field("visible", &self.visible)
            .field("active", &self.active)
            .field("toggle", &self.toggle)
            .finish_non_exhaustive()
    }
}
