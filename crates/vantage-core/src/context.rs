//! Shared scroll facade for page features.
//!
//! A page creates one `ScrollContext` at startup and passes it by reference to
//! every feature that wants scroll reveals. `on_scroll` is the convenience
//! entry point: element-level `onin`/`onout` callbacks and `once` on by
//! default.

use std::fmt;
use std::rc::Rc;

use crate::collection::TriggerId;
use crate::element::TriggerElement;
use crate::platform::ScrollPlatform;
use crate::scroll_trigger::{ScrollTrigger, ScrollTriggerOptions, Target, TriggerLease};
use crate::trigger::{Trigger, TriggerPatch};

/// Callback receiving the bare element.
pub type ElementCallback<E> = Rc<dyn Fn(&E)>;

/// Where `on_scroll` attaches.
#[derive(Clone, Debug, PartialEq)]
pub enum OnScrollTarget<E> {
    /// Document-wide `querySelectorAll`.
    Selector(String),
    Element(E),
}

impl<E> From<&str> for OnScrollTarget<E> {
    fn from(selector: &str) -> Self {
        OnScrollTarget::Selector(selector.to_string())
    }
}

impl<E> From<String> for OnScrollTarget<E> {
    fn from(selector: String) -> Self {
        OnScrollTarget::Selector(selector)
    }
}

impl<E> From<OnScrollTarget<E>> for Target<E> {
    fn from(target: OnScrollTarget<E>) -> Self {
        match target {
            OnScrollTarget::Selector(selector) => Target::Selector(selector),
            OnScrollTarget::Element(element) => Target::Element(element),
        }
    }
}

/// Options of `on_scroll`. A bare closure converts into `onin`.
pub struct OnScrollOptions<E> {
    pub onin: Option<ElementCallback<E>>,
    pub onout: Option<ElementCallback<E>>,
    /// Replaces both `onin` and `onout`.
    pub onchange: Option<ElementCallback<E>>,
    pub once: bool,
    /// Offsets, classes and any other trigger overrides.
    pub trigger: TriggerPatch<E>,
}

impl<E> Default for OnScrollOptions<E> {
    fn default() -> Self {
        Self {
            onin: None,
            onout: None,
            onchange: None,
            once: true,
            trigger: TriggerPatch::default(),
        }
    }
}

impl<E, F> From<F> for OnScrollOptions<E>
where
    F: Fn(&E) + 'static,
{
    fn from(onin: F) -> Self {
        Self {
            onin: Some(Rc::new(onin)),
            ..Self::default()
        }
    }
}

impl<E: TriggerElement> OnScrollOptions<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn onin(mut self, f: impl Fn(&E) + 'static) -> Self {
        self.onin = Some(Rc::new(f));
        self
    }

    pub fn onout(mut self, f: impl Fn(&E) + 'static) -> Self {
        self.onout = Some(Rc::new(f));
        self
    }

    pub fn onchange(mut self, f: impl Fn(&E) + 'static) -> Self {
        self.onchange = Some(Rc::new(f));
        self
    }

    pub fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    pub fn trigger(mut self, patch: TriggerPatch<E>) -> Self {
        self.trigger = patch;
        self
    }

    /// Fold the element callbacks into a trigger patch.
    pub fn normalise(self) -> TriggerPatch<E> {
        let (onin, onout) = match self.onchange {
            Some(onchange) => (Some(onchange.clone()), Some(onchange)),
            None => (self.onin, self.onout),
        };

        let mut patch = self.trigger.once(self.once);
        if let Some(onin) = onin {
            patch = patch.on_in(move |trigger: &Trigger<E>| onin(trigger.element()));
        }
        if let Some(onout) = onout {
            patch = patch.on_out(move |trigger: &Trigger<E>| onout(trigger.element()));
        }
        patch
    }
}

impl<E> fmt::Debug for OnScrollOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnScrollOptions")
            .field("onin", &self.onin.is_some())
            .field("onout", &self.onout.is_some())
            .field("onchange", &self.onchange.is_some())
            .field("once", &self.once)
            .finish_non_exhaustive()
    }
}

/// Handle returned by `on_scroll`. Dropping it removes the triggers.
#[must_use = "dropping the handle removes its triggers"]
pub struct OnScroll<P: ScrollPlatform> {
    pub trigger: Rc<ScrollTrigger<P>>,
    pub target: OnScrollTarget<P::Element>,
    pub lease: TriggerLease<P>,
}

impl<P: ScrollPlatform> OnScroll<P> {
    pub fn ids(&self) -> &[TriggerId] {
        self.lease.ids()
    }

    /// Keep the triggers registered for the lifetime of the context.
    pub fn detach(self) -> Vec<TriggerId> {
        self.lease.detach()
    }
}

impl<P: ScrollPlatform> fmt::Debug for OnScroll<P>
where
    P::Element: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnScroll")
            .field("target", &self.target)
            .field("lease", &self.lease)
            .finish_non_exhaustive()
    }
}

/// Owner of the page's single `ScrollTrigger`.
///
/// Dropping or disposing the context kills the loop and clears every trigger.
pub struct ScrollContext<P: ScrollPlatform> {
    trigger: Rc<ScrollTrigger<P>>,
}

impl<P: ScrollPlatform> ScrollContext<P> {
    pub fn init(platform: Rc<P>) -> Self {
        Self::with_options(platform, ScrollTriggerOptions::default())
    }

    pub fn with_options(platform: Rc<P>, options: ScrollTriggerOptions<P::Element>) -> Self {
        tracing::debug!("scroll context initialised");
        Self {
            trigger: ScrollTrigger::new(platform, options),
        }
    }

    pub fn trigger(&self) -> &Rc<ScrollTrigger<P>> {
        &self.trigger
    }

    /// Reveal `target` on scroll.
    pub fn on_scroll(
        &self,
        target: impl Into<OnScrollTarget<P::Element>>,
        options: OnScrollOptions<P::Element>,
    ) -> OnScroll<P> {
        let target = target.into();
        let patch = options.normalise();
        let lease = self.trigger.add(target.clone(), patch);
        OnScroll {
            trigger: self.trigger.clone(),
            target,
            lease,
        }
    }

    pub fn dispose(self) {}
}

impl<P: ScrollPlatform> Drop for ScrollContext<P> {
    fn drop(&mut self) {
        tracing::debug!("scroll context disposed");
        self.trigger.kill();
        self.trigger.clear();
    }
}

impl<P: ScrollPlatform> fmt::Debug for ScrollContext<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollContext")
            .field("trigger", &self.trigger)
            .finish()
    }
}
