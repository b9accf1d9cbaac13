//! The `ScrollTrigger` facade: one trigger collection driven by one scroll
//! loop.
//!
//! Construction picks up every element carrying the `data-scroll` marker and
//! starts listening. Every tick checks all triggers in insertion order against
//! the container frame, spawns any deferred class toggles, then hands the
//! position and direction to the user's scroll callback.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use web_time::Duration;

use crate::collection::{TriggerCollection, TriggerId};
use crate::geometry::{Direction, Position};
use crate::platform::ScrollPlatform;
use crate::scroll_loop::{DEFAULT_SUSTAIN, LoopHooks, ScrollAnimationLoop};
use crate::trigger::{Trigger, TriggerOptions, TriggerPatch};

/// Selector of elements picked up automatically on construction.
pub const SCROLL_MARKER: &str = "[data-scroll]";

/// Loop settings and the scroll-level callbacks.
#[derive(Clone)]
pub struct ScrollOptions {
    pub sustain: Duration,
    /// Runs on every tick, after the triggers were checked.
    pub callback: Option<Rc<dyn Fn(Position, Direction)>>,
    pub start: Option<Rc<dyn Fn()>>,
    pub stop: Option<Rc<dyn Fn()>>,
    pub direction_change: Option<Rc<dyn Fn(Direction)>>,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self {
            sustain: DEFAULT_SUSTAIN,
            callback: None,
            start: None,
            stop: None,
            direction_change: None,
        }
    }
}

impl ScrollOptions {
    pub fn sustain(mut self, sustain: Duration) -> Self {
        self.sustain = sustain;
        self
    }

    pub fn on_tick(mut self, f: impl Fn(Position, Direction) + 'static) -> Self {
        self.callback = Some(Rc::new(f));
        self
    }

    pub fn on_start(mut self, f: impl Fn() + 'static) -> Self {
        self.start = Some(Rc::new(f));
        self
    }

    pub fn on_stop(mut self, f: impl Fn() + 'static) -> Self {
        self.stop = Some(Rc::new(f));
        self
    }

    pub fn on_direction_change(mut self, f: impl Fn(Direction) + 'static) -> Self {
        self.direction_change = Some(Rc::new(f));
        self
    }
}

impl fmt::Debug for ScrollOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollOptions")
            .field("sustain", &self.sustain)
            .field("callback", &self.callback.is_some())
            .field("start", &self.start.is_some())
            .field("stop", &self.stop.is_some())
            .field("direction_change", &self.direction_change.is_some())
            .finish()
    }
}

/// Defaults applied to every trigger plus the loop settings.
pub struct ScrollTriggerOptions<E> {
    pub trigger: TriggerOptions<E>,
    pub scroll: ScrollOptions,
}

impl<E> Default for ScrollTriggerOptions<E> {
    fn default() -> Self {
        Self {
            trigger: TriggerOptions::default(),
            scroll: ScrollOptions::default(),
        }
    }
}

/// What `ScrollTrigger::add` accepts.
pub enum Target<E> {
    Element(E),
    Elements(Vec<E>),
    /// Added as built, ignoring the per-call options.
    Trigger(Trigger<E>),
    Triggers(Vec<Trigger<E>>),
    /// Document-wide `querySelectorAll`.
    Selector(String),
}

impl<E> From<&str> for Target<E> {
    fn from(selector: &str) -> Self {
        Target::Selector(selector.to_string())
    }
}

impl<E> From<String> for Target<E> {
    fn from(selector: String) -> Self {
        Target::Selector(selector)
    }
}

impl<E> From<Trigger<E>> for Target<E> {
    fn from(trigger: Trigger<E>) -> Self {
        Target::Trigger(trigger)
    }
}

/// What `ScrollTrigger::remove` accepts.
#[derive(Clone, Debug)]
pub enum RemoveTarget<E> {
    Id(TriggerId),
    Ids(Vec<TriggerId>),
    /// Every trigger bound to the element.
    Element(E),
    Elements(Vec<E>),
    /// Sibling-scoped, like `ScrollTrigger::query`.
    Selector(String),
}

impl<E> From<TriggerId> for RemoveTarget<E> {
    fn from(id: TriggerId) -> Self {
        RemoveTarget::Id(id)
    }
}

impl<E> From<Vec<TriggerId>> for RemoveTarget<E> {
    fn from(ids: Vec<TriggerId>) -> Self {
        RemoveTarget::Ids(ids)
    }
}

impl<E> From<&str> for RemoveTarget<E> {
    fn from(selector: &str) -> Self {
        RemoveTarget::Selector(selector.to_string())
    }
}

type Element<P> = <P as ScrollPlatform>::Element;

pub struct ScrollTrigger<P: ScrollPlatform> {
    platform: Rc<P>,
    defaults: TriggerOptions<Element<P>>,
    scroll: ScrollOptions,
    collection: RefCell<TriggerCollection<Element<P>>>,
    scroll_loop: RefCell<Option<Rc<ScrollAnimationLoop<P>>>>,
    this: Weak<Self>,
}

impl<P: ScrollPlatform> ScrollTrigger<P> {
    pub fn new(platform: Rc<P>, options: ScrollTriggerOptions<Element<P>>) -> Rc<Self> {
        let trigger = Rc::new_cyclic(|this| Self {
            platform,
            defaults: options.trigger,
            scroll: options.scroll,
            collection: RefCell::new(TriggerCollection::new()),
            scroll_loop: RefCell::new(None),
            this: this.clone(),
        });

        let marked = trigger.platform.query_all(SCROLL_MARKER);
        if !marked.is_empty() {
            tracing::debug!(count = marked.len(), "registering marked elements");
            let triggers: Vec<_> = marked
                .into_iter()
                .map(|element| Trigger::new(element, trigger.defaults.clone()))
                .collect();
            trigger.collection.borrow_mut().extend(triggers);
        }

        trigger.listen();
        trigger
    }

    pub fn platform(&self) -> &Rc<P> {
        &self.platform
    }

    /// Options every new trigger starts from.
    pub fn defaults(&self) -> &TriggerOptions<Element<P>> {
        &self.defaults
    }

    /// Build a trigger from the defaults overlaid with `patch`.
    pub fn create_trigger(
        &self,
        element: Element<P>,
        patch: TriggerPatch<Element<P>>,
    ) -> Trigger<Element<P>> {
        Trigger::new(element, patch.apply(&self.defaults))
    }

    /// Register triggers for `target`. The returned lease removes them when
    /// dropped, unless detached.
    pub fn add(
        &self,
        target: impl Into<Target<Element<P>>>,
        patch: TriggerPatch<Element<P>>,
    ) -> TriggerLease<P> {
        let options = patch.apply(&self.defaults);
        let wrap = |elements: Vec<Element<P>>| -> Vec<Trigger<Element<P>>> {
            elements
                .into_iter()
                .map(|element| Trigger::new(element, options.clone()))
                .collect()
        };

        let triggers = match target.into() {
            Target::Element(element) => wrap(vec![element]),
            Target::Elements(elements) => wrap(elements),
            Target::Trigger(trigger) => vec![trigger],
            Target::Triggers(triggers) => triggers,
            Target::Selector(selector) => {
                let elements = self.platform.query_all(&selector);
                if elements.is_empty() {
                    tracing::debug!(%selector, "selector matched no elements");
                }
                wrap(elements)
            }
        };

        let ids = self.collection.borrow_mut().extend(triggers);
        TriggerLease {
            owner: self.this.clone(),
            ids,
            armed: true,
        }
    }

    /// Remove triggers, returning how many were dropped.
    pub fn remove(&self, target: impl Into<RemoveTarget<Element<P>>>) -> usize {
        let ids = match target.into() {
            RemoveTarget::Id(id) => vec![id],
            RemoveTarget::Ids(ids) => ids,
            RemoveTarget::Element(element) => self.search(&element),
            RemoveTarget::Elements(elements) => self.search_any(&elements),
            RemoveTarget::Selector(selector) => self.query(&selector),
        };
        self.remove_ids(&ids)
    }

    fn remove_ids(&self, ids: &[TriggerId]) -> usize {
        self.collection.borrow_mut().remove_many(ids)
    }

    /// Triggers whose element matches `selector` within its parent.
    pub fn query(&self, selector: &str) -> Vec<TriggerId> {
        self.collection.borrow().query(selector)
    }

    pub fn search(&self, element: &Element<P>) -> Vec<TriggerId> {
        self.collection.borrow().search(element)
    }

    pub fn search_any(&self, elements: &[Element<P>]) -> Vec<TriggerId> {
        self.collection.borrow().search_any(elements)
    }

    /// Run `f` on every trigger, in order. Triggers currently being checked
    /// are skipped.
    pub fn call(&self, mut f: impl FnMut(TriggerId, &mut Trigger<Element<P>>)) {
        let snapshot = self.collection.borrow().snapshot();
        for (id, trigger) in snapshot {
            if let Ok(mut trigger) = trigger.try_borrow_mut() {
                f(id, &mut *trigger);
            }
        }
    }

    /// Read one trigger. `None` when unknown or currently being checked.
    pub fn with_trigger<R>(
        &self,
        id: TriggerId,
        f: impl FnOnce(&Trigger<Element<P>>) -> R,
    ) -> Option<R> {
        let trigger = self.collection.borrow().get(id)?;
        let trigger = trigger.try_borrow().ok()?;
        Some(f(&*trigger))
    }

    pub fn ids(&self) -> Vec<TriggerId> {
        self.collection.borrow().ids()
    }

    pub fn len(&self) -> usize {
        self.collection.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.borrow().is_empty()
    }

    /// Drop every trigger. The loop keeps running.
    pub fn clear(&self) {
        self.collection.borrow_mut().clear();
    }

    /// Start the scroll loop again after `kill`. No-op while listening.
    pub fn listen(&self) {
        if self.scroll_loop.borrow().is_some() {
            return;
        }

        let this = self.this.clone();
        let mut hooks = LoopHooks::new(move |position, direction| {
            if let Some(trigger) = this.upgrade() {
                trigger.tick(position, direction);
            }
        });
        hooks.start = self.scroll.start.clone();
        hooks.stop = self.scroll.stop.clone();
        hooks.direction_change = self.scroll.direction_change.clone();

        let scroll_loop =
            ScrollAnimationLoop::new(self.platform.clone(), self.scroll.sustain, hooks);
        *self.scroll_loop.borrow_mut() = Some(scroll_loop);
    }

    /// Stop the loop and detach from scroll events. Triggers are kept.
    pub fn kill(&self) {
        let scroll_loop = self.scroll_loop.borrow_mut().take();
        if let Some(scroll_loop) = scroll_loop {
            tracing::debug!("scroll trigger killed");
            scroll_loop.kill();
        }
    }

    pub fn is_listening(&self) -> bool {
        self.scroll_loop.borrow().is_some()
    }

    pub fn direction(&self) -> Direction {
        self.scroll_loop
            .borrow()
            .as_ref()
            .map_or(Direction::None, |scroll_loop| scroll_loop.direction())
    }

    pub fn position(&self) -> Position {
        match self.scroll_loop.borrow().as_ref() {
            Some(scroll_loop) => scroll_loop.position(),
            None => self.platform.scroll_position(),
        }
    }

    fn tick(&self, position: Position, direction: Direction) {
        let frame = self.platform.container_frame();
        let snapshot = self.collection.borrow().snapshot();
        tracing::trace!(triggers = snapshot.len(), %direction, "checking triggers");

        for (_, trigger) in snapshot {
            let Ok(mut trigger) = trigger.try_borrow_mut() else {
                continue;
            };
            let check = trigger.check_visibility(frame, direction);
            drop(trigger);

            if let Some(task) = check.deferred {
                self.platform.spawn_local(task);
            }
        }

        if let Some(callback) = &self.scroll.callback {
            callback(position, direction);
        }
    }
}

impl<P: ScrollPlatform> fmt::Debug for ScrollTrigger<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollTrigger")
            .field("collection", &self.collection.borrow())
            .field("scroll", &self.scroll)
            .field("listening", &self.is_listening())
            .finish_non_exhaustive()
    }
}

/// Triggers registered by one `add` call.
///
/// Dropping or disposing the lease removes them from the facade. `detach`
/// hands the ids back and leaves the triggers registered.
#[must_use = "dropping a lease removes its triggers"]
pub struct TriggerLease<P: ScrollPlatform> {
    owner: Weak<ScrollTrigger<P>>,
    ids: Vec<TriggerId>,
    armed: bool,
}

impl<P: ScrollPlatform> TriggerLease<P> {
    pub fn ids(&self) -> &[TriggerId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Keep the triggers for the lifetime of the facade.
    pub fn detach(mut self) -> Vec<TriggerId> {
        self.armed = false;
        std::mem::take(&mut self.ids)
    }

    /// Remove the triggers now.
    pub fn dispose(self) {}
}

impl<P: ScrollPlatform> Drop for TriggerLease<P> {
    fn drop(&mut self) {
        if !self.armed || self.ids.is_empty() {
            return;
        }
        if let Some(owner) = self.owner.upgrade() {
            owner.remove_ids(&self.ids);
        }
    }
}

impl<P: ScrollPlatform> fmt::Debug for TriggerLease<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerLease")
            .field("ids", &self.ids)
            .field("armed", &self.armed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::CallbackResponse;
    use crate::element::ClassList;
    use crate::geometry::Rect;
    use crate::testing::{TestElement, TestScrollPlatform};

    type Facade = Rc<ScrollTrigger<TestScrollPlatform>>;

    fn inside() -> Rect {
        Rect::new(100.0, 100.0, 200.0, 200.0)
    }

    fn below() -> Rect {
        Rect::new(100.0, 2000.0, 200.0, 200.0)
    }

    fn facade(platform: &Rc<TestScrollPlatform>) -> Facade {
        ScrollTrigger::new(platform.clone(), ScrollTriggerOptions::default())
    }

    fn placed(platform: &TestScrollPlatform, rect: Rect) -> TestElement {
        let el = TestElement::new("div");
        el.set_rect(rect);
        platform.document().append(&el);
        el
    }

    #[test]
    fn test_once_scenario_in_1024x768_window() {
        let platform = TestScrollPlatform::new();
        let a = placed(&platform, inside());
        let b = placed(&platform, below());
        let facade = facade(&platform);

        let ins = Rc::new(Cell::new(0));
        let i = ins.clone();
        let _lease = facade.add(
            Target::Elements(vec![a.clone(), b.clone()]),
            TriggerPatch::new()
                .once(true)
                .class_in("seen")
                .on_in(move |_: &Trigger<TestElement>| i.set(i.get() + 1)),
        );
        platform.run_until_idle(16);

        assert!(a.has_class("seen"));
        assert!(!b.has_class("seen"));
        assert!(b.has_class("invisible"));
        assert_eq!(ins.get(), 1);

        // Scroll down: b comes in, a leaves but stays frozen.
        a.set_rect(Rect::new(100.0, -1800.0, 200.0, 200.0));
        b.set_rect(inside());
        platform.scroll_to(0.0, 1900.0);
        platform.run_until_idle(16);

        assert!(a.has_class("seen"));
        assert!(!a.has_class("invisible"));
        assert!(b.has_class("seen"));
        assert!(!b.has_class("invisible"));
        assert_eq!(ins.get(), 2);
        assert_eq!(facade.direction(), Direction::Bottom);
    }

    #[test]
    fn test_once_trigger_freezes_while_normal_keeps_toggling() {
        let platform = TestScrollPlatform::new();
        let once = placed(&platform, below());
        let normal = placed(&platform, below());
        let facade = facade(&platform);

        let patch = TriggerPatch::new().once(true);
        let _once = facade.add(Target::Element(once.clone()), patch);
        let _normal = facade.add(Target::Element(normal.clone()), TriggerPatch::new());
        platform.run_until_idle(16);
        for el in [&once, &normal] {
            assert!(el.has_class("invisible"));
            assert!(!el.has_class("visible"));
        }

        let move_to = |rect: Rect, y: f64| {
            once.set_rect(rect);
            normal.set_rect(rect);
            platform.scroll_to(0.0, y);
            platform.run_until_idle(16);
        };

        move_to(inside(), 1900.0);
        for el in [&once, &normal] {
            assert!(el.has_class("visible"));
            assert!(!el.has_class("invisible"));
        }

        move_to(Rect::new(100.0, -1800.0, 200.0, 200.0), 3900.0);
        assert!(once.has_class("visible"));
        assert!(!once.has_class("invisible"));
        assert!(!normal.has_class("visible"));
        assert!(normal.has_class("invisible"));

        move_to(inside(), 1900.0);
        assert!(normal.has_class("visible"));
        move_to(below(), 0.0);
        assert!(once.has_class("visible"));
        assert!(normal.has_class("invisible"));
        assert_eq!(facade.len(), 2);
    }

    #[test]
    fn test_marked_elements_are_registered() {
        let platform = TestScrollPlatform::new();
        let marked = placed(&platform, inside()).with_attr("data-scroll", "");
        placed(&platform, inside());
        let facade = facade(&platform);

        assert_eq!(facade.len(), 1);
        assert_eq!(facade.search(&marked).len(), 1);

        platform.run_until_idle(16);
        assert!(marked.has_class("visible"));
    }

    #[test]
    fn test_add_by_selector_is_document_wide() {
        let platform = TestScrollPlatform::new();
        let wrapper = TestElement::new("section");
        platform.document().append(&wrapper);
        let nested = TestElement::new("div").with_class("reveal");
        nested.set_rect(inside());
        wrapper.append(&nested);
        let facade = facade(&platform);

        let lease = facade.add(".reveal", TriggerPatch::new());
        assert_eq!(lease.len(), 1);
        assert!(facade.add(".missing", TriggerPatch::new()).is_empty());

        platform.run_until_idle(16);
        assert!(nested.has_class("visible"));
        lease.detach();
        assert_eq!(facade.len(), 1);
    }

    #[test]
    fn test_remove_variants() {
        let platform = TestScrollPlatform::new();
        let a = placed(&platform, inside()).with_class("card");
        let b = placed(&platform, inside());
        let c = placed(&platform, inside());
        let facade = facade(&platform);

        let ids = facade
            .add(
                Target::Elements(vec![a.clone(), b.clone(), b.clone(), c]),
                TriggerPatch::new(),
            )
            .detach();

        assert_eq!(facade.remove(".card"), 1);
        assert_eq!(facade.remove(RemoveTarget::Element(b)), 2);
        assert_eq!(facade.remove(ids[3]), 1);
        assert_eq!(facade.remove(ids), 0);
        assert!(facade.is_empty());
    }

    #[test]
    fn test_kill_and_listen() {
        let platform = TestScrollPlatform::new();
        let el = placed(&platform, below());
        let facade = facade(&platform);
        facade.add(Target::Element(el.clone()), TriggerPatch::new()).detach();
        platform.run_until_idle(16);

        facade.kill();
        assert!(!facade.is_listening());
        assert_eq!(platform.listener_count(), 0);
        assert_eq!(facade.len(), 1);

        el.set_rect(inside());
        platform.scroll_to(0.0, 500.0);
        platform.run_until_idle(16);
        assert!(!el.has_class("visible"));

        facade.listen();
        facade.listen();
        assert_eq!(platform.listener_count(), 1);
        platform.run_until_idle(16);
        assert!(el.has_class("visible"));
    }

    #[test]
    fn test_lease_drop_removes_triggers() {
        let platform = TestScrollPlatform::new();
        let el = placed(&platform, inside());
        let facade = facade(&platform);

        let lease = facade.add(Target::Element(el.clone()), TriggerPatch::new());
        let kept = facade.add(Target::Element(el.clone()), TriggerPatch::new()).detach();
        assert_eq!(facade.len(), 2);

        drop(lease);
        assert_eq!(facade.ids(), kept);

        let lease = facade.add(Target::Element(el), TriggerPatch::new());
        lease.dispose();
        assert_eq!(facade.len(), 1);
    }

    #[test]
    fn test_callback_may_remove_triggers_mid_tick() {
        let platform = TestScrollPlatform::new();
        let a = placed(&platform, inside());
        let b = placed(&platform, inside());
        let facade = facade(&platform);

        let weak = Rc::downgrade(&facade);
        facade
            .add(
                Target::Elements(vec![a, b.clone()]),
                TriggerPatch::new().on_in(move |t: &Trigger<TestElement>| {
                    if let Some(facade) = weak.upgrade() {
                        facade.remove(RemoveTarget::Element(t.element().clone()));
                    }
                }),
            )
            .detach();
        platform.run_until_idle(16);

        assert!(facade.is_empty());
        // Checked from the tick snapshot even though removed by the first one.
        assert!(b.has_class("visible"));
    }

    #[test]
    fn test_deferred_toggles_are_spawned() {
        let platform = TestScrollPlatform::new();
        let el = placed(&platform, inside());
        let facade = facade(&platform);
        let _lease = facade.add(
            Target::Element(el.clone()),
            TriggerPatch::new()
                .on_in(|_: &Trigger<TestElement>| CallbackResponse::deferred(async { Ok(()) })),
        );
        platform.run_until_idle(16);

        assert_eq!(platform.pending_tasks(), 1);
        assert!(!el.has_class("visible"));
        platform.run_tasks();
        assert!(el.has_class("visible"));
    }

    #[test]
    fn test_scroll_callbacks_see_checked_triggers() {
        let platform = TestScrollPlatform::new();
        let el = placed(&platform, inside());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let starts = Rc::new(Cell::new(0));
        let (s, st, target) = (seen.clone(), starts.clone(), el.clone());
        let options = ScrollTriggerOptions {
            trigger: TriggerPatch::new()
                .class_in("shown")
                .apply(&TriggerOptions::default()),
            scroll: ScrollOptions::default()
                .on_tick(move |_, direction| {
                    s.borrow_mut().push((direction, target.has_class("shown")))
                })
                .on_start(move || st.set(st.get() + 1)),
        };
        let facade = ScrollTrigger::new(platform.clone(), options);
        facade.add(Target::Element(el), TriggerPatch::new()).detach();
        platform.run_until_idle(16);

        assert_eq!(starts.get(), 1);
        let seen = seen.borrow();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|(d, shown)| *d == Direction::None && *shown));
    }

    #[test]
    fn test_with_trigger_reads_state() {
        let platform = TestScrollPlatform::new();
        let el = placed(&platform, inside());
        let facade = facade(&platform);
        let ids = facade.add(Target::Element(el), TriggerPatch::new()).detach();

        assert_eq!(facade.with_trigger(ids[0], |t| t.visible()), Some(None));
        platform.run_until_idle(16);
        assert_eq!(facade.with_trigger(ids[0], |t| t.visible()), Some(Some(true)));

        let mut visited = 0;
        facade.call(|_, t| {
            assert!(t.is_active());
            visited += 1;
        });
        assert_eq!(visited, 1);
    }
}
