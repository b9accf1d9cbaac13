//! Platform abstraction traits for the scroll and lazy engines.
//!
//! These traits define the interface between the engine logic and the
//! environment providing time, frames, events and observers. The browser
//! implementation lives in `vantage-browser`; tests drive an in-memory one.
//!
//! Everything is single-threaded: handlers are `Rc`, tasks are `!Send`.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use web_time::{Duration, Instant};

use crate::element::{LazyElement, TriggerElement};
use crate::error::Result;
use crate::geometry::{Frame, Position};

/// A unit of work for a local (single-threaded) executor.
pub type LocalTask = Pin<Box<dyn Future<Output = ()>>>;

/// Environment of a `ScrollTrigger`.
pub trait ScrollPlatform: 'static {
    type Element: TriggerElement;

    /// Keeps the scroll listener attached while alive; dropping it detaches.
    type Listener;

    fn now(&self) -> Instant;

    /// Current scroll offset of the container.
    fn scroll_position(&self) -> Position;

    /// Size of the container the triggers are tested against.
    fn container_frame(&self) -> Frame;

    /// Run `callback` on the next animation frame.
    fn request_frame(&self, callback: Box<dyn FnOnce()>);

    /// Call `handler` on every scroll event of the container.
    fn listen_scroll(&self, handler: Rc<dyn Fn()>) -> Self::Listener;

    /// Document-wide `querySelectorAll`. Invalid selectors yield nothing.
    fn query_all(&self, selector: &str) -> Vec<Self::Element>;

    /// Spawn a task on the local executor.
    fn spawn_local(&self, task: LocalTask);
}

/// One intersection observer record.
#[derive(Clone, Debug, PartialEq)]
pub struct IntersectionEntry<E> {
    pub target: E,
    pub is_intersecting: bool,
    pub intersection_ratio: f64,
}

impl<E> IntersectionEntry<E> {
    /// Some browsers report `isIntersecting == false` with a positive ratio.
    pub fn is_entering(&self) -> bool {
        self.is_intersecting || self.intersection_ratio > 0.0
    }
}

/// Handle to a live intersection observer.
pub trait ElementObserver<E> {
    fn observe(&self, element: &E);
    fn unobserve(&self, element: &E);
    fn disconnect(&self);
}

/// Result of loading a revealed resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    Failed,
}

/// Handler for a batch of intersection records.
pub type IntersectionHandler<E> = Rc<dyn Fn(Vec<IntersectionEntry<E>>)>;

/// Environment of a `LazyLoader`.
pub trait LazyPlatform: 'static {
    type Element: LazyElement;
    type Observer: ElementObserver<Self::Element>;

    /// Keeps the `online` listener attached while alive.
    type Listener;

    /// `querySelectorAll` within `container`, or the document when `None`.
    fn query_all(&self, selector: &str, container: Option<&Self::Element>) -> Vec<Self::Element>;

    /// Crawler or scroll-less environment: reveal everything up front.
    fn is_bot(&self) -> bool;

    /// Native `loading="lazy"` support on images.
    fn supports_native_loading(&self) -> bool;

    /// Create an observer, or `None` when intersection observers are missing.
    fn create_observer(
        &self,
        root: Option<&Self::Element>,
        root_margin: &str,
        handler: IntersectionHandler<Self::Element>,
    ) -> Option<Self::Observer>;

    /// Schedule `callback`, returning an id for `clear_timeout`.
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> Result<u32>;

    fn clear_timeout(&self, id: u32);

    /// Call `callback` once, on the first load or error event of `element`.
    fn once_loaded(&self, element: &Self::Element, callback: Box<dyn FnOnce(LoadOutcome)>);

    /// Call `handler` whenever the browser comes back online.
    fn on_online(&self, handler: Rc<dyn Fn()>) -> Self::Listener;
}
