//! In-memory document and platforms for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};

use web_time::{Duration, Instant};

use crate::element::{ClassList, LazyElement, MediaKind, TriggerElement};
use crate::error::{Error, Result};
use crate::geometry::{Frame, Position, Rect};
use crate::platform::{
    ElementObserver, IntersectionEntry, IntersectionHandler, LazyPlatform, LoadOutcome, LocalTask,
    ScrollPlatform,
};

struct Node {
    tag: String,
    rect: Cell<Rect>,
    classes: RefCell<Vec<String>>,
    attrs: RefCell<BTreeMap<String, String>>,
    parent: RefCell<Weak<Node>>,
    children: RefCell<Vec<TestElement>>,
    background: RefCell<Option<String>>,
    reloads: Cell<u32>,
}

/// A DOM-like node: ordered classes, attributes, a parent and children.
#[derive(Clone)]
pub struct TestElement(Rc<Node>);

impl TestElement {
    pub fn new(tag: &str) -> Self {
        Self(Rc::new(Node {
            tag: tag.to_ascii_lowercase(),
            rect: Cell::new(Rect::default()),
            classes: RefCell::new(Vec::new()),
            attrs: RefCell::new(BTreeMap::new()),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            background: RefCell::new(None),
            reloads: Cell::new(0),
        }))
    }

    pub fn with_class(self, name: &str) -> Self {
        self.add_class(name);
        self
    }

    pub fn with_attr(self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn tag(&self) -> &str {
        &self.0.tag
    }

    pub fn set_rect(&self, rect: Rect) {
        self.0.rect.set(rect);
    }

    pub fn classes(&self) -> Vec<String> {
        self.0.classes.borrow().clone()
    }

    pub fn attr(&self, name: &str) -> Option<String> {
        self.0.attrs.borrow().get(name).cloned()
    }

    pub fn set_attr(&self, name: &str, value: &str) {
        self.0
            .attrs
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
    }

    pub fn remove_attr(&self, name: &str) {
        self.0.attrs.borrow_mut().remove(name);
    }

    pub fn background(&self) -> Option<String> {
        self.0.background.borrow().clone()
    }

    pub fn reloads(&self) -> u32 {
        self.0.reloads.get()
    }

    pub fn parent(&self) -> Option<TestElement> {
        self.0.parent.borrow().upgrade().map(TestElement)
    }

    pub fn children(&self) -> Vec<TestElement> {
        self.0.children.borrow().clone()
    }

    pub fn append(&self, child: &TestElement) {
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.0.children.borrow_mut().push(child.clone());
    }

    /// Every descendant in document order.
    pub fn descendants(&self) -> Vec<TestElement> {
        let mut out = Vec::new();
        for child in self.children() {
            out.push(child.clone());
            out.extend(child.descendants());
        }
        out
    }

    /// `querySelectorAll` over the descendants.
    pub fn select_all(&self, selector: &str) -> Vec<TestElement> {
        self.descendants()
            .into_iter()
            .filter(|el| el.matches(selector))
            .collect()
    }

    /// Selector lists of compound selectors: `tag`, `.class`, `#id`,
    /// `[attr]` and `[attr="value"]`. Combinators are not supported.
    pub fn matches(&self, selector: &str) -> bool {
        selector
            .split(',')
            .map(str::trim)
            .any(|compound| !compound.is_empty() && self.matches_compound(compound))
    }

    fn matches_compound(&self, compound: &str) -> bool {
        let is_delim = |c: char| c == '.' || c == '#' || c == '[';
        let tag_end = compound.find(is_delim).unwrap_or(compound.len());
        let tag = &compound[..tag_end];
        if !tag.is_empty() && tag != "*" && !tag.eq_ignore_ascii_case(self.tag()) {
            return false;
        }

        let mut rest = &compound[tag_end..];
        while !rest.is_empty() {
            if let Some(inner) = rest.strip_prefix('[') {
                let Some(end) = inner.find(']') else {
                    return false;
                };
                let ok = match inner[..end].split_once('=') {
                    Some((name, value)) => {
                        self.attr(name).as_deref() == Some(value.trim_matches('"'))
                    }
                    None => self.attr(&inner[..end]).is_some(),
                };
                if !ok {
                    return false;
                }
                rest = &inner[end + 1..];
            } else {
                let (prefix, tail) = rest.split_at(1);
                let end = tail.find(is_delim).unwrap_or(tail.len());
                let name = &tail[..end];
                let ok = match prefix {
                    "." => self.has_class(name),
                    "#" => self.attr("id").as_deref() == Some(name),
                    _ => false,
                };
                if !ok {
                    return false;
                }
                rest = &tail[end..];
            }
        }
        true
    }
}

impl PartialEq for TestElement {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for TestElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestElement")
            .field("tag", &self.0.tag)
            .field("classes", &self.0.classes.borrow())
            .field("attrs", &self.0.attrs.borrow())
            .finish()
    }
}

impl ClassList for TestElement {
    fn add_class(&self, name: &str) {
        let mut classes = self.0.classes.borrow_mut();
        if !classes.iter().any(|c| c == name) {
            classes.push(name.to_string());
        }
    }

    fn remove_class(&self, name: &str) {
        self.0.classes.borrow_mut().retain(|c| c != name);
    }

    fn has_class(&self, name: &str) -> bool {
        self.0.classes.borrow().iter().any(|c| c == name)
    }
}

impl TriggerElement for TestElement {
    fn bounds(&self) -> Rect {
        self.0.rect.get()
    }

    fn matches_among_siblings(&self, selector: &str) -> bool {
        self.parent().is_some() && self.matches(selector)
    }
}

impl LazyElement for TestElement {
    fn media_kind(&self) -> MediaKind {
        match self.tag() {
            "img" => MediaKind::Image,
            "iframe" => MediaKind::Iframe,
            "video" => MediaKind::Video,
            _ => MediaKind::Other,
        }
    }

    fn data(&self, key: &str) -> Option<String> {
        self.attr(&format!("data-{key}"))
    }

    fn set_data(&self, key: &str, value: Option<&str>) {
        let name = format!("data-{key}");
        match value {
            Some(value) => self.set_attr(&name, value),
            None => self.remove_attr(&name),
        }
    }

    fn set_attribute(&self, name: &str, value: &str) {
        self.set_attr(name, value);
    }

    fn picture_sources(&self) -> Vec<Self> {
        match self.parent() {
            Some(parent) if parent.tag() == "picture" => parent
                .children()
                .into_iter()
                .filter(|child| child.tag() == "source")
                .collect(),
            _ => Vec::new(),
        }
    }

    fn child_sources(&self) -> Vec<Self> {
        self.children()
            .into_iter()
            .filter(|child| child.tag() == "source")
            .collect()
    }

    fn set_background_image(&self, value: &str) {
        *self.0.background.borrow_mut() = Some(value.to_string());
    }

    fn reload_media(&self) {
        self.0.reloads.set(self.0.reloads.get() + 1);
    }

    fn clear_alt(&self) {
        self.set_attr("alt", "");
    }
}

type Handlers = Rc<RefCell<Vec<(u64, Rc<dyn Fn()>)>>>;

/// Detaches its handler from a `Handlers` list on drop.
pub struct TestListener {
    id: u64,
    handlers: Weak<RefCell<Vec<(u64, Rc<dyn Fn()>)>>>,
}

impl Drop for TestListener {
    fn drop(&mut self) {
        if let Some(handlers) = self.handlers.upgrade() {
            handlers.borrow_mut().retain(|(id, _)| *id != self.id);
        }
    }
}

fn attach(handlers: &Handlers, next: &Cell<u64>, handler: Rc<dyn Fn()>) -> TestListener {
    let id = next.get();
    next.set(id + 1);
    handlers.borrow_mut().push((id, handler));
    TestListener {
        id,
        handlers: Rc::downgrade(handlers),
    }
}

fn fire(handlers: &Handlers) {
    let snapshot: Vec<_> = handlers.borrow().iter().map(|(_, h)| h.clone()).collect();
    for handler in snapshot {
        handler();
    }
}

/// Scroll environment with a manual clock and frame queue.
pub struct TestScrollPlatform {
    epoch: Instant,
    elapsed: Cell<Duration>,
    position: Cell<Position>,
    frame: Cell<Frame>,
    frames: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    scroll_handlers: Handlers,
    next_listener: Cell<u64>,
    document: TestElement,
    tasks: RefCell<Vec<LocalTask>>,
}

impl TestScrollPlatform {
    /// A 1024x768 window scrolled to the origin.
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            epoch: Instant::now(),
            elapsed: Cell::new(Duration::ZERO),
            position: Cell::new(Position::default()),
            frame: Cell::new(Frame::new(1024.0, 768.0)),
            frames: RefCell::new(VecDeque::new()),
            scroll_handlers: Rc::new(RefCell::new(Vec::new())),
            next_listener: Cell::new(0),
            document: TestElement::new("body"),
            tasks: RefCell::new(Vec::new()),
        })
    }

    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    pub fn document(&self) -> &TestElement {
        &self.document
    }

    pub fn advance(&self, ms: u64) {
        self.elapsed
            .set(self.elapsed.get() + Duration::from_millis(ms));
    }

    pub fn set_frame(&self, frame: Frame) {
        self.frame.set(frame);
    }

    /// Move the container and dispatch a scroll event.
    pub fn scroll_to(&self, x: f64, y: f64) {
        self.position.set(Position::new(x, y));
        fire(&self.scroll_handlers);
    }

    pub fn listener_count(&self) -> usize {
        self.scroll_handlers.borrow().len()
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Run the oldest pending frame. False when none was queued.
    pub fn run_frame(&self) -> bool {
        let frame = self.frames.borrow_mut().pop_front();
        match frame {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Advance `step_ms` and run a frame until the queue drains.
    pub fn run_until_idle(&self, step_ms: u64) {
        for _ in 0..10_000 {
            if self.pending_frames() == 0 {
                return;
            }
            self.advance(step_ms);
            self.run_frame();
        }
        panic!("frame loop never went idle");
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Drive every spawned task to completion.
    pub fn run_tasks(&self) {
        let tasks: Vec<_> = self.tasks.borrow_mut().drain(..).collect();
        for task in tasks {
            pollster::block_on(task);
        }
    }
}

impl ScrollPlatform for TestScrollPlatform {
    type Element = TestElement;
    type Listener = TestListener;

    fn now(&self) -> Instant {
        self.epoch + self.elapsed.get()
    }

    fn scroll_position(&self) -> Position {
        self.position.get()
    }

    fn container_frame(&self) -> Frame {
        self.frame.get()
    }

    fn request_frame(&self, callback: Box<dyn FnOnce()>) {
        self.frames.borrow_mut().push_back(callback);
    }

    fn listen_scroll(&self, handler: Rc<dyn Fn()>) -> TestListener {
        attach(&self.scroll_handlers, &self.next_listener, handler)
    }

    fn query_all(&self, selector: &str) -> Vec<TestElement> {
        self.document.select_all(selector)
    }

    fn spawn_local(&self, task: LocalTask) {
        self.tasks.borrow_mut().push(task);
    }
}

#[derive(Default)]
struct ObserverState {
    observed: RefCell<Vec<TestElement>>,
    handler: RefCell<Option<IntersectionHandler<TestElement>>>,
    root_margin: RefCell<String>,
}

/// Records observed elements; intersections are dispatched by the platform.
#[derive(Clone)]
pub struct TestObserver(Rc<ObserverState>);

impl ElementObserver<TestElement> for TestObserver {
    fn observe(&self, element: &TestElement) {
        let mut observed = self.0.observed.borrow_mut();
        if !observed.contains(element) {
            observed.push(element.clone());
        }
    }

    fn unobserve(&self, element: &TestElement) {
        self.0.observed.borrow_mut().retain(|el| el != element);
    }

    fn disconnect(&self) {
        self.0.observed.borrow_mut().clear();
    }
}

/// Lazy-loading environment with manual intersections, timers and loads.
pub struct TestLazyPlatform {
    document: TestElement,
    bot: Cell<bool>,
    native: Cell<bool>,
    observers: Cell<bool>,
    observer: Rc<ObserverState>,
    timeouts: RefCell<BTreeMap<u32, (Duration, Box<dyn FnOnce()>)>>,
    next_timeout: Cell<u32>,
    timeouts_fail: Cell<bool>,
    loads: RefCell<Vec<(TestElement, Box<dyn FnOnce(LoadOutcome)>)>>,
    online: Handlers,
    next_listener: Cell<u64>,
}

impl TestLazyPlatform {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            document: TestElement::new("body"),
            bot: Cell::new(false),
            native: Cell::new(false),
            observers: Cell::new(true),
            observer: Rc::new(ObserverState::default()),
            timeouts: RefCell::new(BTreeMap::new()),
            next_timeout: Cell::new(1),
            timeouts_fail: Cell::new(false),
            loads: RefCell::new(Vec::new()),
            online: Rc::new(RefCell::new(Vec::new())),
            next_listener: Cell::new(0),
        })
    }

    pub fn document(&self) -> &TestElement {
        &self.document
    }

    pub fn set_bot(&self, bot: bool) {
        self.bot.set(bot);
    }

    pub fn set_native(&self, native: bool) {
        self.native.set(native);
    }

    pub fn set_observers_supported(&self, supported: bool) {
        self.observers.set(supported);
    }

    /// Make `set_timeout` fail until reset.
    pub fn set_timeouts_fail(&self, fail: bool) {
        self.timeouts_fail.set(fail);
    }

    pub fn observed(&self) -> Vec<TestElement> {
        self.observer.observed.borrow().clone()
    }

    pub fn root_margin(&self) -> String {
        self.observer.root_margin.borrow().clone()
    }

    /// Deliver one intersection record for `element`.
    pub fn intersect(&self, element: &TestElement, entering: bool) {
        let handler = self.observer.handler.borrow().clone();
        if let Some(handler) = handler {
            handler(vec![IntersectionEntry {
                target: element.clone(),
                is_intersecting: entering,
                intersection_ratio: if entering { 1.0 } else { 0.0 },
            }]);
        }
    }

    pub fn pending_timeouts(&self) -> Vec<(u32, Duration)> {
        self.timeouts
            .borrow()
            .iter()
            .map(|(id, (delay, _))| (*id, *delay))
            .collect()
    }

    /// Fire every pending timeout.
    pub fn fire_timeouts(&self) {
        let due = std::mem::take(&mut *self.timeouts.borrow_mut());
        for (_, (_, callback)) in due {
            callback();
        }
    }

    pub fn pending_loads(&self) -> usize {
        self.loads.borrow().len()
    }

    /// Complete the pending load of `element`. False when none was waiting.
    pub fn finish_load(&self, element: &TestElement, outcome: LoadOutcome) -> bool {
        let callback = {
            let mut loads = self.loads.borrow_mut();
            loads
                .iter()
                .position(|(el, _)| el == element)
                .map(|index| loads.remove(index).1)
        };
        match callback {
            Some(callback) => {
                callback(outcome);
                true
            }
            None => false,
        }
    }

    pub fn online_listener_count(&self) -> usize {
        self.online.borrow().len()
    }

    pub fn go_online(&self) {
        fire(&self.online);
    }
}

impl LazyPlatform for TestLazyPlatform {
    type Element = TestElement;
    type Observer = TestObserver;
    type Listener = TestListener;

    fn query_all(&self, selector: &str, container: Option<&TestElement>) -> Vec<TestElement> {
        container.unwrap_or(&self.document).select_all(selector)
    }

    fn is_bot(&self) -> bool {
        self.bot.get()
    }

    fn supports_native_loading(&self) -> bool {
        self.native.get()
    }

    fn create_observer(
        &self,
        _root: Option<&TestElement>,
        root_margin: &str,
        handler: IntersectionHandler<TestElement>,
    ) -> Option<TestObserver> {
        if !self.observers.get() {
            return None;
        }
        *self.observer.handler.borrow_mut() = Some(handler);
        *self.observer.root_margin.borrow_mut() = root_margin.to_string();
        Some(TestObserver(self.observer.clone()))
    }

    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> Result<u32> {
        if self.timeouts_fail.get() {
            return Err(Error::Platform("timers unavailable".into()));
        }
        let id = self.next_timeout.get();
        self.next_timeout.set(id + 1);
        self.timeouts.borrow_mut().insert(id, (delay, callback));
        Ok(id)
    }

    fn clear_timeout(&self, id: u32) {
        self.timeouts.borrow_mut().remove(&id);
    }

    fn once_loaded(&self, element: &TestElement, callback: Box<dyn FnOnce(LoadOutcome)>) {
        self.loads.borrow_mut().push((element.clone(), callback));
    }

    fn on_online(&self, handler: Rc<dyn Fn()>) -> TestListener {
        attach(&self.online, &self.next_listener, handler)
    }
}
