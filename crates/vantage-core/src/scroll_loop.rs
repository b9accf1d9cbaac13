//! Animation-frame loop that runs while the user is scrolling.
//!
//! # How it works
//!
//! 1. A scroll event samples the container position. If it moved, the
//!    direction is recomputed and the activity timestamp refreshed.
//! 2. If the loop is idle it starts: `start` fires once and a frame is
//!    requested.
//! 3. Every frame fires `tick(position, direction)`, then stops the loop
//!    (firing `stop`) when nothing moved for longer than `sustain`, or
//!    requests the next frame.
//!
//! Scroll events during a run only update state; there is never more than one
//! pending frame chain.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use web_time::{Duration, Instant};

use crate::geometry::{Direction, Position};
use crate::platform::ScrollPlatform;

/// Idle time after the last movement before the loop stops.
pub const DEFAULT_SUSTAIN: Duration = Duration::from_millis(300);

/// Callbacks of a running loop.
#[derive(Clone)]
pub struct LoopHooks {
    pub tick: Rc<dyn Fn(Position, Direction)>,
    pub start: Option<Rc<dyn Fn()>>,
    pub stop: Option<Rc<dyn Fn()>>,
    pub direction_change: Option<Rc<dyn Fn(Direction)>>,
}

impl LoopHooks {
    pub fn new(tick: impl Fn(Position, Direction) + 'static) -> Self {
        Self {
            tick: Rc::new(tick),
            start: None,
            stop: None,
            direction_change: None,
        }
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

impl fmt::Debug for LoopHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopHooks")
            .field("start", &self.start.is_some())
            .field("stop", &self.stop.is_some())
            .field("direction_change", &self.direction_change.is_some())
            .finish_non_exhaustive()
    }
}

/// What a scroll event changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScrollUpdate {
    /// New direction, when it differs from the previous one.
    pub direction_change: Option<Direction>,
    /// The loop was idle and has to start.
    pub start: bool,
}

/// Bookkeeping of the loop, independent of any frame source.
#[derive(Clone, Debug)]
pub struct LoopState {
    position: Position,
    direction: Direction,
    running: bool,
    last_action: Instant,
    sustain: Duration,
}

impl LoopState {
    pub fn new(position: Position, now: Instant, sustain: Duration) -> Self {
        Self {
            position,
            direction: Direction::None,
            running: false,
            last_action: now,
            sustain,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn sustain(&self) -> Duration {
        self.sustain
    }

    /// Record a scroll event at `position`.
    ///
    /// A position change recomputes the direction and refreshes the activity
    /// timestamp. No change resets the direction to `None` silently.
    pub fn record_scroll(&mut self, position: Position, now: Instant) -> ScrollUpdate {
        let mut direction_change = None;

        if position != self.position {
            let direction = Direction::between(self.position, position);
            if direction != self.direction {
                self.direction = direction;
                direction_change = Some(direction);
            }
            self.position = position;
            self.last_action = now;
        } else {
            self.direction = Direction::None;
        }

        ScrollUpdate {
            direction_change,
            start: !self.running,
        }
    }

    /// Enter the running state. False when already running.
    pub fn begin(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        true
    }

    /// End-of-frame check. Returns whether another frame is needed.
    pub fn finish_frame(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_action) > self.sustain {
            self.running = false;
        }
        self.running
    }

    fn halt(&mut self) {
        self.running = false;
    }
}

/// Frame loop bound to a platform's scroll container.
pub struct ScrollAnimationLoop<P: ScrollPlatform> {
    platform: Rc<P>,
    hooks: LoopHooks,
    state: RefCell<LoopState>,
    killed: Cell<bool>,
    listener: RefCell<Option<P::Listener>>,
    this: Weak<Self>,
}

impl<P: ScrollPlatform> ScrollAnimationLoop<P> {
    /// Attach to the container's scroll events and start a first run, so
    /// consumers see one evaluation without waiting for a scroll.
    pub fn new(platform: Rc<P>, sustain: Duration, hooks: LoopHooks) -> Rc<Self> {
        let state = LoopState::new(platform.scroll_position(), platform.now(), sustain);
        let this = Rc::new_cyclic(|weak| Self {
            platform,
            hooks,
            state: RefCell::new(state),
            killed: Cell::new(false),
            listener: RefCell::new(None),
            this: weak.clone(),
        });

        this.start_run();

        let weak = Rc::downgrade(&this);
        let listener = this.platform.listen_scroll(Rc::new(move || {
            if let Some(scroll_loop) = weak.upgrade() {
                scroll_loop.did_scroll();
            }
        }));
        *this.listener.borrow_mut() = Some(listener);

        this
    }

    /// Handle a scroll event of the container.
    pub fn did_scroll(&self) {
        if self.killed.get() {
            return;
        }

        let position = self.platform.scroll_position();
        let now = self.platform.now();
        let update = self.state.borrow_mut().record_scroll(position, now);

        if let Some(direction) = update.direction_change {
            tracing::trace!(%direction, "scroll direction changed");
            if let Some(callback) = &self.hooks.direction_change {
                callback(direction);
            }
        }

        if update.start {
            self.start_run();
        }
    }

    fn start_run(&self) {
        // A direction hook may have killed the loop.
        if self.killed.get() || !self.state.borrow_mut().begin() {
            return;
        }

        tracing::debug!("scroll loop started");
        if let Some(callback) = &self.hooks.start {
            callback();
        }
        self.request_frame();
    }

    fn request_frame(&self) {
        let weak = self.this.clone();
        self.platform.request_frame(Box::new(move || {
            if let Some(scroll_loop) = weak.upgrade() {
                scroll_loop.tick();
            }
        }));
    }

    fn tick(&self) {
        if self.killed.get() {
            return;
        }

        let (position, direction) = {
            let state = self.state.borrow();
            (state.position, state.direction)
        };
        (self.hooks.tick)(position, direction);

        // The tick callback may have killed the loop.
        if self.killed.get() {
            return;
        }

        let now = self.platform.now();
        if self.state.borrow_mut().finish_frame(now) {
            self.request_frame();
        } else {
            tracing::debug!("scroll loop stopped");
            if let Some(callback) = &self.hooks.stop {
                callback();
            }
        }
    }

    /// Stop for good: pending frames become no-ops and the scroll listener
    /// is detached.
    pub fn kill(&self) {
        self.killed.set(true);
        self.state.borrow_mut().halt();
        drop(self.listener.borrow_mut().take());
    }

    pub fn is_killed(&self) -> bool {
        self.killed.get()
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().is_running()
    }

    pub fn position(&self) -> Position {
        self.state.borrow().position()
    }

    pub fn direction(&self) -> Direction {
        self.state.borrow().direction()
    }
}

impl<P: ScrollPlatform> fmt::Debug for ScrollAnimationLoop<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollAnimationLoop")
            .field("state", &self.state.borrow())
            .field("killed", &self.killed.get())
            .finish_non_exhaustive()
    }
}
