//! vantage-core: scroll-triggered visibility and lazy reveal, without a DOM.
//!
//! This crate provides:
//! - `geometry` - rectangles, frames, offsets and the visibility test
//! - `Trigger` - an element bound to in/out callbacks and class toggling
//! - `TriggerCollection` - the ordered registry of triggers
//! - `ScrollAnimationLoop` - the frame loop that runs while the user scrolls
//! - `ScrollTrigger` - the facade wiring the loop to the collection
//! - `ScrollContext` - the shared, explicitly owned facade for page features
//! - `LazyLoader` - intersection-driven reveal of images, iframes and video
//!
//! Everything touching a real document goes through the traits in
//! `element` and `platform`, implemented for the browser by `vantage-browser`.

pub mod collection;
pub mod context;
pub mod element;
pub mod error;
pub mod geometry;
pub mod lazy;
pub mod platform;
pub mod scroll_loop;
pub mod scroll_trigger;
pub mod trigger;

#[cfg(test)]
pub(crate) mod testing;

pub use collection::{SharedTrigger, TriggerCollection, TriggerId};
pub use context::{ElementCallback, OnScroll, OnScrollOptions, OnScrollTarget, ScrollContext};
pub use element::{ClassList, LazyElement, MediaKind, TriggerElement};
pub use error::{CallbackError, Error, Result};
pub use geometry::{
    Direction, Frame, Inset, Offset, OffsetBasis, OffsetConfig, OffsetFn, OffsetPair, Position,
    Rect, is_visible,
};
pub use lazy::{
    LazyCallbacks, LazyLoader, LazyOptions, LazySettings, PreloadBatch, PreloadOptions,
    PreloadedImage,
};
pub use platform::{
    ElementObserver, IntersectionEntry, LazyPlatform, LoadOutcome, LocalTask, ScrollPlatform,
};
pub use scroll_loop::{LoopHooks, LoopState, ScrollAnimationLoop};
pub use scroll_trigger::{
    RemoveTarget, SCROLL_MARKER, ScrollOptions, ScrollTrigger, ScrollTriggerOptions, Target,
    TriggerLease,
};
pub use smol_str::SmolStr;
pub use trigger::{
    CallbackFuture, CallbackResponse, ClassNames, Toggle, ToggleCallbacks, ToggleClasses, Trigger,
    TriggerCallback, TriggerOptions, TriggerPatch, VisibilityCheck, VisibleCallback,
};
