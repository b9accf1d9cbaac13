//! Browser DOM layer for vantage.
//!
//! Implements the `vantage-core` platform traits on `web-sys`. Assumes a
//! `wasm32-unknown-unknown` target.
//!
//! - `element`: `DomElement`, the trigger and lazy element handle
//! - `platform`: `WebScrollPlatform` (scroll events, animation frames)
//! - `lazy`: `WebLazyPlatform` (`IntersectionObserver`, load events, timers)
//! - `preload`: fetching lazy images ahead of their reveal
//!
//! This crate re-exports `vantage-core`, so consumers only need to depend on
//! `vantage-browser`.

pub use vantage_core;
pub use vantage_core::*;

pub mod element;
pub mod lazy;
pub mod platform;
pub mod preload;

pub use element::DomElement;
pub use lazy::{WebLazyPlatform, WebObserver};
pub use platform::{ScrollContainer, WebScrollPlatform};
pub use preload::{load_all_images, preload_images};

/// Scroll facade on the browser window.
pub type WebScrollTrigger = ScrollTrigger<WebScrollPlatform>;

/// Scroll context on the browser window.
pub type WebScrollContext = ScrollContext<WebScrollPlatform>;

/// Lazy loader on the browser document.
pub type WebLazyLoader = LazyLoader<WebLazyPlatform>;
