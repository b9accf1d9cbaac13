//! Element abstractions driven by the engine.
//!
//! The browser crate implements these for `web_sys::Element`; tests use an
//! in-memory node. Elements are cheap handles: cloning one must not clone the
//! underlying node, and equality is node identity.

use crate::geometry::Rect;

/// Class list manipulation.
pub trait ClassList {
    fn add_class(&self, name: &str);
    fn remove_class(&self, name: &str);
    fn has_class(&self, name: &str) -> bool;
}

/// An element a `Trigger` can watch.
pub trait TriggerElement: ClassList + Clone + PartialEq + 'static {
    /// Bounding rect relative to the viewport.
    fn bounds(&self) -> Rect;

    /// Whether the element is among `parent.querySelectorAll(selector)`.
    ///
    /// Matching is scoped to the element's parent, not the whole document.
    /// Elements without a parent never match.
    fn matches_among_siblings(&self, selector: &str) -> bool;
}

/// Tag family the lazy loader distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Iframe,
    Video,
    /// Anything else: revealed through `background-image`.
    Other,
}

impl MediaKind {
    /// Tags with a load event the loader waits for.
    pub fn is_managed(&self) -> bool {
        !matches!(self, MediaKind::Other)
    }

    /// Tags supporting the native `loading="lazy"` attribute.
    pub fn supports_native_lazy(&self) -> bool {
        matches!(self, MediaKind::Image | MediaKind::Iframe)
    }
}

/// An element the lazy loader can reveal.
pub trait LazyElement: ClassList + Clone + PartialEq + 'static {
    fn media_kind(&self) -> MediaKind;

    /// Read `data-{key}`.
    fn data(&self, key: &str) -> Option<String>;

    /// Write `data-{key}`, removing it on `None`.
    fn set_data(&self, key: &str, value: Option<&str>);

    fn set_attribute(&self, name: &str, value: &str);

    /// `<source>` siblings when the parent is a `<picture>`.
    fn picture_sources(&self) -> Vec<Self>;

    /// `<source>` children (video).
    fn child_sources(&self) -> Vec<Self>;

    /// Set the inline `background-image` style.
    fn set_background_image(&self, value: &str);

    /// Restart media loading after swapping sources (`HTMLMediaElement.load()`).
    fn reload_media(&self);

    /// Clear the `alt` text of a failed image.
    fn clear_alt(&self);
}
