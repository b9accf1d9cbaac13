//! Bookkeeping for preloading a batch of lazy images ahead of time.
//!
//! Already processed images count as ready straight away; the others are
//! fetched off-DOM and complete the batch as their loads settle.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Which images to preload and where their source is staged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloadOptions {
    /// Image selector, `.lazy` when unset.
    #[serde(rename = "sel")]
    pub selector: Option<SmolStr>,
    /// Data attribute holding the source, without the `data-` prefix.
    #[serde(rename = "attr")]
    pub attribute: SmolStr,
}

impl Default for PreloadOptions {
    fn default() -> Self {
        Self {
            selector: None,
            attribute: SmolStr::new_static("src"),
        }
    }
}

impl PreloadOptions {
    pub fn selector(&self) -> &str {
        self.selector.as_deref().unwrap_or(".lazy")
    }
}

/// One image of a batch, keyed by its source.
#[derive(Clone, Debug, PartialEq)]
pub struct PreloadedImage<E> {
    pub element: E,
    pub src: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Images of one preload call and the number still loading.
#[derive(Clone, Debug)]
pub struct PreloadBatch<E> {
    images: Vec<PreloadedImage<E>>,
    remaining: usize,
}

impl<E> Default for PreloadBatch<E> {
    fn default() -> Self {
        Self {
            images: Vec::new(),
            remaining: 0,
        }
    }
}

impl<E> PreloadBatch<E> {
    pub fn new(total: usize) -> Self {
        Self {
            images: Vec::new(),
            remaining: total,
        }
    }

    // A later image with the same source replaces the earlier one.
    fn upsert(&mut self, image: PreloadedImage<E>) {
        match self.images.iter_mut().find(|i| i.src == image.src) {
            Some(existing) => *existing = image,
            None => self.images.push(image),
        }
    }

    /// An image that needs no fetch.
    pub fn insert_ready(&mut self, element: E, src: String, width: u32, height: u32) {
        self.upsert(PreloadedImage {
            element,
            src,
            width: Some(width),
            height: Some(height),
        });
        self.remaining = self.remaining.saturating_sub(1);
    }

    /// An image whose fetch has just been started.
    pub fn insert_pending(&mut self, element: E, src: String) {
        self.upsert(PreloadedImage {
            element,
            src,
            width: None,
            height: None,
        });
    }

    /// Record a settled fetch. `size` is `None` when it failed. Returns true
    /// when this completed the batch.
    pub fn settle(&mut self, src: &str, size: Option<(u32, u32)>) -> bool {
        if let Some(image) = self.images.iter_mut().find(|i| i.src == src) {
            image.width = size.map(|(w, _)| w);
            image.height = size.map(|(_, h)| h);
        }
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.remaining == 0
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    pub fn images(&self) -> &[PreloadedImage<E>] {
        &self.images
    }

    pub fn into_images(self) -> Vec<PreloadedImage<E>> {
        self.images
    }
}
