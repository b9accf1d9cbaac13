use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use web_time::Duration;

use crate::platform::IntersectionEntry;

/// Plain-data settings of a `LazyLoader`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LazySettings {
    /// Elements picked up by `update` when none are given.
    pub selector: SmolStr,
    /// Root margin in pixels.
    pub threshold: f64,
    /// Raw `rootMargin`, overriding `threshold`.
    pub thresholds: Option<SmolStr>,
    pub class_loading: SmolStr,
    pub class_loaded: SmolStr,
    pub class_error: SmolStr,
    /// Milliseconds an element has to stay in view before it is revealed.
    pub load_delay: u64,
    pub auto_unobserve: bool,
    /// Hand images and iframes to the browser's `loading="lazy"` when
    /// available.
    pub use_native: bool,
}

impl Default for LazySettings {
    fn default() -> Self {
        Self {
            selector: SmolStr::new_static(".lazy"),
            threshold: 300.0,
            thresholds: None,
            class_loading: SmolStr::new_static("is-loading"),
            class_loaded: SmolStr::new_static("lazy-success"),
            class_error: SmolStr::new_static("lazy-error"),
            load_delay: 0,
            auto_unobserve: true,
            use_native: false,
        }
    }
}

impl LazySettings {
    pub fn root_margin(&self) -> String {
        match &self.thresholds {
            Some(margin) if !margin.is_empty() => margin.to_string(),
            _ => format!("{}px", self.threshold),
        }
    }

    /// Reveal delay, `None` when elements reveal on entry.
    pub fn delay(&self) -> Option<Duration> {
        (self.load_delay > 0).then(|| Duration::from_millis(self.load_delay))
    }
}

pub type EntryCallback<E> = Rc<dyn Fn(&E, &IntersectionEntry<E>)>;
pub type LazyElementCallback<E> = Rc<dyn Fn(&E)>;

/// Hooks into the loader's lifecycle.
pub struct LazyCallbacks<E> {
    pub onenter: Option<EntryCallback<E>>,
    pub onexit: Option<EntryCallback<E>>,
    pub onreveal: Option<LazyElementCallback<E>>,
    pub onloaded: Option<LazyElementCallback<E>>,
    pub onerror: Option<LazyElementCallback<E>>,
    /// Nothing left to observe and no load in flight.
    pub onfinish: Option<Rc<dyn Fn()>>,
}

impl<E> Default for LazyCallbacks<E> {
    fn default() -> Self {
        Self {
            onenter: None,
            onexit: None,
            onreveal: None,
            onloaded: None,
            onerror: None,
            onfinish: None,
        }
    }
}

impl<E> Clone for LazyCallbacks<E> {
    fn clone(&self) -> Self {
        Self {
            onenter: self.onenter.clone(),
            onexit: self.onexit.clone(),
            onreveal: self.onreveal.clone(),
            onloaded: self.onloaded.clone(),
            onerror: self.onerror.clone(),
            onfinish: self.onfinish.clone(),
        }
    }
}

impl<E> LazyCallbacks<E> {
    pub fn onenter(mut self, f: impl Fn(&E, &IntersectionEntry<E>) + 'static) -> Self {
        self.onenter = Some(Rc::new(f));
        self
    }

    pub fn onexit(mut self, f: impl Fn(&E, &IntersectionEntry<E>) + 'static) -> Self {
        self.onexit = Some(Rc::new(f));
        self
    }

    pub fn onreveal(mut self, f: impl Fn(&E) + 'static) -> Self {
        self.onreveal = Some(Rc::new(f));
        self
    }

    pub fn onloaded(mut self, f: impl Fn(&E) + 'static) -> Self {
        self.onloaded = Some(Rc::new(f));
        self
    }

    pub fn onerror(mut self, f: impl Fn(&E) + 'static) -> Self {
        self.onerror = Some(Rc::new(f));
        self
    }

    pub fn onfinish(mut self, f: impl Fn() + 'static) -> Self {
        self.onfinish = Some(Rc::new(f));
        self
    }
}

impl<E> fmt::Debug for LazyCallbacks<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyCallbacks")
            .field("onenter", &self.onenter.is_some())
            .field("onexit", &self.onexit.is_some())
            .field("onreveal", &self.onreveal.is_some())
            .field("onloaded", &self.onloaded.is_some())
            .field("onerror", &self.onerror.is_some())
            .field("onfinish", &self.onfinish.is_some())
            .finish()
    }
}

/// Everything a `LazyLoader` is built from.
pub struct LazyOptions<E> {
    pub settings: LazySettings,
    /// Scroll root and query scope. `None` is the document.
    pub container: Option<E>,
    pub callbacks: LazyCallbacks<E>,
}

impl<E> Default for LazyOptions<E> {
    fn default() -> Self {
        Self {
            settings: LazySettings::default(),
            container: None,
            callbacks: LazyCallbacks::default(),
        }
    }
}

impl<E> From<LazySettings> for LazyOptions<E> {
    fn from(settings: LazySettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }
}
