//! Intersection-driven reveal of images, iframes, video and backgrounds.
//!
//! Markup stages the real sources in `data-src`, `data-srcset`, `data-sizes`,
//! `data-poster` and `data-bg`. When an element approaches the viewport the
//! loader copies them onto the live attributes, tags the element with the
//! loading class and, once the browser reports the load, swaps it for the
//! loaded or error class.
//!
//! Revealed elements are flagged with `data-was-processed="true"` so repeated
//! `update` calls never reveal them twice. Failed loads are retried when the
//! browser comes back online.

mod preload;
mod settings;
mod sources;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

pub use preload::{PreloadBatch, PreloadOptions, PreloadedImage};
pub use settings::{EntryCallback, LazyCallbacks, LazyElementCallback, LazyOptions, LazySettings};
pub use sources::{
    PROCESSED_DATA, TIMEOUT_DATA, is_bot_user_agent, mark_processed, reset_processed,
    set_image_sources, set_sources, was_processed,
};

use crate::element::{ClassList, LazyElement};
use crate::platform::{ElementObserver, IntersectionEntry, LazyPlatform, LoadOutcome};

type Element<P> = <P as LazyPlatform>::Element;

pub struct LazyLoader<P: LazyPlatform> {
    platform: Rc<P>,
    settings: LazySettings,
    container: Option<Element<P>>,
    callbacks: LazyCallbacks<Element<P>>,
    observer: RefCell<Option<P::Observer>>,
    /// Collected elements not yet handed to a load listener.
    pending: RefCell<Vec<Element<P>>>,
    loading: Cell<usize>,
    online: RefCell<Option<P::Listener>>,
    destroyed: Cell<bool>,
    this: Weak<Self>,
}

impl<P: LazyPlatform> LazyLoader<P> {
    /// Create the observer, collect and observe `elements` (or the selector
    /// matches) and register the online retry.
    pub fn new(
        platform: Rc<P>,
        options: LazyOptions<Element<P>>,
        elements: Option<Vec<Element<P>>>,
    ) -> Rc<Self> {
        let loader = Rc::new_cyclic(|this| Self {
            platform,
            settings: options.settings,
            container: options.container,
            callbacks: options.callbacks,
            observer: RefCell::new(None),
            pending: RefCell::new(Vec::new()),
            loading: Cell::new(0),
            online: RefCell::new(None),
            destroyed: Cell::new(false),
            this: this.clone(),
        });

        let observer = loader.create_observer();
        if observer.is_none() {
            tracing::debug!("intersection observers unavailable, loading eagerly");
        }
        *loader.observer.borrow_mut() = observer;

        loader.update(elements);

        let this = loader.this.clone();
        let listener = loader.platform.on_online(Rc::new(move || {
            if let Some(loader) = this.upgrade() {
                loader.retry();
            }
        }));
        *loader.online.borrow_mut() = Some(listener);

        loader
    }

    fn create_observer(&self) -> Option<P::Observer> {
        let this = self.this.clone();
        self.platform.create_observer(
            self.container.as_ref(),
            &self.settings.root_margin(),
            Rc::new(move |entries: Vec<IntersectionEntry<Element<P>>>| {
                let Some(loader) = this.upgrade() else {
                    return;
                };
                for entry in entries {
                    if entry.is_entering() {
                        loader.on_enter(&entry);
                    } else {
                        loader.on_exit(&entry);
                    }
                }
            }),
        )
    }

    pub fn settings(&self) -> &LazySettings {
        &self.settings
    }

    /// Elements still waiting to be revealed.
    pub fn pending(&self) -> Vec<Element<P>> {
        self.pending.borrow().clone()
    }

    /// Revealed media whose load has not settled yet.
    pub fn loading_count(&self) -> usize {
        self.loading.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Recollect unprocessed elements and observe them.
    pub fn update(&self, elements: Option<Vec<Element<P>>>) {
        if self.destroyed.get() {
            return;
        }

        *self.pending.borrow_mut() = self.collect(elements.as_deref());

        if self.platform.is_bot() || self.observer.borrow().is_none() {
            self.load_all();
            return;
        }

        if self.settings.use_native && self.platform.supports_native_loading() {
            self.load_all_native();
            *self.pending.borrow_mut() = self.collect(elements.as_deref());
        }

        let pending = self.pending();
        tracing::debug!(count = pending.len(), "observing lazy elements");
        if let Some(observer) = self.observer.borrow().as_ref() {
            for element in &pending {
                observer.observe(element);
            }
        }
    }

    fn collect(&self, elements: Option<&[Element<P>]>) -> Vec<Element<P>> {
        let elements = match elements {
            Some(elements) => elements.to_vec(),
            None => self
                .platform
                .query_all(&self.settings.selector, self.container.as_ref()),
        };
        elements
            .into_iter()
            .filter(|element| !was_processed(element))
            .collect()
    }

    fn load_all_native(&self) {
        for element in self.pending() {
            if !element.media_kind().supports_native_lazy() {
                continue;
            }
            element.set_attribute("loading", "lazy");
            self.reveal(&element, false);
        }
    }

    /// Reveal one element. Processed elements are skipped unless `force`.
    pub fn load(&self, element: &Element<P>, force: bool) {
        self.reveal(element, force);
    }

    /// Reveal every pending element now.
    pub fn load_all(&self) {
        for element in self.pending() {
            self.reveal_and_unobserve(&element);
        }
    }

    /// Stop observing and drop the online listener. The loader is inert
    /// afterwards.
    pub fn destroy(&self) {
        let observer = self.observer.borrow_mut().take();
        if let Some(observer) = observer {
            for element in self.pending.borrow().iter() {
                observer.unobserve(element);
            }
            observer.disconnect();
        }
        self.pending.borrow_mut().clear();
        drop(self.online.borrow_mut().take());
        self.destroyed.set(true);
        tracing::debug!("lazy loader destroyed");
    }

    fn on_enter(&self, entry: &IntersectionEntry<Element<P>>) {
        if self.destroyed.get() {
            return;
        }
        let element = &entry.target;
        if let Some(callback) = &self.callbacks.onenter {
            callback(element, entry);
        }
        match self.settings.delay() {
            None => self.reveal_and_unobserve(element),
            Some(delay) => self.delay_reveal(element, delay),
        }
    }

    fn on_exit(&self, entry: &IntersectionEntry<Element<P>>) {
        if self.destroyed.get() {
            return;
        }
        if let Some(callback) = &self.callbacks.onexit {
            callback(&entry.target, entry);
        }
        if self.settings.delay().is_some() {
            self.cancel_delay(&entry.target);
        }
    }

    fn delay_reveal(&self, element: &Element<P>, delay: web_time::Duration) {
        if element.data(TIMEOUT_DATA).is_some() {
            return;
        }

        let this = self.this.clone();
        let target = element.clone();
        let scheduled = self.platform.set_timeout(
            delay,
            Box::new(move || {
                if let Some(loader) = this.upgrade() {
                    loader.reveal_and_unobserve(&target);
                    loader.cancel_delay(&target);
                }
            }),
        );
        match scheduled {
            Ok(id) => element.set_data(TIMEOUT_DATA, Some(&id.to_string())),
            Err(e) => {
                tracing::warn!("Failed to delay reveal, revealing now: {}", e);
                self.reveal_and_unobserve(element);
            }
        }
    }

    fn cancel_delay(&self, element: &Element<P>) {
        let Some(id) = element.data(TIMEOUT_DATA) else {
            return;
        };
        if let Ok(id) = id.parse() {
            self.platform.clear_timeout(id);
        }
        element.set_data(TIMEOUT_DATA, None);
    }

    fn reveal_and_unobserve(&self, element: &Element<P>) {
        self.reveal(element, false);
        if !self.settings.auto_unobserve {
            return;
        }
        if let Some(observer) = self.observer.borrow().as_ref() {
            observer.unobserve(element);
        }
    }

    fn reveal(&self, element: &Element<P>, force: bool) {
        if !force && was_processed(element) {
            return;
        }

        let kind = element.media_kind();
        if kind.is_managed() {
            self.watch_load(element);
            element.add_class(&self.settings.class_loading);
        }

        set_sources(element);

        if kind.is_managed() {
            self.loading.set(self.loading.get() + 1);
            self.pending.borrow_mut().retain(|pending| pending != element);
        }

        mark_processed(element);
        tracing::debug!(?kind, "revealed lazy element");

        if let Some(callback) = &self.callbacks.onreveal {
            callback(element);
        }
    }

    fn watch_load(&self, element: &Element<P>) {
        let this = self.this.clone();
        let target = element.clone();
        self.platform.once_loaded(
            element,
            Box::new(move |outcome| {
                if let Some(loader) = this.upgrade() {
                    loader.finish_load(&target, outcome);
                }
            }),
        );
    }

    fn finish_load(&self, element: &Element<P>, outcome: LoadOutcome) {
        element.remove_class(&self.settings.class_loading);

        let callback = match outcome {
            LoadOutcome::Loaded => {
                element.add_class(&self.settings.class_loaded);
                &self.callbacks.onloaded
            }
            LoadOutcome::Failed => {
                tracing::warn!("lazy element failed to load");
                element.add_class(&self.settings.class_error);
                element.clear_alt();
                &self.callbacks.onerror
            }
        };
        if let Some(callback) = callback {
            callback(element);
        }

        self.loading.set(self.loading.get().saturating_sub(1));
        if self.loading.get() == 0 && self.pending.borrow().is_empty() {
            if let Some(callback) = &self.callbacks.onfinish {
                callback();
            }
        }
    }

    /// Reset failed elements and observe them again.
    fn retry(&self) {
        if self.destroyed.get() {
            return;
        }

        let selector = format!(".{}", self.settings.class_error);
        let failed = self.platform.query_all(&selector, self.container.as_ref());
        tracing::debug!(count = failed.len(), "back online, retrying failed elements");
        for element in &failed {
            element.remove_class(&self.settings.class_error);
            reset_processed(element);
        }
        self.update(None);
    }
}

impl<P: LazyPlatform> fmt::Debug for LazyLoader<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyLoader")
            .field("settings", &self.settings)
            .field("pending", &self.pending.borrow().len())
            .field("loading", &self.loading.get())
            .field("destroyed", &self.destroyed.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use web_time::Duration;

    use super::*;
    use crate::testing::{TestElement, TestLazyPlatform};

    type Loader = Rc<LazyLoader<TestLazyPlatform>>;

    fn lazy_img(platform: &TestLazyPlatform, src: &str) -> TestElement {
        let img = TestElement::new("img")
            .with_class("lazy")
            .with_attr("data-src", src);
        platform.document().append(&img);
        img
    }

    fn loader(platform: &Rc<TestLazyPlatform>, options: LazyOptions<TestElement>) -> Loader {
        LazyLoader::new(platform.clone(), options, None)
    }

    #[derive(Default)]
    struct Log(RefCell<Vec<String>>);

    impl Log {
        fn push(&self, event: &str) {
            self.0.borrow_mut().push(event.to_string());
        }

        fn events(&self) -> Vec<String> {
            self.0.borrow().clone()
        }
    }

    fn logged(log: &Rc<Log>) -> LazyCallbacks<TestElement> {
        let (a, b, c, d, e, f) = (
            log.clone(),
            log.clone(),
            log.clone(),
            log.clone(),
            log.clone(),
            log.clone(),
        );
        LazyCallbacks::default()
            .onenter(move |_, _| a.push("enter"))
            .onexit(move |_, _| b.push("exit"))
            .onreveal(move |_| c.push("reveal"))
            .onloaded(move |_| d.push("loaded"))
            .onerror(move |_| e.push("error"))
            .onfinish(move || f.push("finish"))
    }

    #[test]
    fn test_reveal_on_enter_and_load() {
        let platform = TestLazyPlatform::new();
        let img = lazy_img(&platform, "a.jpg");
        let log = Rc::new(Log::default());
        let loader = loader(
            &platform,
            LazyOptions {
                callbacks: logged(&log),
                ..LazyOptions::default()
            },
        );

        assert_eq!(platform.observed(), vec![img.clone()]);
        assert_eq!(platform.root_margin(), "300px");
        assert_eq!(img.attr("src"), None);

        platform.intersect(&img, true);
        assert_eq!(img.attr("src").as_deref(), Some("a.jpg"));
        assert!(img.has_class("is-loading"));
        assert!(was_processed(&img));
        assert!(platform.observed().is_empty());
        assert!(loader.pending().is_empty());
        assert_eq!(loader.loading_count(), 1);

        assert!(platform.finish_load(&img, LoadOutcome::Loaded));
        assert!(img.has_class("lazy-success"));
        assert!(!img.has_class("is-loading"));
        assert_eq!(loader.loading_count(), 0);
        assert_eq!(log.events(), vec!["enter", "reveal", "loaded", "finish"]);
    }

    #[test]
    fn test_update_skips_processed_elements() {
        let platform = TestLazyPlatform::new();
        let img = lazy_img(&platform, "a.jpg");
        let loader = loader(&platform, LazyOptions::default());
        platform.intersect(&img, true);
        platform.finish_load(&img, LoadOutcome::Loaded);

        loader.update(None);
        loader.update(None);
        assert!(platform.observed().is_empty());
        assert!(loader.pending().is_empty());
        assert_eq!(platform.pending_loads(), 0);
        assert_eq!(img.attr("src").as_deref(), Some("a.jpg"));
    }

    #[test]
    fn test_exit_fires_onexit_only() {
        let platform = TestLazyPlatform::new();
        let img = lazy_img(&platform, "a.jpg");
        let log = Rc::new(Log::default());
        let _loader = loader(
            &platform,
            LazyOptions {
                callbacks: logged(&log),
                ..LazyOptions::default()
            },
        );

        platform.intersect(&img, false);
        assert_eq!(log.events(), vec!["exit"]);
        assert_eq!(img.attr("src"), None);
    }

    #[test]
    fn test_failed_load_retried_when_online() {
        let platform = TestLazyPlatform::new();
        let img = lazy_img(&platform, "a.jpg").with_attr("alt", "A photo");
        let log = Rc::new(Log::default());
        let loader = loader(
            &platform,
            LazyOptions {
                callbacks: logged(&log),
                ..LazyOptions::default()
            },
        );

        platform.intersect(&img, true);
        platform.finish_load(&img, LoadOutcome::Failed);
        assert!(img.has_class("lazy-error"));
        assert_eq!(img.attr("alt").as_deref(), Some(""));
        assert!(log.events().contains(&"error".to_string()));

        platform.go_online();
        assert!(!img.has_class("lazy-error"));
        assert!(!was_processed(&img));
        assert_eq!(platform.observed(), vec![img.clone()]);
        assert_eq!(loader.pending(), vec![img]);
    }

    #[test]
    fn test_load_delay_arms_once_and_cancels_on_exit() {
        let platform = TestLazyPlatform::new();
        let img = lazy_img(&platform, "a.jpg");
        let settings = LazySettings {
            load_delay: 100,
            ..LazySettings::default()
        };
        let _loader = loader(&platform, settings.into());

        platform.intersect(&img, true);
        platform.intersect(&img, true);
        let timeouts = platform.pending_timeouts();
        assert_eq!(timeouts.len(), 1);
        assert_eq!(timeouts[0].1, Duration::from_millis(100));
        assert_eq!(img.data(TIMEOUT_DATA), Some(timeouts[0].0.to_string()));
        assert_eq!(img.attr("src"), None);

        platform.intersect(&img, false);
        assert!(platform.pending_timeouts().is_empty());
        assert_eq!(img.data(TIMEOUT_DATA), None);

        platform.intersect(&img, true);
        platform.fire_timeouts();
        assert_eq!(img.attr("src").as_deref(), Some("a.jpg"));
        assert_eq!(img.data(TIMEOUT_DATA), None);
        assert!(platform.observed().is_empty());
    }

    #[test]
    fn test_failed_timer_reveals_without_marking() {
        let platform = TestLazyPlatform::new();
        platform.set_timeouts_fail(true);
        let img = lazy_img(&platform, "a.jpg");
        let log = Rc::new(Log::default());
        let settings = LazySettings {
            load_delay: 100,
            ..LazySettings::default()
        };
        let _loader = loader(
            &platform,
            LazyOptions {
                settings,
                container: None,
                callbacks: logged(&log),
            },
        );

        platform.intersect(&img, true);
        assert!(platform.pending_timeouts().is_empty());
        assert_eq!(img.data(TIMEOUT_DATA), None);
        assert_eq!(img.attr("src").as_deref(), Some("a.jpg"));
        assert_eq!(log.events(), vec!["enter", "reveal"]);
        assert!(platform.observed().is_empty());
    }

    #[test]
    fn test_bots_load_everything_up_front() {
        let platform = TestLazyPlatform::new();
        platform.set_bot(true);
        let img = lazy_img(&platform, "a.jpg");
        let _loader = loader(&platform, LazyOptions::default());

        assert_eq!(img.attr("src").as_deref(), Some("a.jpg"));
        assert!(platform.observed().is_empty());
    }

    #[test]
    fn test_missing_observer_loads_everything() {
        let platform = TestLazyPlatform::new();
        platform.set_observers_supported(false);
        let img = lazy_img(&platform, "a.jpg");
        let _loader = loader(&platform, LazyOptions::default());
        assert_eq!(img.attr("src").as_deref(), Some("a.jpg"));
    }

    #[test]
    fn test_native_loading_for_images_only() {
        let platform = TestLazyPlatform::new();
        platform.set_native(true);
        let img = lazy_img(&platform, "a.jpg");
        let hero = TestElement::new("div")
            .with_class("lazy")
            .with_attr("data-bg", "url(hero.jpg)");
        platform.document().append(&hero);

        let settings = LazySettings {
            use_native: true,
            ..LazySettings::default()
        };
        let _loader = loader(&platform, settings.into());

        assert_eq!(img.attr("loading").as_deref(), Some("lazy"));
        assert_eq!(img.attr("src").as_deref(), Some("a.jpg"));
        assert_eq!(platform.observed(), vec![hero.clone()]);

        platform.intersect(&hero, true);
        assert_eq!(hero.background().as_deref(), Some("url(hero.jpg)"));
    }

    #[test]
    fn test_explicit_elements_and_container() {
        let platform = TestLazyPlatform::new();
        let gallery = TestElement::new("section");
        platform.document().append(&gallery);
        let inside = TestElement::new("img").with_class("lazy");
        gallery.append(&inside);
        let outside = lazy_img(&platform, "b.jpg");

        let scoped = LazyLoader::new(
            platform.clone(),
            LazyOptions {
                container: Some(gallery.clone()),
                ..LazyOptions::default()
            },
            None,
        );
        assert_eq!(scoped.pending(), vec![inside.clone()]);

        let explicit = LazyLoader::new(
            platform.clone(),
            LazyOptions::default(),
            Some(vec![outside.clone()]),
        );
        assert_eq!(explicit.pending(), vec![outside]);
    }

    #[test]
    fn test_force_load_reveals_again() {
        let platform = TestLazyPlatform::new();
        let img = lazy_img(&platform, "a.jpg");
        let loader = loader(&platform, LazyOptions::default());
        platform.intersect(&img, true);
        platform.finish_load(&img, LoadOutcome::Loaded);

        loader.load(&img, false);
        assert_eq!(platform.pending_loads(), 0);
        loader.load(&img, true);
        assert_eq!(platform.pending_loads(), 1);
        assert!(img.has_class("is-loading"));
    }

    #[test]
    fn test_destroy_releases_everything() {
        let platform = TestLazyPlatform::new();
        let img = lazy_img(&platform, "a.jpg");
        let loader = loader(&platform, LazyOptions::default());
        assert_eq!(platform.online_listener_count(), 1);

        loader.destroy();
        assert!(loader.is_destroyed());
        assert!(platform.observed().is_empty());
        assert_eq!(platform.online_listener_count(), 0);

        platform.intersect(&img, true);
        assert_eq!(img.attr("src"), None);
    }

    #[test]
    fn test_background_elements_stay_pending() {
        let platform = TestLazyPlatform::new();
        let hero = TestElement::new("div")
            .with_class("lazy")
            .with_attr("data-src", "hero.jpg");
        platform.document().append(&hero);
        let finished = Rc::new(Cell::new(false));
        let f = finished.clone();
        let loader = loader(
            &platform,
            LazyOptions {
                callbacks: LazyCallbacks::default().onfinish(move || f.set(true)),
                ..LazyOptions::default()
            },
        );

        platform.intersect(&hero, true);
        assert_eq!(hero.background().as_deref(), Some("url(\"hero.jpg\")"));
        assert_eq!(loader.pending(), vec![hero]);
        assert_eq!(loader.loading_count(), 0);
        assert!(!finished.get());
    }
}
