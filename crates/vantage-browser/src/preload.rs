//! Fetching lazy images ahead of their reveal.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlImageElement};

use vantage_core::lazy::{mark_processed, set_image_sources, was_processed};
use vantage_core::{
    ClassList, LazyElement, LoadOutcome, PreloadBatch, PreloadOptions, PreloadedImage,
};

use crate::element::{DomElement, selected};
use crate::lazy::on_first_event;

const LAZY_CLASS: &str = "lazy";
const LOADED_CLASS: &str = "lazy-success";

fn select_images(root: &Element, options: &PreloadOptions) -> Vec<DomElement> {
    let selector = options.selector();
    selected(selector, root.query_selector_all(selector)).unwrap_or_else(|e| {
        tracing::warn!("Skipping preload: {}", e);
        Vec::new()
    })
}

/// Fetch every matching image under `root` through a detached `<img>`, then
/// call `done` with the sources and natural sizes.
///
/// Images already revealed count as ready with their rendered size. Failed
/// fetches settle without a size.
pub fn preload_images<F>(root: &Element, options: &PreloadOptions, done: F)
where
    F: FnOnce(Vec<PreloadedImage<DomElement>>) + 'static,
{
    let images = select_images(root, options);
    if images.is_empty() {
        done(Vec::new());
        return;
    }

    let batch = Rc::new(RefCell::new(PreloadBatch::new(images.len())));
    let done = Rc::new(RefCell::new(Some(done)));

    let finish = {
        let batch = batch.clone();
        let done = done.clone();
        move || {
            let images = std::mem::take(&mut *batch.borrow_mut()).into_images();
            let pending = done.borrow_mut().take();
            if let Some(done) = pending {
                done(images);
            }
        }
    };
    let finish = Rc::new(finish);

    for image in images {
        image.add_class(LAZY_CLASS);
        let src = image.data(&options.attribute).unwrap_or_default();

        if was_processed(&image) {
            let (width, height) = image
                .as_element()
                .dyn_ref::<HtmlImageElement>()
                .map_or((0, 0), |img| (img.width(), img.height()));
            batch.borrow_mut().insert_ready(image, src, width, height);
            continue;
        }

        let loader = match HtmlImageElement::new() {
            Ok(loader) => loader,
            Err(e) => {
                tracing::warn!("Failed to create preload image: {:?}", e);
                batch.borrow_mut().insert_pending(image, src.clone());
                if batch.borrow_mut().settle(&src, None) {
                    finish();
                }
                continue;
            }
        };
        batch.borrow_mut().insert_pending(image, src.clone());

        let settled = {
            let batch = batch.clone();
            let finish = finish.clone();
            let loader = loader.clone();
            let src = src.clone();
            move |outcome: LoadOutcome| {
                let size = match outcome {
                    LoadOutcome::Loaded => Some((loader.natural_width(), loader.natural_height())),
                    LoadOutcome::Failed => {
                        tracing::debug!("Preload of {} failed", src);
                        None
                    }
                };
                let complete = batch.borrow_mut().settle(&src, size);
                if complete {
                    finish();
                }
            }
        };
        on_first_event(
            &loader,
            &[("load", LoadOutcome::Loaded), ("error", LoadOutcome::Failed)],
            Box::new(settled),
        );
        loader.set_src(&src);
    }

    if batch.borrow().is_complete() {
        finish();
    }
}

/// Reveal every matching image under `root` at once, then call `done`.
pub fn load_all_images<F>(root: &Element, options: &PreloadOptions, done: F)
where
    F: FnOnce(),
{
    for image in select_images(root, options) {
        set_image_sources(&image);
        mark_processed(&image);
        image.add_class(LOADED_CLASS);
    }
    done();
}
