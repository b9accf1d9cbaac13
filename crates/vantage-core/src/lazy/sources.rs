//! Moving staged `data-*` sources onto the real attributes.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::element::{LazyElement, MediaKind};

pub const PROCESSED_DATA: &str = "was-processed";
pub const TIMEOUT_DATA: &str = "ll-timeout";

static BOT_USER_AGENT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(gle|ing|ro)bot|crawl|spider").ok());

/// Crawler user agents, which never scroll.
pub fn is_bot_user_agent(user_agent: &str) -> bool {
    BOT_USER_AGENT
        .as_ref()
        .is_some_and(|re| re.is_match(user_agent))
}

pub fn was_processed<E: LazyElement>(element: &E) -> bool {
    element.data(PROCESSED_DATA).as_deref() == Some("true")
}

pub fn mark_processed<E: LazyElement>(element: &E) {
    element.set_data(PROCESSED_DATA, Some("true"));
}

pub fn reset_processed<E: LazyElement>(element: &E) {
    element.set_data(PROCESSED_DATA, None);
}

fn copy_data<E: LazyElement>(element: &E, attribute: &str, key: &str) -> bool {
    match element.data(key) {
        Some(value) if !value.is_empty() => {
            element.set_attribute(attribute, &value);
            true
        }
        _ => false,
    }
}

fn set_image_attributes<E: LazyElement>(element: &E) {
    copy_data(element, "sizes", "sizes");
    copy_data(element, "srcset", "srcset");
    copy_data(element, "src", "src");
}

/// Image sources, including the `<source>` siblings inside a `<picture>`.
pub fn set_image_sources<E: LazyElement>(element: &E) {
    for source in element.picture_sources() {
        set_image_attributes(&source);
    }
    set_image_attributes(element);
}

fn set_video_sources<E: LazyElement>(element: &E) {
    for source in element.child_sources() {
        copy_data(&source, "src", "src");
    }
    copy_data(element, "poster", "poster");
    copy_data(element, "src", "src");
    element.reload_media();
}

// `data-bg` wins over `data-src`.
fn set_background<E: LazyElement>(element: &E) {
    if let Some(src) = element.data("src").filter(|v| !v.is_empty()) {
        element.set_background_image(&format!("url(\"{src}\")"));
    }
    if let Some(bg) = element.data("bg").filter(|v| !v.is_empty()) {
        element.set_background_image(&bg);
    }
}

pub fn set_sources<E: LazyElement>(element: &E) {
    match element.media_kind() {
        MediaKind::Image => set_image_sources(element),
        MediaKind::Iframe => {
            copy_data(element, "src", "src");
        }
        MediaKind::Video => set_video_sources(element),
        MediaKind::Other => set_background(element),
    }
}
