//! `web_sys::Element` as a trigger and lazy element.

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Element, HtmlElement, HtmlImageElement, HtmlMediaElement, NodeList};

use vantage_core::{ClassList, Error, LazyElement, MediaKind, Rect, Result, TriggerElement};

/// A DOM element handle. Cloning shares the node; equality is node identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomElement(Element);

impl DomElement {
    pub fn new(element: Element) -> Self {
        Self(element)
    }

    pub fn as_element(&self) -> &Element {
        &self.0
    }

    pub fn into_inner(self) -> Element {
        self.0
    }

    fn tag_is(&self, tag: &str) -> bool {
        self.0.tag_name().eq_ignore_ascii_case(tag)
    }

    fn source_children(parent: &Element) -> Vec<DomElement> {
        let children = parent.children();
        (0..children.length())
            .filter_map(|i| children.item(i))
            .map(DomElement)
            .filter(|child| child.tag_is("source"))
            .collect()
    }
}

impl From<Element> for DomElement {
    fn from(element: Element) -> Self {
        Self(element)
    }
}

impl From<DomElement> for Element {
    fn from(element: DomElement) -> Self {
        element.0
    }
}

impl AsRef<Element> for DomElement {
    fn as_ref(&self) -> &Element {
        &self.0
    }
}

/// Collect the elements of a `NodeList`, skipping non-element nodes.
pub fn node_list_elements(list: &NodeList) -> Vec<DomElement> {
    (0..list.length())
        .filter_map(|i| list.item(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .map(DomElement)
        .collect()
}

/// Elements of a `querySelectorAll` result. A thrown call means the selector
/// was rejected.
pub fn selected(
    selector: &str,
    result: std::result::Result<NodeList, JsValue>,
) -> Result<Vec<DomElement>> {
    match result {
        Ok(list) => Ok(node_list_elements(&list)),
        Err(e) => {
            tracing::debug!("querySelectorAll threw for {:?}: {:?}", selector, e);
            Err(Error::InvalidSelector(selector.to_string()))
        }
    }
}

impl ClassList for DomElement {
    fn add_class(&self, name: &str) {
        if let Err(e) = self.0.class_list().add_1(name) {
            tracing::warn!("Failed to add class {}: {:?}", name, e);
        }
    }

    fn remove_class(&self, name: &str) {
        if let Err(e) = self.0.class_list().remove_1(name) {
            tracing::warn!("Failed to remove class {}: {:?}", name, e);
        }
    }

    fn has_class(&self, name: &str) -> bool {
        self.0.class_list().contains(name)
    }
}

impl TriggerElement for DomElement {
    fn bounds(&self) -> Rect {
        let rect = self.0.get_bounding_client_rect();
        Rect::new(rect.left(), rect.top(), rect.width(), rect.height())
    }

    fn matches_among_siblings(&self, selector: &str) -> bool {
        let Some(parent) = self.0.parent_element() else {
            return false;
        };
        match selected(selector, parent.query_selector_all(selector)) {
            Ok(siblings) => siblings.contains(self),
            Err(e) => {
                tracing::warn!("{}", e);
                false
            }
        }
    }
}

impl LazyElement for DomElement {
    fn media_kind(&self) -> MediaKind {
        match self.0.tag_name().to_ascii_uppercase().as_str() {
            "IMG" => MediaKind::Image,
            "IFRAME" => MediaKind::Iframe,
            "VIDEO" => MediaKind::Video,
            _ => MediaKind::Other,
        }
    }

    fn data(&self, key: &str) -> Option<String> {
        self.0.get_attribute(&format!("data-{key}"))
    }

    fn set_data(&self, key: &str, value: Option<&str>) {
        let name = format!("data-{key}");
        let result = match value {
            Some(value) => self.0.set_attribute(&name, value),
            None => self.0.remove_attribute(&name),
        };
        if let Err(e) = result {
            tracing::warn!("Failed to write {}: {:?}", name, e);
        }
    }

    fn set_attribute(&self, name: &str, value: &str) {
        if let Err(e) = self.0.set_attribute(name, value) {
            tracing::warn!("Failed to set {}: {:?}", name, e);
        }
    }

    fn picture_sources(&self) -> Vec<Self> {
        match self.0.parent_element() {
            Some(parent) if parent.tag_name().eq_ignore_ascii_case("picture") => {
                Self::source_children(&parent)
            }
            _ => Vec::new(),
        }
    }

    fn child_sources(&self) -> Vec<Self> {
        Self::source_children(&self.0)
    }

    fn set_background_image(&self, value: &str) {
        let Some(element) = self.0.dyn_ref::<HtmlElement>() else {
            return;
        };
        if let Err(e) = element.style().set_property("background-image", value) {
            tracing::warn!("Failed to set background image: {:?}", e);
        }
    }

    fn reload_media(&self) {
        if let Some(media) = self.0.dyn_ref::<HtmlMediaElement>() {
            media.load();
        }
    }

    fn clear_alt(&self) {
        match self.0.dyn_ref::<HtmlImageElement>() {
            Some(image) => image.set_alt(""),
            None => self.set_attribute("alt", ""),
        }
    }
}
