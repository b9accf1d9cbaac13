//! Types exposed to JavaScript via wasm-bindgen.

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;
use wasm_bindgen::prelude::*;

use vantage_browser::{Frame, IntersectionEntry, Position, Rect};

/// Scroll offset of the container.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct JsPosition {
    pub x: f64,
    pub y: f64,
}

impl From<Position> for JsPosition {
    fn from(p: Position) -> Self {
        Self { x: p.x, y: p.y }
    }
}

/// Rect handed to element offset functions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct JsRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl From<Rect> for JsRect {
    fn from(r: Rect) -> Self {
        Self {
            left: r.left,
            top: r.top,
            width: r.width,
            height: r.height,
        }
    }
}

/// Container size handed to viewport offset functions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct JsFrame {
    pub w: f64,
    pub h: f64,
}

impl From<Frame> for JsFrame {
    fn from(f: Frame) -> Self {
        Self { w: f.w, h: f.h }
    }
}

/// Intersection record handed to `onenter`/`onexit`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct JsIntersection {
    pub is_intersecting: bool,
    pub intersection_ratio: f64,
}

impl<E> From<&IntersectionEntry<E>> for JsIntersection {
    fn from(entry: &IntersectionEntry<E>) -> Self {
        Self {
            is_intersecting: entry.is_intersecting,
            intersection_ratio: entry.intersection_ratio,
        }
    }
}

/// Plain-data part of the `ScrollContext` options.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(default)]
pub struct ScrollSettings {
    /// Milliseconds the loop keeps running after the last scroll event.
    pub sustain: Option<u64>,
}

#[wasm_bindgen(typescript_custom_section)]
const TS_OPTIONS: &'static str = r#"
export type ElementOffsetFn = (
    this: Element,
    element: Element,
    rect: JsRect,
    direction: string,
) => number;
export type ViewportOffsetFn = (
    this: Element,
    element: Element,
    frame: JsFrame,
    direction: string,
) => number;
export type ElementOffset = number | ElementOffsetFn;
export type ViewportOffset = number | ViewportOffsetFn;
export type ToggleResult = void | Promise<unknown>;

export interface TriggerOptionsJs {
    once?: boolean;
    offset?: {
        viewport?: { x?: ViewportOffset; y?: ViewportOffset };
        element?: { x?: ElementOffset; y?: ElementOffset };
    };
    toggle?: {
        class?: { in?: string | string[]; out?: string | string[] };
        callback?: {
            in?: (this: Element, element: Element) => ToggleResult;
            out?: (this: Element, element: Element) => ToggleResult;
            visible?: (this: Element, element: Element) => void;
        };
    };
}

export interface ScrollContextOptions extends ScrollSettings {
    container?: HTMLElement;
    trigger?: TriggerOptionsJs;
    callback?: (position: JsPosition, direction: string) => void;
    start?: () => void;
    stop?: () => void;
    directionChange?: (direction: string) => void;
}

export interface OnScrollOptionsJs extends TriggerOptionsJs {
    onin?: (this: Element, element: Element) => void;
    onout?: (this: Element, element: Element) => void;
    onchange?: (this: Element, element: Element) => void;
}

export interface LazyLoadOptions {
    selector?: string;
    container?: Element;
    threshold?: number;
    thresholds?: string;
    classLoading?: string;
    classLoaded?: string;
    classError?: string;
    loadDelay?: number;
    autoUnobserve?: boolean;
    useNative?: boolean;
    onenter?: (element: Element, entry: JsIntersection) => void;
    onexit?: (element: Element, entry: JsIntersection) => void;
    onreveal?: (element: Element) => void;
    onloaded?: (element: Element) => void;
    onerror?: (element: Element) => void;
    onfinish?: () => void;
}

export interface PreloadOptionsJs {
    sel?: string;
    attr?: string;
}

export interface PreloadedImageJs {
    element: Element;
    src: string;
    width?: number;
    height?: number;
}
"#;
