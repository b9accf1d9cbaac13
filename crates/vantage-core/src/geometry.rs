//! Viewport geometry: rectangles, frames, offsets and the visibility test.
//!
//! An element is visible inside a frame unless one of its four edges falls
//! outside the frame once both offsets are applied:
//!
//! - the *element offset* shrinks the part of the element that has to enter
//!   the frame (e.g. `Fraction(0.5)` needs half the element inside)
//! - the *viewport offset* insets the frame boundary itself
//!
//! Coordinates follow `getBoundingClientRect()`: origin at the top-left of the
//! frame, `y` growing downwards.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Element bounds relative to the scroll container.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Size of the scroll container (window inner size or element offset size).
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Frame {
    pub w: f64,
    pub h: f64,
}

impl Frame {
    pub fn new(w: f64, h: f64) -> Self {
        Self { w, h }
    }
}

/// Scroll offset of the container.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Resolved offsets along both axes, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Inset {
    pub x: f64,
    pub y: f64,
}

impl Inset {
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Scroll direction derived from two consecutive positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Top,
    Bottom,
    Left,
    Right,
    #[default]
    None,
}

impl Direction {
    /// Direction of travel from `from` to `to`.
    ///
    /// Only the axis that changed counts. When both changed the horizontal
    /// axis wins.
    pub fn between(from: Position, to: Position) -> Direction {
        if to.x != from.x {
            if to.x > from.x {
                Direction::Right
            } else {
                Direction::Left
            }
        } else if to.y != from.y {
            if to.y > from.y {
                Direction::Bottom
            } else {
                Direction::Top
            }
        } else {
            Direction::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Top => "top",
            Direction::Bottom => "bottom",
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::None => "none",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an offset is measured against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OffsetBasis {
    /// The element's rect, for element offsets.
    Element(Rect),
    /// The container frame, for viewport offsets.
    Viewport(Frame),
}

impl OffsetBasis {
    pub fn width(&self) -> f64 {
        match self {
            OffsetBasis::Element(rect) => rect.width,
            OffsetBasis::Viewport(frame) => frame.w,
        }
    }

    pub fn height(&self) -> f64 {
        match self {
            OffsetBasis::Element(rect) => rect.height,
            OffsetBasis::Viewport(frame) => frame.h,
        }
    }
}

/// Caller-supplied offset. Receives the context (the trigger), the basis and
/// the current direction; returns a fraction of the basis size.
pub type OffsetFn<C> = Rc<dyn Fn(&C, OffsetBasis, Direction) -> f64>;

/// One axis of an offset.
pub enum Offset<C> {
    /// Pixels, used as-is.
    Absolute(f64),
    /// Multiplied by the basis size (element or frame).
    Fraction(f64),
    /// Evaluated on every check, result multiplied by the basis size.
    Computed(OffsetFn<C>),
}

impl<C> Offset<C> {
    /// Classify a loosely typed number: integers are pixels, anything with a
    /// fractional part is a fraction. Non-finite numbers resolve to zero.
    pub fn from_number(n: f64) -> Self {
        if !n.is_finite() {
            Offset::Absolute(0.0)
        } else if n.fract() == 0.0 {
            Offset::Absolute(n)
        } else {
            Offset::Fraction(n)
        }
    }

    pub fn computed(f: impl Fn(&C, OffsetBasis, Direction) -> f64 + 'static) -> Self {
        Offset::Computed(Rc::new(f))
    }

    /// Resolve to pixels against `size`, the basis dimension along this axis.
    ///
    /// The result is not checked; a computed offset may return NaN.
    pub fn resolve(&self, ctx: &C, basis: OffsetBasis, size: f64, direction: Direction) -> f64 {
        match self {
            Offset::Absolute(px) => *px,
            Offset::Fraction(f) => size * f,
            Offset::Computed(f) => size * f(ctx, basis, direction),
        }
    }
}

impl<C> Default for Offset<C> {
    fn default() -> Self {
        Offset::Absolute(0.0)
    }
}

impl<C> Clone for Offset<C> {
    fn clone(&self) -> Self {
        match self {
            Offset::Absolute(px) => Offset::Absolute(*px),
            Offset::Fraction(f) => Offset::Fraction(*f),
            Offset::Computed(f) => Offset::Computed(Rc::clone(f)),
        }
    }
}

impl<C> fmt::Debug for Offset<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Offset::Absolute(px) => f.debug_tuple("Absolute").field(px).finish(),
            Offset::Fraction(v) => f.debug_tuple("Fraction").field(v).finish(),
            Offset::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Offsets for both axes.
pub struct OffsetPair<C> {
    pub x: Offset<C>,
    pub y: Offset<C>,
}

impl<C> OffsetPair<C> {
    pub fn new(x: Offset<C>, y: Offset<C>) -> Self {
        Self { x, y }
    }

    fn resolve(&self, ctx: &C, basis: OffsetBasis, direction: Direction) -> Inset {
        Inset {
            x: self.x.resolve(ctx, basis, basis.width(), direction),
            y: self.y.resolve(ctx, basis, basis.height(), direction),
        }
    }
}

impl<C> Default for OffsetPair<C> {
    fn default() -> Self {
        Self {
            x: Offset::default(),
            y: Offset::default(),
        }
    }
}

impl<C> Clone for OffsetPair<C> {
    fn clone(&self) -> Self {
        Self {
            x: self.x.clone(),
            y: self.y.clone(),
        }
    }
}

impl<C> fmt::Debug for OffsetPair<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OffsetPair")
            .field("x", &self.x)
            .field("y", &self.y)
            .finish()
    }
}

/// Viewport and element offsets of a trigger.
pub struct OffsetConfig<C> {
    pub viewport: OffsetPair<C>,
    pub element: OffsetPair<C>,
}

impl<C> OffsetConfig<C> {
    /// Resolve both offsets: `(element, viewport)`.
    pub fn resolve(
        &self,
        ctx: &C,
        rect: Rect,
        frame: Frame,
        direction: Direction,
    ) -> (Inset, Inset) {
        let element = self.element.resolve(ctx, OffsetBasis::Element(rect), direction);
        let viewport = self
            .viewport
            .resolve(ctx, OffsetBasis::Viewport(frame), direction);
        (element, viewport)
    }
}

impl<C> Default for OffsetConfig<C> {
    fn default() -> Self {
        Self {
            viewport: OffsetPair::default(),
            element: OffsetPair::default(),
        }
    }
}

impl<C> Clone for OffsetConfig<C> {
    fn clone(&self) -> Self {
        Self {
            viewport: self.viewport.clone(),
            element: self.element.clone(),
        }
    }
}

impl<C> fmt::Debug for OffsetConfig<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OffsetConfig")
            .field("viewport", &self.viewport)
            .field("element", &self.element)
            .finish()
    }
}

/// Edge test of `rect` against `frame` with resolved offsets.
///
/// An element with a non-finite offset is never visible.
pub fn is_visible(rect: Rect, frame: Frame, element: Inset, viewport: Inset) -> bool {
    if !element.is_finite() || !viewport.is_finite() {
        return false;
    }
    // off left
    if rect.left - viewport.x < -(rect.width - element.x) {
        return false;
    }
    // off right
    if rect.left + viewport.x > frame.w - element.x {
        return false;
    }
    // off top
    if rect.top - viewport.y < -(rect.height - element.y) {
        return false;
    }
    // off bottom
    if rect.top + viewport.y > frame.h - element.y {
        return false;
    }
    true
}
