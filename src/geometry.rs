//! Rectangle math shared by the overlay, resolver and crop stages.
//!
//! Every rectangle and point carries the coordinate space it lives in as a
//! type parameter, so a window-local drag can never be handed to code that
//! expects virtual-screen or source-pixel coordinates. Moving between spaces
//! is always an explicit call (`translate`, `scale_rect`, `in_space`).
//!
//! All functions here are pure.

use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Window-local coordinates of one overlay surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Local;

/// Shared virtual-screen coordinates spanning every attached display.
/// Displays left of or above the primary one have negative offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Absolute;

/// Desktop pixels as the platform reports monitor placement. Only the
/// display layout and overlay window placement see these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Physical;

/// Pixel coordinates inside one capture source's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourcePx;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point<S> {
    pub x: i32,
    pub y: i32,
    #[serde(skip)]
    space: PhantomData<S>,
}

impl<S> Point<S> {
    pub const fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            space: PhantomData,
        }
    }
}

/// Pixel dimensions of a buffer or image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect<S> {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    space: PhantomData<S>,
}

impl<S> Rect<S> {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            space: PhantomData,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn origin(&self) -> Point<S> {
        Point::new(self.x, self.y)
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Centre point, rounded towards negative infinity.
    ///
    /// Against integer bounds this gives the same containment answer as the
    /// exact fractional centre.
    pub fn center(&self) -> Point<S> {
        Point::new(
            self.x.saturating_add((self.width / 2) as i32),
            self.y.saturating_add((self.height / 2) as i32),
        )
    }

    /// Reinterpret the same numbers in another space.
    ///
    /// Only valid where the two spaces coincide, e.g. a source buffer that is
    /// exactly the virtual screen at scale 1.
    pub fn in_space<T>(self) -> Rect<T> {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Normalised rectangle spanned by two corner points, in either drag direction.
pub fn rect_from_corners<S>(a: Point<S>, b: Point<S>) -> Rect<S> {
    Rect::new(
        a.x.min(b.x),
        a.y.min(b.y),
        a.x.abs_diff(b.x),
        a.y.abs_diff(b.y),
    )
}

/// Half-open containment: `[x, x + width) × [y, y + height)`.
pub fn rect_contains_point<S>(rect: &Rect<S>, point: Point<S>) -> bool {
    let (px, py) = (point.x as i64, point.y as i64);
    px >= rect.x as i64 && px < rect.right() && py >= rect.y as i64 && py < rect.bottom()
}

/// Shift a rectangle by `(dx, dy)`, landing in the target space `T`.
pub fn translate<S, T>(rect: Rect<S>, dx: i32, dy: i32) -> Rect<T> {
    Rect::new(
        rect.x.saturating_add(dx),
        rect.y.saturating_add(dy),
        rect.width,
        rect.height,
    )
}

/// Scale every component, rounding half away from zero.
pub fn scale_rect<S, T>(rect: Rect<S>, scale_x: f64, scale_y: f64) -> Rect<T> {
    Rect::new(
        round_i32(rect.x as f64 * scale_x),
        round_i32(rect.y as f64 * scale_y),
        round_u32(rect.width as f64 * scale_x),
        round_u32(rect.height as f64 * scale_y),
    )
}

/// Force `rect` inside `[0, bounds.width) × [0, bounds.height)`.
///
/// The origin is pinned into the bounds first, then width and height shrink
/// to fit. The result is never smaller than 1×1, so for an empty `bounds` the
/// result is the 1×1 rectangle at the origin.
pub fn clamp_rect<S>(rect: Rect<S>, bounds: Size) -> Rect<S> {
    let max_x = (bounds.width as i64 - 1).max(0);
    let max_y = (bounds.height as i64 - 1).max(0);

    let x = (rect.x as i64).clamp(0, max_x);
    let y = (rect.y as i64).clamp(0, max_y);
    let width = (rect.width as i64).min(bounds.width as i64 - x).max(1);
    let height = (rect.height as i64).min(bounds.height as i64 - y).max(1);

    Rect::new(x as i32, y as i32, width as u32, height as u32)
}

/// Smallest rectangle covering every input. `None` for an empty set.
pub fn union<S, I>(rects: I) -> Option<Rect<S>>
where
    I: IntoIterator<Item = Rect<S>>,
{
    let mut iter = rects.into_iter();
    let first = iter.next()?;

    let (mut min_x, mut min_y) = (first.x as i64, first.y as i64);
    let (mut max_x, mut max_y) = (first.right(), first.bottom());

    for r in iter {
        min_x = min_x.min(r.x as i64);
        min_y = min_y.min(r.y as i64);
        max_x = max_x.max(r.right());
        max_y = max_y.max(r.bottom());
    }

    Some(Rect::new(
        min_x as i32,
        min_y as i32,
        (max_x - min_x) as u32,
        (max_y - min_y) as u32,
    ))
}

fn round_i32(v: f64) -> i32 {
    v.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

fn round_u32(v: f64) -> u32 {
    v.round().clamp(0.0, u32::MAX as f64) as u32
}
