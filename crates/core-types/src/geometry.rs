//! Integer pixel geometry.
//!
//! Rectangles are `(x, y, width, height)` with the y axis growing downward.
//! `right()`/`bottom()` are exclusive edges (`x + width`, `y + height`);
//! containment checks are inclusive of all four edges so that a rectangle
//! flush against a display border still counts as on-screen.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

/// Translation vector, used for shift animations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vector {
    pub dx: i32,
    pub dy: i32,
}

impl Vector {
    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }

    pub const fn left(amount: i32) -> Self {
        Self::new(-amount, 0)
    }

    pub const fn right(amount: i32) -> Self {
        Self::new(amount, 0)
    }

    pub const fn up(amount: i32) -> Self {
        Self::new(0, -amount)
    }

    pub const fn down(amount: i32) -> Self {
        Self::new(0, amount)
    }

    pub const fn inverse(self) -> Self {
        Self::new(-self.dx, -self.dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Degenerate rect used for point anchors and uninitialized boundaries.
    pub const fn at(x: i32, y: i32) -> Self {
        Self::new(x, y, 0, 0)
    }

    pub const fn from_points(top_left: Point, bottom_right: Point) -> Self {
        Self {
            x: top_left.x,
            y: top_left.y,
            width: bottom_right.x - top_left.x,
            height: bottom_right.y - top_left.y,
        }
    }

    pub const fn left(&self) -> i32 {
        self.x
    }

    pub const fn top(&self) -> i32 {
        self.y
    }

    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub const fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub const fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    /// All four corners, clockwise from top-left.
    pub const fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.left(), self.top()),
            Point::new(self.right(), self.top()),
            Point::new(self.right(), self.bottom()),
            Point::new(self.left(), self.bottom()),
        ]
    }

    /// Inclusive containment on all edges.
    pub const fn contains_point(&self, p: Point) -> bool {
        p.x >= self.left() && p.x <= self.right() && p.y >= self.top() && p.y <= self.bottom()
    }

    pub const fn contains_rect(&self, other: &Rect) -> bool {
        self.contains_point(other.top_left())
            && self.contains_point(Point::new(other.right(), other.bottom()))
    }

    pub const fn translated(&self, v: Vector) -> Self {
        Self::new(self.x + v.dx, self.y + v.dy, self.width, self.height)
    }

    pub const fn with_position(&self, x: i32, y: i32) -> Self {
        Self::new(x, y, self.width, self.height)
    }

    /// Grow in place so that `other` is covered. A zero-size rect adopts the
    /// other rect's position before growing, so boundary accumulation does
    /// not anchor at the origin.
    pub fn unite(&mut self, other: &Rect) {
        if self.width == 0 && self.height == 0 && (self.x == 0 && self.y == 0) {
            *self = *other;
            return;
        }
        let left = self.left().min(other.left());
        let top = self.top().min(other.top());
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        *self = Rect::new(left, top, right - left, bottom - top);
    }

    /// True when `self` covers every point of `other`. Degenerate rects are
    /// covered when their anchor lies inside.
    pub const fn covers(&self, other: &Rect) -> bool {
        self.left() <= other.left()
            && self.top() <= other.top()
            && self.right() >= other.right()
            && self.bottom() >= other.bottom()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_and_containment() {
        let display = Rect::new(0, 0, 100, 50);
        let inside = Rect::new(10, 10, 20, 10);
        for c in inside.corners() {
            assert!(display.contains_point(c));
        }
        let outside = Rect::new(200, 200, 20, 10);
        assert!(outside.corners().iter().all(|c| !display.contains_point(*c)));
    }

    #[test]
    fn edge_flush_rect_is_contained() {
        let display = Rect::new(0, 0, 100, 50);
        let flush = Rect::new(80, 40, 20, 10);
        assert!(display.contains_rect(&flush));
    }

    #[test]
    fn unite_grows_monotonically() {
        let mut bounds = Rect::new(10, 10, 5, 5);
        bounds.unite(&Rect::new(0, 12, 4, 4));
        assert_eq!(bounds, Rect::new(0, 10, 15, 6));
        bounds.unite(&Rect::new(2, 2, 2, 2));
        assert_eq!(bounds.top(), 2);
        assert!(bounds.covers(&Rect::new(10, 10, 5, 5)));
    }

    #[test]
    fn unite_from_empty_adopts() {
        let mut bounds = Rect::default();
        bounds.unite(&Rect::new(40, 40, 10, 10));
        assert_eq!(bounds, Rect::new(40, 40, 10, 10));
    }

    #[test]
    fn translate_round_trip() {
        let r = Rect::new(5, 6, 7, 8);
        let v = Vector::new(13, -4);
        assert_eq!(r.translated(v).translated(v.inverse()), r);
    }
}
