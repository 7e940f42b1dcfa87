//! Integer pixel geometry: points, rectangles and closed contours.

use serde::{Deserialize, Serialize};

/// A pixel position. Origin is the top-left corner, y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl PixelPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl From<imageproc::point::Point<i32>> for PixelPoint {
    fn from(p: imageproc::point::Point<i32>) -> Self {
        Self::new(p.x, p.y)
    }
}

/// Axis-aligned pixel rectangle. `right()` and `bottom()` are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width - 1
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height - 1
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn contains(&self, p: PixelPoint) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x + 1, bottom - y + 1)
    }

    /// Intersection with the image area `[0, width) x [0, height)`.
    pub fn clip(&self, width: u32, height: u32) -> Rect {
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = (self.x + self.width).min(width as i32);
        let y1 = (self.y + self.height).min(height as i32);
        Rect::new(x0, y0, (x1 - x0).max(0), (y1 - y0).max(0))
    }
}

/// Where a point lies relative to a contour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    Inside,
    OnEdge,
    Outside,
}

impl Containment {
    /// `+1` inside, `0` on the edge, `-1` outside.
    pub fn signum(self) -> i32 {
        match self {
            Containment::Inside => 1,
            Containment::OnEdge => 0,
            Containment::Outside => -1,
        }
    }

    /// Inside, counting edge coincidence as inside when `edge_inside` is set.
    pub fn is_inside(self, edge_inside: bool) -> bool {
        match self {
            Containment::Inside => true,
            Containment::OnEdge => edge_inside,
            Containment::Outside => false,
        }
    }
}

/// The closed outer boundary of a connected pixel region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Contour {
    pub points: Vec<PixelPoint>,
}

impl Contour {
    pub fn new(points: Vec<PixelPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn bounding_rect(&self) -> Rect {
        let Some(first) = self.points.first() else {
            return Rect::default();
        };
        let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
        for p in &self.points[1..] {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        Rect::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1)
    }

    /// Shoelace area of the polygon through the contour points.
    ///
    /// Single pixels and one-pixel-wide strokes have zero area.
    pub fn polygon_area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut twice = 0i64;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            twice += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
        }
        (twice as f64 / 2.0).abs()
    }

    pub fn is_degenerate(&self) -> bool {
        self.polygon_area() == 0.0
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Contour {
        Contour::new(self.points.iter().map(|p| p.offset(dx, dy)).collect())
    }

    /// Point-in-polygon test with edge detection.
    pub fn locate(&self, p: PixelPoint) -> Containment {
        let n = self.points.len();
        match n {
            0 => return Containment::Outside,
            1 => {
                return if self.points[0] == p {
                    Containment::OnEdge
                } else {
                    Containment::Outside
                }
            }
            _ => {}
        }

        let (px, py) = (p.x as i64, p.y as i64);
        let mut inside = false;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            let (ax, ay, bx, by) = (a.x as i64, a.y as i64, b.x as i64, b.y as i64);

            let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
            if cross == 0
                && px >= ax.min(bx)
                && px <= ax.max(bx)
                && py >= ay.min(by)
                && py <= ay.max(by)
            {
                return Containment::OnEdge;
            }

            if (ay > py) != (by > py) {
                // x of the edge at row py, compared without division
                let lhs = (px - ax) * (by - ay);
                let rhs = (py - ay) * (bx - ax);
                let crosses = if by > ay { lhs < rhs } else { lhs > rhs };
                if crosses {
                    inside = !inside;
                }
            }
        }

        if inside {
            Containment::Inside
        } else {
            Containment::Outside
        }
    }

    /// `1` strictly inside, `0` on the border, `-1` outside.
    pub fn point_polygon_test(&self, p: PixelPoint) -> i32 {
        self.locate(p).signum()
    }

    pub fn contains(&self, p: PixelPoint, edge_inside: bool) -> bool {
        if !self.bounding_rect().contains(p) {
            return false;
        }
        self.locate(p).is_inside(edge_inside)
    }

    pub(crate) fn to_imageproc(&self) -> Vec<imageproc::point::Point<i32>> {
        self.points
            .iter()
            .map(|p| imageproc::point::Point::new(p.x, p.y))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Contour {
        Contour::new(vec![
            PixelPoint::new(0, 0),
            PixelPoint::new(0, 4),
            PixelPoint::new(4, 4),
            PixelPoint::new(4, 0),
        ])
    }

    #[test]
    fn test_point_polygon_test() {
        let c = square();
        assert_eq!(c.point_polygon_test(PixelPoint::new(2, 2)), 1);
        assert_eq!(c.point_polygon_test(PixelPoint::new(0, 2)), 0);
        assert_eq!(c.point_polygon_test(PixelPoint::new(4, 4)), 0);
        assert_eq!(c.point_polygon_test(PixelPoint::new(5, 2)), -1);
        assert_eq!(c.point_polygon_test(PixelPoint::new(-1, -1)), -1);
    }

    #[test]
    fn test_orientation_does_not_matter() {
        let mut reversed = square();
        reversed.points.reverse();
        assert_eq!(reversed.point_polygon_test(PixelPoint::new(2, 2)), 1);
        assert_eq!(reversed.point_polygon_test(PixelPoint::new(2, 7)), -1);
    }

    #[test]
    fn test_bounding_rect_and_area() {
        let c = square();
        assert_eq!(c.bounding_rect(), Rect::new(0, 0, 5, 5));
        assert_eq!(c.polygon_area(), 16.0);

        let line = Contour::new(vec![PixelPoint::new(0, 0), PixelPoint::new(3, 0)]);
        assert!(line.is_degenerate());
    }

    #[test]
    fn test_rect_union_and_clip() {
        let a = Rect::new(0, 0, 4, 4);
        let b = Rect::new(10, 2, 2, 8);
        let u = a.union(&b);
        assert_eq!(u, Rect::new(0, 0, 12, 10));
        assert_eq!(u.right(), 11);
        assert_eq!(u.bottom(), 9);

        let clipped = Rect::new(-5, -5, 20, 20).clip(8, 6);
        assert_eq!(clipped, Rect::new(0, 0, 8, 6));
    }
}
