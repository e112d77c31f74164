// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Screen-space clipping of engagement rings.
//!
//! Painters handle ordinary circles fine, but once a ring's projected radius
//! reaches tens of thousands of pixels arc rasterization becomes unreliable.
//! Past [`LARGE_RADIUS_PX`] the ring is replaced by the exact intersection of
//! the disc with the (slightly outset) viewport: a convex polygon whose edges
//! are either straight viewport edges or short circle arcs.
//!
//! Angles are measured in screen space (y down), so ascending angle is
//! clockwise on screen.

use std::f64::consts::TAU;

use crate::geo::ScreenPos;

/// Margin added around the viewport before clipping, in pixels.
pub const VIEWPORT_OUTSET_PX: f64 = 4.0;

/// Projected radius above which the clipped polygon replaces the circle.
pub const LARGE_RADIUS_PX: f64 = 16_384.0;

/// Relative tolerance for "on the circle" and point de-duplication.
const EPSILON_REL: f64 = 1e-9;

/// One edge of a ring boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundarySegment {
    /// A straight run along the viewport edge.
    Line { from: ScreenPos, to: ScreenPos },
    /// A clockwise arc of the ring from `from` to `to`.
    Arc {
        from: ScreenPos,
        to: ScreenPos,
        center: ScreenPos,
        radius: f64,
    },
}

impl BoundarySegment {
    #[must_use]
    pub fn from(&self) -> ScreenPos {
        match *self {
            Self::Line { from, .. } | Self::Arc { from, .. } => from,
        }
    }

    #[must_use]
    pub fn to(&self) -> ScreenPos {
        match *self {
            Self::Line { to, .. } | Self::Arc { to, .. } => to,
        }
    }

    /// Append the points after `from` up to and including `to`.
    fn flatten_into(&self, steps: usize, out: &mut Vec<ScreenPos>) {
        match *self {
            Self::Line { to, .. } => out.push(to),
            Self::Arc {
                from,
                to,
                center,
                radius,
            } => {
                let start = angle_about(center, from);
                let sweep = clockwise_sweep(start, angle_about(center, to));
                let steps = steps.max(1);
                for i in 1..steps {
                    let a = start + sweep * (i as f64) / (steps as f64);
                    out.push(ScreenPos::new(
                        center.x + radius * a.cos(),
                        center.y + radius * a.sin(),
                    ));
                }
                out.push(to);
            }
        }
    }
}

/// Drawable boundary of a ring.
#[derive(Debug, Clone, PartialEq)]
pub enum RingBoundary {
    /// The ring does not touch the viewport.
    Hidden,
    /// The exact circle as two half arcs through the edge point and its antipode.
    Circle {
        center: ScreenPos,
        radius: f64,
        arcs: [BoundarySegment; 2],
    },
    /// Intersection of an oversized disc with the viewport, clockwise.
    Clipped {
        vertices: Vec<ScreenPos>,
        segments: Vec<BoundarySegment>,
    },
}

impl RingBoundary {
    /// Closed polyline approximating the boundary, `arc_steps` points per arc.
    #[must_use]
    pub fn flatten(&self, arc_steps: usize) -> Vec<ScreenPos> {
        let segments: &[BoundarySegment] = match self {
            Self::Hidden => return Vec::new(),
            Self::Circle { arcs, .. } => arcs,
            Self::Clipped { segments, .. } => segments,
        };

        let mut out = Vec::new();
        if let Some(first) = segments.first() {
            out.push(first.from());
        }
        for segment in segments {
            segment.flatten_into(arc_steps, &mut out);
        }
        out
    }
}

fn angle_about(center: ScreenPos, p: ScreenPos) -> f64 {
    (p.y - center.y).atan2(p.x - center.x)
}

/// Clockwise sweep from `start` to `end`, in `(0, TAU]`.
fn clockwise_sweep(start: f64, end: f64) -> f64 {
    let sweep = (end - start).rem_euclid(TAU);
    if sweep <= 0.0 {
        TAU
    } else {
        sweep
    }
}

#[derive(Debug, Clone, Copy)]
struct Rect {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Rect {
    fn contains(&self, p: ScreenPos, eps: f64) -> bool {
        p.x >= self.min_x - eps
            && p.x <= self.max_x + eps
            && p.y >= self.min_y - eps
            && p.y <= self.max_y + eps
    }

    /// Corners clockwise from the top-left.
    fn corners(&self) -> [ScreenPos; 4] {
        [
            ScreenPos::new(self.min_x, self.min_y),
            ScreenPos::new(self.max_x, self.min_y),
            ScreenPos::new(self.max_x, self.max_y),
            ScreenPos::new(self.min_x, self.max_y),
        ]
    }
}

/// Intersections of the segment `p0..p1` with the circle, in segment order.
fn segment_circle_intersections(
    p0: ScreenPos,
    p1: ScreenPos,
    center: ScreenPos,
    radius: f64,
) -> Vec<ScreenPos> {
    let (dx, dy) = (p1.x - p0.x, p1.y - p0.y);
    let (fx, fy) = (p0.x - center.x, p0.y - center.y);

    let a = dx * dx + dy * dy;
    let b = 2.0 * (fx * dx + fy * dy);
    let c = fx * fx + fy * fy - radius * radius;
    let disc = b * b - 4.0 * a * c;
    if a == 0.0 || disc < 0.0 {
        return Vec::new();
    }

    // Numerically stable roots; the naive form cancels badly for huge radii.
    let q = -0.5 * (b + b.signum() * disc.sqrt());
    let mut roots = if q == 0.0 {
        vec![0.0]
    } else {
        vec![q / a, c / q]
    };
    roots.sort_by(f64::total_cmp);

    roots
        .into_iter()
        .filter(|t| (0.0..=1.0).contains(t))
        .map(|t| ScreenPos::new(p0.x + t * dx, p0.y + t * dy))
        .collect()
}

fn push_unique(points: &mut Vec<ScreenPos>, p: ScreenPos, eps: f64) {
    if points.iter().all(|q| q.distance(p) > eps) {
        points.push(p);
    }
}

/// Boundary to draw for a ring centered at `center` passing through `edge`,
/// inside a `width` x `height` viewport.
#[must_use]
pub fn clip_ring(center: ScreenPos, edge: ScreenPos, width: f64, height: f64) -> RingBoundary {
    let radius = center.distance(edge);
    let rect = Rect {
        min_x: -VIEWPORT_OUTSET_PX,
        min_y: -VIEWPORT_OUTSET_PX,
        max_x: width + VIEWPORT_OUTSET_PX,
        max_y: height + VIEWPORT_OUTSET_PX,
    };

    if center.x + radius < rect.min_x
        || center.x - radius > rect.max_x
        || center.y + radius < rect.min_y
        || center.y - radius > rect.max_y
    {
        return RingBoundary::Hidden;
    }

    let circle = || {
        let antipode = ScreenPos::new(2.0 * center.x - edge.x, 2.0 * center.y - edge.y);
        RingBoundary::Circle {
            center,
            radius,
            arcs: [
                BoundarySegment::Arc {
                    from: edge,
                    to: antipode,
                    center,
                    radius,
                },
                BoundarySegment::Arc {
                    from: antipode,
                    to: edge,
                    center,
                    radius,
                },
            ],
        }
    };

    if radius < LARGE_RADIUS_PX {
        return circle();
    }

    let eps = EPSILON_REL * radius.max(1.0);
    let corners = rect.corners();
    let mut points = Vec::new();

    for corner in corners {
        if corner.distance(center) <= radius {
            push_unique(&mut points, corner, eps);
        }
    }
    for i in 0..corners.len() {
        let (p0, p1) = (corners[i], corners[(i + 1) % corners.len()]);
        for p in segment_circle_intersections(p0, p1, center, radius) {
            push_unique(&mut points, p, eps);
        }
    }

    if points.is_empty() {
        // Either the disc sits entirely inside the viewport or misses it.
        return if rect.contains(center, 0.0) {
            circle()
        } else {
            RingBoundary::Hidden
        };
    }
    if points.len() < 2 {
        return RingBoundary::Hidden;
    }

    let n = points.len() as f64;
    let centroid = ScreenPos::new(
        points.iter().map(|p| p.x).sum::<f64>() / n,
        points.iter().map(|p| p.y).sum::<f64>() / n,
    );
    points.sort_by(|a, b| angle_about(centroid, *a).total_cmp(&angle_about(centroid, *b)));

    let on_circle = |p: ScreenPos| (p.distance(center) - radius).abs() <= eps;
    let segments = (0..points.len())
        .map(|i| {
            let from = points[i];
            let to = points[(i + 1) % points.len()];
            if on_circle(from) && on_circle(to) {
                let start = angle_about(center, from);
                let mid = start + clockwise_sweep(start, angle_about(center, to)) / 2.0;
                let arc_mid = ScreenPos::new(
                    center.x + radius * mid.cos(),
                    center.y + radius * mid.sin(),
                );
                if rect.contains(arc_mid, eps) {
                    return BoundarySegment::Arc {
                        from,
                        to,
                        center,
                        radius,
                    };
                }
            }
            BoundarySegment::Line { from, to }
        })
        .collect();

    RingBoundary::Clipped {
        vertices: points,
        segments,
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::*;

    const W: f64 = 800.0;
    const H: f64 = 600.0;

    fn assert_clockwise(vertices: &[ScreenPos]) {
        let n = vertices.len() as f64;
        let c = ScreenPos::new(
            vertices.iter().map(|p| p.x).sum::<f64>() / n,
            vertices.iter().map(|p| p.y).sum::<f64>() / n,
        );
        let angles: Vec<f64> = vertices.iter().map(|p| angle_about(c, *p)).collect();
        assert!(angles.windows(2).all(|w| w[0] <= w[1]), "angles {angles:?}");
    }

    fn is_half_arc(segment: &BoundarySegment) -> bool {
        match *segment {
            BoundarySegment::Arc { from, to, center, .. } => {
                let sweep = clockwise_sweep(angle_about(center, from), angle_about(center, to));
                (sweep - PI).abs() < 1e-9
            }
            BoundarySegment::Line { .. } => false,
        }
    }

    fn is_corner(p: ScreenPos) -> bool {
        let xs = [-VIEWPORT_OUTSET_PX, W + VIEWPORT_OUTSET_PX];
        let ys = [-VIEWPORT_OUTSET_PX, H + VIEWPORT_OUTSET_PX];
        xs.contains(&p.x) && ys.contains(&p.y)
    }

    #[test]
    fn test_small_ring_is_two_half_arcs() {
        let center = ScreenPos::new(400.0, 300.0);
        let edge = ScreenPos::new(450.0, 300.0);
        let RingBoundary::Circle { radius, arcs, .. } = clip_ring(center, edge, W, H) else {
            panic!("expected full circle");
        };
        assert!((radius - 50.0).abs() < 1e-12);

        let antipode = ScreenPos::new(350.0, 300.0);
        assert!(arcs[0].from().distance(edge) < 1e-9);
        assert!(arcs[0].to().distance(antipode) < 1e-9);
        assert!(arcs[1].from().distance(antipode) < 1e-9);
        assert!(arcs[1].to().distance(edge) < 1e-9);
        assert!(arcs.iter().all(is_half_arc));
    }

    #[test]
    fn test_offscreen_ring_is_hidden() {
        let center = ScreenPos::new(-500.0, 300.0);
        let edge = ScreenPos::new(-400.0, 300.0);
        assert_eq!(clip_ring(center, edge, W, H), RingBoundary::Hidden);
    }

    #[test]
    fn test_ring_touching_outset_is_drawn() {
        // Just inside the outset margin on the left
        let center = ScreenPos::new(-12.0, 300.0);
        let edge = ScreenPos::new(-2.0, 300.0);
        assert!(matches!(clip_ring(center, edge, W, H), RingBoundary::Circle { .. }));
    }

    #[test]
    fn test_huge_ring_covering_viewport_is_rectangle() {
        let center = ScreenPos::new(400.0, 300.0);
        let edge = ScreenPos::new(400.0 + 1e6, 300.0);
        let RingBoundary::Clipped { vertices, segments } = clip_ring(center, edge, W, H) else {
            panic!("expected clipped boundary");
        };
        assert_eq!(vertices.len(), 4);
        assert!(vertices.iter().copied().all(is_corner));
        assert!(segments
            .iter()
            .all(|s| matches!(s, BoundarySegment::Line { .. })));
        assert_clockwise(&vertices);
    }

    #[test]
    fn test_huge_ring_crossing_viewport() {
        let radius = 100_000.0;
        let center = ScreenPos::new(400.0 - radius, 300.0);
        let edge = ScreenPos::new(400.0, 300.0);
        let RingBoundary::Clipped { vertices, segments } = clip_ring(center, edge, W, H) else {
            panic!("expected clipped boundary");
        };

        assert_eq!(vertices.len(), 4);
        assert_clockwise(&vertices);
        for v in &vertices {
            let on_circle = (v.distance(center) - radius).abs() < 1e-3;
            assert!(is_corner(*v) || on_circle, "vertex {v:?}");
        }

        let arcs: Vec<_> = segments
            .iter()
            .filter(|s| matches!(s, BoundarySegment::Arc { .. }))
            .collect();
        assert_eq!(arcs.len(), 1);
        // The arc runs down the right-hand side, top to bottom.
        assert!(arcs[0].from().y < arcs[0].to().y);
        assert!(arcs[0].from().x > 390.0 && arcs[0].from().x <= 400.0);
    }

    #[test]
    fn test_huge_ring_sliver_has_chord_and_arc() {
        let radius = 100_000.0;
        let center = ScreenPos::new(400.0, H + VIEWPORT_OUTSET_PX + radius - 0.5);
        let edge = ScreenPos::new(400.0 + radius, center.y);
        let RingBoundary::Clipped { vertices, segments } = clip_ring(center, edge, W, H) else {
            panic!("expected clipped boundary");
        };

        assert_eq!(vertices.len(), 2);
        let lines = segments
            .iter()
            .filter(|s| matches!(s, BoundarySegment::Line { .. }))
            .count();
        assert_eq!(lines, 1);
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn test_flatten_closes_loop() {
        let center = ScreenPos::new(400.0, 300.0);
        let boundary = clip_ring(center, ScreenPos::new(410.0, 300.0), W, H);
        let points = boundary.flatten(8);
        assert_eq!(points.len(), 1 + 8 * 2);
        assert!(points.first().unwrap().distance(*points.last().unwrap()) < 1e-9);
        assert!(points
            .iter()
            .all(|p| (p.distance(center) - 10.0).abs() < 1e-9));
    }
}
