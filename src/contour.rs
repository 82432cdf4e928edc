// SPDX-License-Identifier: LGPL-3.0-or-later OR MPL-2.0
// This file is a part of `vector-hardware`.
//
// `vector-hardware` is free software: you can redistribute it and/or modify it under the
// terms of either:
//
// * GNU Lesser General Public License as published by the Free Software Foundation, either
//   version 3 of the License, or (at your option) any later version.
// * Mozilla Public License as published by the Mozilla Foundation, version 2.
//
// `vector-hardware` is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR
// PURPOSE. See the GNU Lesser General Public License or the Mozilla Public License for more
// details.
//
// You should have received a copy of the GNU Lesser General Public License and the Mozilla
// Public License along with `vector-hardware`. If not, see <https://www.gnu.org/licenses/>.

//! Adaptive flattening of path commands into polyline contours.

use piet::kurbo::{Point, Rect};

use crate::path::PathCommand;

/// Flattening tolerance at quality 1.0.
pub const MIN_TOLERANCE: f64 = 0.5;

/// Flattening tolerance at quality 0.0.
pub const MAX_TOLERANCE: f64 = 5.0;

/// Cap on the adaptive subdivision depth.
///
/// Well-formed curves converge long before this; the bound only keeps degenerate
/// control points from recursing without limit.
const MAX_CUBIC_DEPTH: u32 = 16;

/// Map the 0..=1 contour quality knob to a flattening tolerance.
pub fn tolerance_for_quality(quality: f64) -> f64 {
    MAX_TOLERANCE - (MAX_TOLERANCE - MIN_TOLERANCE) * quality.clamp(0.0, 1.0)
}

/// A flattened polyline approximation of a path, plus its bounding box.
#[derive(Debug, Default)]
pub struct Contour {
    points: Vec<[f32; 2]>,
    bounds: Option<Rect>,
}

impl Contour {
    /// Create an empty contour.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The flattened vertices.
    pub fn points(&self) -> &[[f32; 2]] {
        &self.points
    }

    /// The bounding box accumulated over every emitted vertex.
    pub fn bounds(&self) -> Rect {
        self.bounds.unwrap_or(Rect::ZERO)
    }

    /// Discard the flattened data so the contour can be recomputed.
    pub(crate) fn clear(&mut self) {
        self.points.clear();
        self.bounds = None;
    }

    /// Flatten `commands` into this contour at the given tolerance.
    ///
    /// The contour must be empty; callers clear it first when recomputing.
    pub(crate) fn compute(&mut self, commands: &[PathCommand], tolerance: f64) {
        debug_assert!(
            self.points.is_empty(),
            "contour must be cleared before recomputing"
        );

        // A command stream that curves before any move starts from the origin.
        let mut pen = Point::ORIGIN;
        let mut pen_down: Option<Point> = None;

        for command in commands {
            match *command {
                PathCommand::MoveTo(to) => {
                    pen = to;
                    pen_down = None;
                }

                PathCommand::LineTo(to) => {
                    if pen_down.is_none() {
                        pen_down = Some(pen);
                        self.push(pen);
                    }
                    self.push(to);
                    pen = to;
                }

                PathCommand::CubicTo(out_handle, in_handle, to) => {
                    if pen_down.is_none() {
                        pen_down = Some(pen);
                        self.push(pen);
                    }
                    let curve = [pen, out_handle, in_handle, to];
                    self.segment(&curve, curve, 0.0, 1.0, tolerance, 0);
                    pen = to;
                }

                PathCommand::Close => {
                    if let Some(anchor) = pen_down.take() {
                        self.push(anchor);
                        pen = anchor;
                    }
                }
            }
        }
    }

    /// Flatten one parameter range of a cubic.
    ///
    /// `pts` are the de Casteljau control points covering `[t0, t1]` of `curve`; the
    /// emitted point is always evaluated on the original curve so subdivision error
    /// does not accumulate.
    fn segment(
        &mut self,
        curve: &[Point; 4],
        pts: [Point; 4],
        t0: f64,
        t1: f64,
        tolerance: f64,
        depth: u32,
    ) {
        let tolerance_sq = tolerance * tolerance;

        if depth < MAX_CUBIC_DEPTH && too_curvy(&pts, tolerance_sq) {
            let tm = (t0 + t1) * 0.5;
            let hull = half_hull(&pts);
            self.segment(
                curve,
                [pts[0], hull[0], hull[3], hull[5]],
                t0,
                tm,
                tolerance,
                depth + 1,
            );
            self.segment(
                curve,
                [hull[5], hull[4], hull[2], pts[3]],
                tm,
                t1,
                tolerance,
                depth + 1,
            );
        } else if (pts[3] - pts[0]).hypot2() > tolerance_sq {
            self.push(cubic_at(curve, t1));
        }
    }

    fn push(&mut self, point: Point) {
        self.points.push([point.x as f32, point.y as f32]);
        self.bounds = Some(match self.bounds {
            Some(bounds) => bounds.union_pt(point),
            None => Rect::from_points(point, point),
        });
    }
}

/// Flatness test: compare the control handles against the points a third and two
/// thirds of the way along the chord.
fn too_curvy(pts: &[Point; 4], tolerance_sq: f64) -> bool {
    let chord = pts[3] - pts[0];
    let near = pts[0] + chord * (1.0 / 3.0);
    let far = pts[0] + chord * (2.0 / 3.0);

    (pts[1] - near).hypot2() > tolerance_sq || (pts[2] - far).hypot2() > tolerance_sq
}

/// The six-point de Casteljau hull of a cubic at t = 0.5.
fn half_hull(pts: &[Point; 4]) -> [Point; 6] {
    let h0 = pts[0].midpoint(pts[1]);
    let h1 = pts[1].midpoint(pts[2]);
    let h2 = pts[2].midpoint(pts[3]);
    let h3 = h0.midpoint(h1);
    let h4 = h1.midpoint(h2);
    let h5 = h3.midpoint(h4);

    [h0, h1, h2, h3, h4, h5]
}

/// Evaluate a cubic at `t` using the Bernstein form.
fn cubic_at(pts: &[Point; 4], t: f64) -> Point {
    let mt = 1.0 - t;
    let a = mt * mt * mt;
    let b = 3.0 * mt * mt * t;
    let c = 3.0 * mt * t * t;
    let d = t * t * t;

    Point::new(
        a * pts[0].x + b * pts[1].x + c * pts[2].x + d * pts[3].x,
        a * pts[0].y + b * pts[1].y + c * pts[2].y + d * pts[3].y,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flatten(commands: &[PathCommand], tolerance: f64) -> Contour {
        let mut contour = Contour::new();
        contour.compute(commands, tolerance);
        contour
    }

    #[test]
    fn rectangle_round_trip() {
        let commands = [
            PathCommand::MoveTo(Point::new(0.0, 0.0)),
            PathCommand::LineTo(Point::new(10.0, 0.0)),
            PathCommand::LineTo(Point::new(10.0, 10.0)),
            PathCommand::LineTo(Point::new(0.0, 10.0)),
            PathCommand::Close,
        ];

        let contour = flatten(&commands, MAX_TOLERANCE);
        assert_eq!(
            contour.points(),
            &[
                [0.0, 0.0],
                [10.0, 0.0],
                [10.0, 10.0],
                [0.0, 10.0],
                [0.0, 0.0]
            ]
        );
        assert_eq!(contour.bounds(), Rect::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn collinear_cubic_emits_no_interior_vertices() {
        let commands = [
            PathCommand::MoveTo(Point::new(0.0, 0.0)),
            PathCommand::CubicTo(
                Point::new(10.0, 0.0),
                Point::new(20.0, 0.0),
                Point::new(30.0, 0.0),
            ),
        ];

        for tolerance in [MIN_TOLERANCE, 1.0, 2.5, MAX_TOLERANCE] {
            let contour = flatten(&commands, tolerance);
            assert_eq!(
                contour.points(),
                &[[0.0, 0.0], [30.0, 0.0]],
                "tolerance {tolerance}"
            );
        }
    }

    #[test]
    fn quality_is_monotone() {
        let commands = [
            PathCommand::MoveTo(Point::new(0.0, 0.0)),
            PathCommand::CubicTo(
                Point::new(0.0, 100.0),
                Point::new(100.0, -100.0),
                Point::new(100.0, 0.0),
            ),
        ];

        let mut last = 0;
        for quality in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let contour = flatten(&commands, tolerance_for_quality(quality));
            assert!(
                contour.points().len() >= last,
                "vertex count dropped when raising quality to {quality}"
            );
            last = contour.points().len();
        }
        assert!(last > 2, "high quality should subdivide the curve");
    }

    #[test]
    fn cubic_before_move_starts_at_origin() {
        let commands = [PathCommand::CubicTo(
            Point::new(5.0, 5.0),
            Point::new(10.0, 5.0),
            Point::new(15.0, 0.0),
        )];

        let contour = flatten(&commands, MAX_TOLERANCE);
        assert_eq!(contour.points().first(), Some(&[0.0, 0.0]));
    }

    #[test]
    fn close_without_pen_down_is_a_no_op() {
        let commands = [PathCommand::MoveTo(Point::new(3.0, 4.0)), PathCommand::Close];
        let contour = flatten(&commands, MAX_TOLERANCE);
        assert!(contour.points().is_empty());
        assert_eq!(contour.bounds(), Rect::ZERO);
    }

    #[test]
    fn quality_maps_to_tolerance_range() {
        assert_eq!(tolerance_for_quality(1.0), MIN_TOLERANCE);
        assert_eq!(tolerance_for_quality(0.0), MAX_TOLERANCE);
        assert_eq!(tolerance_for_quality(2.0), MIN_TOLERANCE);
        assert_eq!(tolerance_for_quality(-1.0), MAX_TOLERANCE);
    }
}
