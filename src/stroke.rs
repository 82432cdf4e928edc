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

//! Stroke extrusion: offsetting flattened contours into renderable triangle strips.

use std::rc::Rc;

use piet::kurbo::{Affine, Point, Vec2};
use piet::{Error as Pierror, LineCap};
use tinyvec::TinyVec;

use crate::buffer::{BufferProvider, BufferType, GpuBuffer};
use crate::path::Path;
use crate::ResultExt;

/// One triangle-strip run inside the stroke vertex buffer.
///
/// Each sub-path extrudes into its own range so strips never bridge unrelated
/// sub-paths.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct StrokeRange {
    /// First vertex of the run.
    pub start: u32,

    /// Number of vertices in the run.
    pub count: u32,
}

/// The stroke-extrusion helper allocated when a paint enters stroke style.
///
/// Walks a path's flattened contours and emits a left/right offset triangle strip,
/// uploaded through the buffer provider on demand. The extrusion is cached per
/// (path, paint) pairing and invalidated when either side changes.
pub(crate) struct ContourStroke<P: BufferProvider + ?Sized> {
    vertices: Vec<[f32; 2]>,
    ranges: TinyVec<[StrokeRange; 2]>,
    buffer: Option<GpuBuffer<P>>,

    /// Set when thickness/join/cap change; forces re-extrusion.
    dirty: bool,

    /// The (path identity, path version) the current strip was extruded from.
    extruded_from: Option<(usize, u64)>,
}

impl<P: BufferProvider + ?Sized> ContourStroke<P> {
    pub(crate) fn new() -> Self {
        Self {
            vertices: Vec::new(),
            ranges: TinyVec::new(),
            buffer: None,
            dirty: true,
            extruded_from: None,
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn ranges(&self) -> &[StrokeRange] {
        &self.ranges
    }

    pub(crate) fn resource(&self) -> Option<&P::Buffer> {
        self.buffer.as_ref().and_then(GpuBuffer::resource)
    }

    /// Re-extrude and upload the strip if the paint or the path changed.
    ///
    /// Returns `false` when the result is degenerate and there is nothing to draw.
    pub(crate) fn update(
        &mut self,
        provider: &Rc<P>,
        path: &Path<P>,
        thickness: f64,
        cap: LineCap,
        tolerance: f64,
    ) -> Result<bool, Pierror> {
        let source = (path.id(), path.version());
        if !self.dirty && self.extruded_from == Some(source) {
            return Ok(!self.ranges.is_empty());
        }

        path.update_contours(tolerance);

        self.vertices.clear();
        self.ranges.clear();
        self.extrude_path(path, Affine::IDENTITY, thickness.abs() * 0.5, cap);

        self.dirty = false;
        self.extruded_from = Some(source);

        if self.ranges.is_empty() {
            tracing::trace!("stroke extrusion produced no geometry");
            return Ok(false);
        }

        self.buffer
            .get_or_insert_with(|| GpuBuffer::new(provider, BufferType::Vertex))
            .upload(bytemuck::cast_slice(&self.vertices))
            .piet_err()?;

        Ok(true)
    }

    fn extrude_path(&mut self, path: &Path<P>, transform: Affine, half: f64, cap: LineCap) {
        let inner = path.inner();
        self.extrude_contour(inner.contour.points(), transform, half, cap);

        for sub in &inner.sub_paths {
            let child_transform = if transform == Affine::IDENTITY {
                sub.transform
            } else {
                transform * sub.transform
            };
            self.extrude_path(&sub.path, child_transform, half, cap);
        }
    }

    fn extrude_contour(&mut self, points: &[[f32; 2]], transform: Affine, half: f64, cap: LineCap) {
        if points.len() < 2 || half <= f64::EPSILON {
            return;
        }

        let world = |p: [f32; 2]| -> Point {
            let point = Point::new(p[0] as f64, p[1] as f64);
            if transform == Affine::IDENTITY {
                point
            } else {
                transform * point
            }
        };

        let start = self.vertices.len() as u32;
        let last = points.len() - 1;
        let mut direction = Vec2::new(1.0, 0.0);

        for i in 0..points.len() {
            let prev = world(points[i.saturating_sub(1)]);
            let next = world(points[i.min(last - 1) + 1]);
            let center = world(points[i]);

            let chord = next - prev;
            if chord.hypot2() > f64::EPSILON {
                direction = chord.normalize();
            }

            // Butt caps end flush with the contour; square and round caps extend the
            // endpoints by the half thickness (round is approximated by its extent).
            let center = match (i, cap) {
                (_, LineCap::Butt) => center,
                (0, _) => center - direction * half,
                (i, _) if i == last => center + direction * half,
                _ => center,
            };

            let normal = Vec2::new(-direction.y, direction.x) * half;
            self.push(center + normal);
            self.push(center - normal);
        }

        let count = self.vertices.len() as u32 - start;
        if count < 4 {
            // A strip this short has zero area; drop it rather than draw it.
            self.vertices.truncate(start as usize);
            return;
        }

        self.ranges.push(StrokeRange { start, count });
    }

    fn push(&mut self, point: Point) {
        self.vertices.push([point.x as f32, point.y as f32]);
    }

    #[cfg(test)]
    fn strip(&self) -> &[[f32; 2]] {
        &self.vertices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_util::RecordingProvider;

    fn extrude(path: &Path<RecordingProvider>, thickness: f64) -> ContourStroke<RecordingProvider> {
        let provider = Rc::new(RecordingProvider::new());
        let mut stroke = ContourStroke::new();
        stroke
            .update(&provider, path, thickness, LineCap::Butt, 5.0)
            .unwrap();
        stroke
    }

    #[test]
    fn horizontal_line_extrudes_symmetric_strip() {
        let path: Path<RecordingProvider> = Path::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));

        let stroke = extrude(&path, 2.0);
        assert_eq!(stroke.ranges(), &[StrokeRange { start: 0, count: 4 }]);
        assert_eq!(
            stroke.strip(),
            &[[0.0, 1.0], [0.0, -1.0], [10.0, 1.0], [10.0, -1.0]]
        );
    }

    #[test]
    fn empty_path_has_nothing_to_draw() {
        let path: Path<RecordingProvider> = Path::new();
        let provider = Rc::new(RecordingProvider::new());
        let mut stroke = ContourStroke::new();
        let drawn = stroke
            .update(&provider, &path, 4.0, LineCap::Butt, 5.0)
            .unwrap();
        assert!(!drawn);
        assert!(provider.live_buffers().is_empty());
    }

    #[test]
    fn sub_paths_get_distinct_ranges() {
        let a: Path<RecordingProvider> = Path::new();
        a.move_to((0.0, 0.0));
        a.line_to((10.0, 0.0));

        let b: Path<RecordingProvider> = Path::new();
        b.move_to((0.0, 5.0));
        b.line_to((10.0, 5.0));

        let container: Path<RecordingProvider> = Path::new();
        container.add_sub_path(&a, Affine::IDENTITY);
        container.add_sub_path(&b, Affine::translate((0.0, 10.0)));

        let stroke = extrude(&container, 2.0);
        assert_eq!(
            stroke.ranges(),
            &[
                StrokeRange { start: 0, count: 4 },
                StrokeRange { start: 4, count: 4 }
            ]
        );
    }

    #[test]
    fn extrusion_is_cached_until_path_changes() {
        let path: Path<RecordingProvider> = Path::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));

        let provider = Rc::new(RecordingProvider::new());
        let mut stroke = ContourStroke::new();
        stroke
            .update(&provider, &path, 2.0, LineCap::Butt, 5.0)
            .unwrap();
        let uploads = provider.upload_count();

        stroke
            .update(&provider, &path, 2.0, LineCap::Butt, 5.0)
            .unwrap();
        assert_eq!(provider.upload_count(), uploads);

        path.line_to((10.0, 10.0));
        stroke
            .update(&provider, &path, 2.0, LineCap::Butt, 5.0)
            .unwrap();
        assert_eq!(provider.upload_count(), uploads + 1);
    }
}
