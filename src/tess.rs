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

//! The CPU tessellation backend, powered by `lyon_tessellation`.

use std::rc::Rc;

use lyon_tessellation::path::PathEvent;
use lyon_tessellation::{
    BuffersBuilder, FillOptions, FillRule as LyonFillRule, FillTessellator, FillVertex,
    VertexBuffers,
};

use piet::kurbo::{Affine, Point};
use piet::Error as Pierror;

use crate::buffer::{BufferProvider, BufferType, GpuBuffer};
use crate::path::{FillRule, Path, PathGeometry, PathInner};
use crate::rasterizer::{DrawPass, Rasterizer};
use crate::renderer::{DrawEvent, DrawTarget};
use crate::ResultExt;

/// Rasterizes paths by triangulating their contours on the CPU.
///
/// The tessellator and its scratch buffers are reused across paths; the resulting
/// mesh is uploaded into the path's own buffer slots.
pub(crate) struct Tessellation {
    tessellator: FillTessellator,
    buffers: VertexBuffers<[f32; 2], u32>,
}

impl Tessellation {
    pub(crate) fn new() -> Self {
        Self {
            tessellator: FillTessellator::new(),
            buffers: VertexBuffers::new(),
        }
    }
}

impl<P: BufferProvider + ?Sized> Rasterizer<P> for Tessellation {
    fn prepare(
        &mut self,
        provider: &Rc<P>,
        path: &Path<P>,
        tolerance: f64,
    ) -> Result<(), Pierror> {
        if !path.any_dirty() {
            return Ok(());
        }

        path.update_contours(tolerance);

        self.buffers.vertices.clear();
        self.buffers.indices.clear();

        let mut events = Vec::new();
        collect_contour_events(&path.inner(), Affine::IDENTITY, &mut events);

        let mut inner = path.inner_mut();

        let mut options = FillOptions::default();
        options.fill_rule = convert_fill_rule(inner.fill_rule);
        options.tolerance = tolerance as f32;

        let result = self.tessellator.tessellate(
            events,
            &options,
            &mut BuffersBuilder::new(&mut self.buffers, |vertex: FillVertex<'_>| {
                let position = vertex.position();
                [position.x, position.y]
            }),
        );

        if let Err(error) = result {
            // A failed tessellation is an empty draw, not an error.
            tracing::warn!(%error, "tessellation failed; path contributes no geometry");
            inner.geometry.clear();
            return Ok(());
        }

        if self.buffers.indices.is_empty() {
            inner.geometry.clear();
            return Ok(());
        }

        // Invalidate the old mesh first: a partial upload must never leave a
        // stale index count pointing at a replaced vertex buffer.
        inner.geometry.clear();
        if let Err(error) = upload_mesh(provider, &mut inner.geometry, &self.buffers) {
            // Leave the path dirty so the next draw retries the upload.
            inner.dirty = true;
            return Err(error);
        }
        inner.geometry.index_count = self.buffers.indices.len();

        Ok(())
    }

    fn draw(
        &mut self,
        path: &Path<P>,
        transform: Affine,
        _pass: DrawPass,
        events: &mut Vec<DrawEvent<P>>,
    ) {
        if path.inner().geometry.index_count == 0 {
            return;
        }

        events.push(DrawEvent::Draw {
            target: DrawTarget::Path(path.clone()),
            transform,
        });
    }
}

fn upload_mesh<P: BufferProvider + ?Sized>(
    provider: &Rc<P>,
    geometry: &mut PathGeometry<P>,
    buffers: &VertexBuffers<[f32; 2], u32>,
) -> Result<(), Pierror> {
    geometry
        .vertices
        .get_or_insert_with(|| GpuBuffer::new(provider, BufferType::Vertex))
        .upload(bytemuck::cast_slice(&buffers.vertices))
        .piet_err()?;
    geometry
        .indices
        .get_or_insert_with(|| GpuBuffer::new(provider, BufferType::Index))
        .upload(bytemuck::cast_slice(&buffers.indices))
        .piet_err()?;
    Ok(())
}

fn convert_fill_rule(rule: FillRule) -> LyonFillRule {
    match rule {
        FillRule::NonZero => LyonFillRule::NonZero,
        FillRule::EvenOdd => LyonFillRule::EvenOdd,
    }
}

/// Gather the closed contour outlines of a path and all of its sub-paths, each
/// transformed by the accumulated affine transform.
fn collect_contour_events<P: BufferProvider + ?Sized>(
    inner: &PathInner<P>,
    transform: Affine,
    events: &mut Vec<PathEvent>,
) {
    push_contour(inner.contour.points(), transform, events);

    for sub in &inner.sub_paths {
        // Skip the multiply entirely for identity transforms.
        let child_transform = if transform == Affine::IDENTITY {
            sub.transform
        } else {
            transform * sub.transform
        };
        collect_contour_events(&sub.path.inner(), child_transform, events);
    }
}

fn push_contour(points: &[[f32; 2]], transform: Affine, events: &mut Vec<PathEvent>) {
    if points.len() < 3 {
        return;
    }

    let convert = |p: [f32; 2]| -> lyon_tessellation::path::geom::Point<f32> {
        if transform == Affine::IDENTITY {
            p.into()
        } else {
            let world = transform * Point::new(p[0] as f64, p[1] as f64);
            [world.x as f32, world.y as f32].into()
        }
    };

    let first = convert(points[0]);
    events.push(PathEvent::Begin { at: first });

    let mut last = first;
    for &point in &points[1..] {
        let to = convert(point);
        events.push(PathEvent::Line { from: last, to });
        last = to;
    }

    events.push(PathEvent::End {
        last,
        first,
        close: true,
    });
}
