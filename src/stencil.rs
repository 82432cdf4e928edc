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

//! The stencil-to-cover backend.
//!
//! Instead of triangulating on the CPU, each contour is drawn as a triangle fan into
//! the stencil buffer (the executor increments, decrements or toggles stencil values
//! according to the fill rule), and a second "cover" pass colors the pixels whose
//! stencil value says they are inside. This fills self-intersecting polygons
//! correctly under either winding rule.

use std::rc::Rc;

use piet::kurbo::Affine;
use piet::Error as Pierror;

use crate::buffer::{BufferProvider, BufferType, GpuBuffer};
use crate::path::{Path, PathGeometry, PathInner};
use crate::rasterizer::{DrawPass, Rasterizer};
use crate::renderer::DrawEvent;
use crate::ResultExt;

pub(crate) struct StencilToCover {
    /// Scratch for fan index generation.
    indices: Vec<u32>,
}

impl StencilToCover {
    pub(crate) fn new() -> Self {
        Self {
            indices: Vec::new(),
        }
    }

    fn prepare_leaf<P: BufferProvider + ?Sized>(
        &mut self,
        provider: &Rc<P>,
        inner: &mut PathInner<P>,
    ) -> Result<(), Pierror> {
        let points = inner.contour.points();
        if points.len() < 3 {
            inner.geometry.clear();
            return Ok(());
        }

        // Fan anchored at the first vertex, covering every consecutive pair.
        self.indices.clear();
        for i in 1..points.len() as u32 - 1 {
            self.indices.extend_from_slice(&[0, i, i + 1]);
        }

        let bounds = inner.contour.bounds();
        let cover = quad(bounds.x0, bounds.y0, bounds.x1, bounds.y1);

        let vertex_bytes: Vec<u8> = bytemuck::cast_slice(points).to_vec();

        // Invalidate the old fan first: a partial upload must never leave a
        // stale index count pointing at replaced buffers.
        inner.geometry.clear();
        if let Err(error) = upload_fan(
            provider,
            &mut inner.geometry,
            &vertex_bytes,
            &self.indices,
            &cover,
        ) {
            // Leave the path dirty so the next draw retries the upload.
            inner.dirty = true;
            return Err(error);
        }
        inner.geometry.index_count = self.indices.len();

        Ok(())
    }

    fn prepare_recursive<P: BufferProvider + ?Sized>(
        &mut self,
        provider: &Rc<P>,
        path: &Path<P>,
    ) -> Result<(), Pierror> {
        self.prepare_leaf(provider, &mut path.inner_mut())?;

        let children: Vec<Path<P>> = path
            .inner()
            .sub_paths
            .iter()
            .map(|sub| sub.path.clone())
            .collect();
        for child in children {
            self.prepare_recursive(provider, &child)?;
        }

        Ok(())
    }
}

impl<P: BufferProvider + ?Sized> Rasterizer<P> for StencilToCover {
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
        self.prepare_recursive(provider, path)
    }

    fn draw(
        &mut self,
        path: &Path<P>,
        transform: Affine,
        pass: DrawPass,
        events: &mut Vec<DrawEvent<P>>,
    ) {
        let (has_geometry, fill_rule) = {
            let inner = path.inner();
            (inner.geometry.index_count > 0, inner.fill_rule)
        };

        if has_geometry {
            events.push(DrawEvent::DrawStencil {
                path: path.clone(),
                transform,
                fill_rule,
            });

            // Clip layers share a single full-screen cover, emitted once per layer
            // by `finish_clip_layer`.
            if pass == DrawPass::Fill {
                events.push(DrawEvent::DrawCover {
                    path: Some(path.clone()),
                    transform,
                });
            }
        }

        // A container's stencil/cover is the concatenation of its sub-paths', in
        // document order, under composed transforms.
        let children: Vec<(Path<P>, Affine)> = path
            .inner()
            .sub_paths
            .iter()
            .map(|sub| {
                let child_transform = if transform == Affine::IDENTITY {
                    sub.transform
                } else {
                    transform * sub.transform
                };
                (sub.path.clone(), child_transform)
            })
            .collect();

        for (child, child_transform) in children {
            Rasterizer::<P>::draw(self, &child, child_transform, pass, events);
        }
    }

    fn finish_clip_layer(&mut self, events: &mut Vec<DrawEvent<P>>) {
        events.push(DrawEvent::DrawCover {
            path: None,
            transform: Affine::IDENTITY,
        });
    }
}

fn upload_fan<P: BufferProvider + ?Sized>(
    provider: &Rc<P>,
    geometry: &mut PathGeometry<P>,
    vertices: &[u8],
    indices: &[u32],
    cover: &[[f32; 2]],
) -> Result<(), Pierror> {
    geometry
        .vertices
        .get_or_insert_with(|| GpuBuffer::new(provider, BufferType::Vertex))
        .upload(vertices)
        .piet_err()?;
    geometry
        .indices
        .get_or_insert_with(|| GpuBuffer::new(provider, BufferType::Index))
        .upload(bytemuck::cast_slice(indices))
        .piet_err()?;
    geometry
        .cover
        .get_or_insert_with(|| GpuBuffer::new(provider, BufferType::Vertex))
        .upload(bytemuck::cast_slice(cover))
        .piet_err()?;
    Ok(())
}

fn quad(x0: f64, y0: f64, x1: f64, y1: f64) -> [[f32; 2]; 4] {
    // Triangle-strip order.
    [
        [x0 as f32, y0 as f32],
        [x1 as f32, y0 as f32],
        [x0 as f32, y1 as f32],
        [x1 as f32, y1 as f32],
    ]
}
