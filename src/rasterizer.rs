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

//! The rasterization backend seam shared by the tessellation and stencil-to-cover
//! strategies.

use std::rc::Rc;

use piet::kurbo::Affine;
use piet::Error as Pierror;

use crate::buffer::BufferProvider;
use crate::path::Path;
use crate::renderer::DrawEvent;
use crate::stencil::StencilToCover;
use crate::tess::Tessellation;

/// The rasterization strategy a renderer uses for path fills.
///
/// Selected once at renderer construction; the two strategies produce different
/// geometry layouts and are never mixed within a renderer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Triangulate contours on the CPU with a polygon tessellator.
    #[default]
    Tessellation,

    /// Fill on the GPU with a two-pass stencil-then-cover technique, which handles
    /// self-intersecting shapes under either winding rule without CPU triangulation.
    StencilToCover,
}

/// Which kind of draw the backend is emitting events for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum DrawPass {
    /// An ordinary paint-visible fill.
    Fill,

    /// Materializing one layer of the active clip set.
    Clip,
}

/// One of the two interchangeable rasterization backends.
pub(crate) trait Rasterizer<P: BufferProvider + ?Sized> {
    /// Rebuild the path's GPU geometry if the path (or any sub-path) is dirty.
    fn prepare(&mut self, provider: &Rc<P>, path: &Path<P>, tolerance: f64)
        -> Result<(), Pierror>;

    /// Append the draw events that rasterize `path` under `transform`.
    fn draw(
        &mut self,
        path: &Path<P>,
        transform: Affine,
        pass: DrawPass,
        events: &mut Vec<DrawEvent<P>>,
    );

    /// Append whatever closes out one clip layer.
    ///
    /// The stencil-to-cover backend emits the shared full-screen cover quad here so
    /// covering happens once per clip layer rather than once per path.
    fn finish_clip_layer(&mut self, _events: &mut Vec<DrawEvent<P>>) {}
}

pub(crate) fn make_rasterizer<P: BufferProvider + ?Sized>(
    mode: RenderMode,
) -> Box<dyn Rasterizer<P>> {
    match mode {
        RenderMode::Tessellation => Box::new(Tessellation::new()),
        RenderMode::StencilToCover => Box::new(StencilToCover::new()),
    }
}
