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

//! A retained-mode vector-path rendering core for hardware-accelerated backends.
//!
//! This crate turns paths, paints and images into GPU-ready geometry and a compact
//! queue of draw events, while leaving the actual GPU commands to the backend. To
//! use, implement the [`BufferProvider`] trait on a type that represents your GPU
//! context's buffer allocator, create a [`Renderer`] over it, and author scenes with
//! [`Path`] and [`RenderPaint`] handles. Each frame, replay [`Renderer::events`]
//! against your graphics API, fetching the geometry each event references through
//! the accessors on [`Path`], [`RenderPaint`] and [`Image`].
//!
//! Path fills are rasterized by one of two interchangeable strategies, chosen at
//! renderer construction via [`RenderMode`]: CPU triangulation with a polygon
//! tessellator, or a two-pass stencil-then-cover technique that fills
//! self-intersecting shapes on the GPU.
//!
//! Note that this crate generally uses thread-unsafe primitives. This is because UI
//! management is usually pinned to one thread anyways, and it's a bad idea to do
//! drawing outside of that thread.

#![forbid(unsafe_code, rust_2018_idioms)]

pub use piet;

use std::error::Error as StdError;
use std::fmt;

use piet::Error as Pierror;

mod buffer;
mod contour;
mod image;
mod paint;
mod path;
mod rasterizer;
mod renderer;
mod stencil;
mod stroke;
mod tess;

pub use self::buffer::{BufferProvider, BufferType, Vertex};
pub use self::contour::{tolerance_for_quality, MAX_TOLERANCE, MIN_TOLERANCE};
pub use self::image::{AtlasRegion, Image, ImageAtlas, ImageGeometryRef};
pub use self::paint::{
    BlendMode, Fill, FillType, GradientData, PaintStyle, RenderPaint, StrokeGeometryRef,
    MAX_GRADIENT_STOPS,
};
pub use self::path::{FillRule, Path, PathCommand, PathGeometryRef};
pub use self::rasterizer::RenderMode;
pub use self::renderer::{
    ClipPath, DrawEvent, DrawTarget, Renderer, MAX_CLIP_PATHS, MAX_SAVE_DEPTH,
};
pub use self::stroke::StrokeRange;

trait ResultExt<T, E: StdError + 'static> {
    fn piet_err(self) -> Result<T, Pierror>;
}

impl<T, E: StdError + 'static> ResultExt<T, E> for Result<T, E> {
    fn piet_err(self) -> Result<T, Pierror> {
        self.map_err(|e| Pierror::BackendError(Box::new(LibraryError(e))))
    }
}

struct LibraryError<E>(E);

impl<E: fmt::Debug> fmt::Debug for LibraryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl<E: fmt::Display> fmt::Display for LibraryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl<E: StdError> StdError for LibraryError<E> {}
