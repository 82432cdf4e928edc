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

//! Images sourced from a texture atlas, drawn as quads or caller-supplied meshes.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use ahash::RandomState;
use hashbrown::HashMap;
use piet::kurbo::{Rect, Size};
use piet::Error as Pierror;

use crate::buffer::{BufferProvider, BufferType, GpuBuffer, Vertex};
use crate::ResultExt;

/// Where an image lives inside the executor's texture atlas.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AtlasRegion {
    /// Normalized texture coordinates of the region within the atlas.
    pub uv: Rect,

    /// The image's size in drawing units.
    pub size: Size,
}

/// A registry of named atlas regions.
///
/// The executor owns the actual texture; this side only needs to know where each
/// image's texels landed so quads can carry the right coordinates.
pub struct ImageAtlas {
    regions: HashMap<String, AtlasRegion, RandomState>,
}

impl fmt::Debug for ImageAtlas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAtlas")
            .field("regions", &self.regions.len())
            .finish()
    }
}

impl Default for ImageAtlas {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageAtlas {
    /// Create an empty atlas registry.
    pub fn new() -> Self {
        Self {
            regions: HashMap::with_hasher(RandomState::new()),
        }
    }

    /// Register (or replace) a named region.
    pub fn insert(&mut self, name: impl Into<String>, region: AtlasRegion) {
        self.regions.insert(name.into(), region);
    }

    /// Drop a named region.
    pub fn remove(&mut self, name: &str) -> Option<AtlasRegion> {
        self.regions.remove(name)
    }

    /// Look up a named region; a miss is logged, not an error.
    pub fn region(&self, name: &str) -> Option<AtlasRegion> {
        let region = self.regions.get(name).copied();
        if region.is_none() {
            tracing::warn!(name, "image not present in the atlas");
        }
        region
    }

    /// The number of registered regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether no regions are registered.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

struct ImageInner<P: BufferProvider + ?Sized> {
    region: AtlasRegion,
    vertices: Option<GpuBuffer<P>>,
    indices: Option<GpuBuffer<P>>,
    index_count: usize,

    /// Whether the buffers currently hold the plain quad for `region`.
    quad_current: bool,
}

/// A drawable image backed by an atlas region.
///
/// Cheaply clonable handle. Draws as a unit quad scaled to the region's size unless a
/// mesh has been uploaded through the renderer.
pub struct Image<P: BufferProvider + ?Sized>(Rc<RefCell<ImageInner<P>>>);

impl<P: BufferProvider + ?Sized> Clone for Image<P> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<P: BufferProvider + ?Sized> fmt::Debug for Image<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.0.borrow();
        f.debug_struct("Image")
            .field("region", &inner.region)
            .field("index_count", &inner.index_count)
            .finish_non_exhaustive()
    }
}

impl<P: BufferProvider + ?Sized> Image<P> {
    /// Create an image for an atlas region.
    pub fn new(region: AtlasRegion) -> Self {
        Self(Rc::new(RefCell::new(ImageInner {
            region,
            vertices: None,
            indices: None,
            index_count: 0,
            quad_current: false,
        })))
    }

    /// Create an image by name, if the atlas knows it.
    pub fn from_atlas(atlas: &ImageAtlas, name: &str) -> Option<Self> {
        atlas.region(name).map(Self::new)
    }

    /// Whether two handles refer to the same image.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The atlas region this image samples from.
    pub fn region(&self) -> AtlasRegion {
        self.0.borrow().region
    }

    /// Repoint this image at a different atlas region.
    pub fn set_region(&self, region: AtlasRegion) {
        let mut inner = self.0.borrow_mut();
        inner.region = region;
        inner.quad_current = false;
    }

    /// Whether the image has no renderable area.
    pub fn is_degenerate(&self) -> bool {
        let size = self.0.borrow().region.size;
        size.width <= 0.0 || size.height <= 0.0
    }

    /// Read access to the materialized quad or mesh, for the draw executor.
    pub fn geometry(&self) -> ImageGeometryRef<'_, P> {
        ImageGeometryRef(self.0.borrow())
    }

    /// Make sure the buffers hold the plain quad for the current region.
    pub(crate) fn ensure_quad(&self, provider: &Rc<P>) -> Result<(), Pierror> {
        let mut inner = self.0.borrow_mut();
        if inner.quad_current {
            return Ok(());
        }

        let AtlasRegion { uv, size } = inner.region;
        let (w, h) = (size.width as f32, size.height as f32);
        let (u0, v0) = (uv.x0 as f32, uv.y0 as f32);
        let (u1, v1) = (uv.x1 as f32, uv.y1 as f32);

        let vertices = [
            Vertex {
                pos: [0.0, 0.0],
                uv: [u0, v0],
            },
            Vertex {
                pos: [w, 0.0],
                uv: [u1, v0],
            },
            Vertex {
                pos: [w, h],
                uv: [u1, v1],
            },
            Vertex {
                pos: [0.0, h],
                uv: [u0, v1],
            },
        ];
        let indices: [u32; 6] = [0, 1, 2, 0, 2, 3];

        inner.upload(provider, &vertices, &indices)?;
        inner.quad_current = true;
        Ok(())
    }

    /// Replace the quad with a caller-supplied triangle mesh.
    pub(crate) fn upload_mesh(
        &self,
        provider: &Rc<P>,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<(), Pierror> {
        let mut inner = self.0.borrow_mut();
        inner.upload(provider, vertices, indices)?;
        inner.quad_current = false;
        Ok(())
    }
}

impl<P: BufferProvider + ?Sized> ImageInner<P> {
    fn upload(
        &mut self,
        provider: &Rc<P>,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<(), Pierror> {
        self.vertices
            .get_or_insert_with(|| GpuBuffer::new(provider, BufferType::Vertex))
            .upload(bytemuck::cast_slice(vertices))
            .piet_err()?;
        self.indices
            .get_or_insert_with(|| GpuBuffer::new(provider, BufferType::Index))
            .upload(bytemuck::cast_slice(indices))
            .piet_err()?;
        self.index_count = indices.len();
        Ok(())
    }
}

/// A borrow of an image's quad or mesh geometry.
pub struct ImageGeometryRef<'a, P: BufferProvider + ?Sized>(Ref<'a, ImageInner<P>>);

impl<P: BufferProvider + ?Sized> ImageGeometryRef<'_, P> {
    /// The interleaved position/uv vertex buffer handle, if materialized.
    pub fn vertices(&self) -> Option<&P::Buffer> {
        self.0.vertices.as_ref().and_then(GpuBuffer::resource)
    }

    /// The index buffer handle, if materialized.
    pub fn indices(&self) -> Option<&P::Buffer> {
        self.0.indices.as_ref().and_then(GpuBuffer::resource)
    }

    /// How many indices the draw should consume.
    pub fn index_count(&self) -> usize {
        self.0.index_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_util::RecordingProvider;

    fn region() -> AtlasRegion {
        AtlasRegion {
            uv: Rect::new(0.25, 0.25, 0.75, 0.5),
            size: Size::new(64.0, 32.0),
        }
    }

    #[test]
    fn atlas_miss_returns_none() {
        let mut atlas = ImageAtlas::new();
        atlas.insert("logo", region());

        assert!(atlas.region("logo").is_some());
        assert!(atlas.region("missing").is_none());
        assert!(Image::<RecordingProvider>::from_atlas(&atlas, "missing").is_none());
    }

    #[test]
    fn quad_uploads_once_until_region_changes() {
        let provider = Rc::new(RecordingProvider::new());
        let image = Image::new(region());

        image.ensure_quad(&provider).unwrap();
        image.ensure_quad(&provider).unwrap();
        // Vertex and index buffers, one upload each.
        assert_eq!(provider.upload_count(), 2);

        image.set_region(AtlasRegion {
            uv: Rect::new(0.0, 0.0, 1.0, 1.0),
            size: Size::new(16.0, 16.0),
        });
        image.ensure_quad(&provider).unwrap();
        assert_eq!(provider.upload_count(), 4);
    }

    #[test]
    fn mesh_replaces_quad_and_quad_comes_back() {
        let provider = Rc::new(RecordingProvider::new());
        let image = Image::new(region());

        image.ensure_quad(&provider).unwrap();
        assert_eq!(image.geometry().index_count(), 6);

        let mesh = [
            Vertex {
                pos: [0.0, 0.0],
                uv: [0.0, 0.0],
            },
            Vertex {
                pos: [10.0, 0.0],
                uv: [1.0, 0.0],
            },
            Vertex {
                pos: [0.0, 10.0],
                uv: [0.0, 1.0],
            },
        ];
        image.upload_mesh(&provider, &mesh, &[0, 1, 2]).unwrap();
        assert_eq!(image.geometry().index_count(), 3);

        // A later plain draw rebuilds the quad.
        image.ensure_quad(&provider).unwrap();
        assert_eq!(image.geometry().index_count(), 6);
    }

    #[test]
    fn zero_area_region_is_degenerate() {
        let image = Image::<RecordingProvider>::new(AtlasRegion {
            uv: Rect::new(0.0, 0.0, 1.0, 1.0),
            size: Size::new(0.0, 32.0),
        });
        assert!(image.is_degenerate());
    }
}
