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

//! The buffer-provider boundary between the renderer core and the host GPU layer.

use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;

/// The kind of GPU buffer being requested.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BufferType {
    /// The buffer holds vertex data.
    Vertex,

    /// The buffer holds index data.
    Index,
}

/// An interleaved position/texture-coordinate vertex, used for image quads and meshes.
///
/// Path geometry is uploaded as bare `[f32; 2]` positions; paints are bound separately
/// through `SetPaint` events rather than baked into vertices.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Vertex {
    /// The position of the vertex.
    pub pos: [f32; 2],

    /// The coordinate of the vertex in the texture.
    pub uv: [f32; 2],
}

/// The host-supplied factory for GPU buffer resources.
///
/// The core never talks to the GPU itself; every piece of geometry it materializes goes
/// through this trait, and the resulting handles are what the external draw executor
/// binds when it replays the [`DrawEvent`] queue.
///
/// [`DrawEvent`]: crate::DrawEvent
pub trait BufferProvider {
    /// The type associated with a GPU buffer.
    type Buffer;

    /// The error type associated with this provider.
    type Error: StdError + 'static;

    /// Request a buffer holding `data`.
    ///
    /// `existing` is the handle returned by a previous request for the same slot, if any;
    /// the provider is free to reuse it, resize it in place, or replace it with a fresh
    /// handle. The returned handle supersedes `existing` either way.
    fn request_buffer(
        &self,
        existing: Option<Self::Buffer>,
        ty: BufferType,
        data: &[u8],
    ) -> Result<Self::Buffer, Self::Error>;

    /// Destroy a buffer.
    ///
    /// Called exactly once per live handle, when the owning path, paint or image is
    /// dropped.
    fn destroy_buffer(&self, buffer: Self::Buffer);
}

impl<P: BufferProvider + ?Sized> BufferProvider for &P {
    type Buffer = P::Buffer;
    type Error = P::Error;

    fn request_buffer(
        &self,
        existing: Option<Self::Buffer>,
        ty: BufferType,
        data: &[u8],
    ) -> Result<Self::Buffer, Self::Error> {
        (**self).request_buffer(existing, ty, data)
    }

    fn destroy_buffer(&self, buffer: Self::Buffer) {
        (**self).destroy_buffer(buffer)
    }
}

/// An owned GPU buffer slot.
///
/// Holds its own reference to the provider so that the underlying handle can be released
/// exactly once on drop, no matter which object ends up owning the slot.
pub(crate) struct GpuBuffer<P: BufferProvider + ?Sized> {
    provider: Rc<P>,
    ty: BufferType,
    resource: Option<P::Buffer>,
}

impl<P: BufferProvider + ?Sized> fmt::Debug for GpuBuffer<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("ty", &self.ty)
            .field("populated", &self.resource.is_some())
            .finish_non_exhaustive()
    }
}

impl<P: BufferProvider + ?Sized> Drop for GpuBuffer<P> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            self.provider.destroy_buffer(resource);
        }
    }
}

impl<P: BufferProvider + ?Sized> GpuBuffer<P> {
    /// Create an empty buffer slot.
    pub(crate) fn new(provider: &Rc<P>, ty: BufferType) -> Self {
        Self {
            provider: provider.clone(),
            ty,
            resource: None,
        }
    }

    /// Upload `data`, reusing or replacing the current handle.
    pub(crate) fn upload(&mut self, data: &[u8]) -> Result<(), P::Error> {
        let existing = self.resource.take();
        self.resource = Some(self.provider.request_buffer(existing, self.ty, data)?);
        Ok(())
    }

    /// Get the underlying handle, if the slot has been populated.
    pub(crate) fn resource(&self) -> Option<&P::Buffer> {
        self.resource.as_ref()
    }
}
