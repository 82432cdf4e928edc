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

//! Paths: authored command lists, flattened contours and their GPU geometry.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use piet::kurbo::{Affine, Point, Rect};

use crate::buffer::{BufferProvider, GpuBuffer};
use crate::contour::Contour;

/// The winding-number test that decides a path's interior.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum FillRule {
    /// A point is inside if its winding number is non-zero.
    #[default]
    NonZero,

    /// A point is inside if its winding number is odd.
    EvenOdd,
}

/// One authored path command.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PathCommand {
    /// Lift the pen and move it to the point.
    MoveTo(Point),

    /// Draw a straight line to the point.
    LineTo(Point),

    /// Draw a cubic Bézier: out handle, in handle, end point.
    CubicTo(Point, Point, Point),

    /// Close the current sub-contour back to its starting point.
    Close,
}

/// A path contained in another path, with its own local transform.
pub(crate) struct SubPath<P: BufferProvider + ?Sized> {
    pub(crate) path: Path<P>,
    pub(crate) transform: Affine,
}

/// GPU geometry materialized for a path by the selected backend.
///
/// The tessellation backend fills `vertices`/`indices` with a triangle mesh; the
/// stencil-to-cover backend fills `vertices` with the raw contour, `indices` with a
/// triangle fan and `cover` with a four-vertex bounding quad (drawn as a strip).
pub(crate) struct PathGeometry<P: BufferProvider + ?Sized> {
    pub(crate) vertices: Option<GpuBuffer<P>>,
    pub(crate) indices: Option<GpuBuffer<P>>,
    pub(crate) cover: Option<GpuBuffer<P>>,
    pub(crate) index_count: usize,
}

impl<P: BufferProvider + ?Sized> PathGeometry<P> {
    fn new() -> Self {
        Self {
            vertices: None,
            indices: None,
            cover: None,
            index_count: 0,
        }
    }

    /// Drop the indices so the path contributes an empty draw.
    ///
    /// Buffer handles are kept so the provider can reuse them on the next rebuild.
    pub(crate) fn clear(&mut self) {
        self.index_count = 0;
    }
}

pub(crate) struct PathInner<P: BufferProvider + ?Sized> {
    pub(crate) commands: Vec<PathCommand>,
    pub(crate) fill_rule: FillRule,
    pub(crate) sub_paths: Vec<SubPath<P>>,
    pub(crate) contour: Contour,
    pub(crate) geometry: PathGeometry<P>,

    /// Set on every mutation; cleared once the contour has been recomputed.
    pub(crate) dirty: bool,

    /// Bumped on every mutation, so dependents (stroke extrusions) can tell
    /// whether their cached output is still current.
    pub(crate) version: u64,
}

/// A mutable vector path.
///
/// Cheaply clonable handle; clones refer to the same path, and clip diffing uses that
/// identity. Created empty, mutated through the authoring calls, flattened and uploaded
/// lazily the first time a renderer draws it after a mutation.
pub struct Path<P: BufferProvider + ?Sized>(Rc<RefCell<PathInner<P>>>);

impl<P: BufferProvider + ?Sized> Clone for Path<P> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<P: BufferProvider + ?Sized> fmt::Debug for Path<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.0.borrow();
        f.debug_struct("Path")
            .field("commands", &inner.commands.len())
            .field("sub_paths", &inner.sub_paths.len())
            .field("fill_rule", &inner.fill_rule)
            .field("dirty", &inner.dirty)
            .finish_non_exhaustive()
    }
}

impl<P: BufferProvider + ?Sized> Default for Path<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: BufferProvider + ?Sized> Path<P> {
    /// Create a new, empty path.
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(PathInner {
            commands: Vec::new(),
            fill_rule: FillRule::default(),
            sub_paths: Vec::new(),
            contour: Contour::new(),
            geometry: PathGeometry::new(),
            dirty: false,
            version: 0,
        })))
    }

    /// Whether two handles refer to the same path.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Lift the pen and move it to the point.
    pub fn move_to(&self, to: impl Into<Point>) {
        self.push(PathCommand::MoveTo(to.into()));
    }

    /// Draw a straight line to the point.
    pub fn line_to(&self, to: impl Into<Point>) {
        self.push(PathCommand::LineTo(to.into()));
    }

    /// Draw a cubic Bézier through the two control handles to the end point.
    pub fn cubic_to(
        &self,
        out_handle: impl Into<Point>,
        in_handle: impl Into<Point>,
        to: impl Into<Point>,
    ) {
        self.push(PathCommand::CubicTo(
            out_handle.into(),
            in_handle.into(),
            to.into(),
        ));
    }

    /// Close the current sub-contour.
    pub fn close(&self) {
        self.push(PathCommand::Close);
    }

    /// Set the fill rule used when rasterizing this path.
    pub fn fill_rule(&self, rule: FillRule) {
        let mut inner = self.0.borrow_mut();
        inner.fill_rule = rule;
        mark_dirty(&mut inner);
    }

    /// Add `path` as a sub-path with a local transform.
    ///
    /// The child is referenced, not copied; mutating it later dirties this path too.
    /// Containment must stay acyclic; the recursive walks over sub-paths assume it.
    pub fn add_sub_path(&self, path: &Path<P>, transform: Affine) {
        debug_assert!(
            !path.reaches(self),
            "adding this sub-path would create a cycle"
        );

        let mut inner = self.0.borrow_mut();
        inner.sub_paths.push(SubPath {
            path: path.clone(),
            transform,
        });
        mark_dirty(&mut inner);
    }

    /// Remove every command and sub-path.
    pub fn clear(&self) {
        let mut inner = self.0.borrow_mut();
        inner.commands.clear();
        inner.sub_paths.clear();
        mark_dirty(&mut inner);
    }

    /// The flattened bounding box of this path's own contour.
    pub fn bounds(&self) -> Rect {
        self.0.borrow().contour.bounds()
    }

    /// Read access to the materialized GPU geometry, for the draw executor.
    pub fn geometry(&self) -> PathGeometryRef<'_, P> {
        PathGeometryRef(self.0.borrow())
    }

    fn push(&self, command: PathCommand) {
        let mut inner = self.0.borrow_mut();
        inner.commands.push(command);
        mark_dirty(&mut inner);
    }

    pub(crate) fn inner(&self) -> Ref<'_, PathInner<P>> {
        self.0.borrow()
    }

    pub(crate) fn inner_mut(&self) -> RefMut<'_, PathInner<P>> {
        self.0.borrow_mut()
    }

    /// Whether `target` is this path or reachable through its sub-paths.
    fn reaches(&self, target: &Path<P>) -> bool {
        self.ptr_eq(target)
            || self
                .inner()
                .sub_paths
                .iter()
                .any(|sub| sub.path.reaches(target))
    }

    /// Whether this path or any contained sub-path has pending mutations.
    pub(crate) fn any_dirty(&self) -> bool {
        let inner = self.0.borrow();
        inner.dirty || inner.sub_paths.iter().any(|sub| sub.path.any_dirty())
    }

    pub(crate) fn version(&self) -> u64 {
        self.0.borrow().version
    }

    pub(crate) fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Recompute the contour of this path and every sub-path that is dirty.
    pub(crate) fn update_contours(&self, tolerance: f64) {
        let mut inner = self.0.borrow_mut();
        if inner.dirty {
            inner.contour.clear();
            let PathInner {
                contour, commands, ..
            } = &mut *inner;
            contour.compute(commands, tolerance);
            inner.dirty = false;
        }

        // Recurse without holding the borrow; sub-paths are shared handles.
        let children: Vec<Path<P>> = inner.sub_paths.iter().map(|sub| sub.path.clone()).collect();
        drop(inner);

        for child in children {
            child.update_contours(tolerance);
        }
    }
}

fn mark_dirty<P: BufferProvider + ?Sized>(inner: &mut PathInner<P>) {
    inner.dirty = true;
    inner.version = inner.version.wrapping_add(1);
}

/// A borrow of a path's GPU geometry.
pub struct PathGeometryRef<'a, P: BufferProvider + ?Sized>(Ref<'a, PathInner<P>>);

impl<P: BufferProvider + ?Sized> PathGeometryRef<'_, P> {
    /// The vertex buffer handle, if materialized.
    pub fn vertices(&self) -> Option<&P::Buffer> {
        self.0.geometry.vertices.as_ref().and_then(GpuBuffer::resource)
    }

    /// The index buffer handle, if materialized.
    pub fn indices(&self) -> Option<&P::Buffer> {
        self.0.geometry.indices.as_ref().and_then(GpuBuffer::resource)
    }

    /// The cover-quad vertex buffer handle (stencil-to-cover backend only).
    pub fn cover(&self) -> Option<&P::Buffer> {
        self.0.geometry.cover.as_ref().and_then(GpuBuffer::resource)
    }

    /// How many indices the draw should consume.
    pub fn index_count(&self) -> usize {
        self.0.geometry.index_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_util::RecordingProvider;

    #[test]
    #[should_panic(expected = "cycle")]
    fn self_containment_is_rejected() {
        let path: Path<RecordingProvider> = Path::new();
        path.add_sub_path(&path.clone(), Affine::IDENTITY);
    }

    #[test]
    #[should_panic(expected = "cycle")]
    fn indirect_cycles_are_rejected() {
        let a: Path<RecordingProvider> = Path::new();
        let b: Path<RecordingProvider> = Path::new();

        a.add_sub_path(&b, Affine::IDENTITY);
        b.add_sub_path(&a, Affine::IDENTITY);
    }

    #[test]
    fn sub_path_mutations_dirty_the_container() {
        let a: Path<RecordingProvider> = Path::new();
        let b: Path<RecordingProvider> = Path::new();
        a.add_sub_path(&b, Affine::IDENTITY);
        a.update_contours(5.0);
        assert!(!a.any_dirty());

        b.line_to((1.0, 1.0));
        assert!(a.any_dirty());
    }
}
