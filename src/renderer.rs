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

//! The renderer state machine: transform/clip stack, clip diffing and the
//! draw-event queue.

use std::fmt;
use std::rc::Rc;

use arrayvec::ArrayVec;
use piet::kurbo::Affine;
use piet::Error as Pierror;

use crate::buffer::{BufferProvider, Vertex};
use crate::contour::tolerance_for_quality;
use crate::image::Image;
use crate::paint::{BlendMode, RenderPaint};
use crate::path::{FillRule, Path};
use crate::rasterizer::{make_rasterizer, DrawPass, Rasterizer, RenderMode};

/// The most clip paths that can be active at once.
pub const MAX_CLIP_PATHS: usize = 16;

/// The most unmatched `save` calls that can be outstanding.
pub const MAX_SAVE_DEPTH: usize = 32;

/// A path clipping the scene, captured with the transform it was clipped under.
pub struct ClipPath<P: BufferProvider + ?Sized> {
    pub path: Path<P>,
    pub transform: Affine,
}

impl<P: BufferProvider + ?Sized> Clone for ClipPath<P> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            transform: self.transform,
        }
    }
}

impl<P: BufferProvider + ?Sized> ClipPath<P> {
    fn matches(&self, other: &Self) -> bool {
        self.path.ptr_eq(&other.path) && self.transform == other.transform
    }
}

type ClipList<P> = ArrayVec<ClipPath<P>, MAX_CLIP_PATHS>;

/// Snapshot taken by `save`, restored by `restore`.
struct ClipStackEntry<P: BufferProvider + ?Sized> {
    transform: Affine,
    clips: ClipList<P>,
}

/// What a `Draw` event rasterizes.
pub enum DrawTarget<P: BufferProvider + ?Sized> {
    /// A path's materialized fill geometry.
    Path(Path<P>),

    /// An image quad or mesh.
    Image {
        image: Image<P>,
        blend_mode: BlendMode,
        opacity: f32,
    },
}

/// One atomic instruction in the renderer's output queue.
///
/// The external draw executor iterates the queue in FIFO order once per frame and
/// binds the referenced geometry through the accessors on [`Path`], [`RenderPaint`]
/// and [`Image`].
pub enum DrawEvent<P: BufferProvider + ?Sized> {
    /// Bind a paint for the draws that follow.
    SetPaint { paint: RenderPaint<P> },

    /// Draw previously materialized triangle geometry.
    Draw {
        target: DrawTarget<P>,
        transform: Affine,
    },

    /// Stencil pass: rasterize the path's triangle fan into the stencil buffer,
    /// incrementing/decrementing (non-zero) or toggling (even-odd) stencil values.
    DrawStencil {
        path: Path<P>,
        transform: Affine,
        fill_rule: FillRule,
    },

    /// Cover pass: color the pixels the stencil pass marked as inside. `path` is
    /// the bounding quad to cover, or `None` for the shared full-screen quad used
    /// between clip layers.
    DrawCover {
        path: Option<Path<P>>,
        transform: Affine,
    },

    /// Draw a paint's extruded stroke strip for a path.
    DrawStroke {
        path: Path<P>,
        paint: RenderPaint<P>,
        transform: Affine,
    },

    /// The following draws, up to `ClippingEnd`, define the new clip set.
    ClippingBegin,

    /// The clip set is complete; `applied_clips` layers are now active.
    ClippingEnd { applied_clips: usize },

    /// The clip set is empty; clipping is off.
    ClippingDisable,
}

impl<P: BufferProvider + ?Sized> fmt::Debug for DrawEvent<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetPaint { .. } => f.write_str("SetPaint"),
            Self::Draw { .. } => f.write_str("Draw"),
            Self::DrawStencil { .. } => f.write_str("DrawStencil"),
            Self::DrawCover { .. } => f.write_str("DrawCover"),
            Self::DrawStroke { .. } => f.write_str("DrawStroke"),
            Self::ClippingBegin => f.write_str("ClippingBegin"),
            Self::ClippingEnd { applied_clips } => {
                write!(f, "ClippingEnd({applied_clips})")
            }
            Self::ClippingDisable => f.write_str("ClippingDisable"),
        }
    }
}

/// The retained-mode renderer.
///
/// Drawing calls do not touch the GPU; they mutate the transform/clip state and
/// append [`DrawEvent`]s that an external executor replays. All GPU geometry is
/// materialized through the [`BufferProvider`] installed at construction.
pub struct Renderer<P: BufferProvider + ?Sized> {
    provider: Rc<P>,
    rasterizer: Box<dyn Rasterizer<P>>,
    transform: Affine,
    clip_paths: ClipList<P>,
    applied_clips: ClipList<P>,
    clip_stack: ArrayVec<ClipStackEntry<P>, MAX_SAVE_DEPTH>,
    events: Vec<DrawEvent<P>>,
    bound_paint: Option<RenderPaint<P>>,
    clip_dirty: bool,
    tolerance: f64,
}

impl<P: BufferProvider + ?Sized> fmt::Debug for Renderer<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("transform", &self.transform)
            .field("clip_paths", &self.clip_paths.len())
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}

impl<P: BufferProvider> Renderer<P> {
    /// Create a renderer from a buffer provider, selecting the rasterization
    /// strategy it will use for the rest of its life.
    pub fn new(provider: P, mode: RenderMode) -> Self {
        Self::from_rc(Rc::new(provider), mode)
    }
}

impl<P: BufferProvider + ?Sized> Renderer<P> {
    /// Create a renderer from a shared buffer provider.
    pub fn from_rc(provider: Rc<P>, mode: RenderMode) -> Self {
        Self {
            provider,
            rasterizer: make_rasterizer(mode),
            transform: Affine::IDENTITY,
            clip_paths: ClipList::new(),
            applied_clips: ClipList::new(),
            clip_stack: ArrayVec::new(),
            events: Vec::new(),
            bound_paint: None,
            clip_dirty: false,
            tolerance: tolerance_for_quality(1.0),
        }
    }

    /// The provider geometry is materialized through.
    pub fn provider(&self) -> &Rc<P> {
        &self.provider
    }

    /// Set the contour quality knob, `0.0` (coarse) to `1.0` (fine).
    pub fn set_contour_quality(&mut self, quality: f64) {
        self.tolerance = tolerance_for_quality(quality);
    }

    /// Begin a new frame: discard last frame's draw events and applied-clip cache.
    ///
    /// The clip stack must already be balanced; an unmatched `save` from the
    /// previous frame is a contract bug.
    pub fn new_frame(&mut self) {
        debug_assert!(
            self.clip_stack.is_empty(),
            "unbalanced save/restore across frames ({} unmatched saves)",
            self.clip_stack.len()
        );

        self.events.clear();
        self.applied_clips.clear();
        self.bound_paint = None;
        self.clip_dirty = true;
    }

    /// Alias for [`new_frame`](Self::new_frame); discards an abandoned frame.
    pub fn reset(&mut self) {
        self.new_frame();
    }

    /// Push the current transform and active clip set.
    pub fn save(&mut self) {
        let entry = ClipStackEntry {
            transform: self.transform,
            clips: self.clip_paths.clone(),
        };
        if self.clip_stack.try_push(entry).is_err() {
            debug_assert!(false, "clip stack overflow (depth {MAX_SAVE_DEPTH})");
            tracing::error!("clip stack overflow; save ignored");
        }
    }

    /// Pop the most recent `save`, restoring its transform and clip set.
    pub fn restore(&mut self) -> Result<(), Pierror> {
        let entry = match self.clip_stack.pop() {
            Some(entry) => entry,
            None => {
                debug_assert!(false, "restore without a matching save");
                return Err(Pierror::StackUnbalance);
            }
        };

        self.transform = entry.transform;
        self.clip_paths = entry.clips;
        self.clip_dirty = true;
        Ok(())
    }

    /// Post-multiply the current transform.
    pub fn transform(&mut self, transform: Affine) {
        self.transform *= transform;
    }

    /// The current transform.
    pub fn current_transform(&self) -> Affine {
        self.transform
    }

    /// Add `path`, under the current transform, to the active clip set.
    pub fn clip_path(&mut self, path: &Path<P>) {
        let clip = ClipPath {
            path: path.clone(),
            transform: self.transform,
        };
        if self.clip_paths.try_push(clip).is_err() {
            debug_assert!(false, "too many active clip paths (max {MAX_CLIP_PATHS})");
            tracing::error!("too many active clip paths; clip ignored");
        }
        self.clip_dirty = true;
    }

    /// The active clip set.
    pub fn clips(&self) -> &[ClipPath<P>] {
        &self.clip_paths
    }

    /// Fill or stroke `path` with `paint` under the current transform.
    pub fn draw_path(&mut self, path: &Path<P>, paint: &RenderPaint<P>) -> Result<(), Pierror> {
        if !paint.is_visible() {
            return Ok(());
        }

        self.apply_clipping()?;
        self.bind_paint(paint);

        if paint.is_stroke() {
            if paint.update_stroke(&self.provider, path, self.tolerance)? {
                self.events.push(DrawEvent::DrawStroke {
                    path: path.clone(),
                    paint: paint.clone(),
                    transform: self.transform,
                });
            }
        } else {
            self.rasterizer.prepare(&self.provider, path, self.tolerance)?;
            self.rasterizer
                .draw(path, self.transform, DrawPass::Fill, &mut self.events);
        }

        Ok(())
    }

    /// Draw an image quad under the current transform.
    pub fn draw_image(
        &mut self,
        image: &Image<P>,
        blend_mode: BlendMode,
        opacity: f32,
    ) -> Result<(), Pierror> {
        if image.is_degenerate() {
            tracing::warn!("image has no renderable area; draw skipped");
            return Ok(());
        }

        self.apply_clipping()?;
        image.ensure_quad(&self.provider)?;
        self.events.push(DrawEvent::Draw {
            target: DrawTarget::Image {
                image: image.clone(),
                blend_mode,
                opacity,
            },
            transform: self.transform,
        });
        Ok(())
    }

    /// Draw an image warped over a caller-supplied triangle mesh.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_image_mesh(
        &mut self,
        image: &Image<P>,
        vertices: &[[f32; 2]],
        uvs: &[[f32; 2]],
        indices: &[u32],
        blend_mode: BlendMode,
        opacity: f32,
    ) -> Result<(), Pierror> {
        if indices.is_empty() || vertices.is_empty() || vertices.len() != uvs.len() {
            tracing::warn!(
                vertices = vertices.len(),
                uvs = uvs.len(),
                indices = indices.len(),
                "degenerate image mesh; draw skipped"
            );
            return Ok(());
        }

        self.apply_clipping()?;

        let interleaved: Vec<Vertex> = vertices
            .iter()
            .zip(uvs)
            .map(|(&pos, &uv)| Vertex { pos, uv })
            .collect();
        image.upload_mesh(&self.provider, &interleaved, indices)?;

        self.events.push(DrawEvent::Draw {
            target: DrawTarget::Image {
                image: image.clone(),
                blend_mode,
                opacity,
            },
            transform: self.transform,
        });
        Ok(())
    }

    /// The number of queued draw events.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// One queued draw event.
    pub fn event(&self, index: usize) -> Option<&DrawEvent<P>> {
        self.events.get(index)
    }

    /// The queued draw events, in FIFO order.
    pub fn events(&self) -> &[DrawEvent<P>] {
        &self.events
    }

    /// Emit a `SetPaint` only when the paint actually changes.
    fn bind_paint(&mut self, paint: &RenderPaint<P>) {
        if self
            .bound_paint
            .as_ref()
            .map_or(false, |bound| bound.ptr_eq(paint))
        {
            return;
        }

        self.bound_paint = Some(paint.clone());
        self.events.push(DrawEvent::SetPaint {
            paint: paint.clone(),
        });
    }

    /// Re-emit clip state if the active set differs from what the executor has
    /// already applied.
    fn apply_clipping(&mut self) -> Result<(), Pierror> {
        if !self.clip_dirty {
            return Ok(());
        }

        let unchanged = self.clip_paths.len() == self.applied_clips.len()
            && self
                .clip_paths
                .iter()
                .zip(&self.applied_clips)
                .all(|(active, applied)| active.matches(applied));

        if !unchanged {
            if self.clip_paths.is_empty() {
                self.events.push(DrawEvent::ClippingDisable);
            } else {
                // Remember where the clip run starts; a failed materialization
                // rolls the queue back to here and leaves the clip state dirty,
                // so the next draw retries the whole set rather than drawing
                // under a half-applied clip.
                let mark = self.events.len();
                self.events.push(DrawEvent::ClippingBegin);

                let clips = self.clip_paths.clone();
                for clip in &clips {
                    if let Err(error) =
                        self.rasterizer
                            .prepare(&self.provider, &clip.path, self.tolerance)
                    {
                        self.events.truncate(mark);
                        return Err(error);
                    }
                    self.rasterizer
                        .draw(&clip.path, clip.transform, DrawPass::Clip, &mut self.events);
                    self.rasterizer.finish_clip_layer(&mut self.events);
                }

                self.events.push(DrawEvent::ClippingEnd {
                    applied_clips: self.clip_paths.len(),
                });
            }
        }

        self.clip_dirty = false;
        self.applied_clips = self.clip_paths.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::AtlasRegion;
    use crate::paint::PaintStyle;
    use crate::tests_util::{FlakyProvider, RecordingProvider};

    use piet::kurbo::{Rect, Size};

    fn rect_path<P: BufferProvider + ?Sized>(x0: f64, y0: f64, x1: f64, y1: f64) -> Path<P> {
        let path = Path::new();
        path.move_to((x0, y0));
        path.line_to((x1, y0));
        path.line_to((x1, y1));
        path.line_to((x0, y1));
        path.close();
        path
    }

    fn renderer(mode: RenderMode) -> Renderer<RecordingProvider> {
        Renderer::new(RecordingProvider::new(), mode)
    }

    #[test]
    fn fill_emits_paint_then_draw() {
        let mut renderer = renderer(RenderMode::Tessellation);
        let path = rect_path(0.0, 0.0, 10.0, 10.0);
        let paint = RenderPaint::new();

        renderer.draw_path(&path, &paint).unwrap();

        let events = renderer.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], DrawEvent::SetPaint { .. }));
        assert!(matches!(
            events[1],
            DrawEvent::Draw {
                target: DrawTarget::Path(_),
                ..
            }
        ));
        assert!(path.geometry().index_count() > 0);
    }

    #[test]
    fn repeated_paint_binds_once() {
        let mut renderer = renderer(RenderMode::Tessellation);
        let a = rect_path(0.0, 0.0, 10.0, 10.0);
        let b = rect_path(20.0, 0.0, 30.0, 10.0);
        let paint = RenderPaint::new();

        renderer.draw_path(&a, &paint).unwrap();
        renderer.draw_path(&b, &paint).unwrap();

        let binds = renderer
            .events()
            .iter()
            .filter(|event| matches!(event, DrawEvent::SetPaint { .. }))
            .count();
        assert_eq!(binds, 1);
    }

    #[test]
    fn invisible_paint_draws_nothing() {
        let mut renderer = renderer(RenderMode::Tessellation);
        let path = rect_path(0.0, 0.0, 10.0, 10.0);
        let paint = RenderPaint::new();
        paint.color(0x00FFFFFF);

        renderer.draw_path(&path, &paint).unwrap();
        assert_eq!(renderer.event_count(), 0);
    }

    #[test]
    fn stroke_paint_emits_draw_stroke() {
        let mut renderer = renderer(RenderMode::Tessellation);
        let path: Path<RecordingProvider> = Path::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));

        let paint = RenderPaint::new();
        paint.style(PaintStyle::Stroke);
        paint.thickness(2.0);

        renderer.draw_path(&path, &paint).unwrap();

        assert!(matches!(
            renderer.events(),
            [DrawEvent::SetPaint { .. }, DrawEvent::DrawStroke { .. }]
        ));
        let geometry = paint.stroke_geometry().unwrap();
        assert_eq!(geometry.ranges().len(), 1);
        assert!(geometry.vertices().is_some());
    }

    #[test]
    fn restore_rewinds_the_clip_set() {
        let mut renderer = renderer(RenderMode::Tessellation);
        let a = rect_path(0.0, 0.0, 10.0, 10.0);
        let b = rect_path(5.0, 5.0, 15.0, 15.0);

        renderer.clip_path(&a);
        renderer.save();
        renderer.clip_path(&b);
        assert_eq!(renderer.clips().len(), 2);

        renderer.restore().unwrap();
        assert_eq!(renderer.clips().len(), 1);
        assert!(renderer.clips()[0].path.ptr_eq(&a));
    }

    #[test]
    fn clipping_is_emitted_lazily_and_once() {
        let mut renderer = renderer(RenderMode::Tessellation);
        let clip = rect_path(0.0, 0.0, 10.0, 10.0);
        let a = rect_path(1.0, 1.0, 5.0, 5.0);
        let b = rect_path(2.0, 2.0, 6.0, 6.0);
        let paint = RenderPaint::new();

        renderer.clip_path(&clip);
        // Clip state is materialized by the first draw, not by clip_path.
        assert_eq!(renderer.event_count(), 0);

        renderer.draw_path(&a, &paint).unwrap();
        renderer.draw_path(&b, &paint).unwrap();

        let begins = renderer
            .events()
            .iter()
            .filter(|event| matches!(event, DrawEvent::ClippingBegin))
            .count();
        assert_eq!(begins, 1);
        assert!(matches!(
            renderer.events().first(),
            Some(DrawEvent::ClippingBegin)
        ));
        assert!(renderer
            .events()
            .iter()
            .any(|event| matches!(event, DrawEvent::ClippingEnd { applied_clips: 1 })));
    }

    #[test]
    fn emptying_the_clip_set_disables_clipping() {
        let mut renderer = renderer(RenderMode::Tessellation);
        let clip = rect_path(0.0, 0.0, 10.0, 10.0);
        let path = rect_path(1.0, 1.0, 5.0, 5.0);
        let paint = RenderPaint::new();

        renderer.save();
        renderer.clip_path(&clip);
        renderer.draw_path(&path, &paint).unwrap();
        renderer.restore().unwrap();
        renderer.draw_path(&path, &paint).unwrap();

        assert!(renderer
            .events()
            .iter()
            .any(|event| matches!(event, DrawEvent::ClippingDisable)));
    }

    #[test]
    fn unchanged_paths_are_not_reuploaded() {
        let provider = Rc::new(RecordingProvider::new());
        let mut renderer = Renderer::from_rc(provider.clone(), RenderMode::Tessellation);
        let path = rect_path(0.0, 0.0, 10.0, 10.0);
        let paint = RenderPaint::new();

        renderer.draw_path(&path, &paint).unwrap();
        let uploads = provider.upload_count();
        assert!(uploads > 0);

        renderer.new_frame();
        renderer.draw_path(&path, &paint).unwrap();
        assert_eq!(provider.upload_count(), uploads);

        // A mutation re-flattens and re-uploads.
        path.line_to((3.0, 20.0));
        renderer.new_frame();
        renderer.draw_path(&path, &paint).unwrap();
        assert!(provider.upload_count() > uploads);
    }

    #[test]
    fn stencil_fill_emits_stencil_then_cover() {
        let mut renderer = renderer(RenderMode::StencilToCover);
        let path = rect_path(0.0, 0.0, 10.0, 10.0);
        let paint = RenderPaint::new();

        renderer.draw_path(&path, &paint).unwrap();

        assert!(matches!(
            renderer.events(),
            [
                DrawEvent::SetPaint { .. },
                DrawEvent::DrawStencil {
                    fill_rule: FillRule::NonZero,
                    ..
                },
                DrawEvent::DrawCover { path: Some(_), .. },
            ]
        ));
        let geometry = path.geometry();
        assert!(geometry.cover().is_some());
        // Four contour vertices (plus the closing repeat) fan into three triangles.
        assert_eq!(geometry.index_count(), 9);
    }

    #[test]
    fn stencil_clip_layers_share_a_full_screen_cover() {
        let mut renderer = renderer(RenderMode::StencilToCover);
        let clip = rect_path(0.0, 0.0, 10.0, 10.0);
        let path = rect_path(1.0, 1.0, 5.0, 5.0);
        let paint = RenderPaint::new();

        renderer.clip_path(&clip);
        renderer.draw_path(&path, &paint).unwrap();

        let events = renderer.events();
        assert!(matches!(events[0], DrawEvent::ClippingBegin));
        assert!(matches!(events[1], DrawEvent::DrawStencil { .. }));
        // The clip layer's cover is the shared full-screen quad, not the path's.
        assert!(matches!(events[2], DrawEvent::DrawCover { path: None, .. }));
        assert!(matches!(events[3], DrawEvent::ClippingEnd { applied_clips: 1 }));
    }

    #[test]
    fn image_draw_is_a_textured_quad() {
        let mut renderer = renderer(RenderMode::Tessellation);
        let image = Image::new(AtlasRegion {
            uv: Rect::new(0.0, 0.0, 1.0, 1.0),
            size: Size::new(32.0, 32.0),
        });

        renderer
            .draw_image(&image, BlendMode::Multiply, 0.5)
            .unwrap();

        assert!(matches!(
            renderer.events(),
            [DrawEvent::Draw {
                target: DrawTarget::Image {
                    blend_mode: BlendMode::Multiply,
                    ..
                },
                ..
            }]
        ));
        assert_eq!(image.geometry().index_count(), 6);
    }

    #[test]
    fn degenerate_image_mesh_is_skipped() {
        let mut renderer = renderer(RenderMode::Tessellation);
        let image = Image::new(AtlasRegion {
            uv: Rect::new(0.0, 0.0, 1.0, 1.0),
            size: Size::new(32.0, 32.0),
        });

        renderer
            .draw_image_mesh(&image, &[[0.0, 0.0]], &[], &[0], BlendMode::SrcOver, 1.0)
            .unwrap();
        assert_eq!(renderer.event_count(), 0);
    }

    #[test]
    fn buffers_are_destroyed_with_their_path() {
        let provider = Rc::new(RecordingProvider::new());
        let mut renderer = Renderer::from_rc(provider.clone(), RenderMode::Tessellation);
        let paint = RenderPaint::new();

        {
            let path = rect_path(0.0, 0.0, 10.0, 10.0);
            renderer.draw_path(&path, &paint).unwrap();
            renderer.new_frame();
            assert!(!provider.live_buffers().is_empty());
        }

        // The queue was cleared by new_frame, so dropping the path released the
        // last handle. RecordingProvider panics on a double destroy.
        assert!(provider.live_buffers().is_empty());
    }

    #[test]
    fn failed_clip_materialization_rolls_back() {
        let provider = Rc::new(FlakyProvider::fail_once_at(1));
        let mut renderer = Renderer::from_rc(provider, RenderMode::Tessellation);
        let clip = rect_path(0.0, 0.0, 10.0, 10.0);
        let path = rect_path(1.0, 1.0, 5.0, 5.0);
        let paint = RenderPaint::new();

        renderer.clip_path(&clip);
        assert!(renderer.draw_path(&path, &paint).is_err());

        // No half-applied clip run is left in the queue.
        assert_eq!(renderer.event_count(), 0);

        // The next draw retries the whole clip set and succeeds.
        renderer.draw_path(&path, &paint).unwrap();
        assert!(matches!(
            renderer.events().first(),
            Some(DrawEvent::ClippingBegin)
        ));
        assert!(renderer
            .events()
            .iter()
            .any(|event| matches!(event, DrawEvent::ClippingEnd { applied_clips: 1 })));
    }

    #[test]
    fn failed_index_upload_leaves_no_stale_mesh() {
        let provider = Rc::new(FlakyProvider::fail_once_at(2));
        let mut renderer = Renderer::from_rc(provider, RenderMode::Tessellation);
        let path = rect_path(0.0, 0.0, 10.0, 10.0);
        let paint = RenderPaint::new();

        // Vertices upload, indices fail: the path must not keep an index count
        // pointing at the mismatched buffers.
        assert!(renderer.draw_path(&path, &paint).is_err());
        assert_eq!(path.geometry().index_count(), 0);

        renderer.draw_path(&path, &paint).unwrap();
        assert!(path.geometry().index_count() > 0);
        assert!(path.geometry().indices().is_some());
    }

    #[test]
    fn failed_cover_upload_leaves_no_stale_fan() {
        let provider = Rc::new(FlakyProvider::fail_once_at(3));
        let mut renderer = Renderer::from_rc(provider, RenderMode::StencilToCover);
        let path = rect_path(0.0, 0.0, 10.0, 10.0);
        let paint = RenderPaint::new();

        assert!(renderer.draw_path(&path, &paint).is_err());
        assert_eq!(path.geometry().index_count(), 0);
        assert!(path.geometry().cover().is_none());

        renderer.draw_path(&path, &paint).unwrap();
        assert_eq!(path.geometry().index_count(), 9);
        assert!(path.geometry().cover().is_some());
    }

    #[test]
    #[should_panic(expected = "unbalanced save/restore")]
    fn new_frame_rejects_unbalanced_saves() {
        let mut renderer = renderer(RenderMode::Tessellation);
        renderer.save();
        renderer.new_frame();
    }

    #[test]
    #[should_panic(expected = "restore without a matching save")]
    fn restore_without_save_panics_in_debug() {
        let mut renderer = renderer(RenderMode::Tessellation);
        let _ = renderer.restore();
    }
}
