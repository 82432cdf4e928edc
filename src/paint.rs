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

//! The paint model: solid and gradient fills, stroke parameters, blend modes.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use arrayvec::ArrayVec;
use piet::kurbo::{Point, Vec2};
use piet::{Color, Error as Pierror, GradientStop, LineCap, LineJoin};

use crate::buffer::BufferProvider;
use crate::path::Path;
use crate::stroke::{ContourStroke, StrokeRange};

/// The most gradient stops a baked paint can carry.
pub const MAX_GRADIENT_STOPS: usize = 16;

/// Whether a paint fills the path interior or strokes its outline.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PaintStyle {
    #[default]
    Fill,
    Stroke,
}

/// The fill-type tag of a baked paint.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FillType {
    Solid,
    Linear,
    Radial,
}

/// How a draw is composited over the destination.
///
/// Accepted and forwarded to the draw executor uninterpreted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    SrcOver,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Multiply,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

/// A gradient baked by `complete_gradient`.
///
/// Stops are stored in insertion order as unpacked RGBA floats. For linear gradients
/// `start`/`end` are the gradient axis; for radial gradients `start` is the center and
/// `end` is `center + (radius, 0)`.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientData {
    pub fill_type: FillType,
    pub colors: ArrayVec<[f32; 4], MAX_GRADIENT_STOPS>,
    pub offsets: ArrayVec<f32, MAX_GRADIENT_STOPS>,
    pub start: Point,
    pub end: Point,
}

impl GradientData {
    /// The number of baked stops.
    pub fn stop_count(&self) -> usize {
        self.colors.len()
    }
}

/// The active fill of a paint.
#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    Solid(Color),
    Gradient(GradientData),
}

impl Fill {
    fn is_visible(&self) -> bool {
        match self {
            Fill::Solid(color) => color.as_rgba().3 > 0.0,
            Fill::Gradient(gradient) => gradient.colors.iter().any(|rgba| rgba[3] > 0.0),
        }
    }
}

/// Gradient state under construction, between `linear_gradient`/`radial_gradient`
/// and `complete_gradient`.
struct GradientBuilder {
    fill_type: FillType,
    start: Point,
    end: Point,
    stops: Vec<GradientStop>,
}

pub(crate) struct PaintInner<P: BufferProvider + ?Sized> {
    pub(crate) fill: Fill,
    pub(crate) style: PaintStyle,
    pub(crate) blend_mode: BlendMode,
    pub(crate) thickness: f64,
    pub(crate) join: LineJoin,
    pub(crate) cap: LineCap,
    pub(crate) stroke: Option<ContourStroke<P>>,
    builder: Option<GradientBuilder>,
}

/// A paint: one active fill plus independent stroke sub-state.
///
/// Cheaply clonable handle; the renderer de-duplicates `SetPaint` events by handle
/// identity.
pub struct RenderPaint<P: BufferProvider + ?Sized>(Rc<RefCell<PaintInner<P>>>);

impl<P: BufferProvider + ?Sized> Clone for RenderPaint<P> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<P: BufferProvider + ?Sized> fmt::Debug for RenderPaint<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.0.borrow();
        f.debug_struct("RenderPaint")
            .field("fill", &inner.fill)
            .field("style", &inner.style)
            .field("blend_mode", &inner.blend_mode)
            .finish_non_exhaustive()
    }
}

impl<P: BufferProvider + ?Sized> Default for RenderPaint<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: BufferProvider + ?Sized> RenderPaint<P> {
    /// Create a new paint: opaque black fill, source-over blending.
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(PaintInner {
            fill: Fill::Solid(Color::BLACK),
            style: PaintStyle::default(),
            blend_mode: BlendMode::default(),
            thickness: 1.0,
            join: LineJoin::Miter { limit: 10.0 },
            cap: LineCap::Butt,
            stroke: None,
            builder: None,
        })))
    }

    /// Whether two handles refer to the same paint.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Set a solid fill from a packed `0xAARRGGBB` color.
    ///
    /// Like every fill call, the most recent one wins; an unfinished gradient builder
    /// is discarded.
    pub fn color(&self, argb: u32) {
        let mut inner = self.0.borrow_mut();
        inner.builder = None;
        inner.fill = Fill::Solid(unpack_argb(argb));
    }

    /// Start building a linear gradient along the given axis.
    pub fn linear_gradient(&self, sx: f64, sy: f64, ex: f64, ey: f64) {
        self.0.borrow_mut().builder = Some(GradientBuilder {
            fill_type: FillType::Linear,
            start: Point::new(sx, sy),
            end: Point::new(ex, ey),
            stops: Vec::new(),
        });
    }

    /// Start building a radial gradient around a center and radius.
    pub fn radial_gradient(&self, cx: f64, cy: f64, radius: f64) {
        let center = Point::new(cx, cy);
        self.0.borrow_mut().builder = Some(GradientBuilder {
            fill_type: FillType::Radial,
            start: center,
            end: center + Vec2::new(radius, 0.0),
            stops: Vec::new(),
        });
    }

    /// Append a stop to the gradient under construction.
    ///
    /// Stops must be appended in non-decreasing offset order; they are baked exactly
    /// as given, never sorted.
    pub fn add_stop(&self, argb: u32, offset: f32) {
        let mut inner = self.0.borrow_mut();
        match inner.builder.as_mut() {
            Some(builder) => {
                debug_assert!(
                    builder.stops.last().map_or(true, |last| last.pos <= offset),
                    "gradient stops must be added in non-decreasing offset order"
                );
                builder.stops.push(GradientStop {
                    pos: offset,
                    color: unpack_argb(argb),
                });
            }
            None => tracing::warn!("add_stop called outside of gradient construction"),
        }
    }

    /// Bake the gradient under construction into the paint's fill.
    pub fn complete_gradient(&self) {
        let mut inner = self.0.borrow_mut();
        let builder = match inner.builder.take() {
            Some(builder) => builder,
            None => {
                tracing::warn!("complete_gradient called outside of gradient construction");
                return;
            }
        };

        if builder.stops.len() > MAX_GRADIENT_STOPS {
            tracing::warn!(
                dropped = builder.stops.len() - MAX_GRADIENT_STOPS,
                "gradient stop count exceeds the maximum; extra stops dropped"
            );
        }

        let mut colors = ArrayVec::new();
        let mut offsets = ArrayVec::new();
        for stop in builder.stops.into_iter().take(MAX_GRADIENT_STOPS) {
            let (r, g, b, a) = stop.color.as_rgba();
            colors.push([r as f32, g as f32, b as f32, a as f32]);
            offsets.push(stop.pos);
        }

        inner.fill = Fill::Gradient(GradientData {
            fill_type: builder.fill_type,
            colors,
            offsets,
            start: builder.start,
            end: builder.end,
        });
    }

    /// Switch between filling and stroking.
    ///
    /// Entering stroke style allocates the stroke extruder.
    pub fn style(&self, style: PaintStyle) {
        let mut inner = self.0.borrow_mut();
        inner.style = style;
        if style == PaintStyle::Stroke && inner.stroke.is_none() {
            inner.stroke = Some(ContourStroke::new());
        }
    }

    /// Set the stroke thickness.
    pub fn thickness(&self, thickness: f64) {
        let mut inner = self.0.borrow_mut();
        inner.thickness = thickness;
        if let Some(stroke) = inner.stroke.as_mut() {
            stroke.mark_dirty();
        }
    }

    /// Set the stroke join.
    ///
    /// The extruder approximates every join with the averaged-chord normal at the
    /// shared vertex; the recorded join is exposed through
    /// [`stroke_join`](Self::stroke_join) for executors that sharpen corners
    /// themselves.
    pub fn join(&self, join: LineJoin) {
        let mut inner = self.0.borrow_mut();
        inner.join = join;
        if let Some(stroke) = inner.stroke.as_mut() {
            stroke.mark_dirty();
        }
    }

    /// Set the stroke cap.
    pub fn cap(&self, cap: LineCap) {
        let mut inner = self.0.borrow_mut();
        inner.cap = cap;
        if let Some(stroke) = inner.stroke.as_mut() {
            stroke.mark_dirty();
        }
    }

    /// Set the blend mode.
    pub fn blend_mode(&self, blend_mode: BlendMode) {
        self.0.borrow_mut().blend_mode = blend_mode;
    }

    /// Whether drawing with this paint can produce any visible pixels.
    pub fn is_visible(&self) -> bool {
        self.0.borrow().fill.is_visible()
    }

    /// The active fill.
    pub fn fill(&self) -> Fill {
        self.0.borrow().fill.clone()
    }

    /// The current paint style.
    pub fn paint_style(&self) -> PaintStyle {
        self.0.borrow().style
    }

    /// The current blend mode.
    pub fn blend(&self) -> BlendMode {
        self.0.borrow().blend_mode
    }

    /// The current stroke thickness.
    pub fn stroke_thickness(&self) -> f64 {
        self.0.borrow().thickness
    }

    /// The current stroke join.
    pub fn stroke_join(&self) -> LineJoin {
        self.0.borrow().join
    }

    /// The current stroke cap.
    pub fn stroke_cap(&self) -> LineCap {
        self.0.borrow().cap
    }

    /// Read access to the extruded stroke strip, for the draw executor.
    pub fn stroke_geometry(&self) -> Option<StrokeGeometryRef<'_, P>> {
        let inner = self.0.borrow();
        if inner.stroke.is_some() {
            Some(StrokeGeometryRef(inner))
        } else {
            None
        }
    }

    pub(crate) fn is_stroke(&self) -> bool {
        self.0.borrow().style == PaintStyle::Stroke
    }

    /// Re-extrude this paint's stroke for `path` if needed.
    ///
    /// Returns `false` when the strip is degenerate and the draw should be skipped.
    pub(crate) fn update_stroke(
        &self,
        provider: &Rc<P>,
        path: &Path<P>,
        tolerance: f64,
    ) -> Result<bool, Pierror> {
        let mut inner = self.0.borrow_mut();
        let PaintInner {
            stroke,
            thickness,
            cap,
            ..
        } = &mut *inner;

        match stroke.as_mut() {
            Some(stroke) => stroke.update(provider, path, *thickness, *cap, tolerance),
            None => Ok(false),
        }
    }
}

/// A borrow of a paint's stroke geometry.
pub struct StrokeGeometryRef<'a, P: BufferProvider + ?Sized>(Ref<'a, PaintInner<P>>);

impl<P: BufferProvider + ?Sized> StrokeGeometryRef<'_, P> {
    /// The strip vertex buffer handle, if materialized.
    pub fn vertices(&self) -> Option<&P::Buffer> {
        self.0.stroke.as_ref().and_then(ContourStroke::resource)
    }

    /// The per-sub-path strip ranges.
    pub fn ranges(&self) -> &[StrokeRange] {
        self.0.stroke.as_ref().map_or(&[], ContourStroke::ranges)
    }
}

fn unpack_argb(argb: u32) -> Color {
    Color::rgba8(
        (argb >> 16) as u8,
        (argb >> 8) as u8,
        argb as u8,
        (argb >> 24) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_util::RecordingProvider;

    type Paint = RenderPaint<RecordingProvider>;

    #[test]
    fn solid_alpha_zero_is_invisible() {
        let paint = Paint::new();
        paint.color(0x00FF00FF);
        assert!(!paint.is_visible());

        paint.color(0x80FF00FF);
        assert!(paint.is_visible());
    }

    #[test]
    fn gradient_with_an_opaque_stop_is_visible() {
        let paint = Paint::new();
        paint.linear_gradient(0.0, 0.0, 100.0, 0.0);
        paint.add_stop(0x00000000, 0.0);
        paint.add_stop(0xFFFF0000, 1.0);
        paint.complete_gradient();
        assert!(paint.is_visible());

        paint.radial_gradient(0.0, 0.0, 10.0);
        paint.add_stop(0x00000000, 0.0);
        paint.complete_gradient();
        assert!(!paint.is_visible());
    }

    #[test]
    fn stops_bake_in_insertion_order() {
        let paint = Paint::new();
        paint.linear_gradient(0.0, 0.0, 1.0, 0.0);
        paint.add_stop(0xFF000000, 0.0);
        paint.add_stop(0xFF00FF00, 0.25);
        paint.add_stop(0xFF0000FF, 1.0);
        paint.complete_gradient();

        match paint.fill() {
            Fill::Gradient(gradient) => {
                assert_eq!(gradient.fill_type, FillType::Linear);
                assert_eq!(gradient.stop_count(), 3);
                assert_eq!(gradient.offsets.as_slice(), &[0.0, 0.25, 1.0]);
                assert_eq!(gradient.colors[1], [0.0, 1.0, 0.0, 1.0]);
            }
            fill => panic!("expected gradient, got {fill:?}"),
        }
    }

    #[test]
    fn last_fill_call_wins() {
        let paint = Paint::new();
        paint.linear_gradient(0.0, 0.0, 1.0, 0.0);
        paint.add_stop(0xFFFFFFFF, 0.0);

        // A solid color set mid-build discards the gradient builder.
        paint.color(0xFF112233);
        assert_eq!(paint.fill(), Fill::Solid(Color::rgba8(0x11, 0x22, 0x33, 0xFF)));
    }

    #[test]
    fn radial_end_encodes_radius() {
        let paint = Paint::new();
        paint.radial_gradient(4.0, 6.0, 9.0);
        paint.add_stop(0xFFFFFFFF, 0.0);
        paint.complete_gradient();

        match paint.fill() {
            Fill::Gradient(gradient) => {
                assert_eq!(gradient.fill_type, FillType::Radial);
                assert_eq!(gradient.start, Point::new(4.0, 6.0));
                assert_eq!(gradient.end, Point::new(13.0, 6.0));
            }
            fill => panic!("expected gradient, got {fill:?}"),
        }
    }

    #[test]
    fn stroke_parameters_are_recorded() {
        let paint = Paint::new();
        paint.style(PaintStyle::Stroke);
        paint.join(LineJoin::Bevel);
        paint.cap(LineCap::Square);

        assert_eq!(paint.stroke_join(), LineJoin::Bevel);
        assert_eq!(paint.stroke_cap(), LineCap::Square);
    }

    #[test]
    fn stroke_parameter_changes_reextrude() {
        let path: Path<RecordingProvider> = Path::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));

        let provider = Rc::new(RecordingProvider::new());
        let paint = Paint::new();
        paint.style(PaintStyle::Stroke);

        paint.update_stroke(&provider, &path, 5.0).unwrap();
        let uploads = provider.upload_count();

        // Same path, same parameters: the cached strip is reused.
        paint.update_stroke(&provider, &path, 5.0).unwrap();
        assert_eq!(provider.upload_count(), uploads);

        // A join change invalidates the strip even though the path is unchanged.
        paint.join(LineJoin::Bevel);
        paint.update_stroke(&provider, &path, 5.0).unwrap();
        assert_eq!(provider.upload_count(), uploads + 1);
    }

    #[test]
    fn stop_overflow_is_capped() {
        let paint = Paint::new();
        paint.linear_gradient(0.0, 0.0, 1.0, 0.0);
        for i in 0..(MAX_GRADIENT_STOPS + 4) {
            paint.add_stop(0xFFFFFFFF, i as f32 / (MAX_GRADIENT_STOPS + 4) as f32);
        }
        paint.complete_gradient();

        match paint.fill() {
            Fill::Gradient(gradient) => assert_eq!(gradient.stop_count(), MAX_GRADIENT_STOPS),
            fill => panic!("expected gradient, got {fill:?}"),
        }
    }
}
