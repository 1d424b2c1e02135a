// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-path records for the atomic tier.
//!
//! Without raster ordering the draw and resolve shaders can't carry paint state
//! through pixel local storage, so they look it up by path id instead. Path ids
//! are dense and start at 1. Id 0 resolves to the clear color, which lets the
//! resolve pass treat background pixels like any other path.

use bytemuck::{Pod, Zeroable};
use peniko::{Color, Fill};

use crate::clip_rect::ClipRectInverseMatrix;
use crate::constants::*;
use crate::features::PlatformFeatures;
use crate::math::Transform;
use crate::paint::{pack_color, BlendMode, GradientSpan, Paint};

/// Opaque handle to an image texture owned by the caller.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageTextureId(pub u64);

/// `params` and a paint-type dependent `payload`.
///
/// The payload is a packed color, the image opacity (`f32` bits), the shifted
/// replacement clip id, or the gradient row (`f32` bits).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct PaintRecord {
    pub params: u32,
    pub payload: u32,
}

impl PaintRecord {
    pub fn paint_type(&self) -> u32 {
        self.params & ATOMIC_MODE_PAINT_TYPE_MASK
    }

    pub fn is_gradient(&self) -> bool {
        matches!(
            self.paint_type(),
            LINEAR_GRADIENT_PAINT_TYPE | RADIAL_GRADIENT_PAINT_TYPE
        )
    }

    pub fn grad_texture_y(&self) -> f32 {
        f32::from_bits(self.payload)
    }

    pub fn opacity(&self) -> f32 {
        f32::from_bits(self.payload)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct PaintTranslate {
    pub translate: [f32; 2],
    /// Maps gradient `t` to a normalized x coordinate in the gradient texture.
    pub grad_texture_horizontal_span: [f32; 2],
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ClipRectTranslate {
    pub translate: [f32; 2],
    /// Negated reciprocal of the clip box's screen space derivatives.
    pub inverse_fwidth: [f32; 2],
}

/// One path's draw state.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AtomicPathDraw {
    /// Local to device.
    pub matrix: Transform,
    pub fill_rule: Fill,
    pub paint: Paint,
    /// Only read for image paints.
    pub image_texture: Option<ImageTextureId>,
    pub clip_id: u32,
    pub clip_rect: Option<ClipRectInverseMatrix>,
    pub blend_mode: BlendMode,
}

/// Frame-wide inputs to [`AtomicModeData::set_path_data`].
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FrameParams {
    pub render_target_height: u32,
    /// Height of the gradient texture in texels, if already known.
    ///
    /// Rows stay in texel units regardless; they're normalized in [`AtomicModeData::finalize`].
    pub gradient_texture_height: f32,
    pub platform_features: PlatformFeatures,
}

impl FrameParams {
    /// Device space (as seen by the fragment shader) to the path's local space.
    ///
    /// A singular path matrix leaves the paint matrix at identity.
    fn paint_matrix(&self, matrix: &Transform) -> Transform {
        let inverse = matrix.invert().unwrap_or_default();
        if self.platform_features.frag_coord_bottom_up {
            inverse * self.flip_y()
        } else {
            inverse
        }
    }

    fn flip_y(&self) -> Transform {
        Transform::new([
            1.0,
            0.0,
            0.0,
            -1.0,
            0.0,
            self.render_target_height as f32,
        ])
    }
}

/// Per-path records, indexed by path id, for one frame.
#[derive(Clone, Debug, Default)]
pub struct AtomicModeData {
    paints: Vec<PaintRecord>,
    paint_matrices: Vec<[f32; 4]>,
    paint_translates: Vec<PaintTranslate>,
    clip_rect_matrices: Vec<[f32; 4]>,
    clip_rect_translates: Vec<ClipRectTranslate>,
    image_textures: Vec<Option<ImageTextureId>>,
    finalized: bool,
}

impl AtomicModeData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_path_count: usize) -> Self {
        let len = max_path_count + 1;
        Self {
            paints: Vec::with_capacity(len),
            paint_matrices: Vec::with_capacity(len),
            paint_translates: Vec::with_capacity(len),
            clip_rect_matrices: Vec::with_capacity(len),
            clip_rect_translates: Vec::with_capacity(len),
            image_textures: Vec::with_capacity(len),
            finalized: false,
        }
    }

    /// Clears every record for a new frame, keeping allocations.
    pub fn reset(&mut self) {
        self.paints.clear();
        self.paint_matrices.clear();
        self.paint_translates.clear();
        self.clip_rect_matrices.clear();
        self.clip_rect_translates.clear();
        self.image_textures.clear();
        self.finalized = false;
    }

    /// Number of record slots, including the sentinel at id 0.
    pub fn len(&self) -> usize {
        self.paints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paints.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn grow_to(&mut self, path_id: usize) {
        let len = path_id + 1;
        if self.paints.len() < len {
            self.paints.resize(len, PaintRecord::default());
            self.paint_matrices.resize(len, [0.0; 4]);
            self.paint_translates.resize(len, PaintTranslate::default());
            self.clip_rect_matrices.resize(len, [0.0; 4]);
            self.clip_rect_translates
                .resize(len, ClipRectTranslate::default());
            self.image_textures.resize(len, None);
        }
    }

    /// Writes the records of one path.
    pub fn set_path_data(&mut self, path_id: u32, draw: &AtomicPathDraw, frame: &FrameParams) {
        debug_assert_ne!(path_id, 0, "path id 0 is reserved for the clear color");
        debug_assert!(!self.finalized, "set_path_data after finalize");
        let id = path_id as usize;
        self.grow_to(id);

        let shifted_clip_id = draw.clip_id << ATOMIC_MODE_CLIP_ID_SHIFT;
        let shifted_blend_mode =
            draw.blend_mode.to_pls_blend_mode() << ATOMIC_MODE_BLEND_MODE_SHIFT;
        let paint_type = draw.paint.paint_type().to_glsl_id();
        self.image_textures[id] = None;

        let mut record = PaintRecord {
            params: shifted_clip_id | shifted_blend_mode | paint_type,
            payload: 0,
        };
        match draw.paint {
            Paint::SolidColor(color) => {
                record.payload = pack_color(color);
            }
            Paint::Image { opacity } => {
                record.payload = opacity.to_bits();
                self.image_textures[id] = draw.image_texture;
                self.set_paint_matrix(id, frame.paint_matrix(&draw.matrix));
            }
            Paint::LinearGradient { span, coeffs } => {
                let gradient = Transform::new([coeffs[0], 0.0, coeffs[1], 0.0, coeffs[2], 0.0]);
                self.set_paint_matrix(id, gradient * frame.paint_matrix(&draw.matrix));
                self.set_gradient_span(id, &mut record, span, frame);
            }
            Paint::RadialGradient { span, coeffs } => {
                let w = 1.0 / coeffs[2];
                let gradient = Transform::new([w, 0.0, 0.0, w, -coeffs[0] * w, -coeffs[1] * w]);
                self.set_paint_matrix(id, gradient * frame.paint_matrix(&draw.matrix));
                self.set_gradient_span(id, &mut record, span, frame);
            }
            Paint::ClipUpdate { outer_clip_id } => {
                record.params = outer_clip_id << ATOMIC_MODE_CLIP_ID_SHIFT | CLIP_UPDATE_PAINT_TYPE;
                record.payload = shifted_clip_id;
            }
        }

        if draw.fill_rule == Fill::EvenOdd {
            record.params |= ATOMIC_MODE_FLAG_EVEN_ODD;
        }
        if let Some(clip_rect) = &draw.clip_rect {
            record.params |= ATOMIC_MODE_FLAG_HAS_CLIP_RECT;
            let mut m = *clip_rect.inverse_matrix();
            if frame.platform_features.frag_coord_bottom_up {
                m = m * frame.flip_y();
            }
            let [xx, xy, yx, yy] = m.matrix;
            self.clip_rect_matrices[id] = m.matrix;
            self.clip_rect_translates[id] = ClipRectTranslate {
                translate: m.translation,
                inverse_fwidth: [-1.0 / (xx.abs() + xy.abs()), -1.0 / (yx.abs() + yy.abs())],
            };
        }
        self.paints[id] = record;
    }

    fn set_paint_matrix(&mut self, id: usize, paint_matrix: Transform) {
        self.paint_matrices[id] = paint_matrix.matrix;
        self.paint_translates[id].translate = paint_matrix.translation;
    }

    fn set_gradient_span(
        &mut self,
        id: usize,
        record: &mut PaintRecord,
        span: GradientSpan,
        frame: &FrameParams,
    ) {
        debug_assert!(
            frame.gradient_texture_height <= 0.0
                || (span.row as f32) < frame.gradient_texture_height,
            "gradient row {} outside the gradient texture",
            span.row
        );
        // Stays in texels until `finalize`.
        record.payload = span.texel_y().to_bits();
        self.paint_translates[id].grad_texture_horizontal_span = span.horizontal_span();
    }

    /// Completes the frame's records once every path has been set.
    ///
    /// Path id 0 becomes a solid record of `clear_color`, and the gradient row of
    /// every gradient path in `1..=path_count` is scaled into `[0, 1]`.
    pub fn finalize(
        &mut self,
        path_count: usize,
        clear_color: Color,
        grad_texture_inverse_height: f32,
    ) {
        debug_assert!(!self.finalized, "finalize called twice");
        if self.finalized {
            return;
        }
        self.grow_to(path_count);
        self.paints[0] = PaintRecord {
            params: SOLID_COLOR_PAINT_TYPE,
            payload: pack_color(clear_color),
        };
        self.image_textures[0] = None;
        for paint in &mut self.paints[1..=path_count] {
            if paint.is_gradient() {
                paint.payload = (paint.grad_texture_y() * grad_texture_inverse_height).to_bits();
            }
        }
        self.finalized = true;
    }

    pub fn paints(&self) -> &[PaintRecord] {
        &self.paints
    }

    pub fn paint_matrices(&self) -> &[[f32; 4]] {
        &self.paint_matrices
    }

    pub fn paint_translates(&self) -> &[PaintTranslate] {
        &self.paint_translates
    }

    pub fn clip_rect_matrices(&self) -> &[[f32; 4]] {
        &self.clip_rect_matrices
    }

    pub fn clip_rect_translates(&self) -> &[ClipRectTranslate] {
        &self.clip_rect_translates
    }

    pub fn image_texture(&self, path_id: u32) -> Option<ImageTextureId> {
        self.image_textures.get(path_id as usize).copied().flatten()
    }

    pub fn paint_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.paints)
    }

    pub fn paint_matrix_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.paint_matrices)
    }

    pub fn paint_translate_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.paint_translates)
    }

    pub fn clip_rect_matrix_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.clip_rect_matrices)
    }

    pub fn clip_rect_translate_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.clip_rect_translates)
    }
}
