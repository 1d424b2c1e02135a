// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use bytemuck::{Pod, Zeroable};
use peniko::Fill;

use crate::clip_rect::ClipRectInverseMatrix;
use crate::constants::{EVEN_ODD_PATH_FLAG, PATH_CLIP_ID_SHIFT, PATH_PAINT_TYPE_SHIFT};
use crate::math::Transform;
use crate::paint::{BlendMode, Paint};

/// Per-path record read by the raster ordered draw shaders.
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct PathData {
    pub matrix: Transform,
    /// Zero for fills.
    pub stroke_radius: f32,
    /// `blend_mode | clip_id << 4 | paint_type << 20 | EVEN_ODD_PATH_FLAG`
    pub params: u32,
    pub paint_data: [u32; 4],
    pub clip_rect_inverse_matrix: ClipRectInverseMatrix,
}

impl PathData {
    #[allow(clippy::too_many_arguments)]
    pub fn set(
        &mut self,
        matrix: Transform,
        stroke_radius: f32,
        fill_rule: Fill,
        paint: &Paint,
        clip_id: u32,
        blend_mode: BlendMode,
        clip_rect: Option<&ClipRectInverseMatrix>,
    ) {
        let mut params = blend_mode.to_pls_blend_mode()
            | clip_id << PATH_CLIP_ID_SHIFT
            | paint.paint_type().to_glsl_id() << PATH_PAINT_TYPE_SHIFT;
        // Strokes never use even-odd.
        if fill_rule == Fill::EvenOdd && stroke_radius == 0.0 {
            params |= EVEN_ODD_PATH_FLAG;
        }
        *self = Self {
            matrix,
            stroke_radius,
            params,
            paint_data: paint.to_words(),
            clip_rect_inverse_matrix: clip_rect.copied().unwrap_or_default(),
        };
    }
}

/// Uniforms for drawing one image rectangle.
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ImageDrawUniforms {
    pub matrix: Transform,
    pub opacity: f32,
    pub clip_rect_inverse_matrix: ClipRectInverseMatrix,
    pub clip_id: u32,
    pub blend_mode: u32,
}

impl ImageDrawUniforms {
    pub fn new(
        matrix: Transform,
        opacity: f32,
        clip_rect: Option<&ClipRectInverseMatrix>,
        clip_id: u32,
        blend_mode: BlendMode,
    ) -> Self {
        Self {
            matrix,
            opacity,
            clip_rect_inverse_matrix: clip_rect.copied().unwrap_or_default(),
            clip_id,
            blend_mode: blend_mode.to_pls_blend_mode(),
        }
    }
}
