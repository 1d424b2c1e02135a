// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Numeric values shared verbatim with the pixel local storage shaders.
//!
//! Every id, plane index and bit layout that the draw and resolve shaders
//! decode lives here. The shader stage receives the same values through
//! [`glsl_defines`], so this module is the only place they are spelled out.

use std::fmt::Write;

/// Width of the gradient ramp texture, in texels.
pub const GRAD_TEXTURE_WIDTH: u32 = 512;
pub const GRAD_TEXTURE_INVERSE_WIDTH: f32 = 1.0 / GRAD_TEXTURE_WIDTH as f32;

/// Width of the tessellation vertex texture, in texels.
pub const TESS_TEXTURE_WIDTH: u32 = 2048;
pub const TESS_TEXTURE_WIDTH_LOG2: u32 = 11;

// Patch vertex types, stored in the low two bits of `PatchVertex::params`.
pub const STROKE_VERTEX: u32 = 0;
pub const FAN_VERTEX: u32 = 1;
pub const FAN_MIDPOINT_VERTEX: u32 = 2;

// Pixel local storage plane indices. These double as framebuffer color
// attachment offsets, PLS binding indices and storage image units.
pub const FRAMEBUFFER_PLANE_IDX: u32 = 0;
pub const COVERAGE_PLANE_IDX: u32 = 1;
pub const CLIP_PLANE_IDX: u32 = 2;
pub const ORIGINAL_DST_COLOR_PLANE_IDX: u32 = 3;
pub const PLANE_COUNT: u32 = 4;

// Paint types.
pub const SOLID_COLOR_PAINT_TYPE: u32 = 0;
pub const LINEAR_GRADIENT_PAINT_TYPE: u32 = 1;
pub const RADIAL_GRADIENT_PAINT_TYPE: u32 = 2;
pub const IMAGE_PAINT_TYPE: u32 = 3;
pub const CLIP_UPDATE_PAINT_TYPE: u32 = 4;

// Blend modes.
pub const BLEND_SRC_OVER: u32 = 0;
pub const BLEND_MODE_SCREEN: u32 = 1;
pub const BLEND_MODE_OVERLAY: u32 = 2;
pub const BLEND_MODE_DARKEN: u32 = 3;
pub const BLEND_MODE_LIGHTEN: u32 = 4;
pub const BLEND_MODE_COLORDODGE: u32 = 5;
pub const BLEND_MODE_COLORBURN: u32 = 6;
pub const BLEND_MODE_HARDLIGHT: u32 = 7;
pub const BLEND_MODE_SOFTLIGHT: u32 = 8;
pub const BLEND_MODE_DIFFERENCE: u32 = 9;
pub const BLEND_MODE_EXCLUSION: u32 = 10;
pub const BLEND_MODE_MULTIPLY: u32 = 11;
pub const BLEND_MODE_HUE: u32 = 12;
pub const BLEND_MODE_SATURATION: u32 = 13;
pub const BLEND_MODE_COLOR: u32 = 14;
pub const BLEND_MODE_LUMINOSITY: u32 = 15;

/// Layout of `PathData::params` (raster ordered tiers).
///
/// `blend_mode | clip_id << 4 | paint_type << 20 | EVEN_ODD_PATH_FLAG`
pub const PATH_CLIP_ID_SHIFT: u32 = 4;
pub const PATH_PAINT_TYPE_SHIFT: u32 = 20;
pub const EVEN_ODD_PATH_FLAG: u32 = 1 << 31;

/// Layout of the atomic mode paint record's `params`.
///
/// `paint_type | blend_mode << 4 | flags | clip_id << 16`
pub const ATOMIC_MODE_PAINT_TYPE_MASK: u32 = 0xf;
pub const ATOMIC_MODE_BLEND_MODE_SHIFT: u32 = 4;
pub const ATOMIC_MODE_FLAG_EVEN_ODD: u32 = 1 << 8;
pub const ATOMIC_MODE_FLAG_HAS_CLIP_RECT: u32 = 1 << 9;
pub const ATOMIC_MODE_CLIP_ID_SHIFT: u32 = 16;

/// A named value of the shared table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShaderConstant {
    pub name: &'static str,
    pub value: u32,
}

const fn c(name: &'static str, value: u32) -> ShaderConstant {
    ShaderConstant { name, value }
}

/// Every integer constant the shaders consume, in declaration order.
pub const SHADER_CONSTANTS: &[ShaderConstant] = &[
    c("GRAD_TEXTURE_WIDTH", GRAD_TEXTURE_WIDTH),
    c("TESS_TEXTURE_WIDTH", TESS_TEXTURE_WIDTH),
    c("TESS_TEXTURE_WIDTH_LOG2", TESS_TEXTURE_WIDTH_LOG2),
    c("STROKE_VERTEX", STROKE_VERTEX),
    c("FAN_VERTEX", FAN_VERTEX),
    c("FAN_MIDPOINT_VERTEX", FAN_MIDPOINT_VERTEX),
    c("FRAMEBUFFER_PLANE_IDX", FRAMEBUFFER_PLANE_IDX),
    c("COVERAGE_PLANE_IDX", COVERAGE_PLANE_IDX),
    c("CLIP_PLANE_IDX", CLIP_PLANE_IDX),
    c("ORIGINAL_DST_COLOR_PLANE_IDX", ORIGINAL_DST_COLOR_PLANE_IDX),
    c("SOLID_COLOR_PAINT_TYPE", SOLID_COLOR_PAINT_TYPE),
    c("LINEAR_GRADIENT_PAINT_TYPE", LINEAR_GRADIENT_PAINT_TYPE),
    c("RADIAL_GRADIENT_PAINT_TYPE", RADIAL_GRADIENT_PAINT_TYPE),
    c("IMAGE_PAINT_TYPE", IMAGE_PAINT_TYPE),
    c("CLIP_UPDATE_PAINT_TYPE", CLIP_UPDATE_PAINT_TYPE),
    c("BLEND_SRC_OVER", BLEND_SRC_OVER),
    c("BLEND_MODE_SCREEN", BLEND_MODE_SCREEN),
    c("BLEND_MODE_OVERLAY", BLEND_MODE_OVERLAY),
    c("BLEND_MODE_DARKEN", BLEND_MODE_DARKEN),
    c("BLEND_MODE_LIGHTEN", BLEND_MODE_LIGHTEN),
    c("BLEND_MODE_COLORDODGE", BLEND_MODE_COLORDODGE),
    c("BLEND_MODE_COLORBURN", BLEND_MODE_COLORBURN),
    c("BLEND_MODE_HARDLIGHT", BLEND_MODE_HARDLIGHT),
    c("BLEND_MODE_SOFTLIGHT", BLEND_MODE_SOFTLIGHT),
    c("BLEND_MODE_DIFFERENCE", BLEND_MODE_DIFFERENCE),
    c("BLEND_MODE_EXCLUSION", BLEND_MODE_EXCLUSION),
    c("BLEND_MODE_MULTIPLY", BLEND_MODE_MULTIPLY),
    c("BLEND_MODE_HUE", BLEND_MODE_HUE),
    c("BLEND_MODE_SATURATION", BLEND_MODE_SATURATION),
    c("BLEND_MODE_COLOR", BLEND_MODE_COLOR),
    c("BLEND_MODE_LUMINOSITY", BLEND_MODE_LUMINOSITY),
    c("PATH_CLIP_ID_SHIFT", PATH_CLIP_ID_SHIFT),
    c("PATH_PAINT_TYPE_SHIFT", PATH_PAINT_TYPE_SHIFT),
    c("EVEN_ODD_PATH_FLAG", EVEN_ODD_PATH_FLAG),
    c("ATOMIC_MODE_PAINT_TYPE_MASK", ATOMIC_MODE_PAINT_TYPE_MASK),
    c("ATOMIC_MODE_BLEND_MODE_SHIFT", ATOMIC_MODE_BLEND_MODE_SHIFT),
    c("ATOMIC_MODE_FLAG_EVEN_ODD", ATOMIC_MODE_FLAG_EVEN_ODD),
    c("ATOMIC_MODE_FLAG_HAS_CLIP_RECT", ATOMIC_MODE_FLAG_HAS_CLIP_RECT),
    c("ATOMIC_MODE_CLIP_ID_SHIFT", ATOMIC_MODE_CLIP_ID_SHIFT),
];

/// Renders [`SHADER_CONSTANTS`] as a GLSL prelude of `#define NAME 0x...u` lines.
pub fn glsl_defines() -> String {
    let mut out = String::new();
    for constant in SHADER_CONSTANTS {
        // Writing to a `String` can't fail.
        let _ = writeln!(out, "#define {} {:#x}u", constant.name, constant.value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique() {
        let mut seen = HashSet::new();
        for constant in SHADER_CONSTANTS {
            assert!(seen.insert(constant.name), "duplicate {}", constant.name);
        }
    }

    #[test]
    fn plane_indices_are_dense() {
        let mut planes = [
            FRAMEBUFFER_PLANE_IDX,
            COVERAGE_PLANE_IDX,
            CLIP_PLANE_IDX,
            ORIGINAL_DST_COLOR_PLANE_IDX,
        ];
        planes.sort_unstable();
        assert_eq!(planes, [0, 1, 2, 3]);
        assert_eq!(PLANE_COUNT, 4);
    }

    #[test]
    fn atomic_fields_do_not_overlap() {
        let blend_bits = 0xf << ATOMIC_MODE_BLEND_MODE_SHIFT;
        let flags = ATOMIC_MODE_FLAG_EVEN_ODD | ATOMIC_MODE_FLAG_HAS_CLIP_RECT;
        let clip_bits = 0xffff << ATOMIC_MODE_CLIP_ID_SHIFT;
        assert_eq!(ATOMIC_MODE_PAINT_TYPE_MASK & blend_bits, 0);
        assert_eq!((ATOMIC_MODE_PAINT_TYPE_MASK | blend_bits) & flags, 0);
        assert_eq!(flags & clip_bits, 0);
    }

    #[test]
    fn defines_render_every_constant() {
        let defines = glsl_defines();
        assert_eq!(defines.lines().count(), SHADER_CONSTANTS.len());
        assert!(defines.contains("#define CLIP_PLANE_IDX 0x2u"));
        assert!(defines.contains("#define EVEN_ODD_PATH_FLAG 0x80000000u"));
    }
}
