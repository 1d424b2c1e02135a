// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use peniko::{Color, Mix};

use crate::constants::*;

/// Blend modes supported by the pixel local storage shaders.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
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

impl BlendMode {
    /// Returns the id the shaders use for this blend mode.
    pub const fn to_pls_blend_mode(self) -> u32 {
        match self {
            Self::SrcOver => BLEND_SRC_OVER,
            Self::Screen => BLEND_MODE_SCREEN,
            Self::Overlay => BLEND_MODE_OVERLAY,
            Self::Darken => BLEND_MODE_DARKEN,
            Self::Lighten => BLEND_MODE_LIGHTEN,
            Self::ColorDodge => BLEND_MODE_COLORDODGE,
            Self::ColorBurn => BLEND_MODE_COLORBURN,
            Self::HardLight => BLEND_MODE_HARDLIGHT,
            Self::SoftLight => BLEND_MODE_SOFTLIGHT,
            Self::Difference => BLEND_MODE_DIFFERENCE,
            Self::Exclusion => BLEND_MODE_EXCLUSION,
            Self::Multiply => BLEND_MODE_MULTIPLY,
            Self::Hue => BLEND_MODE_HUE,
            Self::Saturation => BLEND_MODE_SATURATION,
            Self::Color => BLEND_MODE_COLOR,
            Self::Luminosity => BLEND_MODE_LUMINOSITY,
        }
    }

    /// True for the non-separable blend modes, which need the HSL shader feature.
    pub const fn is_hsl(self) -> bool {
        matches!(
            self,
            Self::Hue | Self::Saturation | Self::Color | Self::Luminosity
        )
    }
}

impl From<Mix> for BlendMode {
    #[allow(unreachable_patterns)]
    fn from(mix: Mix) -> Self {
        match mix {
            Mix::Normal => Self::SrcOver,
            Mix::Multiply => Self::Multiply,
            Mix::Screen => Self::Screen,
            Mix::Overlay => Self::Overlay,
            Mix::Darken => Self::Darken,
            Mix::Lighten => Self::Lighten,
            Mix::ColorDodge => Self::ColorDodge,
            Mix::ColorBurn => Self::ColorBurn,
            Mix::HardLight => Self::HardLight,
            Mix::SoftLight => Self::SoftLight,
            Mix::Difference => Self::Difference,
            Mix::Exclusion => Self::Exclusion,
            Mix::Hue => Self::Hue,
            Mix::Saturation => Self::Saturation,
            Mix::Color => Self::Color,
            Mix::Luminosity => Self::Luminosity,
            _ => Self::SrcOver,
        }
    }
}

/// The kind of paint a path is filled with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PaintType {
    SolidColor,
    LinearGradient,
    RadialGradient,
    Image,
    /// The path writes a new clip instead of color.
    ClipUpdate,
}

impl PaintType {
    /// Returns the id the shaders use for this paint type.
    pub const fn to_glsl_id(self) -> u32 {
        match self {
            Self::SolidColor => SOLID_COLOR_PAINT_TYPE,
            Self::LinearGradient => LINEAR_GRADIENT_PAINT_TYPE,
            Self::RadialGradient => RADIAL_GRADIENT_PAINT_TYPE,
            Self::Image => IMAGE_PAINT_TYPE,
            Self::ClipUpdate => CLIP_UPDATE_PAINT_TYPE,
        }
    }

    pub const fn is_gradient(self) -> bool {
        matches!(self, Self::LinearGradient | Self::RadialGradient)
    }
}

/// Location of a gradient's color ramp in the gradient texture.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct GradientSpan {
    /// Texture row.
    pub row: u32,
    /// First texel of the ramp.
    pub x0: u32,
    /// Last texel of the ramp.
    pub x1: u32,
}

impl GradientSpan {
    /// Packs the span as `row << 20 | x1 << 10 | x0`.
    pub const fn pack(self) -> u32 {
        (self.row << 20) | ((self.x1 & 0x3ff) << 10) | (self.x0 & 0x3ff)
    }

    pub const fn unpack(span: u32) -> Self {
        Self {
            row: span >> 20,
            x0: span & 0x3ff,
            x1: (span >> 10) & 0x3ff,
        }
    }

    /// Maps gradient `t` to a normalized x coordinate: `x = t * span[0] + span[1]`.
    pub fn horizontal_span(self) -> [f32; 2] {
        [
            (self.x1 as f32 - self.x0 as f32) * GRAD_TEXTURE_INVERSE_WIDTH,
            (self.x0 as f32 + 0.5) * GRAD_TEXTURE_INVERSE_WIDTH,
        ]
    }

    /// Vertical texel center of the row, in texels. Normalized once the texture height is known.
    pub fn texel_y(self) -> f32 {
        self.row as f32 + 0.5
    }
}

/// A path's paint, along with the data the shaders need for it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Paint {
    /// Straight (non-premultiplied) color.
    SolidColor(Color),
    /// `t = coeffs[0] * x + coeffs[1] * y + coeffs[2]`, in the path's local space.
    LinearGradient {
        span: GradientSpan,
        coeffs: [f32; 3],
    },
    /// `t = distance((x, y), coeffs[0..2]) / coeffs[2]`, in the path's local space.
    RadialGradient {
        span: GradientSpan,
        coeffs: [f32; 3],
    },
    Image {
        opacity: f32,
    },
    ClipUpdate {
        /// The clip the new clip is nested in, or 0.
        outer_clip_id: u32,
    },
}

impl Paint {
    pub const fn paint_type(&self) -> PaintType {
        match self {
            Self::SolidColor(_) => PaintType::SolidColor,
            Self::LinearGradient { .. } => PaintType::LinearGradient,
            Self::RadialGradient { .. } => PaintType::RadialGradient,
            Self::Image { .. } => PaintType::Image,
            Self::ClipUpdate { .. } => PaintType::ClipUpdate,
        }
    }

    /// Linear gradient with `t = 0` at `p0` and `t = 1` at `p1`.
    pub fn linear_gradient(span: GradientSpan, p0: [f32; 2], p1: [f32; 2]) -> Self {
        let v = [p1[0] - p0[0], p1[1] - p0[1]];
        let len2 = v[0] * v[0] + v[1] * v[1];
        let scale = if len2 > 0.0 { 1.0 / len2 } else { 0.0 };
        let a = v[0] * scale;
        let b = v[1] * scale;
        Self::LinearGradient {
            span,
            coeffs: [a, b, -(a * p0[0] + b * p0[1])],
        }
    }

    pub fn radial_gradient(span: GradientSpan, center: [f32; 2], radius: f32) -> Self {
        Self::RadialGradient {
            span,
            coeffs: [center[0], center[1], radius],
        }
    }

    /// The four words the raster ordered shaders read for this paint.
    pub fn to_words(&self) -> [u32; 4] {
        match *self {
            Self::SolidColor(color) => color.components.map(f32::to_bits),
            Self::LinearGradient { span, coeffs } | Self::RadialGradient { span, coeffs } => [
                span.pack(),
                coeffs[0].to_bits(),
                coeffs[1].to_bits(),
                coeffs[2].to_bits(),
            ],
            Self::Image { opacity } => [opacity.to_bits(), 0, 0, 0],
            Self::ClipUpdate { outer_clip_id } => [outer_clip_id, 0, 0, 0],
        }
    }
}

/// Packs integer channels into one word, `x` in the low byte, as GLSL's `unpackUnorm4x8` expects.
pub const fn pack_unorm4x8_u8(rgba: [u32; 4]) -> u32 {
    (rgba[0] & 0xff) | (rgba[1] & 0xff) << 8 | (rgba[2] & 0xff) << 16 | (rgba[3] & 0xff) << 24
}

/// Packs normalized channels, clamped to `[0, 1]`.
pub fn pack_unorm4x8(rgba: [f32; 4]) -> u32 {
    pack_unorm4x8_u8(rgba.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u32))
}

/// Packs a `0xAARRGGBB` color.
pub const fn pack_unorm4x8_argb(argb: u32) -> u32 {
    pack_unorm4x8_u8([argb >> 16, argb >> 8, argb, argb >> 24])
}

pub fn pack_color(color: Color) -> u32 {
    pack_unorm4x8(color.components)
}

/// The inverse of [`pack_unorm4x8`].
pub fn unpack_unorm4x8(packed: u32) -> [f32; 4] {
    [0, 8, 16, 24].map(|shift| ((packed >> shift) & 0xff) as f32 / 255.0)
}
