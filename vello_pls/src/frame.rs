// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use peniko::Color;
use vello_pls_encoding::ShaderFeatures;

use crate::device::IntRect;

/// How fragments of overlapping paths are kept in order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InterlockMode {
    /// The hardware runs fragments of one pixel in submission order.
    RasterOrdered,
    /// Fragments accumulate with atomics and a resolve pass produces final color.
    Atomics,
}

/// What happens to the render target's existing contents at the start of a flush.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoadAction {
    #[default]
    Clear,
    PreserveRenderTarget,
    DontCare,
}

/// Per-flush parameters passed to the pixel local storage strategy.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameDescriptor {
    pub color_load_action: LoadAction,
    /// Straight alpha; only used with [`LoadAction::Clear`].
    pub clear_color: Color,
    pub coverage_clear_value: u32,
    /// Union of the features every draw in the flush needs.
    pub shader_features: ShaderFeatures,
    /// The region of the render target the flush may touch.
    pub update_bounds: IntRect,
}

impl FrameDescriptor {
    /// A descriptor that clears the whole `width` by `height` target to transparent.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            color_load_action: LoadAction::Clear,
            clear_color: Color::TRANSPARENT,
            coverage_clear_value: 0,
            shader_features: ShaderFeatures::empty(),
            update_bounds: IntRect::from_size(width, height),
        }
    }

    /// The clear color as written into a premultiplied color plane.
    pub fn premultiplied_clear_color(&self) -> [f32; 4] {
        self.clear_color.premultiply().components
    }
}
