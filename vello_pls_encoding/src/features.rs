// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use bitflags::bitflags;

bitflags! {
    /// Optional shader functionality a draw needs.
    ///
    /// The active set selects a shader permutation; each feature maps to one
    /// GLSL define of the same name.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ShaderFeatures: u32 {
        const ENABLE_CLIPPING = 1 << 0;
        const ENABLE_CLIP_RECT = 1 << 1;
        const ENABLE_ADVANCED_BLEND = 1 << 2;
        const ENABLE_EVEN_ODD = 1 << 3;
        const ENABLE_NESTED_CLIPPING = 1 << 4;
        const ENABLE_HSL_BLEND_MODES = 1 << 5;
    }
}

impl ShaderFeatures {
    /// The GLSL define for a single feature, or `None` if `self` isn't exactly one feature.
    pub fn glsl_name(self) -> Option<&'static str> {
        let mut names = self.glsl_names();
        match (names.next(), names.next()) {
            (Some(name), None) => Some(name),
            _ => None,
        }
    }

    /// Defines for every feature in the set, in bit order.
    pub fn glsl_names(self) -> impl Iterator<Item = &'static str> {
        self.iter_names().map(|(name, _)| name)
    }
}

/// Properties of the platform that change how data is encoded for the GPU.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PlatformFeatures {
    /// `gl_FragCoord.y` increases upward, so device space y must be flipped.
    pub frag_coord_bottom_up: bool,
}
