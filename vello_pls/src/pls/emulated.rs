// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use vello_pls_encoding::ShaderFeatures;

use crate::device::{ClearValue, Device, FramebufferTarget, LoadOp, StoreOp};
use crate::frame::{FrameDescriptor, InterlockMode};
use crate::render_target::RenderTarget;
use crate::{GlCapabilities, Result};

/// `ANGLE_shader_pixel_local_storage`, as exposed to WebGL.
///
/// The planes are bound to a framebuffer with no attachments and storage is
/// explicitly begun and ended around the flush.
#[derive(Clone, Debug)]
pub struct EmulatedExtension {
    capabilities: GlCapabilities,
}

impl EmulatedExtension {
    pub fn new(capabilities: &GlCapabilities) -> Option<Self> {
        capabilities
            .angle_shader_pixel_local_storage
            .then_some(Self {
                capabilities: *capabilities,
            })
    }

    pub fn shader_define_name(&self) -> &'static str {
        "PLS_IMPL_ANGLE"
    }

    pub fn supports_raster_ordering(&self) -> bool {
        true
    }

    pub fn activate<D: Device>(
        &mut self,
        device: &D,
        target: &mut RenderTarget<D>,
        desc: &FrameDescriptor,
    ) -> Result<()> {
        target.allocate_internal_planes(InterlockMode::RasterOrdered)?;
        if let RenderTarget::Framebuffer(target) = target {
            super::begin_offscreen(device, target, desc)?;
        }
        target
            .texture_target_mut()
            .bind_headless_framebuffer(&self.capabilities)?;

        let features = desc.shader_features;
        let clip = if features.contains(ShaderFeatures::ENABLE_CLIPPING) {
            LoadOp::Zero
        } else {
            LoadOp::Disable
        };
        let original_dst_color = if features.contains(ShaderFeatures::ENABLE_ADVANCED_BLEND) {
            LoadOp::DontCare
        } else {
            LoadOp::Disable
        };
        device.begin_pixel_local_storage(&[
            super::color_load_op(desc),
            LoadOp::Clear(ClearValue::Uint(desc.coverage_clear_value)),
            clip,
            original_dst_color,
        ]);
        Ok(())
    }

    pub fn deactivate<D: Device>(
        &mut self,
        device: &D,
        target: &mut RenderTarget<D>,
        desc: &FrameDescriptor,
    ) -> Result<()> {
        device.end_pixel_local_storage(&[
            StoreOp::Store,
            StoreOp::DontCare,
            StoreOp::DontCare,
            StoreOp::DontCare,
        ]);
        if let RenderTarget::Framebuffer(target) = target {
            super::end_offscreen(device, target, desc)?;
        }
        device.bind_framebuffer(FramebufferTarget::Framebuffer, None);
        Ok(())
    }

    pub fn barrier<D: Device>(&self, device: &D) {
        device.pixel_local_storage_barrier();
    }

    pub fn set_raster_ordering<D: Device>(&self, _device: &D, _enabled: bool) {}
}
