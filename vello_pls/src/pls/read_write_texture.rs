// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use vello_pls_encoding::constants::PLANE_COUNT;

use crate::device::{Device, FramebufferTarget, FullscreenPass, MemoryBarrier};
use crate::frame::{FrameDescriptor, InterlockMode};
use crate::render_target::RenderTarget;
use crate::{GlCapabilities, Result};

/// `ARB_shader_image_load_store`: the planes are bound as storage images.
///
/// Fragment interlock (or Intel's fragment ordering) provides raster ordering.
/// Without it, draws accumulate with atomics and a fullscreen resolve pass
/// writes the final color.
#[derive(Clone, Debug)]
pub struct ReadWriteTexture {
    capabilities: GlCapabilities,
}

impl ReadWriteTexture {
    pub fn new(capabilities: &GlCapabilities) -> Option<Self> {
        capabilities
            .arb_shader_image_load_store
            .then_some(Self {
                capabilities: *capabilities,
            })
    }

    pub fn shader_define_name(&self) -> &'static str {
        "PLS_IMPL_RW_TEXTURE"
    }

    pub fn supports_raster_ordering(&self) -> bool {
        self.capabilities.arb_fragment_shader_interlock
            || self.capabilities.intel_fragment_shader_ordering
    }

    fn interlock_mode(&self) -> InterlockMode {
        if self.supports_raster_ordering() {
            InterlockMode::RasterOrdered
        } else {
            InterlockMode::Atomics
        }
    }

    pub fn activate<D: Device>(
        &mut self,
        device: &D,
        target: &mut RenderTarget<D>,
        desc: &FrameDescriptor,
    ) -> Result<()> {
        target.allocate_internal_planes(self.interlock_mode())?;
        if let RenderTarget::Framebuffer(target) = target {
            super::begin_offscreen(device, target, desc)?;
        }
        let target = target.texture_target_mut();
        // Clears go through the attachments; drawing goes through the images.
        target.bind_internal_framebuffer(FramebufferTarget::Framebuffer, PLANE_COUNT)?;
        super::clear_planes(device, desc);
        target.bind_headless_framebuffer(&self.capabilities)?;
        target.bind_as_image_textures();
        Ok(())
    }

    pub fn deactivate<D: Device>(
        &mut self,
        device: &D,
        target: &mut RenderTarget<D>,
        desc: &FrameDescriptor,
    ) -> Result<()> {
        device.memory_barrier(MemoryBarrier::All);
        match (self.interlock_mode(), target) {
            (InterlockMode::Atomics, RenderTarget::Framebuffer(target)) => {
                target.bind_external_framebuffer(FramebufferTarget::Draw);
                device.draw_fullscreen(FullscreenPass::AtomicResolve);
            }
            (InterlockMode::Atomics, RenderTarget::Texture(target)) => {
                target.bind_internal_framebuffer(FramebufferTarget::Draw, 1)?;
                device.draw_fullscreen(FullscreenPass::AtomicResolve);
            }
            (InterlockMode::RasterOrdered, RenderTarget::Framebuffer(target)) => {
                super::end_offscreen(device, target, desc)?;
            }
            (InterlockMode::RasterOrdered, RenderTarget::Texture(_)) => {}
        }
        device.bind_framebuffer(FramebufferTarget::Framebuffer, None);
        Ok(())
    }

    pub fn barrier<D: Device>(&self, device: &D) {
        device.memory_barrier(MemoryBarrier::ShaderImageAccess);
    }

    /// Interlock is selected per shader, so there's no device state to change.
    pub fn set_raster_ordering<D: Device>(&self, _device: &D, _enabled: bool) {}
}
