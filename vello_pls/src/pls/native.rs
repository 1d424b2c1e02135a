// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::device::{Capability, Device, FramebufferTarget, FullscreenPass};
use crate::frame::FrameDescriptor;
use crate::render_target::RenderTarget;
use crate::{GlCapabilities, Result};

/// `EXT_shader_pixel_local_storage`: the planes live in tile memory and
/// fragments are always raster ordered.
#[derive(Clone, Debug)]
pub struct NativeExtension {
    _private: (),
}

impl NativeExtension {
    pub fn new(capabilities: &GlCapabilities) -> Option<Self> {
        capabilities
            .ext_shader_pixel_local_storage
            .then_some(Self { _private: () })
    }

    pub fn shader_define_name(&self) -> &'static str {
        "PLS_IMPL_EXT_NATIVE"
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
        match target {
            RenderTarget::Framebuffer(target) => {
                target.bind_external_framebuffer(FramebufferTarget::Framebuffer);
            }
            RenderTarget::Texture(target) => {
                target.bind_internal_framebuffer(FramebufferTarget::Framebuffer, 1)?;
            }
        }
        device.set_enabled(Capability::ShaderPixelLocalStorage, true);
        device.draw_fullscreen(FullscreenPass::PlsLoad {
            color: super::color_load_op(desc),
            coverage_clear_value: desc.coverage_clear_value,
        });
        Ok(())
    }

    pub fn deactivate<D: Device>(
        &mut self,
        device: &D,
        _target: &mut RenderTarget<D>,
        _desc: &FrameDescriptor,
    ) -> Result<()> {
        device.draw_fullscreen(FullscreenPass::PlsStore);
        device.set_enabled(Capability::ShaderPixelLocalStorage, false);
        device.bind_framebuffer(FramebufferTarget::Framebuffer, None);
        Ok(())
    }

    /// Storage is coherent, so there is nothing to wait for.
    pub fn barrier<D: Device>(&self, _device: &D) {}

    pub fn set_raster_ordering<D: Device>(&self, _device: &D, _enabled: bool) {}
}
