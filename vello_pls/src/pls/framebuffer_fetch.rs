// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use vello_pls_encoding::constants::{
    CLIP_PLANE_IDX, COVERAGE_PLANE_IDX, ORIGINAL_DST_COLOR_PLANE_IDX, PLANE_COUNT,
};

use crate::device::{Capability, Device, FramebufferTarget};
use crate::frame::{FrameDescriptor, InterlockMode};
use crate::render_target::RenderTarget;
use crate::{GlCapabilities, Result};

/// `EXT_shader_framebuffer_fetch`: every plane is a color attachment that
/// fragments read back through `inout` variables.
///
/// With `QCOM_shader_framebuffer_fetch_noncoherent` raster ordering can be
/// turned off, after which overlapping draws need a fetch barrier.
#[derive(Clone, Debug)]
pub struct FramebufferFetch {
    noncoherent: bool,
}

impl FramebufferFetch {
    pub fn new(capabilities: &GlCapabilities) -> Option<Self> {
        capabilities.ext_shader_framebuffer_fetch.then_some(Self {
            noncoherent: capabilities.qcom_shader_framebuffer_fetch_noncoherent,
        })
    }

    pub fn shader_define_name(&self) -> &'static str {
        "PLS_IMPL_FRAMEBUFFER_FETCH"
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
            .bind_internal_framebuffer(FramebufferTarget::Framebuffer, PLANE_COUNT)?;
        super::clear_planes(device, desc);
        Ok(())
    }

    pub fn deactivate<D: Device>(
        &mut self,
        device: &D,
        target: &mut RenderTarget<D>,
        desc: &FrameDescriptor,
    ) -> Result<()> {
        device.invalidate_framebuffer(
            FramebufferTarget::Framebuffer,
            &[COVERAGE_PLANE_IDX, CLIP_PLANE_IDX, ORIGINAL_DST_COLOR_PLANE_IDX],
        );
        if let RenderTarget::Framebuffer(target) = target {
            super::end_offscreen(device, target, desc)?;
        }
        device.bind_framebuffer(FramebufferTarget::Framebuffer, None);
        Ok(())
    }

    pub fn barrier<D: Device>(&self, device: &D) {
        if self.noncoherent {
            device.framebuffer_fetch_barrier();
        }
    }

    pub fn set_raster_ordering<D: Device>(&self, device: &D, enabled: bool) {
        if self.noncoherent {
            device.set_enabled(Capability::FramebufferFetchNoncoherent, !enabled);
        }
    }
}
