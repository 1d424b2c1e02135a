// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use vello_pls_encoding::PlatformFeatures;

use crate::device::{Device, FramebufferTarget};
use crate::frame::{FrameDescriptor, InterlockMode};
use crate::pls::{PixelLocalStorage, StrategyKind};
use crate::render_target::{
    FramebufferRenderTarget, RenderTarget, TargetTextureOwnership, TextureRenderTarget,
};
use crate::{GlCapabilities, Result};

/// Options for creating a [`RenderContext`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderContextOptions {
    /// Strategy to try before the default probe order.
    pub preferred_strategy: Option<StrategyKind>,
    pub platform_features: PlatformFeatures,
}

impl RenderContextOptions {
    /// Default options, with the preferred strategy read from `VELLO_PLS_STRATEGY`.
    pub fn from_env() -> Self {
        Self {
            preferred_strategy: StrategyKind::from_env(),
            ..Self::default()
        }
    }
}

/// Owns the pixel local storage strategy for one device and drives flushes
/// into render targets.
#[derive(Debug)]
pub struct RenderContext<D: Device> {
    device: D,
    capabilities: GlCapabilities,
    options: RenderContextOptions,
    pls: PixelLocalStorage,
}

impl<D: Device> RenderContext<D> {
    /// Fails with [`Error::UnsupportedDevice`](crate::Error::UnsupportedDevice)
    /// if no strategy can run with `capabilities`.
    pub fn new(
        device: D,
        capabilities: GlCapabilities,
        options: RenderContextOptions,
    ) -> Result<Self> {
        let pls = PixelLocalStorage::probe(options.preferred_strategy, &capabilities)?;
        log::info!(
            "using {} pixel local storage ({:?})",
            pls.kind(),
            pls.interlock_mode()
        );
        Ok(Self {
            device,
            capabilities,
            options,
            pls,
        })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn capabilities(&self) -> &GlCapabilities {
        &self.capabilities
    }

    pub fn platform_features(&self) -> &PlatformFeatures {
        &self.options.platform_features
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.pls.kind()
    }

    pub fn interlock_mode(&self) -> InterlockMode {
        self.pls.interlock_mode()
    }

    /// The define that selects the shader permutation for the active strategy.
    pub fn shader_define_name(&self) -> &'static str {
        self.pls.shader_define_name()
    }

    pub fn pixel_local_storage(&self) -> &PixelLocalStorage {
        &self.pls
    }

    /// Wraps an existing framebuffer, `None` being the default framebuffer.
    ///
    /// Returns `Ok(None)` if the active strategy can't render into it.
    pub fn wrap_framebuffer(
        &self,
        framebuffer: Option<D::Framebuffer>,
        width: u32,
        height: u32,
    ) -> Result<Option<RenderTarget<D>>> {
        if !self.pls.can_wrap_framebuffer(framebuffer) {
            log::debug!(
                "{} can't render into framebuffer {framebuffer:?}",
                self.pls.kind()
            );
            return Ok(None);
        }
        let target = FramebufferRenderTarget::new(self.device.clone(), framebuffer, width, height)?;
        Ok(Some(target.into()))
    }

    /// Wraps a texture the caller keeps ownership of.
    pub fn wrap_texture(
        &self,
        texture: D::Texture,
        width: u32,
        height: u32,
    ) -> Result<RenderTarget<D>> {
        let mut target = TextureRenderTarget::new(
            self.device.clone(),
            width,
            height,
            TargetTextureOwnership::External,
        )?;
        target.set_target_texture(Some(texture));
        Ok(target.into())
    }

    /// Creates a render target that owns its color texture.
    pub fn make_offscreen_render_target(&self, width: u32, height: u32) -> Result<RenderTarget<D>> {
        Ok(TextureRenderTarget::new(
            self.device.clone(),
            width,
            height,
            TargetTextureOwnership::Internal,
        )?
        .into())
    }

    /// Runs one flush into `target`.
    ///
    /// The strategy is activated before `draw` runs and deactivated afterward,
    /// even when `draw` fails. If activation fails, `draw` doesn't run and the
    /// default framebuffer is rebound. The first error is returned and the
    /// frame should be discarded.
    pub fn flush<F>(
        &mut self,
        target: &mut RenderTarget<D>,
        desc: &FrameDescriptor,
        draw: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut FlushPass<'_, D>) -> Result<()>,
    {
        if let Err(err) = self.pls.activate(&self.device, target, desc) {
            log::warn!("activating {} failed: {err}", self.pls.kind());
            // Storage never began; only the binding needs undoing.
            self.device.bind_framebuffer(FramebufferTarget::Framebuffer, None);
            return Err(err);
        }
        let drawn = draw(&mut FlushPass {
            device: &self.device,
            pls: &mut self.pls,
        });
        let deactivated = self.pls.deactivate(&self.device, target, desc);
        if let Err(err) = &drawn {
            log::warn!("flush failed: {err}");
        }
        drawn.and(deactivated)
    }
}

/// Handed to the draw callback of [`RenderContext::flush`].
#[derive(Debug)]
pub struct FlushPass<'a, D: Device> {
    device: &'a D,
    pls: &'a mut PixelLocalStorage,
}

impl<D: Device> FlushPass<'_, D> {
    pub fn device(&self) -> &D {
        self.device
    }

    pub fn interlock_mode(&self) -> InterlockMode {
        self.pls.interlock_mode()
    }

    pub fn raster_ordering_enabled(&self) -> bool {
        self.pls.raster_ordering_enabled()
    }

    /// See [`PixelLocalStorage::ensure_raster_ordering_enabled`].
    pub fn ensure_raster_ordering_enabled(&mut self, enabled: bool) {
        self.pls.ensure_raster_ordering_enabled(self.device, enabled);
    }

    /// See [`PixelLocalStorage::barrier`].
    pub fn barrier(&self) {
        self.pls.barrier(self.device);
    }
}
