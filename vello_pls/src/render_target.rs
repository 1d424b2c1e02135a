// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render targets and the planes backing them.
//!
//! A render target owns up to four planes: the color texture it renders to and
//! the coverage, clip and original destination color planes used by pixel
//! local storage. Planes are allocated lazily, only in the combination the
//! active strategy needs, and each tracks whether it still has to be attached
//! to the internal framebuffer and bound as pixel local storage. Those two
//! states are independent because the bindings live on different framebuffers.

use vello_pls_encoding::constants::{
    CLIP_PLANE_IDX, COVERAGE_PLANE_IDX, FRAMEBUFFER_PLANE_IDX, ORIGINAL_DST_COLOR_PLANE_IDX,
};

use crate::device::{Device, FramebufferTarget, TextureFormat};
use crate::frame::InterlockMode;
use crate::{Error, GlCapabilities, Result};

/// One of the four planes of a render target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Plane {
    /// The target texture itself.
    Color,
    Coverage,
    Clip,
    OriginalDstColor,
}

impl Plane {
    pub const ALL: [Self; 4] = [
        Self::Color,
        Self::Coverage,
        Self::Clip,
        Self::OriginalDstColor,
    ];

    /// The planes a render target allocates for itself.
    pub const INTERNAL: [Self; 3] = [Self::Coverage, Self::Clip, Self::OriginalDstColor];

    /// Attachment offset, pixel local storage binding and image unit.
    pub const fn index(self) -> u32 {
        match self {
            Self::Color => FRAMEBUFFER_PLANE_IDX,
            Self::Coverage => COVERAGE_PLANE_IDX,
            Self::Clip => CLIP_PLANE_IDX,
            Self::OriginalDstColor => ORIGINAL_DST_COLOR_PLANE_IDX,
        }
    }

    pub const fn format(self) -> TextureFormat {
        match self {
            Self::Color | Self::OriginalDstColor => TextureFormat::Rgba8,
            Self::Coverage | Self::Clip => TextureFormat::R32Uint,
        }
    }

    /// Whether a strategy running in `interlock_mode` needs this internal plane.
    pub const fn is_required(self, interlock_mode: InterlockMode) -> bool {
        match self {
            Self::Color | Self::Coverage | Self::Clip => true,
            Self::OriginalDstColor => matches!(interlock_mode, InterlockMode::RasterOrdered),
        }
    }
}

/// Whether a binding of a plane matches the plane's current texture.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlaneSync {
    #[default]
    Clean,
    /// The binding must be reissued before the plane is used.
    Dirty,
}

/// Allocation and binding state of one plane.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PlaneState<T> {
    pub texture: Option<T>,
    /// Color attachment of the internal framebuffer.
    pub attachment: PlaneSync,
    /// Pixel local storage binding of the headless framebuffer.
    pub pls_binding: PlaneSync,
}

impl<T> Default for PlaneState<T> {
    fn default() -> Self {
        Self {
            texture: None,
            attachment: PlaneSync::Clean,
            pls_binding: PlaneSync::Clean,
        }
    }
}

impl<T> PlaneState<T> {
    fn set_texture(&mut self, texture: Option<T>) {
        self.texture = texture;
        self.attachment = PlaneSync::Dirty;
        self.pls_binding = PlaneSync::Dirty;
    }
}

/// Who releases the color texture of a [`TextureRenderTarget`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TargetTextureOwnership {
    /// The render target allocates the texture and deletes it on drop.
    Internal,
    /// The caller supplies the texture through
    /// [`TextureRenderTarget::set_target_texture`] and keeps ownership.
    External,
}

fn check_size(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidRenderTargetSize { width, height });
    }
    Ok(())
}

fn make_backing_texture<D: Device>(
    device: &D,
    format: TextureFormat,
    width: u32,
    height: u32,
) -> Result<D::Texture> {
    let texture = device
        .create_texture(format, width, height)
        .map_err(|source| Error::TextureAllocation {
            format,
            width,
            height,
            source,
        })?;
    log::debug!("allocated {format:?} texture {texture:?} ({width}x{height})");
    Ok(texture)
}

fn make_framebuffer<D: Device>(device: &D) -> Result<D::Framebuffer> {
    device
        .create_framebuffer()
        .map_err(Error::FramebufferAllocation)
}

/// A render target that draws into a texture.
#[derive(Debug)]
pub struct TextureRenderTarget<D: Device> {
    device: D,
    width: u32,
    height: u32,
    ownership: TargetTextureOwnership,
    planes: [PlaneState<D::Texture>; 4],
    framebuffer: Option<D::Framebuffer>,
    headless_framebuffer: Option<D::Framebuffer>,
    draw_buffer_count: Option<u32>,
}

impl<D: Device> TextureRenderTarget<D> {
    /// With [`TargetTextureOwnership::Internal`] the color texture is allocated here.
    pub fn new(
        device: D,
        width: u32,
        height: u32,
        ownership: TargetTextureOwnership,
    ) -> Result<Self> {
        check_size(width, height)?;
        let mut target = Self {
            device,
            width,
            height,
            ownership,
            planes: Default::default(),
            framebuffer: None,
            headless_framebuffer: None,
            draw_buffer_count: None,
        };
        // The color plane is always bound, even before a texture is supplied.
        target.plane_mut(Plane::Color).set_texture(None);
        if ownership == TargetTextureOwnership::Internal {
            target.allocate_target_texture()?;
        }
        Ok(target)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn ownership(&self) -> TargetTextureOwnership {
        self.ownership
    }

    pub fn target_texture(&self) -> Option<D::Texture> {
        self.plane(Plane::Color).texture
    }

    pub fn plane_state(&self, plane: Plane) -> PlaneState<D::Texture> {
        *self.plane(plane)
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    fn plane(&self, plane: Plane) -> &PlaneState<D::Texture> {
        &self.planes[plane.index() as usize]
    }

    fn plane_mut(&mut self, plane: Plane) -> &mut PlaneState<D::Texture> {
        &mut self.planes[plane.index() as usize]
    }

    fn allocate_target_texture(&mut self) -> Result<()> {
        let texture = make_backing_texture(
            &self.device,
            Plane::Color.format(),
            self.width,
            self.height,
        )?;
        self.plane_mut(Plane::Color).set_texture(Some(texture));
        Ok(())
    }

    /// Replaces the color texture with one the caller owns.
    ///
    /// A texture previously allocated by the render target is released, and the
    /// target is externally owned from then on.
    pub fn set_target_texture(&mut self, texture: Option<D::Texture>) {
        let current = self.target_texture();
        if current == texture {
            return;
        }
        if self.ownership == TargetTextureOwnership::Internal {
            if let Some(owned) = current {
                self.device.delete_texture(owned);
            }
            self.ownership = TargetTextureOwnership::External;
        }
        self.plane_mut(Plane::Color).set_texture(texture);
    }

    /// Allocates the coverage and clip planes, plus the original destination
    /// color plane when `interlock_mode` is raster ordered.
    ///
    /// Planes that already exist are left alone.
    pub fn allocate_internal_planes(&mut self, interlock_mode: InterlockMode) -> Result<()> {
        for plane in Plane::INTERNAL {
            if !plane.is_required(interlock_mode) || self.plane(plane).texture.is_some() {
                continue;
            }
            let texture =
                make_backing_texture(&self.device, plane.format(), self.width, self.height)?;
            self.plane_mut(plane).set_texture(Some(texture));
        }
        Ok(())
    }

    /// Binds the internal framebuffer, with every plane as a color attachment.
    ///
    /// Only dirty attachments are reissued, and draw buffers only change when
    /// `draw_buffer_count` does.
    pub fn bind_internal_framebuffer(
        &mut self,
        target: FramebufferTarget,
        draw_buffer_count: u32,
    ) -> Result<()> {
        let framebuffer = match self.framebuffer {
            Some(framebuffer) => framebuffer,
            None => {
                let framebuffer = make_framebuffer(&self.device)?;
                debug_assert_eq!(self.plane(Plane::Color).attachment, PlaneSync::Dirty);
                self.framebuffer = Some(framebuffer);
                framebuffer
            }
        };
        self.device.bind_framebuffer(target, Some(framebuffer));

        if target != FramebufferTarget::Read && self.draw_buffer_count != Some(draw_buffer_count) {
            debug_assert!(draw_buffer_count <= Plane::ALL.len() as u32);
            let count = draw_buffer_count.min(Plane::ALL.len() as u32);
            self.device.draw_buffers(count);
            self.draw_buffer_count = Some(count);
        }

        for plane in Plane::ALL {
            let state = self.plane_mut(plane);
            if state.attachment == PlaneSync::Dirty {
                let texture = state.texture;
                state.attachment = PlaneSync::Clean;
                self.device.attach_texture(target, plane.index(), texture);
            }
        }
        Ok(())
    }

    /// Binds a framebuffer without attachments, for strategies that reach the
    /// planes through pixel local storage bindings or storage images.
    pub fn bind_headless_framebuffer(&mut self, capabilities: &GlCapabilities) -> Result<()> {
        match self.headless_framebuffer {
            Some(framebuffer) => {
                self.device
                    .bind_framebuffer(FramebufferTarget::Draw, Some(framebuffer));
            }
            None => {
                let framebuffer = make_framebuffer(&self.device)?;
                self.headless_framebuffer = Some(framebuffer);
                self.device
                    .bind_framebuffer(FramebufferTarget::Draw, Some(framebuffer));
                if capabilities.arb_shader_image_load_store {
                    self.device
                        .set_framebuffer_default_size(self.width, self.height);
                }
                self.device.draw_buffers(0);
            }
        }

        if capabilities.angle_shader_pixel_local_storage {
            for plane in Plane::ALL {
                let state = self.plane_mut(plane);
                if state.pls_binding == PlaneSync::Dirty {
                    let texture = state.texture;
                    state.pls_binding = PlaneSync::Clean;
                    self.device.attach_pixel_local_storage(plane.index(), texture);
                }
            }
        }
        Ok(())
    }

    /// Binds every allocated plane as a read/write storage image.
    pub fn bind_as_image_textures(&self) {
        for plane in Plane::ALL {
            if let Some(texture) = self.plane(plane).texture {
                self.device
                    .bind_image_texture(plane.index(), texture, plane.format());
            }
        }
    }

    /// Changes the size of the render target.
    ///
    /// Internal planes are released and reallocated on next use. An internally
    /// owned color texture is reallocated right away; an external one must be
    /// replaced by the caller.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        check_size(width, height)?;
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        log::debug!(
            "resizing render target from {}x{} to {width}x{height}",
            self.width,
            self.height
        );
        self.width = width;
        self.height = height;
        for plane in Plane::INTERNAL {
            if let Some(texture) = self.plane(plane).texture {
                self.device.delete_texture(texture);
                self.plane_mut(plane).set_texture(None);
            }
        }
        // Its declared default size is stale.
        if let Some(framebuffer) = self.headless_framebuffer.take() {
            self.device.delete_framebuffer(framebuffer);
            for state in &mut self.planes {
                state.pls_binding = PlaneSync::Dirty;
            }
        }
        if self.ownership == TargetTextureOwnership::Internal {
            if let Some(texture) = self.target_texture() {
                self.device.delete_texture(texture);
            }
            self.plane_mut(Plane::Color).set_texture(None);
            self.allocate_target_texture()?;
        }
        Ok(())
    }
}

impl<D: Device> Drop for TextureRenderTarget<D> {
    fn drop(&mut self) {
        for framebuffer in [self.framebuffer.take(), self.headless_framebuffer.take()]
            .into_iter()
            .flatten()
        {
            self.device.delete_framebuffer(framebuffer);
        }
        for plane in Plane::INTERNAL {
            if let Some(texture) = self.plane_mut(plane).texture.take() {
                self.device.delete_texture(texture);
            }
        }
        if self.ownership == TargetTextureOwnership::Internal {
            if let Some(texture) = self.plane_mut(Plane::Color).texture.take() {
                self.device.delete_texture(texture);
            }
        }
    }
}

/// A render target that presents into a framebuffer it doesn't own.
///
/// Strategies that can't draw into the framebuffer directly render into an
/// offscreen color texture, allocated on first use, and copy the result over.
#[derive(Debug)]
pub struct FramebufferRenderTarget<D: Device> {
    /// `None` is the default framebuffer.
    external_framebuffer: Option<D::Framebuffer>,
    offscreen_texture: Option<D::Texture>,
    texture_target: TextureRenderTarget<D>,
}

impl<D: Device> FramebufferRenderTarget<D> {
    pub fn new(
        device: D,
        framebuffer: Option<D::Framebuffer>,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        Ok(Self {
            external_framebuffer: framebuffer,
            offscreen_texture: None,
            texture_target: TextureRenderTarget::new(
                device,
                width,
                height,
                TargetTextureOwnership::External,
            )?,
        })
    }

    pub fn width(&self) -> u32 {
        self.texture_target.width()
    }

    pub fn height(&self) -> u32 {
        self.texture_target.height()
    }

    pub fn external_framebuffer(&self) -> Option<D::Framebuffer> {
        self.external_framebuffer
    }

    pub fn offscreen_texture(&self) -> Option<D::Texture> {
        self.offscreen_texture
    }

    /// The offscreen texture target with the internal planes.
    pub fn texture_target(&self) -> &TextureRenderTarget<D> {
        &self.texture_target
    }

    pub fn texture_target_mut(&mut self) -> &mut TextureRenderTarget<D> {
        &mut self.texture_target
    }

    pub fn bind_external_framebuffer(&self, target: FramebufferTarget) {
        self.texture_target
            .device()
            .bind_framebuffer(target, self.external_framebuffer);
    }

    /// Allocates the offscreen color texture, once per render target size.
    pub fn allocate_offscreen_target_texture(&mut self) -> Result<()> {
        if self.offscreen_texture.is_none() {
            let texture = make_backing_texture(
                self.texture_target.device(),
                Plane::Color.format(),
                self.width(),
                self.height(),
            )?;
            self.offscreen_texture = Some(texture);
            self.texture_target.set_target_texture(Some(texture));
        }
        Ok(())
    }

    pub fn allocate_internal_planes(&mut self, interlock_mode: InterlockMode) -> Result<()> {
        self.texture_target.allocate_internal_planes(interlock_mode)
    }

    pub fn bind_internal_framebuffer(
        &mut self,
        target: FramebufferTarget,
        draw_buffer_count: u32,
    ) -> Result<()> {
        self.texture_target
            .bind_internal_framebuffer(target, draw_buffer_count)
    }

    pub fn bind_headless_framebuffer(&mut self, capabilities: &GlCapabilities) -> Result<()> {
        self.texture_target.bind_headless_framebuffer(capabilities)
    }

    pub fn bind_as_image_textures(&self) {
        self.texture_target.bind_as_image_textures();
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        check_size(width, height)?;
        if (width, height) == (self.width(), self.height()) {
            return Ok(());
        }
        if let Some(texture) = self.offscreen_texture.take() {
            self.texture_target.set_target_texture(None);
            self.texture_target.device().delete_texture(texture);
        }
        self.texture_target.resize(width, height)
    }
}

impl<D: Device> Drop for FramebufferRenderTarget<D> {
    fn drop(&mut self) {
        // The inner target treats this texture as external and won't release it.
        if let Some(texture) = self.offscreen_texture.take() {
            self.texture_target.device().delete_texture(texture);
        }
    }
}

/// A surface a render context can flush into.
#[derive(Debug)]
pub enum RenderTarget<D: Device> {
    Texture(TextureRenderTarget<D>),
    Framebuffer(FramebufferRenderTarget<D>),
}

impl<D: Device> RenderTarget<D> {
    pub fn width(&self) -> u32 {
        match self {
            Self::Texture(target) => target.width(),
            Self::Framebuffer(target) => target.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Texture(target) => target.height(),
            Self::Framebuffer(target) => target.height(),
        }
    }

    /// The texture target holding the planes.
    pub fn texture_target(&self) -> &TextureRenderTarget<D> {
        match self {
            Self::Texture(target) => target,
            Self::Framebuffer(target) => target.texture_target(),
        }
    }

    pub fn texture_target_mut(&mut self) -> &mut TextureRenderTarget<D> {
        match self {
            Self::Texture(target) => target,
            Self::Framebuffer(target) => target.texture_target_mut(),
        }
    }

    pub fn plane_state(&self, plane: Plane) -> PlaneState<D::Texture> {
        self.texture_target().plane_state(plane)
    }

    pub fn allocate_internal_planes(&mut self, interlock_mode: InterlockMode) -> Result<()> {
        self.texture_target_mut()
            .allocate_internal_planes(interlock_mode)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        match self {
            Self::Texture(target) => target.resize(width, height),
            Self::Framebuffer(target) => target.resize(width, height),
        }
    }
}

impl<D: Device> From<TextureRenderTarget<D>> for RenderTarget<D> {
    fn from(target: TextureRenderTarget<D>) -> Self {
        Self::Texture(target)
    }
}

impl<D: Device> From<FramebufferRenderTarget<D>> for RenderTarget<D> {
    fn from(target: FramebufferRenderTarget<D>) -> Self {
        Self::Framebuffer(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{GlCommand, RecordingDevice};

    fn is_create(command: &GlCommand) -> bool {
        matches!(command, GlCommand::CreateTexture { .. })
    }

    #[test]
    fn zero_size_is_rejected() {
        let device = RecordingDevice::new();
        let err =
            TextureRenderTarget::new(device.clone(), 0, 10, TargetTextureOwnership::Internal)
                .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidRenderTargetSize {
                width: 0,
                height: 10
            }
        ));
        assert!(FramebufferRenderTarget::new(device.clone(), None, 10, 0).is_err());
        assert!(device.commands().is_empty());
    }

    #[test]
    fn atomics_skip_original_dst_color() {
        let device = RecordingDevice::new();
        let mut target =
            TextureRenderTarget::new(device.clone(), 8, 8, TargetTextureOwnership::External)
                .unwrap();
        target
            .allocate_internal_planes(InterlockMode::Atomics)
            .unwrap();
        assert_eq!(device.count(is_create), 2);
        assert!(target
            .plane_state(Plane::OriginalDstColor)
            .texture
            .is_none());
        assert_eq!(
            target.plane_state(Plane::OriginalDstColor).attachment,
            PlaneSync::Clean
        );

        // Switching to raster ordering adds only the missing plane.
        target
            .allocate_internal_planes(InterlockMode::RasterOrdered)
            .unwrap();
        assert_eq!(device.count(is_create), 3);
    }

    #[test]
    fn attachments_are_reissued_only_when_dirty() {
        let device = RecordingDevice::new();
        let mut target =
            TextureRenderTarget::new(device.clone(), 8, 8, TargetTextureOwnership::Internal)
                .unwrap();
        target
            .allocate_internal_planes(InterlockMode::RasterOrdered)
            .unwrap();
        device.take_commands();

        target
            .bind_internal_framebuffer(FramebufferTarget::Framebuffer, 4)
            .unwrap();
        let attaches = |device: &RecordingDevice| {
            device.count(|c| matches!(c, GlCommand::AttachTexture { .. }))
        };
        assert_eq!(attaches(&device), 4);
        assert_eq!(device.count(|c| matches!(c, GlCommand::DrawBuffers(4))), 1);
        for plane in Plane::ALL {
            assert_eq!(target.plane_state(plane).attachment, PlaneSync::Clean);
            assert_eq!(target.plane_state(plane).pls_binding, PlaneSync::Dirty);
        }

        device.take_commands();
        target
            .bind_internal_framebuffer(FramebufferTarget::Framebuffer, 4)
            .unwrap();
        assert_eq!(
            device.take_commands(),
            [GlCommand::BindFramebuffer(
                FramebufferTarget::Framebuffer,
                target.framebuffer
            )]
        );

        // Read bindings never touch draw buffers.
        target
            .bind_internal_framebuffer(FramebufferTarget::Read, 1)
            .unwrap();
        assert_eq!(device.count(|c| matches!(c, GlCommand::DrawBuffers(_))), 0);
    }

    #[test]
    fn headless_framebuffer_binds_pixel_local_storage() {
        let device = RecordingDevice::new();
        let caps = GlCapabilities {
            angle_shader_pixel_local_storage: true,
            ..Default::default()
        };
        let mut target =
            TextureRenderTarget::new(device.clone(), 8, 8, TargetTextureOwnership::Internal)
                .unwrap();
        target
            .allocate_internal_planes(InterlockMode::RasterOrdered)
            .unwrap();
        device.take_commands();
        target.bind_headless_framebuffer(&caps).unwrap();
        let commands = device.take_commands();
        assert!(commands.contains(&GlCommand::DrawBuffers(0)));
        assert!(!commands
            .iter()
            .any(|c| matches!(c, GlCommand::FramebufferDefaultSize(..))));
        assert_eq!(
            commands
                .iter()
                .filter(|c| matches!(c, GlCommand::AttachPixelLocalStorage { .. }))
                .count(),
            4
        );

        target.bind_headless_framebuffer(&caps).unwrap();
        assert_eq!(device.commands().len(), 1);
    }

    #[test]
    fn headless_framebuffer_declares_size_for_image_load_store() {
        let device = RecordingDevice::new();
        let caps = GlCapabilities {
            arb_shader_image_load_store: true,
            ..Default::default()
        };
        let mut target =
            TextureRenderTarget::new(device.clone(), 30, 20, TargetTextureOwnership::Internal)
                .unwrap();
        target.bind_headless_framebuffer(&caps).unwrap();
        assert_eq!(
            device.count(|c| *c == GlCommand::FramebufferDefaultSize(30, 20)),
            1
        );
        assert_eq!(
            device.count(|c| matches!(c, GlCommand::AttachPixelLocalStorage { .. })),
            0
        );
    }

    #[test]
    fn image_bindings_cover_allocated_planes() {
        let device = RecordingDevice::new();
        let mut target =
            TextureRenderTarget::new(device.clone(), 8, 8, TargetTextureOwnership::Internal)
                .unwrap();
        target
            .allocate_internal_planes(InterlockMode::Atomics)
            .unwrap();
        device.take_commands();
        target.bind_as_image_textures();
        let units: Vec<_> = device
            .commands()
            .iter()
            .filter_map(|c| match c {
                GlCommand::BindImageTexture { unit, format, .. } => Some((*unit, *format)),
                _ => None,
            })
            .collect();
        assert_eq!(
            units,
            [
                (0, TextureFormat::Rgba8),
                (1, TextureFormat::R32Uint),
                (2, TextureFormat::R32Uint)
            ]
        );
    }

    #[test]
    fn set_target_texture_releases_owned_texture() {
        let device = RecordingDevice::new();
        let mut target =
            TextureRenderTarget::new(device.clone(), 8, 8, TargetTextureOwnership::Internal)
                .unwrap();
        let owned = target.target_texture().unwrap();
        let external = device.create_texture(TextureFormat::Rgba8, 8, 8).unwrap();
        target.set_target_texture(Some(external));
        assert_eq!(target.ownership(), TargetTextureOwnership::External);
        assert_eq!(device.live_textures(), [external]);
        assert!(!device.live_textures().contains(&owned));
        drop(target);
        assert_eq!(device.live_textures(), [external]);
    }
}
