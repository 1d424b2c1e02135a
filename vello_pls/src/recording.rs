// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::num::NonZeroU32;
use std::rc::Rc;

use crate::device::{
    Capability, ClearValue, Device, DeviceError, FramebufferTarget, FullscreenPass, IntRect,
    LoadOp, MemoryBarrier, StoreOp, TextureFormat,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub NonZeroU32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferId(pub NonZeroU32);

/// Single call made against a [`RecordingDevice`].
#[derive(Clone, Debug, PartialEq)]
pub enum GlCommand {
    CreateTexture {
        id: TextureId,
        format: TextureFormat,
        width: u32,
        height: u32,
    },
    DeleteTexture(TextureId),
    CreateFramebuffer(FramebufferId),
    DeleteFramebuffer(FramebufferId),
    BindFramebuffer(FramebufferTarget, Option<FramebufferId>),
    DrawBuffers(u32),
    AttachTexture {
        target: FramebufferTarget,
        plane: u32,
        texture: Option<TextureId>,
    },
    FramebufferDefaultSize(u32, u32),
    AttachPixelLocalStorage {
        plane: u32,
        texture: Option<TextureId>,
    },
    BeginPixelLocalStorage(Vec<LoadOp>),
    EndPixelLocalStorage(Vec<StoreOp>),
    PixelLocalStorageBarrier,
    FramebufferFetchBarrier,
    BindImageTexture {
        unit: u32,
        texture: TextureId,
        format: TextureFormat,
    },
    MemoryBarrier(MemoryBarrier),
    SetEnabled(Capability, bool),
    ClearBuffer(u32, ClearValue),
    InvalidateFramebuffer(FramebufferTarget, Vec<u32>),
    BlitFramebuffer(IntRect),
    DrawFullscreen(FullscreenPass),
}

impl GlCommand {
    /// True for the synchronization commands a strategy issues as its barrier.
    pub fn is_barrier(&self) -> bool {
        matches!(
            self,
            Self::PixelLocalStorageBarrier | Self::FramebufferFetchBarrier | Self::MemoryBarrier(_)
        )
    }
}

#[derive(Debug)]
struct Recorder {
    commands: Vec<GlCommand>,
    next_id: NonZeroU32,
    live_textures: BTreeSet<TextureId>,
    live_framebuffers: BTreeSet<FramebufferId>,
    /// Texture creations left before allocation starts failing.
    texture_budget: Option<usize>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            next_id: NonZeroU32::MIN,
            live_textures: BTreeSet::new(),
            live_framebuffers: BTreeSet::new(),
            texture_budget: None,
        }
    }
}

impl Recorder {
    fn next_id(&mut self) -> NonZeroU32 {
        let id = self.next_id;
        self.next_id = id.saturating_add(1);
        id
    }
}

/// A [`Device`] that performs no GPU work and records every call in order.
///
/// Clones share one recording, the way clones of a real context share one GPU.
#[derive(Clone, Debug, Default)]
pub struct RecordingDevice {
    recorder: Rc<RefCell<Recorder>>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device whose texture allocations fail after `budget` successful ones.
    pub fn with_texture_budget(budget: usize) -> Self {
        let device = Self::new();
        device.recorder.borrow_mut().texture_budget = Some(budget);
        device
    }

    pub fn commands(&self) -> Vec<GlCommand> {
        self.recorder.borrow().commands.clone()
    }

    /// Returns the recorded commands, leaving the recording empty.
    pub fn take_commands(&self) -> Vec<GlCommand> {
        std::mem::take(&mut self.recorder.borrow_mut().commands)
    }

    pub fn count(&self, mut predicate: impl FnMut(&GlCommand) -> bool) -> usize {
        self.recorder
            .borrow()
            .commands
            .iter()
            .filter(|command| predicate(command))
            .count()
    }

    /// Textures created and not yet deleted.
    pub fn live_textures(&self) -> Vec<TextureId> {
        self.recorder.borrow().live_textures.iter().copied().collect()
    }

    /// Framebuffers created and not yet deleted.
    pub fn live_framebuffers(&self) -> Vec<FramebufferId> {
        self.recorder
            .borrow()
            .live_framebuffers
            .iter()
            .copied()
            .collect()
    }

    fn push(&self, command: GlCommand) {
        self.recorder.borrow_mut().commands.push(command);
    }
}

impl Device for RecordingDevice {
    type Texture = TextureId;
    type Framebuffer = FramebufferId;

    fn create_texture(
        &self,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> Result<TextureId, DeviceError> {
        let mut recorder = self.recorder.borrow_mut();
        if let Some(budget) = &mut recorder.texture_budget {
            if *budget == 0 {
                return Err(DeviceError::new("out of texture memory"));
            }
            *budget -= 1;
        }
        let id = TextureId(recorder.next_id());
        recorder.live_textures.insert(id);
        recorder.commands.push(GlCommand::CreateTexture {
            id,
            format,
            width,
            height,
        });
        Ok(id)
    }

    fn delete_texture(&self, texture: TextureId) {
        let mut recorder = self.recorder.borrow_mut();
        if !recorder.live_textures.remove(&texture) {
            log::warn!("deleting unknown texture {texture:?}");
        }
        recorder.commands.push(GlCommand::DeleteTexture(texture));
    }

    fn create_framebuffer(&self) -> Result<FramebufferId, DeviceError> {
        let mut recorder = self.recorder.borrow_mut();
        let id = FramebufferId(recorder.next_id());
        recorder.live_framebuffers.insert(id);
        recorder.commands.push(GlCommand::CreateFramebuffer(id));
        Ok(id)
    }

    fn delete_framebuffer(&self, framebuffer: FramebufferId) {
        let mut recorder = self.recorder.borrow_mut();
        if !recorder.live_framebuffers.remove(&framebuffer) {
            log::warn!("deleting unknown framebuffer {framebuffer:?}");
        }
        recorder
            .commands
            .push(GlCommand::DeleteFramebuffer(framebuffer));
    }

    fn bind_framebuffer(&self, target: FramebufferTarget, framebuffer: Option<FramebufferId>) {
        self.push(GlCommand::BindFramebuffer(target, framebuffer));
    }

    fn draw_buffers(&self, count: u32) {
        self.push(GlCommand::DrawBuffers(count));
    }

    fn attach_texture(&self, target: FramebufferTarget, plane: u32, texture: Option<TextureId>) {
        self.push(GlCommand::AttachTexture {
            target,
            plane,
            texture,
        });
    }

    fn set_framebuffer_default_size(&self, width: u32, height: u32) {
        self.push(GlCommand::FramebufferDefaultSize(width, height));
    }

    fn attach_pixel_local_storage(&self, plane: u32, texture: Option<TextureId>) {
        self.push(GlCommand::AttachPixelLocalStorage { plane, texture });
    }

    fn begin_pixel_local_storage(&self, load_ops: &[LoadOp]) {
        self.push(GlCommand::BeginPixelLocalStorage(load_ops.to_vec()));
    }

    fn end_pixel_local_storage(&self, store_ops: &[StoreOp]) {
        self.push(GlCommand::EndPixelLocalStorage(store_ops.to_vec()));
    }

    fn pixel_local_storage_barrier(&self) {
        self.push(GlCommand::PixelLocalStorageBarrier);
    }

    fn framebuffer_fetch_barrier(&self) {
        self.push(GlCommand::FramebufferFetchBarrier);
    }

    fn bind_image_texture(&self, unit: u32, texture: TextureId, format: TextureFormat) {
        self.push(GlCommand::BindImageTexture {
            unit,
            texture,
            format,
        });
    }

    fn memory_barrier(&self, barrier: MemoryBarrier) {
        self.push(GlCommand::MemoryBarrier(barrier));
    }

    fn set_enabled(&self, capability: Capability, enabled: bool) {
        self.push(GlCommand::SetEnabled(capability, enabled));
    }

    fn clear_buffer(&self, plane: u32, value: ClearValue) {
        self.push(GlCommand::ClearBuffer(plane, value));
    }

    fn invalidate_framebuffer(&self, target: FramebufferTarget, planes: &[u32]) {
        self.push(GlCommand::InvalidateFramebuffer(target, planes.to_vec()));
    }

    fn blit_framebuffer(&self, bounds: IntRect) {
        self.push(GlCommand::BlitFramebuffer(bounds));
    }

    fn draw_fullscreen(&self, pass: FullscreenPass) {
        self.push(GlCommand::DrawFullscreen(pass));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_tracked() {
        let device = RecordingDevice::new();
        let a = device.create_texture(TextureFormat::Rgba8, 4, 4).unwrap();
        let b = device.create_texture(TextureFormat::R32Uint, 4, 4).unwrap();
        let fb = device.create_framebuffer().unwrap();
        assert_ne!(a, b);
        assert_ne!(a.0, fb.0);
        assert_eq!(device.live_textures(), [a, b]);
        device.delete_texture(a);
        device.delete_framebuffer(fb);
        assert_eq!(device.live_textures(), [b]);
        assert!(device.live_framebuffers().is_empty());
        assert_eq!(device.commands().len(), 5);
    }

    #[test]
    fn budget_limits_textures() {
        let device = RecordingDevice::with_texture_budget(1);
        assert!(device.create_texture(TextureFormat::Rgba8, 1, 1).is_ok());
        let err = device.create_texture(TextureFormat::Rgba8, 1, 1).unwrap_err();
        assert_eq!(err, DeviceError::new("out of texture memory"));
        assert_eq!(device.live_textures().len(), 1);
    }

    #[test]
    fn clones_share_the_recording() {
        let device = RecordingDevice::new();
        device.clone().draw_buffers(2);
        assert_eq!(device.take_commands(), [GlCommand::DrawBuffers(2)]);
        assert!(device.commands().is_empty());
        device.framebuffer_fetch_barrier();
        assert_eq!(device.count(GlCommand::is_barrier), 1);
    }
}
