// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The graphics API as seen by the renderer.

use std::fmt::Debug;

use thiserror::Error;

/// An error reported by a [`Device`] implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct DeviceError(pub String);

impl DeviceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<&str> for DeviceError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// `GL_RGBA8`
    Rgba8,
    /// `GL_R32UI`
    R32Uint,
}

/// Which framebuffer binding point a call applies to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FramebufferTarget {
    /// Both draw and read.
    Framebuffer,
    Draw,
    Read,
}

/// Device state toggled with `glEnable`/`glDisable`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `GL_SHADER_PIXEL_LOCAL_STORAGE_EXT`
    ShaderPixelLocalStorage,
    /// `GL_FRAMEBUFFER_FETCH_NONCOHERENT_QCOM`
    FramebufferFetchNoncoherent,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MemoryBarrier {
    /// `GL_SHADER_IMAGE_ACCESS_BARRIER_BIT`
    ShaderImageAccess,
    /// `GL_ALL_BARRIER_BITS`
    All,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ClearValue {
    Float([f32; 4]),
    Uint(u32),
}

/// How a pixel local storage plane is initialized when storage begins.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum LoadOp {
    Load,
    Clear(ClearValue),
    Zero,
    DontCare,
    /// The plane is not bound for this pass.
    Disable,
}

/// What happens to a pixel local storage plane when storage ends.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Store,
    DontCare,
}

/// A fullscreen draw issued by the strategies themselves rather than by callers.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FullscreenPass {
    /// Copies the framebuffer into pixel local storage and initializes the hidden planes.
    PlsLoad {
        color: LoadOp,
        coverage_clear_value: u32,
    },
    /// Writes pixel local storage color back into the framebuffer.
    PlsStore,
    /// Converts the atomic accumulation planes into final color.
    AtomicResolve,
}

/// Integer rectangle in framebuffer pixels, `right` and `bottom` exclusive.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl IntRect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(
            0,
            0,
            width.min(i32::MAX as u32) as i32,
            height.min(i32::MAX as u32) as i32,
        )
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

/// The subset of an OpenGL style API the renderer drives.
///
/// Handles are plain values and the device is cheap to clone, so render
/// targets keep their own copy to release resources on drop. Plane arguments
/// are the plane indices from [`vello_pls_encoding::constants`]; they double
/// as color attachment offsets, pixel local storage bindings and image units.
pub trait Device: Clone {
    type Texture: Copy + Eq + Debug;
    type Framebuffer: Copy + Eq + Debug;

    fn create_texture(
        &self,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> Result<Self::Texture, DeviceError>;

    /// Only called with textures the renderer created.
    fn delete_texture(&self, texture: Self::Texture);

    fn create_framebuffer(&self) -> Result<Self::Framebuffer, DeviceError>;

    fn delete_framebuffer(&self, framebuffer: Self::Framebuffer);

    /// `None` binds the default framebuffer.
    fn bind_framebuffer(&self, target: FramebufferTarget, framebuffer: Option<Self::Framebuffer>);

    /// Enables color attachments `0..count` of the bound draw framebuffer.
    fn draw_buffers(&self, count: u32);

    fn attach_texture(&self, target: FramebufferTarget, plane: u32, texture: Option<Self::Texture>);

    /// Declares the size of the bound draw framebuffer when it has no attachments.
    fn set_framebuffer_default_size(&self, width: u32, height: u32);

    fn attach_pixel_local_storage(&self, plane: u32, texture: Option<Self::Texture>);

    /// One load op per plane, in plane order.
    fn begin_pixel_local_storage(&self, load_ops: &[LoadOp]);

    /// One store op per plane, in plane order.
    fn end_pixel_local_storage(&self, store_ops: &[StoreOp]);

    fn pixel_local_storage_barrier(&self);

    fn framebuffer_fetch_barrier(&self);

    fn bind_image_texture(&self, unit: u32, texture: Self::Texture, format: TextureFormat);

    fn memory_barrier(&self, barrier: MemoryBarrier);

    fn set_enabled(&self, capability: Capability, enabled: bool);

    /// Clears one color attachment of the bound draw framebuffer.
    fn clear_buffer(&self, plane: u32, value: ClearValue);

    fn invalidate_framebuffer(&self, target: FramebufferTarget, planes: &[u32]);

    /// Copies `bounds` from the read framebuffer to the draw framebuffer.
    fn blit_framebuffer(&self, bounds: IntRect);

    fn draw_fullscreen(&self, pass: FullscreenPass);
}

/// The extensions that decide which pixel local storage strategies can run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct GlCapabilities {
    pub ext_shader_pixel_local_storage: bool,
    pub ext_shader_framebuffer_fetch: bool,
    pub qcom_shader_framebuffer_fetch_noncoherent: bool,
    /// `ANGLE_shader_pixel_local_storage`, or its WebGL counterpart.
    pub angle_shader_pixel_local_storage: bool,
    pub arb_shader_image_load_store: bool,
    pub arb_fragment_shader_interlock: bool,
    pub intel_fragment_shader_ordering: bool,
}

impl GlCapabilities {
    /// Parses extension names as reported by `GL_EXTENSIONS`, with or without the `GL_` prefix.
    ///
    /// Unknown names are ignored.
    pub fn from_extensions<'a>(extensions: impl IntoIterator<Item = &'a str>) -> Self {
        let mut caps = Self::default();
        for name in extensions {
            let name = name.trim();
            match name.strip_prefix("GL_").unwrap_or(name) {
                "EXT_shader_pixel_local_storage" => caps.ext_shader_pixel_local_storage = true,
                "EXT_shader_framebuffer_fetch" => caps.ext_shader_framebuffer_fetch = true,
                "QCOM_shader_framebuffer_fetch_noncoherent" => {
                    caps.qcom_shader_framebuffer_fetch_noncoherent = true;
                }
                "ANGLE_shader_pixel_local_storage" | "WEBGL_shader_pixel_local_storage" => {
                    caps.angle_shader_pixel_local_storage = true;
                }
                "ARB_shader_image_load_store" => caps.arb_shader_image_load_store = true,
                "ARB_fragment_shader_interlock" => caps.arb_fragment_shader_interlock = true,
                "INTEL_fragment_shader_ordering" => caps.intel_fragment_shader_ordering = true,
                other => log::trace!("ignoring extension {other}"),
            }
        }
        caps
    }
}
