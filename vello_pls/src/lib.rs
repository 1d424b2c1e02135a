// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vello PLS renders antialiased vector paths with pixel local storage.
//!
//! Every path is drawn in one pass that reads and writes hidden per-pixel
//! planes (coverage, clip and the original destination color) next to the
//! color plane. How those planes are reached depends on the hardware, so a
//! [`RenderContext`] picks one of four strategies when it is created:
//!
//! 1. [`StrategyKind::NativeExtension`]: `EXT_shader_pixel_local_storage`.
//! 2. [`StrategyKind::FramebufferFetch`]: `EXT_shader_framebuffer_fetch`.
//! 3. [`StrategyKind::EmulatedExtension`]: `ANGLE_shader_pixel_local_storage`.
//! 4. [`StrategyKind::AtomicReadWriteTexture`]: storage images, with atomics
//!    and a resolve pass when fragment interlock is missing.
//!
//! The graphics API is reached through the [`Device`] trait.
//! [`RecordingDevice`] implements it without a GPU, which is what the tests
//! and the `pls_trace` demo use.
//!
//! ```
//! use vello_pls::{FrameDescriptor, GlCapabilities, RecordingDevice, RenderContext};
//!
//! let caps = GlCapabilities::from_extensions(["GL_EXT_shader_framebuffer_fetch"]);
//! let device = RecordingDevice::new();
//! let mut context = RenderContext::new(device.clone(), caps, Default::default())?;
//! let mut target = context.make_offscreen_render_target(64, 64)?;
//! context.flush(&mut target, &FrameDescriptor::new(64, 64), |pass| {
//!     pass.ensure_raster_ordering_enabled(true);
//!     Ok(())
//! })?;
//! assert!(!device.commands().is_empty());
//! # Ok::<(), vello_pls::Error>(())
//! ```

// LINEBENDER LINT SET - lib.rs - v2
// See https://linebender.org/wiki/canonical-lints/
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![allow(missing_docs, reason = "We have many as-yet undocumented items.")]

mod context;
mod device;
mod frame;
mod pls;
mod recording;
mod render_target;

use thiserror::Error;

pub use peniko;
pub use vello_pls_encoding;

pub use context::{FlushPass, RenderContext, RenderContextOptions};
pub use device::{
    Capability, ClearValue, Device, DeviceError, FramebufferTarget, FullscreenPass,
    GlCapabilities, IntRect, LoadOp, MemoryBarrier, StoreOp, TextureFormat,
};
pub use frame::{FrameDescriptor, InterlockMode, LoadAction};
pub use pls::{
    EmulatedExtension, FramebufferFetch, NativeExtension, PixelLocalStorage, ReadWriteTexture,
    StrategyKind, UnknownStrategy,
};
pub use recording::{FramebufferId, GlCommand, RecordingDevice, TextureId};
pub use render_target::{
    FramebufferRenderTarget, Plane, PlaneState, PlaneSync, RenderTarget,
    TargetTextureOwnership, TextureRenderTarget,
};

/// Errors that can occur in Vello PLS.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// None of the pixel local storage strategies can run on this device.
    #[error("Couldn't find a pixel local storage strategy supported by the device")]
    UnsupportedDevice,
    /// Render targets need a nonzero width and height.
    #[error("Invalid render target size {width}x{height}")]
    InvalidRenderTargetSize { width: u32, height: u32 },
    /// The device failed to allocate a plane.
    #[error("Couldn't allocate {format:?} texture of size {width}x{height}")]
    TextureAllocation {
        format: TextureFormat,
        width: u32,
        height: u32,
        #[source]
        source: DeviceError,
    },
    /// The device failed to allocate a framebuffer object.
    #[error("Couldn't allocate framebuffer")]
    FramebufferAllocation(#[source] DeviceError),
}

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;
