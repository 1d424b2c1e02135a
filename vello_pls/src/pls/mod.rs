// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel local storage, selected at runtime from one of four strategies.
//!
//! Each strategy gives the draw shaders read/modify/write access to the color,
//! coverage, clip and original destination color planes of a render target,
//! using whatever mechanism the hardware offers. They are tried in order of
//! preference and the first one the device supports is used.

mod emulated;
mod framebuffer_fetch;
mod native;
mod read_write_texture;

use std::fmt;
use std::str::FromStr;

use vello_pls_encoding::constants::{CLIP_PLANE_IDX, COVERAGE_PLANE_IDX, FRAMEBUFFER_PLANE_IDX};
use vello_pls_encoding::ShaderFeatures;

use crate::device::{ClearValue, Device, FramebufferTarget, LoadOp};
use crate::frame::{FrameDescriptor, InterlockMode, LoadAction};
use crate::render_target::{FramebufferRenderTarget, RenderTarget};
use crate::{Error, GlCapabilities, Result};

pub use emulated::EmulatedExtension;
pub use framebuffer_fetch::FramebufferFetch;
pub use native::NativeExtension;
pub use read_write_texture::ReadWriteTexture;

/// Names the four strategies, in order of preference.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// `EXT_shader_pixel_local_storage`
    NativeExtension,
    /// `EXT_shader_framebuffer_fetch`
    FramebufferFetch,
    /// `ANGLE_shader_pixel_local_storage`
    EmulatedExtension,
    /// `ARB_shader_image_load_store`, with atomics when fragment interlock is missing.
    AtomicReadWriteTexture,
}

impl StrategyKind {
    /// Every strategy, most preferred first.
    pub const PROBE_ORDER: [Self; 4] = [
        Self::NativeExtension,
        Self::FramebufferFetch,
        Self::EmulatedExtension,
        Self::AtomicReadWriteTexture,
    ];

    /// Name of the environment variable read by [`StrategyKind::from_env`].
    pub const ENV_VAR: &'static str = "VELLO_PLS_STRATEGY";

    /// Reads a preferred strategy from `VELLO_PLS_STRATEGY`.
    ///
    /// Returns `None` when the variable is unset or not a strategy name.
    pub fn from_env() -> Option<Self> {
        let value = std::env::var(Self::ENV_VAR).ok()?;
        match value.parse() {
            Ok(kind) => Some(kind),
            Err(err) => {
                log::warn!("ignoring {}: {err}", Self::ENV_VAR);
                None
            }
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::NativeExtension => "native",
            Self::FramebufferFetch => "framebuffer_fetch",
            Self::EmulatedExtension => "emulated",
            Self::AtomicReadWriteTexture => "read_write_texture",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A string that doesn't name a [`StrategyKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pixel local storage strategy `{0}`")]
pub struct UnknownStrategy(pub String);

impl FromStr for StrategyKind {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "native" | "native_extension" | "ext" => Ok(Self::NativeExtension),
            "framebuffer_fetch" | "fetch" => Ok(Self::FramebufferFetch),
            "emulated" | "emulated_extension" | "angle" | "webgl" => Ok(Self::EmulatedExtension),
            "read_write_texture" | "rw_texture" | "atomic" | "atomics" => {
                Ok(Self::AtomicReadWriteTexture)
            }
            _ => Err(UnknownStrategy(s.to_owned())),
        }
    }
}

#[derive(Clone, Debug)]
enum Strategy {
    Native(NativeExtension),
    FramebufferFetch(FramebufferFetch),
    Emulated(EmulatedExtension),
    ReadWriteTexture(ReadWriteTexture),
}

macro_rules! dispatch {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            Strategy::Native($s) => $body,
            Strategy::FramebufferFetch($s) => $body,
            Strategy::Emulated($s) => $body,
            Strategy::ReadWriteTexture($s) => $body,
        }
    };
}

/// The active pixel local storage strategy of a render context.
///
/// Raster ordering is toggled only through
/// [`PixelLocalStorage::ensure_raster_ordering_enabled`], which always issues
/// the strategy's barrier before changing it.
#[derive(Clone, Debug)]
pub struct PixelLocalStorage {
    strategy: Strategy,
    raster_ordering_enabled: bool,
}

impl PixelLocalStorage {
    /// Builds the strategy `kind`, or `None` if `capabilities` can't support it.
    pub fn new(kind: StrategyKind, capabilities: &GlCapabilities) -> Option<Self> {
        let strategy = match kind {
            StrategyKind::NativeExtension => Strategy::Native(NativeExtension::new(capabilities)?),
            StrategyKind::FramebufferFetch => {
                Strategy::FramebufferFetch(FramebufferFetch::new(capabilities)?)
            }
            StrategyKind::EmulatedExtension => {
                Strategy::Emulated(EmulatedExtension::new(capabilities)?)
            }
            StrategyKind::AtomicReadWriteTexture => {
                Strategy::ReadWriteTexture(ReadWriteTexture::new(capabilities)?)
            }
        };
        // Raster ordering starts out enabled wherever the hardware provides it.
        let raster_ordering_enabled = dispatch!(&strategy, s => s.supports_raster_ordering());
        Some(Self {
            strategy,
            raster_ordering_enabled,
        })
    }

    /// Returns the first strategy in probe order that `capabilities` supports,
    /// trying `preferred` before all others.
    pub fn probe(preferred: Option<StrategyKind>, capabilities: &GlCapabilities) -> Result<Self> {
        if let Some(kind) = preferred {
            if let Some(pls) = Self::new(kind, capabilities) {
                return Ok(pls);
            }
            log::warn!("preferred pixel local storage strategy {kind} is not supported");
        }
        StrategyKind::PROBE_ORDER
            .into_iter()
            .filter(|kind| Some(*kind) != preferred)
            .find_map(|kind| {
                let pls = Self::new(kind, capabilities);
                if pls.is_none() {
                    log::debug!("pixel local storage strategy {kind} is not supported");
                }
                pls
            })
            .ok_or(Error::UnsupportedDevice)
    }

    pub fn kind(&self) -> StrategyKind {
        match self.strategy {
            Strategy::Native(_) => StrategyKind::NativeExtension,
            Strategy::FramebufferFetch(_) => StrategyKind::FramebufferFetch,
            Strategy::Emulated(_) => StrategyKind::EmulatedExtension,
            Strategy::ReadWriteTexture(_) => StrategyKind::AtomicReadWriteTexture,
        }
    }

    /// The define that selects this strategy's shader permutation.
    pub fn shader_define_name(&self) -> &'static str {
        dispatch!(&self.strategy, s => s.shader_define_name())
    }

    pub fn supports_raster_ordering(&self) -> bool {
        dispatch!(&self.strategy, s => s.supports_raster_ordering())
    }

    pub fn interlock_mode(&self) -> InterlockMode {
        if self.supports_raster_ordering() {
            InterlockMode::RasterOrdered
        } else {
            InterlockMode::Atomics
        }
    }

    pub fn raster_ordering_enabled(&self) -> bool {
        self.raster_ordering_enabled
    }

    /// Whether this strategy can render into an existing framebuffer,
    /// `None` being the default framebuffer.
    pub fn can_wrap_framebuffer<F>(&self, framebuffer: Option<F>) -> bool {
        match self.strategy {
            Strategy::FramebufferFetch(_) => framebuffer.is_some(),
            _ => true,
        }
    }

    /// Prepares `target` for a flush described by `desc`.
    pub fn activate<D: Device>(
        &mut self,
        device: &D,
        target: &mut RenderTarget<D>,
        desc: &FrameDescriptor,
    ) -> Result<()> {
        log::trace!("activating {} pixel local storage", self.kind());
        dispatch!(&mut self.strategy, s => s.activate(device, target, desc))
    }

    /// Resolves the flush into the visible color plane and unbinds `target`.
    pub fn deactivate<D: Device>(
        &mut self,
        device: &D,
        target: &mut RenderTarget<D>,
        desc: &FrameDescriptor,
    ) -> Result<()> {
        log::trace!("deactivating {} pixel local storage", self.kind());
        dispatch!(&mut self.strategy, s => s.deactivate(device, target, desc))
    }

    /// Turns raster ordering on or off, draining in-flight writes first.
    ///
    /// Does nothing if the state already matches, or if raster ordering is
    /// requested from a strategy that can't provide it.
    pub fn ensure_raster_ordering_enabled<D: Device>(&mut self, device: &D, enabled: bool) {
        if self.raster_ordering_enabled == enabled {
            return;
        }
        if enabled && !self.supports_raster_ordering() {
            log::warn!("{} can't enable raster ordering", self.kind());
            return;
        }
        dispatch!(&self.strategy, s => {
            s.barrier(device);
            s.set_raster_ordering(device, enabled);
        });
        self.raster_ordering_enabled = enabled;
    }

    /// Makes prior pixel local storage writes visible to later draws.
    ///
    /// Only needed, and only valid, while raster ordering is disabled.
    pub fn barrier<D: Device>(&self, device: &D) {
        debug_assert!(
            !self.raster_ordering_enabled,
            "barrier while raster ordering is enabled"
        );
        dispatch!(&self.strategy, s => s.barrier(device));
    }
}

/// Color plane load op for strategies that initialize planes when storage begins.
fn color_load_op(desc: &FrameDescriptor) -> LoadOp {
    match desc.color_load_action {
        LoadAction::Clear => LoadOp::Clear(ClearValue::Float(desc.premultiplied_clear_color())),
        LoadAction::PreserveRenderTarget => LoadOp::Load,
        LoadAction::DontCare => LoadOp::DontCare,
    }
}

/// Clears the planes of the bound draw framebuffer that the flush starts from.
fn clear_planes<D: Device>(device: &D, desc: &FrameDescriptor) {
    if desc.color_load_action == LoadAction::Clear {
        device.clear_buffer(
            FRAMEBUFFER_PLANE_IDX,
            ClearValue::Float(desc.premultiplied_clear_color()),
        );
    }
    device.clear_buffer(
        COVERAGE_PLANE_IDX,
        ClearValue::Uint(desc.coverage_clear_value),
    );
    if desc
        .shader_features
        .contains(ShaderFeatures::ENABLE_CLIPPING)
    {
        device.clear_buffer(CLIP_PLANE_IDX, ClearValue::Uint(0));
    }
}

/// Makes the offscreen texture the color plane, copying the external
/// framebuffer into it when the flush preserves existing contents.
fn begin_offscreen<D: Device>(
    device: &D,
    target: &mut FramebufferRenderTarget<D>,
    desc: &FrameDescriptor,
) -> Result<()> {
    target.allocate_offscreen_target_texture()?;
    if desc.color_load_action == LoadAction::PreserveRenderTarget {
        target.bind_external_framebuffer(FramebufferTarget::Read);
        // Blits write every draw buffer, so only the color plane may be enabled.
        target.bind_internal_framebuffer(FramebufferTarget::Draw, 1)?;
        device.blit_framebuffer(desc.update_bounds);
    }
    Ok(())
}

/// Copies the rendered region of the offscreen texture into the external framebuffer.
fn end_offscreen<D: Device>(
    device: &D,
    target: &mut FramebufferRenderTarget<D>,
    desc: &FrameDescriptor,
) -> Result<()> {
    target.bind_internal_framebuffer(FramebufferTarget::Read, 1)?;
    target.bind_external_framebuffer(FramebufferTarget::Draw);
    device.blit_framebuffer(desc.update_bounds);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(f: impl FnOnce(&mut GlCapabilities)) -> GlCapabilities {
        let mut caps = GlCapabilities::default();
        f(&mut caps);
        caps
    }

    #[test]
    fn probe_prefers_native() {
        let everything = caps(|c| {
            c.ext_shader_pixel_local_storage = true;
            c.ext_shader_framebuffer_fetch = true;
            c.angle_shader_pixel_local_storage = true;
            c.arb_shader_image_load_store = true;
        });
        let pls = PixelLocalStorage::probe(None, &everything).unwrap();
        assert_eq!(pls.kind(), StrategyKind::NativeExtension);
        let pls =
            PixelLocalStorage::probe(Some(StrategyKind::EmulatedExtension), &everything).unwrap();
        assert_eq!(pls.kind(), StrategyKind::EmulatedExtension);
    }

    #[test]
    fn unsupported_preference_falls_back() {
        let rw = caps(|c| c.arb_shader_image_load_store = true);
        let pls = PixelLocalStorage::probe(Some(StrategyKind::NativeExtension), &rw).unwrap();
        assert_eq!(pls.kind(), StrategyKind::AtomicReadWriteTexture);
        assert_eq!(pls.interlock_mode(), InterlockMode::Atomics);
        assert!(!pls.raster_ordering_enabled());
    }

    #[test]
    fn nothing_supported() {
        assert!(matches!(
            PixelLocalStorage::probe(None, &GlCapabilities::default()),
            Err(Error::UnsupportedDevice)
        ));
    }

    #[test]
    fn parse_kind() {
        assert_eq!("fetch".parse(), Ok(StrategyKind::FramebufferFetch));
        assert_eq!("Read-Write-Texture".parse(), Ok(StrategyKind::AtomicReadWriteTexture));
        assert_eq!("ANGLE".parse(), Ok(StrategyKind::EmulatedExtension));
        for kind in StrategyKind::PROBE_ORDER {
            assert_eq!(kind.name().parse(), Ok(kind));
        }
        assert!("metal".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn define_names_are_distinct() {
        let everything = GlCapabilities {
            ext_shader_pixel_local_storage: true,
            ext_shader_framebuffer_fetch: true,
            angle_shader_pixel_local_storage: true,
            arb_shader_image_load_store: true,
            ..Default::default()
        };
        let names: Vec<_> = StrategyKind::PROBE_ORDER
            .into_iter()
            .map(|kind| {
                PixelLocalStorage::new(kind, &everything)
                    .unwrap()
                    .shader_define_name()
            })
            .collect();
        assert_eq!(
            names,
            [
                "PLS_IMPL_EXT_NATIVE",
                "PLS_IMPL_FRAMEBUFFER_FETCH",
                "PLS_IMPL_ANGLE",
                "PLS_IMPL_RW_TEXTURE"
            ]
        );
    }
}
