// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vello PLS tests.

// LINEBENDER LINT SET - lib.rs - v2
// See https://linebender.org/wiki/canonical-lints/
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_cfg))]
// The following lints are part of the Linebender standard set,
// but resolving them has been deferred for now.
// Feel free to send a PR that solves one or more of these.
#![allow(
    missing_debug_implementations,
    unreachable_pub,
    missing_docs,
    clippy::missing_assert_message,
    clippy::allow_attributes_without_reason
)]

use anyhow::Result;
use vello_pls::{
    FrameDescriptor, GlCapabilities, GlCommand, RecordingDevice, RenderContext,
    RenderContextOptions, RenderTarget, StrategyKind,
};

/// The smallest capability set that supports `kind` and nothing preferred over it.
pub fn capabilities_for(kind: StrategyKind) -> GlCapabilities {
    let mut caps = GlCapabilities::default();
    match kind {
        StrategyKind::NativeExtension => caps.ext_shader_pixel_local_storage = true,
        StrategyKind::FramebufferFetch => caps.ext_shader_framebuffer_fetch = true,
        StrategyKind::EmulatedExtension => caps.angle_shader_pixel_local_storage = true,
        StrategyKind::AtomicReadWriteTexture => caps.arb_shader_image_load_store = true,
    }
    caps
}

/// A context on a fresh recording device, forced onto `caps`' best strategy.
pub fn context(caps: GlCapabilities) -> Result<(RecordingDevice, RenderContext<RecordingDevice>)> {
    let device = RecordingDevice::new();
    let context = RenderContext::new(device.clone(), caps, RenderContextOptions::default())?;
    Ok((device, context))
}

pub struct TestParams {
    pub width: u32,
    pub height: u32,
    pub desc: FrameDescriptor,
}

impl TestParams {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            desc: FrameDescriptor::new(width, height),
        }
    }
}

/// Runs an empty flush and returns every command it issued.
pub fn flush_commands(
    device: &RecordingDevice,
    context: &mut RenderContext<RecordingDevice>,
    target: &mut RenderTarget<RecordingDevice>,
    params: &TestParams,
) -> Result<Vec<GlCommand>> {
    device.take_commands();
    context.flush(target, &params.desc, |_| Ok(()))?;
    Ok(device.take_commands())
}

pub fn count(commands: &[GlCommand], predicate: impl Fn(&GlCommand) -> bool) -> usize {
    commands.iter().filter(|command| predicate(command)).count()
}

/// Index of the first command matching `predicate`.
pub fn position(commands: &[GlCommand], predicate: impl Fn(&GlCommand) -> bool) -> Option<usize> {
    commands.iter().position(predicate)
}
