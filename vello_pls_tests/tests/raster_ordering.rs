// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Toggling raster ordering inside a flush.

use vello_pls::{
    Capability, FrameDescriptor, GlCapabilities, GlCommand, InterlockMode, StrategyKind,
};
use vello_pls_tests::{capabilities_for, context, count};

fn noncoherent_fetch() -> GlCapabilities {
    GlCapabilities::from_extensions([
        "GL_EXT_shader_framebuffer_fetch",
        "GL_QCOM_shader_framebuffer_fetch_noncoherent",
    ])
}

#[test]
fn toggling_issues_one_barrier_per_change() {
    let (device, mut context) = context(noncoherent_fetch()).unwrap();
    let mut target = context.make_offscreen_render_target(32, 32).unwrap();
    let desc = FrameDescriptor::new(32, 32);
    context
        .flush(&mut target, &desc, |pass| {
            assert!(pass.raster_ordering_enabled());
            pass.ensure_raster_ordering_enabled(false);
            assert!(!pass.raster_ordering_enabled());
            assert_eq!(
                device.take_commands().last(),
                Some(&GlCommand::SetEnabled(
                    Capability::FramebufferFetchNoncoherent,
                    true
                ))
            );

            pass.ensure_raster_ordering_enabled(true);
            pass.ensure_raster_ordering_enabled(true);
            let commands = device.take_commands();
            assert_eq!(
                commands,
                [
                    GlCommand::FramebufferFetchBarrier,
                    GlCommand::SetEnabled(Capability::FramebufferFetchNoncoherent, false),
                ]
            );
            Ok(())
        })
        .unwrap();
}

#[test]
fn already_enabled_is_a_no_op() {
    let (device, mut context) = context(noncoherent_fetch()).unwrap();
    let mut target = context.make_offscreen_render_target(8, 8).unwrap();
    context
        .flush(&mut target, &FrameDescriptor::new(8, 8), |pass| {
            device.take_commands();
            pass.ensure_raster_ordering_enabled(true);
            assert!(device.commands().is_empty());
            Ok(())
        })
        .unwrap();
}

#[test]
fn explicit_barriers_while_unordered() {
    let (device, mut context) = context(noncoherent_fetch()).unwrap();
    let mut target = context.make_offscreen_render_target(8, 8).unwrap();
    context
        .flush(&mut target, &FrameDescriptor::new(8, 8), |pass| {
            pass.ensure_raster_ordering_enabled(false);
            device.take_commands();
            pass.barrier();
            pass.barrier();
            assert_eq!(
                device.take_commands(),
                [
                    GlCommand::FramebufferFetchBarrier,
                    GlCommand::FramebufferFetchBarrier
                ]
            );
            Ok(())
        })
        .unwrap();
}

#[test]
fn state_persists_across_flushes() {
    let (_, mut context) = context(noncoherent_fetch()).unwrap();
    let mut target = context.make_offscreen_render_target(8, 8).unwrap();
    let desc = FrameDescriptor::new(8, 8);
    context
        .flush(&mut target, &desc, |pass| {
            pass.ensure_raster_ordering_enabled(false);
            Ok(())
        })
        .unwrap();
    assert!(!context.pixel_local_storage().raster_ordering_enabled());
    context
        .flush(&mut target, &desc, |pass| {
            assert!(!pass.raster_ordering_enabled());
            Ok(())
        })
        .unwrap();
}

#[test]
fn coherent_fetch_needs_no_device_calls() {
    let (device, mut context) = context(capabilities_for(StrategyKind::FramebufferFetch)).unwrap();
    let mut target = context.make_offscreen_render_target(8, 8).unwrap();
    context
        .flush(&mut target, &FrameDescriptor::new(8, 8), |pass| {
            device.take_commands();
            pass.ensure_raster_ordering_enabled(false);
            pass.ensure_raster_ordering_enabled(true);
            assert!(device.commands().is_empty());
            Ok(())
        })
        .unwrap();
}

#[test]
fn emulated_barrier() {
    let (device, mut context) =
        context(capabilities_for(StrategyKind::EmulatedExtension)).unwrap();
    let mut target = context.make_offscreen_render_target(8, 8).unwrap();
    context
        .flush(&mut target, &FrameDescriptor::new(8, 8), |pass| {
            device.take_commands();
            pass.ensure_raster_ordering_enabled(false);
            pass.barrier();
            let commands = device.take_commands();
            assert_eq!(
                count(&commands, |c| *c == GlCommand::PixelLocalStorageBarrier),
                2
            );
            assert_eq!(commands.len(), 2);
            Ok(())
        })
        .unwrap();
}

#[test]
fn atomics_start_unordered() {
    let (device, mut context) =
        context(capabilities_for(StrategyKind::AtomicReadWriteTexture)).unwrap();
    assert_eq!(context.interlock_mode(), InterlockMode::Atomics);
    let mut target = context.make_offscreen_render_target(8, 8).unwrap();
    context
        .flush(&mut target, &FrameDescriptor::new(8, 8), |pass| {
            assert!(!pass.raster_ordering_enabled());
            device.take_commands();
            // Already off, so nothing to drain.
            pass.ensure_raster_ordering_enabled(false);
            assert!(device.commands().is_empty());
            pass.barrier();
            assert_eq!(device.count(GlCommand::is_barrier), 1);
            Ok(())
        })
        .unwrap();
}

#[test]
fn atomics_refuse_to_enable_ordering() {
    let (device, mut context) =
        context(capabilities_for(StrategyKind::AtomicReadWriteTexture)).unwrap();
    let mut target = context.make_offscreen_render_target(8, 8).unwrap();
    context
        .flush(&mut target, &FrameDescriptor::new(8, 8), |pass| {
            device.take_commands();
            pass.ensure_raster_ordering_enabled(true);
            assert!(!pass.raster_ordering_enabled());
            assert!(device.commands().is_empty());
            Ok(())
        })
        .unwrap();
    assert!(!context.pixel_local_storage().raster_ordering_enabled());
}
