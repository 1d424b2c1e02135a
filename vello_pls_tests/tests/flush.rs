// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Command traces of complete flushes, one strategy at a time.

use vello_pls::peniko::Color;
use vello_pls::vello_pls_encoding::ShaderFeatures;
use vello_pls::{
    Capability, ClearValue, Device, Error, FramebufferTarget, FullscreenPass, GlCommand,
    IntRect, LoadAction, LoadOp, MemoryBarrier, RecordingDevice, RenderContext,
    RenderContextOptions, StoreOp, StrategyKind,
};
use vello_pls_tests::{capabilities_for, context, count, flush_commands, position, TestParams};

fn is_blit(command: &GlCommand) -> bool {
    matches!(command, GlCommand::BlitFramebuffer(_))
}

#[test]
fn native_on_the_default_framebuffer() {
    let (device, mut context) = context(capabilities_for(StrategyKind::NativeExtension)).unwrap();
    let mut target = context.wrap_framebuffer(None, 40, 30).unwrap().unwrap();
    let mut params = TestParams::new(40, 30);
    params.desc.clear_color = Color::new([1.0, 1.0, 1.0, 0.5]);
    params.desc.coverage_clear_value = 7;
    let commands = flush_commands(&device, &mut context, &mut target, &params).unwrap();
    assert_eq!(
        commands,
        [
            GlCommand::BindFramebuffer(FramebufferTarget::Framebuffer, None),
            GlCommand::SetEnabled(Capability::ShaderPixelLocalStorage, true),
            GlCommand::DrawFullscreen(FullscreenPass::PlsLoad {
                color: LoadOp::Clear(ClearValue::Float([0.5, 0.5, 0.5, 0.5])),
                coverage_clear_value: 7,
            }),
            GlCommand::DrawFullscreen(FullscreenPass::PlsStore),
            GlCommand::SetEnabled(Capability::ShaderPixelLocalStorage, false),
            GlCommand::BindFramebuffer(FramebufferTarget::Framebuffer, None),
        ]
    );
    assert!(device.live_textures().is_empty());
}

#[test]
fn native_preserves_by_loading() {
    let (device, mut context) = context(capabilities_for(StrategyKind::NativeExtension)).unwrap();
    let mut target = context.make_offscreen_render_target(16, 16).unwrap();
    let mut params = TestParams::new(16, 16);
    params.desc.color_load_action = LoadAction::PreserveRenderTarget;
    let commands = flush_commands(&device, &mut context, &mut target, &params).unwrap();
    assert!(commands.contains(&GlCommand::DrawFullscreen(FullscreenPass::PlsLoad {
        color: LoadOp::Load,
        coverage_clear_value: 0,
    })));
    // Only the color texture, no internal planes.
    assert_eq!(device.live_textures().len(), 1);
}

#[test]
fn fetch_into_texture() {
    let (device, mut context) =
        context(capabilities_for(StrategyKind::FramebufferFetch)).unwrap();
    let mut target = context.make_offscreen_render_target(64, 64).unwrap();
    let mut params = TestParams::new(64, 64);
    params.desc.shader_features = ShaderFeatures::ENABLE_CLIPPING;
    let commands = flush_commands(&device, &mut context, &mut target, &params).unwrap();

    assert_eq!(
        count(&commands, |c| matches!(c, GlCommand::CreateTexture { .. })),
        3
    );
    assert!(commands.contains(&GlCommand::DrawBuffers(4)));
    assert_eq!(
        count(&commands, |c| matches!(c, GlCommand::AttachTexture { .. })),
        4
    );
    assert!(commands.contains(&GlCommand::ClearBuffer(0, ClearValue::Float([0.0; 4]))));
    assert!(commands.contains(&GlCommand::ClearBuffer(1, ClearValue::Uint(0))));
    assert!(commands.contains(&GlCommand::ClearBuffer(2, ClearValue::Uint(0))));
    assert!(commands.contains(&GlCommand::InvalidateFramebuffer(
        FramebufferTarget::Framebuffer,
        vec![1, 2, 3]
    )));
    assert!(!commands.iter().any(is_blit));
    assert_eq!(
        commands.last(),
        Some(&GlCommand::BindFramebuffer(FramebufferTarget::Framebuffer, None))
    );

    // Nothing left to allocate or reattach the second time around.
    let commands = flush_commands(&device, &mut context, &mut target, &params).unwrap();
    assert!(!commands.iter().any(|c| matches!(
        c,
        GlCommand::CreateTexture { .. }
            | GlCommand::CreateFramebuffer(_)
            | GlCommand::AttachTexture { .. }
            | GlCommand::DrawBuffers(_)
    )));
}

#[test]
fn fetch_without_clipping_leaves_the_clip_plane() {
    let (device, mut context) =
        context(capabilities_for(StrategyKind::FramebufferFetch)).unwrap();
    let mut target = context.make_offscreen_render_target(8, 8).unwrap();
    let commands =
        flush_commands(&device, &mut context, &mut target, &TestParams::new(8, 8)).unwrap();
    assert!(!commands.iter().any(|c| matches!(c, GlCommand::ClearBuffer(2, _))));
}

#[test]
fn fetch_preserving_a_framebuffer_blits_both_ways() {
    let (device, mut context) =
        context(capabilities_for(StrategyKind::FramebufferFetch)).unwrap();
    let external = device.create_framebuffer().unwrap();
    let mut target = context
        .wrap_framebuffer(Some(external), 50, 20)
        .unwrap()
        .unwrap();
    let mut params = TestParams::new(50, 20);
    params.desc.color_load_action = LoadAction::PreserveRenderTarget;
    params.desc.update_bounds = IntRect::new(10, 0, 30, 20);
    let commands = flush_commands(&device, &mut context, &mut target, &params).unwrap();

    let blits: Vec<_> = commands.iter().filter(|c| is_blit(c)).collect();
    assert_eq!(
        blits,
        [
            &GlCommand::BlitFramebuffer(IntRect::new(10, 0, 30, 20)),
            &GlCommand::BlitFramebuffer(IntRect::new(10, 0, 30, 20)),
        ]
    );
    let read_external = position(&commands, |c| {
        *c == GlCommand::BindFramebuffer(FramebufferTarget::Read, Some(external))
    })
    .unwrap();
    let first_blit = position(&commands, is_blit).unwrap();
    assert!(read_external < first_blit);
    // The blit into the offscreen texture writes the color plane only.
    assert!(commands[..first_blit].contains(&GlCommand::DrawBuffers(1)));
    // Preserved contents aren't cleared.
    assert!(!commands.iter().any(|c| matches!(c, GlCommand::ClearBuffer(0, _))));

    let draw_external = position(&commands, |c| {
        *c == GlCommand::BindFramebuffer(FramebufferTarget::Draw, Some(external))
    })
    .unwrap();
    assert!(draw_external > first_blit);
    assert_eq!(
        commands[draw_external + 1],
        GlCommand::BlitFramebuffer(IntRect::new(10, 0, 30, 20))
    );
}

#[test]
fn emulated_load_ops_follow_features() {
    let (device, mut context) =
        context(capabilities_for(StrategyKind::EmulatedExtension)).unwrap();
    let mut target = context.make_offscreen_render_target(8, 8).unwrap();
    let mut params = TestParams::new(8, 8);
    params.desc.coverage_clear_value = 3;
    let commands = flush_commands(&device, &mut context, &mut target, &params).unwrap();
    assert!(commands.contains(&GlCommand::BeginPixelLocalStorage(vec![
        LoadOp::Clear(ClearValue::Float([0.0; 4])),
        LoadOp::Clear(ClearValue::Uint(3)),
        LoadOp::Disable,
        LoadOp::Disable,
    ])));
    assert!(commands.contains(&GlCommand::EndPixelLocalStorage(vec![
        StoreOp::Store,
        StoreOp::DontCare,
        StoreOp::DontCare,
        StoreOp::DontCare,
    ])));
    assert_eq!(
        count(&commands, |c| matches!(c, GlCommand::AttachPixelLocalStorage { .. })),
        4
    );
    assert!(commands.contains(&GlCommand::DrawBuffers(0)));

    params.desc.shader_features =
        ShaderFeatures::ENABLE_CLIPPING | ShaderFeatures::ENABLE_ADVANCED_BLEND;
    params.desc.color_load_action = LoadAction::DontCare;
    let commands = flush_commands(&device, &mut context, &mut target, &params).unwrap();
    assert!(commands.contains(&GlCommand::BeginPixelLocalStorage(vec![
        LoadOp::DontCare,
        LoadOp::Clear(ClearValue::Uint(3)),
        LoadOp::Zero,
        LoadOp::DontCare,
    ])));
    // Bindings are still current.
    assert_eq!(
        count(&commands, |c| matches!(c, GlCommand::AttachPixelLocalStorage { .. })),
        0
    );
}

#[test]
fn atomic_resolve_into_texture() {
    let (device, mut context) =
        context(capabilities_for(StrategyKind::AtomicReadWriteTexture)).unwrap();
    let mut target = context.make_offscreen_render_target(20, 10).unwrap();
    let commands =
        flush_commands(&device, &mut context, &mut target, &TestParams::new(20, 10)).unwrap();

    assert!(commands.contains(&GlCommand::FramebufferDefaultSize(20, 10)));
    assert_eq!(
        count(&commands, |c| matches!(c, GlCommand::BindImageTexture { .. })),
        3
    );
    let barrier = position(&commands, |c| {
        *c == GlCommand::MemoryBarrier(MemoryBarrier::All)
    })
    .unwrap();
    let resolve = position(&commands, |c| {
        *c == GlCommand::DrawFullscreen(FullscreenPass::AtomicResolve)
    })
    .unwrap();
    assert!(barrier < resolve);
    assert!(commands[barrier..resolve].contains(&GlCommand::DrawBuffers(1)));
    assert_eq!(
        count(&commands, |c| matches!(c, GlCommand::DrawFullscreen(_))),
        1
    );
}

#[test]
fn atomic_resolve_into_framebuffer() {
    let (device, mut context) =
        context(capabilities_for(StrategyKind::AtomicReadWriteTexture)).unwrap();
    let mut target = context.wrap_framebuffer(None, 20, 10).unwrap().unwrap();
    let commands =
        flush_commands(&device, &mut context, &mut target, &TestParams::new(20, 10)).unwrap();
    let resolve = position(&commands, |c| {
        *c == GlCommand::DrawFullscreen(FullscreenPass::AtomicResolve)
    })
    .unwrap();
    assert_eq!(
        commands[resolve - 1],
        GlCommand::BindFramebuffer(FramebufferTarget::Draw, None)
    );
    // The resolve writes the framebuffer directly.
    assert!(!commands.iter().any(is_blit));
}

#[test]
fn interlocked_read_write_texture_skips_the_resolve() {
    let mut caps = capabilities_for(StrategyKind::AtomicReadWriteTexture);
    caps.arb_fragment_shader_interlock = true;
    let (device, mut context) = context(caps).unwrap();
    let mut target = context.make_offscreen_render_target(20, 10).unwrap();
    let commands =
        flush_commands(&device, &mut context, &mut target, &TestParams::new(20, 10)).unwrap();
    assert_eq!(
        count(&commands, |c| matches!(c, GlCommand::BindImageTexture { .. })),
        4
    );
    assert!(!commands
        .iter()
        .any(|c| *c == GlCommand::DrawFullscreen(FullscreenPass::AtomicResolve)));
    assert!(commands.contains(&GlCommand::MemoryBarrier(MemoryBarrier::All)));
}

#[test]
fn failed_draw_still_deactivates() {
    for kind in StrategyKind::PROBE_ORDER {
        let (device, mut context) = context(capabilities_for(kind)).unwrap();
        let mut target = context.make_offscreen_render_target(8, 8).unwrap();
        device.take_commands();
        let result = context.flush(&mut target, &TestParams::new(8, 8).desc, |_| {
            Err(Error::UnsupportedDevice)
        });
        assert!(matches!(result, Err(Error::UnsupportedDevice)), "{kind}");
        assert_eq!(
            device.commands().last(),
            Some(&GlCommand::BindFramebuffer(FramebufferTarget::Framebuffer, None)),
            "{kind}"
        );
    }
}

#[test]
fn failed_activation_unbinds_and_skips_the_draw() {
    let device = RecordingDevice::with_texture_budget(2);
    let mut context = RenderContext::new(
        device.clone(),
        capabilities_for(StrategyKind::FramebufferFetch),
        RenderContextOptions::default(),
    )
    .unwrap();
    let mut target = context.make_offscreen_render_target(8, 8).unwrap();
    device.take_commands();
    let mut drew = false;
    let result = context.flush(&mut target, &TestParams::new(8, 8).desc, |_| {
        drew = true;
        Ok(())
    });
    assert!(matches!(result, Err(Error::TextureAllocation { .. })));
    assert!(!drew);
    assert_eq!(
        device.commands().last(),
        Some(&GlCommand::BindFramebuffer(FramebufferTarget::Framebuffer, None))
    );
}
