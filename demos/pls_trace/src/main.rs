// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runs one flush against a recording device and prints every call it makes.
//!
//! ```text
//! cargo run -p pls_trace -- --extensions GL_ARB_shader_image_load_store --framebuffer
//! ```

// The following lints are part of the Linebender standard set,
// but resolving them has been deferred for now.
// Feel free to send a PR that solves one or more of these.
#![allow(clippy::print_stdout, clippy::allow_attributes_without_reason)]

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use vello_pls::peniko::color::palette;
use vello_pls::peniko::{Color, Fill};
use vello_pls::vello_pls_encoding::{
    AtomicModeData, AtomicPathDraw, BlendMode, FrameParams, GradientSpan, Paint,
    PlatformFeatures, ShaderFeatures, Transform,
};
use vello_pls::{
    FrameDescriptor, GlCapabilities, InterlockMode, LoadAction, RecordingDevice, RenderContext,
    RenderContextOptions, StrategyKind,
};

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Extensions the pretend device reports, comma separated.
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "GL_EXT_shader_framebuffer_fetch"
    )]
    extensions: Vec<String>,
    /// Strategy to try first. Defaults to `VELLO_PLS_STRATEGY`.
    #[arg(long)]
    strategy: Option<StrategyKind>,
    #[arg(long, default_value_t = 256)]
    width: u32,
    #[arg(long, default_value_t = 256)]
    height: u32,
    #[arg(long, value_enum, default_value_t = Load::Clear)]
    load: Load,
    /// Render into the default framebuffer instead of a texture.
    #[arg(long)]
    framebuffer: bool,
    /// The device's `gl_FragCoord` origin is the bottom left.
    #[arg(long)]
    bottom_up: bool,
    /// Also disable raster ordering partway through the flush.
    #[arg(long)]
    unordered: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Load {
    Clear,
    Preserve,
    DontCare,
}

impl From<Load> for LoadAction {
    fn from(load: Load) -> Self {
        match load {
            Load::Clear => Self::Clear,
            Load::Preserve => Self::PreserveRenderTarget,
            Load::DontCare => Self::DontCare,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let capabilities =
        GlCapabilities::from_extensions(args.extensions.iter().map(String::as_str));
    let platform_features = PlatformFeatures {
        frag_coord_bottom_up: args.bottom_up,
    };
    let options = RenderContextOptions {
        preferred_strategy: args.strategy.or_else(StrategyKind::from_env),
        platform_features,
    };
    let device = RecordingDevice::new();
    let mut context = RenderContext::new(device.clone(), capabilities, options)
        .context("creating render context")?;
    println!(
        "strategy: {} ({:?}, {})",
        context.strategy_kind(),
        context.interlock_mode(),
        context.shader_define_name()
    );

    let mut target = if args.framebuffer {
        match context.wrap_framebuffer(None, args.width, args.height)? {
            Some(target) => target,
            None => bail!(
                "{} can't render into the default framebuffer",
                context.strategy_kind()
            ),
        }
    } else {
        context.make_offscreen_render_target(args.width, args.height)?
    };

    let mut desc = FrameDescriptor::new(args.width, args.height);
    desc.color_load_action = args.load.into();
    desc.clear_color = palette::css::CORNFLOWER_BLUE;
    desc.shader_features = ShaderFeatures::ENABLE_CLIPPING | ShaderFeatures::ENABLE_ADVANCED_BLEND;

    if context.interlock_mode() == InterlockMode::Atomics {
        let frame = FrameParams {
            render_target_height: args.height,
            gradient_texture_height: 0.0,
            platform_features,
        };
        let data = encode_atomic_paths(&frame, desc.clear_color);
        log::info!(
            "encoded {} atomic path records ({} bytes of paints)",
            data.len(),
            data.paint_bytes().len()
        );
    }

    let unordered = args.unordered;
    context.flush(&mut target, &desc, |pass| {
        if unordered && pass.raster_ordering_enabled() {
            pass.ensure_raster_ordering_enabled(false);
            pass.barrier();
            pass.ensure_raster_ordering_enabled(true);
        }
        Ok(())
    })?;

    for (i, command) in device.take_commands().iter().enumerate() {
        println!("{i:4}: {command:?}");
    }
    Ok(())
}

/// A solid square and a gradient square, as the atomic shaders would see them.
fn encode_atomic_paths(frame: &FrameParams, clear_color: Color) -> AtomicModeData {
    let span = GradientSpan {
        row: 0,
        x0: 0,
        x1: 255,
    };
    let draws = [
        AtomicPathDraw {
            matrix: Transform::scale(64.0, 64.0),
            fill_rule: Fill::NonZero,
            paint: Paint::SolidColor(palette::css::TOMATO),
            image_texture: None,
            clip_id: 0,
            clip_rect: None,
            blend_mode: BlendMode::SrcOver,
        },
        AtomicPathDraw {
            matrix: Transform::translate(96.0, 96.0) * Transform::scale(64.0, 64.0),
            fill_rule: Fill::EvenOdd,
            paint: Paint::linear_gradient(span, [0.0, 0.0], [1.0, 1.0]),
            image_texture: None,
            clip_id: 0,
            clip_rect: None,
            blend_mode: BlendMode::Multiply,
        },
    ];
    let mut data = AtomicModeData::with_capacity(draws.len());
    for (path_id, draw) in (1..).zip(&draws) {
        data.set_path_data(path_id, draw, frame);
    }
    data.finalize(draws.len(), clear_color, 1.0);
    data
}
