// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU side data for the Vello pixel local storage renderer.
//!
//! Everything here is plain data with no GPU dependency: the numeric table
//! shared with the shaders, the tessellation patch geometry, paint and blend
//! packing, and the per-path records consumed by the draw and resolve passes.

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
#![allow(
    clippy::cast_possible_truncation,
    clippy::missing_assert_message,
    clippy::missing_panics_doc,
    reason = "Deferred"
)]

mod atomic;
mod clip_rect;
pub mod constants;
mod features;
pub mod math;
mod paint;
mod patch;
mod path_data;

pub use atomic::{
    AtomicModeData, AtomicPathDraw, ClipRectTranslate, FrameParams, ImageTextureId,
    PaintRecord, PaintTranslate,
};
pub use clip_rect::ClipRectInverseMatrix;
pub use features::{PlatformFeatures, ShaderFeatures};
pub use math::{find_transformed_area, Transform};
pub use paint::{
    pack_color, pack_unorm4x8, pack_unorm4x8_argb, pack_unorm4x8_u8, unpack_unorm4x8,
    BlendMode, GradientSpan, Paint, PaintType,
};
pub use patch::{
    fan_strides, generate_patch_data, pack_params, PatchBuffer, PatchType, PatchVertex,
    MIDPOINT_FAN_PATCH_INDEX_COUNT, MIDPOINT_FAN_PATCH_SEGMENT_SPAN,
    MIDPOINT_FAN_PATCH_VERTEX_COUNT, OUTER_CURVE_PATCH_INDEX_COUNT,
    OUTER_CURVE_PATCH_SEGMENT_SPAN, OUTER_CURVE_PATCH_VERTEX_COUNT, PATCH_INDEX_BUFFER_COUNT,
    PATCH_VERTEX_BUFFER_COUNT,
};
pub use path_data::{ImageDrawUniforms, PathData};
