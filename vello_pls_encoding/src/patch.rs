// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tessellation patches.
//!
//! Every curve segment of a stroke or fill contour is rasterized by instancing one of two
//! static meshes. The meshes are generated once, on first use, and are shared by every
//! frame and every context afterwards.

use std::sync::OnceLock;

use bytemuck::{Pod, Zeroable};
use static_assertions::{const_assert, const_assert_eq};

use crate::constants::{FAN_MIDPOINT_VERTEX, FAN_VERTEX, STROKE_VERTEX};

/// The kind of tessellation patch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PatchType {
    /// Interior fill: AA border, middle-out fan and a triangle to the contour midpoint.
    MidpointFan,
    /// Antialiased stroke border with a mirrored bottom side and no midpoint.
    OuterCurves,
}

pub const MIDPOINT_FAN_PATCH_SEGMENT_SPAN: u32 = 8;
pub const MIDPOINT_FAN_PATCH_VERTEX_COUNT: u32 = MIDPOINT_FAN_PATCH_SEGMENT_SPAN * 4 // AA border
    + (MIDPOINT_FAN_PATCH_SEGMENT_SPAN + 1) // Curve fan
    + 1; // Contour midpoint
pub const MIDPOINT_FAN_PATCH_INDEX_COUNT: u32 = MIDPOINT_FAN_PATCH_SEGMENT_SPAN * 6 // AA border
    + (MIDPOINT_FAN_PATCH_SEGMENT_SPAN - 1) * 3 // Curve fan
    + 3; // Triangle to the contour midpoint

// "Outer curves" have one more segment without a fan triangle, which acts as a bowtie join.
pub const OUTER_CURVE_PATCH_SEGMENT_SPAN: u32 = 17;
pub const OUTER_CURVE_PATCH_VERTEX_COUNT: u32 =
    OUTER_CURVE_PATCH_SEGMENT_SPAN * 8 // AA border, both sides
    + OUTER_CURVE_PATCH_SEGMENT_SPAN; // Curve fan
pub const OUTER_CURVE_PATCH_INDEX_COUNT: u32 =
    OUTER_CURVE_PATCH_SEGMENT_SPAN * 12 // AA border, both sides
    + (OUTER_CURVE_PATCH_SEGMENT_SPAN - 2) * 3; // Curve fan

pub const PATCH_VERTEX_BUFFER_COUNT: u32 =
    MIDPOINT_FAN_PATCH_VERTEX_COUNT + OUTER_CURVE_PATCH_VERTEX_COUNT;
pub const PATCH_INDEX_BUFFER_COUNT: u32 =
    MIDPOINT_FAN_PATCH_INDEX_COUNT + OUTER_CURVE_PATCH_INDEX_COUNT;

const_assert_eq!(MIDPOINT_FAN_PATCH_VERTEX_COUNT, 42);
const_assert_eq!(MIDPOINT_FAN_PATCH_INDEX_COUNT, 72);
const_assert_eq!(OUTER_CURVE_PATCH_VERTEX_COUNT, 153);
const_assert_eq!(OUTER_CURVE_PATCH_INDEX_COUNT, 249);
// Indices are 16 bit.
const_assert!(PATCH_VERTEX_BUFFER_COUNT <= (u16::MAX as u32) + 1);

impl PatchType {
    /// Number of curve segments covered by one instance.
    pub const fn segment_span(self) -> u32 {
        match self {
            Self::MidpointFan => MIDPOINT_FAN_PATCH_SEGMENT_SPAN,
            Self::OuterCurves => OUTER_CURVE_PATCH_SEGMENT_SPAN,
        }
    }

    /// Number of segments covered by the triangle fan. Always a power of two.
    pub const fn fan_segment_span(self) -> u32 {
        match self {
            Self::MidpointFan => MIDPOINT_FAN_PATCH_SEGMENT_SPAN,
            Self::OuterCurves => OUTER_CURVE_PATCH_SEGMENT_SPAN - 1,
        }
    }

    pub const fn vertex_count(self) -> u32 {
        match self {
            Self::MidpointFan => MIDPOINT_FAN_PATCH_VERTEX_COUNT,
            Self::OuterCurves => OUTER_CURVE_PATCH_VERTEX_COUNT,
        }
    }

    pub const fn index_count(self) -> u32 {
        match self {
            Self::MidpointFan => MIDPOINT_FAN_PATCH_INDEX_COUNT,
            Self::OuterCurves => OUTER_CURVE_PATCH_INDEX_COUNT,
        }
    }

    /// Offset of this patch's first vertex in the combined [`PatchBuffer`].
    pub const fn base_vertex(self) -> u32 {
        match self {
            Self::MidpointFan => 0,
            Self::OuterCurves => MIDPOINT_FAN_PATCH_VERTEX_COUNT,
        }
    }

    /// Offset of this patch's first index in the combined [`PatchBuffer`].
    pub const fn base_index(self) -> u32 {
        match self {
            Self::MidpointFan => 0,
            Self::OuterCurves => MIDPOINT_FAN_PATCH_INDEX_COUNT,
        }
    }
}

/// Packs a patch's segment span and a vertex type into the float `params` attribute.
pub const fn pack_params(patch_segment_span: u32, vertex_type: u32) -> f32 {
    ((patch_segment_span << 2) | vertex_type) as f32
}

/// Vertex of a tessellation patch.
///
/// The mirrored position is used when an instance is drawn with reversed direction, so the
/// AA border keeps the same diagonals either way.
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct PatchVertex {
    pub local_vertex_id: f32,
    pub outset: f32,
    pub fill_coverage: f32,
    pub params: f32,
    pub mirrored_vertex_id: f32,
    pub mirrored_outset: f32,
    pub mirrored_fill_coverage: f32,
    pub padding: f32,
}

const_assert_eq!(std::mem::size_of::<PatchVertex>(), 8 * 4);

impl PatchVertex {
    fn set(&mut self, local_vertex_id: f32, outset: f32, fill_coverage: f32, params: f32) {
        self.local_vertex_id = local_vertex_id;
        self.outset = outset;
        self.fill_coverage = fill_coverage;
        self.params = params;
        self.set_mirrored_position(local_vertex_id, outset, fill_coverage);
    }

    fn set_mirrored_position(&mut self, local_vertex_id: f32, outset: f32, fill_coverage: f32) {
        self.mirrored_vertex_id = local_vertex_id;
        self.mirrored_outset = outset;
        self.mirrored_fill_coverage = fill_coverage;
    }

    /// Segment span encoded in `params`.
    pub fn segment_span(&self) -> u32 {
        (self.params as u32) >> 2
    }

    /// Vertex type encoded in `params`.
    pub fn vertex_type(&self) -> u32 {
        (self.params as u32) & 3
    }
}

const BORDER_PATTERN_VERTEX_COUNT: usize = 4;
const BORDER_PATTERN: [u16; 6] = [0, 1, 2, 2, 1, 3];
const NEGATIVE_BORDER_PATTERN: [u16; 6] = [0, 2, 1, 1, 2, 3];

/// Strides of the middle-out fan: 1, 2, 4, ... while the stride is below `fan_segment_span`.
pub fn fan_strides(fan_segment_span: u32) -> impl Iterator<Item = u32> {
    std::iter::successors(Some(1_u32), |step| step.checked_mul(2))
        .take_while(move |&step| step < fan_segment_span)
}

/// Writes the vertices and indices of one patch type.
///
/// `vertices` and `indices` must hold exactly [`PatchType::vertex_count`] and
/// [`PatchType::index_count`] elements. Indices are offset by `base_vertex`.
///
/// # Panics
///
/// If the slices have the wrong length, or (in debug builds) if the generated counts drift
/// from the declared ones.
pub fn generate_patch_data(
    patch_type: PatchType,
    vertices: &mut [PatchVertex],
    indices: &mut [u16],
    base_vertex: u16,
) {
    assert_eq!(vertices.len(), patch_type.vertex_count() as usize);
    assert_eq!(indices.len(), patch_type.index_count() as usize);

    let patch_segment_span = patch_type.segment_span();
    let fan_segment_span = patch_type.fan_segment_span();
    assert!(
        fan_segment_span.is_power_of_two(),
        "the fan segment span must be a power of two"
    );

    // AA border vertices.
    let mut vertex_count = 0;
    let params = pack_params(patch_segment_span, STROKE_VERTEX);
    for i in 0..patch_segment_span {
        let l = i as f32;
        let r = l + 1.0;
        let quad = &mut vertices[vertex_count..vertex_count + 4];
        match patch_type {
            PatchType::OuterCurves => {
                quad[0].set(l, 0.0, 0.5, params);
                quad[1].set(l, 1.0, 0.0, params);
                quad[2].set(r, 0.0, 0.5, params);
                quad[3].set(r, 1.0, 0.0, params);

                quad[0].set_mirrored_position(r, 0.0, 0.5);
                quad[1].set_mirrored_position(l, 0.0, 0.5);
                quad[2].set_mirrored_position(r, 1.0, 0.0);
                quad[3].set_mirrored_position(l, 1.0, 0.0);
            }
            PatchType::MidpointFan => {
                quad[0].set(l, -1.0, 1.0, params);
                quad[1].set(l, 1.0, 0.0, params);
                quad[2].set(r, -1.0, 1.0, params);
                quad[3].set(r, 1.0, 0.0, params);

                quad[0].set_mirrored_position(r - 1.0, -1.0, 1.0);
                quad[1].set_mirrored_position(l - 1.0, -1.0, 1.0);
                quad[2].set_mirrored_position(r - 1.0, 1.0, 0.0);
                quad[3].set_mirrored_position(l - 1.0, 1.0, 0.0);
            }
        }
        vertex_count += 4;
    }

    // Bottom (negative coverage) side of the AA border.
    if patch_type == PatchType::OuterCurves {
        for i in 0..patch_segment_span {
            let l = i as f32;
            let r = l + 1.0;
            let quad = &mut vertices[vertex_count..vertex_count + 4];
            quad[0].set(l, -0.0, 0.5, params);
            quad[1].set(r, -0.0, 0.5, params);
            quad[2].set(l, -1.0, 0.0, params);
            quad[3].set(r, -1.0, 0.0, params);

            quad[0].set_mirrored_position(r, -0.0, 0.5);
            quad[1].set_mirrored_position(r, -1.0, 0.0);
            quad[2].set_mirrored_position(l, -0.0, 0.5);
            quad[3].set_mirrored_position(l, -1.0, 0.0);
            vertex_count += 4;
        }
    }

    // Triangle fan vertices. On outer curves these only touch the first `fan_segment_span`
    // segments.
    let fan_vertices_idx = vertex_count;
    let fan_params = pack_params(patch_segment_span, FAN_VERTEX);
    for i in 0..=fan_segment_span {
        let x = i as f32;
        let vertex = &mut vertices[vertex_count];
        match patch_type {
            PatchType::OuterCurves => vertex.set(x, 0.0, 1.0, fan_params),
            PatchType::MidpointFan => {
                vertex.set(x, -1.0, 1.0, fan_params);
                vertex.set_mirrored_position(x - 1.0, -1.0, 1.0);
            }
        }
        vertex_count += 1;
    }

    let midpoint_idx = vertex_count;
    if patch_type == PatchType::MidpointFan {
        vertices[vertex_count].set(
            0.0,
            0.0,
            1.0,
            pack_params(patch_segment_span, FAN_MIDPOINT_VERTEX),
        );
        vertex_count += 1;
    }
    debug_assert_eq!(vertex_count, patch_type.vertex_count() as usize);

    // AA border indices.
    let mut index_count = 0;
    let mut push = |index: usize| {
        indices[index_count] = base_vertex + index as u16;
        index_count += 1;
    };
    let mut border_edge_vertices_idx = 0;
    for _ in 0..patch_segment_span {
        for i in BORDER_PATTERN {
            push(border_edge_vertices_idx + i as usize);
        }
        border_edge_vertices_idx += BORDER_PATTERN_VERTEX_COUNT;
    }
    if patch_type == PatchType::OuterCurves {
        for _ in 0..patch_segment_span {
            for i in NEGATIVE_BORDER_PATTERN {
                push(border_edge_vertices_idx + i as usize);
            }
            border_edge_vertices_idx += BORDER_PATTERN_VERTEX_COUNT;
        }
    }
    debug_assert_eq!(border_edge_vertices_idx, fan_vertices_idx);

    // Triangle fan indices, in a middle-out topology. Outer curves leave out the final bowtie
    // segment.
    let fan_segment_span = fan_segment_span as usize;
    for step in fan_strides(fan_segment_span as u32) {
        let step = step as usize;
        for i in (0..fan_segment_span).step_by(step * 2) {
            push(fan_vertices_idx + i);
            push(fan_vertices_idx + i + step);
            push(fan_vertices_idx + i + step * 2);
        }
    }
    if patch_type == PatchType::MidpointFan {
        // Triangle to the contour midpoint.
        push(fan_vertices_idx);
        push(fan_vertices_idx + fan_segment_span);
        push(midpoint_idx);
    }
    debug_assert_eq!(index_count, patch_type.index_count() as usize);
}

/// The combined static vertex and index data of both patch types.
///
/// The midpoint fan patch comes first, the outer curve patch is appended at
/// [`PatchType::base_vertex`] / [`PatchType::base_index`].
#[derive(Clone, Debug)]
pub struct PatchBuffer {
    pub vertices: Vec<PatchVertex>,
    pub indices: Vec<u16>,
}

static PATCH_BUFFER: OnceLock<PatchBuffer> = OnceLock::new();

impl PatchBuffer {
    /// Returns the process-wide patch buffer, generating it on first use.
    pub fn get() -> &'static Self {
        PATCH_BUFFER.get_or_init(Self::generate)
    }

    fn generate() -> Self {
        let mut vertices = vec![PatchVertex::default(); PATCH_VERTEX_BUFFER_COUNT as usize];
        let mut indices = vec![0_u16; PATCH_INDEX_BUFFER_COUNT as usize];
        for patch_type in [PatchType::MidpointFan, PatchType::OuterCurves] {
            let vertex_range = patch_type.base_vertex() as usize
                ..(patch_type.base_vertex() + patch_type.vertex_count()) as usize;
            let index_range = patch_type.base_index() as usize
                ..(patch_type.base_index() + patch_type.index_count()) as usize;
            generate_patch_data(
                patch_type,
                &mut vertices[vertex_range],
                &mut indices[index_range],
                patch_type.base_vertex() as u16,
            );
        }
        Self { vertices, indices }
    }

    pub fn vertices_for(&self, patch_type: PatchType) -> &[PatchVertex] {
        let start = patch_type.base_vertex() as usize;
        &self.vertices[start..start + patch_type.vertex_count() as usize]
    }

    pub fn indices_for(&self, patch_type: PatchType) -> &[u16] {
        let start = patch_type.base_index() as usize;
        &self.indices[start..start + patch_type.index_count() as usize]
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}
