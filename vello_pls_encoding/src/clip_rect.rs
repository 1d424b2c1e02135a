// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use bytemuck::{Pod, Zeroable};
use peniko::kurbo::Rect;

use crate::math::Transform;

/// Maps device space into the normalized `[-1, 1]` box of a clip rectangle.
///
/// Fragments whose mapped position falls outside the box are clipped away.
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ClipRectInverseMatrix {
    inverse_matrix: Transform,
}

impl Default for ClipRectInverseMatrix {
    fn default() -> Self {
        Self::WIDE_OPEN
    }
}

impl ClipRectInverseMatrix {
    /// Maps every point to the center of the box, so nothing is clipped.
    pub const WIDE_OPEN: Self = Self {
        inverse_matrix: Transform::new([0.0; 6]),
    };

    /// Maps every point to infinity, so everything is clipped.
    pub const EMPTY: Self = Self {
        inverse_matrix: Transform::new([0.0, 0.0, 0.0, 0.0, f32::INFINITY, f32::INFINITY]),
    };

    /// Builds the inverse matrix for `clip_rect`, given in the local space of `clip_matrix`.
    pub fn new(clip_matrix: &Transform, clip_rect: &Rect) -> Self {
        let mut result = Self::WIDE_OPEN;
        result.reset(clip_matrix, clip_rect);
        result
    }

    /// Wraps an already inverted matrix.
    pub const fn from_inverse_matrix(inverse_matrix: Transform) -> Self {
        Self { inverse_matrix }
    }

    pub fn reset(&mut self, clip_matrix: &Transform, clip_rect: &Rect) {
        let width = clip_rect.width() as f32;
        let height = clip_rect.height() as f32;
        let center = clip_rect.center();
        // Pixel space -> the normalized rectangle [-1, -1, +1, +1].
        let m = *clip_matrix
            * Transform::new([
                width * 0.5,
                0.0,
                0.0,
                height * 0.5,
                center.x as f32,
                center.y as f32,
            ]);
        *self = match m.invert() {
            Some(inverse_matrix) if width > 0.0 && height > 0.0 => Self { inverse_matrix },
            _ => Self::EMPTY,
        };
    }

    pub fn inverse_matrix(&self) -> &Transform {
        &self.inverse_matrix
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inside(clip: &ClipRectInverseMatrix, point: [f32; 2]) -> bool {
        let [x, y] = clip.inverse_matrix().map_point(point);
        x.abs() <= 1.0 && y.abs() <= 1.0
    }

    #[test]
    fn maps_rect_to_unit_box() {
        let matrix = Transform::translate(100.0, 50.0) * Transform::scale(2.0, 2.0);
        let clip = ClipRectInverseMatrix::new(&matrix, &Rect::new(0.0, 0.0, 10.0, 20.0));
        let [x0, y0] = clip.inverse_matrix().map_point([100.0, 50.0]);
        let [x1, y1] = clip.inverse_matrix().map_point([120.0, 90.0]);
        assert!((x0 + 1.0).abs() < 1e-5 && (y0 + 1.0).abs() < 1e-5);
        assert!((x1 - 1.0).abs() < 1e-5 && (y1 - 1.0).abs() < 1e-5);
        assert!(inside(&clip, [110.0, 70.0]));
        assert!(!inside(&clip, [99.0, 70.0]));
        assert!(!inside(&clip, [110.0, 91.0]));
    }

    #[test]
    fn degenerate_rects_clip_everything() {
        let degenerate = [
            Rect::new(5.0, 5.0, 5.0, 10.0),
            Rect::new(5.0, 5.0, 10.0, 5.0),
            Rect::new(10.0, 5.0, 5.0, 10.0),
            Rect::new(5.0, 10.0, 10.0, 5.0),
        ];
        for rect in degenerate {
            let clip = ClipRectInverseMatrix::new(&Transform::IDENTITY, &rect);
            assert_eq!(clip, ClipRectInverseMatrix::EMPTY, "{rect:?}");
            assert!(clip.is_empty());
            assert!(!inside(&clip, [7.0, 7.0]));
        }
    }

    #[test]
    fn singular_matrix_clips_everything() {
        let mut clip = ClipRectInverseMatrix::new(
            &Transform::IDENTITY,
            &Rect::new(0.0, 0.0, 10.0, 10.0),
        );
        assert!(!clip.is_empty());
        clip.reset(&Transform::scale(1.0, 0.0), &Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(clip, ClipRectInverseMatrix::EMPTY);
    }

    #[test]
    fn wide_open_clips_nothing() {
        let clip = ClipRectInverseMatrix::default();
        assert_eq!(clip, ClipRectInverseMatrix::WIDE_OPEN);
        assert!(inside(&clip, [-1e6, 1e6]));
    }
}
