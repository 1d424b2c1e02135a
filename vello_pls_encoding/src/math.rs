// Copyright 2022 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::ops::Mul;

use bytemuck::{Pod, Zeroable};
use peniko::kurbo;

/// Affine transformation matrix.
///
/// Maps `(x, y)` to `(m[0] * x + m[2] * y + t[0], m[1] * x + m[3] * y + t[1])`.
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Transform {
    /// 2x2 matrix.
    pub matrix: [f32; 4],
    /// Translation.
    pub translation: [f32; 2],
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    /// Identity transform.
    pub const IDENTITY: Self = Self {
        matrix: [1.0, 0.0, 0.0, 1.0],
        translation: [0.0; 2],
    };

    /// Creates a transform from `[xx, xy, yx, yy, tx, ty]`.
    pub const fn new(c: [f32; 6]) -> Self {
        Self {
            matrix: [c[0], c[1], c[2], c[3]],
            translation: [c[4], c[5]],
        }
    }

    pub const fn scale(sx: f32, sy: f32) -> Self {
        Self::new([sx, 0.0, 0.0, sy, 0.0, 0.0])
    }

    pub const fn translate(tx: f32, ty: f32) -> Self {
        Self::new([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// Creates a transform from a kurbo affine matrix.
    pub fn from_kurbo(transform: &kurbo::Affine) -> Self {
        let c = transform.as_coeffs().map(|x| x as f32);
        Self::new(c)
    }

    /// Converts the transform to a kurbo affine matrix.
    pub fn to_kurbo(&self) -> kurbo::Affine {
        kurbo::Affine::new(
            [
                self.matrix[0],
                self.matrix[1],
                self.matrix[2],
                self.matrix[3],
                self.translation[0],
                self.translation[1],
            ]
            .map(|x| x as f64),
        )
    }

    pub fn determinant(&self) -> f32 {
        self.matrix[0] * self.matrix[3] - self.matrix[1] * self.matrix[2]
    }

    /// Returns the inverse transform, or `None` if the matrix is singular.
    pub fn invert(&self) -> Option<Self> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv_det = 1.0 / det;
        let [a, b, c, d] = self.matrix;
        let [tx, ty] = self.translation;
        Some(Self {
            matrix: [d * inv_det, -b * inv_det, -c * inv_det, a * inv_det],
            translation: [
                (c * ty - d * tx) * inv_det,
                (b * tx - a * ty) * inv_det,
            ],
        })
    }

    pub fn map_point(&self, point: [f32; 2]) -> [f32; 2] {
        [
            self.matrix[0] * point[0] + self.matrix[2] * point[1] + self.translation[0],
            self.matrix[1] * point[0] + self.matrix[3] * point[1] + self.translation[1],
        ]
    }
}

impl Mul for Transform {
    type Output = Self;

    #[inline]
    fn mul(self, other: Self) -> Self {
        Self {
            matrix: [
                self.matrix[0] * other.matrix[0] + self.matrix[2] * other.matrix[1],
                self.matrix[1] * other.matrix[0] + self.matrix[3] * other.matrix[1],
                self.matrix[0] * other.matrix[2] + self.matrix[2] * other.matrix[3],
                self.matrix[1] * other.matrix[2] + self.matrix[3] * other.matrix[3],
            ],
            translation: [
                self.matrix[0] * other.translation[0]
                    + self.matrix[2] * other.translation[1]
                    + self.translation[0],
                self.matrix[1] * other.translation[0]
                    + self.matrix[3] * other.translation[1]
                    + self.translation[1],
            ],
        }
    }
}

/// Returns the device space area covered by `bounds` after transforming it by `matrix`.
pub fn find_transformed_area(bounds: &kurbo::Rect, matrix: &Transform) -> f32 {
    let corners = [
        [bounds.x0 as f32, bounds.y0 as f32],
        [bounds.x1 as f32, bounds.y0 as f32],
        [bounds.x1 as f32, bounds.y1 as f32],
        [bounds.x0 as f32, bounds.y1 as f32],
    ]
    .map(|p| matrix.map_point(p));
    let v = [1, 2, 3].map(|i| {
        [
            corners[i][0] - corners[0][0],
            corners[i][1] - corners[0][1],
        ]
    });
    let cross = |a: [f32; 2], b: [f32; 2]| a[0] * b[1] - a[1] * b[0];
    (cross(v[0], v[1]).abs() + cross(v[1], v[2]).abs()) * 0.5
}
