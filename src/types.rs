//! Geometry and configuration types shared by the GL layer.

use bytemuck::{Pod, Zeroable};

/// A vertex in a tessellated path, ready for the GPU.
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Vertex {
    /// Local-space position; also the `uv` samplers receive.
    pub position: [f32; 2],
}

/// Indexed triangle list, drawn with `glDrawElements(GL_TRIANGLES, ...)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Vertex data.
    pub vertices: Vec<Vertex>,
    /// Three indices per triangle.
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Returns `true` if there is nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Axis-aligned bounds `[min_x, min_y, max_x, max_y]`, or `None` for a
    /// mesh without vertices.
    pub fn bounds(&self) -> Option<[f32; 4]> {
        let first = self.vertices.first()?.position;
        Some(self.vertices.iter().fold(
            [first[0], first[1], first[0], first[1]],
            |[x0, y0, x1, y1], v| {
                let [x, y] = v.position;
                [x0.min(x), y0.min(y), x1.max(x), y1.max(y)]
            },
        ))
    }
}

/// 2D affine transform from local to pixel space, stored as the top two
/// rows of a 3x3 matrix: `x' = m[0][0] x + m[0][1] y + m[0][2]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Row-major `2x3` matrix.
    pub m: [[f32; 3]; 2],
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    /// No-op transform.
    pub const IDENTITY: Self = Self {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
    };

    /// Translation by `(x, y)`.
    pub const fn translation(x: f32, y: f32) -> Self {
        Self {
            m: [[1.0, 0.0, x], [0.0, 1.0, y]],
        }
    }

    /// Scale about the origin.
    pub const fn scaling(sx: f32, sy: f32) -> Self {
        Self {
            m: [[sx, 0.0, 0.0], [0.0, sy, 0.0]],
        }
    }

    /// Counter-clockwise rotation by `radians` about the origin (clockwise
    /// on screen, where y points down).
    pub fn rotation(radians: f32) -> Self {
        let (s, c) = radians.sin_cos();
        Self {
            m: [[c, -s, 0.0], [s, c, 0.0]],
        }
    }

    /// `self` applied after `inner`.
    #[must_use]
    pub fn then_after(&self, inner: &Self) -> Self {
        let a = &self.m;
        let b = &inner.m;
        Self {
            m: [
                [
                    a[0][0] * b[0][0] + a[0][1] * b[1][0],
                    a[0][0] * b[0][1] + a[0][1] * b[1][1],
                    a[0][0] * b[0][2] + a[0][1] * b[1][2] + a[0][2],
                ],
                [
                    a[1][0] * b[0][0] + a[1][1] * b[1][0],
                    a[1][0] * b[0][1] + a[1][1] * b[1][1],
                    a[1][0] * b[0][2] + a[1][1] * b[1][2] + a[1][2],
                ],
            ],
        }
    }

    /// Translates local coordinates before this transform applies.
    #[must_use]
    pub fn pre_translate(&self, x: f32, y: f32) -> Self {
        self.then_after(&Self::translation(x, y))
    }

    /// Scales local coordinates before this transform applies.
    #[must_use]
    pub fn pre_scale(&self, sx: f32, sy: f32) -> Self {
        self.then_after(&Self::scaling(sx, sy))
    }

    /// Rotates local coordinates before this transform applies.
    #[must_use]
    pub fn pre_rotate(&self, radians: f32) -> Self {
        self.then_after(&Self::rotation(radians))
    }

    /// Maps a local point to pixel space.
    pub fn apply(&self, [x, y]: [f32; 2]) -> [f32; 2] {
        let m = &self.m;
        [
            m[0][0] * x + m[0][1] * y + m[0][2],
            m[1][0] * x + m[1][1] * y + m[1][2],
        ]
    }

    /// Column-major `mat3` for `glUniformMatrix3fv`.
    pub fn to_mat3(&self) -> [f32; 9] {
        let m = &self.m;
        [
            m[0][0], m[1][0], 0.0, //
            m[0][1], m[1][1], 0.0, //
            m[0][2], m[1][2], 1.0,
        ]
    }
}

/// Settings for a [`Canvas`](crate::Canvas).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasOptions {
    /// Initial viewport size in pixels.
    pub size: [u32; 2],
    /// Maximum distance between a curve and its tessellation, in local
    /// units.
    pub tolerance: f32,
    /// Load factor of the compiled-program cache.
    pub program_cache_load_factor: f32,
}

impl Default for CanvasOptions {
    fn default() -> Self {
        Self {
            size: [800, 600],
            tolerance: 0.01,
            program_cache_load_factor: 0.75,
        }
    }
}
