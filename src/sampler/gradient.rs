//! Linear and radial gradients over up to [`MAX_GRADIENT_STOPS`] color stops.

use crate::error::{Error, Result};
use crate::sampler::{Sampler, SamplerUniforms};

/// Stop capacity of every gradient; fixed by the GLSL array size.
pub const MAX_GRADIENT_STOPS: usize = 8;

const STOPS_UNIFORMS: &str = "vec4 colors[8]; float offsets[8]; int count;";

/// Shared by both gradients. Emitted once per program however many
/// gradients it contains.
const GRADIENT_FUNCTIONS: &str = r"vec4 __gradient_stops(vec4 colors[8], float offsets[8], int count, float t) {
    if (count <= 0) return vec4(0.0);
    if (t <= offsets[0]) return colors[0];
    for (int i = 1; i < 8; ++i) {
        if (i >= count) break;
        if (t <= offsets[i]) {
            float span = max(offsets[i] - offsets[i - 1], 1e-6);
            return mix(colors[i - 1], colors[i], (t - offsets[i - 1]) / span);
        }
    }
    return colors[count - 1];
}
";

/// Ordered color stops. Offsets are expected to be non-decreasing in
/// `[0, 1]`; colors between stops are interpolated linearly.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GradientStops {
    offsets: [f32; MAX_GRADIENT_STOPS],
    colors: [[f32; 4]; MAX_GRADIENT_STOPS],
    len: usize,
}

impl GradientStops {
    /// No stops.
    pub fn new() -> Self {
        Self::default()
    }

    /// Two stops at 0 and 1.
    pub fn two(from: [f32; 4], to: [f32; 4]) -> Self {
        let mut stops = Self::new();
        stops.offsets[0] = 0.0;
        stops.colors[0] = from;
        stops.offsets[1] = 1.0;
        stops.colors[1] = to;
        stops.len = 2;
        stops
    }

    /// Appends a stop.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] if all stops are in use.
    pub fn add_stop(&mut self, offset: f32, color: [f32; 4]) -> Result<()> {
        self.set_stop(self.len, offset, color)
    }

    /// Replaces stop `index`, or appends when `index == len()`.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] if `index` is past the capacity or would leave
    /// a gap.
    pub fn set_stop(&mut self, index: usize, offset: f32, color: [f32; 4]) -> Result<()> {
        if index >= MAX_GRADIENT_STOPS {
            return Err(Error::OutOfRange {
                index,
                len: MAX_GRADIENT_STOPS,
            });
        }
        if index > self.len {
            return Err(Error::OutOfRange {
                index,
                len: self.len,
            });
        }
        self.offsets[index] = offset;
        self.colors[index] = color;
        self.len = self.len.max(index + 1);
        Ok(())
    }

    /// Removes every stop.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Number of stops in use.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no stop is set.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `(offset, color)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (f32, [f32; 4])> + '_ {
        self.offsets[..self.len]
            .iter()
            .copied()
            .zip(self.colors[..self.len].iter().copied())
    }

    fn upload(&self, uniforms: &mut SamplerUniforms<'_>) -> Result<()> {
        uniforms.set_i32("count", i32::try_from(self.len).unwrap_or(i32::MAX))?;
        for (i, (offset, color)) in self.iter().enumerate() {
            uniforms.set_f32(&format!("offsets[{i}]"), offset)?;
            uniforms.set_vec4(&format!("colors[{i}]"), color)?;
        }
        Ok(())
    }
}

/// Gradient along the segment `start -> end`, in the sampled `uv` space.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearGradient {
    /// Point where `t = 0`.
    pub start: [f32; 2],
    /// Point where `t = 1`.
    pub end: [f32; 2],
    /// Color stops.
    pub stops: GradientStops,
    uniforms: String,
}

impl LinearGradient {
    /// Gradient from `start` to `end` with the given stops.
    pub fn new(start: [f32; 2], end: [f32; 2], stops: GradientStops) -> Self {
        Self {
            start,
            end,
            stops,
            uniforms: format!("vec2 start; vec2 end; {STOPS_UNIFORMS}"),
        }
    }
}

impl Sampler for LinearGradient {
    fn uniforms(&self) -> &str {
        &self.uniforms
    }

    fn main(&self) -> &str {
        r"vec2 d = data.end - data.start;
    float t = clamp(dot(uv - data.start, d) / max(dot(d, d), 1e-6), 0.0, 1.0);
    return __gradient_stops(data.colors, data.offsets, data.count, t);"
    }

    fn other_functions(&self) -> &str {
        GRADIENT_FUNCTIONS
    }

    fn upload_uniforms(&self, uniforms: &mut SamplerUniforms<'_>) -> Result<()> {
        uniforms.set_vec2("start", self.start)?;
        uniforms.set_vec2("end", self.end)?;
        self.stops.upload(uniforms)
    }
}

/// Gradient by distance from `center`, reaching `t = 1` at `radius`.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialGradient {
    /// Point where `t = 0`.
    pub center: [f32; 2],
    /// Distance where `t = 1`.
    pub radius: f32,
    /// Color stops.
    pub stops: GradientStops,
    uniforms: String,
}

impl RadialGradient {
    /// Gradient around `center` with the given stops.
    pub fn new(center: [f32; 2], radius: f32, stops: GradientStops) -> Self {
        Self {
            center,
            radius,
            stops,
            uniforms: format!("vec2 center; float radius; {STOPS_UNIFORMS}"),
        }
    }
}

impl Sampler for RadialGradient {
    fn uniforms(&self) -> &str {
        &self.uniforms
    }

    fn main(&self) -> &str {
        r"float t = clamp(length(uv - data.center) / max(data.radius, 1e-6), 0.0, 1.0);
    return __gradient_stops(data.colors, data.offsets, data.count, t);"
    }

    fn other_functions(&self) -> &str {
        GRADIENT_FUNCTIONS
    }

    fn upload_uniforms(&self, uniforms: &mut SamplerUniforms<'_>) -> Result<()> {
        uniforms.set_vec2("center", self.center)?;
        uniforms.set_f32("radius", self.radius)?;
        self.stops.upload(uniforms)
    }
}
