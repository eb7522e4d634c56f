//! Solid color sampler.

use crate::error::Result;
use crate::sampler::{Sampler, SamplerUniforms};

/// Solid color, straight (non-premultiplied) RGBA.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorSampler {
    /// RGBA in `[0, 1]`.
    pub color: [f32; 4],
}

impl ColorSampler {
    /// Sampler returning `color` everywhere.
    pub const fn new(color: [f32; 4]) -> Self {
        Self { color }
    }

    /// Opaque color from 8-bit channels.
    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::new([
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            1.0,
        ])
    }
}

impl Sampler for ColorSampler {
    fn uniforms(&self) -> &str {
        "vec4 color;"
    }

    fn main(&self) -> &str {
        "return data.color;"
    }

    fn upload_uniforms(&self, uniforms: &mut SamplerUniforms<'_>) -> Result<()> {
        uniforms.set_vec4("color", self.color)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::sampler::tests::RecordingSink;
    use crate::sampler::upload_uniforms;

    #[test]
    fn uploads_color() {
        let red = ColorSampler::from_rgb8(255, 0, 0);
        let mut sink = RecordingSink::default();
        upload_uniforms(&red, &mut sink).unwrap();
        assert_eq!(
            sink.calls,
            vec![("data_00.color".to_string(), "[1.0, 0.0, 0.0, 1.0]".to_string())]
        );
    }
}
