//! Two-child mix sampler.

use crate::error::Result;
use crate::sampler::{Sampler, SamplerUniforms};

/// Linear blend of two child samplers: `mix(a, b, t)`.
pub struct MixSampler<'a> {
    /// Sampled at `t = 0`.
    pub a: &'a dyn Sampler,
    /// Sampled at `t = 1`.
    pub b: &'a dyn Sampler,
    /// Blend factor.
    pub t: f32,
}

impl<'a> MixSampler<'a> {
    /// Blends `a` toward `b` by `t`.
    pub fn new(a: &'a dyn Sampler, b: &'a dyn Sampler, t: f32) -> Self {
        Self { a, b, t }
    }
}

impl Sampler for MixSampler<'_> {
    fn uniforms(&self) -> &str {
        "float t;"
    }

    fn main(&self) -> &str {
        "return mix(sampler_00(uv), sampler_01(uv), data.t);"
    }

    fn sub_samplers_count(&self) -> usize {
        2
    }

    fn sub_sampler(&self, index: usize) -> Option<&dyn Sampler> {
        match index {
            0 => Some(self.a),
            1 => Some(self.b),
            _ => None,
        }
    }

    fn upload_uniforms(&self, uniforms: &mut SamplerUniforms<'_>) -> Result<()> {
        uniforms.set_f32("t", self.t)
    }
}
