//! Texture sampler.

use crate::error::Result;
use crate::sampler::{Sampler, SamplerUniforms};
use crate::texture::Texture;

/// Samples a texture placed over the rectangle `origin .. origin + size`
/// of `uv` space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureSampler {
    /// GL texture name.
    pub texture: glow::Texture,
    /// `uv` of the texture's top-left corner.
    pub origin: [f32; 2],
    /// `uv` extent covered by the whole texture.
    pub size: [f32; 2],
}

impl TextureSampler {
    /// Stretches `texture` over the unit square.
    pub fn new(texture: glow::Texture) -> Self {
        Self {
            texture,
            origin: [0.0, 0.0],
            size: [1.0, 1.0],
        }
    }

    /// Stretches an uploaded [`Texture`] over the unit square.
    pub fn from_texture(texture: &Texture) -> Self {
        Self::new(texture.raw())
    }

    /// Places the texture over `origin .. origin + size`.
    #[must_use]
    pub fn placed(mut self, origin: [f32; 2], size: [f32; 2]) -> Self {
        self.origin = origin;
        self.size = size;
        self
    }
}

impl Sampler for TextureSampler {
    fn uniforms(&self) -> &str {
        "sampler2D tex; vec2 origin; vec2 size;"
    }

    fn main(&self) -> &str {
        r"vec2 st = (uv - data.origin) / data.size;
    return texture(data.tex, st);"
    }

    fn upload_uniforms(&self, uniforms: &mut SamplerUniforms<'_>) -> Result<()> {
        uniforms.set_texture("tex", self.texture)?;
        uniforms.set_vec2("origin", self.origin)?;
        uniforms.set_vec2("size", self.size)
    }
}
