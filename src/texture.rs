//! RGBA8 textures uploaded from raw pixels or encoded images.

use glow::{HasContext, PixelUnpackData};

use crate::error::{Error, Result};

/// GL internal format for RGBA8 textures, pre-cast to the `i32` that
/// `tex_image_2d` expects.
#[expect(clippy::cast_possible_wrap)]
pub(crate) const RGBA8_INTERNAL_FORMAT: i32 = glow::RGBA8 as i32;

/// Convert a `u32` dimension to the `i32` GL calls take.
pub(crate) fn gl_size(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::Gl(format!("dimension {value} exceeds i32::MAX")))
}

/// Decoded straight-alpha RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    /// Row-major pixels, 4 bytes each, top row first.
    pub pixels: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl RgbaImage {
    /// Decodes PNG or JPEG bytes.
    ///
    /// # Errors
    ///
    /// [`Error::Image`] if the format is unknown or the data is corrupt.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = image.dimensions();
        Ok(Self {
            pixels: image.into_raw(),
            width,
            height,
        })
    }
}

/// A GL texture with linear filtering and clamped edges.
#[derive(Debug)]
pub struct Texture {
    raw: glow::Texture,
    width: u32,
    height: u32,
}

impl Texture {
    /// Uploads `width * height` RGBA8 pixels.
    ///
    /// # Safety
    ///
    /// Requires a valid, current OpenGL context. The caller must
    /// [`destroy`](Self::destroy) the texture before the context is dropped.
    ///
    /// # Errors
    ///
    /// [`Error::Image`] if `pixels` has the wrong length, [`Error::Gl`] if
    /// the texture cannot be created.
    pub unsafe fn from_rgba(gl: &glow::Context, width: u32, height: u32, pixels: &[u8]) -> Result<Self> {
        let expected = u64::from(width) * u64::from(height) * 4;
        if pixels.len() as u64 != expected {
            return Err(Error::Image(format!(
                "{width}x{height} RGBA image needs {expected} bytes, got {}",
                pixels.len()
            )));
        }
        let (w, h) = (gl_size(width)?, gl_size(height)?);

        let raw = unsafe { gl.create_texture() }.map_err(Error::Gl)?;
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(raw));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                RGBA8_INTERNAL_FORMAT,
                w,
                h,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(pixels)),
            );
            set_default_tex_params(gl);
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
        tracing::debug!(width, height, "uploaded texture");

        Ok(Self { raw, width, height })
    }

    /// Decodes an encoded image and uploads it.
    ///
    /// # Safety
    ///
    /// Same as [`from_rgba`](Self::from_rgba).
    ///
    /// # Errors
    ///
    /// Decoding and upload errors.
    pub unsafe fn from_memory(gl: &glow::Context, bytes: &[u8]) -> Result<Self> {
        let image = RgbaImage::decode(bytes)?;
        unsafe { Self::from_rgba(gl, image.width, image.height, &image.pixels) }
    }

    /// GL texture name.
    pub fn raw(&self) -> glow::Texture {
        self.raw
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Width over height.
    #[expect(clippy::cast_precision_loss)]
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Deletes the GL texture.
    ///
    /// # Safety
    ///
    /// Requires the context the texture was created with to be current.
    pub unsafe fn destroy(self, gl: &glow::Context) {
        unsafe { gl.delete_texture(self.raw) };
    }
}

/// Set default texture filtering and wrapping parameters on the bound
/// `TEXTURE_2D`.
pub(crate) unsafe fn set_default_tex_params(gl: &glow::Context) {
    // GL constant values are small enough that the cast is always safe.
    #[expect(clippy::cast_possible_wrap)]
    unsafe {
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
    }
}
