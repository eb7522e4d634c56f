//! The canvas: owns GL buffers, the backdrop copy and the program cache,
//! and issues draw calls.

use std::sync::Arc;

use glow::{HasContext, PixelUnpackData};
use lyon::path::Path;

use crate::compositing::{BlendMode, PorterDuff};
use crate::error::{Error, Result};
use crate::program::{ProgramCache, BACKDROP_UNIT};
use crate::sampler::Sampler;
use crate::tessellate::{self, Tessellator};
use crate::texture::{gl_size, set_default_tex_params, RGBA8_INTERNAL_FORMAT};
use crate::types::{CanvasOptions, Mesh, Transform, Vertex};

/// How a shape is colored and composited.
#[derive(Clone, Copy)]
pub struct Paint<'a> {
    /// Color source, sampled at each fragment's local position.
    pub sampler: &'a dyn Sampler,
    /// Blend against the existing pixels.
    pub blend_mode: BlendMode,
    /// Porter-Duff operator applied after blending.
    pub porter_duff: PorterDuff,
    /// Multiplies the sampled alpha.
    pub opacity: f32,
    /// Local to pixel space.
    pub transform: Transform,
}

impl<'a> Paint<'a> {
    /// Opaque source-over paint with the identity transform.
    pub fn new(sampler: &'a dyn Sampler) -> Self {
        Self {
            sampler,
            blend_mode: BlendMode::Normal,
            porter_duff: PorterDuff::SourceOver,
            opacity: 1.0,
            transform: Transform::IDENTITY,
        }
    }

    /// Sets the blend mode.
    #[must_use]
    pub fn blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    /// Sets the Porter-Duff operator.
    #[must_use]
    pub fn porter_duff(mut self, porter_duff: PorterDuff) -> Self {
        self.porter_duff = porter_duff;
        self
    }

    /// Sets the opacity.
    #[must_use]
    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    /// Sets the transform.
    #[must_use]
    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}

/// Draws sampler-painted shapes into the currently bound framebuffer.
///
/// Each distinct sampler-tree shape is composed into a fragment shader once
/// and kept in an LRU [`ProgramCache`]; drawing the same shape with other
/// uniform values reuses the program.
///
/// # Example
///
/// ```no_run
/// # use nitrogl::{Canvas, CanvasOptions, Paint};
/// # use nitrogl::sampler::ColorSampler;
/// # use std::sync::Arc;
/// # fn example(gl: Arc<glow::Context>) -> nitrogl::Result<()> {
/// // During setup (with a current GL context):
/// let mut canvas = unsafe { Canvas::new(gl, CanvasOptions::default()) }?;
///
/// // Each frame:
/// let red = ColorSampler::new([1.0, 0.0, 0.0, 1.0]);
/// unsafe { canvas.draw_rect(10.0, 10.0, 100.0, 50.0, &Paint::new(&red)) }?;
/// # Ok(())
/// # }
/// ```
pub struct Canvas {
    /// The OpenGL context, shared via [`Arc`] with the program cache.
    gl: Arc<glow::Context>,

    /// Compiled programs by sampler-tree shape.
    programs: ProgramCache,
    /// Path tessellation state.
    tessellator: Tessellator,

    /// Vertex array object with a single `vec2` position attribute.
    vao: glow::VertexArray,
    /// Vertex buffer for streaming mesh vertex data.
    vbo: glow::Buffer,
    /// Element (index) buffer for streaming mesh index data.
    ebo: glow::Buffer,

    /// Copy of the framebuffer read by blend modes other than normal.
    backdrop: glow::Texture,
    /// Allocated size of [`backdrop`](Self::backdrop).
    backdrop_size: [u32; 2],

    /// Viewport size in pixels.
    size: [u32; 2],
}

impl Canvas {
    /// Create a new canvas.
    ///
    /// # Safety
    ///
    /// The `gl` context must be current and valid. The caller must ensure
    /// that [`destroy`](Self::destroy) is called before the context is
    /// dropped.
    ///
    /// # Errors
    ///
    /// [`Error::Gl`] if buffer or texture creation fails.
    pub unsafe fn new(gl: Arc<glow::Context>, options: CanvasOptions) -> Result<Self> {
        let (vao, vbo, ebo) = unsafe {
            let vao = gl.create_vertex_array().map_err(Error::Gl)?;
            let vbo = gl.create_buffer().map_err(Error::Gl)?;
            let ebo = gl.create_buffer().map_err(Error::Gl)?;

            // Set up VAO with a single vec2 position attribute.
            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ebo));
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(
                0,
                2,
                glow::FLOAT,
                false,
                // Vertex is 8 bytes.
                #[expect(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                {
                    std::mem::size_of::<Vertex>() as i32
                },
                0,
            );
            gl.bind_vertex_array(None);

            (vao, vbo, ebo)
        };

        let backdrop = unsafe { gl.create_texture() }.map_err(Error::Gl)?;
        tracing::debug!(?options, "created canvas");

        Ok(Self {
            programs: ProgramCache::new(Arc::clone(&gl), options.program_cache_load_factor),
            gl,
            tessellator: Tessellator::new(options.tolerance),
            vao,
            vbo,
            ebo,
            backdrop,
            backdrop_size: [0, 0],
            size: options.size,
        })
    }

    /// Viewport size in pixels.
    pub fn size(&self) -> [u32; 2] {
        self.size
    }

    /// Sets the viewport to `[width, height]` pixels.
    ///
    /// # Safety
    ///
    /// Requires the canvas's context to be current.
    ///
    /// # Errors
    ///
    /// [`Error::Gl`] if a dimension exceeds `i32::MAX`.
    pub unsafe fn set_size(&mut self, [width, height]: [u32; 2]) -> Result<()> {
        let (w, h) = (gl_size(width)?, gl_size(height)?);
        unsafe { self.gl.viewport(0, 0, w, h) };
        self.size = [width, height];
        Ok(())
    }

    /// Clears the target to a straight-alpha color.
    ///
    /// # Safety
    ///
    /// Requires the canvas's context to be current.
    pub unsafe fn clear(&self, [r, g, b, a]: [f32; 4]) {
        unsafe {
            self.gl.clear_color(r * a, g * a, b * a, a);
            self.gl.clear(glow::COLOR_BUFFER_BIT);
        }
    }

    /// The compiled-program cache.
    pub fn programs(&self) -> &ProgramCache {
        &self.programs
    }

    /// Fills an axis-aligned rectangle.
    ///
    /// # Safety
    ///
    /// Requires the canvas's context to be current.
    ///
    /// # Errors
    ///
    /// See [`draw_mesh`](Self::draw_mesh).
    pub unsafe fn draw_rect(&mut self, x: f32, y: f32, width: f32, height: f32, paint: &Paint<'_>) -> Result<()> {
        unsafe { self.fill_path(&tessellate::rect_path(x, y, width, height), paint) }
    }

    /// Fills a rectangle with rounded corners.
    ///
    /// # Safety
    ///
    /// Requires the canvas's context to be current.
    ///
    /// # Errors
    ///
    /// See [`draw_mesh`](Self::draw_mesh).
    pub unsafe fn draw_rounded_rect(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        radius: f32,
        paint: &Paint<'_>,
    ) -> Result<()> {
        let path = tessellate::rounded_rect_path(x, y, width, height, radius);
        unsafe { self.fill_path(&path, paint) }
    }

    /// Fills a circle.
    ///
    /// # Safety
    ///
    /// Requires the canvas's context to be current.
    ///
    /// # Errors
    ///
    /// See [`draw_mesh`](Self::draw_mesh).
    pub unsafe fn draw_circle(&mut self, cx: f32, cy: f32, radius: f32, paint: &Paint<'_>) -> Result<()> {
        unsafe { self.fill_path(&tessellate::circle_path(cx, cy, radius), paint) }
    }

    /// Strokes a circular arc `stroke_width` wide.
    ///
    /// # Safety
    ///
    /// Requires the canvas's context to be current.
    ///
    /// # Errors
    ///
    /// See [`draw_mesh`](Self::draw_mesh).
    #[expect(clippy::too_many_arguments)]
    pub unsafe fn draw_arc(
        &mut self,
        cx: f32,
        cy: f32,
        radius: f32,
        start: f32,
        sweep: f32,
        stroke_width: f32,
        paint: &Paint<'_>,
    ) -> Result<()> {
        let path = tessellate::arc_path(cx, cy, radius, start, sweep, self.tessellator.tolerance());
        unsafe { self.stroke_path(&path, stroke_width, paint) }
    }

    /// Fills a caller-built path.
    ///
    /// # Safety
    ///
    /// Requires the canvas's context to be current.
    ///
    /// # Errors
    ///
    /// See [`draw_mesh`](Self::draw_mesh).
    pub unsafe fn draw_path(&mut self, path: &Path, paint: &Paint<'_>) -> Result<()> {
        unsafe { self.fill_path(path, paint) }
    }

    /// Strokes a caller-built path `stroke_width` wide.
    ///
    /// # Safety
    ///
    /// Requires the canvas's context to be current.
    ///
    /// # Errors
    ///
    /// See [`draw_mesh`](Self::draw_mesh).
    pub unsafe fn stroke_path(&mut self, path: &Path, stroke_width: f32, paint: &Paint<'_>) -> Result<()> {
        match self.tessellator.stroke(path, stroke_width) {
            Some(mesh) => unsafe { self.draw_mesh(&mesh, paint) },
            None => Ok(()),
        }
    }

    unsafe fn fill_path(&mut self, path: &Path, paint: &Paint<'_>) -> Result<()> {
        match self.tessellator.fill(path) {
            Some(mesh) => unsafe { self.draw_mesh(&mesh, paint) },
            None => Ok(()),
        }
    }

    /// Draws a triangle mesh.
    ///
    /// Looks up (or composes and links) the program for the paint's sampler,
    /// copies the backdrop if the blend mode reads it, uploads uniforms, sets
    /// the Porter-Duff blend function, and draws.
    ///
    /// # Safety
    ///
    /// Requires the canvas's context to be current.
    ///
    /// # Errors
    ///
    /// Composition and link errors, and [`Error::UniformLocationMissing`]
    /// if a sampler uploads a uniform the program does not have.
    pub unsafe fn draw_mesh(&mut self, mesh: &Mesh, paint: &Paint<'_>) -> Result<()> {
        if mesh.is_empty() {
            return Ok(());
        }
        if paint.blend_mode.needs_backdrop() {
            unsafe { self.copy_backdrop() }?;
        }

        // Precision loss is acceptable: viewport dimensions are small
        // relative to f32 mantissa range.
        #[expect(clippy::cast_precision_loss)]
        let resolution = [self.size[0] as f32, self.size[1] as f32];
        let gl = &self.gl;
        let program = unsafe { self.programs.get_or_compile(paint.sampler) }?;

        unsafe {
            gl.use_program(Some(program.raw()));
            let builtins = &program.builtins;
            gl.uniform_matrix_3_f32_slice(Some(&builtins.transform), false, &paint.transform.to_mat3());
            gl.uniform_2_f32(Some(&builtins.resolution), resolution[0], resolution[1]);
            gl.uniform_1_i32(builtins.blend_mode.as_ref(), paint.blend_mode.code());
            gl.uniform_1_f32(builtins.opacity.as_ref(), paint.opacity);

            gl.active_texture(glow::TEXTURE0 + BACKDROP_UNIT);
            gl.bind_texture(glow::TEXTURE_2D, Some(self.backdrop));
            #[allow(clippy::cast_possible_wrap)]
            gl.uniform_1_i32(builtins.backdrop.as_ref(), BACKDROP_UNIT as i32);

            program.upload_uniforms(gl, paint.sampler)?;

            let (src, dst) = paint.porter_duff.gl_blend_factors();
            gl.enable(glow::BLEND);
            gl.blend_func(src, dst);
        }

        unsafe { self.upload_and_draw(mesh) }
    }

    /// Copies the current framebuffer into the backdrop texture.
    unsafe fn copy_backdrop(&mut self) -> Result<()> {
        let gl = &self.gl;
        let [width, height] = self.size;
        let (w, h) = (gl_size(width)?, gl_size(height)?);

        unsafe {
            gl.active_texture(glow::TEXTURE0 + BACKDROP_UNIT);
            gl.bind_texture(glow::TEXTURE_2D, Some(self.backdrop));
            if self.backdrop_size != self.size {
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    RGBA8_INTERNAL_FORMAT,
                    w,
                    h,
                    0,
                    glow::RGBA,
                    glow::UNSIGNED_BYTE,
                    PixelUnpackData::Slice(None),
                );
                set_default_tex_params(gl);
                tracing::trace!(width, height, "resized backdrop");
                self.backdrop_size = self.size;
            }
            gl.copy_tex_sub_image_2d(glow::TEXTURE_2D, 0, 0, 0, 0, 0, w, h);
        }
        Ok(())
    }

    /// Upload mesh vertex/index data to the GPU and issue a draw call.
    unsafe fn upload_and_draw(&self, mesh: &Mesh) -> Result<()> {
        let gl = &self.gl;
        let index_count = i32::try_from(mesh.indices.len())
            .map_err(|_| Error::Gl(format!("{} indices exceed i32::MAX", mesh.indices.len())))?;

        unsafe {
            gl.bind_vertex_array(Some(self.vao));

            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&mesh.vertices),
                glow::STREAM_DRAW,
            );

            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(self.ebo));
            gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(&mesh.indices),
                glow::STREAM_DRAW,
            );

            gl.draw_elements(glow::TRIANGLES, index_count, glow::UNSIGNED_INT, 0);

            gl.bind_vertex_array(None);
        }
        Ok(())
    }

    /// Release all GL resources owned by this canvas.
    ///
    /// # Safety
    ///
    /// Requires the canvas's context to be current.
    pub unsafe fn destroy(mut self) {
        unsafe {
            self.programs.clear();
            let gl = &self.gl;
            gl.delete_vertex_array(self.vao);
            gl.delete_buffer(self.vbo);
            gl.delete_buffer(self.ebo);
            gl.delete_texture(self.backdrop);
        }
    }
}
