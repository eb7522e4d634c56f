//! Linked sampler programs, their uniform plumbing, and the program cache.

use std::sync::Arc;

use glow::HasContext;
use rustc_hash::FxHashMap;

use crate::compositor::{composite_main_program_from_sampler, CompositeSource};
use crate::error::{Error, Result};
use crate::lru::LruCache;
use crate::sampler::{self, hash_code, Sampler, UniformSink};
use crate::shaders;

/// Texture unit the backdrop copy is bound to. Sampler textures start at
/// the next unit.
pub(crate) const BACKDROP_UNIT: u32 = 0;

/// Locations of the uniforms every composed program declares.
#[derive(Debug)]
pub(crate) struct BuiltinUniforms {
    /// `u_transform`
    pub(crate) transform: glow::UniformLocation,
    /// `u_resolution`
    pub(crate) resolution: glow::UniformLocation,
    /// `u_backdrop`; optimised out by some drivers when never read.
    pub(crate) backdrop: Option<glow::UniformLocation>,
    /// `u_blend_mode`
    pub(crate) blend_mode: Option<glow::UniformLocation>,
    /// `u_opacity`
    pub(crate) opacity: Option<glow::UniformLocation>,
}

/// A linked program generated from one sampler-tree shape.
#[derive(Debug)]
pub struct MainShaderProgram {
    program: glow::Program,
    hash: u64,
    sampler_count: usize,
    pub(crate) builtins: BuiltinUniforms,
    locations: FxHashMap<String, glow::UniformLocation>,
}

impl MainShaderProgram {
    /// Compiles and links a composed fragment shader with the shared vertex
    /// shader.
    ///
    /// # Safety
    ///
    /// Requires a valid, current OpenGL context. The caller must
    /// [`destroy`](Self::destroy) the program before the context is dropped.
    ///
    /// # Errors
    ///
    /// [`Error::Shader`] if compilation or linking fails,
    /// [`Error::UniformLocationMissing`] if `u_transform` or `u_resolution`
    /// is absent.
    pub unsafe fn link(gl: &glow::Context, composite: &CompositeSource) -> Result<Self> {
        let program =
            unsafe { shaders::compile_program(gl, shaders::VERTEX_SRC, &composite.source)? };

        let required = |name: &str| {
            unsafe { gl.get_uniform_location(program, name) }
                .ok_or_else(|| Error::UniformLocationMissing(name.to_string()))
        };
        let builtins = match (required("u_transform"), required("u_resolution")) {
            (Ok(transform), Ok(resolution)) => unsafe {
                BuiltinUniforms {
                    transform,
                    resolution,
                    backdrop: gl.get_uniform_location(program, "u_backdrop"),
                    blend_mode: gl.get_uniform_location(program, "u_blend_mode"),
                    opacity: gl.get_uniform_location(program, "u_opacity"),
                }
            },
            (Err(err), _) | (_, Err(err)) => {
                unsafe { gl.delete_program(program) };
                return Err(err);
            }
        };

        tracing::debug!(
            hash = composite.hash,
            samplers = composite.sampler_count,
            "linked sampler program"
        );
        Ok(Self {
            program,
            hash: composite.hash,
            sampler_count: composite.sampler_count,
            builtins,
            locations: FxHashMap::default(),
        })
    }

    /// GL program name.
    pub fn raw(&self) -> glow::Program {
        self.program
    }

    /// Structural hash of the sampler tree this program was built from.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Number of samplers composed into the program.
    pub fn sampler_count(&self) -> usize {
        self.sampler_count
    }

    /// Resolves and caches a mangled uniform location.
    ///
    /// # Safety
    ///
    /// Requires the program's context to be current.
    ///
    /// # Errors
    ///
    /// [`Error::UniformLocationMissing`] if the program has no active
    /// uniform called `name`.
    pub unsafe fn uniform_location(
        &mut self,
        gl: &glow::Context,
        name: &str,
    ) -> Result<glow::UniformLocation> {
        if let Some(location) = self.locations.get(name) {
            return Ok(location.clone());
        }
        let location = unsafe { gl.get_uniform_location(self.program, name) }
            .ok_or_else(|| Error::UniformLocationMissing(name.to_string()))?;
        self.locations.insert(name.to_string(), location.clone());
        Ok(location)
    }

    /// Resolves every uniform `sampler` uploads without setting any, so
    /// later uploads only hit the cache.
    ///
    /// # Safety
    ///
    /// Requires the program's context to be current.
    ///
    /// # Errors
    ///
    /// The first missing location.
    pub unsafe fn cache_uniform_locations(
        &mut self,
        gl: &glow::Context,
        sampler: &dyn Sampler,
    ) -> Result<()> {
        let mut sink = GlUniformSink {
            gl,
            program: self,
            next_unit: BACKDROP_UNIT + 1,
            resolve_only: true,
        };
        sampler::upload_uniforms(sampler, &mut sink)
    }

    /// Uploads `sampler`'s uniforms. The program must be in use.
    ///
    /// # Safety
    ///
    /// Requires the program's context to be current with this program
    /// bound.
    ///
    /// # Errors
    ///
    /// The first missing location.
    pub unsafe fn upload_uniforms(&mut self, gl: &glow::Context, sampler: &dyn Sampler) -> Result<()> {
        let mut sink = GlUniformSink {
            gl,
            program: self,
            next_unit: BACKDROP_UNIT + 1,
            resolve_only: false,
        };
        sampler::upload_uniforms(sampler, &mut sink)
    }

    /// Deletes the GL program.
    ///
    /// # Safety
    ///
    /// Requires the program's context to be current.
    pub unsafe fn destroy(self, gl: &glow::Context) {
        unsafe { gl.delete_program(self.program) };
    }
}

/// [`UniformSink`] writing into a bound [`MainShaderProgram`].
///
/// Textures take consecutive units after the backdrop's. With
/// `resolve_only`, names are looked up and cached but nothing is written.
pub struct GlUniformSink<'a> {
    gl: &'a glow::Context,
    program: &'a mut MainShaderProgram,
    next_unit: u32,
    resolve_only: bool,
}

impl GlUniformSink<'_> {
    fn location(&mut self, name: &str) -> Result<Option<glow::UniformLocation>> {
        let location = unsafe { self.program.uniform_location(self.gl, name) }?;
        Ok((!self.resolve_only).then_some(location))
    }
}

impl UniformSink for GlUniformSink<'_> {
    fn set_i32(&mut self, name: &str, v: i32) -> Result<()> {
        if let Some(location) = self.location(name)? {
            unsafe { self.gl.uniform_1_i32(Some(&location), v) };
        }
        Ok(())
    }

    fn set_f32(&mut self, name: &str, v: f32) -> Result<()> {
        if let Some(location) = self.location(name)? {
            unsafe { self.gl.uniform_1_f32(Some(&location), v) };
        }
        Ok(())
    }

    fn set_vec2(&mut self, name: &str, [x, y]: [f32; 2]) -> Result<()> {
        if let Some(location) = self.location(name)? {
            unsafe { self.gl.uniform_2_f32(Some(&location), x, y) };
        }
        Ok(())
    }

    fn set_vec4(&mut self, name: &str, [x, y, z, w]: [f32; 4]) -> Result<()> {
        if let Some(location) = self.location(name)? {
            unsafe { self.gl.uniform_4_f32(Some(&location), x, y, z, w) };
        }
        Ok(())
    }

    fn set_texture(&mut self, name: &str, texture: glow::Texture) -> Result<()> {
        let Some(location) = self.location(name)? else {
            return Ok(());
        };
        let unit = self.next_unit;
        self.next_unit += 1;
        // Units are bounded by the 100-sampler limit.
        #[expect(clippy::cast_possible_wrap)]
        let unit_index = unit as i32;
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            self.gl.uniform_1_i32(Some(&location), unit_index);
            self.gl.active_texture(glow::TEXTURE0);
        }
        Ok(())
    }
}

/// Number of address bits of the program cache: 64 slots.
pub const PROGRAM_CACHE_BITS: u32 = 6;

/// Compiled programs keyed by sampler-tree [`hash_code`], least recently
/// used evicted first.
pub struct ProgramCache {
    gl: Arc<glow::Context>,
    programs: LruCache<MainShaderProgram, PROGRAM_CACHE_BITS, u64>,
}

impl ProgramCache {
    /// Empty cache holding at most `load_factor * 64` programs.
    pub fn new(gl: Arc<glow::Context>, load_factor: f32) -> Self {
        Self {
            gl,
            programs: LruCache::new(load_factor),
        }
    }

    /// Returns the program for `sampler`'s shape, compositing and linking
    /// it on a miss. A program evicted to make room is deleted.
    ///
    /// # Safety
    ///
    /// Requires the cache's context to be current.
    ///
    /// # Errors
    ///
    /// Composition and link errors.
    pub unsafe fn get_or_compile(&mut self, sampler: &dyn Sampler) -> Result<&mut MainShaderProgram> {
        let hash = hash_code(sampler)?;
        if self.programs.contains(hash) {
            tracing::trace!(hash, "sampler program cache hit");
        } else {
            let program = unsafe { composite_main_program_from_sampler(&self.gl, sampler)? };
            if let Some((evicted_hash, evicted)) = self.programs.put(hash, program)? {
                tracing::debug!(hash = evicted_hash, "evicting sampler program");
                unsafe { evicted.destroy(&self.gl) };
            }
        }
        self.programs.get(hash).ok_or(Error::NotFound)
    }

    /// Returns `true` if a program for `sampler`'s shape is cached. A tree
    /// too deep to compose is never cached.
    pub fn contains(&self, sampler: &dyn Sampler) -> bool {
        hash_code(sampler).is_ok_and(|hash| self.programs.contains(hash))
    }

    /// Number of cached programs.
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Most programs kept before eviction starts.
    pub fn max_size(&self) -> usize {
        self.programs.max_size()
    }

    /// Deletes every cached program.
    ///
    /// # Safety
    ///
    /// Requires the cache's context to be current.
    pub unsafe fn clear(&mut self) {
        for (_, program) in self.programs.drain() {
            unsafe { program.destroy(&self.gl) };
        }
    }
}
