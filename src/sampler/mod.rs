//! Samplers: composable GLSL color sources.
//!
//! A sampler contributes the body of a `vec4 sampler_XX(vec2 uv)` function,
//! the members of its uniform struct, and optional helper functions. Inside
//! its body a sampler refers to its own uniforms as `data.<member>` and to
//! its children as `sampler_00(...)`, `sampler_01(...)`, ... by local index;
//! the [compositor](crate::compositor) rewrites both to globally unique
//! names.
//!
//! Sampler trees borrow their children, so the caller owns every node and a
//! node may be shared by several parents. A shared node is emitted once.

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::murmur::IterativeMurmur;

mod color;
mod gradient;
mod mix;
mod texture;

pub use color::ColorSampler;
pub use gradient::{GradientStops, LinearGradient, RadialGradient, MAX_GRADIENT_STOPS};
pub use mix::MixSampler;
pub use texture::TextureSampler;

/// A node in a sampler tree.
pub trait Sampler {
    /// Members of this sampler's uniform struct, e.g. `"vec4 color;"`.
    fn uniforms(&self) -> &str {
        ""
    }

    /// Body of this sampler's color function. `uv` is in scope.
    fn main(&self) -> &str;

    /// Helper functions emitted once per composition, before any sampler.
    fn other_functions(&self) -> &str {
        ""
    }

    /// Number of child samplers.
    fn sub_samplers_count(&self) -> usize {
        0
    }

    /// Child sampler at `index`.
    fn sub_sampler(&self, index: usize) -> Option<&dyn Sampler> {
        let _ = index;
        None
    }

    /// Uploads this sampler's uniform values.
    ///
    /// # Errors
    ///
    /// Whatever the sink reports, typically
    /// [`Error::UniformLocationMissing`].
    fn upload_uniforms(&self, uniforms: &mut SamplerUniforms<'_>) -> Result<()> {
        let _ = uniforms;
        Ok(())
    }
}

/// Two-digit id a sampler receives during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraversalId(u8);

impl TraversalId {
    /// Largest id.
    pub const MAX: usize = 99;

    /// Id for the `n`th sampler visited.
    ///
    /// # Errors
    ///
    /// [`Error::TooManySamplers`] if `n > 99`.
    pub fn new(n: usize) -> Result<Self> {
        u8::try_from(n)
            .ok()
            .filter(|&n| usize::from(n) <= Self::MAX)
            .map(Self)
            .ok_or(Error::TooManySamplers { count: n + 1 })
    }

    /// The numeric id.
    pub fn get(self) -> usize {
        usize::from(self.0)
    }
}

impl std::fmt::Display for TraversalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

/// Global name of a sampler's uniform member: `data_{id}.{name}`.
pub fn uniform_name(id: TraversalId, name: &str) -> String {
    format!("data_{id}.{name}")
}

/// Destination for uniform values, addressed by fully mangled name.
pub trait UniformSink {
    /// Sets an `int` uniform.
    ///
    /// # Errors
    ///
    /// [`Error::UniformLocationMissing`] if the program has no such uniform.
    fn set_i32(&mut self, name: &str, v: i32) -> Result<()>;

    /// Sets a `float` uniform.
    ///
    /// # Errors
    ///
    /// [`Error::UniformLocationMissing`] if the program has no such uniform.
    fn set_f32(&mut self, name: &str, v: f32) -> Result<()>;

    /// Sets a `vec2` uniform.
    ///
    /// # Errors
    ///
    /// [`Error::UniformLocationMissing`] if the program has no such uniform.
    fn set_vec2(&mut self, name: &str, v: [f32; 2]) -> Result<()>;

    /// Sets a `vec4` uniform.
    ///
    /// # Errors
    ///
    /// [`Error::UniformLocationMissing`] if the program has no such uniform.
    fn set_vec4(&mut self, name: &str, v: [f32; 4]) -> Result<()>;

    /// Binds `texture` to a free texture unit and points a `sampler2D`
    /// uniform at it.
    ///
    /// # Errors
    ///
    /// [`Error::UniformLocationMissing`] if the program has no such uniform.
    fn set_texture(&mut self, name: &str, texture: glow::Texture) -> Result<()>;
}

/// Uniform setter scoped to one sampler: member names are mangled with the
/// sampler's traversal id before reaching the sink.
pub struct SamplerUniforms<'a> {
    sink: &'a mut dyn UniformSink,
    id: TraversalId,
}

impl<'a> SamplerUniforms<'a> {
    /// Scopes `sink` to the sampler with traversal id `id`.
    pub fn new(sink: &'a mut dyn UniformSink, id: TraversalId) -> Self {
        Self { sink, id }
    }

    /// The sampler's traversal id.
    pub fn id(&self) -> TraversalId {
        self.id
    }

    /// Global name of member `name`.
    pub fn location_name(&self, name: &str) -> String {
        uniform_name(self.id, name)
    }

    /// Sets member `name` (`int`).
    ///
    /// # Errors
    ///
    /// Propagates sink errors.
    pub fn set_i32(&mut self, name: &str, v: i32) -> Result<()> {
        let name = self.location_name(name);
        self.sink.set_i32(&name, v)
    }

    /// Sets member `name` (`float`).
    ///
    /// # Errors
    ///
    /// Propagates sink errors.
    pub fn set_f32(&mut self, name: &str, v: f32) -> Result<()> {
        let name = self.location_name(name);
        self.sink.set_f32(&name, v)
    }

    /// Sets member `name` (`vec2`).
    ///
    /// # Errors
    ///
    /// Propagates sink errors.
    pub fn set_vec2(&mut self, name: &str, v: [f32; 2]) -> Result<()> {
        let name = self.location_name(name);
        self.sink.set_vec2(&name, v)
    }

    /// Sets member `name` (`vec4`).
    ///
    /// # Errors
    ///
    /// Propagates sink errors.
    pub fn set_vec4(&mut self, name: &str, v: [f32; 4]) -> Result<()> {
        let name = self.location_name(name);
        self.sink.set_vec4(&name, v)
    }

    /// Sets member `name` (`sampler2D`).
    ///
    /// # Errors
    ///
    /// Propagates sink errors.
    pub fn set_texture(&mut self, name: &str, texture: glow::Texture) -> Result<()> {
        let name = self.location_name(name);
        self.sink.set_texture(&name, texture)
    }
}

/// Identity of a node for sharing detection: the fat pointer (data address
/// and vtable) plus the address of its body text. Zero-sized samplers share
/// a data address, so the vtable keeps distinct types apart.
type NodeKey<'a> = (*const (dyn Sampler + 'a), usize);

fn node_key<'a>(sampler: &'a dyn Sampler) -> NodeKey<'a> {
    (std::ptr::from_ref(sampler), sampler.main().as_ptr().addr())
}

/// Most samplers one composition may hold.
pub const MAX_SAMPLERS: usize = TraversalId::MAX + 1;

/// A path of `depth` nodes from the root holds `depth` distinct samplers,
/// so anything deeper than [`MAX_SAMPLERS`] fails before recursing further.
fn check_depth(depth: usize) -> Result<()> {
    if depth > MAX_SAMPLERS {
        return Err(Error::TooManySamplers { count: depth });
    }
    Ok(())
}

/// Walks `root` post-order, children before parents, calling `visit` once
/// per distinct node with its id and its children's ids. Returns the root's
/// id.
///
/// The compositor and uniform upload both go through here, so a sampler
/// always sees the same id in both.
///
/// # Errors
///
/// [`Error::TooManySamplers`] past 100 distinct nodes or 100 levels,
/// [`Error::OutOfRange`] if a sampler reports a child it cannot return, and
/// anything `visit` returns.
pub fn traverse<'s>(
    root: &'s dyn Sampler,
    visit: &mut dyn FnMut(&'s dyn Sampler, TraversalId, &[TraversalId]) -> Result<()>,
) -> Result<TraversalId> {
    struct Walk<'s, 'v> {
        seen: FxHashMap<NodeKey<'s>, TraversalId>,
        visit: &'v mut dyn FnMut(&'s dyn Sampler, TraversalId, &[TraversalId]) -> Result<()>,
    }

    impl<'s> Walk<'s, '_> {
        fn walk(&mut self, sampler: &'s dyn Sampler, depth: usize) -> Result<TraversalId> {
            check_depth(depth)?;
            let key = node_key(sampler);
            if let Some(id) = self.seen.get(&key) {
                return Ok(*id);
            }
            let count = sampler.sub_samplers_count();
            let mut children = Vec::with_capacity(count);
            for index in 0..count {
                let child = sampler
                    .sub_sampler(index)
                    .ok_or(Error::OutOfRange { index, len: count })?;
                children.push(self.walk(child, depth + 1)?);
            }
            let id = TraversalId::new(self.seen.len())?;
            self.seen.insert(key, id);
            (self.visit)(sampler, id, &children)?;
            Ok(id)
        }
    }

    Walk {
        seen: FxHashMap::default(),
        visit,
    }
    .walk(root, 1)
}

/// Uploads every sampler's uniforms in traversal order.
///
/// # Errors
///
/// The first error from traversal or from a sampler's upload.
pub fn upload_uniforms(root: &dyn Sampler, sink: &mut dyn UniformSink) -> Result<()> {
    traverse(root, &mut |sampler, id, _| {
        sampler.upload_uniforms(&mut SamplerUniforms::new(&mut *sink, id))
    })
    .map(|_| ())
}

const HASH_SEED: u64 = 0x6e69_7472_6f67_6c00;

/// Structural hash of a sampler tree.
///
/// Covers each node's uniform, body and helper text and its children's
/// hashes in order. A child already hashed elsewhere in the tree
/// contributes a back-reference instead, so a shared node and two equal
/// copies (which composite differently) hash differently.
///
/// # Errors
///
/// [`Error::TooManySamplers`] for trees deeper than [`MAX_SAMPLERS`], which
/// could never be composed.
pub fn hash_code(root: &dyn Sampler) -> Result<u64> {
    fn hash_node<'a>(
        sampler: &'a dyn Sampler,
        depth: usize,
        seen: &mut FxHashMap<NodeKey<'a>, u64>,
    ) -> Result<u64> {
        check_depth(depth)?;
        let count = sampler.sub_samplers_count();
        let mut h = IterativeMurmur::<u64>::begin(HASH_SEED)
            .next_str(sampler.uniforms())
            .next_str(sampler.main())
            .next_str(sampler.other_functions())
            .next(count as u64);
        for index in 0..count {
            let Some(child) = sampler.sub_sampler(index) else {
                h = h.next(u64::MAX);
                continue;
            };
            let key = node_key(child);
            h = match seen.get(&key) {
                Some(&ordinal) => h.next(u64::MAX - 1).next(ordinal),
                None => {
                    let child_hash = hash_node(child, depth + 1, seen)?;
                    let ordinal = seen.len() as u64;
                    seen.insert(key, ordinal);
                    h.next(child_hash)
                }
            };
        }
        Ok(h.end())
    }

    let mut seen = FxHashMap::default();
    hash_node(root, 1, &mut seen)
}
