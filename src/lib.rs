//! 2D vector graphics on OpenGL via [glow], painted by composable GLSL
//! samplers.
//!
//! Shapes are tessellated via [lyon] and drawn as indexed triangle meshes.
//! Their color comes from a tree of [`Sampler`](sampler::Sampler)s (solid
//! colors, gradients, textures, mixes of other samplers) which the
//! [`compositor`] stitches into a single fragment shader at runtime.
//!
//! # Features
//!
//! - **Shader composition**: each sampler contributes a function body and a
//!   uniform struct written against local names; composition renames them
//!   to globally unique ones in one left-to-right scan per body.
//! - **Program caching**: linked programs are keyed by a structural hash of
//!   the sampler tree and kept in a fixed-size LRU cache.
//! - **Blend modes and Porter-Duff operators**: twelve separable blend
//!   modes read a copy of the backdrop; thirteen Porter-Duff operators map
//!   onto the GL blend function.
//! - **Bit-packed LRU pools** ([`lru`]): open-addressed tables whose slots
//!   pack value, list links and state flags into one machine word, with
//!   linear-probing and Robin Hood variants.
//!
//! # Safety
//!
//! Creating and using a [`Canvas`] requires a valid, current OpenGL context.
//! All GL-facing methods are `unsafe` because they issue raw GL calls. The
//! [`lru`], [`sampler`] and [`compositor`] modules are plain Rust and need no
//! context.
//!
//! [glow]: https://docs.rs/glow
//! [lyon]: https://docs.rs/lyon

mod canvas;
pub mod compositing;
pub mod compositor;
mod error;
pub mod lru;
pub mod murmur;
pub mod program;
pub mod sampler;
pub mod shaders;
pub mod tessellate;
pub mod texture;
mod types;

pub use canvas::{Canvas, Paint};
pub use compositing::{BlendMode, PorterDuff};
pub use error::{Error, InvariantError, Result};
pub use types::{CanvasOptions, Mesh, Transform, Vertex};
