//! Stitches a sampler tree into one fragment shader.
//!
//! Every sampler body is written against generic names: its own uniforms are
//! `data.<member>` and its children are `sampler_00(...)`, `sampler_01(...)`
//! by local index. Composition walks the tree post-order, gives each node a
//! two-digit global id, and rewrites each body so those names point at the
//! node's own `data_{id}` instance and its children's `sampler_{id}`
//! functions.

use std::fmt::Write as _;

use crate::error::{Error, Result};
use crate::program::MainShaderProgram;
use crate::sampler::{hash_code, traverse, Sampler, TraversalId};
use crate::shaders::{FRAGMENT_EPILOGUE, FRAGMENT_PROLOGUE};

const DATA_TOKEN: &str = "data.";
const SAMPLER_TOKEN: &str = "sampler_";

/// A generated fragment shader and the identity it should be cached under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeSource {
    /// Complete GLSL source.
    pub source: String,
    /// [`hash_code`] of the tree it was generated from.
    pub hash: u64,
    /// Number of distinct samplers emitted.
    pub sampler_count: usize,
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Next occurrence of `needle` at or after `from` that does not continue an
/// identifier (`mydata.x` is not a `data.` reference).
fn find_token(haystack: &str, from: usize, needle: &str) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let mut from = from;
    while let Some(offset) = haystack[from..].find(needle) {
        let at = from + offset;
        if at == 0 || !is_ident_byte(bytes[at - 1]) {
            return Some(at);
        }
        from = at + needle.len();
    }
    None
}

/// Local child index of a `sampler_NN(` call starting at `at`, if the text
/// there has that exact shape.
fn local_call(body: &str, at: usize) -> Option<usize> {
    let rest = body.as_bytes().get(at + SAMPLER_TOKEN.len()..)?;
    match rest {
        [d0 @ b'0'..=b'9', d1 @ b'0'..=b'9', b'(', ..] => {
            Some(usize::from(d0 - b'0') * 10 + usize::from(d1 - b'0'))
        }
        _ => None,
    }
}

/// Rewrites one sampler body for global naming.
///
/// Scans left to right, racing the next `data.` against the next
/// `sampler_`: whichever comes first is rewritten, `data.` to
/// `data_{own}.` and `sampler_NN(` to `sampler_{children[NN]}(`. Everything
/// else, including `sampler_` not followed by two digits and `(`, is copied
/// verbatim.
///
/// # Errors
///
/// [`Error::OutOfRange`] if the body calls a child the sampler does not
/// have.
pub fn stitch_body(body: &str, own: TraversalId, children: &[TraversalId]) -> Result<String> {
    let mut out = String::with_capacity(body.len() + body.len() / 4);
    let mut pos = 0;
    let mut next_data = find_token(body, 0, DATA_TOKEN);
    let mut next_sampler = find_token(body, 0, SAMPLER_TOKEN);

    loop {
        let take_data = match (next_data, next_sampler) {
            (None, None) => break,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (Some(d), Some(s)) => d < s,
        };

        if take_data {
            let Some(at) = next_data else { break };
            out.push_str(&body[pos..at]);
            let _ = write!(out, "data_{own}.");
            pos = at + DATA_TOKEN.len();
            next_data = find_token(body, pos, DATA_TOKEN);
        } else {
            let Some(at) = next_sampler else { break };
            out.push_str(&body[pos..at]);
            match local_call(body, at) {
                Some(local) => {
                    let global = children.get(local).ok_or(Error::OutOfRange {
                        index: local,
                        len: children.len(),
                    })?;
                    let _ = write!(out, "sampler_{global}(");
                    pos = at + SAMPLER_TOKEN.len() + 3;
                }
                None => {
                    out.push_str(SAMPLER_TOKEN);
                    pos = at + SAMPLER_TOKEN.len();
                }
            }
            next_sampler = find_token(body, pos, SAMPLER_TOKEN);
        }
    }

    out.push_str(&body[pos..]);
    Ok(out)
}

/// Generates the complete fragment shader for `root`.
///
/// Output order: [`FRAGMENT_PROLOGUE`], each distinct helper block, each
/// sampler's uniform struct and function in post-order, the
/// `__internal_sample` entry point, [`FRAGMENT_EPILOGUE`]. The result only
/// depends on the tree's structure and text, never on uniform values.
///
/// # Errors
///
/// [`Error::TooManySamplers`] past 100 distinct samplers, and
/// [`Error::OutOfRange`] for a call to a missing child.
pub fn composite_fragment_source(root: &dyn Sampler) -> Result<CompositeSource> {
    let mut helpers: Vec<&str> = Vec::new();
    let mut samplers = String::new();
    let mut sampler_count = 0;

    let root_id = traverse(root, &mut |sampler, id, children| {
        let functions = sampler.other_functions();
        if !functions.trim().is_empty() && !helpers.contains(&functions) {
            helpers.push(functions);
        }

        let uniforms = sampler.uniforms().trim();
        if !uniforms.is_empty() {
            let _ = writeln!(samplers, "uniform struct DATA_{id} {{ {uniforms} }} data_{id};");
        }
        let body = stitch_body(sampler.main(), id, children)?;
        let _ = writeln!(samplers, "vec4 sampler_{id}(vec2 uv) {{\n    {}\n}}\n", body.trim());
        sampler_count += 1;
        Ok(())
    })?;

    let mut source = String::from(FRAGMENT_PROLOGUE);
    for functions in &helpers {
        source.push_str(functions);
        source.push('\n');
    }
    source.push_str(&samplers);
    let _ = writeln!(
        source,
        "vec4 __internal_sample(vec2 uv) {{\n    return sampler_{root_id}(uv);\n}}"
    );
    source.push_str(FRAGMENT_EPILOGUE);

    tracing::trace!(sampler_count, len = source.len(), "composited fragment shader");
    Ok(CompositeSource {
        source,
        hash: hash_code(root)?,
        sampler_count,
    })
}

/// Composites `sampler` and links it into a program.
///
/// # Safety
///
/// Requires a valid, current OpenGL context.
///
/// # Errors
///
/// Composition errors, [`Error::Shader`] if the driver rejects the
/// generated source, and [`Error::UniformLocationMissing`] if the program
/// lacks a built-in uniform.
pub unsafe fn composite_main_program_from_sampler(
    gl: &glow::Context,
    sampler: &dyn Sampler,
) -> Result<MainShaderProgram> {
    let composite = composite_fragment_source(sampler)?;
    unsafe { MainShaderProgram::link(gl, &composite) }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::sampler::tests::Stub;
    use crate::sampler::{ColorSampler, GradientStops, LinearGradient, MixSampler, RadialGradient};

    fn id(n: usize) -> TraversalId {
        TraversalId::new(n).unwrap()
    }

    #[test]
    fn stitch_maps_local_child_to_global_id() {
        let out = stitch_body("return sampler_00(uv) * data.k;", id(8), &[id(7)]).unwrap();
        assert_eq!(out, "return sampler_07(uv) * data_08.k;");
        assert!(!out.contains("sampler_00("));
    }

    #[test]
    fn stitch_rewrites_in_source_order() {
        let body = "vec4 a = sampler_01(uv * data.s); return mix(a, sampler_00(uv), data.t);";
        let out = stitch_body(body, id(12), &[id(3), id(11)]).unwrap();
        assert_eq!(
            out,
            "vec4 a = sampler_11(uv * data_12.s); return mix(a, sampler_03(uv), data_12.t);"
        );
    }

    #[test]
    fn stitch_leaves_lookalikes_alone() {
        let body = "vec2 mydata.x; float my_sampler_00(vec2 p); sampler_xy; data";
        assert_eq!(stitch_body(body, id(1), &[]).unwrap(), body);
    }

    #[test]
    fn stitch_rejects_missing_child() {
        assert_eq!(
            stitch_body("return sampler_02(uv);", id(3), &[id(0), id(1)]),
            Err(Error::OutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn root_child_with_id_seven() {
        let leaves: Vec<ColorSampler> = (0..7).map(|_| ColorSampler::new([1.0; 4])).collect();
        let fillers: Vec<&dyn Sampler> = leaves.iter().map(|s| s as &dyn Sampler).collect();
        let padding = Stub::with_children("return sampler_00(uv);", fillers);
        let child = ColorSampler::new([0.0; 4]);
        // Post-order: the seven leaves take 00..06, so `padding` gets 07.
        let child_holder = Stub::with_children("return sampler_00(uv);", vec![&child]);
        let root = Stub::with_children(
            "return sampler_01(uv) + sampler_00(uv);",
            vec![&padding, &child_holder],
        );

        let composite = composite_fragment_source(&root).unwrap();
        assert_eq!(composite.sampler_count, 11);
        assert!(composite.source.contains("vec4 sampler_09(vec2 uv) {\n    return sampler_08(uv);"));
        assert!(composite.source.contains("return sampler_09(uv) + sampler_07(uv);"));
        assert!(composite.source.contains("return sampler_10(uv);\n}"));
    }

    #[test]
    fn generated_layout() {
        let red = ColorSampler::new([1.0, 0.0, 0.0, 1.0]);
        let composite = composite_fragment_source(&red).unwrap();
        let src = &composite.source;
        assert!(src.starts_with(FRAGMENT_PROLOGUE));
        assert!(src.ends_with(FRAGMENT_EPILOGUE));
        assert!(src.contains("uniform struct DATA_00 { vec4 color; } data_00;"));
        assert!(src.contains("vec4 sampler_00(vec2 uv) {\n    return data_00.color;\n}"));
        assert!(src.contains("vec4 __internal_sample(vec2 uv) {\n    return sampler_00(uv);\n}"));
        assert_eq!(composite.sampler_count, 1);
    }

    #[test]
    fn deterministic_and_value_independent() {
        let a = ColorSampler::new([1.0, 0.0, 0.0, 1.0]);
        let b = ColorSampler::new([0.0, 1.0, 0.0, 1.0]);
        let m1 = MixSampler::new(&a, &b, 0.5);
        let first = composite_fragment_source(&m1).unwrap();
        let again = composite_fragment_source(&m1).unwrap();
        assert_eq!(first, again);

        let c = ColorSampler::new([0.0, 0.0, 1.0, 0.5]);
        let d = ColorSampler::new([0.2, 0.2, 0.2, 1.0]);
        let m2 = MixSampler::new(&c, &d, 0.9);
        assert_eq!(first, composite_fragment_source(&m2).unwrap());
    }

    #[test]
    fn shared_sampler_is_emitted_once() {
        let a = ColorSampler::new([1.0; 4]);
        let mix = MixSampler::new(&a, &a, 0.5);
        let composite = composite_fragment_source(&mix).unwrap();
        assert_eq!(composite.sampler_count, 2);
        assert_eq!(composite.source.matches("uniform struct DATA_00").count(), 1);
        assert!(composite
            .source
            .contains("return mix(sampler_00(uv), sampler_00(uv), data_01.t);"));
    }

    #[test]
    fn helper_functions_are_deduplicated() {
        let linear = LinearGradient::new([0.0, 0.0], [1.0, 0.0], GradientStops::new());
        let radial = RadialGradient::new([0.5, 0.5], 0.5, GradientStops::new());
        let mix = MixSampler::new(&linear, &radial, 0.5);
        let composite = composite_fragment_source(&mix).unwrap();
        assert_eq!(composite.source.matches("vec4 __gradient_stops(").count(), 1);
        let helper = composite.source.find("vec4 __gradient_stops(").unwrap();
        let first_sampler = composite.source.find("vec4 sampler_00(").unwrap();
        assert!(helper < first_sampler);
        assert!(composite.source.contains("data_00.colors, data_00.offsets, data_00.count"));
        assert!(composite.source.contains("data_01.colors, data_01.offsets, data_01.count"));
    }

    #[test]
    fn hash_tracks_structure() {
        let a = ColorSampler::new([1.0; 4]);
        let b = ColorSampler::new([0.5; 4]);
        let mix = MixSampler::new(&a, &b, 0.5);
        let shared = MixSampler::new(&a, &a, 0.5);
        let hm = composite_fragment_source(&mix).unwrap().hash;
        let hs = composite_fragment_source(&shared).unwrap().hash;
        assert_ne!(hm, hs);
        assert_eq!(hm, hash_code(&mix).unwrap());
    }

    #[test]
    fn too_many_samplers() {
        let leaves: Vec<ColorSampler> = (0..100).map(|_| ColorSampler::new([1.0; 4])).collect();
        let refs: Vec<&dyn Sampler> = leaves.iter().map(|s| s as &dyn Sampler).collect();
        let root = Stub::with_children("return sampler_00(uv);", refs);
        assert_eq!(
            composite_fragment_source(&root),
            Err(Error::TooManySamplers { count: 101 })
        );
    }
}
