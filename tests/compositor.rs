#![allow(clippy::unwrap_used)]

// ==============================================
// SHADER COMPOSITION (integration)
// ==============================================
//
// Composes trees of the built-in samplers and checks that the generated
// source and the uniform upload path agree on every name.

use nitrogl::compositor::{composite_fragment_source, stitch_body};
use nitrogl::sampler::{
    hash_code, upload_uniforms, ColorSampler, GradientStops, LinearGradient, MixSampler,
    RadialGradient, Sampler, TraversalId, UniformSink,
};
use nitrogl::{Error, Result};

#[derive(Default)]
struct NameSink {
    names: Vec<String>,
}

impl NameSink {
    fn push(&mut self, name: &str) -> Result<()> {
        self.names.push(name.to_string());
        Ok(())
    }
}

impl UniformSink for NameSink {
    fn set_i32(&mut self, name: &str, _: i32) -> Result<()> {
        self.push(name)
    }

    fn set_f32(&mut self, name: &str, _: f32) -> Result<()> {
        self.push(name)
    }

    fn set_vec2(&mut self, name: &str, _: [f32; 2]) -> Result<()> {
        self.push(name)
    }

    fn set_vec4(&mut self, name: &str, _: [f32; 4]) -> Result<()> {
        self.push(name)
    }

    fn set_texture(&mut self, name: &str, _: glow::Texture) -> Result<()> {
        self.push(name)
    }
}

/// `data_03.colors[1]` -> (`DATA_03`, `colors`)
fn split_uniform(name: &str) -> (String, String) {
    let (instance, member) = name.split_once('.').unwrap();
    let member = member.split('[').next().unwrap();
    (instance.to_uppercase(), member.to_string())
}

fn assert_uploads_match_source(root: &dyn Sampler) {
    let composite = composite_fragment_source(root).unwrap();
    let mut sink = NameSink::default();
    upload_uniforms(root, &mut sink).unwrap();
    assert!(!sink.names.is_empty());

    for name in &sink.names {
        let (struct_name, member) = split_uniform(name);
        let decl_start = composite
            .source
            .find(&format!("uniform struct {struct_name} {{"))
            .unwrap_or_else(|| panic!("{struct_name} not declared"));
        let decl = &composite.source[decl_start..];
        let decl = &decl[..decl.find('}').unwrap()];
        assert!(
            decl.contains(&format!(" {member};")) || decl.contains(&format!(" {member}[")),
            "{name} is uploaded but {struct_name} has no member {member}"
        );
    }
}

#[test]
fn uploads_address_generated_instances() {
    let red = ColorSampler::new([1.0, 0.0, 0.0, 1.0]);
    let linear = LinearGradient::new(
        [0.0, 0.0],
        [100.0, 0.0],
        GradientStops::two([1.0; 4], [0.0, 0.0, 0.0, 1.0]),
    );
    let radial = RadialGradient::new([50.0, 50.0], 50.0, GradientStops::new());
    let inner = MixSampler::new(&linear, &radial, 0.3);
    let root = MixSampler::new(&red, &inner, 0.7);
    assert_uploads_match_source(&root);
}

#[test]
fn stitching_scenario_with_global_id_seven() {
    let out = stitch_body(
        "return sampler_00(uv);",
        TraversalId::new(8).unwrap(),
        &[TraversalId::new(7).unwrap()],
    )
    .unwrap();
    assert!(out.contains("sampler_07("));
    assert!(!out.contains("sampler_00("));
}

#[test]
fn every_sampler_function_is_defined_before_use() {
    let a = ColorSampler::new([1.0; 4]);
    let b = ColorSampler::new([0.0; 4]);
    let ab = MixSampler::new(&a, &b, 0.5);
    let ba = MixSampler::new(&b, &a, 0.5);
    let root = MixSampler::new(&ab, &ba, 0.5);
    let source = composite_fragment_source(&root).unwrap().source;

    for id in 0..5 {
        let definition = source
            .find(&format!("vec4 sampler_{id:02}(vec2 uv)"))
            .unwrap();
        let first_call = source.find(&format!("sampler_{id:02}(uv)")).unwrap();
        assert!(definition < first_call, "sampler_{id:02} used before defined");
    }
    assert!(!source.contains("sampler_05"));
}

#[test]
fn composition_is_deterministic_and_hash_follows_structure() {
    let a = ColorSampler::new([1.0; 4]);
    let b = ColorSampler::new([0.5; 4]);
    let c = ColorSampler::new([0.25; 4]);
    let left = MixSampler::new(&a, &b, 0.5);
    let right = MixSampler::new(&b, &c, 0.1);

    let l = composite_fragment_source(&left).unwrap();
    let r = composite_fragment_source(&right).unwrap();
    assert_eq!(l.source, r.source);
    assert_eq!(l.hash, r.hash);
    assert_eq!(hash_code(&left).unwrap(), hash_code(&right).unwrap());

    let gradient = LinearGradient::new([0.0, 0.0], [1.0, 1.0], GradientStops::new());
    let different = MixSampler::new(&a, &gradient, 0.5);
    let d = composite_fragment_source(&different).unwrap();
    assert_ne!(l.source, d.source);
    assert_ne!(l.hash, d.hash);
}

#[test]
fn too_many_distinct_samplers() {
    struct Chain<'a> {
        child: Option<&'a Chain<'a>>,
    }

    impl Sampler for Chain<'_> {
        fn main(&self) -> &str {
            if self.child.is_some() {
                "return sampler_00(uv);"
            } else {
                "return vec4(1.0);"
            }
        }

        fn sub_samplers_count(&self) -> usize {
            usize::from(self.child.is_some())
        }

        fn sub_sampler(&self, index: usize) -> Option<&dyn Sampler> {
            match index {
                0 => self.child.map(|c| c as &dyn Sampler),
                _ => None,
            }
        }
    }

    fn build(depth: usize, f: &mut dyn FnMut(&Chain<'_>)) {
        fn go<'a>(remaining: usize, below: Option<&'a Chain<'a>>, f: &mut dyn FnMut(&Chain<'_>)) {
            let node = Chain { child: below };
            if remaining == 1 {
                f(&node);
            } else {
                go(remaining - 1, Some(&node), f);
            }
        }
        go(depth, None, f);
    }

    build(100, &mut |root: &Chain<'_>| {
        let composite = composite_fragment_source(root).unwrap();
        assert_eq!(composite.sampler_count, 100);
        assert!(composite.source.contains("return sampler_99(uv);"));
    });
    build(101, &mut |root: &Chain<'_>| {
        assert_eq!(
            composite_fragment_source(root),
            Err(Error::TooManySamplers { count: 101 })
        );
    });
}

/// Wraps one child and forwards to it.
struct Wrap {
    child: &'static dyn Sampler,
}

impl Sampler for Wrap {
    fn main(&self) -> &str {
        "return sampler_00(uv);"
    }

    fn sub_samplers_count(&self) -> usize {
        1
    }

    fn sub_sampler(&self, index: usize) -> Option<&dyn Sampler> {
        (index == 0).then_some(self.child)
    }
}

fn wrapped(depth: usize) -> &'static dyn Sampler {
    let mut node: &'static dyn Sampler = Box::leak(Box::new(ColorSampler::new([1.0; 4])));
    for _ in 0..depth {
        node = Box::leak(Box::new(Wrap { child: node }));
    }
    node
}

#[test]
fn deep_trees_are_rejected_not_overflowed() {
    for depth in [100, 3_000, 50_000] {
        assert_eq!(
            composite_fragment_source(wrapped(depth)),
            Err(Error::TooManySamplers { count: 101 }),
            "depth {depth}"
        );
        assert!(hash_code(wrapped(depth)).is_err());
    }
    let composite = composite_fragment_source(wrapped(99)).unwrap();
    assert_eq!(composite.sampler_count, 100);
}
