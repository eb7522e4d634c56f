//! GLSL sources shared by every composed program, and compilation helpers.
//!
//! All shaders target GLSL 3.30 core. A composed fragment shader is
//! [`FRAGMENT_PROLOGUE`], the generated sampler code ending in
//! `__internal_sample`, then [`FRAGMENT_EPILOGUE`].

use glow::HasContext;

use crate::error::{Error, Result};

/// Vertex shader for every draw.
///
/// Passes the *local-space* position to the fragment stage as `v_uv`, which
/// is the coordinate samplers receive.
///
/// # Uniforms
///
/// | Name           | Type   | Description                              |
/// |----------------|--------|------------------------------------------|
/// | `u_transform`  | `mat3` | Local to pixel space                     |
/// | `u_resolution` | `vec2` | Viewport size in pixels                  |
pub const VERTEX_SRC: &str = r"#version 330 core

layout(location = 0) in vec2 a_position;

uniform mat3 u_transform;
uniform vec2 u_resolution;

out vec2 v_uv;

void main() {
    v_uv = a_position;

    vec2 world = (u_transform * vec3(a_position, 1.0)).xy;

    // Convert from [0, resolution] to [-1, 1] (flip Y for GL)
    vec2 ndc = (world / u_resolution) * 2.0 - 1.0;
    ndc.y = -ndc.y;

    gl_Position = vec4(ndc, 0.0, 1.0);
}
";

/// Start of every composed fragment shader.
///
/// # Uniforms
///
/// | Name           | Type        | Description                             |
/// |----------------|-------------|-----------------------------------------|
/// | `u_backdrop`   | `sampler2D` | Copy of the target, premultiplied       |
/// | `u_resolution` | `vec2`      | Viewport size in pixels                 |
/// | `u_blend_mode` | `int`       | [`BlendMode`](crate::BlendMode) code    |
/// | `u_opacity`    | `float`     | Multiplies the sampled alpha            |
pub const FRAGMENT_PROLOGUE: &str = r"#version 330 core

in vec2 v_uv;

uniform sampler2D u_backdrop;
uniform vec2 u_resolution;
uniform int u_blend_mode;
uniform float u_opacity;

out vec4 frag_color;

";

/// End of every composed fragment shader: blends the sample against the
/// backdrop and writes premultiplied output.
///
/// The mode numbers match [`BlendMode::code`](crate::BlendMode::code).
pub const FRAGMENT_EPILOGUE: &str = r"
float __blend_hard_light(float cb, float cs) {
    if (cs <= 0.5) return cb * 2.0 * cs;
    float s = 2.0 * cs - 1.0;
    return cb + s - cb * s;
}

float __blend_channel(int mode, float cb, float cs) {
    if (mode == 1) return cb * cs;
    if (mode == 2) return cb + cs - cb * cs;
    if (mode == 3) return __blend_hard_light(cs, cb);
    if (mode == 4) return min(cb, cs);
    if (mode == 5) return max(cb, cs);
    if (mode == 6) {
        if (cb <= 0.0) return 0.0;
        if (cs >= 1.0) return 1.0;
        return min(1.0, cb / (1.0 - cs));
    }
    if (mode == 7) {
        if (cb >= 1.0) return 1.0;
        if (cs <= 0.0) return 0.0;
        return 1.0 - min(1.0, (1.0 - cb) / cs);
    }
    if (mode == 8) return __blend_hard_light(cb, cs);
    if (mode == 9) {
        if (cs <= 0.5) return cb - (1.0 - 2.0 * cs) * cb * (1.0 - cb);
        float d = cb <= 0.25 ? ((16.0 * cb - 12.0) * cb + 4.0) * cb : sqrt(cb);
        return cb + (2.0 * cs - 1.0) * (d - cb);
    }
    if (mode == 10) return abs(cb - cs);
    if (mode == 11) return cb + cs - 2.0 * cb * cs;
    return cs;
}

void main() {
    vec4 src = __internal_sample(v_uv);
    src.a *= u_opacity;

    if (u_blend_mode != 0) {
        vec4 dst = texture(u_backdrop, gl_FragCoord.xy / u_resolution);
        vec3 cb = dst.a > 0.0 ? dst.rgb / dst.a : vec3(0.0);
        vec3 blended = vec3(
            __blend_channel(u_blend_mode, cb.r, src.r),
            __blend_channel(u_blend_mode, cb.g, src.g),
            __blend_channel(u_blend_mode, cb.b, src.b));
        src.rgb = mix(src.rgb, blended, dst.a);
    }

    // Premultiply alpha for the Porter-Duff stage
    frag_color = vec4(src.rgb * src.a, src.a);
}
";

/// Compile a shader program from vertex and fragment source strings.
///
/// The compiled shader objects are detached and deleted after successful
/// linking, so only the program handle needs to be cleaned up by the caller.
///
/// # Safety
///
/// Requires a valid, current OpenGL context.
///
/// # Errors
///
/// [`Error::Shader`] with the driver's log if compilation or linking fails,
/// [`Error::Gl`] if the GL objects cannot be created.
pub unsafe fn compile_program(
    gl: &glow::Context,
    vertex_src: &str,
    fragment_src: &str,
) -> Result<glow::Program> {
    let program = unsafe { gl.create_program() }.map_err(Error::Gl)?;

    let stages = unsafe {
        compile_shader(gl, glow::VERTEX_SHADER, vertex_src).and_then(|vs| {
            compile_shader(gl, glow::FRAGMENT_SHADER, fragment_src)
                .map(|fs| (vs, fs))
                .inspect_err(|_| gl.delete_shader(vs))
        })
    };
    let (vs, fs) = match stages {
        Ok(stages) => stages,
        Err(err) => {
            unsafe { gl.delete_program(program) };
            return Err(err);
        }
    };

    unsafe {
        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        gl.link_program(program);

        let linked = gl.get_program_link_status(program);
        gl.detach_shader(program, vs);
        gl.detach_shader(program, fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);

        if !linked {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            tracing::error!(%log, "program link failed");
            return Err(Error::Shader(format!("program link error: {log}")));
        }
    }

    Ok(program)
}

/// Compile a single shader stage (vertex or fragment) from source.
///
/// # Safety
///
/// Requires a valid, current OpenGL context.
unsafe fn compile_shader(gl: &glow::Context, shader_type: u32, source: &str) -> Result<glow::Shader> {
    unsafe {
        let shader = gl.create_shader(shader_type).map_err(Error::Gl)?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);

        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            tracing::error!(%log, shader_type, "shader compile failed");
            return Err(Error::Shader(format!("shader compile error: {log}")));
        }

        Ok(shader)
    }
}
