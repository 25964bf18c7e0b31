use bytemuck::{Pod, Zeroable};

/// Uniforms shared by both pipelines. Must match `Globals` in the WGSL and
/// `ViewportMetrics` in `projection.rs` field-for-field.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct Globals {
    pub viewport: [f32; 2],
    pub pixel_ratio: f32,
    pub global_scale: f32,
    pub max_point_size: f32,
    pub scene_rotation: f32,
    pub _padding: [f32; 2],
}

/// Unit quad instanced under every point marker.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct MarkerVertex {
    pub position: [f32; 2],
}

pub const MARKER_VERTICES: [MarkerVertex; 6] = [
    MarkerVertex {
        position: [-0.5, -0.5],
    },
    MarkerVertex {
        position: [0.5, -0.5],
    },
    MarkerVertex {
        position: [-0.5, 0.5],
    },
    MarkerVertex {
        position: [-0.5, 0.5],
    },
    MarkerVertex {
        position: [0.5, -0.5],
    },
    MarkerVertex {
        position: [0.5, 0.5],
    },
];

/// One endpoint of a connection or error line, already in NDC.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

/// Point-marker shader pair. The vertex stage runs the same pixel-size
/// formula as `ViewportMetrics::effective_pixel_size`, halving (not
/// clamping) sizes past the maximum; the fragment stage anti-aliases each
/// analytic shape with a blend band at the fill/outline edge and a fade
/// band at the outer boundary. Shape codes follow `Shape::as_code`.
pub const POINT_SHADER_SOURCE: &str = r#"
struct Globals {
    viewport: vec2<f32>,
    pixel_ratio: f32,
    global_scale: f32,
    max_point_size: f32,
    scene_rotation: f32,
    _padding: vec2<f32>,
};

@group(0) @binding(0)
var<uniform> globals: Globals;

struct VertexIn {
    @location(0) base_pos: vec2<f32>,
    @location(1) translate: vec2<f32>,
    @location(2) size: f32,
    @location(3) shape: f32,
    @location(4) fill: vec4<f32>,
    @location(5) outline: vec4<f32>,
    @location(6) outline_width: f32,
    @location(7) aspect: f32,
    @location(8) rotation: f32,
};

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) local: vec2<f32>,
    @location(1) fill: vec4<f32>,
    @location(2) outline: vec4<f32>,
    @location(3) shape: f32,
    @location(4) pixel_size: f32,
    @location(5) outline_width: f32,
    @location(6) aspect: f32,
    @location(7) rotation: f32,
};

@vertex
fn vs_main(input: VertexIn) -> VertexOutput {
    var psize = input.size * globals.global_scale
        * (globals.viewport.y / 600.0) * globals.pixel_ratio;
    // Halve, do not clamp: the discontinuity past the sprite limit is part
    // of the map format's contract. Sampling stays centered on the quad.
    if (psize > globals.max_point_size) {
        psize = psize * 0.5;
    }
    let offset = input.base_pos * 2.0 * psize / globals.viewport;
    var out: VertexOutput;
    out.position = vec4<f32>(input.translate + offset, 0.0, 1.0);
    out.local = input.base_pos * 2.0;
    out.fill = input.fill;
    out.outline = input.outline;
    out.shape = input.shape;
    out.pixel_size = psize;
    out.outline_width = input.outline_width;
    out.aspect = input.aspect;
    out.rotation = input.rotation;
    return out;
}

fn rotate2(p: vec2<f32>, angle: f32) -> vec2<f32> {
    let c = cos(angle);
    let s = sin(angle);
    return vec2<f32>(c * p.x - s * p.y, s * p.x + c * p.y);
}

// Unit triangle, apex up: boundary at d == 1.
fn triangle_distance(p: vec2<f32>) -> f32 {
    let d1 = -p.y * 2.0;
    let d2 = (0.866 * p.x + 0.5 * p.y) * 2.0;
    let d3 = (-0.866 * p.x + 0.5 * p.y) * 2.0;
    return max(d1, max(d2, d3));
}

// Circle with asymmetric vertical radii: blunt below, tapered above.
fn egg_distance(p: vec2<f32>) -> f32 {
    let ys = select(0.85, 1.1, p.y < 0.0);
    return length(vec2<f32>(p.x, p.y / ys)) / 0.95;
}

// Faceted egg: the max of a diamond and a box norm over the same
// asymmetric frame.
fn ugly_egg_distance(p: vec2<f32>) -> f32 {
    let ys = select(0.8, 1.15, p.y < 0.0);
    let q = vec2<f32>(abs(p.x), abs(p.y / ys));
    return max((q.x + q.y) * 0.62, max(q.x, q.y)) / 0.92;
}

// Triangle rotated to point along +x at rotation 0.
fn arrowhead_distance(p: vec2<f32>) -> f32 {
    let q = vec2<f32>(-p.y, p.x);
    return triangle_distance(q) / 0.9;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    var p = input.local / vec2<f32>(max(input.aspect, 0.0001), 1.0);
    if (input.shape >= 4.5) {
        // Arrowheads face plot center whatever the camera roll.
        p = rotate2(p, -(input.rotation + globals.scene_rotation));
    } else if (input.rotation != 0.0) {
        p = rotate2(p, -input.rotation);
    }

    var d: f32;
    if (input.shape < 0.5) {
        d = length(p);
    } else if (input.shape < 1.5) {
        d = max(abs(p.x), abs(p.y));
    } else if (input.shape < 2.5) {
        d = triangle_distance(p);
    } else if (input.shape < 3.5) {
        d = egg_distance(p);
    } else if (input.shape < 4.5) {
        d = ugly_egg_distance(p);
    } else {
        d = arrowhead_distance(p);
    }

    let psize = max(input.pixel_size, 1.0);
    let ow = clamp((4.0 / psize) * input.outline_width, 0.0, 0.5);
    let aa = 2.0 * globals.pixel_ratio / psize;
    let edge = 1.0 - 2.0 * ow;

    let fill_w = (1.0 - smoothstep(edge - aa, edge + aa, d)) * input.fill.a;
    let line_w = max(
        smoothstep(edge - aa, edge + aa, d) - smoothstep(1.0 - aa, 1.0 + aa, d),
        0.0,
    ) * input.outline.a;
    let alpha = fill_w + line_w;
    if (alpha < 0.02) {
        discard;
    }
    let color = (input.fill.rgb * fill_w + input.outline.rgb * line_w) / alpha;
    return vec4<f32>(color, alpha);
}
"#;

/// Connection/error line shader: endpoints arrive in NDC with per-vertex
/// color, nothing to compute beyond pass-through.
pub const LINE_SHADER_SOURCE: &str = r#"
struct VertexIn {
    @location(0) position: vec2<f32>,
    @location(1) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(input: VertexIn) -> VertexOutput {
    var out: VertexOutput;
    out.position = vec4<f32>(input.position, 0.0, 1.0);
    out.color = input.color;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return input.color;
}
"#;
