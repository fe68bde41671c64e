//! Embedded WGSL for the model preview.

pub const SCENE_SHADER: &str = r#"
struct Scene {
    view_proj: mat4x4<f32>,
    eye: vec4<f32>,
    base_color: vec4<f32>,
    // metalness, roughness, wireframe, gamma_encode
    material: vec4<f32>,
    ambient: vec4<f32>,
    key_dir: vec4<f32>,
    key_color: vec4<f32>,
    fill_dir: vec4<f32>,
    fill_color: vec4<f32>,
}

@group(0) @binding(0) var<uniform> scene: Scene;

struct VsIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) world: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

@vertex
fn vs_main(in: VsIn) -> VsOut {
    var out: VsOut;
    out.clip = scene.view_proj * vec4<f32>(in.position, 1.0);
    out.world = in.position;
    out.normal = in.normal;
    return out;
}

fn to_linear(c: vec3<f32>) -> vec3<f32> {
    return pow(c, vec3<f32>(2.2));
}

fn encode(c: vec3<f32>) -> vec3<f32> {
    if scene.material.w > 0.5 {
        return pow(c, vec3<f32>(1.0 / 2.2));
    }
    return c;
}

fn lobe(n: vec3<f32>, v: vec3<f32>, l: vec3<f32>, color: vec3<f32>, albedo: vec3<f32>) -> vec3<f32> {
    let metal = scene.material.x;
    let rough = clamp(scene.material.y, 0.04, 1.0);
    let ndl = max(dot(n, l), 0.0);
    let h = normalize(l + v);
    let shininess = 2.0 / (rough * rough) - 2.0;
    let spec_color = mix(vec3<f32>(0.04), albedo, metal);
    let spec = spec_color * pow(max(dot(n, h), 0.0), shininess) * (shininess + 8.0) / 25.13;
    let diffuse = albedo * (1.0 - metal);
    return (diffuse + spec) * color * ndl;
}

@fragment
fn fs_main(in: VsOut, @builtin(front_facing) front: bool) -> @location(0) vec4<f32> {
    var n = normalize(in.normal);
    if !front {
        n = -n;
    }
    let v = normalize(scene.eye.xyz - in.world);
    let albedo = to_linear(scene.base_color.rgb);

    var color = to_linear(scene.ambient.rgb) * scene.ambient.w * albedo;
    color += lobe(n, v, normalize(scene.key_dir.xyz), to_linear(scene.key_color.rgb) * scene.key_color.w, albedo);
    color += lobe(n, v, normalize(scene.fill_dir.xyz), to_linear(scene.fill_color.rgb) * scene.fill_color.w, albedo);

    return vec4<f32>(encode(color), 1.0);
}

@fragment
fn fs_wire(in: VsOut) -> @location(0) vec4<f32> {
    return vec4<f32>(encode(to_linear(scene.base_color.rgb)), 1.0);
}
"#;
