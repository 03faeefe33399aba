//! Built-in shader variants and the library that owns their programs

use super::{Shader, ShaderProgram, ShaderStage};
use crate::backend::traits::RenderBackend;

const LAMBERT_VS: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,
    color: vec4<f32>,
    time: f32,
}
@group(0) @binding(0) var<uniform> u: Uniforms;

struct VertexInput {
    @location(0) position: vec4<f32>,
    @location(1) normal: vec4<f32>,
    @location(2) color: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world = u.model * vec4<f32>(in.position.xyz, 1.0);
    out.clip_position = u.view_proj * world;
    out.world_position = world.xyz;
    out.world_normal = normalize((u.model * vec4<f32>(in.normal.xyz, 0.0)).xyz);
    return out;
}
"#;

const LAMBERT_FS: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,
    color: vec4<f32>,
    time: f32,
}
@group(0) @binding(0) var<uniform> u: Uniforms;

struct FragmentInput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
}

const LIGHT_POSITION: vec3<f32> = vec3<f32>(5.0, 5.0, 3.0);
const AMBIENT: f32 = 0.2;

@fragment
fn fs_main(in: FragmentInput) -> @location(0) vec4<f32> {
    let normal = normalize(in.world_normal);
    let light_dir = normalize(LIGHT_POSITION - in.world_position);
    let diffuse = max(dot(normal, light_dir), 0.0);
    let intensity = min(diffuse + AMBIENT, 1.0);
    return vec4<f32>(u.color.rgb * intensity, u.color.a);
}
"#;

const MODIFIED_LAMBERT_FS: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,
    color: vec4<f32>,
    time: f32,
}
@group(0) @binding(0) var<uniform> u: Uniforms;

struct FragmentInput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
}

const LIGHT_POSITION: vec3<f32> = vec3<f32>(5.0, 5.0, 3.0);
const AMBIENT: f32 = 0.2;

@fragment
fn fs_main(in: FragmentInput) -> @location(0) vec4<f32> {
    let normal = normalize(in.world_normal);
    let light_dir = normalize(LIGHT_POSITION - in.world_position);
    let diffuse = max(dot(normal, light_dir), 0.0);
    let intensity = min(diffuse + AMBIENT, 1.0);
    let pulse = 0.5 + 0.5 * sin(u.time + in.world_position.x + in.world_position.y);
    return vec4<f32>(u.color.rgb * intensity * pulse, u.color.a);
}
"#;

/// The closed set of shading variants the demo offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderVariant {
    Lambert,
    ModifiedLambert,
}

impl ShaderVariant {
    pub const ALL: [ShaderVariant; 2] = [ShaderVariant::Lambert, ShaderVariant::ModifiedLambert];

    /// Human-readable label shown in the controls
    pub fn label(&self) -> &'static str {
        match self {
            ShaderVariant::Lambert => "lambert",
            ShaderVariant::ModifiedLambert => "modified lambert",
        }
    }

    /// Stage sources for this variant; both variants share the vertex stage
    pub fn stages(&self) -> Vec<Shader> {
        match self {
            ShaderVariant::Lambert => vec![
                Shader::new(ShaderStage::Vertex, LAMBERT_VS),
                Shader::new(ShaderStage::Fragment, LAMBERT_FS),
            ],
            ShaderVariant::ModifiedLambert => vec![
                Shader::new(ShaderStage::Vertex, LAMBERT_VS),
                Shader::new(ShaderStage::Fragment, MODIFIED_LAMBERT_FS),
            ],
        }
    }
}

/// Built shader programs keyed by variant.
///
/// A variant whose program fails to build is logged and excluded, so the
/// rest of the application only ever sees usable variants.
pub struct ShaderLibrary {
    programs: Vec<(ShaderVariant, ShaderProgram)>,
}

impl ShaderLibrary {
    /// Build programs for every variant, dropping the ones that fail
    pub fn build(backend: &mut dyn RenderBackend) -> Self {
        let mut programs = Vec::new();
        for variant in ShaderVariant::ALL {
            match ShaderProgram::new(backend, variant.label(), &variant.stages()) {
                Ok(program) => programs.push((variant, program)),
                Err(e) => log::error!("shader variant '{}' unavailable: {e}", variant.label()),
            }
        }
        Self { programs }
    }

    /// Variants that built successfully, in declaration order
    pub fn available(&self) -> Vec<ShaderVariant> {
        self.programs.iter().map(|(v, _)| *v).collect()
    }

    pub fn get_mut(&mut self, variant: ShaderVariant) -> Option<&mut ShaderProgram> {
        self.programs
            .iter_mut()
            .find(|(v, _)| *v == variant)
            .map(|(_, p)| p)
    }

    /// First available variant, used as a fallback when the selected one
    /// failed to build
    pub fn first_available(&self) -> Option<ShaderVariant> {
        self.programs.first().map(|(v, _)| *v)
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::validate_stage;

    #[test]
    fn all_variant_sources_validate() {
        for variant in ShaderVariant::ALL {
            for shader in variant.stages() {
                validate_stage(shader.stage, &shader.source)
                    .unwrap_or_else(|e| panic!("{}: {e}", variant.label()));
            }
        }
    }

    #[test]
    fn labels_are_distinct() {
        assert_ne!(
            ShaderVariant::Lambert.label(),
            ShaderVariant::ModifiedLambert.label()
        );
    }
}
