//! Shader program abstraction
//!
//! A [`ShaderProgram`] owns a linked vertex/fragment stage pair and is the
//! only path through which CPU-side state reaches the GPU. Each stage is
//! validated with naga at construction time, and the uniform block members
//! and vertex input locations are resolved once and cached; setters for
//! members a variant does not declare degrade to no-ops.

mod variants;

pub use variants::{ShaderLibrary, ShaderVariant};

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::geometry::Drawable;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use thiserror::Error;

/// Shader stage kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// A single shader stage: kind plus WGSL source text
#[derive(Debug, Clone)]
pub struct Shader {
    pub stage: ShaderStage,
    pub source: String,
}

impl Shader {
    pub fn new(stage: ShaderStage, source: impl Into<String>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

/// Shader program construction error
#[derive(Error, Debug)]
pub enum ShaderError {
    #[error("failed to compile {stage:?} stage: {message}")]
    Compile { stage: ShaderStage, message: String },
    #[error("failed to link shader program: {0}")]
    Link(String),
}

/// Uniform block layout shared by all shader variants.
///
/// Offsets follow WGSL std140-like struct rules for this member order;
/// reflection verifies at link time that every member a variant declares
/// sits at its canonical offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct UniformBlock {
    view_proj: Mat4,
    model: Mat4,
    color: Vec4,
    time: f32,
    _pad: [f32; 3],
}

const VIEW_PROJ_OFFSET: u32 = 0;
const MODEL_OFFSET: u32 = 64;
const COLOR_OFFSET: u32 = 128;
const TIME_OFFSET: u32 = 144;

/// Per-draw uniform slots live in one buffer bound with a dynamic offset;
/// 256 is the guaranteed minimum uniform offset alignment.
const UNIFORM_SLOT_STRIDE: u64 = 256;
const MAX_DRAWS_PER_FRAME: u32 = 64;

/// Which uniform members a linked program actually declares.
///
/// A `false` entry is the "unused" sentinel: the corresponding setter is a
/// no-op instead of an error, since not all variants use all uniforms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct UniformLocations {
    view_proj: bool,
    model: bool,
    color: bool,
    time: bool,
}

/// A linked shader pipeline with cached uniform and attribute bindings
pub struct ShaderProgram {
    pipeline: RenderPipelineHandle,
    uniform_buffer: BufferHandle,
    bind_group: BindGroupHandle,
    locations: UniformLocations,
    uniforms: UniformBlock,
    /// Per-draw slot cursor, reset by [`begin_frame`](Self::begin_frame)
    slot: u32,
}

impl ShaderProgram {
    /// Compile, link, and resolve bindings for an ordered set of stages.
    ///
    /// Exactly one vertex and one fragment stage are required. Stage
    /// validation failures surface as [`ShaderError::Compile`]; everything
    /// that goes wrong combining the stages is a [`ShaderError::Link`].
    pub fn new(
        backend: &mut dyn RenderBackend,
        label: &str,
        shaders: &[Shader],
    ) -> Result<Self, ShaderError> {
        let vertex = Self::single_stage(shaders, ShaderStage::Vertex)?;
        let fragment = Self::single_stage(shaders, ShaderStage::Fragment)?;

        let vertex_module = validate_stage(ShaderStage::Vertex, &vertex.source)?;
        let fragment_module = validate_stage(ShaderStage::Fragment, &fragment.source)?;

        require_entry_point(&vertex_module, naga::ShaderStage::Vertex, "vs_main")?;
        require_entry_point(&fragment_module, naga::ShaderStage::Fragment, "fs_main")?;

        let mut locations = UniformLocations::default();
        reflect_uniform_members(&vertex_module, &mut locations)?;
        reflect_uniform_members(&fragment_module, &mut locations)?;
        for (name, present) in [
            ("view_proj", locations.view_proj),
            ("model", locations.model),
            ("color", locations.color),
            ("time", locations.time),
        ] {
            if !present {
                log::warn!("shader '{label}': uniform member '{name}' not declared, setter will no-op");
            }
        }

        check_vertex_inputs(&vertex_module, label)?;

        let layout = backend
            .create_bind_group_layout(&[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStageFlags::VERTEX_FRAGMENT,
                ty: BindingType::UniformBuffer {
                    has_dynamic_offset: true,
                },
            }])
            .map_err(|e| ShaderError::Link(e.to_string()))?;

        let uniform_buffer = backend
            .create_buffer(&BufferDescriptor {
                label: Some(format!("{label} Uniforms")),
                size: MAX_DRAWS_PER_FRAME as u64 * UNIFORM_SLOT_STRIDE,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            })
            .map_err(|e| ShaderError::Link(e.to_string()))?;

        let bind_group = backend
            .create_bind_group(
                layout,
                &[(
                    0,
                    BindGroupEntry::Buffer {
                        buffer: uniform_buffer,
                        offset: 0,
                        size: Some(std::mem::size_of::<UniformBlock>() as u64),
                    },
                )],
            )
            .map_err(|e| ShaderError::Link(e.to_string()))?;

        let surface_format = backend.surface_format();
        let pipeline = backend
            .create_render_pipeline(&RenderPipelineDescriptor {
                label: Some(label.to_string()),
                vertex_shader: vertex.source.clone(),
                fragment_shader: fragment.source.clone(),
                vertex_layouts: vec![Vertex::layout()],
                bind_group_layouts: vec![layout],
                primitive_topology: PrimitiveTopology::TriangleList,
                front_face: FrontFace::Ccw,
                cull_mode: CullMode::Back,
                depth_stencil: Some(DepthStencilState {
                    format: crate::renderer::DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: CompareFunction::Less,
                }),
                color_targets: vec![ColorTargetState {
                    format: surface_format,
                }],
            })
            .map_err(|e| ShaderError::Link(e.to_string()))?;

        let mut uniforms = UniformBlock::zeroed();
        uniforms.view_proj = Mat4::IDENTITY;
        uniforms.model = Mat4::IDENTITY;
        uniforms.color = Vec4::ONE;

        Ok(Self {
            pipeline,
            uniform_buffer,
            bind_group,
            locations,
            uniforms,
            slot: 0,
        })
    }

    fn single_stage(shaders: &[Shader], stage: ShaderStage) -> Result<&Shader, ShaderError> {
        let mut found = shaders.iter().filter(|s| s.stage == stage);
        match (found.next(), found.next()) {
            (Some(shader), None) => Ok(shader),
            (None, _) => Err(ShaderError::Link(format!("missing {stage:?} stage"))),
            (Some(_), Some(_)) => Err(ShaderError::Link(format!("duplicate {stage:?} stage"))),
        }
    }

    /// Reset the per-draw uniform slot cursor; call once per frame before
    /// the first draw
    pub fn begin_frame(&mut self) {
        self.slot = 0;
    }

    /// Upload the combined view-projection matrix (no-op if undeclared)
    pub fn set_view_proj_matrix(&mut self, m: Mat4) {
        if self.locations.view_proj {
            self.uniforms.view_proj = m;
        }
    }

    /// Upload the per-instance model matrix (no-op if undeclared)
    pub fn set_model_matrix(&mut self, m: Mat4) {
        if self.locations.model {
            self.uniforms.model = m;
        }
    }

    /// Upload the shared geometry color (no-op if undeclared)
    pub fn set_geometry_color(&mut self, c: Vec4) {
        if self.locations.color {
            self.uniforms.color = c;
        }
    }

    /// Upload elapsed time in seconds (no-op if undeclared)
    pub fn set_time(&mut self, t: f32) {
        if self.locations.time {
            self.uniforms.time = t;
        }
    }

    /// Bind the drawable's buffers and issue its indexed draw call.
    ///
    /// The current uniform values are written into the next per-draw slot,
    /// so earlier draws in the frame keep the values they were issued with.
    /// A drawable that is not ready aborts this draw only.
    pub fn draw(&mut self, backend: &mut dyn RenderBackend, drawable: &Drawable) {
        if !drawable.ready() {
            log::warn!("skipping draw: drawable is not ready");
            return;
        }
        let (Some(vertex_buffer), Some(index_buffer)) =
            (drawable.vertex_buffer(), drawable.index_buffer())
        else {
            log::warn!("skipping draw: drawable has no uploaded buffers");
            return;
        };
        if self.slot >= MAX_DRAWS_PER_FRAME {
            log::warn!("skipping draw: per-frame uniform slots exhausted");
            return;
        }

        let offset = self.slot as u64 * UNIFORM_SLOT_STRIDE;
        backend.write_buffer(self.uniform_buffer, offset, bytemuck::bytes_of(&self.uniforms));

        backend.set_render_pipeline(self.pipeline);
        backend.set_bind_group(0, self.bind_group, &[offset as u32]);
        backend.set_vertex_buffer(0, vertex_buffer, 0);
        backend.set_index_buffer(index_buffer, 0, IndexFormat::Uint32);
        backend.draw_indexed(0..drawable.index_count(), 0, 0..1);

        self.slot += 1;
    }
}

/// Parse and validate one WGSL stage
fn validate_stage(stage: ShaderStage, source: &str) -> Result<naga::Module, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Compile {
        stage,
        message: e.emit_to_string(source),
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|e| ShaderError::Compile {
        stage,
        message: e.emit_to_string(source),
    })?;

    Ok(module)
}

fn require_entry_point(
    module: &naga::Module,
    stage: naga::ShaderStage,
    name: &str,
) -> Result<(), ShaderError> {
    module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage && ep.name == name)
        .map(|_| ())
        .ok_or_else(|| ShaderError::Link(format!("entry point '{name}' not found")))
}

/// Record which canonical uniform members the module declares.
///
/// A declared member at a non-canonical offset would silently read garbage,
/// so that is a link error rather than a warning.
fn reflect_uniform_members(
    module: &naga::Module,
    locations: &mut UniformLocations,
) -> Result<(), ShaderError> {
    for (_, var) in module.global_variables.iter() {
        if var.space != naga::AddressSpace::Uniform {
            continue;
        }
        let naga::TypeInner::Struct { ref members, .. } = module.types[var.ty].inner else {
            continue;
        };
        for member in members {
            let Some(name) = member.name.as_deref() else {
                continue;
            };
            let expected = match name {
                "view_proj" => VIEW_PROJ_OFFSET,
                "model" => MODEL_OFFSET,
                "color" => COLOR_OFFSET,
                "time" => TIME_OFFSET,
                _ => continue,
            };
            if member.offset != expected {
                return Err(ShaderError::Link(format!(
                    "uniform member '{name}' at offset {} (expected {expected})",
                    member.offset
                )));
            }
            match name {
                "view_proj" => locations.view_proj = true,
                "model" => locations.model = true,
                "color" => locations.color = true,
                "time" => locations.time = true,
                _ => {}
            }
        }
    }
    Ok(())
}

/// Check the vertex entry point's input locations against the streams a
/// drawable provides (position, normal, color at locations 0..=2)
fn check_vertex_inputs(module: &naga::Module, label: &str) -> Result<(), ShaderError> {
    let Some(entry) = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga::ShaderStage::Vertex)
    else {
        return Ok(());
    };

    let mut consumed = Vec::new();
    for arg in &entry.function.arguments {
        match &arg.binding {
            Some(naga::Binding::Location { location, .. }) => consumed.push(*location),
            Some(naga::Binding::BuiltIn(_)) => {}
            None => {
                if let naga::TypeInner::Struct { ref members, .. } = module.types[arg.ty].inner {
                    for member in members {
                        if let Some(naga::Binding::Location { location, .. }) = member.binding {
                            consumed.push(location);
                        }
                    }
                }
            }
        }
    }

    let provided = Vertex::layout();
    for location in consumed {
        if !provided.attributes.iter().any(|a| a.location == location) {
            return Err(ShaderError::Link(format!(
                "shader '{label}' consumes vertex input location {location} with no buffer stream"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_BLOCK: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,
    color: vec4<f32>,
    time: f32,
}
@group(0) @binding(0) var<uniform> u: Uniforms;

@vertex
fn vs_main(@location(0) position: vec4<f32>) -> @builtin(position) vec4<f32> {
    return u.view_proj * u.model * vec4<f32>(position.xyz, 1.0) * (u.color.a + u.time * 0.0);
}
"#;

    const NO_TIME_BLOCK: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,
    color: vec4<f32>,
}
@group(0) @binding(0) var<uniform> u: Uniforms;

@vertex
fn vs_main(@location(0) position: vec4<f32>) -> @builtin(position) vec4<f32> {
    return u.view_proj * u.model * vec4<f32>(position.xyz, 1.0) * u.color.a;
}
"#;

    const SHUFFLED_BLOCK: &str = r#"
struct Uniforms {
    color: vec4<f32>,
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,
    time: f32,
}
@group(0) @binding(0) var<uniform> u: Uniforms;

@vertex
fn vs_main(@location(0) position: vec4<f32>) -> @builtin(position) vec4<f32> {
    return u.view_proj * vec4<f32>(position.xyz, 1.0);
}
"#;

    #[test]
    fn reflects_all_declared_members() {
        let module = validate_stage(ShaderStage::Vertex, FULL_BLOCK).unwrap();
        let mut locations = UniformLocations::default();
        reflect_uniform_members(&module, &mut locations).unwrap();
        assert!(locations.view_proj);
        assert!(locations.model);
        assert!(locations.color);
        assert!(locations.time);
    }

    #[test]
    fn missing_member_becomes_unused_sentinel() {
        let module = validate_stage(ShaderStage::Vertex, NO_TIME_BLOCK).unwrap();
        let mut locations = UniformLocations::default();
        reflect_uniform_members(&module, &mut locations).unwrap();
        assert!(locations.view_proj);
        assert!(!locations.time);
    }

    #[test]
    fn non_canonical_offset_is_a_link_error() {
        let module = validate_stage(ShaderStage::Vertex, SHUFFLED_BLOCK).unwrap();
        let mut locations = UniformLocations::default();
        let err = reflect_uniform_members(&module, &mut locations).unwrap_err();
        assert!(matches!(err, ShaderError::Link(_)));
    }

    #[test]
    fn invalid_wgsl_is_a_compile_error() {
        let err = validate_stage(ShaderStage::Vertex, "fn broken {").unwrap_err();
        assert!(matches!(
            err,
            ShaderError::Compile {
                stage: ShaderStage::Vertex,
                ..
            }
        ));
    }

    #[test]
    fn vertex_inputs_within_provided_streams() {
        let module = validate_stage(ShaderStage::Vertex, FULL_BLOCK).unwrap();
        check_vertex_inputs(&module, "test").unwrap();
    }

    #[test]
    fn unknown_vertex_input_location_is_a_link_error() {
        let source = r#"
@vertex
fn vs_main(@location(7) uv: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(uv, 0.0, 1.0);
}
"#;
        let module = validate_stage(ShaderStage::Vertex, source).unwrap();
        let err = check_vertex_inputs(&module, "test").unwrap_err();
        assert!(matches!(err, ShaderError::Link(_)));
    }

    #[test]
    fn canonical_offsets_match_host_layout() {
        assert_eq!(std::mem::offset_of!(UniformBlock, view_proj), VIEW_PROJ_OFFSET as usize);
        assert_eq!(std::mem::offset_of!(UniformBlock, model), MODEL_OFFSET as usize);
        assert_eq!(std::mem::offset_of!(UniformBlock, color), COLOR_OFFSET as usize);
        assert_eq!(std::mem::offset_of!(UniformBlock, time), TIME_OFFSET as usize);
    }
}
