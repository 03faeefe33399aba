//! Frame orchestration: clear, depth target, and the per-frame draw sequence

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::geometry::Drawable;
use crate::scene::Camera;
use crate::shader::ShaderProgram;
use glam::{Mat4, Vec4};
use thiserror::Error;

pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// Per-frame rendering error
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("drawable and matrix counts differ: {drawables} drawables, {matrices} matrices")]
    ArityMismatch { drawables: usize, matrices: usize },
}

/// Forward renderer owning the clear color and the depth target
pub struct Renderer {
    width: u32,
    height: u32,
    clear_color: [f32; 4],
    depth_texture: TextureHandle,
    depth_view: TextureViewHandle,
}

impl Renderer {
    pub fn new(backend: &mut dyn RenderBackend, width: u32, height: u32) -> BackendResult<Self> {
        let (depth_texture, depth_view) = Self::create_depth_target(backend, width, height)?;
        Ok(Self {
            width,
            height,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            depth_texture,
            depth_view,
        })
    }

    fn create_depth_target(
        backend: &mut dyn RenderBackend,
        width: u32,
        height: u32,
    ) -> BackendResult<(TextureHandle, TextureViewHandle)> {
        let texture = backend.create_texture(&TextureDescriptor {
            label: Some("Depth Target".to_string()),
            width,
            height,
            format: DEPTH_FORMAT,
            usage: TextureUsage::RENDER_ATTACHMENT,
        })?;
        let view = backend.create_texture_view(texture)?;
        Ok((texture, view))
    }

    pub fn set_clear_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.clear_color = [r, g, b, a];
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Resize the drawing surface and recreate the depth target to match.
    ///
    /// Degenerate sizes (a minimized window reports 0x0) are ignored. The
    /// backend may clamp the swapchain to device limits, so the stored size
    /// and the depth target follow the actual surface extent, not the
    /// requested one; a mismatched depth attachment would fail render-pass
    /// validation on every frame.
    pub fn set_size(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::warn!("ignoring resize to {width}x{height}");
            return;
        }
        backend.resize(width, height);
        let (width, height) = backend.surface_size();
        self.width = width;
        self.height = height;

        backend.destroy_texture(self.depth_texture);
        match Self::create_depth_target(backend, width, height) {
            Ok((texture, view)) => {
                self.depth_texture = texture;
                self.depth_view = view;
            }
            Err(e) => log::error!("failed to recreate depth target: {e}"),
        }
    }

    /// Clear the swapchain image without drawing anything
    pub fn clear(&self, backend: &mut dyn RenderBackend, frame: &FrameContext) {
        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Clear Pass".to_string()),
            color_attachments: vec![ColorAttachment {
                view: frame.swapchain_view,
                load_op: LoadOp::Clear(self.clear_color),
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view: self.depth_view,
                depth_load_op: LoadOp::Clear([1.0, 1.0, 1.0, 1.0]),
                depth_store_op: StoreOp::Store,
                depth_clear_value: 1.0,
            }),
        });
        backend.end_render_pass();
    }

    /// Render one frame: clear, then draw every drawable with its paired
    /// model matrix through `program`.
    ///
    /// Frame-constant uniforms (view-projection, color, time) are set once;
    /// the model matrix is set per drawable. The drawable and matrix slices
    /// must pair up one-to-one or the whole frame is rejected before any
    /// draw is issued.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &self,
        backend: &mut dyn RenderBackend,
        frame: &FrameContext,
        camera: &Camera,
        program: &mut ShaderProgram,
        drawables: &[Drawable],
        model_matrices: &[Mat4],
        color: Vec4,
        time: f32,
    ) -> Result<(), FrameError> {
        if drawables.len() != model_matrices.len() {
            return Err(FrameError::ArityMismatch {
                drawables: drawables.len(),
                matrices: model_matrices.len(),
            });
        }

        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Forward Pass".to_string()),
            color_attachments: vec![ColorAttachment {
                view: frame.swapchain_view,
                load_op: LoadOp::Clear(self.clear_color),
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view: self.depth_view,
                depth_load_op: LoadOp::Clear([1.0, 1.0, 1.0, 1.0]),
                depth_store_op: StoreOp::Store,
                depth_clear_value: 1.0,
            }),
        });
        backend.set_viewport(0.0, 0.0, self.width as f32, self.height as f32, 0.0, 1.0);

        program.begin_frame();
        let view_proj = camera.projection_matrix() * camera.view_matrix();
        program.set_view_proj_matrix(view_proj);
        program.set_geometry_color(color);
        program.set_time(time);

        for (drawable, model) in drawables.iter().zip(model_matrices) {
            program.set_model_matrix(*model);
            program.draw(backend, drawable);
        }

        backend.end_render_pass();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{Command, RecordingBackend, MAX_DIMENSION};
    use crate::geometry;
    use crate::shader::{ShaderLibrary, ShaderVariant};
    use glam::Vec3;

    fn setup(
        backend: &mut RecordingBackend,
    ) -> (Renderer, ShaderProgram, Camera, Vec<Drawable>) {
        let renderer = Renderer::new(backend, 800, 600).unwrap();
        let program = ShaderProgram::new(
            backend,
            "test",
            &ShaderVariant::Lambert.stages(),
        )
        .unwrap();
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        let mesh = geometry::square();
        let drawables = vec![
            Drawable::from_mesh(backend, &mesh, Vec3::ZERO),
            Drawable::from_mesh(backend, &mesh, Vec3::ONE),
        ];
        backend.commands.clear();
        (renderer, program, camera, drawables)
    }

    #[test]
    fn arity_mismatch_rejects_the_frame_before_any_draw() {
        let mut backend = RecordingBackend::new();
        let (renderer, mut program, camera, drawables) = setup(&mut backend);
        let frame = backend.begin_frame().unwrap();

        let err = renderer
            .render(
                &mut backend,
                &frame,
                &camera,
                &mut program,
                &drawables,
                &[Mat4::IDENTITY],
                Vec4::ONE,
                0.0,
            )
            .unwrap_err();

        assert_eq!(
            err,
            FrameError::ArityMismatch {
                drawables: 2,
                matrices: 1
            }
        );
        assert!(backend.commands.is_empty());
    }

    #[test]
    fn each_draw_gets_its_own_uniform_slot() {
        let mut backend = RecordingBackend::new();
        let (renderer, mut program, camera, drawables) = setup(&mut backend);
        let frame = backend.begin_frame().unwrap();

        let models = [
            Mat4::from_translation(Vec3::ZERO),
            Mat4::from_translation(Vec3::ONE),
        ];
        renderer
            .render(
                &mut backend,
                &frame,
                &camera,
                &mut program,
                &drawables,
                &models,
                Vec4::new(0.5, 0.25, 0.125, 1.0),
                3.0,
            )
            .unwrap();

        assert_eq!(backend.draw_calls(), 2);

        let writes = backend.uniform_writes();
        assert_eq!(writes.len(), 2);
        let (Command::WriteBuffer { offset: o0, data: d0, .. },
             Command::WriteBuffer { offset: o1, data: d1, .. }) = (writes[0], writes[1])
        else {
            unreachable!();
        };
        assert_eq!(*o0, 0);
        assert_eq!(*o1, 256);

        // View-projection bytes are frame-constant, model bytes are per-draw
        assert_eq!(d0[0..64], d1[0..64]);
        assert_eq!(&d0[64..128], bytemuck::bytes_of(&models[0]));
        assert_eq!(&d1[64..128], bytemuck::bytes_of(&models[1]));

        // Time lands at its canonical offset in both slots
        assert_eq!(d0[144..148], 3.0_f32.to_le_bytes());
        assert_eq!(d1[144..148], 3.0_f32.to_le_bytes());
    }

    #[test]
    fn bind_groups_use_matching_dynamic_offsets() {
        let mut backend = RecordingBackend::new();
        let (renderer, mut program, camera, drawables) = setup(&mut backend);
        let frame = backend.begin_frame().unwrap();

        renderer
            .render(
                &mut backend,
                &frame,
                &camera,
                &mut program,
                &drawables,
                &[Mat4::IDENTITY, Mat4::IDENTITY],
                Vec4::ONE,
                0.0,
            )
            .unwrap();

        let offsets: Vec<&Vec<u32>> = backend
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::SetBindGroup { offsets, .. } => Some(offsets),
                _ => None,
            })
            .collect();
        assert_eq!(offsets, [&vec![0u32], &vec![256u32]]);
    }

    #[test]
    fn not_ready_drawable_is_skipped_without_failing_the_frame() {
        let mut backend = RecordingBackend::new();
        let (renderer, mut program, camera, mut drawables) = setup(&mut backend);

        backend.fail_buffer_creation = true;
        let broken = Drawable::from_mesh(&mut backend, &geometry::cube(), Vec3::ZERO);
        backend.fail_buffer_creation = false;
        assert!(!broken.ready());
        drawables.insert(0, broken);

        backend.commands.clear();
        let frame = backend.begin_frame().unwrap();
        renderer
            .render(
                &mut backend,
                &frame,
                &camera,
                &mut program,
                &drawables,
                &[Mat4::IDENTITY; 3],
                Vec4::ONE,
                0.0,
            )
            .unwrap();

        // Two ready drawables still draw, and the skipped one does not
        // consume a uniform slot
        assert_eq!(backend.draw_calls(), 2);
        let writes = backend.uniform_writes();
        assert!(matches!(writes[0], Command::WriteBuffer { offset: 0, .. }));
        assert!(matches!(writes[1], Command::WriteBuffer { offset: 256, .. }));
    }

    #[test]
    fn render_clears_with_the_configured_color() {
        let mut backend = RecordingBackend::new();
        let (mut renderer, mut program, camera, drawables) = setup(&mut backend);
        renderer.set_clear_color(0.2, 0.2, 0.2, 1.0);
        let frame = backend.begin_frame().unwrap();

        renderer
            .render(
                &mut backend,
                &frame,
                &camera,
                &mut program,
                &drawables,
                &[Mat4::IDENTITY, Mat4::IDENTITY],
                Vec4::ONE,
                0.0,
            )
            .unwrap();

        assert_eq!(
            backend.commands.first(),
            Some(&Command::BeginRenderPass {
                clear_color: Some([0.2, 0.2, 0.2, 1.0])
            })
        );
        assert_eq!(backend.commands.last(), Some(&Command::EndRenderPass));
    }

    #[test]
    fn clear_emits_an_empty_pass() {
        let mut backend = RecordingBackend::new();
        let (renderer, _, _, _) = setup(&mut backend);
        let frame = backend.begin_frame().unwrap();

        renderer.clear(&mut backend, &frame);

        assert_eq!(backend.commands.len(), 2);
        assert!(matches!(
            backend.commands[0],
            Command::BeginRenderPass { .. }
        ));
        assert_eq!(backend.commands[1], Command::EndRenderPass);
    }

    #[test]
    fn degenerate_resize_is_ignored() {
        let mut backend = RecordingBackend::new();
        let (mut renderer, _, _, _) = setup(&mut backend);
        renderer.set_size(&mut backend, 0, 600);
        assert_eq!(renderer.size(), (800, 600));
        renderer.set_size(&mut backend, 1024, 768);
        assert_eq!(renderer.size(), (1024, 768));
    }

    #[test]
    fn resize_beyond_device_limits_follows_the_clamped_surface() {
        let mut backend = RecordingBackend::new();
        let (mut renderer, _, _, _) = setup(&mut backend);

        renderer.set_size(&mut backend, MAX_DIMENSION + 1808, 800);

        // The swapchain was clamped; the stored size and the recreated
        // depth target must match it or the attachments disagree
        assert_eq!(backend.surface_size(), (MAX_DIMENSION, 800));
        assert_eq!(renderer.size(), backend.surface_size());
        let depth = backend
            .commands
            .iter()
            .rev()
            .find_map(|c| match c {
                Command::CreateTexture { width, height } => Some((*width, *height)),
                _ => None,
            })
            .unwrap();
        assert_eq!(depth, backend.surface_size());
    }

    #[test]
    fn variant_switch_only_changes_the_bound_program() {
        let mut backend = RecordingBackend::new();
        let renderer = Renderer::new(&mut backend, 800, 600).unwrap();
        let mut library = ShaderLibrary::build(&mut backend);
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        let mesh = geometry::square();
        let drawables = vec![Drawable::from_mesh(&mut backend, &mesh, Vec3::ZERO)];
        let models = [Mat4::IDENTITY];

        let view_before = camera.view_matrix();
        let proj_before = camera.projection_matrix();

        let mut frames = Vec::new();
        for variant in ShaderVariant::ALL {
            backend.commands.clear();
            let frame = backend.begin_frame().unwrap();
            let program = library.get_mut(variant).unwrap();
            renderer
                .render(
                    &mut backend,
                    &frame,
                    &camera,
                    program,
                    &drawables,
                    &models,
                    Vec4::new(0.5, 0.25, 0.125, 1.0),
                    2.0,
                )
                .unwrap();

            let pipeline = backend
                .commands
                .iter()
                .find_map(|c| match c {
                    Command::SetPipeline(p) => Some(*p),
                    _ => None,
                })
                .unwrap();
            let (target, data) = backend
                .commands
                .iter()
                .find_map(|c| match c {
                    Command::WriteBuffer { buffer, data, .. } => Some((*buffer, data.clone())),
                    _ => None,
                })
                .unwrap();
            frames.push((pipeline, target, data));
        }

        // Each variant binds its own pipeline and uniform buffer
        assert_ne!(frames[0].0, frames[1].0);
        assert_ne!(frames[0].1, frames[1].1);
        // but the uniform payload reaching them is identical
        assert_eq!(frames[0].2, frames[1].2);

        // Camera and renderer state are untouched by the switch
        assert_eq!(
            camera.view_matrix().to_cols_array(),
            view_before.to_cols_array()
        );
        assert_eq!(
            camera.projection_matrix().to_cols_array(),
            proj_before.to_cols_array()
        );
        assert_eq!(renderer.size(), (800, 600));
    }
}
