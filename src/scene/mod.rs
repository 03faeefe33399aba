//! Scene contents: camera plus the demo's drawables and their placement

mod camera;

pub use camera::Camera;

use crate::backend::traits::RenderBackend;
use crate::geometry::{self, Drawable};
use glam::{Mat4, Vec3};

const ICOSPHERE: usize = 0;

/// The demo scene: an icosphere, a square, and a cube, each with a paired
/// model matrix.
///
/// Drawables and model matrices are kept in matching order; the renderer
/// consumes them as parallel slices.
pub struct Scene {
    drawables: Vec<Drawable>,
    model_matrices: Vec<Mat4>,
    tessellation: u32,
}

impl Scene {
    /// Build the scene at the given icosphere tessellation level
    pub fn load(backend: &mut dyn RenderBackend, tessellation: u32) -> Self {
        let placements = [
            (geometry::icosphere(1.0, tessellation), Vec3::new(-1.0, -1.0, -1.0)),
            (geometry::square(), Vec3::new(1.0, 1.0, 1.0)),
            (geometry::cube(), Vec3::new(1.0, -1.0, 1.0)),
        ];

        let mut drawables = Vec::with_capacity(placements.len());
        let mut model_matrices = Vec::with_capacity(placements.len());
        for (mesh, center) in placements {
            drawables.push(Drawable::from_mesh(backend, &mesh, center));
            model_matrices.push(Mat4::from_translation(center));
        }

        Self {
            drawables,
            model_matrices,
            tessellation,
        }
    }

    /// Regenerate the icosphere if the requested tessellation level differs
    /// from the current one. Returns whether a regeneration happened.
    ///
    /// The regenerated sphere keeps its original placement.
    pub fn sync_tessellation(&mut self, backend: &mut dyn RenderBackend, level: u32) -> bool {
        if level == self.tessellation {
            return false;
        }
        log::info!(
            "regenerating icosphere: tessellation {} -> {level}",
            self.tessellation
        );
        self.tessellation = level;
        let mesh = geometry::icosphere(1.0, level);
        self.drawables[ICOSPHERE].replace_mesh(backend, &mesh);
        true
    }

    /// Refresh every model matrix from its drawable's placement
    pub fn update_model_matrices(&mut self) {
        for (drawable, matrix) in self.drawables.iter().zip(&mut self.model_matrices) {
            *matrix = Mat4::from_translation(drawable.center());
        }
    }

    pub fn tessellation(&self) -> u32 {
        self.tessellation
    }

    pub fn drawables(&self) -> &[Drawable] {
        &self.drawables
    }

    pub fn model_matrices(&self) -> &[Mat4] {
        &self.model_matrices
    }
}
