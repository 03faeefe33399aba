//! Procedural geometry and GPU-resident drawables

use crate::backend::traits::*;
use crate::backend::types::*;
use glam::{Vec3, Vec4};
use std::collections::HashMap;

/// CPU-side mesh: interleaved vertices plus a triangle index list
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

fn vertex(position: Vec3, normal: Vec3, color: Vec4) -> Vertex {
    Vertex {
        position: position.extend(1.0),
        normal: normal.extend(0.0),
        color,
    }
}

/// Unit-ish sphere built from a subdivided icosahedron.
///
/// Subdivision level 0 is the base icosahedron (12 vertices, 20 faces);
/// each level splits every triangle in four, so counts grow as
/// `10 * 4^n + 2` vertices and `60 * 4^n` indices.
pub fn icosphere(radius: f32, subdivisions: u32) -> MeshData {
    // Golden-ratio icosahedron
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
    let mut positions: Vec<Vec3> = vec![
        Vec3::new(-1.0, t, 0.0),
        Vec3::new(1.0, t, 0.0),
        Vec3::new(-1.0, -t, 0.0),
        Vec3::new(1.0, -t, 0.0),
        Vec3::new(0.0, -1.0, t),
        Vec3::new(0.0, 1.0, t),
        Vec3::new(0.0, -1.0, -t),
        Vec3::new(0.0, 1.0, -t),
        Vec3::new(t, 0.0, -1.0),
        Vec3::new(t, 0.0, 1.0),
        Vec3::new(-t, 0.0, -1.0),
        Vec3::new(-t, 0.0, 1.0),
    ]
    .into_iter()
    .map(|p| p.normalize())
    .collect();

    let mut faces: Vec<[u32; 3]> = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    for _ in 0..subdivisions {
        let mut midpoint_cache: HashMap<(u32, u32), u32> = HashMap::new();
        let mut midpoint = |a: u32, b: u32, positions: &mut Vec<Vec3>| -> u32 {
            let key = if a < b { (a, b) } else { (b, a) };
            *midpoint_cache.entry(key).or_insert_with(|| {
                let mid = ((positions[a as usize] + positions[b as usize]) / 2.0).normalize();
                positions.push(mid);
                positions.len() as u32 - 1
            })
        };

        let mut next_faces = Vec::with_capacity(faces.len() * 4);
        for [a, b, c] in faces {
            let ab = midpoint(a, b, &mut positions);
            let bc = midpoint(b, c, &mut positions);
            let ca = midpoint(c, a, &mut positions);
            next_faces.push([a, ab, ca]);
            next_faces.push([b, bc, ab]);
            next_faces.push([c, ca, bc]);
            next_faces.push([ab, bc, ca]);
        }
        faces = next_faces;
    }

    // On a sphere centered at the origin, the normal is the normalized
    // position
    let vertices = positions
        .iter()
        .map(|&p| vertex(p * radius, p, Vec4::ONE))
        .collect();
    let indices = faces.into_iter().flatten().collect();

    MeshData { vertices, indices }
}

/// Axis-aligned unit cube with flat per-face normals
pub fn cube() -> MeshData {
    let h = 0.5;
    let face_colors = Vec4::ONE;
    let faces: [(Vec3, [Vec3; 4]); 6] = [
        (
            Vec3::Z,
            [
                Vec3::new(-h, -h, h),
                Vec3::new(h, -h, h),
                Vec3::new(h, h, h),
                Vec3::new(-h, h, h),
            ],
        ),
        (
            Vec3::NEG_Z,
            [
                Vec3::new(h, -h, -h),
                Vec3::new(-h, -h, -h),
                Vec3::new(-h, h, -h),
                Vec3::new(h, h, -h),
            ],
        ),
        (
            Vec3::X,
            [
                Vec3::new(h, -h, h),
                Vec3::new(h, -h, -h),
                Vec3::new(h, h, -h),
                Vec3::new(h, h, h),
            ],
        ),
        (
            Vec3::NEG_X,
            [
                Vec3::new(-h, -h, -h),
                Vec3::new(-h, -h, h),
                Vec3::new(-h, h, h),
                Vec3::new(-h, h, -h),
            ],
        ),
        (
            Vec3::Y,
            [
                Vec3::new(-h, h, h),
                Vec3::new(h, h, h),
                Vec3::new(h, h, -h),
                Vec3::new(-h, h, -h),
            ],
        ),
        (
            Vec3::NEG_Y,
            [
                Vec3::new(-h, -h, -h),
                Vec3::new(h, -h, -h),
                Vec3::new(h, -h, h),
                Vec3::new(-h, -h, h),
            ],
        ),
    ];

    let mut mesh = MeshData::default();
    for (normal, corners) in faces {
        let base = mesh.vertices.len() as u32;
        for corner in corners {
            mesh.vertices.push(vertex(corner, normal, face_colors));
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
}

/// Unit square in the XY plane facing +Z
pub fn square() -> MeshData {
    let h = 0.5;
    let corners = [
        Vec3::new(-h, -h, 0.0),
        Vec3::new(h, -h, 0.0),
        Vec3::new(h, h, 0.0),
        Vec3::new(-h, h, 0.0),
    ];
    MeshData {
        vertices: corners
            .into_iter()
            .map(|c| vertex(c, Vec3::Z, Vec4::ONE))
            .collect(),
        indices: vec![0, 1, 2, 0, 2, 3],
    }
}

/// GPU-resident geometry plus its world-space placement.
///
/// Upload failures leave the drawable in a not-ready state; draws against
/// it are skipped instead of failing the frame.
pub struct Drawable {
    vertex_buffer: Option<BufferHandle>,
    index_buffer: Option<BufferHandle>,
    index_count: u32,
    center: Vec3,
    ready: bool,
}

impl Drawable {
    /// Upload a mesh and place it at `center`
    pub fn from_mesh(backend: &mut dyn RenderBackend, mesh: &MeshData, center: Vec3) -> Self {
        let vertex_buffer = backend
            .create_buffer_init(
                &BufferDescriptor {
                    label: Some("Drawable Vertices".to_string()),
                    size: mesh.vertex_bytes().len() as u64,
                    usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
                },
                mesh.vertex_bytes(),
            )
            .map_err(|e| log::error!("vertex upload failed: {e}"))
            .ok();
        let index_buffer = backend
            .create_buffer_init(
                &BufferDescriptor {
                    label: Some("Drawable Indices".to_string()),
                    size: mesh.index_bytes().len() as u64,
                    usage: BufferUsage::INDEX | BufferUsage::COPY_DST,
                },
                mesh.index_bytes(),
            )
            .map_err(|e| log::error!("index upload failed: {e}"))
            .ok();

        let ready = vertex_buffer.is_some() && index_buffer.is_some();
        Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            center,
            ready,
        }
    }

    /// Replace this drawable's geometry in place, keeping its placement
    pub fn replace_mesh(&mut self, backend: &mut dyn RenderBackend, mesh: &MeshData) {
        let replacement = Drawable::from_mesh(backend, mesh, self.center);
        *self = replacement;
    }

    pub fn vertex_buffer(&self) -> Option<BufferHandle> {
        self.vertex_buffer
    }

    pub fn index_buffer(&self) -> Option<BufferHandle> {
        self.index_buffer
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn ready(&self) -> bool {
        self.ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn icosphere_counts(subdivisions: u32) -> (usize, usize) {
        let n = 4usize.pow(subdivisions);
        (10 * n + 2, 60 * n)
    }

    #[test]
    fn icosphere_base_is_an_icosahedron() {
        let mesh = icosphere(1.0, 0);
        assert_eq!(mesh.vertices.len(), 12);
        assert_eq!(mesh.indices.len(), 60);
    }

    #[test]
    fn icosphere_counts_grow_geometrically() {
        for subdivisions in 0..=4 {
            let mesh = icosphere(1.0, subdivisions);
            let (vertices, indices) = icosphere_counts(subdivisions);
            assert_eq!(mesh.vertices.len(), vertices, "level {subdivisions}");
            assert_eq!(mesh.indices.len(), indices, "level {subdivisions}");
        }
    }

    #[test]
    fn icosphere_vertices_lie_on_the_sphere() {
        let radius = 2.5;
        let mesh = icosphere(radius, 2);
        for v in &mesh.vertices {
            let r = v.position.truncate().length();
            assert!((r - radius).abs() < 1e-4);
            assert!((v.normal.truncate().length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn icosphere_indices_are_in_range() {
        let mesh = icosphere(1.0, 3);
        let count = mesh.vertices.len() as u32;
        assert!(mesh.indices.iter().all(|&i| i < count));
    }

    #[test]
    fn cube_has_four_vertices_per_face() {
        let mesh = cube();
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        for v in &mesh.vertices {
            assert!((v.normal.truncate().length() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn square_faces_positive_z() {
        let mesh = square();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
        assert!(mesh.vertices.iter().all(|v| v.normal.z == 1.0));
    }
}
