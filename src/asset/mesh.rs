use crate::renderer::Vertex;
use crate::scene::Aabb;
use glam::Vec3;

/// CPU-side geometry of a shape.
///
/// The GPU copy lives in the backend; `dirty` tells the shadow renderer that
/// the resident copy has to be refreshed before the next draw.
#[derive(Clone, Debug)]
pub struct MeshData {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    bounds: Aabb,
    dirty: bool,
}

impl MeshData {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        let bounds = Aabb::from_points(vertices.iter().map(|v| Vec3::from_array(v.pos)));
        Self {
            vertices,
            indices,
            bounds,
            dirty: false,
        }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Local-space bounds of the vertex positions.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Replaces the geometry and flags it for re-upload.
    pub fn set_geometry(&mut self, vertices: Vec<Vertex>, indices: Vec<u32>) {
        self.bounds = Aabb::from_points(vertices.iter().map(|v| Vec3::from_array(v.pos)));
        self.vertices = vertices;
        self.indices = indices;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::cube_mesh;

    #[test]
    fn bounds_cover_unit_cube() {
        let (vertices, indices) = cube_mesh();
        let mesh = MeshData::new(vertices, indices);
        assert!(mesh.bounds().min.abs_diff_eq(Vec3::splat(-0.5), 1e-6));
        assert!(mesh.bounds().max.abs_diff_eq(Vec3::splat(0.5), 1e-6));
        assert_eq!(mesh.index_count(), 36);
        assert!(!mesh.is_dirty());
    }

    #[test]
    fn set_geometry_marks_dirty_and_refits_bounds() {
        let (vertices, indices) = cube_mesh();
        let mut mesh = MeshData::new(vertices.clone(), indices.clone());
        let scaled = vertices
            .into_iter()
            .map(|mut v| {
                v.pos = [v.pos[0] * 4.0, v.pos[1], v.pos[2]];
                v
            })
            .collect();
        mesh.set_geometry(scaled, indices);
        assert!(mesh.is_dirty());
        assert!((mesh.bounds().max.x - 2.0).abs() < 1e-6);
        mesh.mark_clean();
        assert!(!mesh.is_dirty());
    }
}
