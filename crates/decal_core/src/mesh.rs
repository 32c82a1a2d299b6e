//! Vertex and mesh storage for generated decal geometry.

use bytemuck::{Pod, Zeroable};

/// Vertex for clipped decal geometry: position, normal, UV, and color.
///
/// The color alpha channel carries the combined LOD/time fade so the
/// render collaborator can draw batches without per-decal uniforms.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DecalVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
    pub color: [f32; 4],
}

impl DecalVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coords: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coords,
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

/// Owned vertex/index storage for one decal (or one transient render batch).
///
/// Buffers are recycled through the size-classed mesh pool rather than
/// freed, so `Vec` capacity is meaningful beyond `len`.
#[derive(Debug, Clone, Default)]
pub struct DecalMesh {
    pub vertices: Vec<DecalVertex>,
    pub indices: Vec<u16>,
}

impl DecalMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte size of the stored geometry (vertex bytes + index bytes).
    pub fn byte_size(&self) -> usize {
        Self::byte_size_for(self.vertices.len(), self.indices.len())
    }

    /// Byte size a mesh with the given counts would occupy.
    pub fn byte_size_for(vertex_count: usize, index_count: usize) -> usize {
        vertex_count * std::mem::size_of::<DecalVertex>()
            + index_count * std::mem::size_of::<u16>()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// Drop the contents but keep the allocated capacity for reuse.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }
}
