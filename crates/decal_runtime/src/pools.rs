//! Size-classed recycling pools for decal mesh buffers.
//!
//! Clipped decal meshes are small and churn constantly (every reclip and
//! every batch). Buffers are bucketed into three byte-size classes and
//! recycled; anything bigger than the largest class falls back to a plain
//! exact-size allocation.

use decal_core::{DecalMesh, DecalVertex};
use log::debug;

/// Byte budgets of the pooled size classes, smallest first.
pub const CLASS_BYTES: [usize; 3] = [2048, 8192, 32768];

/// Recycled buffers kept per class; beyond this they are dropped.
const MAX_FREE_PER_CLASS: usize = 64;

const VERTEX_STRIDE: usize = std::mem::size_of::<DecalVertex>();
const INDEX_STRIDE: usize = std::mem::size_of::<u16>();

/// Pool of reusable `DecalMesh` buffers keyed by byte-size class.
#[derive(Debug, Default)]
pub struct MeshBufferPool {
    free: [Vec<DecalMesh>; 3],
}

/// Vertex capacity a buffer of the given class must hold.
fn vertex_quota(class: usize) -> usize {
    CLASS_BYTES[class] / VERTEX_STRIDE
}

/// Index capacity a buffer of the given class must hold.
fn index_quota(class: usize) -> usize {
    CLASS_BYTES[class] / INDEX_STRIDE
}

/// Smallest class whose budget covers `bytes`, if any.
fn class_for(bytes: usize) -> Option<usize> {
    CLASS_BYTES.iter().position(|&budget| bytes <= budget)
}

impl MeshBufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an empty buffer with capacity for the given counts.
    ///
    /// Pooled classes over-reserve to the class budget so any geometry that
    /// fits the class fits the buffer. Oversized requests allocate exactly
    /// and are not recycled.
    pub fn allocate(&mut self, vertex_count: usize, index_count: usize) -> DecalMesh {
        let bytes = DecalMesh::byte_size_for(vertex_count, index_count);
        match class_for(bytes) {
            Some(class) => {
                if let Some(mut mesh) = self.free[class].pop() {
                    mesh.clear();
                    return mesh;
                }
                let mut mesh = DecalMesh::new();
                mesh.vertices.reserve_exact(vertex_quota(class));
                mesh.indices.reserve_exact(index_quota(class));
                mesh
            }
            None => {
                debug!("decal mesh of {bytes} bytes exceeds the largest pool class; general allocation");
                let mut mesh = DecalMesh::new();
                mesh.vertices.reserve_exact(vertex_count);
                mesh.indices.reserve_exact(index_count);
                mesh
            }
        }
    }

    /// Return a buffer for reuse. Buffers that match a class are stacked
    /// for the next `allocate`; general allocations are simply dropped.
    pub fn recycle(&mut self, mut mesh: DecalMesh) {
        mesh.clear();
        for class in (0..CLASS_BYTES.len()).rev() {
            if mesh.vertices.capacity() >= vertex_quota(class)
                && mesh.indices.capacity() >= index_quota(class)
            {
                if self.free[class].len() < MAX_FREE_PER_CLASS {
                    self.free[class].push(mesh);
                }
                return;
            }
        }
    }

    /// Total buffers currently waiting for reuse.
    pub fn free_count(&self) -> usize {
        self.free.iter().map(Vec::len).sum()
    }
}
