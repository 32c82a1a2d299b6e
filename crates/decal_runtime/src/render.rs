//! Interface to the out-of-scope render-pass collaborator.

use decal_core::{DecalVertex, MaterialId, TextureId};

/// One batched draw handed to the render pass.
///
/// The vertex/index slices borrow the manager's transient batch buffers,
/// which stay alive until the next frame's queue is rebuilt; the sink must
/// copy or upload them within the call.
#[derive(Debug)]
pub struct RenderInstance<'a> {
    pub vertices: &'a [DecalVertex],
    pub indices: &'a [u16],
    pub material: MaterialId,
    /// Per-instance texture override shared by the whole batch, if any.
    pub custom_texture: Option<TextureId>,
    /// Render priority of the batch (already reflected in submission order).
    pub priority: u8,
    /// Camera distance to the batch centroid; translucent sort key.
    pub sort_distance: f32,
}

/// Accepts decal batches for drawing. Implemented by the renderer.
pub trait RenderSink {
    fn submit(&mut self, instance: RenderInstance<'_>);
}
