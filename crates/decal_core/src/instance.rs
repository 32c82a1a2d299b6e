//! Runtime state for one placed decal.

use std::sync::Arc;

use glam::Vec3;

use crate::mesh::DecalMesh;
use crate::template::{DecalTemplate, TextureId};

/// Stable public identifier for a placed decal.
///
/// Assigned at registry insertion, monotonic, never reused. External layers
/// (editor, scripting) hold these across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecalId(pub u32);

impl DecalId {
    /// Sentinel for "not yet registered".
    pub const INVALID: Self = Self(u32::MAX);
}

bitflags::bitflags! {
    /// Per-instance behavior flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[repr(transparent)]
    pub struct DecalFlags: u8 {
        /// Never expires or time-fades.
        const PERMANENT = 1 << 0;
        /// Persisted to the level's decal file; editor-placed.
        const SAVE = 1 << 1;
        /// Geometry is stale; re-clip lazily on the next visible frame.
        const CLIP_PENDING = 1 << 2;
        /// Externally managed visuals; exempt from time fading.
        const CUSTOM = 1 << 3;
    }
}

/// One placed decal: placement basis, fade state, flags, and the clipped
/// mesh generated against the surrounding world geometry.
#[derive(Debug, Clone)]
pub struct DecalInstance {
    /// Registry id; `DecalId::INVALID` until registered.
    pub id: DecalId,
    pub position: Vec3,
    /// Projection direction (unit); the footprint plane normal.
    pub normal: Vec3,
    /// In-plane U axis (unit, perpendicular to `normal`).
    pub tangent: Vec3,
    /// World size of the square footprint.
    pub size: f32,
    /// Index into the template's atlas rect table.
    pub texture_rect_index: u32,
    /// Time-fade scalar, 1 = fully visible.
    pub visibility: f32,
    /// Engine time (seconds) at placement.
    pub creation_time: f32,
    pub flags: DecalFlags,
    /// Per-instance priority override; 0 = use the template's priority.
    pub render_priority: u8,
    /// Shared appearance/lifetime definition.
    pub template: Arc<DecalTemplate>,
    /// Clipped geometry; `None` until the first successful clip.
    pub mesh: Option<DecalMesh>,
    /// Optional texture override for custom decals.
    pub custom_texture: Option<TextureId>,
}

impl DecalInstance {
    /// Build an unregistered instance with per-session fields at defaults
    /// (no id, no priority override, no custom texture, no mesh).
    pub fn new(template: Arc<DecalTemplate>, position: Vec3, normal: Vec3, tangent: Vec3) -> Self {
        Self {
            id: DecalId::INVALID,
            position,
            normal,
            tangent,
            size: template.size,
            texture_rect_index: 0,
            visibility: 1.0,
            creation_time: 0.0,
            flags: DecalFlags::empty(),
            render_priority: 0,
            template,
            mesh: None,
            custom_texture: None,
        }
    }

    /// Priority used for sorting: the override when set, else the template's.
    pub fn effective_priority(&self) -> u8 {
        if self.render_priority != 0 {
            self.render_priority
        } else {
            self.template.render_priority
        }
    }

    /// Whether this instance has renderable clipped geometry.
    pub fn has_geometry(&self) -> bool {
        self.mesh.as_ref().is_some_and(|m| !m.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_instance_has_session_defaults() {
        let template = Arc::new(DecalTemplate::named("t"));
        let inst = DecalInstance::new(template, Vec3::ZERO, Vec3::Z, Vec3::X);
        assert_eq!(inst.id, DecalId::INVALID);
        assert_eq!(inst.render_priority, 0);
        assert!(inst.custom_texture.is_none());
        assert!(inst.mesh.is_none());
        assert_eq!(inst.visibility, 1.0);
    }

    #[test]
    fn priority_override_beats_template() {
        let mut template = DecalTemplate::named("t");
        template.render_priority = 3;
        let mut inst = DecalInstance::new(Arc::new(template), Vec3::ZERO, Vec3::Z, Vec3::X);
        assert_eq!(inst.effective_priority(), 3);
        inst.render_priority = 7;
        assert_eq!(inst.effective_priority(), 7);
    }
}
