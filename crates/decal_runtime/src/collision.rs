//! Capability interface onto the world's collision containers.
//!
//! The scene graph and collision containers live outside this subsystem;
//! the manager only needs ray casts and bounded poly-list queries, so it
//! talks to them through this trait.

use decal_core::{SurfaceMask, Vec3};

/// Result of a ray cast against world geometry.
#[derive(Debug, Clone, Copy)]
pub struct RaycastHit {
    /// World position of the hit.
    pub point: Vec3,
    /// Surface normal at the hit point.
    pub normal: Vec3,
    /// Distance along the ray to the hit point.
    pub distance: f32,
}

/// One clipped polygon: a face normal plus indices into the soup positions.
#[derive(Debug, Clone)]
pub struct Polygon {
    pub normal: Vec3,
    pub indices: Vec<u32>,
}

/// Clipped geometry returned by a bounded poly-list query.
///
/// Positions may include vertices no polygon references; the clipper
/// compacts them before building a mesh.
#[derive(Debug, Clone, Default)]
pub struct PolySoup {
    pub positions: Vec<Vec3>,
    pub polygons: Vec<Polygon>,
}

impl PolySoup {
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }
}

/// Oriented box used as the decal clipping volume.
#[derive(Debug, Clone, Copy)]
pub struct OrientedBox {
    pub center: Vec3,
    /// Orthonormal basis: in-plane U, in-plane V, projection normal.
    pub axes: [Vec3; 3],
    /// Half extent along each axis.
    pub half_extents: Vec3,
}

impl OrientedBox {
    /// World-space corner `i` (bit 0 = U axis, bit 1 = V axis, bit 2 = normal).
    pub fn corner(&self, i: usize) -> Vec3 {
        let sign = |bit: usize| if i & (1 << bit) != 0 { 1.0 } else { -1.0 };
        self.center
            + self.axes[0] * (self.half_extents.x * sign(0))
            + self.axes[1] * (self.half_extents.y * sign(1))
            + self.axes[2] * (self.half_extents.z * sign(2))
    }

    /// Axis-aligned bounds enclosing the box.
    pub fn aabb(&self) -> (Vec3, Vec3) {
        let mut min = self.corner(0);
        let mut max = min;
        for i in 1..8 {
            let c = self.corner(i);
            min = min.min(c);
            max = max.max(c);
        }
        (min, max)
    }

    /// Whether a world point lies inside the box.
    pub fn contains(&self, point: Vec3) -> bool {
        let local = point - self.center;
        local.dot(self.axes[0]).abs() <= self.half_extents.x
            && local.dot(self.axes[1]).abs() <= self.half_extents.y
            && local.dot(self.axes[2]).abs() <= self.half_extents.z
    }
}

/// Injected collision backend. One per loaded level; the manager borrows it
/// for the duration of a call.
pub trait CollisionProvider {
    /// Cast against all collision geometry; first hit.
    fn cast_ray(&self, start: Vec3, end: Vec3) -> Option<RaycastHit>;

    /// Cast against rendered geometry only (what the player sees), used for
    /// decal picking so invisible collision hulls don't shadow decals.
    fn cast_ray_rendered(&self, start: Vec3, end: Vec3) -> Option<RaycastHit>;

    /// Clipped polygons of rendered static geometry intersecting the box,
    /// filtered by surface type.
    fn build_poly_list(&self, bounds: &OrientedBox, mask: SurfaceMask) -> PolySoup;

    /// Ids of world objects whose bounds intersect the AABB, filtered by
    /// surface type. Cheap pre-check before a full poly-list query.
    fn find_objects_in_bounds(&self, min: Vec3, max: Vec3, mask: SurfaceMask) -> Vec<u32>;
}
