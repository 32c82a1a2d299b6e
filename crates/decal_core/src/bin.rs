//! Bounding-sphere spatial groups of nearby decal instances.

use glam::Vec3;

use crate::pool::{DecalHandle, InstancePool};

/// Slack added on top of the farthest member when recomputing a bin sphere.
pub const BOUNDS_EPSILON: f32 = 0.5;

/// Surface distance beyond which a bin is never considered for placement.
pub const PLACEMENT_TOLERANCE: f32 = 25.0;

/// A bin whose sphere would have to grow past this radius rejects the decal.
pub const MAX_BIN_RADIUS: f32 = 50.0;

/// Extra margin when estimating how far a bin sphere would need to grow.
pub const GROW_MARGIN: f32 = 1.0;

/// Bounding-sphere group of nearby decals; the spatial index unit used for
/// frustum culling and broad-phase queries.
///
/// Membership is by handle; instance storage lives in the store's pool.
/// A bin is never left empty: the store deletes it when the last member
/// is removed.
#[derive(Debug, Clone)]
pub struct DecalBin {
    pub center: Vec3,
    pub radius: f32,
    decals: Vec<DecalHandle>,
}

impl DecalBin {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self {
            center,
            radius,
            decals: Vec::new(),
        }
    }

    pub fn decals(&self) -> &[DecalHandle] {
        &self.decals
    }

    pub fn len(&self) -> usize {
        self.decals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decals.is_empty()
    }

    /// Append a member and grow the sphere to cover it.
    pub fn add(&mut self, handle: DecalHandle, pool: &InstancePool) {
        self.decals.push(handle);
        self.update_bounds(pool);
    }

    /// Remove a member. Returns `true` when the bin is now empty and the
    /// caller must delete it; otherwise the sphere has been recomputed.
    pub fn remove(&mut self, handle: DecalHandle, pool: &InstancePool) -> bool {
        if let Some(at) = self.decals.iter().position(|&h| h == handle) {
            self.decals.remove(at);
        }
        if self.decals.is_empty() {
            return true;
        }
        self.update_bounds(pool);
        false
    }

    /// Recompute the sphere from scratch: farthest member distance plus
    /// twice the largest member size plus a fixed slack.
    pub fn update_bounds(&mut self, pool: &InstancePool) {
        let mut farthest = 0.0_f32;
        let mut largest = 0.0_f32;
        for &handle in &self.decals {
            if let Some(decal) = pool.get(handle) {
                farthest = farthest.max(self.center.distance(decal.position));
                largest = largest.max(decal.size);
            }
        }
        self.radius = farthest + largest * 2.0 + BOUNDS_EPSILON;
    }

    /// Signed distance from a point to the sphere surface (negative inside).
    pub fn surface_distance(&self, point: Vec3) -> f32 {
        self.center.distance(point) - self.radius
    }
}
