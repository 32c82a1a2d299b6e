//! Per-frame view state: frustum culling and screen-size projection.

use decal_core::{Mat4, Vec3};

/// Plane in `normal · p + d >= 0` form; positive half-space is inside.
#[derive(Debug, Clone, Copy)]
struct Plane {
    normal: Vec3,
    d: f32,
}

impl Plane {
    fn from_coefficients(x: f32, y: f32, z: f32, w: f32) -> Self {
        let normal = Vec3::new(x, y, z);
        let len = normal.length();
        if len > 1e-6 {
            Self {
                normal: normal / len,
                d: w / len,
            }
        } else {
            Self { normal, d: w }
        }
    }

    fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }
}

/// Six-plane view frustum for sphere culling.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    planes: [Plane; 6],
}

impl Frustum {
    /// Extract planes from a view-projection matrix (0..1 depth range, the
    /// convention `Mat4::perspective_rh` produces).
    pub fn from_view_projection(m: &Mat4) -> Self {
        let r0 = m.row(0);
        let r1 = m.row(1);
        let r2 = m.row(2);
        let r3 = m.row(3);
        let plane = |v: glam::Vec4| Plane::from_coefficients(v.x, v.y, v.z, v.w);
        Self {
            planes: [
                plane(r3 + r0), // left
                plane(r3 - r0), // right
                plane(r3 + r1), // bottom
                plane(r3 - r1), // top
                plane(r2),      // near
                plane(r3 - r2), // far
            ],
        }
    }

    /// A frustum that accepts every sphere. Useful for editor overviews and
    /// tests.
    pub fn everything() -> Self {
        Self {
            planes: [Plane {
                normal: Vec3::ZERO,
                d: 1.0,
            }; 6],
        }
    }

    /// Conservative sphere test: false only when fully outside some plane.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|p| p.signed_distance(center) >= -radius)
    }
}

/// Camera state the per-frame decal update needs.
#[derive(Debug, Clone, Copy)]
pub struct ViewInfo {
    pub camera_position: Vec3,
    pub frustum: Frustum,
    /// `viewport_height_px / (2 * tan(fov_y / 2))`; multiply by
    /// world-radius-over-distance to get on-screen pixel radius.
    pub pixel_scale: f32,
}

impl ViewInfo {
    pub fn new(
        camera_position: Vec3,
        view_projection: &Mat4,
        fov_y_radians: f32,
        viewport_height_px: f32,
    ) -> Self {
        Self {
            camera_position,
            frustum: Frustum::from_view_projection(view_projection),
            pixel_scale: viewport_height_px / (2.0 * (fov_y_radians * 0.5).tan()),
        }
    }

    /// On-screen pixel radius of a sphere of `world_radius` at `position`.
    pub fn projected_pixel_radius(&self, position: Vec3, world_radius: f32) -> f32 {
        let distance = self.camera_position.distance(position).max(0.01);
        world_radius * self.pixel_scale / distance
    }
}
