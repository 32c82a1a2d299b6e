//! Decal clipping: projecting a footprint onto world geometry.
//!
//! The collision collaborator hands back polygons already clipped to the
//! footprint box; this module compacts them, triangulates, averages
//! normals, and maps the result into the decal's atlas rect with an
//! inverse bilinear projection of the footprint quad.

use decal_core::{DecalMesh, DecalVertex, SurfaceMask, Vec2, Vec3};

use crate::collision::{CollisionProvider, OrientedBox};

/// Everything the clipper needs from one decal.
#[derive(Debug, Clone, Copy)]
pub struct ClipRequest {
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub size: f32,
    /// Full extent along the projection normal; `None` uses `size`.
    pub depth_override: Option<f32>,
    pub mask: SurfaceMask,
    /// Atlas rect `[x, y, w, h]` the unit UVs are remapped into.
    pub atlas_rect: [f32; 4],
}

/// Build the oriented clipping volume from a decal's placement basis.
///
/// In-plane axes are the (re-orthonormalized) tangent and tangent × normal;
/// the third axis is the projection normal.
pub fn footprint_box(
    position: Vec3,
    normal: Vec3,
    tangent: Vec3,
    size: f32,
    depth_override: Option<f32>,
) -> OrientedBox {
    let normal = normal.normalize_or_zero();
    let mut tangent = tangent - normal * tangent.dot(normal);
    tangent = tangent.normalize_or_zero();
    if tangent == Vec3::ZERO {
        tangent = normal.any_orthonormal_vector();
    }
    let bitangent = tangent.cross(normal);
    let half = size * 0.5;
    let depth_half = depth_override.unwrap_or(size) * 0.5;
    OrientedBox {
        center: position,
        axes: [tangent, bitangent, normal],
        half_extents: Vec3::new(half, half, depth_half),
    }
}

/// Clip a decal against the world and write the mesh into `out`.
///
/// Returns `false` (with `out` cleared) when no surface intersects the
/// footprint. When `out_edges` is given it receives the ordered convex
/// outline of the clipped points, projected onto the decal plane.
pub fn clip_decal(
    provider: &dyn CollisionProvider,
    request: &ClipRequest,
    out: &mut DecalMesh,
    out_edges: Option<&mut Vec<Vec3>>,
) -> bool {
    out.clear();

    let bounds = footprint_box(
        request.position,
        request.normal,
        request.tangent,
        request.size,
        request.depth_override,
    );

    // Cheap broad check before the full poly-list query.
    let (min, max) = bounds.aabb();
    if provider.find_objects_in_bounds(min, max, request.mask).is_empty() {
        return false;
    }

    let soup = provider.build_poly_list(&bounds, request.mask);
    if soup.is_empty() {
        return false;
    }

    // Compact to the vertices the polygons actually reference.
    let mut remap: Vec<u32> = vec![u32::MAX; soup.positions.len()];
    let mut positions: Vec<Vec3> = Vec::new();
    for poly in &soup.polygons {
        for &i in &poly.indices {
            let slot = &mut remap[i as usize];
            if *slot == u32::MAX {
                *slot = positions.len() as u32;
                positions.push(soup.positions[i as usize]);
            }
        }
    }
    if positions.is_empty() || positions.len() > u16::MAX as usize {
        return false;
    }

    // Fan-triangulate each polygon, accumulating face normals per vertex.
    let mut normals: Vec<Vec3> = vec![Vec3::ZERO; positions.len()];
    let mut indices: Vec<u16> = Vec::new();
    for poly in &soup.polygons {
        if poly.indices.len() < 3 {
            continue;
        }
        let mapped: Vec<u16> = poly
            .indices
            .iter()
            .map(|&i| remap[i as usize] as u16)
            .collect();
        for k in 1..mapped.len() - 1 {
            indices.extend_from_slice(&[mapped[0], mapped[k], mapped[k + 1]]);
            for &v in &[mapped[0], mapped[k], mapped[k + 1]] {
                normals[v as usize] += poly.normal;
            }
        }
    }
    if indices.is_empty() {
        return false;
    }

    // Project everything onto the decal plane for UVs and the outline.
    let u_axis = bounds.axes[0];
    let v_axis = bounds.axes[1];
    let to_plane = |p: Vec3| {
        let local = p - bounds.center;
        Vec2::new(local.dot(u_axis), local.dot(v_axis))
    };

    let corners = order_quad_winding([
        to_plane(bounds.corner(0)),
        to_plane(bounds.corner(1)),
        to_plane(bounds.corner(3)),
        to_plane(bounds.corner(2)),
    ]);

    let [rx, ry, rw, rh] = request.atlas_rect;
    for (i, &position) in positions.iter().enumerate() {
        let normal = if normals[i].length_squared() > 1e-12 {
            normals[i].normalize()
        } else {
            bounds.axes[2]
        };
        let uv = inverse_bilinear(to_plane(position), corners)
            .clamp(Vec2::ZERO, Vec2::ONE);
        out.vertices.push(DecalVertex::new(
            position.to_array(),
            normal.to_array(),
            [rx + uv.x * rw, ry + uv.y * rh],
        ));
    }
    out.indices = indices;

    if let Some(edges) = out_edges {
        edges.clear();
        let projected: Vec<Vec2> = positions.iter().map(|&p| to_plane(p)).collect();
        for point in convex_hull(&projected) {
            edges.push(bounds.center + u_axis * point.x + v_axis * point.y);
        }
    }
    true
}

/// Order four footprint corners counter-clockwise by signed angle about
/// their centroid.
fn order_quad_winding(corners: [Vec2; 4]) -> [Vec2; 4] {
    let centroid = corners.iter().copied().sum::<Vec2>() / 4.0;
    let mut sorted = corners;
    sorted.sort_by(|a, b| {
        let aa = (*a - centroid).y.atan2((*a - centroid).x);
        let ab = (*b - centroid).y.atan2((*b - centroid).x);
        aa.partial_cmp(&ab).unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted
}

/// Map a point inside an ordered quad `[a, b, c, d]` back to unit-square
/// coordinates: `a` = (0,0), `b` = (1,0), `c` = (1,1), `d` = (0,1).
fn inverse_bilinear(p: Vec2, quad: [Vec2; 4]) -> Vec2 {
    let [a, b, c, d] = quad;
    let e = b - a;
    let f = d - a;
    let g = a - b + c - d;
    let h = p - a;

    let k2 = g.perp_dot(f);
    let k1 = e.perp_dot(f) + h.perp_dot(g);
    let k0 = h.perp_dot(e);

    let v = if k2.abs() < 1e-7 {
        // Parallelogram: linear in v.
        if k1.abs() < 1e-7 {
            0.0
        } else {
            -k0 / k1
        }
    } else {
        let w = k1 * k1 - 4.0 * k0 * k2;
        if w < 0.0 {
            return Vec2::new(-1.0, -1.0);
        }
        let w = w.sqrt();
        let v0 = (-k1 - w) / (2.0 * k2);
        if (0.0..=1.0).contains(&v0) {
            v0
        } else {
            (-k1 + w) / (2.0 * k2)
        }
    };

    let denom_x = e.x + g.x * v;
    let denom_y = e.y + g.y * v;
    let u = if denom_x.abs() >= denom_y.abs() && denom_x.abs() > 1e-7 {
        (h.x - f.x * v) / denom_x
    } else if denom_y.abs() > 1e-7 {
        (h.y - f.y * v) / denom_y
    } else {
        0.0
    };
    Vec2::new(u, v)
}

/// 2D convex hull, monotone chain. Returns counter-clockwise order without
/// repeating the first point.
pub fn convex_hull(points: &[Vec2]) -> Vec<Vec2> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut sorted: Vec<Vec2> = points.to_vec();
    sorted.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
    });
    sorted.dedup_by(|a, b| (*a - *b).length_squared() < 1e-12);
    if sorted.len() < 3 {
        return sorted;
    }

    let cross = |o: Vec2, a: Vec2, b: Vec2| (a - o).perp_dot(b - o);

    let mut lower: Vec<Vec2> = Vec::new();
    for &p in &sorted {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<Vec2> = Vec::new();
    for &p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}
