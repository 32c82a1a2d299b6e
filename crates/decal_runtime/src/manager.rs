//! Per-level decal façade: placement, queries, persistence, and the
//! per-frame cull/fade/clip/batch pipeline.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use decal_core::{
    DecalError, DecalFlags, DecalHandle, DecalId, DecalInstance, DecalMesh, DecalStore,
    DecalTemplate, MaterialId, Quat, TemplateSource, TextureId, Vec3,
};
use rand::prelude::*;

use crate::clip::{self, ClipRequest};
use crate::collision::CollisionProvider;
use crate::pools::MeshBufferPool;
use crate::registry::DecalRegistry;
use crate::render::{RenderInstance, RenderSink};
use crate::view::ViewInfo;

/// Vertex budget of one render batch.
pub const MAX_BATCH_VERTS: usize = 4096;
/// Index budget of one render batch.
pub const MAX_BATCH_INDICES: usize = 6144;

/// Snapshot of one queued decal for sorting and batching.
#[derive(Debug, Clone, Copy)]
struct RenderCandidate {
    handle: DecalHandle,
    position: Vec3,
    save: bool,
    priority: u8,
    material: MaterialId,
    custom_texture: Option<TextureId>,
    creation_time: f32,
    vertex_count: usize,
    index_count: usize,
}

/// Queue order contract: saved decals first, then render priority, then
/// (within saved) material identity, then creation time. Stable sort keeps
/// insertion order for full ties.
fn render_order(a: &RenderCandidate, b: &RenderCandidate) -> Ordering {
    b.save
        .cmp(&a.save)
        .then(a.priority.cmp(&b.priority))
        .then_with(|| {
            if a.save && b.save {
                a.material.cmp(&b.material)
            } else {
                Ordering::Equal
            }
        })
        .then(
            a.creation_time
                .partial_cmp(&b.creation_time)
                .unwrap_or(Ordering::Equal),
        )
}

/// Owns the active level's decal store and everything per-frame: the
/// registry of public ids, the mesh buffer pools, the scratch render
/// queue, and the transient batch buffers the render collaborator borrows.
///
/// Single-threaded by design; all mutation happens inside synchronous
/// calls on the main/render thread.
pub struct DecalManager {
    store: Option<DecalStore>,
    registry: DecalRegistry,
    pools: MeshBufferPool,
    rng: StdRng,
    /// Scratch render queue, rebuilt every frame.
    queue: Vec<RenderCandidate>,
    /// Batch buffers submitted last frame; kept alive until the next
    /// update so the render collaborator only ever borrows them.
    frame_meshes: Vec<DecalMesh>,
    clip_scratch: DecalMesh,
}

impl Default for DecalManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DecalManager {
    pub fn new() -> Self {
        Self {
            store: None,
            registry: DecalRegistry::new(),
            pools: MeshBufferPool::new(),
            rng: StdRng::from_entropy(),
            queue: Vec::new(),
            frame_meshes: Vec::new(),
            clip_scratch: DecalMesh::new(),
        }
    }

    /// The active store, if any decal has been placed or loaded.
    pub fn store(&self) -> Option<&DecalStore> {
        self.store.as_ref()
    }

    /// Whether unsaved editor changes exist.
    pub fn is_dirty(&self) -> bool {
        self.store.as_ref().is_some_and(DecalStore::is_dirty)
    }

    pub fn decal_count(&self) -> usize {
        self.store.as_ref().map_or(0, DecalStore::decal_count)
    }

    /// Place a decal with its in-plane orientation given as a rotation
    /// angle (radians) about the projection normal.
    #[allow(clippy::too_many_arguments)]
    pub fn add_decal(
        &mut self,
        position: Vec3,
        normal: Vec3,
        rotation: f32,
        template: &Arc<DecalTemplate>,
        scale: f32,
        tex_index: Option<u32>,
        flags: DecalFlags,
        now: f32,
    ) -> DecalId {
        let normal = normal.normalize_or_zero();
        let tangent = Quat::from_axis_angle(normal, rotation) * normal.any_orthonormal_vector();
        self.add_decal_with_tangent(position, normal, tangent, template, scale, tex_index, flags, now)
    }

    /// Place a decal with an explicit tangent (editor path).
    #[allow(clippy::too_many_arguments)]
    pub fn add_decal_with_tangent(
        &mut self,
        position: Vec3,
        normal: Vec3,
        tangent: Vec3,
        template: &Arc<DecalTemplate>,
        scale: f32,
        tex_index: Option<u32>,
        flags: DecalFlags,
        now: f32,
    ) -> DecalId {
        let frame = match tex_index {
            Some(index) => index,
            None if template.randomize => self.rng.gen::<u32>() % (template.frame_count() + 1),
            None => 0,
        };
        let mut instance =
            DecalInstance::new(template.clone(), position, normal.normalize_or_zero(), tangent);
        instance.size = template.size * scale;
        instance.texture_rect_index = frame;
        instance.creation_time = now;
        instance.flags = flags | DecalFlags::CLIP_PENDING;

        let store = self.store.get_or_insert_with(DecalStore::new);
        let handle = store.add_decal(instance);
        let id = self.registry.insert(handle);
        if let Some(decal) = store.get_mut(handle) {
            decal.id = id;
        }
        id
    }

    /// Scripting entry point: resolve the template by lookup name first.
    #[allow(clippy::too_many_arguments)]
    pub fn add_decal_by_name(
        &mut self,
        templates: &dyn TemplateSource,
        name: &str,
        position: Vec3,
        normal: Vec3,
        rotation: f32,
        scale: f32,
        flags: DecalFlags,
        now: f32,
    ) -> Result<DecalId, DecalError> {
        let template = templates
            .find_template(name)
            .ok_or_else(|| DecalError::MissingTemplate(name.to_owned()))?;
        Ok(self.add_decal(position, normal, rotation, &template, scale, None, flags, now))
    }

    /// Remove a decal: null its registry slot, recycle its mesh buffer,
    /// and erase it from its bin.
    pub fn remove_decal(&mut self, id: DecalId) -> Result<(), DecalError> {
        let handle = self
            .registry
            .remove(id)
            .ok_or(DecalError::InvalidId(id.0))?;
        let store = self.store.as_mut().ok_or(DecalError::NotInitialized)?;
        if let Some(mut instance) = store.remove_decal(handle) {
            if let Some(mesh) = instance.mesh.take() {
                self.pools.recycle(mesh);
            }
        }
        Ok(())
    }

    /// Re-arm clipping and rebin after a reposition or resize.
    pub fn notify_decal_modified(&mut self, id: DecalId) -> Result<(), DecalError> {
        let handle = self.registry.get(id).ok_or(DecalError::InvalidId(id.0))?;
        let store = self.store.as_mut().ok_or(DecalError::NotInitialized)?;
        if let Some(decal) = store.get_mut(handle) {
            decal.flags.insert(DecalFlags::CLIP_PENDING);
        }
        store.notify_decal_modified(handle);
        Ok(())
    }

    pub fn get(&self, id: DecalId) -> Option<&DecalInstance> {
        let store = self.store.as_ref()?;
        store.get(self.registry.get(id)?)
    }

    /// Mutable access for editor drags; call [`Self::notify_decal_modified`]
    /// afterwards so binning and clipping catch up.
    pub fn get_mut(&mut self, id: DecalId) -> Option<&mut DecalInstance> {
        let store = self.store.as_mut()?;
        store.get_mut(self.registry.get(id)?)
    }

    /// Enumerate live decals in stable id order.
    pub fn iter(&self) -> impl Iterator<Item = (DecalId, &DecalInstance)> {
        self.registry.iter().filter_map(move |(id, handle)| {
            self.store
                .as_ref()
                .and_then(|s| s.get(handle))
                .map(|d| (id, d))
        })
    }

    /// Write the level's saved decals to `path`.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), DecalError> {
        let store = self.store.as_mut().ok_or(DecalError::NotInitialized)?;
        store.write(path)?;
        Ok(())
    }

    /// Replace the level's decals with the contents of `path`. Existing
    /// registry ids are discarded; loaded decals get fresh ids.
    pub fn load(
        &mut self,
        path: impl AsRef<Path>,
        templates: &dyn TemplateSource,
    ) -> Result<(), DecalError> {
        let store = self.store.get_or_insert_with(DecalStore::new);
        let handles = store.read_path(path, templates)?;
        self.registry.clear();
        for handle in handles {
            let id = self.registry.insert(handle);
            if let Some(decal) = store.get_mut(handle) {
                decal.id = id;
            }
        }
        Ok(())
    }

    /// Pick the decal nearest the ray origin whose footprint contains the
    /// rendered-geometry hit point. `saved_only` restricts to editor decals.
    pub fn raycast(
        &self,
        provider: &dyn CollisionProvider,
        start: Vec3,
        end: Vec3,
        saved_only: bool,
    ) -> Option<DecalId> {
        let store = self.store.as_ref()?;
        let hit = provider.cast_ray_rendered(start, end)?;
        let mut best: Option<(f32, DecalId)> = None;
        for bin in store.bins() {
            if !segment_intersects_sphere(start, end, bin.center, bin.radius) {
                continue;
            }
            for &handle in bin.decals() {
                let Some(decal) = store.get(handle) else { continue };
                if saved_only && !decal.flags.contains(DecalFlags::SAVE) {
                    continue;
                }
                if !segment_intersects_sphere(start, end, decal.position, decal.size) {
                    continue;
                }
                let footprint = clip::footprint_box(
                    decal.position,
                    decal.normal,
                    decal.tangent,
                    decal.size,
                    None,
                );
                if !footprint.contains(hit.point) {
                    continue;
                }
                let distance = start.distance(decal.position);
                if best.map_or(true, |(d, _)| distance < d) {
                    best = Some((distance, decal.id));
                }
            }
        }
        best.map(|(_, id)| id)
    }

    /// Nearest decal whose bounding sphere contains `position`.
    pub fn closest_decal(&self, position: Vec3) -> Option<DecalId> {
        let store = self.store.as_ref()?;
        let mut best: Option<(f32, DecalId)> = None;
        for bin in store.bins() {
            if bin.surface_distance(position) > 0.0 {
                continue;
            }
            for &handle in bin.decals() {
                let Some(decal) = store.get(handle) else { continue };
                let distance = decal.position.distance(position);
                if distance <= decal.size && best.map_or(true, |(d, _)| distance < d) {
                    best = Some((distance, decal.id));
                }
            }
        }
        best.map(|(_, id)| id)
    }

    /// Ordered convex outline of a decal's clipped footprint, for editor
    /// selection display.
    pub fn decal_outline(
        &mut self,
        provider: &dyn CollisionProvider,
        id: DecalId,
    ) -> Option<Vec<Vec3>> {
        let store = self.store.as_ref()?;
        let decal = store.get(self.registry.get(id)?)?;
        let request = ClipRequest {
            position: decal.position,
            normal: decal.normal,
            tangent: decal.tangent,
            size: decal.size,
            depth_override: None,
            mask: decal.template.clip_mask,
            atlas_rect: decal.template.rect_for_frame(decal.texture_rect_index),
        };
        let mut edges = Vec::new();
        if clip::clip_decal(provider, &request, &mut self.clip_scratch, Some(&mut edges)) {
            Some(edges)
        } else {
            None
        }
    }

    /// Per-frame pipeline, driven once per visible frame by the render
    /// pass: cull bins, fade, lazily clip, sort, batch, and submit.
    pub fn update(
        &mut self,
        provider: &dyn CollisionProvider,
        view: &ViewInfo,
        sink: &mut dyn RenderSink,
        now: f32,
    ) {
        for mesh in self.frame_meshes.drain(..) {
            self.pools.recycle(mesh);
        }
        self.queue.clear();
        let Some(store) = self.store.as_mut() else {
            return;
        };

        // 1. Frustum-cull bins and gather their members.
        let mut gathered: Vec<DecalHandle> = Vec::new();
        for bin in store.bins() {
            if view.frustum.intersects_sphere(bin.center, bin.radius) {
                gathered.extend_from_slice(bin.decals());
            }
        }

        let mut expired: Vec<DecalHandle> = Vec::new();

        for handle in gathered {
            let Some(decal) = store.get(handle) else { continue };
            let template = decal.template.clone();
            let position = decal.position;
            let normal = decal.normal;
            let tangent = decal.tangent;
            let size = decal.size;
            let rect_index = decal.texture_rect_index;
            let flags = decal.flags;
            let creation_time = decal.creation_time;
            let custom_texture = decal.custom_texture;
            let priority = decal.effective_priority();
            let mut visibility = decal.visibility;

            // 2. LOD: cull and fade by projected pixel radius.
            let pixel_radius = view.projected_pixel_radius(position, size);
            if template.fade_end_pixel_radius > 0.0
                && pixel_radius < template.fade_end_pixel_radius
            {
                continue;
            }
            let lod_fade = if template.fade_start_pixel_radius > template.fade_end_pixel_radius
                && pixel_radius < template.fade_start_pixel_radius
            {
                (pixel_radius - template.fade_end_pixel_radius)
                    / (template.fade_start_pixel_radius - template.fade_end_pixel_radius)
            } else {
                1.0
            };

            // 3. Time fade for ephemeral decals past their lifespan.
            let exempt = flags.intersects(DecalFlags::PERMANENT | DecalFlags::CUSTOM);
            if !exempt && template.lifespan > 0.0 {
                let age = now - creation_time;
                if age > template.lifespan {
                    let fade_time = template.fade_time.max(1e-3);
                    visibility = (1.0 - (age - template.lifespan) / fade_time).clamp(0.0, 1.0);
                    if visibility <= 0.0 {
                        expired.push(handle);
                        continue;
                    }
                    if let Some(decal) = store.get_mut(handle) {
                        decal.visibility = visibility;
                    }
                }
            }

            // 4. Lazy re-clip of stale geometry.
            if flags.contains(DecalFlags::CLIP_PENDING) {
                let request = ClipRequest {
                    position,
                    normal,
                    tangent,
                    size,
                    depth_override: None,
                    mask: template.clip_mask,
                    atlas_rect: template.rect_for_frame(rect_index),
                };
                let clipped =
                    clip::clip_decal(provider, &request, &mut self.clip_scratch, None);
                let Some(decal) = store.get_mut(handle) else { continue };
                if clipped {
                    let mut mesh = self.pools.allocate(
                        self.clip_scratch.vertices.len(),
                        self.clip_scratch.indices.len(),
                    );
                    mesh.vertices.extend_from_slice(&self.clip_scratch.vertices);
                    mesh.indices.extend_from_slice(&self.clip_scratch.indices);
                    if let Some(old) = decal.mesh.replace(mesh) {
                        self.pools.recycle(old);
                    }
                    decal.flags.remove(DecalFlags::CLIP_PENDING);
                } else if flags.contains(DecalFlags::SAVE) {
                    // Editor decals with no surface under them stay put;
                    // clearing the flag stops per-frame retry thrashing
                    // until the next modification re-arms it.
                    decal.flags.remove(DecalFlags::CLIP_PENDING);
                    continue;
                } else {
                    expired.push(handle);
                    continue;
                }
            }

            // 5/6. Skip geometry-less decals; stamp combined alpha into the
            // vertex colors.
            let alpha = lod_fade * visibility;
            let Some(decal) = store.get_mut(handle) else { continue };
            let Some(mesh) = decal.mesh.as_mut() else { continue };
            if mesh.is_empty() {
                continue;
            }
            for vertex in &mut mesh.vertices {
                vertex.color[3] = alpha;
            }

            self.queue.push(RenderCandidate {
                handle,
                position,
                save: flags.contains(DecalFlags::SAVE),
                priority,
                material: template.material,
                custom_texture,
                creation_time,
                vertex_count: mesh.vertices.len(),
                index_count: mesh.indices.len(),
            });
        }

        // Fully faded or unclippable ephemerals are gone for good.
        for handle in expired {
            if let Some(decal) = store.get(handle) {
                self.registry.remove(decal.id);
            }
            if let Some(mut instance) = store.remove_decal(handle) {
                if let Some(mesh) = instance.mesh.take() {
                    self.pools.recycle(mesh);
                }
            }
        }

        // 7. Sort; the comparator is the queue-order contract.
        self.queue.sort_by(render_order);

        // 8/9. Greedy batches over (material, priority, custom texture),
        // bounded by the vertex/index budgets.
        let mut start = 0;
        while start < self.queue.len() {
            let lead = self.queue[start];
            let mut end = start;
            let mut vertex_total = 0usize;
            let mut index_total = 0usize;
            let mut centroid = Vec3::ZERO;
            while end < self.queue.len() {
                let candidate = &self.queue[end];
                if candidate.material != lead.material
                    || candidate.priority != lead.priority
                    || candidate.custom_texture != lead.custom_texture
                {
                    break;
                }
                if end > start
                    && (vertex_total + candidate.vertex_count > MAX_BATCH_VERTS
                        || index_total + candidate.index_count > MAX_BATCH_INDICES)
                {
                    break;
                }
                vertex_total += candidate.vertex_count;
                index_total += candidate.index_count;
                centroid += candidate.position;
                end += 1;
            }

            let mut batch = self.pools.allocate(vertex_total, index_total);
            for candidate in &self.queue[start..end] {
                let Some(decal) = store.get(candidate.handle) else { continue };
                let Some(mesh) = decal.mesh.as_ref() else { continue };
                let base = batch.vertices.len() as u16;
                batch.vertices.extend_from_slice(&mesh.vertices);
                batch.indices.extend(mesh.indices.iter().map(|&i| i + base));
            }
            centroid /= (end - start) as f32;

            self.frame_meshes.push(batch);
            if let Some(buffer) = self.frame_meshes.last() {
                sink.submit(RenderInstance {
                    vertices: &buffer.vertices,
                    indices: &buffer.indices,
                    material: lead.material,
                    custom_texture: lead.custom_texture,
                    priority: lead.priority,
                    sort_distance: view.camera_position.distance(centroid),
                });
            }
            start = end;
        }
    }
}

/// Closest-point test between a segment and a sphere.
fn segment_intersects_sphere(start: Vec3, end: Vec3, center: Vec3, radius: f32) -> bool {
    let ab = end - start;
    let len_sq = ab.length_squared();
    let t = if len_sq > 1e-12 {
        ((center - start).dot(ab) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (start + ab * t).distance_squared(center) <= radius * radius
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{OrientedBox, PolySoup, Polygon, RaycastHit};
    use crate::view::Frustum;
    use decal_core::{SurfaceMask, TemplateSet};

    /// Infinite ground plane at y = 0.
    struct FlatGround;

    impl CollisionProvider for FlatGround {
        fn cast_ray(&self, start: Vec3, end: Vec3) -> Option<RaycastHit> {
            if (start.y > 0.0) == (end.y > 0.0) {
                return None;
            }
            let t = start.y / (start.y - end.y);
            Some(RaycastHit {
                point: start.lerp(end, t),
                normal: Vec3::Y,
                distance: start.distance(end) * t,
            })
        }

        fn cast_ray_rendered(&self, start: Vec3, end: Vec3) -> Option<RaycastHit> {
            self.cast_ray(start, end)
        }

        fn build_poly_list(&self, bounds: &OrientedBox, _mask: SurfaceMask) -> PolySoup {
            let (min, max) = bounds.aabb();
            if min.y > 0.0 || max.y < 0.0 {
                return PolySoup::default();
            }
            PolySoup {
                positions: vec![
                    Vec3::new(min.x, 0.0, min.z),
                    Vec3::new(max.x, 0.0, min.z),
                    Vec3::new(max.x, 0.0, max.z),
                    Vec3::new(min.x, 0.0, max.z),
                ],
                polygons: vec![Polygon {
                    normal: Vec3::Y,
                    indices: vec![0, 1, 2, 3],
                }],
            }
        }

        fn find_objects_in_bounds(&self, min: Vec3, max: Vec3, _mask: SurfaceMask) -> Vec<u32> {
            if min.y > 0.0 || max.y < 0.0 {
                Vec::new()
            } else {
                vec![1]
            }
        }
    }

    #[derive(Default)]
    struct CollectSink {
        batches: Vec<(usize, usize, MaterialId)>,
    }

    impl RenderSink for CollectSink {
        fn submit(&mut self, instance: RenderInstance<'_>) {
            self.batches.push((
                instance.vertices.len(),
                instance.indices.len(),
                instance.material,
            ));
        }
    }

    fn test_view() -> ViewInfo {
        ViewInfo {
            camera_position: Vec3::new(0.0, 10.0, 0.0),
            frustum: Frustum::everything(),
            pixel_scale: 1000.0,
        }
    }

    fn template(size: f32) -> Arc<DecalTemplate> {
        let mut t = DecalTemplate::named("test");
        t.size = size;
        Arc::new(t)
    }

    fn ground_decal(manager: &mut DecalManager, template: &Arc<DecalTemplate>, flags: DecalFlags) -> DecalId {
        manager.add_decal(Vec3::ZERO, Vec3::Y, 0.0, template, 1.0, None, flags, 0.0)
    }

    #[test]
    fn add_creates_one_bin_and_one_instance() {
        let mut manager = DecalManager::new();
        let t = template(2.0);
        let id = manager.add_decal(
            Vec3::ZERO,
            Vec3::Z,
            0.0,
            &t,
            1.0,
            None,
            DecalFlags::empty(),
            0.0,
        );
        assert_eq!(id, DecalId(0));
        let store = manager.store().unwrap();
        assert_eq!(store.bins().len(), 1);
        assert_eq!(store.decal_count(), 1);
        let decal = manager.get(id).unwrap();
        assert_eq!(decal.size, 2.0);
        assert_eq!(decal.id, id);
        assert!(decal.flags.contains(DecalFlags::CLIP_PENDING));
    }

    #[test]
    fn removing_sole_decal_deletes_its_bin() {
        let mut manager = DecalManager::new();
        let t = template(1.0);
        let id = ground_decal(&mut manager, &t, DecalFlags::empty());
        assert_eq!(manager.store().unwrap().bins().len(), 1);
        manager.remove_decal(id).unwrap();
        assert_eq!(manager.store().unwrap().bins().len(), 0);
        assert!(manager.get(id).is_none());
        assert!(matches!(
            manager.remove_decal(id),
            Err(DecalError::InvalidId(0))
        ));
    }

    #[test]
    fn empty_rect_table_always_selects_frame_zero() {
        let mut manager = DecalManager::new();
        let mut t = DecalTemplate::named("random");
        t.randomize = true;
        let t = Arc::new(t);
        for _ in 0..8 {
            let id = ground_decal(&mut manager, &t, DecalFlags::empty());
            assert_eq!(manager.get(id).unwrap().texture_rect_index, 0);
        }
    }

    #[test]
    fn raycast_outside_every_bin_misses() {
        let mut manager = DecalManager::new();
        let t = template(2.0);
        ground_decal(&mut manager, &t, DecalFlags::empty());
        let hit = manager.raycast(
            &FlatGround,
            Vec3::new(1000.0, 5.0, 0.0),
            Vec3::new(1000.0, -5.0, 0.0),
            false,
        );
        assert!(hit.is_none());
    }

    #[test]
    fn raycast_through_footprint_hits() {
        let mut manager = DecalManager::new();
        let t = template(2.0);
        let id = ground_decal(&mut manager, &t, DecalFlags::empty());
        let hit = manager.raycast(
            &FlatGround,
            Vec3::new(0.2, 5.0, 0.0),
            Vec3::new(0.2, -5.0, 0.0),
            false,
        );
        assert_eq!(hit, Some(id));
        // Same ray, but only saved decals wanted.
        let hit = manager.raycast(
            &FlatGround,
            Vec3::new(0.2, 5.0, 0.0),
            Vec3::new(0.2, -5.0, 0.0),
            true,
        );
        assert!(hit.is_none());
    }

    #[test]
    fn closest_decal_prefers_the_nearer_one() {
        let mut manager = DecalManager::new();
        let t = template(2.0);
        let a = manager.add_decal(Vec3::ZERO, Vec3::Y, 0.0, &t, 1.0, None, DecalFlags::empty(), 0.0);
        let b = manager.add_decal(
            Vec3::new(3.0, 0.0, 0.0),
            Vec3::Y,
            0.0,
            &t,
            1.0,
            None,
            DecalFlags::empty(),
            0.0,
        );
        assert_eq!(manager.closest_decal(Vec3::new(0.5, 0.0, 0.0)), Some(a));
        assert_eq!(manager.closest_decal(Vec3::new(2.8, 0.0, 0.0)), Some(b));
        assert!(manager.closest_decal(Vec3::new(500.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn update_clips_and_submits_one_batch() {
        let mut manager = DecalManager::new();
        let t = template(2.0);
        let id = ground_decal(&mut manager, &t, DecalFlags::empty());
        let mut sink = CollectSink::default();
        manager.update(&FlatGround, &test_view(), &mut sink, 0.0);
        assert_eq!(sink.batches.len(), 1);
        assert_eq!(sink.batches[0].0, 4);
        assert_eq!(sink.batches[0].1, 6);
        let decal = manager.get(id).unwrap();
        assert!(decal.has_geometry());
        assert!(!decal.flags.contains(DecalFlags::CLIP_PENDING));
    }

    #[test]
    fn same_material_decals_share_a_batch() {
        let mut manager = DecalManager::new();
        let t = template(2.0);
        let mut other = DecalTemplate::named("other");
        other.size = 2.0;
        other.material = MaterialId(9);
        let other = Arc::new(other);
        ground_decal(&mut manager, &t, DecalFlags::empty());
        manager.add_decal(
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::Y,
            0.0,
            &t,
            1.0,
            None,
            DecalFlags::empty(),
            0.0,
        );
        manager.add_decal(
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::Y,
            0.0,
            &other,
            1.0,
            None,
            DecalFlags::empty(),
            0.0,
        );
        let mut sink = CollectSink::default();
        manager.update(&FlatGround, &test_view(), &mut sink, 0.0);
        assert_eq!(sink.batches.len(), 2);
        assert_eq!(sink.batches[0], (8, 12, MaterialId(0)));
        assert_eq!(sink.batches[1], (4, 6, MaterialId(9)));
    }

    #[test]
    fn batches_split_at_the_vertex_budget() {
        let mut manager = DecalManager::new();
        let mut t = DecalTemplate::named("many");
        t.size = 2.0;
        t.lifespan = 0.0; // never expires
        let t = Arc::new(t);
        // Each ground quad is 4 vertices; one over a full batch's worth.
        let count = MAX_BATCH_VERTS / 4 + 1;
        for _ in 0..count {
            ground_decal(&mut manager, &t, DecalFlags::empty());
        }
        let mut sink = CollectSink::default();
        manager.update(&FlatGround, &test_view(), &mut sink, 0.0);
        assert_eq!(sink.batches.len(), 2);
        assert_eq!(sink.batches[0].0, MAX_BATCH_VERTS);
        assert_eq!(sink.batches[1].0, 4);
    }

    #[test]
    fn ephemeral_clip_failure_removes_the_decal() {
        let mut manager = DecalManager::new();
        let t = template(2.0);
        // Far above the ground: nothing to project onto.
        let id = manager.add_decal(
            Vec3::new(0.0, 50.0, 0.0),
            Vec3::Y,
            0.0,
            &t,
            1.0,
            None,
            DecalFlags::empty(),
            0.0,
        );
        let mut sink = CollectSink::default();
        manager.update(&FlatGround, &test_view(), &mut sink, 0.0);
        assert!(sink.batches.is_empty());
        assert!(manager.get(id).is_none());
        assert_eq!(manager.decal_count(), 0);
    }

    #[test]
    fn saved_clip_failure_skips_until_modified() {
        let mut manager = DecalManager::new();
        let t = template(2.0);
        let id = manager.add_decal(
            Vec3::new(0.0, 50.0, 0.0),
            Vec3::Y,
            0.0,
            &t,
            1.0,
            None,
            DecalFlags::SAVE,
            0.0,
        );
        let mut sink = CollectSink::default();
        manager.update(&FlatGround, &test_view(), &mut sink, 0.0);
        assert!(sink.batches.is_empty());
        let decal = manager.get(id).unwrap();
        assert!(!decal.flags.contains(DecalFlags::CLIP_PENDING));
        assert!(!decal.has_geometry());
        // Modification re-arms the clip.
        manager.notify_decal_modified(id).unwrap();
        assert!(manager
            .get(id)
            .unwrap()
            .flags
            .contains(DecalFlags::CLIP_PENDING));
    }

    #[test]
    fn permanent_decals_never_time_fade() {
        let mut manager = DecalManager::new();
        let mut t = DecalTemplate::named("perm");
        t.size = 2.0;
        t.lifespan = 1.0;
        t.fade_time = 1.0;
        let t = Arc::new(t);
        let id = ground_decal(&mut manager, &t, DecalFlags::PERMANENT);
        let mut sink = CollectSink::default();
        manager.update(&FlatGround, &test_view(), &mut sink, 1000.0);
        let decal = manager.get(id).unwrap();
        assert_eq!(decal.visibility, 1.0);
        assert_eq!(sink.batches.len(), 1);
    }

    #[test]
    fn ephemeral_decals_fade_then_expire() {
        let mut manager = DecalManager::new();
        let mut t = DecalTemplate::named("fleeting");
        t.size = 2.0;
        t.lifespan = 1.0;
        t.fade_time = 1.0;
        let t = Arc::new(t);
        let id = ground_decal(&mut manager, &t, DecalFlags::empty());

        let mut sink = CollectSink::default();
        manager.update(&FlatGround, &test_view(), &mut sink, 1.5);
        let decal = manager.get(id).unwrap();
        assert!((decal.visibility - 0.5).abs() < 1e-5);
        if let Some(mesh) = decal.mesh.as_ref() {
            assert!((mesh.vertices[0].color[3] - 0.5).abs() < 1e-5);
        }

        manager.update(&FlatGround, &test_view(), &mut sink, 3.0);
        assert!(manager.get(id).is_none());
        assert_eq!(manager.decal_count(), 0);
    }

    #[test]
    fn tiny_on_screen_decals_are_culled_but_kept() {
        let mut manager = DecalManager::new();
        let t = template(2.0);
        let id = ground_decal(&mut manager, &t, DecalFlags::empty());
        let view = ViewInfo {
            camera_position: Vec3::new(0.0, 10.0, 0.0),
            frustum: Frustum::everything(),
            // 2 world units at 10m project below the default end threshold.
            pixel_scale: 1.0,
        };
        let mut sink = CollectSink::default();
        manager.update(&FlatGround, &view, &mut sink, 0.0);
        assert!(sink.batches.is_empty());
        assert!(manager.get(id).is_some());
    }

    #[test]
    fn outline_is_available_for_editor_selection() {
        let mut manager = DecalManager::new();
        let t = template(2.0);
        let id = ground_decal(&mut manager, &t, DecalFlags::SAVE);
        let outline = manager.decal_outline(&FlatGround, id).unwrap();
        assert_eq!(outline.len(), 4);
    }

    #[test]
    fn save_then_load_round_trips_saved_decals() {
        let mut set = TemplateSet::new();
        let t = set.insert({
            let mut t = DecalTemplate::named("persisted");
            t.size = 2.0;
            t
        });

        let path = std::env::temp_dir().join(format!(
            "decal_roundtrip_{}.tddf",
            std::process::id()
        ));

        let mut manager = DecalManager::new();
        manager.add_decal(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::Y,
            0.0,
            &t,
            1.5,
            Some(0),
            DecalFlags::SAVE,
            0.0,
        );
        ground_decal(&mut manager, &t, DecalFlags::empty()); // not saved
        assert!(manager.is_dirty());
        manager.save(&path).unwrap();
        assert!(!manager.is_dirty());

        let mut loaded = DecalManager::new();
        loaded.load(&path, &set).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.decal_count(), 1);
        let (_, decal) = loaded.iter().next().unwrap();
        assert_eq!(decal.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(decal.size, 3.0);
        assert!(decal.flags.contains(
            DecalFlags::PERMANENT | DecalFlags::SAVE | DecalFlags::CLIP_PENDING
        ));
        assert!(!loaded.is_dirty());
    }

    #[test]
    fn queue_order_contract() {
        let mut pool = decal_core::InstancePool::new();
        let handle = pool.insert(DecalInstance::new(
            template(1.0),
            Vec3::ZERO,
            Vec3::Z,
            Vec3::X,
        ));
        let candidate = |save: bool, priority: u8, material: u32, creation: f32| RenderCandidate {
            handle,
            position: Vec3::ZERO,
            save,
            priority,
            material: MaterialId(material),
            custom_texture: None,
            creation_time: creation,
            vertex_count: 0,
            index_count: 0,
        };
        // Saved before unsaved.
        assert_eq!(
            render_order(&candidate(true, 0, 0, 0.0), &candidate(false, 0, 0, 0.0)),
            Ordering::Less
        );
        // Priority ascending.
        assert_eq!(
            render_order(&candidate(false, 1, 0, 0.0), &candidate(false, 2, 0, 0.0)),
            Ordering::Less
        );
        // Material breaks ties only among saved decals.
        assert_eq!(
            render_order(&candidate(true, 0, 1, 5.0), &candidate(true, 0, 2, 0.0)),
            Ordering::Less
        );
        assert_eq!(
            render_order(&candidate(false, 0, 1, 5.0), &candidate(false, 0, 2, 0.0)),
            Ordering::Greater
        );
        // Creation time ascending for full ties.
        assert_eq!(
            render_order(&candidate(false, 0, 0, 1.0), &candidate(false, 0, 0, 2.0)),
            Ordering::Less
        );
    }
}
