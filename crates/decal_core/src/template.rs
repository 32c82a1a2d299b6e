//! Shared decal templates: named appearance/lifetime/clip definitions.

use std::collections::HashMap;
use std::sync::Arc;

use crate::surface::SurfaceMask;

/// Opaque reference to a material owned by the out-of-scope material system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialId(pub u32);

/// Opaque reference to a texture owned by the out-of-scope material system.
/// Used for per-instance custom texture overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Shared, immutable-per-session definition for a class of decals.
///
/// Instances reference a template for base size, lifetime, atlas frames,
/// clip rules, and render priority. The `name` is the cross-reference key
/// in serialized decal files.
#[derive(Debug, Clone)]
pub struct DecalTemplate {
    /// Lookup name; the serialization cross-reference key.
    pub name: String,
    /// Base world size. Instance size = `size * scale` at placement.
    pub size: f32,
    /// Seconds before an ephemeral instance starts fading. 0 = never expires.
    pub lifespan: f32,
    /// Seconds over which an expiring instance fades to zero.
    pub fade_time: f32,
    /// Texture-atlas frame rectangles as `[x, y, w, h]` in atlas UV space.
    /// Empty means the whole texture is one frame.
    pub texture_rects: Vec<[f32; 4]>,
    /// Pick a pseudo-random frame at placement when no explicit index is given.
    pub randomize: bool,
    /// Which world surface types this template clips against.
    pub clip_mask: SurfaceMask,
    /// Render priority; higher sorts later within its save class.
    pub render_priority: u8,
    /// Material drawn with.
    pub material: MaterialId,
    /// On-screen pixel radius at which LOD fading begins.
    pub fade_start_pixel_radius: f32,
    /// On-screen pixel radius below which instances are culled entirely.
    pub fade_end_pixel_radius: f32,
}

impl Default for DecalTemplate {
    fn default() -> Self {
        Self {
            name: String::new(),
            size: 1.0,
            lifespan: 10.0,
            fade_time: 1.0,
            texture_rects: Vec::new(),
            randomize: false,
            clip_mask: SurfaceMask::default(),
            render_priority: 0,
            material: MaterialId(0),
            fade_start_pixel_radius: 20.0,
            fade_end_pixel_radius: 2.0,
        }
    }
}

impl DecalTemplate {
    /// Create a template with the given lookup name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Fill the rect table from a uniform rows × cols atlas grid.
    pub fn with_grid(mut self, rows: u32, cols: u32) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        let w = 1.0 / cols as f32;
        let h = 1.0 / rows as f32;
        self.texture_rects.clear();
        for row in 0..rows {
            for col in 0..cols {
                self.texture_rects
                    .push([col as f32 * w, row as f32 * h, w, h]);
            }
        }
        self
    }

    /// Number of atlas frames in the rect table.
    pub fn frame_count(&self) -> u32 {
        self.texture_rects.len() as u32
    }

    /// Atlas rect for a frame index, clamped to the table. An empty table
    /// maps every index to the full texture.
    pub fn rect_for_frame(&self, frame: u32) -> [f32; 4] {
        if self.texture_rects.is_empty() {
            return [0.0, 0.0, 1.0, 1.0];
        }
        let last = self.texture_rects.len() - 1;
        self.texture_rects[(frame as usize).min(last)]
    }
}

/// Resolves template lookup names; implemented by whatever owns the
/// session's template definitions (game data, editor, tests).
pub trait TemplateSource {
    fn find_template(&self, name: &str) -> Option<Arc<DecalTemplate>>;
}

/// Simple name → template map; the usual `TemplateSource` implementation.
#[derive(Debug, Default)]
pub struct TemplateSet {
    by_name: HashMap<String, Arc<DecalTemplate>>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template under its lookup name, replacing any previous
    /// entry with the same name.
    pub fn insert(&mut self, template: DecalTemplate) -> Arc<DecalTemplate> {
        let shared = Arc::new(template);
        self.by_name.insert(shared.name.clone(), shared.clone());
        shared
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl TemplateSource for TemplateSet {
    fn find_template(&self, name: &str) -> Option<Arc<DecalTemplate>> {
        self.by_name.get(name).cloned()
    }
}
