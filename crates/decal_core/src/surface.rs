//! Surface-type masks used to filter which world geometry decals clip against.

bitflags::bitflags! {
    /// World object categories a decal template may project onto.
    ///
    /// The collision collaborator filters its poly-list queries by this mask,
    /// so a scorch template can clip against terrain and static shapes while
    /// ignoring water surfaces.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[repr(transparent)]
    pub struct SurfaceMask: u32 {
        /// Static shapes (props, buildings).
        const STATIC_SHAPE = 1 << 0;
        /// Terrain patches.
        const TERRAIN = 1 << 1;
        /// Interior geometry.
        const INTERIOR = 1 << 2;
        /// Movable shapes.
        const DYNAMIC_SHAPE = 1 << 3;
        /// Water surfaces.
        const WATER = 1 << 4;

        /// Everything that never moves; the usual clip mask for decals.
        const STATIC_SURFACES = Self::STATIC_SHAPE.bits()
            | Self::TERRAIN.bits()
            | Self::INTERIOR.bits();
    }
}

impl Default for SurfaceMask {
    fn default() -> Self {
        Self::STATIC_SURFACES
    }
}
