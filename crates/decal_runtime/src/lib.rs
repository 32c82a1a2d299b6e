//! Per-level decal runtime: the manager façade plus its collaborators.
//!
//! Layered on top of `decal_core`:
//! - Collision capability traits the world backend implements
//! - The polygon clipper that projects footprints onto world geometry
//! - View culling and LOD projection
//! - Mesh buffer pooling and the public id registry
//! - `DecalManager`, the single entry point callers hold

pub mod clip;
pub mod collision;
pub mod manager;
pub mod pools;
pub mod registry;
pub mod render;
pub mod view;

pub use collision::*;
pub use manager::*;
pub use pools::*;
pub use registry::*;
pub use render::*;
pub use view::*;

pub use decal_core;
