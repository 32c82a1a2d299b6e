//! Core decal data model and persistence.
//!
//! This crate owns the pieces below the per-level manager:
//! - Instance and template records
//! - Bounding-sphere bins and the binning store
//! - Pooled instance storage with generation-checked handles
//! - The binary "TDDF" decal file format

pub mod bin;
pub mod error;
pub mod format;
pub mod instance;
pub mod mesh;
pub mod pool;
pub mod store;
pub mod surface;
pub mod template;

pub use bin::*;
pub use error::*;
pub use instance::*;
pub use mesh::*;
pub use pool::*;
pub use store::*;
pub use surface::*;
pub use template::*;

// Re-export commonly used math types
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
