//! Error types for the decal subsystem.

use thiserror::Error;

/// Errors raised while reading or writing a binary decal file.
#[derive(Debug, Error)]
pub enum DecalFileError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad magic {0:02x?}, expected \"TDDF\"")]
    BadMagic([u8; 4]),

    #[error("unsupported decal file version {found}, expected {expected}")]
    UnsupportedVersion { found: u8, expected: u8 },

    #[error("template lookup name is not valid utf-8")]
    BadTemplateName,

    #[error("{0} templates exceed the u8 record index")]
    TooManyTemplates(usize),
}

/// Errors surfaced by decal manager operations.
#[derive(Debug, Error)]
pub enum DecalError {
    /// No decal store exists yet for the loaded level.
    #[error("no decal store is active")]
    NotInitialized,

    /// The id does not name a live decal.
    #[error("invalid decal id {0}")]
    InvalidId(u32),

    /// A template lookup name did not resolve.
    #[error("unknown decal template '{0}'")]
    MissingTemplate(String),

    #[error(transparent)]
    File(#[from] DecalFileError),
}
