//! Binary decal file format ("TDDF", version 5).
//!
//! Little-endian layout:
//!
//! ```text
//! magic          4 bytes  ASCII "TDDF"
//! version        u8       must equal VERSION
//! templateCount  u32
//! templateCount  lookup names, each u32 length + utf-8 bytes
//! instanceCount  u32
//! instanceCount  records:
//!     templateIndex   u8
//!     position        3 x f32
//!     normal          3 x f32
//!     tangent         3 x f32
//!     textureRectIdx  u32
//!     size            f32
//!     renderPriority  u8
//! ```
//!
//! A bad magic or version aborts the whole load before any state changes.
//! A record whose template name does not resolve is logged and dropped;
//! the rest of the file still loads.

use std::io::{Read, Write};
use std::sync::Arc;

use glam::Vec3;
use log::warn;

use crate::error::DecalFileError;
use crate::instance::DecalInstance;
use crate::template::{DecalTemplate, TemplateSource};

/// File magic.
pub const MAGIC: [u8; 4] = *b"TDDF";

/// Current (and only supported) format version.
pub const VERSION: u8 = 5;

/// One decoded instance record with its template already resolved.
#[derive(Debug, Clone)]
pub struct DecalRecord {
    pub template: Arc<DecalTemplate>,
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub texture_rect_index: u32,
    pub size: f32,
    pub render_priority: u8,
}

/// Serialize the given instances. The template name table is built in
/// first-use order; indices in the records point into it.
pub fn write_tddf<W: Write>(
    writer: &mut W,
    decals: &[&DecalInstance],
) -> Result<(), DecalFileError> {
    let mut names: Vec<&str> = Vec::new();
    let mut indices: Vec<usize> = Vec::with_capacity(decals.len());
    for decal in decals {
        let name = decal.template.name.as_str();
        let index = match names.iter().position(|&n| n == name) {
            Some(i) => i,
            None => {
                names.push(name);
                names.len() - 1
            }
        };
        indices.push(index);
    }
    if names.len() > u8::MAX as usize + 1 {
        return Err(DecalFileError::TooManyTemplates(names.len()));
    }

    writer.write_all(&MAGIC)?;
    writer.write_all(&[VERSION])?;
    write_u32(writer, names.len() as u32)?;
    for name in &names {
        write_string(writer, name)?;
    }
    write_u32(writer, decals.len() as u32)?;
    for (decal, &template_index) in decals.iter().zip(&indices) {
        writer.write_all(&[template_index as u8])?;
        write_vec3(writer, decal.position)?;
        write_vec3(writer, decal.normal)?;
        write_vec3(writer, decal.tangent)?;
        write_u32(writer, decal.texture_rect_index)?;
        write_f32(writer, decal.size)?;
        writer.write_all(&[decal.render_priority])?;
    }
    Ok(())
}

/// Parse a decal file, resolving template names through `templates`.
///
/// Records referencing an unresolved or out-of-range template are dropped
/// with a warning; the remaining records are returned in file order.
pub fn read_tddf<R: Read>(
    reader: &mut R,
    templates: &dyn TemplateSource,
) -> Result<Vec<DecalRecord>, DecalFileError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(DecalFileError::BadMagic(magic));
    }
    let version = read_u8(reader)?;
    if version != VERSION {
        return Err(DecalFileError::UnsupportedVersion {
            found: version,
            expected: VERSION,
        });
    }

    let template_count = read_u32(reader)? as usize;
    let mut resolved: Vec<Option<Arc<DecalTemplate>>> = Vec::with_capacity(template_count);
    for _ in 0..template_count {
        let name = read_string(reader)?;
        let template = templates.find_template(&name);
        if template.is_none() {
            warn!("decal file references unknown template '{name}'; its records will be dropped");
        }
        resolved.push(template);
    }

    let instance_count = read_u32(reader)? as usize;
    let mut records = Vec::with_capacity(instance_count);
    for _ in 0..instance_count {
        let template_index = read_u8(reader)? as usize;
        let position = read_vec3(reader)?;
        let normal = read_vec3(reader)?;
        let tangent = read_vec3(reader)?;
        let texture_rect_index = read_u32(reader)?;
        let size = read_f32(reader)?;
        let render_priority = read_u8(reader)?;

        let template = match resolved.get(template_index) {
            Some(Some(t)) => t.clone(),
            Some(None) => continue, // already warned at the name table
            None => {
                warn!("decal record has out-of-range template index {template_index}; dropped");
                continue;
            }
        };
        records.push(DecalRecord {
            template,
            position,
            normal,
            tangent,
            texture_rect_index,
            size,
            render_priority,
        });
    }
    Ok(records)
}

fn write_u32<W: Write>(w: &mut W, v: u32) -> std::io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_f32<W: Write>(w: &mut W, v: f32) -> std::io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_vec3<W: Write>(w: &mut W, v: Vec3) -> std::io::Result<()> {
    write_f32(w, v.x)?;
    write_f32(w, v.y)?;
    write_f32(w, v.z)
}

fn write_string<W: Write>(w: &mut W, s: &str) -> std::io::Result<()> {
    write_u32(w, s.len() as u32)?;
    w.write_all(s.as_bytes())
}

fn read_u8<R: Read>(r: &mut R) -> std::io::Result<u8> {
    let mut b = [0u8; 1];
    r.read_exact(&mut b)?;
    Ok(b[0])
}

fn read_u32<R: Read>(r: &mut R) -> std::io::Result<u32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}

fn read_f32<R: Read>(r: &mut R) -> std::io::Result<f32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(f32::from_le_bytes(b))
}

fn read_vec3<R: Read>(r: &mut R) -> std::io::Result<Vec3> {
    Ok(Vec3::new(read_f32(r)?, read_f32(r)?, read_f32(r)?))
}

fn read_string<R: Read>(r: &mut R) -> Result<String, DecalFileError> {
    let len = read_u32(r)? as usize;
    let mut bytes = vec![0u8; len];
    r.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| DecalFileError::BadTemplateName)
}
