//! Owner of all bins and instance storage for one loaded level.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

use glam::Vec3;
use log::debug;

use crate::bin::{DecalBin, GROW_MARGIN, MAX_BIN_RADIUS, PLACEMENT_TOLERANCE};
use crate::error::DecalFileError;
use crate::format;
use crate::instance::{DecalFlags, DecalInstance};
use crate::pool::{DecalHandle, InstancePool};
use crate::template::TemplateSource;

/// The set of decal bins and the pooled instance storage behind them.
///
/// Every live instance belongs to exactly one bin; no bin is ever empty.
/// The dirty flag tracks whether any `SAVE`-flagged instance has been
/// added, removed, or modified since the last write.
#[derive(Debug, Default)]
pub struct DecalStore {
    bins: Vec<DecalBin>,
    pool: InstancePool,
    dirty: bool,
}

impl DecalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bins(&self) -> &[DecalBin] {
        &self.bins
    }

    pub fn pool(&self) -> &InstancePool {
        &self.pool
    }

    pub fn get(&self, handle: DecalHandle) -> Option<&DecalInstance> {
        self.pool.get(handle)
    }

    pub fn get_mut(&mut self, handle: DecalHandle) -> Option<&mut DecalInstance> {
        self.pool.get_mut(handle)
    }

    pub fn decal_count(&self) -> usize {
        self.pool.len()
    }

    /// Whether unsaved `SAVE`-flagged changes exist.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Store an instance and place it into a bin.
    pub fn add_decal(&mut self, instance: DecalInstance) -> DecalHandle {
        if instance.flags.contains(DecalFlags::SAVE) {
            self.dirty = true;
        }
        let position = instance.position;
        let size = instance.size;
        let handle = self.pool.insert(instance);
        self.place(handle, position, size);
        handle
    }

    /// Remove an instance: linear scan for the owning bin, erase the
    /// membership (deleting the bin when emptied), free the pooled slot.
    /// Returns the freed instance, `None` for stale handles.
    pub fn remove_decal(&mut self, handle: DecalHandle) -> Option<DecalInstance> {
        let owner = self
            .bins
            .iter()
            .position(|bin| bin.decals().contains(&handle))?;
        if self.bins[owner].remove(handle, &self.pool) {
            self.bins.remove(owner);
            debug!("decal bin {owner} emptied and deleted");
        }
        let instance = self.pool.free(handle)?;
        if instance.flags.contains(DecalFlags::SAVE) {
            self.dirty = true;
        }
        Some(instance)
    }

    /// Rebin a repositioned or resized instance. Always a full
    /// remove-then-place; there is no fast path for small moves.
    pub fn notify_decal_modified(&mut self, handle: DecalHandle) {
        let Some(instance) = self.pool.get(handle) else {
            return;
        };
        let position = instance.position;
        let size = instance.size;
        if instance.flags.contains(DecalFlags::SAVE) {
            self.dirty = true;
        }
        if let Some(owner) = self
            .bins
            .iter()
            .position(|bin| bin.decals().contains(&handle))
        {
            if self.bins[owner].remove(handle, &self.pool) {
                self.bins.remove(owner);
            }
        }
        self.place(handle, position, size);
    }

    /// Pick a bin for a decal and insert it, creating a new bin when no
    /// existing one qualifies.
    fn place(&mut self, handle: DecalHandle, position: Vec3, size: f32) {
        let chosen = self.select_bin(position, size);
        match chosen {
            Some(index) => {
                self.bins[index].add(handle, &self.pool);
            }
            None => {
                // Start with a minimal sphere at the decal; add() grows it
                // until the footprint is enclosed.
                let mut bin = DecalBin::new(position, 1.0);
                bin.add(handle, &self.pool);
                self.bins.push(bin);
            }
        }
    }

    /// Scan the bin list for a placement candidate.
    ///
    /// A bin strictly containing the point wins immediately. Otherwise the
    /// first bin within tolerance whose grown radius stays legal is kept.
    /// The "closest so far" comparand is the fixed tolerance constant and is
    /// never tightened after a candidate is found, so the scan is first-fit
    /// within tolerance rather than true nearest-bin selection. Kept
    /// deliberately: existing level files were binned this way.
    fn select_bin(&self, position: Vec3, size: f32) -> Option<usize> {
        let best_distance = PLACEMENT_TOLERANCE;
        let mut candidate: Option<usize> = None;
        for (i, bin) in self.bins.iter().enumerate() {
            let dist = bin.surface_distance(position);
            if dist > PLACEMENT_TOLERANCE {
                continue;
            }
            if dist < 0.0 {
                // Strictly inside; first match wins.
                return Some(i);
            }
            let grown = dist + bin.radius + GROW_MARGIN + size;
            if grown > MAX_BIN_RADIUS {
                continue;
            }
            if dist < best_distance && candidate.is_none() {
                candidate = Some(i);
            }
        }
        candidate
    }

    /// Drop all bins and instances.
    pub fn clear(&mut self) {
        self.bins.clear();
        self.pool.clear();
        self.dirty = false;
    }

    /// Write every `SAVE`-flagged instance to a binary decal file and clear
    /// the dirty flag.
    pub fn write(&mut self, path: impl AsRef<Path>) -> Result<(), DecalFileError> {
        let saved: Vec<&DecalInstance> = self
            .pool
            .iter()
            .filter(|(_, d)| d.flags.contains(DecalFlags::SAVE))
            .map(|(_, d)| d)
            .collect();
        let mut writer = BufWriter::new(File::create(path)?);
        format::write_tddf(&mut writer, &saved)?;
        self.dirty = false;
        Ok(())
    }

    /// Replace this store's contents with the decals from a stream.
    ///
    /// The header is validated before any state is cleared, so a bad magic
    /// or version leaves the store untouched. Records whose template name
    /// does not resolve are dropped with a warning. Loaded instances come
    /// back flagged `PERMANENT | SAVE | CLIP_PENDING` and pending clip.
    pub fn read<R: Read>(
        &mut self,
        reader: &mut R,
        templates: &dyn TemplateSource,
    ) -> Result<Vec<DecalHandle>, DecalFileError> {
        let records = format::read_tddf(reader, templates)?;
        self.clear();
        let mut handles = Vec::with_capacity(records.len());
        for record in records {
            let mut instance = DecalInstance::new(
                record.template,
                record.position,
                record.normal,
                record.tangent,
            );
            instance.size = record.size;
            instance.texture_rect_index = record.texture_rect_index;
            instance.render_priority = record.render_priority;
            instance.flags = DecalFlags::PERMANENT | DecalFlags::SAVE | DecalFlags::CLIP_PENDING;
            handles.push(self.add_decal(instance));
        }
        // A freshly loaded store matches the file on disk.
        self.dirty = false;
        Ok(handles)
    }

    /// Convenience wrapper: `read` from a file path.
    pub fn read_path(
        &mut self,
        path: impl AsRef<Path>,
        templates: &dyn TemplateSource,
    ) -> Result<Vec<DecalHandle>, DecalFileError> {
        let mut reader = BufReader::new(File::open(path)?);
        self.read(&mut reader, templates)
    }
}
