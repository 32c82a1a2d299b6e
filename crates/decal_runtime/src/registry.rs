//! Stable public ids for placed decals.

use decal_core::{DecalHandle, DecalId};

/// Maps monotonic `DecalId`s to live pool handles.
///
/// Ids are assigned by insertion order and never reused; removing a decal
/// leaves a `None` hole at its slot. External layers can therefore hold an
/// id indefinitely and at worst observe "gone", never a different decal.
#[derive(Debug, Default)]
pub struct DecalRegistry {
    slots: Vec<Option<DecalHandle>>,
}

impl DecalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle under the next id.
    pub fn insert(&mut self, handle: DecalHandle) -> DecalId {
        let id = DecalId(self.slots.len() as u32);
        self.slots.push(Some(handle));
        id
    }

    pub fn get(&self, id: DecalId) -> Option<DecalHandle> {
        self.slots.get(id.0 as usize).copied().flatten()
    }

    /// Null the slot, returning the handle it held.
    pub fn remove(&mut self, id: DecalId) -> Option<DecalHandle> {
        self.slots.get_mut(id.0 as usize).and_then(Option::take)
    }

    /// Enumerate live entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (DecalId, DecalHandle)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.map(|h| (DecalId(i as u32), h)))
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Forget everything; ids restart from zero (level reload).
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decal_core::{DecalInstance, DecalTemplate, InstancePool, Vec3};
    use std::sync::Arc;

    fn handle(pool: &mut InstancePool) -> DecalHandle {
        pool.insert(DecalInstance::new(
            Arc::new(DecalTemplate::named("t")),
            Vec3::ZERO,
            Vec3::Z,
            Vec3::X,
        ))
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut pool = InstancePool::new();
        let mut registry = DecalRegistry::new();
        let a = registry.insert(handle(&mut pool));
        let b = registry.insert(handle(&mut pool));
        assert_eq!(a, DecalId(0));
        assert_eq!(b, DecalId(1));
        registry.remove(a);
        let c = registry.insert(handle(&mut pool));
        assert_eq!(c, DecalId(2));
        assert!(registry.get(a).is_none());
    }

    #[test]
    fn iter_skips_holes() {
        let mut pool = InstancePool::new();
        let mut registry = DecalRegistry::new();
        let a = registry.insert(handle(&mut pool));
        let _b = registry.insert(handle(&mut pool));
        registry.remove(a);
        let ids: Vec<DecalId> = registry.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![DecalId(1)]);
        assert_eq!(registry.live_count(), 1);
    }
}
