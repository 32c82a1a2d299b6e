//! Pooled instance storage with generation-checked handles.

use crate::instance::DecalInstance;

/// Handle into an [`InstancePool`] slot.
///
/// Carries the slot's generation so a handle kept past `free` misses
/// instead of aliasing whatever reuses the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecalHandle {
    index: u32,
    generation: u32,
}

impl DecalHandle {
    pub fn index(&self) -> u32 {
        self.index
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    value: Option<DecalInstance>,
}

/// Slab of decal instances with a free list.
///
/// Freed slots keep their allocation and are reused in LIFO order; each
/// reuse bumps the slot generation.
#[derive(Debug, Default)]
pub struct InstancePool {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl InstancePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an instance and return its handle.
    pub fn insert(&mut self, instance: DecalInstance) -> DecalHandle {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(instance);
            DecalHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                value: Some(instance),
            });
            DecalHandle {
                index,
                generation: 0,
            }
        }
    }

    /// Release a slot, returning the instance it held. Stale handles return
    /// `None` and leave the pool untouched.
    pub fn free(&mut self, handle: DecalHandle) -> Option<DecalInstance> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation || slot.value.is_none() {
            return None;
        }
        let value = slot.value.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        value
    }

    pub fn get(&self, handle: DecalHandle) -> Option<&DecalInstance> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, handle: DecalHandle) -> Option<&mut DecalInstance> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Iterate all live instances with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (DecalHandle, &DecalInstance)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value.as_ref().map(|v| {
                (
                    DecalHandle {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    v,
                )
            })
        })
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Drop every instance and reset the free list.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.live = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::DecalTemplate;
    use glam::Vec3;
    use std::sync::Arc;

    fn instance() -> DecalInstance {
        DecalInstance::new(
            Arc::new(DecalTemplate::named("t")),
            Vec3::ZERO,
            Vec3::Z,
            Vec3::X,
        )
    }

    #[test]
    fn insert_free_reuses_slot_with_new_generation() {
        let mut pool = InstancePool::new();
        let a = pool.insert(instance());
        assert!(pool.free(a).is_some());
        let b = pool.insert(instance());
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn stale_handle_misses() {
        let mut pool = InstancePool::new();
        let a = pool.insert(instance());
        pool.free(a);
        let _b = pool.insert(instance());
        assert!(pool.get(a).is_none());
        assert!(pool.free(a).is_none());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn iter_skips_freed_slots() {
        let mut pool = InstancePool::new();
        let a = pool.insert(instance());
        let _b = pool.insert(instance());
        pool.free(a);
        assert_eq!(pool.iter().count(), 1);
    }
}
