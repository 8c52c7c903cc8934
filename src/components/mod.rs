//! Physics component storage.
//!
//! Components live in generational arenas and are addressed by small copyable handles.
//! A handle whose slot was freed (or freed and reused) fails every lookup, which is how the
//! command queue tolerates objects destroyed between a request and its flush.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use crate::scene::GameObjectId;

pub mod collider;
pub mod rigid_body;

pub use collider::{
    ColliderChange, ColliderComponent, ColliderDesc, ColliderGeometry, CombineMode,
    DebugShapeDesc, GeometryKind, PhysicsMaterial, ShapeMode,
};
pub use rigid_body::{
    ForceMode, RigidBodyComponent, RigidDesc, RigidType, ShapeMass, TypeChangeRequest,
};

/// Generational slot handle.
pub trait SlotKey: Copy + Eq + Hash + fmt::Debug {
    fn from_parts(index: u32, generation: u32) -> Self;
    fn index(self) -> u32;
    fn generation(self) -> u32;
}

/// Declares a `(index, generation)` handle type usable as an [`Arena`] key.
macro_rules! slot_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            index: u32,
            generation: u32,
        }

        impl $crate::components::SlotKey for $name {
            #[inline]
            fn from_parts(index: u32, generation: u32) -> Self {
                Self { index, generation }
            }
            #[inline]
            fn index(self) -> u32 {
                self.index
            }
            #[inline]
            fn generation(self) -> u32 {
                self.generation
            }
        }

        impl $name {
            /// Packs the handle for Rapier `user_data`.
            #[inline]
            pub fn to_bits(self) -> u64 {
                ((self.generation as u64) << 32) | self.index as u64
            }

            #[inline]
            pub fn from_bits(bits: u64) -> Self {
                Self {
                    index: bits as u32,
                    generation: (bits >> 32) as u32,
                }
            }
        }
    };
}

pub(crate) use slot_key;

slot_key!(
    /// Handle to a [`RigidBodyComponent`].
    RigidId
);
slot_key!(
    /// Handle to a [`ColliderComponent`].
    ColliderId
);

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot arena with generation-checked access and free-list reuse.
pub struct Arena<K: SlotKey, T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
    _key: PhantomData<fn() -> K>,
}

impl<K: SlotKey, T> Default for Arena<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: SlotKey, T> Arena<K, T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            _key: PhantomData,
        }
    }

    pub fn insert(&mut self, value: T) -> K {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return K::from_parts(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        K::from_parts(index, 0)
    }

    pub fn remove(&mut self, key: K) -> Option<T> {
        let slot = self.slots.get_mut(key.index() as usize)?;
        if slot.generation != key.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index());
        self.len -= 1;
        Some(value)
    }

    #[inline]
    pub fn get(&self, key: K) -> Option<&T> {
        self.slots
            .get(key.index() as usize)
            .filter(|slot| slot.generation == key.generation())
            .and_then(|slot| slot.value.as_ref())
    }

    #[inline]
    pub fn get_mut(&mut self, key: K) -> Option<&mut T> {
        self.slots
            .get_mut(key.index() as usize)
            .filter(|slot| slot.generation == key.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    #[inline]
    pub fn contains(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value
                .as_ref()
                .map(|v| (K::from_parts(i as u32, slot.generation), v))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, slot)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(move |v| (K::from_parts(i as u32, generation), v))
        })
    }

    pub fn keys(&self) -> Vec<K> {
        self.iter().map(|(k, _)| k).collect()
    }
}

/// Every physics component the manager owns, split so the scene can borrow both kinds at once.
#[derive(Default)]
pub struct PhysicsComponents {
    pub rigids: Arena<RigidId, RigidBodyComponent>,
    pub colliders: Arena<ColliderId, ColliderComponent>,
}

impl PhysicsComponents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live (not disposed) colliders belonging to `go`.
    pub fn colliders_of_object(&self, go: GameObjectId) -> Vec<ColliderId> {
        self.colliders
            .iter()
            .filter(|(_, c)| c.game_object() == go && !c.is_disposed())
            .map(|(id, _)| id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_handles_go_stale_after_reuse() {
        let mut arena: Arena<RigidId, &str> = Arena::new();
        let a = arena.insert("a");
        assert_eq!(arena.remove(a), Some("a"));

        let b = arena.insert("b");
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.remove(a), None);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn bits_round_trip_for_user_data() {
        let mut arena: Arena<ColliderId, u8> = Arena::new();
        let first = arena.insert(1);
        arena.remove(first);
        let id = arena.insert(2);
        assert_eq!(ColliderId::from_bits(id.to_bits()), id);
        assert_eq!(id.generation(), 1);
    }

    #[test]
    fn iteration_skips_free_slots() {
        let mut arena: Arena<RigidId, u32> = Arena::new();
        let ids: Vec<_> = (0..4).map(|i| arena.insert(i)).collect();
        arena.remove(ids[1]);
        arena.remove(ids[3]);
        let live: Vec<u32> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(live, vec![0, 2]);
        for (_, v) in arena.iter_mut() {
            *v += 10;
        }
        assert_eq!(arena.get(ids[2]), Some(&12));
    }
}
