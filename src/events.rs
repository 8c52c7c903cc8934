// src/events.rs
//! Simulation event plumbing.
//!
//! [`SimulationEventSink`] is handed to Rapier as its `EventHandler`. Rapier may call it from
//! solver threads, so it buffers under a mutex; draining swaps the buffer out under the same
//! lock.

use std::collections::HashMap;

use parking_lot::Mutex;
use rapier3d::prelude::{
    ColliderHandle, ColliderSet, CollisionEvent, CollisionEventFlags, ContactPair, EventHandler,
    Real, RigidBodySet,
};

use crate::scene::GameObjectId;

/// Gameplay-visible event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicsEventKind {
    ContactEnter,
    ContactStay,
    ContactExit,
    TriggerEnter,
    TriggerExit,
}

/// Contact between two simulated shapes, still in Rapier handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawContact {
    pub collider1: ColliderHandle,
    pub collider2: ColliderHandle,
    pub kind: PhysicsEventKind,
    /// One of the shapes was removed from the scene.
    pub removed: bool,
}

/// Overlap between a trigger shape and another shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawTrigger {
    pub trigger: ColliderHandle,
    pub other: ColliderHandle,
    pub kind: PhysicsEventKind,
    pub removed: bool,
}

/// Resolved event: `initiator` is the object receiving the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysicsEvent {
    pub initiator: GameObjectId,
    pub other: GameObjectId,
    pub kind: PhysicsEventKind,
}

#[derive(Default)]
struct Buffers {
    contacts: Vec<RawContact>,
    triggers: Vec<RawTrigger>,
}

/// Thread-safe buffer between Rapier's callbacks and the fixed-step driver.
#[derive(Default)]
pub struct SimulationEventSink {
    buffers: Mutex<Buffers>,
}

impl SimulationEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_contact(&self, contact: RawContact) {
        self.buffers.lock().contacts.push(contact);
    }

    pub fn push_trigger(&self, trigger: RawTrigger) {
        self.buffers.lock().triggers.push(trigger);
    }

    /// Takes every buffered contact. The lock is held only for the swap.
    pub fn drain_contacts(&self) -> Vec<RawContact> {
        std::mem::take(&mut self.buffers.lock().contacts)
    }

    pub fn drain_triggers(&self) -> Vec<RawTrigger> {
        std::mem::take(&mut self.buffers.lock().triggers)
    }

    pub fn clear(&self) {
        let mut buffers = self.buffers.lock();
        buffers.contacts.clear();
        buffers.triggers.clear();
    }
}

impl EventHandler for SimulationEventSink {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        let (h1, h2, flags, started) = match event {
            CollisionEvent::Started(h1, h2, flags) => (h1, h2, flags, true),
            CollisionEvent::Stopped(h1, h2, flags) => (h1, h2, flags, false),
        };
        let removed = flags.contains(CollisionEventFlags::REMOVED);

        if flags.contains(CollisionEventFlags::SENSOR) {
            // A removed sensor can't be inspected anymore; the scene re-checks on resolve.
            let first_is_sensor = colliders.get(h1).map_or(true, |c| c.is_sensor());
            let (trigger, other) = if first_is_sensor { (h1, h2) } else { (h2, h1) };
            let kind = if started {
                PhysicsEventKind::TriggerEnter
            } else {
                PhysicsEventKind::TriggerExit
            };
            self.push_trigger(RawTrigger {
                trigger,
                other,
                kind,
                removed,
            });
        } else {
            let kind = if started {
                PhysicsEventKind::ContactEnter
            } else {
                PhysicsEventKind::ContactExit
            };
            self.push_contact(RawContact {
                collider1: h1,
                collider2: h2,
                kind,
                removed,
            });
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

/// A raw event resolved to game objects, still per shape pair.
///
/// For triggers `initiator` owns the trigger shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeEvent {
    pub shapes: (ColliderHandle, ColliderHandle),
    pub initiator: GameObjectId,
    pub other: GameObjectId,
    pub trigger: bool,
    pub started: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct ObjectPair {
    a: GameObjectId,
    b: GameObjectId,
    trigger: bool,
}

impl ObjectPair {
    fn of(event: &ShapeEvent) -> Self {
        let (a, b) = if event.trigger || event.initiator <= event.other {
            (event.initiator, event.other)
        } else {
            (event.other, event.initiator)
        };
        Self {
            a,
            b,
            trigger: event.trigger,
        }
    }

    fn event(self, kind: PhysicsEventKind) -> PhysicsEvent {
        PhysicsEvent {
            initiator: self.a,
            other: self.b,
            kind,
        }
    }
}

type ShapeKey = ((u32, u32), (u32, u32));

fn shape_key(event: &ShapeEvent) -> ShapeKey {
    let a = event.shapes.0.into_raw_parts();
    let b = event.shapes.1.into_raw_parts();
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Folds per-shape-pair enter/exit into per-object-pair events.
///
/// An object pair touches while at least one of its shape pairs does: `*Enter` is reported
/// when the first shape pair starts, `*Exit` when the last one stops, and `ContactStay` for
/// every contact pair that touched before and after a step. Changes that cancel out within
/// one step (a rebuilt shape) report nothing.
#[derive(Debug, Default)]
pub struct ContactTracker {
    shapes: HashMap<ShapeKey, ObjectPair>,
    counts: HashMap<ObjectPair, u32>,
}

impl ContactTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one step's shape events and returns the object-level events, one direction each.
    pub fn advance(&mut self, events: &[ShapeEvent]) -> Vec<PhysicsEvent> {
        let mut before: Vec<(ObjectPair, u32)> = Vec::new();
        for event in events {
            let key = shape_key(event);
            let pair = ObjectPair::of(event);
            if !before.iter().any(|(p, _)| *p == pair) {
                before.push((pair, self.count(pair)));
            }
            if event.started {
                if self.shapes.insert(key, pair).is_none() {
                    *self.counts.entry(pair).or_insert(0) += 1;
                }
            } else if let Some(pair) = self.shapes.remove(&key) {
                if let Some(count) = self.counts.get_mut(&pair) {
                    *count -= 1;
                    if *count == 0 {
                        self.counts.remove(&pair);
                    }
                }
            }
        }

        let mut out = Vec::new();
        for (pair, was) in &before {
            let now = self.count(*pair);
            let kind = match (*was > 0, now > 0, pair.trigger) {
                (false, true, false) => PhysicsEventKind::ContactEnter,
                (false, true, true) => PhysicsEventKind::TriggerEnter,
                (true, false, false) => PhysicsEventKind::ContactExit,
                (true, false, true) => PhysicsEventKind::TriggerExit,
                _ => continue,
            };
            out.push(pair.event(kind));
        }

        let mut stayed: Vec<ObjectPair> = self
            .counts
            .keys()
            .filter(|pair| !pair.trigger)
            .filter(|pair| {
                before
                    .iter()
                    .find(|(p, _)| p == *pair)
                    .map_or(true, |(_, was)| *was > 0)
            })
            .copied()
            .collect();
        stayed.sort_unstable();
        out.extend(stayed.into_iter().map(|p| p.event(PhysicsEventKind::ContactStay)));
        out
    }

    #[inline]
    fn count(&self, pair: ObjectPair) -> u32 {
        self.counts.get(&pair).copied().unwrap_or(0)
    }

    /// Object pairs currently touching.
    #[inline]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
