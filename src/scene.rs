// src/scene.rs
//! Game objects and their world transforms.
//!
//! The physics core never owns game objects. It reads and writes world poses through
//! [`TransformAccess`], and treats a game object that fails `is_valid` as destroyed.

use glam::{Quat, Vec3};

use crate::collision_matrix::MAX_LAYERS;
use crate::components::{slot_key, Arena};
use crate::math::Pose;

slot_key!(
    /// Handle to a game object in a [`Scene`].
    GameObjectId
);

/// The boundary the physics core consumes from the engine.
pub trait TransformAccess {
    fn is_valid(&self, go: GameObjectId) -> bool;
    fn world_pose(&self, go: GameObjectId) -> Option<Pose>;
    /// Returns false when `go` is stale.
    fn set_world_pose(&mut self, go: GameObjectId, pose: Pose) -> bool;
    /// Collision layer of `go` (0..32).
    fn layer(&self, go: GameObjectId) -> Option<u32>;
}

/// World-space transform. There is no hierarchy: every object is a root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    #[inline]
    pub fn world_position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    pub fn world_rotation(&self) -> Quat {
        self.rotation
    }

    #[inline]
    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.rotation)
    }

    #[inline]
    pub fn set_pose(&mut self, pose: Pose) {
        self.position = pose.position;
        self.rotation = pose.rotation;
    }
}

#[derive(Debug, Clone)]
pub struct GameObject {
    pub name: String,
    pub transform: Transform,
    layer: u32,
}

impl GameObject {
    #[inline]
    pub fn layer(&self) -> u32 {
        self.layer
    }
}

/// Flat store of live game objects.
#[derive(Default)]
pub struct Scene {
    objects: Arena<GameObjectId, GameObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, name: impl Into<String>, transform: Transform) -> GameObjectId {
        self.objects.insert(GameObject {
            name: name.into(),
            transform,
            layer: 0,
        })
    }

    /// Spawns on a collision layer; out-of-range layers fall back to 0.
    pub fn spawn_on_layer(
        &mut self,
        name: impl Into<String>,
        transform: Transform,
        layer: u32,
    ) -> GameObjectId {
        let id = self.spawn(name, transform);
        self.set_layer(id, layer);
        id
    }

    /// Frees the slot; every outstanding handle to it becomes stale.
    pub fn destroy(&mut self, go: GameObjectId) -> Option<GameObject> {
        self.objects.remove(go)
    }

    #[inline]
    pub fn get(&self, go: GameObjectId) -> Option<&GameObject> {
        self.objects.get(go)
    }

    #[inline]
    pub fn get_mut(&mut self, go: GameObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(go)
    }

    #[inline]
    pub fn transform(&self, go: GameObjectId) -> Option<&Transform> {
        self.objects.get(go).map(|o| &o.transform)
    }

    pub fn set_layer(&mut self, go: GameObjectId, layer: u32) -> bool {
        let Some(obj) = self.objects.get_mut(go) else {
            return false;
        };
        if (layer as usize) < MAX_LAYERS {
            obj.layer = layer;
        } else {
            log::warn!("layer {layer} out of range for {:?}, using 0", go);
            obj.layer = 0;
        }
        true
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl TransformAccess for Scene {
    #[inline]
    fn is_valid(&self, go: GameObjectId) -> bool {
        self.objects.contains(go)
    }

    #[inline]
    fn world_pose(&self, go: GameObjectId) -> Option<Pose> {
        self.transform(go).map(Transform::pose)
    }

    fn set_world_pose(&mut self, go: GameObjectId, pose: Pose) -> bool {
        match self.objects.get_mut(go) {
            Some(obj) => {
                obj.transform.set_pose(pose);
                true
            }
            None => false,
        }
    }

    #[inline]
    fn layer(&self, go: GameObjectId) -> Option<u32> {
        self.objects.get(go).map(GameObject::layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destroyed_objects_are_invalid() {
        let mut scene = Scene::new();
        let go = scene.spawn("crate", Transform::from_position(Vec3::Y));
        assert!(scene.is_valid(go));
        scene.destroy(go);
        assert!(!scene.is_valid(go));
        assert!(scene.world_pose(go).is_none());
        assert!(!scene.set_world_pose(go, Pose::IDENTITY));
    }

    #[test]
    fn out_of_range_layer_falls_back_to_default() {
        let mut scene = Scene::new();
        let go = scene.spawn_on_layer("probe", Transform::IDENTITY, 40);
        assert_eq!(scene.layer(go), Some(0));
        scene.set_layer(go, 7);
        assert_eq!(scene.layer(go), Some(7));
    }

    #[test]
    fn set_world_pose_updates_transform() {
        let mut scene = Scene::new();
        let go = scene.spawn("door", Transform::IDENTITY);
        let pose = Pose::new(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_y(1.0));
        assert!(scene.set_world_pose(go, pose));
        let t = scene.transform(go).unwrap();
        assert_eq!(t.world_position(), pose.position);
        assert_eq!(t.world_rotation(), pose.rotation);
        assert_eq!(t.scale, Vec3::ONE);
    }
}
