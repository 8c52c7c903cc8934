// src/components/collider.rs
//! Collider component: one Rapier collider per component, Box / Sphere / Capsule geometry.
//!
//! The component owns its collider while it is detached. Once attached to a rigid body the
//! collider lives in the scene's `ColliderSet` and the component only keeps the handle.

use std::fmt;

use glam::Vec3;
use rapier3d::prelude::{
    CoefficientCombineRule, Collider, ColliderBuilder, ColliderHandle, SharedShape,
};
use serde::{Deserialize, Serialize};

use crate::components::{ColliderId, RigidId};
use crate::error::{Error, Result};
use crate::math::Pose;
use crate::scene::GameObjectId;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Box,
    Sphere,
    Capsule,
}

/// Shape parameters. The variant fixes the geometry type; its fields may change freely.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ColliderGeometry {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
    /// Y-aligned capsule. `half_height` is the half length of the cylinder part.
    Capsule { radius: f32, half_height: f32 },
}

impl Default for ColliderGeometry {
    fn default() -> Self {
        Self::Box {
            half_extents: Vec3::splat(0.5),
        }
    }
}

fn positive(name: &str, value: f32) -> Result<f32> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(Error::InvalidGeometry(format!("{name} must be finite and > 0, got {value}")))
    }
}

impl ColliderGeometry {
    #[inline]
    pub fn kind(&self) -> GeometryKind {
        match self {
            Self::Box { .. } => GeometryKind::Box,
            Self::Sphere { .. } => GeometryKind::Sphere,
            Self::Capsule { .. } => GeometryKind::Capsule,
        }
    }

    /// Builds the Rapier shape, rejecting degenerate parameters.
    pub fn build_shape(&self) -> Result<SharedShape> {
        match *self {
            Self::Box { half_extents } => Ok(SharedShape::cuboid(
                positive("half_extents.x", half_extents.x)?,
                positive("half_extents.y", half_extents.y)?,
                positive("half_extents.z", half_extents.z)?,
            )),
            Self::Sphere { radius } => Ok(SharedShape::ball(positive("radius", radius)?)),
            Self::Capsule {
                radius,
                half_height,
            } => {
                let radius = positive("radius", radius)?;
                if !half_height.is_finite() || half_height < 0.0 {
                    return Err(Error::InvalidGeometry(format!(
                        "half_height must be finite and >= 0, got {half_height}"
                    )));
                }
                Ok(SharedShape::capsule_y(half_height, radius))
            }
        }
    }

    /// Debug-draw description at the given world pose.
    pub fn debug_shape_desc(&self, world: Pose) -> DebugShapeDesc {
        let (half_extents, radius, half_height) = match *self {
            Self::Box { half_extents } => (half_extents, 0.0, 0.0),
            Self::Sphere { radius } => (Vec3::splat(radius), radius, 0.0),
            Self::Capsule {
                radius,
                half_height,
            } => (
                Vec3::new(radius, half_height + radius, radius),
                radius,
                half_height,
            ),
        };
        DebugShapeDesc {
            kind: self.kind(),
            pose: world,
            half_extents,
            radius,
            half_height,
        }
    }
}

/// What a debug renderer needs to draw a collider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugShapeDesc {
    pub kind: GeometryKind,
    pub pose: Pose,
    /// Bounding half extents in local space.
    pub half_extents: Vec3,
    pub radius: f32,
    pub half_height: f32,
}

// ---------------------------------------------------------------------------
// Shape mode & material
// ---------------------------------------------------------------------------

/// How the shape takes part in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShapeMode {
    /// Generates contacts.
    #[default]
    Simulation,
    /// Sensor: overlap events only, no contact response.
    Trigger,
    /// Only visible to scene queries.
    QueryOnly,
    /// Neither simulated nor queryable.
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CombineMode {
    #[default]
    Average,
    Min,
    Multiply,
    Max,
}

impl CombineMode {
    #[inline]
    pub fn to_rapier(self) -> CoefficientCombineRule {
        match self {
            Self::Average => CoefficientCombineRule::Average,
            Self::Min => CoefficientCombineRule::Min,
            Self::Multiply => CoefficientCombineRule::Multiply,
            Self::Max => CoefficientCombineRule::Max,
        }
    }
}

/// Surface properties applied when the collider is built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsMaterial {
    /// Friction coefficient (0.0 = no friction)
    pub friction: f32,
    /// Restitution/bounciness (0.0 = no bounce, 1.0 = full bounce)
    pub restitution: f32,
    /// Density for mass calculation when the rigid body has no explicit mass
    pub density: f32,
    pub friction_combine: CombineMode,
    pub restitution_combine: CombineMode,
}

impl PhysicsMaterial {
    pub fn new(friction: f32, restitution: f32, density: f32) -> Self {
        Self {
            friction,
            restitution,
            density,
            friction_combine: CombineMode::Average,
            restitution_combine: CombineMode::Average,
        }
    }

    pub fn slippery() -> Self {
        Self::new(0.1, 0.1, 1.0)
    }

    pub fn bouncy() -> Self {
        Self::new(0.5, 0.9, 1.0)
    }
}

impl Default for PhysicsMaterial {
    fn default() -> Self {
        Self::new(0.5, 0.5, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// Construction parameters for a collider component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColliderDesc {
    pub geometry: ColliderGeometry,
    /// Offset from the owning rigid body.
    pub local_pose: Pose,
    pub mode: ShapeMode,
    pub query_enabled: bool,
    /// Overrides the game object's layer when set.
    pub layer_override: Option<u32>,
    pub material: PhysicsMaterial,
}

impl Default for ColliderDesc {
    fn default() -> Self {
        Self {
            geometry: ColliderGeometry::default(),
            local_pose: Pose::IDENTITY,
            mode: ShapeMode::Simulation,
            query_enabled: true,
            layer_override: None,
            material: PhysicsMaterial::default(),
        }
    }
}

impl ColliderDesc {
    pub fn new(geometry: ColliderGeometry) -> Self {
        Self {
            geometry,
            ..Self::default()
        }
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        Self::new(ColliderGeometry::Box { half_extents })
    }

    pub fn ball(radius: f32) -> Self {
        Self::new(ColliderGeometry::Sphere { radius })
    }

    pub fn capsule(radius: f32, half_height: f32) -> Self {
        Self::new(ColliderGeometry::Capsule {
            radius,
            half_height,
        })
    }

    pub fn with_mode(mut self, mode: ShapeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_local_pose(mut self, local_pose: Pose) -> Self {
        self.local_pose = local_pose;
        self
    }

    pub fn with_layer(mut self, layer: u32) -> Self {
        self.layer_override = Some(layer);
        self
    }

    pub fn with_material(mut self, material: PhysicsMaterial) -> Self {
        self.material = material;
        self
    }
}

/// What a property change requires from the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColliderChange {
    None,
    /// Same geometry type, new parameters: resize in place.
    Geometry,
    /// The collider object must be replaced.
    Rebuild,
    /// Only the filter data must be reapplied.
    Filter,
}

enum ShapeSlot {
    Empty,
    Detached(Box<Collider>),
    Attached(ColliderHandle),
}

impl fmt::Debug for ShapeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeSlot::Empty => f.write_str("Empty"),
            ShapeSlot::Detached(_) => f.write_str("Detached"),
            ShapeSlot::Attached(handle) => f.debug_tuple("Attached").field(handle).finish(),
        }
    }
}

#[derive(Debug)]
pub struct ColliderComponent {
    game_object: GameObjectId,
    desc: ColliderDesc,
    /// Rigid body this collider was last asked to attach to.
    owner: Option<RigidId>,
    geometry_dirty: bool,
    /// The collider object no longer matches the description and must be rebuilt.
    needs_rebuild: bool,
    filter_dirty: bool,
    shape: ShapeSlot,
    disposed: bool,
}

impl ColliderComponent {
    pub fn new(game_object: GameObjectId, desc: ColliderDesc) -> Self {
        Self {
            game_object,
            desc,
            owner: None,
            geometry_dirty: false,
            needs_rebuild: false,
            filter_dirty: false,
            shape: ShapeSlot::Empty,
            disposed: false,
        }
    }

    #[inline]
    pub fn game_object(&self) -> GameObjectId {
        self.game_object
    }

    #[inline]
    pub fn desc(&self) -> &ColliderDesc {
        &self.desc
    }

    #[inline]
    pub fn geometry(&self) -> ColliderGeometry {
        self.desc.geometry
    }

    #[inline]
    pub fn local_pose(&self) -> Pose {
        self.desc.local_pose
    }

    #[inline]
    pub fn mode(&self) -> ShapeMode {
        self.desc.mode
    }

    #[inline]
    pub fn query_enabled(&self) -> bool {
        self.desc.query_enabled
    }

    #[inline]
    pub fn material(&self) -> PhysicsMaterial {
        self.desc.material
    }

    /// Layer override if set, else the game object's layer.
    #[inline]
    pub fn effective_layer(&self, object_layer: u32) -> u32 {
        self.desc.layer_override.unwrap_or(object_layer)
    }

    #[inline]
    pub fn owner(&self) -> Option<RigidId> {
        self.owner
    }

    #[inline]
    pub(crate) fn set_owner(&mut self, owner: Option<RigidId>) {
        self.owner = owner;
    }

    #[inline]
    pub fn is_geometry_dirty(&self) -> bool {
        self.geometry_dirty
    }

    #[inline]
    pub fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }

    #[inline]
    pub fn is_filter_dirty(&self) -> bool {
        self.filter_dirty
    }

    #[inline]
    pub(crate) fn clear_filter_dirty(&mut self) {
        self.filter_dirty = false;
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    #[inline]
    pub(crate) fn dispose(&mut self) {
        self.disposed = true;
    }

    // ---------------------------------------------------------------------
    // Property setters
    // ---------------------------------------------------------------------

    /// Same variant marks geometry dirty; a different variant needs a new collider.
    pub fn set_geometry(&mut self, geometry: ColliderGeometry) -> ColliderChange {
        if geometry == self.desc.geometry {
            return ColliderChange::None;
        }
        let same_kind = geometry.kind() == self.desc.geometry.kind();
        self.desc.geometry = geometry;
        if same_kind {
            self.geometry_dirty = true;
            ColliderChange::Geometry
        } else {
            self.geometry_dirty = false;
            self.needs_rebuild = true;
            ColliderChange::Rebuild
        }
    }

    pub fn set_local_pose(&mut self, local_pose: Pose) -> ColliderChange {
        if local_pose == self.desc.local_pose {
            return ColliderChange::None;
        }
        self.desc.local_pose = local_pose;
        self.needs_rebuild = true;
        ColliderChange::Rebuild
    }

    pub fn set_material(&mut self, material: PhysicsMaterial) -> ColliderChange {
        if material == self.desc.material {
            return ColliderChange::None;
        }
        self.desc.material = material;
        self.needs_rebuild = true;
        ColliderChange::Rebuild
    }

    pub fn set_mode(&mut self, mode: ShapeMode) -> ColliderChange {
        self.set_filter_field(|d| &mut d.mode, mode)
    }

    pub fn set_query_enabled(&mut self, enabled: bool) -> ColliderChange {
        self.set_filter_field(|d| &mut d.query_enabled, enabled)
    }

    pub fn set_layer_override(&mut self, layer: Option<u32>) -> ColliderChange {
        self.set_filter_field(|d| &mut d.layer_override, layer)
    }

    /// Called when the game object's layer changed.
    pub fn mark_filter_dirty(&mut self) {
        self.filter_dirty = true;
    }

    fn set_filter_field<T: PartialEq>(
        &mut self,
        field: impl FnOnce(&mut ColliderDesc) -> &mut T,
        value: T,
    ) -> ColliderChange {
        let slot = field(&mut self.desc);
        if *slot == value {
            return ColliderChange::None;
        }
        *slot = value;
        self.filter_dirty = true;
        ColliderChange::Filter
    }

    // ---------------------------------------------------------------------
    // Shape ownership
    // ---------------------------------------------------------------------

    #[inline]
    pub fn has_shape(&self) -> bool {
        !matches!(self.shape, ShapeSlot::Empty)
    }

    #[inline]
    pub fn attached_handle(&self) -> Option<ColliderHandle> {
        match self.shape {
            ShapeSlot::Attached(handle) => Some(handle),
            _ => None,
        }
    }

    /// Builds a fresh collider from the current description.
    ///
    /// Only valid while detached. On failure the previous collider (if any) is kept.
    pub fn build_shape(&mut self, id: ColliderId) -> Result<()> {
        if let ShapeSlot::Attached(handle) = self.shape {
            return Err(Error::InvalidGeometry(format!(
                "cannot rebuild {id:?} while attached as {handle:?}"
            )));
        }
        let shape = self.desc.geometry.build_shape()?;
        let material = self.desc.material;
        let collider = ColliderBuilder::new(shape)
            .position(self.desc.local_pose.to_isometry())
            .friction(material.friction)
            .restitution(material.restitution)
            .density(material.density)
            .friction_combine_rule(material.friction_combine.to_rapier())
            .restitution_combine_rule(material.restitution_combine.to_rapier())
            .sensor(self.desc.mode == ShapeMode::Trigger)
            .user_data(id.to_bits() as u128)
            .build();
        self.shape = ShapeSlot::Detached(Box::new(collider));
        self.geometry_dirty = false;
        self.needs_rebuild = false;
        Ok(())
    }

    /// Resizes `target` in place with the current parameters and clears the dirty flag.
    ///
    /// `target` is this component's collider, either borrowed from the scene's set or
    /// from [`Self::detached_mut`].
    pub fn update_geometry(target: &mut Collider, geometry: &ColliderGeometry) -> Result<()> {
        let shape = geometry.build_shape()?;
        target.set_shape(shape);
        Ok(())
    }

    #[inline]
    pub(crate) fn clear_geometry_dirty(&mut self) {
        self.geometry_dirty = false;
    }

    #[inline]
    pub(crate) fn detached_mut(&mut self) -> Option<&mut Collider> {
        match &mut self.shape {
            ShapeSlot::Detached(collider) => Some(collider),
            _ => None,
        }
    }

    /// Hands the detached collider to the scene for insertion.
    ///
    /// A collider removed from a set keeps its last world position; Rapier reads the position
    /// as the parent offset on insertion, so it is reset to the local pose here.
    pub(crate) fn take_detached(&mut self) -> Option<Collider> {
        match std::mem::replace(&mut self.shape, ShapeSlot::Empty) {
            ShapeSlot::Detached(mut collider) => {
                collider.set_position(self.desc.local_pose.to_isometry());
                Some(*collider)
            }
            other => {
                self.shape = other;
                None
            }
        }
    }

    pub(crate) fn mark_attached(&mut self, handle: ColliderHandle) {
        self.shape = ShapeSlot::Attached(handle);
    }

    /// Takes back a collider removed from the scene's set.
    pub(crate) fn store_detached(&mut self, collider: Collider) {
        self.shape = ShapeSlot::Detached(Box::new(collider));
    }

    pub(crate) fn release_shape(&mut self) {
        self.shape = ShapeSlot::Empty;
    }

    pub fn debug_shape_desc(&self, owner_pose: Pose) -> DebugShapeDesc {
        let local = self.desc.local_pose;
        let world = Pose::new(
            owner_pose.position + owner_pose.rotation * local.position,
            owner_pose.rotation * local.rotation,
        );
        self.desc.geometry.debug_shape_desc(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Arena, SlotKey};

    fn go() -> GameObjectId {
        GameObjectId::from_parts(0, 0)
    }

    #[test]
    fn degenerate_geometry_is_rejected() {
        assert!(ColliderGeometry::Sphere { radius: 0.0 }.build_shape().is_err());
        assert!(ColliderGeometry::Box {
            half_extents: Vec3::new(1.0, f32::NAN, 1.0)
        }
        .build_shape()
        .is_err());
        assert!(ColliderGeometry::Capsule {
            radius: 0.5,
            half_height: 0.0
        }
        .build_shape()
        .is_ok());
    }

    #[test]
    fn same_variant_resizes_other_variant_rebuilds() {
        let mut c = ColliderComponent::new(go(), ColliderDesc::ball(0.5));
        assert_eq!(
            c.set_geometry(ColliderGeometry::Sphere { radius: 1.0 }),
            ColliderChange::Geometry
        );
        assert!(c.is_geometry_dirty());
        assert_eq!(
            c.set_geometry(ColliderGeometry::Box {
                half_extents: Vec3::ONE
            }),
            ColliderChange::Rebuild
        );
        assert_eq!(
            c.set_geometry(ColliderGeometry::Box {
                half_extents: Vec3::ONE
            }),
            ColliderChange::None
        );
    }

    #[test]
    fn replacing_properties_flag_a_rebuild_until_built() {
        let mut ids: Arena<ColliderId, ()> = Arena::new();
        let id = ids.insert(());
        let mut c = ColliderComponent::new(go(), ColliderDesc::cuboid(Vec3::ONE));
        c.build_shape(id).unwrap();
        assert!(!c.needs_rebuild());

        c.set_geometry(ColliderGeometry::Sphere { radius: 2.0 });
        assert!(c.needs_rebuild());
        c.build_shape(id).unwrap();
        assert!(!c.needs_rebuild());

        c.set_local_pose(Pose::from_position(Vec3::Y));
        assert!(c.needs_rebuild());
        c.build_shape(id).unwrap();
        c.set_material(PhysicsMaterial::bouncy());
        assert!(c.needs_rebuild());

        c.set_geometry(ColliderGeometry::Sphere { radius: 3.0 });
        c.build_shape(id).unwrap();
        assert!(!c.needs_rebuild());
        assert!(!c.is_geometry_dirty());
        assert_eq!(format!("{:?}", c.shape), "Detached");
    }

    #[test]
    fn filter_fields_only_dirty_the_filter() {
        let mut c = ColliderComponent::new(go(), ColliderDesc::default());
        assert_eq!(c.set_layer_override(Some(4)), ColliderChange::Filter);
        assert!(c.is_filter_dirty());
        assert!(!c.is_geometry_dirty());
        assert_eq!(c.effective_layer(1), 4);
        c.clear_filter_dirty();
        assert_eq!(c.set_layer_override(Some(4)), ColliderChange::None);
        assert!(!c.is_filter_dirty());
    }

    #[test]
    fn failed_build_keeps_previous_collider() {
        let mut ids: Arena<ColliderId, ()> = Arena::new();
        let id = ids.insert(());
        let mut c = ColliderComponent::new(go(), ColliderDesc::ball(0.5));
        c.build_shape(id).unwrap();

        c.set_geometry(ColliderGeometry::Box {
            half_extents: Vec3::new(1.0, -1.0, 1.0),
        });
        assert!(c.build_shape(id).is_err());
        let kept = c.take_detached().unwrap();
        assert_eq!(kept.user_data, id.to_bits() as u128);
        assert!(kept.shape().as_ball().is_some());
    }

    #[test]
    fn in_place_update_changes_shape() {
        let mut ids: Arena<ColliderId, ()> = Arena::new();
        let id = ids.insert(());
        let mut c = ColliderComponent::new(go(), ColliderDesc::ball(0.5));
        c.build_shape(id).unwrap();
        c.set_geometry(ColliderGeometry::Sphere { radius: 2.0 });
        let geometry = c.geometry();
        let collider = c.detached_mut().unwrap();
        ColliderComponent::update_geometry(collider, &geometry).unwrap();
        assert_eq!(collider.shape().as_ball().map(|b| b.radius), Some(2.0));
    }
}
