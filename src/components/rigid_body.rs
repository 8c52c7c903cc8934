// src/components/rigid_body.rs
//! Rigid body component: owns at most one Rapier body ("actor").
//!
//! Actor lifecycle: `None` -> `create_actor` -> `Detached` -> scene insert -> `InScene`
//! -> scene remove -> `None`. A type change always passes back through `None`.

use std::fmt;

use glam::Vec3;
use rapier3d::prelude::{ColliderHandle, ColliderSet, RigidBody, RigidBodyBuilder, RigidBodyHandle};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::components::RigidId;
use crate::math::{to_vector, Pose};
use crate::scene::GameObjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RigidType {
    #[default]
    Static,
    Dynamic,
}

/// Rigid body description. Mutable at any time; changes are applied on the next push.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigidDesc {
    pub kind: RigidType,
    /// Total mass spread over the simulated colliders. `<= 0` means "use collider densities".
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub use_gravity: bool,
    pub is_kinematic: bool,
}

impl Default for RigidDesc {
    fn default() -> Self {
        Self {
            kind: RigidType::Static,
            mass: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.05,
            use_gravity: true,
            is_kinematic: false,
        }
    }
}

impl RigidDesc {
    pub fn fixed() -> Self {
        Self::default()
    }

    pub fn dynamic() -> Self {
        Self {
            kind: RigidType::Dynamic,
            ..Self::default()
        }
    }

    pub fn kinematic() -> Self {
        Self {
            kind: RigidType::Dynamic,
            is_kinematic: true,
            ..Self::default()
        }
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_gravity(mut self, use_gravity: bool) -> Self {
        self.use_gravity = use_gravity;
        self
    }

    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    #[inline]
    pub fn is_simulated_dynamic(&self) -> bool {
        self.kind == RigidType::Dynamic && !self.is_kinematic
    }

    #[inline]
    fn gravity_scale(&self) -> f32 {
        if self.use_gravity {
            1.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceMode {
    /// Continuous force applied over the next step.
    Force,
    /// Instant change in momentum.
    Impulse,
}

/// Pending actor replacement. At most one per component; a new request overwrites it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeChangeRequest {
    pub new_type: RigidType,
    pub is_kinematic: bool,
    /// Pose the new actor is created at.
    pub pose: Pose,
}

/// Mass contribution of one attached collider, computed by the scene for `push_to_physics`.
#[derive(Debug, Clone, Copy)]
pub struct ShapeMass {
    pub handle: ColliderHandle,
    pub simulated: bool,
    pub density: f32,
}

enum ActorSlot {
    None,
    Detached(Box<RigidBody>),
    InScene(RigidBodyHandle),
}

impl fmt::Debug for ActorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorSlot::None => f.write_str("None"),
            ActorSlot::Detached(_) => f.write_str("Detached"),
            ActorSlot::InScene(handle) => f.debug_tuple("InScene").field(handle).finish(),
        }
    }
}

#[derive(Debug)]
pub struct RigidBodyComponent {
    game_object: GameObjectId,
    desc: RigidDesc,
    actor: ActorSlot,
    desc_dirty: bool,
    mass_dirty: bool,
    requested_pose: Option<Pose>,
    kinematic_target: Option<Pose>,
    forces: SmallVec<[(Vec3, ForceMode); 4]>,
    torques: SmallVec<[(Vec3, ForceMode); 4]>,
    wake_requested: bool,
    type_change: Option<TypeChangeRequest>,
    prev_pose: Pose,
    curr_pose: Pose,
    /// Created on demand by a collider rather than added explicitly.
    implicit: bool,
    disposed: bool,
}

impl RigidBodyComponent {
    pub fn new(game_object: GameObjectId, desc: RigidDesc) -> Self {
        Self {
            game_object,
            desc,
            actor: ActorSlot::None,
            desc_dirty: false,
            mass_dirty: true,
            requested_pose: None,
            kinematic_target: None,
            forces: SmallVec::new(),
            torques: SmallVec::new(),
            wake_requested: false,
            type_change: None,
            prev_pose: Pose::IDENTITY,
            curr_pose: Pose::IDENTITY,
            implicit: false,
            disposed: false,
        }
    }

    /// Static body created for a collider whose game object has no rigid body.
    pub(crate) fn new_implicit(game_object: GameObjectId) -> Self {
        Self {
            implicit: true,
            ..Self::new(game_object, RigidDesc::fixed())
        }
    }

    #[inline]
    pub fn game_object(&self) -> GameObjectId {
        self.game_object
    }

    #[inline]
    pub fn desc(&self) -> &RigidDesc {
        &self.desc
    }

    #[inline]
    pub fn rigid_type(&self) -> RigidType {
        self.desc.kind
    }

    #[inline]
    pub fn is_kinematic(&self) -> bool {
        self.desc.is_kinematic
    }

    #[inline]
    pub fn is_implicit(&self) -> bool {
        self.implicit
    }

    /// Explicit `add_rigid_body` on an object whose collider already created this body.
    pub(crate) fn promote(&mut self) {
        self.implicit = false;
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    #[inline]
    pub(crate) fn dispose(&mut self) {
        self.disposed = true;
    }

    #[inline]
    pub fn is_desc_dirty(&self) -> bool {
        self.desc_dirty
    }

    #[inline]
    pub(crate) fn mark_mass_dirty(&mut self) {
        self.mass_dirty = true;
    }

    // ---------------------------------------------------------------------
    // Description setters
    // ---------------------------------------------------------------------

    pub fn set_mass(&mut self, mass: f32) {
        if self.desc.mass != mass {
            self.desc.mass = mass;
            self.mass_dirty = true;
        }
    }

    pub fn set_damping(&mut self, linear: f32, angular: f32) {
        if self.desc.linear_damping != linear || self.desc.angular_damping != angular {
            self.desc.linear_damping = linear;
            self.desc.angular_damping = angular;
            self.desc_dirty = true;
        }
    }

    pub fn set_use_gravity(&mut self, use_gravity: bool) {
        if self.desc.use_gravity != use_gravity {
            self.desc.use_gravity = use_gravity;
            self.desc_dirty = true;
        }
    }

    // ---------------------------------------------------------------------
    // Type change protocol
    // ---------------------------------------------------------------------

    /// Records an actor replacement. Returns false when nothing would change.
    ///
    /// The replacement itself happens in the manager's pre-step flush.
    pub fn request_type_change(&mut self, new_type: RigidType, is_kinematic: bool, pose: Pose) -> bool {
        let target = self
            .type_change
            .map(|r| (r.new_type, r.is_kinematic))
            .unwrap_or((self.desc.kind, self.desc.is_kinematic));
        if target == (new_type, is_kinematic) {
            return false;
        }
        self.type_change = Some(TypeChangeRequest {
            new_type,
            is_kinematic,
            pose,
        });
        true
    }

    #[inline]
    pub fn pending_type_change(&self) -> Option<&TypeChangeRequest> {
        self.type_change.as_ref()
    }

    /// Consumes the pending request and switches the description over to it.
    pub(crate) fn take_type_change(&mut self) -> Option<TypeChangeRequest> {
        let request = self.type_change.take()?;
        self.desc.kind = request.new_type;
        self.desc.is_kinematic = request.is_kinematic;
        if !self.desc.is_simulated_dynamic() {
            self.forces.clear();
            self.torques.clear();
        }
        self.kinematic_target = None;
        self.requested_pose = None;
        Some(request)
    }

    // ---------------------------------------------------------------------
    // Gameplay API
    // ---------------------------------------------------------------------

    /// Moves the body to `pose` on the next push.
    pub fn teleport(&mut self, pose: Pose) {
        self.requested_pose = Some(pose);
        self.wake_requested = true;
    }

    /// Target pose for a kinematic body. Ignored otherwise.
    pub fn set_kinematic_target(&mut self, pose: Pose) {
        if self.desc.kind == RigidType::Dynamic && self.desc.is_kinematic {
            self.kinematic_target = Some(pose);
        }
    }

    pub fn add_force(&mut self, force: Vec3, mode: ForceMode) {
        if self.desc.is_simulated_dynamic() {
            self.forces.push((force, mode));
        }
    }

    pub fn add_torque(&mut self, torque: Vec3, mode: ForceMode) {
        if self.desc.is_simulated_dynamic() {
            self.torques.push((torque, mode));
        }
    }

    #[inline]
    pub fn add_impulse(&mut self, impulse: Vec3) {
        self.add_force(impulse, ForceMode::Impulse);
    }

    pub fn wake_up(&mut self) {
        self.wake_requested = true;
    }

    #[inline]
    pub fn queued_force_count(&self) -> usize {
        self.forces.len() + self.torques.len()
    }

    // ---------------------------------------------------------------------
    // Actor ownership
    // ---------------------------------------------------------------------

    #[inline]
    pub fn has_actor(&self) -> bool {
        !matches!(self.actor, ActorSlot::None)
    }

    #[inline]
    pub fn actor_handle(&self) -> Option<RigidBodyHandle> {
        match self.actor {
            ActorSlot::InScene(handle) => Some(handle),
            _ => None,
        }
    }

    /// Builds a detached actor at `pose` from the current description.
    pub(crate) fn create_actor(&mut self, id: RigidId, pose: Pose) {
        let builder = match (self.desc.kind, self.desc.is_kinematic) {
            (RigidType::Static, _) => RigidBodyBuilder::fixed(),
            (RigidType::Dynamic, true) => RigidBodyBuilder::kinematic_position_based(),
            (RigidType::Dynamic, false) => RigidBodyBuilder::dynamic(),
        };
        let body = builder
            .position(pose.to_isometry())
            .linear_damping(self.desc.linear_damping)
            .angular_damping(self.desc.angular_damping)
            .gravity_scale(self.desc.gravity_scale())
            .user_data(id.to_bits() as u128)
            .build();
        self.actor = ActorSlot::Detached(Box::new(body));
        self.desc_dirty = false;
        self.mass_dirty = true;
        self.prev_pose = pose;
        self.curr_pose = pose;
    }

    pub(crate) fn take_detached_actor(&mut self) -> Option<RigidBody> {
        match std::mem::replace(&mut self.actor, ActorSlot::None) {
            ActorSlot::Detached(body) => Some(*body),
            other => {
                self.actor = other;
                None
            }
        }
    }

    pub(crate) fn mark_in_scene(&mut self, handle: RigidBodyHandle) {
        self.actor = ActorSlot::InScene(handle);
    }

    pub(crate) fn destroy_actor(&mut self) {
        self.actor = ActorSlot::None;
    }

    // ---------------------------------------------------------------------
    // Synchronization
    // ---------------------------------------------------------------------

    /// Copies engine-side state into the actor.
    ///
    /// Order: forced pose, kinematic target, description, mass distribution, forces and
    /// torques, wake. `transform_pose` drives kinematic bodies that have no explicit target.
    pub(crate) fn push_to_physics(
        &mut self,
        body: &mut RigidBody,
        colliders: &mut ColliderSet,
        shapes: &[ShapeMass],
        transform_pose: Option<Pose>,
    ) {
        let kinematic = self.desc.kind == RigidType::Dynamic && self.desc.is_kinematic;

        if let Some(pose) = self.requested_pose.take() {
            let iso = pose.to_isometry();
            body.set_position(iso, true);
            if kinematic {
                body.set_next_kinematic_position(iso);
            }
            self.prev_pose = pose;
            self.curr_pose = pose;
        } else if kinematic {
            if let Some(target) = self.kinematic_target.take().or(transform_pose) {
                body.set_next_kinematic_position(target.to_isometry());
            }
        }

        if self.desc_dirty {
            body.set_linear_damping(self.desc.linear_damping);
            body.set_angular_damping(self.desc.angular_damping);
            body.set_gravity_scale(self.desc.gravity_scale(), true);
            self.desc_dirty = false;
        }

        if self.mass_dirty {
            if self.desc.kind == RigidType::Dynamic {
                distribute_mass(self.desc.mass, colliders, shapes);
            }
            self.mass_dirty = false;
        }

        if self.desc.is_simulated_dynamic() {
            // Rapier keeps user forces across steps; queued ones apply exactly once.
            body.reset_forces(false);
            body.reset_torques(false);
            let applied = !self.forces.is_empty() || !self.torques.is_empty();
            for (force, mode) in self.forces.drain(..) {
                match mode {
                    ForceMode::Force => body.add_force(to_vector(force), true),
                    ForceMode::Impulse => body.apply_impulse(to_vector(force), true),
                }
            }
            for (torque, mode) in self.torques.drain(..) {
                match mode {
                    ForceMode::Force => body.add_torque(to_vector(torque), true),
                    ForceMode::Impulse => body.apply_torque_impulse(to_vector(torque), true),
                }
            }
            self.forces.reserve(4);
            self.torques.reserve(4);
            if applied {
                body.wake_up(true);
            }
        }

        if std::mem::take(&mut self.wake_requested) && !body.is_fixed() {
            body.wake_up(true);
        }
    }

    /// Reads the simulated pose. `None` for static or kinematic bodies.
    pub(crate) fn pull_from_physics(&mut self, body: &RigidBody) -> Option<Pose> {
        if !self.desc.is_simulated_dynamic() || !body.is_dynamic() {
            return None;
        }
        let pose = Pose::from_isometry(body.position());
        self.prev_pose = self.curr_pose;
        self.curr_pose = pose;
        Some(pose)
    }

    /// Pose between the last two pulled poses. `None` for bodies that are not pulled.
    pub fn interpolated_pose(&self, alpha: f32) -> Option<Pose> {
        if !self.desc.is_simulated_dynamic() || !self.has_actor() {
            return None;
        }
        Some(self.prev_pose.interpolate(self.curr_pose, alpha))
    }
}

/// Splits an explicit mass evenly over simulated colliders; everything else weighs nothing.
fn distribute_mass(mass: f32, colliders: &mut ColliderSet, shapes: &[ShapeMass]) {
    let simulated = shapes.iter().filter(|s| s.simulated).count();
    for shape in shapes {
        let Some(collider) = colliders.get_mut(shape.handle) else {
            continue;
        };
        if !shape.simulated {
            collider.set_density(0.0);
        } else if mass > 0.0 {
            collider.set_mass(mass / simulated as f32);
        } else {
            collider.set_density(shape.density);
        }
    }
}
