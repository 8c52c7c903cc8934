// src/physics.rs
//! `PhysScene`: one Rapier world plus the bookkeeping that ties it to engine components.
//!
//! Everything here runs inside the manager's ordered flush phases. Stale handles come back as
//! `Err(StaleHandle)` so the caller decides to skip; nothing in this module panics on them.

use std::collections::{BTreeSet, HashMap, HashSet};

use glam::Vec3;
use rapier3d::parry::shape::Shape;
use rapier3d::prelude::{
    BroadPhase, CCDSolver, ColliderHandle, ColliderSet, ImpulseJointSet, IntegrationParameters,
    IslandManager, MultibodyJointSet, NarrowPhase, PhysicsPipeline, Point, QueryFilter,
    QueryPipeline, Ray, Real, RigidBodyHandle, RigidBodySet,
};
use smallvec::SmallVec;

use crate::collision_matrix::CollisionMatrix;
use crate::components::{
    ColliderComponent, ColliderId, DebugShapeDesc, PhysicsComponents, RigidId, ShapeMass,
    ShapeMode,
};
use crate::config::PhysicsConfig;
use crate::error::{Error, Result, StaleHandle};
use crate::events::{PhysicsEventKind, RawContact, RawTrigger, ShapeEvent, SimulationEventSink};
use crate::filter::{self, PairBehavior};
use crate::math::{from_vector, to_vector, Pose};
use crate::scene::{GameObjectId, TransformAccess};

// ---------------------------------------------------------------------------
// Bookkeeping
// ---------------------------------------------------------------------------

/// Collider -> owning rigid, and rigid -> attached colliders. The only source of truth for
/// attachment.
#[derive(Debug, Default)]
struct AttachmentTable {
    owner_by_collider: HashMap<ColliderId, RigidId>,
    colliders_by_rigid: HashMap<RigidId, SmallVec<[ColliderId; 4]>>,
}

impl AttachmentTable {
    fn link(&mut self, collider: ColliderId, rigid: RigidId) {
        self.owner_by_collider.insert(collider, rigid);
        let list = self.colliders_by_rigid.entry(rigid).or_default();
        if !list.contains(&collider) {
            list.push(collider);
        }
    }

    fn unlink(&mut self, collider: ColliderId) -> Option<RigidId> {
        let rigid = self.owner_by_collider.remove(&collider)?;
        if let Some(list) = self.colliders_by_rigid.get_mut(&rigid) {
            list.retain(|c| *c != collider);
            if list.is_empty() {
                self.colliders_by_rigid.remove(&rigid);
            }
        }
        Some(rigid)
    }

    #[inline]
    fn owner(&self, collider: ColliderId) -> Option<RigidId> {
        self.owner_by_collider.get(&collider).copied()
    }

    #[inline]
    fn colliders_of(&self, rigid: RigidId) -> &[ColliderId] {
        self.colliders_by_rigid
            .get(&rigid)
            .map(|l| l.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy)]
struct ShapeEntry {
    collider: ColliderId,
    game_object: GameObjectId,
    trigger: bool,
}

/// Rapier handle -> engine collider. Handles removed from the set are kept as `retired` until
/// the next dispatch so their exit events still resolve.
#[derive(Debug, Default)]
struct ShapeDirectory {
    live: HashMap<ColliderHandle, ShapeEntry>,
    retired: HashMap<ColliderHandle, ShapeEntry>,
    handle_by_collider: HashMap<ColliderId, ColliderHandle>,
}

impl ShapeDirectory {
    fn insert(&mut self, handle: ColliderHandle, entry: ShapeEntry) {
        if let Some(old) = self.handle_by_collider.insert(entry.collider, handle) {
            if old != handle {
                self.retire(old);
                self.handle_by_collider.insert(entry.collider, handle);
            }
        }
        self.live.insert(handle, entry);
    }

    fn retire(&mut self, handle: ColliderHandle) {
        if let Some(entry) = self.live.remove(&handle) {
            if self.handle_by_collider.get(&entry.collider) == Some(&handle) {
                self.handle_by_collider.remove(&entry.collider);
            }
            self.retired.insert(handle, entry);
        }
    }

    fn get(&self, handle: ColliderHandle) -> Option<ShapeEntry> {
        self.live
            .get(&handle)
            .or_else(|| self.retired.get(&handle))
            .copied()
    }

    #[inline]
    fn handle_of(&self, collider: ColliderId) -> Option<ColliderHandle> {
        self.handle_by_collider.get(&collider).copied()
    }
}

/// Scene query result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub game_object: GameObjectId,
    pub collider: ColliderId,
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
}

// ---------------------------------------------------------------------------
// PhysScene
// ---------------------------------------------------------------------------

pub struct PhysScene {
    gravity: Vec3,
    pipeline: PhysicsPipeline,
    integration_params: IntegrationParameters,
    islands: IslandManager,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    sink: SimulationEventSink,

    registered: BTreeSet<RigidId>,
    attachments: AttachmentTable,
    shapes: ShapeDirectory,
    filter_resets: usize,
}

impl PhysScene {
    /// Builds an empty world. Fails on an invalid configuration.
    pub fn create(config: &PhysicsConfig) -> Result<Self> {
        config.validate()?;
        let mut integration_params = IntegrationParameters::default();
        integration_params.dt = config.fixed_dt;

        Ok(Self {
            gravity: config.gravity_vec(),
            pipeline: PhysicsPipeline::new(),
            integration_params,
            islands: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            sink: SimulationEventSink::new(),
            registered: BTreeSet::new(),
            attachments: AttachmentTable::default(),
            shapes: ShapeDirectory::default(),
            filter_resets: 0,
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[inline]
    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    #[inline]
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    #[inline]
    pub fn is_registered(&self, rigid: RigidId) -> bool {
        self.registered.contains(&rigid)
    }

    #[inline]
    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    #[inline]
    pub fn attached_count(&self) -> usize {
        self.attachments.owner_by_collider.len()
    }

    #[inline]
    pub fn owner_of(&self, collider: ColliderId) -> Option<RigidId> {
        self.attachments.owner(collider)
    }

    #[inline]
    pub fn colliders_of(&self, rigid: RigidId) -> &[ColliderId] {
        self.attachments.colliders_of(rigid)
    }

    /// Number of pair-filter resets issued so far.
    #[inline]
    pub fn filter_resets(&self) -> usize {
        self.filter_resets
    }

    #[inline]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    #[inline]
    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// Shape the world simulates for an attached collider.
    pub fn attached_shape(&self, comps: &PhysicsComponents, collider: ColliderId) -> Option<&dyn Shape> {
        let handle = comps.colliders.get(collider)?.attached_handle()?;
        self.colliders.get(handle).map(|c| c.shape())
    }

    /// Current pose of the rigid's actor, if it is in the scene.
    pub fn actor_pose(&self, comps: &PhysicsComponents, rigid: RigidId) -> Option<Pose> {
        let handle = comps.rigids.get(rigid)?.actor_handle()?;
        self.bodies.get(handle).map(|b| Pose::from_isometry(b.position()))
    }

    /// Drops cached pair state for one actor so filter changes take effect.
    fn reset_pair_filtering(&mut self, handle: RigidBodyHandle) {
        if let Some(body) = self.bodies.get_mut(handle) {
            if !body.is_fixed() {
                body.wake_up(true);
            }
        }
        self.filter_resets += 1;
    }

    fn layer_of(objects: &dyn TransformAccess, collider: &ColliderComponent) -> u32 {
        collider.effective_layer(objects.layer(collider.game_object()).unwrap_or(0))
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    /// Adds the rigid's actor to the scene, creating it at the transform's pose if needed.
    ///
    /// Returns `Ok(false)` when already registered.
    pub fn register_rigid(
        &mut self,
        comps: &mut PhysicsComponents,
        objects: &dyn TransformAccess,
        rigid: RigidId,
    ) -> std::result::Result<bool, StaleHandle> {
        if self.registered.contains(&rigid) {
            return Ok(false);
        }
        let rb = comps.rigids.get_mut(rigid).ok_or(StaleHandle::Rigid(rigid))?;
        let go = rb.game_object();
        let pose = objects.world_pose(go).ok_or(StaleHandle::GameObject(go))?;

        if rb.actor_handle().is_none() {
            if !rb.has_actor() {
                rb.create_actor(rigid, pose);
            }
            if let Some(body) = rb.take_detached_actor() {
                let handle = self.bodies.insert(body);
                rb.mark_in_scene(handle);
            }
        }
        self.registered.insert(rigid);
        log::trace!("registered {:?} for {:?}", rigid, go);
        Ok(true)
    }

    /// Detaches every owned collider and destroys the actor.
    ///
    /// Works from bookkeeping alone, so a destroyed game object doesn't block cleanup.
    pub fn unregister_rigid(&mut self, comps: &mut PhysicsComponents, rigid: RigidId) -> bool {
        let owned: SmallVec<[ColliderId; 4]> = self.colliders_of(rigid).into();
        for collider in owned {
            self.detach_collider(comps, collider);
        }
        if let Some(rb) = comps.rigids.get_mut(rigid) {
            if let Some(handle) = rb.actor_handle() {
                self.bodies.remove(
                    handle,
                    &mut self.islands,
                    &mut self.colliders,
                    &mut self.impulse_joints,
                    &mut self.multibody_joints,
                    true,
                );
            }
            rb.destroy_actor();
        }
        let was = self.registered.remove(&rigid);
        log::trace!("unregistered {:?} (was registered: {})", rigid, was);
        was
    }

    // -------------------------------------------------------------------------
    // Attachment
    // -------------------------------------------------------------------------

    /// Attaches `collider` to `rigid`, moving it off any previous owner first.
    pub fn attach_collider(
        &mut self,
        comps: &mut PhysicsComponents,
        objects: &dyn TransformAccess,
        matrix: &CollisionMatrix,
        rigid: RigidId,
        collider: ColliderId,
    ) -> Result<()> {
        debug_assert!(
            self.registered.contains(&rigid),
            "attach to unregistered rigid {rigid:?}"
        );
        if !self.registered.contains(&rigid) {
            return Err(Error::RigidNotRegistered(rigid));
        }
        let actor = comps
            .rigids
            .get(rigid)
            .and_then(|rb| rb.actor_handle())
            .ok_or(StaleHandle::Rigid(rigid))?;
        if !comps.colliders.contains(collider) {
            return Err(StaleHandle::Collider(collider).into());
        }

        match self.attachments.owner(collider) {
            Some(owner) if owner == rigid => return Ok(()),
            Some(_) => {
                self.detach_collider(comps, collider);
            }
            None => {}
        }

        let col = comps
            .colliders
            .get_mut(collider)
            .ok_or(StaleHandle::Collider(collider))?;
        if !col.has_shape() {
            col.build_shape(collider)?;
        } else if col.needs_rebuild() {
            if let Err(e) = col.build_shape(collider) {
                log::error!("rebuild of {:?} on attach failed, keeping previous shape: {}", collider, e);
            }
        }
        let Some(mut native) = col.take_detached() else {
            return Err(StaleHandle::Collider(collider).into());
        };
        let mode = col.mode();
        let layer = Self::layer_of(objects, col);
        filter::configure_collider(&mut native, matrix.make_sim_filter(layer), mode);

        let handle = self
            .colliders
            .insert_with_parent(native, actor, &mut self.bodies);
        col.mark_attached(handle);
        col.clear_filter_dirty();
        self.shapes.insert(
            handle,
            ShapeEntry {
                collider,
                game_object: col.game_object(),
                trigger: mode == ShapeMode::Trigger,
            },
        );
        self.attachments.link(collider, rigid);
        if let Some(rb) = comps.rigids.get_mut(rigid) {
            rb.mark_mass_dirty();
        }
        self.reset_pair_filtering(actor);
        log::trace!("attached {:?} to {:?}", collider, rigid);
        Ok(())
    }

    /// Detaches from whichever rigid currently owns `collider`. No-op if unattached.
    pub fn detach_collider(&mut self, comps: &mut PhysicsComponents, collider: ColliderId) -> bool {
        let Some(owner) = self.attachments.unlink(collider) else {
            return false;
        };
        let handle = comps
            .colliders
            .get(collider)
            .and_then(|c| c.attached_handle())
            .or_else(|| self.shapes.handle_of(collider));

        if let Some(handle) = handle {
            let removed =
                self.colliders
                    .remove(handle, &mut self.islands, &mut self.bodies, true);
            self.shapes.retire(handle);
            if let Some(col) = comps.colliders.get_mut(collider) {
                match removed {
                    Some(native) => col.store_detached(native),
                    None => col.release_shape(),
                }
            }
        }
        if let Some(rb) = comps.rigids.get_mut(owner) {
            rb.mark_mass_dirty();
        }
        log::trace!("detached {:?} from {:?}", collider, owner);
        true
    }

    // -------------------------------------------------------------------------
    // Filters & geometry
    // -------------------------------------------------------------------------

    /// Recomputes filter data for attached colliders (all of them, or only filter-dirty ones),
    /// then resets pair filtering once per touched actor. Returns the number of resets.
    pub fn reapply_filters(
        &mut self,
        comps: &mut PhysicsComponents,
        objects: &dyn TransformAccess,
        matrix: &CollisionMatrix,
        only_dirty: bool,
    ) -> usize {
        let mut touched: HashSet<RigidBodyHandle> = HashSet::new();
        let attached: Vec<(ColliderId, RigidId)> = self
            .attachments
            .owner_by_collider
            .iter()
            .map(|(c, r)| (*c, *r))
            .collect();

        for (collider, rigid) in attached {
            let Some(col) = comps.colliders.get_mut(collider) else {
                continue;
            };
            if only_dirty && !col.is_filter_dirty() {
                continue;
            }
            let Some(handle) = col.attached_handle() else {
                continue;
            };
            let layer = Self::layer_of(objects, col);
            let mode = col.mode();
            if let Some(native) = self.colliders.get_mut(handle) {
                filter::configure_collider(native, matrix.make_sim_filter(layer), mode);
            }
            if let Some(entry) = self.shapes.live.get_mut(&handle) {
                entry.trigger = mode == ShapeMode::Trigger;
            }
            col.clear_filter_dirty();
            if let Some(actor) = comps.rigids.get_mut(rigid).and_then(|rb| {
                rb.mark_mass_dirty();
                rb.actor_handle()
            }) {
                touched.insert(actor);
            }
        }

        let resets = touched.len();
        for actor in touched {
            self.reset_pair_filtering(actor);
        }
        resets
    }

    /// In-place resize for a geometry-dirty collider. `Ok(false)` when there was nothing to do.
    pub fn update_collider_geometry(
        &mut self,
        comps: &mut PhysicsComponents,
        collider: ColliderId,
    ) -> Result<bool> {
        let col = comps
            .colliders
            .get_mut(collider)
            .ok_or(StaleHandle::Collider(collider))?;
        if !col.is_geometry_dirty() || !col.has_shape() {
            return Ok(false);
        }
        let geometry = col.geometry();
        let result = match col.attached_handle() {
            Some(handle) => match self.colliders.get_mut(handle) {
                Some(native) => ColliderComponent::update_geometry(native, &geometry),
                None => Err(StaleHandle::Collider(collider).into()),
            },
            None => match col.detached_mut() {
                Some(native) => ColliderComponent::update_geometry(native, &geometry),
                None => Ok(()),
            },
        };
        // A failed resize keeps the previous shape and is not retried every step.
        col.clear_geometry_dirty();
        result?;

        if let Some(rb) = self
            .attachments
            .owner(collider)
            .and_then(|owner| comps.rigids.get_mut(owner))
        {
            rb.mark_mass_dirty();
        }
        Ok(true)
    }

    /// Replaces the collider object. On a build failure the previous shape is re-attached.
    pub fn rebuild_collider(
        &mut self,
        comps: &mut PhysicsComponents,
        objects: &dyn TransformAccess,
        matrix: &CollisionMatrix,
        collider: ColliderId,
    ) -> Result<()> {
        if !comps.colliders.contains(collider) {
            return Err(StaleHandle::Collider(collider).into());
        }
        let owner = self.attachments.owner(collider);
        if owner.is_some() {
            self.detach_collider(comps, collider);
        }

        let built = comps
            .colliders
            .get_mut(collider)
            .ok_or(StaleHandle::Collider(collider))
            .map_err(Error::from)
            .and_then(|col| col.build_shape(collider));
        if let Err(e) = &built {
            log::error!("rebuild of {:?} failed, keeping previous shape: {}", collider, e);
        }

        if let Some(owner) = owner {
            self.attach_collider(comps, objects, matrix, owner, collider)?;
        }
        built
    }

    // -------------------------------------------------------------------------
    // Type change
    // -------------------------------------------------------------------------

    /// Replaces the actor according to the rigid's pending type-change request.
    ///
    /// Owned colliders keep their existing collider objects and are re-attached to the new
    /// actor. Returns `Ok(false)` when no request was pending.
    pub fn change_rigid_type(
        &mut self,
        comps: &mut PhysicsComponents,
        objects: &dyn TransformAccess,
        matrix: &CollisionMatrix,
        rigid: RigidId,
    ) -> Result<bool> {
        let rb = comps.rigids.get(rigid).ok_or(StaleHandle::Rigid(rigid))?;
        if rb.pending_type_change().is_none() {
            return Ok(false);
        }
        let was_registered = self.registered.contains(&rigid);
        let owned: SmallVec<[ColliderId; 4]> = self.colliders_of(rigid).into();
        for collider in &owned {
            self.detach_collider(comps, *collider);
        }

        let rb = comps.rigids.get_mut(rigid).ok_or(StaleHandle::Rigid(rigid))?;
        if let Some(handle) = rb.actor_handle() {
            self.bodies.remove(
                handle,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            );
        }
        rb.destroy_actor();
        let Some(request) = rb.take_type_change() else {
            return Ok(false);
        };
        rb.create_actor(rigid, request.pose);

        if was_registered {
            if let Some(body) = rb.take_detached_actor() {
                let handle = self.bodies.insert(body);
                rb.mark_in_scene(handle);
            }
            for collider in owned {
                if let Err(e) = self.attach_collider(comps, objects, matrix, rigid, collider) {
                    log::debug!("re-attach of {:?} after type change skipped: {}", collider, e);
                }
            }
        }
        log::debug!(
            "{:?} is now {:?} (kinematic: {})",
            rigid,
            request.new_type,
            request.is_kinematic
        );
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Synchronization
    // -------------------------------------------------------------------------

    /// Copies engine-side state of every registered rigid into its actor.
    pub fn push_rigids_to_physics(
        &mut self,
        comps: &mut PhysicsComponents,
        objects: &dyn TransformAccess,
    ) {
        for &rigid in &self.registered {
            let shapes: SmallVec<[ShapeMass; 4]> = self
                .attachments
                .colliders_of(rigid)
                .iter()
                .filter_map(|cid| {
                    let col = comps.colliders.get(*cid)?;
                    Some(ShapeMass {
                        handle: col.attached_handle()?,
                        simulated: col.mode() == ShapeMode::Simulation,
                        density: col.material().density,
                    })
                })
                .collect();

            let Some(rb) = comps.rigids.get_mut(rigid) else {
                continue;
            };
            if !objects.is_valid(rb.game_object()) {
                continue;
            }
            let Some(body) = rb.actor_handle().and_then(|h| self.bodies.get_mut(h)) else {
                continue;
            };
            let transform_pose = if rb.is_kinematic() {
                objects.world_pose(rb.game_object())
            } else {
                None
            };
            rb.push_to_physics(body, &mut self.colliders, &shapes, transform_pose);
        }
    }

    /// Copies simulated poses back into transforms (dynamic, non-kinematic bodies only).
    pub fn pull_rigids_from_physics(
        &mut self,
        comps: &mut PhysicsComponents,
        objects: &mut dyn TransformAccess,
    ) {
        for &rigid in &self.registered {
            let Some(rb) = comps.rigids.get_mut(rigid) else {
                continue;
            };
            let go = rb.game_object();
            if !objects.is_valid(go) {
                continue;
            }
            let Some(body) = rb.actor_handle().and_then(|h| self.bodies.get(h)) else {
                continue;
            };
            if let Some(pose) = rb.pull_from_physics(body) {
                objects.set_world_pose(go, pose);
            }
        }
    }

    /// Writes poses blended between the last two steps.
    pub fn apply_interpolation(
        &self,
        comps: &PhysicsComponents,
        objects: &mut dyn TransformAccess,
        alpha: f32,
    ) {
        for &rigid in &self.registered {
            let Some(rb) = comps.rigids.get(rigid) else {
                continue;
            };
            if !objects.is_valid(rb.game_object()) {
                continue;
            }
            if let Some(pose) = rb.interpolated_pose(alpha) {
                objects.set_world_pose(rb.game_object(), pose);
            }
        }
    }

    /// Runs one blocking simulation step.
    pub fn step(&mut self, dt: f32) {
        self.integration_params.dt = dt as Real;
        let gravity = to_vector(self.gravity);
        self.pipeline.step(
            &gravity,
            &self.integration_params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &self.sink,
        );
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    pub fn drain_events(&self) -> (Vec<RawContact>, Vec<RawTrigger>) {
        (self.sink.drain_contacts(), self.sink.drain_triggers())
    }

    /// Resolves a Rapier handle to its engine collider through the collider's `user_data`,
    /// falling back to the directory for shapes already removed from the set.
    fn resolve_shape(&self, comps: &PhysicsComponents, handle: ColliderHandle) -> Option<ShapeEntry> {
        if let Some(native) = self.colliders.get(handle) {
            let id = ColliderId::from_bits(native.user_data as u64);
            let col = comps.colliders.get(id)?;
            return Some(ShapeEntry {
                collider: id,
                game_object: col.game_object(),
                trigger: col.mode() == ShapeMode::Trigger,
            });
        }
        self.shapes.get(handle)
    }

    /// Resolves raw events to the game objects owning each shape. Trigger events put the
    /// trigger's owner first. Unresolvable events are dropped.
    pub fn resolve_events(
        &self,
        comps: &PhysicsComponents,
        contacts: &[RawContact],
        triggers: &[RawTrigger],
    ) -> Vec<ShapeEvent> {
        let mut out = Vec::with_capacity(contacts.len() + triggers.len());
        for c in contacts {
            let (Some(a), Some(b)) = (
                self.resolve_shape(comps, c.collider1),
                self.resolve_shape(comps, c.collider2),
            ) else {
                log::trace!("dropping unresolvable contact {:?}", c);
                continue;
            };
            out.push(ShapeEvent {
                shapes: (c.collider1, c.collider2),
                initiator: a.game_object,
                other: b.game_object,
                trigger: false,
                started: c.kind == PhysicsEventKind::ContactEnter,
            });
        }
        for t in triggers {
            let (Some(mut trigger), Some(mut other)) = (
                self.resolve_shape(comps, t.trigger),
                self.resolve_shape(comps, t.other),
            ) else {
                log::trace!("dropping unresolvable trigger {:?}", t);
                continue;
            };
            if !trigger.trigger && other.trigger {
                std::mem::swap(&mut trigger, &mut other);
            }
            debug_assert!(matches!(
                t.kind,
                PhysicsEventKind::TriggerEnter | PhysicsEventKind::TriggerExit
            ));
            out.push(ShapeEvent {
                shapes: (t.trigger, t.other),
                initiator: trigger.game_object,
                other: other.game_object,
                trigger: true,
                started: t.kind == PhysicsEventKind::TriggerEnter,
            });
        }
        out
    }

    /// Forgets handles removed before this dispatch.
    pub fn finish_dispatch(&mut self) {
        self.shapes.retired.clear();
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// What the filter would do with two attached colliders right now.
    pub fn pair_behavior(
        &self,
        comps: &PhysicsComponents,
        objects: &dyn TransformAccess,
        matrix: &CollisionMatrix,
        a: ColliderId,
        b: ColliderId,
    ) -> Option<PairBehavior> {
        let ca = comps.colliders.get(a)?;
        let cb = comps.colliders.get(b)?;
        Some(filter::filter_pair(
            (matrix.make_sim_filter(Self::layer_of(objects, ca)), ca.mode()),
            (matrix.make_sim_filter(Self::layer_of(objects, cb)), cb.mode()),
        ))
    }

    /// Closest hit along the ray among colliders visible to queries on `layer_mask`.
    ///
    /// Sees the world as of the last step.
    #[allow(clippy::too_many_arguments)]
    pub fn raycast(
        &self,
        comps: &PhysicsComponents,
        objects: &dyn TransformAccess,
        matrix: &CollisionMatrix,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        layer_mask: u32,
    ) -> Option<RaycastHit> {
        let dir = direction.try_normalize()?;
        let ray = Ray::new(Point::new(origin.x, origin.y, origin.z), to_vector(dir));

        let visible = |_: ColliderHandle, native: &rapier3d::prelude::Collider| {
            let id = ColliderId::from_bits(native.user_data as u64);
            comps.colliders.get(id).map_or(false, |col| {
                let query = matrix.make_query_filter(Self::layer_of(objects, col));
                filter::query_visible(query, col.mode(), col.query_enabled(), layer_mask)
            })
        };
        let query_filter = QueryFilter::new().predicate(&visible);

        let (handle, hit) = self.query_pipeline.cast_ray_and_get_normal(
            &self.bodies,
            &self.colliders,
            &ray,
            max_distance as Real,
            true,
            query_filter,
        )?;
        let entry = self.resolve_shape(comps, handle)?;
        let point = ray.point_at(hit.toi);
        Some(RaycastHit {
            game_object: entry.game_object,
            collider: entry.collider,
            point: Vec3::new(point.x, point.y, point.z),
            normal: from_vector(&hit.normal),
            distance: hit.toi,
        })
    }

    /// Debug-draw descriptions for every attached collider.
    pub fn debug_shapes(&self, comps: &PhysicsComponents) -> Vec<DebugShapeDesc> {
        self.attachments
            .owner_by_collider
            .iter()
            .filter_map(|(cid, rid)| {
                let col = comps.colliders.get(*cid)?;
                let owner_pose = self.actor_pose(comps, *rid)?;
                Some(col.debug_shape_desc(owner_pose))
            })
            .collect()
    }
}
