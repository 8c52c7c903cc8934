// src/physics_integration.rs
//!
//! Physics manager: the single gameplay-facing entry point to the physics core.
//!
//! ## Model
//! - Components (`RigidBodyComponent`, `ColliderComponent`) live in generational arenas
//! - Every object-graph mutation is queued (`request_*`) and applied by `step_fixed`
//! - `step_fixed` flushes around the Rapier step in a fixed order:
//!   type changes, register/attach/rebuild, filter reapply, in-place resize, push,
//!   step, pull, drain, dispatch, detach/unregister
//! - Resolved events are buffered for the gameplay layer (`drain_events`)
//!
//! ## Usage
//! ```no_run
//! use slop_physics::{ColliderDesc, PhysicsConfig, PhysicsManager, RigidDesc, Scene, Transform};
//!
//! let mut scene = Scene::new();
//! let mut physics = PhysicsManager::with_config(PhysicsConfig::default()).unwrap();
//!
//! let crate_go = scene.spawn("crate", Transform::from_position(glam::Vec3::Y * 4.0));
//! physics.add_rigid_body(&scene, crate_go, RigidDesc::dynamic()).unwrap();
//! physics.add_collider(&scene, crate_go, ColliderDesc::cuboid(glam::Vec3::splat(0.5))).unwrap();
//!
//! physics.update(1.0 / 60.0, &mut scene);
//! for event in physics.drain_events() {
//!     println!("{:?}", event);
//! }
//! ```

use std::collections::HashMap;
use std::time::Instant;

use glam::Vec3;

use crate::collision_matrix::CollisionMatrix;
use crate::command_buffer::{CommandQueue, PhysicsCommand};
use crate::components::{
    ColliderChange, ColliderComponent, ColliderDesc, ColliderGeometry, ColliderId, DebugShapeDesc,
    ForceMode, PhysicsComponents, PhysicsMaterial, RigidBodyComponent, RigidDesc, RigidId,
    RigidType, ShapeMode,
};
use crate::config::PhysicsConfig;
use crate::error::{Error, Result, StaleHandle};
use crate::events::{ContactTracker, PhysicsEvent, PhysicsEventKind};
use crate::math::Pose;
use crate::physics::{PhysScene, RaycastHit};
use crate::scene::{GameObjectId, TransformAccess};
use crate::time::FixedTimestep;

/* -------------------------------------------------------------------------- */
/*                                 Metrics                                    */
/* -------------------------------------------------------------------------- */

/// Per-manager counters, refreshed every fixed step.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhysicsMetrics {
    /// Fixed steps run so far
    pub steps: u64,
    /// Last step time in milliseconds (all flush phases included)
    pub last_step_time_ms: f32,
    pub registered_rigids: usize,
    pub attached_colliders: usize,
    /// Commands consumed by flushes, cumulative
    pub commands_flushed: usize,
    /// Pair-filter resets, cumulative
    pub filter_resets: usize,
    /// Events handed to gameplay, cumulative
    pub contact_events: usize,
    pub trigger_events: usize,
    accumulated_step_time_ms: f32,
}

impl PhysicsMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn average_step_time_ms(&self) -> f32 {
        if self.steps > 0 {
            self.accumulated_step_time_ms / self.steps as f32
        } else {
            0.0
        }
    }
}

/* -------------------------------------------------------------------------- */
/*                                 Manager                                    */
/* -------------------------------------------------------------------------- */

pub struct PhysicsManager {
    config: PhysicsConfig,
    /// `None` until `initialize` succeeds; every step is a no-op without it.
    scene: Option<PhysScene>,
    components: PhysicsComponents,
    rigid_by_object: HashMap<GameObjectId, RigidId>,
    queue: CommandQueue,
    matrix: CollisionMatrix,
    pending_gravity: Option<Vec3>,
    timestep: FixedTimestep,
    contacts: ContactTracker,
    events: Vec<PhysicsEvent>,
    metrics: PhysicsMetrics,
}

impl PhysicsManager {
    /// Uninitialized manager. Call [`Self::initialize`] before stepping.
    pub fn new(config: PhysicsConfig) -> Self {
        let matrix = config.collision_matrix();
        let timestep = FixedTimestep::new(config.fixed_dt, config.max_steps_per_frame);
        Self {
            config,
            scene: None,
            components: PhysicsComponents::new(),
            rigid_by_object: HashMap::new(),
            queue: CommandQueue::new(),
            matrix,
            pending_gravity: None,
            timestep,
            contacts: ContactTracker::new(),
            events: Vec::new(),
            metrics: PhysicsMetrics::new(),
        }
    }

    pub fn with_config(config: PhysicsConfig) -> Result<Self> {
        let mut manager = Self::new(config);
        manager.initialize()?;
        Ok(manager)
    }

    /// Creates the physics scene. On failure the manager stays uninitialized.
    pub fn initialize(&mut self) -> Result<()> {
        match PhysScene::create(&self.config) {
            Ok(scene) => {
                log::info!(
                    "physics initialized: gravity {:?}, fixed dt {:.4}s",
                    scene.gravity(),
                    self.config.fixed_dt
                );
                self.scene = Some(scene);
                Ok(())
            }
            Err(e) => {
                log::error!("physics scene creation failed: {}", e);
                self.scene = None;
                Err(e)
            }
        }
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.scene.is_some()
    }

    /// Drops the scene and every component.
    pub fn shutdown(&mut self) {
        self.scene = None;
        self.components = PhysicsComponents::new();
        self.rigid_by_object.clear();
        self.queue.clear();
        self.contacts = ContactTracker::new();
        self.events.clear();
        self.timestep.reset();
        log::info!("physics shut down");
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    #[inline]
    pub fn scene(&self) -> Option<&PhysScene> {
        self.scene.as_ref()
    }

    pub fn try_scene(&self) -> Result<&PhysScene> {
        self.scene.as_ref().ok_or(Error::NotInitialized)
    }

    #[inline]
    pub fn components(&self) -> &PhysicsComponents {
        &self.components
    }

    #[inline]
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    #[inline]
    pub fn collision_matrix(&self) -> &CollisionMatrix {
        &self.matrix
    }

    #[inline]
    pub fn metrics(&self) -> &PhysicsMetrics {
        &self.metrics
    }

    #[inline]
    pub fn rigid(&self, rigid: RigidId) -> Option<&RigidBodyComponent> {
        self.components.rigids.get(rigid).filter(|rb| !rb.is_disposed())
    }

    #[inline]
    pub fn collider(&self, collider: ColliderId) -> Option<&ColliderComponent> {
        self.components
            .colliders
            .get(collider)
            .filter(|c| !c.is_disposed())
    }

    #[inline]
    pub fn rigid_of(&self, go: GameObjectId) -> Option<RigidId> {
        self.rigid_by_object.get(&go).copied()
    }

    fn rigid_mut(&mut self, rigid: RigidId) -> std::result::Result<&mut RigidBodyComponent, StaleHandle> {
        self.components
            .rigids
            .get_mut(rigid)
            .filter(|rb| !rb.is_disposed())
            .ok_or(StaleHandle::Rigid(rigid))
    }

    fn collider_mut(
        &mut self,
        collider: ColliderId,
    ) -> std::result::Result<&mut ColliderComponent, StaleHandle> {
        self.components
            .colliders
            .get_mut(collider)
            .filter(|c| !c.is_disposed())
            .ok_or(StaleHandle::Collider(collider))
    }

    /// Pose a type change starts from: the live actor if any, else the transform.
    fn current_pose(&self, objects: &dyn TransformAccess, rigid: RigidId) -> Option<Pose> {
        let from_actor = self
            .scene
            .as_ref()
            .and_then(|s| s.actor_pose(&self.components, rigid));
        from_actor.or_else(|| {
            let go = self.components.rigids.get(rigid)?.game_object();
            objects.world_pose(go)
        })
    }

    // =========================================================================
    // Command queue
    // =========================================================================

    pub fn request_register_rigid(&mut self, rigid: RigidId) -> bool {
        self.queue.request_register(rigid)
    }

    pub fn request_unregister_rigid(&mut self, rigid: RigidId) -> bool {
        self.queue.request_unregister(rigid)
    }

    pub fn request_attach_collider(&mut self, rigid: RigidId, collider: ColliderId) -> bool {
        let queued = self.queue.request_attach(rigid, collider);
        if queued {
            if let Some(col) = self.components.colliders.get_mut(collider) {
                col.set_owner(Some(rigid));
            }
        }
        queued
    }

    pub fn request_detach_collider(&mut self, rigid: RigidId, collider: ColliderId) -> bool {
        // A cancelled attach falls back to whoever holds the shape in the scene.
        let in_scene = self
            .scene
            .as_ref()
            .and_then(|s| s.owner_of(collider))
            .filter(|owner| *owner != rigid);
        if let Some(col) = self.components.colliders.get_mut(collider) {
            if col.owner() == Some(rigid) {
                col.set_owner(in_scene);
            }
        }
        self.queue.request_detach(rigid, collider)
    }

    pub fn request_rebuild_collider(&mut self, rigid: RigidId, collider: ColliderId) -> bool {
        self.queue.request_rebuild(rigid, collider)
    }

    pub fn request_change_rigid_type(&mut self, rigid: RigidId) -> bool {
        self.queue.request_change_type(rigid)
    }

    pub fn request_reapply_filters(&mut self) {
        self.queue.request_reapply_filters();
    }

    // =========================================================================
    // Component lifecycle
    // =========================================================================

    /// Adds a rigid body to `go` and collects the colliders already on it.
    ///
    /// A body created implicitly by a collider is promoted and takes `desc`; a second explicit
    /// body is rejected.
    pub fn add_rigid_body(
        &mut self,
        objects: &dyn TransformAccess,
        go: GameObjectId,
        desc: RigidDesc,
    ) -> Result<RigidId> {
        if !objects.is_valid(go) {
            return Err(StaleHandle::GameObject(go).into());
        }

        if let Some(&existing) = self.rigid_by_object.get(&go) {
            let implicit = self.rigid(existing).map_or(false, |rb| rb.is_implicit());
            if !implicit {
                log::warn!("{:?} already has a rigid body, discarding the new one", go);
                return Err(Error::DuplicateRigidBody(go));
            }
            let pose = self.current_pose(objects, existing);
            let rb = self.rigid_mut(existing)?;
            rb.promote();
            rb.set_mass(desc.mass);
            rb.set_damping(desc.linear_damping, desc.angular_damping);
            rb.set_use_gravity(desc.use_gravity);
            let changed = rb.request_type_change(
                desc.kind,
                desc.is_kinematic,
                pose.unwrap_or_default(),
            );
            if changed {
                self.queue.request_change_type(existing);
            }
            log::debug!("promoted implicit rigid {:?} on {:?}", existing, go);
            return Ok(existing);
        }

        let rigid = self
            .components
            .rigids
            .insert(RigidBodyComponent::new(go, desc));
        self.rigid_by_object.insert(go, rigid);
        self.queue.request_register(rigid);
        for collider in self.components.colliders_of_object(go) {
            self.request_attach_collider(rigid, collider);
        }
        log::debug!("added rigid {:?} ({:?}) to {:?}", rigid, desc.kind, go);
        Ok(rigid)
    }

    /// Detaches the rigid's colliders and queues its removal. Colliders left on the game
    /// object fall back to an implicit static body.
    pub fn remove_rigid_body(&mut self, rigid: RigidId) -> Result<()> {
        let rb = self.rigid_mut(rigid)?;
        rb.dispose();
        let go = rb.game_object();
        if self.rigid_by_object.get(&go) == Some(&rigid) {
            self.rigid_by_object.remove(&go);
        }

        let owned: Vec<ColliderId> = self
            .components
            .colliders
            .iter()
            .filter(|(_, c)| c.owner() == Some(rigid))
            .map(|(id, _)| id)
            .collect();
        for collider in &owned {
            self.request_detach_collider(rigid, *collider);
        }
        self.queue.request_unregister(rigid);

        let remaining = self.components.colliders_of_object(go);
        if !remaining.is_empty() {
            let fallback = self.implicit_rigid(go);
            for collider in remaining {
                self.request_attach_collider(fallback, collider);
            }
        }
        if self.scene.is_none() {
            self.purge_disposed();
        }
        log::debug!("removed rigid {:?} from {:?}", rigid, go);
        Ok(())
    }

    fn implicit_rigid(&mut self, go: GameObjectId) -> RigidId {
        if let Some(&rigid) = self.rigid_by_object.get(&go) {
            return rigid;
        }
        let rigid = self
            .components
            .rigids
            .insert(RigidBodyComponent::new_implicit(go));
        self.rigid_by_object.insert(go, rigid);
        self.queue.request_register(rigid);
        log::debug!("created implicit static rigid {:?} for {:?}", rigid, go);
        rigid
    }

    /// Adds a collider to `go`, creating a static rigid body if `go` has none.
    pub fn add_collider(
        &mut self,
        objects: &dyn TransformAccess,
        go: GameObjectId,
        desc: ColliderDesc,
    ) -> Result<ColliderId> {
        if !objects.is_valid(go) {
            return Err(StaleHandle::GameObject(go).into());
        }
        desc.geometry.build_shape()?;

        let collider = self
            .components
            .colliders
            .insert(ColliderComponent::new(go, desc));
        let rigid = self.implicit_rigid(go);
        self.request_attach_collider(rigid, collider);
        Ok(collider)
    }

    /// Same as [`Self::add_collider`] with the configured default material.
    pub fn add_collider_with_default_material(
        &mut self,
        objects: &dyn TransformAccess,
        go: GameObjectId,
        geometry: ColliderGeometry,
    ) -> Result<ColliderId> {
        let material = self.config.default_material;
        self.add_collider(objects, go, ColliderDesc::new(geometry).with_material(material))
    }

    /// Queues detachment. An implicit rigid losing its last collider is removed as well.
    pub fn remove_collider(&mut self, collider: ColliderId) -> Result<()> {
        let col = self.collider_mut(collider)?;
        col.dispose();
        let owner = col.owner();

        if let Some(rigid) = owner {
            self.request_detach_collider(rigid, collider);
            let implicit = self.rigid(rigid).map_or(false, |rb| rb.is_implicit());
            let still_used = self
                .components
                .colliders
                .iter()
                .any(|(_, c)| !c.is_disposed() && c.owner() == Some(rigid));
            if implicit && !still_used {
                self.remove_rigid_body(rigid)?;
            }
        }
        if self.scene.is_none() {
            self.purge_disposed();
        }
        Ok(())
    }

    /// Removes every physics component of a destroyed game object.
    pub fn notify_game_object_destroyed(&mut self, go: GameObjectId) {
        for collider in self.components.colliders_of_object(go) {
            if let Err(e) = self.remove_collider(collider) {
                log::debug!("collider cleanup for {:?}: {}", go, e);
            }
        }
        if let Some(rigid) = self.rigid_by_object.get(&go).copied() {
            if let Err(e) = self.remove_rigid_body(rigid) {
                log::debug!("rigid cleanup for {:?}: {}", go, e);
            }
        }
    }

    /// The game object's layer changed: its colliders need new filter data.
    pub fn notify_layer_changed(&mut self, go: GameObjectId) {
        for collider in self.components.colliders_of_object(go) {
            if let Some(col) = self.components.colliders.get_mut(collider) {
                col.mark_filter_dirty();
            }
        }
    }

    // =========================================================================
    // Collider properties
    // =========================================================================

    fn apply_collider_change(&mut self, collider: ColliderId, change: ColliderChange) {
        if change != ColliderChange::Rebuild {
            return;
        }
        match self.components.colliders.get(collider).and_then(|c| c.owner()) {
            Some(rigid) => {
                self.queue.request_rebuild(rigid, collider);
            }
            None => log::debug!("{:?} has no owner, rebuild deferred to attach", collider),
        }
    }

    pub fn set_collider_geometry(&mut self, collider: ColliderId, geometry: ColliderGeometry) -> Result<()> {
        let change = self.collider_mut(collider)?.set_geometry(geometry);
        self.apply_collider_change(collider, change);
        Ok(())
    }

    pub fn set_collider_local_pose(&mut self, collider: ColliderId, local_pose: Pose) -> Result<()> {
        let change = self.collider_mut(collider)?.set_local_pose(local_pose);
        self.apply_collider_change(collider, change);
        Ok(())
    }

    pub fn set_collider_material(&mut self, collider: ColliderId, material: PhysicsMaterial) -> Result<()> {
        let change = self.collider_mut(collider)?.set_material(material);
        self.apply_collider_change(collider, change);
        Ok(())
    }

    pub fn set_collider_mode(&mut self, collider: ColliderId, mode: ShapeMode) -> Result<()> {
        self.collider_mut(collider)?.set_mode(mode);
        Ok(())
    }

    pub fn set_collider_query_enabled(&mut self, collider: ColliderId, enabled: bool) -> Result<()> {
        self.collider_mut(collider)?.set_query_enabled(enabled);
        Ok(())
    }

    pub fn set_collider_layer_override(&mut self, collider: ColliderId, layer: Option<u32>) -> Result<()> {
        self.collider_mut(collider)?.set_layer_override(layer);
        Ok(())
    }

    // =========================================================================
    // Rigid body properties
    // =========================================================================

    /// Static <-> Dynamic. The actor is replaced during the next step.
    pub fn set_rigid_type(
        &mut self,
        objects: &dyn TransformAccess,
        rigid: RigidId,
        kind: RigidType,
    ) -> Result<()> {
        let kinematic = self.rigid_mut(rigid)?.is_kinematic();
        self.request_type(objects, rigid, kind, kinematic)
    }

    /// Kinematic flag changes also replace the actor.
    pub fn set_rigid_kinematic(
        &mut self,
        objects: &dyn TransformAccess,
        rigid: RigidId,
        kinematic: bool,
    ) -> Result<()> {
        let kind = self.rigid_mut(rigid)?.rigid_type();
        self.request_type(objects, rigid, kind, kinematic)
    }

    fn request_type(
        &mut self,
        objects: &dyn TransformAccess,
        rigid: RigidId,
        kind: RigidType,
        kinematic: bool,
    ) -> Result<()> {
        let pose = self.current_pose(objects, rigid).unwrap_or_default();
        if self.rigid_mut(rigid)?.request_type_change(kind, kinematic, pose) {
            self.queue.request_change_type(rigid);
        }
        Ok(())
    }

    pub fn set_rigid_mass(&mut self, rigid: RigidId, mass: f32) -> Result<()> {
        self.rigid_mut(rigid)?.set_mass(mass);
        Ok(())
    }

    pub fn set_rigid_damping(&mut self, rigid: RigidId, linear: f32, angular: f32) -> Result<()> {
        self.rigid_mut(rigid)?.set_damping(linear, angular);
        Ok(())
    }

    pub fn set_rigid_use_gravity(&mut self, rigid: RigidId, use_gravity: bool) -> Result<()> {
        self.rigid_mut(rigid)?.set_use_gravity(use_gravity);
        Ok(())
    }

    pub fn add_force(&mut self, rigid: RigidId, force: Vec3, mode: ForceMode) -> Result<()> {
        self.rigid_mut(rigid)?.add_force(force, mode);
        Ok(())
    }

    pub fn add_torque(&mut self, rigid: RigidId, torque: Vec3, mode: ForceMode) -> Result<()> {
        self.rigid_mut(rigid)?.add_torque(torque, mode);
        Ok(())
    }

    pub fn add_impulse(&mut self, rigid: RigidId, impulse: Vec3) -> Result<()> {
        self.rigid_mut(rigid)?.add_impulse(impulse);
        Ok(())
    }

    pub fn set_kinematic_target(&mut self, rigid: RigidId, pose: Pose) -> Result<()> {
        self.rigid_mut(rigid)?.set_kinematic_target(pose);
        Ok(())
    }

    pub fn wake_up(&mut self, rigid: RigidId) -> Result<()> {
        self.rigid_mut(rigid)?.wake_up();
        Ok(())
    }

    /// Moves the transform now and the actor on the next step.
    pub fn teleport(
        &mut self,
        objects: &mut dyn TransformAccess,
        rigid: RigidId,
        pose: Pose,
    ) -> Result<()> {
        let rb = self.rigid_mut(rigid)?;
        let go = rb.game_object();
        if !objects.set_world_pose(go, pose) {
            return Err(StaleHandle::GameObject(go).into());
        }
        rb.teleport(pose);
        Ok(())
    }

    // =========================================================================
    // Scene configuration
    // =========================================================================

    /// Takes effect on the next step.
    pub fn set_layer_collision(&mut self, a: u32, b: u32, enabled: bool) {
        if self.matrix.set_can_collide(a, b, enabled) {
            self.queue.request_reapply_filters();
        }
    }

    /// Takes effect on the next step.
    pub fn set_scene_gravity(&mut self, gravity: Vec3) {
        self.pending_gravity = Some(gravity);
    }

    // =========================================================================
    // Stepping
    // =========================================================================

    /// Runs as many fixed steps as `frame_dt` covers, then blends transforms with the
    /// leftover fraction. Returns the number of steps run.
    pub fn update(&mut self, frame_dt: f32, objects: &mut dyn TransformAccess) -> u32 {
        if self.scene.is_none() {
            return 0;
        }
        let steps = self.timestep.advance(frame_dt);
        let dt = self.timestep.fixed_dt();
        for _ in 0..steps {
            self.step_fixed(dt, objects);
        }
        let alpha = self.timestep.alpha();
        if let Some(scene) = &self.scene {
            scene.apply_interpolation(&self.components, objects, alpha);
        }
        steps
    }

    /// One fixed tick. Returns false (and does nothing) for `dt <= 0` or when uninitialized.
    pub fn step_fixed(&mut self, dt: f32, objects: &mut dyn TransformAccess) -> bool {
        if !(dt > 0.0) {
            return false;
        }
        let start_time = Instant::now();
        let Self {
            scene,
            components,
            queue,
            matrix,
            pending_gravity,
            contacts,
            events,
            metrics,
            ..
        } = self;
        let Some(scene) = scene.as_mut() else {
            return false;
        };

        if let Some(gravity) = pending_gravity.take() {
            scene.set_gravity(gravity);
        }

        // 1. Type changes replace actors before anything else touches them.
        let type_changes = queue.take_type_changes();
        metrics.commands_flushed += type_changes.len();
        for rigid in type_changes {
            if let Err(e) = scene.change_rigid_type(components, &*objects, matrix, rigid) {
                log::debug!("type change of {:?} skipped: {}", rigid, e);
            }
        }

        // 2. Register / attach / rebuild, FIFO.
        let pre_step = queue.take_pre_step();
        metrics.commands_flushed += pre_step.len();
        for cmd in pre_step {
            log::trace!("flush {:?}", cmd);
            let result = match cmd {
                PhysicsCommand::RegisterRigid(rigid) => scene
                    .register_rigid(components, &*objects, rigid)
                    .map(|_| ())
                    .map_err(Error::from),
                PhysicsCommand::AttachCollider { rigid, collider } => {
                    if scene.is_registered(rigid) {
                        scene.attach_collider(components, &*objects, matrix, rigid, collider)
                    } else {
                        Err(StaleHandle::Rigid(rigid).into())
                    }
                }
                PhysicsCommand::RebuildCollider { collider, .. } => {
                    scene.rebuild_collider(components, &*objects, matrix, collider)
                }
                other => {
                    log::warn!("{:?} reached the pre-step flush", other);
                    Ok(())
                }
            };
            if let Err(e) = result {
                log::debug!("skipped {:?}: {}", cmd, e);
            }
        }

        // 3. Filters: everything after a matrix change, otherwise only dirty colliders.
        let coarse = queue.take_reapply_filters();
        metrics.filter_resets += scene.reapply_filters(components, &*objects, matrix, !coarse);

        // 4. In-place resizes.
        let resized: Vec<ColliderId> = components
            .colliders
            .iter()
            .filter(|(_, c)| c.is_geometry_dirty())
            .map(|(id, _)| id)
            .collect();
        for collider in resized {
            if let Err(e) = scene.update_collider_geometry(components, collider) {
                log::error!("resize of {:?} failed: {}", collider, e);
            }
        }

        // 5-7. Push, simulate, pull.
        scene.push_rigids_to_physics(components, &*objects);
        scene.step(dt);
        scene.pull_rigids_from_physics(components, objects);

        // 8-9. Drain and dispatch.
        let (raw_contacts, raw_triggers) = scene.drain_events();
        let resolved = scene.resolve_events(components, &raw_contacts, &raw_triggers);
        scene.finish_dispatch();
        for event in contacts.advance(&resolved) {
            match event.kind {
                PhysicsEventKind::TriggerEnter | PhysicsEventKind::TriggerExit => {
                    metrics.trigger_events += 2
                }
                _ => metrics.contact_events += 2,
            }
            events.push(event);
            events.push(PhysicsEvent {
                initiator: event.other,
                other: event.initiator,
                kind: event.kind,
            });
        }

        // 10. Detach, then unregister.
        let post_step = queue.take_post_step();
        metrics.commands_flushed += post_step.len();
        for cmd in post_step {
            log::trace!("flush {:?}", cmd);
            match cmd {
                PhysicsCommand::DetachCollider { rigid, collider } => {
                    let current = scene.owner_of(collider);
                    let moved_on = current.is_some()
                        && current != Some(rigid)
                        && components
                            .colliders
                            .get(collider)
                            .map_or(false, |c| !c.is_disposed() && c.owner() == current);
                    if moved_on {
                        log::trace!("{:?} already moved to {:?}", collider, current);
                        continue;
                    }
                    scene.detach_collider(components, collider);
                }
                PhysicsCommand::UnregisterRigid(rigid) => {
                    scene.unregister_rigid(components, rigid);
                    queue.clear_pending_unregister(rigid);
                }
                other => log::warn!("{:?} reached the post-step flush", other),
            }
        }

        metrics.steps += 1;
        metrics.registered_rigids = scene.registered_count();
        metrics.attached_colliders = scene.attached_count();
        let elapsed = start_time.elapsed().as_secs_f32() * 1000.0;
        metrics.last_step_time_ms = elapsed;
        metrics.accumulated_step_time_ms += elapsed;

        self.purge_disposed();
        true
    }

    /// Frees disposed components once the scene no longer references them.
    fn purge_disposed(&mut self) {
        let scene = self.scene.as_ref();
        let colliders: Vec<ColliderId> = self
            .components
            .colliders
            .iter()
            .filter(|(id, c)| c.is_disposed() && scene.map_or(true, |s| s.owner_of(*id).is_none()))
            .map(|(id, _)| id)
            .collect();
        for id in colliders {
            self.components.colliders.remove(id);
        }

        let rigids: Vec<RigidId> = self
            .components
            .rigids
            .iter()
            .filter(|(id, rb)| {
                rb.is_disposed()
                    && !self.queue.is_pending_unregister(*id)
                    && scene.map_or(true, |s| !s.is_registered(*id))
            })
            .map(|(id, _)| id)
            .collect();
        for id in rigids {
            self.components.rigids.remove(id);
        }
    }

    // =========================================================================
    // Events & queries
    // =========================================================================

    /// Hands every dispatched event to the caller.
    pub fn drain_events(&mut self) -> Vec<PhysicsEvent> {
        std::mem::take(&mut self.events)
    }

    #[inline]
    pub fn pending_events(&self) -> &[PhysicsEvent] {
        &self.events
    }

    pub fn raycast(
        &self,
        objects: &dyn TransformAccess,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        layer_mask: u32,
    ) -> Option<RaycastHit> {
        self.scene.as_ref()?.raycast(
            &self.components,
            objects,
            &self.matrix,
            origin,
            direction,
            max_distance,
            layer_mask,
        )
    }

    pub fn debug_shapes(&self) -> Vec<DebugShapeDesc> {
        self.scene
            .as_ref()
            .map(|s| s.debug_shapes(&self.components))
            .unwrap_or_default()
    }
}

/* -------------------------------------------------------------------------- */
/*                                   Tests                                    */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Scene, Transform};
    use glam::Quat;

    const DT: f32 = 1.0 / 60.0;

    fn zero_g() -> (Scene, PhysicsManager) {
        let config = PhysicsConfig {
            gravity: [0.0; 3],
            ..PhysicsConfig::default()
        };
        (Scene::new(), PhysicsManager::with_config(config).unwrap())
    }

    fn cube() -> ColliderDesc {
        ColliderDesc::cuboid(Vec3::splat(0.5))
    }

    fn count(events: &[PhysicsEvent], kind: PhysicsEventKind) -> usize {
        events.iter().filter(|e| e.kind == kind).count()
    }

    #[test]
    fn step_is_a_noop_without_scene_or_time() {
        let mut scene = Scene::new();
        let mut uninit = PhysicsManager::new(PhysicsConfig::default());
        assert!(!uninit.step_fixed(DT, &mut scene));
        assert!(matches!(uninit.try_scene(), Err(Error::NotInitialized)));

        let (mut scene, mut physics) = zero_g();
        assert!(!physics.step_fixed(0.0, &mut scene));
        assert!(!physics.step_fixed(-1.0, &mut scene));
        assert!(physics.step_fixed(DT, &mut scene));
    }

    #[test]
    fn invalid_config_leaves_manager_uninitialized() {
        let mut physics = PhysicsManager::new(PhysicsConfig {
            fixed_dt: 0.0,
            ..PhysicsConfig::default()
        });
        assert!(physics.initialize().is_err());
        assert!(!physics.is_initialized());
    }

    #[test]
    fn resting_box_keeps_its_pose_at_zero_gravity() {
        let (mut scene, mut physics) = zero_g();
        let pose = Pose::new(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_y(0.4));
        let go = scene.spawn("box", Transform::IDENTITY);
        scene.set_world_pose(go, pose);
        let rigid = physics.add_rigid_body(&scene, go, RigidDesc::dynamic()).unwrap();
        physics.add_collider(&scene, go, cube()).unwrap();

        assert!(physics.step_fixed(DT, &mut scene));

        let actor = physics
            .scene()
            .unwrap()
            .actor_pose(physics.components(), rigid)
            .unwrap();
        assert!(actor.approx_eq(&pose, 1e-4));
        assert!(scene.world_pose(go).unwrap().approx_eq(&pose, 1e-4));
    }

    #[test]
    fn teleport_reads_back_after_step() {
        let (mut scene, mut physics) = zero_g();
        let go = scene.spawn("probe", Transform::IDENTITY);
        let rigid = physics
            .add_rigid_body(&scene, go, RigidDesc::dynamic().with_gravity(false))
            .unwrap();
        physics.add_collider(&scene, go, cube()).unwrap();
        physics.step_fixed(DT, &mut scene);

        let target = Pose::new(Vec3::new(-4.0, 7.5, 2.0), Quat::from_rotation_x(1.2));
        physics.teleport(&mut scene, rigid, target).unwrap();
        physics.step_fixed(DT, &mut scene);

        let t = scene.transform(go).unwrap();
        assert!(t.world_position().abs_diff_eq(target.position, 1e-4));
        assert!(scene.world_pose(go).unwrap().approx_eq(&target, 1e-4));
    }

    #[test]
    fn non_colliding_layers_never_report_contacts() {
        let (mut scene, mut physics) = zero_g();
        physics.set_layer_collision(1, 2, false);

        let a = scene.spawn_on_layer("a", Transform::IDENTITY, 1);
        let b = scene.spawn_on_layer("b", Transform::from_position(Vec3::X * 0.5), 2);
        for go in [a, b] {
            physics.add_rigid_body(&scene, go, RigidDesc::dynamic()).unwrap();
            physics.add_collider(&scene, go, cube()).unwrap();
        }
        let mut events = Vec::new();
        for _ in 0..10 {
            physics.step_fixed(DT, &mut scene);
            events.extend(physics.drain_events());
        }
        assert!(events.is_empty(), "{:?}", events);
        assert!(scene.world_pose(a).unwrap().position.abs_diff_eq(Vec3::ZERO, 1e-4));
    }

    #[test]
    fn overlapping_colliding_layers_report_enter_both_ways() {
        let (mut scene, mut physics) = zero_g();
        let a = scene.spawn_on_layer("a", Transform::IDENTITY, 1);
        let b = scene.spawn_on_layer("b", Transform::from_position(Vec3::X * 0.5), 3);
        for go in [a, b] {
            physics.add_rigid_body(&scene, go, RigidDesc::dynamic()).unwrap();
            physics.add_collider(&scene, go, cube()).unwrap();
        }
        let mut events = Vec::new();
        for _ in 0..3 {
            physics.step_fixed(DT, &mut scene);
            events.extend(physics.drain_events());
        }
        assert!(events.contains(&PhysicsEvent {
            initiator: a,
            other: b,
            kind: PhysicsEventKind::ContactEnter
        }));
        assert!(events.contains(&PhysicsEvent {
            initiator: b,
            other: a,
            kind: PhysicsEventKind::ContactEnter
        }));
    }

    #[test]
    fn resting_contact_reports_stay() {
        let config = PhysicsConfig::default();
        let mut scene = Scene::new();
        let mut physics = PhysicsManager::with_config(config).unwrap();

        let ground = scene.spawn("ground", Transform::from_position(Vec3::new(0.0, -0.5, 0.0)));
        physics
            .add_collider(&scene, ground, ColliderDesc::cuboid(Vec3::new(10.0, 0.5, 10.0)))
            .unwrap();
        let crate_go = scene.spawn("crate", Transform::from_position(Vec3::new(0.0, 0.49, 0.0)));
        physics.add_rigid_body(&scene, crate_go, RigidDesc::dynamic()).unwrap();
        physics.add_collider(&scene, crate_go, cube()).unwrap();

        let mut events = Vec::new();
        for _ in 0..10 {
            physics.step_fixed(DT, &mut scene);
            events.extend(physics.drain_events());
        }
        assert!(count(&events, PhysicsEventKind::ContactEnter) >= 2);
        assert!(count(&events, PhysicsEventKind::ContactStay) > 0);
        assert!(events
            .iter()
            .any(|e| e.kind == PhysicsEventKind::ContactStay && e.initiator == ground));
    }

    #[test]
    fn trigger_volume_reports_both_participants() {
        let (mut scene, mut physics) = zero_g();
        let zone = scene.spawn("zone", Transform::IDENTITY);
        physics
            .add_collider(
                &scene,
                zone,
                ColliderDesc::cuboid(Vec3::splat(2.0)).with_mode(ShapeMode::Trigger),
            )
            .unwrap();
        let ball = scene.spawn("ball", Transform::IDENTITY);
        physics.add_rigid_body(&scene, ball, RigidDesc::dynamic()).unwrap();
        physics.add_collider(&scene, ball, ColliderDesc::ball(0.25)).unwrap();

        let mut events = Vec::new();
        for _ in 0..3 {
            physics.step_fixed(DT, &mut scene);
            events.extend(physics.drain_events());
        }
        assert!(events.contains(&PhysicsEvent {
            initiator: zone,
            other: ball,
            kind: PhysicsEventKind::TriggerEnter
        }));
        assert!(events.contains(&PhysicsEvent {
            initiator: ball,
            other: zone,
            kind: PhysicsEventKind::TriggerEnter
        }));
        assert_eq!(count(&events, PhysicsEventKind::ContactEnter), 0);
        // The sensor doesn't push the ball out.
        assert!(scene.world_pose(ball).unwrap().position.abs_diff_eq(Vec3::ZERO, 1e-4));
    }

    #[test]
    fn type_change_keeps_existing_shapes() {
        let (mut scene, mut physics) = zero_g();
        let go = scene.spawn("door", Transform::from_position(Vec3::Y));
        let rigid = physics.add_rigid_body(&scene, go, RigidDesc::fixed()).unwrap();
        let c1 = physics.add_collider(&scene, go, cube()).unwrap();
        let c2 = physics.add_collider(&scene, go, ColliderDesc::ball(0.3)).unwrap();
        physics.step_fixed(DT, &mut scene);

        physics.set_rigid_type(&scene, rigid, RigidType::Dynamic).unwrap();
        assert!(physics.queue().iter().any(|c| *c == PhysicsCommand::ChangeRigidType(rigid)));
        physics.step_fixed(DT, &mut scene);

        assert_eq!(physics.rigid(rigid).unwrap().rigid_type(), RigidType::Dynamic);
        let phys = physics.scene().unwrap();
        for c in [c1, c2] {
            assert!(physics.collider(c).unwrap().attached_handle().is_some());
            assert_eq!(phys.owner_of(c), Some(rigid));
        }
        assert_eq!(phys.body_count(), 1);
        assert_eq!(phys.collider_count(), 2);
        assert!(scene.world_pose(go).unwrap().position.abs_diff_eq(Vec3::Y, 1e-4));
    }

    #[test]
    fn second_attach_wins_ownership() {
        let (mut scene, mut physics) = zero_g();
        let a = scene.spawn("a", Transform::IDENTITY);
        let b = scene.spawn("b", Transform::from_position(Vec3::X * 3.0));
        let ra = physics.add_rigid_body(&scene, a, RigidDesc::dynamic()).unwrap();
        let rb = physics.add_rigid_body(&scene, b, RigidDesc::dynamic()).unwrap();
        let col = physics.add_collider(&scene, a, cube()).unwrap();
        physics.step_fixed(DT, &mut scene);
        assert_eq!(physics.scene().unwrap().owner_of(col), Some(ra));

        physics.request_attach_collider(rb, col);
        physics.step_fixed(DT, &mut scene);

        let phys = physics.scene().unwrap();
        assert_eq!(phys.owner_of(col), Some(rb));
        assert!(phys.colliders_of(ra).is_empty());
        assert_eq!(phys.colliders_of(rb), &[col]);
    }

    #[test]
    fn unregister_wins_over_later_requests() {
        let (mut scene, mut physics) = zero_g();
        let go = scene.spawn("crate", Transform::IDENTITY);
        let rigid = physics.add_rigid_body(&scene, go, RigidDesc::dynamic()).unwrap();
        let col = physics.add_collider(&scene, go, cube()).unwrap();
        physics.step_fixed(DT, &mut scene);
        assert!(physics.scene().unwrap().is_registered(rigid));

        physics.request_unregister_rigid(rigid);
        physics.request_attach_collider(rigid, col);
        physics.request_register_rigid(rigid);
        assert_eq!(physics.queue().count_for(rigid), 1);
        physics.step_fixed(DT, &mut scene);

        let phys = physics.scene().unwrap();
        assert!(!phys.is_registered(rigid));
        assert!(phys.owner_of(col).is_none());
        assert_eq!(phys.body_count(), 0);
        assert!(!physics.queue().is_pending_unregister(rigid));
    }

    #[test]
    fn attach_then_detach_before_flush_leaves_nothing() {
        let (mut scene, mut physics) = zero_g();
        let go = scene.spawn("a", Transform::IDENTITY);
        let other = scene.spawn("b", Transform::IDENTITY);
        let rigid = physics.add_rigid_body(&scene, go, RigidDesc::dynamic()).unwrap();
        let col = physics.add_collider(&scene, other, cube()).unwrap();
        physics.step_fixed(DT, &mut scene);
        let home = physics.scene().unwrap().owner_of(col);
        assert!(home.is_some());

        physics.request_attach_collider(rigid, col);
        physics.request_detach_collider(rigid, col);
        assert_eq!(physics.queue().count_for(rigid), 0);
        assert_eq!(physics.collider(col).unwrap().owner(), home);
        physics.step_fixed(DT, &mut scene);
        assert!(physics.scene().unwrap().colliders_of(rigid).is_empty());
        assert_eq!(physics.scene().unwrap().owner_of(col), home);
    }

    #[test]
    fn duplicate_rigid_is_rejected_and_implicit_one_promoted() {
        let (mut scene, mut physics) = zero_g();
        let go = scene.spawn("wall", Transform::IDENTITY);
        let col = physics.add_collider(&scene, go, cube()).unwrap();
        let implicit = physics.rigid_of(go).unwrap();
        assert!(physics.rigid(implicit).unwrap().is_implicit());
        physics.step_fixed(DT, &mut scene);

        let promoted = physics.add_rigid_body(&scene, go, RigidDesc::dynamic()).unwrap();
        assert_eq!(promoted, implicit);
        assert!(matches!(
            physics.add_rigid_body(&scene, go, RigidDesc::dynamic()),
            Err(Error::DuplicateRigidBody(g)) if g == go
        ));
        physics.step_fixed(DT, &mut scene);

        let rb = physics.rigid(promoted).unwrap();
        assert_eq!(rb.rigid_type(), RigidType::Dynamic);
        assert!(!rb.is_implicit());
        assert_eq!(physics.scene().unwrap().owner_of(col), Some(promoted));
    }

    #[test]
    fn removing_last_collider_removes_implicit_rigid() {
        let (mut scene, mut physics) = zero_g();
        let go = scene.spawn("rock", Transform::IDENTITY);
        let col = physics.add_collider(&scene, go, cube()).unwrap();
        let rigid = physics.rigid_of(go).unwrap();
        physics.step_fixed(DT, &mut scene);

        physics.remove_collider(col).unwrap();
        assert!(physics.remove_collider(col).unwrap_err().is_stale());
        physics.step_fixed(DT, &mut scene);

        assert!(physics.rigid_of(go).is_none());
        assert!(physics.components().rigids.get(rigid).is_none());
        assert!(physics.components().colliders.get(col).is_none());
        assert_eq!(physics.scene().unwrap().body_count(), 0);
    }

    #[test]
    fn destroyed_game_object_is_cleaned_up() {
        let (mut scene, mut physics) = zero_g();
        let go = scene.spawn("barrel", Transform::IDENTITY);
        physics.add_rigid_body(&scene, go, RigidDesc::dynamic()).unwrap();
        physics.add_collider(&scene, go, cube()).unwrap();
        physics.add_collider(&scene, go, ColliderDesc::capsule(0.2, 0.5)).unwrap();
        physics.step_fixed(DT, &mut scene);

        scene.destroy(go);
        physics.notify_game_object_destroyed(go);
        physics.step_fixed(DT, &mut scene);

        let phys = physics.scene().unwrap();
        assert_eq!(phys.body_count(), 0);
        assert_eq!(phys.collider_count(), 0);
        assert!(physics.components().rigids.is_empty());
        assert!(physics.components().colliders.is_empty());
    }

    #[test]
    fn stale_requests_are_skipped_silently() {
        let (mut scene, mut physics) = zero_g();
        let go = scene.spawn("ghost", Transform::IDENTITY);
        physics.add_rigid_body(&scene, go, RigidDesc::dynamic()).unwrap();
        physics.add_collider(&scene, go, cube()).unwrap();
        // Destroyed without notifying physics.
        scene.destroy(go);
        assert!(physics.step_fixed(DT, &mut scene));
        assert_eq!(physics.scene().unwrap().body_count(), 0);
    }

    #[test]
    fn same_variant_resize_happens_in_place() {
        let (mut scene, mut physics) = zero_g();
        let go = scene.spawn("ball", Transform::IDENTITY);
        let col = physics.add_collider(&scene, go, ColliderDesc::ball(0.5)).unwrap();
        physics.step_fixed(DT, &mut scene);
        let handle = physics.collider(col).unwrap().attached_handle();

        physics
            .set_collider_geometry(col, ColliderGeometry::Sphere { radius: 2.0 })
            .unwrap();
        assert!(physics.queue().is_empty());
        physics.step_fixed(DT, &mut scene);
        assert_eq!(physics.collider(col).unwrap().attached_handle(), handle);
        assert!(!physics.collider(col).unwrap().is_geometry_dirty());

        physics
            .set_collider_geometry(col, ColliderGeometry::Box { half_extents: Vec3::ONE })
            .unwrap();
        assert_eq!(physics.queue().len(), 1);
        physics.step_fixed(DT, &mut scene);
        assert!(physics.collider(col).unwrap().attached_handle().is_some());
    }

    #[test]
    fn gravity_change_applies_on_next_step() {
        let (mut scene, mut physics) = zero_g();
        physics.set_scene_gravity(Vec3::new(0.0, -20.0, 0.0));
        assert_eq!(physics.scene().unwrap().gravity(), Vec3::ZERO);
        physics.step_fixed(DT, &mut scene);
        assert_eq!(physics.scene().unwrap().gravity(), Vec3::new(0.0, -20.0, 0.0));
    }

    #[test]
    fn update_runs_fixed_steps_and_interpolates() {
        let config = PhysicsConfig::default();
        let mut scene = Scene::new();
        let mut physics = PhysicsManager::with_config(config).unwrap();
        let go = scene.spawn("faller", Transform::from_position(Vec3::Y * 10.0));
        physics.add_rigid_body(&scene, go, RigidDesc::dynamic()).unwrap();
        physics.add_collider(&scene, go, ColliderDesc::ball(0.5)).unwrap();

        assert_eq!(physics.update(DT * 2.5, &mut scene), 2);
        assert_eq!(physics.metrics().steps, 2);
        assert!(scene.world_pose(go).unwrap().position.y < 10.0);
    }

    #[test]
    fn rebuild_queued_before_rigid_removal_still_lands() {
        let (mut scene, mut physics) = zero_g();
        let go = scene.spawn("barrel", Transform::IDENTITY);
        let rigid = physics.add_rigid_body(&scene, go, RigidDesc::dynamic()).unwrap();
        let col = physics.add_collider(&scene, go, cube()).unwrap();
        physics.step_fixed(DT, &mut scene);

        physics
            .set_collider_geometry(col, ColliderGeometry::Sphere { radius: 2.0 })
            .unwrap();
        physics.remove_rigid_body(rigid).unwrap();
        physics.step_fixed(DT, &mut scene);
        physics.step_fixed(DT, &mut scene);

        let fallback = physics.rigid_of(go).unwrap();
        assert_ne!(fallback, rigid);
        let phys = physics.scene().unwrap();
        assert_eq!(phys.owner_of(col), Some(fallback));
        let radius = phys
            .attached_shape(physics.components(), col)
            .and_then(|shape| shape.as_ball())
            .map(|ball| ball.radius);
        assert_eq!(radius, Some(2.0));
        assert!(!physics.collider(col).unwrap().needs_rebuild());
    }

    #[test]
    fn compound_body_keeps_touching_while_one_shape_rests() {
        let mut scene = Scene::new();
        let mut physics = PhysicsManager::with_config(PhysicsConfig::default()).unwrap();
        let ground = scene.spawn("ground", Transform::from_position(Vec3::new(0.0, -0.5, 0.0)));
        physics
            .add_collider(&scene, ground, ColliderDesc::cuboid(Vec3::new(10.0, 0.5, 10.0)))
            .unwrap();
        let bench = scene.spawn("bench", Transform::from_position(Vec3::new(0.0, 0.49, 0.0)));
        physics.add_rigid_body(&scene, bench, RigidDesc::dynamic()).unwrap();
        let left = physics
            .add_collider(
                &scene,
                bench,
                cube().with_local_pose(Pose::from_position(Vec3::new(-1.0, 0.0, 0.0))),
            )
            .unwrap();
        physics
            .add_collider(
                &scene,
                bench,
                cube().with_local_pose(Pose::from_position(Vec3::new(1.0, 0.0, 0.0))),
            )
            .unwrap();

        let between = |events: &[PhysicsEvent], kind: PhysicsEventKind| {
            events
                .iter()
                .filter(|e| e.kind == kind && e.initiator == bench && e.other == ground)
                .count()
        };

        let mut landed = Vec::new();
        for _ in 0..10 {
            physics.step_fixed(DT, &mut scene);
            landed.extend(physics.drain_events());
        }
        assert_eq!(between(&landed, PhysicsEventKind::ContactEnter), 1);
        assert_eq!(count(&landed, PhysicsEventKind::ContactEnter), 2);
        assert_eq!(between(&landed, PhysicsEventKind::ContactExit), 0);

        physics
            .set_collider_local_pose(left, Pose::from_position(Vec3::new(-1.0, 5.0, 0.0)))
            .unwrap();
        for _ in 0..3 {
            physics.step_fixed(DT, &mut scene);
            let events = physics.drain_events();
            assert_eq!(count(&events, PhysicsEventKind::ContactExit), 0, "{:?}", events);
            assert_eq!(count(&events, PhysicsEventKind::ContactEnter), 0, "{:?}", events);
            assert_eq!(between(&events, PhysicsEventKind::ContactStay), 1);
        }
    }

    #[test]
    fn collider_added_after_type_change_joins_the_new_actor() {
        let (mut scene, mut physics) = zero_g();
        let go = scene.spawn("crate", Transform::from_position(Vec3::Y));
        let rigid = physics.add_rigid_body(&scene, go, RigidDesc::fixed()).unwrap();
        let first = physics.add_collider(&scene, go, cube()).unwrap();
        physics.step_fixed(DT, &mut scene);

        physics.set_rigid_type(&scene, rigid, RigidType::Dynamic).unwrap();
        let second = physics.add_collider(&scene, go, ColliderDesc::ball(0.25)).unwrap();
        physics.step_fixed(DT, &mut scene);

        assert_eq!(physics.rigid(rigid).unwrap().rigid_type(), RigidType::Dynamic);
        let phys = physics.scene().unwrap();
        for c in [first, second] {
            assert_eq!(phys.owner_of(c), Some(rigid));
            assert!(physics.collider(c).unwrap().attached_handle().is_some());
        }
        assert_eq!(phys.colliders_of(rigid).len(), 2);
        assert_eq!(phys.body_count(), 1);
        assert_eq!(phys.collider_count(), 2);
    }

    #[test]
    fn kinematic_target_moves_the_actor_not_the_transform() {
        let (mut scene, mut physics) = zero_g();
        let go = scene.spawn("platform", Transform::IDENTITY);
        let rigid = physics.add_rigid_body(&scene, go, RigidDesc::kinematic()).unwrap();
        physics.add_collider(&scene, go, cube()).unwrap();
        physics.step_fixed(DT, &mut scene);

        let target = Pose::from_position(Vec3::X);
        physics.set_kinematic_target(rigid, target).unwrap();
        physics.step_fixed(DT, &mut scene);

        let actor = physics
            .scene()
            .unwrap()
            .actor_pose(physics.components(), rigid)
            .unwrap();
        assert!(actor.approx_eq(&target, 1e-4), "{:?}", actor);
        let position = scene.transform(go).unwrap().world_position();
        assert!(position.abs_diff_eq(Vec3::ZERO, 1e-6), "{:?}", position);
    }

    #[test]
    fn update_blends_the_last_two_steps_by_leftover_time() {
        let (mut scene, mut physics) = zero_g();
        let go = scene.spawn("puck", Transform::IDENTITY);
        let rigid = physics
            .add_rigid_body(
                &scene,
                go,
                RigidDesc::dynamic().with_mass(1.0).with_damping(0.0, 0.0),
            )
            .unwrap();
        physics.add_collider(&scene, go, ColliderDesc::ball(0.5)).unwrap();
        physics.step_fixed(DT, &mut scene);

        physics.add_impulse(rigid, Vec3::X).unwrap();
        assert_eq!(physics.update(DT * 2.5, &mut scene), 2);

        // Steps land at x = DT and x = 2 DT with alpha 0.5 in between.
        let x = scene.world_pose(go).unwrap().position.x;
        assert!((x - 1.5 * DT).abs() < 1e-4, "x = {x}");
    }
}
