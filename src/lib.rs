// src/lib.rs
//! Slop Engine physics core.
//!
//! Gameplay code talks to [`PhysicsManager`]; every change to the physics object graph is
//! queued and applied at fixed points of [`PhysicsManager::step_fixed`], so nothing touches
//! the Rapier world while it is simulating.

pub mod collision_matrix;
pub mod command_buffer;
pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod filter;
pub mod math;
pub mod physics;
pub mod physics_integration;
pub mod scene;
pub mod time;

pub use collision_matrix::{CollisionMatrix, FilterData, MAX_LAYERS};
pub use command_buffer::{CommandQueue, FlushPhase, PhysicsCommand, QueueStats};
pub use components::{
    ColliderComponent, ColliderDesc, ColliderGeometry, ColliderId, CombineMode, DebugShapeDesc,
    ForceMode, GeometryKind, PhysicsComponents, PhysicsMaterial, RigidBodyComponent, RigidDesc,
    RigidId, RigidType, ShapeMode,
};
pub use config::PhysicsConfig;
pub use error::{Error, Result, StaleHandle};
pub use events::{PhysicsEvent, PhysicsEventKind, SimulationEventSink};
pub use filter::PairBehavior;
pub use math::Pose;
pub use physics::{PhysScene, RaycastHit};
pub use physics_integration::{PhysicsManager, PhysicsMetrics};
pub use scene::{GameObject, GameObjectId, Scene, Transform, TransformAccess};
pub use time::FixedTimestep;
