#![cfg(not(target_arch = "wasm32"))]

use anyhow::Context;
use glam::Vec3;
use log::{info, LevelFilter};

use slop_physics::{
    ColliderDesc, PhysicsConfig, PhysicsEventKind, PhysicsManager, RigidDesc, Scene, ShapeMode,
    Transform,
};

const FRAME_DT: f32 = 1.0 / 60.0;
const FRAMES: u32 = 180;

fn main() -> anyhow::Result<()> {
    setup_diagnostics();

    // Optional JSON config as the first argument.
    let config = match std::env::args().nth(1) {
        Some(path) => PhysicsConfig::load(&path)
            .with_context(|| format!("failed to load physics config from {path}"))?,
        None => PhysicsConfig::default(),
    };

    let mut scene = Scene::new();
    let mut physics = PhysicsManager::with_config(config).context("physics init failed")?;

    let ground = scene.spawn("ground", Transform::from_position(Vec3::new(0.0, -0.5, 0.0)));
    physics.add_collider(&scene, ground, ColliderDesc::cuboid(Vec3::new(20.0, 0.5, 20.0)))?;

    let zone = scene.spawn("pickup_zone", Transform::from_position(Vec3::new(0.0, 2.0, 0.0)));
    physics.add_collider(
        &scene,
        zone,
        ColliderDesc::cuboid(Vec3::splat(1.0)).with_mode(ShapeMode::Trigger),
    )?;

    let crate_go = scene.spawn("crate", Transform::from_position(Vec3::new(0.0, 6.0, 0.0)));
    let crate_rigid = physics.add_rigid_body(&scene, crate_go, RigidDesc::dynamic().with_mass(10.0))?;
    physics.add_collider(&scene, crate_go, ColliderDesc::cuboid(Vec3::splat(0.5)))?;

    for frame in 0..FRAMES {
        physics.update(FRAME_DT, &mut scene);
        for event in physics.drain_events() {
            if event.initiator != crate_go || event.kind == PhysicsEventKind::ContactStay {
                continue;
            }
            let other = scene.get(event.other).map_or("<destroyed>", |go| go.name.as_str());
            info!("frame {frame}: crate {:?} {other}", event.kind);
        }
        if frame == FRAMES / 2 {
            physics.add_impulse(crate_rigid, Vec3::new(0.0, 60.0, 0.0))?;
        }
    }

    let pose = scene
        .transform(crate_go)
        .map(|t| t.world_position())
        .context("crate vanished")?;
    let world = physics.try_scene()?;
    info!("{} bodies, {} colliders in the world", world.body_count(), world.collider_count());
    let metrics = physics.metrics();
    info!(
        "crate at {:.3?} after {} steps (avg {:.3} ms/step, {} contact / {} trigger events)",
        pose,
        metrics.steps,
        metrics.average_step_time_ms(),
        metrics.contact_events,
        metrics.trigger_events
    );
    Ok(())
}

fn setup_diagnostics() {
    env_logger::Builder::new()
        .filter_level(if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .format_timestamp_millis()
        .format_target(false)
        .parse_default_env()
        .init();
}
