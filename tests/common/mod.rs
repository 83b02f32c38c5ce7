//! Deterministic test backend.
//!
//! Integrates plain components by explicit Euler and probes an analytic
//! flat ground plane, so full-chain scenarios run without a physics engine
//! and produce bit-identical results every run.

use bevy::prelude::*;
use floating_capsule_controller::prelude::*;
use floating_capsule_controller::CharacterControllerSet;

/// The fixed timestep every dt source falls back to when the schedule is
/// driven manually.
pub const DT: f32 = 1.0 / 60.0;

/// Rigid-body stand-in integrated by the test backend.
#[derive(Component, Debug, Clone)]
pub struct TestBody {
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub mass: f32,
    pub gravity: Vec3,
    pub force: Vec3,
    pub torque: Vec3,
    pub impulse: Vec3,
}

impl Default for TestBody {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass: 1.0,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            impulse: Vec3::ZERO,
        }
    }
}

/// Analytic flat ground plane reported by the probe.
#[derive(Resource, Debug, Clone, Copy)]
pub struct GroundPlane {
    pub height: f32,
    /// Entity reported as the hit body (simulates a platform).
    pub entity: Option<Entity>,
    pub enabled: bool,
}

impl Default for GroundPlane {
    fn default() -> Self {
        Self {
            height: 0.0,
            entity: None,
            enabled: true,
        }
    }
}

pub struct TestBackend;

impl CharacterPhysicsBackend for TestBackend {
    fn plugin() -> impl Plugin {
        TestBackendPlugin
    }

    fn has_rigid_body(world: &World, entity: Entity) -> bool {
        world.get::<TestBody>(entity).is_some()
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<TestBody>(entity)
            .map(|b| b.velocity)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.velocity = velocity;
        }
    }

    fn get_angular_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<TestBody>(entity)
            .map(|b| b.angular_velocity)
            .unwrap_or(Vec3::ZERO)
    }

    fn get_rotation(world: &World, entity: Entity) -> Quat {
        world
            .get::<Transform>(entity)
            .map(|t| t.rotation)
            .unwrap_or(Quat::IDENTITY)
    }

    fn get_position(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Transform>(entity)
            .map(|t| t.translation)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_position(world: &mut World, entity: Entity, position: Vec3) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.translation = position;
        }
    }

    fn apply_force(world: &mut World, entity: Entity, force: Vec3) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.force += force;
        }
    }

    fn apply_force_at_point(world: &mut World, entity: Entity, force: Vec3, point: Vec3) {
        let position = Self::get_position(world, entity);
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.force += force;
            body.torque += (point - position).cross(force);
        }
    }

    fn apply_torque(world: &mut World, entity: Entity, torque: Vec3) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.torque += torque;
        }
    }

    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.impulse += impulse;
        }
    }

    fn get_mass(world: &World, entity: Entity) -> f32 {
        world.get::<TestBody>(entity).map(|b| b.mass).unwrap_or(1.0)
    }
}

pub struct TestBackendPlugin;

impl Plugin for TestBackendPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            FixedUpdate,
            clear_accumulators.in_set(CharacterControllerSet::Preparation),
        );
        app.add_systems(
            FixedUpdate,
            probe_ground_plane.in_set(CharacterControllerSet::Sensors),
        );
        app.add_systems(
            FixedUpdate,
            integrate_bodies.after(CharacterControllerSet::Feedback),
        );
    }
}

fn clear_accumulators(mut q_bodies: Query<&mut TestBody>) {
    for mut body in &mut q_bodies {
        body.force = Vec3::ZERO;
        body.torque = Vec3::ZERO;
        body.impulse = Vec3::ZERO;
    }
}

fn probe_ground_plane(
    plane: Option<Res<GroundPlane>>,
    mut q_controllers: Query<(&Transform, &ControllerConfig, &mut CharacterController)>,
) {
    for (transform, config, mut controller) in &mut q_controllers {
        controller.ground = plane.as_ref().filter(|p| p.enabled).and_then(|p| {
            let distance = transform.translation.y - p.height;
            if (0.0..=config.probe_length).contains(&distance) {
                let point = Vec3::new(transform.translation.x, p.height, transform.translation.z);
                Some(GroundHit::new(distance, point, Vec3::Y, p.entity))
            } else {
                None
            }
        });
    }
}

/// Explicit Euler over accumulated forces, gravity and impulses, with unit
/// rotational inertia.
fn integrate_bodies(
    time: Option<Res<Time>>,
    mut q_bodies: Query<(&mut Transform, &mut TestBody)>,
) {
    let dt = time
        .map(|t| t.delta_secs())
        .filter(|d| *d > 0.0)
        .unwrap_or(DT);

    for (mut transform, mut body) in &mut q_bodies {
        let acceleration = body.force / body.mass + body.gravity;
        let impulse_velocity = body.impulse / body.mass;
        body.velocity = body.velocity + acceleration * dt + impulse_velocity;
        transform.translation += body.velocity * dt;

        let torque = body.torque;
        body.angular_velocity += torque * dt;
        let delta = body.angular_velocity * dt;
        transform.rotation = (Quat::from_scaled_axis(delta) * transform.rotation).normalize();
    }
}

/// Build an app with the controller wired to the test backend.
pub fn create_test_app() -> App {
    let mut app = App::new();
    app.add_plugins(CharacterControllerPlugin::<TestBackend>::default());
    app.insert_resource(GroundPlane::default());
    app
}

/// Run one fixed simulation tick.
pub fn tick(app: &mut App) {
    app.world_mut().run_schedule(FixedUpdate);
}

/// Run N fixed simulation ticks.
pub fn run_ticks(app: &mut App, ticks: usize) {
    for _ in 0..ticks {
        tick(app);
    }
}

/// Spawn a character controller body at `position` with the given config.
pub fn spawn_character(app: &mut App, position: Vec3, config: ControllerConfig) -> Entity {
    app.world_mut()
        .spawn((
            Transform::from_translation(position),
            CharacterController::new(),
            config,
            MovementIntent::default(),
            TestBody::default(),
        ))
        .id()
}

/// Drain all pending events of a type.
pub fn drain_events<E: Event>(app: &mut App) -> Vec<E> {
    app.world_mut().resource_mut::<Events<E>>().drain().collect()
}
