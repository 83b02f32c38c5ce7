//! Rapier3D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier3D.
//! Enable with the `rapier3d` feature (on by default).
//!
//! The backend treats `ExternalForce` and `ExternalImpulse` as per-tick
//! accumulators: both are cleared in the `Preparation` phase, so each body
//! receives at most one accumulated force, torque and impulse per tick.

use bevy::prelude::*;
use bevy_rapier3d::dynamics::MassProperties;
use bevy_rapier3d::prelude::*;

use crate::backend::CharacterPhysicsBackend;
use crate::collision::GroundHit;
use crate::config::{BounceReaction, ControllerConfig};
use crate::events::BounceImpact;
use crate::state::CharacterController;
use crate::CharacterControllerSet;

/// Rapier3D physics backend for the character controller.
///
/// Uses `bevy_rapier3d` components for rigid-body access and force
/// application. The ground probe is a dedicated system that receives the
/// Rapier context as a system parameter and runs in the `Sensors` phase.
pub struct Rapier3dBackend;

impl CharacterPhysicsBackend for Rapier3dBackend {
    fn plugin() -> impl Plugin {
        Rapier3dBackendPlugin
    }

    fn has_rigid_body(world: &World, entity: Entity) -> bool {
        world.get::<RigidBody>(entity).is_some()
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Velocity>(entity)
            .map(|v| v.linvel)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            vel.linvel = velocity;
        }
    }

    fn get_angular_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Velocity>(entity)
            .map(|v| v.angvel)
            .unwrap_or(Vec3::ZERO)
    }

    fn get_rotation(world: &World, entity: Entity) -> Quat {
        world
            .get::<Transform>(entity)
            .map(|t| t.rotation)
            .or_else(|| {
                world
                    .get::<GlobalTransform>(entity)
                    .map(|t| t.to_scale_rotation_translation().1)
            })
            .unwrap_or(Quat::IDENTITY)
    }

    fn get_position(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Transform>(entity)
            .map(|t| t.translation)
            .or_else(|| {
                world
                    .get::<GlobalTransform>(entity)
                    .map(|t| t.translation())
            })
            .unwrap_or(Vec3::ZERO)
    }

    fn set_position(world: &mut World, entity: Entity, position: Vec3) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.translation = position;
        }
    }

    fn apply_force(world: &mut World, entity: Entity, force: Vec3) {
        if let Some(mut ext_force) = world.get_mut::<ExternalForce>(entity) {
            ext_force.force += force;
        }
    }

    fn apply_force_at_point(world: &mut World, entity: Entity, force: Vec3, point: Vec3) {
        let center_of_mass = world_center_of_mass(world, entity);
        if let Some(mut ext_force) = world.get_mut::<ExternalForce>(entity) {
            let at_point = ExternalForce::at_point(force, point, center_of_mass);
            ext_force.force += at_point.force;
            ext_force.torque += at_point.torque;
        }
    }

    fn apply_torque(world: &mut World, entity: Entity, torque: Vec3) {
        if let Some(mut ext_force) = world.get_mut::<ExternalForce>(entity) {
            ext_force.torque += torque;
        }
    }

    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3) {
        if let Some(mut ext_impulse) = world.get_mut::<ExternalImpulse>(entity) {
            ext_impulse.impulse += impulse;
        } else if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            // Fallback: apply as velocity change if no ExternalImpulse component
            vel.linvel += impulse;
        }
    }

    fn get_mass(world: &World, entity: Entity) -> f32 {
        world
            .get::<ReadMassProperties>(entity)
            .map(|props| props.mass)
            .filter(|m| *m > 0.0 && m.is_finite())
            .unwrap_or(1.0)
    }

    fn set_local_center_of_mass(world: &mut World, entity: Entity, local_pivot: Vec3) {
        // Rapier has no direct center-of-mass mutator: override the collider
        // mass properties with the measured mass and inertia, pivot moved.
        let Some(props) = world.get::<ReadMassProperties>(entity).map(|p| *p.get()) else {
            return;
        };
        let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
            return;
        };
        entity_mut.insert(ColliderMassProperties::MassProperties(MassProperties {
            local_center_of_mass: local_pivot,
            mass: props.mass,
            principal_inertia_local_frame: props.principal_inertia_local_frame,
            principal_inertia: props.principal_inertia,
        }));
    }
}

/// Center of mass of an entity in world space.
fn world_center_of_mass(world: &World, entity: Entity) -> Vec3 {
    let local_com = world
        .get::<ReadMassProperties>(entity)
        .map(|props| props.local_center_of_mass)
        .unwrap_or(Vec3::ZERO);
    let (position, rotation) = world
        .get::<GlobalTransform>(entity)
        .map(|t| {
            let (_, rotation, translation) = t.to_scale_rotation_translation();
            (translation, rotation)
        })
        .unwrap_or((Vec3::ZERO, Quat::IDENTITY));
    position + rotation * local_com
}

/// Plugin that sets up Rapier3D-specific systems for the character
/// controller.
pub struct Rapier3dBackendPlugin;

impl Plugin for Rapier3dBackendPlugin {
    fn build(&self, app: &mut App) {
        // Clear per-tick accumulators before any controller system runs.
        app.add_systems(
            FixedUpdate,
            clear_force_accumulators.in_set(CharacterControllerSet::Preparation),
        );

        // Ground probes, recomputed every tick.
        app.add_systems(
            FixedUpdate,
            rapier_ground_probe.in_set(CharacterControllerSet::Sensors),
        );

        // Contact forces reported by the previous solver step become bounce
        // impacts for this tick's reaction system.
        app.add_systems(
            FixedUpdate,
            emit_bounce_impacts.in_set(CharacterControllerSet::Sensors),
        );
    }
}

/// Zero the force and impulse accumulators from the previous tick.
fn clear_force_accumulators(
    mut q_forces: Query<(&mut ExternalForce, Option<&mut ExternalImpulse>)>,
) {
    for (mut force, impulse) in &mut q_forces {
        force.force = Vec3::ZERO;
        force.torque = Vec3::ZERO;
        if let Some(mut impulse) = impulse {
            impulse.impulse = Vec3::ZERO;
            impulse.torque_impulse = Vec3::ZERO;
        }
    }
}

/// Cast the downward ground probe for every character controller.
fn rapier_ground_probe(
    rapier_context: ReadRapierContext,
    mut q_controllers: Query<(
        Entity,
        &GlobalTransform,
        &ControllerConfig,
        &mut CharacterController,
    )>,
) {
    let Ok((simulation, colliders, joints, query_pipeline, rigidbody_set)) =
        rapier_context.rapier_context.get_single()
    else {
        return;
    };
    let context = RapierContext {
        simulation,
        colliders,
        joints,
        query_pipeline,
        rigidbody_set,
    };

    for (entity, transform, config, mut controller) in &mut q_controllers {
        let origin = transform.translation();
        let filter = QueryFilter::default()
            .exclude_rigid_body(entity)
            .exclude_sensors();

        controller.ground = context
            .cast_ray_and_get_normal(origin, Vec3::NEG_Y, config.probe_length, true, filter)
            .map(|(hit_entity, hit)| {
                GroundHit::new(hit.time_of_impact, hit.point, hit.normal, Some(hit_entity))
            });
    }
}

/// Translate Rapier contact-force events into bounce impacts for entities
/// carrying a [`BounceReaction`].
///
/// The contact point is approximated by the body position, which is close
/// enough at capsule scale for the logarithmic bounce force.
fn emit_bounce_impacts(
    mut contact_events: EventReader<ContactForceEvent>,
    time: Res<Time<Fixed>>,
    q_bounce: Query<(), With<BounceReaction>>,
    q_transforms: Query<&GlobalTransform>,
    mut impacts: EventWriter<BounceImpact>,
) {
    let dt = time.delta_secs().max(1.0 / 60.0);

    for event in contact_events.read() {
        let pairs = [
            (event.collider1, event.collider2, 1.0),
            (event.collider2, event.collider1, -1.0),
        ];
        for (entity, other, sign) in pairs {
            if q_bounce.get(entity).is_err() {
                continue;
            }
            let point = q_transforms
                .get(entity)
                .map(|t| t.translation())
                .unwrap_or(Vec3::ZERO);
            impacts.send(BounceImpact {
                entity,
                other: Some(other),
                impulse: event.total_force * dt,
                point,
                normal: event.max_force_direction * sign,
            });
        }
    }
}

/// Bundle of the Rapier components a character controller body needs.
#[derive(Bundle)]
pub struct Rapier3dCharacterBundle {
    /// Dynamic rigid body.
    pub rigid_body: RigidBody,
    /// Velocity accessor.
    pub velocity: Velocity,
    /// Per-tick force accumulator.
    pub external_force: ExternalForce,
    /// Per-tick impulse accumulator.
    pub external_impulse: ExternalImpulse,
    /// Mass readback for gravity cancellation.
    pub read_mass: ReadMassProperties,
}

impl Default for Rapier3dCharacterBundle {
    fn default() -> Self {
        Self {
            rigid_body: RigidBody::Dynamic,
            velocity: Velocity::default(),
            external_force: ExternalForce::default(),
            external_impulse: ExternalImpulse::default(),
            read_mass: ReadMassProperties::default(),
        }
    }
}

impl Rapier3dCharacterBundle {
    /// A dynamic body with default components.
    pub fn new() -> Self {
        Self::default()
    }
}
