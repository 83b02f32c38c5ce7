//! Core controller systems.
//!
//! These systems implement the floating-capsule controller behavior, one
//! fixed simulation tick at a time. They are generic over the physics
//! backend so different engines can be used. Per-tick order matters: the
//! ground probe (owned by the backend) must have run before
//! [`update_ground_state`], and all force application happens before the
//! external solver integrates the step.

use bevy::prelude::*;

use crate::backend::CharacterPhysicsBackend;
use crate::config::{BounceReaction, ControllerConfig, LookDirection, JUMP_STATE_TIMEOUT};
use crate::events::{
    BounceImpact, GroundedChanged, JumpTriggered, MovementChanged, PlatformChanged,
};
use crate::intent::MovementIntent;
use crate::oscillator::{shortest_rotation, Oscillator, TorsionalOscillator};
use crate::state::{yaw_angle, Airborne, CharacterController, Grounded};

/// Fixed downward probe direction shared by the ride-height spring and the
/// jump position snap.
const RAY_DIR: Vec3 = Vec3::NEG_Y;

/// Update grounded state, platform attachment and the derived timers, and
/// emit the edge events external feedback collaborators consume.
///
/// Runs right after the backend's ground probe. The grounded predicate
/// tolerates the spring's natural oscillation band so the state does not
/// flicker every tick.
pub fn update_ground_state<B: CharacterPhysicsBackend>(world: &mut World) {
    let dt = B::get_fixed_timestep(world);

    let entities: Vec<(Entity, ControllerConfig, bool)> = world
        .query::<(Entity, &ControllerConfig, Option<&MovementIntent>)>()
        .iter(world)
        .map(|(e, config, intent)| {
            (e, config.clone(), intent.map(|i| i.is_moving()).unwrap_or(false))
        })
        .collect();

    for (entity, config, has_move_input) in entities {
        let Some(hit_entity) = world
            .get::<CharacterController>(entity)
            .map(|c| c.ground.and_then(|h| h.entity))
        else {
            continue;
        };

        // A platform is a hit with a rigid body behind it; static scenery
        // keeps the character grounded but contributes no reference frame.
        let platform = hit_entity.filter(|&e| B::has_rigid_body(world, e));

        let Some(mut controller) = world.get_mut::<CharacterController>(entity) else {
            continue;
        };
        let controller = &mut *controller;

        let grounded = controller.compute_grounded(&config);
        controller.grounded = grounded;

        if grounded {
            controller.jump.time_since_ungrounded = 0.0;
            if controller.jump.time_since_last_jump > JUMP_STATE_TIMEOUT {
                controller.jump.is_jumping = false;
            }
        } else {
            controller.jump.time_since_ungrounded += dt;
        }

        let platform_changed = controller.platform != platform;
        controller.platform = platform;

        let grounded_edge = grounded != controller.prev_grounded;
        controller.prev_grounded = grounded;

        let moving = grounded && has_move_input;
        let movement_edge = moving != controller.prev_moving;
        controller.prev_moving = moving;

        if grounded_edge {
            world.send_event(GroundedChanged { entity, grounded });
        }
        if movement_edge {
            world.send_event(MovementChanged { entity, moving });
        }
        if platform_changed {
            debug!("platform attachment changed: {platform:?}");
            world.send_event(PlatformChanged { entity, platform });
        }
    }
}

/// Apply the horizontal movement force.
///
/// A goal velocity is stepped toward the input direction at an acceleration
/// shaped by the alignment curve, then the force needed to reach it within
/// one tick is clamped and applied above the center of mass so the capsule
/// leans into its movement.
pub fn apply_movement_force<B: CharacterPhysicsBackend>(world: &mut World) {
    let dt = B::get_fixed_timestep(world);

    let entities: Vec<(Entity, ControllerConfig, Vec3)> = world
        .query::<(Entity, &ControllerConfig, &MovementIntent, &CharacterController)>()
        .iter(world)
        .map(|(e, config, intent, _)| (e, config.clone(), intent.planar()))
        .collect();

    for (entity, config, move_dir) in entities {
        let velocity = B::get_velocity(world, entity);
        let mass = B::get_mass(world, entity);
        let position = B::get_position(world, entity);

        let force = {
            let Some(mut controller) = world.get_mut::<CharacterController>(entity) else {
                continue;
            };

            let unit_goal_vel = controller.goal_velocity.normalize_or_zero();
            let vel_dot = move_dir.dot(unit_goal_vel);

            let accel = config.acceleration * config.acceleration_curve.evaluate(vel_dot);
            let goal = move_dir * config.max_speed;
            controller.goal_velocity = controller.goal_velocity.move_towards(goal, accel * dt);

            let max_accel =
                config.max_accel_force * config.max_accel_force_curve.evaluate(vel_dot);
            let needed_accel =
                ((controller.goal_velocity - velocity) / dt).clamp_length_max(max_accel);

            needed_accel * mass * config.move_force_scale
        };

        let lean_point = position + Vec3::Y * config.lean_factor;
        B::apply_force_at_point(world, entity, force, lean_point);
    }
}

/// Advance the jump state machine: timers, gravity shaping, and the single
/// jump impulse honoring the input buffer and coyote-time windows.
pub fn update_jump<B: CharacterPhysicsBackend>(world: &mut World) {
    let dt = B::get_fixed_timestep(world);

    let entities: Vec<Entity> = world
        .query_filtered::<Entity, (With<CharacterController>, With<ControllerConfig>)>()
        .iter(world)
        .collect();

    for entity in entities {
        let pressed = world
            .get_mut::<MovementIntent>(entity)
            .map(|mut i| i.take_jump_press())
            .unwrap_or(false);
        let jump_held = world
            .get::<MovementIntent>(entity)
            .map(|i| i.is_jump_held())
            .unwrap_or(false);
        let Some(config) = world.get::<ControllerConfig>(entity).cloned() else {
            continue;
        };

        let velocity = B::get_velocity(world, entity);
        let mass = B::get_mass(world, entity);

        // Timers, re-arming and gravity shaping. The shaping force is
        // accumulated while the controller is borrowed and applied after.
        let mut shaping_force = Vec3::ZERO;
        {
            let Some(mut controller) = world.get_mut::<CharacterController>(entity) else {
                continue;
            };
            let controller = &mut *controller;

            if pressed {
                controller.jump.time_since_jump_pressed = 0.0;
            }
            controller.jump.advance(dt);

            let gravitational_force = controller.gravity * mass;
            if velocity.y < 0.0 {
                controller.maintain_height = true;
                controller.jump.jump_ready = true;
                if !controller.grounded {
                    // Increased downforce for a snappier plummet.
                    shaping_force +=
                        gravitational_force * (config.fall_gravity_factor - 1.0);
                }
            } else if velocity.y > 0.0 && !controller.grounded {
                if controller.jump.is_jumping {
                    shaping_force +=
                        gravitational_force * (config.rise_gravity_factor - 1.0);
                }
                if !jump_held {
                    // Impede the ascent to achieve a low jump.
                    shaping_force += gravitational_force * (config.low_jump_factor - 1.0);
                }
            }
        }
        if shaping_force != Vec3::ZERO {
            B::apply_force(world, entity, shaping_force);
        }

        let (allowed, ground) = {
            let Some(controller) = world.get::<CharacterController>(entity) else {
                continue;
            };
            (
                controller
                    .jump
                    .trigger_allowed(config.jump_buffer, config.coyote_time),
                controller.ground,
            )
        };
        if !allowed {
            continue;
        }

        if let Some(mut controller) = world.get_mut::<CharacterController>(entity) {
            controller.jump.mark_triggered(config.jump_buffer);
            controller.maintain_height = false;
        }

        // Discard residual vertical velocity so jump height is consistent
        // regardless of where in the bob cycle the jump starts.
        let mut velocity = B::get_velocity(world, entity);
        velocity.y = 0.0;
        B::set_velocity(world, entity, velocity);

        // Cancel residual ride-height error. Gated on the explicit hit
        // flag: a legitimate zero-distance hit still snaps.
        if let Some(hit) = ground {
            let mut position = B::get_position(world, entity);
            position.y -= hit.distance - config.ride_height;
            B::set_position(world, entity, position);
        }

        B::apply_impulse(world, entity, Vec3::Y * config.jump_impulse);
        debug!("jump triggered for {entity}");
        world.send_event(JumpTriggered { entity });
    }
}

/// Apply the ride-height spring, its squash-and-stretch feed, and the
/// equal-and-opposite reaction into the ground body.
///
/// Skipped entirely on a probe miss or while suspended by a jump: no force
/// is applied at all, which is distinct from applying a computed zero.
pub fn maintain_height<B: CharacterPhysicsBackend>(world: &mut World) {
    let entities: Vec<(Entity, ControllerConfig)> = world
        .query::<(Entity, &ControllerConfig, &CharacterController)>()
        .iter(world)
        .map(|(e, config, _)| (e, config.clone()))
        .collect();

    for (entity, config) in entities {
        let Some(controller) = world.get::<CharacterController>(entity) else {
            continue;
        };
        if !controller.maintain_height {
            continue;
        }
        let Some(hit) = controller.ground else {
            continue;
        };
        let gravity = controller.gravity;
        let platform = controller.platform;
        let squash_target = controller.squash_target;

        let velocity = B::get_velocity(world, entity);
        let mass = B::get_mass(world, entity);
        let other_velocity = platform
            .map(|p| B::get_velocity(world, p))
            .unwrap_or(Vec3::ZERO);

        // Relative velocity along the probe direction: standing on a moving
        // platform must not read as approaching or receding ground.
        let ray_dir_vel = RAY_DIR.dot(velocity);
        let other_dir_vel = RAY_DIR.dot(other_velocity);
        let rel_vel = ray_dir_vel - other_dir_vel;

        let height_error = hit.distance - config.ride_height;
        let spring_force =
            height_error * config.ride_spring_strength - rel_vel * config.ride_spring_damper;

        // Cancel gravity first, then oscillate about the ride height;
        // without the cancellation term the spring would settle below
        // equilibrium under load.
        let maintain_force = -(gravity * mass) + spring_force * RAY_DIR;
        B::apply_force(world, entity, maintain_force);

        // The raw spring term, independently, drives the cosmetic squash
        // and stretch; it never affects physical motion.
        if let Some(target) = squash_target {
            if let Some(mut oscillator) = world.get_mut::<Oscillator>(target) {
                oscillator.add_force(spring_force * RAY_DIR);
            }
        }

        // Conservation of momentum across the pair: push the platform back
        // at the contact point.
        if let Some(platform) = platform {
            B::apply_force_at_point(world, platform, -maintain_force, hit.point);
        }
    }
}

/// Keep the character upright and facing its steering intent, tracking
/// platform yaw while the character has no intent of its own.
///
/// Reuses the torsional spring law with an equilibrium recomputed every
/// tick rather than fixed.
pub fn maintain_upright<B: CharacterPhysicsBackend>(world: &mut World) {
    let dt = B::get_fixed_timestep(world);

    let entities: Vec<(Entity, ControllerConfig, Vec3)> = world
        .query::<(Entity, &ControllerConfig, Option<&MovementIntent>, &CharacterController)>()
        .iter(world)
        .map(|(e, config, intent, _)| {
            (
                e,
                config.clone(),
                intent.map(|i| i.planar()).unwrap_or(Vec3::ZERO),
            )
        })
        .collect();

    for (entity, config, move_dir) in entities {
        let velocity = B::get_velocity(world, entity);
        let planar_velocity = Vec3::new(velocity.x, 0.0, velocity.z);

        let platform_yaw = world
            .get::<CharacterController>(entity)
            .and_then(|c| c.platform)
            .map(|p| yaw_angle(B::get_rotation(world, p)));

        let target = {
            let Some(mut controller) = world.get_mut::<CharacterController>(entity) else {
                continue;
            };
            let controller = &mut *controller;

            let look_direction = match config.look_direction {
                LookDirection::Velocity => planar_velocity,
                LookDirection::Acceleration => {
                    let acceleration =
                        (planar_velocity - controller.previous_planar_velocity) / dt;
                    controller.previous_planar_velocity = planar_velocity;
                    acceleration
                }
                LookDirection::MoveInput => move_dir,
            };

            controller.upright.update(look_direction, platform_yaw)
        };

        let current = B::get_rotation(world, entity);
        let angular_velocity = B::get_angular_velocity(world, entity);

        let to_goal = shortest_rotation(target, current);
        let (axis, angle) = to_goal.to_axis_angle();
        let axis = axis.normalize_or_zero();

        let torque = axis * (angle * config.upright_spring_strength)
            - angular_velocity * config.upright_spring_damper;
        B::apply_torque(world, entity, torque);
    }
}

/// React to reported contact impulses with an extra outward push, making
/// bodies feel bouncier than restitution alone allows.
pub fn apply_bounce<B: CharacterPhysicsBackend>(world: &mut World) {
    let dt = B::get_fixed_timestep(world);

    let impacts: Vec<BounceImpact> = world
        .resource_mut::<Events<BounceImpact>>()
        .drain()
        .collect();

    for impact in impacts {
        let Some(reaction) = world.get::<BounceReaction>(impact.entity).cloned() else {
            continue;
        };

        let magnitude = impact.impulse.length().ln().max(std::f32::consts::LN_2);
        let bounce_force = impact.normal * (magnitude / dt) * reaction.multiplier;

        B::apply_force_at_point(world, impact.entity, bounce_force, impact.point);

        if reaction.bounce_back {
            if let Some(other) = impact.other {
                if B::has_rigid_body(world, other) {
                    B::apply_force(world, other, -bounce_force);
                }
            }
        }

        if let Some(target) = reaction.squash_target {
            let local_rotation = world
                .get::<GlobalTransform>(target)
                .map(|t| t.to_scale_rotation_translation().1)
                .unwrap_or(Quat::IDENTITY);
            // Compress first: the oscillator should squash before it
            // stretches, so every local axis component pushes negative-side.
            let local_force = local_rotation.inverse() * bounce_force;
            let squash_force = local_force.abs();
            if let Some(mut oscillator) = world.get_mut::<Oscillator>(target) {
                oscillator.add_force(squash_force);
            }
        }
    }
}

/// Drive standalone linear oscillators.
///
/// Bodies with a rigid body receive the axis-masked restoring force through
/// the backend; bodies without one are advanced by the explicit forward
/// Euler fallback directly on their local translation.
pub fn drive_oscillators<B: CharacterPhysicsBackend>(world: &mut World) {
    let dt = B::get_fixed_timestep(world);

    let entities: Vec<(Entity, Vec3)> = world
        .query::<(Entity, &Oscillator, &Transform)>()
        .iter(world)
        .map(|(e, _, transform)| (e, transform.translation))
        .collect();

    for (entity, local_position) in entities {
        let has_body = B::has_rigid_body(world, entity);

        let (force, force_scale) = {
            let Some(mut oscillator) = world.get_mut::<Oscillator>(entity) else {
                continue;
            };
            let force = oscillator.restoring_force(local_position, dt)
                + oscillator.take_pending_force();
            (force, oscillator.force_scale)
        };

        if has_body {
            B::apply_force(world, entity, force * force_scale);
        } else {
            let displacement = {
                let Some(mut oscillator) = world.get_mut::<Oscillator>(entity) else {
                    continue;
                };
                oscillator.displacement_due_to_force(force, dt)
            };
            if let Some(mut transform) = world.get_mut::<Transform>(entity) {
                transform.translation += displacement * force_scale;
            }
        }
    }
}

/// Drive standalone torsional oscillators and re-pin their rotation pivots.
///
/// Requires a rigid body; entities without one are skipped.
pub fn drive_torsional_oscillators<B: CharacterPhysicsBackend>(world: &mut World) {
    let entities: Vec<(Entity, Quat)> = world
        .query::<(Entity, &TorsionalOscillator, &Transform)>()
        .iter(world)
        .map(|(e, _, transform)| (e, transform.rotation))
        .collect();

    for (entity, local_rotation) in entities {
        if !B::has_rigid_body(world, entity) {
            warn!("torsional oscillator on {entity} has no rigid body; skipping");
            continue;
        }

        let angular_velocity = B::get_angular_velocity(world, entity);

        let (torque, local_pivot) = {
            let Some(mut oscillator) = world.get_mut::<TorsionalOscillator>(entity) else {
                continue;
            };
            let torque = oscillator.restoring_torque(local_rotation, angular_velocity)
                * oscillator.torque_scale;
            (torque, oscillator.local_pivot)
        };

        B::apply_torque(world, entity, torque);
        B::set_local_center_of_mass(world, entity, local_pivot);
    }
}

/// Sync state marker components from the grounded determination.
pub fn sync_state_markers(
    mut commands: Commands,
    q_controllers: Query<(Entity, &CharacterController, Has<Grounded>, Has<Airborne>)>,
) {
    for (entity, controller, has_grounded, has_airborne) in &q_controllers {
        if controller.grounded && !has_grounded {
            commands.entity(entity).insert(Grounded).remove::<Airborne>();
        } else if !controller.grounded && !has_airborne {
            commands.entity(entity).insert(Airborne).remove::<Grounded>();
        }
    }
}
