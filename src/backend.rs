//! Physics backend abstraction.
//!
//! This module defines the trait that physics backends must implement to
//! work with the character controller, so collaborators are injected at
//! construction instead of discovered at call time. The controller borrows
//! rigid-body state through these accessors for the duration of one tick's
//! calculations and never retains it past the tick boundary.

use bevy::prelude::*;

/// Trait for physics backend implementations.
///
/// Implement this trait to integrate a physics engine with the character
/// controller. The backend handles all rigid-body operations (velocity and
/// position access, force/torque/impulse application) plus the fixed
/// timestep, and its plugin contributes the ground-probe system that runs
/// in the `Sensors` phase each tick.
///
/// All reads are expected to reflect writes made earlier in the same tick:
/// there is no deferred-apply ambiguity at this interface.
///
/// For an example implementation, see the `rapier` module's
/// `Rapier3dBackend` (feature `rapier3d`).
pub trait CharacterPhysicsBackend: 'static + Send + Sync {
    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;

    /// Whether the entity has a rigid body the backend can drive.
    ///
    /// Oscillators fall back to kinematic integration when this is false;
    /// the torsional oscillator and the character controller require it.
    fn has_rigid_body(world: &World, entity: Entity) -> bool;

    /// Get the current linear velocity of an entity.
    fn get_velocity(world: &World, entity: Entity) -> Vec3;

    /// Override the linear velocity of an entity.
    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3);

    /// Get the current angular velocity of an entity.
    fn get_angular_velocity(world: &World, entity: Entity) -> Vec3;

    /// Get the current rotation of an entity.
    fn get_rotation(world: &World, entity: Entity) -> Quat;

    /// Get the current position of an entity.
    fn get_position(world: &World, entity: Entity) -> Vec3;

    /// Override the position of an entity.
    fn set_position(world: &mut World, entity: Entity, position: Vec3);

    /// Accumulate a force on an entity for this tick.
    fn apply_force(world: &mut World, entity: Entity, force: Vec3);

    /// Accumulate a force applied at a world-space point, imparting torque
    /// about the center of mass.
    fn apply_force_at_point(world: &mut World, entity: Entity, force: Vec3, point: Vec3);

    /// Accumulate a torque on an entity for this tick.
    fn apply_torque(world: &mut World, entity: Entity, torque: Vec3);

    /// Apply an instantaneous change in momentum.
    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3);

    /// Get the mass of an entity.
    ///
    /// Used to scale spring forces so gravity cancellation is exact.
    fn get_mass(_world: &World, _entity: Entity) -> f32 {
        // Default implementation returns 1.0 (no scaling)
        1.0
    }

    /// Re-pin the entity's local center of mass.
    ///
    /// Backends without center-of-mass control may leave this as the no-op
    /// default; the torsional oscillator then rotates about the solver's
    /// own center.
    fn set_local_center_of_mass(_world: &mut World, _entity: Entity, _local_pivot: Vec3) {}

    /// Get the fixed timestep delta time.
    fn get_fixed_timestep(world: &World) -> f32 {
        world
            .get_resource::<Time<Fixed>>()
            .map(|t| t.delta_secs())
            .filter(|&d| d > 0.0)
            .unwrap_or(1.0 / 60.0)
    }
}

/// Empty plugin for backends that don't need additional setup.
pub struct NoOpBackendPlugin;

impl Plugin for NoOpBackendPlugin {
    fn build(&self, _app: &mut App) {}
}
