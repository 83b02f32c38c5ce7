//! Damped spring oscillators.
//!
//! Two generic spring-damper primitives drive all secondary motion in this
//! crate: a linear [`Oscillator`] restoring a local position toward an
//! equilibrium point, and a [`TorsionalOscillator`] restoring a local
//! rotation toward an equilibrium orientation. The ride-height and upright
//! controllers reuse the same spring laws with dynamically computed
//! equilibria; standalone oscillator components provide decorative wobble
//! and squash-and-stretch.

use bevy::prelude::*;

use crate::error::ConfigError;

/// Returns the shortest rotation taking `from` into `to`.
///
/// The result always describes the rotation of magnitude <= 180 degrees;
/// quaternion double-cover is resolved by sign so that converting the result
/// to axis-angle never yields a reflex angle.
pub fn shortest_rotation(to: Quat, from: Quat) -> Quat {
    let from = if to.dot(from) < 0.0 { -from } else { from };
    (to * from.inverse()).normalize()
}

/// A damped linear oscillator centered on a local-space equilibrium position.
///
/// Each tick the oscillator measures its displacement from equilibrium,
/// derives a velocity from the previous tick's displacement, and computes a
/// damped Hooke restoring force. Bodies with a physics-engine rigid body
/// receive the force through the backend; bodies without one are advanced by
/// an explicit forward-Euler fallback directly on their local translation.
///
/// External collaborators (the ride-height spring's squash-and-stretch feed,
/// bounce reactions) can queue additional force with [`Oscillator::add_force`];
/// queued force integrates together with the restoring force on the next tick.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct Oscillator {
    /// The local position about which oscillations are centered.
    pub local_equilibrium: Vec3,
    /// Per-axis force mask. Values expected in [0, 1], not enforced.
    pub force_scale: Vec3,
    /// The greater the stiffness, the lesser the amplitude of oscillations.
    pub stiffness: f32,
    /// The greater the damper, the faster oscillations disappear.
    pub damper: f32,
    /// The greater the mass, the lesser the amplitude of oscillations.
    /// Only used on the kinematic fallback path; with a rigid body the
    /// physics engine's mass is authoritative.
    pub mass: f32,
    previous_displacement: Vec3,
    /// Only meaningful on the kinematic fallback path; with a rigid body the
    /// physics engine's velocity is authoritative and this field is unused.
    previous_velocity: Vec3,
    pending_force: Vec3,
}

impl Default for Oscillator {
    fn default() -> Self {
        Self {
            local_equilibrium: Vec3::ZERO,
            force_scale: Vec3::ONE,
            stiffness: 100.0,
            damper: 2.0,
            mass: 1.0,
            previous_displacement: Vec3::ZERO,
            previous_velocity: Vec3::ZERO,
            pending_force: Vec3::ZERO,
        }
    }
}

impl Oscillator {
    /// Create an oscillator, rejecting degenerate spring parameters.
    pub fn new(stiffness: f32, damper: f32, mass: f32) -> Result<Self, ConfigError> {
        if !(mass > 0.0 && mass.is_finite()) {
            return Err(ConfigError::NonPositiveMass { value: mass });
        }
        if !(stiffness >= 0.0 && stiffness.is_finite()) {
            return Err(ConfigError::NegativeSpringConstant {
                name: "stiffness",
                value: stiffness,
            });
        }
        if !(damper >= 0.0 && damper.is_finite()) {
            return Err(ConfigError::NegativeSpringConstant {
                name: "damper",
                value: damper,
            });
        }
        Ok(Self {
            stiffness,
            damper,
            mass,
            ..Default::default()
        })
    }

    /// Builder: set the local equilibrium position.
    pub fn with_equilibrium(mut self, equilibrium: Vec3) -> Self {
        self.local_equilibrium = equilibrium;
        self
    }

    /// Builder: set the per-axis force mask.
    pub fn with_force_scale(mut self, force_scale: Vec3) -> Self {
        self.force_scale = force_scale;
        self
    }

    /// The displacement measured on the most recent tick. Read-only telemetry.
    #[inline]
    pub fn displacement(&self) -> Vec3 {
        self.previous_displacement
    }

    /// Queue an external force to integrate on the next tick.
    pub fn add_force(&mut self, force: Vec3) {
        self.pending_force += force;
    }

    /// Drain the queued external force.
    pub(crate) fn take_pending_force(&mut self) -> Vec3 {
        std::mem::take(&mut self.pending_force)
    }

    /// Compute the damped restoring force for the current local position.
    ///
    /// The restoring force is zero at the equilibrium position and maximum at
    /// the amplitude of the oscillation. Velocity is derived from the change
    /// in displacement since the previous tick, so the first tick reflects
    /// only the initial displacement (startup transient).
    pub fn restoring_force(&mut self, local_position: Vec3, dt: f32) -> Vec3 {
        let displacement = local_position - self.local_equilibrium;
        let delta_displacement = displacement - self.previous_displacement;
        self.previous_displacement = displacement;
        let velocity = delta_displacement / dt;
        self.hookes_law(displacement, velocity)
    }

    /// Damped Hooke's law, negated because the force is restorative.
    fn hookes_law(&self, displacement: Vec3, velocity: Vec3) -> Vec3 {
        -(self.stiffness * displacement + self.damper * velocity)
    }

    /// Displacement resulting from applying `force` over one fixed step, for
    /// bodies with no physics-engine rigid body. Advances the internally
    /// tracked velocity by explicit forward Euler.
    pub fn displacement_due_to_force(&mut self, force: Vec3, dt: f32) -> Vec3 {
        let acceleration = force / self.mass;
        let velocity = self.previous_velocity + acceleration * dt;
        self.previous_velocity = velocity;
        velocity * dt
    }
}

/// A damped torsional oscillator centered on a local-space equilibrium
/// rotation.
///
/// The rotational analogue of [`Oscillator`]: restores orientation toward
/// equilibrium via a torque proportional to the axis-angle displacement and
/// the body's angular velocity. Requires a rigid body, since there is no
/// safe axis-angle kinematic integration without one; entities lacking a
/// body are skipped by the driving system.
///
/// Every tick the body's local center of mass is re-pinned to
/// `local_pivot`, since external translation or scale changes can otherwise
/// silently move the rotation center.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct TorsionalOscillator {
    /// The local rotation about which oscillations are centered.
    pub local_equilibrium: Quat,
    /// Per-axis torque mask. Values expected in [0, 1], not enforced.
    pub torque_scale: Vec3,
    /// The greater the stiffness, the lesser the amplitude of oscillations.
    pub stiffness: f32,
    /// The greater the damper, the faster oscillations disappear.
    pub damper: f32,
    /// The local-space center about which rotations should occur.
    pub local_pivot: Vec3,
    angular_displacement: f32,
    rotation_axis: Vec3,
}

impl Default for TorsionalOscillator {
    fn default() -> Self {
        Self {
            local_equilibrium: Quat::IDENTITY,
            torque_scale: Vec3::ONE,
            stiffness: 100.0,
            damper: 5.0,
            local_pivot: Vec3::ZERO,
            angular_displacement: 0.0,
            rotation_axis: Vec3::Y,
        }
    }
}

impl TorsionalOscillator {
    /// Create a torsional oscillator, rejecting degenerate spring parameters.
    pub fn new(stiffness: f32, damper: f32) -> Result<Self, ConfigError> {
        if !(stiffness >= 0.0 && stiffness.is_finite()) {
            return Err(ConfigError::NegativeSpringConstant {
                name: "stiffness",
                value: stiffness,
            });
        }
        if !(damper >= 0.0 && damper.is_finite()) {
            return Err(ConfigError::NegativeSpringConstant {
                name: "damper",
                value: damper,
            });
        }
        Ok(Self {
            stiffness,
            damper,
            ..Default::default()
        })
    }

    /// Builder: set the local equilibrium rotation.
    pub fn with_equilibrium(mut self, equilibrium: Quat) -> Self {
        self.local_equilibrium = equilibrium;
        self
    }

    /// Builder: set the per-axis torque mask.
    pub fn with_torque_scale(mut self, torque_scale: Vec3) -> Self {
        self.torque_scale = torque_scale;
        self
    }

    /// Builder: set the local pivot the center of mass is pinned to.
    pub fn with_pivot(mut self, pivot: Vec3) -> Self {
        self.local_pivot = pivot;
        self
    }

    /// The angular displacement magnitude measured on the most recent tick,
    /// in degrees, always >= 0. Read-only telemetry.
    #[inline]
    pub fn angular_displacement(&self) -> f32 {
        self.angular_displacement
    }

    /// The rotation axis measured on the most recent tick. Unit length
    /// whenever the angular displacement is non-zero; direction undefined at
    /// zero displacement. Read-only telemetry.
    #[inline]
    pub fn rotation_axis(&self) -> Vec3 {
        self.rotation_axis
    }

    /// Compute the damped restoring torque for the current local rotation.
    ///
    /// The restoring torque is zero at the equilibrium rotation and maximum
    /// at the amplitude of the oscillation. Angular velocity is read from
    /// the physics engine rather than derived, so there is no startup
    /// transient on this path.
    pub fn restoring_torque(&mut self, local_rotation: Quat, angular_velocity: Vec3) -> Vec3 {
        let delta = shortest_rotation(local_rotation, self.local_equilibrium);
        let (axis, angle) = delta.to_axis_angle();
        self.angular_displacement = angle.to_degrees();
        self.rotation_axis = axis.normalize_or_zero();
        let angular_displacement = angle * self.rotation_axis;
        self.angular_hookes_law(angular_displacement, angular_velocity)
    }

    /// Damped angular Hooke's law, negated because the torque is restorative.
    fn angular_hookes_law(&self, angular_displacement: Vec3, angular_velocity: Vec3) -> Vec3 {
        -(self.stiffness * angular_displacement + self.damper * angular_velocity)
    }
}
