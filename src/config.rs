//! Controller configuration components.
//!
//! This module defines the per-instance configuration for character
//! controllers: ride-height spring, upright spring, movement model and jump
//! shaping. Configuration is supplied at spawn and treated as immutable
//! between ticks.

use bevy::prelude::*;

use crate::error::ConfigError;

/// Leniency multiplier on the ride height for the grounded predicate.
///
/// The capsule's distance to ground oscillates about the ride height, so the
/// grounded band extends to `ride_height * GROUNDED_SLACK` to avoid
/// flickering grounded/ungrounded every tick.
pub const GROUNDED_SLACK: f32 = 1.3;

/// Seconds after a jump impulse before landing may clear the jumping flag.
pub(crate) const JUMP_STATE_TIMEOUT: f32 = 0.2;

/// Which signal steers the character's facing.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookDirection {
    /// Face the planar velocity of the body.
    #[default]
    Velocity,
    /// Face the planar acceleration of the body (change in velocity per tick).
    Acceleration,
    /// Face the movement input direction.
    MoveInput,
}

/// A piecewise-linear curve over a normalized alignment value in [-1, 1].
///
/// Stands in for the original's hand-authored acceleration curves: the
/// movement model evaluates it on the dot product between the input
/// direction and the current goal velocity, so reversals can be tuned to
/// accelerate harder than continuations.
#[derive(Reflect, Debug, Clone)]
pub struct AccelerationCurve {
    /// Keyframes as (input, factor) pairs, sorted by input.
    keys: Vec<Vec2>,
}

impl Default for AccelerationCurve {
    fn default() -> Self {
        // Accelerate twice as hard when fighting the current goal direction.
        Self::new([Vec2::new(-1.0, 2.0), Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0)])
    }
}

impl AccelerationCurve {
    /// Create a curve from keyframes. Keys are sorted by input value; an
    /// empty key set degenerates to the constant 1.0.
    pub fn new(keys: impl IntoIterator<Item = Vec2>) -> Self {
        let mut keys: Vec<Vec2> = keys.into_iter().collect();
        keys.sort_by(|a, b| a.x.total_cmp(&b.x));
        Self { keys }
    }

    /// A constant curve.
    pub fn constant(factor: f32) -> Self {
        Self {
            keys: vec![Vec2::new(0.0, factor)],
        }
    }

    /// Evaluate the curve at `t`, clamping to the end keys outside the range.
    pub fn evaluate(&self, t: f32) -> f32 {
        let Some(first) = self.keys.first() else {
            return 1.0;
        };
        let last = self.keys[self.keys.len() - 1];
        if t <= first.x {
            return first.y;
        }
        if t >= last.x {
            return last.y;
        }
        for pair in self.keys.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.x {
                let span = b.x - a.x;
                if span <= f32::EPSILON {
                    return b.y;
                }
                let alpha = (t - a.x) / span;
                return a.y + (b.y - a.y) * alpha;
            }
        }
        last.y
    }
}

/// Configuration parameters for the character controller.
///
/// Groups the four concerns of the floating-capsule model: the height
/// spring that suspends the capsule, the upright spring that keeps it
/// vertical, the goal-velocity movement model, and jump shaping.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct ControllerConfig {
    // === Height spring ===
    /// Desired distance from the probe origin to the ground.
    pub ride_height: f32,
    /// Maximum distance of the ground probe. Should exceed `ride_height`.
    pub probe_length: f32,
    /// Strength of the ride-height spring.
    pub ride_spring_strength: f32,
    /// Damper of the ride-height spring.
    pub ride_spring_damper: f32,

    // === Upright spring ===
    /// Which signal the character faces while moving.
    pub look_direction: LookDirection,
    /// Strength of the upright torsional spring.
    pub upright_spring_strength: f32,
    /// Damper of the upright torsional spring.
    pub upright_spring_damper: f32,

    // === Movement ===
    /// Maximum horizontal speed (units/second).
    pub max_speed: f32,
    /// Base acceleration toward the goal velocity (units/second^2).
    pub acceleration: f32,
    /// Upper bound on the corrective force magnitude (before mass scaling).
    pub max_accel_force: f32,
    /// Vertical offset of the force application point, so the capsule leans
    /// into its movement direction.
    pub lean_factor: f32,
    /// Acceleration factor over input/goal alignment in [-1, 1].
    pub acceleration_curve: AccelerationCurve,
    /// Max-force factor over input/goal alignment in [-1, 1].
    pub max_accel_force_curve: AccelerationCurve,
    /// Per-axis mask for the movement force. The default (1, 0, 1) leaves
    /// the vertical axis to the ride-height spring.
    pub move_force_scale: Vec3,

    // === Jump ===
    /// Magnitude of the single vertical jump impulse.
    pub jump_impulse: f32,
    /// Extra gravity scale while rising from a jump.
    pub rise_gravity_factor: f32,
    /// Extra gravity scale while falling. Typically > 1.
    pub fall_gravity_factor: f32,
    /// Extra gravity scale while rising with the jump input released.
    pub low_jump_factor: f32,
    /// Seconds an early jump press is retained before landing.
    /// Should not exceed the duration of the jump itself.
    pub jump_buffer: f32,
    /// Seconds after leaving the ground during which a jump still triggers.
    pub coyote_time: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            // Height spring
            ride_height: 1.75,
            probe_length: 3.0,
            ride_spring_strength: 50.0,
            ride_spring_damper: 5.0,

            // Upright spring
            look_direction: LookDirection::Velocity,
            upright_spring_strength: 40.0,
            upright_spring_damper: 5.0,

            // Movement
            max_speed: 8.0,
            acceleration: 200.0,
            max_accel_force: 150.0,
            lean_factor: 0.25,
            acceleration_curve: AccelerationCurve::default(),
            max_accel_force_curve: AccelerationCurve::default(),
            move_force_scale: Vec3::new(1.0, 0.0, 1.0),

            // Jump
            jump_impulse: 10.0,
            rise_gravity_factor: 5.0,
            fall_gravity_factor: 10.0,
            low_jump_factor: 2.5,
            jump_buffer: 0.15,
            coyote_time: 0.25,
        }
    }
}

impl ControllerConfig {
    /// Create a config optimized for responsive player control.
    pub fn player() -> Self {
        Self {
            ride_spring_strength: 80.0,
            ride_spring_damper: 8.0,
            acceleration: 300.0,
            max_accel_force: 200.0,
            ..Default::default()
        }
    }

    /// The grounded band upper bound: `ride_height * GROUNDED_SLACK`.
    #[inline]
    pub fn grounded_distance(&self) -> f32 {
        self.ride_height * GROUNDED_SLACK
    }

    /// Reject configurations the tick functions cannot integrate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.ride_height > 0.0 && self.ride_height.is_finite()) {
            return Err(ConfigError::InvalidParameter {
                name: "ride_height",
                value: self.ride_height,
            });
        }
        if self.probe_length < self.ride_height {
            return Err(ConfigError::InvalidParameter {
                name: "probe_length",
                value: self.probe_length,
            });
        }
        for (name, value) in [
            ("ride_spring_strength", self.ride_spring_strength),
            ("ride_spring_damper", self.ride_spring_damper),
            ("upright_spring_strength", self.upright_spring_strength),
            ("upright_spring_damper", self.upright_spring_damper),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(ConfigError::NegativeSpringConstant { name, value });
            }
        }
        for (name, value) in [
            ("jump_buffer", self.jump_buffer),
            ("coyote_time", self.coyote_time),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(ConfigError::InvalidParameter { name, value });
            }
        }
        Ok(())
    }

    /// Builder: set the ride height.
    pub fn with_ride_height(mut self, height: f32) -> Self {
        self.ride_height = height;
        self
    }

    /// Builder: set the ground probe length.
    pub fn with_probe_length(mut self, length: f32) -> Self {
        self.probe_length = length;
        self
    }

    /// Builder: set the ride-height spring parameters.
    pub fn with_ride_spring(mut self, strength: f32, damper: f32) -> Self {
        self.ride_spring_strength = strength;
        self.ride_spring_damper = damper;
        self
    }

    /// Builder: set the upright spring parameters.
    pub fn with_upright_spring(mut self, strength: f32, damper: f32) -> Self {
        self.upright_spring_strength = strength;
        self.upright_spring_damper = damper;
        self
    }

    /// Builder: set the look-direction source.
    pub fn with_look_direction(mut self, look_direction: LookDirection) -> Self {
        self.look_direction = look_direction;
        self
    }

    /// Builder: set movement parameters.
    pub fn with_movement(mut self, max_speed: f32, acceleration: f32) -> Self {
        self.max_speed = max_speed;
        self.acceleration = acceleration;
        self
    }

    /// Builder: set the jump impulse magnitude.
    pub fn with_jump_impulse(mut self, impulse: f32) -> Self {
        self.jump_impulse = impulse;
        self
    }

    /// Builder: set the jump buffer window.
    pub fn with_jump_buffer(mut self, seconds: f32) -> Self {
        self.jump_buffer = seconds;
        self
    }

    /// Builder: set the coyote time window.
    pub fn with_coyote_time(mut self, seconds: f32) -> Self {
        self.coyote_time = seconds;
        self
    }

    /// Builder: set the gravity shaping factors (rise, fall, low jump).
    pub fn with_gravity_factors(mut self, rise: f32, fall: f32, low_jump: f32) -> Self {
        self.rise_gravity_factor = rise;
        self.fall_gravity_factor = fall;
        self.low_jump_factor = low_jump;
        self
    }
}

/// Configuration for bounce reactions to reported contact impulses.
///
/// Makes a body feel bouncier than any restitution coefficient allows by
/// adding an outward force proportional to the logarithm of the contact
/// impulse, optionally pushing the other body back.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct BounceReaction {
    /// Multiplier on the computed bounce force.
    pub multiplier: f32,
    /// Whether to apply the opposite force to the other body.
    pub bounce_back: bool,
    /// Oscillator entity fed the bounce force for squash and stretch.
    pub squash_target: Option<Entity>,
}

impl Default for BounceReaction {
    fn default() -> Self {
        Self {
            multiplier: 10.0,
            bounce_back: true,
            squash_target: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(ControllerConfig::default().validate().is_ok());
        assert!(ControllerConfig::player().validate().is_ok());
    }

    #[test]
    fn probe_shorter_than_ride_height_rejected() {
        let config = ControllerConfig::default()
            .with_ride_height(2.0)
            .with_probe_length(1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_spring_rejected() {
        let config = ControllerConfig::default().with_ride_spring(-1.0, 5.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NegativeSpringConstant {
                name: "ride_spring_strength",
                ..
            })
        ));
    }

    #[test]
    fn grounded_distance_uses_slack() {
        let config = ControllerConfig::default().with_ride_height(2.0);
        assert!((config.grounded_distance() - 2.6).abs() < 1e-6);
    }

    #[test]
    fn curve_interpolates_between_keys() {
        let curve = AccelerationCurve::default();
        assert_eq!(curve.evaluate(-1.0), 2.0);
        assert_eq!(curve.evaluate(1.0), 1.0);
        assert!((curve.evaluate(-0.5) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn curve_clamps_outside_range() {
        let curve = AccelerationCurve::new([Vec2::new(-1.0, 3.0), Vec2::new(1.0, 1.0)]);
        assert_eq!(curve.evaluate(-5.0), 3.0);
        assert_eq!(curve.evaluate(5.0), 1.0);
    }

    #[test]
    fn curve_constant_and_empty() {
        assert_eq!(AccelerationCurve::constant(0.5).evaluate(0.9), 0.5);
        assert_eq!(AccelerationCurve::new([]).evaluate(0.0), 1.0);
    }
}
