//! Controller runtime state.
//!
//! The [`CharacterController`] component is the central hub for per-tick
//! state: the latest ground probe result, the grounded flag, the platform
//! the character rests on, and the persisted jump and upright-tracking
//! state machines. Marker components mirror the grounded flag for
//! query-side filtering.

use bevy::prelude::*;

use crate::collision::GroundHit;
use crate::config::ControllerConfig;

/// Persisted jump state machine data.
///
/// Timers start at `f32::MAX` so that a freshly spawned controller cannot
/// satisfy the buffer or coyote windows before any real input arrived.
#[derive(Reflect, Debug, Clone)]
pub struct JumpState {
    /// Seconds since the jump input was last pressed.
    pub time_since_jump_pressed: f32,
    /// Seconds since the character last left the ground. Reset to zero
    /// every grounded tick.
    pub time_since_ungrounded: f32,
    /// Seconds since the last jump impulse.
    pub time_since_last_jump: f32,
    /// Whether a new jump may trigger. Cleared on trigger, re-armed while
    /// falling.
    pub jump_ready: bool,
    /// True from the jump impulse until the gravity-shaping rules clear it.
    pub is_jumping: bool,
}

impl Default for JumpState {
    fn default() -> Self {
        Self {
            time_since_jump_pressed: f32::MAX,
            time_since_ungrounded: f32::MAX,
            time_since_last_jump: f32::MAX,
            jump_ready: true,
            is_jumping: false,
        }
    }
}

impl JumpState {
    /// Advance the press and last-jump timers by one tick.
    pub(crate) fn advance(&mut self, dt: f32) {
        self.time_since_jump_pressed += dt;
        self.time_since_last_jump += dt;
    }

    /// Whether a jump would trigger this tick.
    pub fn trigger_allowed(&self, jump_buffer: f32, coyote_time: f32) -> bool {
        self.time_since_jump_pressed < jump_buffer
            && self.time_since_ungrounded < coyote_time
            && self.jump_ready
    }

    /// Record a triggered jump. The press timer is clamped to the buffer
    /// edge so landing within the buffer window cannot re-trigger without a
    /// fresh press.
    pub(crate) fn mark_triggered(&mut self, jump_buffer: f32) {
        self.jump_ready = false;
        self.is_jumping = true;
        self.time_since_jump_pressed = jump_buffer;
        self.time_since_last_jump = 0.0;
    }
}

/// Equilibrium tracking for the upright spring.
///
/// Holds the current target rotation and the bookkeeping needed to follow a
/// rotating platform while the character has no steering intent of its own.
#[derive(Reflect, Debug, Clone)]
pub struct UprightTarget {
    target_rotation: Quat,
    last_target_rotation: Quat,
    platform_reference_yaw: f32,
    platform_was_missing: bool,
}

impl Default for UprightTarget {
    fn default() -> Self {
        Self {
            target_rotation: Quat::IDENTITY,
            last_target_rotation: Quat::IDENTITY,
            platform_reference_yaw: 0.0,
            platform_was_missing: false,
        }
    }
}

impl UprightTarget {
    /// Update the equilibrium rotation for this tick.
    ///
    /// A non-zero `look_direction` takes priority: the target faces it with
    /// world up as the up-vector, and the platform reference yaw re-anchors.
    /// With no look direction but a platform present, the target passively
    /// yaws with the platform. With neither, the target holds its previous
    /// value. When platform attachment changed since the previous tick the
    /// reference yaw is re-anchored before use.
    pub fn update(&mut self, look_direction: Vec3, platform_yaw: Option<f32>) -> Quat {
        if self.platform_was_missing {
            self.last_target_rotation = self.target_rotation;
            self.platform_reference_yaw = platform_yaw.unwrap_or(0.0);
        }
        self.platform_was_missing = platform_yaw.is_none();

        if look_direction != Vec3::ZERO {
            self.target_rotation = facing(look_direction);
            self.last_target_rotation = self.target_rotation;
            self.platform_reference_yaw = platform_yaw.unwrap_or(0.0);
        } else if let Some(platform_yaw) = platform_yaw {
            let delta = platform_yaw - self.platform_reference_yaw;
            let target_yaw = yaw_angle(self.last_target_rotation) + delta;
            self.target_rotation = Quat::from_rotation_y(target_yaw);
        }
        self.target_rotation
    }

    /// The current equilibrium rotation. Read-only telemetry.
    #[inline]
    pub fn target_rotation(&self) -> Quat {
        self.target_rotation
    }
}

/// The rotation facing `direction` with world up as the up-vector.
fn facing(direction: Vec3) -> Quat {
    Transform::default()
        .looking_to(direction, Vec3::Y)
        .rotation
}

/// Yaw component of a rotation, radians about world Y.
pub(crate) fn yaw_angle(rotation: Quat) -> f32 {
    rotation.to_euler(EulerRot::YXZ).0
}

/// Core character controller state component.
///
/// Holds the RESULT states of the per-tick pipeline: the fresh ground probe
/// result, the grounded determination, the current platform, and the
/// persisted jump and upright state machines. Probe data is overwritten
/// every tick by the backend's sensor system and never reused across ticks.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct CharacterController {
    /// This tick's ground probe result. None on a probe miss.
    #[reflect(ignore)]
    pub ground: Option<GroundHit>,
    /// Grounded determination for this tick.
    pub grounded: bool,
    /// Rigid body the character currently rests on, if any.
    pub platform: Option<Entity>,
    /// Gravity affecting this character. The external solver integrates it;
    /// the controller needs it for gravity cancellation and jump shaping.
    pub gravity: Vec3,
    /// Jump state machine data.
    pub jump: JumpState,
    /// Upright equilibrium tracking.
    pub upright: UprightTarget,
    /// Oscillator entity fed the ride spring force for squash and stretch.
    pub squash_target: Option<Entity>,

    /// Whether the ride-height spring runs this tick. Suspended on jump
    /// trigger, resumed once falling.
    pub(crate) maintain_height: bool,
    /// Goal velocity of the movement model.
    pub(crate) goal_velocity: Vec3,
    /// Previous planar velocity, for the acceleration look-direction source.
    pub(crate) previous_planar_velocity: Vec3,
    /// Grounded flag of the previous tick, for edge events.
    pub(crate) prev_grounded: bool,
    /// Moving flag of the previous tick, for edge events.
    pub(crate) prev_moving: bool,
}

impl Default for CharacterController {
    fn default() -> Self {
        Self {
            ground: None,
            grounded: false,
            platform: None,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            jump: JumpState::default(),
            upright: UprightTarget::default(),
            squash_target: None,
            maintain_height: true,
            goal_velocity: Vec3::ZERO,
            previous_planar_velocity: Vec3::ZERO,
            prev_grounded: false,
            prev_moving: false,
        }
    }
}

impl CharacterController {
    /// Create a controller with default gravity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a controller with custom gravity.
    pub fn with_gravity(gravity: Vec3) -> Self {
        Self {
            gravity,
            ..Default::default()
        }
    }

    /// Builder: set the squash-and-stretch oscillator entity.
    pub fn with_squash_target(mut self, target: Entity) -> Self {
        self.squash_target = Some(target);
        self
    }

    /// Grounded predicate: probe hit within the leniency band about the
    /// ride height.
    pub fn compute_grounded(&self, config: &ControllerConfig) -> bool {
        match self.ground {
            Some(hit) => hit.distance <= config.grounded_distance(),
            None => false,
        }
    }

    /// Whether the probe hit anything this tick.
    pub fn ground_detected(&self) -> bool {
        self.ground.is_some()
    }

    /// Raw distance to ground this tick, or `f32::MAX` on a miss.
    pub fn ground_distance(&self) -> f32 {
        self.ground.map(|h| h.distance).unwrap_or(f32::MAX)
    }

    /// Entity hit by the probe this tick, if any.
    pub fn ground_entity(&self) -> Option<Entity> {
        self.ground.and_then(|h| h.entity)
    }
}

/// Marker component indicating the character is grounded.
///
/// Added and removed automatically from the grounded determination each
/// tick. Mutually exclusive with [`Airborne`].
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Grounded;

/// Marker component indicating the character is airborne.
///
/// Mutually exclusive with [`Grounded`].
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Airborne;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::GroundHit;

    const DT: f32 = 1.0 / 60.0;

    fn hit_at(distance: f32) -> Option<GroundHit> {
        Some(GroundHit::new(distance, Vec3::ZERO, Vec3::Y, None))
    }

    #[test]
    fn fresh_controller_cannot_jump() {
        let jump = JumpState::default();
        assert!(jump.jump_ready);
        assert!(!jump.trigger_allowed(0.15, 0.25));
    }

    #[test]
    fn timers_saturate_at_sentinel() {
        let mut jump = JumpState::default();
        jump.advance(DT);
        assert_eq!(jump.time_since_jump_pressed, f32::MAX);
    }

    #[test]
    fn trigger_fires_exactly_once() {
        let mut jump = JumpState {
            time_since_jump_pressed: 0.0,
            time_since_ungrounded: 0.0,
            ..Default::default()
        };
        assert!(jump.trigger_allowed(0.15, 0.25));
        jump.mark_triggered(0.15);
        assert!(!jump.jump_ready);
        assert_eq!(jump.time_since_jump_pressed, 0.15);
        assert_eq!(jump.time_since_last_jump, 0.0);
        // Clamped to the buffer edge, so the same press cannot re-trigger.
        assert!(!jump.trigger_allowed(0.15, 0.25));
    }

    #[test]
    fn coyote_time_boundary() {
        let eps = 1e-4;
        let mut jump = JumpState {
            time_since_jump_pressed: 0.0,
            time_since_ungrounded: 0.25 - eps,
            ..Default::default()
        };
        assert!(jump.trigger_allowed(0.15, 0.25));
        jump.time_since_ungrounded = 0.25 + eps;
        assert!(!jump.trigger_allowed(0.15, 0.25));
    }

    #[test]
    fn jump_buffer_boundary() {
        let eps = 1e-4;
        let mut jump = JumpState {
            time_since_jump_pressed: 0.15 - eps,
            time_since_ungrounded: 0.0,
            ..Default::default()
        };
        assert!(jump.trigger_allowed(0.15, 0.25));
        jump.time_since_jump_pressed = 0.15 + eps;
        assert!(!jump.trigger_allowed(0.15, 0.25));
    }

    #[test]
    fn grounded_predicate_boundary() {
        let config = ControllerConfig::default().with_ride_height(2.0);
        let mut controller = CharacterController::new();
        let eps = 1e-3;

        controller.ground = hit_at(2.0 * 1.3 - eps);
        assert!(controller.compute_grounded(&config));

        controller.ground = hit_at(2.0 * 1.3 + eps);
        assert!(!controller.compute_grounded(&config));

        controller.ground = None;
        assert!(!controller.compute_grounded(&config));
    }

    #[test]
    fn upright_holds_with_no_look_and_no_platform() {
        let mut upright = UprightTarget::default();
        let initial = upright.update(Vec3::new(0.0, 0.0, -1.0), None);
        for _ in 0..10 {
            let target = upright.update(Vec3::ZERO, None);
            assert!(target.angle_between(initial) < 1e-5);
        }
    }

    #[test]
    fn upright_tracks_platform_yaw() {
        let mut upright = UprightTarget::default();
        // Establish a facing while standing on an unrotated platform.
        let initial = upright.update(Vec3::new(0.0, 0.0, -1.0), Some(0.0));
        // Platform rotates 30 degrees with no steering input.
        let rotated = upright.update(Vec3::ZERO, Some(30_f32.to_radians()));
        let drift = yaw_angle(rotated) - yaw_angle(initial);
        assert!((drift - 30_f32.to_radians()).abs() < 1e-4);
    }

    #[test]
    fn look_input_snaps_reference_yaw() {
        let mut upright = UprightTarget::default();
        upright.update(Vec3::new(0.0, 0.0, -1.0), Some(0.0));
        // Drift accumulates while passive.
        upright.update(Vec3::ZERO, Some(45_f32.to_radians()));
        // Fresh steering intent: target faces the look direction and the
        // platform yaw becomes the new reference, discarding the drift.
        let steered = upright.update(Vec3::new(0.0, 0.0, -1.0), Some(45_f32.to_radians()));
        let expected = yaw_angle(steered);
        // Platform holds still afterwards: no further drift.
        let held = upright.update(Vec3::ZERO, Some(45_f32.to_radians()));
        assert!((yaw_angle(held) - expected).abs() < 1e-4);
    }

    #[test]
    fn platform_loss_re_anchors_on_return() {
        let mut upright = UprightTarget::default();
        upright.update(Vec3::new(0.0, 0.0, -1.0), Some(0.0));
        let airborne = upright.update(Vec3::ZERO, None);
        // Landing on a platform already rotated 90 degrees must not snap the
        // character by 90 degrees: the reference re-anchors first.
        let landed = upright.update(Vec3::ZERO, Some(90_f32.to_radians()));
        assert!(landed.angle_between(airborne) < 1e-4);
    }
}
