//! Movement intent components.
//!
//! Intents represent the desired movement from player input or AI. The
//! controller systems read these each tick and apply the corresponding
//! physics; input detection itself stays outside the crate.

use bevy::prelude::*;

/// Desired movement for a character controller.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use floating_capsule_controller::prelude::*;
///
/// let mut intent = MovementIntent::default();
/// intent.set_move(Vec2::new(1.0, 0.0));
/// assert!(intent.is_moving());
///
/// // Jump state is a plain bool; the controller detects the press edge
/// // and tracks the held state for variable jump height.
/// intent.set_jump_held(true);
/// ```
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct MovementIntent {
    /// Planar movement input: x maps to world X, y to world Z.
    /// Clamped to unit length.
    pub move_input: Vec2,
    /// Whether the jump action is currently held.
    ///
    /// Set this every frame from any input source (keyboard, gamepad, AI).
    /// The controller detects the rising edge to start the jump buffer and
    /// reads the held state to shape variable jump height.
    pub jump_held: bool,
    /// Previous tick's held state, for rising-edge detection.
    pub(crate) jump_held_prev: bool,
}

impl Default for MovementIntent {
    fn default() -> Self {
        Self {
            move_input: Vec2::ZERO,
            jump_held: false,
            jump_held_prev: false,
        }
    }
}

impl MovementIntent {
    /// Create an empty intent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the planar movement input. Clamped to unit length.
    pub fn set_move(&mut self, input: Vec2) {
        self.move_input = input.clamp_length_max(1.0);
    }

    /// Clear the movement input.
    pub fn clear_move(&mut self) {
        self.move_input = Vec2::ZERO;
    }

    /// Whether there is active movement input.
    pub fn is_moving(&self) -> bool {
        self.move_input.length_squared() > 1e-6
    }

    /// The movement input lifted into the world's horizontal plane.
    pub fn planar(&self) -> Vec3 {
        Vec3::new(self.move_input.x, 0.0, self.move_input.y)
    }

    /// Set the jump held state.
    pub fn set_jump_held(&mut self, held: bool) {
        self.jump_held = held;
    }

    /// Whether the jump input is currently held.
    pub fn is_jump_held(&self) -> bool {
        self.jump_held
    }

    /// Consume the rising edge of the jump input, updating the previous
    /// state. Returns true exactly once per press.
    pub(crate) fn take_jump_press(&mut self) -> bool {
        let pressed = self.jump_held && !self.jump_held_prev;
        self.jump_held_prev = self.jump_held;
        pressed
    }
}
