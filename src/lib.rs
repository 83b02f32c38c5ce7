//! # `floating_capsule_controller`
//!
//! A 3D floating-capsule rigidbody character controller with spring-damper
//! oscillators and physics backend abstraction.
//!
//! This crate provides a responsive, tuneable character controller that:
//! - Floats above ground on a spring-damper system, reacting to moving
//!   platforms and pushing an equal-and-opposite reaction into them
//! - Stays upright on a torsional spring while tracking platform yaw
//! - Jumps with input buffering, coyote time and variable jump height
//! - Drives generic damped oscillators for squash-and-stretch and
//!   decorative wobble
//! - Abstracts the physics backend for easy swapping (Rapier3D included)
//!
//! ## Architecture
//!
//! The controller uses a **floating rigidbody** approach where:
//! 1. A dynamic rigidbody handles collisions normally
//! 2. A downward raycast probes the ground every fixed tick
//! 3. A spring-damper system applies forces to hold the ride height
//! 4. A torsional spring torques the body toward its facing target
//!
//! Every per-tick computation is a `FixedUpdate` system; state transitions
//! (grounded edges, jumps, platform changes) leave the crate as Bevy events
//! for external audio/particle/animation collaborators.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bevy::prelude::*;
//! use floating_capsule_controller::prelude::*;
//!
//! # #[cfg(feature = "rapier3d")]
//! # fn build() {
//! App::new()
//!     .add_plugins(DefaultPlugins)
//!     .add_plugins(CharacterControllerPlugin::<Rapier3dBackend>::default())
//!     .run();
//! # }
//! ```

use bevy::prelude::*;

pub mod backend;
pub mod collision;
pub mod config;
pub mod error;
pub mod events;
pub mod intent;
pub mod oscillator;
pub mod state;
pub mod systems;

#[cfg(feature = "rapier3d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::backend::CharacterPhysicsBackend;
    pub use crate::collision::GroundHit;
    pub use crate::config::{
        AccelerationCurve, BounceReaction, ControllerConfig, LookDirection,
    };
    pub use crate::error::ConfigError;
    pub use crate::events::{
        BounceImpact, GroundedChanged, JumpTriggered, MovementChanged, PlatformChanged,
    };
    pub use crate::intent::MovementIntent;
    pub use crate::oscillator::{Oscillator, TorsionalOscillator};
    pub use crate::state::{Airborne, CharacterController, Grounded, JumpState, UprightTarget};
    pub use crate::{CharacterControllerPlugin, CharacterControllerSet};

    #[cfg(feature = "rapier3d")]
    pub use crate::rapier::Rapier3dBackend;
}

/// Phases of the per-tick controller pipeline within `FixedUpdate`.
///
/// Backends hook their own systems into these: force-accumulator clearing
/// belongs in `Preparation`, the ground probe in `Sensors`. The core
/// controller chain runs in `Forces`; marker/event sync runs in `Feedback`.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterControllerSet {
    /// Clear per-tick force accumulators from the previous frame.
    Preparation,
    /// Recompute ground probes. Must complete before the controller chain.
    Sensors,
    /// The controller chain: ground state, movement, jump, springs,
    /// oscillators.
    Forces,
    /// Marker components and any backend feedback adapters.
    Feedback,
}

/// Main plugin for the character controller system.
///
/// This plugin is generic over a physics backend `B` which provides the
/// actual physics operations (rigid-body access, force application) and the
/// ground-probe system.
///
/// # Type Parameters
/// - `B`: The physics backend implementation (e.g., `Rapier3dBackend`)
///
/// # Examples
///
/// With the Rapier3D backend:
/// ```rust,no_run
/// use bevy::prelude::*;
/// use floating_capsule_controller::prelude::*;
///
/// # #[cfg(feature = "rapier3d")]
/// # fn build() {
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(CharacterControllerPlugin::<Rapier3dBackend>::default())
///     .run();
/// # }
/// ```
pub struct CharacterControllerPlugin<B: backend::CharacterPhysicsBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::CharacterPhysicsBackend> Default for CharacterControllerPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::CharacterPhysicsBackend> Plugin for CharacterControllerPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<config::ControllerConfig>();
        app.register_type::<config::BounceReaction>();
        app.register_type::<intent::MovementIntent>();
        app.register_type::<oscillator::Oscillator>();
        app.register_type::<oscillator::TorsionalOscillator>();
        app.register_type::<state::CharacterController>();
        app.register_type::<state::Grounded>();
        app.register_type::<state::Airborne>();

        // Feedback and input events
        app.add_event::<events::GroundedChanged>();
        app.add_event::<events::MovementChanged>();
        app.add_event::<events::JumpTriggered>();
        app.add_event::<events::PlatformChanged>();
        app.add_event::<events::BounceImpact>();

        app.configure_sets(
            FixedUpdate,
            (
                CharacterControllerSet::Preparation,
                CharacterControllerSet::Sensors,
                CharacterControllerSet::Forces,
                CharacterControllerSet::Feedback,
            )
                .chain(),
        );

        // Add the physics backend plugin (sensors, force accumulators)
        app.add_plugins(B::plugin());

        // Core systems in FixedUpdate. Ordering within the chain matters:
        // grounded determination and platform attachment feed the jump
        // machine and both springs in the same tick.
        app.add_systems(
            FixedUpdate,
            (
                systems::update_ground_state::<B>,
                systems::apply_movement_force::<B>,
                systems::update_jump::<B>,
                systems::maintain_height::<B>,
                systems::maintain_upright::<B>,
                systems::apply_bounce::<B>,
                systems::drive_oscillators::<B>,
                systems::drive_torsional_oscillators::<B>,
            )
                .chain()
                .in_set(CharacterControllerSet::Forces),
        );

        app.add_systems(
            FixedUpdate,
            systems::sync_state_markers.in_set(CharacterControllerSet::Feedback),
        );
    }
}
