//! Feedback and input events.
//!
//! The controller publishes discrete state transitions as Bevy events for
//! external audio, particle and animation collaborators; it never knows
//! what consumes them. [`BounceImpact`] flows the other way: the collision
//! solver (or any adapter) reports contact impulses for the bounce
//! reaction to act on.

use bevy::prelude::*;

/// The character transitioned between grounded and ungrounded.
#[derive(Event, Debug, Clone, Copy)]
pub struct GroundedChanged {
    /// The character entity.
    pub entity: Entity,
    /// The new grounded state.
    pub grounded: bool,
}

/// The character started or stopped grounded horizontal movement.
#[derive(Event, Debug, Clone, Copy)]
pub struct MovementChanged {
    /// The character entity.
    pub entity: Entity,
    /// Whether the character is now moving on the ground.
    pub moving: bool,
}

/// A jump impulse was applied this tick.
#[derive(Event, Debug, Clone, Copy)]
pub struct JumpTriggered {
    /// The character entity.
    pub entity: Entity,
}

/// The rigid body the character rests on changed.
///
/// An external hierarchy manager can use this to re-parent purely visual
/// transform state; the controller keeps no scene graph of its own.
#[derive(Event, Debug, Clone, Copy)]
pub struct PlatformChanged {
    /// The character entity.
    pub entity: Entity,
    /// The new platform, or None when airborne / on static ground.
    pub platform: Option<Entity>,
}

/// A contact impulse reported by the collision solver.
///
/// Consumed by the bounce reaction system for entities carrying a
/// [`BounceReaction`](crate::config::BounceReaction) component.
#[derive(Event, Debug, Clone, Copy)]
pub struct BounceImpact {
    /// The impacted entity.
    pub entity: Entity,
    /// The other body in the contact, if known.
    pub other: Option<Entity>,
    /// Total contact impulse.
    pub impulse: Vec3,
    /// Contact point in world space.
    pub point: Vec3,
    /// Contact normal, pointing away from the other body.
    pub normal: Vec3,
}
