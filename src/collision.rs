//! Ground probe result structure.
//!
//! The backend's ground-probe system recomputes this every tick and writes
//! it into the character controller; it is never reused across ticks.

use bevy::prelude::*;

/// Result of the per-tick downward ground probe.
#[derive(Debug, Clone, Copy)]
pub struct GroundHit {
    /// Distance from the probe origin to the hit point.
    pub distance: f32,
    /// World position of the hit point.
    pub point: Vec3,
    /// Surface normal at the hit point.
    pub normal: Vec3,
    /// Entity that was hit, if the backend can identify one.
    pub entity: Option<Entity>,
}

impl GroundHit {
    /// Create a new probe result.
    pub fn new(distance: f32, point: Vec3, normal: Vec3, entity: Option<Entity>) -> Self {
        Self {
            distance,
            point,
            normal,
            entity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_hit_fields() {
        let hit = GroundHit::new(1.5, Vec3::new(0.0, 0.0, 0.0), Vec3::Y, None);
        assert_eq!(hit.distance, 1.5);
        assert_eq!(hit.normal, Vec3::Y);
        assert!(hit.entity.is_none());
    }

    #[test]
    fn ground_hit_with_entity() {
        let entity = Entity::from_raw(7);
        let hit = GroundHit::new(0.0, Vec3::ZERO, Vec3::Y, Some(entity));
        assert_eq!(hit.entity, Some(entity));
        // A legitimate zero-distance hit is still a hit.
        assert_eq!(hit.distance, 0.0);
    }
}
