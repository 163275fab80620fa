//! Ground and slope probing.
//!
//! Controllers never query the physics world themselves. They describe the
//! casts they need as [`ProbeRequest`]s, the backend's sensor systems run
//! them in [`LocomotionSet::Sensors`](crate::LocomotionSet::Sensors) and
//! write the resulting [`ProbeHit`]s back onto the controllers.

use bevy::prelude::*;

/// Slopes at or below this angle count as flat ground.
pub const FLAT_GROUND_ANGLE_DEG: f32 = 4.0;

/// Result of a ray or shape cast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeHit {
    /// World-space contact point.
    pub point: Vec3,
    /// Surface normal at the contact point (normalized).
    pub normal: Vec3,
    /// Distance travelled along the cast direction.
    pub distance: f32,
    /// Entity that was hit, if known.
    pub entity: Option<Entity>,
}

impl ProbeHit {
    /// Create a new probe hit.
    pub fn new(point: Vec3, normal: Vec3, distance: f32, entity: Option<Entity>) -> Self {
        Self {
            point,
            normal: normal.normalize_or(Vec3::Y),
            distance,
            entity,
        }
    }

    /// Angle between the hit normal and world up, in degrees.
    #[inline]
    pub fn slope_angle_deg(&self) -> f32 {
        slope_angle_deg(self.normal)
    }
}

/// Shape swept by a [`ProbeRequest`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeShape {
    /// Infinitely thin ray.
    Ray,
    /// Oriented box.
    Box { half_extents: Vec3, rotation: Quat },
}

/// A cast a controller wants the backend to perform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeRequest {
    pub origin: Vec3,
    /// Cast direction (normalized).
    pub direction: Vec3,
    pub max_distance: f32,
    pub shape: ProbeShape,
}

impl ProbeRequest {
    /// A ray cast.
    pub fn ray(origin: Vec3, direction: Vec3, max_distance: f32) -> Self {
        Self {
            origin,
            direction: direction.normalize_or(Vec3::NEG_Y),
            max_distance,
            shape: ProbeShape::Ray,
        }
    }

    /// A box sweep.
    pub fn cuboid(
        origin: Vec3,
        half_extents: Vec3,
        rotation: Quat,
        direction: Vec3,
        max_distance: f32,
    ) -> Self {
        Self {
            origin,
            direction: direction.normalize_or(Vec3::NEG_Y),
            max_distance,
            shape: ProbeShape::Box {
                half_extents,
                rotation,
            },
        }
    }

    /// Point reached at `distance` along the cast.
    #[inline]
    pub fn point_at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

/// Angle between `normal` and world up, in degrees.
pub fn slope_angle_deg(normal: Vec3) -> f32 {
    normal.normalize_or(Vec3::Y).angle_between(Vec3::Y).to_degrees()
}

/// Whether a slope of `angle_deg` takes the slope movement path.
///
/// Near-flat surfaces up to [`FLAT_GROUND_ANGLE_DEG`] use the flat path so
/// tiny terrain bumps do not flip the controller between modes.
#[inline]
pub fn is_walkable_slope(angle_deg: f32, max_slope_angle_deg: f32) -> bool {
    angle_deg > FLAT_GROUND_ANGLE_DEG && angle_deg < max_slope_angle_deg
}

/// Project a movement direction onto the plane of a slope.
#[inline]
pub fn project_on_slope(direction: Vec3, normal: Vec3) -> Vec3 {
    direction.reject_from_normalized(normal.normalize_or(Vec3::Y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_normal_has_zero_angle() {
        assert!(slope_angle_deg(Vec3::Y).abs() < 1e-4);
    }

    #[test]
    fn tilted_normal_angle() {
        let normal = Quat::from_rotation_x(30f32.to_radians()) * Vec3::Y;
        assert!((slope_angle_deg(normal) - 30.0).abs() < 1e-3);
    }

    #[test]
    fn walkable_slope_window_is_open_on_both_ends() {
        assert!(!is_walkable_slope(0.0, 40.0));
        assert!(!is_walkable_slope(4.0, 40.0));
        assert!(is_walkable_slope(4.5, 40.0));
        assert!(is_walkable_slope(39.9, 40.0));
        assert!(!is_walkable_slope(40.0, 40.0));
    }

    #[test]
    fn slope_projection_lies_in_plane() {
        let normal = (Quat::from_rotation_x(20f32.to_radians()) * Vec3::Y).normalize();
        let projected = project_on_slope(Vec3::NEG_Z, normal);
        assert!(projected.dot(normal).abs() < 1e-5);
        assert!(projected.z < 0.0);
    }

    #[test]
    fn request_point_at() {
        let request = ProbeRequest::ray(Vec3::new(0.0, 2.0, 0.0), Vec3::NEG_Y, 5.0);
        assert_eq!(request.point_at(2.0), Vec3::ZERO);
    }
}
