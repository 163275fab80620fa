//! Physics backend abstraction.
//!
//! Controllers drive bodies only through [`LocomotionBackend`], so the same
//! locomotion, vehicle, jetpack and ragdoll logic runs on Rapier or on any
//! other engine that can read and write a rigid body.

use bevy::prelude::*;

/// Trait for physics backend implementations.
///
/// A backend owns the actual rigid bodies. Implementations also provide a
/// plugin that runs the sensor casts in
/// [`LocomotionSet::Sensors`](crate::LocomotionSet::Sensors) and pushes the
/// forces accumulated during a step into the engine in
/// [`LocomotionSet::FinalApplication`](crate::LocomotionSet::FinalApplication).
///
/// See the `rapier` module's `RapierBackend` for the bundled implementation.
pub trait LocomotionBackend: 'static + Send + Sync {
    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;

    /// Get the linear velocity of an entity.
    fn get_velocity(world: &World, entity: Entity) -> Vec3;

    /// Set the linear velocity of an entity.
    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3);

    /// Get the angular velocity of an entity (world space, rad/s).
    fn get_angular_velocity(world: &World, entity: Entity) -> Vec3;

    /// Set the angular velocity of an entity (world space, rad/s).
    fn set_angular_velocity(world: &mut World, entity: Entity, angular_velocity: Vec3);

    /// Apply an instantaneous change in momentum through the center of mass.
    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3);

    /// Apply a force through the center of mass for the current step.
    fn apply_force(world: &mut World, entity: Entity, force: Vec3);

    /// Apply a force at a world-space point for the current step.
    fn apply_force_at_point(world: &mut World, entity: Entity, force: Vec3, point: Vec3);

    /// Apply a world-space torque for the current step.
    fn apply_torque(world: &mut World, entity: Entity, torque: Vec3);

    /// Velocity of a world-space point rigidly attached to the body.
    fn point_velocity(world: &World, entity: Entity, point: Vec3) -> Vec3 {
        let linear = Self::get_velocity(world, entity);
        let angular = Self::get_angular_velocity(world, entity);
        linear + angular.cross(point - Self::center_of_mass(world, entity))
    }

    /// Get the world-space position of an entity.
    fn get_position(world: &World, entity: Entity) -> Vec3;

    /// Teleport an entity.
    fn set_position(world: &mut World, entity: Entity, position: Vec3);

    /// Get the world-space rotation of an entity.
    fn get_rotation(world: &World, entity: Entity) -> Quat;

    /// Set the world-space rotation of an entity.
    fn set_rotation(world: &mut World, entity: Entity, rotation: Quat);

    /// Get the mass of an entity.
    ///
    /// Used to turn acceleration-mode requests into forces.
    fn get_mass(_world: &World, _entity: Entity) -> f32 {
        1.0
    }

    /// Get the principal moments of inertia, in body space.
    fn get_principal_inertia(_world: &World, _entity: Entity) -> Vec3 {
        Vec3::ONE
    }

    /// World-space center of mass.
    fn center_of_mass(world: &World, entity: Entity) -> Vec3 {
        Self::get_position(world, entity)
    }

    /// Whether the body is kinematic (moved by transform, ignores forces).
    fn is_kinematic(world: &World, entity: Entity) -> bool;

    /// Switch the body between kinematic and dynamic.
    fn set_kinematic(world: &mut World, entity: Entity, kinematic: bool);

    /// Whether the body's collider takes part in contacts and casts.
    fn is_collider_enabled(world: &World, entity: Entity) -> bool;

    /// Enable or disable the body's collider.
    fn set_collider_enabled(world: &mut World, entity: Entity, enabled: bool);

    /// Set the body's linear damping.
    fn set_linear_damping(world: &mut World, entity: Entity, damping: f32);

    /// Enable or disable engine gravity for the body.
    fn set_gravity_enabled(world: &mut World, entity: Entity, enabled: bool);

    /// Get the fixed timestep delta time.
    fn get_fixed_timestep(world: &World) -> f32 {
        world
            .get_resource::<Time<Fixed>>()
            .map(|t| t.delta_secs())
            .filter(|&d| d > 0.0)
            .unwrap_or(1.0 / 60.0)
    }

    /// Give a freshly spawned projectile a dynamic body so impulses move it.
    fn attach_projectile_body(_world: &mut World, _entity: Entity) {}
}

/// Apply an acceleration-mode force (independent of mass).
pub fn apply_acceleration<B: LocomotionBackend>(
    world: &mut World,
    entity: Entity,
    acceleration: Vec3,
) {
    let mass = B::get_mass(world, entity);
    B::apply_force(world, entity, acceleration * mass);
}

/// Apply an acceleration-mode force at a world-space point.
pub fn apply_acceleration_at_point<B: LocomotionBackend>(
    world: &mut World,
    entity: Entity,
    acceleration: Vec3,
    point: Vec3,
) {
    let mass = B::get_mass(world, entity);
    B::apply_force_at_point(world, entity, acceleration * mass, point);
}

/// Apply a world-space angular acceleration, scaled by the body's inertia.
///
/// The inertia tensor is assumed diagonal in body space.
pub fn apply_angular_acceleration<B: LocomotionBackend>(
    world: &mut World,
    entity: Entity,
    angular_acceleration: Vec3,
) {
    let rotation = B::get_rotation(world, entity);
    let inertia = B::get_principal_inertia(world, entity);
    let local = rotation.inverse() * angular_acceleration;
    let torque = rotation * (local * inertia);
    B::apply_torque(world, entity, torque);
}

/// Forces written by the controllers during the current fixed step.
///
/// Backends that integrate forces through a persistent engine component
/// accumulate here, then flush once per step: the previous step's
/// contribution is subtracted first so forces written by other code survive.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct ForceAccumulator {
    /// Force accumulated this step.
    pub force: Vec3,
    /// Torque accumulated this step.
    pub torque: Vec3,
    applied_force: Vec3,
    applied_torque: Vec3,
}

impl ForceAccumulator {
    /// Add a force through the center of mass.
    #[inline]
    pub fn add_force(&mut self, force: Vec3) {
        self.force += force;
    }

    /// Add a torque.
    #[inline]
    pub fn add_torque(&mut self, torque: Vec3) {
        self.torque += torque;
    }

    /// Add a force at a point, given the center of mass.
    pub fn add_force_at_point(&mut self, force: Vec3, point: Vec3, center_of_mass: Vec3) {
        self.force += force;
        self.torque += (point - center_of_mass).cross(force);
    }

    /// Start a new step: returns what was flushed last step and clears.
    pub fn begin_step(&mut self) -> (Vec3, Vec3) {
        let previous = (self.applied_force, self.applied_torque);
        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
        self.applied_force = Vec3::ZERO;
        self.applied_torque = Vec3::ZERO;
        previous
    }

    /// End the step: returns what to flush and remembers it.
    pub fn finish_step(&mut self) -> (Vec3, Vec3) {
        self.applied_force = self.force;
        self.applied_torque = self.torque;
        (self.force, self.torque)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_round_trip() {
        let mut acc = ForceAccumulator::default();
        acc.add_force(Vec3::Y * 10.0);
        acc.add_torque(Vec3::X);
        assert_eq!(acc.finish_step(), (Vec3::Y * 10.0, Vec3::X));

        let (force, torque) = acc.begin_step();
        assert_eq!(force, Vec3::Y * 10.0);
        assert_eq!(torque, Vec3::X);
        assert_eq!(acc.force, Vec3::ZERO);
        assert_eq!(acc.begin_step(), (Vec3::ZERO, Vec3::ZERO));
    }

    #[test]
    fn force_at_point_adds_lever_torque() {
        let mut acc = ForceAccumulator::default();
        acc.add_force_at_point(Vec3::Y, Vec3::X, Vec3::ZERO);
        assert_eq!(acc.force, Vec3::Y);
        // r = +X, F = +Y -> torque about +Z
        assert!((acc.torque - Vec3::Z).length() < 1e-6);
    }
}
