//! Rapier3D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier3D.
//! Enable with the `rapier3d` feature.

use bevy::prelude::*;
use bevy_rapier3d::parry::shape::Cuboid;
use bevy_rapier3d::prelude::*;

use crate::backend::{ForceAccumulator, LocomotionBackend};
use crate::collision::{ProbeHit, ProbeRequest, ProbeShape};
use crate::combat::{BodyImpact, Projectile, ProjectileContact};
use crate::config::{MovementConfig, RagdollConfig, VehicleConfig, Vitals};
use crate::player::PlayerController;
use crate::ragdoll::{Ragdoll, RagdollPart};
use crate::vehicle::VehicleController;
use crate::{LocomotionSet, WorldGravity};

/// Radius of the ball collider given to projectiles.
const PROJECTILE_RADIUS: f32 = 0.05;

/// Rapier3D physics backend.
///
/// Forces and torques are accumulated in [`ForceAccumulator`] during a step
/// and flushed into `ExternalForce` once, in
/// [`LocomotionSet::FinalApplication`]. Probes are run by dedicated Rapier
/// systems that receive the Rapier context as a system parameter.
pub struct RapierBackend;

impl LocomotionBackend for RapierBackend {
    fn plugin() -> impl Plugin {
        RapierBackendPlugin
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Velocity>(entity)
            .map(|v| v.linvel)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            vel.linvel = velocity;
        }
    }

    fn get_angular_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Velocity>(entity)
            .map(|v| v.angvel)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_angular_velocity(world: &mut World, entity: Entity, angular_velocity: Vec3) {
        if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            vel.angvel = angular_velocity;
        }
    }

    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3) {
        if let Some(mut ext_impulse) = world.get_mut::<ExternalImpulse>(entity) {
            ext_impulse.impulse += impulse;
            return;
        }
        // Fallback: apply as velocity change if no ExternalImpulse component
        let mass = Self::get_mass(world, entity);
        if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            vel.linvel += impulse / mass;
        }
    }

    fn apply_force(world: &mut World, entity: Entity, force: Vec3) {
        // Forces reach ExternalForce in apply_controller_forces.
        if let Some(mut acc) = world.get_mut::<ForceAccumulator>(entity) {
            acc.add_force(force);
        }
    }

    fn apply_force_at_point(world: &mut World, entity: Entity, force: Vec3, point: Vec3) {
        let center = Self::center_of_mass(world, entity);
        if let Some(mut acc) = world.get_mut::<ForceAccumulator>(entity) {
            acc.add_force_at_point(force, point, center);
        }
    }

    fn apply_torque(world: &mut World, entity: Entity, torque: Vec3) {
        if let Some(mut acc) = world.get_mut::<ForceAccumulator>(entity) {
            acc.add_torque(torque);
        }
    }

    fn get_position(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Transform>(entity)
            .map(|t| t.translation)
            .or_else(|| world.get::<GlobalTransform>(entity).map(|t| t.translation()))
            .unwrap_or(Vec3::ZERO)
    }

    fn set_position(world: &mut World, entity: Entity, position: Vec3) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.translation = position;
        }
    }

    fn get_rotation(world: &World, entity: Entity) -> Quat {
        world
            .get::<Transform>(entity)
            .map(|t| t.rotation)
            .or_else(|| {
                world.get::<GlobalTransform>(entity).map(|t| {
                    let (_, rotation, _) = t.to_scale_rotation_translation();
                    rotation
                })
            })
            .unwrap_or(Quat::IDENTITY)
    }

    fn set_rotation(world: &mut World, entity: Entity, rotation: Quat) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.rotation = rotation;
        }
    }

    fn get_mass(world: &World, entity: Entity) -> f32 {
        // Rapier fills ReadMassProperties after the first step; until then,
        // or for bodies without it, treat the body as unit mass.
        world
            .get::<ReadMassProperties>(entity)
            .map(|props| props.mass)
            .filter(|mass| *mass > 0.0 && mass.is_finite())
            .unwrap_or(1.0)
    }

    fn get_principal_inertia(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<ReadMassProperties>(entity)
            .map(|props| props.principal_inertia)
            .filter(|inertia| inertia.min_element() > 0.0 && inertia.is_finite())
            .unwrap_or(Vec3::ONE)
    }

    fn center_of_mass(world: &World, entity: Entity) -> Vec3 {
        let position = Self::get_position(world, entity);
        let rotation = Self::get_rotation(world, entity);
        let local = world
            .get::<ReadMassProperties>(entity)
            .map(|props| props.local_center_of_mass)
            .unwrap_or(Vec3::ZERO);
        position + rotation * local
    }

    fn is_kinematic(world: &World, entity: Entity) -> bool {
        matches!(
            world.get::<RigidBody>(entity),
            Some(RigidBody::KinematicPositionBased | RigidBody::KinematicVelocityBased)
        )
    }

    fn set_kinematic(world: &mut World, entity: Entity, kinematic: bool) {
        let body = if kinematic {
            RigidBody::KinematicPositionBased
        } else {
            RigidBody::Dynamic
        };
        if let Ok(mut entity_mut) = world.get_entity_mut(entity) {
            entity_mut.insert(body);
        }
    }

    fn is_collider_enabled(world: &World, entity: Entity) -> bool {
        world.get::<ColliderDisabled>(entity).is_none()
    }

    fn set_collider_enabled(world: &mut World, entity: Entity, enabled: bool) {
        let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
            return;
        };
        if enabled {
            entity_mut.remove::<ColliderDisabled>();
        } else {
            entity_mut.insert(ColliderDisabled);
        }
    }

    fn set_linear_damping(world: &mut World, entity: Entity, damping: f32) {
        if let Some(mut current) = world.get_mut::<Damping>(entity) {
            current.linear_damping = damping;
        } else if let Ok(mut entity_mut) = world.get_entity_mut(entity) {
            entity_mut.insert(Damping {
                linear_damping: damping,
                angular_damping: 0.0,
            });
        }
    }

    fn set_gravity_enabled(world: &mut World, entity: Entity, enabled: bool) {
        let scale = if enabled { 1.0 } else { 0.0 };
        if let Some(mut gravity) = world.get_mut::<GravityScale>(entity) {
            gravity.0 = scale;
        } else if let Ok(mut entity_mut) = world.get_entity_mut(entity) {
            entity_mut.insert(GravityScale(scale));
        }
    }

    fn attach_projectile_body(world: &mut World, entity: Entity) {
        if let Ok(mut entity_mut) = world.get_entity_mut(entity) {
            entity_mut.insert((
                RigidBody::Dynamic,
                Collider::ball(PROJECTILE_RADIUS),
                Velocity::default(),
                ExternalImpulse::default(),
                Ccd::enabled(),
                ActiveEvents::COLLISION_EVENTS,
            ));
        }
    }
}

/// Plugin that sets up Rapier3D-specific systems for the locomotion core.
pub struct RapierBackendPlugin;

impl Plugin for RapierBackendPlugin {
    fn build(&self, app: &mut App) {
        // Phase 1: Preparation - Clear forces from previous step
        app.add_systems(
            FixedUpdate,
            (clear_controller_forces, sync_world_gravity).in_set(LocomotionSet::Preparation),
        );

        // Phase 2: Sensors - Rapier-specific probes
        app.add_systems(
            FixedUpdate,
            (
                rapier_ground_detection,
                rapier_wheel_detection,
                rapier_hip_detection,
                forward_collision_events,
            )
                .in_set(LocomotionSet::Sensors),
        );

        // Phase 5: Final Application - Apply accumulated forces to physics
        app.add_systems(
            FixedUpdate,
            apply_controller_forces.in_set(LocomotionSet::FinalApplication),
        );
    }
}

/// Run a [`ProbeRequest`] against the Rapier world.
fn rapier_probe(
    context: &RapierContext,
    request: &ProbeRequest,
    filter: QueryFilter,
) -> Option<ProbeHit> {
    match request.shape {
        ProbeShape::Ray => context
            .cast_ray_and_get_normal(
                request.origin,
                request.direction,
                request.max_distance,
                true, // solid = true for solid hits
                filter,
            )
            .map(|(hit_entity, hit)| {
                ProbeHit::new(hit.point, hit.normal, hit.time_of_impact, Some(hit_entity))
            }),
        ProbeShape::Box {
            half_extents,
            rotation,
        } => {
            let shape = Cuboid::new(half_extents.into());
            context
                .cast_shape(
                    request.origin,
                    rotation,
                    request.direction,
                    &shape,
                    ShapeCastOptions {
                        max_time_of_impact: request.max_distance,
                        stop_at_penetration: false,
                        ..default()
                    },
                    filter,
                )
                .map(|(hit_entity, hit)| {
                    // Extract normal from hit details or use default
                    let normal = hit.details.map(|d| d.normal1).unwrap_or(-request.direction);
                    let point = request.point_at(hit.time_of_impact);
                    ProbeHit::new(point, normal, hit.time_of_impact, Some(hit_entity))
                })
        }
    }
}

/// Ground and slope box casts for on-foot players.
fn rapier_ground_detection(
    rapier_context: ReadRapierContext,
    mut q_players: Query<(
        Entity,
        &Transform,
        &MovementConfig,
        &mut PlayerController,
        Option<&CollisionGroups>,
    )>,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };

    for (entity, transform, config, mut controller, collision_groups) in &mut q_players {
        if !controller.can_move {
            continue;
        }
        let mut filter = QueryFilter::default()
            .exclude_rigid_body(entity)
            .exclude_sensors();
        if let Some(groups) = collision_groups {
            filter = filter.groups(*groups);
        }

        let (position, rotation) = (transform.translation, transform.rotation);
        let ground = PlayerController::ground_probe(config, position, rotation);
        let slope = PlayerController::slope_probe(config, position, rotation);
        controller.ground = rapier_probe(&context, &ground, filter);
        controller.slope = rapier_probe(&context, &slope, filter);
    }
}

/// One suspension ray per wheel, along the chassis' local down.
fn rapier_wheel_detection(
    rapier_context: ReadRapierContext,
    mut q_vehicles: Query<(
        Entity,
        &Transform,
        &VehicleConfig,
        &mut VehicleController,
        Option<&CollisionGroups>,
    )>,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };

    for (entity, transform, config, mut controller, collision_groups) in &mut q_vehicles {
        controller.sync_corners(config);
        let driver = controller.driver;
        let mut filter = QueryFilter::default()
            .exclude_rigid_body(entity)
            .exclude_sensors();
        if let Some(driver) = driver {
            filter = filter.exclude_collider(driver);
        }
        if let Some(groups) = collision_groups {
            filter = filter.groups(*groups);
        }

        for corner in &mut controller.corners {
            let ray = VehicleController::wheel_probe(
                config,
                transform.translation,
                transform.rotation,
                corner.local_point,
            );
            corner.hit = rapier_probe(&context, &ray, filter);
        }
    }
}

/// Hip ray used to place a recovering ragdoll back on the ground.
fn rapier_hip_detection(
    rapier_context: ReadRapierContext,
    transforms: Query<&GlobalTransform>,
    mut q_ragdolls: Query<(Entity, &mut Ragdoll, Option<&RagdollConfig>)>,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };

    for (entity, mut ragdoll, config) in &mut q_ragdolls {
        if !ragdoll.is_simulating() {
            continue;
        }
        let Ok(hips) = transforms.get(ragdoll.hips) else {
            continue;
        };
        let config = config.cloned().unwrap_or_default();
        let hit = {
            let parts = &ragdoll.parts;
            let ignore_parts =
                |collider: Entity| collider != entity && !parts.contains(&collider);
            let filter = QueryFilter::default()
                .exclude_sensors()
                .predicate(&ignore_parts);
            let ray = Ragdoll::hip_probe(hips.translation(), &config);
            rapier_probe(&context, &ray, filter)
        };
        ragdoll.hip_ground = hit;
    }
}

/// Bridge Rapier contacts into projectile contacts and body impacts.
fn forward_collision_events(
    mut collisions: MessageReader<CollisionEvent>,
    projectiles: Query<(), With<Projectile>>,
    characters: Query<(), Or<(With<Vitals>, With<RagdollPart>)>>,
    bodies: Query<(&Velocity, &ReadMassProperties)>,
    mut contacts: MessageWriter<ProjectileContact>,
    mut impacts: MessageWriter<BodyImpact>,
) {
    for event in collisions.read() {
        let CollisionEvent::Started(a, b, _) = *event else {
            continue;
        };
        for (this, other) in [(a, b), (b, a)] {
            if projectiles.contains(this) {
                contacts.write(ProjectileContact {
                    projectile: this,
                    other,
                });
                continue;
            }
            if !characters.contains(this) || projectiles.contains(other) {
                continue;
            }
            let Ok((other_velocity, other_mass)) = bodies.get(other) else {
                continue;
            };
            let this_velocity = bodies.get(this).map(|(v, _)| v.linvel).unwrap_or(Vec3::ZERO);
            impacts.write(BodyImpact {
                body: this,
                other,
                relative_velocity: other_velocity.linvel - this_velocity,
                other_mass: other_mass.mass,
            });
        }
    }
}

/// Mirror the engine's gravity for jetpack compensation.
fn sync_world_gravity(configs: Query<&RapierConfiguration>, mut gravity: ResMut<WorldGravity>) {
    if let Ok(config) = configs.single() {
        if gravity.0 != config.gravity {
            gravity.0 = config.gravity;
        }
    }
}

/// Clear controller forces at the start of each step.
///
/// Subtracts what we applied last step from ExternalForce, so forces other
/// code writes to ExternalForce survive, then clears the accumulators.
pub fn clear_controller_forces(mut q: Query<(&mut ExternalForce, &mut ForceAccumulator)>) {
    for (mut ext_force, mut acc) in &mut q {
        let (force_to_subtract, torque_to_subtract) = acc.begin_step();
        ext_force.force -= force_to_subtract;
        ext_force.torque -= torque_to_subtract;
    }
}

/// Apply controller forces at the end of each step.
///
/// Adds the accumulated forces to ExternalForce and remembers them for the
/// next step's subtraction.
pub fn apply_controller_forces(mut q: Query<(&mut ExternalForce, &mut ForceAccumulator)>) {
    for (mut ext_force, mut acc) in &mut q {
        let (force_to_apply, torque_to_apply) = acc.finish_step();
        ext_force.force += force_to_apply;
        ext_force.torque += torque_to_apply;
    }
}

/// Bundle for creating a controlled body with Rapier3D physics.
///
/// Provides the rigid body, velocity tracking, external forces and impulses,
/// damping, mass properties and the per-step [`ForceAccumulator`].
///
/// # Example
///
/// ```ignore
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use locomotion_core::prelude::*;
///
/// fn spawn_player(mut commands: Commands) {
///     commands.spawn((
///         Transform::from_xyz(0.0, 1.0, 0.0),
///         PlayerController::new(),
///         MovementConfig::default(),
///         LocomotionIntent::default(),
///         BodyAuthority::held_by(ControlOwner::Locomotion),
///         RapierLocomotionBundle::upright(),
///         Collider::capsule_y(0.5, 0.5),
///     ));
/// }
/// ```
///
/// # Rotation Modes
///
/// - [`RapierLocomotionBundle::upright()`]: locks all rotation. On-foot
///   players turn their model, never their body.
/// - [`RapierLocomotionBundle::new()`]: free rotation, for vehicles and
///   jetpacks whose attitude is driven by torques.
#[derive(Bundle, Default)]
pub struct RapierLocomotionBundle {
    pub rigid_body: RigidBody,
    pub velocity: Velocity,
    /// Written once per step from the accumulator.
    pub external_force: ExternalForce,
    /// Used for jump impulses, recoil and knockback.
    pub external_impulse: ExternalImpulse,
    pub locked_axes: LockedAxes,
    pub damping: Damping,
    pub gravity_scale: GravityScale,
    /// Computed mass properties. Rapier updates this from the collider.
    pub mass_properties: ReadMassProperties,
    pub forces: ForceAccumulator,
}

impl RapierLocomotionBundle {
    /// Create a new bundle with rotation enabled.
    ///
    /// # Defaults
    ///
    /// - Rigid body: [`RigidBody::Dynamic`]
    /// - Linear damping: 0.0
    /// - Angular damping: 0.5
    /// - Gravity scale: 1.0
    pub fn new() -> Self {
        Self {
            rigid_body: RigidBody::Dynamic,
            velocity: Velocity::default(),
            external_force: ExternalForce::default(),
            external_impulse: ExternalImpulse::default(),
            locked_axes: LockedAxes::empty(),
            damping: Damping {
                linear_damping: 0.0,
                angular_damping: 0.5,
            },
            gravity_scale: GravityScale(1.0),
            // Rapier will update this based on collider after first physics step
            mass_properties: ReadMassProperties::default(),
            forces: ForceAccumulator::default(),
        }
    }

    /// Create a bundle with rotation locked, for on-foot characters.
    pub fn upright() -> Self {
        Self {
            locked_axes: LockedAxes::ROTATION_LOCKED,
            ..Self::new()
        }
    }

    /// Set the rigid body type.
    pub fn with_body(mut self, body: RigidBody) -> Self {
        self.rigid_body = body;
        self
    }

    /// Set the damping coefficients for velocity reduction.
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.damping = Damping {
            linear_damping: linear,
            angular_damping: angular,
        };
        self
    }

    /// Set which axes should be locked for the rigid body.
    pub fn with_locked_axes(mut self, axes: LockedAxes) -> Self {
        self.locked_axes = axes;
        self
    }
}
