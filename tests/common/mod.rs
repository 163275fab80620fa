//! Deterministic in-memory physics backend for the integration tests.
//!
//! Bodies are integrated with explicit Euler over a single ground plane,
//! flat unless a test tilts it. Only on-foot players collide with the plane;
//! everything else floats on its own forces, which is all the controllers
//! need.

#![allow(dead_code)]

use bevy::prelude::*;
use locomotion_core::backend::LocomotionBackend;
use locomotion_core::collision::{ProbeHit, ProbeRequest, ProbeShape};
use locomotion_core::prelude::*;

pub const DT: f32 = 1.0 / 60.0;

/// Ground plane through `(0, height, 0)`.
#[derive(Resource, Debug, Clone, Copy)]
pub struct MockGround {
    pub height: f32,
    pub normal: Vec3,
}

impl Default for MockGround {
    fn default() -> Self {
        Self {
            height: 0.0,
            normal: Vec3::Y,
        }
    }
}

impl MockGround {
    /// Plane rising toward -Z by `degrees`.
    pub fn tilted(degrees: f32) -> Self {
        let angle = degrees.to_radians();
        Self {
            height: 0.0,
            normal: Vec3::new(0.0, angle.cos(), angle.sin()),
        }
    }

    /// Plane height under `(x, z)`.
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        self.height - (self.normal.x * x + self.normal.z * z) / self.normal.y
    }
}

/// Rigid body state for [`MockBackend`].
#[derive(Component, Debug, Clone, Copy)]
pub struct MockBody {
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub mass: f32,
    /// Uniform moment of inertia.
    pub inertia: f32,
    pub kinematic: bool,
    pub collider_enabled: bool,
    pub damping: f32,
    pub gravity_enabled: bool,
    pub force: Vec3,
    pub torque: Vec3,
    pub impulses: u32,
}

impl Default for MockBody {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass: 1.0,
            inertia: 1.0,
            kinematic: false,
            collider_enabled: true,
            damping: 0.0,
            gravity_enabled: true,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            impulses: 0,
        }
    }
}

impl MockBody {
    pub fn with_mass(mass: f32) -> Self {
        Self {
            mass,
            ..default()
        }
    }

    pub fn kinematic() -> Self {
        Self {
            kinematic: true,
            ..default()
        }
    }
}

pub struct MockBackend;

impl LocomotionBackend for MockBackend {
    fn plugin() -> impl Plugin {
        MockBackendPlugin
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world.get::<MockBody>(entity).map_or(Vec3::ZERO, |b| b.velocity)
    }

    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut body) = world.get_mut::<MockBody>(entity) {
            body.velocity = velocity;
        }
    }

    fn get_angular_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<MockBody>(entity)
            .map_or(Vec3::ZERO, |b| b.angular_velocity)
    }

    fn set_angular_velocity(world: &mut World, entity: Entity, angular_velocity: Vec3) {
        if let Some(mut body) = world.get_mut::<MockBody>(entity) {
            body.angular_velocity = angular_velocity;
        }
    }

    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3) {
        if let Some(mut body) = world.get_mut::<MockBody>(entity) {
            if !body.kinematic {
                let mass = body.mass;
                body.velocity += impulse / mass;
            }
            body.impulses += 1;
        }
    }

    fn apply_force(world: &mut World, entity: Entity, force: Vec3) {
        if let Some(mut body) = world.get_mut::<MockBody>(entity) {
            body.force += force;
        }
    }

    fn apply_force_at_point(world: &mut World, entity: Entity, force: Vec3, point: Vec3) {
        let center = Self::center_of_mass(world, entity);
        if let Some(mut body) = world.get_mut::<MockBody>(entity) {
            body.force += force;
            body.torque += (point - center).cross(force);
        }
    }

    fn apply_torque(world: &mut World, entity: Entity, torque: Vec3) {
        if let Some(mut body) = world.get_mut::<MockBody>(entity) {
            body.torque += torque;
        }
    }

    fn get_position(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Transform>(entity)
            .map_or(Vec3::ZERO, |t| t.translation)
    }

    fn set_position(world: &mut World, entity: Entity, position: Vec3) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.translation = position;
        }
    }

    fn get_rotation(world: &World, entity: Entity) -> Quat {
        world
            .get::<Transform>(entity)
            .map_or(Quat::IDENTITY, |t| t.rotation)
    }

    fn set_rotation(world: &mut World, entity: Entity, rotation: Quat) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.rotation = rotation;
        }
    }

    fn get_mass(world: &World, entity: Entity) -> f32 {
        world.get::<MockBody>(entity).map_or(1.0, |b| b.mass)
    }

    fn get_principal_inertia(world: &World, entity: Entity) -> Vec3 {
        Vec3::splat(world.get::<MockBody>(entity).map_or(1.0, |b| b.inertia))
    }

    fn is_kinematic(world: &World, entity: Entity) -> bool {
        world.get::<MockBody>(entity).is_some_and(|b| b.kinematic)
    }

    fn set_kinematic(world: &mut World, entity: Entity, kinematic: bool) {
        if let Some(mut body) = world.get_mut::<MockBody>(entity) {
            body.kinematic = kinematic;
        }
    }

    fn is_collider_enabled(world: &World, entity: Entity) -> bool {
        world.get::<MockBody>(entity).is_some_and(|b| b.collider_enabled)
    }

    fn set_collider_enabled(world: &mut World, entity: Entity, enabled: bool) {
        if let Some(mut body) = world.get_mut::<MockBody>(entity) {
            body.collider_enabled = enabled;
        }
    }

    fn set_linear_damping(world: &mut World, entity: Entity, damping: f32) {
        if let Some(mut body) = world.get_mut::<MockBody>(entity) {
            body.damping = damping;
        }
    }

    fn set_gravity_enabled(world: &mut World, entity: Entity, enabled: bool) {
        if let Some(mut body) = world.get_mut::<MockBody>(entity) {
            body.gravity_enabled = enabled;
        }
    }

    fn attach_projectile_body(world: &mut World, entity: Entity) {
        world.entity_mut(entity).insert(MockBody {
            gravity_enabled: false,
            ..default()
        });
    }
}

pub struct MockBackendPlugin;

impl Plugin for MockBackendPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MockGround>();
        app.add_systems(
            FixedUpdate,
            (mock_player_probes, mock_wheel_probes, mock_hip_probes)
                .in_set(LocomotionSet::Sensors),
        );
        app.add_systems(
            FixedUpdate,
            integrate_bodies.in_set(LocomotionSet::FinalApplication),
        );
    }
}

/// Cast against the ground plane.
pub fn probe_plane(request: &ProbeRequest, ground: &MockGround) -> Option<ProbeHit> {
    let facing = ground.normal.dot(request.direction);
    if facing >= 0.0 {
        return None;
    }
    let bottom = match request.shape {
        ProbeShape::Ray => request.origin,
        ProbeShape::Box { half_extents, .. } => request.origin - Vec3::Y * half_extents.y,
    };
    let anchor = Vec3::Y * ground.height;
    let distance = ground.normal.dot(anchor - bottom) / facing;
    if !(0.0..=request.max_distance).contains(&distance) {
        return None;
    }
    let point = bottom + request.direction * distance;
    Some(ProbeHit::new(point, ground.normal, distance, None))
}

fn mock_player_probes(
    ground: Res<MockGround>,
    mut q: Query<(&Transform, &MovementConfig, &mut PlayerController)>,
) {
    for (transform, config, mut controller) in &mut q {
        if !controller.can_move {
            continue;
        }
        let (position, rotation) = (transform.translation, transform.rotation);
        let probe = PlayerController::ground_probe(config, position, rotation);
        let slope = PlayerController::slope_probe(config, position, rotation);
        controller.ground = probe_plane(&probe, &ground);
        controller.slope = probe_plane(&slope, &ground);
    }
}

fn mock_wheel_probes(
    ground: Res<MockGround>,
    mut q: Query<(&Transform, &VehicleConfig, &mut VehicleController)>,
) {
    for (transform, config, mut controller) in &mut q {
        controller.sync_corners(config);
        for corner in &mut controller.corners {
            let ray = VehicleController::wheel_probe(
                config,
                transform.translation,
                transform.rotation,
                corner.local_point,
            );
            corner.hit = probe_plane(&ray, &ground);
        }
    }
}

fn mock_hip_probes(
    ground: Res<MockGround>,
    transforms: Query<&Transform>,
    mut q: Query<(&mut Ragdoll, Option<&RagdollConfig>)>,
) {
    for (mut ragdoll, config) in &mut q {
        let Ok(hips) = transforms.get(ragdoll.hips) else {
            continue;
        };
        let config = config.copied().unwrap_or_default();
        let ray = Ragdoll::hip_probe(hips.translation, &config);
        ragdoll.hip_ground = probe_plane(&ray, &ground);
    }
}

fn integrate_bodies(
    gravity: Res<WorldGravity>,
    ground: Res<MockGround>,
    mut q: Query<(
        &mut Transform,
        &mut MockBody,
        Option<&MovementConfig>,
        Has<PlayerController>,
    )>,
) {
    for (mut transform, mut body, config, is_player) in &mut q {
        let force = std::mem::take(&mut body.force);
        let torque = std::mem::take(&mut body.torque);
        if body.kinematic {
            continue;
        }

        let mut acceleration = force / body.mass;
        if body.gravity_enabled {
            acceleration += gravity.0;
        }
        let damping = 1.0 / (1.0 + body.damping * DT);
        body.velocity = (body.velocity + acceleration * DT) * damping;
        let inertia = body.inertia;
        body.angular_velocity += torque / inertia * DT;

        transform.translation += body.velocity * DT;
        let spin = body.angular_velocity * DT;
        if spin.length_squared() > 0.0 {
            transform.rotation = (Quat::from_scaled_axis(spin) * transform.rotation).normalize();
        }

        if is_player {
            let half_height = config.map_or(1.0, |c| c.player_height * 0.5);
            let (x, z) = (transform.translation.x, transform.translation.z);
            let floor = ground.height_at(x, z) + half_height;
            if transform.translation.y < floor {
                transform.translation.y = floor;
                // Frictionless contact: drop the velocity into the plane.
                let into = body.velocity.dot(ground.normal);
                if into < 0.0 {
                    body.velocity -= ground.normal * into;
                }
            }
        }
    }
}

/// App with the locomotion plugin on the mock backend.
pub fn create_test_app() -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.add_plugins(LocomotionPlugin::<MockBackend>::default());
    app.insert_resource(Time::<Fixed>::from_hz(60.0));
    app.insert_resource(LocomotionRng::seeded(7));
    app.finish();
    app.cleanup();
    app
}

/// Run one fixed step.
pub fn step(app: &mut App) {
    app.world_mut().run_schedule(FixedUpdate);
}

pub fn run_steps(app: &mut App, steps: usize) {
    for _ in 0..steps {
        step(app);
    }
}

pub fn body(app: &App, entity: Entity) -> MockBody {
    *app.world().get::<MockBody>(entity).unwrap()
}

pub fn position(app: &App, entity: Entity) -> Vec3 {
    app.world().get::<Transform>(entity).unwrap().translation
}

/// On-foot player standing on the plane.
pub fn spawn_player(app: &mut App, at: Vec3) -> Entity {
    app.world_mut()
        .spawn((
            Transform::from_translation(at),
            MockBody::with_mass(70.0),
            PlayerController::new(),
            MovementConfig::default(),
            LocomotionIntent::default(),
            BodyAuthority::held_by(ControlOwner::Locomotion),
            Mounter::default(),
            MountIntent::default(),
            AnimationParams::default(),
            CameraRig::default(),
        ))
        .id()
}

/// Parked car resting over the plane.
pub fn spawn_vehicle(app: &mut App, at: Vec3) -> Entity {
    app.world_mut()
        .spawn((
            Transform::from_translation(at),
            MockBody {
                mass: 1200.0,
                inertia: 1500.0,
                ..default()
            },
            VehicleController::new(&VehicleConfig::default()),
            VehicleConfig::default(),
            DriveIntent::default(),
            BodyAuthority::vacant(),
            Mountable::vehicle(),
        ))
        .id()
}

/// Parked jetpack.
pub fn spawn_jetpack(app: &mut App, at: Vec3) -> Entity {
    app.world_mut()
        .spawn((
            Transform::from_translation(at),
            MockBody {
                mass: 20.0,
                kinematic: true,
                ..default()
            },
            JetpackController::default(),
            JetpackSettings::default(),
            JetpackIntent::default(),
            BodyAuthority::vacant(),
            Mountable::jetpack(),
        ))
        .id()
}

/// Character with a ragdoll of `limbs` parts hanging under it.
pub fn spawn_ragdoll(
    app: &mut App,
    kind: RagdollKind,
    at: Vec3,
    limbs: usize,
) -> (Entity, Vec<Entity>) {
    let parts: Vec<Entity> = (0..limbs)
        .map(|i| {
            app.world_mut()
                .spawn((
                    Transform::from_translation(at + Vec3::Y * (0.2 * i as f32)),
                    MockBody {
                        kinematic: true,
                        collider_enabled: false,
                        gravity_enabled: false,
                        ..default()
                    },
                ))
                .id()
        })
        .collect();
    let hips = parts[0];
    let root = app
        .world_mut()
        .spawn((
            Transform::from_translation(at),
            MockBody::with_mass(70.0),
            Ragdoll::new(kind, hips, parts.clone()),
            RagdollConfig::default(),
            BodyAuthority::held_by(ControlOwner::Locomotion),
            AnimationParams::default(),
            Vitals::default(),
        ))
        .id();
    for &part in &parts {
        app.world_mut().entity_mut(part).insert(RagdollPart { root });
    }
    (root, parts)
}
