//! Player on-foot locomotion.
//!
//! A dynamic rigid body is pushed around by forces: a camera-relative drive
//! force, slope adhesion or extra gravity, and a delayed jump impulse.
//! Speed is held under the walk or sprint target by a vector clamp, and
//! grounded drag is set before any force is written so residual damping can
//! never help the body climb a slope.

use bevy::prelude::*;

use crate::authority::{self, ControlOwner};
use crate::backend::LocomotionBackend;
use crate::collision::{is_walkable_slope, project_on_slope, ProbeHit, ProbeRequest};
use crate::config::{Misconfigured, MovementConfig};
use crate::intent::LocomotionIntent;
use crate::presentation::{AnimationParams, AnimationTrigger, CameraRig};
use crate::systems::report_fault_once;

/// Observational movement state, derived every step. Drives animation only.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocomotionState {
    #[default]
    Idle,
    Walk,
    Sprint,
    Air,
}

/// Progress of a jump.
///
/// The wind-up lets the take-off animation play before the impulse fires;
/// the cooldown keeps the body from jumping again on landing.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Default)]
pub enum JumpPhase {
    #[default]
    Ready,
    WindUp { remaining: f32 },
    Cooldown { remaining: f32 },
}

/// On-foot controller state.
///
/// Probe results are written by the backend sensors; everything else is
/// owned by [`apply_player_locomotion`].
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct PlayerController {
    /// Cleared by mount and ragdoll orchestration. While false the whole
    /// step is skipped and the state stays frozen.
    pub can_move: bool,
    /// Grounded box probe result.
    #[reflect(ignore)]
    pub ground: Option<ProbeHit>,
    /// Slope probe result.
    #[reflect(ignore)]
    pub slope: Option<ProbeHit>,
    pub grounded: bool,
    /// Standing on a walkable slope steeper than flat ground.
    pub on_slope: bool,
    pub state: LocomotionState,
    pub jump: JumpPhase,
    /// Slope adhesion is suspended from take-off until the jump cooldown ends.
    pub exiting_slope: bool,
    pub(crate) fault_reported: bool,
}

impl Default for PlayerController {
    fn default() -> Self {
        Self {
            can_move: true,
            ground: None,
            slope: None,
            grounded: false,
            on_slope: false,
            state: LocomotionState::Idle,
            jump: JumpPhase::Ready,
            exiting_slope: false,
            fault_reported: false,
        }
    }
}

impl PlayerController {
    /// Create a new controller that may move.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable movement. Disabling drops any jump in flight.
    pub fn set_can_move(&mut self, can_move: bool) {
        self.can_move = can_move;
        if !can_move {
            self.jump = JumpPhase::Ready;
            self.exiting_slope = false;
        }
    }

    /// Whether a new jump may start.
    #[inline]
    pub fn can_jump(&self) -> bool {
        self.jump == JumpPhase::Ready
    }

    /// Box cast answering "is grounded".
    pub fn ground_probe(config: &MovementConfig, position: Vec3, rotation: Quat) -> ProbeRequest {
        ProbeRequest::cuboid(
            position,
            config.check_box_half_extents,
            rotation,
            Vec3::NEG_Y,
            config.ground_probe_length(),
        )
    }

    /// Box cast answering "which slope am I on".
    pub fn slope_probe(config: &MovementConfig, position: Vec3, rotation: Quat) -> ProbeRequest {
        ProbeRequest::cuboid(
            position,
            config.check_box_half_extents,
            rotation,
            Vec3::NEG_Y,
            config.slope_probe_length(),
        )
    }

    /// Derive `grounded` and `on_slope` from the latest probe results.
    pub fn refresh_ground(&mut self, config: &MovementConfig) {
        self.grounded = self.ground.is_some();
        self.on_slope = self
            .slope
            .is_some_and(|hit| is_walkable_slope(hit.slope_angle_deg(), config.max_slope_angle));
    }

    /// Project a movement direction onto the current slope.
    ///
    /// Returns the direction unchanged when no slope was probed.
    pub fn slope_move_direction(&self, direction: Vec3) -> Vec3 {
        match self.slope {
            Some(hit) => project_on_slope(direction, hit.normal),
            None => direction,
        }
    }
}

/// Classify movement for animation.
pub fn movement_state(
    grounded: bool,
    speed: f32,
    sprinting: bool,
    threshold: f32,
) -> LocomotionState {
    if !grounded {
        LocomotionState::Air
    } else if speed > threshold {
        if sprinting {
            LocomotionState::Sprint
        } else {
            LocomotionState::Walk
        }
    } else {
        LocomotionState::Idle
    }
}

/// Limit `acceleration` so that one step of it cannot push `velocity` past
/// `max_speed`.
///
/// The limit is a vector clamp on the predicted velocity, so the direction of
/// travel can still change at full speed.
pub fn limit_acceleration(velocity: Vec3, acceleration: Vec3, max_speed: f32, dt: f32) -> Vec3 {
    if dt <= 0.0 {
        return Vec3::ZERO;
    }
    let predicted = velocity + acceleration * dt;
    if predicted.length() <= max_speed {
        return acceleration;
    }
    (predicted.clamp_length_max(max_speed) - velocity) / dt
}

/// Camera-relative, flattened movement direction (not normalized).
pub fn camera_relative_direction(move_axis: Vec2, camera_yaw: f32) -> Vec3 {
    let yaw = Quat::from_rotation_y(camera_yaw);
    yaw * Vec3::X * move_axis.x + yaw * Vec3::NEG_Z * move_axis.y
}

/// Apply on-foot movement, slope handling, extra gravity and jumps.
pub fn apply_player_locomotion<B: LocomotionBackend>(world: &mut World) {
    let entities: Vec<(
        Entity,
        PlayerController,
        Option<MovementConfig>,
        Option<LocomotionIntent>,
        f32,
        bool,
    )> = world
        .query::<(
            Entity,
            &PlayerController,
            Option<&MovementConfig>,
            Option<&LocomotionIntent>,
            Option<&CameraRig>,
            Has<Misconfigured<MovementConfig>>,
        )>()
        .iter(world)
        .map(|(e, controller, config, intent, rig, misconfigured)| {
            (
                e,
                controller.clone(),
                config.copied(),
                intent.copied(),
                rig.map_or(0.0, |r| r.yaw),
                misconfigured,
            )
        })
        .collect();

    let dt = B::get_fixed_timestep(world);

    for (entity, mut controller, config, intent, camera_yaw, misconfigured) in entities {
        if !controller.can_move || misconfigured {
            continue;
        }
        let (Some(config), Some(intent)) = (config, intent) else {
            report_fault_once(
                &mut controller.fault_reported,
                entity,
                "PlayerController needs MovementConfig and LocomotionIntent",
            );
            write_back(world, entity, controller);
            continue;
        };
        if !authority::permits(world, entity, ControlOwner::Locomotion) {
            continue;
        }

        // Ground check
        controller.refresh_ground(&config);
        let grounded = controller.grounded;

        let speed = if intent.sprint {
            config.sprint_speed
        } else {
            config.walk_speed
        };

        let velocity = B::get_velocity(world, entity);
        controller.state = movement_state(
            grounded,
            velocity.length(),
            intent.sprint,
            config.moving_threshold,
        );

        // Drag before forces
        let drag = if grounded { config.ground_drag } else { 0.0 };
        B::set_linear_damping(world, entity, drag);

        let mass = B::get_mass(world, entity);
        let direction = camera_relative_direction(intent.move_axis, camera_yaw);

        if controller.on_slope && !controller.exiting_slope {
            let mut velocity = velocity;
            if velocity.length() > speed {
                velocity = velocity.normalize() * speed;
                B::set_velocity(world, entity, velocity);
            }

            let slope_direction = controller
                .slope_move_direction(direction.normalize_or_zero())
                .normalize_or_zero();
            let drive = slope_direction * speed * config.drive_multiplier;
            let drive = limit_acceleration(velocity, drive, speed, dt);
            B::apply_force(world, entity, drive * mass);

            let adhesion = if velocity.y > 0.0 {
                config.slope_adhesion_rising
            } else {
                config.slope_adhesion_falling
            };
            B::apply_force(world, entity, Vec3::NEG_Y * adhesion * mass);
        } else {
            let mut flat = Vec3::new(velocity.x, 0.0, velocity.z);
            if flat.length() > speed {
                flat = flat.clamp_length_max(speed);
                B::set_velocity(world, entity, Vec3::new(flat.x, velocity.y, flat.z));
            }

            let multiplier = if grounded { 1.0 } else { config.air_multiplier };
            let drive =
                direction.normalize_or_zero() * speed * config.drive_multiplier * multiplier;
            let drive = limit_acceleration(flat, drive, speed, dt);
            B::apply_force(world, entity, drive * mass);

            let extra_gravity = if velocity.y < 0.0 {
                config.increased_gravity
            } else {
                config.constant_down_gravity
            };
            B::apply_force(world, entity, Vec3::NEG_Y * extra_gravity * mass);
        }

        B::set_gravity_enabled(world, entity, !controller.on_slope);

        // Jump
        let mut jumped = false;
        match controller.jump {
            JumpPhase::Ready => {
                if grounded && intent.jump.just_pressed() {
                    controller.jump = JumpPhase::WindUp {
                        remaining: config.jump_delay,
                    };
                    controller.exiting_slope = true;
                    jumped = true;
                }
            }
            JumpPhase::WindUp { remaining } => {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    let velocity = B::get_velocity(world, entity);
                    B::set_velocity(world, entity, Vec3::new(velocity.x, 0.0, velocity.z));
                    B::apply_impulse(world, entity, Vec3::Y * config.jump_force * mass);
                    controller.jump = JumpPhase::Cooldown {
                        remaining: config.jump_cooldown,
                    };
                } else {
                    controller.jump = JumpPhase::WindUp { remaining };
                }
            }
            JumpPhase::Cooldown { remaining } => {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    controller.jump = JumpPhase::Ready;
                    controller.exiting_slope = false;
                } else {
                    controller.jump = JumpPhase::Cooldown { remaining };
                }
            }
        }

        if jumped {
            if let Some(mut params) = world.get_mut::<AnimationParams>(entity) {
                params.trigger(AnimationTrigger::Jump);
            }
        }

        write_back(world, entity, controller);
    }
}

fn write_back(world: &mut World, entity: Entity, controller: PlayerController) {
    if let Some(mut current) = world.get_mut::<PlayerController>(entity) {
        *current = controller;
    }
}
