//! Jetpack flight.
//!
//! Thrust along body up holds altitude against gravity. Pitch and roll are
//! tracked by a PD controller toward setpoints that come from stick input in
//! normal mode and decay back to level without it. Strafe mode instead
//! tracks a camera-relative horizontal velocity and turns the body to face
//! where the camera looks.

use bevy::prelude::*;

use crate::authority::{self, ControlOwner};
use crate::backend::{apply_acceleration, apply_angular_acceleration, LocomotionBackend};
use crate::config::{JetpackSettings, Misconfigured};
use crate::intent::JetpackIntent;
use crate::presentation::CameraRig;
use crate::systems::report_fault_once;
use crate::WorldGravity;

/// Stick deflection below which an axis counts as released.
const INPUT_EPSILON: f32 = 0.01;

/// Flight mode, chosen every step from [`JetpackIntent::strafe_mode`].
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlightMode {
    #[default]
    Normal,
    Strafe,
}

/// Jetpack flight state.
///
/// Attitude setpoints persist between steps: they are smoothed targets, not
/// readings.
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct JetpackController {
    /// Somebody is flying it.
    pub active: bool,
    /// Clear setpoints and velocities on the next step.
    pub needs_reset: bool,
    /// Pitch setpoint (deg).
    pub target_pitch: f32,
    /// Roll setpoint (deg).
    pub target_roll: f32,
    /// Commanded yaw rate in normal mode (deg/s).
    pub yaw_rate: f32,
    /// Heading strafe mode is turning toward (rad).
    pub facing_yaw: f32,
    pub mode: FlightMode,
    pub rider: Option<Entity>,
    /// Thrust acceleration applied last step (m/s²).
    pub current_thrust: f32,
    pub(crate) fault_reported: bool,
}

impl JetpackController {
    /// Start flying. Setpoints and velocities are cleared on the next step.
    pub fn activate(&mut self, rider: Entity) {
        self.active = true;
        self.rider = Some(rider);
        self.needs_reset = true;
    }

    /// Stop flying.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.rider = None;
        self.reset_setpoints();
        self.current_thrust = 0.0;
    }

    fn reset_setpoints(&mut self) {
        self.target_pitch = 0.0;
        self.target_roll = 0.0;
        self.yaw_rate = 0.0;
        self.mode = FlightMode::Normal;
    }
}

/// Upward acceleration that cancels gravity for a collective input.
///
/// Full negative collective cancels nothing, so the pack free-falls.
pub fn gravity_compensation(collective: f32, gravity: f32, factor: f32) -> f32 {
    let hover = gravity.abs() * factor;
    if collective >= 0.0 {
        hover
    } else {
        hover * (1.0 + collective.max(-1.0))
    }
}

/// Total thrust acceleration along body up.
#[inline]
pub fn thrust_acceleration(collective: f32, gravity: f32, settings: &JetpackSettings) -> f32 {
    collective * settings.thrust_power
        + gravity_compensation(collective, gravity, settings.gravity_compensation_factor)
}

/// Wrap an angle in degrees to `(-180, 180]`.
pub fn normalize_angle_deg(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Wrap an angle in radians to `(-π, π]`.
pub fn normalize_angle_rad(angle: f32) -> f32 {
    normalize_angle_deg(angle.to_degrees()).to_radians()
}

/// PD torque for one axis.
///
/// The error is wrapped before use so that crossing ±180° never flips the
/// torque.
#[inline]
pub fn pd_axis_torque(
    target_deg: f32,
    current_deg: f32,
    angular_velocity: f32,
    p: f32,
    d: f32,
) -> f32 {
    normalize_angle_deg(target_deg - current_deg).to_radians() * p - angular_velocity * d
}

/// Move `current` toward `target` by at most `max_delta`.
#[inline]
pub fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    let delta = target - current;
    if delta.abs() <= max_delta {
        target
    } else {
        current + delta.signum() * max_delta
    }
}

/// Decay a setpoint toward level, snapping inside the deadzone.
pub fn auto_level(target: f32, max_delta: f32, deadzone: f32) -> f32 {
    let next = move_towards(target, 0.0, max_delta);
    if next.abs() < deadzone {
        0.0
    } else {
        next
    }
}

/// Strafe tracking acceleration: velocity error clamped to `limit`.
#[inline]
pub fn strafe_acceleration(target_velocity: Vec3, horizontal_velocity: Vec3, limit: f32) -> Vec3 {
    (target_velocity - horizontal_velocity).clamp_length_max(limit)
}

/// Thrust, damping, strafe tracking, attitude PD and yaw control.
pub fn apply_jetpack_flight<B: LocomotionBackend>(world: &mut World) {
    let entities: Vec<(
        Entity,
        JetpackController,
        Option<JetpackSettings>,
        Option<JetpackIntent>,
        bool,
    )> = world
        .query::<(
            Entity,
            &JetpackController,
            Option<&JetpackSettings>,
            Option<&JetpackIntent>,
            Has<Misconfigured<JetpackSettings>>,
        )>()
        .iter(world)
        .map(|(e, controller, settings, intent, misconfigured)| {
            (e, controller.clone(), settings.copied(), intent.copied(), misconfigured)
        })
        .collect();

    let dt = B::get_fixed_timestep(world);
    let gravity = world
        .get_resource::<WorldGravity>()
        .map_or(WorldGravity::default().0, |g| g.0)
        .length();

    for (entity, mut controller, settings, intent, misconfigured) in entities {
        if !controller.active || misconfigured {
            continue;
        }
        // Input is routed to the pack, or left on the rider.
        let intent = intent.or_else(|| {
            controller
                .rider
                .and_then(|rider| world.get::<JetpackIntent>(rider).copied())
        });
        let (Some(settings), Some(intent)) = (settings, intent) else {
            report_fault_once(
                &mut controller.fault_reported,
                entity,
                "JetpackController needs JetpackSettings and JetpackIntent",
            );
            write_back(world, entity, controller);
            continue;
        };
        if !authority::permits(world, entity, ControlOwner::Jetpack) {
            continue;
        }

        let rotation = B::get_rotation(world, entity);
        let (current_yaw, _, _) = rotation.to_euler(EulerRot::YXZ);

        if controller.needs_reset {
            controller.reset_setpoints();
            controller.facing_yaw = current_yaw;
            controller.needs_reset = false;
            B::set_velocity(world, entity, Vec3::ZERO);
            B::set_angular_velocity(world, entity, Vec3::ZERO);
        }

        controller.mode = if intent.strafe_mode {
            FlightMode::Strafe
        } else {
            FlightMode::Normal
        };

        // Thrust
        let collective = intent.collective();
        let thrust = thrust_acceleration(collective, gravity, &settings);
        controller.current_thrust = thrust;
        debug!(
            "Jetpack {entity:?}: collective={collective:.2}, thrust={:.2}, total={thrust:.2}",
            collective * settings.thrust_power
        );
        apply_acceleration::<B>(world, entity, rotation * Vec3::Y * thrust);

        // Damping
        let velocity = B::get_velocity(world, entity);
        let horizontal = Vec3::new(velocity.x, 0.0, velocity.z);
        apply_acceleration::<B>(
            world,
            entity,
            Vec3::Y * -velocity.y * settings.vertical_damping,
        );
        apply_acceleration::<B>(world, entity, -horizontal * settings.horizontal_damping);

        // Setpoints
        let level_rate = settings.auto_level_speed * dt;
        let gain_scale = match controller.mode {
            FlightMode::Strafe => {
                let camera_yaw = camera_yaw(world, entity, controller.rider).unwrap_or(current_yaw);
                let flat_forward = Quat::from_rotation_y(camera_yaw) * Vec3::NEG_Z;
                let flat_right = Quat::from_rotation_y(camera_yaw) * Vec3::X;
                let target = (flat_forward * intent.move_axis.y + flat_right * intent.move_axis.x)
                    * settings.max_strafe_speed;
                let limit = if intent.move_axis.length() > INPUT_EPSILON {
                    settings.strafe_acceleration
                } else {
                    settings.strafe_braking
                };
                apply_acceleration::<B>(
                    world,
                    entity,
                    strafe_acceleration(target, horizontal, limit),
                );

                let multiplier = settings.strafe_stabilization_multiplier;
                controller.target_pitch = auto_level(
                    controller.target_pitch,
                    level_rate * settings.max_pitch_degrees * multiplier,
                    settings.auto_level_deadzone,
                );
                controller.target_roll = auto_level(
                    controller.target_roll,
                    level_rate * settings.max_roll_degrees * multiplier,
                    settings.auto_level_deadzone,
                );
                controller.yaw_rate = 0.0;

                let smoothing = 1.0 - (-settings.facing_smoothing * dt).exp();
                controller.facing_yaw = normalize_angle_rad(
                    controller.facing_yaw
                        + normalize_angle_rad(camera_yaw - controller.facing_yaw) * smoothing,
                );
                multiplier
            }
            FlightMode::Normal => {
                controller.target_pitch = if intent.move_axis.y.abs() > INPUT_EPSILON {
                    (-intent.move_axis.y * settings.max_pitch_degrees)
                        .clamp(-settings.max_pitch_degrees, settings.max_pitch_degrees)
                } else {
                    auto_level(
                        controller.target_pitch,
                        level_rate * settings.max_pitch_degrees,
                        settings.auto_level_deadzone,
                    )
                };
                controller.target_roll = if intent.move_axis.x.abs() > INPUT_EPSILON {
                    (-intent.move_axis.x * settings.max_roll_degrees)
                        .clamp(-settings.max_roll_degrees, settings.max_roll_degrees)
                } else {
                    auto_level(
                        controller.target_roll,
                        level_rate * settings.max_roll_degrees,
                        settings.auto_level_deadzone,
                    )
                };
                controller.yaw_rate = intent.yaw.clamp(-1.0, 1.0) * settings.yaw_rate;
                controller.facing_yaw = current_yaw;
                1.0
            }
        };

        // Attitude PD, in body space
        let (_, pitch, roll) = rotation.to_euler(EulerRot::YXZ);
        let local_angular = rotation.inverse() * B::get_angular_velocity(world, entity);
        let p = settings.stabilization_p * gain_scale;
        let d = settings.stabilization_d * gain_scale;
        let mut local_torque = Vec3::new(
            pd_axis_torque(controller.target_pitch, pitch.to_degrees(), local_angular.x, p, d),
            0.0,
            pd_axis_torque(controller.target_roll, roll.to_degrees(), local_angular.z, p, d),
        );

        // Yaw
        match controller.mode {
            FlightMode::Normal => {
                // Right yaw is a negative turn about +Y.
                let desired = -controller.yaw_rate.to_radians();
                local_torque.y = if intent.yaw.abs() > INPUT_EPSILON {
                    (desired - local_angular.y) * settings.stabilization_p * 0.5
                } else {
                    -local_angular.y * settings.yaw_damping
                };
                apply_angular_acceleration::<B>(world, entity, rotation * local_torque);
            }
            FlightMode::Strafe => {
                apply_angular_acceleration::<B>(world, entity, rotation * local_torque);
                let mut angular = B::get_angular_velocity(world, entity);
                angular.y = normalize_angle_rad(controller.facing_yaw - current_yaw)
                    * settings.facing_smoothing;
                B::set_angular_velocity(world, entity, angular);
            }
        }

        write_back(world, entity, controller);
    }
}

fn camera_yaw(world: &World, entity: Entity, rider: Option<Entity>) -> Option<f32> {
    rider
        .and_then(|rider| world.get::<CameraRig>(rider))
        .or_else(|| world.get::<CameraRig>(entity))
        .map(|rig| rig.yaw)
}

fn write_back(world: &mut World, entity: Entity, controller: JetpackController) {
    if let Some(mut current) = world.get_mut::<JetpackController>(entity) {
        *current = controller;
    }
}
