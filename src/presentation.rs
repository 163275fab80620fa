//! Variable-rate presentation state.
//!
//! The fixed-step controllers are the source of truth. This module mirrors
//! their state into the parameters an animator, a follow camera and vehicle
//! cosmetics consume, and smooths those values once per rendered frame.

use bevy::prelude::*;

use crate::config::VehicleConfig;
use crate::intent::{DriveIntent, LocomotionIntent};
use crate::player::{LocomotionState, PlayerController};
use crate::ragdoll::Ragdoll;
use crate::vehicle::VehicleController;

/// One-shot animator triggers.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationTrigger {
    Jump,
    EnterVehicle,
}

/// Animator states the core plays directly.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationClip {
    StandUp,
}

/// Parameters written for an animation graph.
///
/// The core never reads animation state back; stand-up completion is paced
/// by a delay, not by an animation event.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct AnimationParams {
    /// Whether the animator drives the skeleton. Off while ragdolled.
    pub enabled: bool,
    pub walking: bool,
    pub running: bool,
    pub grounded: bool,
    pub stand_up: bool,
    /// Triggers raised since the animation graph last drained them.
    pub triggers: Vec<AnimationTrigger>,
    /// Clip requested to play immediately.
    pub play: Option<AnimationClip>,
}

impl Default for AnimationParams {
    fn default() -> Self {
        Self {
            enabled: true,
            walking: false,
            running: false,
            grounded: true,
            stand_up: false,
            triggers: Vec::new(),
            play: None,
        }
    }
}

impl AnimationParams {
    /// Raise a one-shot trigger.
    pub fn trigger(&mut self, trigger: AnimationTrigger) {
        self.triggers.push(trigger);
    }

    /// Take all pending triggers.
    pub fn drain_triggers(&mut self) -> Vec<AnimationTrigger> {
        std::mem::take(&mut self.triggers)
    }
}

/// Follow camera coupling for a player.
///
/// The core writes field of view, shake and damping targets, and reads
/// `yaw` for camera-relative movement and jetpack strafe facing.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct CameraRig {
    /// Camera heading around world up (rad). Zero looks down -Z.
    pub yaw: f32,
    /// Player-controlled orbit enabled.
    pub free_look: bool,
    /// Follow position damping.
    pub follow_damping: f32,

    pub default_fov: f32,
    pub target_fov: f32,
    pub fov: f32,
    /// Rate at which `fov` follows `target_fov` (1/s).
    pub fov_lerp_rate: f32,

    pub default_shake_amplitude: f32,
    pub default_shake_frequency: f32,
    pub shake_amplitude: f32,
    pub shake_frequency: f32,
    /// Rate at which shake returns to its defaults (1/s).
    pub shake_recovery_speed: f32,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            free_look: true,
            follow_damping: 1.0,
            default_fov: 60.0,
            target_fov: 60.0,
            fov: 60.0,
            fov_lerp_rate: 8.0,
            default_shake_amplitude: 0.0,
            default_shake_frequency: 0.0,
            shake_amplitude: 0.0,
            shake_frequency: 0.0,
            shake_recovery_speed: 2.0,
        }
    }
}

impl CameraRig {
    /// Horizontal forward of the camera.
    pub fn forward(&self) -> Vec3 {
        Quat::from_rotation_y(self.yaw) * Vec3::NEG_Z
    }

    /// Horizontal right of the camera.
    pub fn right(&self) -> Vec3 {
        Quat::from_rotation_y(self.yaw) * Vec3::X
    }

    /// Start a shake. It decays back to the defaults.
    pub fn shake(&mut self, amplitude: f32, frequency: f32) {
        self.shake_amplitude = amplitude;
        self.shake_frequency = frequency;
    }

    /// Request a new field of view.
    pub fn change_fov(&mut self, fov: f32) {
        self.target_fov = fov;
    }

    /// Go back to the default field of view.
    pub fn reset_fov(&mut self) {
        self.target_fov = self.default_fov;
    }

    /// Advance smoothing by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        let fov_t = (dt * self.fov_lerp_rate).clamp(0.0, 1.0);
        self.fov += (self.target_fov - self.fov) * fov_t;

        let shake_t = (dt * self.shake_recovery_speed).clamp(0.0, 1.0);
        self.shake_amplitude += (self.default_shake_amplitude - self.shake_amplitude) * shake_t;
        self.shake_frequency += (self.default_shake_frequency - self.shake_frequency) * shake_t;
    }
}

/// Facing of the visible player model, turned toward the move direction.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct ModelFacing {
    /// Current heading (rad). Zero looks down -Z.
    pub yaw: f32,
    /// Turn rate toward the input direction (1/s).
    pub rotation_speed: f32,
}

impl Default for ModelFacing {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            rotation_speed: 10.0,
        }
    }
}

/// Cosmetic vehicle state: wheel spin and steer, skid marks and smoke.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct VehicleEffects {
    /// Accumulated wheel spin (deg).
    pub wheel_spin: f32,
    /// Visual steer angle of the front wheels (deg).
    pub steer_angle: f32,
    /// Skid marks, smoke and speed lines.
    pub skidding: bool,
    /// Steering particle on the left side.
    pub steer_particles_left: bool,
    /// Steering particle on the right side.
    pub steer_particles_right: bool,
}

impl VehicleEffects {
    /// Switch every effect off.
    pub fn stop(&mut self) {
        self.skidding = false;
        self.steer_particles_left = false;
        self.steer_particles_right = false;
    }
}

/// Mirror player locomotion into animation parameters.
pub fn update_player_animation(
    mut q: Query<(&PlayerController, Option<&Ragdoll>, &mut AnimationParams)>,
) {
    for (controller, ragdoll, mut params) in &mut q {
        if !controller.can_move || ragdoll.is_some_and(Ragdoll::is_ragdoll) {
            continue;
        }
        params.walking = controller.state == LocomotionState::Walk;
        params.running = controller.state == LocomotionState::Sprint;
        params.grounded = controller.grounded || controller.on_slope;
    }
}

/// Smooth camera field of view and shake.
pub fn update_camera_rigs(time: Res<Time>, mut q: Query<&mut CameraRig>) {
    let dt = time.delta_secs();
    for mut rig in &mut q {
        rig.tick(dt);
    }
}

/// Turn the player model toward the camera-relative input direction.
pub fn update_model_facing(
    time: Res<Time>,
    mut q: Query<(&mut ModelFacing, &LocomotionIntent, &CameraRig, &PlayerController)>,
) {
    let dt = time.delta_secs();
    for (mut facing, intent, rig, controller) in &mut q {
        if !controller.can_move || !intent.is_moving() {
            continue;
        }
        let direction = rig.right() * intent.move_axis.x + rig.forward() * intent.move_axis.y;
        if direction.length_squared() < 1e-6 {
            continue;
        }
        let target = Quat::from_rotation_y(yaw_of(direction));
        let current = Quat::from_rotation_y(facing.yaw);
        let t = (facing.rotation_speed * dt).clamp(0.0, 1.0);
        let (yaw, _, _) = current.slerp(target, t).to_euler(EulerRot::YXZ);
        facing.yaw = yaw;
    }
}

/// Heading of a horizontal direction, zero along -Z.
#[inline]
pub fn yaw_of(direction: Vec3) -> f32 {
    (-direction.x).atan2(-direction.z)
}

/// Drive wheel spin, steer and skid effects from the vehicle state.
pub fn update_vehicle_effects(
    time: Res<Time>,
    mut q: Query<(
        &VehicleController,
        &VehicleConfig,
        Option<&DriveIntent>,
        &mut VehicleEffects,
    )>,
) {
    let dt = time.delta_secs();
    for (vehicle, config, drive, mut effects) in &mut q {
        if !vehicle.engaged {
            effects.stop();
            continue;
        }
        let steer = drive.map_or(0.0, |d| d.steer);
        effects.steer_angle = steer * config.wheel_steer_angle;
        effects.wheel_spin = (effects.wheel_spin
            + vehicle.velocity_ratio * config.wheel_rotation_speed * dt)
            .rem_euclid(360.0);

        let skidding =
            vehicle.grounded && vehicle.local_velocity.x.abs() > config.effects_threshold;
        effects.skidding = skidding;
        effects.steer_particles_left = skidding && steer > 0.0;
        effects.steer_particles_right = skidding && steer < 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fov_converges_to_target() {
        let mut rig = CameraRig::default();
        rig.change_fov(90.0);
        for _ in 0..120 {
            rig.tick(1.0 / 60.0);
        }
        assert!((rig.fov - 90.0).abs() < 0.1);
        rig.reset_fov();
        assert_eq!(rig.target_fov, rig.default_fov);
    }

    #[test]
    fn shake_decays_to_default() {
        let mut rig = CameraRig::default();
        rig.shake(3.0, 5.0);
        let mut last = rig.shake_amplitude;
        for _ in 0..300 {
            rig.tick(1.0 / 60.0);
            assert!(rig.shake_amplitude <= last);
            last = rig.shake_amplitude;
        }
        assert!(rig.shake_amplitude < 0.01);
    }

    #[test]
    fn camera_axes_follow_yaw() {
        let rig = CameraRig {
            yaw: std::f32::consts::FRAC_PI_2,
            ..default()
        };
        // Quarter turn left: forward becomes -X, right becomes -Z.
        assert!((rig.forward() - Vec3::NEG_X).length() < 1e-5);
        assert!((rig.right() - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn yaw_of_inverts_forward() {
        for yaw in [-2.5f32, -1.0, 0.0, 0.7, 3.0] {
            let rig = CameraRig { yaw, ..default() };
            assert!((yaw_of(rig.forward()) - yaw).abs() < 1e-5);
        }
    }

    #[test]
    fn triggers_drain() {
        let mut params = AnimationParams::default();
        params.trigger(AnimationTrigger::Jump);
        assert_eq!(params.drain_triggers(), vec![AnimationTrigger::Jump]);
        assert!(params.triggers.is_empty());
    }
}
