//! Tunable records.
//!
//! Every controller reads its numbers from one of these components. They are
//! plain data with `Default` presets and `with_*` builders, so they can be
//! authored in code or loaded from scene data through reflection.
//!
//! Each record implements [`ValidatedConfig`]. The plugin validates records
//! when they are added or changed and tags the owning entity with
//! [`Misconfigured<T>`] when validation fails; force paths skip tagged
//! entities instead of dividing by a zero travel or a zero duration.

use std::marker::PhantomData;

use bevy::prelude::*;

use crate::error::ConfigError;

/// A tunable record that can be checked once at setup time.
pub trait ValidatedConfig: Component {
    /// Human readable record name used in log lines.
    const NAME: &'static str;

    /// Check every field the control math divides by or clamps against.
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Marker placed on an entity whose `T` record failed validation.
///
/// Removed again as soon as a corrected record is written.
#[derive(Component, Debug, Clone)]
pub struct Misconfigured<T: ValidatedConfig> {
    /// The validation failure, kept for inspection.
    pub error: ConfigError,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ValidatedConfig> Misconfigured<T> {
    pub fn new(error: ConfigError) -> Self {
        Self {
            error,
            _marker: PhantomData,
        }
    }
}

// ==================== Player ====================

/// On-foot movement tunables.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct MovementConfig {
    /// Target horizontal speed while walking (m/s).
    pub walk_speed: f32,
    /// Target horizontal speed while sprinting (m/s).
    pub sprint_speed: f32,
    /// Drive acceleration per unit of target speed.
    pub drive_multiplier: f32,
    /// Drive scale while airborne, in `[0, 1]`.
    pub air_multiplier: f32,
    /// Linear damping while grounded.
    pub ground_drag: f32,
    /// Extra downward acceleration while falling (m/s²).
    pub increased_gravity: f32,
    /// Extra downward acceleration while rising or level (m/s²).
    pub constant_down_gravity: f32,
    /// Full standing height of the body; probes start from its center.
    pub player_height: f32,
    /// Half extents of the ground probe box.
    pub check_box_half_extents: Vec3,
    /// Probe reach below the feet for the grounded check.
    pub ground_probe_margin: f32,
    /// Probe reach below the feet for the slope check.
    pub slope_probe_margin: f32,
    /// Steepest walkable slope in degrees.
    pub max_slope_angle: f32,
    /// Downward adhesion on a slope while moving up (m/s²).
    pub slope_adhesion_rising: f32,
    /// Downward adhesion on a slope while moving down or level (m/s²).
    pub slope_adhesion_falling: f32,
    /// Upward velocity change applied by a jump (m/s).
    pub jump_force: f32,
    /// Wind-up between the key press and the impulse (s).
    pub jump_delay: f32,
    /// Lockout after the impulse before another jump (s).
    pub jump_cooldown: f32,
    /// Speed above which the body counts as moving for animation (m/s).
    pub moving_threshold: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            walk_speed: 5.0,
            sprint_speed: 9.0,
            drive_multiplier: 10.0,
            air_multiplier: 0.4,
            ground_drag: 5.0,
            increased_gravity: 15.0,
            constant_down_gravity: 5.0,
            player_height: 2.0,
            check_box_half_extents: Vec3::new(0.3, 0.05, 0.3),
            ground_probe_margin: 0.15,
            slope_probe_margin: 0.2,
            max_slope_angle: 40.0,
            slope_adhesion_rising: 50.0,
            slope_adhesion_falling: 30.0,
            jump_force: 7.0,
            jump_delay: 0.15,
            jump_cooldown: 0.4,
            moving_threshold: 0.5,
        }
    }
}

impl MovementConfig {
    /// Builder: set walk and sprint speed.
    pub fn with_speeds(mut self, walk: f32, sprint: f32) -> Self {
        self.walk_speed = walk;
        self.sprint_speed = sprint;
        self
    }

    /// Builder: set the grounded damping.
    pub fn with_ground_drag(mut self, drag: f32) -> Self {
        self.ground_drag = drag;
        self
    }

    /// Builder: set the airborne drive scale.
    pub fn with_air_multiplier(mut self, multiplier: f32) -> Self {
        self.air_multiplier = multiplier;
        self
    }

    /// Builder: set jump strength and timing.
    pub fn with_jump(mut self, force: f32, delay: f32, cooldown: f32) -> Self {
        self.jump_force = force;
        self.jump_delay = delay;
        self.jump_cooldown = cooldown;
        self
    }

    /// Builder: set the steepest walkable slope in degrees.
    pub fn with_max_slope_angle(mut self, degrees: f32) -> Self {
        self.max_slope_angle = degrees;
        self
    }

    /// Distance from the body center to the bottom of the grounded probe.
    #[inline]
    pub fn ground_probe_length(&self) -> f32 {
        self.player_height * 0.5 + self.ground_probe_margin
    }

    /// Distance from the body center to the bottom of the slope probe.
    #[inline]
    pub fn slope_probe_length(&self) -> f32 {
        self.player_height * 0.5 + self.slope_probe_margin
    }
}

impl ValidatedConfig for MovementConfig {
    const NAME: &'static str = "MovementConfig";

    fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::positive("walk_speed", self.walk_speed)?;
        ConfigError::positive("sprint_speed", self.sprint_speed)?;
        ConfigError::positive("drive_multiplier", self.drive_multiplier)?;
        ConfigError::unit("air_multiplier", self.air_multiplier)?;
        ConfigError::non_negative("ground_drag", self.ground_drag)?;
        ConfigError::positive("player_height", self.player_height)?;
        ConfigError::positive("max_slope_angle", self.max_slope_angle)?;
        ConfigError::non_negative("jump_force", self.jump_force)?;
        ConfigError::non_negative("jump_delay", self.jump_delay)?;
        ConfigError::non_negative("jump_cooldown", self.jump_cooldown)?;
        Ok(())
    }
}

// ==================== Ragdoll ====================

/// Stand-up and camera tunables for a ragdoll.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct RagdollConfig {
    /// Time the stand-up animation needs before control returns (s).
    pub stand_up_delay: f32,
    /// Length of the hip ground probe, cast from one meter above the hips.
    pub max_get_up_height: f32,
    /// Height of the root above the probed ground point after recovery.
    pub stand_up_offset: f32,
    /// Camera follow damping while the player is ragdolled.
    pub ragdoll_camera_damping: f32,
    /// Camera follow damping restored on recovery.
    pub normal_camera_damping: f32,
}

impl Default for RagdollConfig {
    fn default() -> Self {
        Self {
            stand_up_delay: 1.2,
            max_get_up_height: 3.0,
            stand_up_offset: 1.0,
            ragdoll_camera_damping: 5.0,
            normal_camera_damping: 1.0,
        }
    }
}

impl RagdollConfig {
    /// Builder: set the stand-up delay.
    pub fn with_stand_up_delay(mut self, delay: f32) -> Self {
        self.stand_up_delay = delay;
        self
    }

    /// Builder: set the root offset above the probed ground.
    pub fn with_stand_up_offset(mut self, offset: f32) -> Self {
        self.stand_up_offset = offset;
        self
    }
}

impl ValidatedConfig for RagdollConfig {
    const NAME: &'static str = "RagdollConfig";

    fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::non_negative("stand_up_delay", self.stand_up_delay)?;
        ConfigError::positive("max_get_up_height", self.max_get_up_height)?;
        ConfigError::non_negative("ragdoll_camera_damping", self.ragdoll_camera_damping)?;
        ConfigError::non_negative("normal_camera_damping", self.normal_camera_damping)?;
        Ok(())
    }
}

// ==================== Vehicle ====================

/// Piecewise linear response curve sampled on `[0, 1]`.
///
/// Outside the key range the first or last value is held.
#[derive(Reflect, Debug, Clone, PartialEq)]
pub struct TurningCurve {
    /// `(time, value)` keys sorted by time.
    pub keys: Vec<Vec2>,
}

impl Default for TurningCurve {
    fn default() -> Self {
        Self {
            keys: vec![
                Vec2::new(0.0, 0.2),
                Vec2::new(0.3, 1.0),
                Vec2::new(1.0, 0.5),
            ],
        }
    }
}

impl TurningCurve {
    /// A curve that returns `value` everywhere.
    pub fn constant(value: f32) -> Self {
        Self {
            keys: vec![Vec2::new(0.0, value)],
        }
    }

    /// Sample the curve at `t`.
    pub fn evaluate(&self, t: f32) -> f32 {
        let Some(first) = self.keys.first() else {
            return 0.0;
        };
        if t <= first.x {
            return first.y;
        }
        for pair in self.keys.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.x {
                let span = b.x - a.x;
                if span <= f32::EPSILON {
                    return b.y;
                }
                return a.y + (b.y - a.y) * ((t - a.x) / span);
            }
        }
        self.keys.last().map_or(first.y, |last| last.y)
    }
}

/// Suspension, drive and cosmetic tunables for a four-wheeled vehicle.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct VehicleConfig {
    /// Wheel ray origins in body space. Rays are cast along local down.
    pub wheel_points: Vec<Vec3>,
    /// Point where drive forces are applied, in body space.
    pub acceleration_point: Vec3,

    pub spring_stiffness: f32,
    pub damper_stiffness: f32,
    pub rest_length: f32,
    pub spring_travel: f32,
    pub wheel_radius: f32,

    /// Linear damping while grounded.
    pub ground_drag: f32,
    /// Constant pin-down force applied at every wheel point (N).
    pub downforce: f32,

    /// Forward drive acceleration (m/s²).
    pub acceleration: f32,
    /// Reverse drive acceleration (m/s²).
    pub reverse_acceleration: f32,
    /// Forward speed at which the velocity ratio reaches 1 (m/s).
    pub max_speed: f32,
    /// Acceleration opposing the throttle direction (m/s²).
    pub deceleration: f32,
    /// Yaw acceleration at full steer and full curve response (rad/s²).
    pub steer_strength: f32,
    /// Steering authority as a function of `|velocity ratio|`.
    pub turning_curve: TurningCurve,
    /// Lateral grip: fraction of sideways velocity cancelled per second.
    pub lateral_grip: f32,

    /// Visual wheel spin rate at velocity ratio 1 (deg/s).
    pub wheel_rotation_speed: f32,
    /// Visual front wheel angle at full steer (deg).
    pub wheel_steer_angle: f32,
    /// Lateral speed above which skid effects show (m/s).
    pub effects_threshold: f32,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            wheel_points: vec![
                Vec3::new(-0.8, 0.0, -1.3),
                Vec3::new(0.8, 0.0, -1.3),
                Vec3::new(-0.8, 0.0, 1.3),
                Vec3::new(0.8, 0.0, 1.3),
            ],
            acceleration_point: Vec3::new(0.0, -0.2, 0.0),
            spring_stiffness: 30_000.0,
            damper_stiffness: 3_000.0,
            rest_length: 0.5,
            spring_travel: 0.2,
            wheel_radius: 0.35,
            ground_drag: 1.0,
            downforce: 100.0,
            acceleration: 25.0,
            reverse_acceleration: 15.0,
            max_speed: 40.0,
            deceleration: 10.0,
            steer_strength: 15.0,
            turning_curve: TurningCurve::default(),
            lateral_grip: 4.0,
            wheel_rotation_speed: 3_000.0,
            wheel_steer_angle: 30.0,
            effects_threshold: 10.0,
        }
    }
}

impl VehicleConfig {
    /// Builder: set spring, damper and geometry of the suspension.
    pub fn with_suspension(
        mut self,
        spring_stiffness: f32,
        damper_stiffness: f32,
        rest_length: f32,
        spring_travel: f32,
        wheel_radius: f32,
    ) -> Self {
        self.spring_stiffness = spring_stiffness;
        self.damper_stiffness = damper_stiffness;
        self.rest_length = rest_length;
        self.spring_travel = spring_travel;
        self.wheel_radius = wheel_radius;
        self
    }

    /// Builder: replace the wheel ray origins.
    pub fn with_wheel_points(mut self, points: Vec<Vec3>) -> Self {
        self.wheel_points = points;
        self
    }

    /// Builder: set the pin-down force.
    pub fn with_downforce(mut self, downforce: f32) -> Self {
        self.downforce = downforce;
        self
    }

    /// Builder: set the steering response curve.
    pub fn with_turning_curve(mut self, curve: TurningCurve) -> Self {
        self.turning_curve = curve;
        self
    }

    /// Length of a wheel ray: fully extended spring plus the wheel.
    #[inline]
    pub fn wheel_ray_length(&self) -> f32 {
        self.rest_length + self.spring_travel + self.wheel_radius
    }
}

impl ValidatedConfig for VehicleConfig {
    const NAME: &'static str = "VehicleConfig";

    fn validate(&self) -> Result<(), ConfigError> {
        if self.wheel_points.is_empty() {
            return Err(ConfigError::NoWheels);
        }
        if self.turning_curve.keys.is_empty() {
            return Err(ConfigError::EmptyCurve("turning_curve"));
        }
        ConfigError::positive("spring_travel", self.spring_travel)?;
        ConfigError::positive("max_speed", self.max_speed)?;
        ConfigError::non_negative("spring_stiffness", self.spring_stiffness)?;
        ConfigError::non_negative("damper_stiffness", self.damper_stiffness)?;
        ConfigError::non_negative("rest_length", self.rest_length)?;
        ConfigError::non_negative("wheel_radius", self.wheel_radius)?;
        ConfigError::non_negative("ground_drag", self.ground_drag)?;
        Ok(())
    }
}

// ==================== Jetpack ====================

/// Jetpack flight tunables.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct JetpackSettings {
    /// Thrust acceleration at full collective (m/s²).
    pub thrust_power: f32,
    /// Vertical velocity damping coefficient (1/s).
    pub vertical_damping: f32,
    /// Fraction of gravity cancelled at neutral collective.
    pub gravity_compensation_factor: f32,

    /// Largest commanded pitch (deg).
    pub max_pitch_degrees: f32,
    /// Largest commanded roll (deg).
    pub max_roll_degrees: f32,
    /// Yaw rate at full yaw input (deg/s).
    pub yaw_rate: f32,
    /// Yaw rate damping when yaw input is released.
    pub yaw_damping: f32,
    /// Proportional attitude gain.
    pub stabilization_p: f32,
    /// Derivative attitude gain.
    pub stabilization_d: f32,
    /// Auto-level rate, in full tilts per second.
    pub auto_level_speed: f32,
    /// Setpoints smaller than this snap to zero (deg).
    pub auto_level_deadzone: f32,

    /// Horizontal velocity damping coefficient (1/s), both modes.
    pub horizontal_damping: f32,
    /// Camera relative target speed in strafe mode (m/s).
    pub max_strafe_speed: f32,
    /// Acceleration limit while strafe input is held (m/s²).
    pub strafe_acceleration: f32,
    /// Acceleration limit while braking with no strafe input (m/s²).
    pub strafe_braking: f32,
    /// Attitude gain multiplier in strafe mode.
    pub strafe_stabilization_multiplier: f32,
    /// Exponential rate at which strafe facing follows the camera (1/s).
    pub facing_smoothing: f32,
}

impl Default for JetpackSettings {
    fn default() -> Self {
        Self {
            thrust_power: 15.0,
            vertical_damping: 2.0,
            gravity_compensation_factor: 1.0,
            max_pitch_degrees: 30.0,
            max_roll_degrees: 25.0,
            yaw_rate: 90.0,
            yaw_damping: 3.0,
            stabilization_p: 10.0,
            stabilization_d: 5.0,
            auto_level_speed: 3.0,
            auto_level_deadzone: 1.0,
            horizontal_damping: 0.5,
            max_strafe_speed: 12.0,
            strafe_acceleration: 10.0,
            strafe_braking: 20.0,
            strafe_stabilization_multiplier: 2.0,
            facing_smoothing: 8.0,
        }
    }
}

impl JetpackSettings {
    /// Builder: set thrust power and vertical damping.
    pub fn with_thrust(mut self, power: f32, vertical_damping: f32) -> Self {
        self.thrust_power = power;
        self.vertical_damping = vertical_damping;
        self
    }

    /// Builder: set the attitude PD gains.
    pub fn with_stabilization(mut self, p: f32, d: f32) -> Self {
        self.stabilization_p = p;
        self.stabilization_d = d;
        self
    }

    /// Builder: set the attitude limits.
    pub fn with_attitude_limits(mut self, max_pitch: f32, max_roll: f32) -> Self {
        self.max_pitch_degrees = max_pitch;
        self.max_roll_degrees = max_roll;
        self
    }

    /// Builder: set strafe mode tracking.
    pub fn with_strafe(mut self, max_speed: f32, acceleration: f32, braking: f32) -> Self {
        self.max_strafe_speed = max_speed;
        self.strafe_acceleration = acceleration;
        self.strafe_braking = braking;
        self
    }
}

impl ValidatedConfig for JetpackSettings {
    const NAME: &'static str = "JetpackSettings";

    fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::non_negative("thrust_power", self.thrust_power)?;
        ConfigError::non_negative("vertical_damping", self.vertical_damping)?;
        ConfigError::non_negative(
            "gravity_compensation_factor",
            self.gravity_compensation_factor,
        )?;
        ConfigError::positive("max_pitch_degrees", self.max_pitch_degrees)?;
        ConfigError::positive("max_roll_degrees", self.max_roll_degrees)?;
        ConfigError::positive("stabilization_p", self.stabilization_p)?;
        ConfigError::positive("stabilization_d", self.stabilization_d)?;
        ConfigError::non_negative("auto_level_speed", self.auto_level_speed)?;
        ConfigError::non_negative("auto_level_deadzone", self.auto_level_deadzone)?;
        ConfigError::ordered(
            "strafe_acceleration",
            self.strafe_acceleration,
            "strafe_braking",
            self.strafe_braking,
        )?;
        ConfigError::at_least(
            "strafe_stabilization_multiplier",
            self.strafe_stabilization_multiplier,
            1.0,
        )?;
        ConfigError::positive("facing_smoothing", self.facing_smoothing)?;
        Ok(())
    }
}

// ==================== Mounting ====================

/// What kind of ride a [`Mountable`] is.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    Vehicle,
    Jetpack,
}

/// A door the player walks to before getting into a vehicle.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct DoorAnchor {
    /// Door position in the vehicle's space.
    pub offset: Vec3,
    /// Outward door facing in the vehicle's space.
    pub facing: Vec3,
}

/// Something the player can ride.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct Mountable {
    pub kind: MountKind,
    /// Rider position in the ride's space while seated.
    pub seat_offset: Vec3,
    /// Doors to approach before seating. Empty means seat directly.
    pub doors: Vec<DoorAnchor>,
    /// Where the rider is placed on dismount, in the ride's yaw frame.
    pub exit_offset: Vec3,
    /// Time spent at the door before seating (s).
    pub entry_duration: f32,
    /// Time after seating during which dismount is refused (s).
    pub dismount_cooldown: f32,
}

impl Mountable {
    /// Car preset with a door on each side.
    pub fn vehicle() -> Self {
        Self {
            kind: MountKind::Vehicle,
            seat_offset: Vec3::new(0.0, 1.0, 0.0),
            doors: vec![
                DoorAnchor {
                    offset: Vec3::new(-1.0, 0.5, -0.2),
                    facing: Vec3::NEG_X,
                },
                DoorAnchor {
                    offset: Vec3::new(1.0, 0.5, -0.2),
                    facing: Vec3::X,
                },
            ],
            exit_offset: Vec3::new(-2.5, 1.25, -0.2),
            entry_duration: 0.8,
            dismount_cooldown: 1.0,
        }
    }

    /// Jetpack preset: no doors, the rider drops out below.
    pub fn jetpack() -> Self {
        Self {
            kind: MountKind::Jetpack,
            seat_offset: Vec3::new(0.0, 0.5, 0.0),
            doors: Vec::new(),
            exit_offset: Vec3::new(0.0, -2.0, 0.0),
            entry_duration: 0.0,
            dismount_cooldown: 1.0,
        }
    }

    /// Builder: set the seat offset.
    pub fn with_seat_offset(mut self, offset: Vec3) -> Self {
        self.seat_offset = offset;
        self
    }

    /// Builder: set entry duration and dismount cooldown.
    pub fn with_timing(mut self, entry_duration: f32, dismount_cooldown: f32) -> Self {
        self.entry_duration = entry_duration;
        self.dismount_cooldown = dismount_cooldown;
        self
    }
}

impl ValidatedConfig for Mountable {
    const NAME: &'static str = "Mountable";

    fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::non_negative("entry_duration", self.entry_duration)?;
        ConfigError::non_negative("dismount_cooldown", self.dismount_cooldown)?;
        Ok(())
    }
}

// ==================== Combat ====================

/// Firearm tunables.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct GunData {
    /// Holding the trigger keeps firing.
    pub automatic: bool,
    /// Time between shots (s).
    pub cooldown: f32,
    /// Radius of the random aim offset.
    pub spread: f32,
    /// Impulse pushing the shooter back.
    pub recoil: f32,
    pub shake_amplitude: f32,
    pub shake_frequency: f32,
    pub damage: f32,
    pub knockback: f32,
    /// Projectile impulse along the aim direction.
    pub shoot_force: f32,
    /// Projectile impulse along the gun's up.
    pub upward_force: f32,
    pub magazine_size: u32,
    pub reload_time: f32,
    /// Projectile time to live (s).
    pub projectile_lifetime: f32,
}

impl Default for GunData {
    fn default() -> Self {
        Self {
            automatic: false,
            cooldown: 0.25,
            spread: 0.02,
            recoil: 2.0,
            shake_amplitude: 1.5,
            shake_frequency: 2.0,
            damage: 25.0,
            knockback: 10.0,
            shoot_force: 40.0,
            upward_force: 0.5,
            magazine_size: 12,
            reload_time: 1.5,
            projectile_lifetime: 3.0,
        }
    }
}

impl GunData {
    /// Rifle preset: automatic, fast, weaker rounds.
    pub fn rifle() -> Self {
        Self {
            automatic: true,
            cooldown: 0.1,
            spread: 0.05,
            damage: 15.0,
            knockback: 6.0,
            magazine_size: 30,
            reload_time: 2.0,
            ..default()
        }
    }

    /// Builder: set damage and knockback.
    pub fn with_damage(mut self, damage: f32, knockback: f32) -> Self {
        self.damage = damage;
        self.knockback = knockback;
        self
    }

    /// Builder: set magazine size and reload time.
    pub fn with_magazine(mut self, size: u32, reload_time: f32) -> Self {
        self.magazine_size = size;
        self.reload_time = reload_time;
        self
    }
}

impl ValidatedConfig for GunData {
    const NAME: &'static str = "GunData";

    fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::non_negative("cooldown", self.cooldown)?;
        ConfigError::non_negative("spread", self.spread)?;
        ConfigError::non_negative("reload_time", self.reload_time)?;
        ConfigError::positive("projectile_lifetime", self.projectile_lifetime)?;
        if self.magazine_size == 0 {
            return Err(ConfigError::NonPositive {
                field: "magazine_size",
                value: 0.0,
            });
        }
        Ok(())
    }
}

/// Health and knockdown tunables for anything that can be shot or run over.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct Vitals {
    pub max_health: f32,
    pub health: f32,
    pub dead: bool,
    /// Shortest time spent knocked down before getting up (s).
    pub sleep_min: f32,
    /// Longest time spent knocked down before getting up (s).
    pub sleep_max: f32,
    /// Knockback multiplier for the lethal hit.
    pub death_force_multiplier: f32,
    /// Delay between death and the ragdoll freezing for good (s).
    pub death_freeze_delay: f32,
    /// Impacting bodies heavier than this can knock the owner down (kg).
    pub mass_threshold: f32,
    /// Impacts slower than this are ignored (m/s).
    pub velocity_threshold: f32,
    /// Scale from relative impact velocity to knockdown impulse.
    pub impact_force_scale: f32,
}

impl Default for Vitals {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            health: 100.0,
            dead: false,
            sleep_min: 2.0,
            sleep_max: 5.0,
            death_force_multiplier: 2.0,
            death_freeze_delay: 4.0,
            mass_threshold: 200.0,
            velocity_threshold: 5.0,
            impact_force_scale: 1.5,
        }
    }
}

impl Vitals {
    /// Full health record with the given maximum.
    pub fn with_max_health(mut self, max_health: f32) -> Self {
        self.max_health = max_health;
        self.health = max_health;
        self
    }

    /// Builder: set the knocked-down time range.
    pub fn with_sleep_range(mut self, min: f32, max: f32) -> Self {
        self.sleep_min = min;
        self.sleep_max = max;
        self
    }
}

impl ValidatedConfig for Vitals {
    const NAME: &'static str = "Vitals";

    fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::positive("max_health", self.max_health)?;
        ConfigError::non_negative("sleep_min", self.sleep_min)?;
        ConfigError::ordered("sleep_min", self.sleep_min, "sleep_max", self.sleep_max)?;
        ConfigError::non_negative("death_freeze_delay", self.death_freeze_delay)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        assert!(MovementConfig::default().validate().is_ok());
        assert!(RagdollConfig::default().validate().is_ok());
        assert!(VehicleConfig::default().validate().is_ok());
        assert!(JetpackSettings::default().validate().is_ok());
        assert!(Mountable::vehicle().validate().is_ok());
        assert!(Mountable::jetpack().validate().is_ok());
        assert!(GunData::default().validate().is_ok());
        assert!(GunData::rifle().validate().is_ok());
        assert!(Vitals::default().validate().is_ok());
    }

    #[test]
    fn zero_spring_travel_is_rejected() {
        let config = VehicleConfig::default().with_suspension(30_000.0, 3_000.0, 0.5, 0.0, 0.35);
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositive {
                field: "spring_travel",
                value: 0.0
            })
        );
    }

    #[test]
    fn vehicle_without_wheels_is_rejected() {
        let config = VehicleConfig::default().with_wheel_points(Vec::new());
        assert_eq!(config.validate(), Err(ConfigError::NoWheels));
    }

    #[test]
    fn inverted_sleep_range_is_rejected() {
        let vitals = Vitals::default().with_sleep_range(5.0, 1.0);
        assert!(matches!(
            vitals.validate(),
            Err(ConfigError::InvertedRange { .. })
        ));
    }

    #[test]
    fn weak_strafe_multiplier_is_rejected() {
        let settings = JetpackSettings {
            strafe_stabilization_multiplier: 0.5,
            ..default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn turning_curve_interpolates_and_holds_ends() {
        let curve = TurningCurve::default();
        assert!((curve.evaluate(0.0) - 0.2).abs() < 1e-6);
        assert!((curve.evaluate(0.15) - 0.6).abs() < 1e-6);
        assert!((curve.evaluate(0.3) - 1.0).abs() < 1e-6);
        assert!((curve.evaluate(2.0) - 0.5).abs() < 1e-6);
        assert!((curve.evaluate(-1.0) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn constant_curve() {
        let curve = TurningCurve::constant(0.7);
        assert_eq!(curve.evaluate(0.0), 0.7);
        assert_eq!(curve.evaluate(0.9), 0.7);
    }

    #[test]
    fn probe_lengths_follow_height() {
        let config = MovementConfig::default();
        assert!((config.ground_probe_length() - 1.15).abs() < 1e-6);
        assert!((config.slope_probe_length() - 1.2).abs() < 1e-6);
    }

    #[test]
    fn wheel_ray_covers_full_extension() {
        let config = VehicleConfig::default();
        assert!((config.wheel_ray_length() - 1.05).abs() < 1e-6);
    }
}
