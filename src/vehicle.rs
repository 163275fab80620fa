//! Raycast suspension car.
//!
//! Each corner casts a ray along the chassis' local down. A spring and damper
//! push the chassis up at every corner whose ray hits, a constant downforce
//! pins it, and when most wheels touch the ground the drive, steering and
//! grip forces are applied at the acceleration point.

use bevy::prelude::*;

use crate::authority::{self, BodyAuthority, ControlOwner};
use crate::backend::{
    apply_acceleration, apply_acceleration_at_point, apply_angular_acceleration, LocomotionBackend,
};
use crate::collision::{ProbeHit, ProbeRequest};
use crate::config::{Misconfigured, VehicleConfig};
use crate::intent::DriveIntent;
use crate::systems::report_fault_once;

/// One suspension corner.
#[derive(Reflect, Debug, Clone, Default)]
pub struct SuspensionCorner {
    /// Ray origin in chassis space.
    pub local_point: Vec3,
    /// Latest wheel ray result.
    #[reflect(ignore)]
    pub hit: Option<ProbeHit>,
    /// `0` at rest length, `1` at full travel.
    pub compression: f32,
    /// Spring minus damper force along local up, last step (N).
    pub net_force: f32,
}

/// Runtime state of a vehicle chassis.
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct VehicleController {
    pub corners: Vec<SuspensionCorner>,
    /// More than half the wheels touch the ground.
    pub grounded: bool,
    /// Chassis velocity in chassis space. Forward is -Z.
    pub local_velocity: Vec3,
    /// Forward speed over `max_speed`. Negative while reversing.
    pub velocity_ratio: f32,
    /// A driver is seated.
    pub engaged: bool,
    pub driver: Option<Entity>,
    pub(crate) fault_reported: bool,
}

impl VehicleController {
    /// Controller with one corner per configured wheel point.
    pub fn new(config: &VehicleConfig) -> Self {
        let mut controller = Self::default();
        controller.sync_corners(config);
        controller
    }

    /// Rebuild the corner list if the wheel layout changed.
    pub fn sync_corners(&mut self, config: &VehicleConfig) {
        let matches = self.corners.len() == config.wheel_points.len()
            && self
                .corners
                .iter()
                .zip(&config.wheel_points)
                .all(|(corner, point)| corner.local_point == *point);
        if !matches {
            self.corners = config
                .wheel_points
                .iter()
                .map(|&local_point| SuspensionCorner {
                    local_point,
                    ..default()
                })
                .collect();
        }
    }

    /// Number of corners whose ray hit something.
    pub fn wheels_on_ground(&self) -> usize {
        self.corners.iter().filter(|c| c.hit.is_some()).count()
    }

    /// Wheel ray for a corner, cast along the chassis' local down.
    pub fn wheel_probe(
        config: &VehicleConfig,
        position: Vec3,
        rotation: Quat,
        local_point: Vec3,
    ) -> ProbeRequest {
        ProbeRequest::ray(
            position + rotation * local_point,
            rotation * Vec3::NEG_Y,
            config.wheel_ray_length(),
        )
    }

    /// Seat a driver.
    pub fn engage(&mut self, driver: Entity) {
        self.engaged = true;
        self.driver = Some(driver);
    }

    /// Driver left.
    pub fn disengage(&mut self) {
        self.engaged = false;
        self.driver = None;
    }
}

/// Spring compression for a wheel ray that hit at `distance`.
#[inline]
pub fn spring_compression(distance: f32, config: &VehicleConfig) -> f32 {
    (config.rest_length - (distance - config.wheel_radius)) / config.spring_travel
}

/// Spring force minus damper force along local up.
///
/// `spring_velocity` is the wheel point's velocity along local up.
#[inline]
pub fn suspension_force(compression: f32, spring_velocity: f32, config: &VehicleConfig) -> f32 {
    config.spring_stiffness * compression - spring_velocity * config.damper_stiffness
}

/// Grounded means strictly more than half the wheels touch.
#[inline]
pub fn is_grounded_majority(wheels_on_ground: usize, wheel_count: usize) -> bool {
    wheels_on_ground * 2 > wheel_count
}

/// Yaw acceleration for a steer input at a given velocity ratio.
///
/// Reversing flips the steering direction.
pub fn steering_torque(steer: f32, velocity_ratio: f32, config: &VehicleConfig) -> f32 {
    let response = config.turning_curve.evaluate(velocity_ratio.abs());
    let direction = if velocity_ratio < 0.0 { -1.0 } else { 1.0 };
    config.steer_strength * steer * response * direction
}

/// Suspension, downforce, drive, steering and grip.
pub fn apply_vehicle_forces<B: LocomotionBackend>(world: &mut World) {
    let entities: Vec<(
        Entity,
        VehicleController,
        VehicleConfig,
        DriveIntent,
        Option<BodyAuthority>,
        bool,
    )> = world
        .query::<(
            Entity,
            &VehicleController,
            &VehicleConfig,
            Option<&DriveIntent>,
            Option<&BodyAuthority>,
            Has<Misconfigured<VehicleConfig>>,
        )>()
        .iter(world)
        .map(|(e, controller, config, intent, authority, misconfigured)| {
            (
                e,
                controller.clone(),
                config.clone(),
                intent.copied().unwrap_or_default(),
                authority.copied(),
                misconfigured,
            )
        })
        .collect();

    for (entity, mut controller, config, intent, authority, misconfigured) in entities {
        if misconfigured {
            continue;
        }
        let Some(authority) = authority else {
            report_fault_once(
                &mut controller.fault_reported,
                entity,
                "VehicleController needs a BodyAuthority",
            );
            write_back(world, entity, controller);
            continue;
        };
        // The chassis drives its own suspension unless something else took it.
        if !(authority.is_vacant() || authority.permits(ControlOwner::Vehicle)) {
            continue;
        }
        if controller.corners.len() != config.wheel_points.len() {
            controller.sync_corners(&config);
        }

        let position = B::get_position(world, entity);
        let rotation = B::get_rotation(world, entity);
        let up = rotation * Vec3::Y;

        // Suspension
        for corner in &mut controller.corners {
            let point = position + rotation * corner.local_point;
            let Some(hit) = corner.hit else {
                corner.compression = 0.0;
                corner.net_force = 0.0;
                continue;
            };
            let compression = spring_compression(hit.distance, &config);
            let spring_velocity = B::point_velocity(world, entity, point).dot(up);
            let net = suspension_force(compression, spring_velocity, &config);
            B::apply_force_at_point(world, entity, up * net, point);
            corner.compression = compression;
            corner.net_force = net;
        }

        controller.grounded =
            is_grounded_majority(controller.wheels_on_ground(), controller.corners.len());

        // Downforce
        for corner in &controller.corners {
            let point = position + rotation * corner.local_point;
            B::apply_force_at_point(world, entity, -up * config.downforce, point);
        }

        let drag = if controller.grounded {
            config.ground_drag
        } else {
            0.0
        };
        B::set_linear_damping(world, entity, drag);

        let velocity = B::get_velocity(world, entity);
        controller.local_velocity = rotation.inverse() * velocity;
        controller.velocity_ratio = -controller.local_velocity.z / config.max_speed;

        if controller.grounded
            && controller.engaged
            && authority::permits(world, entity, ControlOwner::Vehicle)
        {
            let forward = rotation * Vec3::NEG_Z;
            let right = rotation * Vec3::X;
            let accel_point = position + rotation * config.acceleration_point;

            if intent.throttle != 0.0 {
                let power = if intent.throttle > 0.0 {
                    config.acceleration
                } else {
                    config.reverse_acceleration
                };
                apply_acceleration_at_point::<B>(
                    world,
                    entity,
                    forward * power * intent.throttle,
                    accel_point,
                );
                apply_acceleration_at_point::<B>(
                    world,
                    entity,
                    -forward * config.deceleration * intent.throttle,
                    accel_point,
                );
            }

            if intent.steer != 0.0 {
                let yaw = steering_torque(intent.steer, controller.velocity_ratio, &config);
                // Positive steer turns right, which is a negative turn about +Y.
                apply_angular_acceleration::<B>(world, entity, -up * yaw);
            }

            let grip = -controller.local_velocity.x * config.lateral_grip;
            apply_acceleration::<B>(world, entity, right * grip);
        }

        write_back(world, entity, controller);
    }
}

fn write_back(world: &mut World, entity: Entity, controller: VehicleController) {
    if let Some(mut current) = world.get_mut::<VehicleController>(entity) {
        *current = controller;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_is_zero_at_rest() {
        let config = VehicleConfig::default();
        let at_rest = config.rest_length + config.wheel_radius;
        assert!(spring_compression(at_rest, &config).abs() < 1e-6);
        let fully_compressed = at_rest - config.spring_travel;
        assert!((spring_compression(fully_compressed, &config) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn damper_opposes_motion() {
        let config = VehicleConfig::default();
        let still = suspension_force(0.5, 0.0, &config);
        let rising = suspension_force(0.5, 1.0, &config);
        let sinking = suspension_force(0.5, -1.0, &config);
        assert!((still - 15_000.0).abs() < 1e-3);
        assert!(rising < still);
        assert!(sinking > still);
    }

    #[test]
    fn majority_rule() {
        assert!(!is_grounded_majority(2, 4));
        assert!(is_grounded_majority(3, 4));
        assert!(is_grounded_majority(4, 4));
        assert!(!is_grounded_majority(0, 0));
    }

    #[test]
    fn steering_flips_in_reverse() {
        let config = VehicleConfig::default();
        let forward = steering_torque(1.0, 0.3, &config);
        let reverse = steering_torque(1.0, -0.3, &config);
        assert!((forward - 15.0).abs() < 1e-4);
        assert!((reverse + 15.0).abs() < 1e-4);
        // Standing still steers with the curve's first key.
        assert!((steering_torque(1.0, 0.0, &config) - 3.0).abs() < 1e-4);
    }

    #[test]
    fn corners_follow_wheel_points() {
        let mut config = VehicleConfig::default();
        let mut controller = VehicleController::new(&config);
        assert_eq!(controller.corners.len(), 4);
        config.wheel_points.truncate(3);
        controller.sync_corners(&config);
        assert_eq!(controller.corners.len(), 3);
    }

    #[test]
    fn wheel_probe_follows_chassis_down() {
        let config = VehicleConfig::default();
        let rotation = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let request = VehicleController::wheel_probe(&config, Vec3::ZERO, rotation, Vec3::ZERO);
        assert!((request.direction - Vec3::X).length() < 1e-5);
        assert!((request.max_distance - config.wheel_ray_length()).abs() < 1e-6);
    }
}
