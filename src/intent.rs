//! Input snapshot components.
//!
//! Intents are the polled input the game writes once per frame, from a
//! keyboard, a gamepad or AI. The controller systems only read them. Button
//! edges are derived here so that several fixed steps in one frame see a key
//! press exactly once.

use bevy::prelude::*;

/// A digital button with edge detection.
///
/// Write the held state with [`ButtonState::set`] every frame. The plugin
/// latches the previous state at the end of each fixed step.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    pressed: bool,
    pressed_prev: bool,
}

impl ButtonState {
    /// Set whether the button is currently held.
    #[inline]
    pub fn set(&mut self, pressed: bool) {
        self.pressed = pressed;
    }

    /// Whether the button is held.
    #[inline]
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Whether the button went down since the last latched step.
    #[inline]
    pub fn just_pressed(&self) -> bool {
        self.pressed && !self.pressed_prev
    }

    /// Remember the current state as the previous one.
    #[inline]
    pub(crate) fn latch(&mut self) {
        self.pressed_prev = self.pressed;
    }
}

/// On-foot input.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use locomotion_core::prelude::*;
///
/// let mut intent = LocomotionIntent::default();
/// intent.set_move(Vec2::new(0.0, 2.0));
/// assert_eq!(intent.move_axis, Vec2::Y);
/// intent.jump.set(true);
/// assert!(intent.jump.just_pressed());
/// ```
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct LocomotionIntent {
    /// Strafe (x, right positive) and forward (y) input, relative to the camera.
    pub move_axis: Vec2,
    /// Sprint key held.
    pub sprint: bool,
    /// Jump key.
    pub jump: ButtonState,
}

impl LocomotionIntent {
    /// Set the move axis. Diagonals are clamped to unit length.
    pub fn set_move(&mut self, axis: Vec2) {
        self.move_axis = axis.clamp_length_max(1.0);
    }

    /// Check if there is active movement input.
    pub fn is_moving(&self) -> bool {
        self.move_axis.length_squared() > 1e-6
    }

    /// Clear all input.
    pub fn clear(&mut self) {
        self.move_axis = Vec2::ZERO;
        self.sprint = false;
        self.jump.set(false);
    }
}

/// Vehicle input.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct DriveIntent {
    /// Forward (+) and reverse (-) throttle in `[-1, 1]`.
    pub throttle: f32,
    /// Right (+) and left (-) steering in `[-1, 1]`.
    pub steer: f32,
}

impl DriveIntent {
    /// Set throttle and steer, clamped to `[-1, 1]`.
    pub fn set(&mut self, throttle: f32, steer: f32) {
        self.throttle = throttle.clamp(-1.0, 1.0);
        self.steer = steer.clamp(-1.0, 1.0);
    }
}

/// Jetpack input.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct JetpackIntent {
    /// Ascend trigger in `[0, 1]`.
    pub ascend: f32,
    /// Descend trigger in `[0, 1]`.
    pub descend: f32,
    /// Strafe (x) and forward (y) input.
    pub move_axis: Vec2,
    /// Yaw right (+) and left (-) in `[-1, 1]`.
    pub yaw: f32,
    /// Strafe mode held. Level triggered.
    pub strafe_mode: bool,
}

impl JetpackIntent {
    /// Collective thrust input in `[-1, 1]`: positive climbs.
    #[inline]
    pub fn collective(&self) -> f32 {
        (self.ascend - self.descend).clamp(-1.0, 1.0)
    }

    /// Set the collective directly.
    pub fn set_collective(&mut self, collective: f32) {
        let collective = collective.clamp(-1.0, 1.0);
        self.ascend = collective.max(0.0);
        self.descend = (-collective).max(0.0);
    }
}

/// Mount and dismount keys.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct MountIntent {
    /// Enter or leave a vehicle.
    pub vehicle: ButtonState,
    /// Strap on or take off a jetpack.
    pub jetpack: ButtonState,
}

/// Weapon input.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct WeaponIntent {
    pub trigger: ButtonState,
    pub reload: ButtonState,
    /// World point the shooter aims at. Without one the muzzle fires straight ahead.
    pub aim_point: Option<Vec3>,
}

/// Latch button states at the end of every fixed step.
pub fn latch_button_edges(
    mut locomotion: Query<&mut LocomotionIntent>,
    mut mount: Query<&mut MountIntent>,
    mut weapon: Query<&mut WeaponIntent>,
) {
    for mut intent in &mut locomotion {
        intent.jump.latch();
    }
    for mut intent in &mut mount {
        intent.vehicle.latch();
        intent.jetpack.latch();
    }
    for mut intent in &mut weapon {
        intent.trigger.latch();
        intent.reload.latch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_edge_fires_once() {
        let mut button = ButtonState::default();
        button.set(true);
        assert!(button.just_pressed());
        button.latch();
        assert!(button.is_pressed());
        assert!(!button.just_pressed());
        button.set(false);
        button.latch();
        button.set(true);
        assert!(button.just_pressed());
    }

    #[test]
    fn move_axis_is_clamped() {
        let mut intent = LocomotionIntent::default();
        intent.set_move(Vec2::new(1.0, 1.0));
        assert!((intent.move_axis.length() - 1.0).abs() < 1e-6);
        assert!(intent.is_moving());
        intent.clear();
        assert!(!intent.is_moving());
    }

    #[test]
    fn collective_is_ascend_minus_descend() {
        let mut intent = JetpackIntent {
            ascend: 0.25,
            descend: 1.0,
            ..default()
        };
        assert!((intent.collective() + 0.75).abs() < 1e-6);
        intent.set_collective(-1.0);
        assert_eq!(intent.ascend, 0.0);
        assert_eq!(intent.descend, 1.0);
        assert_eq!(intent.collective(), -1.0);
    }

    #[test]
    fn drive_intent_clamps() {
        let mut intent = DriveIntent::default();
        intent.set(3.0, -2.0);
        assert_eq!(intent.throttle, 1.0);
        assert_eq!(intent.steer, -1.0);
    }
}
