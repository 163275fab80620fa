//! Getting into and out of vehicles and jetpacks.
//!
//! Mounting hands the player body from on-foot locomotion to the ride in
//! steps, with a one-step yield between switching the player off and the
//! ride taking over, so two controllers never drive the same body in one
//! step. Dismounting undoes the steps in reverse.
//!
//! ```text
//!   OnFoot ──begin──▶ Boarding(Yield) ──▶ Boarding(Approach) ──▶ Riding
//!     ▲                      └──────────(no doors)──────────────▶   │
//!     └──────────── Alighting ◀────────────── dismount ─────────────┘
//! ```

use bevy::prelude::*;

use crate::authority::{self, with_authority, BodyAuthority, ControlOwner};
use crate::backend::LocomotionBackend;
use crate::combat::WeaponHolder;
use crate::config::{MountKind, Mountable};
use crate::intent::MountIntent;
use crate::jetpack::JetpackController;
use crate::player::PlayerController;
use crate::presentation::{yaw_of, AnimationParams, AnimationTrigger, CameraRig};
use crate::ragdoll::{Ragdoll, RagdollState};
use crate::vehicle::VehicleController;

/// How far in front of a door the player stands before getting in.
pub const DOOR_APPROACH_DISTANCE: f32 = 0.8;

/// Which ride currently owns the player body.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MountContext {
    #[default]
    None,
    Vehicle(Entity),
    Jetpack(Entity),
}

impl MountContext {
    /// The ridden entity, if any.
    pub fn target(&self) -> Option<Entity> {
        match *self {
            MountContext::None => None,
            MountContext::Vehicle(e) | MountContext::Jetpack(e) => Some(e),
        }
    }

    pub fn kind(&self) -> Option<MountKind> {
        match self {
            MountContext::None => None,
            MountContext::Vehicle(_) => Some(MountKind::Vehicle),
            MountContext::Jetpack(_) => Some(MountKind::Jetpack),
        }
    }

    fn for_kind(kind: MountKind, target: Entity) -> Self {
        match kind {
            MountKind::Vehicle => MountContext::Vehicle(target),
            MountKind::Jetpack => MountContext::Jetpack(target),
        }
    }
}

/// Progress through boarding.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Default)]
pub enum BoardingStep {
    /// Player switched off this step. Nothing else happens until the next.
    #[default]
    Yield,
    /// Standing at the door.
    Approach { remaining: f32 },
}

#[derive(Reflect, Debug, Clone, Copy, PartialEq, Default)]
pub enum MountPhase {
    #[default]
    OnFoot,
    Boarding {
        target: Entity,
        kind: MountKind,
        step: BoardingStep,
    },
    /// Seated. Dismount is refused until `lockout` runs out.
    Riding { lockout: f32 },
    /// Out of the ride, control returns on the next step.
    Alighting,
}

/// Mount state on a player.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct Mounter {
    /// Search radius for rides (m).
    pub detection_radius: f32,
    pub context: MountContext,
    pub phase: MountPhase,
    pub can_dismount: bool,
}

impl Default for Mounter {
    fn default() -> Self {
        Self {
            detection_radius: 3.0,
            context: MountContext::None,
            phase: MountPhase::OnFoot,
            can_dismount: false,
        }
    }
}

impl Mounter {
    #[inline]
    pub fn is_on_foot(&self) -> bool {
        self.phase == MountPhase::OnFoot
    }

    #[inline]
    pub fn is_riding(&self) -> bool {
        matches!(self.phase, MountPhase::Riding { .. })
    }
}

fn owner_for(kind: MountKind) -> ControlOwner {
    match kind {
        MountKind::Vehicle => ControlOwner::Vehicle,
        MountKind::Jetpack => ControlOwner::Jetpack,
    }
}

/// Nearest parked ride of `kind` within the player's detection radius.
pub fn find_mount_candidate<B: LocomotionBackend>(
    world: &mut World,
    player: Entity,
    kind: MountKind,
) -> Option<Entity> {
    let radius = world.get::<Mounter>(player)?.detection_radius;
    let origin = B::get_position(world, player);

    let candidates: Vec<Entity> = world
        .query::<(Entity, &Mountable, Option<&BodyAuthority>)>()
        .iter(world)
        .filter(|(e, mountable, authority)| {
            *e != player && mountable.kind == kind && authority.is_some_and(|a| a.is_vacant())
        })
        .map(|(e, _, _)| e)
        .collect();

    candidates
        .into_iter()
        .map(|e| (e, B::get_position(world, e).distance(origin)))
        .filter(|(_, distance)| *distance <= radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(e, _)| e)
}

/// Switch the player off and start boarding `target`.
///
/// Refused while the player is not on foot, is ragdolled, or does not hold
/// its own body. Returns whether boarding started.
pub fn begin_mount<B: LocomotionBackend>(
    world: &mut World,
    player: Entity,
    target: Entity,
) -> bool {
    let Some(mounter) = world.get::<Mounter>(player) else {
        return false;
    };
    if !mounter.is_on_foot() {
        return false;
    }
    let Some(kind) = world.get::<Mountable>(target).map(|m| m.kind) else {
        return false;
    };
    if world
        .get::<Ragdoll>(player)
        .is_some_and(|r| r.state != RagdollState::Animated)
    {
        debug!("Mount {player:?}: refused while ragdolled");
        return false;
    }
    if let Err(err) = with_authority(world, player, |a| a.release(ControlOwner::Locomotion)) {
        debug!("Mount {player:?}: {err}");
        return false;
    }

    if let Some(mut controller) = world.get_mut::<PlayerController>(player) {
        controller.set_can_move(false);
    }
    B::set_velocity(world, player, Vec3::ZERO);
    B::set_angular_velocity(world, player, Vec3::ZERO);
    B::set_kinematic(world, player, true);
    B::set_collider_enabled(world, player, false);
    if let Some(mut rig) = world.get_mut::<CameraRig>(player) {
        rig.free_look = false;
    }
    if let Some(mut holder) = world.get_mut::<WeaponHolder>(player) {
        holder.enabled = false;
    }
    if let Some(mut ragdoll) = world.get_mut::<Ragdoll>(player) {
        ragdoll.suspended = true;
    }
    if let Some(mut params) = world.get_mut::<AnimationParams>(player) {
        params.trigger(AnimationTrigger::EnterVehicle);
    }
    if let Some(mut mounter) = world.get_mut::<Mounter>(player) {
        mounter.phase = MountPhase::Boarding {
            target,
            kind,
            step: BoardingStep::Yield,
        };
    }
    debug!("Mount {player:?}: boarding {kind:?} {target:?}");
    true
}

/// Start getting out of the current ride.
///
/// Refused unless riding with the dismount lockout elapsed.
pub fn begin_dismount<B: LocomotionBackend>(world: &mut World, player: Entity) -> bool {
    let Some(mounter) = world.get::<Mounter>(player).cloned() else {
        return false;
    };
    if !mounter.is_riding() || !mounter.can_dismount {
        return false;
    }
    let (Some(target), Some(kind)) = (mounter.context.target(), mounter.context.kind()) else {
        return false;
    };

    // Ride first
    match kind {
        MountKind::Vehicle => {
            if let Some(mut vehicle) = world.get_mut::<VehicleController>(target) {
                vehicle.disengage();
            }
            B::set_linear_damping(world, target, 0.0);
        }
        MountKind::Jetpack => {
            if let Some(mut jetpack) = world.get_mut::<JetpackController>(target) {
                jetpack.deactivate();
            }
        }
    }
    if let Err(err) = with_authority(world, target, |a| a.release(owner_for(kind))) {
        warn!("Dismount {player:?}: {err}");
    }
    B::set_velocity(world, target, Vec3::ZERO);
    B::set_angular_velocity(world, target, Vec3::ZERO);
    B::set_kinematic(world, target, true);

    // Then the player
    let exit_offset = world
        .get::<Mountable>(target)
        .map_or(Vec3::ZERO, |m| m.exit_offset);
    let target_position = B::get_position(world, target);
    let target_rotation = B::get_rotation(world, target);
    let heading = Quat::from_rotation_y(yaw_of(target_rotation * Vec3::NEG_Z));
    let exit = target_position + heading * exit_offset;

    world.entity_mut(player).remove::<ChildOf>();
    B::set_position(world, player, exit);
    B::set_rotation(world, player, Quat::IDENTITY);
    B::set_collider_enabled(world, player, true);
    if let Some(mut rig) = world.get_mut::<CameraRig>(player) {
        rig.free_look = true;
    }
    B::set_kinematic(world, player, false);
    B::set_velocity(world, player, Vec3::ZERO);

    if let Some(mut mounter) = world.get_mut::<Mounter>(player) {
        mounter.phase = MountPhase::Alighting;
        mounter.can_dismount = false;
    }
    debug!("Mount {player:?}: leaving {kind:?} {target:?}");
    true
}

fn approach_door<B: LocomotionBackend>(
    world: &mut World,
    player: Entity,
    target: Entity,
    mountable: &Mountable,
) {
    let origin = B::get_position(world, player);
    let position = B::get_position(world, target);
    let rotation = B::get_rotation(world, target);

    let door = mountable
        .doors
        .iter()
        .map(|door| (position + rotation * door.offset, rotation * door.facing))
        .min_by(|a, b| a.0.distance(origin).total_cmp(&b.0.distance(origin)));

    if let Some((door_position, facing)) = door {
        let stand = door_position + facing.normalize_or_zero() * DOOR_APPROACH_DISTANCE;
        B::set_position(world, player, stand);
        let mut towards = -facing;
        towards.y = 0.0;
        if towards.length_squared() > 1e-6 {
            B::set_rotation(world, player, Quat::from_rotation_y(yaw_of(towards)));
        }
    }
}

fn seat<B: LocomotionBackend>(world: &mut World, player: Entity, target: Entity, kind: MountKind) {
    let Some(mountable) = world.get::<Mountable>(target).cloned() else {
        warn!("Mount {player:?}: {target:?} is no longer mountable");
        abort_boarding::<B>(world, player);
        return;
    };
    let owner = owner_for(kind);
    if let Err(err) = with_authority(world, target, |a| a.acquire(owner)) {
        warn!("Mount {player:?}: {err}");
        abort_boarding::<B>(world, player);
        return;
    }

    world.entity_mut(player).insert(ChildOf(target));
    if let Some(mut transform) = world.get_mut::<Transform>(player) {
        transform.translation = mountable.seat_offset;
        transform.rotation = Quat::IDENTITY;
    }

    B::set_kinematic(world, target, false);
    match kind {
        MountKind::Vehicle => {
            if let Some(mut vehicle) = world.get_mut::<VehicleController>(target) {
                vehicle.engage(player);
            }
        }
        MountKind::Jetpack => {
            if let Some(mut jetpack) = world.get_mut::<JetpackController>(target) {
                jetpack.activate(player);
            }
        }
    }

    if let Some(mut mounter) = world.get_mut::<Mounter>(player) {
        mounter.context = MountContext::for_kind(kind, target);
        mounter.phase = MountPhase::Riding {
            lockout: mountable.dismount_cooldown,
        };
        mounter.can_dismount = false;
    }
    debug!("Mount {player:?}: riding {kind:?} {target:?}");
}

/// Undo the body changes made by `begin_mount` and return to foot.
fn abort_boarding<B: LocomotionBackend>(world: &mut World, player: Entity) {
    B::set_kinematic(world, player, false);
    B::set_collider_enabled(world, player, true);
    B::set_velocity(world, player, Vec3::ZERO);
    if let Some(mut rig) = world.get_mut::<CameraRig>(player) {
        rig.free_look = true;
    }
    restore_on_foot::<B>(world, player);
}

/// Hand the body back to on-foot locomotion.
fn restore_on_foot<B: LocomotionBackend>(world: &mut World, player: Entity) {
    if let Err(err) = with_authority(world, player, |a| a.acquire(ControlOwner::Locomotion)) {
        warn!("Mount {player:?}: {err}");
    }
    if let Some(mut controller) = world.get_mut::<PlayerController>(player) {
        controller.set_can_move(true);
    }
    if let Some(mut ragdoll) = world.get_mut::<Ragdoll>(player) {
        ragdoll.suspended = false;
    }
    if let Some(mut holder) = world.get_mut::<WeaponHolder>(player) {
        holder.enabled = true;
    }
    if let Some(mut mounter) = world.get_mut::<Mounter>(player) {
        mounter.context = MountContext::None;
        mounter.phase = MountPhase::OnFoot;
        mounter.can_dismount = false;
    }
}

/// Advance boarding, riding lockout and alighting.
pub fn advance_mount_sequences<B: LocomotionBackend>(world: &mut World) {
    let dt = B::get_fixed_timestep(world);
    let players: Vec<(Entity, Mounter)> = world
        .query::<(Entity, &Mounter)>()
        .iter(world)
        .map(|(e, mounter)| (e, mounter.clone()))
        .collect();

    for (player, mounter) in players {
        match mounter.phase {
            MountPhase::OnFoot => {}
            MountPhase::Boarding { target, kind, step } => match step {
                BoardingStep::Yield => {
                    let Some(mountable) = world.get::<Mountable>(target).cloned() else {
                        seat::<B>(world, player, target, kind);
                        continue;
                    };
                    if kind == MountKind::Vehicle && !mountable.doors.is_empty() {
                        approach_door::<B>(world, player, target, &mountable);
                        if let Some(mut current) = world.get_mut::<Mounter>(player) {
                            current.phase = MountPhase::Boarding {
                                target,
                                kind,
                                step: BoardingStep::Approach {
                                    remaining: mountable.entry_duration,
                                },
                            };
                        }
                    } else {
                        seat::<B>(world, player, target, kind);
                    }
                }
                BoardingStep::Approach { remaining } => {
                    let remaining = remaining - dt;
                    if remaining <= 0.0 {
                        seat::<B>(world, player, target, kind);
                    } else if let Some(mut current) = world.get_mut::<Mounter>(player) {
                        current.phase = MountPhase::Boarding {
                            target,
                            kind,
                            step: BoardingStep::Approach { remaining },
                        };
                    }
                }
            },
            MountPhase::Riding { lockout } => {
                if lockout > 0.0 {
                    let lockout = (lockout - dt).max(0.0);
                    if let Some(mut current) = world.get_mut::<Mounter>(player) {
                        current.phase = MountPhase::Riding { lockout };
                        current.can_dismount = lockout <= 0.0;
                    }
                } else if !mounter.can_dismount {
                    if let Some(mut current) = world.get_mut::<Mounter>(player) {
                        current.can_dismount = true;
                    }
                }
            }
            MountPhase::Alighting => {
                restore_on_foot::<B>(world, player);
                debug!("Mount {player:?}: back on foot");
            }
        }
    }
}

/// Turn mount key presses into mount and dismount requests.
pub fn process_mount_requests<B: LocomotionBackend>(world: &mut World) {
    let requests: Vec<(Entity, Mounter, MountIntent)> = world
        .query::<(Entity, &Mounter, &MountIntent)>()
        .iter(world)
        .filter(|(_, _, intent)| intent.vehicle.just_pressed() || intent.jetpack.just_pressed())
        .map(|(e, mounter, intent)| (e, mounter.clone(), *intent))
        .collect();

    for (player, mounter, intent) in requests {
        let pressed = if intent.vehicle.just_pressed() {
            MountKind::Vehicle
        } else {
            MountKind::Jetpack
        };

        if mounter.is_on_foot() {
            if !authority::permits(world, player, ControlOwner::Locomotion) {
                continue;
            }
            if let Some(target) = find_mount_candidate::<B>(world, player, pressed) {
                begin_mount::<B>(world, player, target);
            }
        } else if mounter.context.kind() == Some(pressed) {
            begin_dismount::<B>(world, player);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_reports_target_and_kind() {
        let e = Entity::PLACEHOLDER;
        assert_eq!(MountContext::None.target(), None);
        assert_eq!(MountContext::Vehicle(e).target(), Some(e));
        assert_eq!(MountContext::Jetpack(e).kind(), Some(MountKind::Jetpack));
        assert_eq!(
            MountContext::for_kind(MountKind::Vehicle, e),
            MountContext::Vehicle(e)
        );
    }

    #[test]
    fn new_mounter_is_on_foot() {
        let mounter = Mounter::default();
        assert!(mounter.is_on_foot());
        assert!(!mounter.is_riding());
        assert!(!mounter.can_dismount);
        assert_eq!(mounter.detection_radius, 3.0);
    }

    #[test]
    fn owners_match_ride_kind() {
        assert_eq!(owner_for(MountKind::Vehicle), ControlOwner::Vehicle);
        assert_eq!(owner_for(MountKind::Jetpack), ControlOwner::Jetpack);
    }
}
