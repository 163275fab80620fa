//! Ragdoll state machine for players and NPCs.
//!
//! A character is either animated (its root is driven by locomotion and the
//! limb bodies are kinematic) or simulating (the limb bodies are dynamic and
//! the root is parked). Getting up snaps the root under the hips and plays a
//! stand-up clip before control comes back.
//!
//! ```text
//!   Animated ──knock_down──▶ Simulating ──begin_recovery──▶ RecoveringToAnimated
//!      ▲                       │   ▲                               │
//!      │                       │   └────── interrupt_recovery ─────┤
//!      │                       └──freeze──▶ Frozen                 │
//!      └───────────────── stand-up delay elapsed ──────────────────┘
//! ```

use bevy::ecs::message::Messages;
use bevy::prelude::*;

use crate::authority::{with_authority, ControlOwner};
use crate::backend::LocomotionBackend;
use crate::collision::{ProbeHit, ProbeRequest};
use crate::combat::WeaponHolder;
use crate::config::RagdollConfig;
use crate::player::PlayerController;
use crate::presentation::{yaw_of, AnimationClip, AnimationParams, CameraRig};

/// Extra root height used when the hip probe finds no ground.
const NO_GROUND_EXTRA_HEIGHT: f32 = 0.5;

/// Which kind of character owns the ragdoll. Decides what is switched off
/// while the limbs simulate.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RagdollKind {
    /// The root becomes kinematic and the camera loosens.
    Player,
    /// The root collider and steering are switched off.
    Npc,
}

/// Ragdoll lifecycle.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Default)]
pub enum RagdollState {
    #[default]
    Animated,
    Simulating,
    RecoveringToAnimated { remaining: f32 },
    /// Terminal. Limbs are kinematic and never simulate again.
    Frozen,
}

/// Ragdoll attached to a character root.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct Ragdoll {
    /// Limb bodies, each tagged with [`RagdollPart`].
    pub parts: Vec<Entity>,
    /// The limb that decides where the character gets up.
    pub hips: Entity,
    pub kind: RagdollKind,
    pub state: RagdollState,
    /// Cleared while a stand-up is in progress.
    pub can_get_up: bool,
    /// Set while the character is mounted; knockdowns are refused.
    pub suspended: bool,
    /// Time left until the ragdoll freezes for good.
    pub freeze_in: Option<f32>,
    /// Ground under the hips, written by the backend sensors.
    #[reflect(ignore)]
    pub hip_ground: Option<ProbeHit>,
}

impl Ragdoll {
    pub fn new(kind: RagdollKind, hips: Entity, parts: Vec<Entity>) -> Self {
        Self {
            parts,
            hips,
            kind,
            state: RagdollState::Animated,
            can_get_up: true,
            suspended: false,
            freeze_in: None,
            hip_ground: None,
        }
    }

    /// Whether the limbs are (or are about to stop being) simulated.
    #[inline]
    pub fn is_ragdoll(&self) -> bool {
        matches!(
            self.state,
            RagdollState::Simulating | RagdollState::RecoveringToAnimated { .. }
        )
    }

    /// Whether the limbs are simulating right now.
    #[inline]
    pub fn is_simulating(&self) -> bool {
        self.state == RagdollState::Simulating
    }

    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.state == RagdollState::Frozen
    }

    /// Ray from one meter above the hips straight down.
    pub fn hip_probe(hips_position: Vec3, config: &RagdollConfig) -> ProbeRequest {
        ProbeRequest::ray(hips_position + Vec3::Y, Vec3::NEG_Y, config.max_get_up_height)
    }
}

/// A limb body. Points back at the root that owns it.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct RagdollPart {
    pub root: Entity,
}

/// AI path following on an NPC. Switched off while the NPC is ragdolled.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct SteeringAgent {
    pub enabled: bool,
}

impl Default for SteeringAgent {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Requests for the ragdoll state machine.
#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub struct RagdollCommand {
    pub root: Entity,
    pub action: RagdollAction,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RagdollAction {
    KnockDown { impulse: Vec3 },
    AddForce { impulse: Vec3 },
    BeginRecovery,
    InterruptRecovery { impulse: Vec3 },
    Freeze { delay: f32 },
}

fn ragdoll_config(world: &World, root: Entity) -> RagdollConfig {
    world.get::<RagdollConfig>(root).copied().unwrap_or_default()
}

fn set_parts_simulating<B: LocomotionBackend>(
    world: &mut World,
    parts: &[Entity],
    simulating: bool,
) {
    for &part in parts {
        B::set_kinematic(world, part, !simulating);
        B::set_collider_enabled(world, part, simulating);
        if !simulating {
            B::set_velocity(world, part, Vec3::ZERO);
            B::set_angular_velocity(world, part, Vec3::ZERO);
        }
    }
}

fn push_parts<B: LocomotionBackend>(world: &mut World, parts: &[Entity], impulse: Vec3) {
    for &part in parts {
        B::apply_impulse(world, part, impulse);
    }
}

/// Knock a character down with `impulse` applied to every limb.
///
/// While already simulating the impulse is simply added. Recovering, frozen
/// and suspended ragdolls ignore the request. Returns whether anything
/// happened.
pub fn knock_down<B: LocomotionBackend>(world: &mut World, root: Entity, impulse: Vec3) -> bool {
    let Some(ragdoll) = world.get::<Ragdoll>(root).cloned() else {
        return false;
    };
    if ragdoll.suspended {
        return false;
    }
    match ragdoll.state {
        RagdollState::Simulating => return apply_additional_force::<B>(world, root, impulse),
        RagdollState::RecoveringToAnimated { .. } | RagdollState::Frozen => return false,
        RagdollState::Animated => {}
    }
    if !ragdoll.can_get_up {
        return false;
    }

    let config = ragdoll_config(world, root);

    if let Some(mut params) = world.get_mut::<AnimationParams>(root) {
        params.enabled = false;
        params.stand_up = false;
        params.play = None;
    }
    if let Some(mut controller) = world.get_mut::<PlayerController>(root) {
        controller.set_can_move(false);
    }
    if let Err(err) = with_authority(world, root, |a| {
        a.transfer(ControlOwner::Locomotion, ControlOwner::Ragdoll)
    }) {
        warn!("Ragdoll {root:?}: {err}");
    }

    match ragdoll.kind {
        RagdollKind::Player => {
            B::set_velocity(world, root, Vec3::ZERO);
            B::set_kinematic(world, root, true);
            if let Some(mut rig) = world.get_mut::<CameraRig>(root) {
                rig.free_look = false;
                rig.follow_damping = config.ragdoll_camera_damping;
            }
            if let Some(mut holder) = world.get_mut::<WeaponHolder>(root) {
                holder.enabled = false;
            }
        }
        RagdollKind::Npc => {
            B::set_collider_enabled(world, root, false);
            if let Some(mut steering) = world.get_mut::<SteeringAgent>(root) {
                steering.enabled = false;
            }
        }
    }

    set_parts_simulating::<B>(world, &ragdoll.parts, true);
    push_parts::<B>(world, &ragdoll.parts, impulse);

    if let Some(mut current) = world.get_mut::<Ragdoll>(root) {
        current.state = RagdollState::Simulating;
    }
    debug!("Ragdoll {root:?} knocked down");
    true
}

/// Add an impulse to every limb of a simulating ragdoll.
pub fn apply_additional_force<B: LocomotionBackend>(
    world: &mut World,
    root: Entity,
    impulse: Vec3,
) -> bool {
    let Some(ragdoll) = world.get::<Ragdoll>(root) else {
        return false;
    };
    if !ragdoll.is_simulating() {
        return false;
    }
    let parts = ragdoll.parts.clone();
    push_parts::<B>(world, &parts, impulse);
    true
}

/// Start getting up.
///
/// The root is snapped onto the ground under the hips, turned to the hips'
/// heading and the stand-up clip starts. Control returns after
/// `stand_up_delay`.
pub fn begin_recovery<B: LocomotionBackend>(world: &mut World, root: Entity) -> bool {
    let Some(ragdoll) = world.get::<Ragdoll>(root).cloned() else {
        return false;
    };
    if !ragdoll.is_simulating() || !ragdoll.can_get_up {
        return false;
    }
    let config = ragdoll_config(world, root);

    set_parts_simulating::<B>(world, &ragdoll.parts, false);

    let hips_position = B::get_position(world, ragdoll.hips);
    let hips_rotation = B::get_rotation(world, ragdoll.hips);
    let target = match ragdoll.hip_ground {
        Some(hit) => hit.point + Vec3::Y * config.stand_up_offset,
        None => hips_position + Vec3::Y * (config.stand_up_offset + NO_GROUND_EXTRA_HEIGHT),
    };

    // Lying down, the hips' forward can point straight up.
    let mut heading = hips_rotation * Vec3::NEG_Z;
    heading.y = 0.0;
    if heading.length_squared() < 1e-4 {
        heading = hips_rotation * Vec3::Y;
        heading.y = 0.0;
    }
    let yaw = if heading.length_squared() < 1e-4 {
        0.0
    } else {
        yaw_of(heading)
    };

    B::set_position(world, root, target);
    B::set_rotation(world, root, Quat::from_rotation_y(yaw));
    B::set_velocity(world, root, Vec3::ZERO);
    B::set_angular_velocity(world, root, Vec3::ZERO);

    if let Some(mut params) = world.get_mut::<AnimationParams>(root) {
        params.enabled = true;
        params.stand_up = true;
        params.play = Some(AnimationClip::StandUp);
    }
    if let Some(mut current) = world.get_mut::<Ragdoll>(root) {
        current.can_get_up = false;
        current.state = RagdollState::RecoveringToAnimated {
            remaining: config.stand_up_delay,
        };
    }
    debug!("Ragdoll {root:?} getting up");
    true
}

/// Cancel a stand-up in progress and go back to simulating.
pub fn interrupt_recovery<B: LocomotionBackend>(
    world: &mut World,
    root: Entity,
    impulse: Vec3,
) -> bool {
    let Some(ragdoll) = world.get::<Ragdoll>(root).cloned() else {
        return false;
    };
    if !matches!(ragdoll.state, RagdollState::RecoveringToAnimated { .. }) {
        return false;
    }

    if let Some(mut params) = world.get_mut::<AnimationParams>(root) {
        params.enabled = false;
        params.stand_up = false;
        params.play = None;
    }
    set_parts_simulating::<B>(world, &ragdoll.parts, true);
    push_parts::<B>(world, &ragdoll.parts, impulse);

    if let Some(mut current) = world.get_mut::<Ragdoll>(root) {
        current.can_get_up = true;
        current.state = RagdollState::Simulating;
    }
    true
}

/// Freeze the ragdoll for good after `delay` seconds.
pub fn freeze<B: LocomotionBackend>(world: &mut World, root: Entity, delay: f32) -> bool {
    let Some(mut ragdoll) = world.get_mut::<Ragdoll>(root) else {
        return false;
    };
    if ragdoll.is_frozen() {
        return false;
    }
    if delay > 0.0 {
        ragdoll.freeze_in = Some(delay);
    } else {
        freeze_now::<B>(world, root);
    }
    true
}

fn freeze_now<B: LocomotionBackend>(world: &mut World, root: Entity) {
    let Some(parts) = world.get::<Ragdoll>(root).map(|r| r.parts.clone()) else {
        return;
    };
    set_parts_simulating::<B>(world, &parts, false);
    if let Some(mut ragdoll) = world.get_mut::<Ragdoll>(root) {
        ragdoll.state = RagdollState::Frozen;
        ragdoll.freeze_in = None;
        ragdoll.can_get_up = false;
    }
    debug!("Ragdoll {root:?} frozen");
}

fn finish_recovery<B: LocomotionBackend>(world: &mut World, root: Entity, ragdoll: &Ragdoll) {
    let config = ragdoll_config(world, root);

    match ragdoll.kind {
        RagdollKind::Player => {
            B::set_kinematic(world, root, false);
            if let Some(mut rig) = world.get_mut::<CameraRig>(root) {
                rig.free_look = true;
                rig.follow_damping = config.normal_camera_damping;
            }
            if let Some(mut holder) = world.get_mut::<WeaponHolder>(root) {
                holder.enabled = true;
            }
        }
        RagdollKind::Npc => {
            if let Some(mut steering) = world.get_mut::<SteeringAgent>(root) {
                steering.enabled = true;
            }
        }
    }
    B::set_collider_enabled(world, root, true);

    if let Err(err) = with_authority(world, root, |a| {
        a.transfer(ControlOwner::Ragdoll, ControlOwner::Locomotion)
    }) {
        warn!("Ragdoll {root:?}: {err}");
    }
    if let Some(mut controller) = world.get_mut::<PlayerController>(root) {
        controller.set_can_move(true);
    }
    if let Some(mut params) = world.get_mut::<AnimationParams>(root) {
        params.stand_up = false;
        params.play = None;
    }
    if let Some(mut current) = world.get_mut::<Ragdoll>(root) {
        current.can_get_up = true;
        current.state = RagdollState::Animated;
    }
    debug!("Ragdoll {root:?} back on its feet");
}

/// Apply queued [`RagdollCommand`]s.
pub fn process_ragdoll_commands<B: LocomotionBackend>(world: &mut World) {
    let commands: Vec<RagdollCommand> = match world.get_resource_mut::<Messages<RagdollCommand>>() {
        Some(mut messages) => messages.drain().collect(),
        None => return,
    };

    for command in commands {
        let root = command.root;
        match command.action {
            RagdollAction::KnockDown { impulse } => {
                knock_down::<B>(world, root, impulse);
            }
            RagdollAction::AddForce { impulse } => {
                apply_additional_force::<B>(world, root, impulse);
            }
            RagdollAction::BeginRecovery => {
                begin_recovery::<B>(world, root);
            }
            RagdollAction::InterruptRecovery { impulse } => {
                interrupt_recovery::<B>(world, root, impulse);
            }
            RagdollAction::Freeze { delay } => {
                freeze::<B>(world, root, delay);
            }
        }
    }
}

/// Advance stand-up and freeze timers.
pub fn advance_ragdolls<B: LocomotionBackend>(world: &mut World) {
    let dt = B::get_fixed_timestep(world);
    let ragdolls: Vec<(Entity, Ragdoll)> = world
        .query::<(Entity, &Ragdoll)>()
        .iter(world)
        .map(|(e, ragdoll)| (e, ragdoll.clone()))
        .collect();

    for (root, ragdoll) in ragdolls {
        if let Some(remaining) = ragdoll.freeze_in {
            let remaining = remaining - dt;
            if remaining <= 0.0 {
                freeze_now::<B>(world, root);
                continue;
            }
            if let Some(mut current) = world.get_mut::<Ragdoll>(root) {
                current.freeze_in = Some(remaining);
            }
        }

        if let RagdollState::RecoveringToAnimated { remaining } = ragdoll.state {
            let remaining = remaining - dt;
            if remaining <= 0.0 {
                finish_recovery::<B>(world, root, &ragdoll);
            } else if let Some(mut current) = world.get_mut::<Ragdoll>(root) {
                current.state = RagdollState::RecoveringToAnimated { remaining };
            }
        }
    }
}
