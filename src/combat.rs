//! Guns, projectiles and hit resolution.
//!
//! Combat only feeds the ragdoll: a hit takes health, knocks the target down
//! or pushes it further, and schedules a wake-up. Lethal hits push harder and
//! freeze the body after a delay.

use bevy::ecs::message::Messages;
use bevy::prelude::*;
use rand::Rng;

use crate::authority::{self, ControlOwner};
use crate::backend::LocomotionBackend;
use crate::config::{GunData, Misconfigured, Vitals};
use crate::intent::WeaponIntent;
use crate::presentation::CameraRig;
use crate::ragdoll::{
    apply_additional_force, begin_recovery, freeze, interrupt_recovery, knock_down, Ragdoll,
    RagdollPart, RagdollState,
};
use crate::LocomotionRng;

/// Runtime state of a gun. Tunables live in [`GunData`] on the same entity.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct Gun {
    pub rounds_left: u32,
    /// Time until the next shot is allowed (s).
    pub cooldown: f32,
    /// Time left on a reload in progress (s).
    pub reload_remaining: Option<f32>,
    /// Muzzle position in the shooter's space.
    pub muzzle_offset: Vec3,
}

impl Gun {
    /// A gun with a full magazine.
    pub fn new(data: &GunData) -> Self {
        Self {
            rounds_left: data.magazine_size,
            cooldown: 0.0,
            reload_remaining: None,
            muzzle_offset: Vec3::new(0.3, 1.4, -0.6),
        }
    }

    #[inline]
    pub fn is_reloading(&self) -> bool {
        self.reload_remaining.is_some()
    }

    /// Start reloading unless already reloading.
    pub fn start_reload(&mut self, data: &GunData) {
        if self.reload_remaining.is_none() {
            self.reload_remaining = Some(data.reload_time);
        }
    }

    /// Advance cooldown and reload timers.
    pub fn tick(&mut self, data: &GunData, dt: f32) {
        self.cooldown = (self.cooldown - dt).max(0.0);
        if let Some(remaining) = self.reload_remaining {
            let remaining = remaining - dt;
            if remaining <= 0.0 {
                self.rounds_left = data.magazine_size;
                self.reload_remaining = None;
            } else {
                self.reload_remaining = Some(remaining);
            }
        }
    }

    /// Whether a shot can leave the barrel right now.
    #[inline]
    pub fn can_fire(&self) -> bool {
        self.cooldown <= 0.0 && self.rounds_left > 0 && !self.is_reloading()
    }
}

/// Weapon slot on a shooter.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct WeaponHolder {
    /// The gun entity in hand.
    pub equipped: Option<Entity>,
    /// Switched off while ragdolled or mounted.
    pub enabled: bool,
}

impl Default for WeaponHolder {
    fn default() -> Self {
        Self {
            equipped: None,
            enabled: true,
        }
    }
}

impl WeaponHolder {
    pub fn with_gun(gun: Entity) -> Self {
        Self {
            equipped: Some(gun),
            enabled: true,
        }
    }
}

/// A fired round.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct Projectile {
    /// Normalized travel direction at launch.
    pub direction: Vec3,
    pub lifetime: f32,
    pub elapsed: f32,
    pub damage: f32,
    pub knockback: f32,
    pub shooter: Option<Entity>,
    /// Hit something. Despawned on the next step.
    pub spent: bool,
}

/// Pending wake-up of a knocked-down character.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct WakeTimer {
    pub remaining: Option<f32>,
}

/// A projectile touched something. Written by the physics backend.
#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub struct ProjectileContact {
    pub projectile: Entity,
    pub other: Entity,
}

/// A rigid body slammed into a character. Written by the physics backend.
#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub struct BodyImpact {
    /// The character root or one of its ragdoll parts.
    pub body: Entity,
    /// The body that hit it.
    pub other: Entity,
    /// Velocity of `other` relative to `body`.
    pub relative_velocity: Vec3,
    pub other_mass: f32,
}

/// What a hit did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// Dead already, or nothing to hit.
    Ignored,
    Damaged,
    Killed,
}

/// Map a hit entity to the character root that owns it.
pub fn resolve_hit_root(world: &World, entity: Entity) -> Option<Entity> {
    if let Some(part) = world.get::<RagdollPart>(entity) {
        return Some(part.root);
    }
    world.get::<Vitals>(entity).map(|_| entity)
}

fn random_sleep(world: &mut World, min: f32, max: f32) -> f32 {
    if max <= min {
        return min;
    }
    match world.get_resource_mut::<LocomotionRng>() {
        Some(mut rng) => rng.0.gen_range(min..=max),
        None => min,
    }
}

fn random_in_unit_circle(world: &mut World) -> Vec2 {
    let Some(mut rng) = world.get_resource_mut::<LocomotionRng>() else {
        return Vec2::ZERO;
    };
    loop {
        let candidate = Vec2::new(rng.0.gen_range(-1.0..=1.0), rng.0.gen_range(-1.0..=1.0));
        if candidate.length_squared() <= 1.0 {
            return candidate;
        }
    }
}

/// Knock down, push or interrupt, whatever the ragdoll is doing.
fn push_ragdoll<B: LocomotionBackend>(world: &mut World, root: Entity, impulse: Vec3) {
    let Some(state) = world.get::<Ragdoll>(root).map(|r| r.state) else {
        return;
    };
    match state {
        RagdollState::Animated => {
            knock_down::<B>(world, root, impulse);
        }
        RagdollState::Simulating => {
            apply_additional_force::<B>(world, root, impulse);
        }
        RagdollState::RecoveringToAnimated { .. } => {
            interrupt_recovery::<B>(world, root, impulse);
        }
        RagdollState::Frozen => {}
    }
}

fn start_wake_timer(world: &mut World, root: Entity, vitals: &Vitals) {
    let sleep = random_sleep(world, vitals.sleep_min, vitals.sleep_max);
    world.entity_mut(root).insert(WakeTimer {
        remaining: Some(sleep),
    });
}

/// Deal `damage` to a character and push its ragdoll with `force`.
pub fn apply_hit<B: LocomotionBackend>(
    world: &mut World,
    root: Entity,
    force: Vec3,
    damage: f32,
) -> HitOutcome {
    let Some(vitals) = world.get::<Vitals>(root).copied() else {
        return HitOutcome::Ignored;
    };
    if vitals.dead || world.get::<Misconfigured<Vitals>>(root).is_some() {
        return HitOutcome::Ignored;
    }

    if let Some(mut timer) = world.get_mut::<WakeTimer>(root) {
        timer.remaining = None;
    }

    let health = vitals.health - damage;
    if health <= 0.0 {
        if let Some(mut current) = world.get_mut::<Vitals>(root) {
            current.health = 0.0;
            current.dead = true;
        }
        push_ragdoll::<B>(world, root, force * vitals.death_force_multiplier);
        freeze::<B>(world, root, vitals.death_freeze_delay);
        debug!("Hit {root:?}: killed");
        HitOutcome::Killed
    } else {
        if let Some(mut current) = world.get_mut::<Vitals>(root) {
            current.health = health;
        }
        push_ragdoll::<B>(world, root, force);
        start_wake_timer(world, root, &vitals);
        HitOutcome::Damaged
    }
}

/// Fire, reload and recoil for every armed shooter.
pub fn fire_weapons<B: LocomotionBackend>(world: &mut World) {
    let shooters: Vec<(Entity, Entity, WeaponIntent)> = world
        .query::<(Entity, &WeaponHolder, &WeaponIntent)>()
        .iter(world)
        .filter_map(|(e, holder, intent)| {
            holder
                .enabled
                .then_some(holder.equipped)
                .flatten()
                .map(|gun| (e, gun, *intent))
        })
        .collect();

    let dt = B::get_fixed_timestep(world);

    for (shooter, gun_entity, intent) in shooters {
        if world.get::<Misconfigured<GunData>>(gun_entity).is_some() {
            continue;
        }
        let (Some(mut gun), Some(data)) = (
            world.get::<Gun>(gun_entity).copied(),
            world.get::<GunData>(gun_entity).copied(),
        ) else {
            continue;
        };

        gun.tick(&data, dt);

        let wants_fire =
            (data.automatic && intent.trigger.is_pressed()) || intent.trigger.just_pressed();

        if !gun.is_reloading() {
            let empty_trigger = wants_fire && gun.rounds_left == 0 && gun.cooldown <= 0.0;
            let explicit = intent.reload.just_pressed() && gun.rounds_left < data.magazine_size;
            if empty_trigger || explicit {
                gun.start_reload(&data);
                debug!("Gun {gun_entity:?}: reloading");
            }
        }

        if wants_fire && gun.can_fire() {
            fire::<B>(world, shooter, &mut gun, &data, intent.aim_point);
        }

        if let Some(mut current) = world.get_mut::<Gun>(gun_entity) {
            *current = gun;
        }
    }
}

fn fire<B: LocomotionBackend>(
    world: &mut World,
    shooter: Entity,
    gun: &mut Gun,
    data: &GunData,
    aim_point: Option<Vec3>,
) {
    gun.rounds_left -= 1;
    gun.cooldown = data.cooldown;

    let position = B::get_position(world, shooter);
    let rotation = B::get_rotation(world, shooter);
    let muzzle = position + rotation * gun.muzzle_offset;

    let mut direction = match aim_point {
        Some(point) => point - muzzle,
        None => world
            .get::<CameraRig>(shooter)
            .map_or(rotation * Vec3::NEG_Z, CameraRig::forward),
    };
    let spread = random_in_unit_circle(world) * data.spread;
    direction += Vec3::new(spread.x, spread.y, 0.0);
    let direction = direction.normalize_or(rotation * Vec3::NEG_Z);

    let projectile = world
        .spawn((
            Transform::from_translation(muzzle).looking_to(direction, Vec3::Y),
            Projectile {
                direction,
                lifetime: data.projectile_lifetime,
                elapsed: 0.0,
                damage: data.damage,
                knockback: data.knockback,
                shooter: Some(shooter),
                spent: false,
            },
        ))
        .id();
    B::attach_projectile_body(world, projectile);
    B::apply_impulse(
        world,
        projectile,
        direction * data.shoot_force + rotation * Vec3::Y * data.upward_force,
    );

    if authority::permits(world, shooter, ControlOwner::Locomotion) {
        let aim = aim_point.unwrap_or(position + direction);
        let recoil = -(aim - position).normalize_or_zero() * data.recoil;
        B::apply_impulse(world, shooter, recoil);
    }

    if let Some(mut rig) = world.get_mut::<CameraRig>(shooter) {
        rig.shake(data.shake_amplitude, data.shake_frequency);
    }
}

/// Age projectiles and remove expired or spent ones.
pub fn expire_projectiles(
    mut commands: Commands,
    time: Res<Time>,
    mut q: Query<(Entity, &mut Projectile)>,
) {
    let dt = time.delta_secs();
    for (entity, mut projectile) in &mut q {
        projectile.elapsed += dt;
        if projectile.spent || projectile.elapsed >= projectile.lifetime {
            commands.entity(entity).despawn();
        }
    }
}

/// Turn projectile contacts into hits.
pub fn resolve_projectile_hits<B: LocomotionBackend>(world: &mut World) {
    let contacts: Vec<ProjectileContact> =
        match world.get_resource_mut::<Messages<ProjectileContact>>() {
            Some(mut messages) => messages.drain().collect(),
            None => return,
        };

    for contact in contacts {
        let Some(projectile) = world.get::<Projectile>(contact.projectile).copied() else {
            continue;
        };
        if projectile.spent {
            continue;
        }
        let root = resolve_hit_root(world, contact.other);
        if root.is_some() && root == projectile.shooter {
            continue;
        }
        if let Some(root) = root {
            apply_hit::<B>(
                world,
                root,
                projectile.direction * projectile.knockback,
                projectile.damage,
            );
        }
        if let Some(mut current) = world.get_mut::<Projectile>(contact.projectile) {
            current.spent = true;
        }
    }
}

/// Heavy fast bodies knock characters over.
pub fn resolve_body_impacts<B: LocomotionBackend>(world: &mut World) {
    let impacts: Vec<BodyImpact> = match world.get_resource_mut::<Messages<BodyImpact>>() {
        Some(mut messages) => messages.drain().collect(),
        None => return,
    };

    for impact in impacts {
        let Some(root) = resolve_hit_root(world, impact.body) else {
            continue;
        };
        let Some(vitals) = world.get::<Vitals>(root).copied() else {
            continue;
        };
        if vitals.dead {
            continue;
        }
        let animated = world
            .get::<Ragdoll>(root)
            .is_some_and(|r| r.state == RagdollState::Animated);
        if !animated
            || impact.other_mass <= vitals.mass_threshold
            || impact.relative_velocity.length() <= vitals.velocity_threshold
        {
            continue;
        }

        if knock_down::<B>(world, root, impact.relative_velocity * vitals.impact_force_scale) {
            let velocity = B::get_velocity(world, impact.other);
            B::set_velocity(world, impact.other, velocity + impact.relative_velocity);
            start_wake_timer(world, root, &vitals);
        }
    }
}

/// Get knocked-down characters back up once their timer runs out.
pub fn wake_knocked_down<B: LocomotionBackend>(world: &mut World) {
    let dt = B::get_fixed_timestep(world);
    let timers: Vec<(Entity, f32)> = world
        .query::<(Entity, &WakeTimer)>()
        .iter(world)
        .filter_map(|(e, timer)| timer.remaining.map(|r| (e, r)))
        .collect();

    for (root, remaining) in timers {
        let remaining = remaining - dt;
        if remaining > 0.0 {
            if let Some(mut timer) = world.get_mut::<WakeTimer>(root) {
                timer.remaining = Some(remaining);
            }
            continue;
        }
        if let Some(mut timer) = world.get_mut::<WakeTimer>(root) {
            timer.remaining = None;
        }
        let dead = world.get::<Vitals>(root).is_some_and(|v| v.dead);
        let simulating = world.get::<Ragdoll>(root).is_some_and(Ragdoll::is_simulating);
        if simulating && !dead {
            begin_recovery::<B>(world, root);
        }
    }
}
