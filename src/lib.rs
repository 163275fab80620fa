//! # `locomotion_core`
//!
//! Physics-driven locomotion for a third-person action game, with physics
//! backend abstraction.
//!
//! This crate turns player and vehicle input into forces and torques on rigid
//! bodies:
//! - On-foot movement with slope adhesion, extra gravity and delayed jumps
//! - Player and NPC ragdolls with a cancellable stand-up
//! - A raycast-suspension car with drive, steering and lateral grip
//! - Jetpack flight with PD attitude stabilization and a strafe mode
//! - Mounting and dismounting with an explicit body ownership token
//! - Guns and projectiles that knock characters down
//!
//! ## Architecture
//!
//! Every drivable body carries a [`BodyAuthority`](authority::BodyAuthority)
//! token. A controller only writes to a body while it holds the token, and
//! the mount and ragdoll sequences hand the token over explicitly, so two
//! controllers never drive the same body in one step.
//!
//! All physics work runs in `FixedUpdate`, ordered by [`LocomotionSet`]:
//! 1. `Preparation` clears last step's forces and validates tunables
//! 2. `Sensors` runs ground, slope, wheel and hip probes
//! 3. `Orchestration` advances mount and ragdoll sequences and resolves hits
//! 4. `Forces` computes and writes controller forces
//! 5. `FinalApplication` flushes forces to the engine and latches input edges
//!
//! Animation parameters, camera smoothing and vehicle cosmetics update once
//! per rendered frame in [`LocomotionSet::Presentation`].
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use locomotion_core::prelude::*;
//!
//! // Create controller components for an on-foot player
//! let controller = PlayerController::new();
//! let config = MovementConfig::default();
//! let intent = LocomotionIntent::default();
//! let authority = BodyAuthority::held_by(ControlOwner::Locomotion);
//!
//! // These can be spawned as a bundle with physics components
//! ```

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

pub mod authority;
pub mod backend;
pub mod collision;
pub mod combat;
pub mod config;
pub mod error;
pub mod intent;
pub mod jetpack;
pub mod mount;
pub mod player;
pub mod presentation;
pub mod ragdoll;
pub mod state;
pub mod systems;
pub mod vehicle;

#[cfg(feature = "rapier3d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::authority::{BodyAuthority, ControlOwner};
    pub use crate::backend::{ForceAccumulator, LocomotionBackend};
    pub use crate::collision::{ProbeHit, ProbeRequest};
    pub use crate::combat::{
        BodyImpact, Gun, HitOutcome, Projectile, ProjectileContact, WakeTimer, WeaponHolder,
    };
    pub use crate::config::{
        DoorAnchor, GunData, JetpackSettings, Misconfigured, MountKind, Mountable,
        MovementConfig, RagdollConfig, TurningCurve, ValidatedConfig, VehicleConfig, Vitals,
    };
    pub use crate::error::{AuthorityError, ConfigError};
    pub use crate::intent::{
        ButtonState, DriveIntent, JetpackIntent, LocomotionIntent, MountIntent, WeaponIntent,
    };
    pub use crate::jetpack::{FlightMode, JetpackController};
    pub use crate::mount::{MountContext, MountPhase, Mounter};
    pub use crate::player::{JumpPhase, LocomotionState, PlayerController};
    pub use crate::presentation::{
        AnimationClip, AnimationParams, AnimationTrigger, CameraRig, ModelFacing, VehicleEffects,
    };
    pub use crate::ragdoll::{
        Ragdoll, RagdollAction, RagdollCommand, RagdollKind, RagdollPart, RagdollState,
        SteeringAgent,
    };
    pub use crate::state::{Airborne, Grounded, Mounted, Ragdolled};
    pub use crate::vehicle::{SuspensionCorner, VehicleController};
    pub use crate::{LocomotionPlugin, LocomotionRng, LocomotionSet, WorldGravity};

    #[cfg(feature = "rapier3d")]
    pub use crate::rapier::{RapierBackend, RapierLocomotionBundle};
}

/// System sets for the locomotion pipeline.
///
/// The fixed-step sets run in order: `Preparation`, `Sensors`,
/// `Orchestration`, `Forces`, `FinalApplication`. `Presentation` runs in
/// `Update`.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocomotionSet {
    /// Clear per-step force accumulators and validate changed tunables.
    Preparation,
    /// Backend probes: ground, slope, wheels and hips.
    Sensors,
    /// Mount, ragdoll and combat sequences.
    Orchestration,
    /// Controller force computation.
    Forces,
    /// Flush forces to the engine, latch input and sync markers.
    FinalApplication,
    /// Animation parameters, camera smoothing and cosmetics.
    Presentation,
}

/// World gravity used for jetpack compensation.
///
/// Backends keep this in sync with the engine's gravity.
#[derive(Resource, Reflect, Debug, Clone, Copy)]
#[reflect(Resource)]
pub struct WorldGravity(pub Vec3);

impl Default for WorldGravity {
    fn default() -> Self {
        Self(Vec3::new(0.0, -9.81, 0.0))
    }
}

/// Random source for weapon spread and wake-up delays.
#[derive(Resource)]
pub struct LocomotionRng(pub StdRng);

impl Default for LocomotionRng {
    fn default() -> Self {
        Self(StdRng::from_entropy())
    }
}

impl LocomotionRng {
    /// Deterministic source, for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

/// Main plugin for the locomotion core.
///
/// This plugin is generic over a physics backend `B` which provides the actual
/// physics operations (probing, force application, etc.).
///
/// # Type Parameters
/// - `B`: The physics backend implementation (e.g., `RapierBackend`)
///
/// # Examples
///
/// With the Rapier backend:
/// ```rust,no_run
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use locomotion_core::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
///     .add_plugins(LocomotionPlugin::<RapierBackend>::default())
///     .run();
/// ```
pub struct LocomotionPlugin<B: backend::LocomotionBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::LocomotionBackend> Default for LocomotionPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::LocomotionBackend> Plugin for LocomotionPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<authority::BodyAuthority>();
        app.register_type::<backend::ForceAccumulator>();
        app.register_type::<config::MovementConfig>();
        app.register_type::<config::RagdollConfig>();
        app.register_type::<config::VehicleConfig>();
        app.register_type::<config::JetpackSettings>();
        app.register_type::<config::Mountable>();
        app.register_type::<config::GunData>();
        app.register_type::<config::Vitals>();
        app.register_type::<intent::LocomotionIntent>();
        app.register_type::<intent::DriveIntent>();
        app.register_type::<intent::JetpackIntent>();
        app.register_type::<intent::MountIntent>();
        app.register_type::<intent::WeaponIntent>();
        app.register_type::<player::PlayerController>();
        app.register_type::<ragdoll::Ragdoll>();
        app.register_type::<ragdoll::RagdollPart>();
        app.register_type::<ragdoll::SteeringAgent>();
        app.register_type::<vehicle::VehicleController>();
        app.register_type::<jetpack::JetpackController>();
        app.register_type::<mount::Mounter>();
        app.register_type::<combat::Gun>();
        app.register_type::<combat::WeaponHolder>();
        app.register_type::<combat::Projectile>();
        app.register_type::<combat::WakeTimer>();
        app.register_type::<presentation::AnimationParams>();
        app.register_type::<presentation::CameraRig>();
        app.register_type::<presentation::ModelFacing>();
        app.register_type::<presentation::VehicleEffects>();
        app.register_type::<state::Grounded>();
        app.register_type::<state::Airborne>();
        app.register_type::<state::Ragdolled>();
        app.register_type::<state::Mounted>();
        app.register_type::<WorldGravity>();

        app.init_resource::<WorldGravity>();
        app.init_resource::<LocomotionRng>();

        app.add_message::<ragdoll::RagdollCommand>();
        app.add_message::<combat::ProjectileContact>();
        app.add_message::<combat::BodyImpact>();

        app.configure_sets(
            FixedUpdate,
            (
                LocomotionSet::Preparation,
                LocomotionSet::Sensors,
                LocomotionSet::Orchestration,
                LocomotionSet::Forces,
                LocomotionSet::FinalApplication,
            )
                .chain(),
        );

        // Add the physics backend plugin
        app.add_plugins(B::plugin());

        app.add_systems(
            FixedUpdate,
            (
                systems::validate_config::<config::MovementConfig>,
                systems::validate_config::<config::RagdollConfig>,
                systems::validate_config::<config::VehicleConfig>,
                systems::validate_config::<config::JetpackSettings>,
                systems::validate_config::<config::Mountable>,
                systems::validate_config::<config::GunData>,
                systems::validate_config::<config::Vitals>,
            )
                .in_set(LocomotionSet::Preparation),
        );

        // Sequences advance before new requests start, so a request made this
        // step always yields one step before the next stage.
        app.add_systems(
            FixedUpdate,
            (
                mount::advance_mount_sequences::<B>,
                mount::process_mount_requests::<B>,
                ragdoll::advance_ragdolls::<B>,
                combat::wake_knocked_down::<B>,
                combat::resolve_projectile_hits::<B>,
                combat::resolve_body_impacts::<B>,
                ragdoll::process_ragdoll_commands::<B>,
            )
                .chain()
                .in_set(LocomotionSet::Orchestration),
        );

        app.add_systems(
            FixedUpdate,
            (
                player::apply_player_locomotion::<B>,
                vehicle::apply_vehicle_forces::<B>,
                jetpack::apply_jetpack_flight::<B>,
                combat::fire_weapons::<B>,
                combat::expire_projectiles,
            )
                .chain()
                .in_set(LocomotionSet::Forces),
        );

        app.add_systems(
            FixedUpdate,
            (intent::latch_button_edges, state::sync_state_markers)
                .in_set(LocomotionSet::FinalApplication),
        );

        app.add_systems(
            Update,
            (
                presentation::update_player_animation,
                presentation::update_camera_rigs,
                presentation::update_model_facing,
                presentation::update_vehicle_effects,
            )
                .in_set(LocomotionSet::Presentation),
        );
    }
}
