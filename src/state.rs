//! State marker components.
//!
//! These components mirror controller state for queries elsewhere in a game.
//! They are added and removed at the end of every fixed step from the
//! controllers' own fields, which stay the source of truth.

use bevy::prelude::*;

use crate::mount::Mounter;
use crate::player::PlayerController;
use crate::ragdoll::Ragdoll;

/// Marker component indicating the character is standing on ground or a
/// walkable slope.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use locomotion_core::prelude::*;
///
/// // Grounded is a marker component - just use it in queries
/// fn check_grounded(grounded: Option<&Grounded>) -> bool {
///     grounded.is_some()
/// }
/// ```
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Grounded;

/// Marker component indicating the character is airborne.
///
/// Mutually exclusive with [`Grounded`].
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Airborne;

/// Marker component indicating the ragdoll is simulating or getting up.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Ragdolled;

/// Marker component indicating the player is boarding, riding or leaving a
/// ride.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Mounted;

/// Add or remove marker `M` so that it is present exactly when `wanted`.
fn set_marker<M: Component + Default>(
    commands: &mut Commands,
    entity: Entity,
    has: bool,
    wanted: bool,
) {
    if wanted && !has {
        commands.entity(entity).insert(M::default());
    } else if !wanted && has {
        commands.entity(entity).remove::<M>();
    }
}

/// Sync state marker components with controller state.
pub fn sync_state_markers(
    mut commands: Commands,
    players: Query<(Entity, &PlayerController, Has<Grounded>, Has<Airborne>)>,
    ragdolls: Query<(Entity, &Ragdoll, Has<Ragdolled>)>,
    mounters: Query<(Entity, &Mounter, Has<Mounted>)>,
) {
    for (entity, controller, grounded, airborne) in &players {
        // Frozen controllers keep their last markers.
        if !controller.can_move {
            continue;
        }
        let on_ground = controller.grounded || controller.on_slope;
        set_marker::<Grounded>(&mut commands, entity, grounded, on_ground);
        set_marker::<Airborne>(&mut commands, entity, airborne, !on_ground);
    }

    for (entity, ragdoll, ragdolled) in &ragdolls {
        set_marker::<Ragdolled>(&mut commands, entity, ragdolled, ragdoll.is_ragdoll());
    }

    for (entity, mounter, mounted) in &mounters {
        set_marker::<Mounted>(&mut commands, entity, mounted, !mounter.is_on_foot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ragdoll::{RagdollKind, RagdollState};

    #[test]
    fn markers_follow_controller_state() {
        let mut app = App::new();
        app.add_systems(Update, sync_state_markers);

        let mut controller = PlayerController::new();
        controller.grounded = true;
        let player = app.world_mut().spawn(controller).id();
        app.update();
        assert!(app.world().get::<Grounded>(player).is_some());
        assert!(app.world().get::<Airborne>(player).is_none());

        app.world_mut()
            .get_mut::<PlayerController>(player)
            .unwrap()
            .grounded = false;
        app.update();
        assert!(app.world().get::<Grounded>(player).is_none());
        assert!(app.world().get::<Airborne>(player).is_some());
    }

    #[test]
    fn ragdolled_marker() {
        let mut app = App::new();
        app.add_systems(Update, sync_state_markers);

        let mut ragdoll = Ragdoll::new(RagdollKind::Npc, Entity::PLACEHOLDER, Vec::new());
        ragdoll.state = RagdollState::Simulating;
        let npc = app.world_mut().spawn(ragdoll).id();
        app.update();
        assert!(app.world().get::<Ragdolled>(npc).is_some());

        app.world_mut().get_mut::<Ragdoll>(npc).unwrap().state = RagdollState::Frozen;
        app.update();
        assert!(app.world().get::<Ragdolled>(npc).is_none());
    }
}
