//! Shared bookkeeping systems.
//!
//! The controller-specific systems live next to their state in `player`,
//! `vehicle`, `jetpack`, `ragdoll`, `mount` and `combat`. This module holds
//! what they share: tunable validation and one-shot fault reporting.

use bevy::prelude::*;

use crate::config::{Misconfigured, ValidatedConfig};

/// Validate `T` records when they are added or changed.
///
/// A failing record tags its entity with [`Misconfigured<T>`], which every
/// force path checks; a corrected record removes the tag again.
pub fn validate_config<T: ValidatedConfig + std::fmt::Debug + Clone>(
    mut commands: Commands,
    q: Query<(Entity, &T, Has<Misconfigured<T>>), Changed<T>>,
) {
    for (entity, config, flagged) in &q {
        match config.validate() {
            Ok(()) => {
                if flagged {
                    info!("{entity:?}: {} is valid again", T::NAME);
                    commands.entity(entity).remove::<Misconfigured<T>>();
                }
            }
            Err(err) => {
                warn!("{entity:?}: invalid {}: {err}", T::NAME);
                commands.entity(entity).insert(Misconfigured::<T>::new(err));
            }
        }
    }
}

/// Log a controller fault the first time it happens for an entity.
///
/// `reported` is a flag stored on the controller, so a missing collaborator
/// does not flood the log every fixed step.
pub(crate) fn report_fault_once(reported: &mut bool, entity: Entity, fault: &str) {
    if !*reported {
        error!("{entity:?}: {fault}; skipping until fixed");
        *reported = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MovementConfig, VehicleConfig};

    #[test]
    fn fault_is_reported_once() {
        let mut reported = false;
        report_fault_once(&mut reported, Entity::PLACEHOLDER, "missing intent");
        assert!(reported);
        report_fault_once(&mut reported, Entity::PLACEHOLDER, "missing intent");
        assert!(reported);
    }

    #[test]
    fn invalid_record_is_tagged_and_cleared() {
        let mut app = App::new();
        app.add_systems(Update, validate_config::<VehicleConfig>);

        let entity = app
            .world_mut()
            .spawn(VehicleConfig::default().with_wheel_points(Vec::new()))
            .id();
        app.update();
        assert!(app
            .world()
            .get::<Misconfigured<VehicleConfig>>(entity)
            .is_some());

        app.world_mut()
            .entity_mut(entity)
            .insert(VehicleConfig::default());
        app.update();
        assert!(app
            .world()
            .get::<Misconfigured<VehicleConfig>>(entity)
            .is_none());
    }

    #[test]
    fn valid_record_is_left_alone() {
        let mut app = App::new();
        app.add_systems(Update, validate_config::<MovementConfig>);
        let entity = app.world_mut().spawn(MovementConfig::default()).id();
        app.update();
        assert!(app
            .world()
            .get::<Misconfigured<MovementConfig>>(entity)
            .is_none());
    }
}
