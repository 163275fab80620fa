//! Single-owner token for shared rigid bodies.
//!
//! Exactly one controller may write forces, torques or velocities to a body
//! in a given fixed step. Every force path checks [`BodyAuthority::permits`]
//! before touching the backend, and the mount and ragdoll sequences move the
//! token explicitly at their hand-off boundaries.

use bevy::prelude::*;

use crate::error::AuthorityError;

/// The controllers that can drive a body.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlOwner {
    /// On-foot player or NPC locomotion.
    Locomotion,
    /// The ragdoll simulation owns the root while the character is knocked down.
    Ragdoll,
    /// A ridden vehicle drives its own chassis.
    Vehicle,
    /// A ridden jetpack drives its own body.
    Jetpack,
}

/// Ownership token attached to every drivable body.
///
/// A vacant token means nobody drives the body: a parked vehicle, or the
/// player while seated as a passenger.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[reflect(Component)]
pub struct BodyAuthority {
    owner: Option<ControlOwner>,
}

impl BodyAuthority {
    /// A token already held by `owner`.
    pub fn held_by(owner: ControlOwner) -> Self {
        Self { owner: Some(owner) }
    }

    /// A token nobody holds.
    pub fn vacant() -> Self {
        Self::default()
    }

    /// The current holder.
    #[inline]
    pub fn owner(&self) -> Option<ControlOwner> {
        self.owner
    }

    /// Whether `owner` may drive the body this step.
    #[inline]
    pub fn permits(&self, owner: ControlOwner) -> bool {
        self.owner == Some(owner)
    }

    /// Whether nobody holds the token.
    #[inline]
    pub fn is_vacant(&self) -> bool {
        self.owner.is_none()
    }

    /// Take the token. Succeeds if it is vacant or already held by `owner`.
    pub fn acquire(&mut self, owner: ControlOwner) -> Result<(), AuthorityError> {
        match self.owner {
            Some(held) if held != owner => Err(AuthorityError::Held {
                held,
                requested: owner,
            }),
            _ => {
                self.owner = Some(owner);
                Ok(())
            }
        }
    }

    /// Give the token up. Fails unless `owner` holds it.
    pub fn release(&mut self, owner: ControlOwner) -> Result<(), AuthorityError> {
        if self.owner == Some(owner) {
            self.owner = None;
            Ok(())
        } else {
            Err(AuthorityError::NotHolder {
                held: self.owner,
                requested: owner,
            })
        }
    }

    /// Hand the token from `from` to `to` without a vacant step in between.
    pub fn transfer(&mut self, from: ControlOwner, to: ControlOwner) -> Result<(), AuthorityError> {
        self.release(from)?;
        self.owner = Some(to);
        Ok(())
    }
}

/// Whether `owner` may drive `entity`. Entities without a token are never driven.
pub fn permits(world: &World, entity: Entity, owner: ControlOwner) -> bool {
    world
        .get::<BodyAuthority>(entity)
        .is_some_and(|authority| authority.permits(owner))
}

/// Apply `f` to the token of `entity`.
pub(crate) fn with_authority<R>(
    world: &mut World,
    entity: Entity,
    f: impl FnOnce(&mut BodyAuthority) -> Result<R, AuthorityError>,
) -> Result<R, AuthorityError> {
    let mut authority = world
        .get_mut::<BodyAuthority>(entity)
        .ok_or(AuthorityError::Missing)?;
    f(&mut authority)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vacant_token_permits_nobody() {
        let token = BodyAuthority::vacant();
        assert!(token.is_vacant());
        assert!(!token.permits(ControlOwner::Locomotion));
        assert!(!token.permits(ControlOwner::Vehicle));
    }

    #[test]
    fn acquire_is_idempotent_for_holder() {
        let mut token = BodyAuthority::vacant();
        token.acquire(ControlOwner::Jetpack).unwrap();
        token.acquire(ControlOwner::Jetpack).unwrap();
        assert!(token.permits(ControlOwner::Jetpack));
    }

    #[test]
    fn second_owner_is_refused() {
        let mut token = BodyAuthority::held_by(ControlOwner::Vehicle);
        let err = token.acquire(ControlOwner::Jetpack).unwrap_err();
        assert_eq!(
            err,
            AuthorityError::Held {
                held: ControlOwner::Vehicle,
                requested: ControlOwner::Jetpack
            }
        );
        assert!(token.permits(ControlOwner::Vehicle));
    }

    #[test]
    fn release_requires_holder() {
        let mut token = BodyAuthority::held_by(ControlOwner::Locomotion);
        assert!(token.release(ControlOwner::Ragdoll).is_err());
        token.release(ControlOwner::Locomotion).unwrap();
        assert!(token.is_vacant());
    }

    #[test]
    fn transfer_moves_token() {
        let mut token = BodyAuthority::held_by(ControlOwner::Locomotion);
        token
            .transfer(ControlOwner::Locomotion, ControlOwner::Ragdoll)
            .unwrap();
        assert_eq!(token.owner(), Some(ControlOwner::Ragdoll));
        assert!(token
            .transfer(ControlOwner::Locomotion, ControlOwner::Ragdoll)
            .is_err());
    }
}
