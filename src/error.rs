//! Error types.
//!
//! Nothing in the control core performs I/O, so the only errors are
//! configuration faults caught at setup time and ownership violations on a
//! shared rigid body.

use thiserror::Error;

use crate::authority::ControlOwner;

/// A tunable record failed validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A value that is used as a divisor or a rate must be strictly positive.
    #[error("`{field}` must be positive and finite, got {value}")]
    NonPositive { field: &'static str, value: f32 },

    /// A value must not be negative.
    #[error("`{field}` must not be negative, got {value}")]
    Negative { field: &'static str, value: f32 },

    /// A `[min, max]` pair is inverted.
    #[error("`{min_field}` ({min}) must not exceed `{max_field}` ({max})")]
    InvertedRange {
        min_field: &'static str,
        min: f32,
        max_field: &'static str,
        max: f32,
    },

    /// A value is below its lower bound.
    #[error("`{field}` must be at least {min}, got {value}")]
    BelowMinimum {
        field: &'static str,
        min: f32,
        value: f32,
    },

    /// A ratio that must stay in `[0, 1]`.
    #[error("`{field}` must be within [0, 1], got {value}")]
    OutOfUnitRange { field: &'static str, value: f32 },

    /// A vehicle needs at least one suspension ray.
    #[error("vehicle has no suspension corners")]
    NoWheels,

    /// A keyframed curve needs at least one key.
    #[error("curve `{0}` has no keys")]
    EmptyCurve(&'static str),
}

impl ConfigError {
    /// Check that `value` is strictly positive and finite.
    pub(crate) fn positive(field: &'static str, value: f32) -> Result<(), Self> {
        if value > 0.0 && value.is_finite() {
            Ok(())
        } else {
            Err(Self::NonPositive { field, value })
        }
    }

    /// Check that `value` is zero or positive.
    pub(crate) fn non_negative(field: &'static str, value: f32) -> Result<(), Self> {
        if value >= 0.0 && value.is_finite() {
            Ok(())
        } else {
            Err(Self::Negative { field, value })
        }
    }

    /// Check that `value >= min`.
    pub(crate) fn at_least(field: &'static str, value: f32, min: f32) -> Result<(), Self> {
        if value >= min {
            Ok(())
        } else {
            Err(Self::BelowMinimum { field, min, value })
        }
    }

    /// Check that `value` lies in `[0, 1]`.
    pub(crate) fn unit(field: &'static str, value: f32) -> Result<(), Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(Self::OutOfUnitRange { field, value })
        }
    }

    /// Check that `min <= max`.
    pub(crate) fn ordered(
        min_field: &'static str,
        min: f32,
        max_field: &'static str,
        max: f32,
    ) -> Result<(), Self> {
        if min <= max {
            Ok(())
        } else {
            Err(Self::InvertedRange {
                min_field,
                min,
                max_field,
                max,
            })
        }
    }
}

/// Attempted to take or give up control of a body without holding the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthorityError {
    /// Another controller already drives the body.
    #[error("body is driven by {held:?}, {requested:?} cannot take control")]
    Held {
        held: ControlOwner,
        requested: ControlOwner,
    },

    /// The releasing controller does not hold the token.
    #[error("{requested:?} released a body it does not drive (held by {held:?})")]
    NotHolder {
        held: Option<ControlOwner>,
        requested: ControlOwner,
    },

    /// The entity has no authority token at all.
    #[error("entity has no BodyAuthority component")]
    Missing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_rejects_zero_and_nan() {
        assert!(ConfigError::positive("spring_travel", 0.0).is_err());
        assert!(ConfigError::positive("spring_travel", f32::NAN).is_err());
        assert!(ConfigError::positive("spring_travel", 0.2).is_ok());
    }

    #[test]
    fn ordered_reports_both_fields() {
        let err = ConfigError::ordered("sleep_min", 3.0, "sleep_max", 1.0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "`sleep_min` (3) must not exceed `sleep_max` (1)"
        );
    }

    #[test]
    fn unit_range() {
        assert!(ConfigError::unit("air_multiplier", 0.4).is_ok());
        assert!(ConfigError::unit("air_multiplier", 1.2).is_err());
    }
}
