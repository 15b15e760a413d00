#![forbid(unsafe_code)]

//! Input validation errors.

use thiserror::Error;

/// A degenerate or malformed query.
///
/// Input errors suppress triggering; they are never shown to the user as an
/// error message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    /// A required text field is empty after trimming.
    #[error("{field} is empty")]
    EmptyField { field: &'static str },

    /// Origin and destination name the same place.
    #[error("origin and destination are the same ({place})")]
    SelfTrip { place: String },

    /// A bounded field was given a value outside its range.
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A categorical or numeric value could not be parsed.
    #[error("unrecognized {field} value {value:?}")]
    Unrecognized { field: &'static str, value: String },
}
