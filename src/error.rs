//! Error types for the measurement framework.
//!
//! The variants fall into three families that the orchestrator treats
//! differently:
//!
//! - **Domain errors** (bad PSF parameters, unknown shape names, schema
//!   misuse) are fatal to the call that made them and are reported
//!   immediately.
//! - **Numeric degeneracies** ([`ZeroFlux`](MeasurementError::ZeroFlux),
//!   [`SizeMismatch`](MeasurementError::SizeMismatch)) are caught by the
//!   orchestrator, converted to a caveat flag plus a documented fallback
//!   value, and processing continues.
//! - **Geometric exclusions** ([`OutsideImage`](MeasurementError::OutsideImage),
//!   [`EmptyRegion`](MeasurementError::EmptyRegion)) flag the affected
//!   field or source without dropping it from the output set.

use thiserror::Error;

/// Failure modes of the measurement framework.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeasurementError {
    /// A constructor parameter is outside its valid domain
    /// (e.g. a non-positive Gaussian width).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No PSF shape is registered under the requested name.
    #[error("no PSF shape registered under name \"{0}\"")]
    UnknownPsfShape(String),

    /// A serialized PSF spec carries a version this build does not understand.
    #[error("unsupported PSF spec version {0}")]
    UnsupportedVersion(u16),

    /// A field or flag with this name is already bound in the schema.
    #[error("field \"{0}\" is already defined in the schema")]
    DuplicateField(String),

    /// A required entry is absent from a parameter dictionary.
    #[error("missing required parameter \"{0}\"")]
    MissingParameter(String),

    /// A parameter dictionary entry has the wrong type.
    #[error("parameter \"{name}\" has the wrong type (expected {expected})")]
    WrongParameterType {
        name: String,
        expected: &'static str,
    },

    /// The net counts over a region are exactly zero, so an
    /// intensity-weighted position is undefined.
    #[error("region has no net counts")]
    ZeroFlux,

    /// A weight grid's dimensions differ from the region bounding box it
    /// was asked to cover.
    #[error("weight grid is {got_width}x{got_height} but region bounding box is {want_width}x{want_height}")]
    SizeMismatch {
        got_width: i32,
        got_height: i32,
        want_width: i32,
        want_height: i32,
    },

    /// A measurement window extends beyond the image bounds.
    #[error("window at ({x}, {y}) extends outside the image")]
    OutsideImage { x: i32, y: i32 },

    /// A region contains no usable pixels (e.g. an aperture fully clipped
    /// away by the image boundary).
    #[error("region contains no usable pixels")]
    EmptyRegion,

    /// An algorithm that needs a PSF model was run without one.
    #[error("algorithm requires a PSF model but none was configured")]
    MissingPsf,
}
