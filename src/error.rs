// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type shared by the whole crate.
//!
//! Algorithmic failures (too few matches, degenerate geometry, ...)
//! are not errors: modules report them with a boolean success output.

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors of configuration, module resolution and data contracts.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration value is out of its valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A mandatory module role was not registered.
    #[error("Missing module for role \"{0}\"")]
    MissingModule(String),

    /// A module was registered under a role with the wrong capability.
    #[error("Module \"{role}\" is not a {expected} module")]
    WrongModuleKind {
        /// Role name used for the lookup.
        role: String,
        /// Capability expected for this role.
        expected: &'static str,
    },

    /// A pose containing NaN or a zero quaternion.
    #[error("Invalid pose (NaN or zero-norm orientation)")]
    InvalidPose,

    /// Map resolution must be finite and strictly positive.
    #[error("Invalid point cloud map resolution: {0}")]
    InvalidResolution(f32),

    /// Search radius must not be negative or NaN.
    #[error("Invalid search radius: {0}")]
    InvalidRadius(f32),

    /// Frame buffer does not match its declared layout.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Descriptor length or padding breaks the feature vector contract.
    #[error("Malformed descriptor at point {index}: length {length}, expected 0 or {expected}")]
    MalformedDescriptor {
        /// Index of the offending point.
        index: usize,
        /// Length found.
        length: usize,
        /// Descriptor size of the vector.
        expected: usize,
    },

    /// Text file could not be parsed.
    #[error("Parsing error: {0}")]
    Parse(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON configuration error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image decoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
