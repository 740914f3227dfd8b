//! Error types shared across the engine.
//!
//! None of these escape the public `draw_*` / `remove_*` entry points: the
//! engine catches them at its boundary and logs them. They exist so internal
//! code can propagate failures with `?` instead of logging at every call site.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

/// Failures reported by a [`Surface`](crate::surface::Surface) implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    /// The rendering style has not finished loading.
    #[error("surface style is not loaded")]
    StyleNotLoaded,

    /// A source id was referenced that the surface does not know.
    #[error("source not found: {0}")]
    MissingSource(String),

    /// A layer id was referenced that the surface does not know.
    #[error("layer not found: {0}")]
    MissingLayer(String),

    /// A source with this id is already registered.
    #[error("source already exists: {0}")]
    DuplicateSource(String),

    /// A layer with this id is already registered.
    #[error("layer already exists: {0}")]
    DuplicateLayer(String),

    /// An image with this key is already registered.
    #[error("image already exists: {0}")]
    DuplicateImage(String),

    /// Anything the underlying rendering library reports that has no better home.
    #[error("surface backend failure: {0}")]
    Backend(String),
}

/// Feature-level input failures. A failed feature is skipped; the draw continues.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// Document text could not be parsed as JSON.
    #[error("document parse failed: {0}")]
    Parse(#[from] serde_json::Error),

    /// The value parsed but is not a geometry, feature, collection, or list.
    #[error("unrecognized input shape: {0}")]
    Shape(String),

    /// A feature was present but had no geometry.
    #[error("feature has no geometry")]
    MissingGeometry,

    /// Coordinates were empty, too short, or not finite.
    #[error("invalid coordinates: {0}")]
    Coordinates(String),
}

/// Malformed configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A variable was set but could not be parsed into the expected type.
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}
