use thiserror::Error;

/// Failure taxonomy for a pipeline run. Every variant is fatal to the run in
/// which it occurs: the driver aborts rather than continuing with partially
/// tagged output. Empty clip results are not errors.
#[derive(Debug, Clone, Error)]
pub enum PrepError {
    /// Input could not be parsed as a supported geometry/attribute format,
    /// or its attributes do not match the declared schema.
    #[error("unreadable or unsupported input: {0}")]
    Format(String),

    /// Missing, unknown, or incompatible coordinate reference system.
    #[error("coordinate reference system error: {0}")]
    Projection(String),

    /// Invalid (self-intersecting or empty) geometry that cannot be repaired.
    #[error("invalid geometry: {0}")]
    Geometry(String),
}
