use thiserror::Error;

use crate::parameters::Field;

/// Failures of the persistence collaborator. Never fatal: settings simply
/// won't persist.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access parameter store: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed parameter document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Advisory notices surfaced to the user without interrupting anything.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Diagnostic {
    #[error("capped point calculation at {applied} (requested {requested}) for performance")]
    PointsCapped { requested: u32, applied: u32 },
    #[error("capped cluster count at {applied} (requested {requested}) for performance")]
    ClustersCapped { requested: u32, applied: u32 },
    #[error("ignored invalid value for {}", .field.key())]
    InvalidInput { field: Field },
}

/// A frame step that could not run. The render loop logs it and keeps going.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("surface has no drawable area")]
    EmptySurface,
    #[error("surface is {surface:?} but the viewport is {viewport:?}")]
    SizeMismatch {
        surface: (u32, u32),
        viewport: (u32, u32),
    },
}
