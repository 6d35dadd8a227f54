//! Profile storage errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile name must not be empty")]
    EmptyName,

    #[error("profile store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("profile store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
