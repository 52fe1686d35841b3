use super::ColourError;
use crate::error::SyncError;
use thiserror::Error;

/// Errors raised while turning payloads into app state (and back)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Field {key} is not a {expected}")]
    WrongFieldType { key: String, expected: &'static str },

    #[error("Invalid colour: {0}")]
    Colour(#[from] ColourError),

    #[error("Weather source failed: {0}")]
    WeatherSource(String),

    #[error(transparent)]
    Sync(#[from] SyncError),
}
