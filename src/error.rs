//! Unified error handling for the construction-templates library.
//!
//! Entry points that validate user input (capture, training, sample
//! generation, mode transitions) return these errors. Store corruption and
//! predictor failures are recovered inside the crate and only logged.

use thiserror::Error;

/// Unified error type for construction-template operations.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Capture was requested with an empty item list
    #[error("No items to save")]
    NoItemsToSave,

    /// An operation needed a selected construction and none was given
    #[error("No construction selected")]
    NoConstructionSelected,

    /// The template's work area has too few corners for the operation
    #[error("Construction '{name}' has a work area with {corner_count} points, minimum {minimum_required} required")]
    InsufficientWorkArea {
        name: String,
        corner_count: usize,
        minimum_required: usize,
    },

    /// Index does not address a stored template
    #[error("No construction at index {index} (store holds {len})")]
    TemplateNotFound { index: usize, len: usize },

    /// Variance radius out of range for a corner
    #[error("Variance radius {radius} for point {index} is outside 0..=50 m")]
    InvalidVarianceRadius { index: usize, radius: f64 },

    /// Reference corner index outside the work area
    #[error("Reference point index {index} is outside the work area")]
    InvalidReferenceIndex { index: usize },

    /// Editor transition attempted from the wrong mode
    #[error("Expected editor mode {expected}, currently {actual}")]
    InvalidMode {
        expected: &'static str,
        actual: &'static str,
    },

    /// JSON encoding/decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key-value storage failed
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Placement predictor call failed
    #[error("Predictor error{}: {message}", status_suffix(.status_code))]
    Predictor {
        message: String,
        status_code: Option<u16>,
    },
}

fn status_suffix(status_code: &Option<u16>) -> String {
    status_code
        .map(|code| format!(" ({})", code))
        .unwrap_or_default()
}

#[cfg(feature = "persistence")]
impl From<rusqlite::Error> for TemplateError {
    fn from(err: rusqlite::Error) -> Self {
        TemplateError::Storage {
            message: err.to_string(),
        }
    }
}

/// Result type alias for construction-template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Extension trait for converting Option to TemplateError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a template-not-found error.
    fn ok_or_not_found(self, index: usize, len: usize) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, index: usize, len: usize) -> Result<T> {
        self.ok_or(TemplateError::TemplateNotFound { index, len })
    }
}
