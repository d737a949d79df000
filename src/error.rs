use thiserror::Error;

/// Errors reported by padding, window extraction, convolutions and layers.
///
/// Validation runs before any output is allocated, so an `Err` never comes
/// with a partially computed result.
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// Channel counts, ranks or per-axis argument counts disagree.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// An argument is outside of its valid range (zero stride, empty kernel, ...).
    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Layout error: {0}")]
    Layout(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, Error>;
