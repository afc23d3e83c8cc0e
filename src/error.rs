use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Errors surfaced by the toolkit.
///
/// Numeric degeneracies of the TTC estimators are not errors, see
/// [`crate::ttc::TtcEstimate`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("insufficient data for {context}: need at least {required} samples, got {actual}")]
    InsufficientData {
        context: &'static str,
        required: usize,
        actual: usize,
    },
    #[error("keypoint index {index} out of range for a frame with {len} keypoints")]
    KeypointIndex { index: usize, len: usize },
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    GlobPattern(#[from] glob::PatternError),
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
}

impl Error {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
