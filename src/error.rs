use crate::ops::ai::CollaboratorError;

/// Errors surfaced by the studio session and its I/O helpers.
///
/// Interaction paths (pointer events, updates aimed at deleted layers) never
/// produce these; they degrade to no-ops instead.
#[derive(Debug)]
pub enum StudioError {
    /// The bytes looked like an image but could not be decoded.
    Decode(String),
    /// The bytes are not a recognised image format at all.
    UnsupportedFormat,
    Encode(String),
    Io(std::io::Error),
    Font(String),
    /// A collaborator request is already outstanding.
    Busy,
    MissingHeadline,
    NoBaseImage,
    /// A layer kind or shape disabled by the engine configuration.
    Disabled(&'static str),
    Collaborator(CollaboratorError),
    Settings(String),
}

impl std::fmt::Display for StudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StudioError::Decode(e) => write!(f, "Could not decode image: {}", e),
            StudioError::UnsupportedFormat => write!(f, "File is not a supported image"),
            StudioError::Encode(e) => write!(f, "Could not encode image: {}", e),
            StudioError::Io(e) => write!(f, "I/O error: {}", e),
            StudioError::Font(e) => write!(f, "Could not load font: {}", e),
            StudioError::Busy => write!(f, "Another request is still being processed"),
            StudioError::MissingHeadline => write!(f, "Please provide a product headline."),
            StudioError::NoBaseImage => write!(f, "No image is loaded"),
            StudioError::Disabled(what) => write!(f, "{} is disabled in this editor", what),
            StudioError::Collaborator(e) => write!(f, "{}", e),
            StudioError::Settings(e) => write!(f, "Invalid settings: {}", e),
        }
    }
}

impl std::error::Error for StudioError {}

impl From<std::io::Error> for StudioError {
    fn from(e: std::io::Error) -> Self {
        StudioError::Io(e)
    }
}

impl From<image::ImageError> for StudioError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::Unsupported(_) => StudioError::UnsupportedFormat,
            image::ImageError::IoError(io) => StudioError::Io(io),
            other => StudioError::Decode(other.to_string()),
        }
    }
}

impl From<CollaboratorError> for StudioError {
    fn from(e: CollaboratorError) -> Self {
        StudioError::Collaborator(e)
    }
}
