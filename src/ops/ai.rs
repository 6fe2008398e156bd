// ============================================================================
// COLLABORATOR SEAM: hand-off to the external generative image service
// ============================================================================
//
// The service itself (transport, auth, prompt text) lives with the host. The
// engine only flattens what it sends and treats each reply as one opaque
// raster.

use image::RgbaImage;

use crate::poster::GenerationRequest;

/// Edits the editor can ask the collaborator to perform on the current frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditTask {
    RemoveBackground,
    /// Remove whatever is covered by the mask strokes.
    EraseMasked,
    /// Render the given instruction as text into the image.
    AddText(String),
    PolishDesign,
}

impl EditTask {
    pub fn label(&self) -> &'static str {
        match self {
            EditTask::RemoveBackground => "Remove background",
            EditTask::EraseMasked => "Erase masked area",
            EditTask::AddText(_) => "Add text",
            EditTask::PolishDesign => "Polish design",
        }
    }

    /// Whether the mask strokes are flattened into the outgoing image.
    pub fn uses_mask(&self) -> bool {
        matches!(self, EditTask::EraseMasked)
    }
}

/// One edit request: the task plus the flattened frame it applies to.
#[derive(Clone, Debug)]
pub struct EditRequest {
    pub task: EditTask,
    pub image: RgbaImage,
}

/// Errors reported by a collaborator. The `Display` text is shown to the
/// user as-is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CollaboratorError {
    /// The request failed: transport error, non-success status, timeout.
    Request(String),
    /// The service answered without an image.
    EmptyResponse,
    /// The service answered with bytes that are not a decodable image.
    InvalidImage(String),
}

impl std::fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollaboratorError::Request(e) => write!(f, "{}", e),
            CollaboratorError::EmptyResponse => write!(f, "The service returned no image"),
            CollaboratorError::InvalidImage(e) => write!(f, "The service returned an invalid image: {}", e),
        }
    }
}

impl std::error::Error for CollaboratorError {}

/// The external generation/editing service.
///
/// Calls block until the single response arrives; there is no streaming and
/// no cancellation. Implementations must be shareable across threads because
/// batch generation issues its requests in parallel.
pub trait Collaborator: Send + Sync {
    fn edit(&self, request: &EditRequest) -> Result<RgbaImage, CollaboratorError>;

    fn generate(&self, request: &GenerationRequest) -> Result<RgbaImage, CollaboratorError>;
}

/// Decode a raw response body into a raster, for collaborators that receive
/// encoded image bytes.
pub fn decode_response(bytes: &[u8]) -> Result<RgbaImage, CollaboratorError> {
    if bytes.is_empty() {
        return Err(CollaboratorError::EmptyResponse);
    }
    let img = image::load_from_memory(bytes).map_err(|e| CollaboratorError::InvalidImage(e.to_string()))?;
    let rgba = img.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(CollaboratorError::EmptyResponse);
    }
    Ok(rgba)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_errors_display_verbatim() {
        let e = CollaboratorError::Request("Quota exceeded for this key".into());
        assert_eq!(e.to_string(), "Quota exceeded for this key");
    }

    #[test]
    fn decode_response_rejects_garbage() {
        assert_eq!(decode_response(&[]), Err(CollaboratorError::EmptyResponse));
        assert!(matches!(decode_response(b"not an image"), Err(CollaboratorError::InvalidImage(_))));
    }

    #[test]
    fn decode_response_accepts_png() {
        let img = RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 255]));
        let bytes = crate::io::encode_png(&img).unwrap();
        assert_eq!(decode_response(&bytes).unwrap(), img);
    }
}
