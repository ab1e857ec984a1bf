// ============================================================================
// EXTERNAL COLLABORATORS — upload validation and the image-editing service
// ============================================================================
//
// Both services are remote in production; the core only depends on these
// narrow seams. `EchoService` / `AcceptAll` keep the application fully
// usable offline and give tests a deterministic backend.

use image::RgbaImage;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Hard deadline for one submission round-trip. After this the in-flight job
/// is abandoned and the UI returns to painting; the mask is untouched.
pub const MODIFY_TIMEOUT: Duration = Duration::from_secs(120);

/// Payload handed to the editing service. Both images are lossless PNG bytes
/// at mask-buffer resolution; the mask is opaque two-tone (white = edit
/// here, black = leave alone).
#[derive(Clone, Debug)]
pub struct ModifyRequest {
    pub original_png: Vec<u8>,
    pub mask_png: Vec<u8>,
    pub prompt: String,
}

/// The edited replacement image, PNG-encoded.
#[derive(Clone, Debug)]
pub struct ModifyResponse {
    pub edited_png: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The service refused the request (bad prompt, rejected subject, …).
    Rejected(String),
    /// Transport-level failure.
    Transport(String),
    /// The service answered with something unusable.
    BadResponse(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Rejected(msg) => write!(f, "request rejected: {}", msg),
            ServiceError::Transport(msg) => write!(f, "service unreachable: {}", msg),
            ServiceError::BadResponse(msg) => write!(f, "bad service response: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

/// The opaque remote editing service.
pub trait EditService: Send + Sync {
    fn modify(&self, request: &ModifyRequest) -> Result<ModifyResponse, ServiceError>;
}

/// Offline stand-in: returns the original image unedited.
pub struct EchoService;

impl EditService for EchoService {
    fn modify(&self, request: &ModifyRequest) -> Result<ModifyResponse, ServiceError> {
        if request.prompt.trim().is_empty() {
            return Err(ServiceError::Rejected("empty prompt".into()));
        }
        Ok(ModifyResponse {
            edited_png: request.original_png.clone(),
        })
    }
}

/// Gatekeeper run on every upload before the mask buffer is initialized.
/// In production this checks that the photo actually shows the expected
/// subject category; on rejection the core never sees the image.
pub trait SubjectValidator: Send + Sync {
    fn contains_subject(&self, image: &RgbaImage) -> Result<bool, ServiceError>;

    /// Message shown to the user when `contains_subject` returns false.
    fn rejection_message(&self) -> &str {
        "The uploaded image does not show the expected subject."
    }
}

/// Permissive validator: anything that decoded as an image passes.
pub struct AcceptAll;

impl SubjectValidator for AcceptAll {
    fn contains_subject(&self, _image: &RgbaImage) -> Result<bool, ServiceError> {
        Ok(true)
    }
}

/// Run a modification on a worker thread, reporting through a channel the UI
/// polls each frame. If the receiver is dropped (timeout abort), the worker's
/// send fails silently and the thread winds down on its own.
pub fn spawn_modify_job(
    service: Arc<dyn EditService>,
    request: ModifyRequest,
) -> mpsc::Receiver<Result<ModifyResponse, ServiceError>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(service.modify(&request));
    });
    rx
}
