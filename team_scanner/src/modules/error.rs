use std::fmt;

// Errors surfaced through the scan controller's status.
// Clone so the last error can be kept in status snapshots and
// handed across task boundaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    // Camera access was refused by the platform or the user
    PermissionDenied(String),
    // No camera matching the request, or it could not be started
    DeviceUnavailable(String),
    // The payload was already accepted in this session
    DuplicateCode,
    // Local transport error while posting the record to the sink
    SubmissionFailed(String),
}

impl ScanError {
    // Camera errors are fixed by calling start() again, everything else by rescanning
    pub fn is_camera_error(&self) -> bool {
        matches!(self, ScanError::PermissionDenied(_) | ScanError::DeviceUnavailable(_))
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::PermissionDenied(err) => write!(f, "Camera access denied: {}", err),
            ScanError::DeviceUnavailable(err) => write!(f, "Camera unavailable: {}", err),
            ScanError::DuplicateCode => write!(f, "Team already scanned"),
            ScanError::SubmissionFailed(err) => write!(f, "Failed to send record to sink: {}", err),
        }
    }
}

impl std::error::Error for ScanError {}

// Failure inside a detection probe. Never leaves the code detector,
// which turns it into "no code found"
#[derive(Debug, Clone)]
pub enum DetectError {
    // Frame could not be interpreted
    MalformedFrame(String),
}

impl fmt::Display for DetectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectError::MalformedFrame(err) => write!(f, "Malformed frame: {}", err),
        }
    }
}

impl std::error::Error for DetectError {}
