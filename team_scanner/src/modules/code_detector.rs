use futures::future::BoxFuture;
use std::sync::Arc;

use crate::modules::{
    error::DetectError,
    frame_source::{FeedHandle, Frame},
};

// Platform QR primitive. Returns every code found in the frame, in the
// order the primitive reports them
pub trait QrCapability: Send + Sync {
    fn detect<'a>(&'a self, frame: &'a Frame) -> BoxFuture<'a, Result<Vec<String>, DetectError>>;
}

// Wraps the optional QR primitive and never fails: missing capability,
// empty frames and detector errors all come back as None
#[derive(Clone)]
pub struct CodeDetector {
    capability: Option<Arc<dyn QrCapability>>,
}

impl CodeDetector {
    pub fn new(capability: Arc<dyn QrCapability>) -> Self {
        Self { capability: Some(capability) }
    }

    // Detector for a platform without a QR primitive, never finds a code
    pub fn unsupported() -> Self {
        Self { capability: None }
    }

    pub fn is_supported(&self) -> bool {
        self.capability.is_some()
    }

    pub async fn detect(&self, feed: &FeedHandle) -> Option<String> {
        let capability = self.capability.as_ref()?;
        let frame = feed.current_frame()?;

        match capability.detect(&frame).await {
            // Only the first code counts
            Ok(codes) => codes.into_iter().next(),
            Err(e) => {
                log::warn!("QR detection error on frame {} captured at {}: {}", frame.id, frame.captured_at, e);
                None
            }
        }
    }
}
