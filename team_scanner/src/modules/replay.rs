use futures::future::BoxFuture;
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    sync::Arc,
};

use crate::modules::{
    code_detector::QrCapability,
    error::{DetectError, ScanError},
    frame_source::{Feed, FeedHandle, FeedRequest, Frame, FrameSource},
};

// Headless camera: every file in a directory is one frame, played back in
// file name order and looping
pub struct ReplayFrameSource {
    frames_dir: PathBuf,
}

impl ReplayFrameSource {
    pub fn new(frames_dir: impl Into<PathBuf>) -> Self {
        Self { frames_dir: frames_dir.into() }
    }

    fn load_frames(&self, request: &FeedRequest) -> Result<Vec<Frame>, ScanError> {
        let entries = fs::read_dir(&self.frames_dir).map_err(|e| camera_error(&self.frames_dir, e))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| camera_error(&self.frames_dir, e))?;
            if entry.path().is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        if paths.is_empty() {
            return Err(ScanError::DeviceUnavailable(format!(
                "no frames in {}",
                self.frames_dir.display()
            )));
        }

        let mut frames = Vec::with_capacity(paths.len());
        for path in paths {
            let data = fs::read(&path).map_err(|e| camera_error(&path, e))?;
            frames.push(Frame::new(request.preferred_width, request.preferred_height, data));
        }
        Ok(frames)
    }
}

fn camera_error(path: &Path, err: std::io::Error) -> ScanError {
    match err.kind() {
        ErrorKind::PermissionDenied => ScanError::PermissionDenied(format!("{}: {}", path.display(), err)),
        _ => ScanError::DeviceUnavailable(format!("{}: {}", path.display(), err)),
    }
}

impl FrameSource for ReplayFrameSource {
    fn open<'a>(&'a self, request: &'a FeedRequest) -> BoxFuture<'a, Result<FeedHandle, ScanError>> {
        Box::pin(async move {
            // Everything is read up front, a failure leaves nothing open
            let frames = self.load_frames(request)?;
            log::info!(
                "Replaying {} frames from {} as a {:?} camera",
                frames.len(),
                self.frames_dir.display(),
                request.facing
            );

            Ok(FeedHandle::new(Arc::new(ReplayFeed {
                frames,
                cursor: AtomicUsize::new(0),
                stopped: AtomicBool::new(false),
            })))
        })
    }
}

struct ReplayFeed {
    frames: Vec<Frame>,
    cursor: AtomicUsize,
    stopped: AtomicBool,
}

impl Feed for ReplayFeed {
    fn current_frame(&self) -> Option<Frame> {
        if self.stopped.load(Ordering::SeqCst) || self.frames.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::SeqCst) % self.frames.len();
        self.frames.get(index).cloned()
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

// Treats the frame's bytes as the text a QR reader would have decoded.
// An empty frame holds no code
pub struct TextQrCapability;

impl QrCapability for TextQrCapability {
    fn detect<'a>(&'a self, frame: &'a Frame) -> BoxFuture<'a, Result<Vec<String>, DetectError>> {
        Box::pin(async move {
            if frame.data.is_empty() {
                return Ok(Vec::new());
            }
            let text = std::str::from_utf8(&frame.data).map_err(|e| DetectError::MalformedFrame(e.to_string()))?;
            Ok(vec![text.to_string()])
        })
    }
}
