use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Deserialize;
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use uuid::Uuid;

use crate::modules::error::ScanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    // Rear camera, pointed away from the operator
    Environment,
    User,
}

// What the controller asks the frame source for.
// Width and height are hints only, the actual resolution is not checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRequest {
    pub facing: Facing,
    pub preferred_width: u32,
    pub preferred_height: u32,
}

// A single captured video frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: Uuid,
    pub captured_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            captured_at: Utc::now(),
            width,
            height,
            data,
        }
    }
}

// A live feed as exposed by a camera backend
pub trait Feed: Send + Sync {
    // Latest frame, None if nothing is available right now
    fn current_frame(&self) -> Option<Frame>;

    // Stop the underlying tracks. Called at most once per handle
    fn stop(&self);
}

// Opaque handle to an open feed. Cheap to clone; every clone refers to the
// same hardware and releasing any of them releases it for all
#[derive(Clone)]
pub struct FeedHandle {
    id: Uuid,
    feed: Arc<dyn Feed>,
    released: Arc<AtomicBool>,
}

impl FeedHandle {
    pub fn new(feed: Arc<dyn Feed>) -> Self {
        Self {
            id: Uuid::new_v4(),
            feed,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    // A released feed never hands out frames, even to a probe that
    // was already running when the feed was closed
    pub fn current_frame(&self) -> Option<Frame> {
        if self.is_released() {
            return None;
        }
        self.feed.current_frame()
    }

    // Idempotent, only the first call reaches the backend
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            log::debug!("Releasing feed {}", self.id);
            self.feed.stop();
        }
    }
}

impl fmt::Debug for FeedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedHandle")
            .field("id", &self.id)
            .field("released", &self.is_released())
            .finish()
    }
}

// Camera capability consumed by the scan controller.
// open() must not leave anything acquired behind when it fails
pub trait FrameSource: Send + Sync {
    fn open<'a>(&'a self, request: &'a FeedRequest) -> BoxFuture<'a, Result<FeedHandle, ScanError>>;

    fn close(&self, handle: &FeedHandle) {
        handle.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingFeed {
        stops: AtomicUsize,
    }

    impl Feed for CountingFeed {
        fn current_frame(&self) -> Option<Frame> {
            Some(Frame::new(2, 2, vec![0; 4]))
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn release_is_idempotent_across_clones() {
        let feed = Arc::new(CountingFeed { stops: AtomicUsize::new(0) });
        let handle = FeedHandle::new(feed.clone());
        let other = handle.clone();

        assert!(handle.current_frame().is_some());
        handle.release();
        other.release();
        handle.release();

        assert_eq!(feed.stops.load(Ordering::SeqCst), 1);
        assert!(other.is_released());
        assert!(other.current_frame().is_none());
        assert_eq!(handle.id(), other.id());
    }

    #[test]
    fn frame_records_capture_time() {
        let before = Utc::now();
        let frame = Frame::new(2, 1, vec![1, 2]);

        assert!(frame.captured_at >= before && frame.captured_at <= Utc::now());
        assert_ne!(frame.id, Frame::new(2, 1, vec![1, 2]).id);
    }

    #[test]
    fn facing_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            facing: Facing,
        }
        let parsed: Wrapper = toml::from_str("facing = \"environment\"").unwrap();
        assert_eq!(parsed.facing, Facing::Environment);
    }
}
