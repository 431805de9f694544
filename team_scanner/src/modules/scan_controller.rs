use chrono::Utc;
use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_stream::{wrappers::IntervalStream, StreamExt};
use uuid::Uuid;

use crate::{
    config::ScannerConfig,
    modules::{
        code_detector::CodeDetector,
        dedup_ledger::{DedupLedger, ScanEntry},
        error::ScanError,
        frame_source::{FeedHandle, FrameSource},
        record_parser::parse_payload,
        sink_client::{SubmissionSink, SubmitOutcome},
    },
};

// Stored controller states. A failed camera start is not a state of its own,
// it shows up as Idle with a camera error in `last_error`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    CameraActive,
    Scanning,
    Submitting,
}

// Everything the presentation layer is allowed to read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanStatus {
    pub state: ScanState,
    pub last_error: Option<ScanError>,
    pub last_success: Option<String>,
    pub accepted_count: usize,
}

impl ScanStatus {
    // Set while the controller is idle because the camera could not be opened
    pub fn camera_error(&self) -> Option<&ScanError> {
        match (&self.state, &self.last_error) {
            (ScanState::Idle, Some(err)) if err.is_camera_error() => Some(err),
            _ => None,
        }
    }
}

// Answer to a scan() call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanRequest {
    // A polling loop was started
    Started,
    // A loop or submission is already in flight, nothing changed
    AlreadyRunning,
    // No open camera, call start() first
    CameraInactive,
}

// Mutable per-controller state, guarded by a std mutex that is never held across an await
struct Session {
    state: ScanState,
    // Open camera, owned exclusively by this controller
    feed: Option<FeedHandle>,
    // Polling task; taken out once a code is found so stop() leaves the submission alone
    poller: Option<JoinHandle<()>>,
    // A start() of the current generation is waiting on the frame source
    opening: bool,
    // A submission is in flight, possibly from before the last stop()
    submitting: bool,
    // Bumped on every stop(), pipelines from an older generation must not touch the state
    generation: u64,
    ledger: DedupLedger,
    last_error: Option<ScanError>,
    last_success: Option<String>,
}

impl Session {
    fn status(&self) -> ScanStatus {
        ScanStatus {
            state: self.state,
            last_error: self.last_error.clone(),
            last_success: self.last_success.clone(),
            accepted_count: self.ledger.len(),
        }
    }
}

struct Shared {
    id: Uuid,
    frame_source: Arc<dyn FrameSource>,
    detector: CodeDetector,
    sink: Arc<dyn SubmissionSink>,
    config: ScannerConfig,
    session: Mutex<Session>,
    status_tx: watch::Sender<ScanStatus>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Session> {
        // Session updates are single assignments, a poisoned lock still holds consistent data
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, session: &Session) {
        self.status_tx.send_replace(session.status());
    }
}

// Resets the opening flag if start() is dropped while the camera is opening.
// A stop() in the meantime already reset it and may have let a newer start() in
struct OpeningGuard<'a> {
    shared: &'a Shared,
    generation: u64,
    armed: bool,
}

impl Drop for OpeningGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut session = self.shared.lock();
            if session.generation == self.generation {
                session.opening = false;
            }
        }
    }
}

// Drives camera -> detector -> dedup -> parser -> sink.
// Each instance has its own ledger, feed and timer; instances do not share anything
pub struct ScanController {
    shared: Arc<Shared>,
}

impl ScanController {
    pub fn new(
        frame_source: Arc<dyn FrameSource>,
        detector: CodeDetector,
        sink: Arc<dyn SubmissionSink>,
        config: ScannerConfig,
    ) -> Self {
        let session = Session {
            state: ScanState::Idle,
            feed: None,
            poller: None,
            opening: false,
            submitting: false,
            generation: 0,
            ledger: DedupLedger::new(),
            last_error: None,
            last_success: None,
        };
        let (status_tx, _) = watch::channel(session.status());

        Self {
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                frame_source,
                detector,
                sink,
                config,
                session: Mutex::new(session),
                status_tx,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn status(&self) -> ScanStatus {
        self.shared.lock().status()
    }

    // Receives every status change from now on
    pub fn subscribe(&self) -> watch::Receiver<ScanStatus> {
        self.shared.status_tx.subscribe()
    }

    // Payloads accepted this session, oldest first
    pub fn entries(&self) -> Vec<ScanEntry> {
        self.shared.lock().ledger.entries().to_vec()
    }

    // Open the camera. Does nothing unless the controller is idle
    pub async fn start(&self) -> Result<(), ScanError> {
        let generation = {
            let mut session = self.shared.lock();
            if session.state != ScanState::Idle || session.opening {
                return Ok(());
            }
            session.opening = true;
            session.generation
        };

        let mut guard = OpeningGuard { shared: &*self.shared, generation, armed: true };
        let request = self.shared.config.feed_request();
        let opened = self.shared.frame_source.open(&request).await;
        guard.armed = false;

        let mut session = self.shared.lock();
        if session.generation != generation {
            // stop() arrived while the camera was opening, whatever we got is not ours to keep
            if let Ok(feed) = opened {
                log::info!("[{}] Camera opened after stop, releasing it", self.shared.id);
                self.shared.frame_source.close(&feed);
            }
            return Ok(());
        }
        session.opening = false;

        match opened {
            Ok(feed) => {
                log::info!("[{}] Camera started, feed {}", self.shared.id, feed.id());
                session.feed = Some(feed);
                session.state = ScanState::CameraActive;
                session.last_error = None;
                self.shared.publish(&session);
                Ok(())
            }
            Err(e) => {
                log::error!("[{}] Camera start error: {}", self.shared.id, e);
                session.last_error = Some(e.clone());
                self.shared.publish(&session);
                Err(e)
            }
        }
    }

    // Begin polling the detector. Only has an effect from CameraActive
    pub fn scan(&self) -> ScanRequest {
        let mut session = self.shared.lock();
        match session.state {
            ScanState::Idle => return ScanRequest::CameraInactive,
            ScanState::Scanning | ScanState::Submitting => return ScanRequest::AlreadyRunning,
            ScanState::CameraActive => {}
        }
        if session.submitting {
            // Pipeline from before the last stop() has not finished yet
            return ScanRequest::AlreadyRunning;
        }
        let feed = match session.feed.clone() {
            Some(feed) => feed,
            None => return ScanRequest::CameraInactive,
        };

        log::info!("[{}] Scanning every {:?}", self.shared.id, self.shared.config.poll_interval());
        let generation = session.generation;
        session.state = ScanState::Scanning;
        session.poller = Some(tokio::spawn(run_pipeline(self.shared.clone(), feed, generation)));
        self.shared.publish(&session);
        ScanRequest::Started
    }

    // Cancel polling, release the camera and go back to Idle. Safe to call in any state
    pub fn stop(&self) {
        let mut session = self.shared.lock();
        session.generation += 1;
        session.opening = false;

        // Timer goes first so no probe can run against a released feed
        if let Some(poller) = session.poller.take() {
            poller.abort();
        }
        if let Some(feed) = session.feed.take() {
            self.shared.frame_source.close(&feed);
        }

        if session.state != ScanState::Idle {
            log::info!("[{}] Stopped from {:?}", self.shared.id, session.state);
        }
        session.state = ScanState::Idle;
        self.shared.publish(&session);
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        self.stop();
    }
}

// Probe the feed once per period until a code shows up.
// Probes run one after another, never overlapping
async fn poll_for_code(detector: &CodeDetector, feed: &FeedHandle, period: Duration) -> Option<String> {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks = IntervalStream::new(timer);

    while ticks.next().await.is_some() {
        if let Some(code) = detector.detect(feed).await {
            return Some(code);
        }
        log::debug!("No code in frame");
    }
    None
}

async fn run_pipeline(shared: Arc<Shared>, feed: FeedHandle, generation: u64) {
    let payload = match poll_for_code(&shared.detector, &feed, shared.config.poll_interval()).await {
        Some(payload) => payload,
        None => return,
    };

    {
        let mut session = shared.lock();
        if session.generation != generation {
            return;
        }
        // Detach from the polling handle, stop() must not cancel the submission
        session.poller = None;

        if session.ledger.has(&payload) {
            log::warn!("[{}] Team already scanned", shared.id);
            session.last_error = Some(ScanError::DuplicateCode);
            session.state = ScanState::CameraActive;
            shared.publish(&session);
            return;
        }
        session.state = ScanState::Submitting;
        session.submitting = true;
        shared.publish(&session);
    }

    let accepted_at = Utc::now();
    let record = parse_payload(&payload, accepted_at);
    let outcome = shared.sink.submit(&record).await;

    let mut session = shared.lock();
    session.submitting = false;
    if outcome.is_accepted() {
        session.ledger.add(&payload, accepted_at);
    }

    if session.generation != generation {
        log::info!("[{}] Submission finished after stop: {:?}", shared.id, outcome);
        shared.publish(&session);
        return;
    }

    match outcome {
        SubmitOutcome::Accepted => {
            log::info!("[{}] Record for team {:?} dispatched", shared.id, record.team_name);
            session.last_success = Some(payload);
            session.last_error = None;
        }
        SubmitOutcome::Failed(e) => {
            session.last_error = Some(ScanError::SubmissionFailed(e));
        }
    }
    session.state = ScanState::CameraActive;
    shared.publish(&session);
}
