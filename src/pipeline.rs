//! Pipeline orchestration
//!
//! This module provides the public API for Synheart Face. It drives a capture
//! session from frames to a stored record:
//!
//! 1. FrameSource - delivers timestamped frames
//! 2. FaceClassifier - scores each sampled frame
//! 3. CaptureStateMachine - sequences the protocol stages
//! 4. BiomarkerAggregator - derives the record on the final stage
//! 5. RecordStore - persists the record once
//!
//! Scheduling is single-threaded and cooperative. Each [`CaptureRunner::poll`]
//! runs a sampling tick (gated by the sampling interval) and a countdown tick
//! (gated by the countdown interval). Ticks only enqueue [`SessionEvent`]s; the
//! state machine drains the inbox one event at a time.

use std::collections::VecDeque;

use crate::adapters::{expression_scores, FaceClassifier, FrameSource};
use crate::config::ProtocolConfig;
use crate::error::CaptureError;
use crate::session::{CaptureStateMachine, SessionEvent};
use crate::store::RecordStore;
use crate::types::{BiomarkerRecord, SessionOutcome, Stage, StageChange, Subject, UploadStatus};

/// Strictly increasing millisecond timestamps for the classifier.
///
/// Advances by the rounded elapsed time since the first reading, and by at
/// least 1 ms per call.
#[derive(Debug, Clone, Default)]
pub struct ClassifierClock {
    origin_ms: Option<f64>,
    last: Option<u64>,
}

impl ClassifierClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, at_ms: f64) -> u64 {
        let origin = *self.origin_ms.get_or_insert(at_ms);
        let elapsed = (at_ms - origin).max(0.0).round() as u64;
        let stamp = match self.last {
            Some(last) if elapsed <= last => last + 1,
            _ => elapsed,
        };
        self.last = Some(stamp);
        stamp
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Drives one capture session with a classifier
pub struct CaptureRunner<C: FaceClassifier> {
    machine: CaptureStateMachine,
    classifier: C,
    clock: ClassifierClock,
    inbox: VecDeque<SessionEvent>,
    changes: Vec<StageChange>,
    last_sample_ms: Option<f64>,
    last_countdown_ms: Option<f64>,
    running: bool,
}

impl<C: FaceClassifier> CaptureRunner<C> {
    /// Fails if `config` does not validate
    pub fn new(config: ProtocolConfig, classifier: C) -> Result<Self, CaptureError> {
        Ok(Self {
            machine: CaptureStateMachine::new(config)?,
            classifier,
            clock: ClassifierClock::new(),
            inbox: VecDeque::new(),
            changes: Vec::new(),
            last_sample_ms: None,
            last_countdown_ms: None,
            running: false,
        })
    }

    pub fn machine(&self) -> &CaptureStateMachine {
        &self.machine
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn stage(&self) -> Stage {
        self.machine.stage()
    }

    /// Every stage change so far, including the start
    pub fn changes(&self) -> &[StageChange] {
        &self.changes
    }

    pub fn record(&self) -> Option<&BiomarkerRecord> {
        self.machine.record()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Initialise the classifier and begin the session.
    ///
    /// On any error the session stays in `Setup`.
    pub fn start(&mut self, subject: Subject, now_ms: f64) -> Result<StageChange, CaptureError> {
        if self.machine.stage() != Stage::Setup {
            return Err(CaptureError::SessionInProgress(self.machine.stage()));
        }
        self.classifier.init()?;

        let change = self.machine.start(subject, now_ms)?;
        self.clock.reset();
        self.inbox.clear();
        self.last_sample_ms = None;
        self.last_countdown_ms = None;
        self.running = true;
        self.changes.push(change);
        Ok(change)
    }

    /// Run both ticks for a frame grabbed at `at_ms`. Returns the stage changes
    /// this frame caused.
    pub fn poll(&mut self, at_ms: f64, frame: &C::Frame) -> Vec<StageChange> {
        let first = self.changes.len();

        if self.running && self.sample_due(at_ms) {
            self.last_sample_ms = Some(at_ms);
            let timestamp = self.clock.next(at_ms);
            let epsilon = self.machine.config().symmetry_epsilon;
            let scores = self
                .classifier
                .detect(frame, timestamp)
                .map(|units| expression_scores(&units, epsilon));
            self.inbox.push_back(SessionEvent::Reading { at_ms, scores });
            self.drain();
        }

        if self.running && self.countdown_due(at_ms) {
            if let Some(token) = self.machine.timer_token() {
                self.last_countdown_ms = Some(at_ms);
                self.inbox.push_back(SessionEvent::Countdown { at_ms, token });
                self.drain();
            }
        }

        self.changes[first..].to_vec()
    }

    /// Stop ticking. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.running {
            log::debug!("capture loop stopped in {}", self.machine.stage());
        }
        self.running = false;
        self.inbox.clear();
    }

    /// Abandon the session and return to `Setup`
    pub fn restart(&mut self) {
        self.stop();
        self.machine.restart();
        self.clock.reset();
        self.changes.clear();
    }

    fn sample_due(&self, at_ms: f64) -> bool {
        self.last_sample_ms
            .map_or(true, |last| at_ms - last >= self.machine.config().sample_interval_ms)
    }

    fn countdown_due(&self, at_ms: f64) -> bool {
        self.last_countdown_ms
            .map_or(true, |last| at_ms - last >= self.machine.config().countdown_interval_ms)
    }

    fn drain(&mut self) {
        while let Some(event) = self.inbox.pop_front() {
            if !self.machine.stage().is_active() {
                self.stop();
                return;
            }
            if let Some(change) = self.machine.handle(event) {
                self.changes.push(change);
            }
        }
        if !self.machine.stage().is_active() {
            self.stop();
        }
    }
}

/// Run a complete session from `source` and hand the record to `store`.
///
/// Acquisition, classifier and configuration failures are returned as errors
/// with nothing stored. A store failure is not an error: the record is returned
/// with [`UploadStatus::Failed`].
pub fn run_session<S, C, R>(
    subject: Subject,
    source: &mut S,
    classifier: C,
    store: &mut R,
    config: ProtocolConfig,
) -> Result<SessionOutcome, CaptureError>
where
    S: FrameSource,
    C: FaceClassifier<Frame = S::Frame>,
    R: RecordStore + ?Sized,
{
    config.validate()?;
    source.start()?;

    let result = drive(subject, source, classifier, config);
    source.stop();
    let record = result?;

    let upload = match store.save(&record) {
        Ok(id) => {
            log::info!("record saved as {id}");
            UploadStatus::Saved(id)
        }
        Err(e) => {
            log::warn!("failed to save record: {e}");
            UploadStatus::Failed(e)
        }
    };

    Ok(SessionOutcome { record, upload })
}

fn drive<S, C>(
    subject: Subject,
    source: &mut S,
    classifier: C,
    config: ProtocolConfig,
) -> Result<BiomarkerRecord, CaptureError>
where
    S: FrameSource,
    C: FaceClassifier<Frame = S::Frame>,
{
    let mut runner = CaptureRunner::new(config, classifier)?;

    let first = source
        .next_frame()
        .ok_or(CaptureError::SourceExhausted(Stage::Setup))?;
    runner.start(subject, first.at_ms)?;
    runner.poll(first.at_ms, &first.frame);

    while runner.is_running() {
        let Some(next) = source.next_frame() else {
            break;
        };
        runner.poll(next.at_ms, &next.frame);
    }

    match runner.record() {
        Some(record) => Ok(record.clone()),
        None => Err(CaptureError::SourceExhausted(runner.stage())),
    }
}
