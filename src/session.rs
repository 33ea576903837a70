//! Capture state machine
//!
//! The state machine owns every piece of mutable session state and is the only
//! thing that changes it. Sampling and countdown ticks do not touch state
//! directly; they emit [`SessionEvent`]s which [`CaptureStateMachine::handle`]
//! arbitrates one at a time.
//!
//! Stage order is fixed:
//!
//! ```text
//! Setup → Baseline → ResetSmile → Smile → ResetFrown → Frown → Result
//! ```
//!
//! Stages only move forward. Returning to `Setup` is a full restart that
//! reinitialises the whole session.

use crate::aggregator::{BiomarkerAggregator, SessionSamples};
use crate::blink::BlinkCounter;
use crate::buffer::SampleBuffer;
use crate::config::ProtocolConfig;
use crate::error::CaptureError;
use crate::gate::ResetGate;
use crate::timer::{Countdown, TaskTimer, TimerToken};
use crate::types::{
    BiomarkerRecord, Channel, ExpressionScores, GateVerdict, Sample, Stage, StageChange, Subject,
    TransitionCause,
};

/// Input to the transition arbiter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    /// A sampling tick; `scores` is `None` when no face was detected
    Reading {
        at_ms: f64,
        scores: Option<ExpressionScores>,
    },
    /// A countdown tick for the timer identified by `token`
    Countdown { at_ms: f64, token: TimerToken },
}

/// All mutable state of one session
#[derive(Debug, Clone)]
pub struct SessionState {
    stage: Stage,
    subject: Option<Subject>,
    baseline: SampleBuffer,
    smile: SampleBuffer,
    frown: SampleBuffer,
    blinks: BlinkCounter,
    smile_task_started_at_ms: Option<f64>,
    frown_task_started_at_ms: Option<f64>,
    gate: Option<ResetGate>,
    timer: Option<TaskTimer>,
}

impl SessionState {
    fn new(config: &ProtocolConfig) -> Self {
        Self {
            stage: Stage::Setup,
            subject: None,
            baseline: SampleBuffer::new(Stage::Baseline),
            smile: SampleBuffer::new(Stage::Smile),
            frown: SampleBuffer::new(Stage::Frown),
            blinks: BlinkCounter::new(config),
            smile_task_started_at_ms: None,
            frown_task_started_at_ms: None,
            gate: None,
            timer: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    pub fn baseline_samples(&self) -> &[Sample] {
        self.baseline.all()
    }

    pub fn smile_samples(&self) -> &[Sample] {
        self.smile.all()
    }

    pub fn frown_samples(&self) -> &[Sample] {
        self.frown.all()
    }

    pub fn blink_count(&self) -> u32 {
        self.blinks.count()
    }

    pub fn blink_event_times_ms(&self) -> &[f64] {
        self.blinks.event_times_ms()
    }

    pub fn smile_task_started_at_ms(&self) -> Option<f64> {
        self.smile_task_started_at_ms
    }

    pub fn frown_task_started_at_ms(&self) -> Option<f64> {
        self.frown_task_started_at_ms
    }

    /// Reset gate of the current reset stage
    pub fn gate(&self) -> Option<&ResetGate> {
        self.gate.as_ref()
    }

    /// Task timer of the current timed stage
    pub fn timer(&self) -> Option<&TaskTimer> {
        self.timer.as_ref()
    }

    fn samples(&self) -> SessionSamples<'_> {
        SessionSamples {
            baseline: self.baseline.all(),
            smile: self.smile.all(),
            frown: self.frown.all(),
            smile_started_at_ms: self.smile_task_started_at_ms.unwrap_or(0.0),
            frown_started_at_ms: self.frown_task_started_at_ms.unwrap_or(0.0),
            blink_count: self.blinks.count(),
        }
    }
}

/// Guided capture protocol
#[derive(Debug, Clone)]
pub struct CaptureStateMachine {
    config: ProtocolConfig,
    state: SessionState,
    record: Option<BiomarkerRecord>,
    next_token: u64,
}

impl Default for CaptureStateMachine {
    fn default() -> Self {
        Self::with_valid_config(ProtocolConfig::default())
    }
}

impl CaptureStateMachine {
    /// Create a machine in `Setup`. Fails if `config` does not validate.
    pub fn new(config: ProtocolConfig) -> Result<Self, CaptureError> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: ProtocolConfig) -> Self {
        Self {
            state: SessionState::new(&config),
            config,
            record: None,
            next_token: 0,
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn stage(&self) -> Stage {
        self.state.stage
    }

    /// The record computed on entering `Result`
    pub fn record(&self) -> Option<&BiomarkerRecord> {
        self.record.as_ref()
    }

    /// Token of the currently running task timer
    pub fn timer_token(&self) -> Option<TimerToken> {
        self.state.timer.as_ref().map(TaskTimer::token)
    }

    /// Countdown of the currently running task timer, for progress display
    pub fn countdown(&self, now_ms: f64) -> Option<Countdown> {
        self.state.timer.as_ref().map(|t| t.countdown(now_ms))
    }

    /// Begin a session: `Setup → Baseline`.
    ///
    /// Only valid in `Setup`; the subject must already be validated.
    pub fn start(&mut self, subject: Subject, now_ms: f64) -> Result<StageChange, CaptureError> {
        if self.state.stage != Stage::Setup {
            return Err(CaptureError::SessionInProgress(self.state.stage));
        }
        log::info!("starting capture session for subject aged {}", subject.age);

        self.state.subject = Some(subject);
        self.state.baseline.clear();
        self.state.timer = Some(self.new_timer(now_ms));
        Ok(self.transition(Stage::Baseline, TransitionCause::Started, now_ms))
    }

    /// Abandon the session and return to `Setup` with every field reinitialised
    pub fn restart(&mut self) {
        if self.state.stage != Stage::Setup {
            log::info!("session restarted from {}", self.state.stage);
        }
        self.state = SessionState::new(&self.config);
        self.record = None;
    }

    /// Arbitrate one event. Returns the stage change it caused, if any.
    pub fn handle(&mut self, event: SessionEvent) -> Option<StageChange> {
        match event {
            SessionEvent::Reading { at_ms, scores } => self.on_reading(at_ms, scores),
            SessionEvent::Countdown { at_ms, token } => self.on_countdown(at_ms, token),
        }
    }

    fn on_reading(&mut self, at_ms: f64, scores: Option<ExpressionScores>) -> Option<StageChange> {
        let stage = self.state.stage;

        if let Some(channel) = stage.reset_channel() {
            return self.on_reset_reading(channel, at_ms, scores);
        }

        let Some(scores) = scores else {
            log::trace!("no face detected at {at_ms:.0} ms during {stage}");
            return None;
        };

        let state = &mut self.state;
        match stage {
            Stage::Baseline => {
                state
                    .baseline
                    .append(stage, Sample::with_secondary(scores.smile, scores.frown, at_ms));
            }
            Stage::Smile => {
                state
                    .smile
                    .append(stage, Sample::with_secondary(scores.smile, scores.symmetry, at_ms));
                state.blinks.observe(scores.blink, at_ms);
            }
            Stage::Frown => {
                state.frown.append(stage, Sample::new(scores.frown, at_ms));
                state.blinks.observe(scores.blink, at_ms);
            }
            _ => {}
        }
        None
    }

    fn on_reset_reading(
        &mut self,
        channel: Channel,
        at_ms: f64,
        scores: Option<ExpressionScores>,
    ) -> Option<StageChange> {
        let gate = self.state.gate.get_or_insert_with(|| {
            log::warn!("reset stage without a gate; opening one at {at_ms:.0} ms");
            ResetGate::new(channel, at_ms, &self.config)
        });

        let verdict = match scores {
            Some(scores) => gate.observe(channel.score(&scores), at_ms),
            None => gate.check_timeout(at_ms),
        };

        let cause = match verdict {
            GateVerdict::StillWaiting => return None,
            GateVerdict::RelaxedAndStable => TransitionCause::GateRelaxed,
            GateVerdict::TimedOut => TransitionCause::GateTimedOut,
        };

        let task = match channel {
            Channel::Smile => Stage::Smile,
            Channel::Frown => Stage::Frown,
        };
        Some(self.enter_task(task, cause, at_ms))
    }

    fn on_countdown(&mut self, at_ms: f64, token: TimerToken) -> Option<StageChange> {
        let timer = self.state.timer.as_mut()?;
        if timer.token() != token {
            log::trace!("ignoring stale countdown for timer {:?}", token);
            return None;
        }
        if !timer.poll(at_ms) {
            return None;
        }

        match self.state.stage {
            Stage::Baseline => Some(self.enter_reset(Channel::Smile, at_ms)),
            Stage::Smile => Some(self.enter_reset(Channel::Frown, at_ms)),
            Stage::Frown => Some(self.finish(at_ms)),
            stage => {
                log::warn!("timer fired in untimed stage {stage}");
                self.state.timer = None;
                None
            }
        }
    }

    fn enter_reset(&mut self, channel: Channel, at_ms: f64) -> StageChange {
        let next = match channel {
            Channel::Smile => Stage::ResetSmile,
            Channel::Frown => Stage::ResetFrown,
        };
        self.state.gate = Some(ResetGate::new(channel, at_ms, &self.config));
        self.transition(next, TransitionCause::TimerElapsed, at_ms)
    }

    fn enter_task(&mut self, task: Stage, cause: TransitionCause, at_ms: f64) -> StageChange {
        let timer = self.new_timer(at_ms);
        let state = &mut self.state;
        match task {
            Stage::Smile => {
                state.smile.clear();
                state.smile_task_started_at_ms = Some(at_ms);
            }
            Stage::Frown => {
                state.frown.clear();
                state.frown_task_started_at_ms = Some(at_ms);
            }
            _ => {}
        }
        let change = self.transition(task, cause, at_ms);
        self.state.timer = Some(timer);
        change
    }

    fn finish(&mut self, at_ms: f64) -> StageChange {
        let change = self.transition(Stage::Result, TransitionCause::TimerElapsed, at_ms);

        match self.state.subject.clone() {
            Some(subject) => {
                let record =
                    BiomarkerAggregator::aggregate(subject, &self.state.samples(), &self.config);
                log::info!(
                    "session complete: {} ({} flag(s))",
                    record.summary,
                    record.flags.len()
                );
                self.record = Some(record);
            }
            None => log::error!("reached result without a subject; no record produced"),
        }

        change
    }

    /// Move to `to`, cancelling whatever timer or gate belonged to the stage being left
    fn transition(&mut self, to: Stage, cause: TransitionCause, at_ms: f64) -> StageChange {
        let from = self.state.stage;
        debug_assert!(to > from, "stage must move forward: {from} → {to}");

        if from.is_timed() {
            self.state.timer = None;
        }
        if from.reset_channel().is_some() {
            self.state.gate = None;
        }
        self.state.stage = to;

        log::info!("stage {from} → {to} ({cause:?}) at {at_ms:.0} ms");
        StageChange {
            from,
            to,
            cause,
            at_ms,
        }
    }

    fn new_timer(&mut self, at_ms: f64) -> TaskTimer {
        self.next_token += 1;
        TaskTimer::start(
            TimerToken(self.next_token),
            at_ms,
            self.config.task_duration_ms,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scores(smile: f64, frown: f64, blink: f64, symmetry: f64) -> Option<ExpressionScores> {
        Some(ExpressionScores {
            smile,
            frown,
            blink,
            symmetry,
        })
    }

    fn reading(at_ms: f64, scores: Option<ExpressionScores>) -> SessionEvent {
        SessionEvent::Reading { at_ms, scores }
    }

    fn tick_timer(machine: &mut CaptureStateMachine, at_ms: f64) -> Option<StageChange> {
        let token = machine.timer_token()?;
        machine.handle(SessionEvent::Countdown { at_ms, token })
    }

    fn started() -> CaptureStateMachine {
        let mut machine = CaptureStateMachine::default();
        machine
            .start(Subject::new("Ada", 36).unwrap(), 0.0)
            .unwrap();
        machine
    }

    #[test]
    fn test_start_only_from_setup() {
        let mut machine = started();
        assert_eq!(machine.stage(), Stage::Baseline);
        let err = machine.start(Subject::new("Bob", 40).unwrap(), 10.0).unwrap_err();
        assert!(matches!(err, CaptureError::SessionInProgress(Stage::Baseline)));
        assert_eq!(machine.state().subject().unwrap().name, "Ada");
    }

    #[test]
    fn test_baseline_sampling_and_timer() {
        let mut machine = started();

        machine.handle(reading(33.0, scores(0.1, 0.2, 0.0, 1.0)));
        machine.handle(reading(66.0, None));
        machine.handle(reading(99.0, scores(0.15, 0.2, 0.0, 1.0)));

        let baseline = machine.state().baseline_samples();
        assert_eq!(baseline.len(), 2);
        assert_eq!(baseline[0], Sample::with_secondary(0.1, 0.2, 33.0));

        assert_eq!(tick_timer(&mut machine, 4900.0), None);
        let change = tick_timer(&mut machine, 5000.0).unwrap();
        assert_eq!(
            change,
            StageChange {
                from: Stage::Baseline,
                to: Stage::ResetSmile,
                cause: TransitionCause::TimerElapsed,
                at_ms: 5000.0,
            }
        );
        assert!(machine.timer_token().is_none());
        assert!(machine.state().gate().is_some());

        // Baseline samples are retained, and no longer appended to
        machine.handle(reading(5033.0, scores(0.1, 0.1, 0.0, 1.0)));
        assert_eq!(machine.state().baseline_samples().len(), 2);
    }

    #[test]
    fn test_reset_gate_relaxed_starts_smile_task() {
        let mut machine = started();
        tick_timer(&mut machine, 5000.0);

        assert_eq!(machine.handle(reading(5033.0, scores(0.6, 0.0, 0.0, 1.0))), None);
        assert_eq!(machine.handle(reading(5066.0, scores(0.1, 0.0, 0.0, 1.0))), None);
        assert_eq!(machine.handle(reading(5500.0, scores(0.4, 0.0, 0.0, 1.0))), None);
        assert_eq!(machine.handle(reading(5533.0, scores(0.1, 0.0, 0.0, 1.0))), None);
        let change = machine
            .handle(reading(6533.0, scores(0.1, 0.0, 0.0, 1.0)))
            .unwrap();

        assert_eq!(change.to, Stage::Smile);
        assert_eq!(change.cause, TransitionCause::GateRelaxed);
        assert_eq!(machine.state().smile_task_started_at_ms(), Some(6533.0));
        assert!(machine.state().smile_samples().is_empty());
        assert!(machine.state().gate().is_none());
        assert!(machine.timer_token().is_some());
    }

    #[test]
    fn test_reset_gate_timeout_forces_progress() {
        let mut machine = started();
        tick_timer(&mut machine, 5000.0);

        let mut t = 5000.0;
        let mut change = None;
        while change.is_none() {
            t += 33.0;
            change = machine.handle(reading(t, scores(0.9, 0.0, 0.0, 1.0)));
        }
        let change = change.unwrap();
        assert_eq!(change.cause, TransitionCause::GateTimedOut);
        assert_eq!(change.to, Stage::Smile);
        assert!(change.at_ms >= 9000.0);
    }

    #[test]
    fn test_missed_detections_still_time_out_reset() {
        let mut machine = started();
        tick_timer(&mut machine, 5000.0);
        assert_eq!(machine.handle(reading(6000.0, None)), None);
        let change = machine.handle(reading(9000.0, None)).unwrap();
        assert_eq!(change.cause, TransitionCause::GateTimedOut);
    }

    #[test]
    fn test_stale_countdown_is_ignored() {
        let mut machine = started();
        let baseline_token = machine.timer_token().unwrap();
        tick_timer(&mut machine, 5000.0);

        // Gate times out and the smile task starts with a fresh timer
        machine.handle(reading(9000.0, scores(0.9, 0.0, 0.0, 1.0)));
        assert_eq!(machine.stage(), Stage::Smile);
        let smile_token = machine.timer_token().unwrap();
        assert_ne!(smile_token, baseline_token);

        // A completion queued for the baseline timer must not end the smile task
        let stale = SessionEvent::Countdown {
            at_ms: 20_000.0,
            token: baseline_token,
        };
        assert_eq!(machine.handle(stale), None);
        assert_eq!(machine.stage(), Stage::Smile);
    }

    #[test]
    fn test_full_session_produces_record() {
        let mut machine = started();
        let mut changes = Vec::new();

        // Baseline: perfectly still face
        for i in 1..=150 {
            machine.handle(reading(i as f64 * 33.0, scores(0.1, 0.1, 0.0, 1.0)));
        }
        changes.extend(tick_timer(&mut machine, 5000.0));

        // Reset smile: relaxed for a second
        changes.extend(machine.handle(reading(5033.0, scores(0.05, 0.0, 0.0, 1.0))));
        changes.extend(machine.handle(reading(6033.0, scores(0.05, 0.0, 0.0, 1.0))));
        assert_eq!(machine.stage(), Stage::Smile);

        // Smile ramp: task started at 6033
        let ramp = [(6133.0, 0.1), (6233.0, 0.3), (6333.0, 0.5), (6433.0, 0.9), (6533.0, 0.9)];
        for (t, v) in ramp {
            machine.handle(reading(t, scores(v, 0.0, 0.0, 0.95)));
        }
        // Blinks at 7000 (counted), 7100 (suppressed), 7250 (counted)
        machine.handle(reading(7000.0, scores(0.9, 0.0, 0.6, 0.95)));
        machine.handle(reading(7100.0, scores(0.9, 0.0, 0.7, 0.95)));
        machine.handle(reading(7250.0, scores(0.9, 0.0, 0.6, 0.95)));
        changes.extend(tick_timer(&mut machine, 11_033.0));
        assert_eq!(machine.stage(), Stage::ResetFrown);

        // Reset frown: times out
        changes.extend(machine.handle(reading(15_033.0, scores(0.0, 0.5, 0.0, 1.0))));
        assert_eq!(machine.stage(), Stage::Frown);

        // Frown ramp: task started at 15033
        for (t, v) in [(15_133.0, 0.2), (15_233.0, 0.7), (20_000.0, 0.6)] {
            machine.handle(reading(t, scores(0.0, v, 0.0, 1.0)));
        }
        changes.extend(tick_timer(&mut machine, 20_033.0));
        assert_eq!(machine.stage(), Stage::Result);

        let stages: Vec<(Stage, TransitionCause)> =
            changes.iter().map(|c| (c.to, c.cause)).collect();
        assert_eq!(
            stages,
            vec![
                (Stage::ResetSmile, TransitionCause::TimerElapsed),
                (Stage::Smile, TransitionCause::GateRelaxed),
                (Stage::ResetFrown, TransitionCause::TimerElapsed),
                (Stage::Frown, TransitionCause::GateTimedOut),
                (Stage::Result, TransitionCause::TimerElapsed),
            ]
        );

        let record = machine.record().unwrap();
        assert!(record.biomarkers.baseline_stability.abs() < 1e-12);
        assert_eq!(record.biomarkers.smile_metrics.peak_intensity, 0.9);
        // 50% of 0.9 = 0.45 → first reached at 6333
        assert_eq!(record.biomarkers.smile_metrics.latency_ms, 300);
        assert_eq!(record.biomarkers.frown_metrics.peak_intensity, 0.7);
        assert_eq!(record.biomarkers.frown_metrics.latency_ms, 200);
        assert_eq!(machine.state().blink_count(), 2);
        // 2 blinks over the 20 s duration base
        assert!((record.biomarkers.blink_rate - 6.0).abs() < 1e-9);
        assert_eq!(record.summary, crate::types::Summary::Normal);

        // Result is terminal: further events change nothing
        assert_eq!(machine.handle(reading(20_100.0, scores(0.9, 0.9, 0.9, 1.0))), None);
        assert_eq!(machine.state().frown_samples().len(), 3);
    }

    #[test]
    fn test_blinks_only_counted_during_tasks() {
        let mut machine = started();

        machine.handle(reading(100.0, scores(0.1, 0.1, 0.9, 1.0)));
        machine.handle(reading(400.0, scores(0.1, 0.1, 0.9, 1.0)));
        assert_eq!(machine.state().blink_count(), 0);

        tick_timer(&mut machine, 5000.0);
        assert_eq!(machine.stage(), Stage::ResetSmile);
        machine.handle(reading(5100.0, scores(0.1, 0.1, 0.9, 1.0)));
        machine.handle(reading(5400.0, scores(0.1, 0.1, 0.9, 1.0)));
        assert_eq!(machine.state().blink_count(), 0);

        // The same reading is counted once the smile task is running
        machine.handle(reading(6400.0, scores(0.1, 0.1, 0.9, 1.0)));
        assert_eq!(machine.stage(), Stage::Smile);
        machine.handle(reading(6500.0, scores(0.1, 0.1, 0.9, 1.0)));
        assert_eq!(machine.state().blink_count(), 1);
        assert_eq!(machine.state().blink_event_times_ms(), &[6500.0]);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ProtocolConfig {
            task_duration_ms: f64::NAN,
            ..ProtocolConfig::default()
        };
        assert!(matches!(
            CaptureStateMachine::new(config),
            Err(CaptureError::InvalidConfig(_))
        ));
        assert!(CaptureStateMachine::new(ProtocolConfig::default()).is_ok());
    }

    #[test]
    fn test_restart_reinitializes_everything() {
        let mut machine = started();
        machine.handle(reading(33.0, scores(0.1, 0.1, 0.0, 1.0)));
        let old_token = machine.timer_token().unwrap();

        machine.restart();
        assert_eq!(machine.stage(), Stage::Setup);
        assert!(machine.state().subject().is_none());
        assert!(machine.state().baseline_samples().is_empty());
        assert_eq!(machine.state().blink_count(), 0);
        assert!(machine.timer_token().is_none());
        assert!(machine.record().is_none());

        // Ticks from the abandoned session have no effect
        assert_eq!(machine.handle(reading(66.0, scores(0.1, 0.1, 0.0, 1.0))), None);
        let stale = SessionEvent::Countdown {
            at_ms: 9000.0,
            token: old_token,
        };
        assert_eq!(machine.handle(stale), None);
        assert!(machine.state().baseline_samples().is_empty());

        machine.start(Subject::new("Bob", 52).unwrap(), 100.0).unwrap();
        assert_ne!(machine.timer_token(), Some(old_token));
    }
}
