use anyhow::Result;
use chrono::TimeDelta;
use log::{debug, info, warn};
use thiserror::Error;

use super::{Node, StepResult};
use crate::{
    channels,
    core::{
        cancel::CancelToken,
        time::{Clock, Instant, Timestamp},
    },
    datatypes::{
        CombinedRecord, DegradedNotice, DownlinkFrame, HealthSample, OdometryRecord,
        TelemetrySource, Timestamped,
    },
    utils::handoff::{Receiver, Sender},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PairingError {
    #[error("no {} data for {silent_ms} ms", .source.as_ref())]
    Timeout {
        r#source: TelemetrySource,
        silent_ms: i64,
    },

    #[error("{} source closed after {silent_ms} ms of silence", .source.as_ref())]
    SourceClosed {
        r#source: TelemetrySource,
        silent_ms: i64,
    },
}

impl PairingError {
    fn to_notice(&self) -> DegradedNotice {
        match *self {
            PairingError::Timeout { source, silent_ms } => DegradedNotice {
                source,
                silent_ms,
                closed: false,
            },
            PairingError::SourceClosed { source, silent_ms } => DegradedNotice {
                source,
                silent_ms,
                closed: true,
            },
        }
    }
}

/// Pairs one odometry record with one health sample into a combined frame,
/// exactly once per pairing.
///
/// Each poll cycle the node checks both slots and drains them only when
/// both are occupied, so a value is never taken and left unmatched. The
/// synchronizer is the sole consumer of either slot, which makes the
/// occupancy check race-free. A source that is silent past the pairing
/// timeout produces degraded frames at timeout cadence; a closed source
/// produces a final degraded frame and stops the node.
pub struct SynchronizerNode {
    rx_odometry: Receiver<Timestamped<OdometryRecord>>,
    rx_health: Receiver<Timestamped<HealthSample>>,
    tx_frames: Sender<Timestamped<DownlinkFrame>>,
    poll_interval: TimeDelta,
    pairing_timeout: TimeDelta,
    cancel: CancelToken,
    odometry: SourceState,
    health: SourceState,
    reported_lag: usize,
}

impl SynchronizerNode {
    pub fn new(
        rx_odometry: Receiver<Timestamped<OdometryRecord>>,
        rx_health: Receiver<Timestamped<HealthSample>>,
        tx_frames: Sender<Timestamped<DownlinkFrame>>,
        poll_interval: TimeDelta,
        pairing_timeout: TimeDelta,
        cancel: CancelToken,
    ) -> Self {
        Self {
            rx_odometry,
            rx_health,
            tx_frames,
            poll_interval,
            pairing_timeout,
            cancel,
            odometry: SourceState::new(TelemetrySource::Odometry),
            health: SourceState::new(TelemetrySource::Health),
            reported_lag: 0,
        }
    }

    fn report_lag(&mut self) {
        let lagged = self.rx_odometry.num_lagged() + self.rx_health.num_lagged();
        if lagged > self.reported_lag {
            info!(
                "{} samples replaced before consumption since start",
                lagged
            );
            self.reported_lag = lagged;
        }
    }
}

impl Node for SynchronizerNode {
    fn step(&mut self, clock: &dyn Clock) -> Result<StepResult> {
        let now = clock.monotonic();
        let odometry = self.odometry.observe(&self.rx_odometry, now);
        let health = self.health.observe(&self.rx_health, now);

        if odometry == SourceStatus::Ready && health == SourceStatus::Ready {
            // Both slots occupied: drain both, pair, forward.
            let Timestamped(_, odometry) = self.rx_odometry.try_recv()?;
            let Timestamped(_, health) = self.rx_health.try_recv()?;

            let frame = DownlinkFrame::Record(CombinedRecord { health, odometry });
            if let StepResult::Stop = emit(&self.tx_frames, clock, frame) {
                return Ok(StepResult::Stop);
            }
        } else {
            for (state, status) in [(&mut self.odometry, odometry), (&mut self.health, health)] {
                match status {
                    SourceStatus::Ready => {}
                    SourceStatus::Silent => {
                        if let Some(e) = state.check_timeout(now, self.pairing_timeout) {
                            warn!("Downlink degraded: {e}");
                            let frame = DownlinkFrame::Degraded(e.to_notice());
                            if let StepResult::Stop = emit(&self.tx_frames, clock, frame) {
                                return Ok(StepResult::Stop);
                            }
                        }
                    }
                    SourceStatus::Closed => {
                        let e = state.closed_error(now);
                        warn!("Downlink degraded: {e}");
                        emit(&self.tx_frames, clock, DownlinkFrame::Degraded(e.to_notice()));
                        return Ok(StepResult::Stop);
                    }
                }
            }
        }

        self.report_lag();

        if !self.cancel.sleep_for(self.poll_interval) {
            return Ok(StepResult::Stop);
        }

        Ok(StepResult::Continue)
    }
}

fn emit(
    tx_frames: &Sender<Timestamped<DownlinkFrame>>,
    clock: &dyn Clock,
    frame: DownlinkFrame,
) -> StepResult {
    match tx_frames.send(Timestamped(Timestamp::now(clock), frame)) {
        Ok(()) => StepResult::Continue,
        Err(_) => {
            debug!("Channel '{}' closed, stopping", channels::FRAMES);
            StepResult::Stop
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceStatus {
    /// The slot holds an unconsumed value.
    Ready,
    /// The slot is empty but the producer is still alive.
    Silent,
    /// The producer is gone and the slot is drained.
    Closed,
}

#[derive(Debug)]
struct SourceState {
    source: TelemetrySource,
    last_seen: Option<Instant>,
    last_notice: Option<Instant>,
}

impl SourceState {
    fn new(source: TelemetrySource) -> Self {
        Self {
            source,
            last_seen: None,
            last_notice: None,
        }
    }

    /// Classifies the slot this poll cycle. Liveness is judged on slot
    /// occupancy: a waiting value proves the source alive even while the
    /// other source holds up the pairing.
    fn observe<T>(&mut self, rx: &Receiver<T>, now: Instant) -> SourceStatus {
        if !rx.is_empty() {
            self.last_seen = Some(now);
            self.last_notice = None;
            SourceStatus::Ready
        } else if rx.is_closed() {
            SourceStatus::Closed
        } else {
            // Grace period starts on the first poll, not at source start.
            self.last_seen.get_or_insert(now);
            SourceStatus::Silent
        }
    }

    fn silence(&self, now: Instant) -> TimeDelta {
        self.last_seen
            .map(|seen| now.duration_since(&seen))
            .unwrap_or(TimeDelta::zero())
    }

    fn check_timeout(&mut self, now: Instant, timeout: TimeDelta) -> Option<PairingError> {
        let silence = self.silence(now);
        let due_again = self
            .last_notice
            .is_none_or(|notice| now.duration_since(&notice) >= timeout);

        if silence >= timeout && due_again {
            self.last_notice = Some(now);
            Some(PairingError::Timeout {
                source: self.source,
                silent_ms: silence.num_milliseconds(),
            })
        } else {
            None
        }
    }

    fn closed_error(&self, now: Instant) -> PairingError {
        PairingError::SourceClosed {
            source: self.source,
            silent_ms: self.silence(now).num_milliseconds(),
        }
    }
}
