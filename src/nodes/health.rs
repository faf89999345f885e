use anyhow::Result;
use chrono::TimeDelta;

use super::{Node, StepResult, publish};
use crate::{
    channels,
    config::SlotPolicy,
    core::{
        cancel::CancelToken,
        time::{Clock, Timestamp},
    },
    datatypes::{HealthSample, Timestamped},
    health::probe::HealthProbe,
    utils::handoff::Sender,
};

/// Samples host health metrics on a fixed cadence and publishes them into
/// the health slot. Tied to process lifetime: runs until cancelled or the
/// synchronizer is gone.
pub struct HealthNode<P> {
    probe: P,
    tx_health: Sender<Timestamped<HealthSample>>,
    cadence: TimeDelta,
    policy: SlotPolicy,
    cancel: CancelToken,
}

impl<P: HealthProbe> HealthNode<P> {
    pub fn new(
        probe: P,
        tx_health: Sender<Timestamped<HealthSample>>,
        cadence: TimeDelta,
        policy: SlotPolicy,
        cancel: CancelToken,
    ) -> Self {
        Self {
            probe,
            tx_health,
            cadence,
            policy,
            cancel,
        }
    }
}

impl<P: HealthProbe> Node for HealthNode<P> {
    fn step(&mut self, clock: &dyn Clock) -> Result<StepResult> {
        let sample = HealthSample {
            cpu_usage_percent: self.probe.cpu_usage_percent(),
            cpu_temp_degc: self.probe.cpu_temp_degc(),
        };

        if let StepResult::Stop = publish(
            &self.tx_health,
            Timestamped(Timestamp::now(clock), sample),
            self.policy,
            channels::HEALTH,
        ) {
            return Ok(StepResult::Stop);
        }

        if !self.cancel.sleep_for(self.cadence) {
            return Ok(StepResult::Stop);
        }

        Ok(StepResult::Continue)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{core::time::SystemClock, health::probe::FixedProbe, utils::handoff};

    fn node(
        policy: SlotPolicy,
    ) -> (
        HealthNode<FixedProbe>,
        handoff::Receiver<Timestamped<HealthSample>>,
    ) {
        let (tx, rx) = handoff::slot();
        let probe = FixedProbe {
            usage: 12.5,
            temp: 48.0,
        };

        (
            HealthNode::new(probe, tx, TimeDelta::zero(), policy, CancelToken::new()),
            rx,
        )
    }

    #[test]
    fn test_publishes_each_tick() {
        let (mut node, rx) = node(SlotPolicy::Block);
        let clock = SystemClock;

        assert!(matches!(node.step(&clock).unwrap(), StepResult::Continue));

        let Timestamped(_, sample) = rx.recv().unwrap();
        assert_relative_eq!(sample.cpu_usage_percent, 12.5);
        assert_relative_eq!(sample.cpu_temp_degc, 48.0);

        assert!(matches!(node.step(&clock).unwrap(), StepResult::Continue));
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_latest_policy_replaces_with_accounting() {
        let (mut node, rx) = node(SlotPolicy::Latest);
        let clock = SystemClock;

        node.step(&clock).unwrap();
        node.step(&clock).unwrap();
        node.step(&clock).unwrap();

        assert_eq!(rx.len(), 1);
        assert_eq!(rx.num_lagged(), 2);
    }

    #[test]
    fn test_stops_when_cancelled() {
        let (mut node, _rx) = node(SlotPolicy::Latest);
        node.cancel.cancel();

        assert!(matches!(
            node.step(&SystemClock).unwrap(),
            StepResult::Stop
        ));
    }

    #[test]
    fn test_stops_when_consumer_gone() {
        let (mut node, rx) = node(SlotPolicy::Block);
        drop(rx);

        assert!(matches!(
            node.step(&SystemClock).unwrap(),
            StepResult::Stop
        ));
    }
}
