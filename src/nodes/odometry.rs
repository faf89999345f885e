use std::io::BufRead;

use anyhow::{Context, Result};

use super::{Node, StepResult, publish};
use crate::{
    channels,
    config::SlotPolicy,
    core::time::{Clock, Timestamp},
    datatypes::{OdometryRecord, Timestamped},
    protocol::OdometryDecoder,
    utils::handoff::Sender,
};

/// Runs the protocol decoder over the odometry line source and publishes
/// each completed record into the odometry slot. Stops when the source
/// reaches end of file or the synchronizer is gone.
pub struct OdometryNode<R> {
    decoder: OdometryDecoder<R>,
    tx_odometry: Sender<Timestamped<OdometryRecord>>,
    policy: SlotPolicy,
}

impl<R: BufRead> OdometryNode<R> {
    pub fn new(
        decoder: OdometryDecoder<R>,
        tx_odometry: Sender<Timestamped<OdometryRecord>>,
        policy: SlotPolicy,
    ) -> Self {
        Self {
            decoder,
            tx_odometry,
            policy,
        }
    }
}

impl<R: BufRead> Node for OdometryNode<R> {
    fn step(&mut self, clock: &dyn Clock) -> Result<StepResult> {
        match self.decoder.next() {
            Some(Ok(record)) => Ok(publish(
                &self.tx_odometry,
                Timestamped(Timestamp::now(clock), record),
                self.policy,
                channels::ODOMETRY,
            )),
            Some(Err(e)) => Err(e).context("Error reading the odometry stream"),
            None => Ok(StepResult::Stop),
        }
    }
}
