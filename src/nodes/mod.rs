mod executor;
mod health;
mod odometry;
mod sink;
mod synchronizer;

pub use executor::*;
pub use health::*;
pub use odometry::*;
pub use sink::*;
pub use synchronizer::*;

use log::debug;

use crate::{
    config::SlotPolicy,
    core::time::Clock,
    utils::handoff::{ChannelError, Sender},
};

pub enum StepResult {
    Continue,
    Stop,
}

/// One pipeline worker. The executor drives `step` in a loop on a dedicated
/// thread; each step runs one unit of work, suspending inside as needed.
pub trait Node {
    fn step(&mut self, clock: &dyn Clock) -> anyhow::Result<StepResult>;
}

/// Publishes a value into a slot under the configured policy. A closed
/// channel means the consumer is gone, which stops the producer.
fn publish<T>(tx: &Sender<T>, value: T, policy: SlotPolicy, channel: &str) -> StepResult {
    let result = match policy {
        SlotPolicy::Block => tx.send(value).map(|()| None),
        SlotPolicy::Latest => tx.send_latest(value),
    };

    match result {
        Ok(None) => StepResult::Continue,
        Ok(Some(_)) => {
            debug!("Replaced unconsumed value on '{channel}'");
            StepResult::Continue
        }
        Err(ChannelError::Closed | ChannelError::Empty) => {
            debug!("Channel '{channel}' closed, stopping producer");
            StepResult::Stop
        }
    }
}
