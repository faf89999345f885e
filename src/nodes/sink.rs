use anyhow::{Context, Result};
use log::debug;

use super::{Node, StepResult};
use crate::{
    channels,
    core::time::Clock,
    datatypes::{DownlinkFrame, Timestamped},
    sink::TelemetrySink,
    utils::handoff::Receiver,
};

/// Drains the frame channel into the downstream sink, one frame per step.
/// Frames buffered at shutdown are still delivered before the node stops.
pub struct SinkNode<S> {
    rx_frames: Receiver<Timestamped<DownlinkFrame>>,
    sink: S,
}

impl<S: TelemetrySink> SinkNode<S> {
    pub fn new(rx_frames: Receiver<Timestamped<DownlinkFrame>>, sink: S) -> Self {
        Self { rx_frames, sink }
    }
}

impl<S: TelemetrySink> Node for SinkNode<S> {
    fn step(&mut self, _: &dyn Clock) -> Result<StepResult> {
        match self.rx_frames.recv() {
            Ok(frame) => {
                self.sink
                    .write(&frame)
                    .context("Error writing a frame to the sink")?;
                Ok(StepResult::Continue)
            }
            Err(_) => {
                debug!("Channel '{}' closed, stopping sink", channels::FRAMES);
                Ok(StepResult::Stop)
            }
        }
    }
}
