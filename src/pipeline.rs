use std::io::BufRead;

use anyhow::Result;
use log::info;

use crate::{
    config::Config,
    core::cancel::CancelToken,
    health::probe::HealthProbe,
    nodes::{HealthNode, Node, OdometryNode, SinkNode, SynchronizerNode, ThreadedExecutor},
    protocol::OdometryDecoder,
    sink::TelemetrySink,
    utils::handoff,
};

/// Capacity of the frame channel between the synchronizer and the sink.
/// Larger than a slot so degraded notices do not contend with records.
const FRAME_CHANNEL_CAPACITY: usize = 4;

/// The wired pipeline: odometry reader and health sampler feeding their
/// slots, the synchronizer pairing them, and the sink consumer draining the
/// frame channel. [`Pipeline::run_blocking`] runs all four to completion.
pub struct Pipeline {
    nodes: Vec<(String, Box<dyn Node + Send>)>,
    cancel: CancelToken,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        lines: impl BufRead + Send + 'static,
        probe: impl HealthProbe + Send + 'static,
        sink: impl TelemetrySink + Send + 'static,
        cancel: CancelToken,
    ) -> Self {
        let (tx_odometry, rx_odometry) = handoff::slot();
        let (tx_health, rx_health) = handoff::slot();
        let (tx_frames, rx_frames) = handoff::channel(FRAME_CHANNEL_CAPACITY);

        let odometry = OdometryNode::new(
            OdometryDecoder::new(lines),
            tx_odometry,
            config.odometry.policy,
        );
        let health = HealthNode::new(
            probe,
            tx_health,
            config.health.cadence(),
            config.health.policy,
            cancel.clone(),
        );
        let synchronizer = SynchronizerNode::new(
            rx_odometry,
            rx_health,
            tx_frames,
            config.synchronizer.poll_interval(),
            config.synchronizer.pairing_timeout(),
            cancel.clone(),
        );
        let sink = SinkNode::new(rx_frames, sink);

        let nodes: Vec<(String, Box<dyn Node + Send>)> = vec![
            ("odometry".to_string(), Box::new(odometry)),
            ("health".to_string(), Box::new(health)),
            ("synchronizer".to_string(), Box::new(synchronizer)),
            ("sink".to_string(), Box::new(sink)),
        ];

        Pipeline { nodes, cancel }
    }

    /// Runs the pipeline until a node stops or the token is cancelled.
    /// `teardown` runs after the first node stops, before joining: its job
    /// is to unblock reads that cancellation cannot reach (the odometry
    /// source's pipe).
    pub fn run_blocking(self, teardown: impl FnOnce()) -> Result<()> {
        info!("Starting downlink pipeline ({} nodes)", self.nodes.len());

        let executor = ThreadedExecutor::run(self.nodes, &self.cancel);

        if let Some(name) = executor.wait_first_stop() {
            info!("Node '{name}' stopped first, winding down");
        }
        self.cancel.cancel();
        teardown();

        executor.join()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        datatypes::{DownlinkFrame, Timestamped},
        health::probe::FixedProbe,
        sink::VecSink,
    };

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.health.cadence_ms = 1;
        config.synchronizer.poll_ms = 1;
        config
    }

    #[test]
    fn test_end_to_end() {
        // Three complete cycles. With the default block policy the reader
        // cannot publish record N+1 before the synchronizer consumed record
        // N, so at least two pairings complete before end of file stops the
        // pipeline.
        let input = "Temperature: 21.5 C\n\
                     Pressure: 101325 Pa\n\
                     Altitude: 150.2 m\n\
                     Fix: Yes\n\
                     Altitude: 151.0 m\n\
                     Fix: Yes\n\
                     Altitude: 152.0 m\n\
                     Fix: Yes\n";

        let sink = VecSink::new();
        let pipeline = Pipeline::new(
            &fast_config(),
            Cursor::new(input.to_string()),
            FixedProbe {
                usage: 12.5,
                temp: 48.0,
            },
            sink.clone(),
            CancelToken::new(),
        );

        pipeline.run_blocking(|| ()).unwrap();

        let records: Vec<_> = sink
            .frames()
            .into_iter()
            .filter_map(|Timestamped(_, frame)| match frame {
                DownlinkFrame::Record(record) => Some(record),
                DownlinkFrame::Degraded(_) => None,
            })
            .collect();

        assert!(records.len() >= 2, "expected at least two pairings");
        assert_relative_eq!(records[0].odometry.altitude.altitude_m, 150.2);
        assert_relative_eq!(records[0].odometry.altitude.temperature_degc, 21.5);
        assert!(records[0].odometry.gps.fix);
        assert_relative_eq!(records[0].health.cpu_usage_percent, 12.5);
        assert_relative_eq!(records[1].odometry.altitude.altitude_m, 151.0);
    }

    #[test]
    fn test_health_only_never_pairs() {
        // Immediate end of file on the odometry side: health keeps
        // sampling, but no combined record is ever emitted.
        let sink = VecSink::new();
        let pipeline = Pipeline::new(
            &fast_config(),
            Cursor::new(String::new()),
            FixedProbe {
                usage: 1.0,
                temp: 1.0,
            },
            sink.clone(),
            CancelToken::new(),
        );

        pipeline.run_blocking(|| ()).unwrap();

        assert!(
            sink.frames()
                .iter()
                .all(|Timestamped(_, frame)| !matches!(frame, DownlinkFrame::Record(_)))
        );
    }
}
