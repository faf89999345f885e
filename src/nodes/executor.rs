use std::{
    sync::mpsc::{Receiver, channel},
    thread::{self, JoinHandle},
};

use anyhow::{Context, Result};
use log::{debug, error, info};

use super::{Node, StepResult};
use crate::core::{cancel::CancelToken, time::SystemClock};

/// Runs each node's step loop on its own thread.
///
/// Any node stopping, normally or with an error, cancels the shared token;
/// the remaining nodes observe it at their suspension points (or wake up
/// through channel closure when the stopped node's endpoints drop) and wind
/// down on their own.
pub struct ThreadedExecutor {
    handles: Vec<(String, JoinHandle<Result<()>>)>,
    stop_receiver: Receiver<String>,
}

impl ThreadedExecutor {
    pub fn run(nodes: Vec<(String, Box<dyn Node + Send>)>, cancel: &CancelToken) -> Self {
        let (stop_s, stop_r) = channel::<String>();

        let handles = nodes
            .into_iter()
            .map(|(name, mut node)| {
                let cancel = cancel.clone();
                let stop_s = stop_s.clone();
                let thread_name = name.clone();

                let handle = thread::spawn(move || -> Result<()> {
                    debug!("Node '{thread_name}' started");
                    let res = Self::node_loop(node.as_mut());

                    cancel.cancel();
                    let _ = stop_s.send(thread_name.clone());

                    match &res {
                        Ok(()) => info!("Node '{thread_name}' stopped"),
                        Err(e) => error!("Node '{thread_name}' failed: {e:#}"),
                    }

                    res.with_context(|| format!("Node {thread_name}: step() reported an error"))
                });

                (name, handle)
            })
            .collect();

        ThreadedExecutor {
            handles,
            stop_receiver: stop_r,
        }
    }

    fn node_loop(node: &mut dyn Node) -> Result<()> {
        let clock = SystemClock;

        loop {
            match node.step(&clock)? {
                StepResult::Continue => (),
                StepResult::Stop => return Ok(()),
            }
        }
    }

    /// Blocks until the first node stops, returning its name. The caller
    /// gets a chance to unblock the rest (e.g. kill the odometry source so
    /// its reader sees end of file) before joining.
    pub fn wait_first_stop(&self) -> Option<String> {
        self.stop_receiver.recv().ok()
    }

    /// Joins every node thread, reporting the first error encountered.
    pub fn join(self) -> Result<()> {
        let mut res = Ok(());

        for (_, handle) in self.handles {
            if let Err(e) = handle.join().unwrap() {
                if res.is_ok() {
                    res = Err(e);
                }
            }
        }

        res
    }
}
