//! Per-worker control loop: Idle → Processing → Idle, exiting as Drained or Aborted.

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, select};
use log::{debug, error, warn};
use std::sync::Arc;
use std::thread;

use super::counter::Counter;
use super::port::Port;
use super::registry::Registry;
use crate::error::EngineError;
use crate::types::{ProcessorFn, WorkItem};

/// One acknowledgment per worker, sent exactly once on exit. `None` means a clean exit.
pub(crate) type Ack = Option<EngineError>;

/// Everything a worker thread needs; cloned from the conveyor for each worker.
pub(crate) struct Minion<T> {
    pub id: usize,
    pub node: Arc<str>,
    pub input: Port<T>,
    pub registry: Registry<T>,
    pub process: ProcessorFn<T>,
    pub counter: Arc<Counter>,
    /// Disconnected when graceful stop is requested.
    pub stop_rx: Receiver<()>,
    /// Disconnected when kill is requested.
    pub kill_rx: Receiver<()>,
    pub ack_tx: Sender<Ack>,
}

enum Exit {
    /// Stop seen with an empty queue.
    Drained,
    /// Kill seen while idle.
    Aborted { pending: usize },
    /// Kill seen while a step was still running.
    Abandoned { pending: usize },
}

enum Step {
    Done,
    /// Kill arrived, but the step had already finished.
    DoneAtKill,
    Abandoned,
}

impl<T: Send + 'static> Minion<T> {
    /// Worker thread body. Decrements the live count and acknowledges exactly once.
    pub(crate) fn run(self) {
        debug!("{}: worker {} started", self.node, self.id);
        let exit = self.circle();
        self.counter.decrement();
        let ack = match exit {
            Exit::Drained => {
                debug!("{}: worker {} drained", self.node, self.id);
                None
            }
            Exit::Aborted { pending } => {
                debug!(
                    "{}: worker {} killed while idle, {} item(s) left in queue",
                    self.node, self.id, pending
                );
                None
            }
            Exit::Abandoned { pending } => {
                warn!(
                    "{}: worker {} killed mid-step, step left running, {} item(s) left in queue",
                    self.node, self.id, pending
                );
                Some(EngineError::Abandoned {
                    node: self.node.to_string(),
                    worker: self.id,
                    pending,
                })
            }
        };
        // The conveyor owns the receiver for its whole life.
        let _ = self.ack_tx.send(ack);
    }

    fn killed(&self) -> bool {
        matches!(self.kill_rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    fn circle(&self) -> Exit {
        let input = self.input.receiver();
        loop {
            // select! picks randomly among ready arms; kill must win over a non-empty queue.
            if self.killed() {
                return Exit::Aborted {
                    pending: self.input.len(),
                };
            }
            select! {
                recv(input) -> msg => match msg {
                    Ok(item) => {
                        if self.killed() {
                            self.input.finish();
                            debug!("{}: worker {} dropped an item taken at kill time", self.node, self.id);
                            return Exit::Aborted { pending: self.input.len() };
                        }
                        let step = self.process_item(item);
                        // An abandoned step may still be sending; it never counts as finished.
                        if !matches!(step, Step::Abandoned) {
                            self.input.finish();
                        }
                        match step {
                            Step::Done => {}
                            Step::DoneAtKill => {
                                return Exit::Aborted { pending: self.input.len() };
                            }
                            Step::Abandoned => {
                                return Exit::Abandoned { pending: self.input.len() };
                            }
                        }
                    }
                    Err(_) => return Exit::Drained,
                },
                recv(self.stop_rx) -> _ => {
                    // Stop is advisory until the backlog is gone.
                    if self.input.is_empty() {
                        return Exit::Drained;
                    }
                },
                recv(self.kill_rx) -> _ => {
                    return Exit::Aborted { pending: self.input.len() };
                },
            }
        }
    }

    /// Run the step on its own thread and race its completion against kill.
    fn process_item(&self, item: WorkItem<T>) -> Step {
        let (done_tx, done_rx) = bounded::<()>(1);
        let process = Arc::clone(&self.process);
        let registry = self.registry.clone();
        let id = self.id;
        let spawned = thread::Builder::new()
            .name(format!("{}-{}-step", self.node, self.id))
            .spawn(move || {
                process(id, item, &registry);
                let _ = done_tx.send(());
            });
        if let Err(e) = spawned {
            error!(
                "{}: worker {} could not start a step thread, item lost: {}",
                self.node, self.id, e
            );
            return Step::Done;
        }

        select! {
            recv(done_rx) -> res => {
                if res.is_err() {
                    warn!("{}: worker {} step panicked", self.node, self.id);
                }
                Step::Done
            },
            recv(self.kill_rx) -> _ => {
                match done_rx.try_recv() {
                    Err(TryRecvError::Empty) => Step::Abandoned,
                    _ => Step::DoneAtKill,
                }
            },
        }
    }
}
