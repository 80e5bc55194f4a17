//! Worker pool bound to one port, with graceful stop and forced kill.
//!
//! Termination scenario 1 (`stop`): every worker finishes the queued backlog, then exits cleanly.
//! Termination scenario 2 (`kill`): every worker exits at once; a worker caught mid-step leaves
//! the step running on its own thread and reports it as abandoned.

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use super::counter::Counter;
use super::port::Port;
use super::registry::Registry;
use super::worker::{Ack, Minion};
use crate::error::{EngineError, combine_errors};
use crate::types::ProcessorFn;

/// One-shot broadcast: dropping the only sender disconnects every cloned receiver.
struct Signal {
    tx: Mutex<Option<Sender<()>>>,
    rx: Receiver<()>,
}

impl Signal {
    fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }

    fn fire(&self) {
        drop(
            self.tx
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
    }
}

/// A pool of workers consuming one input port and running one processing step.
///
/// Usable standalone ([`Conveyor::standalone`]) or created per node by
/// [`Pipeline::run`](crate::pipeline::Pipeline::run). Terminates at most once, through exactly one
/// of [`stop`](Self::stop) or [`kill`](Self::kill). Dropping a conveyor that was never terminated
/// fires both signals without waiting: idle workers exit, running steps are left to finish.
pub struct Conveyor<T> {
    name: Arc<str>,
    input: Port<T>,
    registry: Registry<T>,
    process: ProcessorFn<T>,
    counter: Arc<Counter>,
    stop: Signal,
    kill: Signal,
    ack_tx: Sender<Ack>,
    ack_rx: Receiver<Ack>,
    started: AtomicBool,
    terminated: AtomicBool,
}

impl<T: Send + 'static> Conveyor<T> {
    /// Bind to the port named `name` in `registry`.
    pub fn new(
        name: &str,
        process: ProcessorFn<T>,
        registry: Registry<T>,
    ) -> Result<Self, EngineError> {
        let input = registry.port(name)?;
        Ok(Self::bind(name, input, registry, process))
    }

    /// Conveyor with its own private registry holding a single input port named `name`.
    pub fn standalone(name: &str, process: ProcessorFn<T>, capacity: usize) -> Self {
        let registry = Registry::new();
        // A fresh registry cannot already hold the name.
        let input = registry
            .register(name, capacity)
            .unwrap_or_else(|_| Port::new(name, capacity));
        Self::bind(name, input, registry, process)
    }

    fn bind(name: &str, input: Port<T>, registry: Registry<T>, process: ProcessorFn<T>) -> Self {
        let (ack_tx, ack_rx) = unbounded();
        Self {
            name: Arc::from(name),
            input,
            registry,
            process,
            counter: Arc::new(Counter::new()),
            stop: Signal::new(),
            kill: Signal::new(),
            ack_tx,
            ack_rx,
            started: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Input port; hosts inject work here.
    pub fn input(&self) -> &Port<T> {
        &self.input
    }

    pub fn registry(&self) -> &Registry<T> {
        &self.registry
    }

    /// Live workers right now. A monitoring signal only: it races with exiting workers.
    pub fn cores(&self) -> usize {
        self.counter.read()
    }

    /// Whether `stop` or `kill` has already been called.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Launch `parallels` workers with ids 1..=parallels. Returns immediately. Only one call per
    /// conveyor is accepted.
    pub fn run_minions(&self, parallels: usize) -> Result<(), EngineError> {
        if parallels == 0 {
            return Err(EngineError::InvalidParallelism(self.name.to_string()));
        }
        if self.terminated.load(Ordering::Acquire) {
            return Err(EngineError::AlreadyTerminated {
                node: self.name.to_string(),
            });
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(EngineError::AlreadyRunning(self.name.to_string()));
        }
        for _ in 0..parallels {
            let id = self.counter.increment();
            let minion = Minion {
                id,
                node: Arc::clone(&self.name),
                input: self.input.clone(),
                registry: self.registry.clone(),
                process: Arc::clone(&self.process),
                counter: Arc::clone(&self.counter),
                stop_rx: self.stop.rx.clone(),
                kill_rx: self.kill.rx.clone(),
                ack_tx: self.ack_tx.clone(),
            };
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", self.name, id))
                .spawn(move || minion.run());
            if let Err(source) = spawned {
                self.counter.decrement();
                return Err(EngineError::Spawn {
                    node: self.name.to_string(),
                    source,
                });
            }
        }
        debug!("{}: {} worker(s) running", self.name, parallels);
        Ok(())
    }

    /// Claim the single termination. Later callers get [`EngineError::AlreadyTerminated`].
    fn begin_termination(&self) -> Result<(), EngineError> {
        self.terminated
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| EngineError::AlreadyTerminated {
                node: self.name.to_string(),
            })
    }

    fn await_acks(&self, expected: usize) -> Vec<EngineError> {
        let mut errors = Vec::new();
        for _ in 0..expected {
            match self.ack_rx.recv() {
                Ok(Some(err)) => errors.push(err),
                Ok(None) => {}
                Err(_) => break,
            }
        }
        errors
    }

    /// Graceful termination: workers drain the queue, then exit. Blocks until every worker that
    /// was alive at call time has acknowledged.
    pub fn stop(&self) -> Result<(), EngineError> {
        self.begin_termination()?;
        let expected = self.counter.read();
        debug!("{}: stop requested, waiting for {} worker(s)", self.name, expected);
        self.stop.fire();
        combine_errors(self.await_acks(expected))
    }

    /// Forced termination: workers exit without draining. Returns the combined abandonment
    /// errors of workers that were mid-step; `Ok(())` if every worker was idle.
    pub fn kill(&self) -> Result<(), EngineError> {
        self.begin_termination()?;
        let expected = self.counter.read();
        debug!("{}: kill requested, waiting for {} worker(s)", self.name, expected);
        self.kill.fire();
        combine_errors(self.await_acks(expected))
    }

    /// Spawn a watcher that calls [`stop`](Self::stop) once `trigger` receives a message or
    /// disconnects. The join handle yields the stop result.
    pub fn stop_on(self: Arc<Self>, trigger: Receiver<()>) -> JoinHandle<Result<(), EngineError>> {
        thread::spawn(move || {
            let _ = trigger.recv();
            self.stop()
        })
    }
}
