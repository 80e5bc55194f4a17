use log::{debug, warn};
use std::sync::Arc;
use std::thread;

use super::node::Node;
use crate::engine::{Conveyor, Port, Registry};
use crate::error::{EngineError, combine_errors};
use crate::types::{ProcessorFn, WorkItem};
use crate::utils::config::EngineConsts;

/// A graph of named nodes sharing one port registry.
///
/// Nodes are not wired to each other: every processing step sees the whole registry and sends to
/// whichever port it likes by name. Lifecycle: [`add_node`](Self::add_node) → [`run`](Self::run)
/// once → [`stop`](Self::stop) or [`kill`](Self::kill).
pub struct Pipeline<T> {
    nodes: Vec<Node<T>>,
    registry: Registry<T>,
    port_capacity: usize,
    conveyors: Vec<Arc<Conveyor<T>>>,
    running: bool,
}

impl<T: Send + 'static> Default for Pipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Pipeline<T> {
    /// Empty pipeline with ports of [`EngineConsts::DEFAULT_PORT_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(EngineConsts::DEFAULT_PORT_CAPACITY)
    }

    /// Empty pipeline whose node ports hold `port_capacity` items.
    pub fn with_capacity(port_capacity: usize) -> Self {
        Self {
            nodes: Vec::new(),
            registry: Registry::new(),
            port_capacity,
            conveyors: Vec::new(),
            running: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Register a node and allocate its input port `name` and output port `"{name}.out"`.
    pub fn add_node(
        &mut self,
        name: &str,
        process: ProcessorFn<T>,
        parallelism: usize,
    ) -> Result<(), EngineError> {
        if self.is_running() {
            return Err(EngineError::AlreadyRunning("pipeline".to_string()));
        }
        if parallelism == 0 {
            return Err(EngineError::InvalidParallelism(name.to_string()));
        }
        if self.nodes.iter().any(|n| n.name == name) {
            return Err(EngineError::DuplicateNode(name.to_string()));
        }
        let node = Node {
            name: name.to_string(),
            process,
            parallelism,
        };
        self.registry.register(&node.name, self.port_capacity)?;
        if let Err(e) = self
            .registry
            .register(&node.output_name(), self.port_capacity)
        {
            self.registry.remove(&node.name);
            return Err(e);
        }
        self.nodes.push(node);
        debug!("added node '{}' (parallelism {})", name, parallelism);
        Ok(())
    }

    /// Start one conveyor per node. Returns as soon as every worker thread is spawned.
    pub fn run(&mut self) -> Result<(), EngineError> {
        if self.is_running() {
            return Err(EngineError::AlreadyRunning("pipeline".to_string()));
        }
        self.running = true;
        for node in &self.nodes {
            let conveyor = Arc::new(Conveyor::new(
                &node.name,
                Arc::clone(&node.process),
                self.registry.clone(),
            )?);
            // Keep it even on a spawn failure so stop/kill still reach the workers that started.
            self.conveyors.push(Arc::clone(&conveyor));
            conveyor.run_minions(node.parallelism)?;
        }
        debug!(
            "pipeline running: {} node(s), {} worker(s)",
            self.nodes.len(),
            self.cores()
        );
        Ok(())
    }

    fn conveyors(&self) -> Result<&[Arc<Conveyor<T>>], EngineError> {
        if self.is_running() {
            Ok(self.conveyors.as_slice())
        } else {
            Err(EngineError::NotRunning)
        }
    }

    /// Graceful stop. Waits until no live node has queued or in-flight work, whatever order the
    /// nodes were added in, then stops every conveyor. Work left on the port of a node that can
    /// no longer drain it (one killed earlier) comes back as [`EngineError::Undrained`].
    pub fn stop(&self) -> Result<(), EngineError> {
        let conveyors = self.conveyors()?;
        wait_quiescent(conveyors);
        let mut errors: Vec<EngineError> =
            conveyors.iter().filter_map(|c| c.stop().err()).collect();
        errors.extend(conveyors.iter().filter_map(|c| {
            let pending = c.input().len();
            (pending > 0).then(|| EngineError::Undrained {
                node: c.name().to_string(),
                pending,
            })
        }));
        combine_errors(errors)
    }

    /// Kill every node, even after an earlier node reported errors. Returns all per-node errors
    /// flattened into one combined error.
    pub fn kill(&self) -> Result<(), EngineError> {
        let errors: Vec<EngineError> = self
            .conveyors()?
            .iter()
            .filter_map(|c| c.kill().err())
            .collect();
        if !errors.is_empty() {
            warn!("pipeline killed, {} node(s) reported errors", errors.len());
        }
        combine_errors(errors)
    }

    /// Total live workers across all nodes.
    pub fn cores(&self) -> usize {
        self.conveyors.iter().map(|c| c.cores()).sum()
    }

    /// Live workers of one node; `None` before `run` or for an unknown name.
    pub fn node_cores(&self, name: &str) -> Option<usize> {
        self.conveyor(name).map(|c| c.cores())
    }

    /// Running conveyor of node `name`.
    pub fn conveyor(&self, name: &str) -> Option<&Arc<Conveyor<T>>> {
        self.conveyors.iter().find(|c| c.name() == name)
    }

    pub fn nodes(&self) -> &[Node<T>] {
        &self.nodes
    }

    pub fn registry(&self) -> &Registry<T> {
        &self.registry
    }

    /// Input port of node `name`.
    pub fn input(&self, name: &str) -> Result<Port<T>, EngineError> {
        self.registry.port(name)
    }

    /// Primary output port of node `name`.
    pub fn output(&self, name: &str) -> Result<Port<T>, EngineError> {
        let node = self
            .nodes
            .iter()
            .find(|n| n.name == name)
            .ok_or_else(|| EngineError::PortNotFound(name.to_string()))?;
        self.registry.port(&node.output_name())
    }

    /// Send `payload` to the input port of node `name`.
    pub fn send(&self, name: &str, payload: T) -> Result<(), EngineError> {
        self.registry.send_to(name, WorkItem::new(payload))
    }
}

/// Block until the ports of all live conveyors are idle. Steps send before they finish, so a
/// single pass can miss an item moving between nodes; two identical passes with nothing
/// unfinished cannot.
fn wait_quiescent<T: Send + 'static>(conveyors: &[Arc<Conveyor<T>>]) {
    let live: Vec<&Arc<Conveyor<T>>> = conveyors
        .iter()
        .filter(|c| !c.is_terminated() && c.cores() > 0)
        .collect();
    let snapshot = || -> Vec<(usize, u64)> { live.iter().map(|c| c.input().activity()).collect() };
    let mut previous = snapshot();
    let mut passes = 0_usize;
    loop {
        let current = snapshot();
        if current == previous && current.iter().all(|&(unfinished, _)| unfinished == 0) {
            break;
        }
        previous = current;
        passes += 1;
        thread::sleep(EngineConsts::DRAIN_POLL_INTERVAL);
    }
    debug!("pipeline quiescent after {} pass(es)", passes);
}
