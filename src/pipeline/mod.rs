//! Pipeline: named nodes over a shared port registry, started and terminated as one graph.

pub mod node;
pub mod orchestrator;

pub use node::{Node, OUTPUT_SUFFIX, output_port_name};
pub use orchestrator::Pipeline;
