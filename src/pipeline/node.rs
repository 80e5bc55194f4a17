use crate::types::ProcessorFn;

/// Suffix appended to a node's name to form its primary output port.
pub const OUTPUT_SUFFIX: &str = ".out";

/// Name of the primary output port of node `name`.
pub fn output_port_name(name: &str) -> String {
    format!("{name}{OUTPUT_SUFFIX}")
}

/// Declarative node: identity, processing step and parallelism. Holds no runtime state.
pub struct Node<T> {
    pub name: String,
    pub process: ProcessorFn<T>,
    pub parallelism: usize,
}

impl<T> Node<T> {
    pub fn output_name(&self) -> String {
        output_port_name(&self.name)
    }
}

impl<T> std::fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("parallelism", &self.parallelism)
            .finish_non_exhaustive()
    }
}
