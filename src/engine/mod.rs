//! Engine: ports, the shared registry, and the conveyor worker pool.

pub mod conveyor;
pub mod counter;
pub mod port;
pub mod registry;
mod worker;

pub use conveyor::Conveyor;
pub use counter::Counter;
pub use port::Port;
pub use registry::Registry;
