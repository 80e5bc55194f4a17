//! Conveyor: a concurrent dataflow engine.
//!
//! A [`Conveyor`](engine::Conveyor) is a pool of worker threads draining one bounded
//! [`Port`](engine::Port) through a caller-supplied step. A [`Pipeline`](pipeline::Pipeline) runs
//! one conveyor per named node over a shared [`Registry`](engine::Registry) of ports, so any step
//! can send to any port by name, including private ports it creates at runtime.
//!
//! Termination comes in two flavours:
//! - **stop**: workers drain their queue, then exit cleanly.
//! - **kill**: workers exit at once; steps still running are abandoned (left to finish on their
//!   own thread) and reported in one combined error.
//!
//! ```ignore
//! use conveyor::{Pipeline, WorkItem, processor};
//!
//! let mut p = Pipeline::new();
//! p.add_node("double", processor(|_id, item: WorkItem<i64>, reg| {
//!     let _ = reg.send_to("sum", WorkItem::new(item.payload * 2));
//! }), 3)?;
//! p.add_node("sum", processor(|_id, item, reg| { /* ... */ }), 1)?;
//! p.run()?;
//! p.send("double", 21)?;
//! p.stop()?;
//! ```
//!
//! The `checksum` module is the directory checksum tool shipped as the `conveyor` binary.

pub mod checksum;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod types;
pub mod utils;

pub use engine::{Conveyor, Counter, Port, Registry};
pub use error::{CombinedError, EngineError, combine_errors};
pub use pipeline::{Node, Pipeline, output_port_name};
pub use types::*;

/// Result alias used by the application side of the crate.
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;
