pub mod config;
pub mod conveyor_toml;
pub mod fd_limit;
pub mod logger;

pub use config::*;
pub use conveyor_toml::{ConveyorToml, load_conveyor_toml};
pub use fd_limit::{FDS_PER_WORKER, max_open_fds, max_workers_by_fd_limit};
pub use logger::setup_logging;
