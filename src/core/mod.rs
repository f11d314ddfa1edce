//! Host lifecycle.
//!
//! - [`Pipeline`] owns and wires every background component; explicit `start`/`stop`
//! - [`PipelineBuilder`] storage and subscriber injection
//! - `shutdown`: OS termination signal helper used by [`Pipeline::run_until_signal`]

mod builder;
mod pipeline;
mod shutdown;

pub use builder::PipelineBuilder;
pub use pipeline::Pipeline;
pub use shutdown::wait_for_shutdown_signal;
