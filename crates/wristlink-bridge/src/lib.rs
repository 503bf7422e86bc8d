//! Event-driven bridge between the phone and the watch.
//!
//! Every trigger (the bridge becoming ready, or the watch asking for a
//! refresh) starts an independent pipeline run: acquire a position, look up
//! the weather there, relay the result to the watch.

pub mod error;
pub mod events;
pub mod pipeline;

pub use error::RunError;
pub use events::{Bridge, BridgeEvent, ReadyHandles, RunHandle, Trigger};
pub use pipeline::{run_pipeline, PipelineContext};
