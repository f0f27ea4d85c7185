//! Media job worker.
//!
//! This crate provides:
//! - Job executor for the eight media operations
//! - Resource-aware batch scheduling with fail-fast, index-ordered results
//! - Balanced variant assignment for image batches
//! - Cyclic clip sequencing to fill an audio track exactly
//! - Per-job logging, Prometheus metrics and a local output server

pub mod batch;
pub mod config;
pub mod distribute;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod operations;
pub mod resources;
pub mod sequencer;
pub mod server;

pub use batch::{run_batch, BatchError};
pub use config::WorkerConfig;
pub use distribute::{distribute, distribute_seeded};
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use resources::compute_parallelism;
pub use sequencer::{plan_sequence, Clip, SequencePlan, SequenceSegment, SequencingError};
