pub mod coordinator;
pub mod worker;

pub use coordinator::run_ingest;
pub use worker::{consume, run_worker, WorkerCounters};
