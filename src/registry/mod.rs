pub mod crossmatch;
pub mod fetch;
pub mod poller;
pub mod types;

pub use crossmatch::crossmatch;
pub use poller::{poll_registry, PollReport};
