//! astroflow: transient alert stream ingestion and external registry
//! crossmatch.
//!
//! Two entry points share this library: `ingest_alerts` consumes the broker
//! topic with parallel workers and persists filtered alerts, and
//! `poll_registry` reconciles the external transient registry against the
//! local catalog via spatial crossmatch.

pub mod alerts;
pub mod broker;
pub mod config;
pub mod features;
pub mod filter;
pub mod ingest;
pub mod notify;
pub mod registry;
pub mod spatial;
pub mod status;
pub mod store;
