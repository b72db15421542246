//! Citizen index service and its line ingestion, shared by the `civic`
//! binary and the benches.

pub mod config;
pub mod engine;
pub mod ingest;
