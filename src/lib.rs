//! Recserve
//!
//! Per-tenant item recommendation serving. Combines cluster-membership
//! signals, cached aggregate counts, and a runtime-reconfigurable algorithm
//! pipeline.
//!
//! # Key pieces
//! - Strategy resolution: JSON config pushed at runtime becomes an
//!   executable pipeline of algorithms, filters, includers and a combiner,
//!   with A/B variation testing and per-tag overrides
//! - Cluster-count recommendations: decayed, cache-backed cluster/item
//!   counts aggregated into ranked results
//! - Cache-stampede protection: single-flight refresh shared by every
//!   cache-backed lookup
//! - Background loading: per-client cluster/tag snapshots rebuilt off-thread
//!   and swapped in atomically
//!
//! HTTP handling, persistence and config distribution are external
//! collaborators, expressed as traits the host wires in.

pub mod algorithms;
pub mod cache;
pub mod cluster;
pub mod config;
pub mod constants;
pub mod decay;
pub mod errors;
pub mod filters;
pub mod items;
pub mod loader;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod strategy;
pub mod tracing_setup;

// Re-export dependencies that appear in public APIs so hosts use the same
// versions.
pub use chrono;
pub use parking_lot;

pub use errors::{EngineError, Result};
