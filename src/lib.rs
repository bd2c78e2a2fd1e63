//! Data-access client for the REST API of a digital repository.
//!
//! Requests go through a shared registry that deduplicates in-flight GETs by
//! href and caches their outcome; callers observe results as streams of
//! `RemoteData` snapshots. Entity services for groups and e-people sit on top.

pub mod config;
pub mod core;
pub mod data;
pub mod eperson;
pub mod logging;
pub mod transport;
pub(crate) mod utils;
