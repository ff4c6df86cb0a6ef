//! # ODS Rust
//!
//! Validation and multi-source assembly engine for Operational Data Sharing
//! (ODS) records: structured observation metadata exchanged between
//! radio-astronomy sites and satellite-constellation operators for
//! interference avoidance.
//!
//! ## Features
//!
//! - **Standard registry**: required fields, type/unit constraints, and
//!   standard-defined defaults for each published ODS version
//! - **Record validation**: whole-record accept/reject with every failure
//!   reported, unknown fields preserved for round-trip
//! - **Merging**: cross-instance concatenation, version normalization,
//!   duplicate resolution by recency, deterministic output ordering
//! - **Culling**: stale/inactive time filtering and horizon filtering
//!   through an external elevation capability
//! - **Assembly**: one-call directory assembly producing a publishable
//!   instance plus a full report of everything skipped along the way
//!
//! ## Architecture
//!
//! The crate is organized into several logical modules:
//!
//! - [`api`]: public value types and re-exports
//! - [`standard`]: the ODS standard registry (versions A and B)
//! - [`models`]: records, instances, defaults, and time handling
//! - [`services`]: merge, cull, and assembly orchestration
//! - [`config`]: explicit assembly configuration
//! - [`error`]: typed errors per pipeline concern
//!
//! The pipeline is synchronous and batch-oriented: a sequence of pure
//! transformations over in-memory value collections. Each `assemble` call
//! is independent and reentrant given the same directory contents.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod standard;
