//! Service layer for the assembly pipeline.
//!
//! Services operate on whole instances as pure transformations: merge and
//! deduplicate across instances, cull by time and visibility, and
//! orchestrate a full directory assembly.

pub mod assembly;

pub mod merge;

pub mod visibility;

pub use assembly::{assemble, Assembly, AssemblyReport};
pub use merge::{merge, MergeOptions, MergeReport, RecencyRule, PRODUCED_FIELD};
pub use visibility::{
    active_records, continuity, coverage, cull_by_elevation, cull_by_time, AdjustEdge, Coverage,
    CullPolicy, CullReport, ElevationProvider,
};
