//! Arena partition, region graph, and the coverage state machine.

pub mod coverage;
pub mod graph;
pub mod regions;

pub use coverage::{classify, compute_visit_order, Classification, CoveragePlanner, DetectionFilter};
pub use graph::AdjacencyGraph;
pub use regions::{ArenaGrid, RegionId, Zone};
