pub mod cycle_finder;
pub mod matcher;
pub mod scc;
pub mod want_graph;
