//! Stitching plan construction: break grouping, asset lists and the splice
//! orchestration that drives a [`crate::splice::SpliceEngine`].

pub mod asset_list;
pub mod grouping;
pub mod orchestrator;
