//! Textual HLS multivariant playlist handling.

pub mod attributes;
pub mod master;
