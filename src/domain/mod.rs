//! Domain layer types and invariants.

pub mod actors;
pub mod error;
pub mod preview;
pub mod symbology;
