//! Core identifier types shared by the writer and reader pathways.

pub mod ids;

pub use ids::{EventId, FlowIdentifier};
