//! Analytics Collector - privacy-first page view collection backed by an external event log.
//!
//! Browsers report page views; the collector replaces the client address and
//! user agent with a visitor hash that rotates every UTC day, writes the
//! result to the event log, and processes the committed events when the
//! platform delivers them back.

pub mod clock;
pub mod collect;
pub mod config;
pub mod contract;
pub mod handlers;
pub mod logging;
pub mod pathways;
pub mod privacy;
pub mod server;
pub mod types;
