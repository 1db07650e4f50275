//! Rainfall anomaly aggregation and early-warning classification.
//!
//! Reads gridded rainfall (CH) and rain-character (SH) points, pairs or
//! block-fills them, aggregates them per administrative region against
//! monthly or dasarian thresholds and scores each region for drought and
//! excess-rain risk.

pub mod alert;
pub mod analysis;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod regions;
pub mod report;
