/// Threshold evaluation and early-warning classification.
///
/// - `thresholds` — built-in profiles and per-region flag evaluation
/// - `classify`   — dry/wet indicator scores, classes and combined category

pub mod classify;
pub mod thresholds;
