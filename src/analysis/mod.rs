/// Spatial analysis for the rainfall anomaly pipeline.
///
/// Submodules:
/// - `matching`  — pairs CH and SH point sets into matched points.
/// - `grid`      — block-fills a fine lattice from coarse source cells.
/// - `aggregate` — per-region bucket percentages and flags.

pub mod aggregate;
pub mod grid;
pub mod matching;
