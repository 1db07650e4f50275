//! Input handling.
//!
//! - `rows` — uniform row maps → typed CH / SH / matched points
//! - `csv_file` — CSV files → uniform row maps (used by the binary)

pub mod csv_file;
pub mod rows;

pub use rows::*;
