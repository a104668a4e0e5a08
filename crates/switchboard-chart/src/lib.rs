//! Chart type resolution for tabular query results.
//!
//! Turns a `TabularResult` (columns, rows, optional visualization hints) into
//! a `ChartSpec` and renders that spec as a Chart.js configuration.

pub mod chartjs;
pub mod resolver;
pub mod tabular;

pub use resolver::{resolve, ChartKind, ChartSpec, Legend, LegendPosition, Scales};
pub use tabular::{cell_number, cell_text, TabularResult, VizHints};
