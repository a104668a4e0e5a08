use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tabular::{cell_number, cell_text, present, TabularResult};

/// Sum a value column must land near to count as a percentage breakdown.
const PERCENT_TOTAL: f64 = 100.0;
/// Allowed distance from `PERCENT_TOTAL`, exclusive.
const PERCENT_TOLERANCE: f64 = 5.0;
/// Row count from which bars are laid out horizontally.
const HORIZONTAL_ROW_THRESHOLD: usize = 15;

/// Visualization kind chosen for a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ChartKind {
    Line,
    Bar,
    BarHorizontal,
    Pie,
    Doughnut,
    /// A backend-supplied chart type passed through verbatim.
    Other(String),
}

impl ChartKind {
    /// Map a `chartType` hint literal to a kind.
    ///
    /// Only `horizontalbar` is special-cased; the other known names are
    /// matched case-insensitively and anything else is kept as given.
    pub fn from_literal(literal: &str) -> Self {
        match literal.to_ascii_lowercase().as_str() {
            "horizontalbar" | "bar-horizontal" => ChartKind::BarHorizontal,
            "line" => ChartKind::Line,
            "bar" => ChartKind::Bar,
            "pie" => ChartKind::Pie,
            "doughnut" => ChartKind::Doughnut,
            _ => ChartKind::Other(literal.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::BarHorizontal => "bar-horizontal",
            ChartKind::Pie => "pie",
            ChartKind::Doughnut => "doughnut",
            ChartKind::Other(s) => s,
        }
    }

    /// Pie and doughnut charts have no axes.
    pub fn is_radial(&self) -> bool {
        matches!(self, ChartKind::Pie | ChartKind::Doughnut)
    }

    pub fn is_horizontal(&self) -> bool {
        matches!(self, ChartKind::BarHorizontal)
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ChartKind> for String {
    fn from(kind: ChartKind) -> Self {
        kind.as_str().to_string()
    }
}

impl From<String> for ChartKind {
    fn from(s: String) -> Self {
        ChartKind::from_literal(&s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegendPosition {
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Legend {
    pub display: bool,
    pub position: LegendPosition,
}

impl Default for Legend {
    fn default() -> Self {
        Self {
            display: true,
            position: LegendPosition::Bottom,
        }
    }
}

/// Axis behaviour for cartesian charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scales {
    pub category_auto_skip: bool,
    pub value_begin_at_zero: bool,
}

impl Default for Scales {
    fn default() -> Self {
        Self {
            category_auto_skip: true,
            value_begin_at_zero: true,
        }
    }
}

/// Resolved visualization for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub category_axis: Option<String>,
    pub value_axis: Option<String>,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub legend: Legend,
    /// `None` for pie and doughnut.
    pub scales: Option<Scales>,
}

impl ChartSpec {
    /// Dataset label shown in the legend.
    pub fn dataset_label(&self) -> &str {
        self.value_axis.as_deref().unwrap_or("Value")
    }
}

/// Resolve the chart for a table. Pure and deterministic.
pub fn resolve(result: &TabularResult) -> ChartSpec {
    let (category_axis, value_axis) = select_axes(result);
    let category_idx = category_axis
        .as_deref()
        .and_then(|c| result.column_index(c));
    let value_idx = value_axis.as_deref().and_then(|c| result.column_index(c));

    let labels: Vec<String> = result
        .rows
        .iter()
        .map(|row| {
            present(row, category_idx)
                .or_else(|| present(row, Some(0)))
                .map(cell_text)
                .unwrap_or_default()
        })
        .collect();
    let values: Vec<f64> = result
        .rows
        .iter()
        .map(|row| {
            present(row, value_idx)
                .or_else(|| present(row, Some(1)))
                .map(cell_number)
                .unwrap_or(0.0)
        })
        .collect();

    let kind = resolve_kind(result, &values);
    let scales = if kind.is_radial() {
        None
    } else {
        Some(Scales::default())
    };

    debug!(
        kind = %kind,
        rows = result.rows.len(),
        category = ?category_axis,
        value = ?value_axis,
        "Resolved chart"
    );

    ChartSpec {
        kind,
        category_axis,
        value_axis,
        labels,
        values,
        legend: Legend::default(),
        scales,
    }
}

/// Category axis is `x` or the first column; value axis is `y`, the second
/// column, or the first column when there is only one.
fn select_axes(result: &TabularResult) -> (Option<String>, Option<String>) {
    let hints = result.hints.as_ref();
    let category = hints
        .and_then(|h| h.x.clone())
        .or_else(|| result.columns.first().cloned());
    let value = hints
        .and_then(|h| h.y.clone())
        .or_else(|| result.columns.get(1).cloned())
        .or_else(|| result.columns.first().cloned());
    (category, value)
}

fn resolve_kind(result: &TabularResult, values: &[f64]) -> ChartKind {
    let hints = result.hints.as_ref();

    // A blank literal counts as no hint.
    if let Some(chart_type) = hints
        .and_then(|h| h.chart_type.as_deref())
        .filter(|s| !s.trim().is_empty())
    {
        return ChartKind::from_literal(chart_type);
    }

    if hints.and_then(|h| h.is_time_series).unwrap_or(false) {
        return ChartKind::Line;
    }

    let percent_like = hints
        .and_then(|h| h.percent_like)
        .unwrap_or_else(|| is_percent_like(values));
    if percent_like {
        return ChartKind::Doughnut;
    }

    if result.rows.len() < HORIZONTAL_ROW_THRESHOLD {
        ChartKind::Bar
    } else {
        ChartKind::BarHorizontal
    }
}

/// True when the values sum to within the tolerance of 100 and are non-zero.
pub fn is_percent_like(values: &[f64]) -> bool {
    let total: f64 = values.iter().sum();
    total != 0.0 && (total - PERCENT_TOTAL).abs() < PERCENT_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::VizHints;
    use serde_json::{json, Value};

    fn pairs(n: usize) -> TabularResult {
        let rows = (0..n)
            .map(|i| vec![json!(format!("item-{}", i)), json!(i * 3 + 1)])
            .collect();
        TabularResult::new(vec!["label".into(), "value".into()], rows)
    }

    // ---- Decision order ----

    #[test]
    fn test_time_series_is_line() {
        let table = TabularResult::new(
            vec!["month".into(), "value".into()],
            vec![
                vec![json!("2024-01"), json!(100)],
                vec![json!("2024-02"), json!(120)],
            ],
        )
        .with_hints(VizHints {
            is_time_series: Some(true),
            ..VizHints::default()
        });
        let spec = resolve(&table);
        assert_eq!(spec.kind, ChartKind::Line);
        assert_eq!(spec.labels, vec!["2024-01", "2024-02"]);
        assert_eq!(spec.values, vec![100.0, 120.0]);
    }

    #[test]
    fn test_twenty_rows_is_horizontal_bar() {
        let spec = resolve(&pairs(20));
        assert_eq!(spec.kind, ChartKind::BarHorizontal);
        assert_eq!(spec.labels.len(), 20);
    }

    #[test]
    fn test_row_threshold_boundary() {
        assert_eq!(resolve(&pairs(14)).kind, ChartKind::Bar);
        assert_eq!(resolve(&pairs(15)).kind, ChartKind::BarHorizontal);
    }

    #[test]
    fn test_values_summing_to_hundred_is_doughnut() {
        let table = TabularResult::new(
            vec!["segment".into(), "share".into()],
            vec![
                vec![json!("a"), json!(40)],
                vec![json!("b"), json!(35)],
                vec![json!("c"), json!(25)],
            ],
        );
        let spec = resolve(&table);
        assert_eq!(spec.kind, ChartKind::Doughnut);
        assert!(spec.scales.is_none());
    }

    #[test]
    fn test_percent_tolerance_is_strict() {
        assert!(is_percent_like(&[50.0, 45.5]));
        assert!(is_percent_like(&[104.9]));
        assert!(!is_percent_like(&[95.0]));
        assert!(!is_percent_like(&[105.0]));
        assert!(!is_percent_like(&[]));
        assert!(!is_percent_like(&[0.0, 0.0]));
    }

    #[test]
    fn test_explicit_percent_like_false_overrides_sum() {
        let table = TabularResult::new(
            vec!["segment".into(), "share".into()],
            vec![vec![json!("a"), json!(60)], vec![json!("b"), json!(40)]],
        )
        .with_hints(VizHints {
            percent_like: Some(false),
            ..VizHints::default()
        });
        assert_eq!(resolve(&table).kind, ChartKind::Bar);
    }

    #[test]
    fn test_explicit_percent_like_true() {
        let table = pairs(3).with_hints(VizHints {
            percent_like: Some(true),
            ..VizHints::default()
        });
        assert_eq!(resolve(&table).kind, ChartKind::Doughnut);
    }

    #[test]
    fn test_horizontalbar_hint_ignores_row_count() {
        let table = pairs(2).with_hints(VizHints {
            chart_type: Some("HorizontalBar".into()),
            ..VizHints::default()
        });
        let spec = resolve(&table);
        assert_eq!(spec.kind, ChartKind::BarHorizontal);
        assert!(spec.kind.is_horizontal());
    }

    #[test]
    fn test_chart_type_hint_wins_over_time_series() {
        let table = pairs(2).with_hints(VizHints {
            chart_type: Some("pie".into()),
            is_time_series: Some(true),
            ..VizHints::default()
        });
        assert_eq!(resolve(&table).kind, ChartKind::Pie);
    }

    #[test]
    fn test_unknown_chart_type_passes_through() {
        let table = pairs(2).with_hints(VizHints {
            chart_type: Some("radar".into()),
            ..VizHints::default()
        });
        let spec = resolve(&table);
        assert_eq!(spec.kind, ChartKind::Other("radar".into()));
        assert!(!spec.kind.is_horizontal());
        assert!(spec.scales.is_some());
    }

    // ---- Axes and extraction ----

    #[test]
    fn test_blank_chart_type_hint_is_ignored() {
        for blank in ["", "  "] {
            let table = TabularResult::new(
                vec!["segment".into(), "share".into()],
                vec![vec![json!("a"), json!(40)], vec![json!("b"), json!(60)]],
            )
            .with_hints(VizHints {
                chart_type: Some(blank.into()),
                ..VizHints::default()
            });
            let spec = resolve(&table);
            assert_eq!(spec.kind, ChartKind::Doughnut);
            assert_eq!(spec.to_chartjs("#000")["type"], "doughnut");
        }
    }

    #[test]
    fn test_hint_axes_select_columns() {
        let table = TabularResult::new(
            vec!["id".into(), "region".into(), "sales".into()],
            vec![
                vec![json!(1), json!("north"), json!("12.5")],
                vec![json!(2), json!("south"), json!(7)],
            ],
        )
        .with_hints(VizHints {
            x: Some("region".into()),
            y: Some("sales".into()),
            ..VizHints::default()
        });
        let spec = resolve(&table);
        assert_eq!(spec.category_axis.as_deref(), Some("region"));
        assert_eq!(spec.value_axis.as_deref(), Some("sales"));
        assert_eq!(spec.labels, vec!["north", "south"]);
        assert_eq!(spec.values, vec![12.5, 7.0]);
        assert_eq!(spec.dataset_label(), "sales");
    }

    #[test]
    fn test_single_column_uses_it_for_both_axes() {
        let table = TabularResult::new(
            vec!["count".into()],
            vec![vec![json!(3)], vec![json!(4)]],
        );
        let spec = resolve(&table);
        assert_eq!(spec.category_axis.as_deref(), Some("count"));
        assert_eq!(spec.value_axis.as_deref(), Some("count"));
        assert_eq!(spec.labels, vec!["3", "4"]);
        assert_eq!(spec.values, vec![3.0, 4.0]);
    }

    #[test]
    fn test_unknown_hint_column_falls_back_to_positions() {
        let table = TabularResult::new(
            vec!["a".into(), "b".into()],
            vec![vec![json!("x"), json!(9)]],
        )
        .with_hints(VizHints {
            x: Some("missing".into()),
            y: Some("also_missing".into()),
            ..VizHints::default()
        });
        let spec = resolve(&table);
        assert_eq!(spec.labels, vec!["x"]);
        assert_eq!(spec.values, vec![9.0]);
    }

    #[test]
    fn test_missing_and_non_numeric_cells_default_to_zero() {
        let table = TabularResult::new(
            vec!["k".into(), "v".into()],
            vec![
                vec![json!("a"), json!("oops")],
                vec![json!("b")],
                vec![json!("c"), Value::Null],
            ],
        );
        let spec = resolve(&table);
        assert_eq!(spec.values, vec![0.0, 0.0, 0.0]);
        assert_eq!(spec.kind, ChartKind::Bar);
    }

    #[test]
    fn test_empty_table() {
        let spec = resolve(&TabularResult::default());
        assert_eq!(spec.kind, ChartKind::Bar);
        assert!(spec.labels.is_empty());
        assert!(spec.category_axis.is_none());
        assert_eq!(spec.dataset_label(), "Value");
    }

    #[test]
    fn test_legend_and_scales() {
        let spec = resolve(&pairs(3));
        assert_eq!(spec.legend, Legend::default());
        assert_eq!(spec.legend.position, LegendPosition::Bottom);
        let scales = spec.scales.unwrap();
        assert!(scales.category_auto_skip);
        assert!(scales.value_begin_at_zero);
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let table = pairs(17);
        assert_eq!(resolve(&table), resolve(&table));
    }

    // ---- ChartKind ----

    #[test]
    fn test_chart_kind_serializes_as_string() {
        assert_eq!(
            serde_json::to_value(ChartKind::BarHorizontal).unwrap(),
            json!("bar-horizontal")
        );
        let kind: ChartKind = serde_json::from_value(json!("Doughnut")).unwrap();
        assert_eq!(kind, ChartKind::Doughnut);
        let other: ChartKind = serde_json::from_value(json!("scatter")).unwrap();
        assert_eq!(other, ChartKind::Other("scatter".into()));
    }
}
