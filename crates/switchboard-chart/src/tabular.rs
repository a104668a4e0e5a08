use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Optional hints supplied by the analytics backend to bias chart selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VizHints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_time_series: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_like: Option<bool>,
}

/// Columns and rows returned by a data-shaped backend answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularResult {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
    #[serde(
        default,
        rename = "viz_hints",
        alias = "hints",
        skip_serializing_if = "Option::is_none"
    )]
    pub hints: Option<VizHints>,
}

impl TabularResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            hints: None,
        }
    }

    pub fn with_hints(mut self, hints: VizHints) -> Self {
        self.hints = Some(hints);
        self
    }

    /// Best-effort extraction from an untyped backend payload.
    ///
    /// Returns `None` unless the payload carries both a `columns` array and a
    /// `rows` array. Rows that are not arrays are skipped and hints that fail
    /// to parse are dropped rather than rejecting the whole table.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let columns = payload.get("columns")?.as_array()?;
        let rows = payload.get("rows")?.as_array()?;

        let columns = columns.iter().map(cell_text).collect();
        let rows = rows
            .iter()
            .filter_map(|row| row.as_array().cloned())
            .collect();
        let hints = payload
            .get("viz_hints")
            .or_else(|| payload.get("hints"))
            .filter(|h| h.is_object())
            .and_then(|h| serde_json::from_value::<VizHints>(h.clone()).ok());

        Some(Self {
            columns,
            rows,
            hints,
        })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Coerce a cell to display text.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Coerce a cell to a number. Missing and non-numeric cells become 0.
pub fn cell_number(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().unwrap_or(0.0)
            }
        }
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// Returns the cell at `idx`, treating null the same as absent.
pub(crate) fn present(row: &[Value], idx: Option<usize>) -> Option<&Value> {
    idx.and_then(|i| row.get(i)).filter(|v| !v.is_null())
}
