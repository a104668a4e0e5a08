use serde_json::{json, Value};

use crate::resolver::{ChartKind, ChartSpec, LegendPosition};

impl ChartSpec {
    /// Render as a Chart.js configuration object.
    ///
    /// Horizontal bars are a `bar` chart with `indexAxis: "y"`.
    pub fn to_chartjs(&self, color: &str) -> Value {
        let chart_type = match &self.kind {
            ChartKind::BarHorizontal => "bar",
            other => other.as_str(),
        };
        let fill = self.kind != ChartKind::Line;

        let mut options = json!({
            "responsive": true,
            "plugins": {
                "legend": {
                    "display": self.legend.display,
                    "position": match self.legend.position {
                        LegendPosition::Top => "top",
                        LegendPosition::Bottom => "bottom",
                    },
                },
            },
            "scales": {},
        });
        if self.kind.is_horizontal() {
            options["indexAxis"] = json!("y");
        }
        if let Some(scales) = &self.scales {
            options["scales"] = json!({
                "x": { "ticks": { "autoSkip": scales.category_auto_skip } },
                "y": { "beginAtZero": scales.value_begin_at_zero },
            });
        }

        json!({
            "type": chart_type,
            "data": {
                "labels": self.labels,
                "datasets": [{
                    "label": self.dataset_label(),
                    "data": self.values,
                    "backgroundColor": color,
                    "borderColor": color,
                    "fill": fill,
                }],
            },
            "options": options,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::resolver::resolve;
    use crate::tabular::{TabularResult, VizHints};
    use serde_json::json;

    fn table(n: usize) -> TabularResult {
        let rows = (0..n).map(|i| vec![json!(format!("r{}", i)), json!(i)]).collect();
        TabularResult::new(vec!["name".into(), "count".into()], rows)
    }

    #[test]
    fn test_bar_config() {
        let config = resolve(&table(3)).to_chartjs("#da291c");
        assert_eq!(config["type"], "bar");
        assert_eq!(config["data"]["labels"], json!(["r0", "r1", "r2"]));
        let dataset = &config["data"]["datasets"][0];
        assert_eq!(dataset["label"], "count");
        assert_eq!(dataset["data"], json!([0.0, 1.0, 2.0]));
        assert_eq!(dataset["backgroundColor"], "#da291c");
        assert_eq!(dataset["fill"], true);
        assert!(config["options"].get("indexAxis").is_none());
        assert_eq!(config["options"]["scales"]["x"]["ticks"]["autoSkip"], true);
        assert_eq!(config["options"]["scales"]["y"]["beginAtZero"], true);
        assert_eq!(config["options"]["plugins"]["legend"]["position"], "bottom");
        assert_eq!(config["options"]["plugins"]["legend"]["display"], true);
    }

    #[test]
    fn test_horizontal_bar_sets_index_axis() {
        let config = resolve(&table(20)).to_chartjs("#000");
        assert_eq!(config["type"], "bar");
        assert_eq!(config["options"]["indexAxis"], "y");
    }

    #[test]
    fn test_line_is_not_filled() {
        let spec = resolve(&table(2).with_hints(VizHints {
            is_time_series: Some(true),
            ..VizHints::default()
        }));
        let config = spec.to_chartjs("#000");
        assert_eq!(config["type"], "line");
        assert_eq!(config["data"]["datasets"][0]["fill"], false);
    }

    #[test]
    fn test_doughnut_has_empty_scales() {
        let spec = resolve(&table(2).with_hints(VizHints {
            percent_like: Some(true),
            ..VizHints::default()
        }));
        let config = spec.to_chartjs("#000");
        assert_eq!(config["type"], "doughnut");
        assert_eq!(config["options"]["scales"], json!({}));
    }
}
