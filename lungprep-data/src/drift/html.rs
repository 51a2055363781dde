//! HTML dashboard for a drift report.

use super::DriftReport;
use crate::error::DataError;
use handlebars::Handlebars;
use serde_json::json;

const TEMPLATE_NAME: &str = "drift_report";

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Data drift report</title>
<style>
body { font-family: sans-serif; margin: 2rem; color: #222; }
table { border-collapse: collapse; margin-bottom: 1.5rem; }
th, td { border: 1px solid #ccc; padding: 0.3rem 0.7rem; text-align: left; }
th { background: #f3f3f3; }
.drift { color: #b00020; font-weight: bold; }
.stable { color: #1b5e20; }
</style>
</head>
<body>
<h1>Data drift report</h1>
<p>Generated {{generated_at}}. Reference rows: {{reference_rows}}, current rows: {{current_rows}}.</p>
<p>Dataset drift:
{{#if dataset_drift}}<span class="drift">detected</span>{{else}}<span class="stable">not detected</span>{{/if}}
({{drifted_columns}} of {{column_count}} columns drifted, share threshold {{share_threshold}}, p-value threshold {{p_value_threshold}}).</p>

<h2>Columns</h2>
<table>
<tr><th>Column</th><th>Compared by</th><th>Test</th><th>Statistic</th><th>df</th><th>p-value</th><th>PSI</th><th>Severity</th><th>Drift</th></tr>
{{#each columns}}
<tr><td>{{column}}</td><td>{{reduction}}</td><td>{{test}}</td><td>{{statistic}}</td><td>{{degrees_of_freedom}}</td><td>{{p_value}}</td><td>{{psi}}</td><td>{{severity}}</td>
<td>{{#if drift_detected}}<span class="drift">yes</span>{{else}}<span class="stable">no</span>{{/if}}</td></tr>
{{/each}}
</table>

{{#each columns}}
<h3>{{column}}</h3>
<table>
<tr><th>Category</th><th>Reference</th><th>Reference share</th><th>Current</th><th>Current share</th></tr>
{{#each categories}}
<tr><td>{{category}}</td><td>{{reference_count}}</td><td>{{reference_share}}</td><td>{{current_count}}</td><td>{{current_share}}</td></tr>
{{/each}}
</table>
{{/each}}
</body>
</html>
"#;

fn fixed(value: f64) -> String {
    format!("{value:.4}")
}

fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

pub(super) fn render(report: &DriftReport) -> Result<String, DataError> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);
    handlebars
        .register_template_string(TEMPLATE_NAME, TEMPLATE)
        .map_err(|e| DataError::drift(format!("template error: {e}")))?;

    let columns: Vec<_> = report
        .columns
        .iter()
        .map(|c| {
            let categories: Vec<_> = c
                .categories
                .iter()
                .map(|s| {
                    json!({
                        "category": s.category,
                        "reference_count": s.reference_count,
                        "reference_share": percent(s.reference_share),
                        "current_count": s.current_count,
                        "current_share": percent(s.current_share),
                    })
                })
                .collect();
            json!({
                "column": c.column,
                "reduction": serde_json::to_value(c.reduction).unwrap_or_default(),
                "test": serde_json::to_value(c.test).unwrap_or_default(),
                "statistic": fixed(c.statistic),
                "degrees_of_freedom": c.degrees_of_freedom,
                "p_value": fixed(c.p_value),
                "psi": fixed(c.psi),
                "severity": serde_json::to_value(c.severity).unwrap_or_default(),
                "drift_detected": c.drift_detected,
                "categories": categories,
            })
        })
        .collect();

    let data = json!({
        "generated_at": report.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        "reference_rows": report.reference_rows,
        "current_rows": report.current_rows,
        "dataset_drift": report.dataset_drift,
        "drifted_columns": report.drifted_columns,
        "column_count": report.columns.len(),
        "share_threshold": report.share_threshold,
        "p_value_threshold": report.p_value_threshold,
        "columns": columns,
    });

    handlebars
        .render(TEMPLATE_NAME, &data)
        .map_err(|e| DataError::drift(format!("render error: {e}")))
}
