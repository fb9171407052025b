use crate::error::{Result, ToolError};
use crate::traits::{Tool, ToolSpec, require_string};
use async_trait::async_trait;

const SUMMARY_PREVIEW_CHARS: usize = 200;

/// Data analysis capability: descriptive statistics over numeric arrays,
/// field discovery over record arrays, text summaries. Chart generation and
/// comparison stay descriptive until a rendering backend exists.
pub struct AnalysisTool;

#[async_trait]
impl Tool for AnalysisTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "analysis".to_string(),
            description: "Analyze data: compute statistics, summarize datasets or text, compare values, or describe a visualization.".to_string(),
            parameters_schema: serde_json::json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "operation": { "type": "string", "enum": ["statistics", "summarize", "visualize", "compare"] },
                    "data": {},
                    "options": { "type": "object" }
                },
                "required": ["operation", "data"]
            }),
            default_needs_approval: false,
        }
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let operation = require_string(&arguments, "operation")?;
        let data = arguments
            .get("data")
            .ok_or_else(|| ToolError::InvalidArguments("missing key: data".to_string()))?;
        let options = arguments.get("options").cloned().unwrap_or_default();

        match operation.as_str() {
            "statistics" => statistics(data),
            "summarize" => Ok(summarize(data)),
            "visualize" => Ok(serde_json::json!({
                "operation": "visualize",
                "chart_type": options.get("chart_type").and_then(|v| v.as_str()).unwrap_or("bar"),
                "message": "No rendering backend is attached; describe the chart from the statistics instead.",
            })),
            "compare" => Ok(serde_json::json!({
                "operation": "compare",
                "message": "Pairwise comparison is limited to the statistics above; compute statistics per series and compare.",
            })),
            other => Err(ToolError::InvalidArguments(format!(
                "unknown operation: {other}"
            ))),
        }
    }
}

fn statistics(data: &serde_json::Value) -> Result<serde_json::Value> {
    let Some(items) = data.as_array() else {
        return Err(ToolError::InvalidArguments(
            "statistics requires an array of numbers or records".to_string(),
        ));
    };
    if items.is_empty() {
        return Err(ToolError::InvalidArguments(
            "statistics requires a non-empty array".to_string(),
        ));
    }

    let numbers: Option<Vec<f64>> = items.iter().map(|v| v.as_f64()).collect();
    if let Some(numbers) = numbers {
        let count = numbers.len();
        let sum: f64 = numbers.iter().sum();
        let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
        let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        return Ok(serde_json::json!({
            "operation": "statistics",
            "count": count,
            "sum": sum,
            "average": sum / count as f64,
            "min": min,
            "max": max,
        }));
    }

    if let Some(first) = items[0].as_object() {
        let fields: Vec<&String> = first.keys().collect();
        return Ok(serde_json::json!({
            "operation": "statistics",
            "count": items.len(),
            "fields": fields,
            "note": "Record array; extract a numeric field for detailed statistics.",
        }));
    }

    Err(ToolError::InvalidArguments(
        "statistics requires an array of numbers or records".to_string(),
    ))
}

fn summarize(data: &serde_json::Value) -> serde_json::Value {
    let text = match data {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let preview: String = text.chars().take(SUMMARY_PREVIEW_CHARS).collect();
    serde_json::json!({
        "operation": "summarize",
        "length": text.chars().count(),
        "preview": preview,
    })
}
