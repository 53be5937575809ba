//! Output formatting for the command-line interface.

use crate::insights::InsightsSummary;
use anyhow::Result;
use clap::ValueEnum;

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON, as returned by `GET /insights`
    Json,
    /// Plain text summary
    #[default]
    Text,
}

/// Format an insights summary as plain text.
pub fn format_insights_text(summary: &InsightsSummary) -> String {
    let dist = &summary.priority_distribution;
    let mut out = String::new();

    out.push_str(&format!("Open tasks:      {}\n", summary.total_open));
    out.push_str(&format!("Due in 7 days:   {}\n", summary.due_soon_count));
    out.push_str(&format!(
        "By priority:     High {} / Medium {} / Low {}\n",
        dist.high, dist.medium, dist.low
    ));
    out.push('\n');
    out.push_str(&summary.insight);
    out.push('\n');

    out
}

/// Format an insights summary in the requested format.
pub fn format_insights(summary: &InsightsSummary, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(summary)? + "\n"),
        OutputFormat::Text => Ok(format_insights_text(summary)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::PriorityDistribution;

    fn summary() -> InsightsSummary {
        InsightsSummary {
            total_open: 3,
            priority_distribution: PriorityDistribution {
                low: 1,
                medium: 0,
                high: 2,
            },
            due_soon_count: 1,
            insight: "You have 3 open tasks.".to_string(),
        }
    }

    #[test]
    fn text_lists_counts_and_sentence() {
        let text = format_insights_text(&summary());
        assert!(text.contains("Open tasks:      3"));
        assert!(text.contains("High 2 / Medium 0 / Low 1"));
        assert!(text.trim_end().ends_with("You have 3 open tasks."));
    }

    #[test]
    fn json_matches_api_shape() {
        let json = format_insights(&summary(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["totalOpen"], 3);
        assert_eq!(value["priorityDistribution"]["High"], 2);
    }
}
