//! Report rendering.
//!
//! This module renders an [`AgreementReport`] as Markdown, JSON or CSV.

use crate::models::{AgreementReport, CategoryAgreement, ReportMetadata};
use anyhow::{anyhow, Context, Result};

/// Rendering knobs shared by the text formats.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Decimal places for rates.
    pub precision: usize,
    /// How many categories to list under "Least Consistent Categories".
    pub lowest_count: usize,
    /// Include raw pair counts alongside rates.
    pub include_counts: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            precision: 4,
            lowest_count: 5,
            include_counts: true,
        }
    }
}

impl From<&crate::config::ReportConfig> for RenderOptions {
    fn from(config: &crate::config::ReportConfig) -> Self {
        Self {
            precision: config.precision,
            lowest_count: config.lowest_count,
            include_counts: config.include_counts,
        }
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &AgreementReport, options: &RenderOptions) -> String {
    let mut output = String::new();

    output.push_str("# Category Agreement Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_rates_section(report, options));
    output.push_str(&generate_lowest_section(report, options));
    output.push_str(&generate_undefined_section(report));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Items:** {}\n", metadata.rows));
    if metadata.empty_rows > 0 {
        section.push_str(&format!("- **Unlabeled Items:** {}\n", metadata.empty_rows));
    }
    section.push_str(&format!("- **Annotations:** {}\n", metadata.annotations));
    if metadata.min_annotators == metadata.max_annotators {
        section.push_str(&format!(
            "- **Annotators per Item:** {}\n",
            metadata.max_annotators
        ));
    } else {
        section.push_str(&format!(
            "- **Annotators per Item:** {}-{}\n",
            metadata.min_annotators, metadata.max_annotators
        ));
    }
    section.push_str(&format!("- **Categories:** {}\n", metadata.categories));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.3}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn generate_rates_section(report: &AgreementReport, options: &RenderOptions) -> String {
    let mut section = String::new();

    section.push_str("## Agreement by Category\n\n");

    if report.categories.is_empty() {
        section.push_str("No categories were observed.\n\n");
        return section;
    }

    if options.include_counts {
        section.push_str("| Category | Rate | Agreeing Pairs | Potential Pairs | Occurrences | Items |\n");
        section.push_str("|:---|:---:|:---:|:---:|:---:|:---:|\n");
    } else {
        section.push_str("| Category | Rate |\n");
        section.push_str("|:---|:---:|\n");
    }

    for category in &report.categories {
        section.push_str(&generate_rate_row(category, options));
    }
    section.push('\n');

    section
}

fn generate_rate_row(category: &CategoryAgreement, options: &RenderOptions) -> String {
    let rate = format!("{:.*}", options.precision, category.rate);

    if options.include_counts {
        format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            inline_code(&category.category),
            rate,
            category.agreement,
            category.potential,
            category.occurrences,
            category.items
        )
    } else {
        format!("| {} | {} |\n", inline_code(&category.category), rate)
    }
}

fn generate_lowest_section(report: &AgreementReport, options: &RenderOptions) -> String {
    let lowest = report.least_consistent(options.lowest_count);
    // Nothing to single out when every category is listed anyway
    if lowest.is_empty() || report.categories.len() <= options.lowest_count {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Least Consistent Categories\n\n");

    for (i, category) in lowest.iter().enumerate() {
        section.push_str(&format!(
            "{}. {}: {:.*}\n",
            i + 1,
            inline_code(&category.category),
            options.precision,
            category.rate
        ));
    }
    section.push('\n');

    section
}

fn generate_undefined_section(report: &AgreementReport) -> String {
    let undefined: Vec<&CategoryAgreement> = report
        .categories
        .iter()
        .filter(|c| !c.rate.is_defined())
        .collect();

    if undefined.is_empty() {
        return String::new();
    }

    let names: Vec<String> = undefined
        .iter()
        .map(|c| inline_code(&c.category))
        .collect();

    format!(
        "## Undefined Rates\n\n\
         These categories only ever appeared on items with a single label, so no \
         annotator pair involved them: {}\n\n",
        names.join(", ")
    )
}

/// Render a label as a Markdown code span that is safe inside a table cell.
///
/// Line breaks become spaces and `|` is escaped. A label containing backticks
/// gets a fence one backtick longer than its longest run.
fn inline_code(label: &str) -> String {
    let text = label.replace("\r\n", " ").replace(['\n', '\r'], " ").replace('|', "\\|");

    let mut longest = 0;
    let mut run = 0;
    for c in text.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }

    if longest == 0 {
        return format!("`{}`", text);
    }
    let fence = "`".repeat(longest + 1);
    format!("{fence} {text} {fence}")
}

fn generate_footer() -> String {
    "---\n\n*Report generated by catagree*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &AgreementReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Generate a CSV report with one line per category.
///
/// Undefined rates are written as an empty field.
pub fn generate_csv_report(report: &AgreementReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record([
        "category",
        "rate",
        "agreement",
        "potential",
        "occurrences",
        "items",
    ])?;

    for category in &report.categories {
        let rate = category
            .rate
            .value()
            .map(|v| v.to_string())
            .unwrap_or_default();
        writer.write_record([
            category.category.clone(),
            rate,
            category.agreement.to_string(),
            category.potential.to_string(),
            category.occurrences.to_string(),
            category.items.to_string(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush CSV report: {}", e))?;
    String::from_utf8(bytes).context("CSV report is not valid UTF-8")
}
