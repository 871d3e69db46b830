//! Data models for agreement analysis.
//!
//! This module contains the label and dataset types fed into the
//! calculator, and the report structures built from its output.

use crate::agreement::{AgreementResult, PairCounts, Rate, UndefinedPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single category label as read from annotation data.
///
/// JSON and CSV input normalize the same way:
/// * integral numbers in `i64` range become `Int`, so `1`, `1.0` and `1e0`
///   name the same category
/// * other finite numbers become `Real`, spelled as `serde_json` prints them
/// * JSON booleans become `Bool` and never equal `Int(0)`/`Int(1)`
/// * everything else is `Text`, including the CSV fields `true`, `nan` and
///   `inf`, and the JSON string `"1"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    Bool(bool),
    Int(i64),
    /// Canonical decimal text of a non-integral number.
    Real(String),
    Text(String),
}

impl Label {
    /// Short name of the label kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Label::Bool(_) => "bool",
            Label::Int(_) => "integer",
            Label::Real(_) => "number",
            Label::Text(_) => "string",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Bool(b) => write!(f, "{}", b),
            Label::Int(i) => write!(f, "{}", i),
            Label::Real(r) => write!(f, "{}", r),
            Label::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Label {
    fn from(value: i64) -> Self {
        Label::Int(value)
    }
}

impl From<bool> for Label {
    fn from(value: bool) -> Self {
        Label::Bool(value)
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Label::Text(value.to_string())
    }
}

impl From<String> for Label {
    fn from(value: String) -> Self {
        Label::Text(value)
    }
}

/// Annotation data: one row of labels per annotated item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    /// Where the rows came from (file path or generator description).
    pub source: String,
    /// Labels applied to each item. Rows may differ in length.
    pub rows: Vec<Vec<Label>>,
}

impl Dataset {
    pub fn new(source: impl Into<String>, rows: Vec<Vec<Label>>) -> Self {
        Self {
            source: source.into(),
            rows,
        }
    }

    /// Compute shape statistics for the dataset.
    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary::from_rows(&self.rows)
    }
}

/// Shape statistics of a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// Number of rows (items).
    pub rows: usize,
    /// Rows without any label.
    pub empty_rows: usize,
    /// Total number of labels across all rows.
    pub annotations: usize,
    /// Fewest labels in a non-empty row.
    pub min_row_len: usize,
    /// Most labels in any row.
    pub max_row_len: usize,
}

impl DatasetSummary {
    pub fn from_rows<R: AsRef<[Label]>>(rows: &[R]) -> Self {
        let mut summary = Self {
            rows: rows.len(),
            ..Self::default()
        };

        for row in rows {
            let len = row.as_ref().len();
            summary.annotations += len;
            if len == 0 {
                summary.empty_rows += 1;
                continue;
            }
            if summary.min_row_len == 0 || len < summary.min_row_len {
                summary.min_row_len = len;
            }
            summary.max_row_len = summary.max_row_len.max(len);
        }

        summary
    }
}

/// Agreement statistics for one category in a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryAgreement {
    /// Display form of the category label.
    pub category: String,
    /// Agreement rate, `null` when undefined.
    pub rate: Rate,
    /// Annotator pairs that both applied the category.
    pub agreement: u64,
    /// Annotator pairs where at least one applied the category.
    pub potential: u64,
    /// Times the category was applied.
    pub occurrences: u64,
    /// Rows containing the category.
    pub items: u64,
}

impl CategoryAgreement {
    pub fn new(label: &Label, counts: &PairCounts) -> Self {
        Self {
            category: label.to_string(),
            rate: counts.rate(),
            agreement: counts.agreement,
            potential: counts.potential,
            occurrences: counts.occurrences,
            items: counts.items,
        }
    }
}

/// Metadata about the agreement report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Input file path or generator description.
    pub source: String,
    /// Date and time of the analysis.
    pub analysis_date: DateTime<Utc>,
    /// Number of rows (items) analyzed.
    pub rows: usize,
    /// Rows without any label.
    pub empty_rows: usize,
    /// Total number of labels.
    pub annotations: usize,
    /// Fewest annotators on a labeled item.
    pub min_annotators: usize,
    /// Most annotators on an item.
    pub max_annotators: usize,
    /// Number of categories in the report.
    pub categories: usize,
    /// Categories whose rate is undefined.
    pub undefined_categories: usize,
    /// Duration of loading and computation in seconds.
    pub duration_seconds: f64,
}

/// The complete agreement report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgreementReport {
    /// Metadata about the report.
    pub metadata: ReportMetadata,
    /// How categories with undefined rates were treated.
    pub undefined_policy: UndefinedPolicy,
    /// Per-category statistics, highest rate first, undefined last.
    pub categories: Vec<CategoryAgreement>,
}

impl AgreementReport {
    /// Build a report from a computed result and the dataset it came from.
    pub fn from_result(
        result: &AgreementResult<Label>,
        dataset: &Dataset,
        policy: UndefinedPolicy,
        duration_seconds: f64,
    ) -> Self {
        let mut entries: Vec<(&Label, &PairCounts)> = result.iter().collect();
        entries.sort_by(|a, b| compare_rates(a.1.rate(), b.1.rate()).then_with(|| a.0.cmp(b.0)));

        let categories: Vec<CategoryAgreement> = entries
            .into_iter()
            .map(|(label, counts)| CategoryAgreement::new(label, counts))
            .collect();

        let summary = dataset.summary();
        let metadata = ReportMetadata {
            source: dataset.source.clone(),
            analysis_date: Utc::now(),
            rows: summary.rows,
            empty_rows: summary.empty_rows,
            annotations: summary.annotations,
            min_annotators: summary.min_row_len,
            max_annotators: summary.max_row_len,
            categories: categories.len(),
            undefined_categories: categories.iter().filter(|c| !c.rate.is_defined()).count(),
            duration_seconds,
        };

        Self {
            metadata,
            undefined_policy: policy,
            categories,
        }
    }

    /// Categories with a defined rate below `threshold`.
    pub fn below_threshold(&self, threshold: f64) -> Vec<&CategoryAgreement> {
        self.categories
            .iter()
            .filter(|c| matches!(c.rate.value(), Some(v) if v < threshold))
            .collect()
    }

    /// Process exit code for a run checked against `min_rate`: 2 when some
    /// defined rate falls below it, 0 otherwise. Undefined rates never fail.
    pub fn exit_code(&self, min_rate: Option<f64>) -> i32 {
        match min_rate {
            Some(threshold) if !self.below_threshold(threshold).is_empty() => {
                EXIT_BELOW_THRESHOLD
            }
            _ => 0,
        }
    }

    /// The `n` defined categories with the lowest rates, lowest first.
    pub fn least_consistent(&self, n: usize) -> Vec<&CategoryAgreement> {
        let mut defined: Vec<&CategoryAgreement> =
            self.categories.iter().filter(|c| c.rate.is_defined()).collect();
        defined.reverse();
        defined.truncate(n);
        defined
    }
}

/// Exit code when a category's rate is below `--min-rate`.
pub const EXIT_BELOW_THRESHOLD: i32 = 2;

/// Order rates highest first with undefined rates last.
fn compare_rates(a: Rate, b: Rate) -> Ordering {
    match (a.value(), b.value()) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agreement::compute_agreement;

    fn labels(values: &[&str]) -> Vec<Label> {
        values.iter().map(|v| Label::from(*v)).collect()
    }

    fn sample_dataset() -> Dataset {
        Dataset::new(
            "sample.json",
            vec![
                labels(&["cat", "cat", "cat"]),
                labels(&["cat", "dog", "dog"]),
                labels(&["bird"]),
                vec![],
                labels(&["dog", "fish", "cat"]),
            ],
        )
    }

    #[test]
    fn test_label_identity() {
        assert_eq!(Label::from(1), Label::Int(1));
        assert_ne!(Label::Int(1), Label::Text("1".to_string()));
        assert_eq!(Label::Bool(true).to_string(), "true");
        assert_eq!(Label::Real("0.5".to_string()).kind(), "number");
    }

    #[test]
    fn test_dataset_summary() {
        let summary = sample_dataset().summary();
        assert_eq!(summary.rows, 5);
        assert_eq!(summary.empty_rows, 1);
        assert_eq!(summary.annotations, 10);
        assert_eq!(summary.min_row_len, 1);
        assert_eq!(summary.max_row_len, 3);
    }

    #[test]
    fn test_summary_of_empty_dataset() {
        let summary = Dataset::default().summary();
        assert_eq!(summary, DatasetSummary::default());
    }

    #[test]
    fn test_report_ordering() {
        let dataset = sample_dataset();
        let result = compute_agreement(&dataset.rows);
        let report = AgreementReport::from_result(&result, &dataset, UndefinedPolicy::Report, 0.1);

        let order: Vec<&str> = report.categories.iter().map(|c| c.category.as_str()).collect();
        // cat: 3/7, dog: 1/5, fish: 0/2, bird: undefined
        assert_eq!(order, vec!["cat", "dog", "fish", "bird"]);
        assert_eq!(report.metadata.categories, 4);
        assert_eq!(report.metadata.undefined_categories, 1);
        assert_eq!(report.metadata.empty_rows, 1);
    }

    #[test]
    fn test_report_thresholds() {
        let dataset = sample_dataset();
        let result = compute_agreement(&dataset.rows).with_policy(UndefinedPolicy::Omit);
        let report = AgreementReport::from_result(&result, &dataset, UndefinedPolicy::Omit, 0.0);

        assert_eq!(report.categories.len(), 3);

        let low: Vec<&str> = report
            .below_threshold(0.3)
            .iter()
            .map(|c| c.category.as_str())
            .collect();
        assert_eq!(low, vec!["dog", "fish"]);

        let least: Vec<&str> = report
            .least_consistent(2)
            .iter()
            .map(|c| c.category.as_str())
            .collect();
        assert_eq!(least, vec!["fish", "dog"]);
    }

    #[test]
    fn test_exit_code_for_min_rate() {
        let dataset = sample_dataset();
        let result = compute_agreement(&dataset.rows);
        let report = AgreementReport::from_result(&result, &dataset, UndefinedPolicy::Report, 0.0);

        assert_eq!(report.exit_code(None), 0);
        assert_eq!(report.exit_code(Some(0.0)), 0);
        assert_eq!(report.exit_code(Some(0.1)), EXIT_BELOW_THRESHOLD);
        assert_eq!(report.exit_code(Some(0.5)), 2);

        // bird is undefined and must not trip the threshold on its own
        let only_bird = Dataset::new("bird.json", vec![vec![Label::from("bird")]]);
        let result = compute_agreement(&only_bird.rows);
        let report = AgreementReport::from_result(&result, &only_bird, UndefinedPolicy::Report, 0.0);
        assert_eq!(report.exit_code(Some(1.0)), 0);
    }
}
