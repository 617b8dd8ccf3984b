//! Tolerance-based comparison of two parsed probe files.

mod tolerance;

pub use tolerance::{DEFAULT_RELATIVE_FLOOR, Tolerance, ValueComparison, compare_values};

use crate::domain::FdtdError;
use crate::probes::{ParseError, ProbeRecord, read_probe};
use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tolerance::format_value;

#[derive(Debug, thiserror::Error)]
pub enum ComparatorError {
    #[error("failed to read comparison policy '{}': {source}", path.display())]
    ReadPolicy {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse comparison policy '{}': {source}", path.display())]
    ParsePolicy {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        source: globset::Error,
    },
    #[error("invalid comparison policy: {0}")]
    InvalidPolicy(String),
}

impl From<ComparatorError> for FdtdError {
    fn from(error: ComparatorError) -> Self {
        let message = error.to_string();
        match error {
            ComparatorError::ReadPolicy { .. } => {
                FdtdError::io_system("IO.COMPARE_POLICY", message)
            }
            ComparatorError::ParsePolicy { .. }
            | ComparatorError::InvalidGlob { .. }
            | ComparatorError::InvalidPolicy(_) => {
                FdtdError::input_validation("INPUT.COMPARE_POLICY", message)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPolicy {
    #[serde(rename = "defaultTolerance", default)]
    default_tolerance: Tolerance,
    #[serde(default)]
    categories: Vec<RawPolicyCategory>,
}

#[derive(Debug, Deserialize)]
struct RawPolicyCategory {
    id: String,
    #[serde(rename = "fileGlobs", default)]
    file_globs: Vec<String>,
    tolerance: Tolerance,
}

struct CompiledCategory {
    id: String,
    tolerance: Tolerance,
    matchers: Vec<GlobMatcher>,
}

impl CompiledCategory {
    fn matches(&self, file_name: &str) -> bool {
        let path = Path::new(file_name);
        self.matchers.iter().any(|matcher| matcher.is_match(path))
    }
}

/// Compares probe records under a per-file tolerance policy.
///
/// Categories are tried in policy order against the expected probe's file
/// name; the first match wins and unmatched files use the default tolerance.
pub struct ProbeComparator {
    default_tolerance: Tolerance,
    categories: Vec<CompiledCategory>,
}

impl Default for ProbeComparator {
    fn default() -> Self {
        Self::with_tolerance(Tolerance::default())
    }
}

impl ProbeComparator {
    pub fn with_tolerance(tolerance: Tolerance) -> Self {
        Self {
            default_tolerance: tolerance,
            categories: Vec::new(),
        }
    }

    pub fn from_policy_path(policy_path: impl AsRef<Path>) -> Result<Self, ComparatorError> {
        let policy_path = policy_path.as_ref();
        let content =
            fs::read_to_string(policy_path).map_err(|source| ComparatorError::ReadPolicy {
                path: policy_path.to_path_buf(),
                source,
            })?;
        let raw: RawPolicy =
            serde_json::from_str(&content).map_err(|source| ComparatorError::ParsePolicy {
                path: policy_path.to_path_buf(),
                source,
            })?;
        Self::from_raw_policy(raw)
    }

    pub fn from_policy_json(policy_json: &str) -> Result<Self, ComparatorError> {
        let raw: RawPolicy =
            serde_json::from_str(policy_json).map_err(|source| ComparatorError::ParsePolicy {
                path: PathBuf::from("<inline-policy>"),
                source,
            })?;
        Self::from_raw_policy(raw)
    }

    fn from_raw_policy(raw: RawPolicy) -> Result<Self, ComparatorError> {
        raw.default_tolerance
            .validate()
            .map_err(|reason| ComparatorError::InvalidPolicy(format!("defaultTolerance: {reason}")))?;

        let mut seen_ids = HashSet::new();
        let mut categories = Vec::with_capacity(raw.categories.len());
        for category in raw.categories {
            if !seen_ids.insert(category.id.clone()) {
                return Err(ComparatorError::InvalidPolicy(format!(
                    "category '{}' is defined more than once",
                    category.id
                )));
            }
            if category.file_globs.is_empty() {
                return Err(ComparatorError::InvalidPolicy(format!(
                    "category '{}' does not define any fileGlobs",
                    category.id
                )));
            }
            category.tolerance.validate().map_err(|reason| {
                ComparatorError::InvalidPolicy(format!("category '{}': {reason}", category.id))
            })?;

            let mut matchers = Vec::with_capacity(category.file_globs.len());
            for pattern in category.file_globs {
                let matcher = Glob::new(&pattern)
                    .map_err(|source| ComparatorError::InvalidGlob {
                        pattern: pattern.clone(),
                        source,
                    })?
                    .compile_matcher();
                matchers.push(matcher);
            }

            categories.push(CompiledCategory {
                id: category.id,
                tolerance: category.tolerance,
                matchers,
            });
        }

        Ok(Self {
            default_tolerance: raw.default_tolerance,
            categories,
        })
    }

    /// The category id (if any) and tolerance that apply to `file_name`.
    pub fn resolve_tolerance(&self, file_name: &str) -> (Option<&str>, Tolerance) {
        self.categories
            .iter()
            .find(|category| category.matches(file_name))
            .map_or((None, self.default_tolerance), |category| {
                (Some(category.id.as_str()), category.tolerance)
            })
    }

    pub fn compare(&self, expected: &ProbeRecord, actual: &ProbeRecord) -> ProbeComparison {
        let file_name = expected.file_name().to_string();
        let (category, tolerance) = self.resolve_tolerance(&file_name);
        let category = category.map(str::to_string);

        if expected.kind() != actual.kind() {
            return ProbeComparison {
                reason: Some(format!(
                    "probe kind mismatch (expected={}, actual={})",
                    expected.kind(),
                    actual.kind()
                )),
                file_name,
                category,
                tolerance,
                passed: false,
                columns: Vec::new(),
            };
        }

        let expected_columns = expected.series().columns();
        let actual_columns = actual.series().columns();
        let mut columns = Vec::with_capacity(expected_columns.len());
        for (name, expected_values) in &expected_columns {
            let actual_values = actual.column(name).unwrap_or(&[]);
            columns.push(compare_column(name, expected_values, actual_values, tolerance));
        }
        for (name, actual_values) in &actual_columns {
            if expected.column(name).is_none() {
                columns.push(compare_column(name, &[], actual_values, tolerance));
            }
        }

        let reason = columns.iter().find_map(ColumnComparison::failure_reason);
        let comparison = ProbeComparison {
            file_name,
            category,
            tolerance,
            passed: reason.is_none(),
            reason,
            columns,
        };
        tracing::debug!(
            file = %comparison.file_name,
            passed = comparison.passed,
            failing = comparison.failing_values(),
            "compared probe records"
        );
        comparison
    }
}

/// Reads both probe files and compares them.
pub fn compare_probe_files(
    comparator: &ProbeComparator,
    expected_path: impl AsRef<Path>,
    actual_path: impl AsRef<Path>,
) -> Result<ProbeComparison, ParseError> {
    let expected = read_probe(expected_path)?;
    let actual = read_probe(actual_path)?;
    Ok(comparator.compare(&expected, &actual))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeComparison {
    pub file_name: String,
    pub category: Option<String>,
    pub tolerance: Tolerance,
    pub passed: bool,
    pub reason: Option<String>,
    pub columns: Vec<ColumnComparison>,
}

impl ProbeComparison {
    pub fn failing_values(&self) -> usize {
        self.columns.iter().map(|column| column.failing_values).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnComparison {
    pub name: String,
    pub expected_len: usize,
    pub actual_len: usize,
    pub compared_values: usize,
    pub failing_values: usize,
    pub max_abs_diff: f64,
    pub max_rel_diff: f64,
    pub first_failure: Option<ValueMismatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueMismatch {
    pub index: usize,
    pub expected: f64,
    pub actual: f64,
    pub abs_diff: f64,
}

impl ColumnComparison {
    pub fn passed(&self) -> bool {
        self.failing_values == 0
    }

    fn failure_reason(&self) -> Option<String> {
        if self.passed() {
            return None;
        }
        if self.expected_len != self.actual_len {
            return Some(format!(
                "column '{}' length mismatch (expected={}, actual={})",
                self.name, self.expected_len, self.actual_len
            ));
        }
        let detail = self.first_failure.as_ref().map_or_else(
            || "no failure details available".to_string(),
            |mismatch| {
                format!(
                    "first at index {} expected={} actual={} abs_diff={}",
                    mismatch.index,
                    format_value(mismatch.expected),
                    format_value(mismatch.actual),
                    format_value(mismatch.abs_diff)
                )
            },
        );
        Some(format!(
            "column '{}' has {} value(s) outside tolerance; {}",
            self.name, self.failing_values, detail
        ))
    }
}

fn compare_column(
    name: &str,
    expected: &[f64],
    actual: &[f64],
    tolerance: Tolerance,
) -> ColumnComparison {
    let compared_values = expected.len().min(actual.len());
    let mut failing_values = expected.len().max(actual.len()) - compared_values;
    let mut max_abs_diff = 0.0_f64;
    let mut max_rel_diff = 0.0_f64;
    let mut first_failure = None;

    for (index, (expected_value, actual_value)) in expected.iter().zip(actual).enumerate() {
        let comparison = compare_values(*expected_value, *actual_value, tolerance);
        max_abs_diff = max_abs_diff.max(comparison.abs_diff);
        max_rel_diff = max_rel_diff.max(comparison.rel_diff);
        if !comparison.passes {
            failing_values += 1;
            if first_failure.is_none() {
                first_failure = Some(ValueMismatch {
                    index,
                    expected: *expected_value,
                    actual: *actual_value,
                    abs_diff: comparison.abs_diff,
                });
            }
        }
    }

    ColumnComparison {
        name: name.to_string(),
        expected_len: expected.len(),
        actual_len: actual.len(),
        compared_values,
        failing_values,
        max_abs_diff,
        max_rel_diff,
        first_failure,
    }
}
