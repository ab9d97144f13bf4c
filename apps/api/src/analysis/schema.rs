//! Structural check of the raw model response, run before normalization.
//!
//! The normalizer never fails, so a response that drifted from the prompt's
//! schema would otherwise render as a page of placeholders with no signal.
//! `check_shape` reports that drift so it can be logged and returned to the
//! caller as warnings.

use std::fmt;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expected {
    Object,
    Array,
}

const SECTIONS: &[(&str, Expected)] = &[
    ("profile", Expected::Object),
    ("strengthsWeaknesses", Expected::Object),
    ("competitors", Expected::Array),
    ("fundingHistory", Expected::Array),
    ("marketComparison", Expected::Object),
    ("expertOpinions", Expected::Array),
    ("expertConclusion", Expected::Object),
    ("expertInsights", Expected::Object),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeIssue {
    NotAnObject,
    MissingSection(&'static str),
    WrongType {
        section: &'static str,
        expected: &'static str,
    },
    CompetitorMetricsMismatch {
        competitors: usize,
        metric_columns: usize,
    },
}

impl fmt::Display for ShapeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeIssue::NotAnObject => f.write_str("response is not a JSON object"),
            ShapeIssue::MissingSection(section) => write!(f, "section '{section}' is missing"),
            ShapeIssue::WrongType { section, expected } => {
                write!(f, "section '{section}' is not an {expected}")
            }
            ShapeIssue::CompetitorMetricsMismatch {
                competitors,
                metric_columns,
            } => write!(
                f,
                "{competitors} competitors but {metric_columns} competitor columns in market comparison"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeCheck {
    Conforming,
    Degraded(Vec<ShapeIssue>),
}

impl ShapeCheck {
    pub fn is_conforming(&self) -> bool {
        matches!(self, ShapeCheck::Conforming)
    }

    pub fn warnings(&self) -> Vec<String> {
        match self {
            ShapeCheck::Conforming => Vec::new(),
            ShapeCheck::Degraded(issues) => issues.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Compares a raw response against the prompt's output schema.
/// `dealStructure` is optional by contract and is not checked.
pub fn check_shape(raw: &Value) -> ShapeCheck {
    let Some(root) = raw.as_object() else {
        return ShapeCheck::Degraded(vec![ShapeIssue::NotAnObject]);
    };

    let mut issues = Vec::new();
    for &(section, expected) in SECTIONS {
        match (root.get(section), expected) {
            (None | Some(Value::Null), _) => issues.push(ShapeIssue::MissingSection(section)),
            (Some(Value::Object(_)), Expected::Object) | (Some(Value::Array(_)), Expected::Array) => {}
            (Some(_), Expected::Object) => issues.push(ShapeIssue::WrongType {
                section,
                expected: "object",
            }),
            (Some(_), Expected::Array) => issues.push(ShapeIssue::WrongType {
                section,
                expected: "array",
            }),
        }
    }

    let competitors = raw
        .get("competitors")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0);
    let metric_columns = raw
        .pointer("/marketComparison/metrics/marketShare")
        .and_then(Value::as_object)
        .map(|share| share.keys().filter(|k| k.as_str() != "startup").count());
    if let Some(metric_columns) = metric_columns {
        if metric_columns != competitors {
            issues.push(ShapeIssue::CompetitorMetricsMismatch {
                competitors,
                metric_columns,
            });
        }
    }

    if issues.is_empty() {
        ShapeCheck::Conforming
    } else {
        ShapeCheck::Degraded(issues)
    }
}
