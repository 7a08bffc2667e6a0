//! Criterion status lattice and per-criterion evidence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Assessment status of one criterion for one group
///
/// Totally ordered: `Grey < Red < Green`. Green is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum CriterionStatus {
    /// No evidence seen
    Grey,
    /// Evidence seen but incomplete or incorrect
    Red,
    /// Evidence satisfies the rubric
    Green,
}

impl CriterionStatus {
    /// Database / wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CriterionStatus::Grey => "GREY",
            CriterionStatus::Red => "RED",
            CriterionStatus::Green => "GREEN",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CriterionStatus::Green)
    }
}

impl fmt::Display for CriterionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CriterionStatus {
    type Err = String;

    /// Case-insensitive; accepts the "gray" spelling the oracle sometimes uses
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GREY" | "GRAY" => Ok(CriterionStatus::Grey),
            "RED" => Ok(CriterionStatus::Red),
            "GREEN" => Ok(CriterionStatus::Green),
            other => Err(format!("unknown criterion status: {}", other)),
        }
    }
}

impl TryFrom<String> for CriterionStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Status together with the evidence valid for it
///
/// Grey never carries a quote; Red and Green always do. Serialized as
/// `{"status": "...", "quote": ...}` with `quote: null` for Grey.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "EvidenceRepr", into = "EvidenceRepr")]
pub enum Evidence {
    #[default]
    Grey,
    Red { quote: String },
    Green { quote: String },
}

impl Evidence {
    /// Build evidence from loosely-typed parts
    ///
    /// A non-Grey status without a non-blank quote collapses to Grey; a quote
    /// supplied alongside Grey is discarded.
    pub fn from_parts(status: CriterionStatus, quote: Option<String>) -> Self {
        let quote = quote.filter(|q| !q.trim().is_empty());
        match (status, quote) {
            (CriterionStatus::Red, Some(quote)) => Evidence::Red { quote },
            (CriterionStatus::Green, Some(quote)) => Evidence::Green { quote },
            _ => Evidence::Grey,
        }
    }

    pub fn status(&self) -> CriterionStatus {
        match self {
            Evidence::Grey => CriterionStatus::Grey,
            Evidence::Red { .. } => CriterionStatus::Red,
            Evidence::Green { .. } => CriterionStatus::Green,
        }
    }

    pub fn quote(&self) -> Option<&str> {
        match self {
            Evidence::Grey => None,
            Evidence::Red { quote } | Evidence::Green { quote } => Some(quote),
        }
    }

    pub fn is_grey(&self) -> bool {
        matches!(self, Evidence::Grey)
    }
}

#[derive(Serialize, Deserialize)]
struct EvidenceRepr {
    status: CriterionStatus,
    #[serde(default)]
    quote: Option<String>,
}

impl From<EvidenceRepr> for Evidence {
    fn from(repr: EvidenceRepr) -> Self {
        Evidence::from_parts(repr.status, repr.quote)
    }
}

impl From<Evidence> for EvidenceRepr {
    fn from(evidence: Evidence) -> Self {
        let status = evidence.status();
        let quote = match evidence {
            Evidence::Grey => None,
            Evidence::Red { quote } | Evidence::Green { quote } => Some(quote),
        };
        EvidenceRepr { status, quote }
    }
}

/// Durable assessment state of one criterion for one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    /// Criterion `order_index`
    pub criterion_index: u32,
    #[serde(flatten)]
    pub evidence: Evidence,
    pub updated_at: DateTime<Utc>,
}

impl AssessmentRecord {
    /// Lazily-created record for a criterion nothing has been said about yet
    pub fn grey(criterion_index: u32, updated_at: DateTime<Utc>) -> Self {
        Self {
            criterion_index,
            evidence: Evidence::Grey,
            updated_at,
        }
    }

    pub fn status(&self) -> CriterionStatus {
        self.evidence.status()
    }

    pub fn quote(&self) -> Option<&str> {
        self.evidence.quote()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_total_order() {
        assert!(CriterionStatus::Grey < CriterionStatus::Red);
        assert!(CriterionStatus::Red < CriterionStatus::Green);
        assert!(CriterionStatus::Grey < CriterionStatus::Green);
    }

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!("green".parse::<CriterionStatus>(), Ok(CriterionStatus::Green));
        assert_eq!(" Red ".parse::<CriterionStatus>(), Ok(CriterionStatus::Red));
        assert_eq!("gray".parse::<CriterionStatus>(), Ok(CriterionStatus::Grey));
        assert!("amber".parse::<CriterionStatus>().is_err());
    }

    #[test]
    fn test_status_deserializes_lowercase() {
        let status: CriterionStatus = serde_json::from_value(json!("green")).unwrap();
        assert_eq!(status, CriterionStatus::Green);
        assert_eq!(serde_json::to_value(status).unwrap(), json!("GREEN"));
    }

    #[test]
    fn test_evidence_from_parts_requires_quote() {
        assert_eq!(
            Evidence::from_parts(CriterionStatus::Red, None),
            Evidence::Grey
        );
        assert_eq!(
            Evidence::from_parts(CriterionStatus::Green, Some("   ".to_string())),
            Evidence::Grey
        );
        assert_eq!(
            Evidence::from_parts(CriterionStatus::Grey, Some("ignored".to_string())),
            Evidence::Grey
        );
        assert_eq!(
            Evidence::from_parts(CriterionStatus::Green, Some("pH 7".to_string())),
            Evidence::Green {
                quote: "pH 7".to_string()
            }
        );
    }

    #[test]
    fn test_evidence_wire_format() {
        let grey = serde_json::to_value(Evidence::Grey).unwrap();
        assert_eq!(grey, json!({"status": "GREY", "quote": null}));

        let red = serde_json::to_value(Evidence::Red {
            quote: "partial answer".to_string(),
        })
        .unwrap();
        assert_eq!(red, json!({"status": "RED", "quote": "partial answer"}));

        // Inconsistent input collapses to Grey instead of failing
        let parsed: Evidence = serde_json::from_value(json!({"status": "GREEN"})).unwrap();
        assert_eq!(parsed, Evidence::Grey);
    }

    #[test]
    fn test_record_flattens_evidence() {
        let record = AssessmentRecord {
            criterion_index: 2,
            evidence: Evidence::Green {
                quote: "uses back titration".to_string(),
            },
            updated_at: chrono::Utc::now(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["criterion_index"], 2);
        assert_eq!(value["status"], "GREEN");
        assert_eq!(value["quote"], "uses back titration");

        let back: AssessmentRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
