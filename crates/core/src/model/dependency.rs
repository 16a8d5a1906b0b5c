use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Relationship type between two services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyKind {
    HttpCall,
    MessagePublish,
    MessageSubscribe,
    DatabaseAccess,
    ConfigReference,
}

impl DependencyKind {
    pub const ALL: [DependencyKind; 5] = [
        DependencyKind::HttpCall,
        DependencyKind::MessagePublish,
        DependencyKind::MessageSubscribe,
        DependencyKind::DatabaseAccess,
        DependencyKind::ConfigReference,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DependencyKind::HttpCall => "http-call",
            DependencyKind::MessagePublish => "message-publish",
            DependencyKind::MessageSubscribe => "message-subscribe",
            DependencyKind::DatabaseAccess => "database-access",
            DependencyKind::ConfigReference => "config-reference",
        }
    }

    /// Relationship type used in the graph store, e.g. `HTTP_CALL`.
    pub fn relationship_type(self) -> String {
        self.as_str().replace('-', "_").to_uppercase()
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        DependencyKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("Unknown dependency kind: {}", s))
    }
}

/// How strongly the retrieved context backs a candidate. Not a probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn to_f64(self) -> f64 {
        match self {
            Confidence::High => 0.95,
            Confidence::Medium => 0.7,
            Confidence::Low => 0.4,
        }
    }

    pub fn to_f32(self) -> f32 {
        self.to_f64() as f32
    }
}

/// Source location that justified a dependency claim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Evidence {
    pub path: PathBuf,
    pub start_line: usize,
    pub end_line: usize,
    pub snippet: String,
}

impl Evidence {
    pub fn new(path: impl Into<PathBuf>, start_line: usize, end_line: usize, snippet: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            start_line,
            end_line,
            snippet: snippet.into(),
        }
    }
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}",
            self.path.display(),
            self.start_line,
            self.end_line
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "name", rename_all = "lowercase")]
pub enum TargetRef {
    Resolved(String),
    Unresolved(String),
}

impl TargetRef {
    pub fn name(&self) -> &str {
        match self {
            TargetRef::Resolved(name) | TargetRef::Unresolved(name) => name,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, TargetRef::Resolved(_))
    }
}

/// One dependency claim surfaced by a single model call. Several candidates
/// may describe the same real dependency.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DependencyFactCandidate {
    pub source: String,
    pub target: TargetRef,
    pub kind: DependencyKind,
    pub evidence: Vec<Evidence>,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_key: Option<String>,
}

/// Retrievable unit of a service's source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChunk {
    pub id: String,
    pub service: String,
    pub path: PathBuf,
    pub start_line: usize,
    pub end_line: usize,
    pub start_byte: usize,
    pub end_byte: usize,
    pub text: String,
}

impl CodeChunk {
    pub fn provenance(&self) -> String {
        format!(
            "{}:{}-{}",
            self.path.display(),
            self.start_line,
            self.end_line
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in DependencyKind::ALL {
            assert_eq!(kind.as_str().parse::<DependencyKind>().unwrap(), kind);
        }
        assert_eq!(
            "HTTP_CALL".parse::<DependencyKind>().unwrap(),
            DependencyKind::HttpCall
        );
        assert!("rpc".parse::<DependencyKind>().is_err());
    }

    #[test]
    fn test_relationship_type() {
        assert_eq!(DependencyKind::HttpCall.relationship_type(), "HTTP_CALL");
        assert_eq!(
            DependencyKind::ConfigReference.relationship_type(),
            "CONFIG_REFERENCE"
        );
    }

    #[test]
    fn test_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&DependencyKind::MessageSubscribe).unwrap();
        assert_eq!(json, "\"message-subscribe\"");
    }

    #[test]
    fn test_confidence_ordering() {
        assert!(Confidence::High > Confidence::Medium);
        assert!(Confidence::Medium > Confidence::Low);
        assert_eq!(Confidence::High.to_f64(), 0.95);
    }

    #[test]
    fn test_evidence_display() {
        let evidence = Evidence::new("orders/src/client.ts", 10, 12, "fetch(...)");
        assert_eq!(evidence.to_string(), "orders/src/client.ts:10-12");
    }
}
