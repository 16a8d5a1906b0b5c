use super::prompt::CONFIG_SENTINEL;
use serde::Deserialize;
use std::path::PathBuf;
use svcgraph_core::model::{
    CodeChunk, Confidence, DependencyFactCandidate, DependencyKind, Evidence, TargetRef,
};
use svcgraph_llm::extract_json_from_markdown;

#[derive(Debug, Deserialize)]
pub struct ExtractionResponse {
    #[serde(default)]
    pub dependencies: Vec<ReportedDependency>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportedDependency {
    pub target: String,
    #[serde(default)]
    pub evidence: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub config_key: Option<String>,
}

pub fn parse_response(content: &str) -> Result<ExtractionResponse, serde_json::Error> {
    serde_json::from_str(extract_json_from_markdown(content))
}

/// Turns one reported dependency into a candidate, grading it against the
/// chunks the model was shown.
pub fn to_candidate(
    source: &str,
    kind: DependencyKind,
    reported: ReportedDependency,
    chunks: &[CodeChunk],
    known_services: &[String],
) -> Option<DependencyFactCandidate> {
    let target = reported.target.trim();
    if target.is_empty() {
        return None;
    }

    let config_key = reported
        .config_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .or_else(|| {
            target
                .strip_prefix(CONFIG_SENTINEL)
                .map(|k| k.trim().to_string())
        });

    let target = if known_services.iter().any(|id| id == target) {
        TargetRef::Resolved(target.to_string())
    } else {
        TargetRef::Unresolved(target.to_string())
    };

    let snippet = reported.evidence.as_deref().map(str::trim).unwrap_or("");
    let (evidence, confidence) = match locate_snippet(snippet, chunks) {
        Some(evidence) => (evidence, Confidence::High),
        None => {
            let mentioned = chunks.iter().any(|c| mentions(&c.text, target.name()));
            let evidence = reported_location(snippet, reported.path.as_deref(), chunks);
            let confidence = if mentioned {
                Confidence::Medium
            } else {
                Confidence::Low
            };
            (evidence, confidence)
        }
    };

    Some(DependencyFactCandidate {
        source: source.to_string(),
        target,
        kind,
        evidence: vec![evidence],
        confidence,
        config_key,
    })
}

/// Evidence pinned to the lines of the chunk that contains `snippet`.
fn locate_snippet(snippet: &str, chunks: &[CodeChunk]) -> Option<Evidence> {
    if snippet.is_empty() {
        return None;
    }
    for chunk in chunks {
        if let Some(offset) = chunk.text.find(snippet) {
            let start_line = chunk.start_line + chunk.text[..offset].matches('\n').count();
            let end_line = start_line + snippet.matches('\n').count();
            return Some(Evidence::new(&chunk.path, start_line, end_line, snippet));
        }
    }

    let wanted = collapse_whitespace(snippet);
    chunks
        .iter()
        .find(|chunk| collapse_whitespace(&chunk.text).contains(&wanted))
        .map(|chunk| Evidence::new(&chunk.path, chunk.start_line, chunk.end_line, snippet))
}

fn reported_location(snippet: &str, path: Option<&str>, chunks: &[CodeChunk]) -> Evidence {
    let path = path.map(str::trim).filter(|p| !p.is_empty());
    match path.and_then(|p| chunks.iter().find(|c| c.path == PathBuf::from(p))) {
        Some(chunk) => Evidence::new(&chunk.path, chunk.start_line, chunk.end_line, snippet),
        None => Evidence::new(path.unwrap_or("unknown"), 0, 0, snippet),
    }
}

fn mentions(text: &str, name: &str) -> bool {
    let name = name.strip_prefix(CONFIG_SENTINEL).unwrap_or(name);
    !name.is_empty() && text.to_lowercase().contains(&name.to_lowercase())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks() -> Vec<CodeChunk> {
        vec![CodeChunk {
            id: "c1".to_string(),
            service: "orders".to_string(),
            path: PathBuf::from("orders/src/client.ts"),
            start_line: 10,
            end_line: 13,
            start_byte: 0,
            end_byte: 0,
            text: "import fetch from 'node-fetch';\n\nconst routes = await fetch('http://gateway:8080/routes');\nconst url = config.get('db.url');\n".to_string(),
        }]
    }

    fn known() -> Vec<String> {
        vec!["gateway".to_string(), "orders".to_string()]
    }

    fn reported(target: &str, evidence: &str, path: Option<&str>) -> ReportedDependency {
        ReportedDependency {
            target: target.to_string(),
            evidence: Some(evidence.to_string()),
            path: path.map(str::to_string),
            config_key: None,
        }
    }

    #[test]
    fn test_verbatim_snippet_is_high_confidence() {
        let candidate = to_candidate(
            "orders",
            DependencyKind::HttpCall,
            reported("gateway", "fetch('http://gateway:8080/routes')", None),
            &chunks(),
            &known(),
        )
        .unwrap();

        assert_eq!(candidate.target, TargetRef::Resolved("gateway".to_string()));
        assert_eq!(candidate.confidence, Confidence::High);
        let evidence = &candidate.evidence[0];
        assert_eq!(evidence.path, PathBuf::from("orders/src/client.ts"));
        assert_eq!((evidence.start_line, evidence.end_line), (12, 12));
    }

    #[test]
    fn test_paraphrased_snippet_with_mentioned_target_is_medium() {
        let candidate = to_candidate(
            "orders",
            DependencyKind::HttpCall,
            reported("gateway", "calls the gateway routes endpoint", Some("orders/src/client.ts")),
            &chunks(),
            &known(),
        )
        .unwrap();

        assert_eq!(candidate.confidence, Confidence::Medium);
        assert_eq!(candidate.evidence[0].start_line, 10);
    }

    #[test]
    fn test_unknown_target_is_unresolved_and_low() {
        let candidate = to_candidate(
            "orders",
            DependencyKind::MessagePublish,
            reported("billing-queue", "publishes invoices", Some("orders/src/queue.ts")),
            &chunks(),
            &known(),
        )
        .unwrap();

        assert_eq!(
            candidate.target,
            TargetRef::Unresolved("billing-queue".to_string())
        );
        assert_eq!(candidate.confidence, Confidence::Low);
        assert_eq!(candidate.evidence[0].path, PathBuf::from("orders/src/queue.ts"));
    }

    #[test]
    fn test_config_sentinel_sets_key() {
        let candidate = to_candidate(
            "orders",
            DependencyKind::ConfigReference,
            reported("config:db.url", "config.get('db.url')", None),
            &chunks(),
            &known(),
        )
        .unwrap();

        assert_eq!(candidate.config_key.as_deref(), Some("db.url"));
        assert!(!candidate.target.is_resolved());
        assert_eq!(candidate.confidence, Confidence::High);
    }

    #[test]
    fn test_empty_target_is_dropped() {
        assert!(to_candidate(
            "orders",
            DependencyKind::HttpCall,
            reported("  ", "x", None),
            &chunks(),
            &known()
        )
        .is_none());
    }

    #[test]
    fn test_parse_fenced_response() {
        let content = "Here you go:\n```json\n{\"dependencies\": [{\"target\": \"gateway\", \"evidence\": \"fetch\"}]}\n```";
        let parsed = parse_response(content).unwrap();
        assert_eq!(parsed.dependencies.len(), 1);
        assert_eq!(parsed.dependencies[0].target, "gateway");
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        assert!(parse_response("{\"dependencies\": \"gateway\"}").is_err());
        assert!(parse_response("I could not find anything").is_err());
    }
}
