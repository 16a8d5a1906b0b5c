use crate::catalog::ConfigCatalog;
use std::fmt::Write;
use svcgraph_core::model::{CodeChunk, DependencyKind, Service};

/// Prefix the model uses for targets that are configuration keys.
pub const CONFIG_SENTINEL: &str = "config:";

const MAX_LISTED_KEYS: usize = 200;

/// Fixed retrieval query per dependency kind.
pub fn query_for(kind: DependencyKind) -> &'static str {
    match kind {
        DependencyKind::HttpCall => {
            "HTTP client request to another service: fetch axios RestTemplate WebClient \
             requests.get http.Get base url host endpoint"
        }
        DependencyKind::MessagePublish => {
            "publish send produce message event to topic queue exchange: kafka producer \
             rabbitmq channel publish emit"
        }
        DependencyKind::MessageSubscribe => {
            "subscribe consume listen to topic queue: kafka consumer rabbitmq listener \
             message handler on event"
        }
        DependencyKind::DatabaseAccess => {
            "database connection string datasource url: repository query sql postgres mysql \
             mongo redis client pool"
        }
        DependencyKind::ConfigReference => {
            "read configuration value: config get property settings environment variable \
             getenv process.env @Value key"
        }
    }
}

fn describe(kind: DependencyKind) -> &'static str {
    match kind {
        DependencyKind::HttpCall => "the service makes an HTTP/REST/gRPC call to another service",
        DependencyKind::MessagePublish => {
            "the service publishes messages to a topic or queue consumed by another service"
        }
        DependencyKind::MessageSubscribe => {
            "the service consumes messages from a topic or queue produced by another service"
        }
        DependencyKind::DatabaseAccess => {
            "the service connects to a database or cache deployed as another service"
        }
        DependencyKind::ConfigReference => {
            "the service reads a configuration value owned by another service"
        }
    }
}

pub fn system_prompt() -> &'static str {
    r#"You find dependencies between services of one software project.
You only report dependencies that the provided code shows. Never guess.
Reply with a single JSON object and nothing else."#
}

pub fn build_prompt(
    service: &Service,
    kind: DependencyKind,
    chunks: &[CodeChunk],
    known_services: &[String],
    catalog: &ConfigCatalog,
) -> String {
    let others: Vec<&str> = known_services
        .iter()
        .map(String::as_str)
        .filter(|id| *id != service.id)
        .collect();

    let mut code = String::new();
    for chunk in chunks {
        let _ = write!(code, "--- {} ---\n{}\n", chunk.provenance(), chunk.text.trim_end());
    }
    if code.is_empty() {
        code.push_str("(no code retrieved)\n");
    }

    let environment = if service.environment.is_empty() {
        "None".to_string()
    } else {
        service
            .environment
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let config_section = if kind == DependencyKind::ConfigReference && !catalog.is_empty() {
        let keys: Vec<&str> = catalog.keys().take(MAX_LISTED_KEYS).collect();
        format!(
            r#"
Known configuration keys (from the config center):
{}

When the code reads one of these keys, set "target" to "{}<key>" and "config_key" to the key.
"#,
            keys.join("\n"),
            CONFIG_SENTINEL
        )
    } else {
        String::new()
    };

    format!(
        r#"Find {} dependencies of service "{}": {}.

Known services (use these exact names as targets when possible):
{}

Deployment environment of "{}":
{}

Code:
{}{}
Respond with JSON:
{{
  "dependencies": [
    {{
      "target": "orders",
      "evidence": "exact line(s) copied from the code above",
      "path": "path/of/the/file",
      "config_key": "db.url" | null
    }}
  ]
}}

Rules:
- target: a known service name, or the host/name exactly as written in the code
- evidence: copy the code verbatim, do not paraphrase
- Only dependencies of kind {}; return {{"dependencies": []}} when there are none
- Do not report "{}" itself
"#,
        kind,
        service.id,
        describe(kind),
        if others.is_empty() {
            "None".to_string()
        } else {
            others.join(", ")
        },
        service.id,
        environment,
        code,
        config_section,
        kind,
        service.id,
    )
}
