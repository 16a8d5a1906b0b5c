//! Docker Compose manifests

use anyhow::{Context, Result};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;
use svcgraph_core::model::Service;
use svcgraph_core::FileSystem;

use super::normalize_path;

pub(super) fn is_compose_file(file_name: &str) -> bool {
    let Some(stem) = file_name
        .strip_suffix(".yml")
        .or_else(|| file_name.strip_suffix(".yaml"))
    else {
        return false;
    };
    stem == "docker-compose" || stem == "compose" || stem.starts_with("docker-compose.")
}

/// Reads every `services.<name>` entry. Build contexts are resolved against
/// the directory holding the manifest.
pub(super) fn parse(fs: &dyn FileSystem, manifest: &Path, content: &str) -> Result<Vec<Service>> {
    let doc: Value = serde_yaml::from_str(content)
        .with_context(|| format!("Invalid compose file {}", manifest.display()))?;

    let Some(services) = doc.get("services").and_then(Value::as_mapping) else {
        return Ok(Vec::new());
    };
    let base = manifest.parent().unwrap_or(Path::new("/"));

    let mut result = Vec::new();
    for (name, definition) in services {
        let Some(name) = name.as_str() else {
            continue;
        };

        let mut service = Service::new(name);
        service.manifests.push(manifest.to_path_buf());

        if let Some(context) = build_context(definition) {
            service.source_root = Some(normalize_path(&base.join(context)));
        }
        if let Some(image) = definition.get("image").and_then(Value::as_str) {
            service.image = Some(image.to_string());
        }

        for key in ["container_name", "hostname"] {
            if let Some(alias) = definition.get(key).and_then(Value::as_str) {
                if alias != name {
                    service.aliases.insert(alias.to_string());
                }
            }
        }
        if let Some(networks) = definition.get("networks").and_then(Value::as_mapping) {
            for network in networks.values() {
                let aliases = network.get("aliases").and_then(Value::as_sequence);
                for alias in aliases.into_iter().flatten().filter_map(Value::as_str) {
                    if alias != name {
                        service.aliases.insert(alias.to_string());
                    }
                }
            }
        }

        service.environment = environment(fs, base, definition);
        for key in ["ports", "expose"] {
            if let Some(ports) = definition.get(key).and_then(Value::as_sequence) {
                service.ports.extend(ports.iter().filter_map(port));
            }
        }

        result.push(service);
    }

    Ok(result)
}

fn build_context(definition: &Value) -> Option<&str> {
    let context = match definition.get("build")? {
        Value::String(context) => context.as_str(),
        build => build.get("context").and_then(Value::as_str).unwrap_or("."),
    };
    (!context.trim().is_empty()).then_some(context)
}

/// `environment` (list or map) over `env_file` entries; inline values win.
fn environment(fs: &dyn FileSystem, base: &Path, definition: &Value) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();

    let env_files: Vec<&str> = match definition.get("env_file") {
        Some(Value::String(file)) => vec![file.as_str()],
        Some(Value::Sequence(files)) => files
            .iter()
            .filter_map(|f| f.as_str().or_else(|| f.get("path").and_then(Value::as_str)))
            .collect(),
        _ => Vec::new(),
    };
    for file in env_files {
        let path = normalize_path(&base.join(file));
        match fs.read_to_string(&path) {
            Ok(content) => env.extend(parse_env_lines(&content)),
            Err(err) => tracing::debug!(path = %path.display(), error = %err, "Skipping env_file"),
        }
    }

    match definition.get("environment") {
        Some(Value::Sequence(entries)) => {
            for entry in entries.iter().filter_map(Value::as_str) {
                let (key, value) = entry.split_once('=').unwrap_or((entry, ""));
                env.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        Some(Value::Mapping(entries)) => {
            for (key, value) in entries {
                if let Some(key) = key.as_str() {
                    env.insert(key.to_string(), scalar(value));
                }
            }
        }
        _ => {}
    }

    env
}

pub(crate) fn parse_env_lines(content: &str) -> impl Iterator<Item = (String, String)> + '_ {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            Some((key.trim().to_string(), value.to_string()))
        })
}

fn port(value: &Value) -> Option<String> {
    match value {
        Value::Mapping(_) => value.get("target").map(scalar),
        Value::Null => None,
        other => Some(scalar(other)),
    }
}

pub(crate) fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use svcgraph_core::MockFileSystem;

    #[yare::parameterized(
        plain = { "docker-compose.yml", true },
        yaml = { "compose.yaml", true },
        profile = { "docker-compose.prod.yml", true },
        other_yaml = { "deployment.yaml", false },
        not_yaml = { "docker-compose.txt", false },
    )]
    fn test_is_compose_file(name: &str, expected: bool) {
        assert_eq!(is_compose_file(name), expected);
    }

    #[test]
    fn test_parse_services() {
        let content = r#"
services:
  gateway:
    build: ./gateway
    container_name: gateway-svc
    ports:
      - "8080:8080"
    environment:
      - ORDERS_URL=http://orders:3000
  orders:
    build:
      context: ./services/orders
      dockerfile: Dockerfile
    networks:
      backend:
        aliases:
          - orders-api
    expose:
      - 3000
    environment:
      DB_PORT: 5432
      DB_HOST: postgres
  postgres:
    image: postgres:16
"#;
        let services = parse(&MockFileSystem::new(), Path::new("/shop/docker-compose.yml"), content).unwrap();
        assert_eq!(services.len(), 3);

        let gateway = &services[0];
        assert_eq!(gateway.id, "gateway");
        assert_eq!(gateway.source_root, Some(PathBuf::from("/shop/gateway")));
        assert!(gateway.aliases.contains("gateway-svc"));
        assert!(gateway.ports.contains("8080:8080"));
        assert_eq!(
            gateway.environment.get("ORDERS_URL").map(String::as_str),
            Some("http://orders:3000")
        );

        let orders = &services[1];
        assert_eq!(
            orders.source_root,
            Some(PathBuf::from("/shop/services/orders"))
        );
        assert!(orders.aliases.contains("orders-api"));
        assert!(orders.ports.contains("3000"));
        assert_eq!(orders.environment.get("DB_PORT").map(String::as_str), Some("5432"));

        let postgres = &services[2];
        assert!(postgres.is_prebuilt());
        assert_eq!(postgres.image.as_deref(), Some("postgres:16"));
    }

    #[test]
    fn test_build_context_relative_to_manifest() {
        let content = "services:\n  api:\n    build: ../api\n";
        let services = parse(&MockFileSystem::new(), Path::new("/shop/deploy/docker-compose.yml"), content).unwrap();
        assert_eq!(services[0].source_root, Some(PathBuf::from("/shop/api")));
    }

    #[test]
    fn test_no_services_section() {
        let services = parse(&MockFileSystem::new(), Path::new("/shop/compose.yml"), "version: '3'\n").unwrap();
        assert!(services.is_empty());
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        assert!(parse(&MockFileSystem::new(), Path::new("/shop/compose.yml"), "services: [unclosed").is_err());
    }

    #[test]
    fn test_env_file_overridden_by_environment() {
        let fs = MockFileSystem::with_root(PathBuf::from("/shop"));
        fs.add_file("orders.env", "DB_HOST=localhost\nDB_USER=orders\n");
        let content = "services:\n  orders:\n    build: ./orders\n    env_file: orders.env\n    environment:\n      DB_HOST: postgres\n";

        let services = parse(&fs, Path::new("/shop/docker-compose.yml"), content).unwrap();
        let env = &services[0].environment;
        assert_eq!(env.get("DB_HOST").map(String::as_str), Some("postgres"));
        assert_eq!(env.get("DB_USER").map(String::as_str), Some("orders"));
    }

    #[test]
    fn test_env_lines() {
        let env: BTreeMap<_, _> =
            parse_env_lines("# comment\nexport A=1\nB=\"two\"\n\nnot a pair\n").collect();
        assert_eq!(env.get("A").map(String::as_str), Some("1"));
        assert_eq!(env.get("B").map(String::as_str), Some("two"));
        assert_eq!(env.len(), 2);
    }
}
