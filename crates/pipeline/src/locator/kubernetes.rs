//! Kubernetes manifests (multi-document YAML)

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::compose::scalar;

const WORKLOAD_KINDS: &[&str] = &[
    "Deployment",
    "StatefulSet",
    "DaemonSet",
    "Pod",
    "Job",
    "CronJob",
];

const NAME_LABELS: &[&str] = &["app", "app.kubernetes.io/name"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Workload {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub image: Option<String>,
    pub environment: BTreeMap<String, String>,
    pub ports: BTreeSet<String>,
    pub manifest: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ServiceObject {
    pub name: String,
    pub selector: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
pub(super) struct Objects {
    pub workloads: Vec<Workload>,
    pub services: Vec<ServiceObject>,
}

impl Objects {
    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty() && self.services.is_empty()
    }

    /// `Service` objects whose selector matches the workload's pod labels.
    pub fn aliases_of(&self, workload: &Workload) -> BTreeSet<String> {
        self.services
            .iter()
            .filter(|svc| svc.name != workload.name)
            .filter(|svc| selects(&svc.selector, &workload.labels))
            .map(|svc| svc.name.clone())
            .collect()
    }
}

fn selects(selector: &BTreeMap<String, String>, labels: &BTreeMap<String, String>) -> bool {
    let relevant: Vec<_> = selector
        .iter()
        .filter(|(key, _)| NAME_LABELS.contains(&key.as_str()))
        .collect();
    !relevant.is_empty()
        && relevant
            .iter()
            .all(|(key, value)| labels.get(*key) == Some(*value))
}

#[derive(Debug, Deserialize)]
struct Header {
    kind: Option<String>,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    name: Option<String>,
    #[serde(default)]
    labels: BTreeMap<String, Value>,
}

/// Cheap check before a full parse, so config files that are not manifests
/// stay quiet.
pub(super) fn looks_like_manifest(content: &str) -> bool {
    content.contains("apiVersion:") && content.contains("kind:")
}

pub(super) fn parse(manifest: &Path, content: &str) -> Result<Objects> {
    let mut objects = Objects::default();

    for document in serde_yaml::Deserializer::from_str(content) {
        let value = Value::deserialize(document)
            .with_context(|| format!("Invalid Kubernetes manifest {}", manifest.display()))?;
        if value.is_null() {
            continue;
        }
        let Ok(header) = serde_yaml::from_value::<Header>(value.clone()) else {
            continue;
        };
        let (Some(kind), Some(name)) = (header.kind, header.metadata.name) else {
            continue;
        };

        if kind == "Service" {
            objects.services.push(ServiceObject {
                name,
                selector: string_map(value.get("spec").and_then(|s| s.get("selector"))),
            });
        } else if WORKLOAD_KINDS.contains(&kind.as_str()) {
            objects
                .workloads
                .push(workload(&kind, name, header.metadata.labels, &value, manifest));
        }
    }

    Ok(objects)
}

fn workload(
    kind: &str,
    name: String,
    metadata_labels: BTreeMap<String, Value>,
    value: &Value,
    manifest: &Path,
) -> Workload {
    let pod_spec = pod_spec(kind, value);
    let template_labels = pod_template(kind, value)
        .and_then(|t| t.get("metadata"))
        .and_then(|m| m.get("labels"));

    let mut labels: BTreeMap<String, String> = metadata_labels
        .iter()
        .map(|(k, v)| (k.clone(), scalar(v)))
        .collect();
    labels.extend(string_map(template_labels));

    let containers = pod_spec
        .and_then(|spec| spec.get("containers"))
        .and_then(Value::as_sequence);

    let mut image = None;
    let mut environment = BTreeMap::new();
    let mut ports = BTreeSet::new();
    for container in containers.into_iter().flatten() {
        if image.is_none() {
            image = container.get("image").and_then(Value::as_str).map(str::to_string);
        }
        let env = container.get("env").and_then(Value::as_sequence);
        for var in env.into_iter().flatten() {
            if let Some(key) = var.get("name").and_then(Value::as_str) {
                let value = var.get("value").map(scalar).unwrap_or_default();
                environment.entry(key.to_string()).or_insert(value);
            }
        }
        let container_ports = container.get("ports").and_then(Value::as_sequence);
        for port in container_ports.into_iter().flatten() {
            if let Some(number) = port.get("containerPort") {
                ports.insert(scalar(number));
            }
        }
    }

    Workload {
        name,
        labels,
        image,
        environment,
        ports,
        manifest: manifest.to_path_buf(),
    }
}

fn pod_template<'a>(kind: &str, value: &'a Value) -> Option<&'a Value> {
    match kind {
        "Pod" => None,
        "CronJob" => value
            .get("spec")?
            .get("jobTemplate")?
            .get("spec")?
            .get("template"),
        _ => value.get("spec")?.get("template"),
    }
}

fn pod_spec<'a>(kind: &str, value: &'a Value) -> Option<&'a Value> {
    match kind {
        "Pod" => value.get("spec"),
        _ => pod_template(kind, value)?.get("spec"),
    }
}

fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(Value::as_mapping)
        .map(|mapping| {
            mapping
                .iter()
                .filter_map(|(k, v)| Some((k.as_str()?.to_string(), scalar(v))))
                .collect()
        })
        .unwrap_or_default()
}
