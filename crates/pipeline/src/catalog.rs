//! Keys held by the config center, and which service each file belongs to

use crate::blacklist::DIR_BLACKLIST;
use crate::locator::{parse_env_lines, yaml_scalar};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use svcgraph_core::model::Service;
use svcgraph_core::FileSystem;
use tracing::{debug, info, warn};

const CONFIG_EXTENSIONS: &[&str] = &["yml", "yaml", "properties", "json", "env", "toml"];
const GENERIC_PREFIXES: &[&str] = &["application-", "bootstrap-", "application_", "bootstrap_"];

/// Flattened view of the config-center directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigCatalog {
    root: Option<PathBuf>,
    /// key -> owning service ids
    owners: BTreeMap<String, BTreeSet<String>>,
    /// service id -> key -> value
    values: BTreeMap<String, BTreeMap<String, String>>,
    files: BTreeMap<String, Vec<PathBuf>>,
    aliases: BTreeMap<String, String>,
    unattributed: Vec<PathBuf>,
}

impl ConfigCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn build(fs: &dyn FileSystem, config_root: &Path, services: &[Service]) -> Self {
        let mut catalog = Self {
            root: Some(config_root.to_path_buf()),
            ..Self::default()
        };

        let files = match fs.walk_files(config_root, DIR_BLACKLIST) {
            Ok(files) => files,
            Err(e) => {
                warn!(root = %config_root.display(), error = %e, "Cannot scan config center");
                return catalog;
            }
        };

        for path in files {
            let Some(ext) = config_extension(&path) else {
                continue;
            };
            if !CONFIG_EXTENSIONS.contains(&ext) {
                continue;
            }

            let Some((owner, spelling)) = attribute(&path, config_root, services) else {
                debug!(path = %path.display(), "Config file not attributed to any service");
                catalog.unattributed.push(path);
                continue;
            };

            let entries = match fs.read_to_string(&path) {
                Ok(content) => flatten(ext, &content),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable config file");
                    continue;
                }
            };
            let entries = match entries {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unparseable config file");
                    continue;
                }
            };

            if !spelling.eq_ignore_ascii_case(&owner) {
                catalog.aliases.insert(spelling.to_lowercase(), owner.clone());
            }
            for (key, value) in entries {
                catalog
                    .owners
                    .entry(key.clone())
                    .or_default()
                    .insert(owner.clone());
                catalog
                    .values
                    .entry(owner.clone())
                    .or_default()
                    .entry(key)
                    .or_insert(value);
            }
            catalog.files.entry(owner).or_default().push(path);
        }

        info!(
            root = %config_root.display(),
            keys = catalog.owners.len(),
            services = catalog.files.len(),
            unattributed = catalog.unattributed.len(),
            "Built config catalog"
        );
        catalog
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Services whose config files define `key`.
    pub fn owners(&self, key: &str) -> BTreeSet<String> {
        self.owners.get(key).cloned().unwrap_or_default()
    }

    pub fn files_for(&self, service: &str) -> Vec<PathBuf> {
        self.files.get(service).cloned().unwrap_or_default()
    }

    /// Every config file attributed to some service.
    pub fn attributed_files(&self) -> BTreeSet<PathBuf> {
        self.files.values().flatten().cloned().collect()
    }

    /// Alternative spellings (lowercased) mapped to service ids.
    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.owners.keys().map(String::as_str)
    }

    pub fn keys_for(&self, service: &str) -> Vec<&str> {
        self.values
            .get(service)
            .map(|values| values.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn value(&self, service: &str, key: &str) -> Option<&str> {
        self.values.get(service)?.get(key).map(String::as_str)
    }
}

/// Owning service for a config file plus the spelling that matched.
fn attribute(path: &Path, config_root: &Path, services: &[Service]) -> Option<(String, String)> {
    let stem = path.file_stem()?.to_str()?.trim_start_matches('.');
    let base = GENERIC_PREFIXES
        .iter()
        .find_map(|prefix| stem.strip_prefix(prefix))
        .unwrap_or(stem);

    let mut names = vec![base];
    if let Some(idx) = base.rfind(['-', '_']) {
        names.push(&base[..idx]);
    }
    if let Some(service) = names.iter().find_map(|name| match_service(name, services)) {
        return Some((service.to_string(), base.to_string()));
    }

    let dir = path
        .parent()
        .filter(|parent| *parent != config_root)?
        .file_name()?
        .to_str()?;
    match_service(dir, services).map(|service| (service.to_string(), dir.to_string()))
}

fn config_extension(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    if name == ".env" || name.starts_with(".env.") {
        return Some("env");
    }
    path.extension()?.to_str()
}

fn match_service<'a>(name: &str, services: &'a [Service]) -> Option<&'a str> {
    if name.is_empty() {
        return None;
    }
    services
        .iter()
        .find(|s| {
            s.id.eq_ignore_ascii_case(name) || s.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
        })
        .map(|s| s.id.as_str())
}

/// Dotted key/value pairs of one config file.
fn flatten(ext: &str, content: &str) -> anyhow::Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    match ext {
        "yml" | "yaml" => {
            use serde::Deserialize;
            for document in serde_yaml::Deserializer::from_str(content) {
                let value = serde_yaml::Value::deserialize(document)?;
                flatten_yaml("", &value, &mut out);
            }
        }
        "json" => {
            let value: serde_json::Value = serde_json::from_str(content)?;
            flatten_json("", &value, &mut out);
        }
        "toml" => {
            let value: toml::Value = toml::from_str(content)?;
            flatten_toml("", &value, &mut out);
        }
        "env" => out.extend(parse_env_lines(content)),
        _ => out.extend(parse_properties(content)),
    }
    Ok(out)
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn flatten_yaml(prefix: &str, value: &serde_yaml::Value, out: &mut Vec<(String, String)>) {
    use serde_yaml::Value;
    match value {
        Value::Mapping(map) => {
            for (k, v) in map {
                let key = match k {
                    Value::String(s) => s.clone(),
                    other => yaml_scalar(other),
                };
                flatten_yaml(&join(prefix, &key), v, out);
            }
        }
        Value::Sequence(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten_yaml(&format!("{}[{}]", prefix, i), v, out);
            }
        }
        Value::Null if prefix.is_empty() => {}
        other if !prefix.is_empty() => out.push((prefix.to_string(), yaml_scalar(other))),
        _ => {}
    }
}

fn flatten_json(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
    use serde_json::Value;
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                flatten_json(&join(prefix, k), v, out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten_json(&format!("{}[{}]", prefix, i), v, out);
            }
        }
        Value::String(s) if !prefix.is_empty() => out.push((prefix.to_string(), s.clone())),
        Value::Null => {}
        other if !prefix.is_empty() => out.push((prefix.to_string(), other.to_string())),
        _ => {}
    }
}

fn flatten_toml(prefix: &str, value: &toml::Value, out: &mut Vec<(String, String)>) {
    use toml::Value;
    match value {
        Value::Table(table) => {
            for (k, v) in table {
                flatten_toml(&join(prefix, k), v, out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten_toml(&format!("{}[{}]", prefix, i), v, out);
            }
        }
        Value::String(s) if !prefix.is_empty() => out.push((prefix.to_string(), s.clone())),
        other if !prefix.is_empty() => out.push((prefix.to_string(), other.to_string())),
        _ => {}
    }
}

fn parse_properties(content: &str) -> impl Iterator<Item = (String, String)> + '_ {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let idx = line.find(['=', ':'])?;
            let (key, value) = (&line[..idx], &line[idx + 1..]);
            Some((key.trim().to_string(), value.trim().to_string()))
        })
}
