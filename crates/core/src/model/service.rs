use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// One deployable unit of the analysed project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    /// `None` for prebuilt services deployed from an image only.
    pub source_root: Option<PathBuf>,
    #[serde(default)]
    pub is_config_center: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub aliases: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub manifests: Vec<PathBuf>,
    /// Deployment-time environment (compose `environment`, container `env`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub ports: BTreeSet<String>,
}

impl Service {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_root: None,
            is_config_center: false,
            image: None,
            aliases: BTreeSet::new(),
            manifests: Vec::new(),
            environment: BTreeMap::new(),
            ports: BTreeSet::new(),
        }
    }

    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_root = Some(root.into());
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.insert(alias.into());
        self
    }

    pub fn is_prebuilt(&self) -> bool {
        self.source_root.is_none()
    }

    /// Folds another record of the same service (found in a different manifest) into this one.
    pub fn absorb(&mut self, other: Service) {
        debug_assert_eq!(self.id, other.id);
        if self.source_root.is_none() {
            self.source_root = other.source_root;
        }
        if self.image.is_none() {
            self.image = other.image;
        }
        self.is_config_center |= other.is_config_center;
        self.aliases.extend(other.aliases);
        self.ports.extend(other.ports);
        for (key, value) in other.environment {
            self.environment.entry(key).or_insert(value);
        }
        for manifest in other.manifests {
            if !self.manifests.contains(&manifest) {
                self.manifests.push(manifest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prebuilt_without_source_root() {
        let redis = Service::new("redis").with_image("redis:7");
        assert!(redis.is_prebuilt());

        let orders = Service::new("orders").with_source_root("/repo/orders");
        assert!(!orders.is_prebuilt());
    }

    #[test]
    fn test_absorb_keeps_first_source_root() {
        let mut a = Service::new("orders")
            .with_source_root("/repo/orders")
            .with_alias("orders-svc");
        let b = Service::new("orders")
            .with_source_root("/repo/other")
            .with_image("orders:latest")
            .with_alias("orders-api");

        a.absorb(b);

        assert_eq!(a.source_root, Some(PathBuf::from("/repo/orders")));
        assert_eq!(a.image.as_deref(), Some("orders:latest"));
        assert_eq!(a.aliases.len(), 2);
    }
}
