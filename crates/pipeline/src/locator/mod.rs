//! Service boundaries from deployment manifests
//!
//! Docker Compose files and Kubernetes workloads are the source of truth for
//! which services exist. Each service's source root comes from the compose
//! build context or, for Kubernetes, from a directory named after it.

mod compose;
mod kubernetes;

pub(crate) use compose::{parse_env_lines, scalar as yaml_scalar};

use crate::blacklist::DIR_BLACKLIST;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use svcgraph_core::model::Service;
use svcgraph_core::{ConfigurationError, FileSystem};
use tracing::{debug, info, warn};

/// Which service (and directory) holds the shared configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigCenterSpec {
    pub name: Option<String>,
    pub dir: Option<PathBuf>,
}

impl ConfigCenterSpec {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            dir: None,
        }
    }

    pub fn at_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            dir: Some(dir.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.dir.is_none()
    }
}

/// Services of one project, ordered by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSet {
    pub project: String,
    pub root: PathBuf,
    pub services: Vec<Service>,
    /// Directory scanned by the config catalog, when a config center is set.
    pub config_root: Option<PathBuf>,
}

impl ServiceSet {
    pub fn get(&self, id: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.id == id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.services.iter().map(|s| s.id.clone()).collect()
    }

    pub fn config_center(&self) -> Option<&Service> {
        self.services.iter().find(|s| s.is_config_center)
    }

    /// Services whose source is indexed and sent to the model.
    pub fn analyzable(&self) -> impl Iterator<Item = &Service> {
        self.services
            .iter()
            .filter(|s| !s.is_prebuilt() && !s.is_config_center)
    }

    pub fn prebuilt_count(&self) -> usize {
        self.services.iter().filter(|s| s.is_prebuilt()).count()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Source-root candidates for Kubernetes workloads, relative to the project root.
const WORKLOAD_DIRS: &[&str] = &["", "services", "src", "apps"];

pub struct ServiceLocator {
    fs: Arc<dyn FileSystem>,
}

impl ServiceLocator {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    pub fn locate(
        &self,
        project_root: &Path,
        config_center: &ConfigCenterSpec,
    ) -> Result<ServiceSet, ConfigurationError> {
        if !self.fs.is_dir(project_root) {
            return Err(ConfigurationError::InvalidProjectRoot(
                project_root.to_path_buf(),
            ));
        }
        let root = self
            .fs
            .canonicalize(project_root)
            .unwrap_or_else(|_| normalize_path(project_root));
        let project = root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("project")
            .to_string();

        let files = self.fs.walk_files(&root, DIR_BLACKLIST).map_err(|e| {
            ConfigurationError::Invalid(format!("Cannot walk {}: {}", root.display(), e))
        })?;

        let mut services: BTreeMap<String, Service> = BTreeMap::new();
        let mut merge = |service: Service| match services.get_mut(&service.id) {
            Some(existing) => existing.absorb(service),
            None => {
                services.insert(service.id.clone(), service);
            }
        };

        let mut k8s = kubernetes::Objects::default();
        for path in &files {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let is_compose = compose::is_compose_file(name);
            if !is_compose && !(name.ends_with(".yaml") || name.ends_with(".yml")) {
                continue;
            }

            let content = match self.fs.read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable manifest");
                    continue;
                }
            };

            if is_compose {
                match compose::parse(self.fs.as_ref(), path, &content) {
                    Ok(found) => {
                        debug!(path = %path.display(), services = found.len(), "Parsed compose file");
                        found.into_iter().for_each(&mut merge);
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping unparseable compose file"),
                }
            } else if kubernetes::looks_like_manifest(&content) {
                match kubernetes::parse(path, &content) {
                    Ok(objects) => {
                        k8s.workloads.extend(objects.workloads);
                        k8s.services.extend(objects.services);
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping unparseable Kubernetes manifest"),
                }
            }
        }

        for workload in &k8s.workloads {
            let mut service = Service::new(&workload.name);
            service.source_root = self.workload_root(&root, &workload.name);
            service.image = workload.image.clone();
            service.aliases = k8s.aliases_of(workload);
            service.environment = workload.environment.clone();
            service.ports = workload.ports.clone();
            service.manifests.push(workload.manifest.clone());
            merge(service);
        }

        if services.is_empty() {
            return Err(ConfigurationError::NoServicesFound(root));
        }

        let mut set = ServiceSet {
            project,
            root,
            services: services.into_values().collect(),
            config_root: None,
        };
        self.mark_config_center(&mut set, config_center)?;

        info!(
            project = %set.project,
            services = set.len(),
            prebuilt = set.prebuilt_count(),
            config_center = set.config_center().map(|s| s.id.as_str()).unwrap_or("none"),
            "Located services"
        );
        Ok(set)
    }

    fn workload_root(&self, root: &Path, name: &str) -> Option<PathBuf> {
        WORKLOAD_DIRS
            .iter()
            .map(|dir| root.join(dir).join(name))
            .find(|candidate| self.fs.is_dir(candidate))
    }

    fn mark_config_center(
        &self,
        set: &mut ServiceSet,
        spec: &ConfigCenterSpec,
    ) -> Result<(), ConfigurationError> {
        let dir = spec.dir.as_ref().map(|dir| {
            let dir = if dir.is_absolute() {
                dir.clone()
            } else {
                set.root.join(dir)
            };
            self.fs.canonicalize(&dir).unwrap_or_else(|_| normalize_path(&dir))
        });

        let index = match (&spec.name, &dir) {
            (None, None) => return Ok(()),
            (Some(name), _) => set
                .services
                .iter()
                .position(|s| &s.id == name)
                .ok_or_else(|| ConfigurationError::ConfigCenterMismatch(name.clone()))?,
            (None, Some(dir)) => set
                .services
                .iter()
                .position(|s| s.source_root.as_ref().is_some_and(|r| self.same_dir(r, dir)))
                .ok_or_else(|| ConfigurationError::ConfigCenterMismatch(dir.display().to_string()))?,
        };

        let service = &mut set.services[index];
        let config_root = dir.or_else(|| service.source_root.clone()).ok_or_else(|| {
            ConfigurationError::ConfigCenterMismatch(format!(
                "{} (prebuilt service without a configuration directory)",
                service.id
            ))
        })?;
        if !self.fs.is_dir(&config_root) {
            return Err(ConfigurationError::ConfigCenterMismatch(
                config_root.display().to_string(),
            ));
        }

        service.is_config_center = true;
        set.config_root = Some(config_root);
        Ok(())
    }

    fn same_dir(&self, a: &Path, b: &Path) -> bool {
        let canonical = |p: &Path| self.fs.canonicalize(p).unwrap_or_else(|_| normalize_path(p));
        canonical(a) == canonical(b)
    }
}

/// Lexically resolves `.` and `..` components.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push(component);
                }
            }
            other => result.push(other),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use svcgraph_core::MockFileSystem;

    const COMPOSE: &str = r#"
services:
  gateway:
    build: ./gateway
  orders:
    build: ./orders
    hostname: orders-svc
  config:
    build: ./config
  redis:
    image: redis:7
"#;

    fn shop() -> Arc<MockFileSystem> {
        let fs = MockFileSystem::with_root(PathBuf::from("/shop"));
        fs.add_file("docker-compose.yml", COMPOSE);
        fs.add_file("gateway/src/main.ts", "fetch('http://orders-svc/api')");
        fs.add_file("orders/src/index.ts", "export {}");
        fs.add_file("config/orders.yml", "db:\n  url: postgres://db\n");
        Arc::new(fs)
    }

    #[test]
    fn test_locate_compose_project() {
        let locator = ServiceLocator::new(shop());
        let set = locator
            .locate(Path::new("/shop"), &ConfigCenterSpec::none())
            .unwrap();

        assert_eq!(set.project, "shop");
        assert_eq!(set.ids(), vec!["config", "gateway", "orders", "redis"]);
        assert!(set.get("redis").unwrap().is_prebuilt());
        assert!(set.get("orders").unwrap().aliases.contains("orders-svc"));
        assert_eq!(set.prebuilt_count(), 1);
        assert!(set.config_center().is_none());
        assert_eq!(set.analyzable().count(), 3);
    }

    #[test]
    fn test_config_center_by_name() {
        let locator = ServiceLocator::new(shop());
        let set = locator
            .locate(Path::new("/shop"), &ConfigCenterSpec::named("config"))
            .unwrap();

        assert_eq!(set.config_center().unwrap().id, "config");
        assert_eq!(set.config_root, Some(PathBuf::from("/shop/config")));
        let analyzable: Vec<_> = set.analyzable().map(|s| s.id.as_str()).collect();
        assert_eq!(analyzable, vec!["gateway", "orders"]);
    }

    #[test]
    fn test_config_center_by_dir() {
        let locator = ServiceLocator::new(shop());
        let set = locator
            .locate(Path::new("/shop"), &ConfigCenterSpec::at_dir("config"))
            .unwrap();
        assert_eq!(set.config_center().unwrap().id, "config");
    }

    #[yare::parameterized(
        unknown_name = { Some("vault"), None },
        unknown_dir = { None, Some("settings") },
        prebuilt_without_dir = { Some("redis"), None },
    )]
    fn test_config_center_mismatch(name: Option<&str>, dir: Option<&str>) {
        let locator = ServiceLocator::new(shop());
        let spec = ConfigCenterSpec {
            name: name.map(str::to_string),
            dir: dir.map(PathBuf::from),
        };
        let err = locator.locate(Path::new("/shop"), &spec).unwrap_err();
        assert!(matches!(err, ConfigurationError::ConfigCenterMismatch(_)));
    }

    #[test]
    fn test_no_services_found() {
        let fs = MockFileSystem::with_root(PathBuf::from("/empty"));
        fs.add_file("README.md", "# nothing deployed");
        let locator = ServiceLocator::new(Arc::new(fs));

        let err = locator
            .locate(Path::new("/empty"), &ConfigCenterSpec::none())
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::NoServicesFound(_)));
    }

    #[test]
    fn test_invalid_project_root() {
        let locator = ServiceLocator::new(shop());
        let err = locator
            .locate(Path::new("/nowhere"), &ConfigCenterSpec::none())
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidProjectRoot(_)));
    }

    #[test]
    fn test_unparseable_manifest_is_skipped() {
        let fs = shop();
        fs.add_file("deploy/docker-compose.prod.yml", "services: [broken");
        let locator = ServiceLocator::new(fs);

        let set = locator
            .locate(Path::new("/shop"), &ConfigCenterSpec::none())
            .unwrap();
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn test_kubernetes_workloads_merge_with_compose() {
        let fs = shop();
        fs.add_file(
            "k8s/orders.yaml",
            "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: orders\nspec:\n  template:\n    metadata:\n      labels:\n        app: orders\n    spec:\n      containers:\n        - image: orders:2\n---\napiVersion: v1\nkind: Service\nmetadata:\n  name: orders-api\nspec:\n  selector:\n    app: orders\n",
        );
        fs.add_file(
            "k8s/billing.yaml",
            "apiVersion: apps/v1\nkind: StatefulSet\nmetadata:\n  name: billing\nspec:\n  template:\n    spec:\n      containers:\n        - image: billing:1\n",
        );
        fs.add_file("services/billing/main.go", "package main");
        let locator = ServiceLocator::new(fs);

        let set = locator
            .locate(Path::new("/shop"), &ConfigCenterSpec::none())
            .unwrap();

        let orders = set.get("orders").unwrap();
        assert_eq!(orders.source_root, Some(PathBuf::from("/shop/orders")));
        assert_eq!(orders.image.as_deref(), Some("orders:2"));
        assert!(orders.aliases.contains("orders-svc"));
        assert!(orders.aliases.contains("orders-api"));
        assert_eq!(orders.manifests.len(), 2);

        let billing = set.get("billing").unwrap();
        assert_eq!(
            billing.source_root,
            Some(PathBuf::from("/shop/services/billing"))
        );
    }

    #[test]
    fn test_blacklisted_dirs_not_scanned() {
        let fs = shop();
        fs.add_file(
            "node_modules/some-lib/docker-compose.yml",
            "services:\n  ghost:\n    image: ghost\n",
        );
        let locator = ServiceLocator::new(fs);
        let set = locator
            .locate(Path::new("/shop"), &ConfigCenterSpec::none())
            .unwrap();
        assert!(set.get("ghost").is_none());
    }

    #[yare::parameterized(
        dot = { "/shop/./orders", "/shop/orders" },
        parent = { "/shop/deploy/../orders", "/shop/orders" },
        relative_parent = { "../orders", "../orders" },
    )]
    fn test_normalize_path(input: &str, expected: &str) {
        assert_eq!(normalize_path(Path::new(input)), PathBuf::from(expected));
    }
}
