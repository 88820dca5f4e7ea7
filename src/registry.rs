//! Name → service mapping, populated once at startup.

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::service::{Service, ServiceContext};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The registered services of one `lid` process, ordered by name.
pub struct Registry {
    context: Arc<ServiceContext>,
    services: BTreeMap<String, Arc<Service>>,
}

impl Registry {
    pub fn new(context: ServiceContext) -> Self {
        Self {
            context: Arc::new(context),
            services: BTreeMap::new(),
        }
    }

    /// Register `name`. A name can be registered only once.
    pub fn register(&mut self, name: impl Into<String>, config: ServiceConfig) -> Result<Arc<Service>> {
        let name = name.into();
        validate_service_name(&name)?;

        if self.services.contains_key(&name) {
            return Err(Error::DuplicateService(name));
        }

        let service = Arc::new(Service::new(name.clone(), config, self.context.clone()));
        self.services.insert(name, service.clone());
        Ok(service)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Service>> {
        self.services.get(name)
    }

    pub fn lookup(&self, name: &str) -> Result<&Arc<Service>> {
        self.get(name)
            .ok_or_else(|| Error::ServiceNotFound(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Service>> {
        self.services.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Services named in `names` (all of them when empty), plus the names that
    /// matched nothing.
    pub fn select(&self, names: &[String]) -> (Vec<Arc<Service>>, Vec<String>) {
        if names.is_empty() {
            return (self.iter().cloned().collect(), Vec::new());
        }

        let mut selected = Vec::new();
        let mut unknown = Vec::new();
        for name in names {
            match self.services.get(name) {
                Some(service) if !selected.iter().any(|s: &Arc<Service>| s.name() == name.as_str()) => {
                    selected.push(service.clone())
                }
                Some(_) => {}
                None => unknown.push(name.clone()),
            }
        }
        (selected, unknown)
    }
}

/// Names end up in file names (`service-<name>.lid`), so keep them path-safe.
fn validate_service_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Config("Service name cannot be empty".to_string()));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(Error::Config(format!(
            "Service name '{}' contains path separators",
            name
        )));
    }

    if name.starts_with('.') {
        return Err(Error::Config(format!(
            "Service name '{}' cannot start with a dot",
            name
        )));
    }

    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::Config(format!(
            "Service name '{}' contains whitespace",
            name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::service::MemorySink;
    use crate::state::MemoryStateStore;

    fn registry() -> Registry {
        Registry::new(ServiceContext {
            store: Arc::new(MemoryStateStore::new()),
            environment: Environment::default(),
            base_dir: std::env::temp_dir(),
            log_sink: Arc::new(MemorySink::new()),
        })
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = registry();
        registry.register("api", ServiceConfig::new(["true"])).unwrap();

        let err = registry
            .register("api", ServiceConfig::new(["false"]))
            .unwrap_err();

        assert!(matches!(err, Error::DuplicateService(ref n) if n == "api"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("api").unwrap().config().command, vec!["true"]);
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut registry = registry();
        for name in ["", "a/b", "..", ".hidden", "two words"] {
            assert!(
                registry.register(name, ServiceConfig::new(["true"])).is_err(),
                "{:?} should be rejected",
                name
            );
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_iteration_is_sorted() {
        let mut registry = registry();
        for name in ["web", "api", "worker"] {
            registry.register(name, ServiceConfig::new(["true"])).unwrap();
        }
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, vec!["api", "web", "worker"]);
    }

    #[test]
    fn test_select() {
        let mut registry = registry();
        for name in ["api", "web"] {
            registry.register(name, ServiceConfig::new(["true"])).unwrap();
        }

        let (all, unknown) = registry.select(&[]);
        assert_eq!(all.len(), 2);
        assert!(unknown.is_empty());

        let (some, unknown) = registry.select(&[
            "web".to_string(),
            "nope".to_string(),
            "web".to_string(),
        ]);
        assert_eq!(some.len(), 1);
        assert_eq!(some[0].name(), "web");
        assert_eq!(unknown, vec!["nope"]);

        assert!(matches!(
            registry.lookup("nope"),
            Err(Error::ServiceNotFound(_))
        ));
    }
}
