// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Adapter Registry - (kind, provider) -> implementation
//
// One generic registry backs model connectors (keyed by type slug), tool
// adapters (kind + optional provider) and network runtimes (network type).
// Registries are assembled once through a builder and are immutable after
// `build()`; services receive them by value, there is no global state.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::model::ModelConnector;
use crate::domain::network::NetworkRuntime;
use crate::domain::tool::ToolAdapter;

pub type ConnectorRegistry = Registry<dyn ModelConnector>;
pub type ToolAdapterRegistry = Registry<dyn ToolAdapter>;
pub type RuntimeRegistry = Registry<dyn NetworkRuntime>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistryKey {
    pub kind: String,
    pub provider: Option<String>,
}

impl RegistryKey {
    pub fn new(kind: impl Into<String>, provider: Option<&str>) -> Self {
        Self {
            kind: kind.into(),
            provider: provider.map(str::to_string),
        }
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.provider {
            Some(provider) => write!(f, "{}/{}", self.kind, provider),
            None => f.write_str(&self.kind),
        }
    }
}

pub struct Registry<T: ?Sized> {
    name: &'static str,
    entries: BTreeMap<RegistryKey, Arc<T>>,
}

impl<T: ?Sized> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            entries: self.entries.clone(),
        }
    }
}

impl<T: ?Sized> Registry<T> {
    pub fn builder(name: &'static str) -> RegistryBuilder<T> {
        RegistryBuilder {
            name,
            entries: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Exact `(kind, provider)` match, then `(kind, None)`.
    pub fn get(&self, kind: &str, provider: Option<&str>) -> Option<Arc<T>> {
        if provider.is_some() {
            if let Some(found) = self.entries.get(&RegistryKey::new(kind, provider)) {
                return Some(found.clone());
            }
        }
        self.entries.get(&RegistryKey::new(kind, None)).cloned()
    }

    pub fn contains(&self, kind: &str, provider: Option<&str>) -> bool {
        self.get(kind, provider).is_some()
    }

    /// Registered entries ordered by key.
    pub fn list(&self) -> Vec<(RegistryKey, Arc<T>)> {
        self.entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct RegistryBuilder<T: ?Sized> {
    name: &'static str,
    entries: BTreeMap<RegistryKey, Arc<T>>,
}

impl<T: ?Sized> RegistryBuilder<T> {
    pub fn register(mut self, kind: impl Into<String>, provider: Option<&str>, entry: Arc<T>) -> Self {
        let key = RegistryKey::new(kind, provider);
        debug!(registry = self.name, key = %key, "Registering adapter");
        if self.entries.insert(key.clone(), entry).is_some() {
            warn!(registry = self.name, key = %key, "Adapter registered twice; last registration wins");
        }
        self
    }

    pub fn build(self) -> Registry<T> {
        Registry {
            name: self.name,
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct Plain;
    struct Fancy;

    impl Greeter for Plain {
        fn greet(&self) -> &'static str {
            "plain"
        }
    }

    impl Greeter for Fancy {
        fn greet(&self) -> &'static str {
            "fancy"
        }
    }

    fn registry() -> Registry<dyn Greeter> {
        Registry::<dyn Greeter>::builder("greeters")
            .register("hello", None, Arc::new(Plain))
            .register("hello", Some("acme"), Arc::new(Fancy))
            .build()
    }

    #[test]
    fn test_provider_lookup_falls_back_to_kind() {
        let reg = registry();
        assert_eq!(reg.get("hello", Some("acme")).unwrap().greet(), "fancy");
        assert_eq!(reg.get("hello", Some("other")).unwrap().greet(), "plain");
        assert_eq!(reg.get("hello", None).unwrap().greet(), "plain");
        assert!(reg.get("bye", None).is_none());
    }

    #[test]
    fn test_list_is_ordered_by_key() {
        let keys: Vec<String> = registry().list().into_iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["hello", "hello/acme"]);
    }
}
