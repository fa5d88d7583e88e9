//! Process-wide provider short-name → adapter factory registry.
//!
//! Registration happens once at startup: a factory map built at boot and
//! immutable thereafter; the registry itself is never mutated again.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use serde_json::Value;

use crate::adapter::{AdapterError, ProviderAdapter};

/// Builds a [`ProviderAdapter`] from a merchant's decrypted `ProviderConfig`
/// JSON blob. Implemented once per provider crate.
pub trait ProviderFactory: Send + Sync {
    fn build(&self, config: &Value) -> Result<Arc<dyn ProviderAdapter>, AdapterError>;
}

impl<F> ProviderFactory for F
where
    F: Fn(&Value) -> Result<Arc<dyn ProviderAdapter>, AdapterError> + Send + Sync,
{
    fn build(&self, config: &Value) -> Result<Arc<dyn ProviderAdapter>, AdapterError> {
        (self)(config)
    }
}

#[derive(Default)]
pub struct ProviderRegistry {
    factories: HashMap<String, Box<dyn ProviderFactory>>,
}

impl Debug for ProviderRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&String> = self.factories.keys().collect();
        f.debug_tuple("ProviderRegistry").field(&names).finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, short_name: impl Into<String>, factory: impl ProviderFactory + 'static) {
        self.factories.insert(short_name.into(), Box::new(factory));
    }

    /// Builds an adapter instance for `short_name` from a decrypted config
    /// blob. Adapters are ephemeral per call: no connection reuse
    /// across requests except through the shared HTTP client pool.
    pub fn build(&self, short_name: &str, config: &Value) -> Result<Arc<dyn ProviderAdapter>, AdapterError> {
        let factory = self
            .factories
            .get(short_name)
            .ok_or_else(|| AdapterError::MissingConfig(format!("no adapter registered for provider '{short_name}'")))?;
        factory.build(config)
    }

    pub fn is_registered(&self, short_name: &str) -> bool {
        self.factories.contains_key(short_name)
    }

    pub fn registered_names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}
