use std::{collections::HashMap, sync::Arc};

use crate::{Error, Result, adapter::ChannelAdapter};

/// Builds an adapter instance from `(instance_name, driver settings)`.
pub type AdapterFactory =
    Arc<dyn Fn(&str, &serde_json::Value) -> Result<Arc<dyn ChannelAdapter>> + Send + Sync>;

/// Registry of channel types by name.
#[derive(Default)]
pub struct ChannelTypeRegistry {
    factories: HashMap<String, AdapterFactory>,
}

impl ChannelTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory; the last registration for a name wins.
    pub fn register(&mut self, kind: impl Into<String>, factory: AdapterFactory) {
        self.factories.insert(kind.into(), factory);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn create(
        &self,
        kind: &str,
        instance_name: &str,
        config: &serde_json::Value,
    ) -> Result<Arc<dyn ChannelAdapter>> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| Error::unknown_channel_type(kind))?;
        factory(instance_name, config)
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}
