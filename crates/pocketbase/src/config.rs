use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

use crate::{Error, Result};

/// PocketBase sink settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PocketBaseConfig {
    /// Server root, e.g. `http://localhost:8090`.
    #[serde(alias = "pocketbase_url")]
    pub url: String,

    #[serde(alias = "collection_name")]
    pub collection: String,

    pub timeout_secs: u64,

    /// Sent verbatim as `Authorization` when the collection is not public.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_option_secret"
    )]
    pub auth_token: Option<Secret<String>>,
}

impl std::fmt::Debug for PocketBaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PocketBaseConfig")
            .field("url", &self.url)
            .field("collection", &self.collection)
            .field("timeout_secs", &self.timeout_secs)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for PocketBaseConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8090".into(),
            collection: "messages".into(),
            timeout_secs: 10,
            auth_token: None,
        }
    }
}

impl PocketBaseConfig {
    pub fn from_value(settings: &serde_json::Value) -> Result<Self> {
        let mut config: Self = if settings.is_null() {
            Self::default()
        } else {
            serde_json::from_value(settings.clone()).map_err(Error::Config)?
        };
        config.url = config.url.trim().trim_end_matches('/').to_string();
        config.collection = config.collection.trim().to_string();
        Ok(config)
    }

    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() && !self.collection.is_empty()
    }

    pub fn health_url(&self) -> String {
        format!("{}/api/health", self.url)
    }

    pub fn records_url(&self) -> String {
        format!("{}/api/collections/{}/records", self.url, self.collection)
    }
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match secret {
        Some(secret) => serializer.serialize_some(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}
