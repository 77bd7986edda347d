// --- File: crates/docpersist_common/src/models.rs ---
//! Connection and credential descriptors.
//!
//! Both descriptors are thin typed views over [`ConfigParams`]. Every field a
//! descriptor was configured with is kept, in order, so that unknown keys can
//! be forwarded as connection options.

use docpersist_config::ConfigParams;
use serde::{Deserialize, Serialize};

// --- Connection Descriptor ---
/// Where to connect: one node of a (possibly multi-node) database deployment.
///
/// Either `uri` is set, or `host`, `port` and `database` describe the node.
/// A `discovery_key` defers the actual values to a discovery service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionDescriptor {
    params: ConfigParams,
}

impl ConnectionDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_params(params: ConfigParams) -> Self {
        Self { params }
    }

    pub fn from_tuples<I, K, V>(tuples: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::from_params(ConfigParams::from_tuples(tuples))
    }

    /// Reads every `connections.<name>` section, in configuration order.
    /// Without any, falls back to the single `connection` section.
    pub fn many_from_config(config: &ConfigParams) -> Vec<Self> {
        let connections = config.get_section("connections");
        if !connections.is_empty() {
            return connections
                .get_section_names()
                .iter()
                .map(|name| connections.get_section(name))
                .filter(|section| !section.is_empty())
                .map(Self::from_params)
                .collect();
        }

        let connection = config.get_section("connection");
        if connection.is_empty() {
            Vec::new()
        } else {
            vec![Self::from_params(connection)]
        }
    }

    /// All configured fields
    pub fn params(&self) -> &ConfigParams {
        &self.params
    }

    pub fn protocol(&self) -> Option<String> {
        self.params.get_as_nullable_string("protocol")
    }

    pub fn host(&self) -> Option<String> {
        self.params.get_as_nullable_string("host")
    }

    pub fn set_host(&mut self, host: &str) {
        self.params.set("host", host);
    }

    pub fn port(&self) -> Option<i64> {
        self.params.get_as_nullable_integer("port")
    }

    pub fn set_port(&mut self, port: u16) {
        self.params.set("port", port.to_string());
    }

    pub fn database(&self) -> Option<String> {
        self.params.get_as_nullable_string("database")
    }

    pub fn set_database(&mut self, database: &str) {
        self.params.set("database", database);
    }

    /// A pre-built connection URI; takes precedence over all other fields
    pub fn uri(&self) -> Option<String> {
        self.params.get_as_nullable_string("uri")
    }

    pub fn set_uri(&mut self, uri: &str) {
        self.params.set("uri", uri);
    }

    pub fn discovery_key(&self) -> Option<String> {
        self.params.get_as_nullable_string("discovery_key")
    }

    pub fn set_discovery_key(&mut self, key: &str) {
        self.params.set("discovery_key", key);
    }

    /// Whether this descriptor must be resolved through a discovery service
    pub fn use_discovery(&self) -> bool {
        self.discovery_key().is_some_and(|k| !k.is_empty())
    }
}

// --- Credential Descriptor ---
/// Who connects: username/password or access id/key, possibly held in a
/// credential store under `store_key`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialDescriptor {
    params: ConfigParams,
}

impl CredentialDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_params(params: ConfigParams) -> Self {
        Self { params }
    }

    pub fn from_tuples<I, K, V>(tuples: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::from_params(ConfigParams::from_tuples(tuples))
    }

    /// Reads the `credential` section, if present
    pub fn from_config(config: &ConfigParams) -> Option<Self> {
        let credential = config.get_section("credential");
        if credential.is_empty() {
            None
        } else {
            Some(Self::from_params(credential))
        }
    }

    pub fn params(&self) -> &ConfigParams {
        &self.params
    }

    pub fn username(&self) -> Option<String> {
        self.params.get_as_nullable_string("username")
    }

    pub fn set_username(&mut self, username: &str) {
        self.params.set("username", username);
    }

    pub fn password(&self) -> Option<String> {
        self.params.get_as_nullable_string("password")
    }

    pub fn set_password(&mut self, password: &str) {
        self.params.set("password", password);
    }

    pub fn access_id(&self) -> Option<String> {
        self.params.get_as_nullable_string("access_id")
    }

    pub fn access_key(&self) -> Option<String> {
        self.params.get_as_nullable_string("access_key")
    }

    pub fn store_key(&self) -> Option<String> {
        self.params.get_as_nullable_string("store_key")
    }

    pub fn set_store_key(&mut self, key: &str) {
        self.params.set("store_key", key);
    }

    /// Whether the real values live in a credential store
    pub fn use_credential_store(&self) -> bool {
        self.store_key().is_some_and(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_many_from_config_prefers_connections() {
        let config = ConfigParams::from_tuples([
            ("connections.primary.host", "a"),
            ("connections.primary.port", "27017"),
            ("connections.secondary.host", "b"),
            ("connection.host", "ignored"),
        ]);

        let connections = ConnectionDescriptor::many_from_config(&config);
        assert_eq!(connections.len(), 2);
        assert_eq!(connections[0].host().as_deref(), Some("a"));
        assert_eq!(connections[0].port(), Some(27017));
        assert_eq!(connections[1].host().as_deref(), Some("b"));
        assert_eq!(connections[1].port(), None);
    }

    #[test]
    fn test_many_from_config_single_connection() {
        let config = ConfigParams::from_tuples([
            ("connection.discovery_key", "main-db"),
            ("connection.database", "test"),
        ]);

        let connections = ConnectionDescriptor::many_from_config(&config);
        assert_eq!(connections.len(), 1);
        assert!(connections[0].use_discovery());
        assert_eq!(connections[0].database().as_deref(), Some("test"));

        assert!(ConnectionDescriptor::many_from_config(&ConfigParams::new()).is_empty());
    }

    #[test]
    fn test_credential_from_config() {
        let config = ConfigParams::from_tuples([
            ("credential.username", "user"),
            ("credential.password", "secret"),
        ]);

        let credential = CredentialDescriptor::from_config(&config).unwrap();
        assert_eq!(credential.username().as_deref(), Some("user"));
        assert_eq!(credential.password().as_deref(), Some("secret"));
        assert!(!credential.use_credential_store());

        assert!(CredentialDescriptor::from_config(&ConfigParams::new()).is_none());
    }
}
