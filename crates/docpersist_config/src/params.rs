//! Flat, ordered configuration parameters

use crate::error::ConfigParamsError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A flat map of dotted configuration keys to string values.
///
/// Keys keep the order in which they were first inserted. Sections are
/// expressed with dotted prefixes: `connection.host` belongs to the
/// `connection` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigParams {
    values: Map<String, Value>,
}

impl ConfigParams {
    /// Create an empty parameter map
    pub fn new() -> Self {
        Self::default()
    }

    /// Create parameters from `(key, value)` pairs, in order
    pub fn from_tuples<I, K, V>(tuples: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Self::new();
        for (key, value) in tuples {
            params.set(key, value);
        }
        params
    }

    /// Flatten a nested JSON value into dotted keys.
    ///
    /// Array elements are keyed by their index. `null` leaves are skipped.
    pub fn from_value(value: &Value) -> Self {
        let mut params = Self::new();
        flatten_into(&mut params, None, value);
        params
    }

    /// Set a value, keeping the original position of an existing key
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), Value::String(value.into()));
    }

    /// Remove a key, returning its previous value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values
            .shift_remove(key)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    /// Raw string value of a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// `(key, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|v| (k.as_str(), v)))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// String value, or `None` if the key is missing
    pub fn get_as_nullable_string(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    pub fn get_as_string_with_default(&self, key: &str, default: &str) -> String {
        self.get_as_nullable_string(key)
            .unwrap_or_else(|| default.to_string())
    }

    /// Integer value, or `None` if the key is missing or not numeric.
    ///
    /// Floating point values are truncated.
    pub fn get_as_nullable_integer(&self, key: &str) -> Option<i64> {
        let raw = self.get(key)?.trim();
        raw.parse::<i64>()
            .ok()
            .or_else(|| raw.parse::<f64>().ok().map(|f| f.trunc() as i64))
    }

    pub fn get_as_integer_with_default(&self, key: &str, default: i64) -> i64 {
        self.get_as_nullable_integer(key).unwrap_or(default)
    }

    /// Boolean value, or `None` if the key is missing or unrecognised
    pub fn get_as_nullable_boolean(&self, key: &str) -> Option<bool> {
        match self.get(key)?.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" | "t" => Some(true),
            "false" | "0" | "no" | "n" | "f" => Some(false),
            _ => None,
        }
    }

    pub fn get_as_boolean_with_default(&self, key: &str, default: bool) -> bool {
        self.get_as_nullable_boolean(key).unwrap_or(default)
    }

    /// All parameters under `name.`, with the prefix stripped
    pub fn get_section(&self, name: &str) -> ConfigParams {
        let prefix = format!("{}.", name);
        let mut section = ConfigParams::new();
        for (key, value) in self.iter() {
            if let Some(stripped) = key.strip_prefix(&prefix) {
                if !stripped.is_empty() {
                    section.set(stripped, value);
                }
            }
        }
        section
    }

    /// Top-level section names in order of first appearance
    pub fn get_section_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for key in self.keys() {
            let name = key.split('.').next().unwrap_or(key);
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Parameters from `self`, falling back to `defaults` for missing keys
    pub fn set_defaults(&self, defaults: &ConfigParams) -> ConfigParams {
        defaults.override_with(self)
    }

    /// Parameters from `self`, with every key in `other` taking precedence
    pub fn override_with(&self, other: &ConfigParams) -> ConfigParams {
        let mut result = self.clone();
        for (key, value) in other.iter() {
            result.set(key, value);
        }
        result
    }
}

fn flatten_into(params: &mut ConfigParams, prefix: Option<&str>, value: &Value) {
    let join = |key: &str| match prefix {
        Some(p) => format!("{}.{}", p, key),
        None => key.to_string(),
    };

    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(params, Some(&join(key)), child);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(params, Some(&join(&index.to_string())), child);
            }
        }
        Value::Null => {}
        Value::String(s) => {
            if let Some(p) = prefix {
                params.set(p, s.clone());
            }
        }
        other => {
            if let Some(p) = prefix {
                params.set(p, other.to_string());
            }
        }
    }
}

impl fmt::Display for ConfigParams {
    /// Formats as `key1=value1;key2=value2`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in self.iter() {
            if !first {
                write!(f, ";")?;
            }
            first = false;
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

impl FromStr for ConfigParams {
    type Err = ConfigParamsError;

    /// Parses `key1=value1;key2=value2`. A key without `=` gets an empty value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut params = ConfigParams::new();
        for entry in s.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, value) = match entry.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (entry, ""),
            };
            if key.is_empty() {
                return Err(ConfigParamsError::Parse(format!(
                    "missing key in entry '{}'",
                    entry
                )));
            }
            params.set(key, value);
        }
        Ok(params)
    }
}

impl<K, V> FromIterator<(K, V)> for ConfigParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ConfigParams::from_tuples(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_getters_with_defaults() {
        let config = ConfigParams::from_tuples([
            ("options.max_pool_size", "5"),
            ("options.connect_timeout", "2500.7"),
            ("options.debug", "No"),
            ("options.bad", "abc"),
        ]);

        assert_eq!(config.get_as_integer_with_default("options.max_pool_size", 2), 5);
        assert_eq!(config.get_as_integer_with_default("options.connect_timeout", 0), 2500);
        assert_eq!(config.get_as_integer_with_default("options.missing", 100), 100);
        assert_eq!(config.get_as_integer_with_default("options.bad", 7), 7);
        assert!(!config.get_as_boolean_with_default("options.debug", true));
        assert!(config.get_as_boolean_with_default("options.missing", true));
        assert_eq!(config.get_as_string_with_default("collection", "none"), "none");
    }

    #[test]
    fn test_sections_keep_order() {
        let config = ConfigParams::from_tuples([
            ("connections.b.host", "b"),
            ("collection", "dummies"),
            ("connections.a.host", "a"),
            ("connections.a.port", "27018"),
        ]);

        assert_eq!(
            config.get_section_names(),
            vec!["connections".to_string(), "collection".to_string()]
        );
        let connections = config.get_section("connections");
        assert_eq!(connections.get_section_names(), vec!["b", "a"]);
        assert_eq!(connections.get_section("a").get("port"), Some("27018"));
        assert!(config.get_section("credential").is_empty());
    }

    #[test]
    fn test_set_defaults_and_override() {
        let defaults = ConfigParams::from_tuples([("a", "1"), ("b", "2")]);
        let config = ConfigParams::from_tuples([("b", "3"), ("c", "4")]);

        let merged = config.set_defaults(&defaults);
        assert_eq!(merged.get("a"), Some("1"));
        assert_eq!(merged.get("b"), Some("3"));
        assert_eq!(merged.get("c"), Some("4"));

        let overridden = defaults.override_with(&config);
        assert_eq!(overridden.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_from_value_flattens_nested_json() {
        let value = json!({
            "collection": "dummies",
            "connection": { "host": "localhost", "port": 27017, "ssl": false },
            "hosts": ["a", "b"],
            "ignored": null
        });

        let config = ConfigParams::from_value(&value);
        assert_eq!(config.get("collection"), Some("dummies"));
        assert_eq!(config.get("connection.port"), Some("27017"));
        assert_eq!(config.get("connection.ssl"), Some("false"));
        assert_eq!(config.get("hosts.1"), Some("b"));
        assert!(!config.contains_key("ignored"));
    }

    #[test]
    fn test_string_round_trip_format() {
        let config: ConfigParams = "host=localhost; port=27017;flag".parse().unwrap();
        assert_eq!(config.get("port"), Some("27017"));
        assert_eq!(config.get("flag"), Some(""));
        assert_eq!(config.to_string(), "host=localhost;port=27017;flag=");

        assert!("=oops".parse::<ConfigParams>().is_err());
    }

    #[test]
    fn test_remove_keeps_remaining_order() {
        let mut config = ConfigParams::from_tuples([("a", "1"), ("b", "2"), ("c", "3")]);
        assert_eq!(config.remove("b"), Some("2".to_string()));
        assert_eq!(config.remove("b"), None);
        assert_eq!(config.keys().collect::<Vec<_>>(), vec!["a", "c"]);
    }
}
