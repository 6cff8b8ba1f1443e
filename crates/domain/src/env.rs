//! Prefixed process-environment reader and the weak-typing helpers used to
//! turn its flat string map into typed configuration sections.

use std::{collections::BTreeMap, env, fmt::Display, str::FromStr};

use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::config::ConfigError;

/// Prefix shared by every configuration key the service reads.
pub const ENV_PREFIX: &str = "BOILERPLATE_";

/// Delimiter between nesting levels inside a key (`SERVER.PORT`).
pub const KEY_DELIMITER: char = '.';

/// Flat view over the environment variables carrying a fixed prefix.
///
/// Keys are stored with the prefix stripped and lower-cased, so
/// `BOILERPLATE_SERVER.PORT` becomes `server.port`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSource {
    values: BTreeMap<String, String>,
}

impl EnvSource {
    /// Snapshots the process environment, keeping only `prefix`ed keys.
    /// Foreign keys are skipped before any unicode check, so only a
    /// malformed prefixed key or value is an error.
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let mut pairs = Vec::new();
        for (key, value) in env::vars_os() {
            if !key.as_encoded_bytes().starts_with(prefix.as_bytes()) {
                continue;
            }
            let key = key.into_string().map_err(|raw| ConfigError::Load {
                reason: format!("environment key {raw:?} is not valid unicode"),
            })?;
            let value = value.into_string().map_err(|_| ConfigError::Load {
                reason: format!("value of `{key}` is not valid unicode"),
            })?;
            pairs.push((key, value));
        }

        Ok(Self::from_pairs(prefix, pairs))
    }

    /// Builds a source from explicit `(KEY, value)` pairs; keys without the
    /// prefix are ignored exactly like foreign process variables.
    pub fn from_pairs<I, K, V>(prefix: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .filter_map(|(key, value)| {
                key.as_ref()
                    .strip_prefix(prefix)
                    .map(|stripped| (stripped.to_ascii_lowercase(), value.into()))
            })
            .collect();

        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Expands the dot-delimited keys into a nested JSON object whose leaves
    /// are the raw string values.
    ///
    /// When a key is both a leaf and a branch (`server=x` next to
    /// `server.port=1`) the branch wins.
    pub fn tree(&self) -> Value {
        let mut root = Map::new();
        for (key, value) in &self.values {
            insert_path(&mut root, key, value);
        }
        Value::Object(root)
    }
}

fn insert_path(root: &mut Map<String, Value>, key: &str, value: &str) {
    let mut segments = key.split(KEY_DELIMITER).peekable();
    let mut node = root;

    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            if !matches!(node.get(segment), Some(Value::Object(_))) {
                node.insert(segment.to_string(), Value::String(value.to_string()));
            }
            return;
        }

        let entry = node
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        node = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }
}

/// Removes `section` from `tree` and deserializes it into `T`; a missing
/// section deserializes from an empty object so every field keeps its
/// default. Parse errors carry the dotted path of the offending key.
pub(crate) fn take_section<T>(tree: &mut Value, section: &str) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let raw = tree
        .as_object_mut()
        .and_then(|map| map.remove(section))
        .unwrap_or_else(|| Value::Object(Map::new()));

    serde_path_to_error::deserialize(raw).map_err(|err| {
        let key = if err.path().iter().next().is_none() {
            section.to_string()
        } else {
            format!("{section}{KEY_DELIMITER}{}", err.path())
        };
        ConfigError::Parse {
            key,
            source: err.into_inner(),
        }
    })
}

/// Parses a string leaf with `FromStr`, e.g. `"5432"` into `u16`.
pub(crate) fn from_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = String::deserialize(deserializer)?;
    raw.trim().parse().map_err(|err| {
        serde::de::Error::custom(format!("invalid value `{raw}`: {err}"))
    })
}

/// Accepts `true/false/1/0/yes/no` in any case.
pub(crate) fn boolean<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(serde::de::Error::custom(format!(
            "invalid value `{raw}`: expected a boolean"
        ))),
    }
}

/// Splits a comma-separated leaf; items are trimmed and empty items dropped.
pub(crate) fn list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefix_and_lowercases_keys() {
        let source = EnvSource::from_pairs(
            ENV_PREFIX,
            [
                ("BOILERPLATE_SERVER.PORT", "8080"),
                ("BOILERPLATE_DATABASE.HOST", "db"),
                ("PATH", "/usr/bin"),
            ],
        );

        assert_eq!(source.len(), 2);
        assert_eq!(source.get("server.port"), Some("8080"));
        assert_eq!(source.get("database.host"), Some("db"));
        assert_eq!(source.get("path"), None);
    }

    #[test]
    fn values_keep_their_case() {
        let source = EnvSource::from_pairs(ENV_PREFIX, [("BOILERPLATE_AUTH.SECRET_KEY", "AbC")]);
        assert_eq!(source.get("auth.secret_key"), Some("AbC"));
    }

    #[test]
    fn tree_nests_dotted_keys() {
        let source = EnvSource::from_pairs(
            ENV_PREFIX,
            [
                ("BOILERPLATE_OBSERVABILITY.LOGGING.LEVEL", "debug"),
                ("BOILERPLATE_OBSERVABILITY.SERVICE_NAME", "svc"),
            ],
        );

        let tree = source.tree();
        assert_eq!(tree["observability"]["logging"]["level"], "debug");
        assert_eq!(tree["observability"]["service_name"], "svc");
    }

    #[test]
    fn branch_wins_over_conflicting_leaf() {
        let source = EnvSource::from_pairs(
            ENV_PREFIX,
            [("BOILERPLATE_SERVER", "x"), ("BOILERPLATE_SERVER.PORT", "1")],
        );

        let tree = source.tree();
        assert_eq!(tree["server"]["port"], "1");
    }

    #[test]
    fn missing_section_uses_defaults() {
        #[derive(Debug, Default, serde::Deserialize)]
        #[serde(default)]
        struct Section {
            #[serde(deserialize_with = "from_str")]
            port: u16,
        }

        let mut tree = EnvSource::default().tree();
        let section: Section = take_section(&mut tree, "server").expect("defaults apply");
        assert_eq!(section.port, 0);
    }

    #[test]
    fn parse_failure_names_key_and_value() {
        #[derive(Debug, Default, serde::Deserialize)]
        #[serde(default)]
        struct Section {
            #[serde(deserialize_with = "from_str")]
            port: u16,
        }

        let mut tree = EnvSource::from_pairs(ENV_PREFIX, [("BOILERPLATE_DATABASE.PORT", "abc")]).tree();
        let err = take_section::<Section>(&mut tree, "database").unwrap_err();
        match err {
            ConfigError::Parse { key, source } => {
                assert_eq!(key, "database.port");
                assert!(source.to_string().contains("abc"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn nested_parse_failure_reports_full_path() {
        #[derive(Debug, Default, serde::Deserialize)]
        #[serde(default)]
        struct Logging {
            #[serde(deserialize_with = "boolean")]
            enabled: bool,
        }

        #[derive(Debug, Default, serde::Deserialize)]
        #[serde(default)]
        struct Section {
            logging: Logging,
        }

        let mut tree = EnvSource::from_pairs(
            ENV_PREFIX,
            [("BOILERPLATE_OBSERVABILITY.LOGGING.ENABLED", "maybe")],
        )
        .tree();
        let err = take_section::<Section>(&mut tree, "observability").unwrap_err();
        assert_eq!(err.key(), Some("observability.logging.enabled"));
        assert!(err.to_string().contains("maybe"));
    }
}
