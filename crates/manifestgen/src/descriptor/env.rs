use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Converts a configuration style name into an environment variable name, e.g.
/// `quarkus.http-port` becomes `QUARKUS_HTTP_PORT`.
pub fn normalize_env_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '.' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Where the value of an environment variable comes from.
///
/// The bulk variants ([`EnvSource::FromConfigMap`] and [`EnvSource::FromSecret`]) import every
/// key of the referenced object and therefore don't carry a variable name.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum EnvSource {
    Value {
        name: String,
        value: String,
    },
    Field {
        name: String,
        field_path: String,
    },
    ConfigMapKey {
        name: String,
        config_map: String,
        key: String,
    },
    SecretKey {
        name: String,
        secret: String,
        key: String,
    },
    FromConfigMap {
        config_map: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
    },
    FromSecret {
        secret: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
    },
}

impl EnvSource {
    pub fn value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Value {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn field(name: impl Into<String>, field_path: impl Into<String>) -> Self {
        Self::Field {
            name: name.into(),
            field_path: field_path.into(),
        }
    }

    pub fn config_map_key(
        name: impl Into<String>,
        config_map: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self::ConfigMapKey {
            name: name.into(),
            config_map: config_map.into(),
            key: key.into(),
        }
    }

    pub fn secret_key(
        name: impl Into<String>,
        secret: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self::SecretKey {
            name: name.into(),
            secret: secret.into(),
            key: key.into(),
        }
    }

    pub fn from_config_map(config_map: impl Into<String>, prefix: Option<String>) -> Self {
        Self::FromConfigMap {
            config_map: config_map.into(),
            prefix,
        }
    }

    pub fn from_secret(secret: impl Into<String>, prefix: Option<String>) -> Self {
        Self::FromSecret {
            secret: secret.into(),
            prefix,
        }
    }

    /// The variable name as written in the descriptor, [`None`] for bulk sources.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Value { name, .. }
            | Self::Field { name, .. }
            | Self::ConfigMapKey { name, .. }
            | Self::SecretKey { name, .. } => Some(name),
            Self::FromConfigMap { .. } | Self::FromSecret { .. } => None,
        }
    }

    /// The variable name as it appears in the container.
    pub fn env_name(&self) -> Option<String> {
        self.name().map(normalize_env_name)
    }

    pub fn is_bulk(&self) -> bool {
        self.name().is_none()
    }

    /// Returns the same source with the normalized variable name.
    pub(crate) fn normalized(&self) -> Self {
        let mut normalized = self.clone();
        match &mut normalized {
            Self::Value { name, .. }
            | Self::Field { name, .. }
            | Self::ConfigMapKey { name, .. }
            | Self::SecretKey { name, .. } => *name = normalize_env_name(name),
            Self::FromConfigMap { .. } | Self::FromSecret { .. } => {}
        }
        normalized
    }

    /// Describes where the value comes from, without the variable name.
    pub fn origin(&self) -> EnvOrigin<'_> {
        EnvOrigin(self)
    }
}

/// Human readable description of the origin of an [`EnvSource`], used in error messages.
pub struct EnvOrigin<'a>(&'a EnvSource);

impl Display for EnvOrigin<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            EnvSource::Value { value, .. } => write!(f, "value {value:?}"),
            EnvSource::Field { field_path, .. } => write!(f, "field {field_path:?}"),
            EnvSource::ConfigMapKey {
                config_map, key, ..
            } => write!(f, "config map {config_map:?} key {key:?}"),
            EnvSource::SecretKey { secret, key, .. } => {
                write!(f, "secret {secret:?} key {key:?}")
            }
            EnvSource::FromConfigMap { config_map, .. } => write!(f, "config map {config_map:?}"),
            EnvSource::FromSecret { secret, .. } => write!(f, "secret {secret:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("FOO", "FOO")]
    #[case("my.config-value", "MY_CONFIG_VALUE")]
    #[case("already_fine", "ALREADY_FINE")]
    fn env_names_are_normalized(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_env_name(input), expected);
    }

    #[test]
    fn sources_deserialize_from_tagged_yaml() {
        let sources: Vec<EnvSource> = serde_yaml::from_str(indoc! {"
            - type: value
              name: foo
              value: bar
            - type: secretKey
              name: db.password
              secret: db-credentials
              key: password
            - type: fromConfigMap
              configMap: app-settings
              prefix: APP_
        "})
        .expect("sources are valid");

        assert_eq!(
            sources,
            vec![
                EnvSource::value("foo", "bar"),
                EnvSource::secret_key("db.password", "db-credentials", "password"),
                EnvSource::from_config_map("app-settings", Some("APP_".to_owned())),
            ]
        );
        assert_eq!(sources[1].env_name().as_deref(), Some("DB_PASSWORD"));
        assert!(sources[2].is_bulk());
    }

    #[test]
    fn origins_name_the_source_object() {
        let source = EnvSource::config_map_key("FOO", "settings", "foo");
        assert_eq!(
            source.origin().to_string(),
            r#"config map "settings" key "foo""#
        );
    }
}
