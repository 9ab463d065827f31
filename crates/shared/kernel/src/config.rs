use ::config::{Config, Environment, File, FileFormat, Map};
use mxd_domain::config::{BridgeConfig, LEGACY_STORAGE_KEYS};
use serde_yaml::{Mapping, Value};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
/// Prefix for environment overrides, e.g. `APPSERVICE_DISCORD__BRIDGE__PORT=9005`.
pub const ENV_PREFIX: &str = "APPSERVICE_DISCORD";
pub const ENV_SEPARATOR: &str = "__";

#[mxd_derive::mxd_error]
pub enum ConfigError {
    #[error("Failed to read config{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Config is not valid YAML{}: {source}", format_context(.context))]
    Yaml { source: serde_yaml::Error, context: Option<Cow<'static, str>> },

    #[error("Config must be a mapping{}: found {message}", format_context(.context))]
    NotAnObject { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error(
        "No port given: set bridge.port in the config file or pass --port{}",
        format_context(.context)
    )]
    MissingPort { context: Option<Cow<'static, str>> },

    #[error(
        "Legacy storage keys are no longer supported: {message}. \
         Migrate the data and remove them{}",
        format_context(.context)
    )]
    LegacyConfig { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: ::config::ConfigError, context: Option<Cow<'static, str>> },
}

/// Configuration that passed every bootstrap check.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub config: BridgeConfig,
    /// Effective listen port (`--port` wins over `bridge.port`).
    pub port: u16,
}

/// Layered loader: YAML file, then `APPSERVICE_DISCORD__*` environment overrides.
///
/// Checks run in a fixed order:
/// 1. the document is a YAML mapping ([`ConfigError::NotAnObject`]);
/// 2. a listen port resolves ([`ConfigError::MissingPort`]);
/// 3. no legacy storage key survives file and environment merging
///    ([`ConfigError::LegacyConfig`]).
///
/// Nothing but the config file is touched.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: PathBuf,
    cli_port: Option<u16>,
    environment: Option<Map<String, String>>,
}

impl ConfigLoader {
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf(), cli_port: None, environment: None }
    }

    #[must_use]
    pub const fn cli_port(mut self, port: Option<u16>) -> Self {
        self.cli_port = port;
        self
    }

    /// Reads overrides from `vars` instead of the process environment.
    #[must_use]
    pub fn environment(mut self, vars: Map<String, String>) -> Self {
        self.environment = Some(vars);
        self
    }

    /// Reads, merges and validates the configuration.
    ///
    /// # Errors
    /// See [`ConfigError`]; the first failing check wins.
    pub fn load(self) -> Result<ValidatedConfig, ConfigError> {
        let path = self.path.display().to_string();
        info!(%path, "Loading config");

        let text = std::fs::read_to_string(&self.path).context(path.clone())?;
        let document = ensure_mapping(&text).context(path.clone())?;

        let config = Config::builder()
            .add_source(File::from_str(&text, FileFormat::Yaml))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(self.environment),
            )
            .build()
            .context("Failed to build config")?
            .try_deserialize::<BridgeConfig>()
            .context("Failed to deserialize config")?;

        let port = resolve_port(self.cli_port, config.bridge.port)?;

        let mut legacy = legacy_keys_in(&document);
        for key in config.database.legacy_keys() {
            if !legacy.contains(&key) {
                legacy.push(key);
            }
        }
        if !legacy.is_empty() {
            return Err(ConfigError::LegacyConfig {
                message: Cow::Owned(format!("database.{}", legacy.join(", database."))),
                context: Some(Cow::Owned(path)),
            });
        }

        debug!(port, domain = %config.bridge.domain, "Config validated");
        Ok(ValidatedConfig { config, port })
    }
}

/// Shorthand for [`ConfigLoader`] over the process environment.
///
/// # Errors
/// See [`ConfigLoader::load`].
pub fn load_config(
    path: impl AsRef<Path>,
    cli_port: Option<u16>,
) -> Result<ValidatedConfig, ConfigError> {
    ConfigLoader::new(path).cli_port(cli_port).load()
}

/// CLI port first, then the configured one.
///
/// # Errors
/// [`ConfigError::MissingPort`] when neither is set.
pub fn resolve_port(cli: Option<u16>, configured: Option<u16>) -> Result<u16, ConfigError> {
    cli.or(configured).ok_or(ConfigError::MissingPort { context: None })
}

fn ensure_mapping(text: &str) -> Result<Mapping, ConfigError> {
    if text.trim().is_empty() {
        return Err(ConfigError::NotAnObject { message: "an empty document".into(), context: None });
    }

    let kind = match serde_yaml::from_str::<Value>(text)? {
        Value::Mapping(document) => return Ok(document),
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Tagged(_) => "a tagged value",
    };

    Err(ConfigError::NotAnObject { message: kind.into(), context: None })
}

/// Legacy keys written in the file's `database` section, whatever their value.
fn legacy_keys_in(document: &Mapping) -> Vec<&'static str> {
    let Some(Value::Mapping(database)) = document.get("database") else {
        return Vec::new();
    };

    LEGACY_STORAGE_KEYS
        .iter()
        .filter(|(_, spellings)| spellings.iter().any(|spelling| database.contains_key(*spelling)))
        .map(|(name, _)| *name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_and_sequences_are_not_objects() {
        for text in ["", "   \n", "~", "42", "just text", "- a\n- b\n"] {
            assert!(
                matches!(ensure_mapping(text), Err(ConfigError::NotAnObject { .. })),
                "{text:?} should be rejected"
            );
        }
        assert!(ensure_mapping("bridge: {}\n").is_ok());
    }

    #[test]
    fn legacy_keys_are_found_without_values() {
        let document =
            ensure_mapping("database:\n  userStorePath:\n  room_store_path: ~\n").expect("mapping");
        assert_eq!(legacy_keys_in(&document), vec!["user_store_path", "room_store_path"]);

        let document = ensure_mapping("database:\n  url: mem://\n").expect("mapping");
        assert!(legacy_keys_in(&document).is_empty());
    }

    #[test]
    fn broken_yaml_is_reported_as_yaml_error() {
        assert!(matches!(ensure_mapping("bridge: [unclosed"), Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn context_is_appended_to_message() {
        let err = resolve_port(None, None).context("cli").unwrap_err();
        assert!(err.to_string().ends_with("(cli)"));
    }
}
