use super::resolve::KNOWN_KEYS;
use super::{ConfigError, RawValue, Settings};
use std::fs;
use std::path::Path;
use toml::{Table, Value};

/// Tables whose keys map to prefixed top-level options.
///
/// `[oidc] client_id = ".."` is the same as `oidc_client_id = ".."`.
const PREFIXED_TABLES: &[(&str, &str)] = &[("oidc", "oidc_"), ("access", "access_")];

fn table_key(table: &str, prefix: &str, key: &str) -> String {
    match (table, key) {
        // `[access] keychain` reads better than `[access] keychain_file`.
        ("access", "keychain") => "access_keychain".to_owned(),
        _ => format!("{prefix}{key}"),
    }
}

fn raw_value(key: &str, value: Value) -> Result<RawValue, ConfigError> {
    match value {
        Value::String(value) => Ok(RawValue::Str(value)),
        Value::Boolean(value) => Ok(RawValue::Bool(value)),
        Value::Integer(value) => Ok(RawValue::Int(value)),
        value if KNOWN_KEYS.contains(&key) => Err(ConfigError::UnsupportedValue {
            key: key.to_owned(),
            kind: value.type_str(),
        }),
        // Unknown to this version; keep the key so the resolver warns about it.
        _ => Ok(RawValue::Str(String::new())),
    }
}

impl Settings {
    /// Parse settings from the contents of a TOML config file.
    ///
    /// Unrecognized tables are flattened to `table.key` names, which the resolver then reports as
    /// unknown options.
    pub fn from_toml_str(data: &str) -> Result<Settings, ConfigError> {
        let parsed: Table = toml::from_str(data)?;
        let mut settings = Settings::new();
        for (key, value) in parsed {
            match value {
                Value::Table(table) => {
                    let prefix = PREFIXED_TABLES
                        .iter()
                        .find(|(name, _)| *name == key)
                        .map(|(_, prefix)| *prefix);
                    for (sub_key, value) in table {
                        let name = match prefix {
                            Some(prefix) => table_key(&key, prefix, &sub_key),
                            None => format!("{key}.{sub_key}"),
                        };
                        let value = raw_value(&name, value)?;
                        settings.set(name, value);
                    }
                }
                value => {
                    let value = raw_value(&key, value)?;
                    settings.set(key, value);
                }
            }
        }
        Ok(settings)
    }

    /// Read and parse a TOML config file.
    pub fn from_toml_file(path: &Path) -> Result<Settings, ConfigError> {
        let data = fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.to_owned(),
            err,
        })?;
        let settings = Self::from_toml_str(&data)?;
        log::info!(
            "Read {} option(s) from config file: {}",
            settings.len(),
            path.display()
        );
        Ok(settings)
    }
}
