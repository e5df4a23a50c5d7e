use super::{ConfigError, Settings};
use std::collections::HashMap;

/// Prefix of environment variables holding server options.
///
/// Environment variable `H2O_WAVE_FOO_BAR` becomes option `foo_bar`. These vars have high
/// precedence and must be prefixed to avoid collisions.
pub const ENV_PREFIX: &str = "H2O_WAVE_";

impl Settings {
    /// Collect server options from the process environment.
    pub fn from_env() -> Result<Settings, ConfigError> {
        Self::from_env_vars(std::env::vars())
    }

    /// Collect server options from the given variables, as if they were the environment.
    pub fn from_env_vars<I>(vars: I) -> Result<Settings, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let parsed: HashMap<String, String> = envy::prefixed(ENV_PREFIX).from_iter(vars)?;
        Ok(parsed.into_iter().collect())
    }
}
