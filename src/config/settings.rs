use std::collections::BTreeMap;
use std::fmt;

/// A loosely typed option value, as produced by one of the configuration sources.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RawValue {
    Str(String),
    Bool(bool),
    Int(i64),
}

impl RawValue {
    /// Short name of the value type, for use in error messages.
    pub fn kind(&self) -> &'static str {
        match *self {
            RawValue::Str(_) => "string",
            RawValue::Bool(_) => "boolean",
            RawValue::Int(_) => "integer",
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RawValue::Str(ref value) => write!(f, "{value:?}"),
            RawValue::Bool(value) => write!(f, "{value}"),
            RawValue::Int(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Str(value.to_owned())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Str(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Bool(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Int(value)
    }
}

/// Identifies a settings layer. Ordered by increasing precedence.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum Layer {
    Defaults,
    File,
    Overrides,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            Layer::Defaults => "defaults",
            Layer::File => "config file",
            Layer::Overrides => "overrides",
        })
    }
}

/// One layer of raw settings, keyed by lower-snake option name.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Settings {
    inner: BTreeMap<String, RawValue>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// The defaults compiled into the binary.
    pub fn defaults() -> Self {
        Settings::new()
            .with("version", env!("CARGO_PKG_VERSION"))
            .with("build_date", option_env!("WAVE_BUILD_DATE").unwrap_or(""))
            .with("listen", ":10101")
            .with("web_dir", "./www")
            .with("data_dir", "./data")
            .with("max_request_size", "5M")
            .with("max_cache_request_size", "5M")
            .with("max_proxy_request_size", "10M")
            .with("max_proxy_response_size", "10M")
    }

    /// Set an option, replacing any previous value.
    pub fn set<K: Into<String>, V: Into<RawValue>>(&mut self, key: K, value: V) -> &mut Self {
        self.inner.insert(key.into(), value.into());
        self
    }

    /// Builder variant of `set`.
    pub fn with<K: Into<String>, V: Into<RawValue>>(mut self, key: K, value: V) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.inner.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.inner.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Combine with a layer of higher precedence. Values in `higher` win.
    pub fn overlay(mut self, higher: Settings) -> Settings {
        self.inner.extend(higher.inner);
        self
    }
}

impl<K: Into<String>, V: Into<RawValue>> FromIterator<(K, V)> for Settings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let inner = iter
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self { inner }
    }
}
