mod env;
mod listen;
mod resolve;
mod settings;
mod shared;
mod size;
mod toml;
mod validate;

pub use listen::{ListenAddr, ListenAddrError};
pub use resolve::{resolve, Resolved};
pub use settings::{Layer, RawValue, Settings};
pub use shared::SharedConf;
pub use size::{ByteSize, ByteSizeError};

use crate::keychain::{Keychain, KeychainError};
use serde_json::{json, Value as JsonValue};
use std::{
    fmt,
    io::Error as IoError,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;

/// Union of all possible error types seen while loading and resolving.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file '{}': {err}", path.display())]
    Io { path: PathBuf, err: IoError },
    #[error("TOML error: {0}")]
    Toml(#[from] ::toml::de::Error),
    #[error("environment error: {0}")]
    Env(#[from] envy::Error),
    #[error("unsupported {kind} value for option '{key}'")]
    UnsupportedValue { key: String, kind: &'static str },
    #[error("{0}")]
    Invalid(Report),
    #[error("keychain error: {0}")]
    KeychainInit(#[from] KeychainError),
}

/// Kinds of fatal configuration problems.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProblemKind {
    MissingRequired,
    TypeCoercion,
    InvariantViolation,
}

/// A single fatal problem found during resolution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Problem {
    /// A required option is absent or empty in every layer.
    MissingRequired { field: &'static str },
    /// A value could not be converted to the option's type.
    TypeCoercion {
        field: &'static str,
        layer: Layer,
        reason: String,
    },
    /// A value, or combination of values, breaks a rule of the validation table.
    InvariantViolation { field: &'static str, reason: String },
}

impl Problem {
    pub fn field(&self) -> &'static str {
        match *self {
            Problem::MissingRequired { field }
            | Problem::TypeCoercion { field, .. }
            | Problem::InvariantViolation { field, .. } => field,
        }
    }

    pub fn kind(&self) -> ProblemKind {
        match *self {
            Problem::MissingRequired { .. } => ProblemKind::MissingRequired,
            Problem::TypeCoercion { .. } => ProblemKind::TypeCoercion,
            Problem::InvariantViolation { .. } => ProblemKind::InvariantViolation,
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Problem::MissingRequired { field } => write!(f, "{field}: required option is missing"),
            Problem::TypeCoercion {
                field,
                layer,
                ref reason,
            } => write!(f, "{field}: invalid value in {layer}: {reason}"),
            Problem::InvariantViolation { field, ref reason } => write!(f, "{field}: {reason}"),
        }
    }
}

/// Every fatal problem found in a single resolution pass.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Report {
    problems: Vec<Problem>,
}

impl Report {
    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    /// Whether the report contains a problem of the given kind for the given field.
    pub fn has(&self, kind: ProblemKind, field: &str) -> bool {
        self.problems
            .iter()
            .any(|problem| problem.kind() == kind && problem.field() == field)
    }

    pub(crate) fn push(&mut self, problem: Problem) {
        self.problems.push(problem);
    }
}

impl Extend<Problem> for Report {
    fn extend<I: IntoIterator<Item = Problem>>(&mut self, iter: I) {
        self.problems.extend(iter);
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid configuration ({} problem(s)):", self.problems.len())?;
        for problem in &self.problems {
            write!(f, "\n  - {problem}")?;
        }
        Ok(())
    }
}

/// Non-fatal findings of a resolution pass.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Warning {
    /// A layer defines an option this server doesn't know about.
    UnknownKey { layer: Layer, key: String },
    /// An optional value could not be converted, and a lower layer or the built-in value was used.
    Coercion {
        field: &'static str,
        layer: Layer,
        reason: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Warning::UnknownKey { layer, ref key } => {
                write!(f, "ignoring unknown option '{key}' in {layer}")
            }
            Warning::Coercion {
                field,
                layer,
                ref reason,
            } => write!(f, "ignoring invalid value for '{field}' in {layer}: {reason}"),
        }
    }
}

pub type ConfigRc = Arc<ServerConf>;

/// OAuth2 / OpenID Connect client configuration.
#[derive(Clone, Default, Eq, PartialEq)]
pub struct AuthConf {
    pub client_id: String,
    pub client_secret: String,
    pub provider_url: String,
    pub redirect_url: String,
    pub end_session_url: String,
    pub skip_login: bool,
}

impl fmt::Debug for AuthConf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConf")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("provider_url", &self.provider_url)
            .field("redirect_url", &self.redirect_url)
            .field("end_session_url", &self.end_session_url)
            .field("skip_login", &self.skip_login)
            .finish()
    }
}

/// Fully resolved server configuration. Read-only once constructed.
#[derive(Debug, PartialEq)]
pub struct ServerConf {
    pub version: String,
    pub build_date: String,
    pub listen: ListenAddr,
    pub web_dir: PathBuf,
    pub data_dir: PathBuf,
    pub keychain: Arc<Keychain>,
    pub init: String,
    pub compact: String,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    pub editable: bool,
    pub max_request_size: ByteSize,
    pub max_cache_request_size: ByteSize,
    pub proxy: bool,
    pub max_proxy_request_size: ByteSize,
    pub max_proxy_response_size: ByteSize,
    pub ide: bool,
    pub debug: bool,
    pub auth: Option<AuthConf>,
}

impl ServerConf {
    /// Whether the listener should serve TLS.
    pub fn tls_enabled(&self) -> bool {
        !self.cert_file.as_os_str().is_empty()
    }

    /// JSON summary of the configuration, with secrets redacted.
    pub fn to_json(&self) -> JsonValue {
        fn path(value: &Path) -> String {
            value.display().to_string()
        }

        let auth = self.auth.as_ref().map(|auth| {
            json!({
                "client_id": auth.client_id,
                "client_secret": redact(&auth.client_secret),
                "provider_url": auth.provider_url,
                "redirect_url": auth.redirect_url,
                "end_session_url": auth.end_session_url,
                "skip_login": auth.skip_login,
            })
        });
        json!({
            "version": self.version,
            "build_date": self.build_date,
            "listen": self.listen.to_string(),
            "web_dir": path(&self.web_dir),
            "data_dir": path(&self.data_dir),
            "keychain": {
                "path": path(self.keychain.path()),
                "access_key_ids": self.keychain.ids().collect::<Vec<_>>(),
            },
            "init": self.init,
            "compact": self.compact,
            "cert_file": path(&self.cert_file),
            "key_file": path(&self.key_file),
            "editable": self.editable,
            "max_request_size": self.max_request_size.as_u64(),
            "max_cache_request_size": self.max_cache_request_size.as_u64(),
            "proxy": self.proxy,
            "max_proxy_request_size": self.max_proxy_request_size.as_u64(),
            "max_proxy_response_size": self.max_proxy_response_size.as_u64(),
            "ide": self.ide,
            "debug": self.debug,
            "auth": auth,
        })
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}

impl fmt::Display for ServerConf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "version                 = {}", self.version)?;
        writeln!(f, "build_date              = {}", self.build_date)?;
        writeln!(f, "listen                  = {}", self.listen)?;
        writeln!(f, "web_dir                 = {}", self.web_dir.display())?;
        writeln!(f, "data_dir                = {}", self.data_dir.display())?;
        writeln!(
            f,
            "keychain                = {} ({} access key(s))",
            self.keychain.path().display(),
            self.keychain.len()
        )?;
        writeln!(f, "init                    = {}", self.init)?;
        writeln!(f, "compact                 = {}", self.compact)?;
        writeln!(f, "cert_file               = {}", self.cert_file.display())?;
        writeln!(f, "key_file                = {}", self.key_file.display())?;
        writeln!(f, "editable                = {}", self.editable)?;
        writeln!(f, "max_request_size        = {}", self.max_request_size)?;
        writeln!(f, "max_cache_request_size  = {}", self.max_cache_request_size)?;
        writeln!(f, "proxy                   = {}", self.proxy)?;
        if self.proxy {
            writeln!(f, "max_proxy_request_size  = {}", self.max_proxy_request_size)?;
            writeln!(f, "max_proxy_response_size = {}", self.max_proxy_response_size)?;
        }
        writeln!(f, "ide                     = {}", self.ide)?;
        write!(f, "debug                   = {}", self.debug)?;
        match self.auth {
            None => write!(f, "\nauth                    = disabled"),
            Some(ref auth) if auth.skip_login => write!(f, "\nauth                    = skip login"),
            Some(ref auth) => {
                write!(f, "\noidc_client_id          = {}", auth.client_id)?;
                write!(f, "\noidc_client_secret      = {}", redact(&auth.client_secret))?;
                write!(f, "\noidc_provider_url       = {}", auth.provider_url)?;
                write!(f, "\noidc_redirect_url       = {}", auth.redirect_url)?;
                write!(f, "\noidc_end_session_url    = {}", auth.end_session_url)
            }
        }
    }
}
