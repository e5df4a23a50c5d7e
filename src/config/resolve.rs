use super::validate::{self, Draft};
use super::{
    AuthConf, ByteSize, ConfigError, Layer, ListenAddr, Problem, RawValue, Report, ServerConf,
    Settings, Warning,
};
use crate::keychain::{Keychain, DEFAULT_KEYCHAIN_FILE};
use log::{info, warn};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Every option name the resolver understands.
pub const KNOWN_KEYS: &[&str] = &[
    "version",
    "build_date",
    "listen",
    "web_dir",
    "data_dir",
    "init",
    "compact",
    "cert_file",
    "key_file",
    "editable",
    "max_request_size",
    "max_cache_request_size",
    "proxy",
    "max_proxy_request_size",
    "max_proxy_response_size",
    "ide",
    "debug",
    "oidc_client_id",
    "oidc_client_secret",
    "oidc_provider_url",
    "oidc_redirect_url",
    "oidc_end_session_url",
    "oidc_skip_login",
    "access_keychain",
    "access_key_id",
    "access_key_secret",
];

/// Result of a successful resolution.
#[derive(Debug)]
pub struct Resolved {
    pub conf: ServerConf,
    pub warnings: Vec<Warning>,
}

/// Merge, coerce and validate three layers of settings into a `ServerConf`.
///
/// Layers are given in order of increasing precedence. All problems found are reported together
/// in `ConfigError::Invalid`. May create the data directory and an empty keychain file.
pub fn resolve(
    defaults: &Settings,
    file: &Settings,
    overrides: &Settings,
) -> Result<Resolved, ConfigError> {
    resolve_with(defaults, file, overrides, None)
}

/// Like `resolve`, but reuses the keychain of `previous` if it still applies.
pub(super) fn resolve_with(
    defaults: &Settings,
    file: &Settings,
    overrides: &Settings,
    previous: Option<&ServerConf>,
) -> Result<Resolved, ConfigError> {
    let mut layered = Layered {
        layers: [
            (Layer::Overrides, overrides),
            (Layer::File, file),
            (Layer::Defaults, defaults),
        ],
        warnings: Vec::new(),
        report: Report::default(),
    };
    layered.check_unknown_keys();

    let draft = layered.draft();
    let Layered {
        warnings,
        mut report,
        ..
    } = layered;

    if let Some(ref data_dir) = draft.data_dir {
        ensure_dir(data_dir);
    }
    report.extend(validate::validate(&draft));
    if !report.is_empty() {
        return Err(ConfigError::Invalid(report));
    }

    let (Some(listen), Some(data_dir)) = (draft.listen.clone(), draft.data_dir.clone()) else {
        return Err(ConfigError::Invalid(report));
    };
    let keychain = derive_keychain(&draft, &data_dir, previous)?;

    Ok(Resolved {
        conf: ServerConf {
            version: draft.version,
            build_date: draft.build_date,
            listen,
            web_dir: draft.web_dir,
            data_dir,
            keychain,
            init: draft.init,
            compact: draft.compact,
            cert_file: draft.cert_file,
            key_file: draft.key_file,
            editable: draft.editable,
            max_request_size: draft.max_request_size,
            max_cache_request_size: draft.max_cache_request_size,
            proxy: draft.proxy,
            max_proxy_request_size: draft.max_proxy_request_size,
            max_proxy_response_size: draft.max_proxy_response_size,
            ide: draft.ide,
            debug: draft.debug,
            auth: draft.auth,
        },
        warnings,
    })
}

/// Create the data directory if absent. Failure is reported by validation.
fn ensure_dir(path: &Path) {
    if path.as_os_str().is_empty() || path.exists() {
        return;
    }
    match fs::create_dir_all(path) {
        Ok(()) => info!("Created data directory: {}", path.display()),
        Err(err) => warn!("Could not create data directory {}: {}", path.display(), err),
    }
}

fn derive_keychain(
    draft: &Draft,
    data_dir: &Path,
    previous: Option<&ServerConf>,
) -> Result<Arc<Keychain>, ConfigError> {
    let path = if draft.access_keychain.as_os_str().is_empty() {
        data_dir.join(DEFAULT_KEYCHAIN_FILE)
    } else {
        draft.access_keychain.clone()
    };
    let default_key = Some((draft.access_key_id.as_str(), draft.access_key_secret.as_str()))
        .filter(|(id, _)| !id.is_empty());

    if let Some(previous) = previous {
        let keychain = &previous.keychain;
        let same_default = match default_key {
            Some((id, secret)) => {
                keychain.default_id() == Some(id) && keychain.verify(id, secret)
            }
            None => keychain.default_id().is_none(),
        };
        if previous.data_dir == *data_dir && keychain.path() == path && same_default {
            return Ok(Arc::clone(keychain));
        }
    }

    let mut keychain = Keychain::load_or_create(&path)?;
    if let Some((id, secret)) = default_key {
        keychain.add_default(id, secret)?;
    }
    Ok(Arc::new(keychain))
}

/// The three settings layers, highest precedence first, plus findings so far.
struct Layered<'a> {
    layers: [(Layer, &'a Settings); 3],
    warnings: Vec<Warning>,
    report: Report,
}

impl<'a> Layered<'a> {
    fn warn(&mut self, warning: Warning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    fn check_unknown_keys(&mut self) {
        let layers = self.layers;
        for (layer, settings) in layers.iter().rev() {
            for (key, _) in settings.iter() {
                if !KNOWN_KEYS.contains(&key) {
                    self.warn(Warning::UnknownKey {
                        layer: *layer,
                        key: key.to_owned(),
                    });
                }
            }
        }
    }

    /// Values for `key`, highest precedence first.
    fn lookup(&self, key: &'static str) -> impl Iterator<Item = (Layer, &'a RawValue)> {
        let layers = self.layers;
        layers
            .into_iter()
            .filter_map(move |(layer, settings)| settings.get(key).map(|value| (layer, value)))
    }

    /// Coerce an optional option. Invalid values fall through to lower layers, then `fallback`.
    fn optional<T>(
        &mut self,
        field: &'static str,
        fallback: T,
        coerce: fn(&RawValue) -> Result<T, String>,
    ) -> T {
        let candidates: Vec<_> = self.lookup(field).collect();
        for (layer, value) in candidates {
            match coerce(value) {
                Ok(value) => return value,
                Err(reason) => self.warn(Warning::Coercion {
                    field,
                    layer,
                    reason,
                }),
            }
        }
        fallback
    }

    /// Coerce a required option. Only the highest layer defining it counts.
    fn required<T>(
        &mut self,
        field: &'static str,
        coerce: fn(&RawValue) -> Result<T, String>,
    ) -> Option<T> {
        let found = self.lookup(field).next();
        match found {
            None => {}
            Some((_, RawValue::Str(value))) if value.trim().is_empty() => {}
            Some((layer, value)) => match coerce(value) {
                Ok(value) => return Some(value),
                Err(reason) => {
                    self.report.push(Problem::TypeCoercion {
                        field,
                        layer,
                        reason,
                    });
                    return None;
                }
            },
        }
        self.report.push(Problem::MissingRequired { field });
        None
    }

    fn string(&mut self, field: &'static str) -> String {
        self.optional(field, String::new(), to_string)
    }

    fn path(&mut self, field: &'static str) -> PathBuf {
        self.string(field).into()
    }

    fn flag(&mut self, field: &'static str) -> bool {
        self.optional(field, false, to_bool)
    }

    fn size(&mut self, field: &'static str, fallback: ByteSize) -> ByteSize {
        self.optional(field, fallback, to_size)
    }

    fn draft(&mut self) -> Draft {
        let auth = AuthConf {
            client_id: self.string("oidc_client_id"),
            client_secret: self.string("oidc_client_secret"),
            provider_url: self.string("oidc_provider_url"),
            redirect_url: self.string("oidc_redirect_url"),
            end_session_url: self.string("oidc_end_session_url"),
            skip_login: self.flag("oidc_skip_login"),
        };
        let auth_enabled = auth.skip_login
            || [
                &auth.client_id,
                &auth.client_secret,
                &auth.provider_url,
                &auth.redirect_url,
                &auth.end_session_url,
            ]
            .iter()
            .any(|value| !value.is_empty());

        Draft {
            version: self.string("version"),
            build_date: self.string("build_date"),
            listen: self.required("listen", to_listen_addr),
            web_dir: self.path("web_dir"),
            data_dir: self.required("data_dir", |value| to_string(value).map(PathBuf::from)),
            init: self.string("init"),
            compact: self.string("compact"),
            cert_file: self.path("cert_file"),
            key_file: self.path("key_file"),
            editable: self.flag("editable"),
            max_request_size: self.size("max_request_size", ByteSize::mb(5)),
            max_cache_request_size: self.size("max_cache_request_size", ByteSize::mb(5)),
            proxy: self.flag("proxy"),
            max_proxy_request_size: self.size("max_proxy_request_size", ByteSize::mb(10)),
            max_proxy_response_size: self.size("max_proxy_response_size", ByteSize::mb(10)),
            ide: self.flag("ide"),
            debug: self.flag("debug"),
            auth: Some(auth).filter(|_| auth_enabled),
            access_keychain: self.path("access_keychain"),
            access_key_id: self.string("access_key_id"),
            access_key_secret: self.string("access_key_secret"),
        }
    }
}

fn to_string(value: &RawValue) -> Result<String, String> {
    Ok(match *value {
        RawValue::Str(ref value) => value.clone(),
        RawValue::Bool(value) => value.to_string(),
        RawValue::Int(value) => value.to_string(),
    })
}

fn to_bool(value: &RawValue) -> Result<bool, String> {
    match *value {
        RawValue::Bool(value) => Ok(value),
        RawValue::Int(0) => Ok(false),
        RawValue::Int(1) => Ok(true),
        RawValue::Str(ref text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" | "" => Ok(false),
            _ => Err(format!("expected a boolean, found {value}")),
        },
        RawValue::Int(_) => Err(format!("expected a boolean, found {value}")),
    }
}

fn to_size(value: &RawValue) -> Result<ByteSize, String> {
    match *value {
        RawValue::Int(value) => ByteSize::try_from(value).map_err(|err| err.to_string()),
        RawValue::Str(ref value) => value
            .parse::<ByteSize>()
            .map_err(|err| format!("{value:?}: {err}")),
        RawValue::Bool(_) => Err(format!("expected a size, found {}", value.kind())),
    }
}

fn to_listen_addr(value: &RawValue) -> Result<ListenAddr, String> {
    let text = to_string(value)?;
    text.parse::<ListenAddr>()
        .map_err(|err| format!("{text:?}: {err}"))
}
