use crate::config::Settings;
use docopt::Docopt;
use serde::Deserialize;
use std::path::PathBuf;

/// Defines the program's version, as set by Cargo at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Defines the program's usage string.
///
/// [Docopt](http://docopt.org) parses this and generates a custom argv parser.
pub const USAGE: &str = r#"
Wave server configuration

Resolves the server configuration from built-in defaults, an optional TOML
config file, H2O_WAVE_* environment variables and the flags below (in order of
increasing precedence), then prints the validated result.

Usage:
  wave-conf [options]
  wave-conf --version
  wave-conf --help

Options:
  --config=<file>                   Read options from a TOML config file.
  --json                            Print the configuration as JSON.
  --listen=<addr>                   Address to listen on (host:port).
  --web-dir=<dir>                   Directory to serve static assets from.
  --data-dir=<dir>                  Directory to store persistent data in.
  --init=<file>                     Initialization script or app bundle.
  --compact=<value>                 Compaction mode.
  --tls-cert-file=<file>            TLS certificate file.
  --tls-key-file=<file>             TLS private key file.
  --editable                        Allow served apps to be edited.
  --max-request-size=<size>         Maximum request body size, e.g. 5M.
  --max-cache-request-size=<size>   Maximum size of cacheable requests.
  --proxy                           Enable outbound proxying.
  --max-proxy-request-size=<size>   Maximum proxied request body size.
  --max-proxy-response-size=<size>  Maximum proxied response body size.
  --ide                             Enable developer mode.
  --debug                           Enable verbose diagnostics.
  --oidc-client-id=<id>             OAuth2 client ID.
  --oidc-client-secret=<secret>     OAuth2 client secret.
  --oidc-provider-url=<url>         OpenID Connect provider base URL.
  --oidc-redirect-url=<url>         OAuth2 callback URL.
  --oidc-end-session-url=<url>      OpenID Connect logout URL.
  --oidc-skip-login                 Bypass interactive login.
  --access-keychain=<file>          Keychain file (default: <data-dir>/.wave-keychain).
  --access-key-id=<id>              Default access key ID.
  --access-key-secret=<secret>      Default access key secret.
  --version                         Print version information and exit.
  --help                            Print this help message and exit.
"#;

/// Holds parsed command line parameters.
#[derive(Debug, Default, Deserialize)]
pub struct Args {
    pub flag_config: Option<PathBuf>,
    pub flag_json: bool,
    flag_listen: Option<String>,
    flag_web_dir: Option<String>,
    flag_data_dir: Option<String>,
    flag_init: Option<String>,
    flag_compact: Option<String>,
    flag_tls_cert_file: Option<String>,
    flag_tls_key_file: Option<String>,
    flag_editable: bool,
    flag_max_request_size: Option<String>,
    flag_max_cache_request_size: Option<String>,
    flag_proxy: bool,
    flag_max_proxy_request_size: Option<String>,
    flag_max_proxy_response_size: Option<String>,
    flag_ide: bool,
    flag_debug: bool,
    flag_oidc_client_id: Option<String>,
    flag_oidc_client_secret: Option<String>,
    flag_oidc_provider_url: Option<String>,
    flag_oidc_redirect_url: Option<String>,
    flag_oidc_end_session_url: Option<String>,
    flag_oidc_skip_login: bool,
    flag_access_keychain: Option<String>,
    flag_access_key_id: Option<String>,
    flag_access_key_secret: Option<String>,
}

impl Args {
    /// Parse the process arguments. Exits on `--help`, `--version` or usage errors.
    pub fn from_env() -> Args {
        Docopt::new(USAGE)
            .and_then(|d| d.version(Some(VERSION.to_owned())).deserialize())
            .unwrap_or_else(|e| e.exit())
    }

    /// Parse the given argument list. The first item is the program name.
    pub fn from_argv<I, S>(argv: I) -> Result<Args, docopt::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Docopt::new(USAGE)?.argv(argv).help(false).deserialize()
    }

    /// Options given on the command line, as an override layer.
    ///
    /// Boolean flags can only switch options on, so they are only set when given.
    pub fn overrides(&self) -> Settings {
        let mut settings = Settings::new();

        let strings = [
            ("listen", &self.flag_listen),
            ("web_dir", &self.flag_web_dir),
            ("data_dir", &self.flag_data_dir),
            ("init", &self.flag_init),
            ("compact", &self.flag_compact),
            ("cert_file", &self.flag_tls_cert_file),
            ("key_file", &self.flag_tls_key_file),
            ("max_request_size", &self.flag_max_request_size),
            ("max_cache_request_size", &self.flag_max_cache_request_size),
            ("max_proxy_request_size", &self.flag_max_proxy_request_size),
            ("max_proxy_response_size", &self.flag_max_proxy_response_size),
            ("oidc_client_id", &self.flag_oidc_client_id),
            ("oidc_client_secret", &self.flag_oidc_client_secret),
            ("oidc_provider_url", &self.flag_oidc_provider_url),
            ("oidc_redirect_url", &self.flag_oidc_redirect_url),
            ("oidc_end_session_url", &self.flag_oidc_end_session_url),
            ("access_keychain", &self.flag_access_keychain),
            ("access_key_id", &self.flag_access_key_id),
            ("access_key_secret", &self.flag_access_key_secret),
        ];
        for (key, value) in strings {
            if let Some(value) = value {
                settings.set(key, value.as_str());
            }
        }

        let flags = [
            ("editable", self.flag_editable),
            ("proxy", self.flag_proxy),
            ("ide", self.flag_ide),
            ("debug", self.flag_debug),
            ("oidc_skip_login", self.flag_oidc_skip_login),
        ];
        for (key, value) in flags {
            if value {
                settings.set(key, true);
            }
        }

        settings
    }
}
