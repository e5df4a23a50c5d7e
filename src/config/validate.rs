//! Cross-field rules for a merged configuration.
//!
//! Every rule in `RULES` runs on each resolution, and every failure is reported, so operators can
//! fix their configuration in one pass. Adjust policy by editing the table.

use super::{AuthConf, ByteSize, ListenAddr, Problem};
use crate::validation::{parse_absolute_url, parse_redirect_url};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A merged and coerced configuration that has not been validated yet.
///
/// Required options that are missing or failed to coerce are `None`; those problems are already
/// reported, and rules depending on them pass.
#[derive(Clone, Debug)]
pub struct Draft {
    pub version: String,
    pub build_date: String,
    pub listen: Option<ListenAddr>,
    pub web_dir: PathBuf,
    pub data_dir: Option<PathBuf>,
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
    pub access_keychain: PathBuf,
    pub access_key_id: String,
    pub access_key_secret: String,
}

/// A single validation rule. Returns the reason on failure.
pub struct Rule {
    pub field: &'static str,
    pub check: fn(&Draft) -> Result<(), String>,
}

pub const RULES: &[Rule] = &[
    Rule {
        field: "key_file",
        check: tls_pair,
    },
    Rule {
        field: "cert_file",
        check: tls_cert_exists,
    },
    Rule {
        field: "key_file",
        check: tls_key_exists,
    },
    Rule {
        field: "max_request_size",
        check: request_size,
    },
    Rule {
        field: "max_cache_request_size",
        check: cache_request_size,
    },
    Rule {
        field: "max_proxy_request_size",
        check: proxy_request_size,
    },
    Rule {
        field: "max_proxy_response_size",
        check: proxy_response_size,
    },
    Rule {
        field: "web_dir",
        check: web_dir,
    },
    Rule {
        field: "data_dir",
        check: data_dir,
    },
    Rule {
        field: "oidc_client_id",
        check: |draft| login_requires(draft, |auth| &auth.client_id),
    },
    Rule {
        field: "oidc_client_secret",
        check: |draft| login_requires(draft, |auth| &auth.client_secret),
    },
    Rule {
        field: "oidc_provider_url",
        check: |draft| login_requires(draft, |auth| &auth.provider_url),
    },
    Rule {
        field: "oidc_redirect_url",
        check: |draft| login_requires(draft, |auth| &auth.redirect_url),
    },
    Rule {
        field: "oidc_provider_url",
        check: provider_url,
    },
    Rule {
        field: "oidc_redirect_url",
        check: redirect_url,
    },
    Rule {
        field: "oidc_end_session_url",
        check: end_session_url,
    },
    Rule {
        field: "access_key_secret",
        check: access_key_pair,
    },
];

/// Run every rule, collecting all failures.
pub fn validate(draft: &Draft) -> Vec<Problem> {
    RULES
        .iter()
        .filter_map(|rule| {
            (rule.check)(draft)
                .err()
                .map(|reason| Problem::InvariantViolation {
                    field: rule.field,
                    reason,
                })
        })
        .collect()
}

fn is_set(path: &Path) -> bool {
    !path.as_os_str().is_empty()
}

fn tls_pair(draft: &Draft) -> Result<(), String> {
    match (is_set(&draft.cert_file), is_set(&draft.key_file)) {
        (true, false) => Err("TLS certificate is set, but the TLS key is missing".to_owned()),
        (false, true) => Err("TLS key is set, but the TLS certificate is missing".to_owned()),
        _ => Ok(()),
    }
}

fn existing_file(path: &Path) -> Result<(), String> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(format!("{} is not a file", path.display())),
        Err(err) => Err(format!("cannot read {}: {err}", path.display())),
    }
}

fn tls_cert_exists(draft: &Draft) -> Result<(), String> {
    if is_set(&draft.cert_file) && is_set(&draft.key_file) {
        existing_file(&draft.cert_file)
    } else {
        Ok(())
    }
}

fn tls_key_exists(draft: &Draft) -> Result<(), String> {
    if is_set(&draft.cert_file) && is_set(&draft.key_file) {
        existing_file(&draft.key_file)
    } else {
        Ok(())
    }
}

fn request_size(draft: &Draft) -> Result<(), String> {
    if draft.max_request_size.is_zero() {
        return Err("must be greater than zero".to_owned());
    }
    Ok(())
}

fn cache_request_size(draft: &Draft) -> Result<(), String> {
    if draft.max_cache_request_size.is_zero() {
        return Err("must be greater than zero".to_owned());
    }
    if draft.max_cache_request_size > draft.max_request_size {
        return Err(format!(
            "cache size limit ({}) must not exceed max_request_size ({})",
            draft.max_cache_request_size, draft.max_request_size
        ));
    }
    Ok(())
}

fn proxy_request_size(draft: &Draft) -> Result<(), String> {
    if draft.proxy && draft.max_proxy_request_size.is_zero() {
        return Err("must be greater than zero when proxy is enabled".to_owned());
    }
    Ok(())
}

fn proxy_response_size(draft: &Draft) -> Result<(), String> {
    if draft.proxy && draft.max_proxy_response_size.is_zero() {
        return Err("must be greater than zero when proxy is enabled".to_owned());
    }
    Ok(())
}

fn web_dir(draft: &Draft) -> Result<(), String> {
    if !is_set(&draft.web_dir) {
        return Ok(());
    }
    match fs::read_dir(&draft.web_dir) {
        Ok(_) => Ok(()),
        Err(err) => Err(format!(
            "cannot read directory {}: {err}",
            draft.web_dir.display()
        )),
    }
}

fn data_dir(draft: &Draft) -> Result<(), String> {
    let Some(ref path) = draft.data_dir else {
        return Ok(());
    };
    match fs::metadata(path) {
        Ok(meta) if !meta.is_dir() => Err(format!("{} is not a directory", path.display())),
        // Permission bits don't tell whether this process may write, so try it.
        Ok(_) => match NamedTempFile::new_in(path) {
            Ok(_) => Ok(()),
            Err(err) => Err(format!("{} is not writable: {err}", path.display())),
        },
        Err(err) => Err(format!("cannot use {}: {err}", path.display())),
    }
}

fn login_requires(draft: &Draft, value: fn(&AuthConf) -> &String) -> Result<(), String> {
    match draft.auth {
        Some(ref auth) if !auth.skip_login && value(auth).is_empty() => {
            Err("required when authentication is enabled, unless oidc_skip_login is set".to_owned())
        }
        _ => Ok(()),
    }
}

fn provider_url(draft: &Draft) -> Result<(), String> {
    match draft.auth {
        Some(ref auth) if !auth.provider_url.is_empty() => parse_absolute_url(&auth.provider_url)
            .map(drop)
            .map_err(|err| err.to_string()),
        _ => Ok(()),
    }
}

fn redirect_url(draft: &Draft) -> Result<(), String> {
    match draft.auth {
        Some(ref auth) if !auth.redirect_url.is_empty() => parse_redirect_url(&auth.redirect_url)
            .map(drop)
            .map_err(|err| err.to_string()),
        _ => Ok(()),
    }
}

fn end_session_url(draft: &Draft) -> Result<(), String> {
    match draft.auth {
        Some(ref auth) if !auth.end_session_url.is_empty() => {
            parse_absolute_url(&auth.end_session_url)
                .map(drop)
                .map_err(|err| err.to_string())
        }
        _ => Ok(()),
    }
}

fn access_key_pair(draft: &Draft) -> Result<(), String> {
    match (
        draft.access_key_id.is_empty(),
        draft.access_key_secret.is_empty(),
    ) {
        (false, true) => Err("access_key_id is set, but access_key_secret is missing".to_owned()),
        (true, false) => Err("access_key_secret is set, but access_key_id is missing".to_owned()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{validate, Draft};
    use crate::config::{AuthConf, ByteSize, ProblemKind};
    use std::path::PathBuf;

    fn draft() -> Draft {
        Draft {
            version: String::new(),
            build_date: String::new(),
            listen: Some(":8080".parse().unwrap()),
            web_dir: PathBuf::new(),
            data_dir: None,
            init: String::new(),
            compact: String::new(),
            cert_file: PathBuf::new(),
            key_file: PathBuf::new(),
            editable: false,
            max_request_size: ByteSize::mb(5),
            max_cache_request_size: ByteSize::mb(5),
            proxy: false,
            max_proxy_request_size: ByteSize::mb(10),
            max_proxy_response_size: ByteSize::mb(10),
            ide: false,
            debug: false,
            auth: None,
            access_keychain: PathBuf::new(),
            access_key_id: String::new(),
            access_key_secret: String::new(),
        }
    }

    fn fields(draft: &Draft) -> Vec<&'static str> {
        validate(draft)
            .iter()
            .inspect(|problem| assert_eq!(problem.kind(), ProblemKind::InvariantViolation))
            .map(|problem| problem.field())
            .collect()
    }

    #[test]
    fn test_valid() {
        assert!(fields(&draft()).is_empty());
    }

    #[test]
    fn test_tls_pairing() {
        let mut cert_only = draft();
        cert_only.cert_file = "cert.pem".into();
        assert_eq!(fields(&cert_only), vec!["key_file"]);

        let mut key_only = draft();
        key_only.key_file = "key.pem".into();
        assert_eq!(fields(&key_only), vec!["key_file"]);

        let mut missing_files = draft();
        missing_files.cert_file = "/nonexistent/cert.pem".into();
        missing_files.key_file = "/nonexistent/key.pem".into();
        assert_eq!(fields(&missing_files), vec!["cert_file", "key_file"]);
    }

    #[test]
    fn test_sizes() {
        let mut zero = draft();
        zero.max_request_size = ByteSize(0);
        zero.max_cache_request_size = ByteSize(0);
        assert_eq!(
            fields(&zero),
            vec!["max_request_size", "max_cache_request_size"]
        );

        let mut equal = draft();
        equal.max_request_size = ByteSize(1000);
        equal.max_cache_request_size = ByteSize(1000);
        assert!(fields(&equal).is_empty());

        let mut larger = draft();
        larger.max_cache_request_size = ByteSize::mb(6);
        assert_eq!(fields(&larger), vec!["max_cache_request_size"]);
    }

    #[test]
    fn test_proxy_sizes() {
        let mut disabled = draft();
        disabled.max_proxy_request_size = ByteSize(0);
        disabled.max_proxy_response_size = ByteSize(0);
        assert!(fields(&disabled).is_empty());

        let mut enabled = disabled.clone();
        enabled.proxy = true;
        assert_eq!(
            fields(&enabled),
            vec!["max_proxy_request_size", "max_proxy_response_size"]
        );
    }

    #[test]
    fn test_directories() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, "").unwrap();

        let mut ok = draft();
        ok.web_dir = dir.path().into();
        ok.data_dir = Some(dir.path().into());
        assert!(fields(&ok).is_empty());

        let mut bad = draft();
        bad.web_dir = dir.path().join("missing");
        bad.data_dir = Some(file);
        assert_eq!(fields(&bad), vec!["web_dir", "data_dir"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_data_dir() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        std::fs::create_dir(&data_dir).unwrap();
        std::fs::write(data_dir.join(".wave-keychain"), "").unwrap();
        std::fs::set_permissions(&data_dir, std::fs::Permissions::from_mode(0o555)).unwrap();

        // Privileged users write regardless of mode bits.
        let privileged = std::fs::write(data_dir.join("check"), "").is_ok();
        if !privileged {
            let mut draft = draft();
            draft.data_dir = Some(data_dir.clone());
            let problems = validate(&draft);
            assert_eq!(problems.len(), 1);
            assert_eq!(problems[0].field(), "data_dir");
            assert!(problems[0].to_string().contains("is not writable"));
        }

        std::fs::set_permissions(&data_dir, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_auth() {
        let mut skip = draft();
        skip.auth = Some(AuthConf {
            skip_login: true,
            ..Default::default()
        });
        assert!(fields(&skip).is_empty());

        let mut empty = draft();
        empty.auth = Some(AuthConf {
            end_session_url: "https://auth.example.com/logout".to_owned(),
            ..Default::default()
        });
        assert_eq!(
            fields(&empty),
            vec![
                "oidc_client_id",
                "oidc_client_secret",
                "oidc_provider_url",
                "oidc_redirect_url",
            ]
        );

        let mut malformed = draft();
        malformed.auth = Some(AuthConf {
            client_id: "wave".to_owned(),
            client_secret: "s3cret".to_owned(),
            provider_url: "auth.example.com".to_owned(),
            redirect_url: "http://localhost:10101/callback".to_owned(),
            end_session_url: "ftp://auth.example.com".to_owned(),
            skip_login: false,
        });
        assert_eq!(
            fields(&malformed),
            vec![
                "oidc_provider_url",
                "oidc_redirect_url",
                "oidc_end_session_url",
            ]
        );
    }

    #[test]
    fn test_access_key_pair() {
        let mut id_only = draft();
        id_only.access_key_id = "admin".to_owned();
        assert_eq!(fields(&id_only), vec!["access_key_secret"]);

        let mut both = id_only.clone();
        both.access_key_secret = "hunter2".to_owned();
        assert!(fields(&both).is_empty());
    }
}
