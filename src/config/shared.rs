use super::resolve::resolve_with;
use super::{ConfigError, ConfigRc, ServerConf, Settings, Warning};
use std::sync::{Arc, PoisonError, RwLock};

/// The current server configuration, shared between request handlers.
///
/// Readers get an `Arc` to an immutable `ServerConf`. Reloading resolves a complete new
/// configuration and publishes it with a single swap, so readers never see a partial update.
pub struct SharedConf {
    inner: RwLock<ConfigRc>,
}

impl SharedConf {
    pub fn new(conf: ServerConf) -> Self {
        Self {
            inner: RwLock::new(Arc::new(conf)),
        }
    }

    /// The configuration currently in effect.
    pub fn current(&self) -> ConfigRc {
        Arc::clone(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Resolve the layers again and swap in the result.
    ///
    /// The keychain is reused when its location and the configured access key didn't change, so
    /// active sessions stay valid. On error, the current configuration stays in effect.
    pub fn reload(
        &self,
        defaults: &Settings,
        file: &Settings,
        overrides: &Settings,
    ) -> Result<Vec<Warning>, ConfigError> {
        let previous = self.current();
        let resolved = resolve_with(defaults, file, overrides, Some(&previous))?;
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(resolved.conf);
        log::info!("Configuration reloaded");
        Ok(resolved.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::super::{resolve, Settings};
    use super::SharedConf;
    use std::sync::Arc;

    fn layers(data_dir: &std::path::Path) -> Settings {
        Settings::new()
            .with("listen", ":8080")
            .with("data_dir", data_dir.display().to_string())
    }

    #[test]
    fn test_reload_reuses_keychain() {
        let dir = tempfile::tempdir().unwrap();
        let defaults = layers(dir.path());
        let conf = resolve(&defaults, &Settings::new(), &Settings::new())
            .unwrap()
            .conf;
        let shared = SharedConf::new(conf);
        let before = shared.current();

        let overrides = Settings::new().with("debug", true);
        shared
            .reload(&defaults, &Settings::new(), &overrides)
            .unwrap();
        let after = shared.current();

        assert!(!before.debug);
        assert!(after.debug);
        assert!(Arc::ptr_eq(&before.keychain, &after.keychain));
    }

    #[test]
    fn test_reload_new_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let defaults = layers(dir.path());
        let conf = resolve(&defaults, &Settings::new(), &Settings::new())
            .unwrap()
            .conf;
        let shared = SharedConf::new(conf);
        let before = shared.current();

        let other = dir.path().join("other");
        let overrides = Settings::new().with("data_dir", other.display().to_string());
        shared
            .reload(&defaults, &Settings::new(), &overrides)
            .unwrap();
        let after = shared.current();

        assert_eq!(after.data_dir, other);
        assert!(!Arc::ptr_eq(&before.keychain, &after.keychain));
    }

    #[test]
    fn test_reload_access_key_changes() {
        let dir = tempfile::tempdir().unwrap();
        let defaults = layers(dir.path());
        let with_key = |secret: &str| {
            Settings::new()
                .with("access_key_id", "admin")
                .with("access_key_secret", secret)
        };
        let conf = resolve(&defaults, &Settings::new(), &with_key("one"))
            .unwrap()
            .conf;
        let shared = SharedConf::new(conf);
        let first = shared.current();
        assert!(first.keychain.verify("admin", "one"));

        shared
            .reload(&defaults, &Settings::new(), &with_key("two"))
            .unwrap();
        let changed = shared.current();
        assert!(!Arc::ptr_eq(&first.keychain, &changed.keychain));
        assert!(changed.keychain.verify("admin", "two"));
        assert!(!changed.keychain.verify("admin", "one"));

        shared
            .reload(&defaults, &Settings::new(), &with_key("two"))
            .unwrap();
        let same = shared.current();
        assert!(Arc::ptr_eq(&changed.keychain, &same.keychain));

        shared
            .reload(&defaults, &Settings::new(), &Settings::new())
            .unwrap();
        let removed = shared.current();
        assert!(!Arc::ptr_eq(&same.keychain, &removed.keychain));
        assert_eq!(removed.keychain.default_id(), None);
        assert!(!removed.keychain.verify("admin", "two"));
    }

    #[test]
    fn test_failed_reload_keeps_current() {
        let dir = tempfile::tempdir().unwrap();
        let defaults = layers(dir.path());
        let conf = resolve(&defaults, &Settings::new(), &Settings::new())
            .unwrap()
            .conf;
        let shared = SharedConf::new(conf);
        let before = shared.current();

        let overrides = Settings::new().with("cert_file", "a.pem");
        assert!(shared
            .reload(&defaults, &Settings::new(), &overrides)
            .is_err());
        assert!(Arc::ptr_eq(&before, &shared.current()));
    }
}
