//! Access key store protecting sessions of the server.
//!
//! The keychain is a plain text file with one access key per line, in the form `<id> <hash>`.
//! Empty lines are skipped. Comments start with `#` and can both appear on their own line or
//! follow an entry on the same line. Secrets are never stored, only PBKDF2 hashes of them.

use crate::utils::base64url;
use log::info;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Error as IoError, ErrorKind, Read};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Name of the keychain file inside the data directory, unless configured otherwise.
pub const DEFAULT_KEYCHAIN_FILE: &str = ".wave-keychain";

const HASH_SCHEME: &str = "pbkdf2-sha256";
const HASH_ITERATIONS: u32 = 10_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum KeychainError {
    #[error("could not access keychain '{}': {err}", path.display())]
    Io { path: PathBuf, err: IoError },
    #[error("{}:{line}: malformed keychain entry", path.display())]
    Malformed { path: PathBuf, line: usize },
    #[error("{}:{line}: unsupported hash for access key '{id}'", path.display())]
    UnsupportedHash {
        path: PathBuf,
        line: usize,
        id: String,
    },
    #[error("access key id must be non-empty and contain no whitespace")]
    InvalidId,
    #[error("secure random number generator failed")]
    Random,
}

/// A salted PBKDF2 hash of an access key secret.
#[derive(Clone, Eq, PartialEq)]
struct SecretHash {
    iterations: NonZeroU32,
    salt: Vec<u8>,
    hash: Vec<u8>,
}

impl SecretHash {
    fn generate(secret: &str, rng: &dyn SecureRandom) -> Result<Self, KeychainError> {
        let mut salt = vec![0; SALT_LEN];
        rng.fill(&mut salt).map_err(|_| KeychainError::Random)?;
        let iterations = NonZeroU32::new(HASH_ITERATIONS).ok_or(KeychainError::Random)?;
        let mut hash = vec![0; HASH_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations,
            &salt,
            secret.as_bytes(),
            &mut hash,
        );
        Ok(Self {
            iterations,
            salt,
            hash,
        })
    }

    fn verify(&self, secret: &str) -> bool {
        pbkdf2::verify(
            pbkdf2::PBKDF2_HMAC_SHA256,
            self.iterations,
            &self.salt,
            secret.as_bytes(),
            &self.hash,
        )
        .is_ok()
    }
}

impl FromStr for SecretHash {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.split('$');
        if parts.next() != Some(HASH_SCHEME) {
            return Err(());
        }
        let iterations = parts
            .next()
            .and_then(|part| part.parse().ok())
            .ok_or(())?;
        let salt = parts
            .next()
            .and_then(|part| base64url::decode(part).ok())
            .ok_or(())?;
        let hash = parts
            .next()
            .and_then(|part| base64url::decode(part).ok())
            .filter(|hash| !hash.is_empty())
            .ok_or(())?;
        if parts.next().is_some() {
            return Err(());
        }
        Ok(Self {
            iterations,
            salt,
            hash,
        })
    }
}

impl fmt::Display for SecretHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{HASH_SCHEME}${}${}${}",
            self.iterations,
            base64url::encode(&self.salt),
            base64url::encode(&self.hash)
        )
    }
}

/// Opaque handle to the access keys of the server.
pub struct Keychain {
    path: PathBuf,
    keys: BTreeMap<String, SecretHash>,
    default_id: Option<String>,
    rng: SystemRandom,
}

impl Keychain {
    /// Load the keychain at `path`, creating an empty one if it doesn't exist yet.
    ///
    /// An existing file is never modified.
    pub fn load_or_create(path: &Path) -> Result<Self, KeychainError> {
        let io_error = |err| KeychainError::Io {
            path: path.to_owned(),
            err,
        };
        let keys = match File::open(path) {
            Ok(file) => Self::parse(file, path)?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                match OpenOptions::new().write(true).create_new(true).open(path) {
                    Ok(_) => info!("Created empty keychain at: {}", path.display()),
                    // Lost a race with another process; that file is as good as ours.
                    Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
                    Err(err) => return Err(io_error(err)),
                }
                BTreeMap::new()
            }
            Err(err) => return Err(io_error(err)),
        };
        info!("Loaded {} access key(s) from: {}", keys.len(), path.display());
        Ok(Self {
            path: path.to_owned(),
            keys,
            default_id: None,
            rng: SystemRandom::new(),
        })
    }

    fn parse<R: Read>(reader: R, path: &Path) -> Result<BTreeMap<String, SecretHash>, KeychainError> {
        let mut keys = BTreeMap::new();
        for (idx, data) in BufReader::new(reader).lines().enumerate() {
            let line = idx + 1;
            let data = data.map_err(|err| KeychainError::Io {
                path: path.to_owned(),
                err,
            })?;
            let data = data.split('#').next().unwrap_or_default().trim();
            if data.is_empty() {
                continue;
            }

            let mut fields = data.split_whitespace();
            let (Some(id), Some(hash), None) = (fields.next(), fields.next(), fields.next()) else {
                return Err(KeychainError::Malformed {
                    path: path.to_owned(),
                    line,
                });
            };
            let hash = hash.parse::<SecretHash>().map_err(|()| KeychainError::UnsupportedHash {
                path: path.to_owned(),
                line,
                id: id.to_owned(),
            })?;
            keys.insert(id.to_owned(), hash);
        }
        Ok(keys)
    }

    /// Add an access key in memory. Replaces any key with the same id.
    pub fn add(&mut self, id: &str, secret: &str) -> Result<(), KeychainError> {
        if id.is_empty() || id.contains(char::is_whitespace) || id.contains('#') {
            return Err(KeychainError::InvalidId);
        }
        let hash = SecretHash::generate(secret, &self.rng)?;
        self.keys.insert(id.to_owned(), hash);
        Ok(())
    }

    /// Add the access key configured through server options.
    pub fn add_default(&mut self, id: &str, secret: &str) -> Result<(), KeychainError> {
        self.add(id, secret)?;
        self.default_id = Some(id.to_owned());
        Ok(())
    }

    /// Check a secret against the access key with the given id.
    pub fn verify(&self, id: &str, secret: &str) -> bool {
        self.keys.get(id).map_or(false, |hash| hash.verify(secret))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    /// The id of the access key configured through server options, if any.
    pub fn default_id(&self) -> Option<&str> {
        self.default_id.as_deref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// Hashes use random salts, so comparison is by location and key ids only.
impl PartialEq for Keychain {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.default_id == other.default_id
            && self.keys.keys().eq(other.keys.keys())
    }
}

impl fmt::Debug for Keychain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keychain")
            .field("path", &self.path)
            .field("ids", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}
