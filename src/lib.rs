//! Configuration resolution and validation for the Wave server.
//!
//! The server is configured from layered sources: built-in defaults, an optional TOML config
//! file, and overrides from the environment and command line. `config::resolve` merges these
//! into one immutable, validated `config::ServerConf`.

pub mod cli;
pub mod config;
pub mod keychain;
pub mod utils;
pub mod validation;
