use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ListenAddrError {
    #[error("listen address must have the form host:port")]
    NoPort,
    #[error("listen address has an invalid port: {0}")]
    InvalidPort(String),
    #[error("listen address has an invalid host: {0}")]
    InvalidHost(String),
}

/// A network bind address of the form `host:port`.
///
/// The host may be empty (`:8080`) to listen on all interfaces. IPv6 hosts must be enclosed in
/// brackets, and are stored without them.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ListenAddr {
    host: String,
    port: u16,
}

impl ListenAddr {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

fn is_valid_hostname(host: &str) -> bool {
    // Dotted numbers are IPv4 addresses, valid or not.
    let numeric = host
        .split('.')
        .all(|label| !label.is_empty() && label.bytes().all(|b| b.is_ascii_digit()));
    !numeric
        && host.len() <= 253
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

impl FromStr for ListenAddr {
    type Err = ListenAddrError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (host, port) = value.rsplit_once(':').ok_or(ListenAddrError::NoPort)?;

        let port = match port.parse::<u16>() {
            // Compare with the text as written, so signs and leading zeros are rejected.
            Ok(number) if number != 0 && number.to_string() == port => number,
            _ => return Err(ListenAddrError::InvalidPort(port.to_owned())),
        };

        let host = if let Some(inner) = host.strip_prefix('[') {
            let inner = inner
                .strip_suffix(']')
                .ok_or_else(|| ListenAddrError::InvalidHost(host.to_owned()))?;
            inner
                .parse::<Ipv6Addr>()
                .map_err(|_| ListenAddrError::InvalidHost(host.to_owned()))?;
            inner.to_owned()
        } else if host.is_empty()
            || host.parse::<Ipv4Addr>().is_ok()
            || (!host.contains(':') && is_valid_hostname(host))
        {
            host.to_owned()
        } else {
            return Err(ListenAddrError::InvalidHost(host.to_owned()));
        };

        Ok(ListenAddr { host, port })
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ListenAddr;

    #[test]
    fn valid_addresses() {
        for input in &[
            ":8080",
            ":10101",
            "127.0.0.1:8080",
            "0.0.0.0:443",
            "localhost:3000",
            "wave.example.com:80",
            "10.example:80",
            "[::1]:8080",
            "[::]:10101",
        ] {
            match input.parse::<ListenAddr>() {
                Ok(addr) => assert_eq!(&addr.to_string(), input),
                Err(err) => panic!("unexpectedly rejected address: {input}. Reported: {err}"),
            }
        }
    }

    #[test]
    fn invalid_addresses() {
        for input in &[
            "",
            "8080",
            "localhost",
            ":",
            ":0",
            ":65536",
            ":+80",
            ":080",
            "host:port",
            "::1:8080",
            "[::1:8080",
            "[not-ipv6]:8080",
            "-bad-.example:80",
            "under_score:80",
            "a..b:80",
            "256.1.1.1:80",
            "1.2.3:80",
            "8080:80",
        ] {
            assert!(
                input.parse::<ListenAddr>().is_err(),
                "did not reject address: {input}"
            );
        }
    }

    #[test]
    fn strips_ipv6_brackets() {
        let addr: ListenAddr = "[::1]:8080".parse().unwrap();
        assert_eq!(addr.host(), "::1");
        assert_eq!(addr.port(), 8080);
    }
}
