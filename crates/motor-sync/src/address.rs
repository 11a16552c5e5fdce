//! Server address types and parsing.

use std::fmt;
#[cfg(unix)]
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Default MongoDB server port.
pub const DEFAULT_PORT: u16 = 27017;

/// The network location of a server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServerAddress {
    /// TCP host and port.
    Tcp {
        /// Host name or IP literal.
        host: String,
        /// Port number, defaulting to 27017 when a URI omits it.
        port: u16,
    },
    /// Unix domain socket.
    #[cfg(unix)]
    Unix {
        /// Filesystem path of the socket.
        path: PathBuf,
    },
}

impl ServerAddress {
    /// Parse the address portion of a connection string.
    ///
    /// Accepts `host`, `host:port`, a bracketed IPv6 literal with optional
    /// port, and an absolute Unix socket path such as
    /// `/tmp/mongodb-27017.sock`. Socket paths are an environment
    /// capability: on platforms without Unix sockets they parse to a
    /// configuration error rather than a panic or a silent TCP fallback.
    pub fn parse(address: impl AsRef<str>) -> Result<Self> {
        let address = address.as_ref();
        if address.is_empty() {
            return Err(Error::Configuration("empty server address".into()));
        }

        if address.starts_with('/') || address.ends_with(".sock") {
            #[cfg(unix)]
            return Ok(Self::Unix {
                path: PathBuf::from(address),
            });
            #[cfg(not(unix))]
            return Err(Error::Configuration(format!(
                "Unix domain socket path {address:?} is not supported on this platform"
            )));
        }

        if let Some(rest) = address.strip_prefix('[') {
            // Bracketed IPv6 literal, e.g. `[::1]:27017` or `[::1]`.
            let Some((host, tail)) = rest.split_once(']') else {
                return Err(Error::Configuration(format!(
                    "unterminated IPv6 literal in address {address:?}"
                )));
            };
            let port = match tail.strip_prefix(':') {
                Some(port) => parse_port(address, port)?,
                None if tail.is_empty() => DEFAULT_PORT,
                None => {
                    return Err(Error::Configuration(format!(
                        "unexpected trailing characters in address {address:?}"
                    )));
                }
            };
            return Ok(Self::Tcp {
                host: host.to_string(),
                port,
            });
        }

        let (host, port) = match address.rsplit_once(':') {
            Some((host, port)) => (host, parse_port(address, port)?),
            None => (address, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(Error::Configuration(format!(
                "missing host in address {address:?}"
            )));
        }
        Ok(Self::Tcp {
            host: host.to_string(),
            port,
        })
    }
}

fn parse_port(address: &str, port: &str) -> Result<u16> {
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(Error::Configuration(format!(
            "invalid port {port:?} in address {address:?}"
        ))),
        Ok(port) => Ok(port),
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } => {
                if host.contains(':') {
                    write!(f, "[{host}]:{port}")
                } else {
                    write!(f, "{host}:{port}")
                }
            }
            #[cfg(unix)]
            Self::Unix { path } => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_host_only_uses_default_port() {
        let addr = ServerAddress::parse("localhost").unwrap();
        assert_eq!(
            addr,
            ServerAddress::Tcp {
                host: "localhost".into(),
                port: DEFAULT_PORT
            }
        );
    }

    #[test]
    fn parse_host_and_port() {
        let addr = ServerAddress::parse("db.example.com:30000").unwrap();
        assert_eq!(
            addr,
            ServerAddress::Tcp {
                host: "db.example.com".into(),
                port: 30000
            }
        );
    }

    #[test]
    fn parse_bracketed_ipv6() {
        let addr = ServerAddress::parse("[::1]:27018").unwrap();
        assert_eq!(
            addr,
            ServerAddress::Tcp {
                host: "::1".into(),
                port: 27018
            }
        );
        let addr = ServerAddress::parse("[::1]").unwrap();
        assert_eq!(
            addr,
            ServerAddress::Tcp {
                host: "::1".into(),
                port: DEFAULT_PORT
            }
        );
    }

    #[test]
    fn parse_rejects_bad_ports() {
        assert!(ServerAddress::parse("localhost:0").is_err());
        assert!(ServerAddress::parse("localhost:notaport").is_err());
        assert!(ServerAddress::parse("localhost:70000").is_err());
    }

    #[test]
    fn parse_rejects_empty_inputs() {
        assert!(ServerAddress::parse("").is_err());
        assert!(ServerAddress::parse(":27017").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn parse_unix_socket_path() {
        let addr = ServerAddress::parse("/tmp/mongodb-27017.sock").unwrap();
        assert_eq!(
            addr,
            ServerAddress::Unix {
                path: "/tmp/mongodb-27017.sock".into()
            }
        );
        assert_eq!(addr.to_string(), "/tmp/mongodb-27017.sock");
    }

    #[test]
    fn display_round_trips_tcp() {
        let addr = ServerAddress::parse("example.net:9999").unwrap();
        assert_eq!(addr.to_string(), "example.net:9999");
        let addr = ServerAddress::parse("[::1]:27018").unwrap();
        assert_eq!(addr.to_string(), "[::1]:27018");
    }
}
