//! Transport configuration for a single listener.

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ConfigError;

/// Certificate and private key for a TLS listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TlsConfig {
    cert: PathBuf,
    key: PathBuf,
}

impl TlsConfig {
    /// Path to the PEM encoded certificate chain.
    pub fn cert(&self) -> &Path {
        &self.cert
    }

    /// Path to the PEM encoded private key.
    pub fn key(&self) -> &Path {
        &self.key
    }
}

/// Bind address and optional TLS material of one listener.
///
/// TLS is enabled if and only if both a certificate and a key were given. A config with only one
/// of them can not be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportConfig {
    address: String,
    tls: Option<TlsConfig>,
}

fn non_empty(path: Option<&Path>) -> Option<&Path> {
    path.filter(|path| !path.as_os_str().is_empty())
}

impl TransportConfig {
    /// Creates a transport config, enabling TLS when both `cert` and `key` are given.
    ///
    /// Empty paths count as absent. Exactly one of them results in [`ConfigError::TlsMismatch`].
    pub fn new(
        address: impl Into<String>,
        cert: Option<&Path>,
        key: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let tls = match (non_empty(cert), non_empty(key)) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::TlsMismatch),
        };

        Ok(Self {
            address: address.into(),
            tls,
        })
    }

    /// Creates a transport config that never uses TLS.
    pub fn plaintext(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            tls: None,
        }
    }

    /// The configured bind address, as given.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The TLS material, if TLS is enabled.
    pub fn tls(&self) -> Option<&TlsConfig> {
        self.tls.as_ref()
    }

    /// Returns `true` if this listener serves HTTPS.
    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    /// Resolves the bind address to a socket address.
    ///
    /// An address without a host, such as `:9000`, binds all IPv4 interfaces.
    pub async fn resolve(&self) -> io::Result<SocketAddr> {
        let address = match self.address.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => self.address.clone(),
        };

        tokio::net::lookup_host(&address)
            .await?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("`{address}` did not resolve to any address"),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enables_tls_with_cert_and_key() {
        let transport =
            TransportConfig::new(":9000", Some(Path::new("c.pem")), Some(Path::new("k.pem")))
                .unwrap();

        let tls = transport.tls().unwrap();
        assert_eq!(tls.cert(), Path::new("c.pem"));
        assert_eq!(tls.key(), Path::new("k.pem"));
    }

    #[test]
    fn disables_tls_without_material() {
        let transport = TransportConfig::new(":9000", None, None).unwrap();
        assert!(!transport.is_tls());

        let transport =
            TransportConfig::new(":9000", Some(Path::new("")), Some(Path::new(""))).unwrap();
        assert!(!transport.is_tls());
    }

    #[test]
    fn rejects_half_of_the_tls_material() {
        let cases = [
            (Some("c.pem"), None),
            (None, Some("k.pem")),
            (Some("c.pem"), Some("")),
            (Some(""), Some("k.pem")),
        ];

        for (cert, key) in cases {
            let result = TransportConfig::new(":9000", cert.map(Path::new), key.map(Path::new));
            assert!(
                matches!(result, Err(ConfigError::TlsMismatch)),
                "cert={cert:?} key={key:?}"
            );
        }
    }

    #[tokio::test]
    async fn resolves_port_only_addresses() {
        let transport = TransportConfig::plaintext(":9000");
        let addr = transport.resolve().await.unwrap();
        assert_eq!(addr, SocketAddr::from(([0, 0, 0, 0], 9000)));

        let transport = TransportConfig::plaintext("127.0.0.1:8080");
        let addr = transport.resolve().await.unwrap();
        assert_eq!(addr, SocketAddr::from(([127, 0, 0, 1], 8080)));
    }
}
