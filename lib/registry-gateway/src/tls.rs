//! TLS support for the gateway's optional HTTPS listener

use crate::{GatewayError, Result};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use rustls_pemfile::{certs, private_key};
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info};

/// TLS configuration for HTTPS listener
#[derive(Clone)]
pub struct TlsServerConfig {
    /// Rustls server configuration
    pub config: Arc<ServerConfig>,
}

impl TlsServerConfig {
    /// Create a TLS configuration from PEM-encoded certificate chain and private key
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self> {
        debug!("Creating TLS configuration from PEM data");

        let certs = Self::load_certificates(cert_pem)?;
        debug!("Loaded {} certificate(s)", certs.len());

        let key = Self::load_private_key(key_pem)?;

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| GatewayError::Tls(format!("Unsupported protocol versions: {}", e)))?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| GatewayError::Tls(format!("Failed to create TLS config: {}", e)))?;
        config.alpn_protocols = vec![b"http/1.1".to_vec()];

        info!("TLS configuration created");
        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Read the certificate chain and private key from PEM files
    pub fn from_files(cert_path: &Path, key_path: &Path) -> Result<Self> {
        let cert = std::fs::read(cert_path).map_err(|e| {
            GatewayError::Tls(format!("Failed to read certificate {}: {}", cert_path.display(), e))
        })?;
        let key = std::fs::read(key_path).map_err(|e| {
            GatewayError::Tls(format!("Failed to read private key {}: {}", key_path.display(), e))
        })?;

        let config = Self::from_pem(&cert, &key)?;
        info!(
            "TLS configuration loaded from {} and {}",
            cert_path.display(),
            key_path.display()
        );
        Ok(config)
    }

    /// Acceptor for the HTTPS listener
    pub fn acceptor(&self) -> TlsAcceptor {
        TlsAcceptor::from(self.config.clone())
    }

    fn load_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
        let mut reader = BufReader::new(pem);
        let certs = certs(&mut reader)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| GatewayError::Tls(format!("Failed to parse certificates: {}", e)))?;

        if certs.is_empty() {
            return Err(GatewayError::Tls("No certificates found in PEM data".to_string()));
        }
        Ok(certs)
    }

    fn load_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>> {
        let mut reader = BufReader::new(pem);
        private_key(&mut reader)
            .map_err(|e| GatewayError::Tls(format!("Failed to parse private key: {}", e)))?
            .ok_or_else(|| GatewayError::Tls("No private key found in PEM data".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CERT: &[u8] = include_bytes!("../tests/fixtures/localhost.crt");
    const KEY: &[u8] = include_bytes!("../tests/fixtures/localhost.key");

    #[test]
    fn test_from_pem() {
        let config = TlsServerConfig::from_pem(CERT, KEY).expect("fixture should load");
        assert_eq!(config.config.alpn_protocols, vec![b"http/1.1".to_vec()]);
    }

    #[test]
    fn test_missing_certificate() {
        let err = TlsServerConfig::from_pem(b"", KEY).err().unwrap();
        assert!(err.to_string().contains("No certificates"));
    }

    #[test]
    fn test_missing_private_key() {
        let err = TlsServerConfig::from_pem(CERT, CERT).err().unwrap();
        assert!(err.to_string().contains("No private key"));
    }

    #[test]
    fn test_unreadable_files() {
        let result = TlsServerConfig::from_files(
            Path::new("/nonexistent/cert.pem"),
            Path::new("/nonexistent/key.pem"),
        );
        assert!(matches!(result, Err(GatewayError::Tls(_))));
    }
}
