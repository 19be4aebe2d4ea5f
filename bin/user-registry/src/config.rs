//! Environment-driven process configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const RPC_ADDR: &str = "USER_REGISTRY_RPC_ADDR";
pub const HTTP_ADDR: &str = "USER_REGISTRY_HTTP_ADDR";
pub const HTTPS_ADDR: &str = "USER_REGISTRY_HTTPS_ADDR";
pub const RPC_UPSTREAM: &str = "USER_REGISTRY_RPC_UPSTREAM";
pub const TLS_CERT: &str = "USER_REGISTRY_TLS_CERT";
pub const TLS_KEY: &str = "USER_REGISTRY_TLS_KEY";
pub const LOG_FORMAT: &str = "USER_REGISTRY_LOG_FORMAT";

const DEFAULT_RPC_ADDR: &str = "0.0.0.0:50051";
const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_HTTPS_ADDR: &str = "0.0.0.0:8443";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{set} is set but {missing} is not; HTTPS needs both")]
    IncompleteTls {
        set: &'static str,
        missing: &'static str,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected `text` or `json`, got `{}`", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub rpc_addr: SocketAddr,
    pub http_addr: SocketAddr,
    pub https_addr: SocketAddr,
    /// Endpoint the gateway dials for its loopback calls
    pub rpc_upstream: String,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let rpc_addr: SocketAddr = parse(RPC_ADDR, get(RPC_ADDR), DEFAULT_RPC_ADDR)?;
        let http_addr = parse(HTTP_ADDR, get(HTTP_ADDR), DEFAULT_HTTP_ADDR)?;
        let https_addr = parse(HTTPS_ADDR, get(HTTPS_ADDR), DEFAULT_HTTPS_ADDR)?;
        let log_format = parse(LOG_FORMAT, get(LOG_FORMAT), "text")?;

        let rpc_upstream = match get(RPC_UPSTREAM) {
            // The loopback channel is plaintext; tonic is built without TLS
            Some(upstream) if upstream.starts_with("http://") => upstream,
            Some(upstream) => {
                return Err(ConfigError::Invalid {
                    name: RPC_UPSTREAM,
                    value: upstream,
                    reason: "expected an http:// URI".to_string(),
                })
            }
            None => format!("http://127.0.0.1:{}", rpc_addr.port()),
        };

        let tls = match (get(TLS_CERT), get(TLS_KEY)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (Some(_), None) => {
                return Err(ConfigError::IncompleteTls {
                    set: TLS_CERT,
                    missing: TLS_KEY,
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::IncompleteTls {
                    set: TLS_KEY,
                    missing: TLS_CERT,
                })
            }
            (None, None) => None,
        };

        Ok(Self {
            rpc_addr,
            http_addr,
            https_addr,
            rpc_upstream,
            tls,
            log_format,
        })
    }
}

fn parse<T>(name: &'static str, value: Option<String>, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value = value.unwrap_or_else(|| default.to_string());
    let parsed = value.trim().parse::<T>();
    parsed.map_err(|e| ConfigError::Invalid {
        name,
        value,
        reason: e.to_string(),
    })
}
