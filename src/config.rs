use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::ConfigError;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_BODY_LIMIT_MB: usize = 5;
const DEFAULT_MODEL_PATH: &str = "./model/frozen_graph.pb";
const DEFAULT_INPUT_OP: &str = "x";
const DEFAULT_OUTPUT_OP: &str = "Identity";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub body_limit_bytes: usize,
    pub model_path: PathBuf,
    pub input_op: String,
    pub output_op: String,
    pub model_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let body_limit_mb = match lookup("BODY_LIMIT_MB") {
            Some(value) => match value.parse::<usize>() {
                Ok(mb) if mb > 0 => mb,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "BODY_LIMIT_MB",
                        expected: "a positive integer",
                        value,
                    })
                }
            },
            None => DEFAULT_BODY_LIMIT_MB,
        };

        let port = match lookup("PORT") {
            Some(value) => value.parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                expected: "a valid number between 0 and 65535",
                value,
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Config {
            host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.into()),
            port,
            body_limit_bytes: body_limit_mb * 1024 * 1024,
            model_path: lookup("MODEL_PATH")
                .unwrap_or_else(|| DEFAULT_MODEL_PATH.into())
                .into(),
            input_op: lookup("MODEL_INPUT_OP").unwrap_or_else(|| DEFAULT_INPUT_OP.into()),
            output_op: lookup("MODEL_OUTPUT_OP").unwrap_or_else(|| DEFAULT_OUTPUT_OP.into()),
            model_url: lookup("MODEL_URL").filter(|url| !url.is_empty()),
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::BindAddr(addr))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.body_limit_bytes, 5 * 1024 * 1024);
        assert_eq!(config.model_path, PathBuf::from("./model/frozen_graph.pb"));
        assert_eq!(config.input_op, "x");
        assert_eq!(config.output_op, "Identity");
        assert_eq!(config.model_url, None);
        assert_eq!(config.bind_addr().unwrap(), "0.0.0.0:5000".parse().unwrap());
    }

    #[test]
    fn overrides() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("HOST", "127.0.0.1"),
            ("BODY_LIMIT_MB", "12"),
            ("MODEL_PATH", "/srv/model.pb"),
            ("MODEL_URL", "https://example.com/model.pb"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr().unwrap(), "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.body_limit_bytes, 12 * 1024 * 1024);
        assert_eq!(config.model_path, PathBuf::from("/srv/model.pb"));
        assert_eq!(config.model_url.as_deref(), Some("https://example.com/model.pb"));
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(config_from(&[("PORT", "70000")]).is_err());
        assert!(config_from(&[("BODY_LIMIT_MB", "five")]).is_err());
        assert!(config_from(&[("BODY_LIMIT_MB", "0")]).is_err());
    }

    #[test]
    fn rejects_bad_host() {
        let config = config_from(&[("HOST", "not a host")]).unwrap();
        assert!(matches!(config.bind_addr(), Err(ConfigError::BindAddr(_))));
    }
}
