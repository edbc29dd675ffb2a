use std::fs;
use std::net::{Ipv4Addr, SocketAddr};

use log::{debug, trace};
use pingora::server::configuration::{Opt, ServerConf};
use pingora_error::{ErrorType::*, OrErr, Result};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Config {
    #[serde(default)]
    pub pingora: ServerConf,

    #[validate(length(min = 1))]
    #[validate(nested)]
    pub listeners: Vec<Listener>,

    #[validate(nested)]
    #[serde(default)]
    pub downstream: Downstream,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pingora: ServerConf::default(),
            listeners: vec![Listener::default()],
            downstream: Downstream::default(),
        }
    }
}

// Config file load and validation
impl Config {
    pub fn load_from_yaml<P>(path: P) -> Result<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path).or_err_with(ReadError, || {
            format!("Unable to read conf file from {path}")
        })?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    /// Config load entry point. Falls back to the compiled defaults
    /// (listener on 0.0.0.0:8080, downstream on 127.0.0.1:8000) when no
    /// conf file is given on the command line.
    pub fn load_yaml_with_opt_override(opt: &Opt) -> Result<Self> {
        let mut conf = if let Some(path) = &opt.conf {
            Self::load_from_yaml(path)?
        } else {
            Self::default()
        };
        conf.merge_with_opt(opt);
        Ok(conf)
    }

    pub fn from_yaml(conf_str: &str) -> Result<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: Config = serde_yaml::from_str(conf_str).or_err_with(ReadError, || {
            format!("Unable to parse yaml conf {conf_str}")
        })?;

        trace!("Loaded conf: {conf:?}");

        // use validator to validate conf file
        conf.validate()
            .or_err_with(FileReadError, || "Conf file valid failed")?;

        Ok(conf)
    }

    #[allow(dead_code)]
    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(self).unwrap()
    }

    pub fn merge_with_opt(&mut self, opt: &Opt) {
        if opt.daemon {
            self.pingora.daemon = true;
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "Listener::validate_tls_for_offer_h2"))]
pub struct Listener {
    pub address: SocketAddr,
    pub tls: Option<Tls>,
    #[serde(default)]
    pub offer_h2: bool,
}

impl Default for Listener {
    fn default() -> Self {
        Self {
            address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
            tls: None,
            offer_h2: false,
        }
    }
}

impl Listener {
    fn validate_tls_for_offer_h2(&self) -> Result<(), ValidationError> {
        if self.offer_h2 && self.tls.is_none() {
            Err(ValidationError::new("tls_required_for_h2"))
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tls {
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Timeout {
    pub connect: u64,
    pub send: u64,
    pub read: u64,
}

/// The single prediction service this gateway forwards to.
///
/// The defaults mirror the address the service has always lived at; a conf
/// file can move it without touching code.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Downstream {
    #[serde(default = "Downstream::default_address")]
    pub address: SocketAddr,
    #[serde(default = "Downstream::default_path")]
    #[validate(custom(function = "Downstream::validate_path"))]
    pub path: String,
    #[validate(nested)]
    pub timeout: Option<Timeout>,
}

impl Default for Downstream {
    fn default() -> Self {
        Self {
            address: Self::default_address(),
            path: Self::default_path(),
            timeout: None,
        }
    }
}

impl Downstream {
    fn default_address() -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, 8000))
    }

    fn default_path() -> String {
        "/predict".to_string()
    }

    fn validate_path(path: &str) -> Result<(), ValidationError> {
        if path.starts_with('/') {
            Ok(())
        } else {
            Err(ValidationError::new("path_must_be_absolute"))
        }
    }
}
