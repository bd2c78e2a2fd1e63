use std::collections::HashMap;
use std::fs;

use log::{debug, trace};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::core::{DataError, DataResult, ErrorContext};

static BASE_URL_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)^https?://[^\s/?#]+(?:/[^\s?#]*)?$").ok());

static LINK_PATH_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[a-z][A-Za-z0-9_/-]*$").ok());

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    pub rest: Rest,

    #[validate(nested)]
    #[serde(default)]
    pub cache: Cache,

    /// Static link-path table; discovered from the REST root when empty
    #[validate(custom(function = "Config::validate_endpoints"))]
    #[serde(default)]
    pub endpoints: HashMap<String, String>,

    #[serde(default)]
    pub log: Log,
}

// Config file load and validation
impl Config {
    pub fn load_from_yaml<P>(path: P) -> DataResult<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path)
            .map_err(|e| DataError::Configuration(format!("Unable to read conf file from {path}: {e}")))?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    pub fn from_yaml(conf_str: &str) -> DataResult<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: Config = serde_yaml::from_str(conf_str)
            .map_err(|e| DataError::Configuration(format!("Unable to parse yaml conf: {e}")))?;

        trace!("Loaded conf: {conf:?}");

        conf.validate()
            .map_err(|e| DataError::Configuration(format!("Conf file valid failed: {e}")))?;

        Ok(conf)
    }

    pub fn to_yaml(&self) -> DataResult<String> {
        serde_yaml::to_string(self).with_context("Unable to serialize conf")
    }

    fn validate_endpoints(endpoints: &HashMap<String, String>) -> Result<(), ValidationError> {
        let link_path = LINK_PATH_RE
            .as_ref()
            .ok_or_else(|| ValidationError::new("invalid_link_path_pattern"))?;

        for (key, href) in endpoints {
            if !link_path.is_match(key) {
                let mut err = ValidationError::new("invalid_link_path");
                err.add_param("key".into(), &key.to_string());
                return Err(err);
            }
            validate_base_url(href)?;
        }
        Ok(())
    }
}

fn validate_base_url(url: &str) -> Result<(), ValidationError> {
    let re = BASE_URL_RE
        .as_ref()
        .ok_or_else(|| ValidationError::new("invalid_url_pattern"))?;
    if re.is_match(url) {
        Ok(())
    } else {
        let mut err = ValidationError::new("invalid_http_url");
        err.add_param("url".into(), &url.to_string());
        Err(err)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Rest {
    /// REST root, e.g. `https://demo.example.org/server/api`
    #[validate(custom(function = "validate_base_url"))]
    pub base_url: String,
    /// Global per-call timeout in seconds
    #[validate(range(min = 1))]
    #[serde(default = "Rest::default_timeout")]
    pub timeout: u64,
    #[serde(default = "Rest::default_user_agent")]
    pub user_agent: String,
}

impl Rest {
    fn default_timeout() -> u64 {
        30
    }

    fn default_user_agent() -> String {
        concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Cache {
    /// Seconds a completed GET stays reusable
    #[validate(range(min = 1))]
    #[serde(default = "Cache::default_ttl")]
    pub ttl: u64,
}

impl Cache {
    fn default_ttl() -> u64 {
        900
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            ttl: Self::default_ttl(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<&LogLevel> for log::LevelFilter {
    fn from(level: &LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Log {
    #[serde(default)]
    pub level: LogLevel,
    /// Append log lines to this file instead of stderr
    pub path: Option<String>,
}
