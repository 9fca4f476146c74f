//! Run Configuration
//!
//! Loads `config.json` from the working root. Boolean flags are accepted
//! both as JSON booleans and as the `"True"`/`"False"` strings older
//! config files carry.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer};

use crate::portal::{PortalKind, QueryField};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default, deserialize_with = "flag")]
    pub use_proxy: bool,
    #[serde(default)]
    pub proxy_address: Option<String>,
    #[serde(default)]
    pub proxy_port: Option<u16>,
    #[serde(default)]
    pub proxy_username: Option<String>,
    #[serde(default)]
    pub proxy_password: Option<String>,

    #[serde(default = "default_true", deserialize_with = "flag")]
    pub headless: bool,

    #[serde(default = "default_portal")]
    pub portal: PortalKind,
    #[serde(default = "default_query_field")]
    pub query_field: QueryField,

    #[serde(default = "default_input_file")]
    pub input_file: String,
    #[serde(default = "default_input_column")]
    pub input_column: String,

    #[serde(default = "default_wait_timeout")]
    pub wait_timeout: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_captcha_attempts")]
    pub max_captcha_attempts: u32,

    #[serde(default = "default_model_path")]
    pub model_path: String,
    #[serde(default = "default_vocab_path")]
    pub vocab_path: String,

    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    #[serde(default)]
    pub chrome_binary: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_portal() -> PortalKind {
    PortalKind::Enterprise
}

fn default_query_field() -> QueryField {
    QueryField::Mst
}

fn default_input_file() -> String {
    "input.xlsx".to_string()
}

fn default_input_column() -> String {
    "MST".to_string()
}

fn default_wait_timeout() -> u64 {
    20
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_captcha_attempts() -> u32 {
    5
}

fn default_model_path() -> String {
    "captcha.onnx".to_string()
}

fn default_vocab_path() -> String {
    "vocab.txt".to_string()
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            use_proxy: false,
            proxy_address: None,
            proxy_port: None,
            proxy_username: None,
            proxy_password: None,
            headless: true,
            portal: default_portal(),
            query_field: default_query_field(),
            input_file: default_input_file(),
            input_column: default_input_column(),
            wait_timeout: default_wait_timeout(),
            max_retries: default_max_retries(),
            max_captcha_attempts: default_max_captcha_attempts(),
            model_path: default_model_path(),
            vocab_path: default_vocab_path(),
            webdriver_url: default_webdriver_url(),
            chrome_binary: None,
        }
    }
}

/// Accept `true`, `"True"`, `"true"` (and their negatives) for flags.
fn flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Text(s) => s.eq_ignore_ascii_case("true"),
    })
}

pub fn load(root: &Path) -> Result<Config> {
    let path = root.join("config.json");
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {:?}", path))?;

    let config: Config =
        serde_json::from_str(&content).with_context(|| "Failed to parse config JSON")?;

    config.validate()?;
    Ok(config)
}

/// Load `config.json` if present, otherwise fall back to defaults.
pub fn load_or_default(root: &Path) -> Result<Config> {
    if root.join("config.json").exists() {
        load(root)
    } else {
        Ok(Config::default())
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        // Enterprise lookups only take MST codes.
        self.portal.form_field(self.query_field)?;

        if self.use_proxy {
            if self.proxy_address.as_deref().unwrap_or("").is_empty() {
                bail!("use_proxy is set but proxy_address is missing");
            }
            if self.proxy_port.is_none() {
                bail!("use_proxy is set but proxy_port is missing");
            }
        }

        if self.max_captcha_attempts == 0 {
            bail!("max_captcha_attempts must be at least 1");
        }
        if self.max_retries == 0 {
            bail!("max_retries must be at least 1");
        }

        Ok(())
    }
}
