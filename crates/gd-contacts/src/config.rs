//! Configuration management
//!
//! Settings are resolved in this order:
//! 1. Environment variables
//! 2. `gd-contacts.toml`
//! 3. Defaults
//!
//! Inside the TOML file, `${VAR_NAME}` is replaced by the value of the
//! environment variable (or the empty string when it is unset).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ContactsError, Result};

/// OAuth2 scopes a credential needs for this API.
///
/// The legacy scope `https://www.google.com/m8/feeds` is an alias of the
/// contacts scope.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/contacts",
    "https://www.googleapis.com/auth/contacts.other.readonly",
    "https://www.googleapis.com/auth/directory.readonly",
];

/// Default projection used when none is configured.
pub const DEFAULT_PROJECTION: &str = "full";

/// Directory client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Domain whose shared contacts are managed
    pub domain: String,

    /// Base URL of the feeds service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Projection used when an operation does not name one
    #[serde(default = "default_projection")]
    pub default_projection: String,

    /// Pre-acquired OAuth2 access token, used by [`crate::ReqwestTransport::from_config`]
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            base_url: default_base_url(),
            default_projection: default_projection(),
            access_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://www.google.com/m8/feeds".to_string()
}

fn default_projection() -> String {
    DEFAULT_PROJECTION.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl DirectoryConfig {
    /// Create a config for a domain with default settings
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Default::default()
        }
    }

    /// Contacts feed endpoint: `{base_url}/contacts/{domain}`
    pub fn endpoint(&self) -> String {
        format!("{}/contacts/{}", self.base_url.trim_end_matches('/'), self.domain)
    }

    /// Replace `${VAR_NAME}` with the environment variable's value.
    ///
    /// Unset variables expand to the empty string.
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Load from a TOML file, then apply environment overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path).map_err(|e| {
            ContactsError::Configuration(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let mut cfg = Self::from_toml_str(&toml_content)?;
        cfg.apply_env_overrides();
        cfg.validate()?;

        Ok(cfg)
    }

    fn from_toml_str(content: &str) -> Result<Self> {
        let expanded = Self::expand_env_vars(content);
        let file: TomlConfig = toml::from_str(&expanded)
            .map_err(|e| ContactsError::Configuration(format!("Failed to parse TOML: {}", e)))?;

        let contacts = file.contacts.unwrap_or_default();
        Ok(Self {
            domain: contacts.domain.unwrap_or_default(),
            base_url: contacts.base_url.unwrap_or_else(default_base_url),
            default_projection: contacts
                .default_projection
                .filter(|p| !p.is_empty())
                .unwrap_or_else(default_projection),
            access_token: contacts.access_token.filter(|t| !t.is_empty()),
            timeout_secs: contacts.timeout_secs.unwrap_or_else(default_timeout_secs),
        })
    }

    /// Load `./gd-contacts.toml` if present, otherwise the environment only
    pub fn load() -> Result<Self> {
        if Path::new("gd-contacts.toml").exists() {
            return Self::from_toml_file("gd-contacts.toml");
        }

        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(domain) = std::env::var("CONTACTS_DOMAIN") {
            if !domain.is_empty() {
                self.domain = domain;
            }
        }
        if let Ok(base_url) = std::env::var("CONTACTS_BASE_URL") {
            if !base_url.is_empty() {
                self.base_url = base_url;
            }
        }
        if let Ok(projection) = std::env::var("CONTACTS_PROJECTION") {
            if !projection.is_empty() {
                self.default_projection = projection;
            }
        }
        if let Ok(token) = std::env::var("CONTACTS_ACCESS_TOKEN") {
            if !token.is_empty() {
                self.access_token = Some(token);
            }
        }
        if let Ok(timeout) = std::env::var("CONTACTS_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.timeout_secs = secs;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.domain.is_empty() {
            return Err(ContactsError::Configuration(
                "CONTACTS_DOMAIN not set".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// TOML file layout
// ============================================================================

#[derive(Debug, Deserialize, Default)]
struct TomlConfig {
    contacts: Option<TomlContactsConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlContactsConfig {
    domain: Option<String>,
    base_url: Option<String>,
    default_projection: Option<String>,
    access_token: Option<String>,
    timeout_secs: Option<u64>,
}
