use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Maximum number of entries accepted under the files field
pub const MAX_FILES: usize = 20;
/// Maximum cumulative size of accepted files (25 MiB)
pub const MAX_TOTAL_BYTES: u64 = 25 * 1024 * 1024;
/// Multipart field name carrying the uploaded PDFs
pub const FILES_FIELD: &str = "files";
/// Path of the merge endpoint
pub const MERGE_PATH: &str = "/api/merge";
/// Suggested filename of the merged download
pub const MERGED_FILENAME: &str = "merged.pdf";
/// The only MIME type accepted for uploads
pub const PDF_MIME: &str = "application/pdf";
/// Minimum selection before the upload client will submit
pub const MIN_CLIENT_FILES: usize = 2;

/// Limits applied to one merge request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeLimits {
    /// Maximum number of entries under the files field
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Maximum cumulative byte size of accepted files
    #[serde(default = "default_max_total_bytes")]
    pub max_total_bytes: u64,

    /// Multipart field name to collect entries from
    #[serde(default = "default_field_name")]
    pub field_name: String,
}

const fn default_max_files() -> usize {
    MAX_FILES
}

const fn default_max_total_bytes() -> u64 {
    MAX_TOTAL_BYTES
}

fn default_field_name() -> String {
    FILES_FIELD.to_string()
}

impl Default for MergeLimits {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_total_bytes: default_max_total_bytes(),
            field_name: default_field_name(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Include internal error text as `detail` in 500 responses
    #[serde(default)]
    pub expose_error_detail: bool,

    /// Extra bytes allowed on top of the entry budget for multipart framing
    #[serde(default = "default_body_limit_slack")]
    pub body_limit_slack: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_body_limit_slack() -> u64 {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            expose_error_detail: false,
            body_limit_slack: default_body_limit_slack(),
        }
    }
}

/// Upload client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the merge server
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Files required before a merge may be submitted
    #[serde(default = "default_min_files")]
    pub min_files: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_server_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

const fn default_min_files() -> usize {
    MIN_CLIENT_FILES
}

const fn default_timeout_secs() -> u64 {
    120
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            min_files: default_min_files(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub limits: MergeLimits,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub client: ClientConfig,
}

impl ServerConfig {
    /// Transport-level body limit for a merge request.
    ///
    /// Every entry may be as large as the whole size budget, so validation
    /// still runs in order for uploads well past `max_total_bytes`; only
    /// bodies beyond this ceiling are cut off while streaming.
    pub fn body_limit(&self, limits: &MergeLimits) -> usize {
        let files = u64::try_from(limits.max_files.max(1)).unwrap_or(u64::MAX);
        let total = limits
            .max_total_bytes
            .saturating_mul(files)
            .saturating_add(self.body_limit_slack);
        usize::try_from(total).unwrap_or(usize::MAX)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Layer an optional TOML file and `PDF_MERGE__*` environment variables.
    ///
    /// Environment keys use `__` between levels, e.g.
    /// `PDF_MERGE__LIMITS__MAX_FILES=10`.
    pub fn from_sources(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(
                config::File::from(path).format(config::FileFormat::Toml),
            );
        }

        let loaded: Self = builder
            .add_source(
                config::Environment::with_prefix("PDF_MERGE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::ConfigLoad(e.to_string()))?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Load from default locations (~/.config/pdf-merge/config.toml, ./config.toml)
    /// with environment overrides applied on top.
    pub fn load() -> Self {
        let file = Self::default_config_file();

        match Self::from_sources(file.as_deref()) {
            Ok(config) => {
                match file {
                    Some(path) => tracing::debug!("Loaded config from {}", path.display()),
                    None => tracing::debug!("No config file found, using defaults"),
                }
                config
            }
            Err(e) => {
                tracing::warn!("Failed to load config: {}", e);
                Self::default()
            }
        }
    }

    fn default_config_file() -> Option<std::path::PathBuf> {
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("pdf-merge").join("config.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let local_config = std::path::PathBuf::from("config.toml");
        local_config.exists().then_some(local_config)
    }

    /// Reject limits that would make every request fail.
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_files == 0 {
            return Err(Error::ConfigInvalid {
                field: "limits.max_files".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.limits.max_total_bytes == 0 {
            return Err(Error::ConfigInvalid {
                field: "limits.max_total_bytes".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.limits.field_name.is_empty() {
            return Err(Error::ConfigInvalid {
                field: "limits.field_name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
