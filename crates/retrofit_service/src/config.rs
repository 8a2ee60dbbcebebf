//! Service configuration
//!
//! Sources are layered in order: built-in defaults, an optional TOML file,
//! then `RETROFIT__*` environment variables (`RETROFIT__SERVER__PORT=9000`).

use anyhow::{Context, Result};
use config::{Config, Environment, File as ConfigFile};
use retrofit_core::selector::resolve_bundle_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Config file read when no explicit path is given and it exists
pub const DEFAULT_CONFIG_PATH: &str = "config/retrofit.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub upload: UploadConfig,
    pub template: TemplateConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Where trained artifacts live and which bundle to load
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Directory holding the artifacts, or the bundle subdirectories
    pub root_dir: PathBuf,
    /// Bundle subdirectory to load, bypassing the selector
    pub bundle_dir: Option<String>,
    /// Selector inputs; both must be set for the selector to run
    pub building_type: Option<String>,
    pub location: Option<String>,
    /// Require all artifacts to carry the model's version stamp
    pub verify_versions: bool,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("output/models"),
            bundle_dir: None,
            building_type: None,
            location: None,
            verify_versions: true,
        }
    }
}

impl ModelsConfig {
    /// Directory the resolver should load from
    pub fn resolve_dir(&self) -> retrofit_core::Result<PathBuf> {
        if let Some(bundle) = &self.bundle_dir {
            return Ok(self.root_dir.join(bundle));
        }

        match (&self.building_type, &self.location) {
            (Some(building_type), Some(location)) => {
                let bundle = resolve_bundle_dir(building_type, location)?;
                Ok(self.root_dir.join(bundle))
            }
            (None, None) => Ok(self.root_dir.clone()),
            _ => {
                warn!("Both models.building_type and models.location are needed to select a bundle; using the root directory");
                Ok(self.root_dir.clone())
            }
        }
    }
}

/// Limits applied to upload and batch requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum buildings per upload or batch request
    pub max_rows: usize,
    /// Minimum columns an uploaded file must have
    pub min_columns: usize,
    pub max_body_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_rows: 1000,
            min_columns: 48,
            max_body_bytes: 20 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Sample input file served by the template endpoint
    pub path: PathBuf,
    pub sample_rows: usize,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/input_data.csv"),
            sample_rows: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `json` or `pretty`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; `*` allows any
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:8080".to_string(),
                "http://localhost:8000".to_string(),
            ],
        }
    }
}

impl ServiceConfig {
    /// Load configuration from `path`, or from [`DEFAULT_CONFIG_PATH`] if it
    /// exists, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let resolved_path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                default.exists().then_some(default)
            }
        };

        let mut builder = Config::builder();

        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }

        builder = builder.add_source(
            Environment::with_prefix("RETROFIT")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("cors.allowed_origins")
                .try_parsing(true),
        );

        builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .with_context(|| match &resolved_path {
                Some(path) => format!("invalid configuration in {}", path.display()),
                None => "invalid configuration".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_upload_limits() {
        let config = ServiceConfig::default();
        assert_eq!(config.upload.max_rows, 1000);
        assert_eq!(config.upload.min_columns, 48);
        assert_eq!(config.server.bind_address(), "0.0.0.0:8000");
        assert!(config.models.verify_versions);
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9100

[models]
root_dir = "/srv/models"
bundle_dir = "midrise_toronto"

[logging]
format = "json"
"#
        )
        .unwrap();

        let config = ServiceConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
        assert_eq!(
            config.models.resolve_dir().unwrap(),
            PathBuf::from("/srv/models/midrise_toronto")
        );
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(ServiceConfig::load(Some(Path::new("/no/such/retrofit.toml"))).is_err());
    }

    #[test]
    fn selector_picks_bundle_directory() {
        let models = ModelsConfig {
            building_type: Some("MidriseApartment".to_string()),
            location: Some("Toronto".to_string()),
            ..ModelsConfig::default()
        };
        assert_eq!(
            models.resolve_dir().unwrap(),
            PathBuf::from("output/models/midrise_toronto")
        );

        let unknown = ModelsConfig {
            building_type: Some("unknown-type".to_string()),
            location: Some("Nowhere".to_string()),
            ..ModelsConfig::default()
        };
        assert!(unknown.resolve_dir().is_err());
    }

    #[test]
    fn no_selector_inputs_uses_root() {
        assert_eq!(
            ModelsConfig::default().resolve_dir().unwrap(),
            PathBuf::from("output/models")
        );
    }
}
