//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

impl Settings {
    /// Load settings from a YAML file. Relative file paths in the config
    /// resolve against the file's own directory, not the working directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut settings = Self::from_yaml(&content)?;
        settings.base_dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(settings)
    }

    /// Parse settings from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut settings: Settings = serde_yaml::from_str(yaml)?;
        settings.base_dir = PathBuf::from(".");
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

/// Credentials and connection strings, read from the process environment once
/// at startup and injected into extractors and loaders.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// API base URL (`API_BASE_URL`); required for the api source.
    pub api_base_url: Option<String>,

    /// API key (`API_KEY`); required for the api source.
    pub api_key: Option<String>,

    /// PostgreSQL connection string (`POSTGRES_DSN`).
    pub postgres_dsn: String,
}

impl Credentials {
    /// Read credentials for a run. `POSTGRES_DSN` is always required; the API
    /// variables are required only when the api source is selected.
    pub fn from_env(source: Source) -> Result<Self> {
        let postgres_dsn = require_env("POSTGRES_DSN")?;

        let (api_base_url, api_key) = if source == Source::Api {
            (Some(require_env("API_BASE_URL")?), Some(require_env("API_KEY")?))
        } else {
            (std::env::var("API_BASE_URL").ok(), std::env::var("API_KEY").ok())
        };

        Ok(Self {
            api_base_url,
            api_key,
            postgres_dsn,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| PipelineError::Env(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS_YAML: &str = r#"
sources:
  api:
    path: /api/users
    page_size: 50
  file:
    path: data/users.csv
    format: csv
  db:
    query: "SELECT id, email, first_name, last_name, avatar FROM src_users ORDER BY id LIMIT $1 OFFSET $2"
run:
  target_table: users
  key_columns: [id]
"#;

    #[test]
    fn test_from_yaml_applies_defaults() {
        let settings = Settings::from_yaml(SETTINGS_YAML).unwrap();
        let api = settings.sources.api.unwrap();
        assert_eq!(api.page_size, 50);
        assert_eq!(api.start_page, 1);
        assert_eq!(settings.sources.db.unwrap().chunk_size, 1000);
        assert_eq!(settings.run.batch_size, 1000);
        assert_eq!(settings.run.key_columns, vec!["id".to_string()]);
    }

    #[test]
    fn test_from_yaml_defaults_base_dir_to_current_dir() {
        let settings = Settings::from_yaml(SETTINGS_YAML).unwrap();
        assert_eq!(settings.base_dir, PathBuf::from("."));
    }

    #[test]
    fn test_load_resolves_base_dir_to_config_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, SETTINGS_YAML).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.base_dir, dir.path());
    }

    #[test]
    fn test_from_yaml_rejects_missing_run_section() {
        let yaml = "sources:\n  file:\n    path: data/users.csv\n";
        assert!(Settings::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_source_round_trip() {
        for name in ["api", "file", "db"] {
            let source: Source = name.parse().unwrap();
            assert_eq!(source.to_string(), name);
        }
        assert!(matches!(
            "s3".parse::<Source>(),
            Err(PipelineError::UnsupportedSource(_))
        ));
    }

    #[test]
    fn test_load_mode_round_trip() {
        for name in ["copy", "upsert"] {
            let mode: LoadMode = name.parse().unwrap();
            assert_eq!(mode.to_string(), name);
        }
        assert!(matches!(
            "merge".parse::<LoadMode>(),
            Err(PipelineError::UnsupportedMode(_))
        ));
    }
}
