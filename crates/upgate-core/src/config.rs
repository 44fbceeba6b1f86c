//! up.toml configuration parser.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Stage used when `UP_STAGE` is not set.
pub const DEFAULT_STAGE: &str = "development";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpConfig {
    pub name: String,
    #[serde(default)]
    pub handler: HandlerConfig,
    #[serde(default)]
    pub logs: LogsConfig,
    /// Response header rules: path pattern to header fields.
    #[serde(default)]
    pub headers: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub error_pages: ErrorPagesConfig,
    /// Deployment stage. Never read from the file; see [`UpConfig::apply_overrides`].
    #[serde(skip, default = "default_stage")]
    pub stage: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    #[serde(rename = "type", default)]
    pub kind: HandlerKind,
    /// Root directory for the `static` handler.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    /// Answer `/_ping` in front of the handler.
    #[serde(default = "default_true")]
    pub ping: bool,
    /// Gzip large responses for clients that accept it.
    #[serde(default = "default_true")]
    pub gzip: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    #[default]
    Echo,
    Static,
}

/// HTML error pages for 4xx and 5xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPagesConfig {
    #[serde(default)]
    pub enable: bool,
    /// Directory holding `404.html`, `5xx.html`, `error.html` and friends.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    /// Values available to page templates as `{{.Variables.<name>}}`.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            kind: HandlerKind::default(),
            dir: default_dir(),
            ping: true,
            gzip: true,
        }
    }
}

impl Default for ErrorPagesConfig {
    fn default() -> Self {
        Self {
            enable: false,
            dir: default_dir(),
            variables: BTreeMap::new(),
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

impl UpConfig {
    /// Read, apply environment overrides, and validate.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let mut config = Self::from_file(path)?;
        config.override_from_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn override_from_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `UP_STAGE` and `LOG_LEVEL` as returned by `lookup`.
    /// Unset and empty values leave the config untouched.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(stage) = get("UP_STAGE") {
            self.stage = stage;
        }
        if let Some(level) = get("LOG_LEVEL") {
            self.logs.level = level;
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".into()));
        }
        if self.handler.kind == HandlerKind::Static && self.handler.dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "handler.dir must be set for the static handler".into(),
            ));
        }
        if self.error_pages.enable && self.error_pages.dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "error_pages.dir must not be empty".into(),
            ));
        }
        if let Some(pattern) = self.headers.keys().find(|p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "headers: empty path pattern {pattern:?}"
            )));
        }
        if self.logs.level.trim().is_empty() {
            return Err(ConfigError::Invalid("logs.level must not be empty".into()));
        }
        Ok(())
    }
}

fn default_stage() -> String {
    DEFAULT_STAGE.to_string()
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_minimal() {
        let config = UpConfig::from_toml_str(r#"name = "app""#).unwrap();
        assert_eq!(config.name, "app");
        assert_eq!(config.stage, DEFAULT_STAGE);
        assert_eq!(config.handler.kind, HandlerKind::Echo);
        assert_eq!(config.handler.dir, PathBuf::from("."));
        assert!(config.handler.ping);
        assert!(config.handler.gzip);
        assert!(config.headers.is_empty());
        assert!(!config.error_pages.enable);
        assert_eq!(config.error_pages.dir, PathBuf::from("."));
        assert_eq!(config.logs.level, "info");
        assert_eq!(config.logs.format, LogFormat::Json);
    }

    #[test]
    fn test_parse_full() {
        let toml_str = r#"
name = "site"

[handler]
type = "static"
dir = "public"
ping = false

[logs]
level = "debug"
format = "text"
"#;
        let config = UpConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.handler.kind, HandlerKind::Static);
        assert_eq!(config.handler.dir, PathBuf::from("public"));
        assert!(!config.handler.ping);
        assert_eq!(config.logs.level, "debug");
        assert_eq!(config.logs.format, LogFormat::Text);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_headers_and_error_pages() {
        let toml_str = r##"
name = "site"

[handler]
gzip = false

[headers."/*.css"]
Cache-Control = "public, max-age=999999"

[headers."/docs/*"]
X-Type = "docs"

[error_pages]
enable = true
dir = "errors"

[error_pages.variables]
support_email = "help@example.com"
color = "#228ae6"
"##;
        let config = UpConfig::from_toml_str(toml_str).unwrap();
        assert!(!config.handler.gzip);
        assert_eq!(config.headers.len(), 2);
        assert_eq!(
            config.headers["/*.css"]["Cache-Control"],
            "public, max-age=999999"
        );
        assert!(config.error_pages.enable);
        assert_eq!(config.error_pages.dir, PathBuf::from("errors"));
        assert_eq!(config.error_pages.variables["color"], "#228ae6");
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_empty_error_pages_dir() {
        let config = UpConfig::from_toml_str(
            "name = \"x\"\n[error_pages]\nenable = true\ndir = \"\"\n",
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_empty_header_pattern() {
        let config =
            UpConfig::from_toml_str("name = \"x\"\n[headers.\" \"]\nX-A = \"1\"\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_handler_type() {
        let err =
            UpConfig::from_toml_str("name = \"x\"\n[handler]\ntype = \"relay\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_name() {
        assert!(matches!(
            UpConfig::from_toml_str("[logs]\nlevel = \"info\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let config = UpConfig::from_toml_str(r#"name = " ""#).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_empty_static_dir() {
        let config =
            UpConfig::from_toml_str("name = \"x\"\n[handler]\ntype = \"static\"\ndir = \"\"\n")
                .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env = HashMap::from([
            ("UP_STAGE", "production".to_string()),
            ("LOG_LEVEL", "warn".to_string()),
        ]);
        let mut config = UpConfig::from_toml_str(r#"name = "app""#).unwrap();
        config.apply_overrides(|key| env.get(key).cloned());

        assert_eq!(config.stage, "production");
        assert_eq!(config.logs.level, "warn");
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config =
            UpConfig::from_toml_str("name = \"app\"\n[logs]\nlevel = \"debug\"\n").unwrap();
        config.apply_overrides(|_| Some(String::new()));

        assert_eq!(config.stage, DEFAULT_STAGE);
        assert_eq!(config.logs.level, "debug");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("up.toml");
        std::fs::write(&path, "name = \"from-file\"\n").unwrap();

        let config = UpConfig::from_file(&path).unwrap();
        assert_eq!(config.name, "from-file");
    }

    #[test]
    fn test_from_missing_file() {
        let err = UpConfig::from_file(Path::new("/nonexistent/up.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/up.toml"));
    }
}
