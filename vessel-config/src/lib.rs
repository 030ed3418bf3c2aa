use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV: &str = "VESSEL_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub templates: TemplateConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `VESSEL_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 壳体与端盖模板零件。
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateConfig {
    #[serde(default = "TemplateConfig::default_shell_path")]
    pub shell_path: String,
    #[serde(default = "TemplateConfig::default_end_cap_path")]
    pub end_cap_path: String,
}

impl TemplateConfig {
    fn default_shell_path() -> String {
        "parts/Cylindrical Shell.SLDPRT".to_string()
    }

    fn default_end_cap_path() -> String {
        "parts/Compartment End.SLDPRT".to_string()
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            shell_path: Self::default_shell_path(),
            end_cap_path: Self::default_end_cap_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentSetting {
    Left,
    #[default]
    Right,
}

/// 新建段的默认参数。
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "DefaultsConfig::default_shell_length")]
    pub shell_length: f64,
    #[serde(default = "DefaultsConfig::default_shell_count")]
    pub shell_count: usize,
    #[serde(default)]
    pub end_cap_count: usize,
    #[serde(default)]
    pub end_cap_alignment: AlignmentSetting,
    #[serde(default = "DefaultsConfig::default_end_cap_distance")]
    pub end_cap_distance: f64,
}

impl DefaultsConfig {
    fn default_shell_length() -> f64 {
        1.0
    }

    fn default_shell_count() -> usize {
        1
    }

    fn default_end_cap_distance() -> f64 {
        1.0
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            shell_length: Self::default_shell_length(),
            shell_count: Self::default_shell_count(),
            end_cap_count: 0,
            end_cap_alignment: AlignmentSetting::default(),
            end_cap_distance: Self::default_end_cap_distance(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_returned_when_file_missing() {
        let cfg = AppConfig::discover().expect("discover should succeed");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.defaults.shell_count, 1);
        assert_eq!(cfg.defaults.end_cap_count, 0);
        assert_eq!(cfg.defaults.end_cap_alignment, AlignmentSetting::Right);
        assert!(cfg.templates.shell_path.ends_with(".SLDPRT"));
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [templates]
            shell_path = "C:/vessels/Shell 1600.SLDPRT"

            [defaults]
            shell_length = 2.5
            shell_count = 4
            end_cap_count = 2
            end_cap_alignment = "left"
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.templates.shell_path, "C:/vessels/Shell 1600.SLDPRT");
        assert_eq!(cfg.templates.end_cap_path, "parts/Compartment End.SLDPRT");
        assert_eq!(cfg.defaults.shell_length, 2.5);
        assert_eq!(cfg.defaults.shell_count, 4);
        assert_eq!(cfg.defaults.end_cap_count, 2);
        assert_eq!(cfg.defaults.end_cap_alignment, AlignmentSetting::Left);
        assert_eq!(cfg.defaults.end_cap_distance, 1.0);
    }

    #[test]
    fn unknown_alignment_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[defaults]\nend_cap_alignment = \"up\"").unwrap();

        let err = AppConfig::from_file(file.path()).expect_err("invalid alignment");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let err = AppConfig::from_file(dir.path().join("absent.toml")).expect_err("missing");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
