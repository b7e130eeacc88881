use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_ENV_VAR: &str = "SVGSKETCH_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub conversion: ConversionConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub exit: ExitConfig,
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

    /// 自动发现配置文件：优先读取环境变量 `SVGSKETCH_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<(Self, ConfigSource), ConfigError> {
        let source = Self::locate()?;
        let config = match source.path() {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok((config, source))
    }

    /// 只确定配置来源，不读取文件。
    pub fn locate() -> Result<ConfigSource, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV_VAR) {
            return Ok(ConfigSource::Environment(PathBuf::from(path)));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Ok(ConfigSource::WorkingDirectory(default_path))
        } else {
            Ok(ConfigSource::BuiltIn)
        }
    }
}

/// 配置的来源。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// 命令行 `--config` 指定。
    Argument(PathBuf),
    /// 环境变量 `SVGSKETCH_CONFIG` 指定。
    Environment(PathBuf),
    WorkingDirectory(PathBuf),
    BuiltIn,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::Argument(path)
            | ConfigSource::Environment(path)
            | ConfigSource::WorkingDirectory(path) => Some(path),
            ConfigSource::BuiltIn => None,
        }
    }
}

/// 日志配置：控制台等级与运行日志文件。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    /// 每次运行都会截断重写。
    #[serde(default = "LoggingConfig::default_file")]
    pub file: PathBuf,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }

    fn default_file() -> PathBuf {
        PathBuf::from("svgsketch.log")
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            file: Self::default_file(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplineStrategyName {
    #[default]
    Reconstruct,
    Discretize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConversionConfig {
    #[serde(default)]
    pub spline_strategy: SplineStrategyName,
    #[serde(default = "ConversionConfig::default_segments")]
    pub discretize_segments: usize,
    #[serde(default)]
    pub rotate_circle_axis: bool,
    #[serde(default = "ConversionConfig::default_prefix")]
    pub sketch_prefix: String,
}

impl ConversionConfig {
    fn default_segments() -> usize {
        20
    }

    fn default_prefix() -> String {
        "SVGSketch".to_string()
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            spline_strategy: SplineStrategyName::default(),
            discretize_segments: Self::default_segments(),
            rotate_circle_axis: false,
            sketch_prefix: Self::default_prefix(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImportConfig {
    /// 为 false 时导入调用不报告创建的对象，由快照比对确定。
    #[serde(default = "ImportConfig::default_report_created")]
    pub report_created: bool,
}

impl ImportConfig {
    fn default_report_created() -> bool {
        true
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            report_created: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExitConfig {
    /// 兼容只解析日志的调用方：无论结果如何都以 0 退出。
    #[serde(default)]
    pub always_succeed: bool,
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
