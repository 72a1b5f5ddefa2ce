use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_ENV: &str = "HOMEPLAN_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
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

    /// 自动发现配置文件：优先读取环境变量 `HOMEPLAN_CONFIG`，否则寻找 `./config/default.toml`。
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

/// 二维编辑器参数。
#[derive(Debug, Clone, Deserialize)]
pub struct EditorConfig {
    #[serde(default = "EditorConfig::default_grid_size")]
    pub grid_size: f64,
    /// 房间、顶点与墙拖拽的吸附步长，0 表示不吸附。
    #[serde(default = "EditorConfig::default_snap")]
    pub snap: f64,
    #[serde(default = "EditorConfig::default_save_delay_ms")]
    pub save_delay_ms: u64,
    #[serde(default = "EditorConfig::default_view_scale")]
    pub view_scale: f64,
}

impl EditorConfig {
    fn default_grid_size() -> f64 {
        1200.0
    }

    fn default_snap() -> f64 {
        12.0
    }

    fn default_save_delay_ms() -> u64 {
        300
    }

    fn default_view_scale() -> f64 {
        1.0
    }

    #[inline]
    pub fn half_grid(&self) -> f64 {
        self.grid_size * 0.5
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            grid_size: Self::default_grid_size(),
            snap: Self::default_snap(),
            save_delay_ms: Self::default_save_delay_ms(),
            view_scale: Self::default_view_scale(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherSetting {
    #[default]
    Clear,
    Rain,
    Snow,
}

/// 三维场景生成参数。
#[derive(Debug, Clone, Deserialize)]
pub struct ViewerConfig {
    #[serde(default = "ViewerConfig::default_wall_thickness")]
    pub wall_thickness: f64,
    /// 屋面坡度（升高 / 水平距离）。
    #[serde(default = "ViewerConfig::default_roof_pitch")]
    pub roof_pitch: f64,
    #[serde(default = "ViewerConfig::default_ground_padding")]
    pub ground_padding: f64,
    #[serde(default = "ViewerConfig::default_fallback_half_extent")]
    pub fallback_half_extent: f64,
    #[serde(default = "ViewerConfig::default_latitude")]
    pub latitude: f64,
    #[serde(default)]
    pub weather: WeatherSetting,
    /// ISO 日期（`YYYY-MM-DD`），缺省时取当天。
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default = "ViewerConfig::default_hour")]
    pub hour: f64,
}

impl ViewerConfig {
    fn default_wall_thickness() -> f64 {
        4.0
    }

    fn default_roof_pitch() -> f64 {
        0.5
    }

    fn default_ground_padding() -> f64 {
        120.0
    }

    fn default_fallback_half_extent() -> f64 {
        180.0
    }

    fn default_latitude() -> f64 {
        40.0
    }

    fn default_hour() -> f64 {
        12.0
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            wall_thickness: Self::default_wall_thickness(),
            roof_pitch: Self::default_roof_pitch(),
            ground_padding: Self::default_ground_padding(),
            fallback_half_extent: Self::default_fallback_half_extent(),
            latitude: Self::default_latitude(),
            weather: WeatherSetting::default(),
            date: None,
            hour: Self::default_hour(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// JSON 平面文档所在目录。
    #[serde(default = "StorageConfig::default_root")]
    pub root: PathBuf,
}

impl StorageConfig {
    fn default_root() -> PathBuf {
        PathBuf::from("plans")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: Self::default_root(),
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
    fn defaults_match_documented_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.editor.grid_size, 1200.0);
        assert_eq!(cfg.editor.half_grid(), 600.0);
        assert_eq!(cfg.editor.snap, 12.0);
        assert_eq!(cfg.editor.save_delay_ms, 300);
        assert_eq!(cfg.viewer.wall_thickness, 4.0);
        assert_eq!(cfg.viewer.roof_pitch, 0.5);
        assert_eq!(cfg.viewer.ground_padding, 120.0);
        assert_eq!(cfg.viewer.fallback_half_extent, 180.0);
        assert_eq!(cfg.viewer.weather, WeatherSetting::Clear);
        assert!(cfg.viewer.date.is_none());
        assert_eq!(cfg.storage.root, PathBuf::from("plans"));
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [editor]
            snap = 0
            save_delay_ms = 50

            [viewer]
            weather = "snow"
            date = "2024-09-16"
            latitude = 51.5

            [storage]
            root = "/tmp/plans"
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.editor.snap, 0.0);
        assert_eq!(cfg.editor.save_delay_ms, 50);
        assert_eq!(cfg.editor.grid_size, 1200.0);
        assert_eq!(cfg.viewer.weather, WeatherSetting::Snow);
        assert_eq!(cfg.viewer.date.as_deref(), Some("2024-09-16"));
        assert_eq!(cfg.viewer.latitude, 51.5);
        assert_eq!(cfg.viewer.hour, 12.0);
        assert_eq!(cfg.storage.root, PathBuf::from("/tmp/plans"));
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[viewer]\nweather = \"hail\"").unwrap();
        let err = AppConfig::from_file(file.path()).expect_err("should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_reports_io_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = AppConfig::from_file(dir.path().join("absent.toml")).expect_err("should fail");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
