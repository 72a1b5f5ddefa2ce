use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use homeplan_config::{AppConfig, EditorConfig, ViewerConfig, WeatherSetting};
use homeplan_core::document::FloorPlanDocument;
use homeplan_core::store::{FloorPlanCache, FloorPlanId};
use homeplan_engine::EditorSettings;
use homeplan_engine::demo::sample_home;
use homeplan_io::{IoError, JsonStore};
use homeplan_viewer::GenerateOptions;
use homeplan_viewer::weather::Weather;
use tracing::{info, warn};

use crate::errors::FrontendError;

/// 文档来源，便于前端呈现加载信息。
#[derive(Debug, Clone, PartialEq)]
pub enum PlanSource {
    Store(PathBuf),
    Sample,
}

#[derive(Debug)]
pub struct LoadedPlan {
    pub document: FloorPlanDocument,
    pub source: PlanSource,
}

/// 指定标识时从存储读取；否则使用内置示例住宅，并在存储中缺少它时写入一份。
pub fn load_plan(store: &JsonStore, id: Option<&FloorPlanId>) -> Result<LoadedPlan, FrontendError> {
    if let Some(id) = id {
        let document = store.load(id)?;
        let path = store.path_for(id)?;
        info!(floor_plan = %id, path = %path.display(), "从存储加载平面");
        return Ok(LoadedPlan {
            document,
            source: PlanSource::Store(path),
        });
    }

    let document = sample_home();
    match store.read(&document.floor_plan_id) {
        Ok(_) => {}
        Err(IoError::NotFound(_)) => {
            let path = store.write(&document)?;
            info!(path = %path.display(), "已写入示例住宅");
        }
        Err(err) => warn!(error = %err, "存储中的示例住宅不可读，使用内置版本"),
    }
    Ok(LoadedPlan {
        document,
        source: PlanSource::Sample,
    })
}

pub fn editor_settings(config: &EditorConfig) -> EditorSettings {
    EditorSettings {
        grid_size: config.grid_size,
        snap: config.snap.max(0.0),
        save_delay: Duration::from_millis(config.save_delay_ms),
        view_scale: config.view_scale,
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, FrontendError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| FrontendError::InvalidDate(raw.to_string()))
}

/// 命令行给出的日期优先于配置中的日期，两者都缺省时取当天。
pub fn generate_options(
    config: &ViewerConfig,
    date_override: Option<NaiveDate>,
) -> Result<GenerateOptions, FrontendError> {
    let mut options = GenerateOptions {
        wall_thickness: config.wall_thickness,
        roof_pitch: config.roof_pitch,
        ground_padding: config.ground_padding,
        fallback_half_extent: config.fallback_half_extent,
        latitude: config.latitude,
        hour: config.hour,
        weather: match config.weather {
            WeatherSetting::Clear => Weather::Clear,
            WeatherSetting::Rain => Weather::Rain,
            WeatherSetting::Snow => Weather::Snow,
        },
        ..GenerateOptions::default()
    };
    if let Some(date) = date_override {
        options.date = date;
    } else if let Some(raw) = config.date.as_deref() {
        options.date = parse_date(raw)?;
    }
    Ok(options)
}

pub fn open_store(config: &AppConfig) -> JsonStore {
    JsonStore::new(config.storage.root.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_override_beats_config() {
        let config = ViewerConfig {
            date: Some("2024-09-16".to_string()),
            ..ViewerConfig::default()
        };
        let from_config = generate_options(&config, None).expect("options");
        assert_eq!(from_config.date, parse_date("2024-09-16").expect("date"));

        let override_date = parse_date("2024-01-01").expect("date");
        let overridden = generate_options(&config, Some(override_date)).expect("options");
        assert_eq!(overridden.date, override_date);
    }

    #[test]
    fn bad_dates_are_reported() {
        assert!(matches!(parse_date("16/09/2024"), Err(FrontendError::InvalidDate(_))));
        let config = ViewerConfig {
            date: Some("soon".to_string()),
            ..ViewerConfig::default()
        };
        assert!(generate_options(&config, None).is_err());
    }

    #[test]
    fn sample_is_seeded_into_empty_store() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = JsonStore::new(dir.path());
        let loaded = load_plan(&store, None).expect("load");
        assert_eq!(loaded.source, PlanSource::Sample);
        assert!(dir.path().join("sample-home.json").exists());

        let id = loaded.document.floor_plan_id.clone();
        let reloaded = load_plan(&store, Some(&id)).expect("reload");
        assert!(matches!(reloaded.source, PlanSource::Store(_)));
        assert_eq!(reloaded.document.data.groups.len(), 2);
    }

    #[test]
    fn editor_settings_follow_config() {
        let settings = editor_settings(&EditorConfig {
            save_delay_ms: 50,
            ..EditorConfig::default()
        });
        assert_eq!(settings.save_delay, Duration::from_millis(50));
        assert_eq!(settings.half_grid(), 600.0);
    }
}
