//! Player configuration: optional JSON file, then command-line overrides.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::theme::ThemePalette;

/// User configuration. Every field is optional in the file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Theme name, e.g. `dark_teal`. A trailing `.xml` is accepted.
    pub theme: String,
    /// Initial volume, 0-100.
    pub volume: u8,
    /// Attach the GL debug probe.
    pub gl_debug: bool,
    pub log_level: String,
    /// Extra options passed to the engine before it initializes.
    pub mpv_options: BTreeMap<String, String>,
    /// Palettes in addition to the built-in ones, by name.
    pub custom_themes: BTreeMap<String, ThemePalette>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            theme: "dark_teal".to_string(),
            volume: 100,
            gl_debug: cfg!(debug_assertions),
            log_level: "info".to_string(),
            mpv_options: BTreeMap::new(),
            custom_themes: BTreeMap::new(),
        }
    }
}

/// Values given on the command line; `None` leaves the file value alone.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub theme: Option<String>,
    pub volume: Option<u8>,
    pub gl_debug: bool,
    pub log_level: Option<String>,
    pub mpv_options: Vec<(String, String)>,
}

impl PlayerConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(theme) = overrides.theme {
            self.theme = theme;
        }
        if let Some(volume) = overrides.volume {
            self.volume = volume;
        }
        if overrides.gl_debug {
            self.gl_debug = true;
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
        self.mpv_options.extend(overrides.mpv_options);
        self.volume = self.volume.min(100);
    }

    /// Engine options in a stable order.
    pub fn engine_options(&self) -> Vec<(String, String)> {
        self.mpv_options
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Tracing level for `log_level`; unknown names fall back to INFO.
    pub fn tracing_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

/// Parse a `KEY=VALUE` engine option.
pub fn parse_engine_option(raw: &str) -> anyhow::Result<(String, String)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("expected KEY=VALUE, got {raw:?}");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("option name is empty in {raw:?}");
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = PlayerConfig::from_json("{}").unwrap();
        assert_eq!(config, PlayerConfig::default());
        assert_eq!(config.theme, "dark_teal");
        assert_eq!(config.volume, 100);
    }

    #[test]
    fn parses_partial_file() {
        let config = PlayerConfig::from_json(
            r##"{
                "theme": "light_blue.xml",
                "volume": 40,
                "mpv_options": { "hwdec": "auto" },
                "custom_themes": {
                    "night": {
                        "dark": true,
                        "primary": "#ff9800",
                        "primary_light": "#ffc947",
                        "secondary": "#202020",
                        "secondary_light": "#303030",
                        "secondary_dark": "#101010",
                        "primary_text": "#000000",
                        "secondary_text": "#eeeeee"
                    }
                }
            }"##,
        )
        .unwrap();

        assert_eq!(config.theme, "light_blue.xml");
        assert_eq!(config.volume, 40);
        assert_eq!(config.mpv_options.get("hwdec").map(String::as_str), Some("auto"));
        assert!(config.custom_themes.contains_key("night"));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn rejects_bad_color() {
        let result = PlayerConfig::from_json(
            r##"{ "custom_themes": { "x": {
                "dark": true,
                "primary": "orange",
                "primary_light": "#ffc947",
                "secondary": "#202020",
                "secondary_light": "#303030",
                "secondary_dark": "#101010",
                "primary_text": "#000000",
                "secondary_text": "#eeeeee"
            } } }"##,
        );
        assert!(result.is_err());
    }

    #[test]
    fn overrides_win_over_file() {
        let mut config = PlayerConfig::from_json(r#"{ "theme": "dark_red", "volume": 30 }"#).unwrap();
        config.apply(Overrides {
            theme: Some("light_pink".to_string()),
            volume: Some(250),
            gl_debug: true,
            log_level: Some("debug".to_string()),
            mpv_options: vec![("vd-lavc-threads".to_string(), "4".to_string())],
        });

        assert_eq!(config.theme, "light_pink");
        assert_eq!(config.volume, 100);
        assert!(config.gl_debug);
        assert_eq!(config.tracing_level(), Level::DEBUG);
        assert_eq!(
            config.engine_options(),
            vec![("vd-lavc-threads".to_string(), "4".to_string())]
        );
    }

    #[test]
    fn absent_overrides_keep_file_values() {
        let mut config = PlayerConfig::from_json(r#"{ "theme": "dark_red", "volume": 30 }"#).unwrap();
        config.apply(Overrides::default());
        assert_eq!(config.theme, "dark_red");
        assert_eq!(config.volume, 30);
    }

    #[test]
    fn unknown_log_level_falls_back_to_info() {
        let config = PlayerConfig {
            log_level: "chatty".to_string(),
            ..PlayerConfig::default()
        };
        assert_eq!(config.tracing_level(), Level::INFO);
    }

    #[test]
    fn engine_option_parsing() {
        assert_eq!(
            parse_engine_option("hwdec=auto-safe").unwrap(),
            ("hwdec".to_string(), "auto-safe".to_string())
        );
        assert_eq!(
            parse_engine_option("sub-font=A=B").unwrap(),
            ("sub-font".to_string(), "A=B".to_string())
        );
        assert!(parse_engine_option("hwdec").is_err());
        assert!(parse_engine_option("=auto").is_err());
    }
}
