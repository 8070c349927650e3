use std::path::{Path, PathBuf};

use crate::ops::dialogs::{BaseMode, ThresholdControls};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

/// Application settings that persist across sessions
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    pub theme_mode: ThemeMode,
    /// Language code (e.g. "en", "es"). Empty string = auto-detect system language.
    pub language: String,
    /// Maximum number of undo steps
    pub max_undo_steps: usize,
    /// JPEG quality used by Save As
    pub jpeg_quality: u8,
    /// Threshold dialog state remembered from the last confirmed use
    pub threshold: ThresholdControls,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme_mode: ThemeMode::Light,
            language: String::new(),
            max_undo_steps: 50,
            jpeg_quality: 90,
            threshold: ThresholdControls::default(),
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/thresholdfe/thresholdfe_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\ThresholdFE\thresholdfe_settings.cfg
    /// On macOS:   ~/Library/Application Support/ThresholdFE/thresholdfe_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
            .ok()?
            .join("thresholdfe");
        #[cfg(target_os = "windows")]
        let config_dir = std::env::var("APPDATA")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map(|d| PathBuf::from(d).join("ThresholdFE"))
            .ok()?;
        #[cfg(target_os = "macos")]
        let config_dir = std::env::var("HOME")
            .map(|h| {
                PathBuf::from(h)
                    .join("Library")
                    .join("Application Support")
                    .join("ThresholdFE")
            })
            .ok()?;
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        let config_dir = std::env::current_exe().ok()?.parent()?.to_path_buf();

        Some(config_dir.join("thresholdfe_settings.cfg"))
    }

    pub fn to_config_string(&self) -> String {
        let mode_str = match self.theme_mode {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        };
        format!(
            "theme_mode={mode_str}\n\
             language={}\n\
             max_undo_steps={}\n\
             jpeg_quality={}\n\
             threshold_mode={}\n\
             threshold_inverted={}\n\
             threshold_otsu={}\n\
             threshold_level={}\n",
            self.language,
            self.max_undo_steps,
            self.jpeg_quality,
            self.threshold.mode.as_str(),
            self.threshold.inverted,
            self.threshold.otsu,
            self.threshold.level,
        )
    }

    /// Parse a settings file body. Unknown keys and bad values keep defaults.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        let mut mode = s.threshold.mode;
        let mut inverted = s.threshold.inverted;
        let mut otsu = s.threshold.otsu;
        let mut level = s.threshold.level;

        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "theme_mode" => {
                    s.theme_mode = match val {
                        "dark" => ThemeMode::Dark,
                        _ => ThemeMode::Light,
                    };
                }
                "language" => s.language = val.to_string(),
                "max_undo_steps" => {
                    s.max_undo_steps = val.parse().unwrap_or(50);
                }
                "jpeg_quality" => {
                    s.jpeg_quality = val.parse::<u8>().map(|q| q.clamp(1, 100)).unwrap_or(90);
                }
                "threshold_mode" => mode = BaseMode::parse(val).unwrap_or_default(),
                "threshold_inverted" => inverted = val == "true",
                "threshold_otsu" => otsu = val == "true",
                "threshold_level" => level = val.parse().unwrap_or(level),
                _ => {}
            }
        }

        s.threshold = ThresholdControls::new(mode, inverted, otsu, level);
        s
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }

    /// Missing or unreadable file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_config_str(&content),
            Err(_) => Self::default(),
        }
    }

    /// Load settings from the default location (defaults if missing or corrupt)
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("thresholdfe_settings.cfg");
        let settings = AppSettings {
            theme_mode: ThemeMode::Dark,
            language: "es".to_string(),
            max_undo_steps: 12,
            jpeg_quality: 70,
            threshold: ThresholdControls::new(BaseMode::ToZero, true, true, 33),
        };
        settings.save_to(&path).unwrap();
        assert_eq!(AppSettings::load_from(&path), settings);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(AppSettings::load_from(&dir.path().join("absent.cfg")), AppSettings::default());
    }

    #[test]
    fn corrupt_values_fall_back() {
        let s = AppSettings::from_config_str(
            "garbage\nthreshold_level=999\njpeg_quality=0\nthreshold_mode=sideways\nmax_undo_steps=x\n",
        );
        assert_eq!(s.threshold.level, 128);
        assert_eq!(s.jpeg_quality, 1);
        assert_eq!(s.threshold.mode, BaseMode::Normal);
        assert_eq!(s.max_undo_steps, 50);
    }

    #[test]
    fn stored_truncate_never_inverted() {
        let s = AppSettings::from_config_str("threshold_mode=truncate\nthreshold_inverted=true\n");
        assert_eq!(s.threshold.mode, BaseMode::Truncate);
        assert!(!s.threshold.inverted);
    }
}
