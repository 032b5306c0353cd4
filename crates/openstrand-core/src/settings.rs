//! User settings stored as `Key: Value` lines.

use crate::error::{StrandError, StrandResult};
use crate::strand::Rgba;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "OpenStrand Studio";
const SETTINGS_FILE: &str = "user_settings.txt";

/// Persistent user preferences.
#[derive(Debug, Clone, PartialEq)]
pub struct UserSettings {
    pub theme: String,
    pub language: String,
    pub shadow_color: Rgba,
    /// Number of concentric shadow strokes.
    pub num_steps: u32,
    pub max_blur_radius: f64,
    pub extension_length: f64,
    pub extension_dash_count: u32,
    pub extension_dash_width: f64,
    pub arrow_head_length: f64,
    pub arrow_head_width: f64,
    pub draw_only_affected_strand: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            theme: "default".to_string(),
            language: "en".to_string(),
            shadow_color: Rgba::default_shadow(),
            num_steps: 3,
            max_blur_radius: 29.99,
            extension_length: 100.0,
            extension_dash_count: 10,
            extension_dash_width: 4.0,
            arrow_head_length: 20.0,
            arrow_head_width: 10.0,
            draw_only_affected_strand: false,
        }
    }
}

fn parse_color(value: &str) -> Option<Rgba> {
    let parts: Vec<u8> = value.split(',').map(|p| p.trim().parse().ok()).collect::<Option<_>>()?;
    match parts.as_slice() {
        [r, g, b, a] => Some(Rgba::new(*r, *g, *b, *a)),
        [r, g, b] => Some(Rgba::new(*r, *g, *b, 255)),
        _ => None,
    }
}

fn parse_into<T: std::str::FromStr>(slot: &mut T, key: &str, value: &str) {
    match value.parse() {
        Ok(v) => *slot = v,
        Err(_) => log::debug!("Ignoring malformed value for {key}: {value:?}"),
    }
}

impl UserSettings {
    /// Parse settings text. Unknown keys and malformed lines are skipped.
    pub fn parse(text: &str) -> Self {
        let mut settings = Self::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                log::debug!("Ignoring settings line without a key: {line:?}");
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            match key {
                "Theme" => settings.theme = value.to_string(),
                "Language" => settings.language = value.to_string(),
                "ShadowColor" => match parse_color(value) {
                    Some(color) => settings.shadow_color = color,
                    None => log::debug!("Ignoring malformed shadow color: {value:?}"),
                },
                "NumSteps" => parse_into(&mut settings.num_steps, key, value),
                "MaxBlurRadius" => parse_into(&mut settings.max_blur_radius, key, value),
                "ExtensionLength" => parse_into(&mut settings.extension_length, key, value),
                "ExtensionDashCount" => parse_into(&mut settings.extension_dash_count, key, value),
                "ExtensionDashWidth" => parse_into(&mut settings.extension_dash_width, key, value),
                "ArrowHeadLength" => parse_into(&mut settings.arrow_head_length, key, value),
                "ArrowHeadWidth" => parse_into(&mut settings.arrow_head_width, key, value),
                "DrawOnlyAffectedStrand" => match value.to_ascii_lowercase().as_str() {
                    "true" => settings.draw_only_affected_strand = true,
                    "false" => settings.draw_only_affected_strand = false,
                    _ => log::debug!("Ignoring malformed flag: {value:?}"),
                },
                _ => log::debug!("Ignoring unknown settings key {key}"),
            }
        }
        settings
    }

    /// Render every key in a stable order.
    pub fn to_file_string(&self) -> String {
        let c = self.shadow_color;
        format!(
            "Theme: {}\nLanguage: {}\nShadowColor: {},{},{},{}\nNumSteps: {}\nMaxBlurRadius: {}\n\
             ExtensionLength: {}\nExtensionDashCount: {}\nExtensionDashWidth: {}\n\
             ArrowHeadLength: {}\nArrowHeadWidth: {}\nDrawOnlyAffectedStrand: {}\n",
            self.theme,
            self.language,
            c.r,
            c.g,
            c.b,
            c.a,
            self.num_steps,
            self.max_blur_radius,
            self.extension_length,
            self.extension_dash_count,
            self.extension_dash_width,
            self.arrow_head_length,
            self.arrow_head_width,
            self.draw_only_affected_strand,
        )
    }

    /// Read settings from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> StrandResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No settings at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => {
                log::error!("Failed to read settings {}: {e}", path.display());
                Err(StrandError::PersistenceIo(format!("Failed to read {}: {e}", path.display())))
            }
        }
    }

    /// Write settings to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> StrandResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                log::error!("Cannot create settings directory {}: {e}", parent.display());
                StrandError::PersistenceIo(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
        std::fs::write(path, self.to_file_string()).map_err(|e| {
            log::error!("Error saving settings to {}: {e}", path.display());
            StrandError::PersistenceIo(format!("Failed to write {}: {e}", path.display()))
        })?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// `<data dir>/OpenStrand Studio/user_settings.txt`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir()
            .or_else(dirs::home_dir)
            .map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_tolerates_noise() {
        let settings = UserSettings::parse(
            "Theme: dark\nLanguage: fr\nShadowColor: 10,20,30,40\nNumSteps: many\nBogus: 1\nno colon here\n\
             ArrowHeadLength: 30.5\nDrawOnlyAffectedStrand: TRUE\n",
        );
        assert_eq!(settings.theme, "dark");
        assert_eq!(settings.language, "fr");
        assert_eq!(settings.shadow_color, Rgba::new(10, 20, 30, 40));
        assert_eq!(settings.num_steps, 3);
        assert_eq!(settings.arrow_head_length, 30.5);
        assert!(settings.draw_only_affected_strand);
    }

    #[test]
    fn test_file_string_parses_back() {
        let mut settings = UserSettings::default();
        settings.theme = "light".to_string();
        settings.extension_dash_count = 7;
        settings.max_blur_radius = 12.5;
        assert_eq!(UserSettings::parse(&settings.to_file_string()), settings);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = UserSettings::load_from(&dir.path().join("missing.txt")).unwrap();
        assert_eq!(settings, UserSettings::default());
    }

    #[test]
    fn test_save_creates_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        let mut settings = UserSettings::default();
        settings.language = "de".to_string();
        settings.save_to(&path).unwrap();
        assert_eq!(UserSettings::load_from(&path).unwrap().language, "de");
    }

    #[test]
    fn test_save_failure_is_reported() {
        let dir = tempdir().unwrap();
        // A directory cannot be written as a file.
        let result = UserSettings::default().save_to(dir.path());
        assert!(matches!(result, Err(StrandError::PersistenceIo(_))));
    }
}
