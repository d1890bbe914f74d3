//! Persistent Settings Management
//!
//! Remembers what the user picked on the device between runs: the active
//! display, the gradient list and which one is in use, gradient reversal and
//! the fallback gain/brightness used when no knob or remote supplies them.
//!
//! # Storage Locations
//! - Linux: `~/.config/specan/settings.json`
//! - Windows: `%APPDATA%\specan\settings.json`
//! - macOS: `~/Library/Application Support/specan/settings.json`
//!
//! Every field falls back to its default on its own: a file with one bad
//! value keeps the rest.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::gradient::{Gradient, GradientPoint};

/// Minimum time between two writes of a dirty store
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// A gradient as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedGradient {
    pub points: Vec<GradientPoint>,
    pub saved_at: DateTime<Utc>,
}

impl SavedGradient {
    pub fn new(gradient: &Gradient) -> Self {
        Self {
            points: gradient.points().to_vec(),
            saved_at: Utc::now(),
        }
    }

    /// The gradient a fresh install starts with
    fn builtin() -> Self {
        Self {
            saved_at: DateTime::<Utc>::UNIX_EPOCH,
            ..Self::new(&Gradient::default())
        }
    }

    pub fn gradient(&self) -> EngineResult<Gradient> {
        Gradient::new(self.points.clone())
    }
}

/// Root settings structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub display_index: usize,
    pub reverse_gradient: bool,
    pub gain: i32,
    pub brightness: f32,
    pub gradient_index: usize,
    pub gradients: Vec<SavedGradient>,
}

fn default_gradients() -> Vec<SavedGradient> {
    vec![SavedGradient::builtin()]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            display_index: 0,
            reverse_gradient: false,
            gain: 4,
            brightness: 0.5,
            gradient_index: 0,
            gradients: default_gradients(),
        }
    }
}

/// Take `key` from `map` if it parses, otherwise keep `fallback`
fn field_or<T: DeserializeOwned>(map: &Map<String, Value>, key: &str, fallback: T) -> T {
    match map.get(key) {
        Some(value) => match serde_json::from_value(value.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Ignoring settings field '{}': {}", key, e);
                fallback
            }
        },
        None => fallback,
    }
}

impl Settings {
    /// Parse settings, defaulting each field that is missing or malformed
    pub fn from_json(text: &str) -> EngineResult<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| EngineError::SettingsError(e.to_string()))?;
        let Value::Object(map) = value else {
            return Err(EngineError::SettingsError(
                "settings root is not an object".to_string(),
            ));
        };

        let defaults = Self::default();
        let gradients: Vec<SavedGradient> = field_or::<Vec<Value>>(&map, "gradients", Vec::new())
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<SavedGradient>(entry) {
                Ok(saved) if saved.gradient().is_ok() => Some(saved),
                _ => {
                    warn!("Dropping invalid saved gradient");
                    None
                }
            })
            .collect();

        let mut settings = Self {
            display_index: field_or(&map, "display_index", defaults.display_index),
            reverse_gradient: field_or(&map, "reverse_gradient", defaults.reverse_gradient),
            gain: field_or(&map, "gain", defaults.gain),
            brightness: field_or(&map, "brightness", defaults.brightness),
            gradient_index: field_or(&map, "gradient_index", defaults.gradient_index),
            gradients,
        };
        settings.sanitize();
        Ok(settings)
    }

    /// Pull out-of-range values back into range
    fn sanitize(&mut self) {
        if self.gradients.is_empty() {
            self.gradients = default_gradients();
        }
        if self.gradient_index >= self.gradients.len() {
            self.gradient_index = 0;
        }
        if !self.brightness.is_finite() {
            self.brightness = Self::default().brightness;
        }
        self.brightness = self.brightness.clamp(0.0, 1.0);
        self.gain = self.gain.max(0);
    }

    /// Load settings from `path`, or return defaults if missing/corrupt
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(text) => match Self::from_json(&text) {
                    Ok(settings) => {
                        info!("Settings loaded from {:?}", path);
                        return settings;
                    }
                    Err(e) => {
                        error!("Failed to parse settings file: {}", e);
                    }
                },
                Err(e) => {
                    error!("Failed to open settings file: {}", e);
                }
            }
        }

        info!("Using default settings");
        Self::default()
    }

    pub fn save_to(&self, path: &Path) -> EngineResult<()> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| EngineError::SettingsError(e.to_string()))?;
        }

        let file = fs::File::create(path).map_err(|e| EngineError::SettingsError(e.to_string()))?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| EngineError::SettingsError(e.to_string()))?;

        debug!("Settings saved to {:?}", path);
        Ok(())
    }

    /// Get the platform-specific configuration file path
    pub fn get_config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "specan", "specan")
            .map(|proj| proj.config_dir().join("settings.json"))
    }
}

/// A copy of the settings claimed for writing
///
/// Taken while the store is locked and saved after the lock is released, so
/// a slow disk never holds up anyone reading the store.
#[derive(Debug)]
pub struct PendingWrite {
    settings: Settings,
    path: Option<PathBuf>,
}

impl PendingWrite {
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn save(&self) -> EngineResult<()> {
        match &self.path {
            Some(path) => self.settings.save_to(path),
            None => Ok(()),
        }
    }
}

/// Settings plus write-back bookkeeping
///
/// Mutations only mark the store dirty; the monitor thread claims a
/// [`PendingWrite`] with [`SettingsStore::take_due`] so the file is written
/// at most once a second however fast the knobs turn.
pub struct SettingsStore {
    settings: Settings,
    path: Option<PathBuf>,
    dirty: bool,
    last_flush: Option<Instant>,
}

impl SettingsStore {
    /// In-memory store that never touches disk
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            settings,
            path: None,
            dirty: false,
            last_flush: None,
        }
    }

    /// Load from `path`, or the platform config path when `None`
    pub fn open(path: Option<PathBuf>) -> Self {
        let path = path.or_else(Settings::get_config_path);
        let settings = match &path {
            Some(path) => Settings::load_from(path),
            None => Settings::default(),
        };
        Self {
            settings,
            path,
            dirty: false,
            last_flush: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn gain(&self) -> i32 {
        self.settings.gain
    }

    pub fn brightness(&self) -> f32 {
        self.settings.brightness
    }

    pub fn reverse_gradient(&self) -> bool {
        self.settings.reverse_gradient
    }

    pub fn display_index(&self) -> usize {
        self.settings.display_index
    }

    pub fn gradient_index(&self) -> usize {
        self.settings.gradient_index
    }

    /// The gradient in use
    pub fn current_gradient(&self) -> Gradient {
        self.settings
            .gradients
            .get(self.settings.gradient_index)
            .and_then(|saved| saved.gradient().ok())
            .unwrap_or_default()
    }

    pub fn set_display_index(&mut self, index: usize) {
        if self.settings.display_index != index {
            self.settings.display_index = index;
            self.dirty = true;
        }
    }

    /// Remember the levels last supplied by a knob or the remote
    pub fn set_levels(&mut self, gain: i32, brightness: f32) {
        let gain = gain.max(0);
        let brightness = if brightness.is_finite() {
            brightness.clamp(0.0, 1.0)
        } else {
            self.settings.brightness
        };
        if self.settings.gain != gain || self.settings.brightness != brightness {
            self.settings.gain = gain;
            self.settings.brightness = brightness;
            self.dirty = true;
        }
    }

    pub fn toggle_reverse(&mut self) -> bool {
        self.settings.reverse_gradient = !self.settings.reverse_gradient;
        self.dirty = true;
        self.settings.reverse_gradient
    }

    /// Step through the gradient list with wraparound
    pub fn step_gradient(&mut self, delta: isize) -> Gradient {
        let count = self.settings.gradients.len() as isize;
        if count > 0 {
            let next = (self.settings.gradient_index as isize + delta).rem_euclid(count);
            self.settings.gradient_index = next as usize;
            self.dirty = true;
        }
        self.current_gradient()
    }

    /// Remove the current gradient; the last remaining one is kept
    pub fn delete_gradient(&mut self) -> bool {
        if self.settings.gradients.len() <= 1 {
            return false;
        }
        self.settings.gradients.remove(self.settings.gradient_index);
        if self.settings.gradient_index >= self.settings.gradients.len() {
            self.settings.gradient_index = 0;
        }
        self.dirty = true;
        true
    }

    /// Claim everything unsaved, regardless of when the last write was
    pub fn take_pending(&mut self) -> Option<PendingWrite> {
        self.claim(Instant::now())
    }

    /// Claim the unsaved state if the last write is at least
    /// [`FLUSH_INTERVAL`] old
    pub fn take_due(&mut self, now: Instant) -> Option<PendingWrite> {
        if let Some(last) = self.last_flush {
            if now.saturating_duration_since(last) < FLUSH_INTERVAL {
                return None;
            }
        }
        self.claim(now)
    }

    fn claim(&mut self, now: Instant) -> Option<PendingWrite> {
        if !self.dirty {
            return None;
        }
        // Cleared even if the save later fails; the next change retries
        self.dirty = false;
        self.last_flush = Some(now);
        Some(PendingWrite {
            settings: self.settings.clone(),
            path: self.path.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.gain, 4);
        assert_eq!(settings.brightness, 0.5);
        assert_eq!(settings.gradients.len(), 1);
        assert!(!settings.reverse_gradient);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.display_index = 3;
        settings.reverse_gradient = true;
        settings.gain = 7;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Settings::load_from(&dir.path().join("absent.json"));
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn test_bad_field_only_resets_that_field() {
        let settings = Settings::from_json(
            r#"{ "display_index": 2, "gain": "loud", "reverse_gradient": true }"#,
        )
        .unwrap();
        assert_eq!(settings.display_index, 2);
        assert!(settings.reverse_gradient);
        assert_eq!(settings.gain, 4);
        assert_eq!(settings.brightness, 0.5);
        assert_eq!(settings.gradients.len(), 1);
    }

    #[test]
    fn test_out_of_range_values_are_pulled_in() {
        let settings =
            Settings::from_json(r#"{ "brightness": 3.0, "gain": -2, "gradient_index": 9 }"#)
                .unwrap();
        assert_eq!(settings.brightness, 1.0);
        assert_eq!(settings.gain, 0);
        assert_eq!(settings.gradient_index, 0);
    }

    #[test]
    fn test_invalid_gradient_dropped() {
        let json = r#"{
            "gradients": [
                { "points": [], "saved_at": "2024-01-01T00:00:00Z" },
                { "points": 5 }
            ]
        }"#;
        let settings = Settings::from_json(json).unwrap();
        assert_eq!(settings.gradients.len(), 1);
        assert_eq!(settings.gradients[0].points, Gradient::default().points());
    }

    fn with_rainbows() -> Settings {
        let mut settings = Settings::default();
        settings.gradients.push(SavedGradient::new(&Gradient::rainbow(3)));
        settings.gradients.push(SavedGradient::new(&Gradient::rainbow(5)));
        settings.gradient_index = 2;
        settings
    }

    #[test]
    fn test_default_gradient_is_stable() {
        assert_eq!(Settings::default(), Settings::default());
        assert_eq!(
            Settings::default().gradients[0].saved_at,
            DateTime::<Utc>::UNIX_EPOCH
        );
    }

    #[test]
    fn test_gradient_cycling_wraps() {
        let mut store = SettingsStore::in_memory(with_rainbows());
        assert_eq!(store.gradient_index(), 2);

        store.step_gradient(1);
        assert_eq!(store.gradient_index(), 0);
        store.step_gradient(-1);
        assert_eq!(store.gradient_index(), 2);
        assert_eq!(store.current_gradient(), Gradient::rainbow(5));
    }

    #[test]
    fn test_delete_keeps_last_gradient() {
        let mut store = SettingsStore::in_memory(Settings::default());
        assert!(!store.delete_gradient());
        assert_eq!(store.settings().gradients.len(), 1);

        let mut store = SettingsStore::in_memory(with_rainbows());
        assert!(store.delete_gradient());
        assert!(store.delete_gradient());
        assert!(!store.delete_gradient());
        assert_eq!(store.settings().gradients.len(), 1);
        assert_eq!(store.gradient_index(), 0);
    }

    #[test]
    fn test_set_levels_marks_dirty_only_on_change() {
        let mut store = SettingsStore::in_memory(Settings::default());
        store.set_levels(4, 0.5);
        assert!(!store.is_dirty());

        store.set_levels(9, 2.0);
        assert!(store.is_dirty());
        assert_eq!(store.gain(), 9);
        assert_eq!(store.brightness(), 1.0);

        store.set_levels(-3, f32::NAN);
        assert_eq!(store.gain(), 0);
        assert_eq!(store.brightness(), 1.0);
    }

    #[test]
    fn test_flush_is_rate_limited() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut store = SettingsStore::open(Some(path.clone()));
        assert!(!store.is_dirty());

        let start = Instant::now();
        assert!(store.take_due(start).is_none());

        store.set_display_index(1);
        store.take_due(start).unwrap().save().unwrap();
        assert!(path.exists());

        store.set_display_index(2);
        assert!(store.take_due(start + Duration::from_millis(100)).is_none());
        assert!(store.is_dirty());
        let write = store.take_due(start + Duration::from_secs(2)).unwrap();
        assert!(!store.is_dirty());

        // Changes after the claim belong to the next write
        store.set_display_index(3);
        write.save().unwrap();
        assert_eq!(Settings::load_from(&path).display_index, 2);
        assert!(store.is_dirty());
    }

    #[test]
    fn test_take_pending_ignores_rate_limit() {
        let mut store = SettingsStore::in_memory(Settings::default());
        store.toggle_reverse();
        assert!(store.take_due(Instant::now()).is_some());

        store.toggle_reverse();
        let write = store.take_pending().unwrap();
        assert!(!write.settings().reverse_gradient);
        assert!(write.save().is_ok());
        assert!(store.take_pending().is_none());
    }
}
