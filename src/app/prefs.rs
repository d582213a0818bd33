// src/app/prefs.rs
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use std::{fs, io};

use tracing::{debug, warn};

use crate::app::cache::cache_dir;
use crate::config::AppConfig;

pub const PREFS_FILE: &str = "ui_prefs.txt";

pub const KEY_ROOT_DIRECTORY: &str = "root_directory";
pub const KEY_AUTO_SCAN_ON_START: &str = "auto_scan_on_start";
pub const KEY_LAST_SELECTED_CATEGORY: &str = "last_selected_category";
pub const KEY_POSTER_W: &str = "poster_w";

const SAVE_DEBOUNCE: Duration = Duration::from_millis(300);

pub fn prefs_path(cfg: &AppConfig) -> PathBuf {
    cache_dir(cfg).join(PREFS_FILE)
}

/// `key=value` settings file. Unknown keys are preserved across saves.
pub struct SettingsStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
    dirty: bool,
    last_write: Instant,
}

impl SettingsStore {
    /// Load `path`; a missing or unreadable file is an empty store.
    pub fn load(path: &Path) -> Self {
        let mut values = BTreeMap::new();
        match fs::read_to_string(path) {
            Ok(txt) => {
                for line in txt.lines() {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    let Some((k, v)) = line.split_once('=') else {
                        continue;
                    };
                    values.insert(k.trim().to_string(), v.trim().to_string());
                }
                debug!("Loaded {} settings from {}", values.len(), path.display());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to read {}: {e}", path.display()),
        }
        Self {
            path: path.to_path_buf(),
            values,
            dirty: false,
            last_write: Instant::now(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.get(key), Some("1" | "true" | "yes"))
    }

    pub fn get_f32(&self, key: &str) -> Option<f32> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// Newlines would break the line format; they are flattened to spaces.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into().replace(['\r', '\n'], " ");
        if self.values.get(key) != Some(&value) {
            self.values.insert(key.to_string(), value);
            self.dirty = true;
        }
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.set(key, if value { "1" } else { "0" });
    }

    pub fn delete(&mut self, key: &str) {
        if self.values.remove(key).is_some() {
            self.dirty = true;
        }
    }

    pub fn save(&mut self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut txt = String::from("# cinedex ui prefs\n");
        for (k, v) in &self.values {
            txt.push_str(k);
            txt.push('=');
            txt.push_str(v);
            txt.push('\n');
        }
        fs::write(&self.path, txt)?;
        self.dirty = false;
        self.last_write = Instant::now();
        Ok(())
    }

    /// Save if something changed and the last write is old enough; called
    /// once per frame.
    pub fn maybe_save(&mut self) {
        if self.dirty && self.last_write.elapsed() >= SAVE_DEBOUNCE {
            if let Err(e) = self.save() {
                warn!("Failed to save {}: {e}", self.path.display());
                // retry after the next debounce window
                self.last_write = Instant::now();
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
