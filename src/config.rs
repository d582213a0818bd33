use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::{info, warn};

pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_CACHE_DIR: &str = ".cinedex_cache";
pub const DEFAULT_SEARCH_BASE_URL: &str = "https://www.imdb.com";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub cache_dir: Option<String>,
    /// Player command line; the file path is appended as the last argument.
    pub player_cmd: Option<String>,
    pub search_base_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub batch_delay_ms: u64,
    pub poster_max_width: u32,
    pub poster_quality: u8,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            player_cmd: None,
            search_base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 20,
            batch_delay_ms: 750,
            poster_max_width: 600,
            poster_quality: 85,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    cache_dir: Option<String>,
    #[serde(alias = "vlc_cmd")]
    player_cmd: Option<String>,
    search_base_url: Option<String>,
    user_agent: Option<String>,
    request_timeout_secs: Option<u64>,
    batch_delay_ms: Option<u64>,
    poster_max_width: Option<u32>,
    poster_quality: Option<u8>,
}

pub fn load_config() -> AppConfig {
    load_config_from(Path::new(CONFIG_FILE))
}

pub fn load_config_from(cfg_path: &Path) -> AppConfig {
    let mut cfg = AppConfig::default();

    match fs::read_to_string(cfg_path) {
        Ok(raw) => match serde_json::from_str::<RawConfig>(&raw) {
            Ok(parsed) => {
                if parsed.cache_dir.is_some() {
                    cfg.cache_dir = parsed.cache_dir;
                }
                if let Some(cmd) = parsed.player_cmd {
                    if cmd.trim().is_empty() {
                        warn!("Empty `player_cmd` in {}; using the system opener.", cfg_path.display());
                    } else {
                        cfg.player_cmd = Some(cmd);
                    }
                }
                if let Some(url) = parsed.search_base_url {
                    cfg.search_base_url = url.trim_end_matches('/').to_string();
                }
                if let Some(ua) = parsed.user_agent {
                    cfg.user_agent = ua;
                }
                if let Some(secs) = parsed.request_timeout_secs {
                    cfg.request_timeout_secs = secs.clamp(1, 300);
                }
                if let Some(ms) = parsed.batch_delay_ms {
                    cfg.batch_delay_ms = ms;
                }
                if let Some(w) = parsed.poster_max_width {
                    cfg.poster_max_width = w.clamp(64, 4096);
                }
                if let Some(q) = parsed.poster_quality {
                    cfg.poster_quality = q.clamp(1, 100);
                }
                info!("Loaded config from {}", cfg_path.display());
            }
            Err(err) => {
                warn!("Failed to parse {} ({}). Using defaults.", cfg_path.display(), err);
            }
        },
        Err(_) => {
            info!("No {} found; using defaults", cfg_path.display());
        }
    }

    cfg
}

/// Resolve `rel` against the executable's directory, falling back to the
/// working directory when the executable path is unknown.
pub fn resolve_relative_path(rel: &str) -> PathBuf {
    let base = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(rel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("nope.json"));
        assert_eq!(cfg.search_base_url, DEFAULT_SEARCH_BASE_URL);
        assert!(cfg.player_cmd.is_none());
        assert_eq!(cfg.request_timeout_secs, 20);
    }

    #[test]
    fn overrides_are_merged_and_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "vlc_cmd": "open -a VLC", "search_base_url": "http://localhost:9000/",
                 "poster_quality": 250, "batch_delay_ms": 0 }"#,
        )
        .unwrap();
        let cfg = load_config_from(&path);
        assert_eq!(cfg.player_cmd.as_deref(), Some("open -a VLC"));
        assert_eq!(cfg.search_base_url, "http://localhost:9000");
        assert_eq!(cfg.poster_quality, 100);
        assert_eq!(cfg.batch_delay_ms, 0);
    }

    #[test]
    fn broken_json_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        let cfg = load_config_from(&path);
        assert_eq!(cfg.poster_max_width, 600);
    }
}
