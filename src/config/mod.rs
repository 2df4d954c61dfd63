use crate::lyrics::lrclib::LrclibClient;
use crate::lyrics::ovh::OvhClient;
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub youtube: YouTubeConfig,
    pub lastfm: LastfmConfig,
    pub player: PlayerConfig,
    pub playback: PlaybackConfig,
    pub server: ServerConfig,
    pub lyrics: LyricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    /// YouTube Data API v3 key. `YOUTUBE_API_KEY` wins over this.
    pub api_key: Option<String>,
    pub max_results: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LastfmConfig {
    /// `LASTFM_API_KEY` wins over this.
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Videos are a backdrop; the music comes from elsewhere.
    pub mute: bool,
    /// mpv audio device name (see `mpv --audio-device=help`)
    pub audio_device: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub fetch_debounce_ms: u64,
    /// Identity used for per-user preferred videos.
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Remote `backdrop serve` to use instead of resolving in-process.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LyricsConfig {
    pub enabled: bool,
    pub lrclib_url: String,
    pub ovh_url: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let proj = ProjectDirs::from("dev", "backdrop", "backdrop");
        let data_dir = proj
            .as_ref()
            .map(|p| p.data_dir().to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir().join("backdrop"));
        Self { data_dir }
    }
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            max_results: 25,
        }
    }
}

impl Default for LastfmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            username: None,
            poll_interval_ms: 5000,
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            mute: true,
            audio_device: None,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fetch_debounce_ms: 1000,
            user_id: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            url: None,
        }
    }
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lrclib_url: LrclibClient::DEFAULT_BASE_URL.to_string(),
            ovh_url: OvhClient::DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.paths.data_dir.join("candidates.sqlite3")
    }

    pub fn fetch_debounce(&self) -> Duration {
        Duration::from_millis(self.playback.fetch_debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.lastfm.poll_interval_ms.max(1000))
    }

    pub fn server_addr(&self) -> anyhow::Result<SocketAddr> {
        let raw = format!("{}:{}", self.server.host, self.server.port);
        raw.parse()
            .with_context(|| format!("invalid server address {raw}"))
    }

    fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(key) = get("YOUTUBE_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.youtube.api_key = Some(key);
        }
        if let Some(key) = get("LASTFM_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.lastfm.api_key = Some(key);
        }
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let proj =
        ProjectDirs::from("dev", "backdrop", "backdrop").context("ProjectDirs unavailable")?;
    Ok(proj.config_dir().join("config.toml"))
}

fn write_private(path: &Path, raw: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
    }
    fs::write(path, raw).with_context(|| format!("write {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    Ok(())
}

/// Loads the config file, writing the defaults on first run, then applies
/// environment overrides.
pub fn load(override_path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match override_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    let mut cfg = if path.exists() {
        let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        toml::from_str::<Config>(&raw).with_context(|| format!("parse {}", path.display()))?
    } else {
        let cfg = Config::default();
        let raw = toml::to_string_pretty(&cfg).context("serialize default config")?;
        write_private(&path, &raw)?;
        cfg
    };
    cfg.apply_env(|k| std::env::var(k).ok());
    Ok(cfg)
}
