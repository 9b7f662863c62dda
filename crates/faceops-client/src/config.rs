use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/v1";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid api_base_url {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },
}

/// Console configuration.
///
/// Resolved from built-in defaults, then an optional TOML file, then
/// `FACEOPS_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root of the backend REST API, e.g. `http://localhost:8000/api/v1`.
    pub api_base_url: String,
    /// Directory holding the persisted session.
    pub data_dir: PathBuf,
    /// V4L2 device used for camera capture.
    pub camera_device: String,
    /// Frames discarded after opening the camera (exposure settling).
    pub warmup_frames: usize,
    /// Timeout for ordinary requests. The bulk stream is not bounded.
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            data_dir: default_data_dir(),
            camera_device: "/dev/video0".to_string(),
            warmup_frames: 4,
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    ///
    /// The file is `$FACEOPS_CONFIG` when set, else
    /// `$XDG_CONFIG_HOME/faceops/config.toml`. A missing default file is not
    /// an error; a missing explicit one is.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var("FACEOPS_CONFIG").ok().map(PathBuf::from);
        let path = explicit.clone().unwrap_or_else(default_config_path);

        let config = match std::fs::read_to_string(&path) {
            Ok(text) => {
                tracing::debug!(path = %path.display(), "loaded config file");
                Self::from_toml_str(&text)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && explicit.is_none() => {
                Self::default()
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `FACEOPS_*` overrides from `lookup`. Unparseable numbers keep
    /// the current value.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("FACEOPS_API_BASE_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = lookup("FACEOPS_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEOPS_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        self.warmup_frames = parse_or(&lookup, "FACEOPS_WARMUP_FRAMES", self.warmup_frames);
        self.request_timeout_secs =
            parse_or(&lookup, "FACEOPS_REQUEST_TIMEOUT_SECS", self.request_timeout_secs);
        self.connect_timeout_secs =
            parse_or(&lookup, "FACEOPS_CONNECT_TIMEOUT_SECS", self.connect_timeout_secs);
        self
    }

    /// The API root as a URL ending in `/`, ready for relative joins.
    pub fn api_base(&self) -> Result<Url, ConfigError> {
        let mut raw = self.api_base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|source| ConfigError::InvalidBaseUrl {
            url: self.api_base_url.clone(),
            source,
        })
    }

    /// Where the session token is persisted.
    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    current: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(current)
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}

fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
        .join("faceops")
}

fn default_config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("faceops")
        .join("config.toml")
}

/// Create `dir` (and parents) if missing.
pub(crate) fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if !dir.as_os_str().is_empty() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
