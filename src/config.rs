use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".habitrack";
const CONFIG_FILE: &str = "config.json";
const DEFAULT_API_HOST: &str = "127.0.0.1";
const DEFAULT_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub api_host: String,
    pub api_port: u16,
    pub allowed_origins: Vec<String>,
    pub leaderboard_page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            db_path: root.join("db").join("habits.db"),
            api_host: DEFAULT_API_HOST.to_string(),
            api_port: 7891,
            allowed_origins: vec![DEFAULT_ORIGIN.to_string()],
            leaderboard_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Config {
    pub fn root_dir() -> Result<PathBuf> {
        Ok(default_root_dir())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.leaderboard_page_size = config.leaderboard_page_size.clamp(1, MAX_PAGE_SIZE);

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(&config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        let root = Self::root_dir()?;
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root directory: {}", root.display()))?;

        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let host = self
            .api_host
            .parse::<IpAddr>()
            .with_context(|| format!("Invalid api_host: {}. Example: 127.0.0.1", self.api_host))?;

        Ok(SocketAddr::new(host, self.api_port))
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "db_path" => {
                if value.trim().is_empty() {
                    bail!("db_path must not be empty");
                }
                self.db_path = expand_home(value.trim());
            }
            "api_host" => {
                value
                    .trim()
                    .parse::<IpAddr>()
                    .map_err(|_| anyhow!("api_host must be an IP address"))?;
                self.api_host = value.trim().to_string();
            }
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "allowed_origins" => {
                let origins = value
                    .split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(|part| part.trim_end_matches('/').to_owned())
                    .collect::<Vec<_>>();

                if let Some(invalid) = origins.iter().find(|origin| !is_valid_origin(origin)) {
                    bail!("allowed_origins entries must start with http:// or https://, got {invalid}");
                }
                self.allowed_origins = origins;
            }
            "leaderboard_page_size" => {
                let parsed = value
                    .parse::<usize>()
                    .map_err(|_| anyhow!("leaderboard_page_size must be a number"))?;
                if !(1..=MAX_PAGE_SIZE).contains(&parsed) {
                    bail!("leaderboard_page_size must be between 1 and {MAX_PAGE_SIZE}");
                }
                self.leaderboard_page_size = parsed;
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: db_path|db.path, api_host|api.host, api_port|api.port, allowed_origins|cors.origins, leaderboard_page_size|leaderboard.page_size"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "db_path" => Some(self.db_path.display().to_string()),
            "api_host" => Some(self.api_host.clone()),
            "api_port" => Some(self.api_port.to_string()),
            "allowed_origins" => Some(self.allowed_origins.join(",")),
            "leaderboard_page_size" => Some(self.leaderboard_page_size.to_string()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "db_path" | "db.path" => "db_path",
        "api_host" | "api.host" => "api_host",
        "api_port" | "api.port" => "api_port",
        "allowed_origins" | "cors.origins" => "allowed_origins",
        "leaderboard_page_size" | "leaderboard.page_size" => "leaderboard_page_size",
        _ => key,
    }
}

pub fn is_valid_origin(origin: &str) -> bool {
    (origin.starts_with("http://") || origin.starts_with("https://"))
        && origin.len() > "https://".len()
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}
