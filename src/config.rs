//! Configuration file handling

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use das_core::RetryPolicy;
use directories::ProjectDirs;
use dkb4q::Rgb;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub retry: RetryConfig,
    pub cpu_meter: CpuMeterConfig,
}

impl Config {
    /// Get the config file path for this platform
    pub fn path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "das-keys").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load config from file, or create default if it doesn't exist
    pub fn load_or_create() -> Result<Self, Box<dyn Error>> {
        let path = Self::path().ok_or("could not determine config directory")?;

        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_with_header()?;
            println!("created default config at {}", path.display());
            Ok(config)
        }
    }

    /// Save config with header comments for new files
    pub fn save_with_header(&self) -> Result<(), Box<dyn Error>> {
        let path = Self::path().ok_or("could not determine config directory")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let header = r#"# das-keys configuration file
# key ids are LED ids, F1 is 17 and F12 is 83

"#;
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, format!("{header}{contents}"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Reads of an empty report before giving up
    pub attempts: u32,
    /// Wait after the first empty report, doubled on every retry
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    /// Upper bound for the wait between reads
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    /// Total time to wait for an acknowledgement
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            attempts: policy.attempts,
            initial_backoff: policy.initial_backoff,
            max_backoff: policy.max_backoff,
            timeout: policy.timeout,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy {
            attempts: config.attempts,
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
            timeout: config.timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuMeterConfig {
    /// Sampling interval
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Keys forming the meter, lowest first
    pub keys: Vec<u8>,
    /// Color for time spent in the kernel (hex)
    pub system_color: String,
    /// Color for time spent in user space (hex)
    pub user_color: String,
}

impl CpuMeterConfig {
    /// Parsed `(system, user)` colors
    pub fn colors(&self) -> Result<(Rgb, Rgb), String> {
        Ok((self.system_color.parse()?, self.user_color.parse()?))
    }
}

impl Default for CpuMeterConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            // F1 through F12
            keys: vec![17, 23, 29, 35, 41, 47, 53, 59, 65, 71, 77, 83],
            system_color: "#ff0000".into(),
            user_color: "#0000ff".into(),
        }
    }
}
