//! Configuration loader and validator for the stream-tally pipeline.
use crate::attribute::SlotPolicy;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub app: App,
    pub youtube: YoutubeSource,
    pub vimeo: VimeoSource,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct App {
    pub database_url: String,
    /// Service timezone; event grouping uses local dates in this zone.
    pub timezone: Tz,
    /// Upper bound on events fetched per provider per run.
    #[serde(default = "default_fetch_cap")]
    pub fetch_cap: usize,
}

fn default_fetch_cap() -> usize {
    2000
}

/// YouTube data API settings and attribution policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct YoutubeSource {
    pub api_key: String,
    pub channel_id: String,
    pub policy: SlotPolicy,
}

/// Vimeo API settings and attribution policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VimeoSource {
    pub access_token: String,
    pub user_id: String,
    pub policy: SlotPolicy,
}

impl Config {
    /// Database URL, honoring a `DATABASE_URL` environment override.
    pub fn resolved_database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| self.app.database_url.clone())
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.database_url.trim().is_empty() {
        return Err(ConfigError::Invalid("app.database_url must be non-empty"));
    }
    if cfg.app.fetch_cap == 0 {
        return Err(ConfigError::Invalid("app.fetch_cap must be > 0"));
    }

    if cfg.youtube.api_key.trim().is_empty() {
        return Err(ConfigError::Invalid("youtube.api_key must be non-empty"));
    }
    if cfg.youtube.channel_id.trim().is_empty() {
        return Err(ConfigError::Invalid("youtube.channel_id must be non-empty"));
    }
    validate_policy(&cfg.youtube.policy, PolicyMessages::YOUTUBE)?;

    if cfg.vimeo.access_token.trim().is_empty() {
        return Err(ConfigError::Invalid("vimeo.access_token must be non-empty"));
    }
    if cfg.vimeo.user_id.trim().is_empty() {
        return Err(ConfigError::Invalid("vimeo.user_id must be non-empty"));
    }
    validate_policy(&cfg.vimeo.policy, PolicyMessages::VIMEO)?;

    Ok(())
}

/// Per-source error strings so `ConfigError::Invalid` can stay `&'static str`.
struct PolicyMessages {
    hour_window: &'static str,
    split_hour: &'static str,
    windows: &'static str,
}

impl PolicyMessages {
    const YOUTUBE: Self = Self {
        hour_window: "youtube.policy.filter.hour_window must be ordered",
        split_hour: "youtube.policy.single.split_hour must be in [0, 24)",
        windows: "youtube.policy.single.windows must be ordered",
    };
    const VIMEO: Self = Self {
        hour_window: "vimeo.policy.filter.hour_window must be ordered",
        split_hour: "vimeo.policy.single.split_hour must be in [0, 24)",
        windows: "vimeo.policy.single.windows must be ordered",
    };
}

fn validate_policy(policy: &SlotPolicy, msgs: PolicyMessages) -> Result<(), ConfigError> {
    use crate::attribute::SingleRule;

    if let Some(window) = policy.filter.hour_window {
        if !window.is_ordered() {
            return Err(ConfigError::Invalid(msgs.hour_window));
        }
    }
    match &policy.single {
        SingleRule::SplitHour(hour) => {
            if !(0.0..24.0).contains(hour) {
                return Err(ConfigError::Invalid(msgs.split_hour));
            }
        }
        SingleRule::Windows { slot_a, slot_b } => {
            if !slot_a.is_ordered() || !slot_b.is_ordered() {
                return Err(ConfigError::Invalid(msgs.windows));
            }
        }
    }
    Ok(())
}

/// Example YAML content with the default per-source policies.
pub fn example() -> &'static str {
    r#"app:
  database_url: "sqlite://./data/stream_tally.db"
  timezone: "America/New_York"
  fetch_cap: 2000

youtube:
  api_key: "YOUR_YOUTUBE_API_KEY"
  channel_id: "YOUR_CHANNEL_ID"
  policy:
    combined_same_value: true
    filter:
      hour_window: [7.0, 13.0]
    single:
      windows:
        slot_a: [8.0, 10.0]
        slot_b: [10.0, 12.0]

vimeo:
  access_token: "YOUR_VIMEO_ACCESS_TOKEN"
  user_id: "12345678"
  policy:
    combined_same_value: false
    filter:
      weekday: "Sun"
    single:
      split_hour: 11.0
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{HourWindow, SingleRule};
    use chrono::Weekday;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();

        assert_eq!(cfg.app.timezone, chrono_tz::America::New_York);
        assert!(cfg.youtube.policy.combined_same_value);
        assert!(!cfg.vimeo.policy.combined_same_value);
        assert_eq!(
            cfg.youtube.policy.filter.hour_window,
            Some(HourWindow(7.0, 13.0))
        );
        assert_eq!(cfg.vimeo.policy.filter.weekday, Some(Weekday::Sun));
        assert_eq!(cfg.vimeo.policy.single, SingleRule::SplitHour(11.0));
    }

    #[test]
    fn invalid_api_key() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.youtube.api_key = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("youtube.api_key")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_vimeo_credentials() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.vimeo.access_token = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("vimeo.access_token")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.vimeo.user_id = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_hour_window() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.youtube.policy.filter.hour_window = Some(HourWindow(13.0, 7.0));
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("hour_window")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_split_hour() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.vimeo.policy.single = SingleRule::SplitHour(25.0);
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.vimeo.user_id, "12345678");
    }
}
